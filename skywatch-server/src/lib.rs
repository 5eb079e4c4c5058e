//! HTTP layer of the skywatch sky-condition server.
//!
//! This crate focuses on:
//! - Request validation and error-to-status mapping
//! - The JSON wire shapes the dashboard consumes
//! - Router assembly from a [`skywatch_core::Config`]

pub mod app;
pub mod error;
