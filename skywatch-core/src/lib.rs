//! Core library for the `skywatch` sky-condition server.
//!
//! This crate defines:
//! - Configuration for the server and its upstream sources
//! - Clients for the upstream data providers (ground observations,
//!   Open-Meteo forecast & geocoding, NOAA SWPC space weather)
//! - The nearest-station cloud-cover resolver and its fallback policy
//!
//! It is used by `skywatch-server`, but can also be reused by other binaries
//! or services.

pub mod clouds;
pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod source;

pub use config::{CloudPolicy, Config, SourceUrls};
pub use error::SourceError;
pub use model::{CloudObservation, Coordinate, ObservationFeed, StationRecord};
pub use source::CloudCoverSource;
