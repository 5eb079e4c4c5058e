use async_trait::async_trait;
use reqwest::Client;
use std::{fmt::Debug, time::Duration};

use crate::{error::SourceError, model::Coordinate};

pub mod geocode;
pub mod observations;
pub mod open_meteo;
pub mod swpc;

/// Bound applied to every upstream call so a stalled provider cannot suspend
/// a request indefinitely. A timeout surfaces as the same upstream failure
/// as any other transport error.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the shared HTTP client used by all source clients.
pub fn http_client() -> Result<Client, SourceError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// A current cloud-cover reading from a forecast provider, with the
/// provider's own timestamp. Either side may be missing independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentCloudCover {
    pub time: Option<String>,
    pub percent: Option<f64>,
}

/// Seam for the secondary cloud-cover provider consulted by the resolver
/// when the ground observations carry no usable cloud signal.
#[async_trait]
pub trait CloudCoverSource: Send + Sync + Debug {
    async fn current_cloud_cover(
        &self,
        coord: Coordinate,
    ) -> Result<CurrentCloudCover, SourceError>;
}
