use serde::Serialize;

use crate::error::SourceError;

/// A validated geographic coordinate pair, built once per request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Accepts any finite pair; range validity is left to the distance
    /// computation, which tolerates degenerate inputs.
    pub fn new(lat: f64, lon: f64) -> Result<Self, SourceError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(SourceError::InvalidCoordinate(format!(
                "lat={lat}, lon={lon}"
            )));
        }
        Ok(Self { lat, lon })
    }
}

/// One entry from the ground-observation feed.
///
/// Every field is optional: the feed omits tags freely, and non-numeric
/// latitude/longitude text leaves the field `None`. A station without a
/// usable position never participates in nearest-neighbor search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationRecord {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Cloudiness on the 0-8 scale, as reported. Range-checked at
    /// reconciliation time, not here.
    pub cloudiness: Option<u8>,
    pub phenomenon: Option<String>,
}

impl StationRecord {
    /// Position of the station, if both coordinates parsed.
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// The decoded observation document: stations plus the feed-wide timestamp
/// (seconds since epoch). Fetched and parsed fresh on every request.
#[derive(Debug, Clone, Default)]
pub struct ObservationFeed {
    pub stations: Vec<StationRecord>,
    pub timestamp: Option<i64>,
}

/// The station selected by nearest-neighbor search, with its raw
/// great-circle distance from the requested coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestStation {
    pub station: StationRecord,
    pub distance_km: f64,
}

/// Which policy branch produced a cloud-cover percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudSignal {
    CloudinessScale,
    PhenomenonLabel,
    ForecastFallback,
}

impl CloudSignal {
    pub fn label(&self) -> &'static str {
        match self {
            CloudSignal::CloudinessScale => "cloudiness-scale",
            CloudSignal::PhenomenonLabel => "phenomenon-label",
            CloudSignal::ForecastFallback => "Open-Meteo fallback",
        }
    }
}

/// A reconciled cloud-cover percentage together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudCover {
    pub percent: u8,
    pub signal: CloudSignal,
}

/// Matched-station metadata as reported to the caller. Distance is rounded
/// to one decimal kilometer for display.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedStation {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "distanceKm")]
    pub distance_km: f64,
}

/// The fully assembled outcome of the clouds-from-observations pipeline.
/// Ephemeral: constructed per request and discarded after the response.
#[derive(Debug, Clone)]
pub struct CloudObservation {
    /// Feed timestamp rendered RFC 3339, or the fallback provider's own
    /// timestamp when the fallback supplied the value.
    pub time: Option<String>,
    /// Human-readable source chain, e.g.
    /// `"Ilmateenistus (Keskkonnaagentuur) \u{2022} cloudiness-scale"`.
    pub source: String,
    pub station: Option<MatchedStation>,
    pub phenomenon: Option<String>,
    pub cloudiness: Option<u8>,
    pub cloud_cover_percent: Option<u8>,
    /// Explanatory text for degraded outcomes (e.g. no usable stations).
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_non_finite() {
        assert!(Coordinate::new(f64::NAN, 24.7).is_err());
        assert!(Coordinate::new(59.4, f64::INFINITY).is_err());
        assert!(Coordinate::new(59.4, 24.7).is_ok());
    }

    #[test]
    fn station_position_requires_both_coordinates() {
        let st = StationRecord {
            latitude: Some(59.4),
            ..Default::default()
        };
        assert_eq!(st.position(), None);

        let st = StationRecord {
            latitude: Some(59.4),
            longitude: Some(24.7),
            ..Default::default()
        };
        assert_eq!(st.position(), Some((59.4, 24.7)));
    }

    #[test]
    fn signal_labels_are_stable() {
        assert_eq!(CloudSignal::CloudinessScale.label(), "cloudiness-scale");
        assert_eq!(CloudSignal::PhenomenonLabel.label(), "phenomenon-label");
        assert_eq!(CloudSignal::ForecastFallback.label(), "Open-Meteo fallback");
    }
}
