//! Nearest-station cloud-cover resolution with graceful multi-source
//! fallback.
//!
//! The pipeline: select the ground station closest to the requested
//! coordinate, derive a 0-100 percentage from its fields through an ordered
//! strategy chain (the fine-grained 0-8 cloudiness scale first, the coarser
//! phenomenon vocabulary second), and when neither signal is usable consult
//! the secondary forecast provider. Fallback failure never fails the
//! request; it only leaves the percentage null.

use chrono::{DateTime, SecondsFormat};

use crate::{
    config::CloudPolicy,
    geo,
    model::{
        CloudCover, CloudObservation, CloudSignal, Coordinate, MatchedStation, NearestStation,
        ObservationFeed, StationRecord,
    },
    source::{CloudCoverSource, observations},
};

/// Note attached to responses when the feed had no usable stations.
pub const NO_STATIONS_NOTE: &str = "no stations with usable coordinates";

/// A resolution strategy inspects the matched station and either produces a
/// percentage with its provenance or declares itself inconclusive.
type Strategy = fn(&StationRecord) -> Option<CloudCover>;

/// Precedence order is the policy: the numeric scale is finer-grained and
/// always preferred; the label vocabulary is a coarser proxy used only when
/// the scale is missing or out of range.
const STRATEGIES: &[Strategy] = &[from_cloudiness_scale, from_phenomenon_label];

/// Select the station with minimum Haversine distance among stations with
/// usable coordinates. Ties keep the first station in feed order. `None`
/// is a normal outcome (empty or fully malformed feed), not an error.
pub fn nearest_station(coord: Coordinate, stations: &[StationRecord]) -> Option<NearestStation> {
    let mut best: Option<NearestStation> = None;

    for station in stations {
        let Some((lat, lon)) = station.position() else {
            continue;
        };
        let distance_km = geo::haversine_km(coord.lat, coord.lon, lat, lon);

        let closer = best
            .as_ref()
            .is_none_or(|current| distance_km < current.distance_km);
        if closer {
            best = Some(NearestStation {
                station: station.clone(),
                distance_km,
            });
        }
    }

    best
}

/// Run the strategy chain against the matched station.
pub fn reconcile(station: &StationRecord) -> Option<CloudCover> {
    STRATEGIES.iter().find_map(|strategy| strategy(station))
}

/// Fixed vocabulary of sky-condition phenomena. Precipitation and fog
/// labels deliberately map to `None`: they say nothing about cloud cover.
pub fn phenomenon_percent(label: &str) -> Option<u8> {
    match label.trim() {
        "Clear" => Some(0),
        "Few clouds" => Some(20),
        "Variable clouds" => Some(50),
        "Cloudy with clear spells" => Some(75),
        "Overcast" => Some(100),
        _ => None,
    }
}

fn from_cloudiness_scale(station: &StationRecord) -> Option<CloudCover> {
    let ball = station.cloudiness?;
    if ball > 8 {
        return None;
    }
    Some(CloudCover {
        percent: (f64::from(ball) / 8.0 * 100.0).round() as u8,
        signal: CloudSignal::CloudinessScale,
    })
}

fn from_phenomenon_label(station: &StationRecord) -> Option<CloudCover> {
    let percent = phenomenon_percent(station.phenomenon.as_deref()?)?;
    Some(CloudCover {
        percent,
        signal: CloudSignal::PhenomenonLabel,
    })
}

/// Run the full clouds-from-observations pipeline against an already
/// fetched feed: nearest match, strategy chain, optional fallback fetch,
/// and assembly of the provenance-carrying result.
pub async fn resolve(
    coord: Coordinate,
    feed: &ObservationFeed,
    fallback: &dyn CloudCoverSource,
    policy: CloudPolicy,
) -> CloudObservation {
    let mut time = feed.timestamp.and_then(epoch_to_rfc3339);
    let mut source = observations::SOURCE_LABEL.to_string();
    let mut percent: Option<u8> = None;

    let Some(nearest) = nearest_station(coord, &feed.stations) else {
        if policy.fallback_without_station {
            apply_fallback(coord, fallback, &mut percent, &mut time, &mut source).await;
        }
        return CloudObservation {
            time,
            source,
            station: None,
            phenomenon: None,
            cloudiness: None,
            cloud_cover_percent: percent,
            note: Some(NO_STATIONS_NOTE.to_string()),
        };
    };

    let station = nearest.station;
    match reconcile(&station) {
        Some(cover) => {
            percent = Some(cover.percent);
            source = format!("{source} • {}", cover.signal.label());
        }
        None => {
            apply_fallback(coord, fallback, &mut percent, &mut time, &mut source).await;
        }
    }

    CloudObservation {
        time,
        source,
        station: Some(MatchedStation {
            name: station.name.clone(),
            latitude: station.latitude,
            longitude: station.longitude,
            distance_km: geo::round_km(nearest.distance_km),
        }),
        phenomenon: station.phenomenon,
        cloudiness: station.cloudiness,
        cloud_cover_percent: percent,
        note: None,
    }
}

/// Consult the secondary provider for the originally requested coordinate.
/// On success the value and the provider's own timestamp are substituted;
/// on failure the percentage simply stays null.
async fn apply_fallback(
    coord: Coordinate,
    fallback: &dyn CloudCoverSource,
    percent: &mut Option<u8>,
    time: &mut Option<String>,
    source: &mut String,
) {
    match fallback.current_cloud_cover(coord).await {
        Ok(reading) => {
            if let Some(value) = reading.percent.filter(|v| v.is_finite()) {
                *percent = Some(value.round().clamp(0.0, 100.0) as u8);
                if let Some(t) = reading.time {
                    *time = Some(t);
                }
                source.push_str(" • ");
                source.push_str(CloudSignal::ForecastFallback.label());
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "cloud-cover fallback provider unavailable");
        }
    }
}

fn epoch_to_rfc3339(ts: i64) -> Option<String> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::SourceError,
        source::CurrentCloudCover,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn station(lat: f64, lon: f64) -> StationRecord {
        StationRecord {
            name: Some(format!("station {lat},{lon}")),
            latitude: Some(lat),
            longitude: Some(lon),
            ..Default::default()
        }
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn nearest_minimizes_haversine_distance() {
        let stations = vec![
            station(58.264, 26.461), // Tartu-Toravere
            station(59.398, 24.602), // Harku
            station(58.385, 24.485), // Parnu
        ];

        let hit = nearest_station(coord(59.43, 24.75), &stations).expect("match");
        assert_eq!(hit.station.name.as_deref(), Some("station 59.398,24.602"));

        // Property: no other usable station is strictly closer.
        for st in &stations {
            let (lat, lon) = st.position().unwrap();
            let d = geo::haversine_km(59.43, 24.75, lat, lon);
            assert!(d >= hit.distance_km);
        }
    }

    #[test]
    fn nearest_tie_break_keeps_first_in_feed_order() {
        let mut first = station(59.0, 24.0);
        first.name = Some("first".into());
        let mut twin = station(59.0, 24.0);
        twin.name = Some("twin".into());

        let hit = nearest_station(coord(59.43, 24.75), &[first, twin]).expect("match");
        assert_eq!(hit.station.name.as_deref(), Some("first"));
    }

    #[test]
    fn stations_without_position_never_match() {
        let unusable = StationRecord {
            name: Some("no coords".into()),
            ..Default::default()
        };
        assert_eq!(nearest_station(coord(59.0, 24.0), &[unusable]), None);
        assert_eq!(nearest_station(coord(59.0, 24.0), &[]), None);
    }

    #[test]
    fn cloudiness_scale_wins_over_phenomenon() {
        let st = StationRecord {
            cloudiness: Some(4),
            phenomenon: Some("Overcast".into()),
            ..Default::default()
        };

        let cover = reconcile(&st).expect("value");
        assert_eq!(cover.percent, 50);
        assert_eq!(cover.signal, CloudSignal::CloudinessScale);
    }

    #[test]
    fn cloudiness_scale_endpoints() {
        for (ball, expected) in [(0u8, 0u8), (1, 13), (4, 50), (7, 88), (8, 100)] {
            let st = StationRecord {
                cloudiness: Some(ball),
                ..Default::default()
            };
            assert_eq!(reconcile(&st).unwrap().percent, expected, "ball {ball}");
        }
    }

    #[test]
    fn out_of_range_scale_falls_through_to_phenomenon() {
        let st = StationRecord {
            cloudiness: Some(9),
            phenomenon: Some("Overcast".into()),
            ..Default::default()
        };

        let cover = reconcile(&st).expect("value");
        assert_eq!(cover.percent, 100);
        assert_eq!(cover.signal, CloudSignal::PhenomenonLabel);
    }

    #[test]
    fn phenomenon_vocabulary_is_exact() {
        assert_eq!(phenomenon_percent("Clear"), Some(0));
        assert_eq!(phenomenon_percent("Few clouds"), Some(20));
        assert_eq!(phenomenon_percent("Variable clouds"), Some(50));
        assert_eq!(phenomenon_percent("Cloudy with clear spells"), Some(75));
        assert_eq!(phenomenon_percent("Overcast"), Some(100));
        assert_eq!(phenomenon_percent("  Overcast  "), Some(100));

        // Precipitation and fog phenomena are not cloud information.
        assert_eq!(phenomenon_percent("Light rain"), None);
        assert_eq!(phenomenon_percent("Fog"), None);
        assert_eq!(phenomenon_percent(""), None);
    }

    #[test]
    fn no_signal_means_inconclusive() {
        assert_eq!(reconcile(&StationRecord::default()), None);
    }

    #[test]
    fn epoch_seconds_render_rfc3339_utc() {
        assert_eq!(
            epoch_to_rfc3339(1_756_456_800).as_deref(),
            Some("2025-08-29T08:40:00.000Z")
        );
    }

    /// Scriptable stand-in for the secondary provider, counting calls.
    #[derive(Debug)]
    struct FallbackStub {
        response: Result<CurrentCloudCover, ()>,
        calls: AtomicUsize,
    }

    impl FallbackStub {
        fn returning(percent: f64, time: &str) -> Self {
            Self {
                response: Ok(CurrentCloudCover {
                    time: Some(time.to_string()),
                    percent: Some(percent),
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn unavailable() -> Self {
            Self {
                response: Err(()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CloudCoverSource for FallbackStub {
        async fn current_cloud_cover(
            &self,
            _coord: Coordinate,
        ) -> Result<CurrentCloudCover, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(reading) => Ok(reading.clone()),
                Err(()) => Err(SourceError::UpstreamStatus {
                    provider: "Open-Meteo",
                    status: reqwest::StatusCode::BAD_GATEWAY,
                }),
            }
        }
    }

    fn feed_with(station: StationRecord) -> ObservationFeed {
        ObservationFeed {
            stations: vec![station],
            timestamp: Some(1_756_456_800),
        }
    }

    #[tokio::test]
    async fn reconciled_station_never_consults_fallback() {
        let fallback = FallbackStub::returning(37.0, "2026-08-29T14:00");
        let st = StationRecord {
            cloudiness: Some(4),
            ..station(59.4, 24.7)
        };

        let obs = resolve(
            coord(59.43, 24.75),
            &feed_with(st),
            &fallback,
            CloudPolicy::default(),
        )
        .await;

        assert_eq!(obs.cloud_cover_percent, Some(50));
        assert!(obs.source.contains("cloudiness-scale"));
        assert_eq!(fallback.calls(), 0);

        let matched = obs.station.expect("station");
        // Raw distance 4.374 km, rounded to one decimal for display.
        assert_eq!(matched.distance_km, 4.4);
        // Feed timestamp, not fallback time.
        assert_eq!(obs.time.as_deref(), Some("2025-08-29T08:40:00.000Z"));
    }

    #[tokio::test]
    async fn signal_free_station_substitutes_fallback_value_and_time() {
        let fallback = FallbackStub::returning(37.0, "2026-08-29T14:00");

        let obs = resolve(
            coord(59.43, 24.75),
            &feed_with(station(59.4, 24.7)),
            &fallback,
            CloudPolicy::default(),
        )
        .await;

        assert_eq!(obs.cloud_cover_percent, Some(37));
        assert!(obs.source.contains("Open-Meteo fallback"));
        assert_eq!(obs.time.as_deref(), Some("2026-08-29T14:00"));
        assert_eq!(fallback.calls(), 1);
        assert!(obs.station.is_some());
        assert_eq!(obs.note, None);
    }

    #[tokio::test]
    async fn fallback_failure_is_absorbed_into_null_value() {
        let fallback = FallbackStub::unavailable();

        let obs = resolve(
            coord(59.43, 24.75),
            &feed_with(station(59.4, 24.7)),
            &fallback,
            CloudPolicy::default(),
        )
        .await;

        assert_eq!(obs.cloud_cover_percent, None);
        assert!(!obs.source.contains("fallback"));
        assert!(obs.station.is_some());
    }

    #[tokio::test]
    async fn empty_feed_skips_fallback_by_default() {
        let fallback = FallbackStub::returning(37.0, "2026-08-29T14:00");
        let feed = ObservationFeed {
            stations: vec![StationRecord::default()],
            timestamp: None,
        };

        let obs = resolve(coord(59.43, 24.75), &feed, &fallback, CloudPolicy::default()).await;

        assert_eq!(obs.cloud_cover_percent, None);
        assert!(obs.station.is_none());
        assert_eq!(obs.note.as_deref(), Some(NO_STATIONS_NOTE));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn empty_feed_uses_fallback_when_policy_allows() {
        let fallback = FallbackStub::returning(62.0, "2026-08-29T14:00");
        let feed = ObservationFeed::default();
        let policy = CloudPolicy {
            fallback_without_station: true,
        };

        let obs = resolve(coord(59.43, 24.75), &feed, &fallback, policy).await;

        assert_eq!(obs.cloud_cover_percent, Some(62));
        assert!(obs.source.contains("Open-Meteo fallback"));
        // The degraded-feed note survives even with a substituted value.
        assert_eq!(obs.note.as_deref(), Some(NO_STATIONS_NOTE));
        assert_eq!(fallback.calls(), 1);
    }
}
