//! Client for NOAA SWPC space-weather products: the planetary K-index
//! table and the OVATION aurora-probability grid.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{error::SourceError, model::Coordinate};

pub const KP_URL: &str = "https://services.swpc.noaa.gov/products/noaa-planetary-k-index.json";
pub const OVATION_URL: &str = "https://services.swpc.noaa.gov/json/ovation_aurora_latest.json";

const SOURCE: &str = "NOAA SWPC";

/// Most recent row of the K-index table. The upstream reports values as
/// strings; they are passed through unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpReading {
    pub time: Option<Value>,
    pub kp: Option<Value>,
}

/// OVATION grid cell matched to a request coordinate.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct GridCell {
    #[serde(rename = "gridLon")]
    pub lon: f64,
    #[serde(rename = "gridLat")]
    pub lat: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuroraProbability {
    pub matched: Option<GridCell>,
    pub percent: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SwpcClient {
    http: Client,
    kp_url: String,
    ovation_url: String,
}

impl SwpcClient {
    pub fn new(http: Client, kp_url: impl Into<String>, ovation_url: impl Into<String>) -> Self {
        Self {
            http,
            kp_url: kp_url.into(),
            ovation_url: ovation_url.into(),
        }
    }

    /// Latest planetary K-index. The product is tabular JSON: a header row
    /// of column names followed by data rows.
    pub async fn latest_kp(&self) -> Result<KpReading, SourceError> {
        let body = self.get_text(&self.kp_url).await?;
        let table: Vec<Vec<Value>> = serde_json::from_str(&body)
            .map_err(|e| SourceError::document(SOURCE, e.to_string()))?;
        parse_kp_table(&table)
    }

    /// Aurora probability at the OVATION grid cell covering the coordinate.
    pub async fn aurora_probability(
        &self,
        coord: Coordinate,
    ) -> Result<AuroraProbability, SourceError> {
        let body = self.get_text(&self.ovation_url).await?;
        let doc: OvationDoc = serde_json::from_str(&body)
            .map_err(|e| SourceError::document(SOURCE, e.to_string()))?;
        Ok(match_grid(&doc.coordinates, coord))
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let res = self.http.get(url).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(SourceError::UpstreamStatus {
                provider: SOURCE,
                status,
            });
        }

        Ok(res.text().await?)
    }
}

fn parse_kp_table(table: &[Vec<Value>]) -> Result<KpReading, SourceError> {
    let Some((header, rows)) = table.split_first() else {
        return Err(SourceError::document(SOURCE, "K-index table is empty"));
    };

    let column = |name: &str| header.iter().position(|v| v.as_str() == Some(name));
    let time_idx = column("time_tag");
    let kp_idx = column("Kp");

    let Some(last) = rows.last() else {
        return Ok(KpReading::default());
    };

    let cell = |idx: Option<usize>| idx.and_then(|i| last.get(i)).cloned().filter(|v| !v.is_null());

    Ok(KpReading {
        time: cell(time_idx),
        kp: cell(kp_idx),
    })
}

/// OVATION reports cells as `[lon(0..360), lat, probability]`. The request
/// longitude is normalized into [0,360) and both axes are matched on the
/// rounded degree; first matching cell wins.
fn match_grid(coordinates: &[[f64; 3]], coord: Coordinate) -> AuroraProbability {
    let lon_key = (coord.lon.rem_euclid(360.0)).round();
    let lat_key = coord.lat.round();

    for cell in coordinates {
        if cell[0].round() == lon_key && cell[1].round() == lat_key {
            return AuroraProbability {
                matched: Some(GridCell {
                    lon: cell[0],
                    lat: cell[1],
                }),
                percent: Some(cell[2]),
            };
        }
    }

    AuroraProbability::default()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OvationDoc {
    coordinates: Vec<[f64; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(rows: serde_json::Value) -> Vec<Vec<Value>> {
        serde_json::from_value(rows).expect("table fixture")
    }

    #[test]
    fn kp_takes_last_row_by_header_position() {
        let table = table(json!([
            ["time_tag", "Kp", "a_running", "station_count"],
            ["2026-08-29 09:00:00.000", "2.33", "9", "8"],
            ["2026-08-29 12:00:00.000", "3.67", "18", "8"]
        ]));

        let reading = parse_kp_table(&table).expect("reading");
        assert_eq!(reading.time, Some(json!("2026-08-29 12:00:00.000")));
        assert_eq!(reading.kp, Some(json!("3.67")));
    }

    #[test]
    fn kp_missing_column_yields_null_value() {
        let table = table(json!([
            ["time_tag", "a_running"],
            ["2026-08-29 12:00:00.000", "18"]
        ]));

        let reading = parse_kp_table(&table).expect("reading");
        assert_eq!(reading.time, Some(json!("2026-08-29 12:00:00.000")));
        assert_eq!(reading.kp, None);
    }

    #[test]
    fn kp_header_only_table_yields_empty_reading() {
        let table = table(json!([["time_tag", "Kp"]]));
        let reading = parse_kp_table(&table).expect("reading");
        assert_eq!(reading, KpReading::default());
    }

    #[test]
    fn kp_empty_table_is_a_document_error() {
        assert!(parse_kp_table(&[]).is_err());
    }

    #[test]
    fn grid_matches_on_rounded_degree() {
        let cells = [[24.0, 59.0, 7.0], [25.0, 59.0, 9.0]];
        let coord = Coordinate::new(59.43, 24.75).unwrap();

        // 24.75 rounds to 25.
        let hit = match_grid(&cells, coord);
        assert_eq!(hit.percent, Some(9.0));
        assert_eq!(hit.matched, Some(GridCell { lon: 25.0, lat: 59.0 }));
    }

    #[test]
    fn grid_normalizes_negative_longitude() {
        let cells = [[336.0, 59.0, 4.0]];
        let coord = Coordinate::new(59.0, -24.0).unwrap();

        let hit = match_grid(&cells, coord);
        assert_eq!(hit.percent, Some(4.0));
    }

    #[test]
    fn grid_miss_yields_empty_probability() {
        let cells = [[10.0, 10.0, 1.0]];
        let coord = Coordinate::new(59.0, 24.0).unwrap();

        let hit = match_grid(&cells, coord);
        assert_eq!(hit.matched, None);
        assert_eq!(hit.percent, None);
    }
}
