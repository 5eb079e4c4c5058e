//! Router assembly and the handlers for every `/api/*` endpoint.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use skywatch_core::{
    CloudPolicy, Config, Coordinate, clouds,
    source::CloudCoverSource,
    model::MatchedStation,
    source::{
        self,
        geocode::{GeocodeClient, Place},
        observations::ObservationsClient,
        open_meteo::{ForecastClient, OutlookHour},
        swpc::{GridCell, SwpcClient},
    },
};

use crate::error::ApiError;

/// Hour-window bounds for the cloud outlook endpoint.
const OUTLOOK_DEFAULT_HOURS: i64 = 12;
const OUTLOOK_MAX_HOURS: i64 = 48;

/// Per-request handler context. Clients are cheap clones over one shared
/// HTTP connection pool; no state survives a request.
#[derive(Clone)]
pub struct AppState {
    observations: ObservationsClient,
    forecast: ForecastClient,
    geocode: GeocodeClient,
    swpc: SwpcClient,
    clouds: CloudPolicy,
}

/// Build the full application router from configuration.
pub fn build(config: &Config) -> anyhow::Result<Router> {
    let http = source::http_client()?;
    let urls = &config.sources;

    let state = AppState {
        observations: ObservationsClient::new(http.clone(), urls.observations.clone()),
        forecast: ForecastClient::new(http.clone(), urls.forecast.clone()),
        geocode: GeocodeClient::new(http.clone(), urls.geocode.clone()),
        swpc: SwpcClient::new(http, urls.kp.clone(), urls.ovation.clone()),
        clouds: config.clouds,
    };

    Ok(router(state))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/kp", get(kp))
        .route("/api/geocode", get(geocode))
        .route("/api/aurora", get(aurora))
        .route("/api/clouds", get(clouds_current))
        .route("/api/clouds_next", get(clouds_next))
        .route("/api/temp", get(temperature))
        .route("/api/precip", get(precipitation))
        .route("/api/clouds_obs", get(clouds_obs))
        .with_state(state)
}

/// Raw coordinate query input. Kept as strings so absent, non-numeric and
/// non-finite values all produce the same client error instead of a framework
/// rejection.
#[derive(Debug, Deserialize)]
struct CoordQuery {
    lat: Option<String>,
    lon: Option<String>,
}

fn parse_coord(query: &CoordQuery) -> Result<Coordinate, ApiError> {
    let number = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<f64>().ok());

    match (number(&query.lat), number(&query.lon)) {
        (Some(lat), Some(lon)) => Ok(Coordinate::new(lat, lon)?),
        _ => Err(ApiError::BadRequest(
            "expected ?lat=<number>&lon=<number>".to_string(),
        )),
    }
}

#[derive(Serialize)]
struct KpResponse {
    #[serde(rename = "lastTime")]
    last_time: Option<Value>,
    #[serde(rename = "lastKp")]
    last_kp: Option<Value>,
}

async fn kp(State(state): State<AppState>) -> Result<Json<KpResponse>, ApiError> {
    let reading = state.swpc.latest_kp().await?;
    Ok(Json(KpResponse {
        last_time: reading.time,
        last_kp: reading.kp,
    }))
}

#[derive(Debug, Deserialize)]
struct GeocodeQuery {
    name: Option<String>,
}

#[derive(Serialize)]
struct GeocodeResponse {
    query: String,
    results: Vec<Place>,
}

async fn geocode(
    State(state): State<AppState>,
    Query(query): Query<GeocodeQuery>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    let name = query.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::BadRequest("expected ?name=<place>".to_string()));
    }

    let results = state.geocode.search(name).await?;
    Ok(Json(GeocodeResponse {
        query: name.to_string(),
        results,
    }))
}

#[derive(Serialize)]
struct AuroraResponse {
    request: Coordinate,
    matched: Option<GridCell>,
    #[serde(rename = "auroraProbPercent")]
    aurora_prob_percent: Option<f64>,
}

async fn aurora(
    State(state): State<AppState>,
    Query(query): Query<CoordQuery>,
) -> Result<Json<AuroraResponse>, ApiError> {
    let coord = parse_coord(&query)?;
    let probability = state.swpc.aurora_probability(coord).await?;

    Ok(Json(AuroraResponse {
        request: coord,
        matched: probability.matched,
        aurora_prob_percent: probability.percent,
    }))
}

#[derive(Serialize)]
struct CloudsResponse {
    request: Coordinate,
    time: Option<String>,
    #[serde(rename = "cloudCoverPercent")]
    cloud_cover_percent: Option<f64>,
}

async fn clouds_current(
    State(state): State<AppState>,
    Query(query): Query<CoordQuery>,
) -> Result<Json<CloudsResponse>, ApiError> {
    let coord = parse_coord(&query)?;
    let reading = state.forecast.current_cloud_cover(coord).await?;

    Ok(Json(CloudsResponse {
        request: coord,
        time: reading.time,
        cloud_cover_percent: reading.percent,
    }))
}

#[derive(Serialize)]
struct TemperatureResponse {
    request: Coordinate,
    time: Option<String>,
    #[serde(rename = "temperatureC")]
    temperature_c: Option<f64>,
}

async fn temperature(
    State(state): State<AppState>,
    Query(query): Query<CoordQuery>,
) -> Result<Json<TemperatureResponse>, ApiError> {
    let coord = parse_coord(&query)?;
    let reading = state.forecast.current_temperature(coord).await?;

    Ok(Json(TemperatureResponse {
        request: coord,
        time: reading.time,
        temperature_c: reading.value,
    }))
}

#[derive(Serialize)]
struct PrecipitationResponse {
    request: Coordinate,
    time: Option<String>,
    #[serde(rename = "precipitationMm")]
    precipitation_mm: Option<f64>,
}

async fn precipitation(
    State(state): State<AppState>,
    Query(query): Query<CoordQuery>,
) -> Result<Json<PrecipitationResponse>, ApiError> {
    let coord = parse_coord(&query)?;
    let reading = state.forecast.current_precipitation(coord).await?;

    Ok(Json(PrecipitationResponse {
        request: coord,
        time: reading.time,
        precipitation_mm: reading.value,
    }))
}

#[derive(Debug, Deserialize)]
struct OutlookQuery {
    lat: Option<String>,
    lon: Option<String>,
    hours: Option<String>,
}

#[derive(Serialize)]
struct OutlookRequestEcho {
    lat: f64,
    lon: f64,
    hours: i64,
}

#[derive(Serialize)]
struct OutlookResponse {
    request: OutlookRequestEcho,
    items: Vec<OutlookHour>,
}

async fn clouds_next(
    State(state): State<AppState>,
    Query(query): Query<OutlookQuery>,
) -> Result<Json<OutlookResponse>, ApiError> {
    let coord = parse_coord(&CoordQuery {
        lat: query.lat,
        lon: query.lon,
    })?;

    let hours = query
        .hours
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(OUTLOOK_DEFAULT_HOURS)
        .clamp(1, OUTLOOK_MAX_HOURS);

    let items = state.forecast.hourly_outlook(coord, hours as usize).await?;

    Ok(Json(OutlookResponse {
        request: OutlookRequestEcho {
            lat: coord.lat,
            lon: coord.lon,
            hours,
        },
        items,
    }))
}

#[derive(Serialize)]
struct CloudsObsResponse {
    request: Coordinate,
    time: Option<String>,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    station: Option<MatchedStation>,
    phenomenon: Option<String>,
    #[serde(rename = "cloudinessBall")]
    cloudiness_ball: Option<u8>,
    #[serde(rename = "cloudCoverPercent")]
    cloud_cover_percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

/// Current cloud cover from ground observations: nearest-station match over
/// the national feed, reconciled through the cloudiness-scale/phenomenon
/// precedence chain, with the forecast provider as last resort.
async fn clouds_obs(
    State(state): State<AppState>,
    Query(query): Query<CoordQuery>,
) -> Result<Json<CloudsObsResponse>, ApiError> {
    let coord = parse_coord(&query)?;

    // Feed transport/decoding failures are the only fatal conditions past
    // validation; everything downstream degrades to explicit nulls.
    let feed = state.observations.fetch().await?;
    let obs = clouds::resolve(coord, &feed, &state.forecast, state.clouds).await;

    Ok(Json(CloudsObsResponse {
        request: coord,
        time: obs.time,
        source: obs.source,
        station: obs.station,
        phenomenon: obs.phenomenon,
        cloudiness_ball: obs.cloudiness,
        cloud_cover_percent: obs.cloud_cover_percent,
        note: obs.note,
    }))
}
