use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::clock::{self, TimeFields};
use crate::error::AppError;
use crate::routes::extract_client_addr;
use crate::AppState;

#[derive(Deserialize)]
pub struct TimeQuery {
    /// Explicit IANA zone; skips the geo lookup when given.
    pub tz: Option<String>,
}

pub async fn current_time(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: ConnectInfo<SocketAddr>,
    Query(query): Query<TimeQuery>,
) -> Result<Json<TimeFields>, AppError> {
    let addr = extract_client_addr(&headers, &connect_info, state.config.trust_cf_connecting_ip);

    let requested = query.tz.as_deref().map(str::trim).filter(|z| !z.is_empty());
    let fields = if let Some(zone) = requested {
        tracing::info!(%addr, zone, "time request with explicit zone");
        clock::local_time(zone, Utc::now()).map_err(|e| AppError::BadRequest(e.to_string()))?
    } else {
        let geo = state.geo.resolve(&addr).await;
        if geo.is_empty() {
            tracing::debug!(%addr, "no geo info, using UTC");
        }
        let zone = geo.time_zone_or_default();
        tracing::info!(%addr, zone, "time request");
        clock::local_time(zone, Utc::now()).map_err(|e| AppError::InvalidTimeZone(e.0))?
    };

    Ok(Json(fields))
}
