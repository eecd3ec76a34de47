use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::routes::extract_client_addr;
use crate::weather::WeatherInfo;
use crate::AppState;

/// Weather near the caller. An empty object is a normal answer, not an error.
pub async fn current_weather(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: ConnectInfo<SocketAddr>,
) -> Json<WeatherInfo> {
    let addr = extract_client_addr(&headers, &connect_info, state.config.trust_cf_connecting_ip);

    let geo = state.geo.resolve(&addr).await;
    let (latitude, longitude) = (geo.latitude_or_default(), geo.longitude_or_default());

    let info = state.weather.resolve(latitude, longitude).await;
    tracing::info!(
        %addr,
        latitude,
        longitude,
        found = !info.is_empty(),
        "weather request"
    );

    Json(info)
}
