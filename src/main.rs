use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod clock;
mod config;
mod error;
mod geoip;
mod routes;
mod upstream;
mod weather;

use geoip::GeoResolver;
use weather::WeatherResolver;

#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub geo: Arc<dyn GeoResolver>,
    pub weather: Arc<dyn WeatherResolver>,
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/1/time", get(routes::time::current_time))
        .route("/api/1/weather", get(routes::weather::current_weather))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET]),
        );

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::AppConfig::from_env().expect("Failed to load config");

    let geo: Arc<dyn GeoResolver> = Arc::new(
        geoip::FreeGeoIpResolver::new(config.geoip_base_url.clone(), config.upstream_timeout())
            .expect("Failed to create geo client"),
    );
    let weather: Arc<dyn WeatherResolver> = Arc::new(
        weather::MetaWeatherResolver::new(
            config.weather_base_url.clone(),
            config.upstream_timeout(),
        )
        .expect("Failed to create weather client"),
    );

    let state = AppState {
        config: config.clone(),
        geo,
        weather,
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install signal handler");
    tracing::info!("Shutting down...");
}
