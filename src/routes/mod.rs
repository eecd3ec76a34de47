use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

pub mod time;
pub mod weather;

const FORWARDED_FOR: &str = "x-forwarded-for";
const CF_CONNECTING_IP: &str = "cf-connecting-ip";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Extract the client address from `X-Forwarded-For`, falling back to `ConnectInfo`.
///
/// The header value is not validated; whatever the first hop claims is passed on.
/// With `trust_cf_connecting_ip`, `CF-Connecting-IP` wins over both.
pub(crate) fn extract_client_addr(
    headers: &HeaderMap,
    connect_info: &ConnectInfo<SocketAddr>,
    trust_cf_connecting_ip: bool,
) -> String {
    if trust_cf_connecting_ip {
        if let Some(value) = header_str(headers, CF_CONNECTING_IP) {
            return value.trim().to_string();
        }
    }

    if let Some(value) = header_str(headers, FORWARDED_FOR) {
        if let Some(first) = value.split(',').next() {
            return first.trim().to_string();
        }
    }

    connect_info.0.ip().to_string()
}
