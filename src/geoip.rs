use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::upstream::{self, UpstreamError};

pub const DEFAULT_TIME_ZONE: &str = "UTC";

#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Look up `addr`. Never fails: any upstream problem yields `GeoInfo::default()`.
    async fn resolve(&self, addr: &str) -> GeoInfo;
}

/// Location record returned by the IP-geolocation service.
///
/// Only the fields the gateway consumes are typed; everything else the
/// service sends is kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub latitude: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub longitude: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_zone: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A field of the wrong type reads as missing instead of failing the whole record.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl GeoInfo {
    pub fn latitude_or_default(&self) -> f64 {
        self.latitude.unwrap_or(0.0)
    }

    pub fn longitude_or_default(&self) -> f64 {
        self.longitude.unwrap_or(0.0)
    }

    /// IANA zone name, `UTC` when missing or blank.
    pub fn time_zone_or_default(&self) -> &str {
        self.time_zone
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .unwrap_or(DEFAULT_TIME_ZONE)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// --- freegeoip implementation ---

pub struct FreeGeoIpResolver {
    base_url: String,
    client: reqwest::Client,
}

impl FreeGeoIpResolver {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url,
            client: upstream::build_client(timeout)?,
        })
    }

    async fn lookup(&self, addr: &str) -> Result<GeoInfo, UpstreamError> {
        let url = format!("{}/json/{addr}", self.base_url);
        upstream::fetch_json(&self.client, &url, &[] as &[(&str, &str)]).await
    }
}

#[async_trait]
impl GeoResolver for FreeGeoIpResolver {
    async fn resolve(&self, addr: &str) -> GeoInfo {
        // `/json/` alone would describe the gateway's own address.
        if addr.trim().is_empty() {
            tracing::warn!("Empty client address, skipping geo lookup");
            return GeoInfo::default();
        }

        match self.lookup(addr).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Geo lookup for {addr:?} failed: {e}");
                GeoInfo::default()
            }
        }
    }
}
