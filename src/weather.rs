use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::upstream::{self, UpstreamError};

#[async_trait]
pub trait WeatherResolver: Send + Sync {
    /// Current conditions near the given coordinates, `{}` on any failure.
    async fn resolve(&self, latitude: f64, longitude: f64) -> WeatherInfo;
}

/// Current conditions merged with station metadata. Serializes as a plain JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherInfo(pub Map<String, Value>);

impl WeatherInfo {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct StationSearchResult {
    #[serde(default)]
    woeid: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StationDetail {
    #[serde(default)]
    woeid: Option<Value>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    latt_long: Option<Value>,
    #[serde(default)]
    sun_rise: Option<Value>,
    #[serde(default)]
    sun_set: Option<Value>,
    #[serde(default)]
    consolidated_weather: Option<Vec<Map<String, Value>>>,
}

impl StationDetail {
    /// First consolidated record with the station metadata folded in.
    /// An empty first record counts as no record.
    fn into_weather_info(self) -> Option<WeatherInfo> {
        let mut current = self
            .consolidated_weather?
            .into_iter()
            .next()
            .filter(|record| !record.is_empty())?;

        let or_blank = |v: Option<Value>| v.unwrap_or_else(|| Value::String(String::new()));
        current.insert("woeid".to_string(), or_blank(self.woeid));
        current.insert("city".to_string(), or_blank(self.title));
        current.insert("latt_long".to_string(), or_blank(self.latt_long));
        current.insert("sun_rise".to_string(), or_blank(self.sun_rise));
        current.insert("sun_set".to_string(), or_blank(self.sun_set));

        Some(WeatherInfo(current))
    }
}

/// Station ids come back as numbers, but a string id is used as-is.
fn station_path_segment(woeid: &Value) -> String {
    match woeid {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// --- metaweather implementation ---

pub struct MetaWeatherResolver {
    base_url: String,
    client: reqwest::Client,
}

impl MetaWeatherResolver {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url,
            client: upstream::build_client(timeout)?,
        })
    }

    async fn search_station(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Value>, UpstreamError> {
        // Comma kept literal; coordinates always carry a fractional part ("-74.0").
        let url = format!(
            "{}/api/location/search?lattlong={latitude:?},{longitude:?}",
            self.base_url
        );
        let results: Vec<StationSearchResult> =
            upstream::fetch_json(&self.client, &url, &[] as &[(&str, &str)]).await?;

        Ok(results.into_iter().next().and_then(|r| r.woeid))
    }

    async fn station_detail(&self, woeid: &Value) -> Result<StationDetail, UpstreamError> {
        let url = format!(
            "{}/api/location/{}",
            self.base_url,
            station_path_segment(woeid)
        );
        upstream::fetch_json(&self.client, &url, &[] as &[(&str, &str)]).await
    }

    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<WeatherInfo, UpstreamError> {
        let Some(woeid) = self.search_station(latitude, longitude).await? else {
            tracing::debug!("No weather station near {latitude},{longitude}");
            return Ok(WeatherInfo::default());
        };

        let detail = self.station_detail(&woeid).await?;
        Ok(detail.into_weather_info().unwrap_or_else(|| {
            tracing::debug!("Station {woeid} has no consolidated weather");
            WeatherInfo::default()
        }))
    }
}

#[async_trait]
impl WeatherResolver for MetaWeatherResolver {
    async fn resolve(&self, latitude: f64, longitude: f64) -> WeatherInfo {
        match self.lookup(latitude, longitude).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Weather lookup for {latitude},{longitude} failed: {e}");
                WeatherInfo::default()
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Clone, Default)]
    pub struct MockWeatherResolver {
        pub info: WeatherInfo,
        pub calls: Arc<Mutex<Vec<(f64, f64)>>>,
    }

    #[async_trait]
    impl WeatherResolver for MockWeatherResolver {
        async fn resolve(&self, latitude: f64, longitude: f64) -> WeatherInfo {
            self.calls.lock().unwrap().push((latitude, longitude));
            self.info.clone()
        }
    }

    pub fn station_detail_json() -> Value {
        serde_json::json!({
            "woeid": 2_459_115,
            "title": "New York",
            "latt_long": "40.71455,-74.007118",
            "sun_rise": "2021-03-01T06:33:38.012305-05:00",
            "sun_set": "2021-03-01T17:51:12.438547-05:00",
            "timezone": "US/Eastern",
            "consolidated_weather": [
                {
                    "id": 1,
                    "weather_state_name": "Light Cloud",
                    "weather_state_abbr": "lc",
                    "the_temp": 3.5,
                    "humidity": 55
                },
                {
                    "id": 2,
                    "weather_state_name": "Heavy Rain",
                    "the_temp": 7.1
                }
            ]
        })
    }

    async fn mount_search(server: &MockServer, body: Value) {
        Mock::given(method("GET"))
            .and(path("/api/location/search"))
            .and(query_param("lattlong", "40.7,-74.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn resolver(server: &MockServer) -> MetaWeatherResolver {
        MetaWeatherResolver::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_station_path_segment() {
        assert_eq!(station_path_segment(&serde_json::json!(2_459_115)), "2459115");
        assert_eq!(station_path_segment(&serde_json::json!("44418")), "44418");
    }

    #[test]
    fn test_merge_uses_first_record_and_blank_defaults() {
        let detail: StationDetail = serde_json::from_value(serde_json::json!({
            "consolidated_weather": [{ "the_temp": 1.0 }, { "the_temp": 2.0 }]
        }))
        .unwrap();

        let info = detail.into_weather_info().unwrap();
        assert_eq!(info.0.get("the_temp"), Some(&serde_json::json!(1.0)));
        assert_eq!(info.0.get("woeid"), Some(&serde_json::json!("")));
        assert_eq!(info.0.get("city"), Some(&serde_json::json!("")));
        assert_eq!(info.0.get("sun_set"), Some(&serde_json::json!("")));
    }

    #[test]
    fn test_merge_without_records() {
        let detail: StationDetail =
            serde_json::from_value(serde_json::json!({ "consolidated_weather": [] })).unwrap();
        assert!(detail.into_weather_info().is_none());

        let detail: StationDetail = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(detail.into_weather_info().is_none());

        let detail: StationDetail = serde_json::from_value(serde_json::json!({
            "woeid": 1,
            "title": "X",
            "consolidated_weather": [{}]
        }))
        .unwrap();
        assert!(detail.into_weather_info().is_none());
    }

    #[tokio::test]
    async fn test_resolve_empty_first_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/location/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "woeid": 1 }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/location/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "woeid": 1,
                "title": "X",
                "consolidated_weather": [{}]
            })))
            .mount(&server)
            .await;

        let info = resolver(&server).resolve(0.0, 0.0).await;
        assert!(info.is_empty());
    }

    #[tokio::test]
    async fn test_search_sends_literal_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/location/search"))
            .and(|req: &wiremock::Request| req.url.query() == Some("lattlong=40.7,-74.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/location/search"))
            .and(|req: &wiremock::Request| req.url.query() == Some("lattlong=0.0,0.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(&server);
        resolver.resolve(40.7, -74.0).await;
        resolver.resolve(0.0, 0.0).await;
    }

    #[tokio::test]
    async fn test_resolve_full_chain() {
        let server = MockServer::start().await;
        mount_search(&server, serde_json::json!([{ "woeid": 2_459_115 }, { "woeid": 1 }])).await;
        Mock::given(method("GET"))
            .and(path("/api/location/2459115"))
            .respond_with(ResponseTemplate::new(200).set_body_json(station_detail_json()))
            .expect(1)
            .mount(&server)
            .await;

        let info = resolver(&server).resolve(40.7, -74.0).await;

        assert_eq!(info.0.get("weather_state_name"), Some(&serde_json::json!("Light Cloud")));
        assert_eq!(info.0.get("the_temp"), Some(&serde_json::json!(3.5)));
        assert_eq!(info.0.get("woeid"), Some(&serde_json::json!(2_459_115)));
        assert_eq!(info.0.get("city"), Some(&serde_json::json!("New York")));
        assert_eq!(
            info.0.get("latt_long"),
            Some(&serde_json::json!("40.71455,-74.007118"))
        );
        assert!(info.0.get("sun_rise").is_some());
        assert!(info.0.get("sun_set").is_some());
        assert!(info.0.get("timezone").is_none());
    }

    #[tokio::test]
    async fn test_resolve_empty_search() {
        let server = MockServer::start().await;
        mount_search(&server, serde_json::json!([])).await;

        let info = resolver(&server).resolve(40.7, -74.0).await;
        assert!(info.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_search_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/location/search"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let info = resolver(&server).resolve(40.7, -74.0).await;
        assert!(info.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_detail_failure() {
        let server = MockServer::start().await;
        mount_search(&server, serde_json::json!([{ "woeid": 2_459_115 }])).await;
        Mock::given(method("GET"))
            .and(path("/api/location/2459115"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let info = resolver(&server).resolve(40.7, -74.0).await;
        assert!(info.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_detail_without_weather() {
        let server = MockServer::start().await;
        mount_search(&server, serde_json::json!([{ "woeid": 2_459_115 }])).await;
        Mock::given(method("GET"))
            .and(path("/api/location/2459115"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "New York",
                "consolidated_weather": []
            })))
            .mount(&server)
            .await;

        let info = resolver(&server).resolve(40.7, -74.0).await;
        assert!(info.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_search_result_without_id() {
        let server = MockServer::start().await;
        mount_search(&server, serde_json::json!([{ "title": "Nowhere" }])).await;

        let info = resolver(&server).resolve(40.7, -74.0).await;
        assert!(info.is_empty());
    }

    #[test]
    fn test_weather_info_serializes_as_object() {
        let mut map = Map::new();
        map.insert("city".to_string(), Value::from("Kyiv"));
        let json = serde_json::to_value(WeatherInfo(map)).unwrap();
        assert_eq!(json, serde_json::json!({ "city": "Kyiv" }));
        assert_eq!(
            serde_json::to_string(&WeatherInfo::default()).unwrap(),
            "{}"
        );
    }
}
