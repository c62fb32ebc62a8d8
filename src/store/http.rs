use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{Category, ConfigFieldSet, ProviderOrder, ProviderRecord};
use crate::store::SourceStore;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub struct HttpSourceStore {
    client: Client,
    base: Url,
    prefix: Vec<String>,
}

impl HttpSourceStore {
    pub fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_seconds))
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()?;
        let base = Url::parse(&cfg.api_base_url)?;
        if base.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "API base URL '{}' cannot carry a path.",
                cfg.api_base_url
            )));
        }
        let prefix = cfg
            .api_prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();
        Ok(Self {
            client,
            base,
            prefix,
        })
    }

    /// Appends percent-encoded segments after the configured prefix.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| AppError::Config("API base URL cannot carry a path.".into()))?;
            path.pop_if_empty();
            path.extend(self.prefix.iter().map(String::as_str));
            path.extend(segments);
        }
        Ok(url)
    }

    fn list_endpoint(&self, category: Category) -> Result<Url, AppError> {
        let Some(segment) = category.path_segment() else {
            return Err(AppError::Config(format!(
                "The {category} source list is not served by the API."
            )));
        };
        self.endpoint(&[segment])
    }

    fn config_endpoint(&self, provider: &str) -> Result<Url, AppError> {
        let segment = Category::Danmaku.path_segment().unwrap_or("scrapers");
        self.endpoint(&[segment, provider, "config"])
    }

    async fn check(response: Response) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        warn!(status = status.as_u16(), %message, "backing store rejected request");
        Err(AppError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pulls a human-readable message out of an error body (`detail` or `message`).
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };
    for key in ["detail", "message", "error"] {
        match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Null) | None => continue,
            Some(other) => return Some(other.to_string()),
        }
    }
    None
}

/// Converts a config payload into field values; nulls are treated as absent.
fn config_from_value(value: Value) -> Result<ConfigFieldSet, AppError> {
    let Value::Object(map) = value else {
        return Err(AppError::Config(
            "Provider config response was not a JSON object.".into(),
        ));
    };
    let mut out = ConfigFieldSet::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::String(s) => {
                out.insert(key, s);
            }
            other => {
                out.insert(key, other.to_string());
            }
        }
    }
    Ok(out)
}

#[async_trait]
impl SourceStore for HttpSourceStore {
    async fn list(&self, category: Category) -> Result<Vec<ProviderRecord>, AppError> {
        let url = self.list_endpoint(category)?;
        debug!(%url, "fetching source list");
        let response = Self::check(self.client.get(url).send().await?).await?;
        let mut records: Vec<ProviderRecord> = response.json().await?;
        for (idx, record) in records.iter_mut().enumerate() {
            record.order = idx as u32 + 1;
        }
        Ok(records)
    }

    async fn save(&self, category: Category, entries: &[ProviderOrder]) -> Result<(), AppError> {
        let url = self.list_endpoint(category)?;
        debug!(%url, count = entries.len(), "saving source list");
        Self::check(self.client.put(url).json(entries).send().await?).await?;
        Ok(())
    }

    async fn get_config(&self, provider: &str) -> Result<ConfigFieldSet, AppError> {
        let url = self.config_endpoint(provider)?;
        debug!(%url, "fetching provider config");
        let response = Self::check(self.client.get(url).send().await?).await?;
        config_from_value(response.json().await?)
    }

    async fn set_config(&self, provider: &str, values: &ConfigFieldSet) -> Result<(), AppError> {
        let url = self.config_endpoint(provider)?;
        debug!(%url, fields = values.len(), "saving provider config");
        Self::check(self.client.put(url).json(values).send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(uri: &str) -> HttpSourceStore {
        let cfg = AppConfig {
            api_base_url: uri.to_string(),
            ..AppConfig::default()
        };
        HttpSourceStore::new(&cfg).expect("store should build")
    }

    #[test]
    fn endpoint_percent_encodes_provider_segments() {
        let store = store_for("http://localhost:7768/root/");
        let url = store.config_endpoint("a b/c").expect("endpoint");
        assert_eq!(
            url.as_str(),
            "http://localhost:7768/root/api/ui/scrapers/a%20b%2Fc/config"
        );
    }

    #[test]
    fn metadata_category_has_no_endpoint() {
        let store = store_for("http://localhost:7768");
        let err = store
            .list_endpoint(Category::Metadata)
            .expect_err("metadata is not served");
        assert!(err.to_string().contains("not served"));
    }

    #[test]
    fn error_message_prefers_detail_then_message() {
        assert_eq!(
            error_message(r#"{"detail":"provider not found"}"#).as_deref(),
            Some("provider not found")
        );
        assert_eq!(
            error_message(r#"{"message":"bad body"}"#).as_deref(),
            Some("bad body")
        );
        assert_eq!(error_message("upstream down").as_deref(), Some("upstream down"));
        assert_eq!(error_message("  "), None);
    }

    #[test]
    fn config_from_value_stringifies_scalars_and_skips_nulls() {
        let values = config_from_value(json!({ "cookie": "abc", "retries": 3, "ua": null }))
            .expect("config should parse");
        assert_eq!(values.get("cookie").map(String::as_str), Some("abc"));
        assert_eq!(values.get("retries").map(String::as_str), Some("3"));
        assert!(!values.contains_key("ua"));
        assert!(config_from_value(json!(["nope"])).is_err());
    }

    #[tokio::test]
    async fn list_reads_records_and_renumbers_from_position() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ui/scrapers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "provider_name": "bilibili", "is_enabled": true, "display_order": 7 },
                { "provider_name": "gamer", "is_enabled": false, "display_order": 2,
                  "configurable_fields": { "cookie": "Cookie" } }
            ])))
            .mount(&server)
            .await;

        let records = store_for(&server.uri())
            .list(Category::Danmaku)
            .await
            .expect("list should succeed");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "bilibili");
        assert_eq!(records[0].order, 1);
        assert_eq!(records[1].order, 2);
        assert!(records[1].is_configurable());
    }

    #[tokio::test]
    async fn list_keeps_field_order_from_the_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ui/scrapers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"provider_name":"gamer","is_enabled":true,
                     "configurable_fields":{"user_agent":"User-Agent","cookie":"Cookie","area":"Area"}}]"#,
            ))
            .mount(&server)
            .await;

        let records = store_for(&server.uri())
            .list(Category::Danmaku)
            .await
            .expect("list should succeed");
        let keys: Vec<&str> = records[0]
            .configurable_fields
            .as_ref()
            .expect("fields")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["user_agent", "cookie", "area"]);
    }

    #[tokio::test]
    async fn save_puts_order_entries() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/ui/scrapers"))
            .and(body_json(json!([
                { "provider_name": "B", "is_enabled": false, "display_order": 1 },
                { "provider_name": "A", "is_enabled": true, "display_order": 2 }
            ])))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let entries = vec![
            ProviderOrder {
                provider_name: "B".into(),
                is_enabled: false,
                display_order: 1,
            },
            ProviderOrder {
                provider_name: "A".into(),
                is_enabled: true,
                display_order: 2,
            },
        ];
        store_for(&server.uri())
            .save(Category::Danmaku, &entries)
            .await
            .expect("save should succeed");
    }

    #[tokio::test]
    async fn set_config_sends_map_and_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/ui/scrapers/gamer/config"))
            .and(body_json(json!({ "cookie": "xyz" })))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({ "detail": "cookie rejected" })),
            )
            .mount(&server)
            .await;

        let mut values = ConfigFieldSet::new();
        values.insert("cookie".into(), "xyz".into());
        let err = store_for(&server.uri())
            .set_config("gamer", &values)
            .await
            .expect_err("server rejected the config");
        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "cookie rejected");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn get_config_falls_back_to_status_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ui/scrapers/gamer/config"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = store_for(&server.uri())
            .get_config("gamer")
            .await
            .expect_err("server failed");
        assert_eq!(err.to_string(), "Internal Server Error (HTTP 500)");
    }
}
