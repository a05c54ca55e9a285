//! Async HTTP client for the Sprout JSON API and asset host.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use sprout_core::{
  plant::Plant,
  remote::{AssetTransport, RemoteError, RemoteSource},
  watering::WateringRecord,
};

use crate::{Error, Result};

/// Connection settings for the API and asset host.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub api_base_url:   String,
  /// Base that descriptor URLs (e.g. `/videos/seed.mp4`) are joined onto.
  pub asset_base_url: String,
  /// Transport-level timeout applied to every request.
  pub timeout:        Duration,
}

/// Async HTTP client for the plant API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ClientConfig,
}

impl ApiClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    for base in [&config.api_base_url, &config.asset_base_url] {
      if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(Error::InvalidBaseUrl(base.clone()));
      }
    }
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    join(&self.config.api_base_url, &format!("/api{path}"))
  }

  fn asset_url(&self, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
      url.to_owned()
    } else {
      join(&self.config.asset_base_url, url)
    }
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
    let url = self.url(path);
    let resp = self
      .client
      .get(&url)
      .send()
      .await
      .map_err(|e| RemoteError::Network(format!("GET {url}: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(classify_status(status, path, body));
    }
    resp
      .json()
      .await
      .map_err(|e| RemoteError::Decode(format!("GET {path}: {e}")))
  }

  /// `GET /api/health`: succeeds when the server answers 2xx.
  pub async fn health(&self) -> Result<(), RemoteError> {
    let url = self.url("/health");
    let resp = self
      .client
      .get(&url)
      .send()
      .await
      .map_err(|e| RemoteError::Network(format!("GET {url}: {e}")))?;
    let status = resp.status();
    if status.is_success() {
      Ok(())
    } else {
      Err(classify_status(status, "/health", String::new()))
    }
  }
}

impl RemoteSource for ApiClient {
  /// `GET /api/plants/{id}`
  async fn get_plant_by_id(&self, id: &str) -> Result<Plant, RemoteError> {
    self.get_json(&format!("/plants/{id}")).await
  }

  /// `GET /api/watering-records/{id}`
  async fn get_watering_record_by_id(&self, id: &str) -> Result<WateringRecord, RemoteError> {
    self.get_json(&format!("/watering-records/{id}")).await
  }
}

impl AssetTransport for ApiClient {
  async fn fetch(&self, url: &str) -> Result<Bytes, RemoteError> {
    let full = self.asset_url(url);
    let resp = self
      .client
      .get(&full)
      .send()
      .await
      .map_err(|e| RemoteError::Network(format!("GET {full}: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(classify_status(status, url, String::new()));
    }
    resp
      .bytes()
      .await
      .map_err(|e| RemoteError::Network(format!("reading {full}: {e}")))
  }
}

fn join(base: &str, path: &str) -> String {
  format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a non-success status to a [`RemoteError`].
fn classify_status(status: StatusCode, path: &str, body: String) -> RemoteError {
  if status == StatusCode::NOT_FOUND {
    return RemoteError::NotFound(path.to_owned());
  }
  let message = if body.is_empty() {
    status.canonical_reason().unwrap_or("unknown").to_owned()
  } else {
    body
  };
  RemoteError::Server { status: status.as_u16(), message }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> ApiClient {
    ApiClient::new(ClientConfig {
      api_base_url:   "http://localhost:8080/".into(),
      asset_base_url: "https://cdn.example.com/static".into(),
      timeout:        Duration::from_secs(5),
    })
    .unwrap()
  }

  #[test]
  fn api_urls_are_joined_under_api_prefix() {
    assert_eq!(
      client().url("/plants/p1"),
      "http://localhost:8080/api/plants/p1"
    );
  }

  #[test]
  fn relative_asset_urls_use_asset_base() {
    let c = client();
    assert_eq!(
      c.asset_url("/videos/seed.mp4"),
      "https://cdn.example.com/static/videos/seed.mp4"
    );
    assert_eq!(c.asset_url("https://other/x.png"), "https://other/x.png");
  }

  #[test]
  fn status_classification() {
    assert_eq!(
      classify_status(StatusCode::NOT_FOUND, "/plants/x", String::new()),
      RemoteError::NotFound("/plants/x".into())
    );
    assert_eq!(
      classify_status(StatusCode::BAD_GATEWAY, "/plants/x", String::new()),
      RemoteError::Server { status: 502, message: "Bad Gateway".into() }
    );
    assert_eq!(
      classify_status(StatusCode::INTERNAL_SERVER_ERROR, "/p", "oops".into()),
      RemoteError::Server { status: 500, message: "oops".into() }
    );
  }

  #[test]
  fn rejects_base_without_scheme() {
    let err = ApiClient::new(ClientConfig {
      api_base_url:   "localhost:8080".into(),
      asset_base_url: "http://localhost:8080".into(),
      timeout:        Duration::from_secs(5),
    });
    assert!(matches!(err, Err(Error::InvalidBaseUrl(_))));
  }

  #[test]
  fn plant_payload_decodes_from_camel_case() {
    let plant: Plant = serde_json::from_str(
      r#"{"id":"p1","variety":"tomato","growthStage":"sprout","growthValue":12,
          "personalityTags":["shy","curious"],"nftMinted":false}"#,
    )
    .unwrap();
    assert_eq!(plant.growth_value, 12);
    assert_eq!(plant.personality_tags.len(), 2);
  }
}
