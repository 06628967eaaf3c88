//! HTTP adapters for the tool and connection collaborators.
//!
//! Both talk JSON to a single base endpoint:
//!
//! | Collaborator | Request |
//! |---|---|
//! | [`HttpToolExecutor`] | `POST {base}/tools/{toolId}/execute` with a [`ToolInvocation`] body |
//! | [`HttpConnectionDirectory`] | `GET {base}/connections?caller_id={callerId}` |
//!
//! When an API key is configured it is sent as `x-api-key`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::connections::{ConnectedAccount, ConnectionDirectory};
use crate::error::HostError;
use crate::tool::{ToolExecution, ToolExecutor, ToolInvocation};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared endpoint and credentials.
#[derive(Debug, Clone)]
struct Endpoint {
  client: Client,
  base: Url,
  api_key: Option<String>,
}

impl Endpoint {
  fn new(base: &str, api_key: Option<String>) -> Result<Self, HostError> {
    let base = Url::parse(base).map_err(|e| HostError::InvalidEndpoint {
      url: base.to_string(),
      message: e.to_string(),
    })?;
    if base.cannot_be_a_base() {
      return Err(HostError::InvalidEndpoint {
        url: base.to_string(),
        message: "not a base url".to_string(),
      });
    }

    Ok(Self {
      client: Client::new(),
      base,
      api_key: api_key.filter(|k| !k.is_empty()),
    })
  }

  /// The base url with `segments` appended. Segments are percent-encoded.
  fn url(&self, segments: &[&str]) -> Result<Url, HostError> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| HostError::InvalidEndpoint {
        url: self.base.to_string(),
        message: "not a base url".to_string(),
      })?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.api_key {
      Some(key) => request.header(API_KEY_HEADER, key),
      None => request,
    }
  }
}

async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T, HostError> {
  let status = response.status();
  let body = response.text().await?;

  if !status.is_success() {
    return Err(HostError::Status {
      url: url.to_string(),
      status: status.as_u16(),
      body,
    });
  }

  serde_json::from_str(&body).map_err(|e| HostError::Decode {
    url: url.to_string(),
    message: e.to_string(),
  })
}

/// Executes tools through the tool service.
#[derive(Debug, Clone)]
pub struct HttpToolExecutor {
  endpoint: Endpoint,
}

impl HttpToolExecutor {
  pub fn new(base: &str, api_key: Option<String>) -> Result<Self, HostError> {
    Ok(Self {
      endpoint: Endpoint::new(base, api_key)?,
    })
  }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
  async fn execute(
    &self,
    tool_id: &str,
    invocation: ToolInvocation,
  ) -> Result<ToolExecution, HostError> {
    let url = self.endpoint.url(&["tools", tool_id, "execute"])?;
    debug!(tool_id = %tool_id, url = %url, "executing tool");

    let request = self.endpoint.client.post(url.clone()).json(&invocation);
    let response = self.endpoint.authorize(request).send().await?;
    decode(&url, response).await
  }
}

/// Lists connected accounts through the tool service.
#[derive(Debug, Clone)]
pub struct HttpConnectionDirectory {
  endpoint: Endpoint,
}

impl HttpConnectionDirectory {
  pub fn new(base: &str, api_key: Option<String>) -> Result<Self, HostError> {
    Ok(Self {
      endpoint: Endpoint::new(base, api_key)?,
    })
  }
}

#[async_trait]
impl ConnectionDirectory for HttpConnectionDirectory {
  async fn list(&self, caller_id: &str) -> Result<Vec<ConnectedAccount>, HostError> {
    let mut url = self.endpoint.url(&["connections"])?;
    url.query_pairs_mut().append_pair("caller_id", caller_id);
    debug!(caller_id = %caller_id, "listing connections");

    let request = self.endpoint.client.get(url.clone());
    let response = self.endpoint.authorize(request).send().await?;
    decode(&url, response).await
  }
}
