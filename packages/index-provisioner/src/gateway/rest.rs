//! HTTP/JSON adapter for the admin REST surface
//!
//! `POST {endpoint}/v1/{parent}/indexes` creates, `GET {endpoint}/v1/{name}` reads.
//! A custom endpoint (e.g. a local emulator) is used without authentication.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{AdminGateway, IndexDefinition, IndexState, IndexStatus, Operation};
use crate::error::{GatewayError, StatusCode};
use crate::spec::CollectionScope;

pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndexBody<'a> {
    query_scope: &'static str,
    fields: Vec<WireField<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireField<'a> {
    field_path: &'a str,
    order: &'static str,
}

impl<'a> From<&'a IndexDefinition> for CreateIndexBody<'a> {
    fn from(index: &'a IndexDefinition) -> Self {
        Self {
            query_scope: index.query_scope.as_str(),
            fields: index
                .fields
                .iter()
                .map(|f| WireField {
                    field_path: &f.field_path,
                    order: f.order.as_str(),
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct IndexResource {
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Build a [`GatewayError`] from a non-success response
///
/// The textual `status` of a Google-style error body wins; the HTTP status
/// is the fallback when the body is missing or unrecognised.
fn error_from_response(http_status: u16, body: &[u8]) -> GatewayError {
    let fallback = StatusCode::from_http_status(http_status);
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = match envelope.error.status.as_deref() {
                Some(name) => match StatusCode::from_status_name(name) {
                    StatusCode::Unknown => fallback,
                    code => code,
                },
                None => fallback,
            };
            GatewayError::new(code, envelope.error.message)
        }
        Err(_) => GatewayError::new(
            fallback,
            format!(
                "HTTP {}: {}",
                http_status,
                String::from_utf8_lossy(body).trim()
            ),
        ),
    }
}

/// Admin gateway speaking the REST/JSON protocol
#[derive(Clone)]
pub struct RestAdminGateway {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl RestAdminGateway {
    /// Gateway against `endpoint`, sending `token` as a bearer credential if given
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("index-provisioner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Unauthenticated gateway for a local emulator
    pub fn emulator(endpoint: impl Into<String>) -> Result<Self, GatewayError> {
        Self::new(endpoint, None)
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/v1/{}", self.endpoint, resource)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.bytes().await?;
        if status.is_success() {
            Ok(serde_json::from_slice(&body)?)
        } else {
            Err(error_from_response(status.as_u16(), &body))
        }
    }
}

#[async_trait]
impl AdminGateway for RestAdminGateway {
    #[instrument(skip(self, parent, index), fields(parent = %parent))]
    async fn create_index(
        &self,
        parent: &CollectionScope,
        index: &IndexDefinition,
    ) -> Result<Operation, GatewayError> {
        let url = self.url(&format!("{}/indexes", parent));
        debug!("POST {}", url);

        let request = self
            .client
            .post(&url)
            .json(&CreateIndexBody::from(index));
        let response = self.authorize(request).send().await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn get_index(&self, name: &str) -> Result<IndexStatus, GatewayError> {
        let url = self.url(name);
        debug!("GET {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        let resource: IndexResource = Self::decode(response).await?;
        Ok(IndexStatus {
            name: if resource.name.is_empty() {
                name.to_string()
            } else {
                resource.name
            },
            state: resource
                .state
                .as_deref()
                .map(IndexState::from_wire)
                .unwrap_or(IndexState::Unspecified),
        })
    }
}
