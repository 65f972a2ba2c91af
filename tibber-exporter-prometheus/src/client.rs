//! GraphQL client for the Tibber API.

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tibber_common::{Error, QueryData, Result};
use tracing::debug;

use crate::query::HOMES_QUERY;

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Issues the homes query against a Tibber GraphQL endpoint.
#[derive(Clone)]
pub struct TibberClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl TibberClient {
    /// Create a client for `endpoint`, authenticating with `token`.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let token = token.into();

        if endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint must not be empty".to_string()));
        }
        if token.trim().is_empty() {
            return Err(Error::Config("token must not be empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run the homes query once.
    ///
    /// No retry and no timeout beyond the transport default.
    pub async fn fetch(&self) -> Result<QueryData> {
        debug!(endpoint = %self.endpoint, query = HOMES_QUERY, "Sending GraphQL request");

        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, self.token.as_str())
            .json(&GraphQlRequest { query: HOMES_QUERY })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), body = %body, "Received GraphQL response");

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        decode_response(&body)
    }
}

/// Decode a GraphQL response envelope into the typed tree.
fn decode_response(body: &str) -> Result<QueryData> {
    let envelope: GraphQlResponse<QueryData> = serde_json::from_str(body)?;

    if let Some(errors) = envelope.errors
        && !errors.is_empty()
    {
        let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
        return Err(Error::GraphQl(messages.join("; ")));
    }

    envelope.data.ok_or(Error::MissingData)
}
