//! Callable-function client.
//!
//! A job is invoked with `POST {base_url}/{job_name}` and body
//! `{"data": payload}`. The function answers with `{"result": ...}` on
//! success or `{"error": {"status": "NOT_FOUND", "message": "..."}}` on
//! failure; statuses become client codes like `functions/not-found`.

use super::{JobInvoker, UpstreamError};
use crate::models::identity::Identity;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Clone)]
pub struct HttpJobInvoker {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobInvoker {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl JobInvoker for HttpJobInvoker {
    async fn invoke(
        &self,
        job_name: &str,
        payload: Value,
        identity: &Identity,
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}/{}", self.base_url, job_name);
        debug!("invoking {} for {}", url, identity.uid);

        let mut request = self.client.post(&url).json(&json!({ "data": payload }));
        if let Some(token) = &identity.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| UpstreamError::new("functions/unavailable", err.to_string()))?;
        let status = response.status();
        let body: Option<Value> = response.json().await.ok();

        decode_callable_response(status, body)
    }
}

fn decode_callable_response(status: StatusCode, body: Option<Value>) -> Result<Value, UpstreamError> {
    if let Some(error) = body.as_ref().and_then(|b| b.get("error")) {
        let raw_status = error
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("INTERNAL");
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(raw_status);
        return Err(UpstreamError::new(
            format!("functions/{}", raw_status.to_ascii_lowercase().replace('_', "-")),
            message,
        ));
    }

    if !status.is_success() {
        return Err(UpstreamError::new(
            format!("functions/{}", code_for_http_status(status)),
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        ));
    }

    match body {
        Some(Value::Object(mut fields)) => fields.remove("result").ok_or_else(|| {
            UpstreamError::new("functions/internal", "Response is missing data field.")
        }),
        _ => Err(UpstreamError::new(
            "functions/internal",
            "Response is not valid JSON object.",
        )),
    }
}

fn code_for_http_status(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "invalid-argument",
        401 => "unauthenticated",
        403 => "permission-denied",
        404 => "not-found",
        409 => "aborted",
        429 => "resource-exhausted",
        499 => "cancelled",
        501 => "unimplemented",
        503 => "unavailable",
        504 => "deadline-exceeded",
        _ => "internal",
    }
}
