//! Transport to the attestation gate.

use crate::error::ClientError;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use std::time::Duration;
use zkbalance_common::protocol::{
    ErrorBody, InitSessionResponse, TokenRequest, TokenResponse, VerifyRequest, VerifyResponse, HEADER_BALANCE_SOURCE,
    HEADER_REQUEST_ID, HEADER_TIMESTAMP, PATH_INIT_SESSION, PATH_TOKEN, PATH_VERIFY, TOKEN_TYPE_BEARER,
};
use zkbalance_common::types::ProofBundle;

/// Per-submission metadata sent as headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHeaders {
    pub request_id: String,
    pub timestamp_ms: i64,
    pub source_tag: String,
}

#[async_trait]
pub trait GateApi: Send + Sync {
    /// Returns the new session token.
    async fn init_session(&self) -> Result<String, ClientError>;

    async fn exchange_token(&self, session_token: &str) -> Result<TokenResponse, ClientError>;

    async fn verify(
        &self,
        bearer: &str,
        headers: &SubmissionHeaders,
        bundle: &ProofBundle,
    ) -> Result<VerifyResponse, ClientError>;
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpGateApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateApi {
    pub fn new(config: GateConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.ok();
            let err = ClientError::from_response(status.as_u16(), body);
            tracing::warn!(status = status.as_u16(), error = %err, "gate rejected request");
            return Err(err);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Transport(format!("unreadable response: {e}")))
    }
}

fn transport(e: reqwest::Error) -> ClientError {
    ClientError::Transport(format!("HTTP request failed: {e}"))
}

#[async_trait]
impl GateApi for HttpGateApi {
    async fn init_session(&self) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.url(PATH_INIT_SESSION))
            .send()
            .await
            .map_err(transport)?;
        let body: InitSessionResponse = Self::read(response).await?;
        Ok(body.session_token)
    }

    async fn exchange_token(&self, session_token: &str) -> Result<TokenResponse, ClientError> {
        let response = self
            .client
            .post(self.url(PATH_TOKEN))
            .json(&TokenRequest {
                session_token: session_token.to_string(),
            })
            .send()
            .await
            .map_err(transport)?;
        Self::read(response).await
    }

    async fn verify(
        &self,
        bearer: &str,
        headers: &SubmissionHeaders,
        bundle: &ProofBundle,
    ) -> Result<VerifyResponse, ClientError> {
        let body = VerifyRequest {
            proof: Some(bundle.proof.clone()),
            public_signals: Some(bundle.public_signals.clone()),
        };
        let response = self
            .client
            .post(self.url(PATH_VERIFY))
            .header(AUTHORIZATION, format!("{TOKEN_TYPE_BEARER} {bearer}"))
            .header(HEADER_REQUEST_ID, &headers.request_id)
            .header(HEADER_TIMESTAMP, headers.timestamp_ms.to_string())
            .header(HEADER_BALANCE_SOURCE, &headers.source_tag)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        Self::read(response).await
    }
}
