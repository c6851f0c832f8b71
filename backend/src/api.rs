use crate::errors::ApiError;
use crate::models::Submission;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use zkbalance_common::protocol::{
    InitSessionResponse, TokenRequest, TokenResponse, VerifyRequest, VerifyResponse, HEADER_BALANCE_SOURCE,
    HEADER_REQUEST_ID, HEADER_TIMESTAMP, PATH_INIT_SESSION, PATH_TOKEN, PATH_VERIFY, TOKEN_TYPE_BEARER,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(PATH_INIT_SESSION, post(init_session))
        .route(PATH_TOKEN, post(exchange_token))
        .route(PATH_VERIFY, post(verify))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn init_session(State(state): State<AppState>) -> Result<Json<InitSessionResponse>, ApiError> {
    let session_token = state.sessions.init_session().await?;
    Ok(Json(InitSessionResponse { session_token }))
}

async fn exchange_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let issued = state.sessions.exchange_token(&req.session_token).await?;

    Ok(Json(TokenResponse {
        access_token: issued.access_token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: issued.expires_in,
    }))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| s.trim().to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(TOKEN_TYPE_BEARER) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    // A broken body is reported after authentication, as missing fields.
    let body = match payload {
        Ok(Json(body)) => body,
        Err(e) => {
            tracing::debug!(error = %e.body_text(), "unreadable verify body");
            VerifyRequest::default()
        }
    };

    let submission = Submission {
        bearer: bearer_token(&headers),
        request_id: header_str(&headers, HEADER_REQUEST_ID),
        timestamp_ms: header_str(&headers, HEADER_TIMESTAMP).and_then(|t| t.parse::<i64>().ok()),
        context_tag: header_str(&headers, HEADER_BALANCE_SOURCE),
        proof: body.proof,
        public_signals: body.public_signals,
    };

    let outcome = state.gate.verify(submission).await?;
    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_scheme_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
