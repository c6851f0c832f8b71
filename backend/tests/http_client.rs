//! The real client transport against a bound gate: headers, bearer scheme, and how error
//! bodies are classified once they cross the wire.

use std::sync::Arc;
use std::time::Duration;
use zkbalance_backend::api::router;
use zkbalance_backend::state::AppState;
use zkbalance_backend::store::MemoryStore;
use zkbalance_client::api::{GateApi, GateConfig, HttpGateApi, SubmissionHeaders};
use zkbalance_client::error::ClientError;
use zkbalance_client::extractor::{parse_balance_cents, StaticExtractor};
use zkbalance_client::flow::{ClientSession, ClientState, SubmitOutcome, AUTH_TOKEN, SESSION_TOKEN};
use zkbalance_client::proof_client::ProofGenerationClient;
use zkbalance_client::secure_store::SecureStore;
use zkbalance_client::storage::MemoryArea;
use zkbalance_common::clock::{Clock, ManualClock};
use zkbalance_common::constants::DEFAULT_SOURCE_TAG;
use zkbalance_common::groth16::setup_keys;
use zkbalance_common::prover::{Groth16Prover, ProofProver};
use zkbalance_common::verifier::Groth16Verifier;

const T0: i64 = 1_700_000_000_000;

/// Serve the gate on an ephemeral port and return its base URL.
async fn spawn_gate(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn http_api(base_url: &str) -> HttpGateApi {
    HttpGateApi::new(GateConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(10),
    })
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_submits_over_http_and_reacts_to_gate_errors() {
    let mut rng = rand::rngs::OsRng;
    let (pk, vk) = setup_keys(&mut rng).unwrap();
    let prover = Arc::new(Groth16Prover::new(pk));

    // Separate clocks: the gate's moves on its own while the client still believes its tokens.
    let server_clock = Arc::new(ManualClock::new(T0));
    let client_clock = Arc::new(ManualClock::new(T0));

    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        server_clock.clone(),
        Arc::new(Groth16Verifier::new(&vk)),
        b"wire-secret",
        DEFAULT_SOURCE_TAG,
    );
    let base_url = spawn_gate(state).await;

    let store = Arc::new(SecureStore::new(
        Arc::new(MemoryArea::new()),
        Arc::new(MemoryArea::new()),
        client_clock.clone(),
    ));
    let proofs = ProofGenerationClient::new(prover.clone(), store.clone());
    let mut session = ClientSession::new(http_api(&base_url), store.clone(), proofs, client_clock.clone());
    let page_balance = StaticExtractor(Some("$1,234.56".to_string()));

    session.authenticate().await.unwrap();
    assert_eq!(session.state(), ClientState::Authenticated);
    assert!(store.get_secure_item::<String>(SESSION_TOKEN).unwrap().is_some());

    session.generate_proof(&page_balance).await.unwrap();
    assert_eq!(session.submit().await.unwrap(), SubmitOutcome::Verified);
    assert_eq!(session.state(), ClientState::Verified);

    // Identical resubmission under one request id.
    let direct = http_api(&base_url);
    let bearer: String = store.get_secure_item(AUTH_TOKEN).unwrap().unwrap();
    let bundle = prover.full_prove(parse_balance_cents("$1,234.56").unwrap()).unwrap();
    let headers = SubmissionHeaders {
        request_id: "resubmitted".to_string(),
        timestamp_ms: client_clock.now_ms(),
        source_tag: DEFAULT_SOURCE_TAG.to_string(),
    };
    let first = direct.verify(&bearer, &headers, &bundle).await.unwrap();
    assert!(first.verified);
    let err = direct.verify(&bearer, &headers, &bundle).await.unwrap_err();
    assert!(matches!(err, ClientError::Replay(_)), "got {err:?}");

    // Thirty-three minutes later the gate refuses the bearer and the client forgets both tokens.
    server_clock.advance(Duration::from_secs(33 * 60));
    session.generate_proof(&page_balance).await.unwrap();
    let err = session.submit().await.unwrap_err();
    assert!(err.is_auth(), "got {err:?}");
    assert_eq!(session.state(), ClientState::Unauthenticated);
    assert!(!session.can_submit());
    assert_eq!(store.get_secure_item::<String>(AUTH_TOKEN).unwrap(), None);
    assert_eq!(store.get_secure_item::<String>(SESSION_TOKEN).unwrap(), None);
}

#[tokio::test]
async fn unknown_session_is_an_auth_error_over_http() {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(T0)),
        Arc::new(Groth16Verifier::new(&setup_keys(&mut rand::rngs::OsRng).unwrap().1)),
        b"wire-secret",
        DEFAULT_SOURCE_TAG,
    );
    let api = http_api(&spawn_gate(state).await);

    let err = api.exchange_token(&"0".repeat(64)).await.unwrap_err();
    assert!(err.is_auth(), "got {err:?}");

    let session_token = api.init_session().await.unwrap();
    let token = api.exchange_token(&session_token).await.unwrap();
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.expires_in, 30 * 60);
}
