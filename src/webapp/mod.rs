pub mod cleanup;
pub mod handlers;
pub mod models;
pub mod state;
pub mod trace;

pub use cleanup::cleanup_loop;
pub use models::{
    ErrorResponse, error_bad_request, error_internal, error_not_found, error_response,
    error_unavailable,
};
pub use state::{AppState, ServerBackend};

use std::time::Duration;

use anyhow::Result;
use axum::{Router, middleware, routing::get};
use clap::Args;
use http::{HeaderValue, Method, header};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GlobalConfig;
use crate::gate::AccessGate;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "skill402",
        version = env!("CARGO_PKG_VERSION"),
        description = "Pay-per-request content behind L402: request an item, pay the \
                       Lightning invoice from the 402 challenge, then retry with \
                       `Authorization: L402 <macaroon>:<preimage>`.",
        license(
            name = "MIT OR Apache-2.0",
        )
    ),
    paths(
        handlers::index::index_handler,
        handlers::health::health_handler,
        handlers::catalog::catalog_handler,
        handlers::items::preview_handler,
        handlers::items::item_handler,
        handlers::payments::payment_status_handler,
    ),
    components(
        schemas(
            models::ErrorResponse,
            models::CatalogResponse,
            models::ItemSummary,
            models::PreviewResponse,
            models::ItemResponse,
            models::InvoiceInfo,
            models::ChallengeResponse,
            models::NotSettledResponse,
            models::PaymentStatusResponse,
            handlers::health::HealthResponse,
            handlers::index::IndexResponse,
            crate::catalog::CatalogEntry,
            crate::catalog::Tier,
            crate::lightning::SettlementStatus,
        )
    ),
    tags(
        (name = "Health", description = "Service health and status endpoints"),
        (name = "Catalog", description = "Browse, preview and buy items"),
        (name = "Payments", description = "Payment status"),
    )
)]
struct ApiDoc;

/// Browser access: any origin unless a list is configured
fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::WWW_AUTHENTICATE, header::RETRY_AFTER]);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins.to_vec())
    }
}

/// Routes, docs, CORS and tracing middleware over an existing state
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(handlers::index::index_handler))
        .route("/health", get(handlers::health::health_handler))
        .route("/catalog", get(handlers::catalog::catalog_handler))
        .route("/items/{id}", get(handlers::items::item_handler))
        .route("/items/{id}/preview", get(handlers::items::preview_handler))
        .route(
            "/payments/{payment_hash}/status",
            get(handlers::payments::payment_status_handler),
        )
        .layer(middleware::from_fn(trace::trace_request))
        .layer(cors)
        .with_state(state)
}

/// Creates an instance of the axum app with all routes and state configured
pub fn create_app(config: &GlobalConfig) -> Result<(Router, AppState)> {
    let catalog = config.build_catalog()?;
    let issuer = config.build_issuer()?;
    let backend = config.build_backend()?;

    let mut gate = AccessGate::new(catalog, issuer, backend)
        .with_credential_ttl(config.credential_ttl_secs);
    if let Some(prefix) = &config.memo_prefix {
        gate = gate.with_memo_prefix(prefix.as_str());
    }
    let state = AppState::new(gate, config.retention()).with_cors_origins(config.cors_origins()?);

    Ok((create_router(state.clone()), state))
}

#[derive(Args)]
pub struct ServeArgs {
    /// Write process ID to the specified file
    #[arg(long, value_name = "./pid.file")]
    pub pid: Option<String>,

    /// Write readiness marker to the specified file once server is listening
    ///
    /// Useful for scripts that need to wait for the server to be fully started.
    #[arg(long)]
    pub ready_file: Option<String>,
}

pub async fn run(args: ServeArgs, config: &GlobalConfig) -> Result<()> {
    let port = config.port();

    if let Some(pid_file) = &args.pid {
        std::fs::write(pid_file, std::process::id().to_string())?;
    }

    let (app, state) = create_app(config)?;

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        cleanup_loop(cleanup_state, CLEANUP_INTERVAL).await;
    });

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let backend = if state.mock_mode { "mock" } else { "lnbits" };
    tracing::info!(
        items = state.gate.catalog().len(),
        backend,
        backend_timeout = ?config.backend_timeout(),
        credential_ttl_secs = ?config.credential_ttl_secs,
        listen = %listener.local_addr()?,
        swagger = %format!("http://localhost:{}/swagger-ui", port),
        "Server started"
    );

    if let Some(ready_file) = &args.ready_file {
        std::fs::write(ready_file, format!("ready {}", std::process::id()))?;
    }

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::tests::{K01_CONTENT, test_catalog};
    use crate::credential::CredentialIssuer;
    use crate::lightning::{AnyBackend, MockBackend, TimeoutBackend};
    use axum::body::{Body, to_bytes};
    use axum::http::{HeaderMap, Request, StatusCode};
    use secrecy::SecretString;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    pub(crate) fn mock_state() -> (AppState, MockBackend) {
        let mock = MockBackend::new();
        let backend = TimeoutBackend::new(AnyBackend::Mock(mock.clone()), Duration::from_secs(5));
        let issuer = CredentialIssuer::new(&SecretString::from("webapp-test-secret")).unwrap();
        let gate = AccessGate::new(Arc::new(test_catalog()), issuer, backend);
        (AppState::new(gate, Duration::from_secs(3600)), mock)
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    async fn get(
        state: &AppState,
        uri: &str,
        authorization: Option<&str>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(auth) = authorization {
            request = request.header(header::AUTHORIZATION, auth);
        }
        send(state, request.body(Body::empty()).unwrap()).await
    }

    fn auth_from(challenge: &Value) -> String {
        format!(
            "L402 {}:{}",
            challenge["macaroon"].as_str().unwrap(),
            challenge["mock_preimage"].as_str().unwrap()
        )
    }

    #[tokio::test]
    async fn test_catalog_listing() {
        let (state, _) = mock_state();
        let (status, _, body) = get(&state, "/catalog", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 4);
        assert_eq!(body["items"][0]["id"], "K01");
        assert_eq!(body["items"][0]["tier"], "basic");
        assert_eq!(body["items"][0]["price"], 50);
        assert_eq!(body["items"][3]["price"], 150);
    }

    #[tokio::test]
    async fn test_preview() {
        let (state, _) = mock_state();
        let (status, _, body) = get(&state, "/items/k01/preview", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "K01");
        let preview = body["preview"].as_str().unwrap();
        assert!(preview.contains("visible"));
        assert!(!preview.contains("hidden"));

        let (status, _, body) = get(&state, "/items/NOPE/preview", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Item not found");
    }

    #[tokio::test]
    async fn test_challenge_for_k01() {
        let (state, _) = mock_state();
        let (status, headers, body) = get(&state, "/items/K01", None).await;

        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["invoice"]["amount"], 50);
        assert_eq!(body["item"]["id"], "K01");
        assert!(body.get("reason").is_none());

        let www = headers[header::WWW_AUTHENTICATE].to_str().unwrap();
        let macaroon = body["macaroon"].as_str().unwrap();
        assert_eq!(
            www,
            format!(
                "L402 macaroon=\"{}\", invoice=\"{}\"",
                macaroon,
                body["invoice"]["payment_request"].as_str().unwrap()
            )
        );

        let issuer = CredentialIssuer::new(&SecretString::from("webapp-test-secret")).unwrap();
        let credential = issuer.verify(macaroon).unwrap();
        assert_eq!(credential.caveats.item_id, "K01");
        assert_eq!(
            credential.caveats.payment_hash.to_hex(),
            body["invoice"]["payment_hash"].as_str().unwrap()
        );
    }

    #[tokio::test]
    async fn test_full_payment_flow() {
        let (state, mock) = mock_state();
        let (_, _, challenge) = get(&state, "/items/K01", None).await;
        let auth = auth_from(&challenge);
        let hash_hex = challenge["invoice"]["payment_hash"].as_str().unwrap().to_string();

        // Valid credential, unpaid invoice
        let (status, headers, body) = get(&state, "/items/K01", Some(&auth)).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "not_settled");
        assert_eq!(body["payment_hash"], hash_hex.as_str());
        assert!(headers.contains_key(header::RETRY_AFTER));
        assert!(!headers.contains_key(header::WWW_AUTHENTICATE));

        let (status, _, body) = get(&state, &format!("/payments/{}/status", hash_hex), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["paid"], false);
        assert_eq!(body["item_id"], "K01");
        assert_eq!(body["amount"], 50);

        mock.settle(&hash_hex.parse().unwrap()).await;

        // Granting is repeatable
        for _ in 0..2 {
            let (status, _, body) = get(&state, "/items/K01", Some(&auth)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["content"], K01_CONTENT);
            assert_eq!(body["payment_hash"], hash_hex.as_str());
        }

        let (_, _, body) = get(&state, &format!("/payments/{}/status", hash_hex), None).await;
        assert_eq!(body["status"], "settled");
        assert_eq!(body["paid"], true);
    }

    #[tokio::test]
    async fn test_tampered_credential_gets_fresh_challenge() {
        let (state, mock) = mock_state();
        let (_, _, challenge) = get(&state, "/items/K01", None).await;
        let hash = challenge["invoice"]["payment_hash"].as_str().unwrap();
        mock.settle(&hash.parse().unwrap()).await;

        let mut macaroon: Vec<char> = challenge["macaroon"].as_str().unwrap().chars().collect();
        let at = macaroon.len() - 10;
        macaroon[at] = if macaroon[at] == 'A' { 'B' } else { 'A' };
        let macaroon: String = macaroon.into_iter().collect();
        let auth = format!(
            "L402 {}:{}",
            macaroon,
            challenge["mock_preimage"].as_str().unwrap()
        );

        let (status, headers, body) = get(&state, "/items/K01", Some(&auth)).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["reason"], "invalid_credential");
        assert_ne!(body["invoice"]["payment_hash"].as_str().unwrap(), hash);
        assert!(headers.contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_credential_for_other_item() {
        let (state, mock) = mock_state();
        let (_, _, challenge) = get(&state, "/items/K01", None).await;
        mock.settle(&challenge["invoice"]["payment_hash"].as_str().unwrap().parse().unwrap())
            .await;

        let (status, _, body) = get(&state, "/items/C01", Some(&auth_from(&challenge))).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["reason"], "item_mismatch");
        assert_eq!(body["invoice"]["amount"], 100);
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let (state, _) = mock_state();
        let (status, _, body) = get(&state, "/items/ZZ9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Item not found");
    }

    #[tokio::test]
    async fn test_backend_down_is_503() {
        let (state, mock) = mock_state();
        mock.set_offline(true);
        let (status, headers, body) = get(&state, "/items/K01", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(headers.contains_key(header::RETRY_AFTER));
        assert!(body["error"].is_string());

        let hash = "ab".repeat(32);
        let (status, _, _) = get(&state, &format!("/payments/{}/status", hash), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_backend_down_between_challenge_and_proof() {
        let (state, mock) = mock_state();
        let (_, _, challenge) = get(&state, "/items/K01", None).await;
        let auth = auth_from(&challenge);

        mock.set_offline(true);
        let (status, headers, body) = get(&state, "/items/K01", Some(&auth)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(headers.contains_key(header::RETRY_AFTER));
        assert!(!headers.contains_key(header::WWW_AUTHENTICATE));
        assert!(body.get("content").is_none());

        // Once the backend is back the same credential works
        mock.set_offline(false);
        mock.settle(&challenge["invoice"]["payment_hash"].as_str().unwrap().parse().unwrap())
            .await;
        let (status, _, body) = get(&state, "/items/K01", Some(&auth)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], K01_CONTENT);
    }

    #[tokio::test]
    async fn test_cors_preflight_and_exposed_headers() {
        let (state, _) = mock_state();
        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/items/K01")
            .header(header::ORIGIN, "https://agent.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&state, preflight).await;
        assert!(status.is_success());
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let request = Request::builder()
            .uri("/items/K01")
            .header(header::ORIGIN, "https://agent.example")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&state, request).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let exposed = headers[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(exposed.contains("www-authenticate"));
    }

    #[tokio::test]
    async fn test_cors_restricted_origins() {
        let (state, _) = mock_state();
        let state = state.with_cors_origins(vec![HeaderValue::from_static("https://agent.example")]);

        let request = |origin: &'static str| {
            Request::builder()
                .uri("/catalog")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap()
        };
        let (_, headers, _) = send(&state, request("https://agent.example")).await;
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://agent.example");

        let (status, headers, _) = send(&state, request("https://other.example")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_payment_status_bad_hash() {
        let (state, _) = mock_state();
        let (status, _, _) = get(&state, "/payments/xyz/status", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = get(&state, &format!("/payments/{}/status", "cd".repeat(32)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "unknown");
        assert_eq!(body["item_id"], Value::Null);
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let (state, _) = mock_state();
        let (status, _, body) = get(&state, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["items"], 4);
        assert_eq!(body["backend"], "mock");

        let (status, _, body) = get(&state, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["protocol"], "L402");
        assert_eq!(body["mock_mode"], true);
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let (state, _) = mock_state();
        let (status, _, body) = get(&state, "/api-docs/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/items/{id}"].is_object());
    }
}
