// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! HTTP Gateway for echobox.
//!
//! Request-inspection and time endpoints, DNS and GeoIP lookups, and the
//! paste-like `/store` endpoints backed by the ephemeral store.
//!
//! Built on Axum/Tokio. The same router serves a plain HTTP listener or AWS
//! Lambda invocations.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, ConnectInfo, DefaultBodyLimit, Path, Query, State},
    http::{
        header::{CONTENT_TYPE, HOST, USER_AGENT},
        HeaderMap, HeaderName, Request, StatusCode, Version,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use echobox_core::{Config, EphemeralStore, StoreError};

use crate::geoip::{self, GeoIpDatabase};
use crate::metrics::{STORE_READS, STORE_WRITES};
use crate::system::{SystemReport, RUSTC_VERSION};

const HASH_HEADER: &str = "x-hash-sha256";

/// Request-independent settings for the handlers.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Largest accepted upload, in bytes.
    pub payload_limit: usize,
    /// Scheme for store links when the client sent no `X-Forwarded-Proto`.
    pub public_scheme: String,
    /// GeoIP language when the request has no `lang` query.
    pub default_lang: String,
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            payload_limit: usize::try_from(config.server.payload_limit.bytes())
                .unwrap_or(usize::MAX),
            public_scheme: config.server.public_scheme.clone(),
            default_lang: config.geoip.default_lang.clone(),
        }
    }
}

/// Gateway state shared across threads
#[derive(Clone)]
pub struct GatewayState {
    store: EphemeralStore, // Thread-safe internally
    geoip: Option<Arc<GeoIpDatabase>>,
    settings: Arc<GatewaySettings>,
    started_at: DateTime<Utc>,
}

impl GatewayState {
    pub fn new(
        store: EphemeralStore,
        geoip: Option<GeoIpDatabase>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            store,
            geoip: geoip.map(Arc::new),
            settings: Arc::new(settings),
            started_at: Utc::now(),
        }
    }
}

pub fn router(state: GatewayState) -> Router {
    let payload_limit = state.settings.payload_limit;

    Router::new()
        .route("/", get(index))
        .route("/version", get(version))
        .route("/ping", get(ping))
        .route("/ip", get(client_ip))
        .route("/ua", get(user_agent))
        .route("/headers", get(request_headers))
        .route("/proto", get(proto))
        .route("/date", get(date))
        .route("/timestamp", get(timestamp))
        .route("/check_status", get(check_status))
        .route("/generate_204", get(generate_204))
        .route("/dns", get(dns_empty))
        .route("/dns/{domains}", get(dns))
        .route("/geoip", get(geoip_self))
        .route("/geoip/{ip}", get(geoip_addr))
        .route(
            "/store",
            axum::routing::post(store_put).layer(DefaultBodyLimit::max(payload_limit)),
        )
        .route("/store/{hash}", get(store_get))
        .route("/sysinfo", get(system_info))
        .route("/metrics", get(prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_gateway(
    addr: SocketAddr,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Gateway listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Serve Lambda invocations through the router until the runtime stops.
pub async fn start_lambda(state: GatewayState) -> Result<(), lambda_http::Error> {
    tracing::info!("Gateway serving AWS Lambda invocations");
    lambda_http::run(router(state)).await
}

// =============================================================================
// Request inspection
// =============================================================================

async fn index() -> &'static str {
    "Hello World!"
}

async fn version() -> String {
    format!("version: {}, {}", env!("CARGO_PKG_VERSION"), RUSTC_VERSION)
}

async fn ping() -> &'static str {
    "pong"
}

async fn client_ip(req: Request<Body>) -> String {
    client_addr(&req)
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_addr(req: &Request<Body>) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(addr) = forwarded {
        return addr.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(peer)| peer.ip().to_string())
        .unwrap_or_default()
}

async fn user_agent(headers: HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

async fn request_headers(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for name in headers.keys() {
        // Load balancer bookkeeping, not something the client sent
        if name.as_str().starts_with("x-amzn") {
            continue;
        }
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        out.insert(name.as_str().to_string(), joined);
    }
    Json(out)
}

async fn proto(version: Version) -> String {
    format!("Proto: {:?}", version)
}

// =============================================================================
// Time & status
// =============================================================================

async fn date() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn timestamp() -> String {
    Utc::now().timestamp().to_string()
}

async fn check_status() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": 1 }))
}

async fn generate_204() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn system_info(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(SystemReport::collect(state.started_at, state.store.stats()))
}

async fn prometheus_metrics(State(state): State<GatewayState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render(state.store.stats()),
    )
}

// =============================================================================
// DNS & GeoIP
// =============================================================================

async fn dns_empty() -> Json<BTreeMap<String, String>> {
    Json(BTreeMap::new())
}

async fn dns(Path(domains): Path<String>) -> Json<BTreeMap<String, String>> {
    let mut resp = BTreeMap::new();
    for domain in domains.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let answer = match tokio::net::lookup_host((domain, 0)).await {
            Ok(addrs) => addrs
                .map(|addr| addr.ip())
                .find(IpAddr::is_ipv4)
                .map(|ip| ip.to_string())
                .unwrap_or_default(),
            Err(e) => format!("ERR: {}", e),
        };
        resp.insert(domain.to_string(), answer);
    }
    Json(resp)
}

#[derive(Debug, Deserialize)]
struct GeoIpQuery {
    lang: Option<String>,
}

async fn geoip_self(
    State(state): State<GatewayState>,
    Query(query): Query<GeoIpQuery>,
    req: Request<Body>,
) -> Response {
    let addr = client_addr(&req);
    match lookup(&state, &addr, query.lang.as_deref()) {
        Ok(record) => (StatusCode::OK, format!("{}\n{}", addr, record)).into_response(),
        Err(resp) => resp,
    }
}

async fn geoip_addr(
    State(state): State<GatewayState>,
    Path(ip): Path<String>,
    Query(query): Query<GeoIpQuery>,
) -> Response {
    match lookup(&state, &ip, query.lang.as_deref()) {
        Ok(record) => (StatusCode::OK, record).into_response(),
        Err(resp) => resp,
    }
}

fn lookup(state: &GatewayState, addr: &str, lang: Option<&str>) -> Result<String, Response> {
    let lang = lang
        .filter(|l| !l.is_empty())
        .unwrap_or(state.settings.default_lang.as_str());

    geoip::query(state.geoip.as_deref(), addr, lang)
        .map(|record| record.render())
        .map_err(|e| {
            tracing::warn!(addr = %addr, error = %e, "GeoIP query failed");
            (StatusCode::BAD_REQUEST, e.public_message()).into_response()
        })
}

// =============================================================================
// Ephemeral store
// =============================================================================

async fn store_put(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            STORE_WRITES.with_label_values(&["too_large"]).inc();
            return (StatusCode::PAYLOAD_TOO_LARGE, "data size over limit").into_response();
        }
        Err(rejection) => {
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    if body.is_empty() {
        STORE_WRITES.with_label_values(&["empty"]).inc();
        return (StatusCode::BAD_REQUEST, "request empty").into_response();
    }

    let ttl = state.store.default_ttl();
    let size = body.len();
    let key = match state.store.put(body, ttl) {
        Ok(key) => key,
        Err(e @ StoreError::KeyExhausted { .. }) => {
            STORE_WRITES.with_label_values(&["exhausted"]).inc();
            tracing::error!(error = %e, "Store rejected upload");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    STORE_WRITES.with_label_values(&["stored"]).inc();
    tracing::info!(key = %key, bytes = size, "Stored upload");

    let scheme = header_str(&headers, "x-forwarded-proto")
        .unwrap_or(state.settings.public_scheme.as_str());
    let host = header_str(&headers, "x-forwarded-host")
        .or_else(|| header_str(&headers, HOST.as_str()))
        .unwrap_or("localhost");

    (
        StatusCode::OK,
        format!(
            "save ok, hash is {key} , addr {scheme}://{host}/store/{key} , expire in {} minute.",
            ttl.as_secs().div_ceil(60)
        ),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct StoreQuery {
    output: Option<String>,
}

async fn store_get(
    State(state): State<GatewayState>,
    Path(hash): Path<String>,
    Query(query): Query<StoreQuery>,
) -> Response {
    if !state.store.is_valid_key_format(&hash) {
        STORE_READS.with_label_values(&["malformed"]).inc();
        return (StatusCode::BAD_REQUEST, "hash format error").into_response();
    }

    let Some(value) = state.store.get(&hash) else {
        STORE_READS.with_label_values(&["miss"]).inc();
        return (StatusCode::NOT_FOUND, "hash not found").into_response();
    };

    STORE_READS.with_label_values(&["hit"]).inc();
    let digest = hex::encode(Sha256::digest(&value));

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, content_type_for(query.output.as_deref()).to_string()),
            (HeaderName::from_static(HASH_HEADER), digest),
        ],
        value,
    )
        .into_response()
}

/// Content type for the client's `output` hint; binary when absent or unknown.
fn content_type_for(output: Option<&str>) -> &'static str {
    match output {
        Some("text" | "txt" | "plain") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use echobox_core::{KeySource, StoreConfig};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(store: EphemeralStore) -> GatewayState {
        GatewayState::new(
            store,
            None,
            GatewaySettings {
                payload_limit: 64,
                public_scheme: "http".to_string(),
                default_lang: "en".to_string(),
            },
        )
    }

    fn test_router() -> (Router, EphemeralStore) {
        let store = EphemeralStore::new(StoreConfig::default()).unwrap();
        (router(test_state(store.clone())), store)
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(HOST, "echo.example")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn test_index() {
        let (app, _) = test_router();
        let (status, _, body) = send(app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"Hello World!");
    }

    #[tokio::test]
    async fn test_simple_endpoints() {
        for uri in [
            "/version",
            "/ping",
            "/ip",
            "/ua",
            "/headers",
            "/date",
            "/timestamp",
            "/check_status",
            "/dns/localhost",
            "/proto",
            "/sysinfo",
            "/metrics",
        ] {
            let (app, _) = test_router();
            let (status, _, _) = send(app, get(uri)).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
        }

        let (app, _) = test_router();
        let (status, _, body) = send(app, get("/generate_204")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_ip_prefers_forwarded_for() {
        let (app, _) = test_router();
        let req = Request::builder()
            .uri("/ip")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .extension(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5555))))
            .body(Body::empty())
            .unwrap();
        let (_, _, body) = send(app, req).await;
        assert_eq!(&body[..], b"203.0.113.9");

        let (app, _) = test_router();
        let req = Request::builder()
            .uri("/ip")
            .extension(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5555))))
            .body(Body::empty())
            .unwrap();
        let (_, _, body) = send(app, req).await;
        assert_eq!(&body[..], b"10.0.0.7");
    }

    #[tokio::test]
    async fn test_headers_drops_amzn_and_joins_values() {
        let (app, _) = test_router();
        let req = Request::builder()
            .uri("/headers")
            .header("x-amzn-trace-id", "Root=1")
            .header("accept", "text/plain")
            .header("accept", "text/html")
            .body(Body::empty())
            .unwrap();
        let (_, _, body) = send(app, req).await;
        let headers: BTreeMap<String, String> = serde_json::from_slice(&body).unwrap();

        assert_eq!(headers.get("accept").unwrap(), "text/plain,text/html");
        assert!(!headers.contains_key("x-amzn-trace-id"));
    }

    #[tokio::test]
    async fn test_proto_and_ua() {
        let (app, _) = test_router();
        let (_, _, body) = send(app, get("/proto")).await;
        assert_eq!(&body[..], b"Proto: HTTP/1.1");

        let (app, _) = test_router();
        let req = Request::builder()
            .uri("/ua")
            .header(USER_AGENT, "curl/8.0")
            .body(Body::empty())
            .unwrap();
        let (_, _, body) = send(app, req).await;
        assert_eq!(&body[..], b"curl/8.0");
    }

    #[tokio::test]
    async fn test_check_status() {
        let (app, _) = test_router();
        let (_, _, body) = send(app, get("/check_status")).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 1);
    }

    #[tokio::test]
    async fn test_geoip_errors_are_bad_request() {
        let (app, _) = test_router();
        let (status, _, body) = send(app, get("/geoip/not-an-ip")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], b"ip parse failed");

        let (app, _) = test_router();
        let (status, _, body) = send(app, get("/geoip/8.8.8.8?lang=de")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], b"geoip db read failed");
    }

    #[tokio::test]
    async fn test_store_roundtrip() {
        let (app, store) = test_router();
        let (status, _, body) = send(app.clone(), post("/store", "hello paste")).await;
        assert_eq!(status, StatusCode::OK);

        let text = String::from_utf8(body.to_vec()).unwrap();
        let key = text
            .strip_prefix("save ok, hash is ")
            .and_then(|rest| rest.split(' ').next())
            .unwrap()
            .to_string();
        assert_eq!(key.len(), 5);
        assert!(text.contains(&format!("http://echo.example/store/{}", key)));
        assert!(text.ends_with("expire in 5 minute."));
        assert!(store.has(&key));

        let (status, headers, body) = send(app, get(&format!("/store/{}", key))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"hello paste");
        assert_eq!(headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(
            headers["x-hash-sha256"],
            hex::encode(Sha256::digest(b"hello paste")).as_str()
        );
    }

    #[tokio::test]
    async fn test_store_forwarded_link() {
        let (app, _) = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/store")
            .header("x-forwarded-proto", "https")
            .header("x-forwarded-host", "paste.example")
            .header(HOST, "internal:8000")
            .body(Body::from("x"))
            .unwrap();
        let (_, _, body) = send(app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("https://paste.example/store/"));
    }

    #[tokio::test]
    async fn test_store_output_hint() {
        let (app, store) = test_router();
        store.set("abcde", "<b>hi</b>", Duration::from_secs(60));

        let (_, headers, _) = send(app.clone(), get("/store/abcde?output=html")).await;
        assert_eq!(headers[CONTENT_TYPE], "text/html");

        let (_, headers, _) = send(app.clone(), get("/store/abcde?output=txt")).await;
        assert_eq!(headers[CONTENT_TYPE], "text/plain");

        let (_, headers, _) = send(app, get("/store/abcde?output=gif")).await;
        assert_eq!(headers[CONTENT_TYPE], "application/octet-stream");
    }

    #[tokio::test]
    async fn test_store_rejects_empty_and_oversized() {
        let (app, store) = test_router();

        let (status, _, body) = send(app.clone(), post("/store", Body::empty())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], b"request empty");

        let (status, _, body) = send(app, post("/store", vec![0u8; 65])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(&body[..], b"data size over limit");

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_get_validation() {
        let (app, _) = test_router();
        let (status, _, body) = send(app.clone(), get("/store/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], b"hash format error");

        let (status, _, body) = send(app.clone(), get("/store/ABCDE")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], b"hash format error");

        let (status, _, body) = send(app, get("/store/zzzzz")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(&body[..], b"hash not found");
    }

    #[tokio::test]
    async fn test_version_reports_toolchain() {
        let (app, _) = test_router();
        let (_, _, body) = send(app, get("/version")).await;
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert_eq!(
            text,
            format!("version: {}, {}", env!("CARGO_PKG_VERSION"), RUSTC_VERSION)
        );
        assert!(RUSTC_VERSION.starts_with("rustc "));
    }

    struct SameKey;

    impl KeySource for SameKey {
        fn generate(&self, _length: usize) -> String {
            "aaaaa".to_string()
        }
    }

    #[tokio::test]
    async fn test_store_exhausted_is_server_error() {
        let store = EphemeralStore::with_key_source(StoreConfig::default(), SameKey).unwrap();
        store.set("aaaaa", "taken", Duration::from_secs(60));
        let app = router(test_state(store));

        let (status, _, body) = send(app, post("/store", "x")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(String::from_utf8_lossy(&body).contains("No free key after 8 attempts"));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(None), "application/octet-stream");
        assert_eq!(content_type_for(Some("plain")), "text/plain");
        assert_eq!(content_type_for(Some("htm")), "text/html");
        assert_eq!(content_type_for(Some("png")), "image/png");
        assert_eq!(content_type_for(Some("jpeg")), "image/jpeg");
    }
}
