#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use barista::{jwa, jwk, jwt, Base64Url, Jwks, Jwt};

use crate::ValidatorConfig;

pub const KEY_ID: &str = "coffeeshop-test-key";
pub const ROTATED_KEY_ID: &str = "coffeeshop-rotated-key";
pub const DOMAIN: &str = "barista.example.auth0.com";
pub const AUDIENCE: &str = "coffeeshop";

pub const JWKS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../barista/data/rsa/jwks.json"
));
pub const ROTATED_JWKS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../barista/data/rsa/jwks-rotated.json"
));
const PRIVATE_KEY_DER: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../barista/data/rsa/private.der"
));

pub fn jwks() -> Result<Jwks, serde_json::Error> {
    serde_json::from_str(JWKS)
}

pub fn rotated_jwks() -> Result<Jwks, serde_json::Error> {
    serde_json::from_str(ROTATED_JWKS)
}

pub fn config() -> ValidatorConfig {
    ValidatorConfig::new(DOMAIN, AUDIENCE)
}

pub fn payload(exp: u64, permissions: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "iss": format!("https://{}/", DOMAIN),
        "sub": "auth0|barista",
        "aud": AUDIENCE,
        "iat": exp.saturating_sub(86_400),
        "exp": exp,
        "azp": "coffeeshop-frontend",
        "scope": "",
        "permissions": permissions,
    })
}

pub fn sign(kid: Option<&str>, payload: &serde_json::Value) -> Jwt {
    sign_with(jwa::rsa::SigningAlgorithm::RS256, kid, payload)
}

pub fn sign_with(
    alg: jwa::rsa::SigningAlgorithm,
    kid: Option<&str>,
    payload: &serde_json::Value,
) -> Jwt {
    let key = jwa::rsa::PrivateKey::from_der(PRIVATE_KEY_DER).unwrap();
    let headers = match kid {
        Some(kid) => jwt::BasicHeaders::with_key_id(alg.into(), jwk::KeyId::new(kid.to_owned())),
        None => jwt::BasicHeaders::new(alg.into()),
    };
    Jwt::try_from_parts_with_signature(&headers, payload, &key).unwrap()
}

/// Builds a token with an arbitrary header and a signature that no key
/// will accept
pub fn forge(header: &serde_json::Value, payload: &serde_json::Value) -> Jwt {
    let h = Base64Url::from_raw(serde_json::to_vec(header).unwrap());
    let p = Base64Url::from_raw(serde_json::to_vec(payload).unwrap());
    let s = Base64Url::from_raw(vec![0x5a; 256]);
    Jwt::new(format!("{}.{}.{}", h, p, s))
}

const ETAG: &str = "\"coffeeshop-jwks-v1\"";

#[derive(Debug)]
struct ServerState {
    body: &'static str,
    requests: AtomicUsize,
    full_responses: AtomicUsize,
}

/// A local key set endpoint that honors `If-None-Match`
#[derive(Debug)]
pub struct JwksServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl JwksServer {
    pub async fn start(body: &'static str) -> std::io::Result<Self> {
        let state = Arc::new(ServerState {
            body,
            requests: AtomicUsize::new(0),
            full_responses: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/.well-known/jwks.json", get(serve_jwks))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move { axum::serve(listener, app).await });

        Ok(Self { addr, state })
    }

    pub fn url(&self) -> String {
        format!("http://{}/.well-known/jwks.json", self.addr)
    }

    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn full_responses(&self) -> usize {
        self.state.full_responses.load(Ordering::SeqCst)
    }
}

async fn serve_jwks(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    if headers
        .get(header::IF_NONE_MATCH)
        .is_some_and(|v| v == ETAG)
    {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    state.full_responses.fetch_add(1, Ordering::SeqCst);
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::ETAG, ETAG),
        ],
        state.body,
    )
        .into_response()
}
