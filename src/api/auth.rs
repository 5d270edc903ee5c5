//! Login, signed session cookies and the per-session context handed to handlers.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{ConnectInfo, Request, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::AppState;
use super::envelope::{ApiError, ApiResult, ok};
use crate::core::ProfileInput;

pub const SESSION_COOKIE: &str = "fin_session";

const LOGIN_ATTEMPTS_PER_MINUTE: NonZeroU32 = NonZeroU32::new(10).unwrap();

pub type LoginLimiter = DefaultKeyedRateLimiter<IpAddr>;

pub fn login_limiter() -> LoginLimiter {
    RateLimiter::keyed(Quota::per_minute(LOGIN_ATTEMPTS_PER_MINUTE))
}

/// Only an Argon2 hash of the password is kept.
pub struct Credentials {
    username: String,
    password_hash: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: &str) -> Result<Self, String> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| format!("failed to hash login password: {e}"))?
            .to_string();
        Ok(Self {
            username: username.into(),
            password_hash,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        if username != self.username {
            return false;
        }
        let Ok(parsed) = PasswordHash::new(&self.password_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub username: String,
    pub profile: Option<ProfileInput>,
}

struct SessionEntry {
    username: String,
    expires_at: Instant,
    profile: Option<ProfileInput>,
}

/// In-memory sessions keyed by id. Tokens are `<uuid>.<sha256(secret:uuid)>`.
pub struct SessionStore {
    secret: String,
    ttl: Duration,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionStore {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn sign(&self, id: &Uuid) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(id.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn verify_token(&self, token: &str) -> Option<Uuid> {
        let (id, signature) = token.split_once('.')?;
        let id = Uuid::parse_str(id).ok()?;
        let expected = self.sign(&id);
        bool::from(expected.as_bytes().ct_eq(signature.as_bytes())).then_some(id)
    }

    pub async fn create(&self, username: &str) -> String {
        let id = Uuid::new_v4();
        let now = Instant::now();
        let entry = SessionEntry {
            username: username.to_string(),
            expires_at: now + self.ttl,
            profile: None,
        };

        // sweep sessions nobody came back for
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(id, entry);
        drop(sessions);

        format!("{id}.{}", self.sign(&id))
    }

    pub async fn resolve(&self, token: &str) -> Option<SessionContext> {
        let id = self.verify_token(token)?;
        {
            let sessions = self.sessions.read().await;
            let entry = sessions.get(&id)?;
            if entry.expires_at > Instant::now() {
                return Some(SessionContext {
                    session_id: id,
                    username: entry.username.clone(),
                    profile: entry.profile.clone(),
                });
            }
        }
        self.sessions.write().await.remove(&id);
        None
    }

    pub async fn destroy(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    pub async fn store_profile(&self, id: Uuid, profile: ProfileInput) {
        if let Some(entry) = self.sessions.write().await.get_mut(&id) {
            entry.profile = Some(profile);
        }
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

pub fn random_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

fn session_cookie(token: &str, max_age: Duration) -> HeaderValue {
    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.as_secs()
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers()) else {
        return ApiError::Unauthorized.into_response();
    };
    let Some(context) = state.sessions.resolve(&token).await else {
        return ApiError::Unauthorized.into_response();
    };
    request.extensions_mut().insert(context);
    next.run(request).await
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    state.login_limiter.retain_recent();
    if state.login_limiter.check_key(&peer.ip()).is_err() {
        log::warn!("login rate limit hit for {}", peer.ip());
        return Err(ApiError::RateLimited);
    }

    let Json(login) = payload.map_err(|_| {
        ApiError::Validation("Invalid request format, username and password required".into())
    })?;

    if !state.credentials.verify(&login.username, &login.password) {
        log::warn!("failed login attempt for user '{}'", login.username);
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.sessions.create(&login.username).await;
    log::info!("user '{}' logged in", login.username);

    let mut response = ok(json!({ "username": login.username }));
    response.headers_mut().insert(
        header::SET_COOKIE,
        session_cookie(&token, state.sessions.ttl()),
    );
    Ok(response)
}

pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Response {
    state.sessions.destroy(session.session_id).await;
    log::info!("user '{}' logged out", session.username);

    let mut response = ok(json!({ "logged_out": true }));
    response
        .headers_mut()
        .insert(header::SET_COOKIE, session_cookie("", Duration::ZERO));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_verify_only_the_configured_pair() {
        let credentials = Credentials::new("mingkai", "wang").expect("hash");
        assert_eq!(credentials.username(), "mingkai");
        assert!(credentials.verify("mingkai", "wang"));
        assert!(!credentials.verify("mingkai", "wrong"));
        assert!(!credentials.verify("someone", "wang"));
    }

    #[tokio::test]
    async fn created_token_resolves_to_session() {
        let store = SessionStore::new("secret", Duration::from_secs(60));
        let token = store.create("mingkai").await;

        let context = store.resolve(&token).await.expect("live session");
        assert_eq!(context.username, "mingkai");
        assert!(context.profile.is_none());
    }

    #[tokio::test]
    async fn tampered_or_foreign_tokens_are_rejected() {
        let store = SessionStore::new("secret", Duration::from_secs(60));
        let token = store.create("mingkai").await;
        let (id, _) = token.split_once('.').expect("signed token");

        assert!(store.resolve(&format!("{id}.deadbeef")).await.is_none());
        assert!(store.resolve(id).await.is_none());

        let mut flipped = token.clone();
        let last = if flipped.ends_with('0') { '1' } else { '0' };
        flipped.pop();
        flipped.push(last);
        assert!(store.verify_token(&flipped).is_none());

        let other = SessionStore::new("other-secret", Duration::from_secs(60));
        assert!(other.verify_token(&token).is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_removed_on_access() {
        let store = SessionStore::new("secret", Duration::from_millis(10));
        let token = store.create("mingkai").await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(store.resolve(&token).await.is_none());
        assert_eq!(store.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn abandoned_sessions_are_swept_on_next_login() {
        let store = SessionStore::new("secret", Duration::from_millis(10));
        store.create("mingkai").await;
        store.create("mingkai").await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let token = store.create("mingkai").await;
        assert_eq!(store.active_sessions().await, 1);
        assert!(store.resolve(&token).await.is_some());
    }

    #[tokio::test]
    async fn stored_profile_is_visible_in_later_contexts() {
        let store = SessionStore::new("secret", Duration::from_secs(60));
        let token = store.create("mingkai").await;
        let id = store.verify_token(&token).expect("valid");

        let profile = ProfileInput {
            age: "30".into(),
            occupation: "nurse".into(),
            monthly_income: "4000".into(),
            monthly_expenses: "2500".into(),
            assets: "savings".into(),
            risk_preference: "conservative".into(),
        };
        store.store_profile(id, profile.clone()).await;

        let context = store.resolve(&token).await.expect("live session");
        assert_eq!(context.profile, Some(profile));
    }

    #[tokio::test]
    async fn destroy_ends_the_session() {
        let store = SessionStore::new("secret", Duration::from_secs(60));
        let token = store.create("mingkai").await;
        let id = store.verify_token(&token).expect("valid");

        store.destroy(id).await;
        assert!(store.resolve(&token).await.is_none());
    }

    #[test]
    fn session_cookie_is_read_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; fin_session=abc.def; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn login_limiter_budgets_each_address_separately() {
        let limiter = login_limiter();
        let noisy: IpAddr = "203.0.113.7".parse().expect("ip");
        let quiet: IpAddr = "198.51.100.20".parse().expect("ip");

        for _ in 0..10 {
            assert!(limiter.check_key(&noisy).is_ok());
        }
        assert!(limiter.check_key(&noisy).is_err());
        assert!(limiter.check_key(&quiet).is_ok());
    }
}
