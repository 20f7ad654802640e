//! Supabase GoTrue client: sign-up, sign-in, refresh, and session tracking.
//!
//! Sessions are persisted through a [`SessionPersistence`] implementation
//! chosen by the front end and broadcast on a `watch` channel so that guards
//! and controllers can react to sign-in and sign-out.

use std::fmt;
use std::sync::Arc;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::util::{compact_text, is_http_url, normalize_text_option, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }

    /// Present and not expired.
    #[must_use]
    pub fn is_valid(session: Option<&Self>) -> bool {
        session.is_some_and(|session| !session.is_expired())
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Extra fields collected by the sign-up form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpProfile {
    pub full_name: Option<String>,
}

impl SignUpProfile {
    #[must_use]
    pub fn with_full_name(full_name: impl Into<String>) -> Self {
        Self {
            full_name: normalize_text_option(Some(full_name.into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where the current session lives between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Persistence that forgets everything when the process exits.
#[derive(Debug, Clone, Default)]
pub struct EphemeralSessionStore {
    session: Arc<std::sync::Mutex<Option<AuthSession>>>,
}

impl SessionPersistence for EphemeralSessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self
            .session
            .lock()
            .map_err(|_| AuthError::SecureStorage("session lock poisoned".to_string()))?
            .clone())
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        *self
            .session
            .lock()
            .map_err(|_| AuthError::SecureStorage("session lock poisoned".to_string()))? =
            Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        *self
            .session
            .lock()
            .map_err(|_| AuthError::SecureStorage("session lock poisoned".to_string()))? = None;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
    current: Arc<watch::Sender<Option<AuthSession>>>,
}

impl<S: SessionPersistence> fmt::Debug for SupabaseAuthClient<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SupabaseAuthClient")
            .field("auth_url", &self.auth_url)
            .field("signed_in", &self.current.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        let (current, _) = watch::channel(None);
        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
            store,
            current: Arc::new(current),
        })
    }

    /// Session-change notifications. The value is `None` while signed out.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.current.subscribe()
    }

    /// A valid session, restoring or refreshing the persisted one if needed.
    pub async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        let cached = self.current.borrow().clone();
        match cached {
            Some(session) if !session.is_expired() => Ok(Some(session)),
            _ => self.restore_session().await,
        }
    }

    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            self.publish(None);
            return Ok(None);
        };

        if !stored_session.is_expired() {
            self.publish(Some(stored_session.clone()));
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.forget_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
            "data": { "full_name": profile.full_name },
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        match response.into_session()? {
            Some(session) => {
                self.remember_session(&session)?;
                tracing::info!(user_id = %session.user.id, "Signed up");
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&payload),
        );

        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Sign-in response did not include an active session".to_string())
        })?;

        self.remember_session(&session)?;
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({ "refresh_token": refresh_token });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Refresh response did not include an active session".to_string())
        })?;

        self.remember_session(&session)?;
        Ok(session)
    }

    /// Revoke the session server-side and forget it locally.
    ///
    /// An already-revoked token still clears the local session.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let request = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);

        let response = request.send().await?;
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        self.forget_session()?;
        tracing::info!("Signed out");
        Ok(())
    }

    fn remember_session(&self, session: &AuthSession) -> AuthResult<()> {
        self.store.save_session(session)?;
        self.publish(Some(session.clone()));
        Ok(())
    }

    fn forget_session(&self) -> AuthResult<()> {
        self.store.clear_session()?;
        self.publish(None);
        Ok(())
    }

    fn publish(&self, session: Option<AuthSession>) {
        self.current.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                *current = session;
                true
            }
        });
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<SupabaseAuthResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<SupabaseAuthResponse>().await?)
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let project_url = normalize_project_url(url)?;
    if project_url.ends_with("/auth/v1") {
        Ok(project_url)
    } else {
        Ok(format!("{project_url}/auth/v1"))
    }
}

/// Trimmed project base URL without a trailing slash.
pub fn normalize_project_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !is_http_url(trimmed) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
    session: Option<SessionFields>,
}

#[derive(Debug, Deserialize)]
struct SessionFields {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

impl SupabaseAuthResponse {
    /// Token fields may sit at the top level or under `session`.
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let nested = self.session.unwrap_or(SessionFields {
            access_token: None,
            refresh_token: None,
            expires_at: None,
            expires_in: None,
            user: None,
        });

        let access_token = self.access_token.or(nested.access_token);
        let refresh_token = self.refresh_token.or(nested.refresh_token);
        let expires_at = self.expires_at.or(nested.expires_at).or_else(|| {
            self.expires_in
                .or(nested.expires_in)
                .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
        });
        let user = self.user.or(nested.user).map(AuthUser::from);

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: value.id,
            email: value.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

/// Human-readable message from a GoTrue, PostgREST or Storage error body.
pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SupabaseErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: i64) -> AuthSession {
        AuthSession {
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at,
            user: AuthUser {
                id: "user".to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn normalize_auth_url_appends_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co/").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn normalize_auth_url_keeps_existing_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co/auth/v1").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn normalize_project_url_rejects_missing_scheme() {
        assert!(matches!(
            normalize_project_url("demo.supabase.co"),
            Err(AuthError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn response_without_session_fields_means_confirmation_required() {
        let response: SupabaseAuthResponse =
            serde_json::from_str(r#"{"user":{"id":"user","email":"user@example.com"}}"#).unwrap();
        assert!(response.into_session().unwrap().is_none());
    }

    #[test]
    fn response_with_nested_session_is_accepted() {
        let response: SupabaseAuthResponse = serde_json::from_str(
            r#"{"session":{"access_token":"a","refresh_token":"r","expires_in":3600,
                "user":{"id":"user","email":null}}}"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert_eq!(session.user.id, "user");
        assert!(!session.is_expired());
    }

    #[test]
    fn session_validity_honours_expiry_skew() {
        let now = unix_timestamp_now();
        assert!(!AuthSession::is_valid(None));
        assert!(!AuthSession::is_valid(Some(&session(now + 30))));
        assert!(AuthSession::is_valid(Some(&session(now + 3600))));
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(1_700_000_000));
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn restore_publishes_persisted_session() {
        let store = EphemeralSessionStore::default();
        let persisted = session(unix_timestamp_now() + 3600);
        store.save_session(&persisted).unwrap();

        let client = SupabaseAuthClient::new("https://demo.supabase.co", "anon", store).unwrap();
        let updates = client.subscribe();
        assert!(updates.borrow().is_none());

        let restored = client.current_session().await.unwrap();
        assert_eq!(restored, Some(persisted.clone()));
        assert_eq!(*updates.borrow(), Some(persisted));
    }

    #[test]
    fn api_error_prefers_message_fields() {
        let message = parse_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(message, "Invalid login credentials (400)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, " "), "HTTP 502");
    }
}
