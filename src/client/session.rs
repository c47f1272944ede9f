//! Client-side session manager.
//!
//! [`SessionClient`] owns one session against the server: the credential
//! pair, the identity it belongs to, and a single-flight refresh slot.
//! Concurrent requests that hit a 401 all await one shared refresh
//! exchange instead of racing the rotation endpoint, then each retries
//! its original request at most once with the fresh credential.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::client::error::{ClientError, RefreshFailure};
use crate::client::http::HttpClient;
use crate::db::UserSummary;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Lifecycle notifications for subscribers (UI layers, persistence hooks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    Ended,
}

/// The credential pair in its wire shape. Serializable so the embedding
/// application can persist it between runs and hand it back to
/// [`SessionClient::resume`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Details for a new account registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password: String,
}

#[derive(Default)]
struct SessionState {
    tokens: Option<TokenPair>,
    user: Option<UserSummary>,
}

type RefreshFlight = Shared<BoxFuture<'static, Result<String, RefreshFailure>>>;

struct ClientInner {
    http: HttpClient,
    state: Mutex<SessionState>,
    refresh_flight: Mutex<Option<RefreshFlight>>,
    events: broadcast::Sender<SessionEvent>,
}

/// A session-holding API client. Cloning is cheap and every clone shares
/// the same session and refresh slot.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<ClientInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(ClientInner {
                http: HttpClient::new(base_url)?,
                state: Mutex::new(SessionState::default()),
                refresh_flight: Mutex::new(None),
                events,
            }),
        })
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// The current credential pair, for the embedding application to
    /// persist. `None` when no session is active.
    pub fn tokens(&self) -> Option<TokenPair> {
        lock(&self.inner.state).tokens.clone()
    }

    /// The identity of the active session, as last reported by the server.
    pub fn current_identity(&self) -> Option<UserSummary> {
        lock(&self.inner.state).user.clone()
    }

    /// Create an account. Registration mints no credentials; follow with
    /// [`Self::login`].
    pub async fn register(&self, account: &NewAccount) -> Result<UserSummary, ClientError> {
        let response = self
            .inner
            .http
            .post("/api/v1/users/register", account, None)
            .await?;
        let body: UserEnvelope = HttpClient::expect_json(response).await?;
        Ok(body.user)
    }

    /// Log in with a handle (username or email) and password, replacing any
    /// session this client already held.
    pub async fn login(&self, handle: &str, password: &str) -> Result<UserSummary, ClientError> {
        let response = self
            .inner
            .http
            .post("/api/v1/users/login", &LoginBody { handle, password }, None)
            .await?;
        let body: SessionResponse = HttpClient::expect_json(response).await?;

        // A flight from the previous session must not serve this one.
        *lock(&self.inner.refresh_flight) = None;
        {
            let mut state = lock(&self.inner.state);
            state.tokens = Some(TokenPair {
                access_token: body.access_token,
                refresh_token: body.refresh_token,
            });
            state.user = Some(body.user.clone());
        }
        let _ = self.inner.events.send(SessionEvent::LoggedIn);
        Ok(body.user)
    }

    /// Install a previously persisted credential pair as the live session.
    ///
    /// The pair is taken at face value; no exchange happens here. The first
    /// authorized call validates it, riding out an expired access
    /// credential through the normal refresh path or ending the session if
    /// the refresh credential is dead too.
    pub fn resume(&self, tokens: TokenPair) {
        *lock(&self.inner.refresh_flight) = None;
        {
            let mut state = lock(&self.inner.state);
            state.tokens = Some(tokens);
            state.user = None;
        }
        let _ = self.inner.events.send(SessionEvent::LoggedIn);
    }

    /// Fetch the identity behind the session from the server.
    pub async fn current_user(&self) -> Result<UserSummary, ClientError> {
        self.fetch_current_user().await
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let body = ChangePasswordBody { old_password, new_password };
        let response = self
            .authorized_post("/api/v1/users/change-password", &body)
            .await?;
        HttpClient::expect_success(response).await
    }

    /// End the session on the server and locally. Tolerates a server that
    /// no longer honors the session; the local outcome is the same.
    pub async fn logout(&self) -> Result<(), ClientError> {
        match self.authorized_post_empty("/api/v1/users/logout").await {
            Ok(response) => match HttpClient::expect_success(response).await {
                Ok(()) => {
                    self.end_session();
                    Ok(())
                }
                Err(ClientError::Rejected { status: 401, .. }) => {
                    self.end_session();
                    Ok(())
                }
                Err(other) => Err(other),
            },
            // The refresh flight already tore the session down.
            Err(ClientError::SessionEnded) => Ok(()),
            Err(other) => Err(other),
        }
    }

    async fn fetch_current_user(&self) -> Result<UserSummary, ClientError> {
        let response = self.authorized_get("/api/v1/users/current-user").await?;
        let body: UserEnvelope = HttpClient::expect_json(response).await?;
        lock(&self.inner.state).user = Some(body.user.clone());
        Ok(body.user)
    }

    fn access_token(&self) -> Option<String> {
        lock(&self.inner.state)
            .tokens
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    fn end_session(&self) {
        *lock(&self.inner.refresh_flight) = None;
        let had_session = {
            let mut state = lock(&self.inner.state);
            let had = state.tokens.is_some();
            state.tokens = None;
            state.user = None;
            had
        };
        if had_session {
            let _ = self.inner.events.send(SessionEvent::Ended);
        }
    }

    async fn authorized_get(&self, path: &str) -> Result<Response, ClientError> {
        let token = self.access_token().ok_or(ClientError::NotLoggedIn)?;
        let response = self.inner.http.get(path, Some(&token)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let fresh = self.refresh_access_token().await?;
        Ok(self.inner.http.get(path, Some(&fresh)).await?)
    }

    async fn authorized_post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, ClientError> {
        let token = self.access_token().ok_or(ClientError::NotLoggedIn)?;
        let response = self.inner.http.post(path, body, Some(&token)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let fresh = self.refresh_access_token().await?;
        Ok(self.inner.http.post(path, body, Some(&fresh)).await?)
    }

    async fn authorized_post_empty(&self, path: &str) -> Result<Response, ClientError> {
        let token = self.access_token().ok_or(ClientError::NotLoggedIn)?;
        let response = self.inner.http.post_empty(path, Some(&token)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let fresh = self.refresh_access_token().await?;
        Ok(self.inner.http.post_empty(path, Some(&fresh)).await?)
    }

    /// Obtain a fresh access credential, flying at most one refresh
    /// exchange at a time.
    ///
    /// The first caller installs a shared future in the slot; concurrent
    /// callers clone and await the same one. Whoever finds the slot still
    /// holding the finished flight clears it.
    async fn refresh_access_token(&self) -> Result<String, RefreshFailure> {
        let flight = {
            let mut slot = lock(&self.inner.refresh_flight);
            if let Some(flight) = slot.as_ref() {
                flight.clone()
            } else {
                let refresh_token = {
                    let state = lock(&self.inner.state);
                    match state.tokens.as_ref() {
                        Some(pair) => pair.refresh_token.clone(),
                        None => return Err(RefreshFailure::SessionEnded),
                    }
                };
                let flight = launch_refresh(Arc::clone(&self.inner), refresh_token);
                *slot = Some(flight.clone());
                flight
            }
        };

        let outcome = flight.clone().await;

        let mut slot = lock(&self.inner.refresh_flight);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }
        drop(slot);

        outcome
    }
}

/// Build the shared refresh future. It exchanges the refresh credential,
/// applies the outcome to the session state, and reports the new access
/// credential to every awaiting request.
fn launch_refresh(inner: Arc<ClientInner>, refresh_token: String) -> RefreshFlight {
    async move {
        let exchanged = exchange_refresh_token(&inner.http, &refresh_token).await;
        match exchanged {
            Ok(pair) => {
                let access = pair.access_token.clone();
                {
                    let mut state = lock(&inner.state);
                    let still_current = state
                        .tokens
                        .as_ref()
                        .is_some_and(|held| held.refresh_token == refresh_token);
                    if !still_current {
                        // A login or logout replaced the session mid-flight;
                        // the rotated pair belongs to a session that is gone.
                        return Err(RefreshFailure::SessionEnded);
                    }
                    state.tokens = Some(pair);
                }
                let _ = inner.events.send(SessionEvent::Refreshed);
                Ok(access)
            }
            Err(RefreshFailure::SessionEnded) => {
                let ended_live_session = {
                    let mut state = lock(&inner.state);
                    let still_current = state
                        .tokens
                        .as_ref()
                        .is_some_and(|held| held.refresh_token == refresh_token);
                    if still_current {
                        state.tokens = None;
                        state.user = None;
                    }
                    still_current
                };
                if ended_live_session {
                    let _ = inner.events.send(SessionEvent::Ended);
                }
                Err(RefreshFailure::SessionEnded)
            }
            Err(transient) => Err(transient),
        }
    }
    .boxed()
    .shared()
}

async fn exchange_refresh_token(
    http: &HttpClient,
    refresh_token: &str,
) -> Result<TokenPair, RefreshFailure> {
    let response = http
        .post("/api/v1/users/refresh-token", &RefreshBody { refresh_token }, None)
        .await
        .map_err(|e| RefreshFailure::Transport(e.to_string()))?;
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(RefreshFailure::SessionEnded);
    }
    if !status.is_success() {
        return Err(RefreshFailure::Transport(format!("refresh returned {status}")));
    }
    response
        .json::<TokenPair>()
        .await
        .map_err(|e| RefreshFailure::Transport(e.to_string()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody<'a> {
    handle: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordBody<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user: UserSummary,
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: UserSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pair_wire_shape_is_camel_case() {
        let pair = TokenPair {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
    }

    #[tokio::test]
    async fn session_calls_require_a_session() {
        let client = SessionClient::new("http://127.0.0.1:1").unwrap();
        assert!(client.tokens().is_none());
        assert!(client.current_identity().is_none());

        let err = client.current_user().await.unwrap_err();
        assert!(matches!(err, ClientError::NotLoggedIn));
        let err = client.change_password("old", "new").await.unwrap_err();
        assert!(matches!(err, ClientError::NotLoggedIn));
    }
}
