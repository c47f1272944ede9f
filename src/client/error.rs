use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced to the embedding application.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A call that requires a session was made without one.
    #[error("not logged in")]
    NotLoggedIn,

    /// The session is gone for good. The refresh credential was rejected,
    /// so no amount of retrying will revive it; log in again.
    #[error("session ended, log in again")]
    SessionEnded,

    /// The server rejected the request with a non-success status.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a verdict. The session is intact and the
    /// caller may retry.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A credential refresh could not reach the server. Distinct from
    /// [`ClientError::SessionEnded`]: the stored credentials are still valid.
    #[error("credential refresh failed: {0}")]
    RefreshTransport(String),
}

/// Outcome of a shared refresh flight. Cloneable so every request awaiting
/// the same flight receives its own copy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The refresh endpoint said 401: the credential is stale or revoked.
    #[error("refresh credential rejected")]
    SessionEnded,

    /// The exchange failed without a verdict on the credential.
    #[error("refresh did not complete: {0}")]
    Transport(String),
}

impl From<RefreshFailure> for ClientError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::SessionEnded => ClientError::SessionEnded,
            RefreshFailure::Transport(message) => ClientError::RefreshTransport(message),
        }
    }
}

/// Maximum length of a response body quoted in an error message.
const MAX_ERROR_BODY_LEN: usize = 300;

/// The server's error envelope.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ClientError {
    /// Build a [`ClientError::Rejected`] from a non-success response,
    /// preferring the server's error envelope over the raw body.
    pub(crate) async fn rejected(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let raw = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&raw) {
            Ok(body) => body.error,
            Err(_) => truncate_body(&raw),
        };
        ClientError::Rejected { status, message }
    }

    /// True when retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::RefreshTransport(_)
        )
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... ({} bytes total)", &body[..end], body.len())
    }
}
