//! Session-holding API client for embedding applications.
//!
//! Talks to the server over bearer credentials rather than cookies, keeps
//! the credential pair in memory, and transparently rides out access
//! credential expiry with a single-flight refresh.

mod error;
mod http;
mod session;

pub use error::{ClientError, RefreshFailure};
pub use session::{NewAccount, SessionClient, SessionEvent, TokenPair};
