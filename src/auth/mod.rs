//! Session authentication.
//!
//! Dual-credential system: short-lived access credentials (1 hour,
//! stateless) and long-lived refresh credentials (7 days, mirrored in the
//! user's single session slot). Guarded routes verify the access credential
//! only; rotation is explicit through the refresh endpoint.

mod cookie;
mod errors;
mod guard;
mod state;

pub use cookie::{ACCESS_COOKIE_NAME, CookieSpec, REFRESH_COOKIE_NAME, get_cookie};
pub use errors::AuthError;
pub use guard::{CurrentUser, SessionGuard};
pub use state::HasAuthState;
