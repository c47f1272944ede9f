//! Cookie parsing and construction for session credentials.

use axum::http::header;

/// Cookie name for the access credential (short-lived, 1 hour).
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh credential (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Attributes shared by every session cookie this server sets or clears.
/// One instance is built at startup from the public origin; handlers never
/// assemble cookie attributes ad hoc.
#[derive(Debug, Clone)]
pub struct CookieSpec {
    /// Emit the Secure attribute (https deployments)
    pub secure: bool,
    /// Cookie Domain; none for localhost
    pub domain: Option<String>,
}

impl CookieSpec {
    /// Build a Set-Cookie value carrying `value` for `max_age_secs`.
    pub fn set(&self, name: &str, value: &str, max_age_secs: u64) -> String {
        let domain = match &self.domain {
            Some(d) => format!("; Domain={}", d),
            None => String::new(),
        };
        let secure = if self.secure { "; Secure" } else { "" };
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}{}",
            name, value, max_age_secs, domain, secure
        )
    }

    /// Build a Set-Cookie value that expires the cookie immediately.
    pub fn clear(&self, name: &str) -> String {
        self.set(name, "", 0)
    }
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}
