//! Signed credential minting and verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Credential kind, carried in the `tok` claim so a decoded token
/// self-describes what it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived credential presented on every guarded request
    Access,
    /// Long-lived credential, mirrored in the user's refresh slot
    Refresh,
}

impl TokenKind {
    /// Lifetime of a freshly minted credential of this kind.
    pub fn ttl_secs(self) -> u64 {
        match self {
            TokenKind::Access => ACCESS_TOKEN_TTL_SECS,
            TokenKind::Refresh => REFRESH_TOKEN_TTL_SECS,
        }
    }

    fn other(self) -> TokenKind {
        match self {
            TokenKind::Access => TokenKind::Refresh,
            TokenKind::Refresh => TokenKind::Access,
        }
    }
}

/// Claims carried by both credential kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// Credential kind
    pub tok: TokenKind,
    /// Unique token id. Every mint must differ from its predecessor even
    /// within the same second, or rotation could not tell old from new.
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access credential lifetime: 1 hour
pub const ACCESS_TOKEN_TTL_SECS: u64 = 60 * 60;

/// Refresh credential lifetime: 7 days
pub const REFRESH_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Signing configuration. Each kind has its own secret, so a forged `tok`
/// claim can never move a token across the kind boundary.
#[derive(Clone)]
pub struct TokenConfig {
    access: KeyPair,
    refresh: KeyPair,
}

/// A freshly minted credential.
#[derive(Debug, Clone)]
pub struct MintedToken {
    /// The signed token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Lifetime in seconds
    pub ttl: u64,
}

impl TokenConfig {
    /// Create a token configuration from the two per-kind secrets.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Mint a credential of the given kind for a subject.
    pub fn mint(&self, kind: TokenKind, subject: &str) -> Result<MintedToken, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TokenError::Clock)?
            .as_secs();

        let ttl = kind.ttl_secs();
        let exp = now + ttl;

        let claims = Claims {
            sub: subject.to_string(),
            tok: kind,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.keys(kind).encoding)
            .map_err(TokenError::Encoding)?;

        Ok(MintedToken {
            token,
            issued_at: now,
            expires_at: exp,
            ttl,
        })
    }

    /// Verify a credential as the given kind and return its claims.
    ///
    /// Zero clock leeway: a token is rejected the second it expires.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let decoded =
            jsonwebtoken::decode::<Claims>(token, &self.keys(kind).decoding, &validation);

        match decoded {
            Ok(data) => {
                if data.claims.tok != kind {
                    return Err(TokenError::WrongKind);
                }
                Ok(data.claims)
            }
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                ErrorKind::InvalidSignature => {
                    if self.signed_as(kind.other(), token) {
                        Err(TokenError::WrongKind)
                    } else {
                        Err(TokenError::Malformed)
                    }
                }
                _ => Err(TokenError::Malformed),
            },
        }
    }

    /// Whether `token` carries a valid signature under `kind`'s key.
    /// Expiry is ignored: an expired token of the other kind is still a
    /// wrong-kind token, not garbage.
    fn signed_as(&self, kind: TokenKind, token: &str) -> bool {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        jsonwebtoken::decode::<Claims>(token, &self.keys(kind).decoding, &validation).is_ok()
    }
}

/// Errors from minting or verifying credentials.
#[derive(Debug)]
pub enum TokenError {
    /// Token was valid once but its lifetime has passed
    Expired,
    /// Token is not one of ours (bad signature, bad structure)
    Malformed,
    /// Token is valid but of the other kind (e.g. refresh presented as access)
    WrongKind,
    /// Error signing the token
    Encoding(jsonwebtoken::errors::Error),
    /// System clock before the Unix epoch
    Clock,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::Malformed => write!(f, "Token malformed"),
            TokenError::WrongKind => write!(f, "Wrong token kind"),
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Clock => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TokenConfig {
        TokenConfig::new(
            b"access-secret-for-testing-only-0",
            b"refresh-secret-for-testing-only",
        )
    }

    #[test]
    fn test_mint_and_verify_access() {
        let config = test_config();

        let minted = config.mint(TokenKind::Access, "uuid-123").unwrap();
        assert_eq!(minted.ttl, ACCESS_TOKEN_TTL_SECS);
        assert_eq!(minted.expires_at, minted.issued_at + ACCESS_TOKEN_TTL_SECS);

        let claims = config.verify(TokenKind::Access, &minted.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.tok, TokenKind::Access);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_mint_and_verify_refresh() {
        let config = test_config();

        let minted = config.mint(TokenKind::Refresh, "uuid-123").unwrap();
        assert_eq!(minted.ttl, REFRESH_TOKEN_TTL_SECS);

        let claims = config.verify(TokenKind::Refresh, &minted.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.tok, TokenKind::Refresh);
    }

    #[test]
    fn test_wrong_kind_rejected_both_directions() {
        let config = test_config();

        let access = config.mint(TokenKind::Access, "uuid-123").unwrap();
        let refresh = config.mint(TokenKind::Refresh, "uuid-123").unwrap();

        assert!(matches!(
            config.verify(TokenKind::Refresh, &access.token),
            Err(TokenError::WrongKind)
        ));
        assert!(matches!(
            config.verify(TokenKind::Access, &refresh.token),
            Err(TokenError::WrongKind)
        ));
    }

    #[test]
    fn test_wrong_kind_detected_with_shared_secret() {
        // Same secret for both kinds: the signature check can no longer
        // separate them, so the tok claim has to.
        let config = TokenConfig::new(b"one-shared-secret-for-both-kinds", b"one-shared-secret-for-both-kinds");

        let refresh = config.mint(TokenKind::Refresh, "uuid-123").unwrap();
        assert!(matches!(
            config.verify(TokenKind::Access, &refresh.token),
            Err(TokenError::WrongKind)
        ));
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let config = test_config();

        assert!(matches!(
            config.verify(TokenKind::Access, "not-a-token"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_foreign_secret_is_malformed() {
        let config1 = test_config();
        let config2 = TokenConfig::new(b"different-access-secret-entirely", b"different-refresh-secret-either");

        let minted = config1.mint(TokenKind::Access, "uuid-123").unwrap();
        assert!(matches!(
            config2.verify(TokenKind::Access, &minted.token),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_expired_token() {
        let access_secret = b"access-secret-for-testing-only-0";
        let encoding_key = jsonwebtoken::EncodingKey::from_secret(access_secret);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        // Expired 50 seconds ago
        let claims = Claims {
            sub: "uuid-123".to_string(),
            tok: TokenKind::Access,
            jti: "test-jti".to_string(),
            iat: now - 100,
            exp: now - 50,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let config = test_config();
        assert!(matches!(
            config.verify(TokenKind::Access, &token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_expired_token_of_other_kind_is_wrong_kind() {
        let refresh_secret = b"refresh-secret-for-testing-only";
        let encoding_key = jsonwebtoken::EncodingKey::from_secret(refresh_secret);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = Claims {
            sub: "uuid-123".to_string(),
            tok: TokenKind::Refresh,
            jti: "test-jti".to_string(),
            iat: now - 100,
            exp: now - 50,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let config = test_config();
        assert!(matches!(
            config.verify(TokenKind::Access, &token),
            Err(TokenError::WrongKind)
        ));
    }

    #[test]
    fn test_successive_mints_differ() {
        let config = test_config();

        let first = config.mint(TokenKind::Refresh, "uuid-123").unwrap();
        let second = config.mint(TokenKind::Refresh, "uuid-123").unwrap();

        assert_ne!(
            first.token, second.token,
            "every minted credential must be unique"
        );
    }
}
