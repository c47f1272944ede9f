//! Authentication state trait and macro.

use crate::db::Database;
use crate::token::TokenConfig;

/// Trait for router state types that can authenticate requests.
pub trait HasAuthState {
    fn tokens(&self) -> &TokenConfig;
    fn db(&self) -> &Database;
}

/// Implement `HasAuthState` for a state struct with the standard fields.
///
/// The struct must have these fields:
/// - `tokens: TokenConfig`
/// - `db: Database`
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub tokens: TokenConfig,
///     // ... other fields
/// }
///
/// impl_has_auth_state!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_state {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthState for $state_type {
            fn tokens(&self) -> &$crate::token::TokenConfig {
                &self.tokens
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
        }
    };
}
