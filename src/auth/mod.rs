//! Authentication and authorization core: account types, password hashing,
//! token lifecycle, lockout policy and the engine orchestrating them

pub mod account;
pub mod authorize;
pub mod engine;
pub mod lockout;
pub mod password;
pub mod token;

pub use account::Account;
pub use authorize::{
    has_any_role, has_permission, has_role, require_permission, require_role,
};
pub use engine::{AuthEngine, AuthSession};
pub use lockout::LockoutPolicy;
pub use password::PasswordHasher;
pub use token::{Claims, RefreshRecord, TokenIssuer, TokenPurpose};
