//! Abstract storage interfaces for the external collaborators

pub mod memory;
pub mod traits;

pub use memory::{MemoryCredentialStore, MemoryEmailDispatcher, MemoryTokenCache};
pub use traits::{CredentialStore, EmailDispatcher, LockoutStatus, NewAccount, TokenCache};
