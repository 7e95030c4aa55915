//! Request screening and timing-attack mitigation

pub mod guard;
pub mod injection;
pub mod timing;

pub use guard::{RequestGuard, RequestParts};
pub use timing::AuthTimer;
