//! Authentication module
//!
//! - [`Authentication`]: the merged headers / cookies / query parameters
//!   callers attach to their requests
//! - [`TokenInjection`] and [`inject_all`]: turn procedure variables into an
//!   [`Authentication`]
//! - [`AuthenticationStore`]: per-user cache with expiration and refresh
//!   counting
//! - [`detect_ttl`]: session lifetime read from JWT `exp` claims

mod store;
mod ttl;
mod types;

pub use store::{AuthenticationStore, StoreError, StoreRecord};
pub use ttl::{detect_ttl, jwt_expiration};
pub use types::{
    inject, inject_all, Authentication, InjectionFallback, InjectionOutcome, TokenInjection,
};

#[cfg(test)]
mod tests;
