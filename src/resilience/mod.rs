//! Guards around external calls: retry, rate limiting, caching.

pub mod cache;
pub mod rate_limit;
pub mod retry;

pub use cache::TtlCache;
pub use rate_limit::RateLimit;
pub use retry::{is_transient, RetryPolicy};
