//! HTTP client module
//!
//! Submits validated rows to the comment API.
//!
//! # Features
//!
//! - **Retries**: exponential backoff for network errors and 5xx responses
//! - **Rate Limiting**: governor pacing under the hourly quota, plus waits on
//!   the server's `x-ratelimit-reset` when it answers 429
//! - **Duplicates**: server-side duplicate markers end a row without retrying
//! - **Clock**: all waits go through an injectable [`Clock`]

mod client;
mod clock;
mod rate_limit;
mod retry;

pub use client::{
    OutcomeKind, SubmitClient, SubmitClientConfig, SubmitClientConfigBuilder, SubmitOutcome,
    SUBMIT_PATH,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit::{retry_after, RateLimitInfo, RateLimiter, RateLimiterConfig};
pub use retry::RetryPolicy;
