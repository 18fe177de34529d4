//! Abuse protection: per-session rate classes and warning-driven scaling.

pub mod rate_limit;

pub use rate_limit::{RateClass, RateClassState, RateLimitStatus, evaluate};
