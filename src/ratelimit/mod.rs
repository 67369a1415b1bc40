//! Rate limiting logic and state management.

mod decision;
mod janitor;
mod key;
mod limiter;
mod rules;

pub use decision::Decision;
pub use janitor::Janitor;
pub use key::{LogKey, DEFAULT_IDENTIFIER, DEFAULT_PREFIX};
pub use limiter::{CleanupStats, RateLimiter};
pub use rules::{LimitRule, RulesConfig};
