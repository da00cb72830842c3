//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter: reject early, save resources
//! 2. Auth validator: bearer session lookup, injects `Principal`
//! 3. Audit logger: logs after auth, has the username

pub mod audit;
pub mod auth;
pub mod rate;
