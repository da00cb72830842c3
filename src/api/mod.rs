//! HTTP JSON API.
//!
//! Routes are nested under `/api/` and protected by a middleware stack:
//! Rate Limit → Auth → Audit → Handler. `api_router()` returns a `Router`
//! that `server::serve` mounts on a TCP listener.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::serve;
pub use types::ApiContext;
