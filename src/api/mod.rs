//! Query API
//!
//! Read-only HTTP surface over the equities collection:
//! - GET /health
//! - GET /details/{symbol}
//! - GET /search?query=&limit=
//!
//! Both data routes require an `X-API-Key` header.

pub mod handlers;
mod response;
mod server;

pub use handlers::ApiState;
pub use server::ApiServer;
