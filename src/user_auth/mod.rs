//! Bearer-token authentication for customer and staff endpoints.

pub mod middleware;
pub mod service;

pub use middleware::jwt_auth_middleware;
pub use service::{Claims, JwtVerifier, ROLE_STAFF};
