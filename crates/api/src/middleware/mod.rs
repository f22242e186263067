//! HTTP middleware.
//!
//! # Layer order (outermost first)
//!
//! 1. Sentry (hub per request, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span)
//! 4. Security headers
//! 5. CORS, when origins are configured
//! 6. Rate limiting on `/auth/*`

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{
    AuthUser, HandleSupport, ManageCatalog, ManageContent, ManageOrders, ManageUsers, Moderate,
    OptionalAuth, Permission, Require, ViewAllOrders,
};
pub use rate_limit::auth_rate_limiter;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;
