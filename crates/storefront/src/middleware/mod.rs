//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with method, uri, status, latency)
//! 3. Request ID (recorded on the span, echoed in `x-request-id`)
//! 4. Security headers (CSP, frame, sniffing)
//! 5. Session layer (tower-sessions, in-memory store)
//! 6. Rate limiting on credential endpoints (governor)
//!
//! Extractors (`RequireAuth`, `OptionalAuth`, `Layout`) read the session the
//! session layer attaches to each request.

pub mod auth;
pub mod layout;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, set_current_user};
pub use layout::{Layout, UserBadge};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
