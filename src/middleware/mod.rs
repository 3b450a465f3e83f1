pub mod csp;
pub mod extensions;
pub mod reporting;

pub use csp::{compose_for_request, CspMiddleware, CspMiddlewareService};
pub use extensions::{CspExtensions, PagePolicy};
pub use reporting::{CspReportingMiddleware, CspReportingMiddlewareService};

pub use csp::{csp_middleware, csp_middleware_with_nonce};
pub use reporting::csp_reporting_middleware;
