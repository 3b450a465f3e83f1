pub mod compose;
pub mod constants;
pub mod core;
pub mod error;
pub mod middleware;
pub mod monitoring;
pub mod prelude;
pub mod security;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::compose::{
    ComposedPolicy, CompositionKey, HeaderComposer, MergedDirective, RenderOptions,
    ReportingDescriptor,
};
pub use crate::core::{
    CspConfig, CspConfigBuilder, CspLevel, CspPolicy, CspPolicyBuilder, DeliveryMethod, Directive,
    PolicyId,
};
pub use crate::error::CspError;
pub use crate::middleware::{
    compose_for_request, csp_middleware, csp_middleware_with_nonce, csp_reporting_middleware,
    CspExtensions, CspMiddleware, CspReportingMiddleware, PagePolicy,
};
pub use crate::monitoring::{CspStats, CspViolationReport};
pub use crate::security::{NonceGenerator, RequestNonce};
pub use crate::store::{InMemoryPolicyStore, PolicySelection, PolicyStore, SelectionCriteria};
