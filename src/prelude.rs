pub use crate::compose::{ComposedPolicy, HeaderComposer, RenderOptions};
pub use crate::core::{
    CspConfig, CspConfigBuilder, CspLevel, CspPolicy, CspPolicyBuilder, DeliveryMethod, Directive,
};
pub use crate::middleware::{
    csp_middleware, csp_middleware_with_nonce, csp_reporting_middleware, CspExtensions,
    CspMiddleware,
};
pub use crate::monitoring::{CspStats, CspViolationReport};
pub use crate::store::{InMemoryPolicyStore, PolicyStore, SelectionCriteria};
