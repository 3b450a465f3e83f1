pub mod config;
pub mod directive;
pub mod policy;

pub use config::{CspConfig, CspConfigBuilder, CspSettings};
pub use directive::Directive;
pub use policy::{CspLevel, CspPolicy, CspPolicyBuilder, DeliveryMethod, PolicyId};
