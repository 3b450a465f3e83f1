pub mod composer;
pub mod merge;
pub mod reporting;

pub use composer::{ComposedPolicy, CompositionKey, HeaderComposer, RenderOptions};
pub use merge::{merge_directives, merge_policies, MergedDirective};
pub use reporting::{reporting_url, ReportingDescriptor, ReportingEndpoint};
