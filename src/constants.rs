pub const HEADER_CSP: &str = "Content-Security-Policy";
pub const HEADER_CSP_REPORT_ONLY: &str = "Content-Security-Policy-Report-Only";

pub(crate) const HEADER_NAME_CSP: &str = "content-security-policy";
pub(crate) const HEADER_NAME_CSP_REPORT_ONLY: &str = "content-security-policy-report-only";

pub(crate) const DEFAULT_SRC: &str = "default-src";
pub(crate) const SCRIPT_SRC: &str = "script-src";
pub(crate) const STYLE_SRC: &str = "style-src";
pub(crate) const IMG_SRC: &str = "img-src";
pub(crate) const CONNECT_SRC: &str = "connect-src";
pub(crate) const FONT_SRC: &str = "font-src";
pub(crate) const OBJECT_SRC: &str = "object-src";
pub(crate) const MEDIA_SRC: &str = "media-src";
pub(crate) const FRAME_SRC: &str = "frame-src";
pub(crate) const WORKER_SRC: &str = "worker-src";
pub(crate) const MANIFEST_SRC: &str = "manifest-src";
pub(crate) const CHILD_SRC: &str = "child-src";
pub(crate) const FRAME_ANCESTORS: &str = "frame-ancestors";
pub(crate) const BASE_URI: &str = "base-uri";
pub(crate) const FORM_ACTION: &str = "form-action";
pub(crate) const SANDBOX: &str = "sandbox";
pub(crate) const SCRIPT_SRC_ELEM: &str = "script-src-elem";
pub(crate) const SCRIPT_SRC_ATTR: &str = "script-src-attr";
pub(crate) const STYLE_SRC_ELEM: &str = "style-src-elem";
pub(crate) const STYLE_SRC_ATTR: &str = "style-src-attr";
pub(crate) const PREFETCH_SRC: &str = "prefetch-src";
pub(crate) const UPGRADE_INSECURE_REQUESTS: &str = "upgrade-insecure-requests";
pub(crate) const BLOCK_ALL_MIXED_CONTENT: &str = "block-all-mixed-content";
pub(crate) const REQUIRE_TRUSTED_TYPES_FOR: &str = "require-trusted-types-for";
pub(crate) const TRUSTED_TYPES: &str = "trusted-types";
pub(crate) const PLUGIN_TYPES: &str = "plugin-types";

/// Directive names recognised without a diagnostic. Other well-formed names
/// are still accepted so newer directives can be configured.
pub(crate) const KNOWN_DIRECTIVES: &[&str] = &[
    DEFAULT_SRC,
    SCRIPT_SRC,
    STYLE_SRC,
    IMG_SRC,
    CONNECT_SRC,
    FONT_SRC,
    OBJECT_SRC,
    MEDIA_SRC,
    FRAME_SRC,
    WORKER_SRC,
    MANIFEST_SRC,
    CHILD_SRC,
    FRAME_ANCESTORS,
    BASE_URI,
    FORM_ACTION,
    SANDBOX,
    SCRIPT_SRC_ELEM,
    SCRIPT_SRC_ATTR,
    STYLE_SRC_ELEM,
    STYLE_SRC_ATTR,
    PREFETCH_SRC,
    UPGRADE_INSECURE_REQUESTS,
    BLOCK_ALL_MIXED_CONTENT,
    REQUIRE_TRUSTED_TYPES_FOR,
    TRUSTED_TYPES,
    PLUGIN_TYPES,
];

pub(crate) const REPORT_URI: &str = "report-uri";
pub(crate) const REPORT_TO: &str = "report-to";

pub const REPORT_GROUP: &str = "csp-endpoint";
pub const DEFAULT_REPORT_PATH: &str = "/csp/v1/report/";

pub(crate) const NONCE_PREFIX: &str = "'nonce-";
pub(crate) const SUFFIX_QUOTE: &str = "'";

pub(crate) const DEFAULT_NONCE_LENGTH: usize = 16;
pub(crate) const DEFAULT_CACHE_DURATION_SECS: u64 = 60;
pub(crate) const DEFAULT_MAX_REPORT_SIZE: usize = 16 * 1024;
/// 126 days, the reporting group lifetime handed to user agents.
pub(crate) const DEFAULT_REPORT_MAX_AGE: i64 = 10_886_400;

pub(crate) const DEFAULT_BUFFER_CAPACITY: usize = 256;
pub(crate) const DEFAULT_POLICY_CACHE_ENTRIES: usize = 64;
