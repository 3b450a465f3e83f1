use crate::compose::merge::{merge_policies, MergedDirective};
use crate::compose::reporting::{
    reporting_url, write_entry, write_reporting_fragment, ReportingDescriptor,
};
use crate::constants::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_REPORT_MAX_AGE, DEFAULT_REPORT_PATH, HEADER_CSP_REPORT_ONLY,
    HEADER_NAME_CSP, HEADER_NAME_CSP_REPORT_ONLY,
};
use crate::core::{CspConfig, CspPolicy};
use crate::error::CspError;
use crate::store::PolicySelection;
use crate::utils::{escape_html_attribute, fingerprint};
use actix_web::http::header::{HeaderName, HeaderValue};
use bytes::Bytes;
use serde::Serialize;
use std::num::NonZeroU64;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderOptions<'a> {
    /// `Some(true)` renders enabled directives, `Some(false)` disabled ones,
    /// `None` all of them.
    pub enabled: Option<bool>,
    /// One directive per line. Not valid as a header value.
    pub pretty: bool,
    pub include_reporting: bool,
    pub nonce: Option<&'a str>,
}

impl<'a> RenderOptions<'a> {
    pub const fn header() -> Self {
        Self {
            enabled: Some(true),
            pretty: false,
            include_reporting: true,
            nonce: None,
        }
    }

    /// Reporting is not supported in meta tags, so it is left out.
    pub const fn meta_tag() -> Self {
        Self {
            enabled: Some(true),
            pretty: false,
            include_reporting: false,
            nonce: None,
        }
    }

    pub const fn preview() -> Self {
        Self {
            enabled: None,
            pretty: true,
            include_reporting: true,
            nonce: None,
        }
    }

    #[inline]
    pub fn with_nonce(mut self, nonce: Option<&'a str>) -> Self {
        self.nonce = nonce;
        self
    }

    #[inline]
    pub fn with_enabled(mut self, enabled: Option<bool>) -> Self {
        self.enabled = enabled;
        self
    }

    #[inline]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for RenderOptions<'_> {
    fn default() -> Self {
        Self::header()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedPolicy {
    pub header: &'static str,
    pub policy_string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporting: Option<ReportingDescriptor>,
}

impl ComposedPolicy {
    #[inline]
    pub fn is_report_only(&self) -> bool {
        self.header == HEADER_CSP_REPORT_ONLY
    }

    #[inline]
    pub fn header_name(&self) -> HeaderName {
        if self.is_report_only() {
            HeaderName::from_static(HEADER_NAME_CSP_REPORT_ONLY)
        } else {
            HeaderName::from_static(HEADER_NAME_CSP)
        }
    }

    /// Fails for pretty-printed output, which contains line breaks.
    pub fn header_value(&self) -> Result<HeaderValue, CspError> {
        HeaderValue::from_maybe_shared(Bytes::from(self.policy_string.clone()))
            .map_err(|e| CspError::HeaderError(format!("{}: {:?}", e, self.policy_string)))
    }

    pub fn meta_tag(&self) -> String {
        format!(
            r#"<meta http-equiv="{}" content="{}">"#,
            self.header,
            escape_html_attribute(&self.policy_string)
        )
    }
}

#[derive(Debug, Clone)]
pub struct CompositionKey {
    fingerprint: NonZeroU64,
    policy: Arc<CspPolicy>,
    merge_from: Option<Arc<CspPolicy>>,
    enabled: Option<bool>,
    pretty: bool,
    include_reporting: bool,
}

impl CompositionKey {
    #[inline]
    pub fn fingerprint(&self) -> NonZeroU64 {
        self.fingerprint
    }

    /// Stored policies are immutable once published, so pointer identity
    /// means identical content.
    pub fn matches(&self, other: &CompositionKey) -> bool {
        self.fingerprint == other.fingerprint
            && Arc::ptr_eq(&self.policy, &other.policy)
            && match (&self.merge_from, &other.merge_from) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
            && self.enabled == other.enabled
            && self.pretty == other.pretty
            && self.include_reporting == other.include_reporting
    }
}

/// Holds only the reporting settings from process configuration. Policies
/// passed in are never modified.
#[derive(Debug, Clone, Copy)]
pub struct HeaderComposer<'a> {
    report_max_age: i64,
    report_path: &'a str,
}

impl Default for HeaderComposer<'static> {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_MAX_AGE, DEFAULT_REPORT_PATH)
    }
}

impl<'a> HeaderComposer<'a> {
    #[inline]
    pub fn new(report_max_age: i64, report_path: &'a str) -> Self {
        Self {
            report_max_age,
            report_path,
        }
    }

    #[inline]
    pub fn from_config(config: &'a CspConfig) -> Self {
        Self::new(config.raw_report_max_age(), config.report_path())
    }

    /// `None` when no directive survives the filter; nothing is sent then.
    pub fn compose(
        &self,
        policy: &CspPolicy,
        merge_from: Option<&CspPolicy>,
        options: &RenderOptions<'_>,
    ) -> Option<ComposedPolicy> {
        let directives = self.effective_directives(policy, merge_from, options);

        let mut body = String::with_capacity(DEFAULT_BUFFER_CAPACITY);
        for directive in &directives {
            write_entry(&mut body, &directive.key, &directive.value, options.pretty);
        }

        if body.trim().is_empty() {
            return None;
        }

        let reporting = if options.include_reporting && policy.sends_violation_reports() {
            let url = reporting_url(policy, self.report_path);
            write_reporting_fragment(&mut body, policy.minimum_csp_level(), url, options.pretty);
            Some(ReportingDescriptor::new(url, self.report_max_age))
        } else {
            None
        };

        Some(ComposedPolicy {
            header: policy.header(),
            policy_string: body.trim().to_owned(),
            reporting,
        })
    }

    pub fn preview(&self, policy: &CspPolicy, merge_from: Option<&CspPolicy>) -> Option<ComposedPolicy> {
        self.compose(policy, merge_from, &RenderOptions::preview())
    }

    pub fn compose_selection(
        &self,
        selection: &PolicySelection,
        options: &RenderOptions<'_>,
    ) -> Option<ComposedPolicy> {
        self.compose(&selection.policy, selection.merge_from.as_deref(), options)
    }

    pub fn effective_directives(
        &self,
        policy: &CspPolicy,
        merge_from: Option<&CspPolicy>,
        options: &RenderOptions<'_>,
    ) -> Vec<MergedDirective> {
        match merge_from {
            Some(other) => merge_policies(policy, other, options.enabled, options.nonce),
            None => policy
                .filtered_directives(options.enabled)
                .map(|d| MergedDirective::from_directive(d, options.nonce))
                .collect(),
        }
    }

    pub fn cache_key(
        &self,
        selection: &PolicySelection,
        options: &RenderOptions<'_>,
    ) -> CompositionKey {
        CompositionKey {
            fingerprint: self.fingerprint(
                &selection.policy,
                selection.merge_from.as_deref(),
                options,
            ),
            policy: selection.policy.clone(),
            merge_from: selection.merge_from.clone(),
            enabled: options.enabled,
            pretty: options.pretty,
            include_reporting: options.include_reporting,
        }
    }

    pub fn fingerprint(
        &self,
        policy: &CspPolicy,
        merge_from: Option<&CspPolicy>,
        options: &RenderOptions<'_>,
    ) -> NonZeroU64 {
        fingerprint(&(
            policy,
            merge_from,
            options,
            self.report_max_age,
            self.report_path,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CspLevel, CspPolicyBuilder, Directive};

    #[test]
    fn compact_lines_have_no_separating_space() {
        let policy = CspPolicyBuilder::new()
            .default_src("'self'")
            .upgrade_insecure_requests()
            .build_unchecked();

        let composed = HeaderComposer::default()
            .compose(&policy, None, &RenderOptions::header())
            .unwrap();
        assert_eq!(
            composed.policy_string,
            "default-src 'self';upgrade-insecure-requests;"
        );
        assert_eq!(composed.header, "Content-Security-Policy");
        assert!(composed.reporting.is_none());
    }

    #[test]
    fn pretty_output_is_trimmed() {
        let policy = CspPolicyBuilder::new()
            .default_src("'self'")
            .img_src("data:")
            .build_unchecked();

        let composed = HeaderComposer::default().preview(&policy, None).unwrap();
        assert_eq!(composed.policy_string, "default-src 'self';\nimg-src data:;");
        assert!(composed.header_value().is_err());
    }

    #[test]
    fn reporting_uses_configured_path_and_max_age() {
        let policy = CspPolicyBuilder::new()
            .default_src("'self'")
            .send_violation_reports(true)
            .minimum_csp_level(CspLevel::Level2)
            .build_unchecked();

        let composer = HeaderComposer::new(-30, "/reports/");
        let composed = composer
            .compose(&policy, None, &RenderOptions::header())
            .unwrap();

        assert_eq!(
            composed.policy_string,
            "default-src 'self';report-uri /reports/;report-to csp-endpoint;"
        );
        assert_eq!(
            composed.reporting,
            Some(ReportingDescriptor::new("/reports/", 30))
        );
    }

    #[test]
    fn meta_tag_omits_reporting_and_escapes() {
        let policy = CspPolicyBuilder::new()
            .default_src("'self'")
            .send_violation_reports(true)
            .build_unchecked();

        let composed = HeaderComposer::default()
            .compose(&policy, None, &RenderOptions::meta_tag())
            .unwrap();
        assert!(composed.reporting.is_none());
        assert_eq!(
            composed.meta_tag(),
            r#"<meta http-equiv="Content-Security-Policy" content="default-src &#x27;self&#x27;;">"#
        );
    }

    #[test]
    fn fingerprint_tracks_nonce_and_policy() {
        let mut policy = CspPolicy::new();
        policy.add_directive(Directive::new("script-src").with_value("'self'"));

        let composer = HeaderComposer::default();
        let plain = RenderOptions::header();
        let nonced = RenderOptions::header().with_nonce(Some("abc"));

        assert_eq!(
            composer.fingerprint(&policy, None, &plain),
            composer.fingerprint(&policy, None, &plain)
        );
        assert_ne!(
            composer.fingerprint(&policy, None, &plain),
            composer.fingerprint(&policy, None, &nonced)
        );

        let before = composer.fingerprint(&policy, None, &plain);
        policy.set_report_only(true);
        assert_ne!(before, composer.fingerprint(&policy, None, &plain));
    }

    #[test]
    fn cache_rejects_entry_with_colliding_fingerprint() {
        let config = CspConfig::new();
        let composer = HeaderComposer::from_config(&config);
        let options = RenderOptions::header();

        let about = PolicySelection {
            policy: Arc::new(
                CspPolicyBuilder::new()
                    .script_src("https://about-only.example")
                    .build_unchecked(),
            ),
            merge_from: None,
        };
        let checkout = PolicySelection {
            policy: Arc::new(CspPolicyBuilder::new().script_src("'self'").build_unchecked()),
            merge_from: None,
        };

        let about_key = composer.cache_key(&about, &options);
        let composed = composer.compose_selection(&about, &options).unwrap();
        config.cache_composition(about_key.clone(), composed);

        let colliding = CompositionKey {
            fingerprint: about_key.fingerprint(),
            ..composer.cache_key(&checkout, &options)
        };
        assert!(config.get_cached_composition(&colliding).is_none());

        let hit = config.get_cached_composition(&about_key).unwrap();
        assert_eq!(hit.policy_string, "script-src https://about-only.example;");
        assert!(!about_key.matches(&composer.cache_key(&about, &RenderOptions::meta_tag())));
    }
}
