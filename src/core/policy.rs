use crate::constants::{
    BASE_URI, DEFAULT_SRC, FORM_ACTION, FRAME_ANCESTORS, HEADER_CSP, HEADER_CSP_REPORT_ONLY,
    HEADER_NAME_CSP, HEADER_NAME_CSP_REPORT_ONLY, IMG_SRC, OBJECT_SRC, SCRIPT_SRC, STYLE_SRC,
    UPGRADE_INSECURE_REQUESTS,
};
use crate::core::directive::Directive;
use crate::error::CspError;
use actix_web::http::header::HeaderName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(Uuid);

impl PolicyId {
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PolicyId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMethod {
    #[default]
    Header,
    MetaTag,
}

/// The lowest CSP level the policy has to work with. Levels below 3 still
/// need `report-uri` next to `report-to`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum CspLevel {
    #[default]
    Level1 = 1,
    Level2 = 2,
    Level3 = 3,
}

impl CspLevel {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CspLevel {
    type Error = CspError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Self::Level1),
            2 => Ok(Self::Level2),
            3 => Ok(Self::Level3),
            other => Err(CspError::ValidationError(format!(
                "CSP level must be 1, 2 or 3, got {}",
                other
            ))),
        }
    }
}

impl From<CspLevel> for u8 {
    fn from(level: CspLevel) -> Self {
        level.as_u8()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CspPolicy {
    #[serde(default)]
    id: PolicyId,
    #[serde(default)]
    title: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    is_live: bool,
    #[serde(default)]
    is_base_policy: bool,
    #[serde(default)]
    report_only: bool,
    #[serde(default)]
    send_violation_reports: bool,
    #[serde(default)]
    alternate_report_uri: Option<String>,
    #[serde(default)]
    delivery_method: DeliveryMethod,
    #[serde(default)]
    minimum_csp_level: CspLevel,
    #[serde(default, with = "directive_list")]
    directives: IndexMap<Cow<'static, str>, Directive>,
}

fn default_true() -> bool {
    true
}

impl Default for CspPolicy {
    fn default() -> Self {
        Self {
            id: PolicyId::new(),
            title: String::new(),
            enabled: true,
            is_live: false,
            is_base_policy: false,
            report_only: false,
            send_violation_reports: false,
            alternate_report_uri: None,
            delivery_method: DeliveryMethod::Header,
            minimum_csp_level: CspLevel::Level1,
            directives: IndexMap::new(),
        }
    }
}

impl CspPolicy {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directive. A directive with the same key is replaced in place,
    /// keeping its original position.
    pub fn add_directive(&mut self, directive: Directive) -> &mut Self {
        let key = directive.key().to_owned();
        self.directives.insert(Cow::Owned(key), directive);
        self
    }

    pub fn remove_directive(&mut self, key: &str) -> Option<Directive> {
        self.directives.shift_remove(key)
    }

    #[inline]
    pub fn get_directive(&self, key: &str) -> Option<&Directive> {
        self.directives.get(key)
    }

    #[inline]
    pub fn get_directive_mut(&mut self, key: &str) -> Option<&mut Directive> {
        self.directives.get_mut(key)
    }

    #[inline]
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.directives.values()
    }

    pub fn filtered_directives(&self, enabled: Option<bool>) -> impl Iterator<Item = &Directive> {
        self.directives
            .values()
            .filter(move |d| enabled.map_or(true, |want| d.is_enabled() == want))
    }

    #[inline]
    pub fn contains_nonce(&self) -> bool {
        self.directives.values().any(|d| d.uses_nonce())
    }

    #[inline]
    pub fn set_id(&mut self, id: PolicyId) -> &mut Self {
        self.id = id;
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = title.into();
        self
    }

    #[inline]
    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    #[inline]
    pub fn set_live(&mut self, is_live: bool) -> &mut Self {
        self.is_live = is_live;
        self
    }

    /// Only flips the flag on this value; use the store to make a policy the
    /// site-wide base.
    #[inline]
    pub fn set_base_policy(&mut self, is_base: bool) -> &mut Self {
        self.is_base_policy = is_base;
        self
    }

    #[inline]
    pub fn set_report_only(&mut self, report_only: bool) -> &mut Self {
        self.report_only = report_only;
        self
    }

    #[inline]
    pub fn set_send_violation_reports(&mut self, send: bool) -> &mut Self {
        self.send_violation_reports = send;
        self
    }

    pub fn set_alternate_report_uri(&mut self, uri: impl Into<String>) -> &mut Self {
        self.alternate_report_uri = Some(uri.into());
        self
    }

    #[inline]
    pub fn clear_alternate_report_uri(&mut self) -> &mut Self {
        self.alternate_report_uri = None;
        self
    }

    #[inline]
    pub fn set_delivery_method(&mut self, method: DeliveryMethod) -> &mut Self {
        self.delivery_method = method;
        self
    }

    #[inline]
    pub fn set_minimum_csp_level(&mut self, level: CspLevel) -> &mut Self {
        self.minimum_csp_level = level;
        self
    }

    #[inline]
    pub fn id(&self) -> PolicyId {
        self.id
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.is_live
    }

    #[inline]
    pub fn is_base_policy(&self) -> bool {
        self.is_base_policy
    }

    #[inline]
    pub fn is_report_only(&self) -> bool {
        self.report_only
    }

    #[inline]
    pub fn sends_violation_reports(&self) -> bool {
        self.send_violation_reports
    }

    #[inline]
    pub fn alternate_report_uri(&self) -> Option<&str> {
        self.alternate_report_uri.as_deref()
    }

    #[inline]
    pub fn delivery_method(&self) -> DeliveryMethod {
        self.delivery_method
    }

    #[inline]
    pub fn minimum_csp_level(&self) -> CspLevel {
        self.minimum_csp_level
    }

    #[inline]
    pub fn header(&self) -> &'static str {
        if self.report_only {
            HEADER_CSP_REPORT_ONLY
        } else {
            HEADER_CSP
        }
    }

    #[inline]
    pub fn header_name(&self) -> HeaderName {
        if self.report_only {
            HeaderName::from_static(HEADER_NAME_CSP_REPORT_ONLY)
        } else {
            HeaderName::from_static(HEADER_NAME_CSP)
        }
    }

    pub fn validate(&self) -> Result<(), CspError> {
        for directive in self.directives.values() {
            directive.validate()?;
        }

        if let Some(uri) = self.alternate_report_uri.as_deref() {
            validate_report_uri(uri)?;
        }

        Ok(())
    }
}

/// Accepts an absolute path on the same origin or an absolute http(s) URL.
/// An empty value means "not set" and is always accepted.
pub(crate) fn validate_report_uri(uri: &str) -> Result<(), CspError> {
    let uri = uri.trim();
    if uri.is_empty() || (uri.starts_with('/') && !uri.starts_with("//")) {
        return Ok(());
    }

    match Url::parse(uri) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(CspError::InvalidReportUri(format!(
            "unsupported scheme '{}' in {}",
            url.scheme(),
            uri
        ))),
        Err(e) => Err(CspError::InvalidReportUri(format!("{}: {}", uri, e))),
    }
}

impl Hash for CspPolicy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.directives.len().hash(state);
        for directive in self.directives.values() {
            directive.hash(state);
        }
        self.report_only.hash(state);
        self.send_violation_reports.hash(state);
        self.alternate_report_uri.hash(state);
        self.delivery_method.hash(state);
        self.minimum_csp_level.hash(state);
    }
}

mod directive_list {
    use super::Directive;
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::borrow::Cow;

    pub(super) fn serialize<S>(
        directives: &IndexMap<Cow<'static, str>, Directive>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(directives.values())
    }

    pub(super) fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<IndexMap<Cow<'static, str>, Directive>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<Directive>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|d| (Cow::Owned(d.key().to_owned()), d))
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct CspPolicyBuilder {
    policy: CspPolicy,
}

impl CspPolicyBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            policy: CspPolicy::new(),
        }
    }

    #[inline]
    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.policy.add_directive(directive);
        self
    }

    pub fn directive(self, key: impl Into<Cow<'static, str>>, value: &str) -> Self {
        self.with_directive(Directive::new(key).with_value(value))
    }

    pub fn default_src(self, value: &str) -> Self {
        self.directive(DEFAULT_SRC, value)
    }

    pub fn script_src(self, value: &str) -> Self {
        self.directive(SCRIPT_SRC, value)
    }

    pub fn style_src(self, value: &str) -> Self {
        self.directive(STYLE_SRC, value)
    }

    pub fn img_src(self, value: &str) -> Self {
        self.directive(IMG_SRC, value)
    }

    pub fn object_src(self, value: &str) -> Self {
        self.directive(OBJECT_SRC, value)
    }

    pub fn frame_ancestors(self, value: &str) -> Self {
        self.directive(FRAME_ANCESTORS, value)
    }

    pub fn base_uri(self, value: &str) -> Self {
        self.directive(BASE_URI, value)
    }

    pub fn form_action(self, value: &str) -> Self {
        self.directive(FORM_ACTION, value)
    }

    pub fn upgrade_insecure_requests(self) -> Self {
        self.with_directive(Directive::new(UPGRADE_INSECURE_REQUESTS))
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.policy.set_title(title);
        self
    }

    #[inline]
    pub fn id(mut self, id: PolicyId) -> Self {
        self.policy.set_id(id);
        self
    }

    #[inline]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.policy.set_enabled(enabled);
        self
    }

    #[inline]
    pub fn live(mut self, is_live: bool) -> Self {
        self.policy.set_live(is_live);
        self
    }

    #[inline]
    pub fn base_policy(mut self, is_base: bool) -> Self {
        self.policy.set_base_policy(is_base);
        self
    }

    #[inline]
    pub fn report_only(mut self, report_only: bool) -> Self {
        self.policy.set_report_only(report_only);
        self
    }

    #[inline]
    pub fn send_violation_reports(mut self, send: bool) -> Self {
        self.policy.set_send_violation_reports(send);
        self
    }

    pub fn alternate_report_uri(mut self, uri: impl Into<String>) -> Self {
        self.policy.set_alternate_report_uri(uri);
        self
    }

    #[inline]
    pub fn delivery_method(mut self, method: DeliveryMethod) -> Self {
        self.policy.set_delivery_method(method);
        self
    }

    #[inline]
    pub fn minimum_csp_level(mut self, level: CspLevel) -> Self {
        self.policy.set_minimum_csp_level(level);
        self
    }

    pub fn build(self) -> Result<CspPolicy, CspError> {
        self.policy.validate()?;
        Ok(self.policy)
    }

    #[inline]
    pub fn build_unchecked(self) -> CspPolicy {
        self.policy
    }
}
