use crate::constants::{DEFAULT_REPORT_PATH, REPORT_GROUP, REPORT_TO, REPORT_URI};
use crate::core::{CspLevel, CspPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportingDescriptor {
    pub group: String,
    #[serde(rename = "max-age")]
    pub max_age: u64,
    pub endpoints: Vec<ReportingEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportingEndpoint {
    pub url: String,
}

impl ReportingDescriptor {
    pub fn new(url: impl Into<String>, max_age: i64) -> Self {
        Self {
            group: REPORT_GROUP.to_owned(),
            max_age: max_age.unsigned_abs(),
            endpoints: vec![ReportingEndpoint { url: url.into() }],
        }
    }
}

/// Where violation reports for `policy` go: its alternate URI when one is
/// set, otherwise `default_path`.
pub fn reporting_url<'a>(policy: &'a CspPolicy, default_path: &'a str) -> &'a str {
    match policy.alternate_report_uri().map(str::trim) {
        Some(uri) if !uri.is_empty() => uri,
        _ if default_path.is_empty() => DEFAULT_REPORT_PATH,
        _ => default_path,
    }
}

/// Appends the reporting entries for `level`. `report-uri` is only written
/// below level 3, where `report-to` may not be understood.
pub(crate) fn write_reporting_fragment(out: &mut String, level: CspLevel, url: &str, pretty: bool) {
    if url.is_empty() {
        return;
    }

    if level < CspLevel::Level3 {
        write_entry(out, REPORT_URI, url, pretty);
    }
    write_entry(out, REPORT_TO, REPORT_GROUP, pretty);
}

pub(crate) fn write_entry(out: &mut String, key: &str, value: &str, pretty: bool) {
    out.push_str(key);
    if !value.is_empty() {
        out.push(' ');
        out.push_str(value);
    }
    out.push(';');
    if pretty {
        out.push('\n');
    }
}
