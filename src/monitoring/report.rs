use crate::error::CspError;
use serde::{Deserialize, Deserializer, Serialize};

/// A CSP violation report. Every field falls back to an empty string when
/// the user agent leaves it out; numeric fields are kept as their decimal
/// text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CspViolationReport {
    #[serde(rename = "document-uri", deserialize_with = "lenient_string")]
    pub document_uri: String,

    #[serde(rename = "referrer", deserialize_with = "lenient_string")]
    pub referrer: String,

    #[serde(rename = "blocked-uri", deserialize_with = "lenient_string")]
    pub blocked_uri: String,

    #[serde(rename = "violated-directive", deserialize_with = "lenient_string")]
    pub violated_directive: String,

    #[serde(rename = "effective-directive", deserialize_with = "lenient_string")]
    pub effective_directive: String,

    #[serde(rename = "original-policy", deserialize_with = "lenient_string")]
    pub original_policy: String,

    #[serde(rename = "source-file", deserialize_with = "lenient_string")]
    pub source_file: String,

    #[serde(rename = "line-number", deserialize_with = "lenient_string")]
    pub line_number: String,

    #[serde(rename = "column-number", deserialize_with = "lenient_string")]
    pub column_number: String,

    #[serde(rename = "disposition", deserialize_with = "lenient_string")]
    pub disposition: String,
}

impl CspViolationReport {
    #[inline]
    pub fn is_enforce(&self) -> bool {
        self.disposition == "enforce"
    }

    #[inline]
    pub fn is_report(&self) -> bool {
        self.disposition == "report"
    }
}

/// Body of a `csp-violation` entry sent through the Reporting API
/// (`application/reports+json`), which uses camel-cased keys.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReportingApiBody {
    #[serde(rename = "documentURL", deserialize_with = "lenient_string")]
    document_url: String,
    #[serde(deserialize_with = "lenient_string")]
    referrer: String,
    #[serde(rename = "blockedURL", deserialize_with = "lenient_string")]
    blocked_url: String,
    #[serde(deserialize_with = "lenient_string")]
    effective_directive: String,
    #[serde(deserialize_with = "lenient_string")]
    original_policy: String,
    #[serde(deserialize_with = "lenient_string")]
    source_file: String,
    #[serde(deserialize_with = "lenient_string")]
    line_number: String,
    #[serde(deserialize_with = "lenient_string")]
    column_number: String,
    #[serde(deserialize_with = "lenient_string")]
    disposition: String,
}

impl From<ReportingApiBody> for CspViolationReport {
    fn from(body: ReportingApiBody) -> Self {
        Self {
            document_uri: body.document_url,
            referrer: body.referrer,
            blocked_uri: body.blocked_url,
            violated_directive: body.effective_directive.clone(),
            effective_directive: body.effective_directive,
            original_policy: body.original_policy,
            source_file: body.source_file,
            line_number: body.line_number,
            column_number: body.column_number,
            disposition: body.disposition,
        }
    }
}

#[derive(Deserialize)]
struct ReportingApiEntry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    body: Option<ReportingApiBody>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Accepts the classic `{"csp-report": {...}}` document as well as a
/// Reporting API array, from which only `csp-violation` entries are kept.
pub fn parse_violation_reports(bytes: &[u8]) -> Result<Vec<CspViolationReport>, CspError> {
    let json: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| CspError::ReportError(format!("malformed report body: {}", e)))?;

    match json {
        serde_json::Value::Object(mut object) => {
            let report = object.remove("csp-report").ok_or_else(|| {
                CspError::ReportError("report body has no 'csp-report' member".to_owned())
            })?;
            if !report.is_object() {
                return Err(CspError::ReportError(
                    "'csp-report' must be an object".to_owned(),
                ));
            }
            let report = serde_json::from_value(report)
                .map_err(|e| CspError::ReportError(e.to_string()))?;
            Ok(vec![report])
        }
        serde_json::Value::Array(_) => {
            let entries: Vec<ReportingApiEntry> = serde_json::from_value(json)
                .map_err(|e| CspError::ReportError(e.to_string()))?;
            Ok(entries
                .into_iter()
                .filter(|entry| entry.kind == "csp-violation")
                .filter_map(|entry| entry.body.map(CspViolationReport::from))
                .collect())
        }
        _ => Err(CspError::ReportError(
            "report body must be a JSON object or array".to_owned(),
        )),
    }
}
