use crate::constants::{KNOWN_DIRECTIVES, NONCE_PREFIX, SUFFIX_QUOTE};
use crate::error::CspError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::{
    borrow::Cow,
    fmt::{self, Write as _},
    hash::{Hash, Hasher},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DirectiveRecord", into = "DirectiveRecord")]
pub struct Directive {
    key: Cow<'static, str>,
    tokens: SmallVec<[Cow<'static, str>; 4]>,
    enabled: bool,
    use_nonce: bool,
}

impl Directive {
    #[inline]
    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            key: key.into(),
            tokens: SmallVec::new(),
            enabled: true,
            use_nonce: false,
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.add_tokens(value.split_whitespace().map(|t| Cow::Owned(t.to_owned())));
        self
    }

    #[inline]
    pub fn with_nonce(mut self) -> Self {
        self.use_nonce = true;
        self
    }

    #[inline]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn add_token(&mut self, token: impl Into<Cow<'static, str>>) -> &mut Self {
        let token = token.into();
        if !token.is_empty() {
            self.tokens.push(token);
        }
        self
    }

    pub fn add_tokens<I, T>(&mut self, tokens: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Cow<'static, str>>,
    {
        for token in tokens {
            self.add_token(token);
        }
        self
    }

    #[inline]
    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    #[inline]
    pub fn set_use_nonce(&mut self, use_nonce: bool) -> &mut Self {
        self.use_nonce = use_nonce;
        self
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn tokens(&self) -> &[Cow<'static, str>] {
        &self.tokens
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn uses_nonce(&self) -> bool {
        self.use_nonce
    }

    pub fn value(&self) -> String {
        self.render_value(None)
    }

    /// The value as it goes on the wire. With `use_nonce` set and a nonce
    /// supplied, `'nonce-{nonce}'` is appended as the last token.
    pub fn render_value(&self, nonce: Option<&str>) -> String {
        let mut out = String::with_capacity(self.estimated_size());
        self.write_value(&mut out, nonce);
        out
    }

    pub(crate) fn write_value(&self, out: &mut String, nonce: Option<&str>) {
        let mut first = true;
        for token in &self.tokens {
            if !first {
                out.push(' ');
            }
            out.push_str(token);
            first = false;
        }

        if let Some(nonce) = nonce.filter(|n| self.use_nonce && !n.is_empty()) {
            if !first {
                out.push(' ');
            }
            out.push_str(NONCE_PREFIX);
            out.push_str(nonce);
            out.push_str(SUFFIX_QUOTE);
        }
    }

    pub fn validate(&self) -> Result<(), CspError> {
        validate_key(&self.key)?;

        for token in &self.tokens {
            if let Some(c) = token
                .chars()
                .find(|c| *c == ';' || *c == ',' || c.is_control() || c.is_whitespace())
            {
                return Err(CspError::InvalidDirectiveValue(format!(
                    "Directive '{}' token {:?} contains forbidden character {:?}",
                    self.key, token, c
                )));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn estimated_size(&self) -> usize {
        self.tokens.iter().map(|t| t.len() + 1).sum::<usize>()
    }
}

pub(crate) fn validate_key(key: &str) -> Result<(), CspError> {
    let well_formed = key.starts_with(|c: char| c.is_ascii_lowercase())
        && key.chars().all(|c| c.is_ascii_lowercase() || c == '-');

    if !well_formed {
        return Err(CspError::InvalidDirectiveName(key.to_owned()));
    }

    if !KNOWN_DIRECTIVES.contains(&key) {
        log::debug!("Directive '{}' is not a known CSP directive", key);
    }

    Ok(())
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)?;
        for token in &self.tokens {
            f.write_char(' ')?;
            f.write_str(token)?;
        }
        Ok(())
    }
}

impl Hash for Directive {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.tokens.hash(state);
        self.enabled.hash(state);
        self.use_nonce.hash(state);
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct DirectiveRecord {
    key: String,
    #[serde(default)]
    value: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    use_nonce: bool,
}

fn default_true() -> bool {
    true
}

impl From<DirectiveRecord> for Directive {
    fn from(record: DirectiveRecord) -> Self {
        let mut directive = Directive::new(record.key).with_value(&record.value);
        directive.enabled = record.enabled;
        directive.use_nonce = record.use_nonce;
        directive
    }
}

impl From<Directive> for DirectiveRecord {
    fn from(directive: Directive) -> Self {
        Self {
            value: directive.value(),
            key: directive.key.into_owned(),
            enabled: directive.enabled,
            use_nonce: directive.use_nonce,
        }
    }
}
