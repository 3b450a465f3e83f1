//! Merging a page policy's directives with those of a second policy,
//! typically the site-wide base.
//!
//! A second policy can only narrow what the first allows, so merging never
//! drops values: the merge-from directive's value is appended to the
//! matching directive of the target, and merge-from directives with no
//! counterpart are added after the target's own directives.

use crate::core::{CspPolicy, Directive};
use indexmap::IndexMap;
use rustc_hash::{FxHashSet, FxHasher};
use serde::Serialize;
use std::hash::BuildHasherDefault;

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// A directive key and the value it renders with after merging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MergedDirective {
    pub key: String,
    pub value: String,
}

impl MergedDirective {
    #[inline]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub(crate) fn from_directive(directive: &Directive, nonce: Option<&str>) -> Self {
        Self {
            key: directive.key().to_owned(),
            value: directive.render_value(nonce),
        }
    }
}

/// Merges `merge_from` into `target`.
///
/// Output order is the target's order followed by the merge-from
/// directives that had no matching key, in their own order.
pub fn merge_directives<'a, D, M>(
    target: D,
    merge_from: M,
    nonce: Option<&str>,
) -> Vec<MergedDirective>
where
    D: IntoIterator<Item = &'a Directive>,
    M: IntoIterator<Item = &'a Directive>,
{
    let mut lookup: FxIndexMap<&str, &Directive> = FxIndexMap::default();
    for directive in merge_from {
        lookup.entry(directive.key()).or_insert(directive);
    }

    let target = target.into_iter();
    let mut merged = Vec::with_capacity(target.size_hint().0 + lookup.len());
    let mut seen: FxHashSet<&str> = FxHashSet::default();

    for directive in target {
        if !seen.insert(directive.key()) {
            continue;
        }

        let mut value = directive.render_value(nonce);

        if let Some(other) = lookup.get(directive.key()) {
            // one nonce token per directive is enough
            let other_nonce = if directive.uses_nonce() { None } else { nonce };
            let other_value = other.render_value(other_nonce);

            if !other_value.is_empty() {
                if value.is_empty() {
                    value = other_value;
                } else {
                    value.push(' ');
                    value.push_str(&other_value);
                }
            }
        }

        merged.push(MergedDirective {
            key: directive.key().to_owned(),
            value,
        });
    }

    for (key, directive) in lookup {
        if !seen.contains(key) {
            merged.push(MergedDirective::from_directive(directive, nonce));
        }
    }

    merged
}

/// Merges two policies after applying the same `enabled` filter to both.
pub fn merge_policies(
    target: &CspPolicy,
    merge_from: &CspPolicy,
    enabled: Option<bool>,
    nonce: Option<&str>,
) -> Vec<MergedDirective> {
    merge_directives(
        target.filtered_directives(enabled),
        merge_from.filtered_directives(enabled),
        nonce,
    )
}
