//! GraphQL name sanitization and type-name bookkeeping.

use std::collections::HashMap;

/// Sanitize an API group into a GraphQL identifier.
///
/// The empty (core) group becomes `core`; characters outside
/// `[A-Za-z0-9_]` become `_`; a leading character that is not a letter or
/// underscore gets one prepended.
pub fn sanitize_group(group: &str) -> String {
    if group.is_empty() {
        return "core".to_string();
    }
    let mut out: String = group
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if let Some(first) = out.chars().next() {
        if !(first.is_ascii_alphabetic() || first == '_') {
            out.insert(0, '_');
        }
    }
    out
}

/// Upper-camel-case a sanitized identifier: `rbac_authorization` -> `RbacAuthorization`.
pub fn pascal(ident: &str) -> String {
    ident
        .split('_')
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            let mut chars = seg.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Sanitize a JSON property name into a GraphQL field identifier.
///
/// The original JSON key must be kept separately for lookups; this only
/// affects the GraphQL-visible name.
pub fn sanitize_field(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if let Some(first) = out.chars().next() {
        if !(first.is_ascii_alphabetic() || first == '_') {
            out.insert(0, '_');
        }
    }
    out
}

/// Pluralize a PascalCase kind, preserving case: `NetworkPolicy` ->
/// `NetworkPolicies`. Same suffix rules as the lowercase url-path plurals.
pub fn plural_pascal(kind: &str) -> String {
    let is_vowel = |c: &char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u');
    let mut tail = kind.chars().rev().map(|c| c.to_ascii_lowercase());
    match (tail.next(), tail.next()) {
        (Some('s' | 'x' | 'z'), _) | (Some('h'), Some('c' | 's')) => format!("{kind}es"),
        (Some('y'), Some(c)) if !is_vowel(&c) => format!("{}ies", &kind[..kind.len() - 1]),
        _ => format!("{kind}s"),
    }
}

/// Uniqueness bookkeeping for generated GraphQL type names.
///
/// Kinds sharing a name across groups get the sanitized group suffixed to
/// the later arrival.
#[derive(Debug, Default)]
pub struct TypeNames {
    taken: HashMap<String, String>,
}

impl TypeNames {
    /// Claim `desired` for `owner` (a `group/kind` key), disambiguating
    /// with the sanitized group when the name is already taken by another
    /// owner.
    pub fn claim(&mut self, desired: &str, sanitized_group: &str, owner: &str) -> String {
        match self.taken.get(desired) {
            None => {
                self.taken.insert(desired.to_string(), owner.to_string());
                desired.to_string()
            }
            Some(existing) if existing == owner => desired.to_string(),
            Some(_) => {
                let fallback = format!("{desired}_{sanitized_group}");
                self.taken.insert(fallback.clone(), owner.to_string());
                fallback
            }
        }
    }
}
