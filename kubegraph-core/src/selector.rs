//! Label selector parsing and matching.

use std::{collections::BTreeSet, fmt, str::FromStr};

use crate::Error;

/// A selector expression with existing operations
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    /// Key's value is one of a set
    In(String, BTreeSet<String>),
    /// Key's value is not one of a set
    NotIn(String, BTreeSet<String>),
    /// Key equals value
    Equal(String, String),
    /// Key does not equal value
    NotEqual(String, String),
    /// Key exists
    Exists(String),
    /// Key does not exist
    DoesNotExist(String),
}

/// Perform selection on a list of expressions
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Selector(Vec<Expression>);

impl Selector {
    /// Indicates whether this selector matches everything
    pub fn selects_all(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert the selector back to API query string form
    pub fn to_selector_string(&self) -> String {
        self.0.iter().map(Expression::to_string).collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::In(key, values) => {
                write!(f, "{key} in ({})", values.iter().cloned().collect::<Vec<_>>().join(","))
            }
            Expression::NotIn(key, values) => {
                write!(f, "{key} notin ({})", values.iter().cloned().collect::<Vec<_>>().join(","))
            }
            Expression::Equal(key, value) => write!(f, "{key}={value}"),
            Expression::NotEqual(key, value) => write!(f, "{key}!={value}"),
            Expression::Exists(key) => write!(f, "{key}"),
            Expression::DoesNotExist(key) => write!(f, "!{key}"),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_selector_string())
    }
}

fn bad(selector: &str, reason: impl Into<String>) -> Error {
    Error::BadSelector {
        selector: selector.into(),
        reason: reason.into(),
    }
}

// Set-based requirements (`in`/`notin`) contain commas inside parentheses,
// so the requirement split has to be paren-aware.
fn split_requirements(s: &str) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut cur = String::new();
    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                cur.push(c);
            }
            ')' => {
                depth = depth.checked_sub(1).ok_or("unbalanced parentheses")?;
                cur.push(c);
            }
            ',' if depth == 0 => {
                out.push(std::mem::take(&mut cur));
            }
            _ => cur.push(c),
        }
    }
    if depth != 0 {
        return Err("unbalanced parentheses".into());
    }
    out.push(cur);
    Ok(out)
}

fn parse_set(raw: &str) -> Option<BTreeSet<String>> {
    let inner = raw.strip_prefix('(')?.strip_suffix(')')?;
    Some(
        inner
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect(),
    )
}

fn validate_key(selector: &str, key: &str) -> Result<(), Error> {
    if key.is_empty() {
        return Err(bad(selector, "empty key"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(bad(selector, format!("invalid characters in key {key:?}")));
    }
    Ok(())
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Selector::default());
        }
        let mut exprs = Vec::new();
        for req in split_requirements(trimmed).map_err(|reason| bad(raw, reason))? {
            let req = req.trim();
            if req.is_empty() {
                return Err(bad(raw, "empty requirement"));
            }
            let expr = if let Some((key, rest)) = req.split_once(" notin ") {
                let key = key.trim();
                validate_key(raw, key)?;
                let values =
                    parse_set(rest.trim()).ok_or_else(|| bad(raw, "notin requires a (a,b) set"))?;
                Expression::NotIn(key.into(), values)
            } else if let Some((key, rest)) = req.split_once(" in ") {
                let key = key.trim();
                validate_key(raw, key)?;
                let values =
                    parse_set(rest.trim()).ok_or_else(|| bad(raw, "in requires a (a,b) set"))?;
                Expression::In(key.into(), values)
            } else if let Some((key, value)) = req.split_once("!=") {
                let key = key.trim();
                validate_key(raw, key)?;
                Expression::NotEqual(key.into(), value.trim().into())
            } else if let Some((key, value)) = req.split_once("==") {
                let key = key.trim();
                validate_key(raw, key)?;
                Expression::Equal(key.into(), value.trim().into())
            } else if let Some((key, value)) = req.split_once('=') {
                let key = key.trim();
                validate_key(raw, key)?;
                Expression::Equal(key.into(), value.trim().into())
            } else if let Some(key) = req.strip_prefix('!') {
                let key = key.trim();
                validate_key(raw, key)?;
                Expression::DoesNotExist(key.into())
            } else {
                validate_key(raw, req)?;
                Expression::Exists(req.into())
            };
            exprs.push(expr);
        }
        Ok(Selector(exprs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_equality_and_inequality() {
        let sel: Selector = "app=web,tier!=frontend".parse().unwrap();
        assert_eq!(sel.to_selector_string(), "app=web,tier!=frontend");
    }

    #[test]
    fn parses_set_requirements() {
        let sel: Selector = "env in (prod, staging),region notin (us-east-1)".parse().unwrap();
        assert_eq!(
            sel.to_selector_string(),
            "env in (prod,staging),region notin (us-east-1)"
        );
    }

    #[test]
    fn parses_existence() {
        let sel: Selector = "has-gpu,!spot".parse().unwrap();
        assert_eq!(sel.to_selector_string(), "has-gpu,!spot");
    }

    #[test]
    fn empty_selects_all() {
        let sel: Selector = "".parse().unwrap();
        assert!(sel.selects_all());
    }

    #[test]
    fn rejects_bad_input() {
        assert!("app in (a".parse::<Selector>().is_err());
        assert!("a==b,".parse::<Selector>().is_err());
        assert!("sp ace=1".parse::<Selector>().is_err());
    }
}
