//! Minimal RFC 4515 filter evaluation for the in-memory transport.

use std::collections::HashMap;

use crate::types::ResultCode;

/// A parsed search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `(&...)`
    And(Vec<Filter>),
    /// `(|...)`
    Or(Vec<Filter>),
    /// `(!...)`
    Not(Box<Filter>),
    /// `(attr=*)`
    Present(String),
    /// `(attr=value)`, also used for `~=`.
    Equal(String, String),
    /// `(attr>=value)`
    GreaterOrEqual(String, String),
    /// `(attr<=value)`
    LessOrEqual(String, String),
    /// `(attr=ab*cd*ef)`; the pieces between wildcards.
    Substring(String, Vec<String>),
}

impl Filter {
    /// Parses a filter string. A bare `attr=value` is accepted without
    /// surrounding parentheses.
    ///
    /// # Errors
    ///
    /// Returns `FILTER_ERROR` on malformed input.
    pub fn parse(input: &str) -> Result<Self, ResultCode> {
        let input = input.trim();
        let owned;
        let input = if input.starts_with('(') {
            input
        } else {
            owned = format!("({input})");
            owned.as_str()
        };

        let bytes = input.as_bytes();
        let (filter, end) = parse_at(bytes, 0)?;
        if end == bytes.len() {
            Ok(filter)
        } else {
            Err(ResultCode::FILTER_ERROR)
        }
    }

    /// Evaluates the filter against an attribute map. Attribute names and
    /// values compare case-insensitively.
    #[must_use]
    pub fn matches(&self, attributes: &HashMap<String, Vec<String>>) -> bool {
        match self {
            Self::And(items) => items.iter().all(|f| f.matches(attributes)),
            Self::Or(items) => items.iter().any(|f| f.matches(attributes)),
            Self::Not(inner) => !inner.matches(attributes),
            Self::Present(attr) => lookup(attributes, attr).is_some(),
            Self::Equal(attr, value) => any_value(attributes, attr, |v| v == value.to_lowercase()),
            Self::GreaterOrEqual(attr, value) => {
                any_value(attributes, attr, |v| v >= value.to_lowercase())
            }
            Self::LessOrEqual(attr, value) => {
                any_value(attributes, attr, |v| v <= value.to_lowercase())
            }
            Self::Substring(attr, pieces) => {
                any_value(attributes, attr, |v| substring_match(&v, pieces))
            }
        }
    }
}

fn lookup<'a>(attributes: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a Vec<String>> {
    attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, values)| values)
}

fn any_value(
    attributes: &HashMap<String, Vec<String>>,
    name: &str,
    pred: impl Fn(String) -> bool,
) -> bool {
    lookup(attributes, name).is_some_and(|values| values.iter().any(|v| pred(v.to_lowercase())))
}

fn substring_match(value: &str, pieces: &[String]) -> bool {
    let Some((first, rest)) = pieces.split_first() else {
        return true;
    };
    let Some(mut remaining) = value.strip_prefix(first.to_lowercase().as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for piece in middle {
        let piece = piece.to_lowercase();
        match remaining.find(piece.as_str()) {
            Some(at) => remaining = &remaining[at + piece.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last.to_lowercase().as_str())
}

fn parse_at(bytes: &[u8], pos: usize) -> Result<(Filter, usize), ResultCode> {
    if bytes.get(pos) != Some(&b'(') {
        return Err(ResultCode::FILTER_ERROR);
    }
    match bytes.get(pos + 1) {
        Some(b'&') => parse_list(bytes, pos + 2).map(|(items, end)| (Filter::And(items), end)),
        Some(b'|') => parse_list(bytes, pos + 2).map(|(items, end)| (Filter::Or(items), end)),
        Some(b'!') => {
            let (inner, end) = parse_at(bytes, pos + 2)?;
            if bytes.get(end) == Some(&b')') {
                Ok((Filter::Not(Box::new(inner)), end + 1))
            } else {
                Err(ResultCode::FILTER_ERROR)
            }
        }
        Some(_) => parse_item(bytes, pos + 1),
        None => Err(ResultCode::FILTER_ERROR),
    }
}

fn parse_list(bytes: &[u8], mut pos: usize) -> Result<(Vec<Filter>, usize), ResultCode> {
    let mut items = Vec::new();
    while bytes.get(pos) == Some(&b'(') {
        let (item, end) = parse_at(bytes, pos)?;
        items.push(item);
        pos = end;
    }
    if bytes.get(pos) == Some(&b')') && !items.is_empty() {
        Ok((items, pos + 1))
    } else {
        Err(ResultCode::FILTER_ERROR)
    }
}

fn parse_item(bytes: &[u8], start: usize) -> Result<(Filter, usize), ResultCode> {
    let close = bytes[start..]
        .iter()
        .position(|&b| b == b')')
        .map(|offset| start + offset)
        .ok_or(ResultCode::FILTER_ERROR)?;
    let item = std::str::from_utf8(&bytes[start..close]).map_err(|_| ResultCode::FILTER_ERROR)?;
    let eq = item.find('=').ok_or(ResultCode::FILTER_ERROR)?;

    let (attr, op) = match item[..eq].chars().last() {
        Some(c @ ('>' | '<' | '~')) => (&item[..eq - 1], Some(c)),
        _ => (&item[..eq], None),
    };
    let attr = attr.trim();
    if attr.is_empty() {
        return Err(ResultCode::FILTER_ERROR);
    }
    let raw = &item[eq + 1..];
    let attr = attr.to_string();

    let filter = match op {
        Some('>') => Filter::GreaterOrEqual(attr, unescape(raw)?),
        Some('<') => Filter::LessOrEqual(attr, unescape(raw)?),
        Some(_) => Filter::Equal(attr, unescape(raw)?),
        None if raw == "*" => Filter::Present(attr),
        None if raw.contains('*') => {
            let pieces = raw.split('*').map(unescape).collect::<Result<Vec<_>, _>>()?;
            Filter::Substring(attr, pieces)
        }
        None => Filter::Equal(attr, unescape(raw)?),
    };
    Ok((filter, close + 1))
}

fn unescape(raw: &str) -> Result<String, ResultCode> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let hex = raw.get(i + 1..i + 3).ok_or(ResultCode::FILTER_ERROR)?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| ResultCode::FILTER_ERROR)?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| ((*k).to_string(), vs.iter().map(|v| (*v).to_string()).collect()))
            .collect()
    }

    #[test]
    fn presence() {
        let f = Filter::parse("(objectclass=*)").unwrap();
        assert_eq!(f, Filter::Present("objectclass".into()));
        assert!(f.matches(&attrs(&[("objectClass", &["top"])])));
        assert!(!f.matches(&attrs(&[("cn", &["x"])])));
    }

    #[test]
    fn equality_is_case_insensitive() {
        let f = Filter::parse("(CN=Alice)").unwrap();
        assert!(f.matches(&attrs(&[("cn", &["alice"])])));
        assert!(!f.matches(&attrs(&[("cn", &["bob"])])));
    }

    #[test]
    fn boolean_combinations() {
        let f = Filter::parse("(&(objectClass=person)(|(cn=alice)(cn=bob))(!(sn=x)))").unwrap();
        assert!(f.matches(&attrs(&[("objectClass", &["person"]), ("cn", &["bob"])])));
        assert!(!f.matches(&attrs(&[
            ("objectClass", &["person"]),
            ("cn", &["bob"]),
            ("sn", &["x"])
        ])));
        assert!(!f.matches(&attrs(&[("objectClass", &["group"]), ("cn", &["bob"])])));
    }

    #[test]
    fn substrings() {
        let f = Filter::parse("(mail=*@example.com)").unwrap();
        assert!(f.matches(&attrs(&[("mail", &["a@example.com"])])));
        assert!(!f.matches(&attrs(&[("mail", &["a@example.org"])])));

        let f = Filter::parse("(cn=al*c*)").unwrap();
        assert!(f.matches(&attrs(&[("cn", &["alice"])])));
        assert!(!f.matches(&attrs(&[("cn", &["bob"])])));
    }

    #[test]
    fn ordering() {
        let f = Filter::parse("(uidNumber>=1000)").unwrap();
        assert!(f.matches(&attrs(&[("uidNumber", &["1001"])])));
        let f = Filter::parse("(uidNumber<=1000)").unwrap();
        assert!(!f.matches(&attrs(&[("uidNumber", &["1001"])])));
    }

    #[test]
    fn escapes_are_decoded() {
        let f = Filter::parse("(cn=a\\2ab)").unwrap();
        assert_eq!(f, Filter::Equal("cn".into(), "a*b".into()));
    }

    #[test]
    fn bare_filter_is_accepted() {
        assert_eq!(
            Filter::parse("uid=alice").unwrap(),
            Filter::Equal("uid".into(), "alice".into())
        );
    }

    #[test]
    fn malformed_filters() {
        for bad in ["(cn=x", "(&)", "(=x)", "(cn)", "(cn=x))", "(cn=\\zz)", "(!(cn=x)"] {
            assert_eq!(Filter::parse(bad), Err(ResultCode::FILTER_ERROR), "{bad}");
        }
    }
}
