//! Security identifier filters.
//!
//! Active Directory stores `objectSid` as a binary blob. Searching for it
//! requires the string form (`S-1-5-21-...`) to be converted to its binary
//! layout and every byte hex-escaped in the filter:
//!
//! ```text
//! revision (1 byte) | sub-authority count (1 byte)
//! identifier authority (6 bytes, big-endian)
//! sub-authorities (4 bytes each, little-endian)
//! ```

use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::error::ValidationError;

const MAX_SUB_AUTHORITIES: usize = 15;
const MAX_AUTHORITY: u64 = (1 << 48) - 1;

/// A parsed Windows security identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityIdentifier {
    revision: u8,
    authority: u64,
    sub_authorities: Vec<u32>,
}

impl SecurityIdentifier {
    /// Returns the identifier authority.
    #[must_use]
    pub const fn authority(&self) -> u64 {
        self.authority
    }

    /// Returns the sub-authorities, most significant first.
    #[must_use]
    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }

    /// Returns the relative identifier (last sub-authority).
    #[must_use]
    pub fn rid(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }

    /// Encodes the identifier in its binary layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 4 * self.sub_authorities.len());
        bytes.push(self.revision);
        // Bounded by MAX_SUB_AUTHORITIES at parse time.
        #[allow(clippy::cast_possible_truncation)]
        bytes.push(self.sub_authorities.len() as u8);
        bytes.extend_from_slice(&self.authority.to_be_bytes()[2..]);
        for sub in &self.sub_authorities {
            bytes.extend_from_slice(&sub.to_le_bytes());
        }
        bytes
    }

    /// Returns the binary layout as an escaped filter value (`\01\05...`).
    #[must_use]
    pub fn to_filter_value(&self) -> String {
        self.to_bytes()
            .iter()
            .fold(String::new(), |mut out, byte| {
                let _ = write!(out, "\\{byte:02x}");
                out
            })
    }
}

impl FromStr for SecurityIdentifier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidSubjectId(s.to_string());

        let mut parts = s.trim().split('-');
        if !parts.next().is_some_and(|p| p.eq_ignore_ascii_case("S")) {
            return Err(invalid());
        }
        let revision: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        if revision != 1 {
            return Err(invalid());
        }

        let authority = parts.next().and_then(parse_authority).ok_or_else(invalid)?;
        let sub_authorities = parts
            .map(|p| p.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        if sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(invalid());
        }

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }
}

fn parse_authority(part: &str) -> Option<u64> {
    let value = match part.strip_prefix("0x").or_else(|| part.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => part.parse().ok()?,
    };
    (value <= MAX_AUTHORITY).then_some(value)
}

impl fmt::Display for SecurityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-", self.revision)?;
        if self.authority >= 1 << 32 {
            write!(f, "0x{:012X}", self.authority)?;
        } else {
            write!(f, "{}", self.authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

/// Builds an `objectSid` equality filter for a string-form identifier.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidSubjectId`] if `sid` is malformed.
///
/// # Examples
///
/// ```
/// let filter = ldapkit::sid::subject_id_filter("S-1-5-32-544").unwrap();
/// assert_eq!(filter, "(objectSid=\\01\\02\\00\\00\\00\\00\\00\\05\\20\\00\\00\\00\\20\\02\\00\\00)");
/// ```
pub fn subject_id_filter(sid: &str) -> Result<String, ValidationError> {
    let sid: SecurityIdentifier = sid.parse()?;
    Ok(format!("(objectSid={})", sid.to_filter_value()))
}

/// Escapes a value for use inside an RFC 4515 filter.
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\5c"),
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
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
    use proptest::prelude::*;

    #[test]
    fn parses_domain_sid() {
        let sid: SecurityIdentifier = "S-1-5-21-3623811015-3361044348-30300820-1013".parse().unwrap();
        assert_eq!(sid.authority(), 5);
        assert_eq!(sid.sub_authorities(), &[21, 3623811015, 3361044348, 30300820, 1013]);
        assert_eq!(sid.rid(), Some(1013));
    }

    #[test]
    fn binary_layout() {
        let sid: SecurityIdentifier = "S-1-5-18".parse().unwrap();
        assert_eq!(
            sid.to_bytes(),
            vec![1, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0]
        );
        assert_eq!(
            sid.to_filter_value(),
            "\\01\\01\\00\\00\\00\\00\\00\\05\\12\\00\\00\\00"
        );
    }

    #[test]
    fn filter_for_builtin_administrators() {
        assert_eq!(
            subject_id_filter("S-1-5-32-544").unwrap(),
            "(objectSid=\\01\\02\\00\\00\\00\\00\\00\\05\\20\\00\\00\\00\\20\\02\\00\\00)"
        );
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "",
            "S",
            "X-1-5-18",
            "S-2-5-18",
            "S-1",
            "S-1-5-abc",
            "S-1-281474976710656-1",
            "S-1-5-1-2-3-4-5-6-7-8-9-10-11-12-13-14-15-16",
        ] {
            let err = bad.parse::<SecurityIdentifier>().unwrap_err();
            assert_eq!(err, ValidationError::InvalidSubjectId(bad.to_string()), "{bad}");
        }
    }

    #[test]
    fn hex_authority_round_trips() {
        let sid: SecurityIdentifier = "S-1-0x123456789ABC-1".parse().unwrap();
        assert_eq!(sid.to_string(), "S-1-0x123456789ABC-1");
        assert_eq!(&sid.to_bytes()[2..8], &[0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc]);
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_filter_value("a*b(c)d\\e\0"), "a\\2ab\\28c\\29d\\5ce\\00");
        assert_eq!(escape_filter_value("plain"), "plain");
    }

    proptest! {
        #[test]
        fn string_form_round_trips(authority in 0u64..=u64::from(u32::MAX), subs in proptest::collection::vec(any::<u32>(), 0..=15)) {
            let mut text = format!("S-1-{authority}");
            for sub in &subs {
                text.push_str(&format!("-{sub}"));
            }
            let sid: SecurityIdentifier = text.parse().unwrap();
            prop_assert_eq!(sid.to_string(), text);
            prop_assert_eq!(sid.to_bytes().len(), 8 + 4 * subs.len());
        }
    }
}
