//! Session options, protocol versions and search parameters.

/// Session option key understood by the transport's set/get option primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LdapOption(i32);

impl LdapOption {
    /// Creates an option key from its numeric value.
    #[must_use]
    pub const fn new(key: i32) -> Self {
        Self(key)
    }

    /// Returns the numeric key.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Returns true for the SASL negotiation options.
    #[must_use]
    pub const fn is_sasl(self) -> bool {
        self.0 >= 0x6100 && self.0 < 0x6200
    }
}

impl LdapOption {
    /// Maximum number of entries returned by a search.
    pub const SIZELIMIT: Self = Self(0x03);
    /// Server-side time limit for a search, in seconds.
    pub const TIMELIMIT: Self = Self(0x04);
    /// Whether referrals are chased automatically.
    pub const REFERRALS: Self = Self(0x08);
    /// Protocol version negotiated with the server.
    pub const PROTOCOL_VERSION: Self = Self(0x11);
    /// Network connect timeout.
    pub const NETWORK_TIMEOUT: Self = Self(0x5005);
    /// SASL mechanism.
    pub const X_SASL_MECH: Self = Self(0x6100);
    /// SASL realm.
    pub const X_SASL_REALM: Self = Self(0x6101);
    /// SASL authentication identity.
    pub const X_SASL_AUTHCID: Self = Self(0x6102);
    /// SASL authorization identity.
    pub const X_SASL_AUTHZID: Self = Self(0x6103);
}

impl std::fmt::Display for LdapOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Value handed to the transport's set-option primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Integer option (limits, versions, flags).
    Int(i32),
    /// String option (SASL identities, URIs).
    Str(String),
    /// Transport-specific structure, passed through untouched.
    Raw(Vec<u8>),
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for OptionValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Raw(value)
    }
}

/// LDAP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// LDAPv2 (historic).
    V2,
    /// LDAPv3.
    #[default]
    V3,
}

impl ProtocolVersion {
    /// Returns the value sent with the `PROTOCOL_VERSION` option.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

/// Breadth of a search relative to its base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// Only the base entry itself.
    Base,
    /// Immediate children of the base entry.
    OneLevel,
    /// The base entry and all of its descendants.
    #[default]
    Subtree,
    /// All descendants, excluding the base entry.
    Children,
}

impl SearchScope {
    /// Returns the protocol value of this scope.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Base => 0,
            Self::OneLevel => 1,
            Self::Subtree => 2,
            Self::Children => 3,
        }
    }
}

/// Size limit attached to a search request. Zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeLimit(u32);

impl SizeLimit {
    /// No limit on the number of returned entries.
    pub const NO_LIMIT: Self = Self(0);

    /// Creates a limit of `n` entries.
    #[must_use]
    pub const fn entries(n: u32) -> Self {
        Self(n)
    }

    /// Returns the raw limit.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns true if the search is unbounded.
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        self.0 == 0
    }
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

    #[test]
    fn sasl_options() {
        assert!(LdapOption::X_SASL_REALM.is_sasl());
        assert!(LdapOption::X_SASL_AUTHZID.is_sasl());
        assert!(!LdapOption::PROTOCOL_VERSION.is_sasl());
    }

    #[test]
    fn option_display_is_hex() {
        assert_eq!(LdapOption::PROTOCOL_VERSION.to_string(), "0x0011");
        assert_eq!(LdapOption::X_SASL_REALM.to_string(), "0x6101");
    }

    #[test]
    fn option_value_conversions() {
        assert_eq!(OptionValue::from(3), OptionValue::Int(3));
        assert_eq!(OptionValue::from("realm"), OptionValue::Str("realm".into()));
        assert_eq!(OptionValue::from(vec![1u8, 2]), OptionValue::Raw(vec![1, 2]));
    }

    #[test]
    fn defaults() {
        assert_eq!(ProtocolVersion::default().as_i32(), 3);
        assert_eq!(SearchScope::default(), SearchScope::Subtree);
        assert!(SizeLimit::default().is_unlimited());
        assert_eq!(SizeLimit::entries(10).get(), 10);
    }

    #[test]
    fn scope_values() {
        assert_eq!(SearchScope::Base.as_i32(), 0);
        assert_eq!(SearchScope::OneLevel.as_i32(), 1);
        assert_eq!(SearchScope::Subtree.as_i32(), 2);
        assert_eq!(SearchScope::Children.as_i32(), 3);
    }
}
