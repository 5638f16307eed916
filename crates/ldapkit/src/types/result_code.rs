//! LDAP result codes.

/// Result code returned by a directory transport primitive.
///
/// Non-negative values are the protocol result codes of RFC 4511. Negative
/// values are client-side codes raised by the transport itself (connection
/// loss, encoding failures, timeouts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResultCode(i32);

impl ResultCode {
    /// Creates a result code from its numeric value.
    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Returns true if the code is `SUCCESS`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the code was produced by the client library rather
    /// than returned by the server.
    #[must_use]
    pub const fn is_client_side(self) -> bool {
        self.0 < 0
    }

    /// Returns the protocol-defined description of this code.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self.0 {
            0 => "Success",
            1 => "Operations error",
            2 => "Protocol error",
            3 => "Time limit exceeded",
            4 => "Size limit exceeded",
            5 => "Compare False",
            6 => "Compare True",
            7 => "Authentication method not supported",
            8 => "Strong(er) authentication required",
            10 => "Referral",
            11 => "Administrative limit exceeded",
            12 => "Critical extension is unavailable",
            13 => "Confidentiality required",
            14 => "SASL bind in progress",
            16 => "No such attribute",
            17 => "Undefined attribute type",
            18 => "Inappropriate matching",
            19 => "Constraint violation",
            20 => "Type or value exists",
            21 => "Invalid syntax",
            32 => "No such object",
            33 => "Alias problem",
            34 => "Invalid DN syntax",
            35 => "Entry is a leaf",
            36 => "Alias dereferencing problem",
            48 => "Inappropriate authentication",
            49 => "Invalid credentials",
            50 => "Insufficient access",
            51 => "Server is busy",
            52 => "Server is unavailable",
            53 => "Server is unwilling to perform",
            54 => "Loop detected",
            64 => "Naming violation",
            65 => "Object class violation",
            66 => "Operation not allowed on non-leaf",
            67 => "Operation not allowed on RDN",
            68 => "Already exists",
            69 => "Cannot modify object class",
            71 => "Results too large",
            80 => "Other (e.g., implementation specific) error",
            -1 => "Can't contact LDAP server",
            -2 => "Local error",
            -3 => "Encoding error",
            -4 => "Decoding error",
            -5 => "Timed out",
            -6 => "Unknown authentication method",
            -7 => "Bad search filter",
            -8 => "User cancelled operation",
            -9 => "Bad parameter to an ldap routine",
            -10 => "Out of memory",
            -11 => "Connect error",
            -12 => "Not Supported",
            -13 => "Control not found",
            -14 => "No results returned",
            -15 => "More results to return",
            -16 => "Client Loop",
            -17 => "Referral Limit Exceeded",
            _ => "Unknown error",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

// Protocol result codes (RFC 4511 appendix A)
impl ResultCode {
    /// 0 success
    pub const SUCCESS: Self = Self(0);
    /// 1 operationsError
    pub const OPERATIONS_ERROR: Self = Self(1);
    /// 2 protocolError
    pub const PROTOCOL_ERROR: Self = Self(2);
    /// 3 timeLimitExceeded
    pub const TIME_LIMIT_EXCEEDED: Self = Self(3);
    /// 4 sizeLimitExceeded
    pub const SIZE_LIMIT_EXCEEDED: Self = Self(4);
    /// 7 authMethodNotSupported
    pub const AUTH_METHOD_NOT_SUPPORTED: Self = Self(7);
    /// 16 noSuchAttribute
    pub const NO_SUCH_ATTRIBUTE: Self = Self(16);
    /// 20 attributeOrValueExists
    pub const TYPE_OR_VALUE_EXISTS: Self = Self(20);
    /// 32 noSuchObject
    pub const NO_SUCH_OBJECT: Self = Self(32);
    /// 34 invalidDNSyntax
    pub const INVALID_DN_SYNTAX: Self = Self(34);
    /// 48 inappropriateAuthentication
    pub const INAPPROPRIATE_AUTH: Self = Self(48);
    /// 49 invalidCredentials
    pub const INVALID_CREDENTIALS: Self = Self(49);
    /// 50 insufficientAccessRights
    pub const INSUFFICIENT_ACCESS: Self = Self(50);
    /// 52 unavailable
    pub const UNAVAILABLE: Self = Self(52);
    /// 53 unwillingToPerform
    pub const UNWILLING_TO_PERFORM: Self = Self(53);
    /// 66 notAllowedOnNonLeaf
    pub const NOT_ALLOWED_ON_NONLEAF: Self = Self(66);
    /// 68 entryAlreadyExists
    pub const ALREADY_EXISTS: Self = Self(68);
    /// 80 other
    pub const OTHER: Self = Self(80);
}

// Client library codes
impl ResultCode {
    /// -1 server down
    pub const SERVER_DOWN: Self = Self(-1);
    /// -2 local error
    pub const LOCAL_ERROR: Self = Self(-2);
    /// -3 encoding error
    pub const ENCODING_ERROR: Self = Self(-3);
    /// -4 decoding error
    pub const DECODING_ERROR: Self = Self(-4);
    /// -5 timeout
    pub const TIMEOUT: Self = Self(-5);
    /// -6 unknown authentication method
    pub const AUTH_UNKNOWN: Self = Self(-6);
    /// -7 bad search filter
    pub const FILTER_ERROR: Self = Self(-7);
    /// -9 bad parameter
    pub const PARAM_ERROR: Self = Self(-9);
    /// -11 connect error
    pub const CONNECT_ERROR: Self = Self(-11);
    /// -12 not supported
    pub const NOT_SUPPORTED: Self = Self(-12);
    /// -14 no results returned
    pub const NO_RESULTS_RETURNED: Self = Self(-14);
    /// -17 referral limit exceeded
    pub const REFERRAL_LIMIT_EXCEEDED: Self = Self(-17);
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
    fn success() {
        assert!(ResultCode::SUCCESS.is_success());
        assert!(!ResultCode::INVALID_CREDENTIALS.is_success());
        assert!(!ResultCode::SERVER_DOWN.is_success());
    }

    #[test]
    fn client_side_codes_are_negative() {
        assert!(ResultCode::SERVER_DOWN.is_client_side());
        assert!(ResultCode::FILTER_ERROR.is_client_side());
        assert!(!ResultCode::NO_SUCH_OBJECT.is_client_side());
    }

    #[test]
    fn descriptions() {
        assert_eq!(ResultCode::SUCCESS.description(), "Success");
        assert_eq!(ResultCode::INVALID_CREDENTIALS.description(), "Invalid credentials");
        assert_eq!(ResultCode::NO_SUCH_OBJECT.description(), "No such object");
        assert_eq!(ResultCode::SERVER_DOWN.description(), "Can't contact LDAP server");
        assert_eq!(ResultCode::new(9999).description(), "Unknown error");
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", ResultCode::ALREADY_EXISTS), "68");
        assert_eq!(format!("{}", ResultCode::TIMEOUT), "-5");
    }

    #[test]
    fn from_i32() {
        assert_eq!(ResultCode::from(49), ResultCode::INVALID_CREDENTIALS);
        assert_eq!(ResultCode::new(32).as_i32(), 32);
    }
}
