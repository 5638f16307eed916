//! Bind strategies.
//!
//! Two mechanisms are supported:
//! - Simple (RFC 4513 section 5.1) - DN and password sent as-is
//! - SASL GSSAPI (RFC 4752) - credentials delegated to the transport's
//!   SASL layer, using the defaults negotiated on the session
//!
//! Neither strategy retries. A failed bind leaves the session state alone.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::transport::{DirectoryTransport, SaslBindRequest};
use crate::translate;
use crate::types::{LdapOption, ResultCode};

/// Authentication mechanism selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// Simple bind with DN and password.
    Simple,
    /// SASL GSSAPI (Kerberos) bind.
    Gssapi,
}

impl AuthMechanism {
    /// Returns the canonical mechanism name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "Simple",
            Self::Gssapi => "GSSAPI",
        }
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case(Self::Simple.as_str()) {
            Ok(Self::Simple)
        } else if s.eq_ignore_ascii_case(Self::Gssapi.as_str()) {
            Ok(Self::Gssapi)
        } else {
            Err(Error::UnsupportedMechanism(s.to_string()))
        }
    }
}

/// Credentials for a simple bind. Both fields empty is an anonymous bind.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Bind DN.
    pub user_dn: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(user_dn: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_dn: user_dn.into(),
            password: password.into(),
        }
    }

    /// Anonymous credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns true for an anonymous bind.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_dn.is_empty() && self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_dn", &self.user_dn)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SASL defaults negotiated on a session, handed to the interactive bind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaslDefaults {
    /// Mechanism.
    pub mechanism: Option<String>,
    /// Realm.
    pub realm: Option<String>,
    /// Authentication identity.
    pub authcid: Option<String>,
    /// Authorization identity.
    pub authzid: Option<String>,
}

impl SaslDefaults {
    /// Reads realm, authcid and authzid from the session.
    ///
    /// # Errors
    ///
    /// Returns a connection error if any option query fails.
    pub fn query<T: DirectoryTransport>(
        transport: &mut T,
        session: &T::Session,
        mechanism: &str,
    ) -> Result<Self> {
        let realm = get_sasl_option(transport, session, LdapOption::X_SASL_REALM)?;
        let authcid = get_sasl_option(transport, session, LdapOption::X_SASL_AUTHCID)?;
        let authzid = get_sasl_option(transport, session, LdapOption::X_SASL_AUTHZID)?;

        Ok(Self {
            mechanism: Some(mechanism.to_string()),
            realm,
            authcid,
            authzid,
        })
    }
}

fn get_sasl_option<T: DirectoryTransport>(
    transport: &mut T,
    session: &T::Session,
    option: LdapOption,
) -> Result<Option<String>> {
    match transport.get_option(session, option) {
        Ok(value) => Ok(value),
        Err(code) => Err(translate::connection_error(transport, "get_option", code)),
    }
}

/// How much the SASL library may prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionFlags {
    /// Use defaults, prompt only for what is missing.
    Automatic,
    /// Prompt for everything.
    Interactive,
    /// Never prompt.
    #[default]
    Quiet,
}

impl InteractionFlags {
    /// Returns the protocol flag value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Automatic => 0,
            Self::Interactive => 1,
            Self::Quiet => 2,
        }
    }
}

/// Callback invoked by the transport while a SASL exchange needs input.
pub trait SaslInteraction {
    /// Answers the mechanism's prompts. Returns `SUCCESS` to continue.
    fn interact(&self, flags: InteractionFlags, defaults: &SaslDefaults) -> ResultCode;
}

/// Interaction policy that never has anything to add.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInteraction;

impl SaslInteraction for NoInteraction {
    fn interact(&self, _flags: InteractionFlags, _defaults: &SaslDefaults) -> ResultCode {
        ResultCode::SUCCESS
    }
}

/// A bind strategy.
pub trait Authenticator<T: DirectoryTransport> {
    /// Mechanism name, used in errors and logs.
    fn mechanism(&self) -> &str;

    /// Runs the bind on `session`.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the server rejects the bind, or a
    /// connection error if session negotiation fails.
    fn authenticate(&self, transport: &mut T, session: &mut T::Session) -> Result<()>;
}

/// Simple bind strategy.
#[derive(Debug, Clone, Default)]
pub struct SimpleBind {
    credentials: Credentials,
}

impl SimpleBind {
    /// Creates a simple bind strategy.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl<T: DirectoryTransport> Authenticator<T> for SimpleBind {
    fn mechanism(&self) -> &str {
        AuthMechanism::Simple.as_str()
    }

    fn authenticate(&self, transport: &mut T, session: &mut T::Session) -> Result<()> {
        tracing::debug!(dn = %self.credentials.user_dn, "simple bind");
        let code = transport.simple_bind(
            session,
            &self.credentials.user_dn,
            &self.credentials.password,
        );
        if code.is_success() {
            Ok(())
        } else {
            Err(translate::authentication_error(
                &*transport,
                session,
                AuthMechanism::Simple.as_str(),
                code,
            ))
        }
    }
}

/// Interactive SASL bind strategy.
#[derive(Debug, Clone)]
pub struct SaslBind<I = NoInteraction> {
    mechanism: String,
    flags: InteractionFlags,
    interaction: I,
}

impl SaslBind<NoInteraction> {
    /// GSSAPI bind that never prompts.
    #[must_use]
    pub fn gssapi() -> Self {
        Self::new(AuthMechanism::Gssapi.as_str(), NoInteraction)
    }
}

impl<I: SaslInteraction> SaslBind<I> {
    /// Creates a SASL bind for `mechanism` with a custom interaction policy.
    #[must_use]
    pub fn new(mechanism: impl Into<String>, interaction: I) -> Self {
        Self {
            mechanism: mechanism.into(),
            flags: InteractionFlags::Quiet,
            interaction,
        }
    }

    /// Sets the interaction flags.
    #[must_use]
    pub const fn flags(mut self, flags: InteractionFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl<T: DirectoryTransport, I: SaslInteraction> Authenticator<T> for SaslBind<I> {
    fn mechanism(&self) -> &str {
        &self.mechanism
    }

    fn authenticate(&self, transport: &mut T, session: &mut T::Session) -> Result<()> {
        let defaults = SaslDefaults::query(transport, session, &self.mechanism)?;
        tracing::debug!(
            mechanism = %self.mechanism,
            realm = ?defaults.realm,
            authcid = ?defaults.authcid,
            "sasl interactive bind"
        );

        let request = SaslBindRequest {
            mechanism: &self.mechanism,
            flags: self.flags,
            defaults: &defaults,
            interaction: &self.interaction,
        };
        let code = transport.sasl_interactive_bind(session, &request);
        if code.is_success() {
            Ok(())
        } else {
            Err(translate::authentication_error(
                &*transport,
                session,
                &self.mechanism,
                code,
            ))
        }
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
    use crate::transport::memory::{MemoryTransport, Primitive};

    fn session(transport: &mut MemoryTransport) -> <MemoryTransport as DirectoryTransport>::Session {
        transport.initialize("ldap.example.com", 389).unwrap()
    }

    #[test]
    fn mechanism_parse_is_case_insensitive() {
        assert_eq!("simple".parse::<AuthMechanism>().unwrap(), AuthMechanism::Simple);
        assert_eq!("SIMPLE".parse::<AuthMechanism>().unwrap(), AuthMechanism::Simple);
        assert_eq!("gssapi".parse::<AuthMechanism>().unwrap(), AuthMechanism::Gssapi);
        assert_eq!("GssApi".parse::<AuthMechanism>().unwrap(), AuthMechanism::Gssapi);
    }

    #[test]
    fn mechanism_parse_rejects_unknown() {
        let err = "DIGEST-MD5".parse::<AuthMechanism>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedMechanism(ref m) if m == "DIGEST-MD5"));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("cn=admin", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("cn=admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn anonymous_credentials() {
        assert!(Credentials::anonymous().is_anonymous());
        assert!(!Credentials::new("cn=admin", "").is_anonymous());
    }

    #[test]
    fn simple_bind_success() {
        let mut transport = MemoryTransport::new().with_user("cn=admin,dc=example,dc=com", "pw");
        let mut session = session(&mut transport);
        let strategy = SimpleBind::new(Credentials::new("cn=admin,dc=example,dc=com", "pw"));
        strategy.authenticate(&mut transport, &mut session).unwrap();
    }

    #[test]
    fn simple_bind_wrong_password() {
        let mut transport = MemoryTransport::new().with_user("cn=admin,dc=example,dc=com", "pw");
        let mut session = session(&mut transport);
        let strategy = SimpleBind::new(Credentials::new("cn=admin,dc=example,dc=com", "nope"));
        let err = strategy.authenticate(&mut transport, &mut session).unwrap_err();

        match err {
            Error::Authentication { mechanism, code, .. } => {
                assert_eq!(mechanism, "Simple");
                assert_eq!(code, ResultCode::INVALID_CREDENTIALS);
            }
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[test]
    fn sasl_defaults_query() {
        let mut transport = MemoryTransport::new()
            .with_sasl_option(LdapOption::X_SASL_REALM, "EXAMPLE.COM")
            .with_sasl_option(LdapOption::X_SASL_AUTHCID, "alice");
        let session = session(&mut transport);

        let defaults = SaslDefaults::query(&mut transport, &session, "GSSAPI").unwrap();
        assert_eq!(defaults.mechanism.as_deref(), Some("GSSAPI"));
        assert_eq!(defaults.realm.as_deref(), Some("EXAMPLE.COM"));
        assert_eq!(defaults.authcid.as_deref(), Some("alice"));
        assert_eq!(defaults.authzid, None);
    }

    #[test]
    fn sasl_defaults_query_failure_is_connection_error() {
        let mut transport = MemoryTransport::new();
        transport.fail(
            Primitive::GetOption(LdapOption::X_SASL_REALM),
            ResultCode::LOCAL_ERROR,
        );
        let session = session(&mut transport);

        let err = SaslDefaults::query(&mut transport, &session, "GSSAPI").unwrap_err();
        assert!(matches!(
            err,
            Error::Connection {
                operation: "get_option",
                code: ResultCode::LOCAL_ERROR,
                ..
            }
        ));
    }

    #[test]
    fn gssapi_bind_success() {
        let mut transport = MemoryTransport::new()
            .with_kerberos_principal("alice@EXAMPLE.COM")
            .with_sasl_option(LdapOption::X_SASL_REALM, "EXAMPLE.COM");
        let mut session = session(&mut transport);

        SaslBind::gssapi()
            .authenticate(&mut transport, &mut session)
            .unwrap();
        assert_eq!(session.bound_as(), Some("alice@EXAMPLE.COM"));
    }

    #[test]
    fn gssapi_bind_without_ticket_fails() {
        let mut transport = MemoryTransport::new();
        let mut session = session(&mut transport);

        let err = SaslBind::gssapi()
            .authenticate(&mut transport, &mut session)
            .unwrap_err();
        match err {
            Error::Authentication { mechanism, code, .. } => {
                assert_eq!(mechanism, "GSSAPI");
                assert_eq!(code, ResultCode::INAPPROPRIATE_AUTH);
            }
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    struct Refuse;

    impl SaslInteraction for Refuse {
        fn interact(&self, _flags: InteractionFlags, _defaults: &SaslDefaults) -> ResultCode {
            ResultCode::new(-8)
        }
    }

    #[test]
    fn custom_interaction_policy_is_consulted() {
        let mut transport = MemoryTransport::new().with_kerberos_principal("alice@EXAMPLE.COM");
        let mut session = session(&mut transport);

        let err = SaslBind::new("GSSAPI", Refuse)
            .flags(InteractionFlags::Interactive)
            .authenticate(&mut transport, &mut session)
            .unwrap_err();
        assert_eq!(err.result_code(), Some(ResultCode::new(-8)));
    }

    #[test]
    fn interaction_flag_values() {
        assert_eq!(InteractionFlags::Automatic.as_u32(), 0);
        assert_eq!(InteractionFlags::Interactive.as_u32(), 1);
        assert_eq!(InteractionFlags::Quiet.as_u32(), 2);
        assert_eq!(InteractionFlags::default(), InteractionFlags::Quiet);
    }
}
