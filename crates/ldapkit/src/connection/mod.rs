//! LDAP session management.
//!
//! [`Connection`] drives a [`DirectoryTransport`] through the session
//! lifecycle:
//!
//! ```text
//! Uninitialized --connect--> Connected --bind--> Bound --close--> Closed
//!       |                        |                 ^ |
//!       |                        |                 +-+ bind (re-bind)
//!       +-------- close ---------+------ close ------^
//! ```
//!
//! The state never moves backward and `Closed` is terminal. An operation
//! that fails leaves the state where it was; `close` always ends in
//! `Closed` and never fails.
//!
//! ## Example
//!
//! ```
//! use ldapkit::transport::memory::MemoryTransport;
//! use ldapkit::{Connection, Credentials, DirectoryEntry, ProtocolVersion};
//!
//! let transport = MemoryTransport::new()
//!     .with_user("cn=admin,dc=example,dc=com", "secret")
//!     .with_entry(DirectoryEntry::builder("dc=example,dc=com")
//!         .attribute("objectClass", ["domain"])
//!         .build());
//!
//! let mut conn = Connection::new(transport);
//! conn.connect("localhost", 389, ProtocolVersion::V3)?;
//! conn.bind("Simple", Credentials::new("cn=admin,dc=example,dc=com", "secret"))?;
//!
//! for entry in conn.search("dc=example,dc=com", "(objectClass=*)")? {
//!     println!("dn: {}", entry.dn());
//! }
//! conn.close();
//! # Ok::<(), ldapkit::Error>(())
//! ```

mod config;

pub use config::{ConnectionConfig, ConnectionConfigBuilder, DEFAULT_PORT};

use std::fmt;

use crate::auth::{AuthMechanism, Authenticator, Credentials, SaslBind, SimpleBind};
use crate::codec::ModBatch;
use crate::decoder::{EntryDecoder, SearchResults};
use crate::error::{Error, Result, ValidationError};
use crate::sid;
use crate::translate;
use crate::transport::{DirectoryTransport, SearchRequest};
use crate::types::{
    DirectoryEntry, LdapOption, ModifyEntry, OptionValue, ProtocolVersion, ResultCode,
    SearchScope,
};

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No session exists yet.
    #[default]
    Uninitialized,
    /// Session created, not authenticated.
    Connected,
    /// Authenticated; searches and writes are allowed.
    Bound,
    /// Session released. Terminal.
    Closed,
}

impl SessionState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Connected => "Connected",
            Self::Bound => "Bound",
            Self::Closed => "Closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const BINDABLE: &[SessionState] = &[SessionState::Connected, SessionState::Bound];
const BOUND: &[SessionState] = &[SessionState::Bound];

/// A single LDAP session over a transport.
///
/// Every method takes `&mut self`, so calls on one connection never
/// interleave. The connection is `Send` when the transport and its session
/// handle are, and can be moved to another thread between calls.
///
/// Dropping a connection closes it.
pub struct Connection<T: DirectoryTransport> {
    transport: T,
    session: Option<T::Session>,
    state: SessionState,
}

impl<T: DirectoryTransport> Connection<T> {
    /// Wraps a transport. No session is opened yet.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            session: None,
            state: SessionState::Uninitialized,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true once a bind has succeeded and the session is open.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        matches!(self.state, SessionState::Bound)
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the underlying transport mutably.
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Opens a session to `host:port` and negotiates the protocol version.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the connection is `Uninitialized`, or a
    /// connection error if the transport cannot create the session or
    /// rejects the protocol version. On error the state is unchanged.
    pub fn connect(&mut self, host: &str, port: u16, version: ProtocolVersion) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(Error::state("connect", self.state));
        }

        let mut session = self
            .transport
            .initialize(host, port)
            .map_err(|code| translate::connection_error(&self.transport, "initialize", code))?;

        let code = self.transport.set_option(
            &mut session,
            LdapOption::PROTOCOL_VERSION,
            &OptionValue::Int(version.as_i32()),
        );
        if !code.is_success() {
            let released = self.transport.unbind(session);
            translate::trace_if_error(&self.transport, released, "unbind");
            return Err(translate::connection_error(
                &self.transport,
                "set_option",
                code,
            ));
        }

        self.session = Some(session);
        self.state = SessionState::Connected;
        tracing::info!(host, port, version = version.as_i32(), "LDAP session opened");
        Ok(())
    }

    /// Opens a session using a [`ConnectionConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub fn connect_with(&mut self, config: &ConnectionConfig) -> Result<()> {
        self.connect(&config.host, config.port, config.protocol_version)
    }

    /// Binds with the named mechanism (`Simple` or `GSSAPI`, any case).
    ///
    /// GSSAPI ignores `credentials`; the identity comes from the SASL layer.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the connection is `Connected` or
    /// `Bound`, [`Error::UnsupportedMechanism`] for an unknown name, or the
    /// error of the selected strategy.
    pub fn bind(&mut self, mechanism: &str, credentials: Credentials) -> Result<()> {
        self.check_state("bind", BINDABLE)?;

        match mechanism.parse::<AuthMechanism>()? {
            AuthMechanism::Simple => self.bind_with(&SimpleBind::new(credentials)),
            AuthMechanism::Gssapi => self.bind_with(&SaslBind::gssapi()),
        }
    }

    /// Binds with a caller-supplied strategy.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the connection is `Connected` or
    /// `Bound`, or the strategy's error. A failed bind does not change the
    /// state.
    pub fn bind_with(&mut self, authenticator: &dyn Authenticator<T>) -> Result<()> {
        let (transport, session) = self.session_parts("bind", BINDABLE)?;
        authenticator.authenticate(transport, session)?;

        self.state = SessionState::Bound;
        tracing::info!(mechanism = authenticator.mechanism(), "bind succeeded");
        Ok(())
    }

    /// Sets a session option.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the connection is `Bound`, or a
    /// connection error if the transport rejects the option.
    pub fn set_option(&mut self, option: LdapOption, value: impl Into<OptionValue>) -> Result<()> {
        let value = value.into();
        let (transport, session) = self.session_parts("set_option", BOUND)?;

        tracing::debug!(%option, ?value, "set option");
        let code = transport.set_option(session, option, &value);
        if code.is_success() {
            Ok(())
        } else {
            Err(translate::connection_error(&*transport, "set_option", code))
        }
    }

    /// Sets an integer-valued option.
    ///
    /// # Errors
    ///
    /// See [`set_option`](Self::set_option).
    pub fn set_option_int(&mut self, option: LdapOption, value: i32) -> Result<()> {
        self.set_option(option, OptionValue::Int(value))
    }

    /// Sets a string-valued option.
    ///
    /// # Errors
    ///
    /// See [`set_option`](Self::set_option).
    pub fn set_option_str(&mut self, option: LdapOption, value: &str) -> Result<()> {
        self.set_option(option, OptionValue::Str(value.to_string()))
    }

    /// Sets an option whose value is an opaque byte buffer.
    ///
    /// # Errors
    ///
    /// See [`set_option`](Self::set_option).
    pub fn set_option_raw(&mut self, option: LdapOption, value: &[u8]) -> Result<()> {
        self.set_option(option, OptionValue::Raw(value.to_vec()))
    }

    /// Searches the subtree under `base`.
    ///
    /// # Errors
    ///
    /// See [`search_scoped`](Self::search_scoped).
    pub fn search(&mut self, base: &str, filter: &str) -> Result<SearchResults> {
        self.search_scoped(base, filter, SearchScope::Subtree)
    }

    /// Searches under `base` with an explicit scope.
    ///
    /// All attributes are requested and no size limit is set. The full
    /// result set is decoded and the transport's result handle released
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the connection is `Bound`, or an
    /// operation error if the transport rejects the search.
    pub fn search_scoped(
        &mut self,
        base: &str,
        filter: &str,
        scope: SearchScope,
    ) -> Result<SearchResults> {
        let (transport, session) = self.session_parts("search", BOUND)?;

        tracing::debug!(base, filter, ?scope, "search");
        let request = SearchRequest::new(base, filter, scope);
        let result = match transport.search(session, &request) {
            Ok(result) => result,
            Err(code) => {
                return Err(translate::operation_error(&*transport, &*session, "search", code));
            }
        };

        let entries: Vec<DirectoryEntry> = EntryDecoder::new(transport, result).collect();
        tracing::debug!(count = entries.len(), "search complete");
        Ok(SearchResults::new(entries))
    }

    /// Searches the subtree under `base` for the object whose `objectSid`
    /// matches a string-form security identifier (`S-1-5-21-...`).
    ///
    /// # Errors
    ///
    /// Returns a state error unless the connection is `Bound`, a validation
    /// error if `sid` is malformed, or the search error.
    pub fn search_by_subject_id(&mut self, base: &str, sid: &str) -> Result<SearchResults> {
        self.check_state("search", BOUND)?;
        let filter = sid::subject_id_filter(sid)?;
        self.search(base, &filter)
    }

    /// Adds an entry. Every attribute is sent with the `Add` operation.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the connection is `Bound`, a validation
    /// error for an empty DN or attribute type, or an operation error if
    /// the server rejects the entry.
    pub fn add(&mut self, entry: &DirectoryEntry) -> Result<()> {
        let (transport, session) = self.session_parts("add", BOUND)?;
        validate_dn(entry.dn())?;
        validate_attribute_types(entry.attributes().keys().map(String::as_str))?;

        tracing::debug!(dn = entry.dn(), attributes = entry.attributes().len(), "add");
        let batch = ModBatch::for_add(entry);
        let code = transport.add(session, entry.dn(), &batch);
        drop(batch);
        check(transport, session, "add", code)
    }

    /// Applies attribute changes to an entry, each with its own operation.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the connection is `Bound`, a validation
    /// error for an empty DN or attribute type, or an operation error if
    /// the server rejects a change.
    pub fn modify(&mut self, entry: &ModifyEntry) -> Result<()> {
        let (transport, session) = self.session_parts("modify", BOUND)?;
        validate_dn(&entry.dn)?;
        validate_attribute_types(entry.attributes.iter().map(|a| a.attr_type.as_str()))?;

        tracing::debug!(dn = %entry.dn, changes = entry.attributes.len(), "modify");
        let batch = ModBatch::for_modify(entry);
        let code = transport.modify(session, &entry.dn, &batch);
        drop(batch);
        check(transport, session, "modify", code)
    }

    /// Deletes an entry.
    ///
    /// # Errors
    ///
    /// Returns a state error unless the connection is `Bound`, a validation
    /// error for an empty DN, or an operation error if the server refuses.
    pub fn delete(&mut self, dn: &str) -> Result<()> {
        let (transport, session) = self.session_parts("delete", BOUND)?;
        validate_dn(dn)?;

        tracing::debug!(dn, "delete");
        let code = transport.delete(session, dn);
        check(transport, session, "delete", code)
    }

    /// Unbinds and releases the session. Safe to call any number of times;
    /// the state is `Closed` afterwards. Transport failures are logged.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            let code = self.transport.unbind(session);
            translate::trace_if_error(&self.transport, code, "unbind");
            tracing::info!("LDAP session closed");
        }
        self.state = SessionState::Closed;
    }

    fn check_state(&self, operation: &'static str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            tracing::warn!(operation, state = %self.state, "operation rejected");
            Err(Error::state(operation, self.state))
        }
    }

    fn session_parts(
        &mut self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<(&mut T, &mut T::Session)> {
        self.check_state(operation, allowed)?;
        match self.session.as_mut() {
            Some(session) => Ok((&mut self.transport, session)),
            None => Err(Error::state(operation, self.state)),
        }
    }
}

impl<T: DirectoryTransport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: DirectoryTransport + fmt::Debug> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn validate_dn(dn: &str) -> std::result::Result<(), ValidationError> {
    if dn.trim().is_empty() {
        Err(ValidationError::EmptyDn)
    } else {
        Ok(())
    }
}

fn validate_attribute_types<'a>(
    mut names: impl Iterator<Item = &'a str>,
) -> std::result::Result<(), ValidationError> {
    if names.any(|name| name.trim().is_empty()) {
        Err(ValidationError::EmptyAttributeType)
    } else {
        Ok(())
    }
}

fn check<T: DirectoryTransport>(
    transport: &T,
    session: &T::Session,
    operation: &'static str,
    code: ResultCode,
) -> Result<()> {
    if code.is_success() {
        Ok(())
    } else {
        Err(translate::operation_error(transport, session, operation, code))
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
    use crate::types::ModifyAttribute;

    const ADMIN: &str = "cn=admin,dc=example,dc=com";

    fn bound() -> Connection<MemoryTransport> {
        let transport = MemoryTransport::new().with_user(ADMIN, "secret").with_entry(
            DirectoryEntry::builder("dc=example,dc=com")
                .attribute("objectClass", ["domain"])
                .build(),
        );
        let mut conn = Connection::new(transport);
        conn.connect("localhost", 389, ProtocolVersion::V3).unwrap();
        conn.bind("simple", Credentials::new(ADMIN, "secret")).unwrap();
        conn
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Uninitialized.to_string(), "Uninitialized");
        assert_eq!(SessionState::Bound.to_string(), "Bound");
        assert_eq!(SessionState::default(), SessionState::Uninitialized);
    }

    #[test]
    fn test_connect_sets_protocol_version() {
        let mut conn = Connection::new(MemoryTransport::new());
        conn.connect("localhost", 389, ProtocolVersion::V3).unwrap();

        assert_eq!(conn.state(), SessionState::Connected);
        assert!(conn.transport().calls().iter().any(|c| matches!(
            c,
            crate::transport::memory::Call::SetOption {
                option: LdapOption::PROTOCOL_VERSION,
                value: OptionValue::Int(3),
            }
        )));
    }

    #[test]
    fn test_connect_twice_is_state_error() {
        let mut conn = bound();
        let err = conn.connect("localhost", 389, ProtocolVersion::V3).unwrap_err();
        assert!(matches!(
            err,
            Error::State {
                operation: "connect",
                state: SessionState::Bound
            }
        ));
    }

    #[test]
    fn test_connect_failure_keeps_uninitialized() {
        let transport = MemoryTransport::new().failing(Primitive::Initialize, ResultCode::SERVER_DOWN);
        let mut conn = Connection::new(transport);

        let err = conn.connect("localhost", 389, ProtocolVersion::V3).unwrap_err();
        assert_eq!(err.result_code(), Some(ResultCode::SERVER_DOWN));
        assert_eq!(conn.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_rebind_from_bound() {
        let mut conn = bound();
        conn.bind("SIMPLE", Credentials::anonymous()).unwrap();
        assert!(conn.is_bound());
    }

    #[test]
    fn test_failed_bind_keeps_state() {
        let mut conn = Connection::new(MemoryTransport::new().with_user(ADMIN, "secret"));
        conn.connect("localhost", 389, ProtocolVersion::V3).unwrap();

        let err = conn.bind("Simple", Credentials::new(ADMIN, "wrong")).unwrap_err();
        assert!(err.is_authentication_error());
        assert_eq!(conn.state(), SessionState::Connected);
    }

    #[test]
    fn test_bind_before_connect() {
        let mut conn = Connection::new(MemoryTransport::new());
        let err = conn.bind("Simple", Credentials::anonymous()).unwrap_err();
        assert!(err.is_state_error());
        assert!(conn.transport().calls().is_empty());
    }

    #[test]
    fn test_set_option_requires_bound() {
        let mut conn = Connection::new(MemoryTransport::new());
        conn.connect("localhost", 389, ProtocolVersion::V3).unwrap();
        assert!(conn
            .set_option_int(LdapOption::SIZELIMIT, 10)
            .unwrap_err()
            .is_state_error());
    }

    #[test]
    fn test_set_option_overloads() {
        let mut conn = bound();
        conn.set_option_int(LdapOption::SIZELIMIT, 10).unwrap();
        conn.set_option_str(LdapOption::X_SASL_REALM, "EXAMPLE.COM").unwrap();
        conn.set_option_raw(LdapOption::new(0x7001), &[1, 2, 3]).unwrap();
        conn.set_option(LdapOption::TIMELIMIT, 30).unwrap();

        let err = conn.set_option(LdapOption::PROTOCOL_VERSION, 7).unwrap_err();
        assert!(matches!(
            err,
            Error::Connection {
                operation: "set_option",
                code: ResultCode::PARAM_ERROR,
                ..
            }
        ));
        assert!(conn.is_bound());
    }

    #[test]
    fn test_search_scoped_base() {
        let mut conn = bound();
        let results = conn
            .search_scoped("dc=example,dc=com", "(objectClass=*)", SearchScope::Base)
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_search_error_carries_diagnostic() {
        let mut conn = bound();
        let err = conn.search("dc=missing", "(objectClass=*)").unwrap_err();
        assert_eq!(err.result_code(), Some(ResultCode::NO_SUCH_OBJECT));
        assert!(err.diagnostic().unwrap().contains("dc=missing"));
        assert!(conn.is_bound());
    }

    #[test]
    fn test_search_by_subject_id_builds_binary_filter() {
        let mut conn = bound();
        let results = conn.search_by_subject_id("dc=example,dc=com", "S-1-5-18").unwrap();
        assert_eq!(results.len(), 0);

        let last_search = conn
            .transport()
            .calls()
            .iter()
            .rev()
            .find_map(|c| match c {
                crate::transport::memory::Call::Search { filter, .. } => Some(filter.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            last_search,
            "(objectSid=\\01\\01\\00\\00\\00\\00\\00\\05\\12\\00\\00\\00)"
        );
    }

    #[test]
    fn test_search_by_invalid_subject_id() {
        let mut conn = bound();
        let err = conn.search_by_subject_id("dc=example,dc=com", "not-a-sid").unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidSubjectId(_))
        ));
    }

    #[test]
    fn test_modify_rejects_empty_attribute_type() {
        let mut conn = bound();
        let entry = ModifyEntry::new("dc=example,dc=com").with(ModifyAttribute::replace(" ", ["x"]));
        let err = conn.modify(&entry).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::EmptyAttributeType)
        ));
        assert_eq!(conn.transport().call_count(Primitive::Modify), 0);
    }

    #[test]
    fn test_close_from_uninitialized() {
        let mut conn = Connection::new(MemoryTransport::new());
        conn.close();
        assert_eq!(conn.state(), SessionState::Closed);
        assert_eq!(conn.transport().call_count(Primitive::Unbind), 0);
    }

    #[test]
    fn test_close_logs_unbind_failure() {
        let mut conn = bound();
        conn.transport_mut()
            .fail(Primitive::Unbind, ResultCode::SERVER_DOWN);
        conn.close();
        assert_eq!(conn.state(), SessionState::Closed);
        assert_eq!(conn.transport().stats().sessions_released, 1);
    }

    #[test]
    fn test_connect_after_close_is_rejected() {
        let mut conn = bound();
        conn.close();
        let err = conn.connect("localhost", 389, ProtocolVersion::V3).unwrap_err();
        assert!(matches!(
            err,
            Error::State {
                state: SessionState::Closed,
                ..
            }
        ));
    }
}
