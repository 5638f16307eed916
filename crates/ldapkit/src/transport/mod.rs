//! Directory transport capability.
//!
//! The transport performs the actual LDAP/BER exchange with the server. This
//! crate only drives it: it owns the session handle a transport hands out,
//! serializes calls on it, and releases every handle exactly once. Handles
//! released through `free_*`/`unbind` are taken by value, so a released
//! handle cannot be used again.
//!
//! [`memory::MemoryTransport`] is an in-process implementation used by tests
//! and demos.

mod filter;
pub mod memory;

pub use filter::Filter;

use crate::auth::{InteractionFlags, SaslDefaults, SaslInteraction};
use crate::codec::ModBatch;
use crate::types::{LdapOption, OptionValue, ResultCode, SearchScope, SizeLimit};

/// A synchronous search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRequest<'a> {
    /// Base DN.
    pub base: &'a str,
    /// Search scope.
    pub scope: SearchScope,
    /// RFC 4515 filter string.
    pub filter: &'a str,
    /// Attributes to return; `None` returns all user attributes.
    pub attributes: Option<&'a [&'a str]>,
    /// Return attribute names only.
    pub attrs_only: bool,
    /// Maximum number of entries.
    pub size_limit: SizeLimit,
}

impl<'a> SearchRequest<'a> {
    /// Creates a request returning every attribute with no size limit.
    #[must_use]
    pub const fn new(base: &'a str, filter: &'a str, scope: SearchScope) -> Self {
        Self {
            base,
            scope,
            filter,
            attributes: None,
            attrs_only: false,
            size_limit: SizeLimit::NO_LIMIT,
        }
    }
}

/// An interactive SASL bind request.
pub struct SaslBindRequest<'a> {
    /// Mechanism name, e.g. `GSSAPI`.
    pub mechanism: &'a str,
    /// Interaction flags.
    pub flags: InteractionFlags,
    /// Negotiated defaults queried from the session.
    pub defaults: &'a SaslDefaults,
    /// Callback answering the mechanism's prompts.
    pub interaction: &'a dyn SaslInteraction,
}

impl std::fmt::Debug for SaslBindRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslBindRequest")
            .field("mechanism", &self.mechanism)
            .field("flags", &self.flags)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

/// Capability surface of an LDAP client transport.
///
/// Entry and attribute navigation follows the classic client API shape: a
/// search produces a result handle, entries are walked with
/// `first_entry`/`next_entry`, and attributes of an entry are walked with
/// `first_attribute`/`next_attribute` through a cursor that is reused for
/// the whole walk.
pub trait DirectoryTransport {
    /// Session handle returned by `initialize`.
    type Session;
    /// Handle to the messages of a completed search.
    type SearchResult;
    /// Position of an entry inside a search result.
    type EntryId: Copy;
    /// Attribute walk state.
    type Cursor;

    /// Opens a session to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns the transport code if the session cannot be created.
    fn initialize(&mut self, host: &str, port: u16) -> Result<Self::Session, ResultCode>;

    /// Sets a session option.
    fn set_option(
        &mut self,
        session: &mut Self::Session,
        option: LdapOption,
        value: &OptionValue,
    ) -> ResultCode;

    /// Reads a string-valued session option; `Ok(None)` when unset.
    ///
    /// # Errors
    ///
    /// Returns the transport code if the option cannot be read.
    fn get_option(
        &mut self,
        session: &Self::Session,
        option: LdapOption,
    ) -> Result<Option<String>, ResultCode>;

    /// Performs a simple bind.
    fn simple_bind(
        &mut self,
        session: &mut Self::Session,
        dn: &str,
        password: &str,
    ) -> ResultCode;

    /// Performs an interactive SASL bind.
    fn sasl_interactive_bind(
        &mut self,
        session: &mut Self::Session,
        request: &SaslBindRequest<'_>,
    ) -> ResultCode;

    /// Runs a synchronous search.
    ///
    /// # Errors
    ///
    /// Returns the transport code if the search fails.
    fn search(
        &mut self,
        session: &mut Self::Session,
        request: &SearchRequest<'_>,
    ) -> Result<Self::SearchResult, ResultCode>;

    /// Returns the first entry of a result.
    fn first_entry(&self, result: &Self::SearchResult) -> Option<Self::EntryId>;

    /// Returns the entry following `entry`.
    fn next_entry(
        &self,
        result: &Self::SearchResult,
        entry: Self::EntryId,
    ) -> Option<Self::EntryId>;

    /// Returns a copy of the entry's DN.
    fn get_dn(&self, result: &Self::SearchResult, entry: Self::EntryId) -> Option<String>;

    /// Allocates the attribute cursor shared by a whole result walk.
    fn open_cursor(&mut self) -> Self::Cursor;

    /// Starts the attribute walk of `entry`, returning the first name.
    fn first_attribute(
        &self,
        result: &Self::SearchResult,
        entry: Self::EntryId,
        cursor: &mut Self::Cursor,
    ) -> Option<String>;

    /// Returns the next attribute name of the current walk.
    fn next_attribute(
        &self,
        result: &Self::SearchResult,
        entry: Self::EntryId,
        cursor: &mut Self::Cursor,
    ) -> Option<String>;

    /// Returns a copy of an attribute's values.
    fn get_values(
        &self,
        result: &Self::SearchResult,
        entry: Self::EntryId,
        name: &str,
    ) -> Option<Vec<String>>;

    /// Releases the attribute cursor.
    fn free_cursor(&mut self, cursor: Self::Cursor);

    /// Releases a search result.
    fn free_result(&mut self, result: Self::SearchResult);

    /// Adds an entry.
    fn add(&mut self, session: &mut Self::Session, dn: &str, mods: &ModBatch) -> ResultCode;

    /// Modifies an entry.
    fn modify(&mut self, session: &mut Self::Session, dn: &str, mods: &ModBatch) -> ResultCode;

    /// Deletes an entry.
    fn delete(&mut self, session: &mut Self::Session, dn: &str) -> ResultCode;

    /// Unbinds and releases the session.
    fn unbind(&mut self, session: Self::Session) -> ResultCode;

    /// Returns the human-readable text of a result code.
    fn error_to_string(&self, code: ResultCode) -> String {
        code.description().to_string()
    }

    /// Returns the server's diagnostic message for the last operation.
    fn extended_error(&self, session: &Self::Session) -> Option<String>;
}

/// Lets a connection borrow a transport it does not own.
impl<T: DirectoryTransport + ?Sized> DirectoryTransport for &mut T {
    type Session = T::Session;
    type SearchResult = T::SearchResult;
    type EntryId = T::EntryId;
    type Cursor = T::Cursor;

    fn initialize(&mut self, host: &str, port: u16) -> Result<Self::Session, ResultCode> {
        (**self).initialize(host, port)
    }

    fn set_option(
        &mut self,
        session: &mut Self::Session,
        option: LdapOption,
        value: &OptionValue,
    ) -> ResultCode {
        (**self).set_option(session, option, value)
    }

    fn get_option(
        &mut self,
        session: &Self::Session,
        option: LdapOption,
    ) -> Result<Option<String>, ResultCode> {
        (**self).get_option(session, option)
    }

    fn simple_bind(
        &mut self,
        session: &mut Self::Session,
        dn: &str,
        password: &str,
    ) -> ResultCode {
        (**self).simple_bind(session, dn, password)
    }

    fn sasl_interactive_bind(
        &mut self,
        session: &mut Self::Session,
        request: &SaslBindRequest<'_>,
    ) -> ResultCode {
        (**self).sasl_interactive_bind(session, request)
    }

    fn search(
        &mut self,
        session: &mut Self::Session,
        request: &SearchRequest<'_>,
    ) -> Result<Self::SearchResult, ResultCode> {
        (**self).search(session, request)
    }

    fn first_entry(&self, result: &Self::SearchResult) -> Option<Self::EntryId> {
        (**self).first_entry(result)
    }

    fn next_entry(
        &self,
        result: &Self::SearchResult,
        entry: Self::EntryId,
    ) -> Option<Self::EntryId> {
        (**self).next_entry(result, entry)
    }

    fn get_dn(&self, result: &Self::SearchResult, entry: Self::EntryId) -> Option<String> {
        (**self).get_dn(result, entry)
    }

    fn open_cursor(&mut self) -> Self::Cursor {
        (**self).open_cursor()
    }

    fn first_attribute(
        &self,
        result: &Self::SearchResult,
        entry: Self::EntryId,
        cursor: &mut Self::Cursor,
    ) -> Option<String> {
        (**self).first_attribute(result, entry, cursor)
    }

    fn next_attribute(
        &self,
        result: &Self::SearchResult,
        entry: Self::EntryId,
        cursor: &mut Self::Cursor,
    ) -> Option<String> {
        (**self).next_attribute(result, entry, cursor)
    }

    fn get_values(
        &self,
        result: &Self::SearchResult,
        entry: Self::EntryId,
        name: &str,
    ) -> Option<Vec<String>> {
        (**self).get_values(result, entry, name)
    }

    fn free_cursor(&mut self, cursor: Self::Cursor) {
        (**self).free_cursor(cursor);
    }

    fn free_result(&mut self, result: Self::SearchResult) {
        (**self).free_result(result);
    }

    fn add(&mut self, session: &mut Self::Session, dn: &str, mods: &ModBatch) -> ResultCode {
        (**self).add(session, dn, mods)
    }

    fn modify(&mut self, session: &mut Self::Session, dn: &str, mods: &ModBatch) -> ResultCode {
        (**self).modify(session, dn, mods)
    }

    fn delete(&mut self, session: &mut Self::Session, dn: &str) -> ResultCode {
        (**self).delete(session, dn)
    }

    fn unbind(&mut self, session: Self::Session) -> ResultCode {
        (**self).unbind(session)
    }

    fn error_to_string(&self, code: ResultCode) -> String {
        (**self).error_to_string(code)
    }

    fn extended_error(&self, session: &Self::Session) -> Option<String> {
        (**self).extended_error(session)
    }
}
