//! # ldapkit
//!
//! A synchronous LDAP client session library. It manages the lifecycle of a
//! single directory session, authenticates it, and marshals entries between
//! typed Rust values and the record layout a classic LDAP client API works
//! with. The LDAP/BER exchange itself is delegated to a pluggable
//! [`DirectoryTransport`].
//!
//! ## Features
//!
//! - **Session state machine**: connect, bind, operate, close, with every
//!   operation checked against the current state
//! - **Pluggable binds**: Simple (RFC 4513) and SASL GSSAPI (RFC 4752), or
//!   any custom [`Authenticator`]
//! - **Entry marshalling**: sentinel-terminated modification batches for
//!   writes, a one-pass [`EntryDecoder`] for search results
//! - **Exactly-once release**: result handles, attribute cursors and
//!   sessions are released once, on success and on error
//! - **In-memory transport**: [`transport::memory::MemoryTransport`] for
//!   tests and demos
//!
//! ## Quick Start
//!
//! ```
//! use ldapkit::transport::memory::MemoryTransport;
//! use ldapkit::{Connection, Credentials, DirectoryEntry, ModifyAttribute, ModifyEntry};
//! use ldapkit::ProtocolVersion;
//!
//! let directory = MemoryTransport::new()
//!     .with_user("cn=admin,dc=example,dc=com", "secret")
//!     .with_entry(DirectoryEntry::builder("dc=example,dc=com")
//!         .attribute("objectClass", ["domain"])
//!         .build());
//!
//! let mut conn = Connection::new(directory);
//! conn.connect("localhost", 389, ProtocolVersion::V3)?;
//! conn.bind("Simple", Credentials::new("cn=admin,dc=example,dc=com", "secret"))?;
//!
//! conn.add(&DirectoryEntry::builder("cn=alice,dc=example,dc=com")
//!     .attribute("objectClass", ["person"])
//!     .attribute("cn", ["alice"])
//!     .build())?;
//! conn.modify(&ModifyEntry::new("cn=alice,dc=example,dc=com")
//!     .with(ModifyAttribute::add("mail", ["alice@example.com"])))?;
//!
//! let alice = conn.search("dc=example,dc=com", "(cn=alice)")?.next();
//! assert_eq!(alice.unwrap().first("mail"), Some("alice@example.com"));
//!
//! conn.delete("cn=alice,dc=example,dc=com")?;
//! conn.close();
//! # Ok::<(), ldapkit::Error>(())
//! ```
//!
//! ## Session States
//!
//! ```text
//! ┌─────────────────────┐
//! │    Uninitialized    │ ─── connect() ───→ Connected
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │      Connected      │ ─── bind() ───→ Bound
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │        Bound        │ ─── close() ───→ Closed
//! └─────────────────────┘
//! ```
//!
//! `close()` is accepted from every state and `Closed` is terminal.
//!
//! ## Modules
//!
//! - [`auth`]: Bind strategies and SASL defaults
//! - [`codec`]: Modification records for add and modify
//! - [`connection`]: The session state machine
//! - [`decoder`]: Search result decoding
//! - [`sid`]: Security identifier filters
//! - [`translate`]: Result code translation
//! - [`transport`]: The transport capability and the in-memory transport
//! - [`types`]: Entries, options and result codes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod codec;
pub mod connection;
pub mod decoder;
mod error;
pub mod sid;
pub mod translate;
pub mod transport;
pub mod types;

pub use auth::{
    AuthMechanism, Authenticator, Credentials, InteractionFlags, NoInteraction, SaslBind,
    SaslDefaults, SaslInteraction, SimpleBind,
};
pub use codec::{ModBatch, WireMod};
pub use connection::{
    Connection, ConnectionConfig, ConnectionConfigBuilder, DEFAULT_PORT, SessionState,
};
pub use decoder::{EntryDecoder, SearchResults};
pub use error::{Error, Result, ValidationError};
pub use transport::{DirectoryTransport, SaslBindRequest, SearchRequest};
pub use types::{
    DirectoryEntry, EntryBuilder, LdapOption, ModOperation, ModifyAttribute, ModifyEntry,
    OptionValue, ProtocolVersion, ResultCode, SearchScope, SizeLimit,
};
