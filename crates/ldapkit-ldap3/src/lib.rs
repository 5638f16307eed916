//! # ldapkit-ldap3
//!
//! A [`DirectoryTransport`](ldapkit::DirectoryTransport) that talks to a real
//! server through the synchronous [`ldap3::LdapConn`] client.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ldapkit::{Connection, Credentials, ProtocolVersion};
//! use ldapkit_ldap3::Ldap3Transport;
//!
//! let mut conn = Connection::new(Ldap3Transport::default());
//! conn.connect("ldap.example.com", 389, ProtocolVersion::V3)?;
//! conn.bind("Simple", Credentials::new("cn=admin,dc=example,dc=com", "secret"))?;
//! for entry in conn.search("dc=example,dc=com", "(objectClass=person)")? {
//!     println!("{}", entry.dn());
//! }
//! # Ok::<(), ldapkit::Error>(())
//! ```
//!
//! ## Notes
//!
//! - `ldap3` speaks LDAPv3 only; asking for version 2 is rejected.
//! - Size and time limits set through `set_option` apply to later searches.
//! - `NETWORK_TIMEOUT` applies to every operation that follows it.
//! - Other options, and raw option values, are refused with `NOT_SUPPORTED`.
//! - GSSAPI binds need the `gssapi` feature and a Kerberos ticket cache.
//! - Binary attribute values are decoded as lossy UTF-8.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod convert;
mod transport;

pub use convert::{error_code, result_code};
pub use transport::{AttributeCursor, Ldap3Result, Ldap3Session, Ldap3Settings, Ldap3Transport};
