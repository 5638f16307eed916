//! Core LDAP types.

mod entry;
mod option;
mod result_code;

pub use entry::{DirectoryEntry, EntryBuilder, ModOperation, ModifyAttribute, ModifyEntry};
pub use option::{LdapOption, OptionValue, ProtocolVersion, SearchScope, SizeLimit};
pub use result_code::ResultCode;
