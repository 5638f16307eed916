//! Conversions between ldapkit and ldap3 types.

use std::collections::HashSet;

use ldap3::{LdapError, LdapResult, Mod, Scope};
use ldapkit::{ModBatch, ModOperation, ResultCode, SearchScope, WireMod};

/// Result code of a completed ldap3 operation.
#[must_use]
pub fn result_code(result: &LdapResult) -> ResultCode {
    i32::try_from(result.rc).map_or(ResultCode::OTHER, ResultCode::new)
}

/// Result code for an ldap3 client-side failure.
#[must_use]
pub fn error_code(error: &LdapError) -> ResultCode {
    match error {
        LdapError::LdapResult { result } => result_code(result),
        LdapError::Timeout { .. } => ResultCode::TIMEOUT,
        LdapError::Io { .. } | LdapError::EndOfStream => ResultCode::SERVER_DOWN,
        LdapError::FilterParsing => ResultCode::FILTER_ERROR,
        LdapError::UrlParsing { .. } | LdapError::UnknownScheme(_) => ResultCode::PARAM_ERROR,
        _ => ResultCode::LOCAL_ERROR,
    }
}

/// Maps a search scope. `Children` has no ldap3 counterpart and is run as a
/// subtree search with the base entry dropped afterwards.
pub(crate) const fn scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree | SearchScope::Children => Scope::Subtree,
    }
}

fn value_set(record: &WireMod) -> HashSet<&str> {
    record.values().collect()
}

/// Attribute list for an add request.
pub(crate) fn add_attributes(batch: &ModBatch) -> Vec<(&str, HashSet<&str>)> {
    batch
        .iter()
        .map(|record| (record.attr_type(), value_set(record)))
        .collect()
}

/// Modification list for a modify request.
pub(crate) fn modifications(batch: &ModBatch) -> Vec<Mod<&str>> {
    batch
        .iter()
        .map(|record| {
            let name = record.attr_type();
            let values = value_set(record);
            match record.operation() {
                ModOperation::Add => Mod::Add(name, values),
                ModOperation::Delete => Mod::Delete(name, values),
                ModOperation::Replace => Mod::Replace(name, values),
            }
        })
        .collect()
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
    use ldapkit::{DirectoryEntry, ModifyAttribute, ModifyEntry};

    fn ldap_result(rc: u32, text: &str) -> LdapResult {
        LdapResult {
            rc,
            matched: String::new(),
            text: text.to_string(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        }
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(result_code(&ldap_result(0, "")), ResultCode::SUCCESS);
        assert_eq!(
            result_code(&ldap_result(49, "bad password")),
            ResultCode::INVALID_CREDENTIALS
        );
        assert_eq!(result_code(&ldap_result(u32::MAX, "")), ResultCode::OTHER);
    }

    #[test]
    fn test_error_codes() {
        let err = LdapError::LdapResult {
            result: ldap_result(32, "no such object"),
        };
        assert_eq!(error_code(&err), ResultCode::NO_SUCH_OBJECT);
        assert_eq!(error_code(&LdapError::FilterParsing), ResultCode::FILTER_ERROR);
        assert_eq!(error_code(&LdapError::EndOfStream), ResultCode::SERVER_DOWN);
        assert_eq!(
            error_code(&LdapError::UnknownScheme("ftp".into())),
            ResultCode::PARAM_ERROR
        );
    }

    #[test]
    fn test_scope_mapping() {
        assert!(matches!(scope(SearchScope::Base), Scope::Base));
        assert!(matches!(scope(SearchScope::OneLevel), Scope::OneLevel));
        assert!(matches!(scope(SearchScope::Children), Scope::Subtree));
    }

    #[test]
    fn test_add_attributes_drop_sentinel() {
        let entry = DirectoryEntry::builder("cn=x,dc=example,dc=com")
            .attribute("cn", ["x"])
            .attribute("mail", ["a@example.com", "b@example.com"])
            .build();
        let batch = ModBatch::for_add(&entry);
        let attrs = add_attributes(&batch);

        assert_eq!(attrs.len(), 2);
        let (name, values) = &attrs[1];
        assert_eq!(*name, "mail");
        assert_eq!(values.len(), 2);
        assert!(values.contains("b@example.com"));
    }

    #[test]
    fn test_modifications_keep_operation() {
        let change = ModifyEntry::new("cn=x")
            .with(ModifyAttribute::add("mail", ["a@example.com"]))
            .with(ModifyAttribute::delete("sn", Vec::<String>::new()))
            .with(ModifyAttribute::new("cn", ["y"]));
        let batch = ModBatch::for_modify(&change);
        let mods = modifications(&batch);

        assert!(matches!(&mods[0], Mod::Add("mail", v) if v.len() == 1));
        assert!(matches!(&mods[1], Mod::Delete("sn", v) if v.is_empty()));
        assert!(matches!(&mods[2], Mod::Replace("cn", v) if v.contains("y")));
    }
}
