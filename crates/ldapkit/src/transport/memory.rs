//! In-process directory transport.
//!
//! [`MemoryTransport`] keeps a small directory tree in memory and answers the
//! full [`DirectoryTransport`] surface against it. It records every call,
//! counts every handle it hands out and takes back, and can be told to fail a
//! given primitive with a given code. Tests use it to check both behavior and
//! resource accounting without a server.

use std::collections::{BTreeMap, HashMap};

use super::{DirectoryTransport, Filter, SaslBindRequest, SearchRequest};
use crate::auth::{AuthMechanism, InteractionFlags, SaslDefaults};
use crate::codec::{ModBatch, WireMod};
use crate::types::{
    DirectoryEntry, LdapOption, ModOperation, OptionValue, ResultCode, SearchScope,
};

/// A transport primitive that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `initialize`
    Initialize,
    /// `set_option` for one option.
    SetOption(LdapOption),
    /// `get_option` for one option.
    GetOption(LdapOption),
    /// `simple_bind`
    SimpleBind,
    /// `sasl_interactive_bind`
    SaslBind,
    /// `search`
    Search,
    /// `add`
    Add,
    /// `modify`
    Modify,
    /// `delete`
    Delete,
    /// `unbind`
    Unbind,
}

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Session opened.
    Initialize {
        /// Host.
        host: String,
        /// Port.
        port: u16,
    },
    /// Option set.
    SetOption {
        /// Option.
        option: LdapOption,
        /// Value.
        value: OptionValue,
    },
    /// Option read.
    GetOption(LdapOption),
    /// Simple bind.
    SimpleBind {
        /// Bind DN.
        dn: String,
    },
    /// SASL bind.
    SaslBind {
        /// Mechanism.
        mechanism: String,
        /// Flags.
        flags: InteractionFlags,
        /// Defaults passed along.
        defaults: SaslDefaults,
    },
    /// Search.
    Search {
        /// Base DN.
        base: String,
        /// Scope.
        scope: SearchScope,
        /// Filter.
        filter: String,
    },
    /// Add.
    Add {
        /// DN.
        dn: String,
        /// Records, sentinel excluded.
        mods: Vec<WireMod>,
    },
    /// Modify.
    Modify {
        /// DN.
        dn: String,
        /// Records, sentinel excluded.
        mods: Vec<WireMod>,
    },
    /// Delete.
    Delete {
        /// DN.
        dn: String,
    },
    /// Unbind.
    Unbind,
}

impl Call {
    /// Returns the primitive this call exercised.
    #[must_use]
    pub const fn primitive(&self) -> Primitive {
        match self {
            Self::Initialize { .. } => Primitive::Initialize,
            Self::SetOption { option, .. } => Primitive::SetOption(*option),
            Self::GetOption(option) => Primitive::GetOption(*option),
            Self::SimpleBind { .. } => Primitive::SimpleBind,
            Self::SaslBind { .. } => Primitive::SaslBind,
            Self::Search { .. } => Primitive::Search,
            Self::Add { .. } => Primitive::Add,
            Self::Modify { .. } => Primitive::Modify,
            Self::Delete { .. } => Primitive::Delete,
            Self::Unbind => Primitive::Unbind,
        }
    }
}

/// Handle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    /// Sessions handed out by `initialize`.
    pub sessions_opened: usize,
    /// Sessions taken back by `unbind`.
    pub sessions_released: usize,
    /// Search results handed out.
    pub results_opened: usize,
    /// Search results freed.
    pub results_released: usize,
    /// Attribute cursors handed out.
    pub cursors_opened: usize,
    /// Attribute cursors freed.
    pub cursors_released: usize,
}

impl ResourceStats {
    /// Returns true if every handle handed out was released exactly once.
    #[must_use]
    pub const fn balanced(&self) -> bool {
        self.sessions_opened == self.sessions_released
            && self.results_opened == self.results_released
            && self.cursors_opened == self.cursors_released
    }
}

/// Session handle of the in-memory transport.
#[derive(Debug)]
pub struct MemorySession {
    id: u64,
    host: String,
    port: u16,
    options: HashMap<LdapOption, OptionValue>,
    bound_as: Option<String>,
    diagnostic: Option<String>,
}

impl MemorySession {
    /// Returns the session id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the host the session was opened for.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port the session was opened for.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns an option value previously set on the session.
    #[must_use]
    pub fn option(&self, option: LdapOption) -> Option<&OptionValue> {
        self.options.get(&option)
    }

    /// Returns the identity of the last successful bind.
    #[must_use]
    pub fn bound_as(&self) -> Option<&str> {
        self.bound_as.as_deref()
    }

    /// Overrides the diagnostic message of the last operation.
    pub fn set_diagnostic(&mut self, message: &str) {
        self.diagnostic = Some(message.to_string());
    }
}

/// Search result handle.
#[derive(Debug)]
pub struct MemoryResult {
    entries: Vec<DirectoryEntry>,
    attrs_only: bool,
}

/// Attribute cursor handle.
#[derive(Debug, Default)]
pub struct MemoryCursor {
    names: Vec<String>,
    position: usize,
}

/// In-process [`DirectoryTransport`].
#[derive(Debug, Default)]
pub struct MemoryTransport {
    entries: BTreeMap<String, DirectoryEntry>,
    users: HashMap<String, String>,
    kerberos_principal: Option<String>,
    sasl_options: HashMap<LdapOption, String>,
    failures: HashMap<Primitive, ResultCode>,
    calls: Vec<Call>,
    stats: ResourceStats,
    next_session: u64,
}

impl MemoryTransport {
    /// Creates an empty directory. Anonymous binds are accepted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry to the directory.
    #[must_use]
    pub fn with_entry(mut self, entry: DirectoryEntry) -> Self {
        self.entries.insert(normalize_dn(entry.dn()), entry);
        self
    }

    /// Registers a simple bind account.
    #[must_use]
    pub fn with_user(mut self, dn: &str, password: &str) -> Self {
        self.users.insert(normalize_dn(dn), password.to_string());
        self
    }

    /// Sets a value answered by `get_option` for a SASL option.
    #[must_use]
    pub fn with_sasl_option(mut self, option: LdapOption, value: &str) -> Self {
        self.sasl_options.insert(option, value.to_string());
        self
    }

    /// Simulates a Kerberos ticket for `principal`, enabling GSSAPI binds.
    #[must_use]
    pub fn with_kerberos_principal(mut self, principal: &str) -> Self {
        self.kerberos_principal = Some(principal.to_string());
        self
    }

    /// Makes `primitive` fail with `code` until cleared.
    pub fn fail(&mut self, primitive: Primitive, code: ResultCode) {
        self.failures.insert(primitive, code);
    }

    /// Builder form of [`fail`](Self::fail).
    #[must_use]
    pub fn failing(mut self, primitive: Primitive, code: ResultCode) -> Self {
        self.fail(primitive, code);
        self
    }

    /// Removes every injected failure.
    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    /// Returns the call log.
    #[must_use]
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Counts recorded calls of `primitive`.
    #[must_use]
    pub fn call_count(&self, primitive: Primitive) -> usize {
        self.calls
            .iter()
            .filter(|call| call.primitive() == primitive)
            .count()
    }

    /// Returns the handle counters.
    #[must_use]
    pub const fn stats(&self) -> ResourceStats {
        self.stats
    }

    /// Looks up an entry by DN.
    #[must_use]
    pub fn entry(&self, dn: &str) -> Option<&DirectoryEntry> {
        self.entries.get(&normalize_dn(dn))
    }

    /// Returns the number of entries in the directory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn injected(&self, primitive: Primitive) -> Option<ResultCode> {
        self.failures.get(&primitive).copied()
    }

    fn apply_modify(
        attributes: &mut HashMap<String, Vec<String>>,
        record: &WireMod,
    ) -> Result<(), (ResultCode, String)> {
        let name = record.attr_type();
        let key = attributes
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned();

        match record.operation() {
            ModOperation::Add => {
                let values = attributes.entry(key.unwrap_or_else(|| name.to_string())).or_default();
                for value in record.values() {
                    if values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                        return Err((
                            ResultCode::TYPE_OR_VALUE_EXISTS,
                            format!("{name}: value #0 provided more than once"),
                        ));
                    }
                    values.push(value.to_string());
                }
            }
            ModOperation::Delete => {
                let Some(key) = key else {
                    return Err((
                        ResultCode::NO_SUCH_ATTRIBUTE,
                        format!("modify/delete: {name}: no such attribute"),
                    ));
                };
                if record.value_count() == 0 {
                    attributes.remove(&key);
                    return Ok(());
                }
                let values = attributes.get_mut(&key).ok_or((
                    ResultCode::NO_SUCH_ATTRIBUTE,
                    format!("modify/delete: {name}: no such attribute"),
                ))?;
                for value in record.values() {
                    let Some(at) = values.iter().position(|v| v.eq_ignore_ascii_case(value)) else {
                        return Err((
                            ResultCode::NO_SUCH_ATTRIBUTE,
                            format!("modify/delete: {name}: no such value"),
                        ));
                    };
                    values.remove(at);
                }
                if values.is_empty() {
                    attributes.remove(&key);
                }
            }
            ModOperation::Replace => {
                if let Some(key) = key {
                    attributes.remove(&key);
                }
                if record.value_count() > 0 {
                    attributes.insert(name.to_string(), record.decode());
                }
            }
        }
        Ok(())
    }
}

fn in_scope(key: &str, base: &str, scope: SearchScope) -> bool {
    let below = base.is_empty() || key.ends_with(&format!(",{base}"));
    match scope {
        SearchScope::Base => key == base,
        SearchScope::OneLevel => {
            below && {
                let rdn_len = if base.is_empty() {
                    key.len()
                } else {
                    key.len() - base.len() - 1
                };
                !key[..rdn_len].contains(',')
            }
        }
        SearchScope::Subtree => key == base || below,
        SearchScope::Children => key != base && below,
    }
}

fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
        .to_lowercase()
}

impl DirectoryTransport for MemoryTransport {
    type Session = MemorySession;
    type SearchResult = MemoryResult;
    type EntryId = usize;
    type Cursor = MemoryCursor;

    fn initialize(&mut self, host: &str, port: u16) -> Result<MemorySession, ResultCode> {
        self.calls.push(Call::Initialize {
            host: host.to_string(),
            port,
        });
        if let Some(code) = self.injected(Primitive::Initialize) {
            return Err(code);
        }
        if host.trim().is_empty() {
            return Err(ResultCode::PARAM_ERROR);
        }

        self.next_session += 1;
        self.stats.sessions_opened += 1;
        Ok(MemorySession {
            id: self.next_session,
            host: host.to_string(),
            port,
            options: HashMap::new(),
            bound_as: None,
            diagnostic: None,
        })
    }

    fn set_option(
        &mut self,
        session: &mut MemorySession,
        option: LdapOption,
        value: &OptionValue,
    ) -> ResultCode {
        self.calls.push(Call::SetOption {
            option,
            value: value.clone(),
        });
        if let Some(code) = self.injected(Primitive::SetOption(option)) {
            return code;
        }
        if option == LdapOption::PROTOCOL_VERSION && !matches!(value, OptionValue::Int(2 | 3)) {
            return ResultCode::PARAM_ERROR;
        }

        session.options.insert(option, value.clone());
        ResultCode::SUCCESS
    }

    fn get_option(
        &mut self,
        session: &MemorySession,
        option: LdapOption,
    ) -> Result<Option<String>, ResultCode> {
        self.calls.push(Call::GetOption(option));
        if let Some(code) = self.injected(Primitive::GetOption(option)) {
            return Err(code);
        }
        if let Some(value) = self.sasl_options.get(&option) {
            return Ok(Some(value.clone()));
        }

        Ok(match session.options.get(&option) {
            Some(OptionValue::Int(n)) => Some(n.to_string()),
            Some(OptionValue::Str(s)) => Some(s.clone()),
            Some(OptionValue::Raw(_)) | None => None,
        })
    }

    fn simple_bind(&mut self, session: &mut MemorySession, dn: &str, password: &str) -> ResultCode {
        self.calls.push(Call::SimpleBind { dn: dn.to_string() });
        session.diagnostic = None;
        if let Some(code) = self.injected(Primitive::SimpleBind) {
            return code;
        }

        if dn.is_empty() && password.is_empty() {
            session.bound_as = Some(String::new());
            return ResultCode::SUCCESS;
        }
        if password.is_empty() {
            session.diagnostic = Some("unauthenticated bind (DN with no password) disallowed".into());
            return ResultCode::UNWILLING_TO_PERFORM;
        }
        match self.users.get(&normalize_dn(dn)) {
            Some(expected) if expected == password => {
                session.bound_as = Some(dn.to_string());
                ResultCode::SUCCESS
            }
            _ => ResultCode::INVALID_CREDENTIALS,
        }
    }

    fn sasl_interactive_bind(
        &mut self,
        session: &mut MemorySession,
        request: &SaslBindRequest<'_>,
    ) -> ResultCode {
        self.calls.push(Call::SaslBind {
            mechanism: request.mechanism.to_string(),
            flags: request.flags,
            defaults: request.defaults.clone(),
        });
        session.diagnostic = None;
        if let Some(code) = self.injected(Primitive::SaslBind) {
            return code;
        }
        if !request.mechanism.eq_ignore_ascii_case(AuthMechanism::Gssapi.as_str()) {
            return ResultCode::AUTH_UNKNOWN;
        }

        let code = request.interaction.interact(request.flags, request.defaults);
        if !code.is_success() {
            return code;
        }

        match &self.kerberos_principal {
            Some(principal) => {
                session.bound_as = Some(principal.clone());
                ResultCode::SUCCESS
            }
            None => {
                session.diagnostic =
                    Some("SASL(-1): generic failure: GSSAPI Error: No credentials were supplied".into());
                ResultCode::INAPPROPRIATE_AUTH
            }
        }
    }

    fn search(
        &mut self,
        session: &mut MemorySession,
        request: &SearchRequest<'_>,
    ) -> Result<MemoryResult, ResultCode> {
        self.calls.push(Call::Search {
            base: request.base.to_string(),
            scope: request.scope,
            filter: request.filter.to_string(),
        });
        session.diagnostic = None;
        if let Some(code) = self.injected(Primitive::Search) {
            return Err(code);
        }

        let filter = Filter::parse(request.filter)?;
        let base = normalize_dn(request.base);
        if !base.is_empty() && !self.entries.contains_key(&base) {
            session.diagnostic = Some(format!("base object {} does not exist", request.base));
            return Err(ResultCode::NO_SUCH_OBJECT);
        }

        let wanted = request
            .attributes
            .filter(|names| !names.is_empty() && !names.contains(&"*"));
        let mut entries: Vec<DirectoryEntry> = self
            .entries
            .iter()
            .filter(|(key, _)| in_scope(key, &base, request.scope))
            .filter(|(_, entry)| filter.matches(entry.attributes()))
            .map(|(_, entry)| match wanted {
                Some(names) => {
                    let attributes = entry
                        .attributes()
                        .iter()
                        .filter(|(k, _)| names.iter().any(|n| n.eq_ignore_ascii_case(k)))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    DirectoryEntry::new(entry.dn(), attributes)
                }
                None => entry.clone(),
            })
            .collect();

        if !request.size_limit.is_unlimited() {
            entries.truncate(usize::try_from(request.size_limit.get()).unwrap_or(usize::MAX));
        }

        self.stats.results_opened += 1;
        Ok(MemoryResult {
            entries,
            attrs_only: request.attrs_only,
        })
    }

    fn first_entry(&self, result: &MemoryResult) -> Option<usize> {
        (!result.entries.is_empty()).then_some(0)
    }

    fn next_entry(&self, result: &MemoryResult, entry: usize) -> Option<usize> {
        let next = entry + 1;
        (next < result.entries.len()).then_some(next)
    }

    fn get_dn(&self, result: &MemoryResult, entry: usize) -> Option<String> {
        result
            .entries
            .get(entry)
            .map(|e| e.dn().to_string())
            .filter(|dn| !dn.is_empty())
    }

    fn open_cursor(&mut self) -> MemoryCursor {
        self.stats.cursors_opened += 1;
        MemoryCursor::default()
    }

    fn first_attribute(
        &self,
        result: &MemoryResult,
        entry: usize,
        cursor: &mut MemoryCursor,
    ) -> Option<String> {
        let entry = result.entries.get(entry)?;
        let mut names: Vec<String> = entry.attributes().keys().cloned().collect();
        names.sort();
        cursor.names = names;
        cursor.position = 0;
        cursor.names.first().cloned()
    }

    fn next_attribute(
        &self,
        _result: &MemoryResult,
        _entry: usize,
        cursor: &mut MemoryCursor,
    ) -> Option<String> {
        cursor.position += 1;
        cursor.names.get(cursor.position).cloned()
    }

    fn get_values(&self, result: &MemoryResult, entry: usize, name: &str) -> Option<Vec<String>> {
        let values = result.entries.get(entry)?.get(name)?;
        if result.attrs_only {
            Some(Vec::new())
        } else {
            Some(values.to_vec())
        }
    }

    fn free_cursor(&mut self, _cursor: MemoryCursor) {
        self.stats.cursors_released += 1;
    }

    fn free_result(&mut self, _result: MemoryResult) {
        self.stats.results_released += 1;
    }

    fn add(&mut self, session: &mut MemorySession, dn: &str, mods: &ModBatch) -> ResultCode {
        self.calls.push(Call::Add {
            dn: dn.to_string(),
            mods: mods.iter().cloned().collect(),
        });
        session.diagnostic = None;
        if let Some(code) = self.injected(Primitive::Add) {
            return code;
        }

        let key = normalize_dn(dn);
        if self.entries.contains_key(&key) {
            session.diagnostic = Some(format!("entry {dn} already exists"));
            return ResultCode::ALREADY_EXISTS;
        }

        let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
        for record in mods.iter() {
            attributes
                .entry(record.attr_type().to_string())
                .or_default()
                .extend(record.decode());
        }
        self.entries.insert(key, DirectoryEntry::new(dn, attributes));
        ResultCode::SUCCESS
    }

    fn modify(&mut self, session: &mut MemorySession, dn: &str, mods: &ModBatch) -> ResultCode {
        self.calls.push(Call::Modify {
            dn: dn.to_string(),
            mods: mods.iter().cloned().collect(),
        });
        session.diagnostic = None;
        if let Some(code) = self.injected(Primitive::Modify) {
            return code;
        }

        let key = normalize_dn(dn);
        let Some(entry) = self.entries.get(&key) else {
            session.diagnostic = Some(format!("entry {dn} does not exist"));
            return ResultCode::NO_SUCH_OBJECT;
        };

        let (stored_dn, mut attributes) = entry.clone().into_parts();
        for record in mods.iter() {
            if let Err((code, message)) = Self::apply_modify(&mut attributes, record) {
                session.diagnostic = Some(message);
                return code;
            }
        }
        self.entries.insert(key, DirectoryEntry::new(stored_dn, attributes));
        ResultCode::SUCCESS
    }

    fn delete(&mut self, session: &mut MemorySession, dn: &str) -> ResultCode {
        self.calls.push(Call::Delete { dn: dn.to_string() });
        session.diagnostic = None;
        if let Some(code) = self.injected(Primitive::Delete) {
            return code;
        }

        let key = normalize_dn(dn);
        if !self.entries.contains_key(&key) {
            session.diagnostic = Some(format!("entry {dn} does not exist"));
            return ResultCode::NO_SUCH_OBJECT;
        }
        let suffix = format!(",{key}");
        if self.entries.keys().any(|k| k.ends_with(&suffix)) {
            session.diagnostic = Some("subordinate objects must be deleted first".into());
            return ResultCode::NOT_ALLOWED_ON_NONLEAF;
        }

        self.entries.remove(&key);
        ResultCode::SUCCESS
    }

    fn unbind(&mut self, _session: MemorySession) -> ResultCode {
        self.calls.push(Call::Unbind);
        self.stats.sessions_released += 1;
        self.injected(Primitive::Unbind)
            .unwrap_or(ResultCode::SUCCESS)
    }

    fn extended_error(&self, session: &MemorySession) -> Option<String> {
        session.diagnostic.clone()
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
    use crate::types::{ModifyAttribute, ModifyEntry};

    fn directory() -> MemoryTransport {
        MemoryTransport::new()
            .with_entry(
                DirectoryEntry::builder("dc=example,dc=com")
                    .attribute("objectClass", ["domain"])
                    .build(),
            )
            .with_entry(
                DirectoryEntry::builder("ou=people,dc=example,dc=com")
                    .attribute("objectClass", ["organizationalUnit"])
                    .build(),
            )
            .with_entry(
                DirectoryEntry::builder("cn=alice,ou=people,dc=example,dc=com")
                    .attribute("objectClass", ["person"])
                    .attribute("cn", ["alice"])
                    .attribute("mail", ["alice@example.com"])
                    .build(),
            )
    }

    fn dns(transport: &mut MemoryTransport, base: &str, scope: SearchScope) -> Vec<String> {
        let mut session = transport.initialize("localhost", 389).unwrap();
        let result = transport
            .search(&mut session, &SearchRequest::new(base, "(objectClass=*)", scope))
            .unwrap();
        let dns = result.entries.iter().map(|e| e.dn().to_string()).collect();
        transport.free_result(result);
        transport.unbind(session);
        dns
    }

    #[test]
    fn initialize_rejects_empty_host() {
        let mut transport = MemoryTransport::new();
        assert_eq!(
            transport.initialize(" ", 389).unwrap_err(),
            ResultCode::PARAM_ERROR
        );
        assert_eq!(transport.stats().sessions_opened, 0);
    }

    #[test]
    fn protocol_version_must_be_two_or_three() {
        let mut transport = MemoryTransport::new();
        let mut session = transport.initialize("localhost", 389).unwrap();

        let ok = transport.set_option(&mut session, LdapOption::PROTOCOL_VERSION, &OptionValue::Int(3));
        assert_eq!(ok, ResultCode::SUCCESS);
        let bad = transport.set_option(&mut session, LdapOption::PROTOCOL_VERSION, &OptionValue::Int(4));
        assert_eq!(bad, ResultCode::PARAM_ERROR);
        assert_eq!(
            session.option(LdapOption::PROTOCOL_VERSION),
            Some(&OptionValue::Int(3))
        );
    }

    #[test]
    fn search_scopes() {
        let mut transport = directory();

        assert_eq!(
            dns(&mut transport, "dc=example,dc=com", SearchScope::Base),
            vec!["dc=example,dc=com"]
        );
        assert_eq!(
            dns(&mut transport, "dc=example,dc=com", SearchScope::OneLevel),
            vec!["ou=people,dc=example,dc=com"]
        );
        assert_eq!(dns(&mut transport, "dc=example,dc=com", SearchScope::Subtree).len(), 3);
        assert_eq!(dns(&mut transport, "dc=example,dc=com", SearchScope::Children).len(), 2);
        assert_eq!(dns(&mut transport, "DC=Example, DC=Com", SearchScope::Subtree).len(), 3);
        assert!(transport.stats().balanced());
    }

    #[test]
    fn search_missing_base_sets_diagnostic() {
        let mut transport = directory();
        let mut session = transport.initialize("localhost", 389).unwrap();
        let request = SearchRequest::new("dc=missing", "(objectClass=*)", SearchScope::Subtree);

        assert_eq!(
            transport.search(&mut session, &request).unwrap_err(),
            ResultCode::NO_SUCH_OBJECT
        );
        assert!(transport.extended_error(&session).unwrap().contains("dc=missing"));
        assert_eq!(transport.stats().results_opened, 0);
    }

    #[test]
    fn search_rejects_bad_filter() {
        let mut transport = directory();
        let mut session = transport.initialize("localhost", 389).unwrap();
        let request = SearchRequest::new("dc=example,dc=com", "(cn=", SearchScope::Subtree);
        assert_eq!(
            transport.search(&mut session, &request).unwrap_err(),
            ResultCode::FILTER_ERROR
        );
    }

    #[test]
    fn search_attribute_selection_and_size_limit() {
        let mut transport = directory();
        let mut session = transport.initialize("localhost", 389).unwrap();
        let mut request = SearchRequest::new("dc=example,dc=com", "(cn=alice)", SearchScope::Subtree);
        request.attributes = Some(&["mail"]);
        let result = transport.search(&mut session, &request).unwrap();

        let names: Vec<&String> = result.entries[0].attributes().keys().collect();
        assert_eq!(names, vec!["mail"]);
        transport.free_result(result);

        let mut request = SearchRequest::new("dc=example,dc=com", "(objectClass=*)", SearchScope::Subtree);
        request.size_limit = crate::types::SizeLimit::entries(1);
        let result = transport.search(&mut session, &request).unwrap();
        assert_eq!(result.entries.len(), 1);
        transport.free_result(result);
    }

    #[test]
    fn add_and_duplicate_add() {
        let mut transport = directory();
        let mut session = transport.initialize("localhost", 389).unwrap();
        let entry = DirectoryEntry::builder("cn=bob,ou=people,dc=example,dc=com")
            .attribute("cn", ["bob"])
            .build();
        let batch = ModBatch::for_add(&entry);

        assert_eq!(transport.add(&mut session, entry.dn(), &batch), ResultCode::SUCCESS);
        assert_eq!(
            transport.entry("cn=bob,ou=people,dc=example,dc=com").unwrap().first("cn"),
            Some("bob")
        );
        assert_eq!(
            transport.add(&mut session, entry.dn(), &batch),
            ResultCode::ALREADY_EXISTS
        );
    }

    #[test]
    fn modify_operations() {
        let mut transport = directory();
        let mut session = transport.initialize("localhost", 389).unwrap();
        let dn = "cn=alice,ou=people,dc=example,dc=com";

        let change = ModifyEntry::new(dn)
            .with(ModifyAttribute::add("mail", ["a@example.com"]))
            .with(ModifyAttribute::replace("sn", ["Smith"]))
            .with(ModifyAttribute::delete("cn", Vec::<String>::new()));
        let code = transport.modify(&mut session, dn, &ModBatch::for_modify(&change));
        assert_eq!(code, ResultCode::SUCCESS);

        let entry = transport.entry(dn).unwrap();
        assert_eq!(entry.get("mail").unwrap().len(), 2);
        assert_eq!(entry.first("sn"), Some("Smith"));
        assert!(entry.get("cn").is_none());

        let dup = ModifyEntry::new(dn).with(ModifyAttribute::add("mail", ["a@example.com"]));
        assert_eq!(
            transport.modify(&mut session, dn, &ModBatch::for_modify(&dup)),
            ResultCode::TYPE_OR_VALUE_EXISTS
        );

        let missing = ModifyEntry::new(dn).with(ModifyAttribute::delete("title", ["x"]));
        assert_eq!(
            transport.modify(&mut session, dn, &ModBatch::for_modify(&missing)),
            ResultCode::NO_SUCH_ATTRIBUTE
        );
        assert_eq!(transport.entry(dn).unwrap().get("mail").unwrap().len(), 2);
    }

    #[test]
    fn delete_rules() {
        let mut transport = directory();
        let mut session = transport.initialize("localhost", 389).unwrap();

        assert_eq!(
            transport.delete(&mut session, "ou=people,dc=example,dc=com"),
            ResultCode::NOT_ALLOWED_ON_NONLEAF
        );
        assert_eq!(
            transport.delete(&mut session, "cn=nobody,dc=example,dc=com"),
            ResultCode::NO_SUCH_OBJECT
        );
        assert_eq!(
            transport.delete(&mut session, "cn=alice,ou=people,dc=example,dc=com"),
            ResultCode::SUCCESS
        );
        assert_eq!(transport.len(), 2);
    }

    #[test]
    fn simple_bind_rules() {
        let mut transport = MemoryTransport::new().with_user("cn=admin,dc=example,dc=com", "secret");
        let mut session = transport.initialize("localhost", 389).unwrap();

        assert_eq!(transport.simple_bind(&mut session, "", ""), ResultCode::SUCCESS);
        assert_eq!(
            transport.simple_bind(&mut session, "cn=admin,dc=example,dc=com", ""),
            ResultCode::UNWILLING_TO_PERFORM
        );
        assert_eq!(
            transport.simple_bind(&mut session, "CN=Admin,DC=example,DC=com", "secret"),
            ResultCode::SUCCESS
        );
    }

    #[test]
    fn injected_failures_and_call_log() {
        let mut transport = MemoryTransport::new().failing(Primitive::Delete, ResultCode::UNAVAILABLE);
        let mut session = transport.initialize("localhost", 389).unwrap();

        assert_eq!(transport.delete(&mut session, "cn=x"), ResultCode::UNAVAILABLE);
        transport.clear_failures();
        assert_eq!(transport.delete(&mut session, "cn=x"), ResultCode::NO_SUCH_OBJECT);

        assert_eq!(transport.call_count(Primitive::Delete), 2);
        assert_eq!(transport.calls()[0].primitive(), Primitive::Initialize);
    }

    #[test]
    fn unbind_releases_even_when_failing() {
        let mut transport = MemoryTransport::new().failing(Primitive::Unbind, ResultCode::SERVER_DOWN);
        let session = transport.initialize("localhost", 389).unwrap();

        assert_eq!(transport.unbind(session), ResultCode::SERVER_DOWN);
        assert_eq!(transport.stats().sessions_released, 1);
        assert!(transport.stats().balanced());
    }
}
