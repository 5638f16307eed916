//! The ldap3-backed transport.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, LdapError, LdapResult, SearchEntry, SearchOptions};
use ldapkit::transport::{SaslBindRequest, SearchRequest};
use ldapkit::{
    AuthMechanism, DirectoryTransport, LdapOption, ModBatch, OptionValue, ResultCode, SearchScope,
};

use crate::convert;

/// Transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ldap3Settings {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Ldap3Settings {
    /// Creates settings with a 30 second connect timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for Ldap3Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// Session handle: one open ldap3 connection.
pub struct Ldap3Session {
    conn: LdapConn,
    host: String,
    options: HashMap<LdapOption, OptionValue>,
    diagnostic: Option<String>,
}

impl Ldap3Session {
    /// The connection with the session's network timeout armed. ldap3 clears
    /// the timeout after every operation, so it is set again for each one.
    fn conn(&mut self) -> &mut LdapConn {
        if let Some(timeout) = network_timeout(&self.options) {
            self.conn.with_timeout(timeout);
        }
        &mut self.conn
    }

    fn int_option(&self, option: LdapOption) -> Option<i32> {
        match self.options.get(&option) {
            Some(OptionValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    fn record(&mut self, outcome: Result<LdapResult, LdapError>) -> ResultCode {
        match outcome {
            Ok(result) => {
                let code = convert::result_code(&result);
                self.diagnostic = Some(result.text);
                code
            }
            Err(error) => self.fail(error),
        }
    }

    fn fail(&mut self, error: LdapError) -> ResultCode {
        let code = convert::error_code(&error);
        self.diagnostic = Some(match error {
            LdapError::LdapResult { result } => result.text,
            other => other.to_string(),
        });
        code
    }
}

impl fmt::Debug for Ldap3Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ldap3Session")
            .field("host", &self.host)
            .field("options", &self.options)
            .field("diagnostic", &self.diagnostic)
            .finish_non_exhaustive()
    }
}

/// Search result handle: the decoded entries of one search.
#[derive(Debug)]
pub struct Ldap3Result {
    entries: Vec<SearchEntry>,
}

/// Attribute cursor over one entry.
#[derive(Debug, Default)]
pub struct AttributeCursor {
    names: Vec<String>,
    position: usize,
}

/// [`DirectoryTransport`] over the synchronous ldap3 client.
#[derive(Debug, Clone, Default)]
pub struct Ldap3Transport {
    settings: Ldap3Settings,
}

impl Ldap3Transport {
    /// Creates a transport with the given settings.
    #[must_use]
    pub const fn new(settings: Ldap3Settings) -> Self {
        Self { settings }
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &Ldap3Settings {
        &self.settings
    }
}

#[cfg(feature = "gssapi")]
fn gssapi_bind(session: &mut Ldap3Session) -> ResultCode {
    let host = session.host.clone();
    let outcome = session.conn().sasl_gssapi_bind(&host);
    session.record(outcome)
}

#[cfg(not(feature = "gssapi"))]
fn gssapi_bind(session: &mut Ldap3Session) -> ResultCode {
    session.diagnostic = Some("GSSAPI support is not enabled in this build".into());
    ResultCode::NOT_SUPPORTED
}

/// Options the adapter applies. Anything else would be stored and never
/// read, so it is refused.
fn check_option(option: LdapOption, value: &OptionValue) -> Result<(), ResultCode> {
    match (option, value) {
        (LdapOption::PROTOCOL_VERSION, OptionValue::Int(3)) => Ok(()),
        (LdapOption::SIZELIMIT | LdapOption::TIMELIMIT | LdapOption::NETWORK_TIMEOUT, value) => {
            match value {
                OptionValue::Int(n) if *n >= 0 => Ok(()),
                _ => Err(ResultCode::PARAM_ERROR),
            }
        }
        // Read back by `get_option` for the SASL bind defaults.
        (option, OptionValue::Str(_)) if option.is_sasl() => Ok(()),
        _ => Err(ResultCode::NOT_SUPPORTED),
    }
}

fn network_timeout(options: &HashMap<LdapOption, OptionValue>) -> Option<Duration> {
    match options.get(&LdapOption::NETWORK_TIMEOUT) {
        Some(OptionValue::Int(secs)) => u64::try_from(*secs).ok().map(Duration::from_secs),
        _ => None,
    }
}

impl DirectoryTransport for Ldap3Transport {
    type Session = Ldap3Session;
    type SearchResult = Ldap3Result;
    type EntryId = usize;
    type Cursor = AttributeCursor;

    fn initialize(&mut self, host: &str, port: u16) -> Result<Ldap3Session, ResultCode> {
        if host.trim().is_empty() {
            return Err(ResultCode::PARAM_ERROR);
        }

        let url = format!("ldap://{host}:{port}");
        tracing::debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new().set_conn_timeout(self.settings.connect_timeout);
        let conn = LdapConn::with_settings(settings, &url).map_err(|e| {
            tracing::warn!(error = %e, url = %url, "LDAP connect failed");
            convert::error_code(&e)
        })?;

        Ok(Ldap3Session {
            conn,
            host: host.to_string(),
            options: HashMap::new(),
            diagnostic: None,
        })
    }

    fn set_option(
        &mut self,
        session: &mut Ldap3Session,
        option: LdapOption,
        value: &OptionValue,
    ) -> ResultCode {
        if let Err(code) = check_option(option, value) {
            tracing::debug!(%option, code = code.as_i32(), "option rejected");
            return code;
        }

        session.options.insert(option, value.clone());
        ResultCode::SUCCESS
    }

    fn get_option(
        &mut self,
        session: &Ldap3Session,
        option: LdapOption,
    ) -> Result<Option<String>, ResultCode> {
        Ok(match session.options.get(&option) {
            Some(OptionValue::Int(n)) => Some(n.to_string()),
            Some(OptionValue::Str(s)) => Some(s.clone()),
            Some(OptionValue::Raw(_)) | None => None,
        })
    }

    fn simple_bind(&mut self, session: &mut Ldap3Session, dn: &str, password: &str) -> ResultCode {
        let outcome = session.conn().simple_bind(dn, password);
        session.record(outcome)
    }

    fn sasl_interactive_bind(
        &mut self,
        session: &mut Ldap3Session,
        request: &SaslBindRequest<'_>,
    ) -> ResultCode {
        if !request
            .mechanism
            .eq_ignore_ascii_case(AuthMechanism::Gssapi.as_str())
        {
            return ResultCode::AUTH_UNKNOWN;
        }

        let code = request.interaction.interact(request.flags, request.defaults);
        if !code.is_success() {
            return code;
        }
        gssapi_bind(session)
    }

    fn search(
        &mut self,
        session: &mut Ldap3Session,
        request: &SearchRequest<'_>,
    ) -> Result<Ldap3Result, ResultCode> {
        let size_limit = if request.size_limit.is_unlimited() {
            session.int_option(LdapOption::SIZELIMIT).unwrap_or(0)
        } else {
            i32::try_from(request.size_limit.get()).unwrap_or(i32::MAX)
        };
        let mut options = SearchOptions::new()
            .sizelimit(size_limit)
            .typesonly(request.attrs_only);
        if let Some(seconds) = session.int_option(LdapOption::TIMELIMIT) {
            options = options.timelimit(seconds);
        }
        let attributes: Vec<&str> = request
            .attributes
            .map_or_else(|| vec!["*"], <[&str]>::to_vec);

        let outcome = session.conn().with_search_options(options).search(
            request.base,
            convert::scope(request.scope),
            request.filter,
            attributes,
        );
        let ldap3::SearchResult(entries, result) = match outcome {
            Ok(found) => found,
            Err(error) => return Err(session.fail(error)),
        };

        let code = convert::result_code(&result);
        if !code.is_success() && code != ResultCode::SIZE_LIMIT_EXCEEDED {
            session.diagnostic = Some(result.text);
            return Err(code);
        }
        if code == ResultCode::SIZE_LIMIT_EXCEEDED {
            tracing::warn!(base = request.base, "size limit exceeded, returning partial results");
        }

        let mut entries: Vec<SearchEntry> = entries.into_iter().map(SearchEntry::construct).collect();
        if request.scope == SearchScope::Children {
            entries.retain(|entry| !entry.dn.eq_ignore_ascii_case(request.base));
        }
        Ok(Ldap3Result { entries })
    }

    fn first_entry(&self, result: &Ldap3Result) -> Option<usize> {
        (!result.entries.is_empty()).then_some(0)
    }

    fn next_entry(&self, result: &Ldap3Result, entry: usize) -> Option<usize> {
        let next = entry + 1;
        (next < result.entries.len()).then_some(next)
    }

    fn get_dn(&self, result: &Ldap3Result, entry: usize) -> Option<String> {
        result.entries.get(entry).map(|e| e.dn.clone())
    }

    fn open_cursor(&mut self) -> AttributeCursor {
        AttributeCursor::default()
    }

    fn first_attribute(
        &self,
        result: &Ldap3Result,
        entry: usize,
        cursor: &mut AttributeCursor,
    ) -> Option<String> {
        let entry = result.entries.get(entry)?;
        let mut names: Vec<String> = entry
            .attrs
            .keys()
            .chain(entry.bin_attrs.keys())
            .cloned()
            .collect();
        names.sort();
        cursor.names = names;
        cursor.position = 0;
        cursor.names.first().cloned()
    }

    fn next_attribute(
        &self,
        _result: &Ldap3Result,
        _entry: usize,
        cursor: &mut AttributeCursor,
    ) -> Option<String> {
        cursor.position += 1;
        cursor.names.get(cursor.position).cloned()
    }

    fn get_values(&self, result: &Ldap3Result, entry: usize, name: &str) -> Option<Vec<String>> {
        let entry = result.entries.get(entry)?;
        entry.attrs.get(name).cloned().or_else(|| {
            entry.bin_attrs.get(name).map(|values| {
                values
                    .iter()
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .collect()
            })
        })
    }

    fn free_cursor(&mut self, _cursor: AttributeCursor) {}

    fn free_result(&mut self, result: Ldap3Result) {
        tracing::trace!(entries = result.entries.len(), "released search result");
    }

    fn add(&mut self, session: &mut Ldap3Session, dn: &str, mods: &ModBatch) -> ResultCode {
        let outcome = session.conn().add(dn, convert::add_attributes(mods));
        session.record(outcome)
    }

    fn modify(&mut self, session: &mut Ldap3Session, dn: &str, mods: &ModBatch) -> ResultCode {
        let outcome = session.conn().modify(dn, convert::modifications(mods));
        session.record(outcome)
    }

    fn delete(&mut self, session: &mut Ldap3Session, dn: &str) -> ResultCode {
        let outcome = session.conn().delete(dn);
        session.record(outcome)
    }

    fn unbind(&mut self, mut session: Ldap3Session) -> ResultCode {
        match session.conn().unbind() {
            Ok(()) => ResultCode::SUCCESS,
            Err(error) => convert::error_code(&error),
        }
    }

    fn extended_error(&self, session: &Ldap3Session) -> Option<String> {
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
    use ldapkit::EntryDecoder;

    fn search_entry(dn: &str, attrs: &[(&str, &[&str])], bin: &[(&str, &[u8])]) -> SearchEntry {
        SearchEntry {
            dn: dn.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, vs)| ((*k).to_string(), vs.iter().map(|v| (*v).to_string()).collect()))
                .collect(),
            bin_attrs: bin
                .iter()
                .map(|(k, v)| ((*k).to_string(), vec![v.to_vec()]))
                .collect(),
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Ldap3Settings::default();
        assert_eq!(settings.connect_timeout, Duration::from_secs(30));
        let settings = settings.connect_timeout(Duration::from_secs(5));
        assert_eq!(Ldap3Transport::new(settings).settings().connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_initialize_rejects_empty_host() {
        let mut transport = Ldap3Transport::default();
        assert_eq!(transport.initialize("", 389).unwrap_err(), ResultCode::PARAM_ERROR);
    }

    #[test]
    fn test_entry_walk_through_decoder() {
        let mut transport = Ldap3Transport::default();
        let result = Ldap3Result {
            entries: vec![
                search_entry(
                    "cn=alice,dc=example,dc=com",
                    &[("cn", &["alice"]), ("mail", &["a@example.com", "alice@example.com"])],
                    &[("objectSid", &[1, 5, 0])],
                ),
                search_entry("cn=bob,dc=example,dc=com", &[("cn", &["bob"])], &[]),
            ],
        };

        let entries: Vec<_> = EntryDecoder::new(&mut transport, result).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].get("mail").unwrap().len(), 2);
        assert_eq!(entries[0].get("objectSid").unwrap().len(), 1);
        assert_eq!(entries[1].first("cn"), Some("bob"));
    }

    #[test]
    fn test_entry_without_dn_is_skipped() {
        let mut transport = Ldap3Transport::default();
        let result = Ldap3Result {
            entries: vec![
                search_entry("", &[("namingContexts", &["dc=example,dc=com"])], &[]),
                search_entry("cn=bob,dc=example,dc=com", &[("cn", &["bob"])], &[]),
            ],
        };

        let entries: Vec<_> = EntryDecoder::new(&mut transport, result).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].dn(), "cn=bob,dc=example,dc=com");
    }

    #[test]
    fn test_unapplied_options_are_refused() {
        assert_eq!(
            check_option(LdapOption::new(0x7001), &OptionValue::Raw(vec![1, 2, 3])),
            Err(ResultCode::NOT_SUPPORTED)
        );
        assert_eq!(
            check_option(LdapOption::REFERRALS, &OptionValue::Int(0)),
            Err(ResultCode::NOT_SUPPORTED)
        );
        assert_eq!(
            check_option(LdapOption::SIZELIMIT, &OptionValue::Raw(vec![0])),
            Err(ResultCode::PARAM_ERROR)
        );
        assert_eq!(
            check_option(LdapOption::PROTOCOL_VERSION, &OptionValue::Int(2)),
            Err(ResultCode::NOT_SUPPORTED)
        );
        assert_eq!(
            check_option(LdapOption::X_SASL_REALM, &OptionValue::Int(1)),
            Err(ResultCode::NOT_SUPPORTED)
        );
    }

    #[test]
    fn test_applied_options_are_accepted() {
        assert_eq!(check_option(LdapOption::PROTOCOL_VERSION, &OptionValue::Int(3)), Ok(()));
        assert_eq!(check_option(LdapOption::TIMELIMIT, &OptionValue::Int(10)), Ok(()));
        assert_eq!(check_option(LdapOption::NETWORK_TIMEOUT, &OptionValue::Int(5)), Ok(()));
        assert_eq!(
            check_option(LdapOption::NETWORK_TIMEOUT, &OptionValue::Int(-1)),
            Err(ResultCode::PARAM_ERROR)
        );
        assert_eq!(
            check_option(LdapOption::X_SASL_REALM, &OptionValue::Str("EXAMPLE.COM".into())),
            Ok(())
        );
    }

    #[test]
    fn test_network_timeout_is_kept_in_session_options() {
        let mut options = HashMap::new();
        assert_eq!(network_timeout(&options), None);

        options.insert(LdapOption::NETWORK_TIMEOUT, OptionValue::Int(5));
        assert_eq!(network_timeout(&options), Some(Duration::from_secs(5)));
        // Reading it does not consume it.
        assert_eq!(network_timeout(&options), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_empty_result_has_no_first_entry() {
        let transport = Ldap3Transport::default();
        let result = Ldap3Result { entries: Vec::new() };
        assert_eq!(transport.first_entry(&result), None);
    }
}
