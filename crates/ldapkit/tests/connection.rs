//! Integration tests for the LDAP session.
//!
//! These tests drive a [`Connection`] over the in-memory transport, which
//! records every call and counts every handle, so both behavior and resource
//! release can be checked without a server.

use ldapkit::transport::memory::{Call, MemoryTransport, Primitive};
use ldapkit::{
    Connection, Credentials, DirectoryEntry, Error, LdapOption, ModOperation, ModifyAttribute,
    ModifyEntry, ProtocolVersion, ResultCode, SessionState, ValidationError, WireMod,
};

const ADMIN: &str = "cn=admin,dc=example,dc=com";
const BASE: &str = "dc=example,dc=com";

fn directory() -> MemoryTransport {
    MemoryTransport::new()
        .with_user(ADMIN, "pw")
        .with_entry(
            DirectoryEntry::builder(BASE)
                .attribute("objectClass", ["top", "domain"])
                .attribute("dc", ["example"])
                .build(),
        )
        .with_entry(
            DirectoryEntry::builder("cn=alice,dc=example,dc=com")
                .attribute("objectClass", ["person"])
                .attribute("cn", ["alice"])
                .build(),
        )
        .with_entry(
            DirectoryEntry::builder("cn=bob,dc=example,dc=com")
                .attribute("objectClass", ["person"])
                .attribute("cn", ["bob"])
                .build(),
        )
}

fn bound() -> Connection<MemoryTransport> {
    let mut conn = Connection::new(directory());
    conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap();
    conn.bind("Simple", Credentials::new(ADMIN, "pw")).unwrap();
    conn
}

fn sample_entry() -> DirectoryEntry {
    DirectoryEntry::builder("cn=x,dc=example,dc=com")
        .attribute("cn", ["x"])
        .build()
}

/// Runs every session operation and asserts each one is rejected as a state
/// error without reaching the transport.
fn assert_all_rejected(conn: &mut Connection<MemoryTransport>, expected: SessionState) {
    let calls_before = conn.transport().calls().len();

    let results = [
        conn.bind("Simple", Credentials::new(ADMIN, "pw")),
        conn.set_option_int(LdapOption::SIZELIMIT, 5),
        conn.search(BASE, "(objectclass=*)").map(|_| ()),
        conn.search_by_subject_id(BASE, "S-1-5-18").map(|_| ()),
        conn.add(&sample_entry()),
        conn.modify(&ModifyEntry::new("cn=x,dc=example,dc=com")),
        conn.delete("cn=x,dc=example,dc=com"),
    ];

    for result in results {
        match result {
            Err(Error::State { state, .. }) => assert_eq!(state, expected),
            other => panic!("expected state error, got {other:?}"),
        }
    }
    assert_eq!(conn.state(), expected);
    assert_eq!(conn.transport().calls().len(), calls_before);
}

#[test]
fn test_operations_rejected_before_connect() {
    let mut conn = Connection::new(directory());
    assert_all_rejected(&mut conn, SessionState::Uninitialized);
}

#[test]
fn test_operations_rejected_after_close() {
    let mut conn = bound();
    conn.close();
    assert_all_rejected(&mut conn, SessionState::Closed);
}

#[test]
fn test_writes_rejected_while_only_connected() {
    let mut conn = Connection::new(directory());
    conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap();

    assert!(conn.search(BASE, "(objectclass=*)").unwrap_err().is_state_error());
    assert!(conn.add(&sample_entry()).unwrap_err().is_state_error());
    assert!(conn.delete("cn=x,dc=example,dc=com").unwrap_err().is_state_error());
    assert_eq!(conn.state(), SessionState::Connected);
}

#[test]
fn test_unsupported_mechanism_leaves_state() {
    let mut conn = Connection::new(directory());
    conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap();
    let calls_before = conn.transport().calls().len();

    for name in ["DIGEST-MD5", "", "kerberos"] {
        let err = conn.bind(name, Credentials::new(ADMIN, "pw")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMechanism(ref m) if m == name));
        assert_eq!(conn.state(), SessionState::Connected);
    }
    assert_eq!(conn.transport().calls().len(), calls_before);
}

#[test]
fn test_empty_dn_rejected_without_transport_contact() {
    let mut conn = bound();
    let calls_before = conn.transport().calls().len();

    let empty_add = DirectoryEntry::builder("").attribute("cn", ["x"]).build();
    let blank_modify = ModifyEntry::new("   ").with(ModifyAttribute::replace("cn", ["y"]));

    for err in [
        conn.add(&empty_add).unwrap_err(),
        conn.modify(&blank_modify).unwrap_err(),
        conn.delete("").unwrap_err(),
    ] {
        assert!(matches!(err, Error::Validation(ValidationError::EmptyDn)));
    }

    assert_eq!(conn.transport().calls().len(), calls_before);
    assert!(conn.is_bound());
}

#[test]
fn test_codec_round_trip_hides_sentinel() {
    let attr = ModifyAttribute::new("cn", ["a", "b"]);
    assert_eq!(attr.operation, ModOperation::Replace);

    let wire = WireMod::encode(&attr);
    assert_eq!(wire.raw_values().last(), Some(&None));
    assert_eq!(wire.decode(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_close_is_idempotent() {
    let mut conn = bound();
    conn.close();
    conn.close();

    assert_eq!(conn.state(), SessionState::Closed);
    let stats = conn.transport().stats();
    assert_eq!(stats.sessions_opened, 1);
    assert_eq!(stats.sessions_released, 1);
    assert_eq!(conn.transport().call_count(Primitive::Unbind), 1);
}

#[test]
fn test_search_scenario() {
    let mut conn = bound();
    let mut results = conn.search(BASE, "(objectclass=*)").unwrap();

    assert_eq!(results.len(), 3);
    let dns: Vec<String> = results.by_ref().map(|e| e.dn().to_string()).collect();
    assert_eq!(dns.len(), 3);
    assert!(dns.iter().all(|dn| !dn.is_empty()));

    // Single pass: a consumed result set yields nothing more.
    assert!(results.next().is_none());

    // Handles were released before search returned.
    assert!(conn.transport().stats().results_released == 1);
    assert!(conn.transport().stats().cursors_released == 1);
}

#[test]
fn test_add_then_delete_scenario() {
    let mut conn = bound();

    conn.add(&sample_entry()).unwrap();
    assert!(conn.transport().entry("cn=x,dc=example,dc=com").is_some());

    conn.delete("cn=x,dc=example,dc=com").unwrap();
    assert!(conn.transport().entry("cn=x,dc=example,dc=com").is_none());
}

#[test]
fn test_add_sends_add_for_every_attribute() {
    let mut conn = bound();
    let entry = DirectoryEntry::builder("cn=carol,dc=example,dc=com")
        .attribute("objectClass", ["person"])
        .attribute("cn", ["carol"])
        .attribute("sn", ["Jones"])
        .build();
    conn.add(&entry).unwrap();

    let mods = conn
        .transport()
        .calls()
        .iter()
        .find_map(|call| match call {
            Call::Add { mods, .. } => Some(mods.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(mods.len(), 3);
    assert!(mods.iter().all(|m| m.operation() == ModOperation::Add));
}

#[test]
fn test_modify_honors_each_operation() {
    let mut conn = bound();
    let change = ModifyEntry::new("cn=alice,dc=example,dc=com")
        .with(ModifyAttribute::add("mail", ["alice@example.com"]))
        .with(ModifyAttribute::new("description", ["engineer"]));
    conn.modify(&change).unwrap();

    let alice = conn.search(BASE, "(cn=alice)").unwrap().next().unwrap();
    assert_eq!(alice.first("mail"), Some("alice@example.com"));
    assert_eq!(alice.first("description"), Some("engineer"));
}

#[test]
fn test_write_failure_surfaces_code_and_keeps_state() {
    let mut conn = bound();

    let err = conn.add(&DirectoryEntry::builder("cn=alice,dc=example,dc=com").build()).unwrap_err();
    assert!(matches!(
        err,
        Error::Operation {
            operation: "add",
            code: ResultCode::ALREADY_EXISTS,
            ..
        }
    ));

    let err = conn.delete(BASE).unwrap_err();
    assert_eq!(err.result_code(), Some(ResultCode::NOT_ALLOWED_ON_NONLEAF));
    assert!(conn.is_bound());
}

#[test]
fn test_sasl_realm_failure_never_binds() {
    let transport = directory()
        .with_kerberos_principal("admin@EXAMPLE.COM")
        .failing(
            Primitive::GetOption(LdapOption::X_SASL_REALM),
            ResultCode::LOCAL_ERROR,
        );
    let mut conn = Connection::new(transport);
    conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap();

    let err = conn.bind("GSSAPI", Credentials::anonymous()).unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));
    assert_eq!(conn.state(), SessionState::Connected);
    assert_eq!(conn.transport().call_count(Primitive::SaslBind), 0);
}

#[test]
fn test_gssapi_bind_passes_negotiated_defaults() {
    let transport = directory()
        .with_kerberos_principal("admin@EXAMPLE.COM")
        .with_sasl_option(LdapOption::X_SASL_REALM, "EXAMPLE.COM")
        .with_sasl_option(LdapOption::X_SASL_AUTHCID, "admin");
    let mut conn = Connection::new(transport);
    conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap();
    conn.bind("gssapi", Credentials::anonymous()).unwrap();

    assert!(conn.is_bound());
    let defaults = conn
        .transport()
        .calls()
        .iter()
        .find_map(|call| match call {
            Call::SaslBind { defaults, .. } => Some(defaults.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(defaults.mechanism.as_deref(), Some("GSSAPI"));
    assert_eq!(defaults.realm.as_deref(), Some("EXAMPLE.COM"));
    assert_eq!(defaults.authcid.as_deref(), Some("admin"));
}

#[test]
fn test_connect_failure_stays_uninitialized() {
    let transport = directory().failing(Primitive::Initialize, ResultCode::CONNECT_ERROR);
    let mut conn = Connection::new(transport);

    let err = conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap_err();
    assert!(matches!(
        err,
        Error::Connection {
            operation: "initialize",
            code: ResultCode::CONNECT_ERROR,
            ..
        }
    ));
    assert_eq!(conn.state(), SessionState::Uninitialized);

    conn.transport_mut().clear_failures();
    conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap();
    assert_eq!(conn.state(), SessionState::Connected);
}

#[test]
fn test_protocol_version_failure_releases_session() {
    let transport = directory().failing(
        Primitive::SetOption(LdapOption::PROTOCOL_VERSION),
        ResultCode::PARAM_ERROR,
    );
    let mut conn = Connection::new(transport);

    let err = conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap_err();
    assert_eq!(err.result_code(), Some(ResultCode::PARAM_ERROR));
    assert_eq!(conn.state(), SessionState::Uninitialized);

    let stats = conn.transport().stats();
    assert_eq!(stats.sessions_opened, 1);
    assert_eq!(stats.sessions_released, 1);
}

#[test]
fn test_handles_balanced_after_close() {
    let mut conn = bound();
    let _ = conn.search(BASE, "(objectclass=person)").unwrap();
    conn.close();
    assert!(conn.transport().stats().balanced());
}

#[test]
fn test_drop_releases_bound_session_once() {
    let mut transport = directory();
    {
        let mut conn = Connection::new(&mut transport);
        conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap();
        conn.bind("Simple", Credentials::new(ADMIN, "pw")).unwrap();
        let _ = conn.search(BASE, "(objectclass=*)").unwrap();
    }

    let stats = transport.stats();
    assert_eq!(stats.sessions_opened, 1);
    assert_eq!(stats.sessions_released, 1);
    assert!(stats.balanced());
    assert_eq!(transport.call_count(Primitive::Unbind), 1);
}

#[test]
fn test_drop_releases_connected_session_once() {
    let mut transport = directory();
    {
        let mut conn = Connection::new(&mut transport);
        conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap();
        assert_eq!(conn.state(), SessionState::Connected);
    }

    assert_eq!(transport.stats().sessions_released, 1);
    assert_eq!(transport.call_count(Primitive::Unbind), 1);
}

#[test]
fn test_close_then_drop_unbinds_once() {
    let mut transport = directory();
    {
        let mut conn = Connection::new(&mut transport);
        conn.connect("ldap.example.com", 389, ProtocolVersion::V3).unwrap();
        conn.bind("Simple", Credentials::new(ADMIN, "pw")).unwrap();
        conn.close();
        conn.close();
    }

    assert_eq!(transport.stats().sessions_released, 1);
    assert_eq!(transport.call_count(Primitive::Unbind), 1);
}

#[test]
fn test_drop_without_session_never_unbinds() {
    let mut transport = directory();
    drop(Connection::new(&mut transport));

    assert_eq!(transport.stats().sessions_opened, 0);
    assert_eq!(transport.call_count(Primitive::Unbind), 0);
}

#[test]
fn test_connection_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Connection<MemoryTransport>>();
}

#[test]
fn test_error_messages() {
    let mut conn = bound();
    let err = conn.delete("cn=ghost,dc=example,dc=com").unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("delete failed: No such object"), "{text}");

    let err = Connection::new(MemoryTransport::new())
        .search(BASE, "(objectclass=*)")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid state for search: session is Uninitialized"
    );
}
