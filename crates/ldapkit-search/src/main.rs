//! `ldapkit-search` - search a directory from the command line.
//!
//! ```text
//! ldapkit-search --auth=GSSAPI --host=dc1.example.com --base="dc=example,dc=com"
//! ldapkit-search --host=ldap.forumsys.com --who="cn=read-only-admin,dc=example,dc=com" --password=password
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::fmt::Write as _;

use anyhow::Context;
use clap::Parser;
use ldapkit::{Connection, Credentials, DirectoryEntry, ProtocolVersion};
use ldapkit_ldap3::Ldap3Transport;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ldapkit-search")]
#[command(about = "Bind to an LDAP server and print the entries matching a filter")]
struct Args {
    /// Server host name
    #[arg(long, default_value = "ldap.forumsys.com")]
    host: String,

    /// Server port
    #[arg(long, default_value_t = ldapkit::DEFAULT_PORT)]
    port: u16,

    /// Bind mechanism (Simple or GSSAPI)
    #[arg(long, default_value = "Simple")]
    auth: String,

    /// Search base DN
    #[arg(long, default_value = "dc=example,dc=com")]
    base: String,

    /// Search filter
    #[arg(long, default_value = "(objectclass=*)")]
    filter: String,

    /// Bind DN for simple binds
    #[arg(long, default_value = "cn=read-only-admin,dc=example,dc=com")]
    who: String,

    /// Password for simple binds
    #[arg(long, default_value = "password")]
    password: String,

    /// Look up a single object by security identifier instead of `--filter`
    #[arg(long, value_name = "SID")]
    sid: Option<String>,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ldapkit=info,ldapkit_search=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(output) => print!("{output}"),
        Err(e) => println!("{e:#}"),
    }
    println!("End");
}

fn run(args: &Args) -> anyhow::Result<String> {
    let mut conn = Connection::new(Ldap3Transport::default());

    conn.connect(&args.host, args.port, ProtocolVersion::V3)
        .with_context(|| format!("failed to connect to {}:{}", args.host, args.port))?;
    conn.bind(&args.auth, Credentials::new(&args.who, &args.password))
        .context("bind failed")?;
    info!(host = %args.host, mechanism = %args.auth, "bound");

    let results = match &args.sid {
        Some(sid) => conn.search_by_subject_id(&args.base, sid)?,
        None => conn.search(&args.base, &args.filter)?,
    };

    let mut output = String::new();
    for entry in results {
        output.push_str(&format_entry(&entry));
    }

    conn.close();
    Ok(output)
}

/// Renders an entry as `dn:` followed by one `name: value` line per value.
fn format_entry(entry: &DirectoryEntry) -> String {
    let mut out = format!("dn: {}\n", entry.dn());

    let mut names: Vec<&String> = entry.attributes().keys().collect();
    names.sort();
    for name in names {
        for value in &entry.attributes()[name] {
            let _ = writeln!(out, "{name}: {value}");
        }
    }
    out.push('\n');
    out
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

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["ldapkit-search"]).unwrap();
        assert_eq!(args.host, "ldap.forumsys.com");
        assert_eq!(args.port, 389);
        assert_eq!(args.auth, "Simple");
        assert_eq!(args.base, "dc=example,dc=com");
        assert_eq!(args.filter, "(objectclass=*)");
        assert_eq!(args.who, "cn=read-only-admin,dc=example,dc=com");
        assert_eq!(args.password, "password");
        assert!(args.sid.is_none());
    }

    #[test]
    fn test_equals_form() {
        let args = Args::try_parse_from([
            "ldapkit-search",
            "--auth=GSSAPI",
            "--host=dc1.example.com",
            "--base=dc=corp,dc=example,dc=com",
            "--sid=S-1-5-21-1-2-3-500",
        ])
        .unwrap();
        assert_eq!(args.auth, "GSSAPI");
        assert_eq!(args.host, "dc1.example.com");
        assert_eq!(args.base, "dc=corp,dc=example,dc=com");
        assert_eq!(args.sid.as_deref(), Some("S-1-5-21-1-2-3-500"));
    }

    #[test]
    fn test_format_entry() {
        let entry = DirectoryEntry::builder("uid=euler,dc=example,dc=com")
            .attribute("uid", ["euler"])
            .attribute("objectClass", ["top", "person"])
            .build();

        assert_eq!(
            format_entry(&entry),
            "dn: uid=euler,dc=example,dc=com\n\
             objectClass: top\n\
             objectClass: person\n\
             uid: euler\n\n"
        );
    }
}
