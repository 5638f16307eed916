//! Connection configuration types.

use crate::types::ProtocolVersion;

/// Default LDAP port.
pub const DEFAULT_PORT: u16 = 389;

/// LDAP connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Protocol version negotiated right after the session is created.
    pub protocol_version: ProtocolVersion,
}

impl ConnectionConfig {
    /// Creates a configuration for LDAPv3 on port 389.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            protocol_version: ProtocolVersion::V3,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    host: String,
    port: u16,
    protocol_version: ProtocolVersion,
}

impl ConnectionConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            protocol_version: ProtocolVersion::V3,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the protocol version.
    #[must_use]
    pub const fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host,
            port: self.port,
            protocol_version: self.protocol_version,
        }
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

    #[test]
    fn test_config_new() {
        let config = ConnectionConfig::new("ldap.example.com");
        assert_eq!(config.host, "ldap.example.com");
        assert_eq!(config.port, 389);
        assert_eq!(config.protocol_version, ProtocolVersion::V3);
    }

    #[test]
    fn test_config_builder() {
        let config = ConnectionConfig::builder("ldap.example.com")
            .port(3389)
            .protocol_version(ProtocolVersion::V2)
            .build();

        assert_eq!(config.port, 3389);
        assert_eq!(config.protocol_version, ProtocolVersion::V2);
    }

    #[test]
    fn test_builder_defaults_match_new() {
        assert_eq!(
            ConnectionConfig::builder("h").build(),
            ConnectionConfig::new("h")
        );
    }
}
