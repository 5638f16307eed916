//! Result code translation.
//!
//! Every non-success code returned by the transport passes through here
//! before it reaches the caller. Failures on the close path use
//! [`trace_if_error`], which logs and never raises.

use crate::error::Error;
use crate::transport::DirectoryTransport;
use crate::types::ResultCode;

/// Maps a result code to the transport's human-readable error string.
#[must_use]
pub fn translate<T: DirectoryTransport>(transport: &T, code: ResultCode) -> String {
    transport.error_to_string(code)
}

/// Returns the server's extended diagnostic message for the last operation,
/// if it is not blank.
#[must_use]
pub fn diagnostics<T: DirectoryTransport>(transport: &T, session: &T::Session) -> Option<String> {
    transport
        .extended_error(session)
        .filter(|info| !info.trim().is_empty())
}

/// Like [`translate`], with the server diagnostic appended when present.
#[must_use]
pub fn translate_with_diagnostics<T: DirectoryTransport>(
    transport: &T,
    session: &T::Session,
    code: ResultCode,
) -> String {
    compose(translate(transport, code), diagnostics(transport, session).as_deref())
}

/// Logs a non-success code. Used where failing is not an option.
pub fn trace_if_error<T: DirectoryTransport>(transport: &T, code: ResultCode, operation: &str) {
    if !code.is_success() {
        tracing::error!(
            operation,
            code = code.as_i32(),
            "Error {operation}: {} ({code}).",
            translate(transport, code)
        );
    }
}

pub(crate) fn connection_error<T: DirectoryTransport>(
    transport: &T,
    operation: &'static str,
    code: ResultCode,
) -> Error {
    Error::Connection {
        operation,
        code,
        message: translate(transport, code),
    }
}

pub(crate) fn authentication_error<T: DirectoryTransport>(
    transport: &T,
    session: &T::Session,
    mechanism: &str,
    code: ResultCode,
) -> Error {
    Error::Authentication {
        mechanism: mechanism.to_string(),
        code,
        message: translate_with_diagnostics(transport, session, code),
    }
}

pub(crate) fn operation_error<T: DirectoryTransport>(
    transport: &T,
    session: &T::Session,
    operation: &'static str,
    code: ResultCode,
) -> Error {
    let diagnostic = diagnostics(transport, session);
    Error::Operation {
        operation,
        code,
        message: compose(translate(transport, code), diagnostic.as_deref()),
        diagnostic,
    }
}

fn compose(error: String, info: Option<&str>) -> String {
    match info {
        Some(info) => format!("{error}. {info}"),
        None => error,
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
    use crate::transport::memory::MemoryTransport;

    #[test]
    fn translate_uses_static_table() {
        let transport = MemoryTransport::new();
        assert_eq!(
            translate(&transport, ResultCode::INVALID_CREDENTIALS),
            "Invalid credentials"
        );
        assert_eq!(translate(&transport, ResultCode::new(4242)), "Unknown error");
    }

    #[test]
    fn diagnostics_are_appended_when_present() {
        let mut transport = MemoryTransport::new();
        let mut session = transport.initialize("localhost", 389).unwrap();
        assert_eq!(
            translate_with_diagnostics(&transport, &session, ResultCode::NO_SUCH_OBJECT),
            "No such object"
        );

        session.set_diagnostic("  ");
        assert_eq!(diagnostics(&transport, &session), None);

        session.set_diagnostic("entry cn=x not found");
        assert_eq!(
            translate_with_diagnostics(&transport, &session, ResultCode::NO_SUCH_OBJECT),
            "No such object. entry cn=x not found"
        );
    }

    #[test]
    fn operation_error_keeps_diagnostic_separately() {
        let mut transport = MemoryTransport::new();
        let mut session = transport.initialize("localhost", 389).unwrap();
        session.set_diagnostic("parent missing");

        let err = operation_error(&transport, &session, "add", ResultCode::NO_SUCH_OBJECT);
        assert_eq!(err.diagnostic(), Some("parent missing"));
        assert_eq!(err.result_code(), Some(ResultCode::NO_SUCH_OBJECT));
    }

    #[test]
    fn trace_if_error_never_panics() {
        let transport = MemoryTransport::new();
        trace_if_error(&transport, ResultCode::SUCCESS, "unbind");
        trace_if_error(&transport, ResultCode::SERVER_DOWN, "unbind");
    }
}
