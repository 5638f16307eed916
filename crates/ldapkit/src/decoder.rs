//! Search result decoding.

use std::collections::HashMap;

use crate::transport::DirectoryTransport;
use crate::types::DirectoryEntry;

/// One-pass iterator turning a search result handle into entries.
///
/// The decoder owns the result handle and a single attribute cursor that is
/// reused for every entry. Both are released once, when the walk reaches the
/// end or when the decoder is dropped, whichever comes first.
///
/// Entries the transport reports without a DN are skipped, so every yielded
/// entry has a non-empty DN.
pub struct EntryDecoder<'t, T: DirectoryTransport> {
    transport: &'t mut T,
    result: Option<T::SearchResult>,
    cursor: Option<T::Cursor>,
    next: Option<T::EntryId>,
}

impl<'t, T: DirectoryTransport> EntryDecoder<'t, T> {
    /// Takes ownership of `result` and positions on its first entry.
    pub fn new(transport: &'t mut T, result: T::SearchResult) -> Self {
        let cursor = transport.open_cursor();
        let next = transport.first_entry(&result);
        Self {
            transport,
            result: Some(result),
            cursor: Some(cursor),
            next,
        }
    }

    fn finish(&mut self) {
        self.next = None;
        if let Some(cursor) = self.cursor.take() {
            self.transport.free_cursor(cursor);
        }
        if let Some(result) = self.result.take() {
            self.transport.free_result(result);
        }
    }
}

impl<T: DirectoryTransport> Iterator for EntryDecoder<'_, T> {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<DirectoryEntry> {
        loop {
            let Some(id) = self.next else {
                self.finish();
                return None;
            };
            let (Some(result), Some(cursor)) = (self.result.as_ref(), self.cursor.as_mut()) else {
                return None;
            };
            let transport = &*self.transport;
            self.next = transport.next_entry(result, id);

            let Some(dn) = transport.get_dn(result, id).filter(|dn| !dn.is_empty()) else {
                tracing::warn!("skipping search entry without a DN");
                continue;
            };

            let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
            let mut name = transport.first_attribute(result, id, cursor);
            while let Some(attr) = name {
                if let Some(values) = transport.get_values(result, id, &attr) {
                    attributes.entry(attr).or_default().extend(values);
                }
                name = transport.next_attribute(result, id, cursor);
            }

            return Some(DirectoryEntry::new(dn, attributes));
        }
    }
}

impl<T: DirectoryTransport> Drop for EntryDecoder<'_, T> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Entries returned by a search.
///
/// The result set is decoded in full before it is handed out; iteration
/// consumes it and cannot be restarted.
#[derive(Debug)]
pub struct SearchResults {
    entries: std::vec::IntoIter<DirectoryEntry>,
}

impl SearchResults {
    pub(crate) fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for SearchResults {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<DirectoryEntry> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for SearchResults {}

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
    use crate::transport::SearchRequest;
    use crate::transport::memory::MemoryTransport;
    use crate::types::SearchScope;

    fn populated() -> MemoryTransport {
        MemoryTransport::new()
            .with_entry(
                DirectoryEntry::builder("dc=example,dc=com")
                    .attribute("objectClass", ["top", "domain"])
                    .attribute("dc", ["example"])
                    .build(),
            )
            .with_entry(
                DirectoryEntry::builder("cn=alice,dc=example,dc=com")
                    .attribute("objectClass", ["person"])
                    .attribute("cn", ["alice"])
                    .attribute("mail", ["alice@example.com", "a@example.com"])
                    .build(),
            )
            .with_entry(
                DirectoryEntry::builder("cn=bob,dc=example,dc=com")
                    .attribute("objectClass", ["person"])
                    .attribute("cn", ["bob"])
                    .build(),
            )
    }

    fn run_search(transport: &mut MemoryTransport, filter: &str) -> Vec<DirectoryEntry> {
        let mut session = transport.initialize("localhost", 389).unwrap();
        let request = SearchRequest::new("dc=example,dc=com", filter, SearchScope::Subtree);
        let result = transport.search(&mut session, &request).unwrap();
        let entries = EntryDecoder::new(transport, result).collect();
        transport.unbind(session);
        entries
    }

    #[test]
    fn decodes_every_entry_with_values_in_order() {
        let mut transport = populated();
        let entries = run_search(&mut transport, "(objectclass=*)");

        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| !e.dn().is_empty()));

        let alice = entries
            .iter()
            .find(|e| e.dn() == "cn=alice,dc=example,dc=com")
            .unwrap();
        assert_eq!(
            alice.get("mail").unwrap(),
            &["alice@example.com".to_string(), "a@example.com".to_string()]
        );
        assert_eq!(alice.first("cn"), Some("alice"));
    }

    #[test]
    fn releases_result_and_cursor_once_after_full_walk() {
        let mut transport = populated();
        let _ = run_search(&mut transport, "(objectclass=person)");

        let stats = transport.stats();
        assert_eq!(stats.results_opened, 1);
        assert_eq!(stats.results_released, 1);
        assert_eq!(stats.cursors_opened, 1);
        assert_eq!(stats.cursors_released, 1);
    }

    #[test]
    fn releases_on_early_drop() {
        let mut transport = populated();
        let mut session = transport.initialize("localhost", 389).unwrap();
        let request = SearchRequest::new("dc=example,dc=com", "(objectclass=*)", SearchScope::Subtree);
        let result = transport.search(&mut session, &request).unwrap();

        {
            let mut decoder = EntryDecoder::new(&mut transport, result);
            assert!(decoder.next().is_some());
        }

        let stats = transport.stats();
        assert_eq!(stats.results_released, 1);
        assert_eq!(stats.cursors_released, 1);
    }

    #[test]
    fn empty_result_yields_nothing() {
        let mut transport = populated();
        let entries = run_search(&mut transport, "(cn=nobody)");
        assert!(entries.is_empty());
        assert_eq!(transport.stats().results_released, 1);
    }

    #[test]
    fn decoder_is_fused_after_exhaustion() {
        let mut transport = populated();
        let mut session = transport.initialize("localhost", 389).unwrap();
        let request = SearchRequest::new("cn=bob,dc=example,dc=com", "(objectclass=*)", SearchScope::Base);
        let result = transport.search(&mut session, &request).unwrap();

        let mut decoder = EntryDecoder::new(&mut transport, result);
        assert!(decoder.next().is_some());
        assert!(decoder.next().is_none());
        assert!(decoder.next().is_none());
        drop(decoder);

        assert_eq!(transport.stats().cursors_released, 1);
    }

    #[test]
    fn skips_entries_without_dn() {
        let mut transport = populated()
            .with_entry(DirectoryEntry::builder("").attribute("objectClass", ["top"]).build());
        let mut session = transport.initialize("localhost", 389).unwrap();
        let request = SearchRequest::new("", "(objectclass=*)", SearchScope::Subtree);
        let result = transport.search(&mut session, &request).unwrap();

        let entries: Vec<DirectoryEntry> = EntryDecoder::new(&mut transport, result).collect();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| !e.dn().is_empty()));

        let stats = transport.stats();
        assert_eq!(stats.results_released, 1);
        assert_eq!(stats.cursors_released, 1);
    }

    #[test]
    fn search_results_report_length() {
        let entries = vec![
            DirectoryEntry::builder("cn=a").build(),
            DirectoryEntry::builder("cn=b").build(),
        ];
        let mut results = SearchResults::new(entries);
        assert_eq!(results.len(), 2);
        assert_eq!(results.next().unwrap().dn(), "cn=a");
        assert_eq!(results.len(), 1);
    }
}
