//! Attribute codec for write operations.
//!
//! Add and modify requests are handed to the transport as an array of
//! modification records terminated by a `None` sentinel, and every record
//! carries its values as a `None`-terminated array. That is the layout a
//! C-style client API expects; transports that speak a richer interface read
//! the same data through [`WireMod::values`] and [`ModBatch::iter`], which
//! stop at the sentinel.
//!
//! A [`ModBatch`] owns every record it encodes. It is built at the start of
//! an add or modify call and dropped at the end of that call, whatever the
//! outcome, so all buffers of a request are released together.

use crate::types::{DirectoryEntry, ModOperation, ModifyAttribute, ModifyEntry};

/// A single modification record in wire layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMod {
    operation: ModOperation,
    attr_type: String,
    values: Box<[Option<String>]>,
}

impl WireMod {
    /// Encodes an attribute change.
    #[must_use]
    pub fn encode(attribute: &ModifyAttribute) -> Self {
        Self::from_parts(attribute.operation, &attribute.attr_type, &attribute.values)
    }

    /// Encodes values with an explicit operation.
    #[must_use]
    pub fn from_parts(operation: ModOperation, attr_type: &str, values: &[String]) -> Self {
        let mut terminated = Vec::with_capacity(values.len() + 1);
        terminated.extend(values.iter().cloned().map(Some));
        terminated.push(None);

        Self {
            operation,
            attr_type: attr_type.to_string(),
            values: terminated.into_boxed_slice(),
        }
    }

    /// Returns the modify operation.
    #[must_use]
    pub const fn operation(&self) -> ModOperation {
        self.operation
    }

    /// Returns the attribute type.
    #[must_use]
    pub fn attr_type(&self) -> &str {
        &self.attr_type
    }

    /// Returns the value array including its trailing sentinel.
    #[must_use]
    pub fn raw_values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Iterates over the values, stopping at the sentinel.
    pub fn values(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.iter().map_while(Option::as_deref)
    }

    /// Returns the number of values, excluding the sentinel.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values().count()
    }

    /// Decodes the record back into an owned value list.
    #[must_use]
    pub fn decode(&self) -> Vec<String> {
        self.values().map(str::to_string).collect()
    }
}

/// A sentinel-terminated batch of modification records for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModBatch {
    mods: Box<[Option<WireMod>]>,
}

impl ModBatch {
    /// Encodes the attributes of a new entry. Every record uses `Add`.
    ///
    /// Attributes are emitted in name order.
    #[must_use]
    pub fn for_add(entry: &DirectoryEntry) -> Self {
        let mut names: Vec<&String> = entry.attributes().keys().collect();
        names.sort();

        Self::from_records(names.into_iter().map(|name| {
            let values = entry.get(name).unwrap_or_default();
            WireMod::from_parts(ModOperation::Add, name, values)
        }))
    }

    /// Encodes a modify request, keeping each attribute's own operation.
    #[must_use]
    pub fn for_modify(entry: &ModifyEntry) -> Self {
        Self::from_records(entry.attributes.iter().map(WireMod::encode))
    }

    fn from_records(records: impl Iterator<Item = WireMod>) -> Self {
        let mut mods: Vec<Option<WireMod>> = records.map(Some).collect();
        mods.push(None);
        tracing::trace!(records = mods.len() - 1, "encoded modification batch");
        Self {
            mods: mods.into_boxed_slice(),
        }
    }

    /// Returns the record array including its trailing sentinel.
    #[must_use]
    pub fn raw(&self) -> &[Option<WireMod>] {
        &self.mods
    }

    /// Iterates over the records, stopping at the sentinel.
    pub fn iter(&self) -> impl Iterator<Item = &WireMod> + '_ {
        self.mods.iter().map_while(Option::as_ref)
    }

    /// Returns the number of records, excluding the sentinel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if the batch carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ModBatch {
    fn drop(&mut self) {
        tracing::trace!(records = self.mods.len() - 1, "released modification batch");
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
    use proptest::prelude::*;

    #[test]
    fn encode_appends_sentinel() {
        let attr = ModifyAttribute::new("cn", ["a", "b"]);
        let wire = WireMod::encode(&attr);

        assert_eq!(wire.operation(), ModOperation::Replace);
        assert_eq!(wire.attr_type(), "cn");
        assert_eq!(
            wire.raw_values(),
            &[Some("a".to_string()), Some("b".to_string()), None]
        );
        assert_eq!(wire.decode(), vec!["a", "b"]);
    }

    #[test]
    fn empty_values_encode_to_single_sentinel() {
        let attr = ModifyAttribute::delete("description", Vec::<String>::new());
        let wire = WireMod::encode(&attr);

        assert_eq!(wire.raw_values(), &[None]);
        assert_eq!(wire.value_count(), 0);
        assert!(wire.decode().is_empty());
    }

    #[test]
    fn encoding_does_not_touch_input() {
        let attr = ModifyAttribute::add("mail", ["x@example.com"]);
        let before = attr.clone();
        let _ = WireMod::encode(&attr);
        assert_eq!(attr, before);
    }

    #[test]
    fn add_batch_forces_add_operation() {
        let entry = DirectoryEntry::builder("cn=x,dc=example,dc=com")
            .attribute("objectClass", ["top", "person"])
            .attribute("cn", ["x"])
            .build();
        let batch = ModBatch::for_add(&entry);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.raw().len(), 3);
        assert!(batch.raw().last().unwrap().is_none());
        assert!(batch.iter().all(|m| m.operation() == ModOperation::Add));

        let names: Vec<&str> = batch.iter().map(WireMod::attr_type).collect();
        assert_eq!(names, vec!["cn", "objectClass"]);
    }

    #[test]
    fn modify_batch_keeps_operations_and_order() {
        let entry = ModifyEntry::new("cn=x")
            .with(ModifyAttribute::add("mail", ["x@example.com"]))
            .with(ModifyAttribute::delete("sn", Vec::<String>::new()))
            .with(ModifyAttribute::replace("cn", ["y"]));
        let batch = ModBatch::for_modify(&entry);

        let ops: Vec<ModOperation> = batch.iter().map(WireMod::operation).collect();
        assert_eq!(
            ops,
            vec![ModOperation::Add, ModOperation::Delete, ModOperation::Replace]
        );
    }

    #[test]
    fn empty_batch_is_just_the_sentinel() {
        let batch = ModBatch::for_modify(&ModifyEntry::new("cn=x"));
        assert!(batch.is_empty());
        assert_eq!(batch.raw(), &[None]);
    }

    proptest! {
        #[test]
        fn sentinel_is_always_last_and_unique(values in proptest::collection::vec("[a-z0-9 ]{0,12}", 0..8)) {
            let wire = WireMod::from_parts(ModOperation::Replace, "cn", &values);
            prop_assert_eq!(wire.raw_values().len(), values.len() + 1);
            prop_assert!(wire.raw_values().last().unwrap().is_none());
            prop_assert_eq!(wire.raw_values().iter().filter(|v| v.is_none()).count(), 1);
            prop_assert_eq!(wire.decode(), values);
        }
    }
}
