//! Directory entry model.

use std::collections::HashMap;

/// An entry read from (or written to) the directory.
///
/// Attribute names map to the values in the order the server returned them.
/// Entries are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DirectoryEntry {
    dn: String,
    attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Creates an entry from a DN and its attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>, attributes: HashMap<String, Vec<String>>) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// Starts building an entry with the given DN.
    #[must_use]
    pub fn builder(dn: impl Into<String>) -> EntryBuilder {
        EntryBuilder {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Returns the distinguished name.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Returns all attributes.
    #[must_use]
    pub const fn attributes(&self) -> &HashMap<String, Vec<String>> {
        &self.attributes
    }

    /// Returns the values of an attribute, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// Returns the first value of an attribute, if present.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Consumes the entry, returning its DN and attributes.
    #[must_use]
    pub fn into_parts(self) -> (String, HashMap<String, Vec<String>>) {
        (self.dn, self.attributes)
    }
}

/// Builder for [`DirectoryEntry`].
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    dn: String,
    attributes: HashMap<String, Vec<String>>,
}

impl EntryBuilder {
    /// Appends values to an attribute.
    #[must_use]
    pub fn attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Builds the entry.
    #[must_use]
    pub fn build(self) -> DirectoryEntry {
        DirectoryEntry {
            dn: self.dn,
            attributes: self.attributes,
        }
    }
}

/// Per-attribute write semantics of a modify request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModOperation {
    /// Add the listed values.
    Add,
    /// Delete the listed values, or the whole attribute when none are listed.
    Delete,
    /// Replace the full value set.
    #[default]
    Replace,
}

impl ModOperation {
    /// Returns the protocol value of this operation.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Add => 0,
            Self::Delete => 1,
            Self::Replace => 2,
        }
    }
}

/// A single attribute change in a modify request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifyAttribute {
    /// Attribute type, e.g. `cn`.
    pub attr_type: String,
    /// Values; empty means "no values".
    pub values: Vec<String>,
    /// What to do with the values.
    pub operation: ModOperation,
}

impl ModifyAttribute {
    /// Creates an attribute change with the default `Replace` operation.
    #[must_use]
    pub fn new<I, V>(attr_type: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            attr_type: attr_type.into(),
            values: values.into_iter().map(Into::into).collect(),
            operation: ModOperation::default(),
        }
    }

    /// Sets the operation.
    #[must_use]
    pub const fn operation(mut self, operation: ModOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Creates an `Add` change.
    #[must_use]
    pub fn add<I, V>(attr_type: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(attr_type, values).operation(ModOperation::Add)
    }

    /// Creates a `Delete` change. No values deletes the whole attribute.
    #[must_use]
    pub fn delete<I, V>(attr_type: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(attr_type, values).operation(ModOperation::Delete)
    }

    /// Creates a `Replace` change.
    #[must_use]
    pub fn replace<I, V>(attr_type: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(attr_type, values)
    }
}

/// A modify request: a DN plus the ordered attribute changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifyEntry {
    /// Target entry.
    pub dn: String,
    /// Changes, applied in order.
    pub attributes: Vec<ModifyAttribute>,
}

impl ModifyEntry {
    /// Creates an empty modify request for `dn`.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends a change.
    #[must_use]
    pub fn with(mut self, attribute: ModifyAttribute) -> Self {
        self.attributes.push(attribute);
        self
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
    fn builder_merges_repeated_attributes() {
        let entry = DirectoryEntry::builder("cn=x,dc=example,dc=com")
            .attribute("objectClass", ["top"])
            .attribute("objectClass", ["person"])
            .attribute("cn", ["x"])
            .build();

        assert_eq!(entry.dn(), "cn=x,dc=example,dc=com");
        assert_eq!(
            entry.get("objectClass").unwrap(),
            &["top".to_string(), "person".to_string()]
        );
        assert_eq!(entry.first("cn"), Some("x"));
        assert_eq!(entry.get("sn"), None);
    }

    #[test]
    fn modify_attribute_defaults_to_replace() {
        let attr = ModifyAttribute::new("cn", ["a", "b"]);
        assert_eq!(attr.operation, ModOperation::Replace);
        assert_eq!(attr.values, vec!["a", "b"]);
    }

    #[test]
    fn modify_attribute_constructors() {
        assert_eq!(ModifyAttribute::add("mail", ["a@b"]).operation, ModOperation::Add);
        let del = ModifyAttribute::delete("description", Vec::<String>::new());
        assert_eq!(del.operation, ModOperation::Delete);
        assert!(del.values.is_empty());
    }

    #[test]
    fn mod_operation_protocol_values() {
        assert_eq!(ModOperation::Add.as_i32(), 0);
        assert_eq!(ModOperation::Delete.as_i32(), 1);
        assert_eq!(ModOperation::Replace.as_i32(), 2);
    }

    #[test]
    fn modify_entry_keeps_order() {
        let entry = ModifyEntry::new("cn=x")
            .with(ModifyAttribute::add("mail", ["x@example.com"]))
            .with(ModifyAttribute::delete("sn", ["old"]));
        assert_eq!(entry.attributes.len(), 2);
        assert_eq!(entry.attributes[0].attr_type, "mail");
        assert_eq!(entry.attributes[1].attr_type, "sn");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn entry_serializes() {
        let entry = DirectoryEntry::builder("cn=x").attribute("cn", ["x"]).build();
        let json = serde_json::to_string(&entry).unwrap();
        let back: DirectoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
