//! Type descriptors for named records and user-defined container types.

use serde::{Deserialize, Serialize};

/// Describes a named-record type: a named tuple or a struct sequence.
///
/// Stands in for the record's type object. Descriptors are shared via
/// `Arc` and compared by value (name and field list), which keeps encoded
/// tree structures stable across processes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType {
    name: String,
    fields: Vec<String>,
}

impl RecordType {
    /// Create a record type descriptor from a type name and its field
    /// names, in declaration order.
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// The unqualified type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field names, in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }
}

/// A handle identifying a user-defined container type.
///
/// Extension values carry one of these; registries key custom flatten and
/// unflatten behavior on the handle's name. The name should be unique per
/// registered type (a module-qualified name is a good convention).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionType {
    name: String,
}

impl ExtensionType {
    /// Create an extension type handle with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The type name this handle was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The trailing path segment of the name, used in human-readable
    /// renderings (`a.b.Point` prints as `Point`).
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}
