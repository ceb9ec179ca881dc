//! Flat block records produced by the flattener.
//!
//! These are the shapes the block runtime consumes: each record links to the
//! blocks nested in its inputs and to the block chained after it by id, never
//! by ownership. Serialized field names follow the runtime (`topLevel`, and
//! `next` as `null` when nothing follows).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single block, flattened out of the markup tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    /// Unique key in the output namespace, taken verbatim from `id`.
    pub id: String,
    /// Execution opcode from the `type` attribute, e.g. `event_whengreenflag`.
    /// Opaque to this crate.
    pub opcode: String,
    /// Value and statement inputs, keyed by input name.
    pub inputs: BTreeMap<String, Input>,
    /// Field values, keyed by field name.
    pub fields: BTreeMap<String, Field>,
    /// Id of the next block in the stack.
    pub next: Option<String>,
    /// Whether this block starts a stack (it was a root of the fragment).
    pub top_level: bool,
}

/// An input slot linked to the block that fills it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    /// Id of the nested block or shadow.
    pub block: String,
}

/// A named field and its text value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

impl BlockRecord {
    /// A record with no inputs, fields or successor.
    pub fn new(id: impl Into<String>, opcode: impl Into<String>, top_level: bool) -> Self {
        Self {
            id: id.into(),
            opcode: opcode.into(),
            inputs: BTreeMap::new(),
            fields: BTreeMap::new(),
            next: None,
            top_level,
        }
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.get(name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Value of a field, if present.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|field| field.value.as_str())
    }

    /// Ids this record points at: its inputs in name order, then `next`.
    pub fn linked_ids(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .values()
            .map(|input| input.block.as_str())
            .chain(self.next.as_deref())
    }
}
