//! Block tree flattener.
//!
//! Walks the markup tree under each top-level `<block>` and deposits one
//! [`BlockRecord`] per visited block or shadow into a single namespace keyed
//! by block id. Nested blocks are linked from their parent by id through
//! `inputs` (for `<value>` and `<statement>`) and `next`.
//!
//! Overwrites are uniform: a later field, input, `next` or record with the
//! same key replaces the earlier one without complaint.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::block::{BlockRecord, Field, Input};
use crate::error::{FlattenError, Result};
use crate::markup::parse_fragment;
use crate::node::{Element, Node};

const BLOCK: &str = "block";
const SHADOW: &str = "shadow";
const FIELD: &str = "field";
const VALUE: &str = "value";
const STATEMENT: &str = "statement";
const NEXT: &str = "next";

/// Knobs for a conversion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Deepest nesting level that may be visited (roots are depth 0).
    /// `None` leaves recursion unbounded.
    pub max_depth: Option<usize>,
}

impl FlattenOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

/// Flatten every top-level `<block>` among `roots`.
///
/// Non-block roots (text, comments, other elements) are ignored. Records come
/// back in first-insertion order of their ids.
///
/// # Example
///
/// ```rust
/// use blockdom_core::flatten::flatten;
/// use blockdom_core::node::Element;
///
/// let root = Element::new("block")
///     .with_attr("id", "a")
///     .with_attr("type", "looks_say")
///     .with_child(Element::new("field").with_attr("name", "MESSAGE").with_text("hi"));
///
/// let blocks = flatten(&[root.into()]).unwrap();
/// assert_eq!(blocks[0].field_value("MESSAGE"), Some("hi"));
/// ```
pub fn flatten(roots: &[Node]) -> Result<Vec<BlockRecord>> {
    flatten_with(roots, &FlattenOptions::default())
}

pub fn flatten_with(roots: &[Node], options: &FlattenOptions) -> Result<Vec<BlockRecord>> {
    let mut flattener = Flattener::new(*options);
    for root in roots
        .iter()
        .filter_map(Node::as_element)
        .filter(|element| element.is(BLOCK))
    {
        flattener.visit(root, 0)?;
    }
    let records = flattener.finish();
    debug!(
        roots = roots.len(),
        records = records.len(),
        "flattened block markup"
    );
    Ok(records)
}

/// Parse `markup` and flatten its top-level blocks.
pub fn flatten_str(markup: &str) -> Result<Vec<BlockRecord>> {
    flatten_str_with(markup, &FlattenOptions::default())
}

pub fn flatten_str_with(markup: &str, options: &FlattenOptions) -> Result<Vec<BlockRecord>> {
    flatten_with(&parse_fragment(markup)?, options)
}

/// A namespace slot. `owner` identifies the visit whose record currently
/// occupies it; a visit that has been displaced by a same-id descendant
/// does not write its record back.
#[derive(Debug)]
struct Slot {
    record: BlockRecord,
    owner: u64,
}

/// Output namespace for one conversion call.
///
/// Records are stored in first-insertion order of their ids. A visit claims
/// its slot before descending into children, so a nested block that reuses
/// an ancestor's id replaces the ancestor (last write wins) and the ancestor
/// keeps its original position in the output.
#[derive(Debug, Default)]
pub struct Flattener {
    options: FlattenOptions,
    slots: Vec<Slot>,
    index: FxHashMap<String, usize>,
    visits: u64,
}

impl Flattener {
    pub fn new(options: FlattenOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Number of distinct ids deposited so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current record for `id`.
    ///
    /// While a visit is still in progress its slot holds the bare skeleton
    /// (no inputs, fields or `next` yet).
    pub fn get(&self, id: &str) -> Option<&BlockRecord> {
        self.index.get(id).map(|&pos| &self.slots[pos].record)
    }

    /// Flatten `element` (a `<block>` or `<shadow>`) and everything nested
    /// under it at `depth`.
    pub fn visit(&mut self, element: &Element, depth: usize) -> Result<()> {
        if let Some(limit) = self.options.max_depth {
            if depth > limit {
                return Err(FlattenError::DepthLimit {
                    depth,
                    limit,
                    span: element.span,
                });
            }
        }

        let id = required_attr(element, "id")?;
        let opcode = required_attr(element, "type")?;
        trace!(id, opcode, depth, "visiting block");

        let mut record = BlockRecord::new(id, opcode, depth == 0);
        let owner = self.claim(record.clone());

        for child in element.elements() {
            if child.is(FIELD) {
                let field = read_field(child)?;
                record.fields.insert(field.name.clone(), field);
            } else if child.is(VALUE) || child.is(STATEMENT) {
                let nested = nested_block(child)?;
                self.visit(nested, depth + 1)?;
                let name = required_attr(child, "name")?;
                let block = required_attr(nested, "id")?;
                record.inputs.insert(
                    name.to_string(),
                    Input {
                        name: name.to_string(),
                        block: block.to_string(),
                    },
                );
            } else if child.is(NEXT) {
                let nested = nested_block(child)?;
                self.visit(nested, depth + 1)?;
                record.next = Some(required_attr(nested, "id")?.to_string());
            }
        }

        self.release(owner, record);
        Ok(())
    }

    /// Consume the namespace, yielding records in insertion order.
    pub fn finish(self) -> Vec<BlockRecord> {
        self.slots.into_iter().map(|slot| slot.record).collect()
    }

    fn claim(&mut self, record: BlockRecord) -> u64 {
        self.visits += 1;
        let owner = self.visits;
        match self.index.get(&record.id) {
            Some(&pos) => {
                debug!(id = %record.id, "block id reused, replacing earlier record");
                self.slots[pos] = Slot { record, owner };
            }
            None => {
                self.index.insert(record.id.clone(), self.slots.len());
                self.slots.push(Slot { record, owner });
            }
        }
        owner
    }

    fn release(&mut self, owner: u64, record: BlockRecord) {
        if let Some(&pos) = self.index.get(&record.id) {
            let slot = &mut self.slots[pos];
            if slot.owner == owner {
                slot.record = record;
            }
        }
    }
}

fn required_attr<'a>(element: &'a Element, name: &'static str) -> Result<&'a str> {
    element
        .attr(name)
        .ok_or_else(|| FlattenError::missing_attribute(&element.tag_name, name, element.span))
}

/// The block occupying an input or `next` slot: the first `<block>` child,
/// falling back to the first `<shadow>` child.
fn nested_block(slot: &Element) -> Result<&Element> {
    slot.first_element(BLOCK)
        .or_else(|| slot.first_element(SHADOW))
        .ok_or_else(|| FlattenError::MissingChildBlock {
            tag: slot.tag_name.clone(),
            name: slot.attr("name").map(str::to_string),
            span: slot.span,
        })
}

/// Read a `<field>`'s value from its first child, which must be text.
fn read_field(field: &Element) -> Result<Field> {
    let name = required_attr(field, "name")?;
    let value = field
        .children
        .first()
        .and_then(Node::text)
        .ok_or_else(|| FlattenError::MissingFieldText {
            name: name.to_string(),
            span: field.span,
        })?;
    Ok(Field {
        name: name.to_string(),
        value: value.to_string(),
    })
}
