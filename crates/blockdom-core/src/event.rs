//! Event adapter: block-creation events in, block records out.
//!
//! Events arrive as loosely shaped JSON from the editor. Anything that does
//! not look like a creation event is simply not applicable and yields
//! `Ok(None)`. A well-shaped event whose markup is missing or malformed is an
//! error.

use serde_json::{Map, Value};
use tracing::debug;

use crate::block::BlockRecord;
use crate::cache::ParseCache;
use crate::error::{FlattenError, Result};
use crate::flatten::{flatten_str_with, flatten_with, FlattenOptions};

/// A value that passed the creation-event shape checks.
#[derive(Debug, Clone, Copy)]
pub struct CreateEvent<'a> {
    block_id: &'a str,
    xml: &'a Map<String, Value>,
}

impl<'a> CreateEvent<'a> {
    /// Check, in order, that `event` is an object, that it has a string
    /// `blockId`, and that it has an object `xml`.
    pub fn from_value(event: &'a Value) -> Option<Self> {
        let Some(object) = event.as_object() else {
            debug!("event is not an object");
            return None;
        };
        let Some(block_id) = object.get("blockId").and_then(Value::as_str) else {
            debug!("event has no string blockId");
            return None;
        };
        let Some(xml) = object.get("xml").and_then(Value::as_object) else {
            debug!(block_id, "event has no xml object");
            return None;
        };
        Some(Self { block_id, xml })
    }

    pub fn block_id(&self) -> &'a str {
        self.block_id
    }

    /// Serialized outer markup of the event's `xml` (its `outerHTML`), if
    /// it is a string.
    pub fn markup(&self) -> Option<&'a str> {
        self.xml.get("outerHTML").and_then(Value::as_str)
    }

    fn require_markup(&self) -> Result<&'a str> {
        self.markup().ok_or_else(|| FlattenError::MissingMarkup {
            block_id: self.block_id.to_string(),
        })
    }
}

/// Convert a block-creation event into the records it introduces.
///
/// # Example
///
/// ```rust
/// use blockdom_core::event::adapt;
/// use serde_json::json;
///
/// let event = json!({
///     "blockId": "a",
///     "xml": { "outerHTML": r#"<block id="a" type="event_whengreenflag"></block>"# },
/// });
/// let blocks = adapt(&event).unwrap().unwrap();
/// assert_eq!(blocks[0].opcode, "event_whengreenflag");
///
/// assert_eq!(adapt(&json!({})).unwrap(), None);
/// ```
pub fn adapt(event: &Value) -> Result<Option<Vec<BlockRecord>>> {
    let Some(event) = CreateEvent::from_value(event) else {
        return Ok(None);
    };
    flatten_str_with(event.require_markup()?, &FlattenOptions::default()).map(Some)
}

/// Event adapter that memoizes markup parsing across events.
#[derive(Debug, Default)]
pub struct EventAdapter {
    cache: ParseCache,
    options: FlattenOptions,
}

impl EventAdapter {
    pub fn new(cache: ParseCache, options: FlattenOptions) -> Self {
        Self { cache, options }
    }

    /// Same contract as [`adapt`], with parsing routed through the cache.
    pub fn adapt(&mut self, event: &Value) -> Result<Option<Vec<BlockRecord>>> {
        let Some(event) = CreateEvent::from_value(event) else {
            return Ok(None);
        };
        let nodes = self.cache.get_or_parse(event.require_markup()?)?;
        let records = flatten_with(&nodes, &self.options)?;
        debug!(
            block_id = event.block_id(),
            records = records.len(),
            "adapted create event"
        );
        Ok(Some(records))
    }

    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ParseCache {
        &mut self.cache
    }

    pub fn options(&self) -> &FlattenOptions {
        &self.options
    }
}
