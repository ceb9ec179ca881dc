//! # blockdom core
//!
//! Converts the markup a drag-and-drop block editor emits when blocks are
//! created into a flat, id-indexed representation a block runtime can
//! execute.
//!
//! Nested `<value>`, `<statement>`, `<next>` and `<field>` markup under each
//! top-level `<block>` becomes a set of [`BlockRecord`]s linked by id. Where
//! an input slot holds both a real `<block>` and its `<shadow>` placeholder,
//! the real block wins.
//!
//! ## Quick Start
//!
//! ```rust
//! use blockdom_core::flatten_str;
//!
//! let markup = r#"<block id="a" type="event_whengreenflag">
//!   <next><block id="b" type="motion_movesteps">
//!     <value name="STEPS"><shadow id="s" type="math_number">
//!       <field name="NUM">10</field>
//!     </shadow></value>
//!   </block></next>
//! </block>"#;
//!
//! let blocks = flatten_str(markup).unwrap();
//! assert_eq!(blocks.len(), 3);
//! assert_eq!(blocks[0].next.as_deref(), Some("b"));
//! assert_eq!(blocks[1].input("STEPS").map(|i| i.block.as_str()), Some("s"));
//! assert!(!blocks[2].top_level);
//! ```
//!
//! ## Events
//!
//! ```rust
//! use blockdom_core::EventAdapter;
//! use serde_json::json;
//!
//! let mut adapter = EventAdapter::default();
//! let event = json!({ "blockId": "a", "xml": { "outerHTML": "<block id=\"a\" type=\"x\"/>" } });
//!
//! assert_eq!(adapter.adapt(&event).unwrap().map(|b| b.len()), Some(1));
//! // Not a creation event: nothing to do, and not an error.
//! assert_eq!(adapter.adapt(&json!({ "blockId": 1, "xml": {} })).unwrap(), None);
//! ```

pub mod block;
pub mod cache;
pub mod error;
pub mod event;
pub mod flatten;
pub mod markup;
pub mod node;
pub mod span;

pub use block::{BlockRecord, Field, Input};
pub use cache::{CacheStats, ParseCache};
pub use error::{ErrorKind, FlattenError, Result};
pub use event::{adapt, CreateEvent, EventAdapter};
pub use flatten::{flatten, flatten_str, flatten_str_with, flatten_with, FlattenOptions, Flattener};
pub use markup::parse_fragment;
pub use node::{Attribute, Element, Node, Text};
pub use span::Span;
