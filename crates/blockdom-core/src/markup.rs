//! Markup tree supplier.
//!
//! Turns raw editor markup into the generic [`Node`] tree. Parsing is done
//! by `roxmltree`; this module only adapts its output to the owned node
//! model and makes fragments (several sibling roots, stray text) acceptable.
//!
//! The editor hands us the serialized outer markup of whatever it created,
//! which is usually a single `<block>` or an `<xml>` container but is not
//! guaranteed to be a well-formed document on its own. The input is wrapped
//! in a synthetic container element before parsing; the container's children
//! are what callers get back.
//!
//! Editors serialize with the HTML algorithm, which escapes U+00A0 as
//! `&nbsp;`. Every other entity it emits is predefined in XML, so the wrapper
//! declares just that one. Other HTML leniencies (unclosed tags, close tags
//! whose case differs from the open tag) are still markup errors.

use memchr::memmem;
use roxmltree::{Document, NodeType, ParsingOptions};
use tracing::debug;

use crate::error::{FlattenError, Result};
use crate::node::{Attribute, Element, Node, Text};
use crate::span::Span;

const FRAGMENT_OPEN: &str =
    "<!DOCTYPE blockdom-fragment [<!ENTITY nbsp \"\u{a0}\">]><blockdom-fragment>";
const FRAGMENT_CLOSE: &str = "</blockdom-fragment>";

/// Parse a markup fragment into its top-level nodes.
///
/// Element and attribute names are reported by local name (namespace
/// prefixes and `xmlns` declarations are dropped), entities are decoded, and
/// all spans are byte offsets into `input`.
///
/// # Example
///
/// ```rust
/// use blockdom_core::markup::parse_fragment;
///
/// let nodes = parse_fragment(r#"<block id="a" type="x"/><block id="b" type="y"/>"#).unwrap();
/// assert_eq!(nodes.len(), 2);
/// assert_eq!(nodes[1].as_element().and_then(|e| e.attr("id")), Some("b"));
/// ```
pub fn parse_fragment(input: &str) -> Result<Vec<Node>> {
    let body_start = declaration_end(input);
    let body = &input[body_start..];

    let mut wrapped =
        String::with_capacity(FRAGMENT_OPEN.len() + body.len() + FRAGMENT_CLOSE.len());
    wrapped.push_str(FRAGMENT_OPEN);
    wrapped.push_str(body);
    wrapped.push_str(FRAGMENT_CLOSE);

    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    let document = Document::parse_with_options(&wrapped, options)
        .map_err(|e| FlattenError::markup(e.to_string()))?;
    let offsets = Offsets {
        wrapper: FRAGMENT_OPEN.len(),
        body: body_start,
    };

    let nodes: Vec<Node> = document
        .root_element()
        .children()
        .filter_map(|child| convert(child, &offsets))
        .collect();

    debug!(bytes = input.len(), roots = nodes.len(), "parsed markup fragment");
    Ok(nodes)
}

/// Byte offset just past a leading `<?xml ...?>` declaration, or 0.
///
/// A declaration is only legal at the very start of a document, so it has
/// to go before the fragment is wrapped.
fn declaration_end(input: &str) -> usize {
    let trimmed = input.trim_start();
    if !trimmed.starts_with("<?xml") {
        return 0;
    }
    let leading = input.len() - trimmed.len();
    match memmem::find(trimmed.as_bytes(), b"?>") {
        Some(pos) => leading + pos + 2,
        None => 0,
    }
}

/// Maps positions in the wrapped text back to the caller's input.
struct Offsets {
    wrapper: usize,
    body: usize,
}

impl Offsets {
    fn span(&self, range: std::ops::Range<usize>) -> Span {
        let map = |pos: usize| pos.saturating_sub(self.wrapper) + self.body;
        Span::from_range(map(range.start)..map(range.end))
    }
}

fn convert(node: roxmltree::Node<'_, '_>, offsets: &Offsets) -> Option<Node> {
    match node.node_type() {
        NodeType::Element => {
            let attributes = node
                .attributes()
                .map(|attr| Attribute {
                    name: attr.name().to_string(),
                    value: attr.value().to_string(),
                })
                .collect();
            let children = node
                .children()
                .filter_map(|child| convert(child, offsets))
                .collect();
            Some(Node::Element(Element {
                tag_name: node.tag_name().name().to_string(),
                attributes,
                children,
                span: offsets.span(node.range()),
            }))
        }
        NodeType::Text => Some(Node::Text(Text {
            content: node.text().unwrap_or_default().to_string(),
            span: offsets.span(node.range()),
        })),
        NodeType::Comment => Some(Node::Comment(Text {
            content: node.text().unwrap_or_default().to_string(),
            span: offsets.span(node.range()),
        })),
        NodeType::Root | NodeType::PI => None,
    }
}
