//! Generic markup tree handed to the flattener.
//!
//! The tree is deliberately loose: it is whatever the markup supplier saw,
//! with no knowledge of blocks, fields or inputs. Only elements have a tag
//! name and attributes; text and comments are leaves that the flattener
//! skips when it scans for element children.

use crate::span::Span;

/// A node in a parsed markup fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Text),
}

/// Character data of a text or comment node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub content: String,
    pub span: Span,
}

/// A single `name="value"` pair on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// A markup element with its attributes and ordered children.
///
/// Tag names are stored exactly as written; use [`Element::is`] to compare
/// them, since the editor's markup is matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag_name: String,
    /// Attributes in source order.
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub span: Span,
}

impl Node {
    /// Create a text node with an empty span.
    pub fn text_node(content: impl Into<String>) -> Self {
        Node::Text(Text {
            content: content.into(),
            span: Span::default(),
        })
    }

    #[inline]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) | Node::Comment(_) => None,
        }
    }

    /// Tag name of an element; `None` for text and comments.
    #[inline]
    pub fn tag_name(&self) -> Option<&str> {
        self.as_element().map(|element| element.tag_name.as_str())
    }

    /// Character data of a text node.
    ///
    /// Elements and comments have no text of their own and return `None`.
    #[inline]
    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(&text.content),
            Node::Element(_) | Node::Comment(_) => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Element(element) => element.span,
            Node::Text(text) | Node::Comment(text) => text.span,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl Element {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(mut self, content: impl Into<String>) -> Self {
        self.children.push(Node::text_node(content));
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Case-insensitive tag comparison.
    #[inline]
    pub fn is(&self, tag_name: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag_name)
    }

    /// Value of the first attribute called `name` (ASCII case-insensitive).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
            .map(|attr| attr.value.as_str())
    }

    /// Element children in document order, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First element child with the given tag.
    pub fn first_element(&self, tag_name: &str) -> Option<&Element> {
        self.elements().find(|element| element.is(tag_name))
    }
}
