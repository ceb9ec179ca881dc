//! Failures raised while turning markup into block records.
//!
//! Input-shape rejection of an event is *not* an error and never shows up
//! here; see [`crate::event`]. A well-shaped event without markup is. Everything in this module is fatal to the
//! conversion call that produced it.

use thiserror::Error;

use crate::span::Span;

/// Shorthand for results carrying a [`FlattenError`].
pub type Result<T> = std::result::Result<T, FlattenError>;

/// Error categories, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The markup text could not be parsed at all.
    Markup,
    /// A creation event carried no string markup payload.
    MissingMarkup,
    /// A dereferenced attribute (`id`, `type`, `name`) was absent.
    MissingAttribute,
    /// A `<field>` had no text to read its value from.
    MissingFieldText,
    /// A `<value>`, `<statement>` or `<next>` held neither `<block>` nor `<shadow>`.
    MissingChildBlock,
    /// The configured nesting limit was exceeded.
    DepthLimit,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Markup => "markup",
            ErrorKind::MissingMarkup => "missing-markup",
            ErrorKind::MissingAttribute => "missing-attribute",
            ErrorKind::MissingFieldText => "missing-field-text",
            ErrorKind::MissingChildBlock => "missing-child-block",
            ErrorKind::DepthLimit => "depth-limit",
        }
    }
}

/// A malformed-markup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlattenError {
    #[error("malformed markup: {message}")]
    Markup { message: String },

    #[error("create event for block `{block_id}` has no string xml.outerHTML")]
    MissingMarkup { block_id: String },

    #[error("<{tag}> is missing required attribute `{attribute}` (at {span})")]
    MissingAttribute {
        tag: String,
        attribute: &'static str,
        span: Span,
    },

    #[error("<field name=\"{name}\"> has no text content (at {span})")]
    MissingFieldText { name: String, span: Span },

    #[error("{} has no nested <block> or <shadow> (at {span})", describe(.tag, .name.as_deref()))]
    MissingChildBlock {
        tag: String,
        name: Option<String>,
        span: Span,
    },

    #[error("block nesting depth {depth} exceeds the limit of {limit} (at {span})")]
    DepthLimit {
        depth: usize,
        limit: usize,
        span: Span,
    },
}

impl FlattenError {
    pub fn markup(message: impl Into<String>) -> Self {
        FlattenError::Markup {
            message: message.into(),
        }
    }

    pub fn missing_attribute(tag: &str, attribute: &'static str, span: Span) -> Self {
        FlattenError::MissingAttribute {
            tag: tag.to_string(),
            attribute,
            span,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FlattenError::Markup { .. } => ErrorKind::Markup,
            FlattenError::MissingMarkup { .. } => ErrorKind::MissingMarkup,
            FlattenError::MissingAttribute { .. } => ErrorKind::MissingAttribute,
            FlattenError::MissingFieldText { .. } => ErrorKind::MissingFieldText,
            FlattenError::MissingChildBlock { .. } => ErrorKind::MissingChildBlock,
            FlattenError::DepthLimit { .. } => ErrorKind::DepthLimit,
        }
    }

    /// Location of the offending element, when the failure has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            FlattenError::Markup { .. } | FlattenError::MissingMarkup { .. } => None,
            FlattenError::MissingAttribute { span, .. }
            | FlattenError::MissingFieldText { span, .. }
            | FlattenError::MissingChildBlock { span, .. }
            | FlattenError::DepthLimit { span, .. } => Some(*span),
        }
    }
}

fn describe(tag: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("<{tag} name=\"{name}\">"),
        None => format!("<{tag}>"),
    }
}
