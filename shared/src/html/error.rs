use thiserror::Error;

/// Errors produced while scanning component markup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HtmlError {
    /// A tag was opened with '<' but never closed with '>'
    #[error("Unterminated tag starting at byte {offset}")]
    UnterminatedTag { offset: usize },
    /// A comment was opened with '<!--' but never closed
    #[error("Unterminated comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },
    /// A `script` or `style` element has no closing tag
    #[error("<{name}> starting at byte {offset} is never closed")]
    UnclosedRawText { name: String, offset: usize },
    /// A component rendered no element at all
    #[error("Component markup has no root element")]
    NoRoot,
    /// A component rendered more than one top-level element
    #[error("Component markup must have exactly one root element, found '{first}' and '{second}'")]
    MultipleRoots { first: String, second: String },
    /// The root element is never closed
    #[error("Root element <{name}> is never closed")]
    UnclosedRoot { name: String },
    /// The root element is a void element and can't hold the component's scripts
    #[error("Root element <{name}> can't have children")]
    VoidRoot { name: String },
}
