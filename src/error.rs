//! Error handling for the Markdown engine.
//!
//! Every violation is fatal: the decoder and the encoder stop at the first
//! offending construct and report it. Each variant carries the input fragment
//! that triggered it so callers can pinpoint the source line.

use std::fmt;

/// Main error type for the Markdown engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkdownError {
    /// Too many spaces before, after or inside a construct.
    Whitespace { line: String },

    /// A heading that breaks the strict +1 section nesting.
    Sectioning { line: String },

    /// List indentation that is not a multiple of two spaces.
    Indent { line: String },

    /// A construct that is valid on its own but illegal where it appeared.
    Structure { reason: String, line: String },

    /// The encoder reached a node shape it cannot dispatch.
    Generation { message: String },
}

impl MarkdownError {
    /// Creates a whitespace violation for the given line.
    pub fn whitespace(line: impl Into<String>) -> Self {
        MarkdownError::Whitespace { line: line.into() }
    }

    /// Creates a sectioning violation for the given line.
    pub fn sectioning(line: impl Into<String>) -> Self {
        MarkdownError::Sectioning { line: line.into() }
    }

    /// Creates an indentation violation for the given line.
    pub fn indent(line: impl Into<String>) -> Self {
        MarkdownError::Indent { line: line.into() }
    }

    /// Creates a structural violation for the given line.
    pub fn structure(reason: impl Into<String>, line: impl Into<String>) -> Self {
        MarkdownError::Structure {
            reason: reason.into(),
            line: line.into(),
        }
    }

    /// Creates an encoder error.
    pub fn generation(message: impl Into<String>) -> Self {
        MarkdownError::Generation {
            message: message.into(),
        }
    }
}

impl fmt::Display for MarkdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkdownError::Whitespace { line } => {
                write!(f, "whitespace violation in {:?}", line)
            }
            MarkdownError::Sectioning { line } => {
                write!(f, "invalid sectioning in {:?}", line)
            }
            MarkdownError::Indent { line } => {
                write!(f, "invalid list indent in {:?}", line)
            }
            MarkdownError::Structure { reason, line } => {
                write!(f, "{} in {:?}", reason, line)
            }
            MarkdownError::Generation { message } => {
                write!(f, "generation error: {}", message)
            }
        }
    }
}

impl std::error::Error for MarkdownError {}

/// Convenience type alias for Results in the Markdown engine.
pub type Result<T> = std::result::Result<T, MarkdownError>;
