//! Error types
//!
//! Every failure in the pipeline falls into one of four families:
//! syntax errors from the grammar, resolution errors from the linking pass,
//! validation errors from the schema mutation API and rendering errors raised
//! when a single entity is turned into text. [`Error`] wraps all of them for
//! the top-level entry points.

use miette::SourceSpan;
use serde::{Deserialize, Serialize};

/// Source location span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset from start of source
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters)
    pub column: usize,
}

impl Span {
    pub fn new(offset: usize, length: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            length,
            line,
            column,
        }
    }

    /// Span covering `self` through the end of `other`
    pub fn to(self, other: Span) -> Self {
        let end = (other.offset + other.length).max(self.offset + self.length);
        Self {
            offset: self.offset,
            length: end - self.offset,
            line: self.line,
            column: self.column,
        }
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.offset.into(), span.length)
    }
}

/// Grammar mismatch. There is no recovery: the first one aborts the parse.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
#[error("{message} at line {line}, column {column}", line = .span.line, column = .span.column)]
#[diagnostic(code(dbmlkit::syntax))]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    #[source_code]
    pub source_code: String,
    #[label("here")]
    pub location: SourceSpan,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span, source: &str) -> Self {
        Self {
            message: message.into(),
            span,
            source_code: source.to_string(),
            location: span.into(),
        }
    }
}

/// A name used in the document does not resolve to a declared entity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },
    #[error("index '{index}' not found in table '{table}'")]
    IndexNotFound { table: String, index: String },
}

/// Rejected mutation of a [`Schema`](crate::schema::Schema) or one of its tables.
/// The target is left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("table '{0}' is already defined")]
    DuplicateTable(String),
    #[error("alias '{0}' is already used by another table")]
    DuplicateAlias(String),
    #[error("column '{column}' is already defined in table '{table}'")]
    DuplicateColumn { table: String, column: String },
    #[error("enum '{0}' is already defined")]
    DuplicateEnum(String),
    #[error("table group '{0}' is already defined")]
    DuplicateTableGroup(String),
    #[error("reference {0} is already defined")]
    DuplicateReference(String),
    #[error("column '{column}' does not belong to table '{table}'")]
    ColumnNotInTable { table: String, column: String },
    #[error("reference side {side} has no columns")]
    EmptyReferenceSide { side: u8 },
    #[error("reference side {side} mixes columns from several tables")]
    MixedTables { side: u8 },
    #[error("reference sides have different column counts ({left} vs {right})")]
    ColumnCountMismatch { left: usize, right: usize },
    #[error("{0} does not belong to this schema")]
    NotInSchema(String),
    #[error("enum '{0}' is still used as a column type")]
    EnumInUse(String),
}

/// Failure while turning a single entity into text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("cannot render {entity}: required attribute '{attribute}' is not set")]
    MissingAttribute {
        entity: &'static str,
        attribute: &'static str,
    },
    #[error("composite references cannot be rendered inline")]
    CompositeInlineReference,
    #[error("{entity} cannot be rendered as {target}")]
    Unsupported {
        entity: &'static str,
        target: &'static str,
    },
    #[error("{0} is not part of the schema being rendered")]
    Dangling(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Any failure of the parse → build → render pipeline
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    #[diagnostic(code(dbmlkit::resolve))]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    #[diagnostic(code(dbmlkit::validation))]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    #[diagnostic(code(dbmlkit::render))]
    Render(#[from] RenderError),
    #[error("failed to read input: {0}")]
    #[diagnostic(code(dbmlkit::io))]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
