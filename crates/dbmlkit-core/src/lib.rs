//! dbmlkit-core: DBML schema library
//!
//! This library parses DBML schema definitions into an editable [`Schema`]
//! and renders it as SQL DDL or canonical DBML.

pub mod blueprint;
pub mod error;
pub mod parser;
pub mod render;
pub mod schema;
pub mod types;

use std::io::Read;
use std::path::Path;

pub use error::{Error, RenderError, ResolveError, Result, Span, SyntaxError, ValidationError};
pub use render::{DbmlRenderer, Entity, NoteParent, Renderer, SqlRenderer, Target};
pub use schema::{
    Column, ColumnRef, Enum, EnumItem, Index, IndexSubject, Note, Project, QualifiedName,
    Reference, Schema, SchemaBuilder, StickyNote, Table, TableGroup,
};
pub use types::{ColumnType, DefaultValue, Expression, IndexType, Relation};

/// Parse and resolve DBML source text
pub fn parse_str(source: &str) -> Result<Schema> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut builder = SchemaBuilder::new();
    builder.parse(source)?;
    builder.build()
}

/// Read DBML from any reader, decoded as UTF-8
pub fn parse_reader(mut reader: impl Read) -> Result<Schema> {
    let mut source = String::new();
    reader.read_to_string(&mut source)?;
    parse_str(&source)
}

pub fn parse_file(path: impl AsRef<Path>) -> Result<Schema> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "reading schema file");
    let source = std::fs::read_to_string(path)?;
    parse_str(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let schema = parse_str("\u{feff}Table t { id int }").unwrap();
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_parse_reader() {
        let schema = parse_reader("Table t { id int }".as_bytes()).unwrap();
        assert!(schema.table("t").is_some());
    }

    #[test]
    fn test_invalid_utf8_is_io_error() {
        let bytes: &[u8] = &[0xff, 0xfe, 0x00];
        assert!(matches!(parse_reader(bytes), Err(Error::Io(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            parse_file("/nonexistent/schema.dbml"),
            Err(Error::Io(_))
        ));
    }
}
