//! Rendering of a resolved [`Schema`] into text
//!
//! Each target implements [`Renderer`]: one entry point per [`Entity`] and
//! one for the whole schema. Entities are a closed enum, so every renderer
//! handles every kind explicitly.

mod dbml;
mod sql;

use std::fmt;
use std::str::FromStr;

use crate::error::RenderError;
use crate::schema::{
    Column, Enum, EnumItem, Index, Note, Project, Reference, Schema, StickyNote, Table, TableGroup,
    DEFAULT_SCHEMA,
};

pub use dbml::DbmlRenderer;
pub use sql::SqlRenderer;

/// Output strategy for a schema. A [`Schema`] can carry its own instance,
/// see [`Schema::set_sql_renderer`].
pub trait Renderer: fmt::Debug + Send + Sync {
    /// Render a single entity in the context of the schema that owns it
    fn render(&self, schema: &Schema, entity: Entity<'_>) -> Result<String, RenderError>;

    /// Render every entity of the schema as one document
    fn render_schema(&self, schema: &Schema) -> Result<String, RenderError>;
}

/// Borrowed view of anything a renderer can emit
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Table(&'a Table),
    Column {
        table: &'a Table,
        column: &'a Column,
    },
    Index {
        table: &'a Table,
        index: &'a Index,
    },
    Reference(&'a Reference),
    Enum(&'a Enum),
    EnumItem(&'a EnumItem),
    TableGroup(&'a TableGroup),
    Project(&'a Project),
    Note {
        note: &'a Note,
        parent: NoteParent<'a>,
    },
    StickyNote(&'a StickyNote),
}

impl Entity<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Table(_) => "table",
            Entity::Column { .. } => "column",
            Entity::Index { .. } => "index",
            Entity::Reference(_) => "reference",
            Entity::Enum(_) => "enum",
            Entity::EnumItem(_) => "enum item",
            Entity::TableGroup(_) => "table group",
            Entity::Project(_) => "project",
            Entity::Note { .. } => "note",
            Entity::StickyNote(_) => "sticky note",
        }
    }
}

/// What a note is attached to; SQL only has comment syntax for tables and
/// columns.
#[derive(Debug, Clone, Copy)]
pub enum NoteParent<'a> {
    Table(&'a Table),
    Column { table: &'a Table, column: &'a Column },
    Index(&'a Index),
    EnumItem(&'a EnumItem),
    TableGroup(&'a TableGroup),
    Project(&'a Project),
}

/// Output format selectable from the command line and configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    #[default]
    Sql,
    Dbml,
    Json,
}

impl Target {
    pub fn extension(&self) -> &'static str {
        match self {
            Target::Sql => "sql",
            Target::Dbml => "dbml",
            Target::Json => "json",
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sql" | "ddl" => Ok(Target::Sql),
            "dbml" => Ok(Target::Dbml),
            "json" => Ok(Target::Json),
            _ => Err(format!(
                "Unknown target: '{}'. Supported targets: sql, dbml, json.",
                s
            )),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Fail unless the attribute holds a non-empty value
pub(crate) fn require(
    entity: &'static str,
    attribute: &'static str,
    present: bool,
) -> Result<(), RenderError> {
    if present {
        Ok(())
    } else {
        Err(RenderError::MissingAttribute { entity, attribute })
    }
}

pub(crate) fn require_name(entity: &'static str, name: &str) -> Result<(), RenderError> {
    require(entity, "name", !name.is_empty())
}

/// Attributes every target needs before a table can be emitted
pub(crate) fn check_table(table: &Table) -> Result<(), RenderError> {
    require_name("table", &table.name)?;
    require("table", "columns", !table.columns.is_empty())?;
    for column in &table.columns {
        check_column(column)?;
    }
    for index in &table.indexes {
        require("index", "subjects", !index.subjects.is_empty())?;
    }
    Ok(())
}

pub(crate) fn check_column(column: &Column) -> Result<(), RenderError> {
    require_name("column", &column.name)?;
    let typed = column.column_type.as_raw().map_or(true, |t| !t.is_empty());
    require("column", "type", typed)
}

pub(crate) fn check_enum(enumeration: &Enum) -> Result<(), RenderError> {
    require_name("enum", &enumeration.name)?;
    require("enum", "items", !enumeration.items.is_empty())?;
    for item in &enumeration.items {
        require_name("enum item", &item.name)?;
    }
    Ok(())
}

pub(crate) fn check_reference(reference: &Reference) -> Result<(), RenderError> {
    require("reference", "col1", !reference.col1.is_empty())?;
    require("reference", "col2", !reference.col2.is_empty())
}

/// Prefix every line of `text`
pub(crate) fn comment_lines(prefix: &str, text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                prefix.trim_end().to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indent every non-empty line by `width` spaces
pub(crate) fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `"schema"."name"`, leaving out the default schema
pub(crate) fn qualified(schema: &str, name: &str, quote: fn(&str) -> String) -> String {
    if schema == DEFAULT_SCHEMA {
        quote(name)
    } else {
        format!("{}.{}", quote(schema), quote(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_lines() {
        assert_eq!(comment_lines("-- ", "one\n\ntwo"), "-- one\n--\n-- two");
    }

    #[test]
    fn test_indent_skips_blank_lines() {
        assert_eq!(indent("a\n\nb", 2), "  a\n\n  b");
    }

    #[test]
    fn test_target_parse() {
        assert_eq!("SQL".parse::<Target>().unwrap(), Target::Sql);
        assert_eq!("dbml".parse::<Target>().unwrap(), Target::Dbml);
        assert!("yaml".parse::<Target>().is_err());
    }

    #[test]
    fn test_missing_attribute() {
        let table = crate::schema::Table::new("");
        assert_eq!(
            check_table(&table).unwrap_err(),
            RenderError::MissingAttribute {
                entity: "table",
                attribute: "name"
            }
        );
        let empty = crate::schema::Table::new("t");
        assert_eq!(
            check_table(&empty).unwrap_err(),
            RenderError::MissingAttribute {
                entity: "table",
                attribute: "columns"
            }
        );
    }
}
