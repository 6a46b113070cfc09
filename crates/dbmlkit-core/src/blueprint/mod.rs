//! Blueprints: unresolved, name-based records produced by the parser
//!
//! A blueprint holds literal values plus the *names* of anything it refers
//! to. Nothing here points at another entity; linking happens in
//! [`SchemaBuilder`](crate::schema::SchemaBuilder).

use indexmap::IndexMap;

use crate::error::Span;
use crate::schema::QualifiedName;
use crate::types::{DefaultValue, IndexType, Relation};

/// One top-level statement of a document
#[derive(Debug, Clone, PartialEq)]
pub enum Blueprint {
    Table(TableBlueprint),
    Reference(ReferenceBlueprint),
    Enum(EnumBlueprint),
    TableGroup(TableGroupBlueprint),
    Project(ProjectBlueprint),
    StickyNote(StickyNoteBlueprint),
}

impl Blueprint {
    pub fn kind(&self) -> &'static str {
        match self {
            Blueprint::Table(_) => "table",
            Blueprint::Reference(_) => "reference",
            Blueprint::Enum(_) => "enum",
            Blueprint::TableGroup(_) => "table group",
            Blueprint::Project(_) => "project",
            Blueprint::StickyNote(_) => "note",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlueprint {
    pub name: QualifiedName,
    pub alias: Option<String>,
    pub columns: Vec<ColumnBlueprint>,
    pub indexes: Vec<IndexBlueprint>,
    pub note: Option<NoteBlueprint>,
    pub header_color: Option<String>,
    pub comment: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBlueprint {
    pub name: String,
    /// Declared type text, possibly schema-qualified, e.g. `auth.role` or `varchar(64)`
    pub type_name: String,
    pub unique: bool,
    pub not_null: bool,
    pub pk: bool,
    pub autoinc: bool,
    pub default: Option<DefaultValue>,
    pub note: Option<NoteBlueprint>,
    pub comment: Option<String>,
    pub properties: IndexMap<String, String>,
    /// Inline `ref:` settings; side 1 is filled in once the table name is known
    pub refs: Vec<ReferenceBlueprint>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexSubjectBlueprint {
    Column(String),
    Expression(ExpressionBlueprint),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexBlueprint {
    pub subjects: Vec<IndexSubjectBlueprint>,
    pub name: Option<String>,
    pub unique: bool,
    pub pk: bool,
    pub index_type: Option<IndexType>,
    pub note: Option<NoteBlueprint>,
    pub comment: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceBlueprint {
    pub relation: Relation,
    pub name: Option<String>,
    pub table1: Option<QualifiedName>,
    pub col1: Vec<String>,
    pub table2: QualifiedName,
    pub col2: Vec<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
    pub comment: Option<String>,
    pub inline: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumBlueprint {
    pub name: QualifiedName,
    pub items: Vec<EnumItemBlueprint>,
    pub comment: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumItemBlueprint {
    pub name: String,
    pub note: Option<NoteBlueprint>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableGroupBlueprint {
    pub name: String,
    pub items: Vec<QualifiedName>,
    pub color: Option<String>,
    pub note: Option<NoteBlueprint>,
    pub comment: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectBlueprint {
    pub name: String,
    pub items: IndexMap<String, String>,
    pub note: Option<NoteBlueprint>,
    pub comment: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteBlueprint {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionBlueprint {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StickyNoteBlueprint {
    pub name: String,
    pub text: String,
    pub comment: Option<String>,
    pub span: Span,
}
