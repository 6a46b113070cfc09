//! Resolved entities owned by a [`Schema`](super::Schema)
//!
//! Ownership runs downwards: a table owns its columns and indexes. Upward
//! links are plain ids, stamped by the owner when an entity is inserted and
//! cleared when it is removed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, ValidationError};
use crate::types::{ColumnType, DefaultValue, Expression, IndexType};

use super::catalog::{EnumId, TableId};

/// Schema used when a name carries no qualifier
pub const DEFAULT_SCHEMA: &str = "public";

/// `schema.name`, the key used by the schema's name index
pub fn full_name(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub schema: String,
    pub alias: Option<String>,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub note: Option<Note>,
    pub header_color: Option<String>,
    pub comment: Option<String>,
    /// Synthesized tables never receive inline foreign keys
    pub is_abstract: bool,
    pub(crate) id: Option<TableId>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: DEFAULT_SCHEMA.to_string(),
            alias: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            note: None,
            header_color: None,
            comment: None,
            is_abstract: false,
            id: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_note(mut self, text: impl Into<String>) -> Self {
        self.note = Some(Note::new(text));
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Id assigned by the owning schema, `None` while detached
    pub fn id(&self) -> Option<TableId> {
        self.id
    }

    pub fn full_name(&self) -> String {
        full_name(&self.schema, &self.name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Append a column; names are unique within a table
    pub fn add_column(&mut self, mut column: Column) -> Result<(), ValidationError> {
        if self.column(&column.name).is_some() {
            return Err(ValidationError::DuplicateColumn {
                table: self.full_name(),
                column: column.name,
            });
        }
        column.table = self.id;
        self.columns.push(column);
        Ok(())
    }

    pub fn delete_column(&mut self, name: &str) -> Result<Column, ResolveError> {
        let position = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| ResolveError::ColumnNotFound {
                table: self.full_name(),
                column: name.to_string(),
            })?;
        let mut column = self.columns.remove(position);
        column.table = None;
        Ok(column)
    }

    /// Append an index; every column subject must belong to this table
    pub fn add_index(&mut self, mut index: Index) -> Result<(), ValidationError> {
        for subject in &index.subjects {
            if let IndexSubject::Column(name) = subject {
                if self.column(name).is_none() {
                    return Err(ValidationError::ColumnNotInTable {
                        table: self.full_name(),
                        column: name.clone(),
                    });
                }
            }
        }
        index.table = self.id;
        self.indexes.push(index);
        Ok(())
    }

    /// Remove a named index
    pub fn delete_index(&mut self, name: &str) -> Result<Index, ResolveError> {
        let position = self
            .indexes
            .iter()
            .position(|i| i.name.as_deref() == Some(name))
            .ok_or_else(|| ResolveError::IndexNotFound {
                table: self.full_name(),
                index: name.to_string(),
            })?;
        let mut index = self.indexes.remove(position);
        index.table = None;
        Ok(index)
    }

    pub fn pk_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.pk)
    }

    /// More than one column carries the `pk` flag
    pub fn has_composite_pk(&self) -> bool {
        self.pk_columns().count() > 1
    }

    pub(crate) fn attach(&mut self, id: TableId) {
        self.id = Some(id);
        for column in &mut self.columns {
            column.table = Some(id);
        }
        for index in &mut self.indexes {
            index.table = Some(id);
        }
    }

    pub(crate) fn detach(&mut self) {
        self.id = None;
        for column in &mut self.columns {
            column.table = None;
        }
        for index in &mut self.indexes {
            index.table = None;
        }
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub unique: bool,
    pub not_null: bool,
    pub pk: bool,
    pub autoinc: bool,
    pub default: Option<DefaultValue>,
    pub note: Option<Note>,
    pub comment: Option<String>,
    /// Settings without a dedicated field, in source order
    pub properties: IndexMap<String, String>,
    pub(crate) table: Option<TableId>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: impl Into<ColumnType>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            unique: false,
            not_null: false,
            pk: false,
            autoinc: false,
            default: None,
            note: None,
            comment: None,
            properties: IndexMap::new(),
            table: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.pk = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn increment(mut self) -> Self {
        self.autoinc = true;
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_note(mut self, text: impl Into<String>) -> Self {
        self.note = Some(Note::new(text));
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Owning table, once the table is part of a schema
    pub fn table(&self) -> Option<TableId> {
        self.table
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexSubject {
    /// Column of the owning table
    Column(String),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub subjects: Vec<IndexSubject>,
    pub name: Option<String>,
    pub unique: bool,
    pub index_type: Option<IndexType>,
    pub pk: bool,
    pub note: Option<Note>,
    pub comment: Option<String>,
    pub(crate) table: Option<TableId>,
}

impl Index {
    pub fn new(subjects: Vec<IndexSubject>) -> Self {
        Self {
            subjects,
            name: None,
            unique: false,
            index_type: None,
            pk: false,
            note: None,
            comment: None,
            table: None,
        }
    }

    /// Index over plain columns
    pub fn on_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            columns
                .into_iter()
                .map(|c| IndexSubject::Column(c.into()))
                .collect(),
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, index_type: IndexType) -> Self {
        self.index_type = Some(index_type);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.pk = true;
        self
    }

    pub fn table(&self) -> Option<TableId> {
        self.table
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumItem {
    pub name: String,
    pub note: Option<Note>,
    pub comment: Option<String>,
}

impl EnumItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            note: None,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    pub schema: String,
    pub items: Vec<EnumItem>,
    pub comment: Option<String>,
    pub(crate) id: Option<EnumId>,
}

impl Enum {
    pub fn new<I, S>(name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            schema: DEFAULT_SCHEMA.to_string(),
            items: items.into_iter().map(EnumItem::new).collect(),
            comment: None,
            id: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn id(&self) -> Option<EnumId> {
        self.id
    }

    pub fn full_name(&self) -> String {
        full_name(&self.schema, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableGroup {
    pub name: String,
    pub tables: Vec<TableId>,
    pub color: Option<String>,
    pub note: Option<Note>,
    pub comment: Option<String>,
}

impl TableGroup {
    pub fn new(name: impl Into<String>, tables: Vec<TableId>) -> Self {
        Self {
            name: name.into(),
            tables,
            color: None,
            note: None,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub items: IndexMap<String, String>,
    pub note: Option<Note>,
    pub comment: Option<String>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: IndexMap::new(),
            note: None,
            comment: None,
        }
    }
}

/// Free-standing named note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNote {
    pub name: String,
    pub text: String,
    pub comment: Option<String>,
}

impl StickyNote {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            comment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_column_rejects_duplicates() {
        let mut table = Table::new("users");
        table.add_column(Column::new("id", "int")).unwrap();
        let err = table.add_column(Column::new("id", "bigint")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateColumn {
                table: "public.users".into(),
                column: "id".into()
            }
        );
        assert_eq!(table.columns.len(), 1);
    }

    #[test]
    fn test_add_index_checks_columns() {
        let mut table = Table::new("users");
        table.add_column(Column::new("email", "text")).unwrap();
        table
            .add_index(Index::on_columns(["email"]).unique())
            .unwrap();
        let err = table.add_index(Index::on_columns(["missing"])).unwrap_err();
        assert!(matches!(err, ValidationError::ColumnNotInTable { .. }));

        let expression = Index::new(vec![IndexSubject::Expression(Expression::new("lower(email)"))]);
        assert!(table.add_index(expression).is_ok());
        assert_eq!(table.indexes.len(), 2);
    }

    #[test]
    fn test_delete_index_by_name() {
        let mut table = Table::new("t");
        table.add_column(Column::new("a", "int")).unwrap();
        table
            .add_index(Index::on_columns(["a"]).with_name("a_idx"))
            .unwrap();
        assert!(table.delete_index("a_idx").is_ok());
        assert_eq!(
            table.delete_index("a_idx").unwrap_err(),
            ResolveError::IndexNotFound {
                table: "public.t".into(),
                index: "a_idx".into()
            }
        );
    }

    #[test]
    fn test_composite_pk() {
        let mut table = Table::new("t");
        table.add_column(Column::new("a", "int").primary_key()).unwrap();
        assert!(!table.has_composite_pk());
        table.add_column(Column::new("b", "int").primary_key()).unwrap();
        assert!(table.has_composite_pk());
    }
}
