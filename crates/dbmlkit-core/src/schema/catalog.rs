//! Schema catalog - the resolved, linked model and its mutation API

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, ResolveError, ValidationError};
use crate::render::{DbmlRenderer, Renderer, SqlRenderer};
use crate::types::ColumnType;

use super::model::{
    full_name, Column, Enum, Project, StickyNote, Table, TableGroup, DEFAULT_SCHEMA,
};
use super::reference::{ColumnRef, Reference};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(usize);

        impl $name {
            pub fn new(raw: usize) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Handle of a table inside one [`Schema`]
    TableId,
    "table"
);
entity_id!(
    /// Handle of an enum inside one [`Schema`]
    EnumId,
    "enum"
);
entity_id!(
    /// Handle of a reference inside one [`Schema`]
    ReferenceId,
    "ref"
);

/// Qualified name (schema.table or just table)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Parse from a dotted name like "schema.table" or just "table"
    pub fn parse(s: &str) -> Self {
        if let Some((schema, name)) = s.split_once('.') {
            Self::with_schema(schema, name)
        } else {
            Self::new(s)
        }
    }

    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}.{}", schema, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Key accepted by [`Schema::table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKey<'a> {
    /// Position in insertion order
    Position(usize),
    /// Alias, `schema.name`, or a bare name in the default schema
    Name(&'a str),
}

impl From<usize> for TableKey<'_> {
    fn from(position: usize) -> Self {
        TableKey::Position(position)
    }
}

impl<'a> From<&'a str> for TableKey<'a> {
    fn from(name: &'a str) -> Self {
        TableKey::Name(name)
    }
}

/// Any top-level entity, for the untyped [`Schema::add`]
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Table(Table),
    Reference(Reference),
    Enum(Enum),
    TableGroup(TableGroup),
    Project(Project),
    StickyNote(StickyNote),
}

/// Handle returned by [`Schema::add`] and accepted by [`Schema::delete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementId {
    Table(TableId),
    Reference(ReferenceId),
    Enum(EnumId),
    TableGroup(String),
    Project,
    StickyNote(String),
}

/// Root of the resolved model.
///
/// Tables, enums and references live in insertion-ordered arenas keyed by
/// id. The schema keeps the name and alias indexes in sync on every add or
/// delete; changing a table's name field directly bypasses them, so renames
/// go through [`Schema::rename_table`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    tables: IndexMap<TableId, Table>,
    /// `schema.name` -> table
    names: IndexMap<String, TableId>,
    aliases: IndexMap<String, TableId>,
    enums: IndexMap<EnumId, Enum>,
    references: IndexMap<ReferenceId, Reference>,
    table_groups: Vec<TableGroup>,
    sticky_notes: Vec<StickyNote>,
    project: Option<Project>,
    next_id: usize,
    #[serde(skip)]
    sql_renderer: Option<Arc<dyn Renderer>>,
    #[serde(skip)]
    dbml_renderer: Option<Arc<dyn Renderer>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- tables ---------------------------------------------------------

    /// Insert a table. Its full name must be new, and its alias must not
    /// collide with any table name or alias.
    pub fn add_table(&mut self, mut table: Table) -> Result<TableId, ValidationError> {
        let full = table.full_name();
        if self.names.contains_key(&full) {
            return Err(ValidationError::DuplicateTable(full));
        }
        if self.aliases.contains_key(&table.name) {
            return Err(ValidationError::DuplicateAlias(table.name.clone()));
        }
        if let Some(alias) = &table.alias {
            let taken = self.aliases.contains_key(alias)
                || self.tables.values().any(|t| &t.name == alias);
            if taken {
                return Err(ValidationError::DuplicateAlias(alias.clone()));
            }
        }

        let id = TableId(self.next_id());
        table.attach(id);
        self.names.insert(full, id);
        if let Some(alias) = &table.alias {
            self.aliases.insert(alias.clone(), id);
        }
        self.tables.insert(id, table);
        tracing::trace!(table = %id, "added table");
        Ok(id)
    }

    /// Remove a table together with every reference touching it and its
    /// membership in table groups.
    pub fn delete_table(&mut self, id: TableId) -> Result<Table, ValidationError> {
        let mut table = self
            .tables
            .shift_remove(&id)
            .ok_or_else(|| ValidationError::NotInSchema(id.to_string()))?;

        self.names.shift_remove(&table.full_name());
        if let Some(alias) = &table.alias {
            self.aliases.shift_remove(alias);
        }
        self.references.retain(|_, r| !r.touches(id));
        for group in &mut self.table_groups {
            group.tables.retain(|t| *t != id);
        }

        table.detach();
        Ok(table)
    }

    /// Rename a table, keeping the name index in sync
    pub fn rename_table(
        &mut self,
        id: TableId,
        name: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let name = name.into();
        let table = self
            .tables
            .get(&id)
            .ok_or_else(|| ValidationError::NotInSchema(id.to_string()))?;
        let old = table.full_name();
        let new = full_name(&table.schema, &name);
        if old == new {
            return Ok(());
        }
        if self.names.contains_key(&new) {
            return Err(ValidationError::DuplicateTable(new));
        }
        if self.aliases.contains_key(&name) {
            return Err(ValidationError::DuplicateAlias(name));
        }

        self.names.shift_remove(&old);
        self.names.insert(new, id);
        if let Some(table) = self.tables.get_mut(&id) {
            table.name = name;
        }
        Ok(())
    }

    /// Find a table by alias first, then by `schema.name`
    pub fn locate_table(&self, schema: Option<&str>, name: &str) -> Result<TableId, ResolveError> {
        if schema.is_none() {
            if let Some(id) = self.aliases.get(name) {
                return Ok(*id);
            }
        }
        let full = full_name(schema.unwrap_or(DEFAULT_SCHEMA), name);
        self.names.get(&full).copied().ok_or_else(|| {
            ResolveError::TableNotFound(match schema {
                Some(schema) => format!("{}.{}", schema, name),
                None => name.to_string(),
            })
        })
    }

    /// Uniform lookup by position, alias or name
    pub fn table<'k>(&self, key: impl Into<TableKey<'k>>) -> Option<&Table> {
        match key.into() {
            TableKey::Position(position) => self.tables.get_index(position).map(|(_, t)| t),
            TableKey::Name(name) => {
                let qualified = QualifiedName::parse(name);
                self.locate_table(qualified.schema.as_deref(), &qualified.name)
                    .ok()
                    .or_else(|| self.names.get(name).copied())
                    .and_then(|id| self.tables.get(&id))
            }
        }
    }

    pub fn table_by_id(&self, id: TableId) -> Option<&Table> {
        self.tables.get(&id)
    }

    /// Mutable access to a table. Use [`Schema::rename_table`] to rename.
    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.get_mut(&id)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_ids(&self) -> impl Iterator<Item = TableId> + '_ {
        self.tables.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub(crate) fn resolve_table(&self, id: TableId) -> Result<&Table, RenderError> {
        self.tables
            .get(&id)
            .ok_or_else(|| RenderError::Dangling(id.to_string()))
    }

    pub(crate) fn resolve_column(&self, column: &ColumnRef) -> Result<&Column, RenderError> {
        self.resolve_table(column.table)?
            .column(&column.column)
            .ok_or_else(|| RenderError::Dangling(format!("{}.{}", column.table, column.column)))
    }

    // --- references -----------------------------------------------------

    /// Insert a reference. Both sides must be non-empty, equally long, and
    /// drawn from a single table each. Both of those tables must already
    /// belong to this schema, not just one of them: a `TableId` only has
    /// meaning inside the schema that issued it.
    pub fn add_reference(&mut self, mut reference: Reference) -> Result<ReferenceId, ValidationError> {
        let table1 = reference.table1()?;
        let table2 = reference.table2()?;
        if reference.col1.len() != reference.col2.len() {
            return Err(ValidationError::ColumnCountMismatch {
                left: reference.col1.len(),
                right: reference.col2.len(),
            });
        }

        for (table_id, side) in [(table1, &reference.col1), (table2, &reference.col2)] {
            let table = self
                .tables
                .get(&table_id)
                .ok_or_else(|| ValidationError::NotInSchema(table_id.to_string()))?;
            for column_ref in side {
                if table.column(&column_ref.column).is_none() {
                    return Err(ValidationError::ColumnNotInTable {
                        table: table.full_name(),
                        column: column_ref.column.clone(),
                    });
                }
            }
        }

        let duplicate = self.references.values().any(|r| {
            r.relation == reference.relation && r.col1 == reference.col1 && r.col2 == reference.col2
        });
        if duplicate {
            return Err(ValidationError::DuplicateReference(reference.to_string()));
        }

        let id = ReferenceId(self.next_id());
        reference.id = Some(id);
        tracing::trace!(reference = %reference, "added reference");
        self.references.insert(id, reference);
        Ok(id)
    }

    pub fn delete_reference(&mut self, id: ReferenceId) -> Result<Reference, ValidationError> {
        let mut reference = self
            .references
            .shift_remove(&id)
            .ok_or_else(|| ValidationError::NotInSchema(id.to_string()))?;
        reference.id = None;
        Ok(reference)
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    pub fn reference(&self, id: ReferenceId) -> Option<&Reference> {
        self.references.get(&id)
    }

    /// References with a column on the given table, on either side
    pub fn references_of(&self, table: TableId) -> impl Iterator<Item = &Reference> {
        self.references.values().filter(move |r| r.touches(table))
    }

    // --- enums ----------------------------------------------------------

    pub fn add_enum(&mut self, mut enumeration: Enum) -> Result<EnumId, ValidationError> {
        if self.find_enum(Some(&enumeration.schema), &enumeration.name).is_some() {
            return Err(ValidationError::DuplicateEnum(enumeration.full_name()));
        }
        let id = EnumId(self.next_id());
        enumeration.id = Some(id);
        self.enums.insert(id, enumeration);
        Ok(id)
    }

    /// Remove an enum that no column uses any more
    pub fn delete_enum(&mut self, id: EnumId) -> Result<Enum, ValidationError> {
        let enumeration = self
            .enums
            .get(&id)
            .ok_or_else(|| ValidationError::NotInSchema(id.to_string()))?;
        let in_use = self
            .tables
            .values()
            .flat_map(|t| &t.columns)
            .any(|c| c.column_type == ColumnType::Enum(id));
        if in_use {
            return Err(ValidationError::EnumInUse(enumeration.full_name()));
        }

        let mut enumeration = self
            .enums
            .shift_remove(&id)
            .ok_or_else(|| ValidationError::NotInSchema(id.to_string()))?;
        enumeration.id = None;
        Ok(enumeration)
    }

    /// Enum by `(schema, name)`, the schema defaulting to `public`
    pub fn find_enum(&self, schema: Option<&str>, name: &str) -> Option<EnumId> {
        let schema = schema.unwrap_or(DEFAULT_SCHEMA);
        self.enums
            .iter()
            .find(|(_, e)| e.schema == schema && e.name == name)
            .map(|(id, _)| *id)
    }

    /// Enum by dotted or bare name
    pub fn enumeration(&self, name: &str) -> Option<&Enum> {
        let qualified = QualifiedName::parse(name);
        self.find_enum(qualified.schema.as_deref(), &qualified.name)
            .and_then(|id| self.enums.get(&id))
    }

    pub fn enum_by_id(&self, id: EnumId) -> Option<&Enum> {
        self.enums.get(&id)
    }

    pub fn enums(&self) -> impl Iterator<Item = &Enum> {
        self.enums.values()
    }

    // --- table groups ---------------------------------------------------

    pub fn add_table_group(&mut self, group: TableGroup) -> Result<(), ValidationError> {
        if self.table_group(&group.name).is_some() {
            return Err(ValidationError::DuplicateTableGroup(group.name));
        }
        if let Some(missing) = group.tables.iter().find(|t| !self.tables.contains_key(*t)) {
            return Err(ValidationError::NotInSchema(missing.to_string()));
        }
        self.table_groups.push(group);
        Ok(())
    }

    pub fn delete_table_group(&mut self, name: &str) -> Result<TableGroup, ValidationError> {
        let position = self
            .table_groups
            .iter()
            .position(|g| g.name == name)
            .ok_or_else(|| ValidationError::NotInSchema(format!("table group '{}'", name)))?;
        Ok(self.table_groups.remove(position))
    }

    pub fn table_group(&self, name: &str) -> Option<&TableGroup> {
        self.table_groups.iter().find(|g| g.name == name)
    }

    pub fn table_groups(&self) -> &[TableGroup] {
        &self.table_groups
    }

    // --- project and sticky notes ---------------------------------------

    /// Install the project, returning the one it replaces
    pub fn add_project(&mut self, project: Project) -> Option<Project> {
        self.project.replace(project)
    }

    pub fn delete_project(&mut self) -> Result<Project, ValidationError> {
        self.project
            .take()
            .ok_or_else(|| ValidationError::NotInSchema("project".to_string()))
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn add_sticky_note(&mut self, note: StickyNote) {
        self.sticky_notes.push(note);
    }

    pub fn delete_sticky_note(&mut self, name: &str) -> Result<StickyNote, ValidationError> {
        let position = self
            .sticky_notes
            .iter()
            .position(|n| n.name == name)
            .ok_or_else(|| ValidationError::NotInSchema(format!("note '{}'", name)))?;
        Ok(self.sticky_notes.remove(position))
    }

    pub fn sticky_notes(&self) -> &[StickyNote] {
        &self.sticky_notes
    }

    // --- untyped --------------------------------------------------------

    pub fn add(&mut self, element: Element) -> Result<ElementId, ValidationError> {
        Ok(match element {
            Element::Table(table) => ElementId::Table(self.add_table(table)?),
            Element::Reference(reference) => ElementId::Reference(self.add_reference(reference)?),
            Element::Enum(enumeration) => ElementId::Enum(self.add_enum(enumeration)?),
            Element::TableGroup(group) => {
                let name = group.name.clone();
                self.add_table_group(group)?;
                ElementId::TableGroup(name)
            }
            Element::Project(project) => {
                self.add_project(project);
                ElementId::Project
            }
            Element::StickyNote(note) => {
                let name = note.name.clone();
                self.add_sticky_note(note);
                ElementId::StickyNote(name)
            }
        })
    }

    pub fn delete(&mut self, id: ElementId) -> Result<Element, ValidationError> {
        Ok(match id {
            ElementId::Table(id) => Element::Table(self.delete_table(id)?),
            ElementId::Reference(id) => Element::Reference(self.delete_reference(id)?),
            ElementId::Enum(id) => Element::Enum(self.delete_enum(id)?),
            ElementId::TableGroup(name) => Element::TableGroup(self.delete_table_group(&name)?),
            ElementId::Project => Element::Project(self.delete_project()?),
            ElementId::StickyNote(name) => Element::StickyNote(self.delete_sticky_note(&name)?),
        })
    }

    // --- rendering ------------------------------------------------------

    /// Replace the SQL renderer used by [`Schema::sql`]
    pub fn set_sql_renderer(&mut self, renderer: Arc<dyn Renderer>) {
        self.sql_renderer = Some(renderer);
    }

    /// Replace the DBML renderer used by [`Schema::dbml`]
    pub fn set_dbml_renderer(&mut self, renderer: Arc<dyn Renderer>) {
        self.dbml_renderer = Some(renderer);
    }

    pub fn sql(&self) -> Result<String, RenderError> {
        match &self.sql_renderer {
            Some(renderer) => renderer.render_schema(self),
            None => SqlRenderer.render_schema(self),
        }
    }

    pub fn dbml(&self) -> Result<String, RenderError> {
        match &self.dbml_renderer {
            Some(renderer) => renderer.render_schema(self),
            None => DbmlRenderer.render_schema(self),
        }
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a Table;
    type IntoIter = indexmap::map::Values<'a, TableId, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.values()
    }
}
