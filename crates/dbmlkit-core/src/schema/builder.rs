//! Schema builder - links blueprints into a resolved [`Schema`]

use crate::blueprint::{
    Blueprint, ColumnBlueprint, EnumBlueprint, IndexBlueprint, IndexSubjectBlueprint,
    ProjectBlueprint, ReferenceBlueprint, TableBlueprint, TableGroupBlueprint,
};
use crate::error::{Error, ResolveError, SyntaxError};
use crate::parser;
use crate::schema::{
    Column, ColumnRef, Enum, EnumItem, Index, IndexSubject, Note, Project, QualifiedName,
    Reference, Schema, StickyNote, Table, TableGroup, TableId,
};
use crate::types::{ColumnType, Expression};

/// Builder for constructing a Schema from DBML documents
///
/// Blueprints accumulate through [`SchemaBuilder::parse`] or
/// [`SchemaBuilder::add`]; [`SchemaBuilder::build`] resolves them all at once
/// and either returns a fully linked schema or the first error.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    blueprints: Vec<Blueprint>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blueprints(blueprints: Vec<Blueprint>) -> Self {
        Self { blueprints }
    }

    /// Parse a document and queue its blueprints
    pub fn parse(&mut self, source: &str) -> Result<(), SyntaxError> {
        let blueprints = parser::parse(source)?;
        tracing::debug!(count = blueprints.len(), "parsed blueprints");
        self.blueprints.extend(blueprints);
        Ok(())
    }

    pub fn add(&mut self, blueprint: Blueprint) {
        self.blueprints.push(blueprint);
    }

    /// Resolve every queued blueprint.
    ///
    /// Enums are built first, then tables (whose columns may name enums),
    /// then table groups and the project, then all references, inline ones
    /// before standalone ones, and finally sticky notes.
    pub fn build(self) -> Result<Schema, Error> {
        let mut schema = Schema::new();

        let mut tables = Vec::new();
        let mut references = Vec::new();
        let mut enums = Vec::new();
        let mut groups = Vec::new();
        let mut projects = Vec::new();
        let mut notes = Vec::new();
        for blueprint in self.blueprints {
            match blueprint {
                Blueprint::Table(t) => tables.push(t),
                Blueprint::Reference(r) => references.push(r),
                Blueprint::Enum(e) => enums.push(e),
                Blueprint::TableGroup(g) => groups.push(g),
                Blueprint::Project(p) => projects.push(p),
                Blueprint::StickyNote(n) => notes.push(n),
            }
        }

        for blueprint in enums {
            schema.add_enum(build_enum(blueprint))?;
        }

        let mut inline_refs = Vec::new();
        for blueprint in tables {
            let owner = blueprint.name.clone();
            let (table, refs) = build_table(&schema, blueprint)?;
            schema.add_table(table)?;
            inline_refs.extend(refs.into_iter().map(|r| (Some(owner.clone()), r)));
        }

        for blueprint in groups {
            let group = build_table_group(&schema, blueprint)?;
            schema.add_table_group(group)?;
        }

        for blueprint in projects {
            if let Some(previous) = schema.add_project(build_project(blueprint)) {
                tracing::warn!(project = %previous.name, "project replaced by a later definition");
            }
        }

        let standalone = references.into_iter().map(|r| (None, r));
        for (owner, blueprint) in inline_refs.into_iter().chain(standalone) {
            let reference = build_reference(&schema, blueprint, owner.as_ref())?;
            schema.add_reference(reference)?;
        }

        for blueprint in notes {
            let mut note = StickyNote::new(blueprint.name, blueprint.text);
            note.comment = blueprint.comment;
            schema.add_sticky_note(note);
        }

        tracing::debug!(
            tables = schema.len(),
            enums = schema.enums().count(),
            references = schema.references().count(),
            table_groups = schema.table_groups().len(),
            "built schema"
        );
        Ok(schema)
    }
}

fn schema_name(name: &QualifiedName) -> String {
    name.schema_or_default().to_string()
}

fn build_enum(blueprint: EnumBlueprint) -> Enum {
    let mut enumeration = Enum::new(blueprint.name.name.clone(), Vec::<String>::new())
        .with_schema(schema_name(&blueprint.name));
    enumeration.comment = blueprint.comment;
    enumeration.items = blueprint
        .items
        .into_iter()
        .map(|item| EnumItem {
            name: item.name,
            note: item.note.map(|n| Note::new(n.text)),
            comment: item.comment,
        })
        .collect();
    enumeration
}

fn build_table(
    schema: &Schema,
    blueprint: TableBlueprint,
) -> Result<(Table, Vec<ReferenceBlueprint>), Error> {
    let mut table = Table::new(blueprint.name.name.clone()).with_schema(schema_name(&blueprint.name));
    table.alias = blueprint.alias;
    table.note = blueprint.note.map(|n| Note::new(n.text));
    table.header_color = blueprint.header_color;
    table.comment = blueprint.comment;

    let mut refs = Vec::new();
    for column in blueprint.columns {
        let (column, column_refs) = build_column(schema, column);
        table.add_column(column)?;
        refs.extend(column_refs);
    }

    for index in blueprint.indexes {
        let index = build_index(&table, index)?;
        table.add_index(index)?;
    }

    Ok((table, refs))
}

fn build_column(schema: &Schema, blueprint: ColumnBlueprint) -> (Column, Vec<ReferenceBlueprint>) {
    let column_type = resolve_type(schema, &blueprint.type_name);
    let mut column = Column::new(blueprint.name, column_type);
    column.unique = blueprint.unique;
    column.not_null = blueprint.not_null;
    column.pk = blueprint.pk;
    column.autoinc = blueprint.autoinc;
    column.default = blueprint.default;
    column.note = blueprint.note.map(|n| Note::new(n.text));
    column.comment = blueprint.comment;
    column.properties = blueprint.properties;
    (column, blueprint.refs)
}

/// Declared type text naming an enum becomes that enum. A bare name only
/// matches enums of the default schema.
fn resolve_type(schema: &Schema, type_name: &str) -> ColumnType {
    let name = QualifiedName::parse(type_name);
    match schema.find_enum(name.schema.as_deref(), &name.name) {
        Some(id) => {
            tracing::trace!(type_name, enumeration = %id, "column type resolved to enum");
            ColumnType::Enum(id)
        }
        None => ColumnType::raw(type_name),
    }
}

fn build_index(table: &Table, blueprint: IndexBlueprint) -> Result<Index, ResolveError> {
    let subjects = blueprint
        .subjects
        .into_iter()
        .map(|subject| match subject {
            IndexSubjectBlueprint::Column(name) => match table.column(&name) {
                Some(_) => Ok(IndexSubject::Column(name)),
                None => Err(ResolveError::ColumnNotFound {
                    table: table.full_name(),
                    column: name,
                }),
            },
            IndexSubjectBlueprint::Expression(e) => Ok(IndexSubject::Expression(Expression::new(e.text))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut index = Index::new(subjects);
    index.name = blueprint.name;
    index.unique = blueprint.unique;
    index.pk = blueprint.pk;
    index.index_type = blueprint.index_type;
    index.note = blueprint.note.map(|n| Note::new(n.text));
    index.comment = blueprint.comment;
    Ok(index)
}

fn locate(schema: &Schema, name: &QualifiedName) -> Result<TableId, ResolveError> {
    schema.locate_table(name.schema.as_deref(), &name.name)
}

fn build_table_group(schema: &Schema, blueprint: TableGroupBlueprint) -> Result<TableGroup, ResolveError> {
    let tables = blueprint
        .items
        .iter()
        .map(|name| locate(schema, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut group = TableGroup::new(blueprint.name, tables);
    group.color = blueprint.color;
    group.note = blueprint.note.map(|n| Note::new(n.text));
    group.comment = blueprint.comment;
    Ok(group)
}

fn build_project(blueprint: ProjectBlueprint) -> Project {
    let mut project = Project::new(blueprint.name);
    project.items = blueprint.items;
    project.note = blueprint.note.map(|n| Note::new(n.text));
    project.comment = blueprint.comment;
    project
}

fn resolve_side(
    schema: &Schema,
    table_name: &QualifiedName,
    columns: &[String],
) -> Result<Vec<ColumnRef>, ResolveError> {
    let id = locate(schema, table_name)?;
    let table = schema
        .table_by_id(id)
        .ok_or_else(|| ResolveError::TableNotFound(table_name.to_string()))?;
    columns
        .iter()
        .map(|column| match table.column(column) {
            Some(_) => Ok(ColumnRef::new(id, column.clone())),
            None => Err(ResolveError::ColumnNotFound {
                table: table_name.to_string(),
                column: column.clone(),
            }),
        })
        .collect()
}

fn build_reference(
    schema: &Schema,
    blueprint: ReferenceBlueprint,
    owner: Option<&QualifiedName>,
) -> Result<Reference, ResolveError> {
    let table1 = blueprint
        .table1
        .as_ref()
        .or(owner)
        .ok_or_else(|| ResolveError::TableNotFound(format!("<source of {}>", blueprint.table2)))?;
    let col1 = resolve_side(schema, table1, &blueprint.col1)?;
    let col2 = resolve_side(schema, &blueprint.table2, &blueprint.col2)?;

    tracing::trace!(
        from = %table1,
        to = %blueprint.table2,
        relation = %blueprint.relation,
        inline = blueprint.inline,
        "resolved reference"
    );

    let mut reference = Reference::new(blueprint.relation, col1, col2);
    reference.name = blueprint.name;
    reference.comment = blueprint.comment;
    reference.on_update = blueprint.on_update;
    reference.on_delete = blueprint.on_delete;
    reference.inline = blueprint.inline;
    Ok(reference)
}
