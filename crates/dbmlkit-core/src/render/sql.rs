//! SQL DDL output (PostgreSQL flavoured)
//!
//! String literals, `COMMENT ON` text included, escape `'` by doubling it to
//! `''`. It is never swapped for `"`, so note text reads back unchanged.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::error::RenderError;
use crate::schema::{
    Column, ColumnRef, Enum, EnumItem, Index, IndexSubject, Note, Project, Reference, Schema,
    Table, TableId,
};
use crate::types::{format_float, ColumnType, DefaultValue, Relation};

use super::{
    check_column, check_enum, check_reference, check_table, comment_lines, indent, qualified,
    require, require_name, Entity, NoteParent, Renderer,
};

/// Quote identifier with double quotes
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote string with single quotes, doubling embedded ones (`it''s`)
pub(crate) fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn table_name(table: &Table) -> String {
    qualified(&table.schema, &table.name, quote_ident)
}

fn with_comment(comment: Option<&String>, sql: String) -> String {
    match comment {
        Some(comment) => format!("{}\n{}", comment_lines("-- ", comment), sql),
        None => sql,
    }
}

fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_names(columns: &[ColumnRef]) -> Vec<&str> {
    columns.iter().map(|c| c.column.as_str()).collect()
}

/// `[CONSTRAINT "name" ]FOREIGN KEY (..) REFERENCES target (..)[ ON UPDATE ..][ ON DELETE ..]`
fn foreign_key<S: AsRef<str>, T: AsRef<str>>(
    name: Option<&str>,
    source: &[S],
    target_table: &str,
    target: &[T],
    reference: &Reference,
) -> String {
    let mut sql = String::new();
    if let Some(name) = name {
        sql.push_str(&format!("CONSTRAINT {} ", quote_ident(name)));
    }
    sql.push_str(&format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        column_list(source),
        target_table,
        column_list(target)
    ));
    if let Some(action) = &reference.on_update {
        sql.push_str(&format!(" ON UPDATE {}", action.to_uppercase()));
    }
    if let Some(action) = &reference.on_delete {
        sql.push_str(&format!(" ON DELETE {}", action.to_uppercase()));
    }
    sql
}

fn default_value(value: &DefaultValue) -> String {
    match value {
        DefaultValue::String(s) => quote_string(s),
        DefaultValue::Integer(i) => i.to_string(),
        DefaultValue::Numeric(text) => text.clone(),
        DefaultValue::Float(f) => format_float(*f),
        DefaultValue::Boolean(b) => b.to_string(),
        DefaultValue::Null => "NULL".to_string(),
        DefaultValue::Expression(e) => e.parenthesized(),
    }
}

/// Renders the schema as `CREATE TYPE` / `CREATE TABLE` / `ALTER TABLE` /
/// `CREATE INDEX` / `COMMENT ON` statements separated by blank lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlRenderer;

impl SqlRenderer {
    fn column_type(&self, schema: &Schema, column: &Column) -> Result<String, RenderError> {
        match &column.column_type {
            ColumnType::Raw(text) => Ok(text.clone()),
            ColumnType::Enum(id) => {
                let enumeration = schema
                    .enum_by_id(*id)
                    .ok_or_else(|| RenderError::Dangling(id.to_string()))?;
                Ok(qualified(&enumeration.schema, &enumeration.name, quote_ident))
            }
        }
    }

    pub fn column(&self, schema: &Schema, table: &Table, column: &Column) -> Result<String, RenderError> {
        check_column(column)?;
        let mut sql = format!(
            "{} {}",
            quote_ident(&column.name),
            self.column_type(schema, column)?
        );
        if column.pk && !table.has_composite_pk() {
            sql.push_str(" PRIMARY KEY");
        }
        if column.autoinc {
            sql.push_str(" AUTOINCREMENT");
        }
        if column.unique {
            sql.push_str(" UNIQUE");
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default_value(default));
        }
        Ok(with_comment(column.comment.as_ref(), sql))
    }

    pub fn index(&self, table: &Table, index: &Index) -> Result<String, RenderError> {
        require("index", "subjects", !index.subjects.is_empty())?;
        let keys = index
            .subjects
            .iter()
            .map(|subject| match subject {
                IndexSubject::Column(name) => quote_ident(name),
                IndexSubject::Expression(e) => e.parenthesized(),
            })
            .collect::<Vec<_>>()
            .join(", ");

        if index.pk {
            return Ok(with_comment(
                index.comment.as_ref(),
                format!("PRIMARY KEY ({})", keys),
            ));
        }

        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if let Some(name) = &index.name {
            sql.push_str(&quote_ident(name));
            sql.push(' ');
        }
        sql.push_str(&format!("ON {} ", table_name(table)));
        if let Some(index_type) = index.index_type {
            sql.push_str(&format!("USING {} ", index_type.as_str().to_uppercase()));
        }
        sql.push_str(&format!("({});", keys));
        Ok(with_comment(index.comment.as_ref(), sql))
    }

    pub fn reference(&self, schema: &Schema, reference: &Reference) -> Result<String, RenderError> {
        check_reference(reference)?;
        if reference.relation == Relation::ManyToMany {
            return self.many_to_many(schema, reference);
        }

        let (source, target) = reference.direction();
        let target_table = schema.resolve_table(reference.target_table()?)?;
        let fk = foreign_key(
            reference.name.as_deref(),
            &column_names(source),
            &table_name(target_table),
            &column_names(target),
            reference,
        );

        let sql = if reference.inline {
            fk
        } else {
            let source_table = schema.resolve_table(reference.source_table()?)?;
            format!("ALTER TABLE {} ADD {};", table_name(source_table), fk)
        };
        Ok(with_comment(reference.comment.as_ref(), sql))
    }

    /// Join table plus one foreign key from it to each side
    fn many_to_many(&self, schema: &Schema, reference: &Reference) -> Result<String, RenderError> {
        let join = reference.join_table(schema)?;
        let join_name = table_name(&join);
        let mut statements = vec![self.table(schema, &join)?];

        let table1 = schema.resolve_table(reference.table1()?)?;
        let table2 = schema.resolve_table(reference.table2()?)?;
        for (table, side) in [(table1, &reference.col1), (table2, &reference.col2)] {
            let source: Vec<String> = side
                .iter()
                .map(|c| format!("{}_{}", table.name, c.column))
                .collect();
            let fk = foreign_key(
                None,
                &source,
                &table_name(table),
                &column_names(side),
                reference,
            );
            statements.push(format!("ALTER TABLE {} ADD {};", join_name, fk));
        }

        Ok(with_comment(
            reference.comment.as_ref(),
            statements.join("\n\n"),
        ))
    }

    /// Inline references whose foreign key lives on `table`
    fn inline_references<'s>(
        &self,
        schema: &'s Schema,
        table: &Table,
    ) -> Result<Vec<&'s Reference>, RenderError> {
        let Some(id) = table.id() else {
            return Ok(Vec::new());
        };
        if table.is_abstract {
            return Ok(Vec::new());
        }
        let mut references = Vec::new();
        for reference in schema.references() {
            if !reference.inline || reference.relation == Relation::ManyToMany {
                continue;
            }
            if reference.source_table()? == id {
                references.push(reference);
            }
        }
        Ok(references)
    }

    pub fn table(&self, schema: &Schema, table: &Table) -> Result<String, RenderError> {
        check_table(table)?;

        let mut body = Vec::new();
        for column in &table.columns {
            body.push(self.column(schema, table, column)?);
        }
        for index in table.indexes.iter().filter(|i| i.pk) {
            body.push(self.index(table, index)?);
        }
        for reference in self.inline_references(schema, table)? {
            body.push(self.reference(schema, reference)?);
        }
        if table.has_composite_pk() {
            let keys: Vec<&str> = table.pk_columns().map(|c| c.name.as_str()).collect();
            body.push(format!("PRIMARY KEY ({})", column_list(&keys)));
        }

        let create = format!(
            "CREATE TABLE {} (\n{}\n);",
            table_name(table),
            indent(&body.join(",\n"), 2)
        );
        let mut statements = vec![with_comment(table.comment.as_ref(), create)];

        for index in table.indexes.iter().filter(|i| !i.pk) {
            statements.push(self.index(table, index)?);
        }
        if let Some(note) = &table.note {
            statements.push(self.note(note, NoteParent::Table(table))?);
        }
        for column in &table.columns {
            if let Some(note) = &column.note {
                statements.push(self.note(note, NoteParent::Column { table, column })?);
            }
        }

        Ok(statements.join("\n\n"))
    }

    fn enum_item(&self, item: &EnumItem) -> Result<String, RenderError> {
        require_name("enum item", &item.name)?;
        Ok(with_comment(item.comment.as_ref(), quote_string(&item.name)))
    }

    pub fn enumeration(&self, enumeration: &Enum) -> Result<String, RenderError> {
        check_enum(enumeration)?;
        let items = enumeration
            .items
            .iter()
            .map(|item| self.enum_item(item))
            .collect::<Result<Vec<_>, _>>()?;
        let sql = format!(
            "CREATE TYPE {} AS ENUM (\n{}\n);",
            qualified(&enumeration.schema, &enumeration.name, quote_ident),
            indent(&items.join(",\n"), 2)
        );
        Ok(with_comment(enumeration.comment.as_ref(), sql))
    }

    /// `COMMENT ON` for tables and columns, `--` lines for anything else
    pub fn note(&self, note: &Note, parent: NoteParent<'_>) -> Result<String, RenderError> {
        Ok(match parent {
            NoteParent::Table(table) => format!(
                "COMMENT ON TABLE {} IS {};",
                table_name(table),
                quote_string(&note.text)
            ),
            NoteParent::Column { table, column } => format!(
                "COMMENT ON COLUMN {}.{} IS {};",
                table_name(table),
                quote_ident(&column.name),
                quote_string(&note.text)
            ),
            _ => comment_lines("-- ", &note.text),
        })
    }

    fn project(&self, project: &Project) -> Result<String, RenderError> {
        require_name("project", &project.name)?;
        match &project.note {
            Some(note) => self.note(note, NoteParent::Project(project)),
            None => Ok(String::new()),
        }
    }

    /// Tables sorted by how many inline many-to-one references point at
    /// them, most first. Ties keep insertion order. Cycles and many-to-many
    /// references are not taken into account.
    fn ordered_tables<'s>(&self, schema: &'s Schema) -> Result<Vec<&'s Table>, RenderError> {
        let mut weights: HashMap<TableId, usize> = HashMap::new();
        for reference in schema.references().filter(|r| r.inline) {
            let target = match reference.relation {
                Relation::ManyToOne => reference.table2()?,
                Relation::OneToMany => reference.table1()?,
                _ => continue,
            };
            *weights.entry(target).or_default() += 1;
        }

        let weight = |table: &Table| {
            table
                .id()
                .and_then(|id| weights.get(&id).copied())
                .unwrap_or(0)
        };
        let mut tables: Vec<&Table> = schema.tables().collect();
        tables.sort_by_key(|t| Reverse(weight(t)));

        tracing::debug!(
            order = ?tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "ordered tables for SQL output"
        );
        Ok(tables)
    }
}

impl Renderer for SqlRenderer {
    fn render(&self, schema: &Schema, entity: Entity<'_>) -> Result<String, RenderError> {
        match entity {
            Entity::Table(table) => self.table(schema, table),
            Entity::Column { table, column } => self.column(schema, table, column),
            Entity::Index { table, index } => self.index(table, index),
            Entity::Reference(reference) => self.reference(schema, reference),
            Entity::Enum(enumeration) => self.enumeration(enumeration),
            Entity::EnumItem(item) => self.enum_item(item),
            Entity::Project(project) => self.project(project),
            Entity::Note { note, parent } => self.note(note, parent),
            Entity::TableGroup(_) | Entity::StickyNote(_) => Err(RenderError::Unsupported {
                entity: entity.kind(),
                target: "SQL",
            }),
        }
    }

    fn render_schema(&self, schema: &Schema) -> Result<String, RenderError> {
        let mut statements = Vec::new();
        for enumeration in schema.enums() {
            statements.push(self.enumeration(enumeration)?);
        }
        for table in self.ordered_tables(schema)? {
            statements.push(self.table(schema, table)?);
        }
        for reference in schema.references() {
            if !reference.inline || reference.relation == Relation::ManyToMany {
                statements.push(self.reference(schema, reference)?);
            }
        }
        Ok(statements.join("\n\n"))
    }
}
