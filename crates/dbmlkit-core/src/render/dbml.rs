//! Canonical DBML output
//!
//! Output parses back into an equivalent schema. Identifiers are always
//! double-quoted, strings use backslash escapes, and text containing a line
//! break switches to triple quotes.

use crate::error::RenderError;
use crate::schema::{
    Column, ColumnRef, Enum, EnumItem, Index, IndexSubject, Note, Project, Reference, Schema,
    StickyNote, Table, TableGroup,
};
use crate::types::{format_float, ColumnType, DefaultValue};

use super::{
    check_column, check_enum, check_reference, check_table, comment_lines, indent, qualified,
    require, require_name, Entity, NoteParent, Renderer,
};

const INDENT: usize = 4;

/// Quote identifier with double quotes, backslash-escaping `"` and `\`
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('\\', "\\\\").replace('"', "\\\""))
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Single-quoted string, or triple-quoted when it spans lines. Triple quotes
/// open and close on lines of their own.
pub(crate) fn quote_string(text: &str) -> String {
    if text.contains('\n') {
        format!("'''\n{}\n'''", escape(text))
    } else {
        format!("'{}'", escape(text))
    }
}

/// Escaped text shifted right, blank lines included
fn text_lines(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    escape(text)
        .split('\n')
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

fn is_word(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Type text the grammar reads back unquoted: `name[.name][(args)][[]]`
fn is_plain_type(text: &str) -> bool {
    let text = text.strip_suffix("[]").unwrap_or(text);
    let (base, args) = match text.find('(') {
        Some(i) => text.split_at(i),
        None => (text, ""),
    };
    let base_ok = match base.split_once('.') {
        Some((schema, name)) => is_word(schema) && is_word(name),
        None => is_word(base),
    };
    base_ok && (args.is_empty() || args.ends_with(')'))
}

/// Bare word where possible, quoted otherwise
fn word_or_quoted(text: &str) -> String {
    if is_word(text) {
        text.to_string()
    } else {
        quote_ident(text)
    }
}

/// Referential action such as `cascade` or `set null`
fn action(text: &str) -> String {
    let plain = !text.trim().is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ');
    if plain {
        text.to_string()
    } else {
        quote_string(text)
    }
}

fn with_comment(comment: Option<&String>, dbml: String) -> String {
    match comment {
        Some(comment) => format!("{}\n{}", comment_lines("// ", comment), dbml),
        None => dbml,
    }
}

fn settings(items: &[String]) -> String {
    if items.is_empty() {
        String::new()
    } else {
        format!(" [{}]", items.join(", "))
    }
}

fn note_block(note: &Note) -> String {
    if note.text.contains('\n') {
        format!(
            "Note {{\n    '''\n{}\n    '''\n}}",
            text_lines(&note.text, INDENT)
        )
    } else {
        format!("Note {{\n    {}\n}}", quote_string(&note.text))
    }
}

fn default_value(value: &DefaultValue) -> String {
    match value {
        DefaultValue::String(s) => quote_string(s),
        DefaultValue::Integer(i) => i.to_string(),
        DefaultValue::Numeric(text) => text.clone(),
        DefaultValue::Float(f) => format_float(*f),
        DefaultValue::Boolean(b) => b.to_string(),
        DefaultValue::Null => "null".to_string(),
        DefaultValue::Expression(e) => format!("`{}`", e.text),
    }
}

/// Renders the schema back into DBML.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbmlRenderer;

impl DbmlRenderer {
    fn table_name(&self, table: &Table) -> String {
        qualified(&table.schema, &table.name, quote_ident)
    }

    /// `"schema"."table"."column"` or `"table".("a", "b")`
    fn column_path(&self, schema: &Schema, side: &[ColumnRef]) -> Result<String, RenderError> {
        let first = side.first().ok_or(RenderError::MissingAttribute {
            entity: "reference",
            attribute: "columns",
        })?;
        let table = schema.resolve_table(first.table)?;
        let columns = match side {
            [single] => quote_ident(&single.column),
            _ => format!(
                "({})",
                side.iter()
                    .map(|c| quote_ident(&c.column))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        Ok(format!("{}.{}", self.table_name(table), columns))
    }

    fn column_type(&self, schema: &Schema, column: &Column) -> Result<String, RenderError> {
        match &column.column_type {
            ColumnType::Raw(text) if is_plain_type(text) => Ok(text.clone()),
            ColumnType::Raw(text) => Ok(quote_ident(text)),
            ColumnType::Enum(id) => {
                let enumeration = schema
                    .enum_by_id(*id)
                    .ok_or_else(|| RenderError::Dangling(id.to_string()))?;
                Ok(qualified(&enumeration.schema, &enumeration.name, quote_ident))
            }
        }
    }

    /// `ref: > "table"."column"` as written in a column's settings
    fn inline_reference(&self, schema: &Schema, reference: &Reference) -> Result<String, RenderError> {
        check_reference(reference)?;
        if reference.is_composite() {
            return Err(RenderError::CompositeInlineReference);
        }
        Ok(format!(
            "ref: {} {}",
            reference.relation.symbol(),
            self.column_path(schema, &reference.col2)?
        ))
    }

    pub fn column(&self, schema: &Schema, table: &Table, column: &Column) -> Result<String, RenderError> {
        check_column(column)?;

        let mut items = Vec::new();
        if column.pk {
            items.push("pk".to_string());
        }
        if column.autoinc {
            items.push("increment".to_string());
        }
        if column.unique {
            items.push("unique".to_string());
        }
        if column.not_null {
            items.push("not null".to_string());
        }
        if let Some(default) = &column.default {
            items.push(format!("default: {}", default_value(default)));
        }
        if let Some(id) = table.id() {
            let owner = ColumnRef::new(id, column.name.clone());
            for reference in schema.references().filter(|r| r.inline) {
                if reference.col1.first() == Some(&owner) {
                    items.push(self.inline_reference(schema, reference)?);
                }
            }
        }
        if let Some(note) = &column.note {
            items.push(format!("note: {}", quote_string(&note.text)));
        }
        for (key, value) in &column.properties {
            items.push(format!("{}: {}", key, quote_string(value)));
        }

        let line = format!(
            "{} {}{}",
            quote_ident(&column.name),
            self.column_type(schema, column)?,
            settings(&items)
        );
        Ok(with_comment(column.comment.as_ref(), line))
    }

    pub fn index(&self, index: &Index) -> Result<String, RenderError> {
        require("index", "subjects", !index.subjects.is_empty())?;
        let subjects: Vec<String> = index
            .subjects
            .iter()
            .map(|subject| match subject {
                IndexSubject::Column(name) => quote_ident(name),
                IndexSubject::Expression(e) => format!("`{}`", e.text),
            })
            .collect();
        let subject = match subjects.as_slice() {
            [single] => single.clone(),
            _ => format!("({})", subjects.join(", ")),
        };

        let mut items = Vec::new();
        if index.pk {
            items.push("pk".to_string());
        }
        if index.unique {
            items.push("unique".to_string());
        }
        if let Some(name) = &index.name {
            items.push(format!("name: {}", quote_string(name)));
        }
        if let Some(index_type) = index.index_type {
            items.push(format!("type: {}", index_type.as_str()));
        }
        if let Some(note) = &index.note {
            items.push(format!("note: {}", quote_string(&note.text)));
        }

        Ok(with_comment(
            index.comment.as_ref(),
            format!("{}{}", subject, settings(&items)),
        ))
    }

    pub fn table(&self, schema: &Schema, table: &Table) -> Result<String, RenderError> {
        check_table(table)?;

        let mut header = format!("Table {}", self.table_name(table));
        if let Some(alias) = &table.alias {
            header.push_str(&format!(" as {}", quote_ident(alias)));
        }
        if let Some(color) = &table.header_color {
            header.push_str(&format!(" [headercolor: {}]", color));
        }

        let columns = table
            .columns
            .iter()
            .map(|column| self.column(schema, table, column))
            .collect::<Result<Vec<_>, _>>()?;
        let mut body = columns.join("\n");

        if let Some(note) = &table.note {
            body.push_str("\n\n");
            body.push_str(&note_block(note));
        }
        if !table.indexes.is_empty() {
            let indexes = table
                .indexes
                .iter()
                .map(|index| self.index(index))
                .collect::<Result<Vec<_>, _>>()?;
            body.push_str(&format!(
                "\n\nindexes {{\n{}\n}}",
                indent(&indexes.join("\n"), INDENT)
            ));
        }

        Ok(with_comment(
            table.comment.as_ref(),
            format!("{} {{\n{}\n}}", header, indent(&body, INDENT)),
        ))
    }

    pub fn reference(&self, schema: &Schema, reference: &Reference) -> Result<String, RenderError> {
        if reference.inline {
            return self.inline_reference(schema, reference);
        }
        check_reference(reference)?;

        let mut line = format!(
            "{} {} {}",
            self.column_path(schema, &reference.col1)?,
            reference.relation.symbol(),
            self.column_path(schema, &reference.col2)?
        );
        let mut items = Vec::new();
        if let Some(update) = &reference.on_update {
            items.push(format!("update: {}", action(update)));
        }
        if let Some(delete) = &reference.on_delete {
            items.push(format!("delete: {}", action(delete)));
        }
        line.push_str(&settings(&items));

        let header = match &reference.name {
            Some(name) => format!("Ref {}", quote_ident(name)),
            None => "Ref".to_string(),
        };
        Ok(with_comment(
            reference.comment.as_ref(),
            format!("{} {{\n{}\n}}", header, indent(&line, INDENT)),
        ))
    }

    fn enum_item(&self, item: &EnumItem) -> Result<String, RenderError> {
        require_name("enum item", &item.name)?;
        let mut items = Vec::new();
        if let Some(note) = &item.note {
            items.push(format!("note: {}", quote_string(&note.text)));
        }
        Ok(with_comment(
            item.comment.as_ref(),
            format!("{}{}", quote_ident(&item.name), settings(&items)),
        ))
    }

    pub fn enumeration(&self, enumeration: &Enum) -> Result<String, RenderError> {
        check_enum(enumeration)?;
        let items = enumeration
            .items
            .iter()
            .map(|item| self.enum_item(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(with_comment(
            enumeration.comment.as_ref(),
            format!(
                "Enum {} {{\n{}\n}}",
                qualified(&enumeration.schema, &enumeration.name, quote_ident),
                indent(&items.join("\n"), INDENT)
            ),
        ))
    }

    pub fn table_group(&self, schema: &Schema, group: &TableGroup) -> Result<String, RenderError> {
        require_name("table group", &group.name)?;
        require("table group", "tables", !group.tables.is_empty())?;

        let mut items = Vec::new();
        if let Some(color) = &group.color {
            items.push(format!("color: {}", color));
        }
        if let Some(note) = &group.note {
            items.push(format!("note: {}", quote_string(&note.text)));
        }
        let tables = group
            .tables
            .iter()
            .map(|id| schema.resolve_table(*id).map(|t| self.table_name(t)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(with_comment(
            group.comment.as_ref(),
            format!(
                "TableGroup {}{} {{\n{}\n}}",
                quote_ident(&group.name),
                settings(&items),
                indent(&tables.join("\n"), INDENT)
            ),
        ))
    }

    pub fn project(&self, project: &Project) -> Result<String, RenderError> {
        require_name("project", &project.name)?;
        let mut lines: Vec<String> = project
            .items
            .iter()
            .map(|(key, value)| format!("{}: {}", word_or_quoted(key), quote_string(value)))
            .collect();
        if let Some(note) = &project.note {
            lines.push(note_block(note));
        }
        Ok(with_comment(
            project.comment.as_ref(),
            format!(
                "Project {} {{\n{}\n}}",
                quote_ident(&project.name),
                indent(&lines.join("\n"), INDENT)
            ),
        ))
    }

    pub fn note(&self, note: &Note, parent: NoteParent<'_>) -> Result<String, RenderError> {
        Ok(match parent {
            NoteParent::Table(_) | NoteParent::Project(_) => note_block(note),
            _ => format!("note: {}", quote_string(&note.text)),
        })
    }

    pub fn sticky_note(&self, note: &StickyNote) -> Result<String, RenderError> {
        require_name("sticky note", &note.name)?;
        let body = if note.text.contains('\n') {
            format!("    '''\n{}\n    '''", text_lines(&note.text, INDENT))
        } else {
            indent(&quote_string(&note.text), INDENT)
        };
        Ok(with_comment(
            note.comment.as_ref(),
            format!("Note {} {{\n{}\n}}", quote_ident(&note.name), body),
        ))
    }
}

impl Renderer for DbmlRenderer {
    fn render(&self, schema: &Schema, entity: Entity<'_>) -> Result<String, RenderError> {
        match entity {
            Entity::Table(table) => self.table(schema, table),
            Entity::Column { table, column } => self.column(schema, table, column),
            Entity::Index { index, .. } => self.index(index),
            Entity::Reference(reference) => self.reference(schema, reference),
            Entity::Enum(enumeration) => self.enumeration(enumeration),
            Entity::EnumItem(item) => self.enum_item(item),
            Entity::TableGroup(group) => self.table_group(schema, group),
            Entity::Project(project) => self.project(project),
            Entity::Note { note, parent } => self.note(note, parent),
            Entity::StickyNote(note) => self.sticky_note(note),
        }
    }

    fn render_schema(&self, schema: &Schema) -> Result<String, RenderError> {
        // inline references are emitted with their column
        for reference in schema.references().filter(|r| r.inline) {
            if reference.is_composite() {
                return Err(RenderError::CompositeInlineReference);
            }
        }

        let mut blocks = Vec::new();
        if let Some(project) = schema.project() {
            blocks.push(self.project(project)?);
        }
        for enumeration in schema.enums() {
            blocks.push(self.enumeration(enumeration)?);
        }
        for table in schema.tables() {
            blocks.push(self.table(schema, table)?);
        }
        for reference in schema.references().filter(|r| !r.inline) {
            blocks.push(self.reference(schema, reference)?);
        }
        for group in schema.table_groups() {
            blocks.push(self.table_group(schema, group)?);
        }
        for note in schema.sticky_notes() {
            blocks.push(self.sticky_note(note)?);
        }
        Ok(blocks.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_str;
    use crate::schema::TableId;
    use crate::types::Relation;

    #[test]
    fn test_escaping_differs_from_sql() {
        assert_eq!(quote_string("it's"), r"'it\'s'");
        assert_eq!(quote_string(r"a\b"), r"'a\\b'");
        assert_eq!(quote_string("a\nb"), "'''\na\nb\n'''");
        assert_eq!(quote_ident(r#"say "hi""#), r#""say \"hi\"""#);
    }

    #[test]
    fn test_plain_types() {
        assert!(is_plain_type("varchar(255)"));
        assert!(is_plain_type("decimal(10, 2)"));
        assert!(is_plain_type("int[]"));
        assert!(is_plain_type("auth.role"));
        assert!(!is_plain_type("double precision"));
        assert!(!is_plain_type(""));
    }

    #[test]
    fn test_table_rendering() {
        let schema = parse_str(
            r#"
            // accounts
            Table auth.users as U [headercolor: #3498DB] {
                id int [pk, increment]
                email "character varying" [unique, not null, note: 'login']
                role text [default: 'user', charset: 'utf8']
                Note: 'All users'
                indexes {
                    (id, email) [unique, name: 'id_email']
                    `lower(email)` [type: btree]
                }
            }
            "#,
        )
        .unwrap();
        let table = schema.table("U").unwrap();
        assert_eq!(
            DbmlRenderer.table(&schema, table).unwrap(),
            r#"// accounts
Table "auth"."users" as "U" [headercolor: #3498DB] {
    "id" int [pk, increment]
    "email" "character varying" [unique, not null, note: 'login']
    "role" text [default: 'user', charset: 'utf8']

    Note {
        'All users'
    }

    indexes {
        ("id", "email") [unique, name: 'id_email']
        `lower(email)` [type: btree]
    }
}"#
        );
    }

    #[test]
    fn test_references() {
        let schema = parse_str(
            r#"
            Table a { id int [pk] x int y int }
            Table b { a_id int [ref: > a.id] x int y int }
            Ref fk: b.(x, y) - a.(x, y) [update: cascade, delete: set null]
            "#,
        )
        .unwrap();
        let out = schema.dbml().unwrap();
        assert!(out.contains(r#""a_id" int [ref: > "a"."id"]"#));
        assert!(out.ends_with(
            "Ref \"fk\" {\n    \"b\".(\"x\", \"y\") - \"a\".(\"x\", \"y\") [update: cascade, delete: set null]\n}"
        ));
    }

    #[test]
    fn test_composite_inline_reference_is_rejected() {
        let schema = parse_str("Table a { x int y int }\nTable b { x int y int }").unwrap();
        let a = schema.table("a").unwrap().id().unwrap();
        let b = schema.table("b").unwrap().id().unwrap();
        let reference = Reference::new(
            Relation::ManyToOne,
            vec![ColumnRef::new(a, "x"), ColumnRef::new(a, "y")],
            vec![ColumnRef::new(b, "x"), ColumnRef::new(b, "y")],
        )
        .inline();
        assert_eq!(
            DbmlRenderer
                .render(&schema, Entity::Reference(&reference))
                .unwrap_err(),
            RenderError::CompositeInlineReference
        );

        let mut schema = schema;
        schema.add_reference(reference).unwrap();
        assert_eq!(
            schema.dbml().unwrap_err(),
            RenderError::CompositeInlineReference
        );
    }

    #[test]
    fn test_other_blocks() {
        let schema = parse_str(
            r#"
            Project shop {
                database_type: 'PostgreSQL'
                Note: 'Line one
second'
            }
            Enum status {
                open [note: 'it\'s open']
            }
            Table orders { state status }
            TableGroup sales [color: #abc] { orders }
            Note todo { 'check' }
            "#,
        );
        // a line break inside a single-quoted string is a syntax error
        assert!(schema.is_err());

        let schema = parse_str(
            r#"
            Project shop {
                database_type: 'PostgreSQL'
                Note: '''
                    Line one
                    second
                    '''
            }
            Enum status {
                open [note: 'it\'s open']
            }
            Table orders { state status }
            TableGroup sales [color: #abc] { orders }
            Note todo { 'check' }
            "#,
        )
        .unwrap();
        assert_eq!(
            schema.dbml().unwrap(),
            r#"Project "shop" {
    database_type: 'PostgreSQL'
    Note {
        '''
        Line one
        second
        '''
    }
}

Enum "status" {
    "open" [note: 'it\'s open']
}

Table "orders" {
    "state" "status"
}

TableGroup "sales" [color: #abc] {
    "orders"
}

Note "todo" {
    'check'
}"#
        );
    }

    #[test]
    fn test_dangling_table_id() {
        let schema = Schema::new();
        let reference = Reference::new(
            Relation::ManyToOne,
            vec![ColumnRef::new(TableId::new(1), "x")],
            vec![ColumnRef::new(TableId::new(2), "y")],
        );
        assert!(matches!(
            DbmlRenderer.reference(&schema, &reference),
            Err(RenderError::Dangling(_))
        ));
    }
}
