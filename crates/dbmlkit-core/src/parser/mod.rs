//! Grammar: turns source text into an ordered list of [`Blueprint`]s
//!
//! The parser never looks names up. Anything that refers to another entity
//! is kept as text and handed to the builder.

pub mod lexer;

use indexmap::IndexMap;

use crate::blueprint::*;
use crate::error::{Span, SyntaxError};
use crate::schema::QualifiedName;
use crate::types::{DefaultValue, IndexType, Relation};

use lexer::{Lexer, Spanned, Token};

/// Parse a whole document into blueprints
pub fn parse(source: &str) -> Result<Vec<Blueprint>, SyntaxError> {
    Parser::new(source)?.parse()
}

/// `[key: value, flag]` entry before interpretation
#[derive(Debug, Clone)]
struct Setting {
    key: String,
    value: Option<SettingValue>,
    span: Span,
}

#[derive(Debug, Clone)]
enum SettingValue {
    Str(String),
    Expr(String),
    Number(String),
    Words(String),
    Color(String),
    Ref(Relation, ColumnPath),
}

/// `[schema.]table.column` or `[schema.]table.(c1, c2)`
#[derive(Debug, Clone)]
struct ColumnPath {
    table: QualifiedName,
    columns: Vec<String>,
}

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, SyntaxError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
        })
    }

    /// Position of the next significant token; comments before it stay
    /// unconsumed
    fn significant(&self) -> usize {
        let mut pos = self.pos;
        while matches!(self.tokens[pos].token, Token::Comment(_)) {
            pos += 1;
        }
        pos
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.significant()].token
    }

    fn peek_spanned(&self) -> Spanned {
        self.tokens[self.significant()].clone()
    }

    /// n-th significant token ahead, without consuming anything
    fn peek_nth(&self, n: usize) -> &Token {
        let eof = &self.tokens[self.tokens.len() - 1].token;
        self.tokens[self.pos..]
            .iter()
            .filter(|t| !matches!(t.token, Token::Comment(_)))
            .nth(n)
            .map_or(eof, |t| &t.token)
    }

    fn advance(&mut self) -> Spanned {
        self.pos = self.significant();
        let tok = self.tokens[self.pos].clone();
        if tok.token != Token::Eof {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>, span: Span) -> SyntaxError {
        SyntaxError::new(message, span, self.source)
    }

    fn unexpected(&mut self, expected: &str) -> SyntaxError {
        let tok = self.peek_spanned();
        self.error(
            format!("unexpected {}, expected {}", tok.token.describe(), expected),
            tok.span,
        )
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<Span, SyntaxError> {
        if *self.peek() == expected {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<(String, Span), SyntaxError> {
        match self.peek().clone() {
            Token::Ident(s) | Token::QuotedIdent(s) => Ok((s, self.advance().span)),
            Token::Number(n) if !n.contains('.') => Ok((n, self.advance().span)),
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn check_keyword(&mut self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    fn at_note_element(&mut self) -> bool {
        self.check_keyword("note") && matches!(self.peek_nth(1), Token::Colon | Token::LBrace)
    }

    /// Comments directly in front of the next significant token
    fn leading_comments(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        while let Token::Comment(text) = &self.tokens[self.pos].token {
            lines.push(text.clone());
            self.pos += 1;
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    /// Comments on the same line as the token just consumed
    fn trailing_comment(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        while let Spanned {
            token: Token::Comment(text),
            newline_before: false,
            ..
        } = &self.tokens[self.pos]
        {
            lines.push(text.clone());
            self.pos += 1;
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    pub fn parse(&mut self) -> Result<Vec<Blueprint>, SyntaxError> {
        let mut blueprints = Vec::new();

        loop {
            let comment = self.leading_comments();
            let keyword = match self.peek().clone() {
                Token::Eof => break,
                Token::Ident(word) => word.to_ascii_lowercase(),
                _ => return Err(self.unexpected("Table, Ref, Enum, TableGroup, Project or Note")),
            };

            let blueprint = match keyword.as_str() {
                "table" => Blueprint::Table(self.parse_table(comment)?),
                "ref" => Blueprint::Reference(self.parse_ref(comment)?),
                "enum" => Blueprint::Enum(self.parse_enum(comment)?),
                "tablegroup" => Blueprint::TableGroup(self.parse_table_group(comment)?),
                "project" => Blueprint::Project(self.parse_project(comment)?),
                "note" => Blueprint::StickyNote(self.parse_sticky_note(comment)?),
                _ => return Err(self.unexpected("Table, Ref, Enum, TableGroup, Project or Note")),
            };
            blueprints.push(blueprint);
        }

        Ok(blueprints)
    }

    fn parse_qualified_name(&mut self, what: &str) -> Result<(QualifiedName, Span), SyntaxError> {
        let (first, span) = self.expect_name(what)?;
        if *self.peek() == Token::Dot {
            self.advance();
            let (name, end) = self.expect_name(what)?;
            Ok((QualifiedName::with_schema(first, name), span.to(end)))
        } else {
            Ok((QualifiedName::new(first), span))
        }
    }

    fn parse_table(&mut self, comment: Option<String>) -> Result<TableBlueprint, SyntaxError> {
        let start = self.advance().span;
        let (name, _) = self.parse_qualified_name("table name")?;

        let alias = if self.check_keyword("as") {
            self.advance();
            Some(self.expect_name("table alias")?.0)
        } else {
            None
        };

        let mut header_color = None;
        let mut note = None;
        if *self.peek() == Token::LBracket {
            for setting in self.parse_settings()? {
                match setting.key.as_str() {
                    "headercolor" => header_color = Some(self.color_value(&setting)?),
                    "note" => note = Some(self.note_value(&setting)?),
                    _ => return Err(self.unknown_setting("table", &setting)),
                }
            }
        }

        self.expect(Token::LBrace, "'{'")?;
        let comment = join_comments(comment, self.trailing_comment());

        let mut columns = Vec::new();
        let mut indexes = Vec::new();
        loop {
            let element_comment = self.leading_comments();
            if *self.peek() == Token::RBrace {
                break;
            }
            if self.at_note_element() {
                note = Some(self.parse_note_element()?);
            } else if self.check_keyword("indexes") && *self.peek_nth(1) == Token::LBrace {
                indexes.extend(self.parse_indexes()?);
            } else {
                columns.push(self.parse_column(element_comment)?);
            }
        }
        let end = self.expect(Token::RBrace, "'}'")?;

        if columns.is_empty() {
            return Err(self.error(
                format!("table '{}' must define at least one column", name),
                start.to(end),
            ));
        }

        for column in &mut columns {
            for reference in &mut column.refs {
                reference.table1 = Some(name.clone());
                reference.col1 = vec![column.name.clone()];
            }
        }

        Ok(TableBlueprint {
            name,
            alias,
            columns,
            indexes,
            note,
            header_color,
            comment: join_comments(comment, self.trailing_comment()),
            span: start.to(end),
        })
    }

    fn parse_column(&mut self, comment: Option<String>) -> Result<ColumnBlueprint, SyntaxError> {
        let (name, start) = self.expect_name("column name, Note or indexes")?;
        let type_name = self.parse_column_type()?;

        let mut column = ColumnBlueprint {
            name,
            type_name,
            unique: false,
            not_null: false,
            pk: false,
            autoinc: false,
            default: None,
            note: None,
            comment: None,
            properties: IndexMap::new(),
            refs: Vec::new(),
            span: start,
        };

        if *self.peek() == Token::LBracket {
            for setting in self.parse_settings()? {
                match setting.key.as_str() {
                    "pk" | "primary key" => {
                        self.flag(&setting)?;
                        column.pk = true;
                    }
                    "unique" => {
                        self.flag(&setting)?;
                        column.unique = true;
                    }
                    "not null" => {
                        self.flag(&setting)?;
                        column.not_null = true;
                    }
                    "null" => {
                        self.flag(&setting)?;
                        column.not_null = false;
                    }
                    "increment" => {
                        self.flag(&setting)?;
                        column.autoinc = true;
                    }
                    "default" => column.default = Some(self.default_value(&setting)?),
                    "note" => column.note = Some(self.note_value(&setting)?),
                    "ref" => match setting.value {
                        Some(SettingValue::Ref(relation, path)) => {
                            column.refs.push(ReferenceBlueprint {
                                relation,
                                name: None,
                                table1: None,
                                col1: Vec::new(),
                                table2: path.table,
                                col2: path.columns,
                                on_update: None,
                                on_delete: None,
                                comment: None,
                                inline: true,
                                span: setting.span,
                            });
                        }
                        _ => return Err(self.error("expected reference target", setting.span)),
                    },
                    _ => match setting.value {
                        Some(SettingValue::Str(value)) => {
                            column.properties.insert(setting.key, value);
                        }
                        _ => return Err(self.unknown_setting("column", &setting)),
                    },
                }
            }
        }

        column.comment = join_comments(comment, self.trailing_comment());
        Ok(column)
    }

    /// `name[.name][(args...)][[]]`, argument list copied verbatim
    fn parse_column_type(&mut self) -> Result<String, SyntaxError> {
        let (mut text, _) = self.expect_name("column type")?;
        if *self.peek() == Token::Dot {
            self.advance();
            text.push('.');
            text.push_str(&self.expect_name("column type")?.0);
        }

        if *self.peek() == Token::LParen {
            let open = self.advance().span;
            let mut depth = 1usize;
            let close = loop {
                let tok = self.advance();
                match tok.token {
                    Token::LParen => depth += 1,
                    Token::RParen => {
                        depth -= 1;
                        if depth == 0 {
                            break tok.span;
                        }
                    }
                    Token::Eof => return Err(self.error("unclosed type arguments", open)),
                    _ => {}
                }
            };
            text.push_str(&self.source[open.offset..close.offset + close.length]);
        }

        if *self.peek() == Token::LBracket && *self.peek_nth(1) == Token::RBracket {
            self.advance();
            self.advance();
            text.push_str("[]");
        }

        Ok(text)
    }

    fn parse_note_element(&mut self) -> Result<NoteBlueprint, SyntaxError> {
        self.advance();
        if *self.peek() == Token::Colon {
            self.advance();
            let text = self.expect_string("note text")?;
            Ok(NoteBlueprint { text })
        } else {
            self.expect(Token::LBrace, "'{'")?;
            let text = self.expect_string("note text")?;
            self.expect(Token::RBrace, "'}'")?;
            Ok(NoteBlueprint { text })
        }
    }

    fn parse_indexes(&mut self) -> Result<Vec<IndexBlueprint>, SyntaxError> {
        self.advance();
        self.expect(Token::LBrace, "'{'")?;

        let mut indexes = Vec::new();
        loop {
            let comment = self.leading_comments();
            if *self.peek() == Token::RBrace {
                break;
            }
            indexes.push(self.parse_index(comment)?);
        }
        self.expect(Token::RBrace, "'}'")?;

        Ok(indexes)
    }

    fn parse_index(&mut self, comment: Option<String>) -> Result<IndexBlueprint, SyntaxError> {
        let start = self.peek_spanned().span;
        let subjects = if *self.peek() == Token::LParen {
            self.advance();
            let mut subjects = vec![self.parse_index_subject()?];
            while *self.peek() == Token::Comma {
                self.advance();
                subjects.push(self.parse_index_subject()?);
            }
            self.expect(Token::RParen, "',' or ')'")?;
            subjects
        } else {
            vec![self.parse_index_subject()?]
        };

        let mut index = IndexBlueprint {
            subjects,
            name: None,
            unique: false,
            pk: false,
            index_type: None,
            note: None,
            comment: None,
            span: start,
        };

        if *self.peek() == Token::LBracket {
            for setting in self.parse_settings()? {
                match setting.key.as_str() {
                    "pk" => {
                        self.flag(&setting)?;
                        index.pk = true;
                    }
                    "unique" => {
                        self.flag(&setting)?;
                        index.unique = true;
                    }
                    "name" => index.name = Some(self.text_value(&setting)?),
                    "type" => {
                        let text = self.text_value(&setting)?;
                        let index_type: IndexType =
                            text.parse().map_err(|e: String| self.error(e, setting.span))?;
                        index.index_type = Some(index_type);
                    }
                    "note" => index.note = Some(self.note_value(&setting)?),
                    _ => return Err(self.unknown_setting("index", &setting)),
                }
            }
        }

        index.comment = join_comments(comment, self.trailing_comment());
        Ok(index)
    }

    fn parse_index_subject(&mut self) -> Result<IndexSubjectBlueprint, SyntaxError> {
        if let Token::Expr(text) = self.peek().clone() {
            self.advance();
            return Ok(IndexSubjectBlueprint::Expression(ExpressionBlueprint { text }));
        }
        let (name, _) = self.expect_name("column name or expression")?;
        Ok(IndexSubjectBlueprint::Column(name))
    }

    fn parse_ref(&mut self, comment: Option<String>) -> Result<ReferenceBlueprint, SyntaxError> {
        let start = self.advance().span;
        let first = self.pos;

        let name = match self.peek() {
            Token::Ident(_) | Token::QuotedIdent(_) => Some(self.expect_name("reference name")?.0),
            _ => None,
        };

        match self.peek() {
            Token::Colon => {
                self.advance();
                let mut reference = self.parse_ref_body(name, start)?;
                let wrapped = self.tokens[first..self.pos]
                    .iter()
                    .find(|t| t.newline_before && !matches!(t.token, Token::Comment(_)))
                    .map(|t| t.span);
                if let Some(span) = wrapped {
                    return Err(self.error("short reference must fit on one line", span));
                }
                reference.comment = join_comments(comment, self.trailing_comment());
                let next = &self.tokens[self.pos];
                if next.token != Token::Eof && !next.newline_before {
                    return Err(self.error("expected end of line after reference", next.span));
                }
                Ok(reference)
            }
            Token::LBrace => {
                self.advance();
                let mut reference = self.parse_ref_body(name, start)?;
                let end = self.expect(Token::RBrace, "'}'")?;
                reference.span = start.to(end);
                reference.comment = join_comments(comment, self.trailing_comment());
                Ok(reference)
            }
            _ => Err(self.unexpected("':' or '{'")),
        }
    }

    fn parse_ref_body(
        &mut self,
        name: Option<String>,
        start: Span,
    ) -> Result<ReferenceBlueprint, SyntaxError> {
        let left = self.parse_column_path()?;
        let relation = self.parse_relation()?;
        let right = self.parse_column_path()?;

        let mut reference = ReferenceBlueprint {
            relation,
            name,
            table1: Some(left.table),
            col1: left.columns,
            table2: right.table,
            col2: right.columns,
            on_update: None,
            on_delete: None,
            comment: None,
            inline: false,
            span: start,
        };

        if *self.peek() == Token::LBracket {
            for setting in self.parse_settings()? {
                match setting.key.as_str() {
                    "update" => reference.on_update = Some(self.text_value(&setting)?),
                    "delete" => reference.on_delete = Some(self.text_value(&setting)?),
                    // accepted for compatibility, not rendered
                    "color" => {
                        self.color_value(&setting)?;
                    }
                    _ => return Err(self.unknown_setting("reference", &setting)),
                }
            }
        }

        Ok(reference)
    }

    fn parse_relation(&mut self) -> Result<Relation, SyntaxError> {
        let relation = match self.peek() {
            Token::Gt => Relation::ManyToOne,
            Token::Lt => Relation::OneToMany,
            Token::Dash => Relation::OneToOne,
            Token::LtGt => Relation::ManyToMany,
            _ => return Err(self.unexpected("relation ('>', '<', '-' or '<>')")),
        };
        self.advance();
        Ok(relation)
    }

    fn parse_column_path(&mut self) -> Result<ColumnPath, SyntaxError> {
        let (first, start) = self.expect_name("table name")?;
        let mut parts = vec![first];
        let mut composite = None;

        while *self.peek() == Token::Dot {
            self.advance();
            if *self.peek() == Token::LParen {
                composite = Some(self.parse_name_list()?);
                break;
            }
            parts.push(self.expect_name("column name")?.0);
        }

        let columns = match composite {
            Some(columns) => columns,
            None if parts.len() >= 2 => parts.pop().into_iter().collect(),
            None => {
                return Err(self.error(
                    format!("expected '<table>.<column>', found '{}'", parts.join(".")),
                    start,
                ))
            }
        };

        let table = match parts.as_slice() {
            [table] => QualifiedName::new(table.clone()),
            [schema, table] => QualifiedName::with_schema(schema.clone(), table.clone()),
            _ => {
                return Err(self.error(
                    format!("too many name segments in '{}'", parts.join(".")),
                    start,
                ))
            }
        };

        Ok(ColumnPath { table, columns })
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>, SyntaxError> {
        self.expect(Token::LParen, "'('")?;
        let mut names = vec![self.expect_name("column name")?.0];
        while *self.peek() == Token::Comma {
            self.advance();
            names.push(self.expect_name("column name")?.0);
        }
        self.expect(Token::RParen, "',' or ')'")?;
        Ok(names)
    }

    fn parse_enum(&mut self, comment: Option<String>) -> Result<EnumBlueprint, SyntaxError> {
        let start = self.advance().span;
        let (name, _) = self.parse_qualified_name("enum name")?;
        self.expect(Token::LBrace, "'{'")?;

        let mut items = Vec::new();
        loop {
            let item_comment = self.leading_comments();
            if *self.peek() == Token::RBrace {
                break;
            }
            let (item_name, _) = self.expect_name("enum item")?;
            let mut note = None;
            if *self.peek() == Token::LBracket {
                for setting in self.parse_settings()? {
                    match setting.key.as_str() {
                        "note" => note = Some(self.note_value(&setting)?),
                        _ => return Err(self.unknown_setting("enum item", &setting)),
                    }
                }
            }
            items.push(EnumItemBlueprint {
                name: item_name,
                note,
                comment: join_comments(item_comment, self.trailing_comment()),
            });
        }
        let end = self.expect(Token::RBrace, "'}'")?;

        if items.is_empty() {
            return Err(self.error(
                format!("enum '{}' must define at least one item", name),
                start.to(end),
            ));
        }

        Ok(EnumBlueprint {
            name,
            items,
            comment: join_comments(comment, self.trailing_comment()),
            span: start.to(end),
        })
    }

    fn parse_table_group(
        &mut self,
        comment: Option<String>,
    ) -> Result<TableGroupBlueprint, SyntaxError> {
        let start = self.advance().span;
        let (name, _) = self.expect_name("table group name")?;

        let mut color = None;
        let mut note = None;
        if *self.peek() == Token::LBracket {
            for setting in self.parse_settings()? {
                match setting.key.as_str() {
                    "color" => color = Some(self.color_value(&setting)?),
                    "note" => note = Some(self.note_value(&setting)?),
                    _ => return Err(self.unknown_setting("table group", &setting)),
                }
            }
        }

        self.expect(Token::LBrace, "'{'")?;
        let mut items = Vec::new();
        loop {
            self.leading_comments();
            if *self.peek() == Token::RBrace {
                break;
            }
            if self.at_note_element() {
                note = Some(self.parse_note_element()?);
                continue;
            }
            items.push(self.parse_qualified_name("table name")?.0);
        }
        let end = self.expect(Token::RBrace, "'}'")?;

        if items.is_empty() {
            return Err(self.error(
                format!("table group '{}' must list at least one table", name),
                start.to(end),
            ));
        }

        Ok(TableGroupBlueprint {
            name,
            items,
            color,
            note,
            comment: join_comments(comment, self.trailing_comment()),
            span: start.to(end),
        })
    }

    fn parse_project(&mut self, comment: Option<String>) -> Result<ProjectBlueprint, SyntaxError> {
        let start = self.advance().span;
        let (name, _) = self.expect_name("project name")?;
        self.expect(Token::LBrace, "'{'")?;

        let mut items = IndexMap::new();
        let mut note = None;
        loop {
            self.leading_comments();
            if *self.peek() == Token::RBrace {
                break;
            }
            if self.at_note_element() {
                note = Some(self.parse_note_element()?);
                continue;
            }
            let (key, _) = self.expect_name("project setting")?;
            self.expect(Token::Colon, "':'")?;
            let value = self.expect_string("project setting value")?;
            items.insert(key, value);
        }
        let end = self.expect(Token::RBrace, "'}'")?;

        Ok(ProjectBlueprint {
            name,
            items,
            note,
            comment: join_comments(comment, self.trailing_comment()),
            span: start.to(end),
        })
    }

    fn parse_sticky_note(
        &mut self,
        comment: Option<String>,
    ) -> Result<StickyNoteBlueprint, SyntaxError> {
        let start = self.advance().span;
        let (name, _) = self.expect_name("note name")?;
        self.expect(Token::LBrace, "'{'")?;
        let text = self.expect_string("note text")?;
        let end = self.expect(Token::RBrace, "'}'")?;

        Ok(StickyNoteBlueprint {
            name,
            text,
            comment: join_comments(comment, self.trailing_comment()),
            span: start.to(end),
        })
    }

    // --- settings -------------------------------------------------------

    fn parse_settings(&mut self) -> Result<Vec<Setting>, SyntaxError> {
        self.expect(Token::LBracket, "'['")?;
        let mut settings = Vec::new();
        loop {
            settings.push(self.parse_setting()?);
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RBracket => {
                    self.advance();
                    break;
                }
                _ => return Err(self.unexpected("',' or ']'")),
            }
        }
        Ok(settings)
    }

    fn parse_setting(&mut self) -> Result<Setting, SyntaxError> {
        let start = self.peek_spanned().span;
        let mut words = Vec::new();
        while let Token::Ident(word) = self.peek().clone() {
            self.advance();
            words.push(word.to_ascii_lowercase());
        }
        if words.is_empty() {
            return Err(self.unexpected("setting"));
        }
        let key = words.join(" ");

        let value = if *self.peek() == Token::Colon {
            self.advance();
            if key == "ref" {
                let relation = self.parse_relation()?;
                let path = self.parse_column_path()?;
                Some(SettingValue::Ref(relation, path))
            } else {
                Some(self.parse_setting_value()?)
            }
        } else {
            None
        };

        Ok(Setting { key, value, span: start })
    }

    fn parse_setting_value(&mut self) -> Result<SettingValue, SyntaxError> {
        let value = match self.peek().clone() {
            Token::Str(s) => SettingValue::Str(s),
            Token::Expr(e) => SettingValue::Expr(e),
            Token::Number(n) => SettingValue::Number(n),
            Token::Color(c) => SettingValue::Color(c),
            Token::Dash => {
                self.advance();
                return match self.peek().clone() {
                    Token::Number(n) => {
                        self.advance();
                        Ok(SettingValue::Number(format!("-{}", n)))
                    }
                    _ => Err(self.unexpected("number")),
                };
            }
            Token::Ident(_) | Token::QuotedIdent(_) => {
                let mut words = Vec::new();
                while let Token::Ident(w) | Token::QuotedIdent(w) = self.peek().clone() {
                    self.advance();
                    words.push(w);
                }
                return Ok(SettingValue::Words(words.join(" ")));
            }
            _ => return Err(self.unexpected("setting value")),
        };
        self.advance();
        Ok(value)
    }

    fn unknown_setting(&self, owner: &str, setting: &Setting) -> SyntaxError {
        self.error(
            format!("unknown {} setting '{}'", owner, setting.key),
            setting.span,
        )
    }

    fn flag(&self, setting: &Setting) -> Result<(), SyntaxError> {
        match setting.value {
            None => Ok(()),
            Some(_) => Err(self.error(
                format!("setting '{}' does not take a value", setting.key),
                setting.span,
            )),
        }
    }

    fn note_value(&self, setting: &Setting) -> Result<NoteBlueprint, SyntaxError> {
        match &setting.value {
            Some(SettingValue::Str(text)) => Ok(NoteBlueprint { text: text.clone() }),
            _ => Err(self.error("expected a string for 'note'", setting.span)),
        }
    }

    fn color_value(&self, setting: &Setting) -> Result<String, SyntaxError> {
        match &setting.value {
            Some(SettingValue::Color(color)) => Ok(color.clone()),
            _ => Err(self.error(
                format!("expected a color like #3498DB for '{}'", setting.key),
                setting.span,
            )),
        }
    }

    /// Free-text value: a string or bare words such as `set null`
    fn text_value(&self, setting: &Setting) -> Result<String, SyntaxError> {
        match &setting.value {
            Some(SettingValue::Str(text)) | Some(SettingValue::Words(text)) => Ok(text.clone()),
            _ => Err(self.error(
                format!("expected a value for '{}'", setting.key),
                setting.span,
            )),
        }
    }

    fn default_value(&self, setting: &Setting) -> Result<DefaultValue, SyntaxError> {
        let invalid = || {
            self.error(
                "expected a string, number, expression, true, false or null for 'default'",
                setting.span,
            )
        };
        match &setting.value {
            Some(SettingValue::Str(s)) => Ok(DefaultValue::String(s.clone())),
            Some(SettingValue::Expr(e)) => {
                Ok(DefaultValue::Expression(crate::types::Expression::new(e.clone())))
            }
            Some(SettingValue::Number(n)) => DefaultValue::parse_number(n).ok_or_else(invalid),
            Some(SettingValue::Words(w)) => DefaultValue::from_keyword(w).ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }
}

fn join_comments(leading: Option<String>, trailing: Option<String>) -> Option<String> {
    match (leading, trailing) {
        (Some(a), Some(b)) => Some(format!("{}\n{}", a, b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(input: &str) -> Vec<TableBlueprint> {
        parse(input)
            .unwrap()
            .into_iter()
            .filter_map(|b| match b {
                Blueprint::Table(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_table_on_one_line() {
        let tables = tables("Table users { id integer [pk] name varchar }");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, QualifiedName::new("users"));
        assert_eq!(tables[0].columns.len(), 2);
        assert!(tables[0].columns[0].pk);
        assert_eq!(tables[0].columns[1].type_name, "varchar");
    }

    #[test]
    fn test_parse_keywords_case_insensitive() {
        let blueprints = parse("TABLE a { id int }\nref: a.id - a.id\nENUM e { x }").unwrap();
        let kinds: Vec<_> = blueprints.iter().map(|b| b.kind()).collect();
        assert_eq!(kinds, vec!["table", "reference", "enum"]);
    }

    #[test]
    fn test_parse_schema_alias_and_settings() {
        let input = r#"
            Table auth."users" as U [headercolor: #3498DB, note: 'people'] {
                id int
            }
        "#;
        let table = &tables(input)[0];
        assert_eq!(table.name, QualifiedName::with_schema("auth", "users"));
        assert_eq!(table.alias.as_deref(), Some("U"));
        assert_eq!(table.header_color.as_deref(), Some("#3498DB"));
        assert_eq!(table.note.as_ref().unwrap().text, "people");
    }

    #[test]
    fn test_parse_column_types() {
        let input = r#"
            Table t {
                a varchar(255)
                b decimal(10, 2)
                c int[]
                d "double precision"
                e auth.role [not null]
            }
        "#;
        let columns = &tables(input)[0].columns;
        let types: Vec<_> = columns.iter().map(|c| c.type_name.as_str()).collect();
        assert_eq!(
            types,
            vec!["varchar(255)", "decimal(10, 2)", "int[]", "double precision", "auth.role"]
        );
        assert!(columns[4].not_null);
    }

    #[test]
    fn test_parse_column_settings() {
        let input = r#"
            Table t {
                id int [primary key, increment]
                status varchar [null, unique, default: 'new', note: 'it\'s fine']
                price float [default: -1.5]
                flag bool [default: TRUE]
                created timestamp [default: `now()`]
                tag text [charset: 'utf8']
            }
        "#;
        let columns = &tables(input)[0].columns;
        assert!(columns[0].pk && columns[0].autoinc);
        assert!(columns[1].unique && !columns[1].not_null);
        assert_eq!(
            columns[1].default,
            Some(DefaultValue::String("new".into()))
        );
        assert_eq!(columns[1].note.as_ref().unwrap().text, "it's fine");
        assert_eq!(columns[2].default, Some(DefaultValue::Float(-1.5)));
        assert_eq!(columns[3].default, Some(DefaultValue::Boolean(true)));
        assert_eq!(
            columns[4].default,
            Some(DefaultValue::Expression(crate::types::Expression::new("now()")))
        );
        assert_eq!(columns[5].properties.get("charset").map(String::as_str), Some("utf8"));
    }

    #[test]
    fn test_inline_ref_gets_owning_table() {
        let input = "Table posts { user_id int [ref: > users.id] }";
        let table = &tables(input)[0];
        let reference = &table.columns[0].refs[0];
        assert!(reference.inline);
        assert_eq!(reference.relation, Relation::ManyToOne);
        assert_eq!(reference.table1, Some(QualifiedName::new("posts")));
        assert_eq!(reference.col1, vec!["user_id"]);
        assert_eq!(reference.table2, QualifiedName::new("users"));
        assert_eq!(reference.col2, vec!["id"]);
    }

    #[test]
    fn test_parse_indexes() {
        let input = r#"
            Table t {
                id int
                a int
                b int
                indexes {
                    id [pk]
                    (a, b) [unique, name: 'a_b_idx', type: hash]
                    `lower(a)`
                    ("a", `b * 2`) [note: 'mixed']
                }
            }
        "#;
        let indexes = &tables(input)[0].indexes;
        assert_eq!(indexes.len(), 4);
        assert!(indexes[0].pk);
        assert_eq!(indexes[1].name.as_deref(), Some("a_b_idx"));
        assert_eq!(indexes[1].index_type, Some(IndexType::Hash));
        assert_eq!(
            indexes[2].subjects,
            vec![IndexSubjectBlueprint::Expression(ExpressionBlueprint {
                text: "lower(a)".into()
            })]
        );
        assert_eq!(indexes[3].subjects.len(), 2);
    }

    #[test]
    fn test_parse_short_and_long_refs() {
        let input = r#"
            Ref: posts.user_id > users.id [delete: set null, update: cascade]
            Ref fk_name {
                shop.orders.(a, b) <> shop.items.(c, d)
            }
        "#;
        let blueprints = parse(input).unwrap();
        let Blueprint::Reference(short) = &blueprints[0] else {
            panic!("expected reference");
        };
        assert_eq!(short.on_delete.as_deref(), Some("set null"));
        assert_eq!(short.on_update.as_deref(), Some("cascade"));
        let Blueprint::Reference(long) = &blueprints[1] else {
            panic!("expected reference");
        };
        assert_eq!(long.name.as_deref(), Some("fk_name"));
        assert_eq!(long.relation, Relation::ManyToMany);
        assert_eq!(long.table1, Some(QualifiedName::with_schema("shop", "orders")));
        assert_eq!(long.col2, vec!["c", "d"]);
    }

    #[test]
    fn test_short_ref_must_end_line() {
        let err = parse("Ref: a.b > c.d Table t { id int }").unwrap_err();
        assert!(err.message.contains("end of line"));
        assert!(parse("Ref: a.b > c.d // trailing\nTable t { id int }").is_ok());
    }

    #[test]
    fn test_short_ref_cannot_wrap() {
        for input in [
            "Ref: a.x >\n b.y",
            "Ref: a.x\n > b.y",
            "Ref:\n a.x > b.y",
            "Ref: a.x > b.y\n[delete: cascade]",
            "Ref name: a.x > b.y [delete: cascade,\n update: cascade]",
        ] {
            let err = parse(input).unwrap_err();
            assert_eq!(err.message, "short reference must fit on one line", "{input}");
            assert_eq!(err.span.line, 2, "{input}");
        }

        // the long form may span lines
        assert!(parse("Ref {\n a.x >\n b.y\n [delete: cascade]\n}").is_ok());
    }

    #[test]
    fn test_comments_attach_to_elements() {
        let input = r#"
            // first
            // second
            Table t { // same line
                // about id
                id int // after id
            }
        "#;
        let table = &tables(input)[0];
        assert_eq!(table.comment.as_deref(), Some("first\nsecond\nsame line"));
        assert_eq!(
            table.columns[0].comment.as_deref(),
            Some("about id\nafter id")
        );
    }

    #[test]
    fn test_trailing_comments_without_settings() {
        let input = r#"
            Enum e {
                a // after a
                b [note: 'with settings'] // after b
            }
            Table t {
                id int // after id
                total decimal(10, 2) // after total
                tags text[] // after tags
                kind e.kind // after kind
                indexes {
                    id // after idx
                    (id, total) // after pair
                }
            }
            Ref: t.id - t.id // after ref
            Ref: s.t.(a, b) > u.(c, d) // after composite
        "#;
        let blueprints = parse(input).unwrap();

        let Blueprint::Enum(e) = &blueprints[0] else { panic!() };
        assert_eq!(e.items[0].comment.as_deref(), Some("after a"));
        assert_eq!(e.items[1].comment.as_deref(), Some("after b"));

        let Blueprint::Table(t) = &blueprints[1] else { panic!() };
        let comments: Vec<_> = t.columns.iter().map(|c| c.comment.as_deref()).collect();
        assert_eq!(
            comments,
            vec![
                Some("after id"),
                Some("after total"),
                Some("after tags"),
                Some("after kind")
            ]
        );
        assert_eq!(t.indexes[0].comment.as_deref(), Some("after idx"));
        assert_eq!(t.indexes[1].comment.as_deref(), Some("after pair"));

        let Blueprint::Reference(r) = &blueprints[2] else { panic!() };
        assert_eq!(r.comment.as_deref(), Some("after ref"));
        let Blueprint::Reference(r) = &blueprints[3] else { panic!() };
        assert_eq!(r.comment.as_deref(), Some("after composite"));
    }

    #[test]
    fn test_comment_on_next_line_leads_next_element() {
        let input = "Table t {\n  id int\n  // about name\n  name text\n}";
        let columns = &tables(input)[0].columns;
        assert_eq!(columns[0].comment, None);
        assert_eq!(columns[1].comment.as_deref(), Some("about name"));
    }

    #[test]
    fn test_parse_enum_group_project_note() {
        let input = r#"
            Enum shop.status {
                active [note: 'on']
                "sold out"
            }
            TableGroup core [color: #aabbcc] {
                users
                shop.orders
            }
            Project demo {
                database_type: 'PostgreSQL'
                Note: '''
                    Multi
                    line
                    '''
            }
            Note todo {
                'remember'
            }
        "#;
        let blueprints = parse(input).unwrap();
        let Blueprint::Enum(e) = &blueprints[0] else { panic!() };
        assert_eq!(e.items[1].name, "sold out");
        let Blueprint::TableGroup(g) = &blueprints[1] else { panic!() };
        assert_eq!(g.items[1], QualifiedName::with_schema("shop", "orders"));
        assert_eq!(g.color.as_deref(), Some("#aabbcc"));
        let Blueprint::Project(p) = &blueprints[2] else { panic!() };
        assert_eq!(p.items.get("database_type").map(String::as_str), Some("PostgreSQL"));
        assert_eq!(p.note.as_ref().unwrap().text, "Multi\nline");
        let Blueprint::StickyNote(n) = &blueprints[3] else { panic!() };
        assert_eq!(n.text, "remember");
    }

    #[test]
    fn test_syntax_errors_report_location() {
        let err = parse("Table t {\n  id int [bogus]\n}").unwrap_err();
        assert_eq!(err.message, "unknown column setting 'bogus'");
        assert_eq!(err.span.line, 2);

        let err = parse("Table t { }").unwrap_err();
        assert!(err.message.contains("at least one column"));

        let err = parse("Index t { }").unwrap_err();
        assert!(err.message.starts_with("unexpected 'Index'"));
    }
}
