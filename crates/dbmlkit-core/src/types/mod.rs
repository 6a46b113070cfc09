//! Value types shared by blueprints and the resolved model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::EnumId;

/// Relation kind of a reference, named after the operator in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// `>`
    ManyToOne,
    /// `<`
    OneToMany,
    /// `-`
    OneToOne,
    /// `<>`
    ManyToMany,
}

impl Relation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Relation::ManyToOne => ">",
            Relation::OneToMany => "<",
            Relation::OneToOne => "-",
            Relation::ManyToMany => "<>",
        }
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Relation::ManyToOne),
            "<" => Ok(Relation::OneToMany),
            "-" => Ok(Relation::OneToOne),
            "<>" => Ok(Relation::ManyToMany),
            _ => Err(format!("unknown relation '{}'", s)),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Column type: either the declared type text or a resolved enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Type text passed through verbatim, e.g. `varchar(255)` or `int[]`
    Raw(String),
    /// Enum declared in the same schema
    Enum(EnumId),
}

impl ColumnType {
    pub fn raw(text: impl Into<String>) -> Self {
        ColumnType::Raw(text.into())
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            ColumnType::Raw(text) => Some(text),
            ColumnType::Enum(_) => None,
        }
    }

    pub fn enum_id(&self) -> Option<EnumId> {
        match self {
            ColumnType::Enum(id) => Some(*id),
            ColumnType::Raw(_) => None,
        }
    }
}

impl From<&str> for ColumnType {
    fn from(text: &str) -> Self {
        ColumnType::Raw(text.to_string())
    }
}

/// Free-form expression text written between backticks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression {
    pub text: String,
}

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Parenthesized form used wherever SQL embeds the expression
    pub fn parenthesized(&self) -> String {
        format!("({})", self.text)
    }
}

/// Column default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    String(String),
    Integer(i64),
    /// Integer literal outside the `i64` range, kept as written
    Numeric(String),
    Float(f64),
    Boolean(bool),
    Null,
    Expression(Expression),
}

impl DefaultValue {
    /// Classify a numeric literal: a decimal point makes it a float
    pub fn parse_number(text: &str) -> Option<Self> {
        if text.contains('.') {
            return text.parse::<f64>().ok().map(DefaultValue::Float);
        }
        let digits = text.strip_prefix('-').unwrap_or(text);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(match text.parse::<i64>() {
            Ok(value) => DefaultValue::Integer(value),
            Err(_) => DefaultValue::Numeric(text.to_string()),
        })
    }

    /// Map the `true` / `false` / `null` keywords, case-insensitively
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "true" => Some(DefaultValue::Boolean(true)),
            "false" => Some(DefaultValue::Boolean(false)),
            "null" => Some(DefaultValue::Null),
            _ => None,
        }
    }
}

/// Index access method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    BTree,
    Hash,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::BTree => "btree",
            IndexType::Hash => "hash",
        }
    }
}

impl FromStr for IndexType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "btree" => Ok(IndexType::BTree),
            "hash" => Ok(IndexType::Hash),
            _ => Err(format!(
                "unknown index type '{}'. Supported types: btree, hash.",
                s
            )),
        }
    }
}

/// Render a float so that it reads back as a float
pub(crate) fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
