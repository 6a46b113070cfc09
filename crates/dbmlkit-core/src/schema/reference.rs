//! Foreign-key references between tables

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, ValidationError};
use crate::types::Relation;

use super::catalog::{ReferenceId, Schema, TableId};
use super::model::{Column, Table};

/// One column of one table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: TableId,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: TableId, column: impl Into<String>) -> Self {
        Self {
            table,
            column: column.into(),
        }
    }
}

/// Reference between two column sets. Each side may be composite but must
/// stay within a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub relation: Relation,
    pub col1: Vec<ColumnRef>,
    pub col2: Vec<ColumnRef>,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
    /// Declared as a column setting rather than a `Ref` statement
    pub inline: bool,
    pub(crate) id: Option<ReferenceId>,
}

impl Reference {
    pub fn new(relation: Relation, col1: Vec<ColumnRef>, col2: Vec<ColumnRef>) -> Self {
        Self {
            relation,
            col1,
            col2,
            name: None,
            comment: None,
            on_update: None,
            on_delete: None,
            inline: false,
            id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_on_update(mut self, action: impl Into<String>) -> Self {
        self.on_update = Some(action.into());
        self
    }

    pub fn with_on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = Some(action.into());
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn id(&self) -> Option<ReferenceId> {
        self.id
    }

    pub fn table1(&self) -> Result<TableId, ValidationError> {
        side_table(&self.col1, 1)
    }

    pub fn table2(&self) -> Result<TableId, ValidationError> {
        side_table(&self.col2, 2)
    }

    pub fn touches(&self, table: TableId) -> bool {
        self.col1.iter().chain(&self.col2).any(|c| c.table == table)
    }

    /// `(source, target)` of the foreign key: `<` points from side 2 to side 1
    pub fn direction(&self) -> (&[ColumnRef], &[ColumnRef]) {
        match self.relation {
            Relation::OneToMany => (&self.col2, &self.col1),
            _ => (&self.col1, &self.col2),
        }
    }

    /// Table the foreign key constraint lives on
    pub fn source_table(&self) -> Result<TableId, ValidationError> {
        match self.relation {
            Relation::OneToMany => self.table2(),
            _ => self.table1(),
        }
    }

    /// Table the foreign key points at
    pub fn target_table(&self) -> Result<TableId, ValidationError> {
        match self.relation {
            Relation::OneToMany => self.table1(),
            _ => self.table2(),
        }
    }

    pub fn is_composite(&self) -> bool {
        self.col1.len() > 1 || self.col2.len() > 1
    }

    /// Abstract table standing in for a many-to-many reference: one
    /// not-null key column per referenced column, named `{table}_{column}`.
    pub fn join_table(&self, schema: &Schema) -> Result<Table, RenderError> {
        let table1 = schema.resolve_table(self.table1()?)?;
        let table2 = schema.resolve_table(self.table2()?)?;

        let mut join = Table::new(format!("{}_{}", table1.name, table2.name))
            .with_schema(table1.schema.clone());
        join.is_abstract = true;

        for (table, side) in [(table1, &self.col1), (table2, &self.col2)] {
            for column_ref in side {
                let column = schema.resolve_column(column_ref)?;
                let key = Column::new(
                    format!("{}_{}", table.name, column.name),
                    column.column_type.clone(),
                )
                .not_null()
                .primary_key();
                join.add_column(key)?;
            }
        }

        Ok(join)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |cols: &[ColumnRef]| {
            cols.iter()
                .map(|c| format!("{}.{}", c.table, c.column))
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "({}) {} ({})",
            side(&self.col1),
            self.relation,
            side(&self.col2)
        )
    }
}

fn side_table(columns: &[ColumnRef], side: u8) -> Result<TableId, ValidationError> {
    let first = columns
        .first()
        .ok_or(ValidationError::EmptyReferenceSide { side })?
        .table;
    if columns.iter().any(|c| c.table != first) {
        return Err(ValidationError::MixedTables { side });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_tables() {
        let a = TableId::new(0);
        let b = TableId::new(1);
        let reference = Reference::new(
            Relation::ManyToOne,
            vec![ColumnRef::new(a, "user_id")],
            vec![ColumnRef::new(b, "id")],
        );
        assert_eq!(reference.table1().unwrap(), a);
        assert_eq!(reference.table2().unwrap(), b);
        assert_eq!(reference.source_table().unwrap(), a);

        let mixed = Reference::new(
            Relation::ManyToOne,
            vec![ColumnRef::new(a, "x"), ColumnRef::new(b, "y")],
            vec![ColumnRef::new(b, "id")],
        );
        assert_eq!(
            mixed.table1().unwrap_err(),
            ValidationError::MixedTables { side: 1 }
        );
    }

    #[test]
    fn test_one_to_many_flips_direction() {
        let a = TableId::new(0);
        let b = TableId::new(1);
        let reference = Reference::new(
            Relation::OneToMany,
            vec![ColumnRef::new(a, "id")],
            vec![ColumnRef::new(b, "a_id")],
        );
        let (source, target) = reference.direction();
        assert_eq!(source[0].table, b);
        assert_eq!(target[0].table, a);
        assert_eq!(reference.source_table().unwrap(), b);
    }

    #[test]
    fn test_empty_side() {
        let reference = Reference::new(Relation::OneToOne, vec![], vec![]);
        assert_eq!(
            reference.table1().unwrap_err(),
            ValidationError::EmptyReferenceSide { side: 1 }
        );
    }
}
