//! Output formatting

use dbmlkit_core::{ColumnType, Error, Schema};
use miette::{IntoDiagnostic, Result};

/// Print a pipeline error for one input file
pub fn print_error(file_name: &str, error: Error) {
    eprintln!("\x1b[31merror\x1b[0m: {}", file_name);
    eprintln!("{:?}", miette::Report::new(error));
}

/// Human-readable table/column summary
pub fn summary(schema: &Schema) -> String {
    let mut out = String::new();
    out.push_str("Schema Information:\n");
    out.push_str("==================\n");

    for enumeration in schema.enums() {
        let items: Vec<&str> = enumeration.items.iter().map(|i| i.name.as_str()).collect();
        out.push_str(&format!(
            "\nEnum: {} ({})\n",
            enumeration.full_name(),
            items.join(", ")
        ));
    }

    for table in schema.tables() {
        match &table.alias {
            Some(alias) => out.push_str(&format!("\nTable: {} as {}\n", table.full_name(), alias)),
            None => out.push_str(&format!("\nTable: {}\n", table.full_name())),
        }
        for column in &table.columns {
            let data_type = match &column.column_type {
                ColumnType::Raw(raw) => raw.clone(),
                ColumnType::Enum(id) => schema
                    .enum_by_id(*id)
                    .map(|e| e.full_name())
                    .unwrap_or_else(|| id.to_string()),
            };
            let mut flags = Vec::new();
            if column.pk {
                flags.push("PK");
            }
            if column.unique {
                flags.push("UNIQUE");
            }
            flags.push(if column.not_null { "NOT NULL" } else { "NULL" });
            out.push_str(&format!(
                "  - {} {} {}\n",
                column.name,
                data_type,
                flags.join(" ")
            ));
        }
    }

    let references = schema.references().count();
    if references > 0 {
        out.push_str(&format!("\nReferences: {}\n", references));
    }
    out
}

pub fn json(schema: &Schema) -> Result<String> {
    serde_json::to_string_pretty(schema).into_diagnostic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summary() {
        let schema = dbmlkit_core::parse_str(
            r#"
            Enum status { open closed }
            Table users as U {
                id int [pk]
                state status [not null]
            }
            Ref: U.id < U.id
            "#,
        )
        .unwrap();
        assert_eq!(
            summary(&schema),
            "Schema Information:
==================

Enum: public.status (open, closed)

Table: public.users as U
  - id int PK NULL
  - state public.status NOT NULL

References: 1
"
        );
    }

    #[test]
    fn test_json_dump() {
        let schema = dbmlkit_core::parse_str("Table t { id int }").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json(&schema).unwrap()).unwrap();
        assert!(value.get("tables").is_some());
    }
}
