// Integration tests for parsing and resolving DBML documents
use dbmlkit_core::error::{Error, ResolveError, ValidationError};
use dbmlkit_core::schema::{ColumnRef, Element, ElementId, Reference, Table, TableGroup};
use dbmlkit_core::types::{ColumnType, DefaultValue, IndexType, Relation};
use dbmlkit_core::{parse_str, Column, Schema};
use pretty_assertions::assert_eq;

const SHOP: &str = r#"
Project shop {
    database_type: 'PostgreSQL'
    Note: 'Online shop'
}

Enum shop.order_status {
    created [note: 'waiting for payment']
    paid
    shipped
}

// everyone who can log in
Table users as U [headercolor: #24BAB1] {
    id integer [pk, increment]
    email "character varying" [unique, not null]
    created_at timestamp [default: `now()`]
    Note: 'Registered users'
}

Table shop.orders {
    id integer [pk]
    user_id integer [ref: > U.id, not null]
    status shop.order_status [default: 'created']
    total "decimal"(10, 2) [note: 'gross amount']

    indexes {
        (user_id, status) [name: 'orders_by_user']
        total [type: hash]
    }
}

Table shop.order_items {
    order_id integer
    product_id integer
    quantity int [default: 1]

    indexes {
        (order_id, product_id) [pk]
    }
}

Ref items_order: shop.order_items.order_id > shop.orders.id [delete: cascade]

TableGroup commerce {
    shop.orders
    shop.order_items
}

Note release { 'Schema v2' }
"#;

fn shop() -> Schema {
    parse_str(SHOP).unwrap()
}

#[test]
fn test_spec_example_shape() {
    let schema = parse_str(
        "Table users { id integer [pk] name varchar }\n\
         Table posts { id integer [pk] user_id integer }\n\
         Ref: posts.user_id > users.id",
    )
    .unwrap();

    assert_eq!(schema.len(), 2);
    let reference = schema.references().next().unwrap();
    assert_eq!(reference.relation, Relation::ManyToOne);
    assert_eq!(reference.table1().unwrap(), schema.table("posts").unwrap().id().unwrap());
    assert_eq!(reference.table2().unwrap(), schema.table("users").unwrap().id().unwrap());
    assert_eq!(reference.col1[0].column, "user_id");
    assert_eq!(reference.col2[0].column, "id");
}

#[test]
fn test_entities_are_collected() {
    let schema = shop();

    assert_eq!(schema.len(), 3);
    assert_eq!(schema.enums().count(), 1);
    assert_eq!(schema.references().count(), 2);
    assert_eq!(schema.table_groups().len(), 1);
    assert_eq!(schema.sticky_notes().len(), 1);

    let project = schema.project().unwrap();
    assert_eq!(project.name, "shop");
    assert_eq!(project.note.as_ref().unwrap().text, "Online shop");
}

#[test]
fn test_table_attributes() {
    let schema = shop();
    let users = schema.table("U").unwrap();

    assert_eq!(users.name, "users");
    assert_eq!(users.schema, "public");
    assert_eq!(users.alias.as_deref(), Some("U"));
    assert_eq!(users.header_color.as_deref(), Some("#24BAB1"));
    assert_eq!(users.comment.as_deref(), Some("everyone who can log in"));
    assert_eq!(users.note.as_ref().unwrap().text, "Registered users");

    let id = users.column("id").unwrap();
    assert!(id.pk && id.autoinc);
    let email = users.column("email").unwrap();
    assert_eq!(email.column_type, ColumnType::from("character varying"));
    assert!(email.unique && email.not_null);
    assert_eq!(
        users.column("created_at").unwrap().default,
        Some(DefaultValue::Expression(dbmlkit_core::Expression::new("now()")))
    );
}

#[test]
fn test_lookup_by_name_alias_and_position() {
    let schema = shop();
    let by_alias = schema.table("U").unwrap().id();
    assert_eq!(schema.table("users").unwrap().id(), by_alias);
    assert_eq!(schema.table("public.users").unwrap().id(), by_alias);
    assert_eq!(schema.table(0usize).unwrap().id(), by_alias);
    assert_eq!(schema.table(1usize).unwrap().full_name(), "shop.orders");
    assert!(schema.table("orders").is_none());
    assert!(schema.table(9usize).is_none());
}

#[test]
fn test_enum_columns_are_substituted() {
    let schema = shop();
    let orders = schema.table("shop.orders").unwrap();
    let status = orders.column("status").unwrap();

    let id = status.column_type.enum_id().unwrap();
    let enumeration = schema.enum_by_id(id).unwrap();
    assert_eq!(enumeration.full_name(), "shop.order_status");
    assert_eq!(
        enumeration.items[0].note.as_ref().unwrap().text,
        "waiting for payment"
    );

    // type arguments stay verbatim
    assert_eq!(
        orders.column("total").unwrap().column_type.as_raw(),
        Some("decimal(10, 2)")
    );
}

#[test]
fn test_indexes() {
    let schema = shop();
    let orders = schema.table("shop.orders").unwrap();
    assert_eq!(orders.indexes.len(), 2);
    assert_eq!(orders.indexes[0].name.as_deref(), Some("orders_by_user"));
    assert_eq!(orders.indexes[1].index_type, Some(IndexType::Hash));

    let items = schema.table("shop.order_items").unwrap();
    assert!(items.indexes[0].pk);
    assert_eq!(items.indexes[0].table(), items.id());
}

#[test]
fn test_back_references_point_at_owner() {
    let schema = shop();
    for table in schema.tables() {
        for column in &table.columns {
            assert_eq!(column.table(), table.id());
        }
    }
}

#[test]
fn test_inline_and_standalone_references() {
    let schema = shop();
    let orders = schema.table("shop.orders").unwrap().id().unwrap();
    let users = schema.table("U").unwrap().id().unwrap();

    let inline: Vec<_> = schema.references().filter(|r| r.inline).collect();
    assert_eq!(inline.len(), 1);
    assert_eq!(inline[0].col1, vec![ColumnRef::new(orders, "user_id")]);
    assert_eq!(inline[0].col2, vec![ColumnRef::new(users, "id")]);

    let standalone = schema.references().find(|r| !r.inline).unwrap();
    assert_eq!(standalone.name.as_deref(), Some("items_order"));
    assert_eq!(standalone.on_delete.as_deref(), Some("cascade"));
    assert_eq!(schema.references_of(orders).count(), 2);
}

#[test]
fn test_syntax_error_location() {
    let err = parse_str("Table t {\n  id int\n  name varchar [nope]\n}").unwrap_err();
    match err {
        Error::Syntax(err) => {
            assert_eq!(err.span.line, 3);
            assert!(err.to_string().contains("at line 3"));
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn test_resolution_failures() {
    let err = parse_str("Table b { y int }\nRef: a.x > b.y").unwrap_err();
    assert!(matches!(err, Error::Resolve(ResolveError::TableNotFound(_))));

    let err = parse_str("Table a { x int }\nTable b { y int }\nRef: a.x > b.nope").unwrap_err();
    assert!(matches!(err, Error::Resolve(ResolveError::ColumnNotFound { .. })));

    let err = parse_str("Table a { x int }\nTableGroup g { a\n missing }").unwrap_err();
    assert!(matches!(err, Error::Resolve(ResolveError::TableNotFound(_))));
}

#[test]
fn test_duplicates_are_rejected() {
    let err = parse_str("Table a { x int }\nTable b as a { y int }").unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::DuplicateAlias(_))));

    let err = parse_str("Enum e { x }\nEnum e { y }").unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::DuplicateEnum(_))));
}

#[test]
fn test_mutation_api() {
    let mut schema = shop();

    let mut table = Table::new("tags");
    table.add_column(Column::new("id", "int").primary_key()).unwrap();
    table.add_column(Column::new("order_id", "int")).unwrap();
    let tags = schema.add_table(table).unwrap();
    let orders = schema.table("shop.orders").unwrap().id().unwrap();
    let reference = schema
        .add_reference(Reference::new(
            Relation::ManyToOne,
            vec![ColumnRef::new(tags, "order_id")],
            vec![ColumnRef::new(orders, "id")],
        ))
        .unwrap();
    assert_eq!(schema.references_of(tags).count(), 1);

    // a second identical reference is refused and nothing changes
    let duplicate = schema.reference(reference).unwrap().clone();
    assert!(schema.add_reference(duplicate).is_err());
    assert_eq!(schema.references().count(), 3);

    let removed = schema.delete_table(orders).unwrap();
    assert_eq!(removed.id(), None);
    assert_eq!(schema.references_of(tags).count(), 0);
    assert!(schema.table("shop.orders").is_none());
    assert_eq!(schema.table_group("commerce").unwrap().tables.len(), 1);
}

#[test]
fn test_untyped_add_and_delete() {
    let mut schema = Schema::new();
    let mut table = Table::new("t");
    table.add_column(Column::new("id", "int")).unwrap();
    let id = schema.add(Element::Table(table)).unwrap();
    let ElementId::Table(table) = id else {
        panic!("expected a table id");
    };

    schema
        .add(Element::TableGroup(TableGroup::new("g", vec![table])))
        .unwrap();
    assert!(schema.delete(ElementId::TableGroup("g".into())).is_ok());
    assert!(schema.delete(ElementId::TableGroup("g".into())).is_err());
    assert!(schema.delete(ElementId::Table(table)).is_ok());
    assert!(schema.is_empty());
}
