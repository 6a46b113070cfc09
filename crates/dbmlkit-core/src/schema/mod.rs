//! Schema management module

mod builder;
mod catalog;
mod model;
mod reference;

pub use builder::SchemaBuilder;
pub use catalog::{
    Element, ElementId, EnumId, QualifiedName, ReferenceId, Schema, TableId, TableKey,
};
pub use model::{
    full_name, Column, Enum, EnumItem, Index, IndexSubject, Note, Project, StickyNote, Table,
    TableGroup, DEFAULT_SCHEMA,
};
pub use reference::{ColumnRef, Reference};
