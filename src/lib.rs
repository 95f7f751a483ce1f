pub mod attributes;
pub mod builders;
pub mod checker;
pub mod config;
pub mod diagnostic;
pub mod editor;
pub mod export;
pub mod import;
pub mod library;
pub mod loader;
pub mod schema;

pub use attributes::HtmlAttributes;
pub use builders::{
    create_default_field, create_empty_form, create_empty_row, create_empty_section,
    create_nested_table, create_static_block, create_table_section,
};
pub use checker::check_schema;
pub use config::Config;
pub use diagnostic::Diagnostic;
pub use editor::{apply_edit, Edit, FieldPatch, FormPatch, RowPatch, SectionPatch};
pub use export::{export_file_name, render, schema_file_name, schema_to_html, HtmlExporter};
pub use import::{parse, parse_html_to_schema};
pub use library::{
    reassign_class, validate_action_code, ActionCode, ActionCodeLibrary, LibraryStore,
    PropertiesLibrary, PropertyDirectory,
};
pub use loader::{
    collect_form_files, encode_for_import, load_form_base64, load_form_content, load_form_path,
    LoadError,
};
pub use schema::{
    create_id, Column, DefaultValue, Field, FieldOption, FieldType, FormSchema, Row, Section,
    SectionLayout, StaticBlock, StaticKind, TableSchema, ValidationRule,
};
