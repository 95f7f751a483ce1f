use crate::attributes::HtmlAttributes;
use crate::schema::{
    create_id, Column, Field, FieldOption, FieldType, FormSchema, Row, Section, SectionLayout,
    StaticBlock, StaticKind, TableSchema,
};

pub const DEFAULT_STATIC_HTML: &str = "<p>Add your text</p>";

/// `field_` followed by six hex characters.
pub fn generate_field_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("field_{}", &id[..6])
}

pub fn create_default_field(field_type: FieldType) -> Field {
    let type_name = field_type.as_str();
    let mut chars = type_name.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    let label = format!("{capitalized} field");

    let options = if field_type.has_options() {
        vec![
            FieldOption::new("Option 1", "option1"),
            FieldOption::new("Option 2", "option2"),
        ]
    } else {
        Vec::new()
    };

    Field {
        id: create_id(),
        field_type,
        name: generate_field_name(),
        placeholder: Some(format!("Enter {}", label.to_lowercase())),
        label,
        binding_property: None,
        original_id: None,
        original_name: None,
        html_attributes: HtmlAttributes::new(),
        help_text: None,
        default_value: None,
        options,
        validations: Vec::new(),
    }
}

pub fn create_static_block(html: Option<&str>, kind: StaticKind) -> StaticBlock {
    let label = match kind {
        StaticKind::Richtext => "Rich text",
        StaticKind::Html => "Static HTML",
    };
    StaticBlock {
        id: create_id(),
        html: html
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_STATIC_HTML)
            .to_string(),
        label: Some(label.to_string()),
        kind: Some(kind),
    }
}

pub fn create_empty_row() -> Row {
    Row::with_columns(vec![Column::new()])
}

pub fn create_empty_section(title: Option<&str>) -> Section {
    Section {
        id: create_id(),
        title: non_empty_or(title, "Untitled section"),
        layout: SectionLayout::Stack,
        rows: vec![create_empty_row()],
        table_attributes: HtmlAttributes::new(),
    }
}

fn column_with_text_field() -> Column {
    let mut column = Column::new();
    column.fields.push(create_default_field(FieldType::Text));
    column
}

/// Table-layout section with one row of `columns` cells, clamped to 1..=4.
pub fn create_table_section(title: Option<&str>, columns: Option<usize>) -> Section {
    let count = columns.unwrap_or(2).clamp(1, 4);
    let cells = (0..count).map(|_| column_with_text_field()).collect();

    Section {
        id: create_id(),
        title: non_empty_or(title, "Table section"),
        layout: SectionLayout::Table,
        rows: vec![Row::with_columns(cells)],
        table_attributes: table_attributes("6"),
    }
}

pub fn create_nested_table() -> TableSchema {
    TableSchema {
        id: create_id(),
        rows: vec![Row::with_columns(vec![column_with_text_field()])],
        table_attributes: table_attributes("4"),
    }
}

pub fn create_empty_form(name: Option<&str>) -> FormSchema {
    FormSchema {
        id: create_id(),
        name: non_empty_or(name, "Untitled form"),
        description: None,
        form_class: None,
        action_code: None,
        version: 1,
        sections: Vec::new(),
        original_html: None,
        original_head_html: None,
        original_body_html: None,
        remaining_body_html: None,
    }
}

fn table_attributes(cellpadding: &str) -> HtmlAttributes {
    [("border", "1"), ("cellpadding", cellpadding), ("cellspacing", "0")]
        .into_iter()
        .collect()
}

fn non_empty_or(value: Option<&str>, fallback: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
