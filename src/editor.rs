//! Copy-on-write editing of a form schema.
//!
//! Every [`Edit`] is applied to a copy: [`apply_edit`] never touches the
//! schema it is given, so callers can keep previous versions for undo.
//! Targets are addressed by id; an id that matches nothing leaves the
//! schema unchanged.

use crate::attributes::HtmlAttributes;
use crate::builders::{
    create_default_field, create_empty_row, create_empty_section, create_nested_table,
    create_static_block, create_table_section,
};
use crate::schema::{
    visit_columns_mut, Column, DefaultValue, Field, FieldOption, FieldType, FormSchema, Row,
    SectionLayout, StaticKind, ValidationRule,
};
use serde::{Deserialize, Deserializer};

/// Keeps an explicit `null` apart from an absent key: absent is `None`,
/// `null` is `Some(None)`.
fn clearable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Form-level properties to change. `Some(None)` clears an optional value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormPatch {
    pub name: Option<String>,
    #[serde(deserialize_with = "clearable")]
    pub description: Option<Option<String>>,
    #[serde(deserialize_with = "clearable")]
    pub form_class: Option<Option<String>>,
    #[serde(deserialize_with = "clearable")]
    pub action_code: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SectionPatch {
    pub title: Option<String>,
    pub layout: Option<SectionLayout>,
    pub table_attributes: Option<HtmlAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RowPatch {
    pub html_attributes: Option<HtmlAttributes>,
}

/// Field properties to change. `Some(None)` clears an optional value, which
/// is how a binding is removed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldPatch {
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,
    pub name: Option<String>,
    pub label: Option<String>,
    #[serde(deserialize_with = "clearable")]
    pub binding_property: Option<Option<String>>,
    #[serde(deserialize_with = "clearable")]
    pub placeholder: Option<Option<String>>,
    #[serde(deserialize_with = "clearable")]
    pub help_text: Option<Option<String>>,
    #[serde(deserialize_with = "clearable")]
    pub default_value: Option<Option<DefaultValue>>,
    pub options: Option<Vec<FieldOption>>,
    pub validations: Option<Vec<ValidationRule>>,
    pub html_attributes: Option<HtmlAttributes>,
}

impl FieldPatch {
    fn apply(self, field: &mut Field) {
        if let Some(field_type) = self.field_type {
            field.field_type = field_type;
        }
        if let Some(name) = self.name {
            field.name = name;
        }
        if let Some(label) = self.label {
            field.label = label;
        }
        if let Some(binding) = self.binding_property {
            field.binding_property = binding;
        }
        if let Some(placeholder) = self.placeholder {
            field.placeholder = placeholder;
        }
        if let Some(help_text) = self.help_text {
            field.help_text = help_text;
        }
        if let Some(default_value) = self.default_value {
            field.default_value = default_value;
        }
        if let Some(options) = self.options {
            field.options = options;
        }
        if let Some(validations) = self.validations {
            field.validations = validations;
        }
        if let Some(attributes) = self.html_attributes {
            field.html_attributes = attributes;
        }
    }
}

/// One editing operation. Deserializes from `{"kind": "addRow", "sectionId": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Edit {
    UpdateForm(FormPatch),
    UpdateSection { id: String, patch: SectionPatch },
    UpdateRow { id: String, patch: RowPatch },
    UpdateField { id: String, patch: FieldPatch },
    AddSection { title: Option<String> },
    AddTableSection { title: Option<String>, columns: Option<usize> },
    AddRow { section_id: String },
    AddField {
        column_id: String,
        #[serde(rename = "type")]
        field_type: FieldType,
    },
    AddNestedTable { column_id: String },
    AddStaticBlock {
        column_id: String,
        // Serialized as `blockKind` because `kind` is the enum tag.
        #[serde(rename = "blockKind")]
        kind: StaticKind,
    },
    RemoveSection { id: String },
    RemoveRow { id: String },
    RemoveField { id: String },
    RemoveStaticBlock { id: String },
    ReorderRows { section_id: String, from: usize, to: usize },
    ReorderFields { column_id: String, from: usize, to: usize },
    UpdateStaticBlock { id: String, html: String },
}

/// Returns `schema` with `edit` applied.
pub fn apply_edit(schema: &FormSchema, edit: Edit) -> FormSchema {
    let mut next = schema.clone();
    match edit {
        Edit::UpdateForm(patch) => {
            if let Some(name) = patch.name {
                next.name = name;
            }
            if let Some(description) = patch.description {
                next.description = description;
            }
            if let Some(form_class) = patch.form_class {
                next.form_class = form_class;
            }
            if let Some(action_code) = patch.action_code {
                next.action_code = action_code;
            }
        }
        Edit::UpdateSection { id, patch } => {
            if let Some(section) = next.sections.iter_mut().find(|s| s.id == id) {
                if let Some(title) = patch.title {
                    section.title = title;
                }
                if let Some(layout) = patch.layout {
                    section.layout = layout;
                }
                if let Some(attributes) = patch.table_attributes {
                    section.table_attributes = attributes;
                }
            }
        }
        Edit::UpdateRow { id, patch } => {
            for_each_row(&mut next, &mut |row| {
                if row.id == id {
                    if let Some(attributes) = patch.html_attributes.clone() {
                        row.html_attributes = attributes;
                    }
                }
            });
        }
        Edit::UpdateField { id, patch } => {
            let mut patch = Some(patch);
            for_each_column(&mut next, &mut |column| {
                if let Some(field) = column.fields.iter_mut().find(|f| f.id == id) {
                    if let Some(patch) = patch.take() {
                        patch.apply(field);
                    }
                }
            });
        }
        Edit::AddSection { title } => {
            next.sections.push(create_empty_section(title.as_deref()));
        }
        Edit::AddTableSection { title, columns } => {
            next.sections.push(create_table_section(title.as_deref(), columns));
        }
        Edit::AddRow { section_id } => {
            if let Some(section) = next.sections.iter_mut().find(|s| s.id == section_id) {
                section.rows.push(create_empty_row());
            }
        }
        Edit::AddField { column_id, field_type } => {
            with_column(&mut next, &column_id, |column| {
                column.fields.push(create_default_field(field_type));
            });
        }
        Edit::AddNestedTable { column_id } => {
            with_column(&mut next, &column_id, |column| {
                column.nested_tables.push(create_nested_table());
            });
        }
        Edit::AddStaticBlock { column_id, kind } => {
            with_column(&mut next, &column_id, |column| {
                column.static_blocks.push(create_static_block(None, kind));
            });
        }
        Edit::RemoveSection { id } => {
            next.sections.retain(|s| s.id != id);
        }
        Edit::RemoveRow { id } => {
            for section in &mut next.sections {
                remove_row(&mut section.rows, &id);
            }
        }
        Edit::RemoveField { id } => {
            for_each_column(&mut next, &mut |column| column.fields.retain(|f| f.id != id));
        }
        Edit::RemoveStaticBlock { id } => {
            for_each_column(&mut next, &mut |column| {
                column.static_blocks.retain(|b| b.id != id)
            });
        }
        Edit::ReorderRows { section_id, from, to } => {
            if let Some(section) = next.sections.iter_mut().find(|s| s.id == section_id) {
                reorder(&mut section.rows, from, to);
            }
        }
        Edit::ReorderFields { column_id, from, to } => {
            with_column(&mut next, &column_id, |column| {
                reorder(&mut column.fields, from, to);
            });
        }
        Edit::UpdateStaticBlock { id, html } => {
            for_each_column(&mut next, &mut |column| {
                for block in column.static_blocks.iter_mut().filter(|b| b.id == id) {
                    block.html = html.clone();
                }
            });
        }
    }
    next
}

/// Moves the item at `from` to `to`; out-of-range indices change nothing.
fn reorder<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() || to >= items.len() || from == to {
        return;
    }
    let moved = items.remove(from);
    items.insert(to, moved);
}

fn with_column(schema: &mut FormSchema, column_id: &str, mut update: impl FnMut(&mut Column)) {
    let mut done = false;
    for_each_column(schema, &mut |column| {
        if !done && column.id == column_id {
            update(column);
            done = true;
        }
    });
}

fn for_each_column(schema: &mut FormSchema, visit: &mut dyn FnMut(&mut Column)) {
    for section in &mut schema.sections {
        visit_columns_mut(&mut section.rows, visit);
    }
}

fn for_each_row(schema: &mut FormSchema, visit: &mut dyn FnMut(&mut Row)) {
    for section in &mut schema.sections {
        visit_rows(&mut section.rows, visit);
    }
}

fn visit_rows(rows: &mut [Row], visit: &mut dyn FnMut(&mut Row)) {
    for row in rows {
        visit(row);
        for column in &mut row.columns {
            for table in &mut column.nested_tables {
                visit_rows(&mut table.rows, visit);
            }
        }
    }
}

fn remove_row(rows: &mut Vec<Row>, id: &str) {
    rows.retain(|row| row.id != id);
    for row in rows.iter_mut() {
        for column in &mut row.columns {
            for table in &mut column.nested_tables {
                remove_row(&mut table.rows, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::create_empty_form;

    fn form_with_table() -> FormSchema {
        apply_edit(
            &create_empty_form(Some("Edit me")),
            Edit::AddTableSection { title: None, columns: Some(2) },
        )
    }

    fn first_column_id(schema: &FormSchema) -> String {
        schema.sections[0].rows[0].columns[0].id.clone()
    }

    #[test]
    fn edits_leave_the_input_untouched() {
        let before = form_with_table();
        let field_id = before.fields()[0].id.clone();
        let after = apply_edit(
            &before,
            Edit::UpdateField {
                id: field_id.clone(),
                patch: FieldPatch {
                    label: Some("Renamed".to_string()),
                    ..FieldPatch::default()
                },
            },
        );
        assert_eq!(after.find_field(&field_id).map(|f| f.label.as_str()), Some("Renamed"));
        assert_eq!(before.find_field(&field_id).map(|f| f.label.as_str()), Some("Text field"));
    }

    #[test]
    fn edits_deserialize_from_json() {
        let add: Edit = serde_json::from_str(
            r#"{"kind":"addField","columnId":"c1","type":"select"}"#,
        )
        .expect("addField");
        assert_eq!(
            add,
            Edit::AddField { column_id: "c1".to_string(), field_type: FieldType::Select }
        );

        let update: Edit = serde_json::from_str(
            r#"{"kind":"updateField","id":"f1","patch":{"label":"Total","bindingProperty":null}}"#,
        )
        .expect("updateField");
        let Edit::UpdateField { id, patch } = update else {
            panic!("expected updateField");
        };
        assert_eq!(id, "f1");
        assert_eq!(patch.label.as_deref(), Some("Total"));
        assert_eq!(patch.binding_property, Some(None));
        assert_eq!(patch.placeholder, None);
    }

    #[test]
    fn binding_can_be_set_and_cleared() {
        let schema = form_with_table();
        let id = schema.fields()[1].id.clone();
        let bound = apply_edit(
            &schema,
            Edit::UpdateField {
                id: id.clone(),
                patch: FieldPatch {
                    binding_property: Some(Some("amount".to_string())),
                    ..FieldPatch::default()
                },
            },
        );
        assert_eq!(bound.find_field(&id).and_then(|f| f.binding_property.clone()).as_deref(), Some("amount"));
        let cleared = apply_edit(
            &bound,
            Edit::UpdateField {
                id: id.clone(),
                patch: FieldPatch {
                    binding_property: Some(None),
                    ..FieldPatch::default()
                },
            },
        );
        assert_eq!(cleared.find_field(&id).and_then(|f| f.binding_property.clone()), None);
    }

    #[test]
    fn nested_columns_are_reachable() {
        let schema = form_with_table();
        let column_id = first_column_id(&schema);
        let schema = apply_edit(&schema, Edit::AddNestedTable { column_id });
        let nested_column = schema.sections[0].rows[0].columns[0].nested_tables[0].rows[0].columns[0].id.clone();
        let schema = apply_edit(
            &schema,
            Edit::AddField { column_id: nested_column.clone(), field_type: FieldType::Select },
        );
        let schema = apply_edit(
            &schema,
            Edit::AddStaticBlock { column_id: nested_column, kind: StaticKind::Richtext },
        );
        let nested = &schema.sections[0].rows[0].columns[0].nested_tables[0].rows[0].columns[0];
        assert_eq!(nested.fields.len(), 2);
        assert_eq!(nested.fields[1].field_type, FieldType::Select);
        assert_eq!(nested.static_blocks.len(), 1);
        assert_eq!(schema.nesting_depth(), 1);

        let block_id = nested.static_blocks[0].id.clone();
        let schema = apply_edit(
            &schema,
            Edit::UpdateStaticBlock { id: block_id.clone(), html: "<p>New</p>".to_string() },
        );
        assert_eq!(schema.columns()[1].static_blocks[0].html, "<p>New</p>");
        let schema = apply_edit(&schema, Edit::RemoveStaticBlock { id: block_id });
        assert!(schema.columns()[1].static_blocks.is_empty());
    }

    #[test]
    fn reorder_moves_and_ignores_out_of_range() {
        let schema = form_with_table();
        let column_id = first_column_id(&schema);
        let schema = apply_edit(
            &schema,
            Edit::AddField { column_id: column_id.clone(), field_type: FieldType::Date },
        );
        let schema = apply_edit(
            &schema,
            Edit::ReorderFields { column_id: column_id.clone(), from: 1, to: 0 },
        );
        assert_eq!(schema.sections[0].rows[0].columns[0].fields[0].field_type, FieldType::Date);

        let unchanged = apply_edit(&schema, Edit::ReorderFields { column_id, from: 0, to: 7 });
        assert_eq!(unchanged, schema);

        let section_id = schema.sections[0].id.clone();
        let schema = apply_edit(&schema, Edit::AddRow { section_id: section_id.clone() });
        let second_row = schema.sections[0].rows[1].id.clone();
        let schema = apply_edit(&schema, Edit::ReorderRows { section_id, from: 1, to: 0 });
        assert_eq!(schema.sections[0].rows[0].id, second_row);
    }

    #[test]
    fn removals_and_unknown_ids() {
        let schema = form_with_table();
        let unchanged = apply_edit(&schema, Edit::RemoveField { id: "missing".to_string() });
        assert_eq!(unchanged, schema);

        let field_id = schema.fields()[0].id.clone();
        let schema = apply_edit(&schema, Edit::RemoveField { id: field_id });
        assert_eq!(schema.fields().len(), 1);

        let row_id = schema.sections[0].rows[0].id.clone();
        let schema = apply_edit(&schema, Edit::RemoveRow { id: row_id });
        assert!(schema.sections[0].rows.is_empty());

        let section_id = schema.sections[0].id.clone();
        let schema = apply_edit(&schema, Edit::RemoveSection { id: section_id });
        assert!(schema.sections.is_empty());
    }

    #[test]
    fn form_and_section_updates() {
        let schema = form_with_table();
        let schema = apply_edit(
            &schema,
            Edit::UpdateForm(FormPatch {
                form_class: Some(Some("Invoice".to_string())),
                action_code: Some(Some("AMD".to_string())),
                ..FormPatch::default()
            }),
        );
        assert_eq!(schema.form_class.as_deref(), Some("Invoice"));
        assert_eq!(schema.name, "Edit me");

        let id = schema.sections[0].id.clone();
        let schema = apply_edit(
            &schema,
            Edit::UpdateSection {
                id,
                patch: SectionPatch {
                    layout: Some(SectionLayout::Stack),
                    ..SectionPatch::default()
                },
            },
        );
        assert_eq!(schema.sections[0].layout, SectionLayout::Stack);

        let row_id = schema.sections[0].rows[0].id.clone();
        let attributes: HtmlAttributes = [("class", "totals")].into_iter().collect();
        let schema = apply_edit(
            &schema,
            Edit::UpdateRow { id: row_id, patch: RowPatch { html_attributes: Some(attributes) } },
        );
        assert_eq!(schema.sections[0].rows[0].html_attributes.get("class"), Some("totals"));
    }
}
