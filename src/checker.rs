use crate::diagnostic::Diagnostic;
use crate::library::{validate_action_code_syntax, PropertyDirectory};
use crate::schema::{Column, Field, FormSchema, Row};
use std::collections::BTreeMap;

/// Structural and binding checks over a schema. `directory`, when given,
/// is used to verify bindings against the form class.
pub fn check_schema(
    schema: &FormSchema,
    directory: Option<&dyn PropertyDirectory>,
) -> Vec<Diagnostic> {
    let index = SchemaIndex::new(schema);
    let mut diags = Vec::new();
    check_duplicate_ids(&index, &mut diags);
    check_duplicate_names(&index, &mut diags);
    check_options(&index, &mut diags);
    check_spans(&index, &mut diags);
    if let Some(directory) = directory {
        check_bindings(schema, &index, directory, &mut diags);
    }
    check_action_code(schema, &mut diags);
    diags
}

/// Every node of the form in document order, with a readable location.
struct SchemaIndex<'a> {
    ids: Vec<(&'a str, String)>,
    columns: Vec<(&'a Column, String)>,
    fields: Vec<(&'a Field, String)>,
}

impl<'a> SchemaIndex<'a> {
    fn new(schema: &'a FormSchema) -> Self {
        let mut index = Self {
            ids: vec![(schema.id.as_str(), "form".to_string())],
            columns: Vec::new(),
            fields: Vec::new(),
        };
        for (s, section) in schema.sections.iter().enumerate() {
            let location = format!("section[{s}]");
            index.ids.push((section.id.as_str(), location.clone()));
            index.add_rows(&section.rows, &location);
        }
        index
    }

    fn add_rows(&mut self, rows: &'a [Row], parent: &str) {
        for (r, row) in rows.iter().enumerate() {
            let row_location = format!("{parent}.row[{r}]");
            self.ids.push((row.id.as_str(), row_location.clone()));
            for (c, column) in row.columns.iter().enumerate() {
                let location = format!("{row_location}.column[{c}]");
                self.ids.push((column.id.as_str(), location.clone()));
                self.columns.push((column, location.clone()));
                for field in &column.fields {
                    let field_location = format!("{location}.field({})", field.name);
                    self.ids.push((field.id.as_str(), field_location.clone()));
                    self.fields.push((field, field_location));
                }
                for block in &column.static_blocks {
                    self.ids.push((block.id.as_str(), format!("{location}.static")));
                }
                for (t, table) in column.nested_tables.iter().enumerate() {
                    let table_location = format!("{location}.table[{t}]");
                    self.ids.push((table.id.as_str(), table_location.clone()));
                    self.add_rows(&table.rows, &table_location);
                }
            }
        }
    }
}

fn check_duplicate_ids(index: &SchemaIndex<'_>, diags: &mut Vec<Diagnostic>) {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (id, location) in &index.ids {
        if let Some(first) = seen.get(id) {
            diags.push(Diagnostic::error(
                "DuplicateId",
                format!("id {id} is already used at {first}"),
                location.clone(),
            ));
        } else {
            seen.insert(*id, location.as_str());
        }
    }
}

fn check_duplicate_names(index: &SchemaIndex<'_>, diags: &mut Vec<Diagnostic>) {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (field, location) in &index.fields {
        let name = field.original_name.as_deref().unwrap_or(&field.name);
        if let Some(first) = seen.get(name) {
            diags.push(Diagnostic::warning(
                "DuplicateFieldName",
                format!("field name {name} is already used at {first}"),
                location.clone(),
            ));
        } else {
            seen.insert(name, location.as_str());
        }
    }
}

fn check_options(index: &SchemaIndex<'_>, diags: &mut Vec<Diagnostic>) {
    for (field, location) in &index.fields {
        if field.field_type.has_options() && field.options.is_empty() {
            diags.push(Diagnostic::warning(
                "MissingOptions",
                format!("{} field {} has no options", field.field_type, field.name),
                location.clone(),
            ));
        }
    }
}

fn check_spans(index: &SchemaIndex<'_>, diags: &mut Vec<Diagnostic>) {
    for (column, location) in &index.columns {
        if !(1..=4).contains(&column.span) {
            diags.push(Diagnostic::error(
                "InvalidSpan",
                format!("column span {} is outside 1..=4", column.span),
                location.clone(),
            ));
        }
    }
}

fn check_bindings(
    schema: &FormSchema,
    index: &SchemaIndex<'_>,
    directory: &dyn PropertyDirectory,
    diags: &mut Vec<Diagnostic>,
) {
    let Some(class_name) = schema.form_class.as_deref() else {
        return;
    };
    let Some(class) = directory.class(class_name) else {
        diags.push(Diagnostic::warning(
            "UnknownClass",
            format!("form class {class_name} is not in the properties library"),
            "form".to_string(),
        ));
        return;
    };
    for (field, location) in &index.fields {
        if let Some(property) = &field.binding_property {
            if !class.has_property(property) {
                diags.push(Diagnostic::warning(
                    "UnknownProperty",
                    format!("binding ${{{property}}} is not a property of {class_name}"),
                    location.clone(),
                ));
            }
        }
    }
}

fn check_action_code(schema: &FormSchema, diags: &mut Vec<Diagnostic>) {
    if let Some(code) = &schema.action_code {
        if let Err(err) = validate_action_code_syntax(code) {
            diags.push(Diagnostic::warning(
                "InvalidActionCode",
                format!("{err}: {code}"),
                "form.actionCode".to_string(),
            ));
        }
    }
}
