use super::escape_html;
use crate::attributes::HtmlAttributes;
use crate::schema::{Column, DefaultValue, Field, FieldType, FormSchema, Row, Section, SectionLayout};

/// Input types the model has no variant for; text fields keep them on export.
const PASSTHROUGH_INPUT_TYPES: &[&str] = &[
    "hidden", "email", "password", "tel", "url", "search", "time", "datetime-local", "month",
    "week", "color", "range",
];

/// Renders a schema back into an HTML document.
pub struct HtmlExporter;

impl HtmlExporter {
    pub fn new() -> Self {
        Self
    }

    pub fn export(&self, schema: &FormSchema) -> String {
        if schema.sections.is_empty() {
            if let Some(original) = &schema.original_html {
                return original.clone();
            }
        }

        let mut lines = Vec::new();
        for section in &schema.sections {
            self.render_section(section, 1, &mut lines);
        }
        let generated = lines.join("\n");

        let mut output = String::from("<!doctype html>\n<html>\n  <head>\n");
        if schema.original_body_html.is_some() {
            let head = match &schema.original_head_html {
                Some(head) => indent_block(head.trim(), 2),
                None => default_head(&schema.name),
            };
            let chrome = schema
                .remaining_body_html
                .as_deref()
                .or(schema.original_body_html.as_deref())
                .unwrap_or_default()
                .trim();
            let body: Vec<&str> = [chrome, generated.as_str()]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect();

            output.push_str(&head);
            output.push_str("\n  </head>\n  <body>\n");
            output.push_str(&body.join("\n"));
        } else {
            output.push_str(&default_head(&schema.name));
            output.push_str("\n  </head>\n  <body>\n");
            output.push_str(&generated);
        }
        output.push_str("\n  </body>\n</html>");
        output
    }

    fn render_section(&self, section: &Section, level: usize, lines: &mut Vec<String>) {
        match section.layout {
            SectionLayout::Table => {
                self.render_table(&section.rows, &section.table_attributes, level, lines)
            }
            SectionLayout::Stack => {
                lines.push(indent("<section>", level));
                for row in &section.rows {
                    lines.push(indent(r#"<div style="display:flex; gap:8px;">"#, level + 1));
                    for column in &row.columns {
                        lines.push(indent(
                            &format!(
                                r#"<div style="flex:{}; padding:4px;">"#,
                                column.flex_ratio()
                            ),
                            level + 2,
                        ));
                        for field in &column.fields {
                            self.render_field(field, level + 3, lines);
                        }
                        lines.push(indent("</div>", level + 2));
                    }
                    lines.push(indent("</div>", level + 1));
                }
                lines.push(indent("</section>", level));
            }
        }
    }

    fn render_table(
        &self,
        rows: &[Row],
        attributes: &HtmlAttributes,
        level: usize,
        lines: &mut Vec<String>,
    ) {
        lines.push(indent(&format!("<table{}>", attributes.to_html()), level));
        lines.push(indent("<tbody>", level + 1));
        for row in rows {
            lines.push(indent(&format!("<tr{}>", row.html_attributes.to_html()), level + 2));
            for column in &row.columns {
                self.render_cell(column, level + 3, lines);
            }
            lines.push(indent("</tr>", level + 2));
        }
        lines.push(indent("</tbody>", level + 1));
        lines.push(indent("</table>", level));
    }

    fn render_cell(&self, column: &Column, level: usize, lines: &mut Vec<String>) {
        let mut attributes = column.html_attributes.clone();
        if column.col_span > 1 {
            attributes.insert("colspan", column.col_span.to_string());
        }
        if column.row_span > 1 {
            attributes.insert("rowspan", column.row_span.to_string());
        }
        lines.push(indent(&format!("<td{}>", attributes.to_html()), level));

        for block in &column.static_blocks {
            for line in block.html.lines().map(str::trim).filter(|l| !l.is_empty()) {
                lines.push(indent(line, level + 1));
            }
        }
        for field in &column.fields {
            self.render_field(field, level + 1, lines);
        }
        for nested in &column.nested_tables {
            self.render_table(&nested.rows, &nested.table_attributes, level + 1, lines);
        }

        lines.push(indent("</td>", level));
    }

    fn render_field(&self, field: &Field, level: usize, lines: &mut Vec<String>) {
        let source_type = field
            .html_attributes
            .get("type")
            .map(|t| t.trim().to_ascii_lowercase());
        let mut attributes = control_attributes(field);
        let id = attributes.get("id").unwrap_or_default().to_string();
        let label = escape_html(&field.label);
        let value = control_value(field);

        match field.field_type {
            FieldType::Textarea => {
                lines.push(indent(&format!(r#"<label for="{}">{label}</label>"#, escape_html(&id)), level));
                lines.push(indent(
                    &format!("<textarea{}>{}</textarea>", attributes.to_html(), escape_html(&value)),
                    level,
                ));
            }
            FieldType::Select => {
                lines.push(indent(&format!(r#"<label for="{}">{label}</label>"#, escape_html(&id)), level));
                lines.push(indent(&format!("<select{}>", attributes.to_html()), level));
                for option in &field.options {
                    let selected = if !value.is_empty() && option.value == value {
                        " selected"
                    } else {
                        ""
                    };
                    lines.push(indent(
                        &format!(
                            r#"<option value="{}"{selected}>{}</option>"#,
                            escape_html(&option.value),
                            escape_html(&option.label)
                        ),
                        level + 1,
                    ));
                }
                lines.push(indent("</select>", level));
            }
            FieldType::Checkbox => {
                let checked = match field.default_value {
                    Some(DefaultValue::Flag(true)) => " checked",
                    _ => "",
                };
                let value = if value.is_empty() {
                    field.html_attributes.get("value").unwrap_or("on").to_string()
                } else {
                    value
                };
                lines.push(indent(
                    &format!(
                        r#"<label><input type="checkbox"{} value="{}"{checked} /> {label}</label>"#,
                        attributes.to_html(),
                        escape_html(&value)
                    ),
                    level,
                ));
            }
            FieldType::Radio => {
                lines.push(indent("<div>", level));
                lines.push(indent(&label, level + 1));
                for (index, option) in field.options.iter().enumerate() {
                    if index == 1 {
                        attributes.remove("id");
                    }
                    let checked = if !value.is_empty() && option.value == value {
                        " checked"
                    } else {
                        ""
                    };
                    lines.push(indent(
                        &format!(
                            r#"<label><input type="radio"{} value="{}"{checked} /> {}</label>"#,
                            attributes.to_html(),
                            escape_html(&option.value),
                            escape_html(&option.label)
                        ),
                        level + 1,
                    ));
                }
                lines.push(indent("</div>", level));
            }
            FieldType::Text | FieldType::Number | FieldType::Date => {
                let input_type = match (field.field_type, source_type.as_deref()) {
                    (FieldType::Text, Some(t)) if PASSTHROUGH_INPUT_TYPES.contains(&t) => t,
                    (other, _) => other.as_str(),
                };
                lines.push(indent(&format!(r#"<label for="{}">{label}</label>"#, escape_html(&id)), level));
                lines.push(indent(
                    &format!(
                        r#"<input type="{input_type}"{} value="{}" />"#,
                        attributes.to_html(),
                        escape_html(&value)
                    ),
                    level,
                ));
            }
        }
    }
}

impl Default for HtmlExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders `schema` as an HTML document.
pub fn schema_to_html(schema: &FormSchema) -> String {
    HtmlExporter::new().export(schema)
}

/// Alias of [`schema_to_html`].
pub fn render(schema: &FormSchema) -> String {
    schema_to_html(schema)
}

/// Source attributes the control renderer or the field model writes.
const MODEL_ATTRIBUTES: &[&str] = &[
    "type", "value", "checked", "selected", "required", "min", "max", "pattern", "placeholder",
    "title",
];

/// The source attributes of a field with identity, hints and constraints
/// taken from the model. `type`, `value` and `checked` are written by the
/// control renderer.
fn control_attributes(field: &Field) -> HtmlAttributes {
    let mut attributes = field.html_attributes.clone();
    for key in MODEL_ATTRIBUTES {
        attributes.remove(key);
    }

    let id = field
        .original_id
        .clone()
        .or_else(|| attributes.get("id").map(str::to_string))
        .unwrap_or_else(|| field.name.clone());
    let name = field
        .original_name
        .clone()
        .or_else(|| attributes.get("name").map(str::to_string))
        .unwrap_or_else(|| field.name.clone());
    attributes.insert("id", id);
    attributes.insert("name", name);

    if let Some(placeholder) = &field.placeholder {
        if matches!(
            field.field_type,
            FieldType::Text | FieldType::Number | FieldType::Textarea
        ) {
            attributes.insert("placeholder", placeholder.as_str());
        }
    }
    if let Some(help) = &field.help_text {
        attributes.insert("title", help.as_str());
    }
    for rule in &field.validations {
        if let Some((key, value)) = rule.html_attribute() {
            attributes.insert(key, value);
        }
    }
    attributes
}

/// Binding token when bound, else the literal default value, else empty.
fn control_value(field: &Field) -> String {
    field
        .binding_token()
        .or_else(|| field.default_value.as_ref().map(DefaultValue::as_control_value))
        .unwrap_or_default()
}

fn indent(line: &str, level: usize) -> String {
    format!("{}{}", "  ".repeat(level), line)
}

/// Indents a trimmed block, keeping blank lines and the relative indentation
/// of lines after the first. The common leading indent of those lines is
/// dropped first, so a block that was indented by a previous export does not
/// drift further right.
fn indent_block(block: &str, level: usize) -> String {
    let common = block
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    block
        .lines()
        .enumerate()
        .map(|(index, line)| {
            let line = match index {
                0 => line,
                _ => line.get(common..).unwrap_or(line.trim_start()),
            }
            .trim_end();
            if line.is_empty() {
                String::new()
            } else {
                indent(line, level)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn default_head(name: &str) -> String {
    indent_block(
        &format!(
            "<meta charset=\"UTF-8\" />\n<title>{}</title>",
            escape_html(name)
        ),
        2,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{create_default_field, create_empty_form, create_empty_section, create_table_section};
    use crate::schema::{FieldOption, ValidationRule};

    fn form_with(section: Section) -> FormSchema {
        let mut schema = create_empty_form(Some("Test"));
        schema.sections.push(section);
        schema
    }

    #[test]
    fn passthrough_when_there_are_no_sections() {
        let mut schema = create_empty_form(None);
        schema.original_html = Some("<p>as is</p>".to_string());
        assert_eq!(schema_to_html(&schema), "<p>as is</p>");
    }

    #[test]
    fn minimal_shell_escapes_the_title() {
        let schema = create_empty_form(Some("A & B"));
        let html = schema_to_html(&schema);
        assert!(html.starts_with("<!doctype html>\n<html>\n  <head>\n    <meta charset=\"UTF-8\" />"));
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.ends_with("  </body>\n</html>"));
    }

    #[test]
    fn table_cells_carry_spans_and_content_order() {
        let mut section = create_table_section(Some("T"), Some(1));
        let column = &mut section.rows[0].columns[0];
        column.col_span = 2;
        column.html_attributes.insert("class", "wide");
        column.static_blocks.push(crate::builders::create_static_block(
            Some("<b>Intro</b>\n  <i>two</i>"),
            crate::schema::StaticKind::Html,
        ));
        column.nested_tables.push(crate::builders::create_nested_table());
        let html = schema_to_html(&form_with(section));

        assert!(html.contains(r#"<table border="1" cellpadding="6" cellspacing="0">"#));
        assert!(html.contains(r#"<td class="wide" colspan="2">"#));
        let intro = html.find("<b>Intro</b>").expect("static");
        let two = html.find("        <i>two</i>").expect("static line indented");
        let field = html.find("<input type=\"text\"").expect("field");
        let nested = html.find(r#"cellpadding="4""#).expect("nested");
        assert!(intro < two && two < field && field < nested);
    }

    #[test]
    fn stack_layout_uses_flex_ratio() {
        let mut section = create_empty_section(None);
        let mut left = Column::new();
        left.span = 2;
        let mut right = Column::new();
        right.span = 2;
        right.fields.push(create_default_field(FieldType::Date));
        section.rows[0].columns = vec![left, right];
        let html = schema_to_html(&form_with(section));
        assert_eq!(html.matches(r#"<div style="flex:0.5; padding:4px;">"#).count(), 2);
        assert!(html.contains("<section>"));
        assert!(html.contains(r#"<input type="date""#));
    }

    #[test]
    fn escapes_labels_values_and_attributes() {
        let mut field = create_default_field(FieldType::Text);
        field.label = r#"Size <cm> & "width""#.to_string();
        field.default_value = Some(DefaultValue::Text("a<b".to_string()));
        field.html_attributes.insert("data-note", "x\"y");
        let mut section = create_table_section(None, Some(1));
        section.rows[0].columns[0].fields = vec![field];
        let html = schema_to_html(&form_with(section));
        assert!(html.contains("Size &lt;cm&gt; &amp; &quot;width&quot;</label>"));
        assert!(html.contains(r#"value="a&lt;b""#));
        assert!(html.contains(r#"data-note="x&quot;y""#));
        assert!(!html.contains("<cm>"));
    }

    #[test]
    fn binding_token_wins_over_default_value() {
        let mut field = create_default_field(FieldType::Textarea);
        field.binding_property = Some("caseNotes".to_string());
        field.default_value = Some(DefaultValue::Text("ignored".to_string()));
        field.original_id = Some("notes_1".to_string());
        field.original_name = Some("notes".to_string());
        let mut section = create_table_section(None, Some(1));
        section.rows[0].columns[0].fields = vec![field];
        let html = schema_to_html(&form_with(section));
        assert!(html.contains(r#"<label for="notes_1">"#));
        assert!(html.contains(r#"id="notes_1" name="notes""#));
        assert!(html.contains(">${caseNotes}</textarea>"));
        assert!(!html.contains("ignored"));
    }

    #[test]
    fn radio_renders_one_input_per_option_with_single_id() {
        let mut field = create_default_field(FieldType::Radio);
        field.name = "gender".to_string();
        field.label = "Gender".to_string();
        field.options = vec![FieldOption::new("Male", "m"), FieldOption::new("Female", "f")];
        field.default_value = Some(DefaultValue::Text("f".to_string()));
        field.validations.push(ValidationRule::Required { value: None, message: None });
        let mut section = create_table_section(None, Some(1));
        section.rows[0].columns[0].fields = vec![field];
        let html = schema_to_html(&form_with(section));
        assert_eq!(html.matches(r#"type="radio""#).count(), 2);
        assert_eq!(html.matches(r#"id="gender""#).count(), 1);
        assert!(html.contains(r#"value="f" checked /> Female</label>"#));
        assert!(html.contains(r#"required="""#));
    }

    #[test]
    fn checkbox_defaults_to_on_and_keeps_hidden_types() {
        let mut checkbox = create_default_field(FieldType::Checkbox);
        checkbox.default_value = Some(DefaultValue::Flag(true));
        let mut hidden = create_default_field(FieldType::Text);
        hidden.html_attributes.insert("type", "hidden");
        let mut section = create_table_section(None, Some(1));
        section.rows[0].columns[0].fields = vec![checkbox, hidden];
        let html = schema_to_html(&form_with(section));
        assert!(html.contains(r#"value="on" checked />"#));
        assert!(html.contains(r#"<input type="hidden""#));
        assert_eq!(html.matches("type=").count(), 2);
    }

    #[test]
    fn retained_shell_reuses_head_and_remaining_body() {
        let mut schema = form_with(create_table_section(None, Some(1)));
        schema.original_head_html = Some("<title>Kept</title>\n<style>td{}</style>".to_string());
        schema.original_body_html = Some("<div>Logo</div><table></table>".to_string());
        schema.remaining_body_html = Some("<div>Logo</div>".to_string());
        let html = schema_to_html(&schema);
        assert!(html.contains("    <title>Kept</title>\n    <style>td{}</style>"));
        assert!(html.contains("  <body>\n<div>Logo</div>\n  <table"));
        assert!(!html.contains("<table></table>"));
    }

    #[test]
    fn model_decides_hints_and_rules_over_source_attributes() {
        let mut field = create_default_field(FieldType::Text);
        field.name = "a".to_string();
        field.placeholder = None;
        for (key, value) in [("placeholder", "p"), ("title", "h"), ("required", ""), ("min", "2")] {
            field.html_attributes.insert(key, value);
        }
        field.html_attributes.insert("data-x", "kept");
        let mut section = create_table_section(None, Some(1));
        section.rows[0].columns[0].fields = vec![field];
        let html = schema_to_html(&form_with(section));
        for gone in ["placeholder=", "title=", "required=", "min="] {
            assert!(!html.contains(gone), "{gone} should not be exported");
        }
        assert!(html.contains(r#"data-x="kept""#));
    }

    #[test]
    fn checked_checkbox_keeps_its_source_value() {
        let mut checkbox = create_default_field(FieldType::Checkbox);
        checkbox.default_value = Some(DefaultValue::Flag(true));
        checkbox.html_attributes.insert("value", "yes");
        let mut section = create_table_section(None, Some(1));
        section.rows[0].columns[0].fields = vec![checkbox];
        let html = schema_to_html(&form_with(section));
        assert!(html.contains(r#"value="yes" checked />"#));
    }

    #[test]
    fn retained_head_keeps_relative_indentation_and_blank_lines() {
        let mut schema = form_with(create_table_section(None, Some(1)));
        schema.original_head_html = Some(
            "\n  <script>\n    if (a) {\n      run();\n    }\n\n    done();\n  </script>\n"
                .to_string(),
        );
        schema.original_body_html = Some(String::new());
        let html = schema_to_html(&schema);
        let expected = "    <script>\n      if (a) {\n        run();\n      }\n\n      done();\n    </script>";
        assert!(html.contains(expected), "{html}");

        let mut again = schema.clone();
        let head_start = html.find("<head>\n").expect("head") + "<head>\n".len();
        let head_end = html.find("  </head>").expect("head end");
        again.original_head_html = Some(html[head_start..head_end].to_string());
        assert_eq!(schema_to_html(&again), html);
    }
}
