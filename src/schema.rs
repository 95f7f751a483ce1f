use crate::attributes::HtmlAttributes;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub fn create_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Checkbox,
    Radio,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::Text,
        FieldType::Textarea,
        FieldType::Number,
        FieldType::Date,
        FieldType::Select,
        FieldType::Checkbox,
        FieldType::Radio,
    ];

    /// Maps a type name to a field type; anything unknown is `Text`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "textarea" => FieldType::Textarea,
            "number" => FieldType::Number,
            "date" => FieldType::Date,
            "select" => FieldType::Select,
            "checkbox" => FieldType::Checkbox,
            "radio" => FieldType::Radio,
            _ => FieldType::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
        }
    }

    pub fn has_options(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FieldType::parse(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionLayout {
    Table,
    #[default]
    Stack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaticKind {
    #[default]
    Html,
    Richtext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl DefaultValue {
    /// Value written into a control; booleans have no textual form.
    pub fn as_control_value(&self) -> String {
        match self {
            DefaultValue::Flag(_) => String::new(),
            DefaultValue::Number(n) => n.to_string(),
            DefaultValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::Number(n) => write!(f, "{n}"),
            RuleValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ValidationRule {
    Required {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<RuleValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Min {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<RuleValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Max {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<RuleValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Pattern {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<RuleValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ValidationRule {
    /// The HTML constraint attribute this rule maps to, if it has one.
    pub fn html_attribute(&self) -> Option<(&'static str, String)> {
        match self {
            ValidationRule::Required { .. } => Some(("required", String::new())),
            ValidationRule::Min { value: Some(v), .. } => Some(("min", v.to_string())),
            ValidationRule::Max { value: Some(v), .. } => Some(("max", v.to_string())),
            ValidationRule::Pattern { value: Some(v), .. } => Some(("pattern", v.to_string())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

impl FieldOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticBlock {
    pub id: String,
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StaticKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "HtmlAttributes::is_empty")]
    pub html_attributes: HtmlAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<DefaultValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub validations: Vec<ValidationRule>,
}

impl Field {
    /// `${property}` when the field is bound.
    pub fn binding_token(&self) -> Option<String> {
        self.binding_property
            .as_ref()
            .map(|property| format!("${{{property}}}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub id: String,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "HtmlAttributes::is_empty")]
    pub table_attributes: HtmlAttributes,
}

fn one() -> u32 {
    1
}

fn full_span() -> u8 {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    #[serde(default = "full_span")]
    pub span: u8,
    #[serde(default = "one")]
    pub col_span: u32,
    #[serde(default = "one")]
    pub row_span: u32,
    #[serde(default, skip_serializing_if = "HtmlAttributes::is_empty")]
    pub html_attributes: HtmlAttributes,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub static_blocks: Vec<StaticBlock>,
    #[serde(default)]
    pub nested_tables: Vec<TableSchema>,
}

impl Column {
    /// An empty full-width cell.
    pub fn new() -> Self {
        Self {
            id: create_id(),
            span: 4,
            col_span: 1,
            row_span: 1,
            html_attributes: HtmlAttributes::new(),
            fields: Vec::new(),
            static_blocks: Vec::new(),
            nested_tables: Vec::new(),
        }
    }

    /// Share of the row width, `span / 4` with span clamped to 1..=4.
    pub fn flex_ratio(&self) -> f64 {
        f64::from(self.span.clamp(1, 4)) / 4.0
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.static_blocks.is_empty() && self.nested_tables.is_empty()
    }
}

impl Default for Column {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "HtmlAttributes::is_empty")]
    pub html_attributes: HtmlAttributes,
}

impl Row {
    pub fn with_columns(columns: Vec<Column>) -> Self {
        Self {
            id: create_id(),
            columns,
            html_attributes: HtmlAttributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub layout: SectionLayout,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "HtmlAttributes::is_empty")]
    pub table_attributes: HtmlAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_code: Option<String>,
    #[serde(default = "one")]
    pub version: u32,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_head_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_body_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_body_html: Option<String>,
}

impl FormSchema {
    /// Every column in document order, nested tables included.
    pub fn columns(&self) -> Vec<&Column> {
        let mut out = Vec::new();
        for section in &self.sections {
            collect_columns(&section.rows, &mut out);
        }
        out
    }

    /// Every field in document order, nested tables included.
    pub fn fields(&self) -> Vec<&Field> {
        self.columns()
            .into_iter()
            .flat_map(|column| column.fields.iter())
            .collect()
    }

    pub fn find_field(&self, id: &str) -> Option<&Field> {
        self.fields().into_iter().find(|field| field.id == id)
    }

    /// Deepest level of table nesting below the sections (0 when none).
    pub fn nesting_depth(&self) -> usize {
        self.sections
            .iter()
            .map(|section| rows_depth(&section.rows))
            .max()
            .unwrap_or(0)
    }
}

/// Calls `visit` on every column under `rows`, descending into nested tables.
pub fn visit_columns_mut(rows: &mut [Row], visit: &mut dyn FnMut(&mut Column)) {
    for row in rows {
        for column in &mut row.columns {
            visit(column);
            for table in &mut column.nested_tables {
                visit_columns_mut(&mut table.rows, visit);
            }
        }
    }
}

pub fn visit_fields_mut(rows: &mut [Row], visit: &mut dyn FnMut(&mut Field)) {
    visit_columns_mut(rows, &mut |column| {
        for field in &mut column.fields {
            visit(field);
        }
    });
}

fn collect_columns<'a>(rows: &'a [Row], out: &mut Vec<&'a Column>) {
    for row in rows {
        for column in &row.columns {
            out.push(column);
            for table in &column.nested_tables {
                collect_columns(&table.rows, out);
            }
        }
    }
}

fn rows_depth(rows: &[Row]) -> usize {
    rows.iter()
        .flat_map(|row| row.columns.iter())
        .flat_map(|column| column.nested_tables.iter())
        .map(|table| 1 + rows_depth(&table.rows))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_field_type_reads_as_text() {
        let ty: FieldType = serde_json::from_str("\"email\"").expect("parse");
        assert_eq!(ty, FieldType::Text);
        let ty: FieldType = serde_json::from_str("\"checkbox\"").expect("parse");
        assert_eq!(ty, FieldType::Checkbox);
    }

    #[test]
    fn flex_ratio_is_span_over_four() {
        let mut column = Column::new();
        column.span = 2;
        assert_eq!(column.flex_ratio(), 0.5);
        column.span = 9;
        assert_eq!(column.flex_ratio(), 1.0);
    }

    #[test]
    fn validation_rule_uses_type_tag() {
        let rule = ValidationRule::Min {
            value: Some(RuleValue::Number(3.0)),
            message: None,
        };
        let json = serde_json::to_string(&rule).expect("serialize");
        assert_eq!(json, r#"{"type":"min","value":3.0}"#);
        let back: ValidationRule = serde_json::from_str(r#"{"type":"pattern","value":"[0-9]+"}"#)
            .expect("deserialize");
        assert_eq!(
            back.html_attribute(),
            Some(("pattern", "[0-9]+".to_string()))
        );
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let json = r#"{
            "id": "f1", "name": "Form",
            "sections": [{
                "id": "s1", "title": "S",
                "rows": [{ "id": "r1", "columns": [{ "id": "c1", "fields": [] }] }]
            }]
        }"#;
        let schema: FormSchema = serde_json::from_str(json).expect("deserialize");
        assert_eq!(schema.version, 1);
        assert_eq!(schema.sections[0].layout, SectionLayout::Stack);
        let column = &schema.sections[0].rows[0].columns[0];
        assert_eq!((column.span, column.col_span, column.row_span), (4, 1, 1));
    }

    #[test]
    fn binding_token_wraps_property() {
        let field = Field {
            id: "x".into(),
            field_type: FieldType::Text,
            name: "applicant".into(),
            label: "Applicant".into(),
            binding_property: Some("applicantName".into()),
            original_id: None,
            original_name: None,
            html_attributes: HtmlAttributes::new(),
            placeholder: None,
            help_text: None,
            default_value: None,
            options: Vec::new(),
            validations: Vec::new(),
        };
        assert_eq!(field.binding_token().as_deref(), Some("${applicantName}"));
    }
}
