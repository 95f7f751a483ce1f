use crate::schema::FormSchema;
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_ACTION_CODE: &str = "CRE";
pub const UNKNOWN_CLASS: &str = "UnknownClass";

fn whitespace_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// File name for the saved schema JSON, e.g. `Leave_request_AMD.json`.
pub fn schema_file_name(schema: &FormSchema) -> String {
    let name = non_blank(Some(schema.name.as_str())).unwrap_or("form");
    let name = whitespace_run().replace_all(name, "_");
    match non_blank(schema.action_code.as_deref()) {
        Some(code) => format!("{name}_{code}.json"),
        None => format!("{name}.json"),
    }
}

/// File name for the exported document: `{class}_{action}.xml`.
pub fn export_file_name(schema: &FormSchema, default_action_code: &str) -> String {
    let class = non_blank(schema.form_class.as_deref()).unwrap_or(UNKNOWN_CLASS);
    let code = non_blank(schema.action_code.as_deref())
        .or(non_blank(Some(default_action_code)))
        .unwrap_or(DEFAULT_ACTION_CODE);
    format!("{class}_{code}.xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::create_empty_form;

    #[test]
    fn schema_file_name_replaces_whitespace_runs() {
        let mut schema = create_empty_form(Some("Leave  request\tform"));
        assert_eq!(schema_file_name(&schema), "Leave_request_form.json");
        schema.action_code = Some("AMD".to_string());
        assert_eq!(schema_file_name(&schema), "Leave_request_form_AMD.json");
        schema.name = " ".to_string();
        assert_eq!(schema_file_name(&schema), "form_AMD.json");
    }

    #[test]
    fn export_file_name_falls_back_to_unknown_class_and_default_code() {
        let mut schema = create_empty_form(None);
        assert_eq!(export_file_name(&schema, DEFAULT_ACTION_CODE), "UnknownClass_CRE.xml");
        assert_eq!(export_file_name(&schema, "QRY"), "UnknownClass_QRY.xml");
        schema.form_class = Some("Invoice".to_string());
        schema.action_code = Some("CO".to_string());
        assert_eq!(export_file_name(&schema, "QRY"), "Invoice_CO.xml");
    }
}
