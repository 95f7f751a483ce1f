use crate::import::parse_html_to_schema;
use crate::schema::FormSchema;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const FORM_EXTENSIONS: &[&str] = &["html", "htm", "json"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse form: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid form schema: missing required fields (id, name, sections)")]
    InvalidSchema,
    #[error("HTML content does not contain form elements")]
    NoFormElements,
    #[error("Unrecognized form format. Expected JSON schema or HTML form.")]
    UnrecognizedFormat,
    #[error("Failed to decode base64 data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Failed to decode base64 data: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("failed to scan directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Loads a form from text that is either a saved schema or an HTML form.
///
/// `content_type` is a MIME type hint and may be empty. `source` names the
/// origin and becomes the fallback form name for HTML input.
pub fn load_form_content(
    content: &str,
    content_type: &str,
    source: &str,
) -> Result<FormSchema, LoadError> {
    let trimmed = content.trim();

    if content_type.contains("json") || trimmed.starts_with('{') {
        return parse_schema_json(content);
    }

    if content_type.contains("html") || trimmed.starts_with('<') || content.contains("<html") {
        let has_controls = ["<form", "<input", "<textarea", "<select"]
            .iter()
            .any(|tag| content.contains(tag));
        if !has_controls {
            return Err(LoadError::NoFormElements);
        }
        return Ok(parse_html_to_schema(content, source));
    }

    if ["<form", "<input", "<table"]
        .iter()
        .any(|tag| content.contains(tag))
    {
        tracing::debug!(source, "treating untyped content as a legacy HTML form");
        return Ok(parse_html_to_schema(content, source));
    }

    Err(LoadError::UnrecognizedFormat)
}

fn parse_schema_json(content: &str) -> Result<FormSchema, LoadError> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let has_text = |key: &str| {
        value
            .get(key)
            .and_then(serde_json::Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };
    let has_sections = value.get("sections").is_some_and(serde_json::Value::is_array);
    if !(has_text("id") && has_text("name") && has_sections) {
        return Err(LoadError::InvalidSchema);
    }
    Ok(serde_json::from_value(value)?)
}

fn content_type_for(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("json") => "application/json",
        Some("html") | Some("htm") => "text/html",
        _ => "",
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Loads a form file; HTML forms are named after the file unless
/// `fallback_name` is given.
pub fn load_form_path(path: &Path, fallback_name: Option<&str>) -> Result<FormSchema, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Imported sample");
    load_form_content(&content, content_type_for(path), fallback_name.unwrap_or(stem))
}

/// Loads a schema passed as base64-encoded JSON.
pub fn load_form_base64(data: &str) -> Result<FormSchema, LoadError> {
    let bytes = STANDARD.decode(data.trim())?;
    let text = String::from_utf8(bytes)?;
    load_form_content(&text, "application/json", "base64 data")
}

/// Encodes a schema for [`load_form_base64`].
pub fn encode_for_import(schema: &FormSchema) -> Result<String, LoadError> {
    let json = serde_json::to_string(schema)?;
    Ok(STANDARD.encode(json))
}

/// Every `.html`, `.htm` and `.json` file under `dir`, sorted by path.
pub fn collect_form_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut result = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let path = entry.path();
            if extension(path).is_some_and(|ext| FORM_EXTENSIONS.contains(&ext.as_str())) {
                result.push(path.to_path_buf());
            }
        }
    }
    result.sort();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{create_empty_form, create_table_section};

    #[test]
    fn detects_json_by_prefix_and_validates_required_keys() {
        let schema = load_form_content(r#"{"id":"f1","name":"Saved","sections":[]}"#, "", "x")
            .expect("valid schema");
        assert_eq!(schema.name, "Saved");
        assert_eq!(schema.version, 1);

        let missing = load_form_content(r#"{"id":"f1","sections":[]}"#, "", "x");
        assert!(matches!(missing, Err(LoadError::InvalidSchema)));
        let bad = load_form_content("{not json", "", "x");
        assert!(matches!(bad, Err(LoadError::Json(_))));
    }

    #[test]
    fn html_must_contain_form_controls() {
        let err = load_form_content("<html><body><p>404</p></body></html>", "text/html", "x")
            .expect_err("no controls");
        assert_eq!(err.to_string(), "HTML content does not contain form elements");

        let schema = load_form_content("<p>Name <input name=n></p>", "", "sample")
            .expect("html form");
        assert_eq!(schema.fields().len(), 1);
        assert_eq!(schema.name, "sample");
    }

    #[test]
    fn legacy_fallback_and_unrecognized_content() {
        let schema = load_form_content("Header text <table><tr><td>x</td></tr></table>", "", "legacy")
            .expect("legacy table");
        assert_eq!(schema.sections.len(), 1);
        assert!(matches!(
            load_form_content("plain words", "text/plain", "x"),
            Err(LoadError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn base64_channel_round_trips() {
        let mut schema = create_empty_form(Some("Encoded"));
        schema.sections.push(create_table_section(None, Some(3)));
        let encoded = encode_for_import(&schema).expect("encode");
        let decoded = load_form_base64(&encoded).expect("decode");
        assert_eq!(decoded, schema);
        assert!(matches!(load_form_base64("%%%"), Err(LoadError::Base64(_))));
    }

    #[test]
    fn loads_files_and_collects_form_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).expect("mkdir");
        fs::write(dir.path().join("b.html"), "<input name=b>").expect("write");
        fs::write(nested.join("a.HTM"), "<input name=a>").expect("write");
        fs::write(dir.path().join("notes.txt"), "skip").expect("write");
        let json = serde_json::to_string(&create_empty_form(Some("J"))).expect("json");
        fs::write(dir.path().join("c.json"), json).expect("write");

        let files = collect_form_files(dir.path()).expect("collect");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string())
            .collect();
        assert_eq!(names, ["b.html", "c.json", "a.HTM"]);

        let form = load_form_path(&dir.path().join("b.html"), None).expect("load");
        assert_eq!(form.name, "b");
        let named = load_form_path(&dir.path().join("b.html"), Some("Custom")).expect("load");
        assert_eq!(named.name, "Custom");
        assert!(matches!(
            load_form_path(&dir.path().join("missing.html"), None),
            Err(LoadError::Io { .. })
        ));
    }
}
