//! EDMS properties and action-code libraries.
//!
//! Both libraries are XML files owned by the host system. They are loaded
//! on first use through a [`LibraryStore`] and stay cached until the store
//! is invalidated.

use crate::export::naming::UNKNOWN_CLASS;
use crate::schema::{visit_fields_mut, FormSchema};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAX_ACTION_CODE_LEN: usize = 10;

const DEFAULT_ACTION_CODES: &[(&str, &str)] = &[
    ("AMD", "Amendment"),
    ("CI", "Check in"),
    ("CO", "Check out"),
    ("CPY", "Copy"),
    ("CRE", "Creation"),
    ("DF", "Details"),
    ("QRY", "Query"),
    ("REC", "Re-categorize"),
    ("SAS", "Save document"),
];

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid library XML in {origin}: {source}")]
    Xml {
        origin: String,
        #[source]
        source: quick_xml::DeError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionCodeError {
    #[error("Action code cannot be empty")]
    Empty,
    #[error("Action code must be all uppercase")]
    NotUppercase,
    #[error("Action code cannot contain spaces")]
    ContainsWhitespace,
    #[error("Action code can only contain uppercase letters and numbers")]
    InvalidCharacters,
    #[error("Action code cannot exceed 10 characters")]
    TooLong,
    #[error("Action code already exists")]
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassProperties {
    pub name: String,
    pub properties: Vec<PropertyDefinition>,
}

impl ClassProperties {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCode {
    pub value: String,
    pub label: String,
    pub description: String,
}

/// Read-only lookup of bindable classes and their properties.
pub trait PropertyDirectory {
    fn classes(&self) -> &[ClassProperties];

    fn class(&self, name: &str) -> Option<&ClassProperties> {
        self.classes().iter().find(|c| c.name == name)
    }

    fn has_property(&self, class: &str, property: &str) -> bool {
        self.class(class).is_some_and(|c| c.has_property(property))
    }
}

#[derive(Deserialize)]
struct PropertiesXml {
    #[serde(rename = "Class", default)]
    classes: Vec<ClassXml>,
}

#[derive(Deserialize)]
struct ClassXml {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "property", default)]
    properties: Vec<PropertyXml>,
}

#[derive(Deserialize)]
struct PropertyXml {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@label", default)]
    label: Option<String>,
}

#[derive(Deserialize)]
struct ActionCodesXml {
    #[serde(rename = "actionCode", default)]
    codes: Vec<ActionCodeXml>,
}

#[derive(Deserialize)]
struct ActionCodeXml {
    #[serde(rename = "@value", default)]
    value: Option<String>,
    #[serde(rename = "@label", default)]
    label: Option<String>,
    #[serde(rename = "@description", default)]
    description: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn read_file(path: &Path) -> Result<String, LibraryError> {
    fs::read_to_string(path).map_err(|source| LibraryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesLibrary {
    classes: Vec<ClassProperties>,
}

impl PropertiesLibrary {
    pub fn new(classes: Vec<ClassProperties>) -> Self {
        Self { classes }
    }

    pub fn parse(xml: &str, origin: &str) -> Result<Self, LibraryError> {
        let document: PropertiesXml =
            quick_xml::de::from_str(xml).map_err(|source| LibraryError::Xml {
                origin: origin.to_string(),
                source,
            })?;

        let classes = document
            .classes
            .into_iter()
            .map(|class| ClassProperties {
                name: non_empty(class.name).unwrap_or_else(|| UNKNOWN_CLASS.to_string()),
                properties: class
                    .properties
                    .into_iter()
                    .filter_map(|p| {
                        let name = non_empty(p.name)?;
                        let label = non_empty(p.label).unwrap_or_else(|| name.clone());
                        Some(PropertyDefinition { name, label })
                    })
                    .collect(),
            })
            .collect();
        Ok(Self { classes })
    }

    pub fn from_path(path: &Path) -> Result<Self, LibraryError> {
        Self::parse(&read_file(path)?, &path.display().to_string())
    }
}

impl PropertyDirectory for PropertiesLibrary {
    fn classes(&self) -> &[ClassProperties] {
        &self.classes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCodeLibrary {
    codes: Vec<ActionCode>,
}

impl ActionCodeLibrary {
    /// Built-in codes, used whenever no library file provides any.
    pub fn defaults() -> Self {
        let codes = DEFAULT_ACTION_CODES
            .iter()
            .map(|(value, description)| ActionCode {
                value: value.to_string(),
                label: value.to_string(),
                description: description.to_string(),
            })
            .collect();
        Self::from_codes(codes)
    }

    /// Codes sorted by value; an empty list falls back to the defaults.
    pub fn from_codes(mut codes: Vec<ActionCode>) -> Self {
        if codes.is_empty() {
            return Self::defaults();
        }
        codes.sort_by(|a, b| a.value.cmp(&b.value));
        Self { codes }
    }

    pub fn parse(xml: &str, origin: &str) -> Result<Self, LibraryError> {
        let document: ActionCodesXml =
            quick_xml::de::from_str(xml).map_err(|source| LibraryError::Xml {
                origin: origin.to_string(),
                source,
            })?;
        let codes = document
            .codes
            .into_iter()
            .filter_map(|code| {
                Some(ActionCode {
                    value: non_empty(code.value)?,
                    label: non_empty(code.label)?,
                    description: code.description.unwrap_or_default(),
                })
            })
            .collect();
        Ok(Self::from_codes(codes))
    }

    pub fn from_path(path: &Path) -> Result<Self, LibraryError> {
        Self::parse(&read_file(path)?, &path.display().to_string())
    }

    pub fn codes(&self) -> &[ActionCode] {
        &self.codes
    }

    pub fn contains(&self, value: &str) -> bool {
        self.codes.iter().any(|c| c.value == value)
    }
}

impl Default for ActionCodeLibrary {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Lazily loaded, cached libraries. Nothing is read until first asked for.
#[derive(Debug, Default)]
pub struct LibraryStore {
    properties_path: Option<PathBuf>,
    action_codes_path: Option<PathBuf>,
    properties: Option<PropertiesLibrary>,
    action_codes: Option<ActionCodeLibrary>,
}

impl LibraryStore {
    pub fn new(properties_path: Option<PathBuf>, action_codes_path: Option<PathBuf>) -> Self {
        Self {
            properties_path,
            action_codes_path,
            properties: None,
            action_codes: None,
        }
    }

    /// The properties library; an unconfigured path yields an empty library.
    pub fn properties(&mut self) -> Result<&PropertiesLibrary, LibraryError> {
        if self.properties.is_none() {
            let library = match &self.properties_path {
                Some(path) => PropertiesLibrary::from_path(path)?,
                None => PropertiesLibrary::default(),
            };
            tracing::debug!(classes = library.classes.len(), "loaded properties library");
            self.properties = Some(library);
        }
        Ok(&*self.properties.get_or_insert_with(PropertiesLibrary::default))
    }

    /// The action codes. A missing or unreadable file falls back to the
    /// built-in defaults with a warning.
    pub fn action_codes(&mut self) -> &ActionCodeLibrary {
        if self.action_codes.is_none() {
            let library = match &self.action_codes_path {
                Some(path) => ActionCodeLibrary::from_path(path).unwrap_or_else(|err| {
                    tracing::warn!("{err}; using default action codes");
                    ActionCodeLibrary::defaults()
                }),
                None => ActionCodeLibrary::defaults(),
            };
            self.action_codes = Some(library);
        }
        self.action_codes.get_or_insert_with(ActionCodeLibrary::defaults)
    }

    /// Drops cached libraries; the next access reads the files again.
    pub fn invalidate(&mut self) {
        self.properties = None;
        self.action_codes = None;
    }

    pub fn reload(&mut self) -> Result<(), LibraryError> {
        self.invalidate();
        self.properties()?;
        self.action_codes();
        Ok(())
    }
}

/// Checks a new action code against the syntax rules and the existing codes.
pub fn validate_action_code(code: &str, existing: &[ActionCode]) -> Result<(), ActionCodeError> {
    validate_action_code_syntax(code)?;
    if existing.iter().any(|c| c.value == code) {
        return Err(ActionCodeError::Duplicate);
    }
    Ok(())
}

pub fn validate_action_code_syntax(code: &str) -> Result<(), ActionCodeError> {
    if code.trim().is_empty() {
        return Err(ActionCodeError::Empty);
    }
    if code != code.to_uppercase() {
        return Err(ActionCodeError::NotUppercase);
    }
    if code.chars().any(char::is_whitespace) {
        return Err(ActionCodeError::ContainsWhitespace);
    }
    if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err(ActionCodeError::InvalidCharacters);
    }
    if code.chars().count() > MAX_ACTION_CODE_LEN {
        return Err(ActionCodeError::TooLong);
    }
    Ok(())
}

/// Moves the form to `class`. Fields bound to a property the class does not
/// have lose their binding and default value.
pub fn reassign_class(
    schema: &FormSchema,
    class: &str,
    directory: &dyn PropertyDirectory,
) -> FormSchema {
    let mut next = schema.clone();
    next.form_class = Some(class.to_string()).filter(|c| !c.trim().is_empty());

    let target = next.form_class.as_deref().and_then(|c| directory.class(c));
    let mut cleared = 0usize;
    for section in &mut next.sections {
        visit_fields_mut(&mut section.rows, &mut |field| {
            let valid = match (&field.binding_property, target) {
                (None, _) => true,
                (Some(property), Some(class)) => class.has_property(property),
                (Some(_), None) => false,
            };
            if !valid {
                field.binding_property = None;
                field.default_value = None;
                cleared += 1;
            }
        });
    }
    if cleared > 0 {
        tracing::debug!(cleared, class, "cleared bindings not in class");
    }
    next
}
