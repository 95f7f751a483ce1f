use super::dom::{
    self, ancestors, attr, child_elements, collect_attributes, descendant_elements, is_cell,
    label_text, nearest_cell, non_empty_attr, own_text, parent_element, tag,
};
use crate::builders::generate_field_name;
use crate::schema::{
    create_id, DefaultValue, Field, FieldOption, FieldType, RuleValue, ValidationRule,
};
use regex::Regex;
use scraper::ElementRef;
use std::collections::HashMap;
use std::sync::OnceLock;

fn binding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{\s*([^}]+?)\s*\}").expect("valid binding pattern"))
}

/// Property name of the first `${property}` token in `value`.
pub fn binding_property(value: &str) -> Option<String> {
    binding_pattern()
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty())
}

/// Turns a control name into a readable label: `__first-name` -> `first name`.
pub fn sanitize_label(raw: &str) -> String {
    let stripped = raw.trim_start_matches('_');
    let spaced: String = stripped
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    dom::collapse_whitespace(&spaced)
}

pub(crate) fn infer_field_type(el: &ElementRef<'_>) -> FieldType {
    match tag(el) {
        "textarea" => FieldType::Textarea,
        "select" => FieldType::Select,
        _ => match attr(el, "type").map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("number") => FieldType::Number,
            Some("date") => FieldType::Date,
            Some("checkbox") => FieldType::Checkbox,
            Some("radio") => FieldType::Radio,
            _ => FieldType::Text,
        },
    }
}

/// Fields read from a region of the document, plus the elements they used up.
pub(crate) struct ReadFields<'a> {
    pub fields: Vec<Field>,
    pub consumed: Vec<ElementRef<'a>>,
}

/// Maps form controls to fields, resolving labels against the whole document.
pub(crate) struct FieldReader<'a> {
    /// `<label for>` elements by target id, in document order.
    labels: HashMap<&'a str, Vec<ElementRef<'a>>>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(root: &ElementRef<'a>) -> Self {
        let mut labels: HashMap<&'a str, Vec<ElementRef<'a>>> = HashMap::new();
        for label in descendant_elements(root).filter(|el| tag(el) == "label") {
            if let Some(target) = attr(&label, "for") {
                labels.entry(target).or_default().push(label);
            }
        }
        Self { labels }
    }

    fn labels_for(&self, id: &str) -> &[ElementRef<'a>] {
        self.labels.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reads `controls` in order. Radios sharing a name become one field.
    pub(crate) fn read(&self, controls: &[ElementRef<'a>]) -> ReadFields<'a> {
        let mut fields: Vec<Field> = Vec::new();
        let mut consumed = Vec::new();
        let mut radio_groups: Vec<(String, usize)> = Vec::new();

        for control in controls {
            consumed.push(*control);
            if infer_field_type(control) != FieldType::Radio {
                fields.push(self.read_control(control, &mut consumed));
                continue;
            }

            let group = non_empty_attr(control, "name").map(str::to_string);
            let existing = group.as_ref().and_then(|name| {
                radio_groups
                    .iter()
                    .find(|(known, _)| known == name)
                    .map(|(_, index)| *index)
            });
            match existing {
                Some(index) => self.add_radio_option(&mut fields[index], control, &mut consumed),
                None => {
                    if let Some(name) = group {
                        radio_groups.push((name, fields.len()));
                    }
                    fields.push(self.read_radio_group(control, &mut consumed));
                }
            }
        }

        ReadFields { fields, consumed }
    }

    fn read_control(&self, el: &ElementRef<'a>, consumed: &mut Vec<ElementRef<'a>>) -> Field {
        let field_type = infer_field_type(el);
        let name = control_name(el);
        let label = self
            .resolve_label(el, consumed)
            .unwrap_or_else(|| sanitize_label(&name));

        let raw_value = match field_type {
            FieldType::Textarea => dom::text_content(el),
            FieldType::Select => selected_option(el)
                .map(|opt| option_value(&opt))
                .unwrap_or_default(),
            _ => attr(el, "value").unwrap_or_default().to_string(),
        };
        let binding = binding_property(&raw_value);
        let default_value = match (&binding, field_type) {
            (Some(_), _) => None,
            (None, FieldType::Checkbox) if attr(el, "checked").is_some() => {
                Some(DefaultValue::Flag(true))
            }
            (None, FieldType::Checkbox) if raw_value == "on" => None,
            (None, _) => Some(raw_value.trim())
                .filter(|v| !v.is_empty())
                .map(|v| DefaultValue::Text(v.to_string())),
        };

        let options = if field_type == FieldType::Select {
            descendant_elements(el)
                .filter(|opt| tag(opt) == "option")
                .map(|opt| read_option(&opt))
                .collect()
        } else {
            Vec::new()
        };

        Field {
            id: create_id(),
            field_type,
            original_id: non_empty_attr(el, "id").map(str::to_string),
            original_name: original_name(el),
            name,
            label,
            binding_property: binding,
            html_attributes: collect_attributes(el),
            placeholder: non_empty_attr(el, "placeholder").map(str::to_string),
            help_text: non_empty_attr(el, "title").map(str::to_string),
            default_value,
            options,
            validations: read_validations(el),
        }
    }

    fn read_radio_group(&self, el: &ElementRef<'a>, consumed: &mut Vec<ElementRef<'a>>) -> Field {
        let name = control_name(el);
        let option_label = self.radio_option_label(el, consumed);
        let value = attr(el, "value").unwrap_or_default();

        // The group caption lives either in a wrapper around the radios or in
        // a label pointing at the first one.
        let label = match radio_container(el) {
            Some(container) => {
                consumed.push(container);
                let caption = match child_elements(&container).find(|c| tag(c) == "legend") {
                    Some(legend) => label_text(&legend),
                    None => own_text(&container),
                };
                Some(caption).filter(|c| !c.is_empty())
            }
            None => None,
        }
        .unwrap_or_else(|| sanitize_label(&name));

        let mut field = Field {
            id: create_id(),
            field_type: FieldType::Radio,
            original_id: non_empty_attr(el, "id").map(str::to_string),
            original_name: original_name(el),
            name,
            label,
            binding_property: binding_property(value),
            html_attributes: collect_attributes(el),
            placeholder: None,
            help_text: non_empty_attr(el, "title").map(str::to_string),
            default_value: None,
            options: Vec::new(),
            validations: read_validations(el),
        };
        push_radio_option(&mut field, el, option_label);
        field
    }

    fn add_radio_option(
        &self,
        field: &mut Field,
        el: &ElementRef<'a>,
        consumed: &mut Vec<ElementRef<'a>>,
    ) {
        let label = self.radio_option_label(el, consumed);
        push_radio_option(field, el, label);
    }

    fn radio_option_label(
        &self,
        el: &ElementRef<'a>,
        consumed: &mut Vec<ElementRef<'a>>,
    ) -> Option<String> {
        if let Some(label) = wrapping_label(el) {
            consumed.push(label);
            return Some(label_text(&label)).filter(|t| !t.is_empty());
        }
        let id = non_empty_attr(el, "id")?;
        let label = self
            .labels_for(id)
            .iter()
            .find(|l| nearest_cell(l) == nearest_cell(el))?;
        consumed.push(*label);
        Some(label_text(label)).filter(|t| !t.is_empty())
    }

    /// `<label for=id>` (same cell first), then a wrapping label, then an
    /// immediately preceding label.
    fn resolve_label(
        &self,
        el: &ElementRef<'a>,
        consumed: &mut Vec<ElementRef<'a>>,
    ) -> Option<String> {
        if let Some(id) = non_empty_attr(el, "id") {
            let cell = nearest_cell(el);
            let matching = self.labels_for(id);
            let first = matching.first();
            if let Some(local) = matching.iter().find(|l| nearest_cell(l) == cell) {
                let text = label_text(local);
                if !text.is_empty() {
                    consumed.push(*local);
                    return Some(text);
                }
            }
            // A label in another cell stays where it is; only its text is used.
            if let Some(text) = first.map(label_text).filter(|t| !t.is_empty()) {
                return Some(text);
            }
        }

        if let Some(label) = wrapping_label(el) {
            let text = label_text(&label);
            if !text.is_empty() {
                consumed.push(label);
                return Some(text);
            }
        }

        let previous = el.prev_siblings().find_map(ElementRef::wrap)?;
        if tag(&previous) != "label" {
            return None;
        }
        let points_elsewhere = matches!(
            (attr(&previous, "for"), non_empty_attr(el, "id")),
            (Some(target), id) if Some(target) != id
        );
        if points_elsewhere {
            return None;
        }
        let text = label_text(&previous);
        if text.is_empty() {
            return None;
        }
        consumed.push(previous);
        Some(text)
    }
}

fn control_name(el: &ElementRef<'_>) -> String {
    non_empty_attr(el, "name")
        .or_else(|| non_empty_attr(el, "id"))
        .map(str::to_string)
        .unwrap_or_else(generate_field_name)
}

fn original_name(el: &ElementRef<'_>) -> Option<String> {
    non_empty_attr(el, "name")
        .or_else(|| non_empty_attr(el, "id"))
        .map(str::to_string)
}

fn wrapping_label<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    ancestors(el)
        .take_while(|a| !is_cell(a) && tag(a) != "table")
        .find(|a| tag(a) == "label")
}

/// A `div`/`fieldset`/`span`/`p` holding nothing but this radio group (its
/// radios, their labels, line breaks and caption text).
fn radio_container<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let anchor = wrapping_label(el).unwrap_or(*el);
    let container = parent_element(&anchor)?;
    if !matches!(tag(&container), "div" | "fieldset" | "span" | "p") {
        return None;
    }
    let group = attr(el, "name");
    let is_group_radio =
        |c: &ElementRef<'_>| infer_field_type(c) == FieldType::Radio && attr(c, "name") == group;

    let only_group = child_elements(&container).all(|child| match tag(&child) {
        "br" | "legend" => true,
        "input" => is_group_radio(&child),
        "label" => {
            let controls: Vec<_> = descendant_elements(&child)
                .filter(dom::is_field_element)
                .collect();
            controls.len() == 1 && is_group_radio(&controls[0])
        }
        _ => false,
    });
    only_group.then_some(container)
}

fn push_radio_option(field: &mut Field, el: &ElementRef<'_>, label: Option<String>) {
    let value = attr(el, "value").unwrap_or_default().trim().to_string();
    let label = label.unwrap_or_else(|| {
        if value.is_empty() {
            "Option".to_string()
        } else {
            value.clone()
        }
    });
    let value = if value.is_empty() {
        label.clone()
    } else {
        value
    };
    if attr(el, "checked").is_some() && binding_property(&value).is_none() {
        field.default_value = Some(DefaultValue::Text(value.clone()));
    }
    field.options.push(FieldOption { label, value });
}

fn selected_option<'a>(select: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    descendant_elements(select).find(|opt| tag(opt) == "option" && attr(opt, "selected").is_some())
}

fn option_value(option: &ElementRef<'_>) -> String {
    match attr(option, "value") {
        Some(value) => value.to_string(),
        None => dom::collapse_whitespace(&dom::text_content(option)),
    }
}

fn read_option(option: &ElementRef<'_>) -> FieldOption {
    let text = dom::collapse_whitespace(&dom::text_content(option));
    let value = attr(option, "value").map(str::to_string);
    let label = if !text.is_empty() {
        text.clone()
    } else {
        value.clone().filter(|v| !v.is_empty()).unwrap_or_else(|| "Option".to_string())
    };
    let value = value
        .filter(|v| !v.is_empty())
        .or_else(|| Some(text).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| "option".to_string());
    FieldOption { label, value }
}

fn rule_value(raw: &str) -> RuleValue {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => RuleValue::Number(n),
        _ => RuleValue::Text(raw.to_string()),
    }
}

fn read_validations(el: &ElementRef<'_>) -> Vec<ValidationRule> {
    let mut rules = Vec::new();
    if attr(el, "required").is_some() {
        rules.push(ValidationRule::Required {
            value: None,
            message: None,
        });
    }
    if let Some(min) = non_empty_attr(el, "min") {
        rules.push(ValidationRule::Min {
            value: Some(rule_value(min)),
            message: None,
        });
    }
    if let Some(max) = non_empty_attr(el, "max") {
        rules.push(ValidationRule::Max {
            value: Some(rule_value(max)),
            message: None,
        });
    }
    if let Some(pattern) = non_empty_attr(el, "pattern") {
        rules.push(ValidationRule::Pattern {
            value: Some(RuleValue::Text(pattern.to_string())),
            message: None,
        });
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::dom::first_element;
    use scraper::Html;

    fn read_all(html: &str) -> Vec<Field> {
        let doc = Html::parse_document(html);
        let root = doc.root_element();
        let controls: Vec<_> = descendant_elements(&root)
            .filter(dom::is_field_element)
            .collect();
        FieldReader::new(&root).read(&controls).fields
    }

    #[test]
    fn extracts_binding_tokens() {
        assert_eq!(binding_property("${applicantName}").as_deref(), Some("applicantName"));
        assert_eq!(binding_property("pre ${ spaced } post").as_deref(), Some("spaced"));
        assert_eq!(binding_property("plain"), None);
        assert_eq!(binding_property("${}"), None);
    }

    #[test]
    fn sanitizes_names_into_labels() {
        assert_eq!(sanitize_label("__first_name"), "first name");
        assert_eq!(sanitize_label("date-of--birth"), "date of birth");
        assert_eq!(sanitize_label("plain"), "plain");
    }

    #[test]
    fn infers_types_from_tag_and_type_attribute() {
        let doc = Html::parse_document(
            "<textarea></textarea><select></select><input type=NUMBER><input type=date>\
             <input type=checkbox><input type=radio><input type=email><input>",
        );
        let types: Vec<_> = descendant_elements(&doc.root_element())
            .filter(dom::is_field_element)
            .map(|el| infer_field_type(&el))
            .collect();
        assert_eq!(
            types,
            vec![
                FieldType::Textarea,
                FieldType::Select,
                FieldType::Number,
                FieldType::Date,
                FieldType::Checkbox,
                FieldType::Radio,
                FieldType::Text,
                FieldType::Text,
            ]
        );
    }

    #[test]
    fn resolves_labels_in_priority_order() {
        let fields = read_all(
            "<label for=a>By for</label><input id=a name=a>\
             <label>Wrapped <input name=b></label>\
             <div><label>Preceding</label><input name=c></div>\
             <input name=__no_label_here>",
        );
        let labels: Vec<_> = fields.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["By for", "Wrapped", "Preceding", "no label here"]);
    }

    #[test]
    fn for_labels_prefer_the_control_cell() {
        let mut html = String::from("<table><tr><td><label for=shared>Elsewhere</label></td>");
        for i in 0..300 {
            html.push_str(&format!("<td><label for=f{i}>Label {i}</label><input id=f{i}></td>"));
        }
        html.push_str("<td><label for=shared>Here</label><input id=shared></td></tr></table>");
        let fields = read_all(&html);
        assert_eq!(fields.len(), 301);
        assert_eq!(fields[299].label, "Label 299");
        assert_eq!(fields[300].label, "Here");
    }

    #[test]
    fn checked_checkbox_defaults_to_true() {
        let fields = read_all(
            "<input type=checkbox name=a checked><input type=checkbox name=b value=yes checked>\
             <input type=checkbox name=c value=yes><input type=checkbox name=d value=${flag} checked>",
        );
        let defaults: Vec<_> = fields.iter().map(|f| f.default_value.clone()).collect();
        assert_eq!(
            defaults,
            vec![
                Some(DefaultValue::Flag(true)),
                Some(DefaultValue::Flag(true)),
                Some(DefaultValue::Text("yes".to_string())),
                None,
            ]
        );
        assert_eq!(fields[1].html_attributes.get("value"), Some("yes"));
    }

    #[test]
    fn binding_replaces_default_value() {
        let fields = read_all(
            "<input name=applicant value='${applicantName}'>\
             <textarea name=notes>${caseNotes}</textarea>\
             <input name=city value=Lima>",
        );
        assert_eq!(fields[0].binding_property.as_deref(), Some("applicantName"));
        assert_eq!(fields[0].default_value, None);
        assert_eq!(fields[1].binding_property.as_deref(), Some("caseNotes"));
        assert_eq!(fields[2].default_value, Some(DefaultValue::Text("Lima".into())));
        assert_eq!(fields[2].original_name.as_deref(), Some("city"));
        assert_eq!(fields[2].html_attributes.get("value"), Some("Lima"));
    }

    #[test]
    fn select_options_map_one_to_one() {
        let fields = read_all(
            "<select name=s><option value=a>Alpha</option><option>Beta</option>\
             <option value=c></option></select>",
        );
        assert_eq!(
            fields[0].options,
            vec![
                FieldOption::new("Alpha", "a"),
                FieldOption::new("Beta", "Beta"),
                FieldOption::new("c", "c"),
            ]
        );
    }

    #[test]
    fn radios_with_one_name_form_a_single_field() {
        let fields = read_all(
            "<div>Gender<label><input type=radio name=g value=m> Male</label>\
             <label><input type=radio name=g value=f checked> Female</label></div>\
             <input type=radio name=other value=x>",
        );
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].label, "Gender");
        assert_eq!(
            fields[0].options,
            vec![FieldOption::new("Male", "m"), FieldOption::new("Female", "f")]
        );
        assert_eq!(fields[0].default_value, Some(DefaultValue::Text("f".into())));
        assert_eq!(fields[1].options, vec![FieldOption::new("x", "x")]);
    }

    #[test]
    fn constraint_attributes_become_validations() {
        let fields = read_all("<input type=number name=n required min=1 max=10>");
        assert_eq!(fields[0].validations.len(), 3);
        assert_eq!(
            fields[0].validations[1],
            ValidationRule::Min {
                value: Some(RuleValue::Number(1.0)),
                message: None
            }
        );
    }

    #[test]
    fn missing_name_falls_back_to_id_then_generated() {
        let fields = read_all("<input id=only_id><input>");
        assert_eq!(fields[0].name, "only_id");
        assert!(fields[1].name.starts_with("field_"));
        assert_eq!(fields[1].original_name, None);
        let doc = Html::parse_document("<p></p>");
        assert!(first_element(&doc.root_element(), &["input"]).is_none());
    }
}
