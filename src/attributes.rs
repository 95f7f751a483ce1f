use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// HTML attributes in source order.
///
/// Serializes as a JSON object; keys keep the order they were inserted in,
/// so an imported element is re-emitted with its attributes where they were.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlAttributes(Vec<(String, String)>);

impl HtmlAttributes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Sets `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders ` key="value"` pairs with escaped values, or an empty string.
    /// Keys that are not valid attribute names are left out.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.0 {
            if !is_attribute_name(key) {
                tracing::warn!(key = key.as_str(), "skipping invalid attribute name");
                continue;
            }
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&crate::export::escape_html(value));
            out.push('"');
        }
        out
    }
}

/// True when `name` can be written as an attribute name without quoting.
pub fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '<')
        })
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HtmlAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = HtmlAttributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

impl Serialize for HtmlAttributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct AttributesVisitor;

impl<'de> Visitor<'de> for AttributesVisitor {
    type Value = HtmlAttributes;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of attribute names to string values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut attrs = HtmlAttributes::new();
        while let Some((key, value)) = access.next_entry::<String, String>()? {
            attrs.insert(key, value);
        }
        Ok(attrs)
    }
}

impl<'de> Deserialize<'de> for HtmlAttributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_position_of_existing_key() {
        let mut attrs = HtmlAttributes::new();
        attrs.insert("class", "a");
        attrs.insert("id", "x");
        attrs.insert("class", "b");
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["class", "id"]);
        assert_eq!(attrs.get("class"), Some("b"));
    }

    #[test]
    fn json_object_preserves_key_order() {
        let attrs: HtmlAttributes = [("style", "x"), ("border", "1"), ("align", "c")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&attrs).expect("serialize");
        assert_eq!(json, r#"{"style":"x","border":"1","align":"c"}"#);

        let back: HtmlAttributes = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, attrs);
    }

    #[test]
    fn renders_escaped_attribute_values() {
        let attrs: HtmlAttributes = [("title", "a \"b\" & <c>")].into_iter().collect();
        assert_eq!(attrs.to_html(), r#" title="a &quot;b&quot; &amp; &lt;c&gt;""#);
    }

    #[test]
    fn drops_keys_that_would_break_the_tag() {
        let attrs: HtmlAttributes = [
            ("class", "ok"),
            (r#"x"><script>alert(1)</script"#, "v"),
            ("data id", "v"),
            ("", "v"),
            ("data-row", "2"),
        ]
        .into_iter()
        .collect();
        assert_eq!(attrs.to_html(), r#" class="ok" data-row="2""#);
        assert!(is_attribute_name("aria-label"));
        assert!(!is_attribute_name("a=b"));
        assert!(!is_attribute_name("a/"));
    }
}
