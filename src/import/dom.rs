use crate::attributes::{is_attribute_name, HtmlAttributes};
use ego_tree::NodeId;
use scraper::{ElementRef, Node};
use std::collections::HashSet;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title", "xmp"];

pub(crate) fn tag<'a>(el: &ElementRef<'a>) -> &'a str {
    el.value().name()
}

pub(crate) fn is_field_element(el: &ElementRef<'_>) -> bool {
    matches!(tag(el), "input" | "textarea" | "select")
}

pub(crate) fn is_cell(el: &ElementRef<'_>) -> bool {
    matches!(tag(el), "td" | "th")
}

pub(crate) fn attr<'a>(el: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name)
}

/// Attribute value with surrounding whitespace removed; `None` when blank.
pub(crate) fn non_empty_attr<'a>(el: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    attr(el, name).map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn collect_attributes(el: &ElementRef<'_>) -> HtmlAttributes {
    el.value().attrs().collect()
}

pub(crate) fn parent_element<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.parent().and_then(ElementRef::wrap)
}

pub(crate) fn ancestors<'a>(el: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.ancestors().filter_map(ElementRef::wrap)
}

/// The closest `<table>` strictly above `el`; this table owns the element.
pub(crate) fn nearest_table<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    ancestors(el).find(|a| tag(a) == "table")
}

pub(crate) fn nearest_cell<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    ancestors(el).find(is_cell)
}

pub(crate) fn child_elements<'a>(el: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.children().filter_map(ElementRef::wrap)
}

/// Every element below `el` (and `el` itself) in document order.
pub(crate) fn descendant_elements<'a>(el: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.descendants().filter_map(ElementRef::wrap)
}

pub(crate) fn first_element<'a>(
    root: &ElementRef<'a>,
    names: &[&str],
) -> Option<ElementRef<'a>> {
    descendant_elements(root).find(|el| names.contains(&tag(el)))
}

pub(crate) fn text_content(el: &ElementRef<'_>) -> String {
    el.text().collect()
}

/// Collapsed text of `el`, ignoring anything inside form controls.
pub(crate) fn label_text(el: &ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_label_text(el, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_label_text(el: &ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if !is_field_element(&child_el) {
                        collect_label_text(&child_el, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Text directly under `el`, not inside child elements.
pub(crate) fn own_text(el: &ElementRef<'_>) -> String {
    let raw: String = el
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(text.to_string()),
            _ => None,
        })
        .collect();
    collapse_whitespace(&raw)
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\u{a0}', "&nbsp;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\u{a0}', "&nbsp;")
}

/// Elements of one parsed document, keyed by tree node.
#[derive(Debug, Default)]
pub(crate) struct NodeSet(HashSet<NodeId>);

impl NodeSet {
    pub(crate) fn insert(&mut self, el: &ElementRef<'_>) {
        self.0.insert(el.id());
    }

    pub(crate) fn contains(&self, el: &ElementRef<'_>) -> bool {
        self.0.contains(&el.id())
    }
}

impl<'a> Extend<ElementRef<'a>> for NodeSet {
    fn extend<I: IntoIterator<Item = ElementRef<'a>>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(|el| el.id()));
    }
}

impl<'a> FromIterator<ElementRef<'a>> for NodeSet {
    fn from_iter<I: IntoIterator<Item = ElementRef<'a>>>(iter: I) -> Self {
        let mut set = NodeSet::default();
        set.extend(iter);
        set
    }
}

/// Serializes markup while leaving out a set of elements.
///
/// An element whose whole content was left out is dropped as well, so a
/// `<p>` that only wrapped a form control does not survive as `<p></p>`.
/// Elements that were already empty in the source are kept.
pub(crate) struct MarkupWriter<'s> {
    skip: &'s NodeSet,
}

impl<'s> MarkupWriter<'s> {
    pub(crate) fn new(skip: &'s NodeSet) -> Self {
        Self { skip }
    }

    pub(crate) fn children(&self, parent: &ElementRef<'_>) -> String {
        self.children_where(parent, &|_| true)
    }

    /// Serializes the children of `parent` whose position passes `include`.
    pub(crate) fn children_where(
        &self,
        parent: &ElementRef<'_>,
        include: &dyn Fn(usize) -> bool,
    ) -> String {
        let mut out = String::new();
        self.write_children(parent, include, &mut out);
        out
    }

    /// Returns true when something below `parent` was left out.
    fn write_children(
        &self,
        parent: &ElementRef<'_>,
        include: &dyn Fn(usize) -> bool,
        out: &mut String,
    ) -> bool {
        let raw_text = RAW_TEXT_ELEMENTS.contains(&tag(parent));
        let mut removed = false;
        for (index, child) in parent.children().enumerate() {
            if !include(index) {
                continue;
            }
            match child.value() {
                Node::Text(text) => {
                    if raw_text {
                        out.push_str(text);
                    } else {
                        out.push_str(&escape_text(text));
                    }
                }
                Node::Comment(comment) => {
                    out.push_str("<!--");
                    out.push_str(comment);
                    out.push_str("-->");
                }
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        removed |= self.write_element(&el, out);
                    }
                }
                _ => {}
            }
        }
        removed
    }

    fn write_element(&self, el: &ElementRef<'_>, out: &mut String) -> bool {
        if self.skip.contains(el) {
            return true;
        }

        let name = tag(el);
        let mut open = format!("<{name}");
        for (key, value) in el.value().attrs().filter(|(key, _)| is_attribute_name(key)) {
            open.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
        }
        open.push('>');

        if VOID_ELEMENTS.contains(&name) {
            out.push_str(&open);
            return false;
        }

        let mut inner = String::new();
        let removed = self.write_children(el, &|_| true, &mut inner);
        if removed && inner.trim().is_empty() {
            return true;
        }

        out.push_str(&open);
        out.push_str(&inner);
        out.push_str(&format!("</{name}>"));
        removed
    }
}
