pub mod html;
pub mod naming;

pub use html::{render, schema_to_html, HtmlExporter};
pub use naming::{export_file_name, schema_file_name};

/// Entity-escapes text for element content and double-quoted attributes.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
