use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn missing_row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(<(?:table|tbody)\b[^>]*>)(\s*)(<t[dh]\b)").expect("valid row pattern")
    })
}

/// Inserts the `<tr>` that some legacy documents leave out when cells sit
/// directly inside `<table>` or `<tbody>`.
pub fn repair_missing_rows(html: &str) -> Cow<'_, str> {
    let repaired = missing_row_pattern().replace_all(html, "${1}${2}<tr>${3}");
    if let Cow::Owned(_) = repaired {
        tracing::debug!("inserted missing <tr> wrappers");
    }
    repaired
}
