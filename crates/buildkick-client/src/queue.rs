//! Queue request bodies

use buildkick_utils::types::BuildParameters;

/// XML body for `POST /buildQueue`.
///
/// The `<properties>` element is omitted when there are no parameters.
#[must_use]
pub fn queue_request_xml(config_id: &str, parameters: &BuildParameters) -> String {
    let mut xml = format!("<build><buildType id='{}'/>", escape_attribute(config_id));
    if !parameters.is_empty() {
        xml.push_str("<properties>");
        for (name, value) in parameters.iter() {
            xml.push_str(&format!(
                "<property name='{}' value='{}'/>",
                escape_attribute(name),
                escape_attribute(value)
            ));
        }
        xml.push_str("</properties>");
    }
    xml.push_str("</build>");
    xml
}

/// Escape a value for a single- or double-quoted XML attribute.
#[must_use]
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}
