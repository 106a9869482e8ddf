//! CI properties files
//!
//! The CI agent writes build and configuration parameters as `key=value` lines.
//! Values use Java-properties escaping (`\:`, `\=`, `\\`, `\uXXXX`).

use buildkick_redaction::{REDACTED, is_sensitive_key};
use buildkick_utils::error::ConfigError;
use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Parsed `key=value` pairs, ordered by key.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(k, v)| {
                let shown = if is_sensitive_key(k) { REDACTED } else { v.as_str() };
                (k, shown)
            }))
            .finish()
    }
}

impl Properties {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse properties file content.
///
/// Each line is split at its first `=`; the key is kept verbatim and the value
/// unescaped. Comment lines (`#`, `!`) and lines without `=` are skipped. A
/// repeated key keeps its last value.
#[must_use]
pub fn parse_properties(content: &str) -> Properties {
    let mut map = BTreeMap::new();
    for line in content.lines() {
        if line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.to_string(), unescape(value));
        }
    }
    Properties(map)
}

/// Load a properties file.
///
/// A missing file yields `Ok(None)` so callers can fall through to the next
/// source; any other read failure is a configuration error.
pub fn load_properties(path: &Path) -> Result<Option<Properties>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            info!("Reading properties file: '{}'", path.display());
            let properties = parse_properties(&content);
            debug!("Read {} properties from '{}'", properties.len(), path.display());
            Ok(Some(properties))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("Couldn't find properties file: '{}'", path.display());
            Ok(None)
        }
        Err(e) => Err(ConfigError::PropertiesFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    _ => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_splits_at_first_equals() {
        let props = parse_properties("a=b=c\nteamcity.buildType.id=Root_Build\n");
        assert_eq!(props.get("a"), Some("b=c"));
        assert_eq!(props.get("teamcity.buildType.id"), Some("Root_Build"));
    }

    #[test]
    fn test_parse_skips_comments_and_plain_lines() {
        let props = parse_properties("#TeamCity build properties\n!also\nno separator\nk=v\n");
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("k"), Some("v"));
    }

    #[test]
    fn test_unescapes_values() {
        let props = parse_properties(
            "teamcity.serverUrl=https\\://ci.example.com\\:8111\npath=C\\:\\\\agent\\\\work\nu=caf\\u00e9\nmixed=a\\=b\\tc\n",
        );
        assert_eq!(
            props.get("teamcity.serverUrl"),
            Some("https://ci.example.com:8111")
        );
        assert_eq!(props.get("path"), Some("C:\\agent\\work"));
        assert_eq!(props.get("u"), Some("café"));
        assert_eq!(props.get("mixed"), Some("a=b\tc"));
    }

    #[test]
    fn test_invalid_unicode_escape_kept_literally() {
        let props = parse_properties("k=\\uZZ\n");
        assert_eq!(props.get("k"), Some("uZZ"));
    }

    #[test]
    fn test_debug_masks_sensitive_values() {
        let props = parse_properties("teamcity.auth.password=s3cr3t\nk=v\n");
        let shown = format!("{props:?}");
        assert!(!shown.contains("s3cr3t"));
        assert!(shown.contains("\"k\": \"v\""));
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_properties(&dir.path().join("absent.properties")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "teamcity.auth.userId=TeamCityBuildId=42").unwrap();
        let props = load_properties(file.path()).unwrap().unwrap();
        assert_eq!(props.get("teamcity.auth.userId"), Some("TeamCityBuildId=42"));
    }
}
