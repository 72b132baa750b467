//! Browser-exported cookie files, shared by the cookie-authenticated
//! sources.
//!
//! Accepts both the browser-extension export format (a list of
//! `{"name": ..., "value": ...}` objects) and a flat `{name: value}` map.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::AdapterError;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCookies {
    Exported(Vec<ExportedCookie>),
    Flat(HashMap<String, String>),
}

#[derive(Deserialize)]
struct ExportedCookie {
    name: String,
    value: String,
}

pub(crate) struct CookieFile {
    cookies: HashMap<String, String>,
}

impl CookieFile {
    pub(crate) fn load(path: &Path) -> Result<Self, AdapterError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AdapterError::Config(format!("cannot read cookie file {}: {e}", path.display()))
        })?;
        let raw: RawCookies = serde_json::from_str(&content).map_err(|e| {
            AdapterError::Config(format!("cannot parse cookie file {}: {e}", path.display()))
        })?;
        let cookies = match raw {
            RawCookies::Exported(list) => {
                let map: HashMap<String, String> =
                    list.into_iter().map(|c| (c.name, c.value)).collect();
                info!(count = map.len(), path = %path.display(), "converted browser cookie export");
                map
            }
            RawCookies::Flat(map) => map,
        };
        Ok(Self { cookies })
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// The cookie named `name`, or a config error naming it.
    pub(crate) fn require(&self, name: &str) -> Result<&str, AdapterError> {
        self.get(name)
            .ok_or_else(|| AdapterError::Config(format!("no {name:?} cookie in cookie file")))
    }

    /// Render all cookies as a `Cookie:` header value.
    pub(crate) fn header_value(&self) -> String {
        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_browser_export_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"sessionid","value":"abc","domain":".example.com"}},
               {{"name":"csrftoken","value":"tok"}}]"#
        )
        .unwrap();
        let cookies = CookieFile::load(file.path()).unwrap();
        assert_eq!(cookies.require("sessionid").unwrap(), "abc");
        assert_eq!(cookies.get("csrftoken"), Some("tok"));
    }

    #[test]
    fn parses_flat_map_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"auth_token":"xyz","ct0":"csrf"}}"#).unwrap();
        let cookies = CookieFile::load(file.path()).unwrap();
        assert_eq!(cookies.get("auth_token"), Some("xyz"));
        assert_eq!(cookies.header_value(), "auth_token=xyz; ct0=csrf");
    }

    #[test]
    fn missing_cookie_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        let cookies = CookieFile::load(file.path()).unwrap();
        assert!(matches!(
            cookies.require("sessionid"),
            Err(AdapterError::Config(_))
        ));
    }
}
