//! Named property sets. A source id such as `admin` resolves to `admin.properties` under the
//! loader's directory. Files use the Java properties syntax the broker tooling expects.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    future::Future,
    path::{Path, PathBuf},
};

use tracing::{debug, error, instrument, trace};

use crate::{
    error::{AdminError, Result},
    SecureString,
};

const PROPERTIES_EXTENSION: &str = "properties";
const SENSITIVE_KEY_MARKERS: &[&str] = &["password", "secret", "token", "key"];

/// An ordered string to string map, used both for connection settings and topic configuration
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

/// Configuration applied to a topic at creation time. Empty means broker defaults
pub type TopicConfig = Properties;

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Fetches a value that should never end up in logs
    pub fn get_secret(&self, key: &str) -> Option<SecureString> {
        self.0.get(key).map(|v| SecureString::from(v.as_str()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copies every entry of `overrides` into this set. Overrides win on key collision
    pub fn merge(&mut self, overrides: &Properties) {
        self.0
            .extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Returns a new set made of `self` with `overrides` merged on top
    pub fn merged(&self, overrides: &Properties) -> Properties {
        let mut merged = self.clone();
        merged.merge(overrides);
        merged
    }

    /// Parses properties file contents. Parsing is lenient: lines without a value map to an empty
    /// string and nothing is rejected.
    pub fn parse(contents: &str) -> Properties {
        let mut props = Properties::new();
        let mut lines = contents.lines();
        while let Some(line) = lines.next() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let mut logical = line.to_owned();
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }
            let (key, value) = split_entry(&logical);
            props.insert(unescape(key), unescape(value));
        }
        props
    }
}

impl Debug for Properties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.0.iter() {
            if is_sensitive(k) {
                map.entry(k, &SecureString::from(v.as_str()));
            } else {
                map.entry(k, v);
            }
        }
        map.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Properties {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_MARKERS.iter().any(|m| key.contains(m))
}

// A trailing backslash continues the line unless it is itself escaped
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

// The key ends at the first unescaped '=', ':' or whitespace. Whitespace around the separator is
// skipped.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = idx;
                break;
            }
            c if c.is_whitespace() => {
                key_end = idx;
                break;
            }
            _ => {}
        }
    }
    let key = &line[..key_end];
    let rest = line[key_end..].trim_start();
    let rest = match rest.strip_prefix(|c: char| c == '=' || c == ':') {
        Some(r) => r.trim_start(),
        None => rest,
    };
    (key, rest.trim_end())
}

// Handles the single character escapes and `\uXXXX`. Consecutive `\u` escapes are decoded together
// so surrogate pairs come out as one character
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut units: Vec<u16> = Vec::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some((unit, rest)) = chars.as_str().strip_prefix('u').and_then(split_utf16_unit) {
                units.push(unit);
                chars = rest.chars();
                continue;
            }
        }
        flush_utf16(&mut units, &mut out);
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    flush_utf16(&mut units, &mut out);
    out
}

fn split_utf16_unit(raw: &str) -> Option<(u16, &str)> {
    let hex = raw.get(..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let unit = u16::from_str_radix(hex, 16).ok()?;
    Some((unit, &raw[4..]))
}

fn flush_utf16(units: &mut Vec<u16>, out: &mut String) {
    out.extend(
        char::decode_utf16(units.drain(..)).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)),
    );
}

/// Anything that can resolve a named property set. Implementations must merge `overrides` on top
/// of the loaded set.
pub trait PropertiesLoader: Send + Sync {
    fn load(
        &self,
        source_id: &str,
        overrides: &Properties,
    ) -> impl Future<Output = Result<Properties>> + Send;
}

/// Loads `<source_id>.properties` files from a single directory
#[derive(Debug, Clone)]
pub struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file a source id resolves to. A source id that already names a `.properties` file is
    /// used as is
    pub fn path_for(&self, source_id: &str) -> PathBuf {
        let path = self.root.join(source_id);
        match path.extension() {
            Some(ext) if ext == PROPERTIES_EXTENSION => path,
            _ => self.root.join(format!("{source_id}.{PROPERTIES_EXTENSION}")),
        }
    }
}

impl PropertiesLoader for DirLoader {
    #[instrument(level = "debug", skip(self))]
    async fn load(&self, source_id: &str, overrides: &Properties) -> Result<Properties> {
        let path = self.path_for(source_id);
        trace!(path = %path.display(), "Reading property source");
        let contents = tokio::fs::read_to_string(&path).await.map_err(|err| {
            error!(%err, path = %path.display(), "Cannot read property source");
            AdminError::ConfigLoad {
                source_id: source_id.to_owned(),
                source: err,
            }
        })?;
        let mut props = Properties::parse(&contents);
        props.merge(overrides);
        debug!(count = props.len(), "Loaded properties");
        Ok(props)
    }
}
