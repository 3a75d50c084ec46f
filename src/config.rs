//! Flat, string-keyed configuration blocks.
//!
//! A [`ConfigBlock`] is the parameter surface a process exposes and accepts.
//! Keys are hierarchical with `:` as the separator; the pipeline aggregates
//! every node's block under the node's name (`node_name:key`) and splits the
//! aggregate back apart when distributing configuration.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Separator between a subblock name and the keys inside it.
const SEPARATOR: char = ':';

/// An ordered map of configuration keys to string values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigBlock {
    values: BTreeMap<String, String>,
}

impl ConfigBlock {
    /// Create an empty config block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous value under the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get the raw string value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a value parsed into `T`.
    ///
    /// Returns [`Error::Config`] when the key is missing or the value does
    /// not parse.
    pub fn parse<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.get(key).ok_or_else(|| Error::Config {
            key: key.to_string(),
            message: "missing value".to_string(),
        })?;
        raw.parse().map_err(|e: T::Err| Error::Config {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Extract the subblock stored under `name`, with the prefix stripped.
    pub fn subblock(&self, name: &str) -> ConfigBlock {
        let prefix = format!("{name}{SEPARATOR}");
        let values = self
            .values
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(&prefix)
                    .map(|stripped| (stripped.to_string(), v.clone()))
            })
            .collect();
        ConfigBlock { values }
    }

    /// Merge `block` into this one under the prefix `name`.
    pub fn add_subblock(&mut self, block: &ConfigBlock, name: &str) {
        for (k, v) in &block.values {
            self.values.insert(format!("{name}{SEPARATOR}{k}"), v.clone());
        }
    }

    /// Merge another block's keys into this one, overwriting on collision.
    pub fn merge(&mut self, other: &ConfigBlock) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    /// Number of keys in the block.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the block holds no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigBlock {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ConfigBlock {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut block = ConfigBlock::new();
        block.set("threshold", "0.5").set("frames", "30");

        assert_eq!(block.get("threshold"), Some("0.5"));
        assert_eq!(block.get("missing"), None);
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn test_parse() {
        let mut block = ConfigBlock::new();
        block.set("frames", "30").set("bad", "not-a-number");

        assert_eq!(block.parse::<u32>("frames").unwrap(), 30);
        assert!(block.parse::<u32>("bad").is_err());
        assert!(block.parse::<u32>("missing").is_err());
    }

    #[test]
    fn test_subblock_roundtrip() {
        let mut inner = ConfigBlock::new();
        inner.set("rate", "25").set("mode", "fast");

        let mut all = ConfigBlock::new();
        all.add_subblock(&inner, "detector");
        all.set("other:rate", "99");

        let extracted = all.subblock("detector");
        assert_eq!(extracted, inner);
        assert_eq!(all.subblock("other").get("rate"), Some("99"));
        assert!(all.subblock("unknown").is_empty());
    }

    #[test]
    fn test_merge_overwrites() {
        let mut a: ConfigBlock = [("x", "1"), ("y", "2")].into_iter().collect();
        let b: ConfigBlock = [("y", "3")].into_iter().collect();
        a.merge(&b);

        assert_eq!(a.get("x"), Some("1"));
        assert_eq!(a.get("y"), Some("3"));
    }
}
