//! Ordered wire field maps.
//!
//! [`FieldMap`] is the flat `name -> value` document exchanged with the
//! gateway. Keys are kept in ascending byte order, which is exactly the
//! order the canonical signing string needs. Absent and empty values are
//! never stored: the gateway contract is omission, not empty inclusion.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the signature field in every signed document.
pub const SIGN_FIELD: &str = "sign";

/// An ordered map from wire field name to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct FieldMap(BTreeMap<String, String>);

impl FieldMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a value, skipping it if empty.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.is_empty() {
            self.0.insert(name.into(), value);
        }
        self
    }

    /// Inserts an optional value, skipping `None` and empty strings.
    pub fn insert_opt<V: fmt::Display>(
        &mut self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.insert(name, value.to_string());
        }
        self
    }

    /// Returns the value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns `true` if `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Removes and returns the value stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    /// Splits off the `sign` field, returning it (empty if absent).
    pub fn take_signature(&mut self) -> String {
        self.remove(SIGN_FIELD).unwrap_or_default()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates fields in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Consumes the map, returning the underlying ordered map.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for FieldMap {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for FieldMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<FieldMap> for BTreeMap<String, String> {
    fn from(map: FieldMap) -> Self {
        map.0
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_sorted_bytewise() {
        let map = FieldMap::from([("nonce_str", "n"), ("appid", "a"), ("Zeta", "z"), ("mch_id", "m")]);
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Zeta", "appid", "mch_id", "nonce_str"]);
    }

    #[test]
    fn test_empty_and_absent_values_are_omitted() {
        let mut map = FieldMap::new();
        map.insert("body", "");
        map.insert_opt::<String>("detail", None);
        map.insert_opt("total_fee", Some(0_u64));
        assert!(!map.contains("body"));
        assert!(!map.contains("detail"));
        assert_eq!(map.get("total_fee"), Some("0"));
    }

    #[test]
    fn test_deserialize_drops_empty_values() {
        let map: FieldMap = serde_json::from_str(r#"{"appid":"wx1","attach":"","mch_id":"1000"}"#).unwrap();
        assert_eq!(map, FieldMap::from([("appid", "wx1"), ("mch_id", "1000")]));
        assert_eq!(
            serde_json::to_string(&map).unwrap(),
            r#"{"appid":"wx1","mch_id":"1000"}"#
        );

        let raw = BTreeMap::from([("body".to_owned(), String::new())]);
        assert!(FieldMap::from(raw).is_empty());
    }

    #[test]
    fn test_take_signature() {
        let mut map = FieldMap::from([("foo", "bar"), ("sign", "ABC")]);
        assert_eq!(map.take_signature(), "ABC");
        assert!(!map.contains("sign"));
        assert_eq!(map.take_signature(), "");
    }
}
