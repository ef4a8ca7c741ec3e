//! Option validation helpers.
//!
//! Every operation accepts either a typed `*Options` struct or an untyped
//! [`OptionBag`]. The helpers here read and type-check individual bag
//! entries; each operation composes them in its `from_bag` constructor and
//! applies conditional requirements afterwards, once all siblings are
//! known.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::error::{InvalidParameterError, MissingParameterError};

/// Untyped caller options keyed by option name.
pub type OptionBag = serde_json::Map<String, Value>;

/// Wire format of the gateway's date-time fields.
pub const DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Fails on the first bag entry whose name is not in `defined`.
///
/// # Errors
///
/// Returns [`InvalidParameterError`] naming the undefined option.
pub fn reject_undefined(bag: &OptionBag, defined: &[&str]) -> Result<(), InvalidParameterError> {
    match bag.keys().find(|name| !defined.contains(&name.as_str())) {
        Some(name) => Err(InvalidParameterError::new(
            name.clone(),
            format!("one of the defined options {}", quoted_list(defined)),
            render(&bag[name]),
        )),
        None => Ok(()),
    }
}

/// Option values that can be supplied yet carry nothing.
///
/// The wire omits empty values, so a blank value counts as absent.
pub trait Presence {
    /// Returns `true` if the value would be omitted from the wire.
    fn is_blank(&self) -> bool {
        false
    }
}

impl Presence for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Presence for str {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Presence for PathBuf {
    fn is_blank(&self) -> bool {
        self.as_os_str().is_empty()
    }
}

impl Presence for u64 {}

impl<T: Presence + ?Sized> Presence for &T {
    fn is_blank(&self) -> bool {
        (**self).is_blank()
    }
}

/// Drops a blank value.
#[must_use]
pub fn present<T: Presence>(value: Option<T>) -> Option<T> {
    value.filter(|v| !v.is_blank())
}

/// Unwraps a required value.
///
/// # Errors
///
/// Returns [`MissingParameterError`] naming `name` if `value` is `None` or
/// blank.
pub fn required<T: Presence>(name: &str, value: Option<T>) -> Result<T, MissingParameterError> {
    present(value).ok_or_else(|| MissingParameterError::new(name))
}

/// Checks that `path` names an existing regular file.
///
/// # Errors
///
/// Returns [`InvalidParameterError`] if the file does not exist.
pub fn existing_file(name: &str, path: &Path) -> Result<(), InvalidParameterError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(InvalidParameterError::new(
            name,
            "the path of an existing file",
            render(&Value::from(path.display().to_string())),
        ))
    }
}

/// Parses a gateway date-time: 14-digit `YYYYMMDDhhmmss`,
/// `YYYY-MM-DD hh:mm:ss` or RFC 3339 (local wall time is kept).
///
/// # Errors
///
/// Returns [`InvalidParameterError`] if no format matches.
pub fn parse_datetime(name: &str, value: &str) -> Result<NaiveDateTime, InvalidParameterError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.naive_local()))
        .map_err(|_| {
            InvalidParameterError::new(
                name,
                "a date-time (YYYYMMDDhhmmss or RFC 3339)",
                render(&Value::from(value)),
            )
        })
}

pub(crate) fn not_allowed(name: &str, allowed: &[&str], actual: &str) -> InvalidParameterError {
    InvalidParameterError::new(
        name,
        format!("one of {}", quoted_list(allowed)),
        render(&Value::from(actual)),
    )
}

pub(crate) fn string(bag: &OptionBag, name: &str) -> Result<Option<String>, InvalidParameterError> {
    match bag.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(wrong_type(name, "string", other)),
    }
}

pub(crate) fn int(bag: &OptionBag, name: &str) -> Result<Option<u64>, InvalidParameterError> {
    match bag.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| wrong_type(name, "non-negative integer", value)),
        Some(other) => Err(wrong_type(name, "non-negative integer", other)),
    }
}

pub(crate) fn flag(bag: &OptionBag, name: &str) -> Result<Option<bool>, InvalidParameterError> {
    match bag.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(wrong_type(name, "bool", other)),
    }
}

pub(crate) fn choice<T>(bag: &OptionBag, name: &str) -> Result<Option<T>, InvalidParameterError>
where
    T: FromStr<Err = InvalidParameterError>,
{
    string(bag, name)?
        .map(|s| {
            s.parse().map_err(|mut err: InvalidParameterError| {
                name.clone_into(&mut err.name);
                err
            })
        })
        .transpose()
}

pub(crate) fn datetime(
    bag: &OptionBag,
    name: &str,
) -> Result<Option<NaiveDateTime>, InvalidParameterError> {
    string(bag, name)?
        .map(|s| parse_datetime(name, &s))
        .transpose()
}

pub(crate) fn path(bag: &OptionBag, name: &str) -> Result<Option<PathBuf>, InvalidParameterError> {
    Ok(string(bag, name)?.map(PathBuf::from))
}

fn wrong_type(name: &str, expected: &str, actual: &Value) -> InvalidParameterError {
    InvalidParameterError::new(name, expected, render(actual))
}

fn render(value: &Value) -> String {
    value.to_string()
}

fn quoted_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> OptionBag {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_reject_undefined() {
        let options = bag(json!({ "appid": "x", "foo": 1 }));
        let err = reject_undefined(&options, &["appid"]).unwrap_err();
        assert_eq!(err.name, "foo");
        assert_eq!(err.actual, "1");
        assert!(reject_undefined(&bag(json!({ "appid": "x" })), &["appid"]).is_ok());
    }

    #[test]
    fn test_typed_readers() {
        let options = bag(json!({
            "s": "text",
            "n": 100,
            "neg": -1,
            "f": true,
            "null": null,
        }));
        assert_eq!(string(&options, "s").unwrap().as_deref(), Some("text"));
        assert_eq!(string(&options, "null").unwrap(), None);
        assert_eq!(string(&options, "missing").unwrap(), None);
        assert_eq!(string(&options, "n").unwrap_err().expected, "string");
        assert_eq!(int(&options, "n").unwrap(), Some(100));
        assert!(int(&options, "neg").is_err());
        assert!(int(&options, "s").is_err());
        assert_eq!(flag(&options, "f").unwrap(), Some(true));
        assert!(flag(&options, "s").is_err());
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = NaiveDateTime::parse_from_str("20260102030405", DATETIME_FORMAT).unwrap();
        assert_eq!(parse_datetime("t", "20260102030405").unwrap(), expected);
        assert_eq!(parse_datetime("t", "2026-01-02 03:04:05").unwrap(), expected);
        assert_eq!(parse_datetime("t", "2026-01-02T03:04:05+08:00").unwrap(), expected);
        assert_eq!(parse_datetime("t", "tomorrow").unwrap_err().name, "t");
    }

    #[test]
    fn test_existing_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(existing_file("cert", file.path()).is_ok());
        let err = existing_file("cert", Path::new("/definitely/not/here.pem")).unwrap_err();
        assert_eq!(err.actual, "\"/definitely/not/here.pem\"");
    }

    #[test]
    fn test_required() {
        assert_eq!(required("a", Some(1_u64)).unwrap(), 1);
        assert_eq!(required::<u64>("a", None).unwrap_err().name, "a");
        assert_eq!(required("a", Some(String::new())).unwrap_err().name, "a");
        assert!(required("a", Some(PathBuf::new())).is_err());
        assert_eq!(required("a", Some("x".to_owned())).unwrap(), "x");
    }

    #[test]
    fn test_present() {
        assert_eq!(present(Some(String::new())), None);
        assert_eq!(present(Some("x")), Some("x"));
        let empty = String::new();
        assert!(present(Some(&empty)).is_none());
    }
}
