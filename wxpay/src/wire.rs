//! Flat XML wire codec.
//!
//! Documents are a single `<xml>` root with one child element per field:
//!
//! ```text
//! <xml><appid>wx123</appid><mch_id>1000</mch_id></xml>
//! ```
//!
//! Child content may be text or CDATA. Nested elements are rejected.

use std::io::Cursor;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::field::FieldMap;

/// Name of the document root element.
pub const ROOT: &str = "xml";

/// Wire encode/decode failures.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WireError {
    /// The underlying XML reader or writer failed.
    #[error("XML error: {0}")]
    Xml(String),
    /// Element name or content is not valid UTF-8.
    #[error("invalid UTF-8 in XML document")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The document ended before the root element was closed, or had none.
    #[error("unexpected end of XML document")]
    UnexpectedEof,
    /// A field element contains child elements.
    #[error("nested element <{0}> is not allowed")]
    Nested(String),
    /// Non-whitespace text outside any field element.
    #[error("unexpected text outside field elements")]
    StrayText,
    /// Content after the root element was closed.
    #[error("unexpected content after root element")]
    TrailingContent,
    /// The root element is not `<xml>`.
    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),
}

/// Encodes `fields` as a flat `<xml>` document.
///
/// # Errors
///
/// Returns [`WireError::Xml`] if the writer fails.
pub fn encode(fields: &FieldMap) -> Result<Vec<u8>, WireError> {
    write_document(fields, false)
}

/// Encodes `fields` with a leading `<?xml version="1.0" encoding="UTF-8"?>`
/// declaration.
///
/// # Errors
///
/// Returns [`WireError::Xml`] if the writer fails.
pub fn encode_document(fields: &FieldMap) -> Result<Vec<u8>, WireError> {
    write_document(fields, true)
}

fn write_document(fields: &FieldMap, declaration: bool) -> Result<Vec<u8>, WireError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    if declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
    }
    writer
        .write_event(Event::Start(BytesStart::new(ROOT)))
        .map_err(xml_error)?;
    for (name, value) in fields.iter() {
        writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(ROOT)))
        .map_err(xml_error)?;
    Ok(writer.into_inner().into_inner())
}

/// Decodes a flat XML document into a [`FieldMap`].
///
/// Whitespace between elements, the XML declaration, comments and
/// processing instructions are ignored. Empty elements decode to empty
/// values and are therefore absent from the returned map.
///
/// # Errors
///
/// Returns a [`WireError`] if the document is not well-formed, has no
/// `<xml>` root element, or nests elements below a field.
pub fn decode(bytes: &[u8]) -> Result<FieldMap, WireError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut fields = FieldMap::new();

    let mut depth = 0_usize;
    let mut closed = false;
    let mut current: Option<(String, String)> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_error)?;
        match event {
            Event::Start(start) => {
                if closed {
                    return Err(WireError::TrailingContent);
                }
                match depth {
                    0 => expect_root(&start)?,
                    1 => current = Some((element_name(&start)?, String::new())),
                    _ => return Err(WireError::Nested(element_name(&start)?)),
                }
                depth += 1;
            }
            Event::Empty(start) => match depth {
                0 => {
                    if closed {
                        return Err(WireError::TrailingContent);
                    }
                    expect_root(&start)?;
                    closed = true;
                }
                1 => {
                    element_name(&start)?;
                }
                _ => return Err(WireError::Nested(element_name(&start)?)),
            },
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                match depth {
                    0 => closed = true,
                    1 => {
                        if let Some((name, value)) = current.take() {
                            fields.insert(name, value);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_error)?;
                match (&mut current, depth) {
                    (Some((_, value)), 2) => value.push_str(&text),
                    _ if text.trim().is_empty() => {}
                    _ => return Err(WireError::StrayText),
                }
            }
            Event::CData(data) => match (&mut current, depth) {
                (Some((_, value)), 2) => {
                    value.push_str(&String::from_utf8(data.into_inner().into_owned())?);
                }
                _ => return Err(WireError::StrayText),
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if closed {
        Ok(fields)
    } else {
        Err(WireError::UnexpectedEof)
    }
}

fn element_name(start: &BytesStart<'_>) -> Result<String, WireError> {
    Ok(String::from_utf8(start.name().as_ref().to_vec())?)
}

fn expect_root(start: &BytesStart<'_>) -> Result<(), WireError> {
    let name = element_name(start)?;
    if name == ROOT {
        Ok(())
    } else {
        Err(WireError::UnexpectedRoot(name))
    }
}

fn xml_error(err: impl ToString) -> WireError {
    WireError::Xml(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_flat_document() {
        let fields = FieldMap::from([("mch_id", "1000"), ("appid", "wx123")]);
        let bytes = encode(&fields).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "<xml><appid>wx123</appid><mch_id>1000</mch_id></xml>"
        );
    }

    #[test]
    fn test_encode_escapes_markup() {
        let fields = FieldMap::from([("body", "a<b & c>")]);
        let bytes = encode(&fields).unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "<xml><body>a&lt;b &amp; c&gt;</body></xml>"
        );
        assert_eq!(decode(&bytes).unwrap().get("body"), Some("a<b & c>"));
    }

    #[test]
    fn test_encode_document_has_declaration() {
        let fields = FieldMap::from([("return_code", "SUCCESS")]);
        let text = String::from_utf8(encode_document(&fields).unwrap()).unwrap();
        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><xml><return_code>SUCCESS</return_code></xml>"
        );
    }

    #[test]
    fn test_decode_text_and_cdata() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<xml>
  <return_code><![CDATA[SUCCESS]]></return_code>
  <return_msg><![CDATA[OK]]></return_msg>
  <total_fee>100</total_fee>
  <attach></attach>
  <detail/>
</xml>"#;
        let fields = decode(body).unwrap();
        assert_eq!(fields.get("return_code"), Some("SUCCESS"));
        assert_eq!(fields.get("return_msg"), Some("OK"));
        assert_eq!(fields.get("total_fee"), Some("100"));
        assert!(!fields.contains("attach"));
        assert!(!fields.contains("detail"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_decode_empty_root() {
        assert!(decode(b"<xml></xml>").unwrap().is_empty());
        assert!(decode(b"<xml/>").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_nesting() {
        let err = decode(b"<xml><a><b>1</b></a></xml>").unwrap_err();
        assert!(matches!(err, WireError::Nested(name) if name == "b"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"").is_err());
        assert!(decode(b"not xml at all").is_err());
        assert!(decode(b"<xml><a>1</a>").is_err());
        assert!(decode(b"<xml><a>1</b></xml>").is_err());
        assert!(decode(b"<xml></xml><xml></xml>").is_err());
    }

    #[test]
    fn test_decode_rejects_foreign_root() {
        let err = decode(b"<html><title>502 Bad Gateway</title></html>").unwrap_err();
        assert!(matches!(err, WireError::UnexpectedRoot(name) if name == "html"));
        let err = decode(b"<root/>").unwrap_err();
        assert!(matches!(err, WireError::UnexpectedRoot(name) if name == "root"));
    }
}
