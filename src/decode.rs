use crate::error::DecodeError;
use crate::from_xml::from_xml;
use crate::tree::Value;
use serde::Deserialize;

const LOG_TARGET: &str = "decode";

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Wire format of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Json,
    Xml,
}

/// Decode a raw body into a tree.
///
/// Returns `Ok(None)` for a body that is empty once the BOM is removed.
/// XML elements nested deeper than `max_depth` are an error; JSON nesting is
/// bounded by `serde_json`'s own recursion limit.
pub fn decode(body: &[u8], format: InputFormat, max_depth: usize) -> Result<Option<Value>, DecodeError> {
    let body = body.strip_prefix(UTF8_BOM).unwrap_or(body);
    if body.is_empty() {
        log::debug!(target: LOG_TARGET, "Empty body, nothing to decode");
        return Ok(None);
    }
    log::debug!(target: LOG_TARGET, "Decoding {} byte(s) as {:?}", body.len(), format);
    let value = match format {
        InputFormat::Json => Value::from(serde_json::from_slice::<serde_json::Value>(body)?),
        InputFormat::Xml => from_xml(std::str::from_utf8(body)?, max_depth)?,
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::DEFAULT_MAX_DEPTH;

    #[test]
    fn bom_is_stripped() {
        let body = b"\xEF\xBB\xBF[{\"value\":17}]";
        let v = decode(body, InputFormat::Json, DEFAULT_MAX_DEPTH).unwrap().unwrap();
        let items = v.as_sequence().unwrap();
        assert_eq!(items[0].get("value"), Some(&Value::Number(17.0)));
    }

    #[test]
    fn empty_bodies_are_a_no_op() {
        let bodies: [&[u8]; 2] = [b"", UTF8_BOM];
        for body in bodies {
            assert_eq!(decode(body, InputFormat::Json, DEFAULT_MAX_DEPTH).unwrap(), None);
            assert_eq!(decode(body, InputFormat::Xml, DEFAULT_MAX_DEPTH).unwrap(), None);
        }
    }

    #[test]
    fn whitespace_bodies_are_malformed() {
        assert!(matches!(
            decode(b"  \n", InputFormat::Json, DEFAULT_MAX_DEPTH),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode(b"\xEF\xBB\xBF \t", InputFormat::Xml, DEFAULT_MAX_DEPTH),
            Err(DecodeError::Xml { .. })
        ));
    }

    #[test]
    fn malformed_bodies_fail() {
        assert!(matches!(
            decode(b"{\"a\": ", InputFormat::Json, DEFAULT_MAX_DEPTH),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode(b"<a>", InputFormat::Xml, DEFAULT_MAX_DEPTH),
            Err(DecodeError::Xml { .. })
        ));
        assert!(matches!(
            decode(b"<a>\xFF</a>", InputFormat::Xml, DEFAULT_MAX_DEPTH),
            Err(DecodeError::Utf8(_))
        ));
    }

    #[test]
    fn deep_documents_are_errors() {
        let levels = 200_000;
        let xml = format!("{}1{}", "<a>".repeat(levels), "</a>".repeat(levels));
        assert!(matches!(
            decode(xml.as_bytes(), InputFormat::Xml, DEFAULT_MAX_DEPTH),
            Err(DecodeError::Xml { .. })
        ));
        let json = format!("{}1{}", "[".repeat(levels), "]".repeat(levels));
        assert!(matches!(
            decode(json.as_bytes(), InputFormat::Json, DEFAULT_MAX_DEPTH),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn xml_body() {
        let v = decode(
            b"<?xml version=\"1.0\"?><r><v>1</v></r>",
            InputFormat::Xml,
            DEFAULT_MAX_DEPTH,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            v.get("r").and_then(|r| r.get("v")),
            Some(&Value::String("1".to_string()))
        );
    }

    #[test]
    fn format_names() {
        #[derive(Deserialize)]
        struct Wrap {
            format: InputFormat,
        }
        let w: Wrap = toml::from_str("format = \"xml\"").unwrap();
        assert_eq!(w.format, InputFormat::Xml);
    }
}
