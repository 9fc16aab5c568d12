//! Text encoding of attribute values inside record lines.
//!
//! Scalars are written in their display form: decimal integers and enum
//! values, `true`/`false`, colon-separated MACs, `addr/len` prefixes,
//! `min-max` ranges, and `0x`-prefixed 16-digit handles. Lists are written
//! `[a,b,c]`. Characters that delimit the line (`|`, `=`, `,`, `[`, `]`,
//! `%`, CR, LF) are percent-escaped inside strings. An empty string inside a
//! list is written `%-` so that `[]` stays unambiguous.
//!
//! Decoding needs the attribute's declared kind, so it goes through the
//! model.

use std::fmt::Write as _;
use std::net::IpAddr;
use std::str::FromStr;

use sws_schema::{AttributeMetadata, ModelInfo};
use sws_types::{
    AttrId, AttrList, Attribute, AttributeValue, IpPrefix, MacAddr, ObjectId, ObjectType,
    SwitchError, SwitchResult, ValueKind, ValueRange,
};

const EMPTY_ELEMENT: &str = "%-";

fn needs_escape(c: char) -> bool {
    matches!(c, '|' | '=' | ',' | '%' | '[' | ']' | '\n' | '\r')
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if needs_escape(c) {
            let _ = write!(out, "%{:02X}", c as u32);
        } else {
            out.push(c);
        }
    }
    out
}

pub fn unescape(s: &str) -> SwitchResult<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s
                .get(i + 1..i + 3)
                .ok_or_else(|| SwitchError::invalid(format!("truncated escape in {s:?}")))?;
            let b = u8::from_str_radix(hex, 16)
                .map_err(|_| SwitchError::invalid(format!("bad escape %{hex} in {s:?}")))?;
            out.push(b);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| SwitchError::invalid(e.to_string()))
}

/// Text form of a value.
pub fn format_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::List(list) => {
            let items: Vec<String> = list
                .items()
                .iter()
                .map(|item| match item {
                    AttributeValue::String(s) if s.is_empty() => EMPTY_ELEMENT.to_string(),
                    other => format_scalar(other),
                })
                .collect();
            format!("[{}]", items.join(","))
        }
        scalar => format_scalar(scalar),
    }
}

fn format_scalar(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Bool(v) => v.to_string(),
        AttributeValue::U8(v) => v.to_string(),
        AttributeValue::U16(v) => v.to_string(),
        AttributeValue::U32(v) => v.to_string(),
        AttributeValue::U64(v) | AttributeValue::Enum(v) => v.to_string(),
        AttributeValue::I8(v) => v.to_string(),
        AttributeValue::I16(v) => v.to_string(),
        AttributeValue::I32(v) => v.to_string(),
        AttributeValue::I64(v) => v.to_string(),
        AttributeValue::String(s) => escape(s),
        AttributeValue::Mac(m) => m.to_string(),
        AttributeValue::Ip(ip) => ip.to_string(),
        AttributeValue::Prefix(p) => p.to_string(),
        AttributeValue::Range(r) => r.to_string(),
        AttributeValue::ObjectId(id) => id.to_string(),
        // Nested lists cannot be built; fall back to the list form.
        AttributeValue::List(_) => format_value(value),
    }
}

/// Parse the text form of a value of the attribute's declared kind.
pub fn parse_value(meta: &AttributeMetadata, text: &str) -> SwitchResult<AttributeValue> {
    if meta.kind != ValueKind::List {
        return parse_scalar(meta.kind, text);
    }
    let elem = meta
        .list_kind
        .ok_or_else(|| SwitchError::invalid(format!("list attribute {} has no element kind", meta.name)))?;
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| SwitchError::invalid(format!("expected [..] for {}, got {text:?}", meta.name)))?;
    let items = if inner.is_empty() {
        Vec::new()
    } else {
        inner
            .split(',')
            .map(|tok| {
                if tok == EMPTY_ELEMENT && elem == ValueKind::String {
                    Ok(AttributeValue::String(String::new()))
                } else {
                    parse_scalar(elem, tok)
                }
            })
            .collect::<SwitchResult<Vec<_>>>()?
    };
    AttrList::new(elem, items).map(AttributeValue::List)
}

fn num<T: FromStr>(kind: ValueKind, text: &str) -> SwitchResult<T> {
    text.parse()
        .map_err(|_| SwitchError::invalid(format!("{text:?} is not a valid {kind}")))
}

/// Parse one scalar of `kind`.
pub fn parse_scalar(kind: ValueKind, text: &str) -> SwitchResult<AttributeValue> {
    Ok(match kind {
        ValueKind::Bool => match text {
            "true" | "1" => AttributeValue::Bool(true),
            "false" | "0" => AttributeValue::Bool(false),
            _ => return Err(SwitchError::invalid(format!("{text:?} is not a bool"))),
        },
        ValueKind::U8 => AttributeValue::U8(num(kind, text)?),
        ValueKind::U16 => AttributeValue::U16(num(kind, text)?),
        ValueKind::U32 => AttributeValue::U32(num(kind, text)?),
        ValueKind::U64 => AttributeValue::U64(num(kind, text)?),
        ValueKind::I8 => AttributeValue::I8(num(kind, text)?),
        ValueKind::I16 => AttributeValue::I16(num(kind, text)?),
        ValueKind::I32 => AttributeValue::I32(num(kind, text)?),
        ValueKind::I64 => AttributeValue::I64(num(kind, text)?),
        ValueKind::Enum => AttributeValue::Enum(num(kind, text)?),
        ValueKind::String => AttributeValue::String(unescape(text)?),
        ValueKind::Mac => AttributeValue::Mac(MacAddr::from_str(text)?),
        ValueKind::Ip => AttributeValue::Ip(num::<IpAddr>(kind, text)?),
        ValueKind::Prefix => AttributeValue::Prefix(IpPrefix::from_str(text)?),
        ValueKind::Range => AttributeValue::Range(ValueRange::from_str(text)?),
        ValueKind::ObjectId => AttributeValue::ObjectId(ObjectId::parse(text)?),
        ValueKind::List => return Err(SwitchError::invalid("lists of lists are not supported")),
    })
}

/// Record fields for a set of attributes, keyed by decimal attribute id.
pub fn encode_attrs(attrs: &[Attribute]) -> Vec<(String, String)> {
    attrs
        .iter()
        .map(|a| (a.id.to_string(), format_value(&a.value)))
        .collect()
}

/// Decode record fields of an object of type `ot`.
///
/// Keys may be attribute ids or attribute names.
pub fn decode_attrs(
    model: &ModelInfo,
    ot: ObjectType,
    fields: &[(String, String)],
) -> SwitchResult<Vec<Attribute>> {
    fields
        .iter()
        .map(|(key, text)| {
            let meta = match key.parse::<AttrId>() {
                Ok(id) => model.attr_of(ot, id)?,
                Err(_) => model.attr_by_name(ot, key)?,
            };
            Ok(Attribute {
                id: meta.id,
                value: parse_value(meta, text)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MODEL: &str = r#"{
        "objects": [
            {
                "name": "port", "id": 1,
                "attributes": [
                    { "id": 10, "name": "lanes", "type": "list", "list_type": "u32" },
                    { "id": 11, "name": "label", "type": "string" },
                    { "id": 12, "name": "names", "type": "list", "list_type": "string" },
                    { "id": 13, "name": "peer", "type": "object_id" },
                    { "id": 14, "name": "mac", "type": "mac" }
                ]
            }
        ]
    }"#;

    fn model() -> ModelInfo {
        ModelInfo::from_json_str(MODEL).unwrap()
    }

    // ---------------------------------------------------------------
    // Escaping
    // ---------------------------------------------------------------

    #[test]
    fn delimiters_are_escaped() {
        assert_eq!(escape("a|b=c,d%e[f]\n"), "a%7Cb%3Dc%2Cd%25e%5Bf%5D%0A");
        assert_eq!(unescape("a%7Cb%3Dc").unwrap(), "a|b=c");
        assert!(unescape("bad%4").is_err());
        assert!(unescape("bad%zz").is_err());
    }

    proptest! {
        #[test]
        fn escape_roundtrips_and_hides_delimiters(s in ".*") {
            let escaped = escape(&s);
            prop_assert!(!escaped.contains(['|', '=', ',', '[', ']', '\n']));
            prop_assert_eq!(unescape(&escaped).unwrap(), s);
        }
    }

    // ---------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------

    #[test]
    fn lists_use_bracket_form() {
        let m = model();
        let meta = m.attr(10).unwrap();
        let value = AttributeValue::List(
            AttrList::new(ValueKind::U32, vec![1u32.into(), 2u32.into(), 3u32.into()]).unwrap(),
        );
        assert_eq!(format_value(&value), "[1,2,3]");
        assert_eq!(parse_value(meta, "[1,2,3]").unwrap(), value);
        assert_eq!(
            parse_value(meta, "[]").unwrap(),
            AttributeValue::List(AttrList::empty(ValueKind::U32).unwrap())
        );
        assert!(parse_value(meta, "1,2").is_err());
    }

    #[test]
    fn empty_string_element_is_distinct_from_empty_list() {
        let m = model();
        let meta = m.attr(12).unwrap();
        let value = AttributeValue::List(
            AttrList::new(ValueKind::String, vec!["".into()]).unwrap(),
        );
        let text = format_value(&value);
        assert_eq!(text, "[%-]");
        assert_eq!(parse_value(meta, &text).unwrap(), value);
    }

    #[test]
    fn handles_are_hex() {
        let m = model();
        let id = ObjectId::new(ObjectType(1), 2).unwrap();
        let text = format_value(&AttributeValue::ObjectId(id));
        assert_eq!(text, "0x0001000000000002");
        assert_eq!(
            parse_value(m.attr(13).unwrap(), &text).unwrap(),
            AttributeValue::ObjectId(id)
        );
    }

    #[test]
    fn decode_accepts_ids_and_names() {
        let m = model();
        let fields = vec![
            ("11".to_string(), "eth%7C0".to_string()),
            ("mac".to_string(), "00:11:22:33:44:55".to_string()),
        ];
        let attrs = decode_attrs(&m, ObjectType(1), &fields).unwrap();
        assert_eq!(attrs[0], Attribute::new(11, "eth|0"));
        assert_eq!(attrs[1].id, 14);

        let bad = vec![("99".to_string(), "1".to_string())];
        assert!(decode_attrs(&m, ObjectType(1), &bad).is_err());
    }

    #[test]
    fn encode_then_decode_preserves_attributes() {
        let m = model();
        let attrs = vec![
            Attribute::new(11, "x,y"),
            Attribute::new(13, ObjectId::NULL),
        ];
        let fields = encode_attrs(&attrs);
        assert_eq!(decode_attrs(&m, ObjectType(1), &fields).unwrap(), attrs);
    }
}
