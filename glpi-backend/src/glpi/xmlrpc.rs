//! Minimal XML-RPC codec for the GLPI webservices plugin.
//!
//! Only what the plugin speaks: a single struct parameter per call, and a
//! `methodResponse` carrying either one value or a fault struct.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use std::collections::BTreeMap;

/// XML-RPC value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Double(f64),
    /// ISO-8601 text, kept verbatim
    DateTime(String),
    Base64(Vec<u8>),
    Struct(BTreeMap<String, Value>),
    Array(Vec<Value>),
    Nil,
}

/// Decoded `methodResponse`
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Value),
    Fault { code: i64, message: String },
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::DateTime(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(key),
            _ => None,
        }
    }

    /// Convert into JSON so typed shapes can be decoded with serde
    pub fn into_json(self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Int(i) => Json::from(i),
            Value::Bool(b) => Json::Bool(b),
            Value::Str(s) | Value::DateTime(s) => Json::String(s),
            Value::Double(d) => serde_json::Number::from_f64(d)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Base64(bytes) => Json::String(STANDARD.encode(bytes)),
            Value::Struct(members) => Json::Object(
                members
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
            Value::Array(items) => Json::Array(items.into_iter().map(Value::into_json).collect()),
            Value::Nil => Json::Null,
        }
    }

    /// Build a value from JSON, for canned responses
    #[cfg(test)]
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Nil,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Struct(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i as i64)
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(i) => out.push_str(&format!("<int>{}</int>", i)),
        Value::Bool(b) => out.push_str(if *b {
            "<boolean>1</boolean>"
        } else {
            "<boolean>0</boolean>"
        }),
        Value::Str(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Double(d) => out.push_str(&format!("<double>{}</double>", d)),
        Value::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Element tree node; text is the concatenation of direct text children.
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn parse_tree(xml: &str) -> Result<Element, String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = vec![Element::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                stack.push(Element {
                    name,
                    ..Default::default()
                });
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Element {
                        name,
                        ..Default::default()
                    });
                }
            }
            Ok(Event::End(_)) => {
                let done = stack
                    .pop()
                    .ok_or_else(|| "XML-RPC: unbalanced closing tag".to_string())?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => return Err("XML-RPC: unbalanced closing tag".to_string()),
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| format!("XML-RPC: bad text content: {}", e))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                let raw = e.into_inner();
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&raw));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML-RPC parse error: {}", e)),
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err("XML-RPC: unexpected end of document".to_string());
    }
    let root = stack.pop().unwrap_or_default();
    root.children
        .into_iter()
        .next()
        .ok_or_else(|| "XML-RPC: empty document".to_string())
}

fn decode_value(value: &Element) -> Result<Value, String> {
    let typed = match value.children.first() {
        Some(typed) => typed,
        // <value>text</value> without a type element is a string
        None => return Ok(Value::Str(value.text.clone())),
    };
    let text = typed.text.trim();

    match typed.name.as_str() {
        "int" | "i4" | "i8" => text
            .parse()
            .map(Value::Int)
            .map_err(|_| format!("XML-RPC: bad integer '{}'", text)),
        "boolean" => match text {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            other => Err(format!("XML-RPC: bad boolean '{}'", other)),
        },
        "string" => Ok(Value::Str(typed.text.clone())),
        "double" => text
            .parse()
            .map(Value::Double)
            .map_err(|_| format!("XML-RPC: bad double '{}'", text)),
        "dateTime.iso8601" => Ok(Value::DateTime(text.to_string())),
        "base64" => {
            let compact: String = text.split_whitespace().collect();
            STANDARD
                .decode(compact.as_bytes())
                .map(Value::Base64)
                .map_err(|e| format!("XML-RPC: bad base64: {}", e))
        }
        "nil" => Ok(Value::Nil),
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member
                    .child("name")
                    .map(|n| n.text.clone())
                    .ok_or_else(|| "XML-RPC: struct member without name".to_string())?;
                let inner = match member.child("value") {
                    Some(v) => decode_value(v)?,
                    None => Value::Nil,
                };
                members.insert(name, inner);
            }
            Ok(Value::Struct(members))
        }
        "array" => {
            let items = match typed.child("data") {
                Some(data) => data
                    .children
                    .iter()
                    .filter(|c| c.name == "value")
                    .map(decode_value)
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Ok(Value::Array(items))
        }
        other => Err(format!("XML-RPC: unsupported value type '{}'", other)),
    }
}

/// Decode a `methodResponse` document.
pub fn decode_response(xml: &str) -> Result<Response, String> {
    let root = parse_tree(xml)?;
    if root.name != "methodResponse" {
        return Err(format!("XML-RPC: expected methodResponse, got '{}'", root.name));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .ok_or_else(|| "XML-RPC: fault without value".to_string())?;
        let decoded = decode_value(value)?;
        let code = match decoded.get("faultCode") {
            Some(Value::Int(code)) => *code,
            Some(Value::Str(code)) => code.trim().parse().unwrap_or_default(),
            _ => 0,
        };
        let message = decoded
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(Response::Fault { code, message });
    }

    let value = root
        .child("params")
        .and_then(|p| p.child("param"))
        .and_then(|p| p.child("value"))
        .ok_or_else(|| "XML-RPC: response without params".to_string())?;
    decode_value(value).map(Response::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_call_with_struct_param() {
        let mut params = BTreeMap::new();
        params.insert("id2name".to_string(), Value::Bool(true));
        params.insert("ticket".to_string(), Value::str("42"));
        let xml = encode_call("glpi.getTicket", &[Value::Struct(params)]);
        assert!(xml.contains("<methodName>glpi.getTicket</methodName>"));
        assert!(xml.contains(
            "<member><name>id2name</name><value><boolean>1</boolean></value></member>"
        ));
        assert!(xml.contains(
            "<member><name>ticket</name><value><string>42</string></value></member>"
        ));
    }

    #[test]
    fn test_encode_escapes_markup() {
        let xml = encode_call("glpi.addTicketFollowup", &[Value::str("a < b & \"c\"")]);
        assert!(xml.contains("a &lt; b &amp;"));
        assert!(!xml.contains("a < b"));
    }

    #[test]
    fn test_decode_success_struct() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<methodResponse>
  <params>
    <param>
      <value>
        <struct>
          <member><name>session</name><value><string>abc123</string></value></member>
          <member><name>id</name><value><int>7</int></value></member>
          <member><name>name</name><value>glpi</value></member>
          <member><name>active</name><value><boolean>1</boolean></value></member>
        </struct>
      </value>
    </param>
  </params>
</methodResponse>"#;
        let response = decode_response(body).unwrap();
        let value = match response {
            Response::Success(v) => v,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            value.into_json(),
            json!({"session": "abc123", "id": 7, "name": "glpi", "active": true})
        );
    }

    #[test]
    fn test_decode_fault() {
        let body = r#"<?xml version="1.0"?>
<methodResponse><fault><value><struct>
  <member><name>faultCode</name><value><int>13</int></value></member>
  <member><name>faultString</name><value><string>Session is invalid</string></value></member>
</struct></value></fault></methodResponse>"#;
        assert_eq!(
            decode_response(body).unwrap(),
            Response::Fault {
                code: 13,
                message: "Session is invalid".to_string()
            }
        );
    }

    #[test]
    fn test_decode_nested_array_and_entities() {
        let body = "<methodResponse><params><param><value><array><data>\
            <value><struct><member><name>completename</name>\
            <value><string>Root &gt; Child</string></value></member></struct></value>\
            <value><nil/></value>\
            <value><double>1.5</double></value>\
            </data></array></value></param></params></methodResponse>";
        let value = match decode_response(body).unwrap() {
            Response::Success(v) => v,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            value.into_json(),
            json!([{"completename": "Root > Child"}, null, 1.5])
        );
    }

    #[test]
    fn test_decode_base64_value() {
        let body = "<methodResponse><params><param><value><base64>aGVs\nbG8=</base64>\
            </value></param></params></methodResponse>";
        assert_eq!(
            decode_response(body).unwrap(),
            Response::Success(Value::Base64(b"hello".to_vec()))
        );
    }

    #[test]
    fn test_string_whitespace_is_preserved() {
        let body = "<methodResponse><params><param><value><string>  two  spaces </string>\
            </value></param></params></methodResponse>";
        assert_eq!(
            decode_response(body).unwrap(),
            Response::Success(Value::str("  two  spaces "))
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_response("<html><body>502 Bad Gateway</body></html>").is_err());
        assert!(decode_response("not xml at all").is_err());
        assert!(decode_response("<methodResponse><params>").is_err());
    }

    #[test]
    fn test_from_json_builds_params() {
        let value = Value::from_json(&json!({"ticket": 5, "status": "notold", "assign": true}));
        assert_eq!(value.get("ticket"), Some(&Value::Int(5)));
        assert_eq!(value.get("status"), Some(&Value::str("notold")));
        assert_eq!(value.get("assign"), Some(&Value::Bool(true)));
    }
}
