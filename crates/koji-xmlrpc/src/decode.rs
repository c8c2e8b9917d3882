//! Wire deserialization for XML-RPC documents.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use roxmltree::{Document, Node};

use crate::error::DecodeError;
use crate::value::{Fault, MethodCall, MethodResponse, XmlRpcStruct, XmlRpcValue};

/// Message used when a fault carries no usable `faultString`.
const FAULT_MESSAGE_FALLBACK: &str = "XML-RPC fault";

/// Decode a `<methodResponse>` document into a value or a fault.
///
/// A response with no `<value>` at all decodes to `Null`. Only structural
/// problems (unparseable XML, wrong document root) are errors.
pub fn decode_method_response(xml: &str) -> Result<MethodResponse, DecodeError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "methodResponse" {
        return Err(DecodeError::NotAMethodResponse(
            root.tag_name().name().to_string(),
        ));
    }

    if let Some(fault) = child_element(root, "fault") {
        let payload = match child_element(fault, "value") {
            Some(value) => decode_value_node(value),
            None => XmlRpcValue::Null,
        };
        return Ok(MethodResponse::Fault(fault_from_value(&payload)));
    }

    let value_node = child_element(root, "params").and_then(|params| {
        child_element(params, "param")
            .and_then(|param| child_element(param, "value"))
            .or_else(|| child_element(params, "value"))
    });
    let value = match value_node {
        Some(node) => decode_value_node(node),
        None => XmlRpcValue::Null,
    };
    Ok(MethodResponse::Value(value))
}

/// Decode a `<methodCall>` document. The client never receives calls;
/// this is the mirror used by in-process hub doubles.
pub fn decode_method_call(xml: &str) -> Result<MethodCall, DecodeError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "methodCall" {
        return Err(DecodeError::NotAMethodCall(
            root.tag_name().name().to_string(),
        ));
    }

    let method = child_element(root, "methodName")
        .map(|node| text_content(node).trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(DecodeError::MissingMethodName)?;

    let params = match child_element(root, "params") {
        Some(params) => child_elements(params, "param")
            .map(|param| match child_element(param, "value") {
                Some(value) => decode_value_node(value),
                None => XmlRpcValue::Null,
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(MethodCall { method, params })
}

/// Decode one `<value>` node.
///
/// Never fails: unknown elements and unparseable scalar payloads fall back
/// to the node's raw text content, so one odd field cannot sink a whole
/// response.
fn decode_value_node(node: Node) -> XmlRpcValue {
    let typed = match first_element_child(node) {
        Some(typed) => typed,
        // An untyped <value> carries a bare string.
        None => return XmlRpcValue::Text(text_content(node)),
    };

    match typed.tag_name().name() {
        "nil" => XmlRpcValue::Null,
        "string" => XmlRpcValue::Text(text_content(typed)),
        "int" | "i4" => match text_content(typed).trim().parse::<i64>() {
            Ok(n) => XmlRpcValue::Integer(n),
            Err(_) => XmlRpcValue::Text(text_content(node)),
        },
        "double" => match text_content(typed).trim().parse::<f64>() {
            Ok(x) if x.is_finite() => XmlRpcValue::Real(x),
            _ => XmlRpcValue::Text(text_content(node)),
        },
        "boolean" => {
            let raw = text_content(typed);
            let flag = raw.trim();
            XmlRpcValue::Bool(flag == "1" || flag.eq_ignore_ascii_case("true"))
        }
        "dateTime.iso8601" => {
            let raw = text_content(typed);
            match parse_wire_datetime(raw.trim()) {
                Some(ts) => XmlRpcValue::Timestamp(ts),
                None => XmlRpcValue::Text(text_content(node)),
            }
        }
        "array" => {
            let items = child_element(typed, "data")
                .map(|data| child_elements(data, "value").map(decode_value_node).collect())
                .unwrap_or_default();
            XmlRpcValue::Sequence(items)
        }
        "struct" => {
            let mut fields = XmlRpcStruct::new();
            for member in child_elements(typed, "member") {
                let name = child_element(member, "name")
                    .map(text_content)
                    .unwrap_or_default();
                let value = match child_element(member, "value") {
                    Some(value) => decode_value_node(value),
                    None => XmlRpcValue::Null,
                };
                fields.insert(name, value);
            }
            XmlRpcValue::Struct(fields)
        }
        // Some emitters double-wrap: <value><value>...</value></value>.
        "value" => decode_value_node(typed),
        _ => XmlRpcValue::Text(text_content(node)),
    }
}

fn fault_from_value(value: &XmlRpcValue) -> Fault {
    let fields = value.as_struct();
    let code = fields
        .and_then(|f| f.get("faultCode"))
        .and_then(XmlRpcValue::as_i64);
    let message = fields
        .and_then(|f| f.get("faultString"))
        .and_then(XmlRpcValue::as_str)
        .unwrap_or(FAULT_MESSAGE_FALLBACK)
        .to_string();
    Fault { code, message }
}

fn parse_wire_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Classic XML-RPC form without separators or zone, taken as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn first_element_child<'a, 'input>(node: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.is_element())
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

fn text_content(node: Node) -> String {
    let mut out = String::new();
    for descendant in node.descendants() {
        if descendant.is_text() {
            out.push_str(descendant.text().unwrap_or(""));
        }
    }
    out
}
