//! Wire serialization for XML-RPC documents.

use chrono::SecondsFormat;

use crate::error::EncodeError;
use crate::value::{Fault, MethodResponse, XmlRpcStruct, XmlRpcValue};

/// Escape the five XML special characters for text content.
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Serialize one value to its wire element.
///
/// Whole finite reals collapse to `<int>`; the numeric kind is not
/// preserved across the wire, the numeric value is.
pub fn encode_value(value: &XmlRpcValue) -> Result<String, EncodeError> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

/// Serialize a complete `<methodCall>` document, one `<param>` per
/// argument, in order.
pub fn encode_method_call(method: &str, params: &[XmlRpcValue]) -> Result<String, EncodeError> {
    let mut params_xml = String::new();
    for param in params {
        params_xml.push_str("<param><value>");
        write_value(&mut params_xml, param)?;
        params_xml.push_str("</value></param>");
    }
    Ok(format!(
        "<?xml version=\"1.0\"?>\n<methodCall>\n  <methodName>{}</methodName>\n  <params>{}</params>\n</methodCall>",
        escape_xml(method),
        params_xml
    ))
}

/// Serialize a complete `<methodResponse>` document. Used by in-process
/// hub doubles; real hubs produce these, this client only consumes them.
pub fn encode_method_response(response: &MethodResponse) -> Result<String, EncodeError> {
    let body = match response {
        MethodResponse::Value(value) => {
            let mut xml = String::from("<params><param><value>");
            write_value(&mut xml, value)?;
            xml.push_str("</value></param></params>");
            xml
        }
        MethodResponse::Fault(fault) => {
            let mut xml = String::from("<fault><value>");
            write_value(&mut xml, &fault_value(fault))?;
            xml.push_str("</value></fault>");
            xml
        }
    };
    Ok(format!(
        "<?xml version=\"1.0\"?>\n<methodResponse>\n  {}\n</methodResponse>",
        body
    ))
}

fn fault_value(fault: &Fault) -> XmlRpcValue {
    let mut fields = XmlRpcStruct::new();
    if let Some(code) = fault.code {
        fields.insert("faultCode", code);
    }
    fields.insert("faultString", fault.message.as_str());
    XmlRpcValue::Struct(fields)
}

fn write_value(out: &mut String, value: &XmlRpcValue) -> Result<(), EncodeError> {
    match value {
        XmlRpcValue::Null => out.push_str("<nil/>"),
        XmlRpcValue::Text(text) => {
            out.push_str("<string>");
            out.push_str(&escape_xml(text));
            out.push_str("</string>");
        }
        XmlRpcValue::Integer(n) => {
            out.push_str("<int>");
            out.push_str(&n.to_string());
            out.push_str("</int>");
        }
        XmlRpcValue::Real(x) => write_real(out, *x)?,
        XmlRpcValue::Bool(flag) => {
            out.push_str(if *flag {
                "<boolean>1</boolean>"
            } else {
                "<boolean>0</boolean>"
            });
        }
        XmlRpcValue::Timestamp(ts) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true));
            out.push_str("</dateTime.iso8601>");
        }
        XmlRpcValue::Sequence(items) => {
            out.push_str("<array><data>");
            for item in items {
                out.push_str("<value>");
                write_value(out, item)?;
                out.push_str("</value>");
            }
            out.push_str("</data></array>");
        }
        XmlRpcValue::Struct(fields) => {
            out.push_str("<struct>");
            for (name, member) in fields.iter() {
                out.push_str("<member><name>");
                out.push_str(&escape_xml(name));
                out.push_str("</name><value>");
                write_value(out, member)?;
                out.push_str("</value></member>");
            }
            out.push_str("</struct>");
        }
    }
    Ok(())
}

fn write_real(out: &mut String, x: f64) -> Result<(), EncodeError> {
    if !x.is_finite() {
        return Err(EncodeError::NonFiniteNumber(x));
    }
    // Whole in-range reals collapse to <int>; the cast is lossless there.
    if x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        out.push_str("<int>");
        out.push_str(&(x as i64).to_string());
        out.push_str("</int>");
    } else {
        out.push_str("<double>");
        out.push_str(&x.to_string());
        out.push_str("</double>");
    }
    Ok(())
}
