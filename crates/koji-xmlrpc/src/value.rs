//! XML-RPC value and message types.

use std::fmt;

use chrono::{DateTime, Utc};

/// A decoded XML-RPC value.
///
/// Covers the full wire grammar: `nil`, `string`, `int`/`i4`, `double`,
/// `boolean`, `dateTime.iso8601`, `array`, and `struct`. The numeric kind
/// is not stable across a round trip: a `Real` with a zero fractional part
/// encodes as an integer.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlRpcValue {
    /// `<nil/>`, or an absent response value.
    Null,
    /// `<string>`, and the fallback for untyped or unrecognized values.
    Text(String),
    /// `<int>` / `<i4>`.
    Integer(i64),
    /// `<double>`.
    Real(f64),
    /// `<boolean>`, `0` or `1` on the wire.
    Bool(bool),
    /// `<dateTime.iso8601>`.
    Timestamp(DateTime<Utc>),
    /// `<array>`.
    Sequence(Vec<XmlRpcValue>),
    /// `<struct>`, member order preserved.
    Struct(XmlRpcStruct),
}

impl XmlRpcValue {
    /// Text content, if this is a `Text` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an `Integer` value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric content widened to `f64`, for `Real` and `Integer` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(x) => Some(*x),
            Self::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Boolean content, if this is a `Bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Timestamp content, if this is a `Timestamp` value.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Element slice, if this is a `Sequence` value.
    pub fn as_sequence(&self) -> Option<&[XmlRpcValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Member table, if this is a `Struct` value.
    pub fn as_struct(&self) -> Option<&XmlRpcStruct> {
        match self {
            Self::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for XmlRpcValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for XmlRpcValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i32> for XmlRpcValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<i64> for XmlRpcValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for XmlRpcValue {
    fn from(x: f64) -> Self {
        Self::Real(x)
    }
}

impl From<bool> for XmlRpcValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for XmlRpcValue {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Vec<XmlRpcValue>> for XmlRpcValue {
    fn from(items: Vec<XmlRpcValue>) -> Self {
        Self::Sequence(items)
    }
}

impl From<XmlRpcStruct> for XmlRpcValue {
    fn from(fields: XmlRpcStruct) -> Self {
        Self::Struct(fields)
    }
}

/// An ordered member table for `<struct>` values.
///
/// Member names are unique; inserting an existing name replaces the value
/// while keeping the member's original position. Membership lookups are
/// linear, which is fine at the handful-of-members scale the hub uses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlRpcStruct {
    members: Vec<(String, XmlRpcValue)>,
}

impl XmlRpcStruct {
    /// Create an empty struct.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member, replacing the value in place if the name exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<XmlRpcValue>) {
        let name = name.into();
        let value = value.into();
        match self.members.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.members.push((name, value)),
        }
    }

    /// Look up a member by name.
    pub fn get(&self, name: &str) -> Option<&XmlRpcValue> {
        self.members.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when there are no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &XmlRpcValue)> {
        self.members.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl FromIterator<(String, XmlRpcValue)> for XmlRpcStruct {
    fn from_iter<I: IntoIterator<Item = (String, XmlRpcValue)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

/// A decoded `<methodCall>` document.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// Remote method name.
    pub method: String,
    /// Positional parameters, in document order.
    pub params: Vec<XmlRpcValue>,
}

/// A decoded `<methodResponse>` document: exactly one of a result value or
/// a fault.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// Successful response payload.
    Value(XmlRpcValue),
    /// Remote application-level failure.
    Fault(Fault),
}

impl MethodResponse {
    /// The result value, if this is not a fault.
    pub fn value(&self) -> Option<&XmlRpcValue> {
        match self {
            Self::Value(v) => Some(v),
            Self::Fault(_) => None,
        }
    }

    /// The fault, if there is one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Value(_) => None,
            Self::Fault(f) => Some(f),
        }
    }

    /// Split into `Ok(value)` or `Err(fault)`.
    pub fn into_result(self) -> Result<XmlRpcValue, Fault> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Fault(f) => Err(f),
        }
    }
}

/// A remote XML-RPC fault.
///
/// The code is optional: some hubs omit `faultCode` or send a non-integer
/// value there.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    /// `faultCode` member, when present and integral.
    pub code: Option<i64>,
    /// `faultString` member, or a fixed placeholder when absent.
    pub message: String,
}

impl Fault {
    /// Create a fault with a code.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "XML-RPC fault {}: {}", code, self.message),
            None => write!(f, "XML-RPC fault: {}", self.message),
        }
    }
}

impl std::error::Error for Fault {}
