//! Koji XML-RPC Wire Codec
//!
//! Implements the XML-RPC value grammar the Koji hub speaks: encoding of
//! method calls and decoding of method responses, with the hub's lenient
//! conventions (whole reals travel as ints, unknown value nodes fall back
//! to text, single-element arrays stay arrays).

pub mod decode;
pub mod encode;
pub mod error;
pub mod value;

pub use decode::{decode_method_call, decode_method_response};
pub use encode::{encode_method_call, encode_method_response, encode_value, escape_xml};
pub use error::{DecodeError, EncodeError};
pub use value::{Fault, MethodCall, MethodResponse, XmlRpcStruct, XmlRpcValue};
