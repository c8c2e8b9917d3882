//! Codec error types.

/// Errors raised while serializing values to wire XML.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// XML-RPC has no representation for NaN or infinities.
    #[error("cannot encode non-finite number {0}")]
    NonFiniteNumber(f64),
}

/// Errors raised while decoding wire XML.
///
/// These cover structural failures only. A value node with an unknown or
/// unparseable payload does not error; it decodes to a best-effort text
/// fallback instead.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(#[from] roxmltree::Error),

    /// The document root is not `<methodResponse>`.
    #[error("document root is <{0}>, expected <methodResponse>")]
    NotAMethodResponse(String),

    /// The document root is not `<methodCall>`.
    #[error("document root is <{0}>, expected <methodCall>")]
    NotAMethodCall(String),

    /// A `<methodCall>` without a usable `<methodName>`.
    #[error("method call has no method name")]
    MissingMethodName,
}
