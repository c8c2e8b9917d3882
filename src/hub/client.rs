//! Session-aware RPC client for the hub.
//!
//! Holds the endpoint, the user agent, and the session cookie. RPC
//! operations take `&mut self`: the cookie is rewritten after every
//! response, and exclusive access is what keeps that read-modify-write
//! safe. One client per concurrent call path, or serialize.

use std::sync::Arc;

use koji_xmlrpc::{
    decode_method_response, encode_method_call, DecodeError, EncodeError, Fault, XmlRpcStruct,
    XmlRpcValue,
};

use crate::hub::model::Task;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// User agent advertised when the configuration names none.
pub const DEFAULT_USER_AGENT: &str = "koji-scope";

/// Errors from hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The response body is not a decodable methodResponse document.
    #[error("protocol error: {0}")]
    Decode(#[from] DecodeError),

    /// The hub reported an application-level fault.
    #[error(transparent)]
    Fault(#[from] Fault),

    /// Non-2xx HTTP status from the hub or files server.
    #[error("Koji HTTP {status} {status_text}{}", body_suffix(.body))]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    /// Connection-level failure, passed through unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A request value the wire format cannot carry.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

/// Options for task listings.
///
/// Absent fields stay out of the wire struct entirely; some hub
/// deployments reject unexpected or null-valued keys.
#[derive(Debug, Clone)]
pub struct TaskQuery {
    /// Maximum number of records.
    pub limit: i64,
    /// Restrict to one owner.
    pub owner: Option<String>,
    /// Restrict to one numeric task state.
    pub state: Option<i64>,
}

impl TaskQuery {
    /// Query for the newest `limit` tasks with no filters.
    pub fn latest(limit: i64) -> Self {
        Self {
            limit,
            owner: None,
            state: None,
        }
    }
}

/// Session-aware XML-RPC client for one hub endpoint.
///
/// A fresh client starts anonymous; the session cookie is captured from
/// responses and dies with the instance.
pub struct HubClient {
    hub_url: String,
    user_agent: String,
    cookie: Option<String>,
    transport: Arc<dyn Transport>,
}

impl HubClient {
    /// Create an anonymous client for `hub_url`.
    pub fn new(hub_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            hub_url: hub_url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookie: None,
            transport,
        }
    }

    /// Replace the advertised user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Hub endpoint this client talks to.
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Session cookie currently held, if any.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Invoke one remote method and return its decoded result value.
    ///
    /// The session cookie is updated from every response, success or not,
    /// before the status is inspected.
    pub fn call(&mut self, method: &str, params: &[XmlRpcValue]) -> Result<XmlRpcValue, HubError> {
        let body = encode_method_call(method, params)?;

        let mut request = HttpRequest::post(self.hub_url.as_str())
            .header("content-type", "text/xml")
            .header("user-agent", self.user_agent.as_str());
        if let Some(cookie) = &self.cookie {
            request = request.header("cookie", cookie.as_str());
        }
        let request = request.body(body);

        tracing::debug!(method, "hub call");
        let response = self.transport.request(&request)?;
        self.capture_cookie(&response);

        if !response.ok() {
            return Err(HubError::Http {
                status: response.status,
                status_text: response.status_text,
                body: response.body,
            });
        }

        Ok(decode_method_response(&response.body)?.into_result()?)
    }

    /// Establish a password session.
    ///
    /// Failures propagate; continuing anonymously after a failed login is
    /// the caller's policy, not this client's.
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), HubError> {
        self.call(
            "login",
            &[XmlRpcValue::from(username), XmlRpcValue::from(password)],
        )?;
        Ok(())
    }

    /// Establish a session from the transport's client certificate.
    pub fn ssl_login(&mut self) -> Result<(), HubError> {
        self.call("sslLogin", &[])?;
        Ok(())
    }

    /// Fetch one task with full detail.
    ///
    /// Returns `None`, not an error, when the hub answers with something
    /// that is not struct-shaped.
    pub fn get_task_info(&mut self, task_id: i64) -> Result<Option<Task>, HubError> {
        let info = self.call(
            "getTaskInfo",
            &[XmlRpcValue::from(task_id), XmlRpcValue::from(true)],
        )?;
        Ok(Task::from_value(&info))
    }

    /// List the newest tasks, newest id first.
    ///
    /// A non-sequence response yields an empty list, not an error.
    pub fn list_tasks_latest(&mut self, query: &TaskQuery) -> Result<Vec<Task>, HubError> {
        let mut options = XmlRpcStruct::new();
        options.insert("order", "-id");
        options.insert("limit", query.limit);
        if let Some(owner) = &query.owner {
            options.insert("owner", owner.as_str());
        }
        if let Some(state) = query.state {
            options.insert("state", state);
        }

        let tasks = self.call("listTasks", &[XmlRpcValue::Struct(options)])?;
        Ok(decode_records(&tasks, Task::from_value))
    }

    /// GET arbitrary text (a task log) through the same transport.
    pub fn fetch_text(&self, url: &str) -> Result<String, HubError> {
        let request = HttpRequest::get(url).header("user-agent", self.user_agent.as_str());
        let response = self.transport.request(&request)?;
        if !response.ok() {
            return Err(HubError::Http {
                status: response.status,
                status_text: response.status_text,
                body: response.body,
            });
        }
        Ok(response.body)
    }

    /// Capture the session cookie: first `Set-Cookie` header wins, and
    /// attributes after the first `;` are dropped.
    fn capture_cookie(&mut self, response: &HttpResponse) {
        let Some(first) = response.header("set-cookie") else {
            return;
        };
        let pair = first.split(';').next().unwrap_or("").trim();
        if !pair.is_empty() {
            tracing::debug!("session cookie updated");
            self.cookie = Some(pair.to_string());
        }
    }
}

/// Decode a listing response: each sequence element through `decode`,
/// skipping elements it rejects; a non-sequence value yields no records.
pub(crate) fn decode_records<T>(
    value: &XmlRpcValue,
    decode: impl Fn(&XmlRpcValue) -> Option<T>,
) -> Vec<T> {
    match value.as_sequence() {
        Some(items) => items.iter().filter_map(decode).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use koji_xmlrpc::{encode_method_response, MethodResponse};

    fn xml_response(value: XmlRpcValue) -> HttpResponse {
        HttpResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![("content-type".to_string(), "text/xml".to_string())],
            body: encode_method_response(&MethodResponse::Value(value)).unwrap(),
        }
    }

    fn fault_response(code: i64, message: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: Vec::new(),
            body: encode_method_response(&MethodResponse::Fault(Fault::new(code, message)))
                .unwrap(),
        }
    }

    fn with_cookie(mut response: HttpResponse, cookie: &str) -> HttpResponse {
        response
            .headers
            .push(("set-cookie".to_string(), cookie.to_string()));
        response
    }

    fn task_value(id: i64, method: &str, state: i64) -> XmlRpcValue {
        let mut fields = XmlRpcStruct::new();
        fields.insert("id", id);
        fields.insert("method", method);
        fields.insert("state", state);
        XmlRpcValue::Struct(fields)
    }

    fn client(mock: &Arc<MockTransport>) -> HubClient {
        HubClient::new("https://hub.example/kojihub", mock.clone())
    }

    #[test]
    fn test_call_sends_rpc_headers() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(xml_response(XmlRpcValue::Integer(1)));
        let mut client = client(&mock).with_user_agent("koji-scope/0.1");

        client.call("getAPIVersion", &[]).unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://hub.example/kojihub");
        assert_eq!(requests[0].header_value("content-type"), Some("text/xml"));
        assert_eq!(requests[0].header_value("user-agent"), Some("koji-scope/0.1"));
        assert_eq!(requests[0].header_value("cookie"), None);
        assert!(requests[0]
            .body
            .as_deref()
            .unwrap()
            .contains("<methodName>getAPIVersion</methodName>"));
    }

    #[test]
    fn test_call_decodes_result_value() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(xml_response(XmlRpcValue::from("1.35")));
        let mut client = client(&mock);

        let value = client.call("getKojiVersion", &[]).unwrap();
        assert_eq!(value, XmlRpcValue::Text("1.35".into()));
    }

    #[test]
    fn test_cookie_captured_and_replayed() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(with_cookie(
            xml_response(XmlRpcValue::Integer(1)),
            "sid=abc123; Path=/; HttpOnly",
        ));
        mock.push_response(xml_response(XmlRpcValue::Integer(2)));
        let mut client = client(&mock);

        client.call("login", &[]).unwrap();
        assert_eq!(client.cookie(), Some("sid=abc123"));

        client.call("listTasks", &[]).unwrap();
        let requests = mock.requests();
        assert_eq!(requests[0].header_value("cookie"), None);
        assert_eq!(requests[1].header_value("cookie"), Some("sid=abc123"));
    }

    #[test]
    fn test_first_set_cookie_header_wins() {
        let mock = Arc::new(MockTransport::new());
        let mut response = xml_response(XmlRpcValue::Integer(1));
        response
            .headers
            .push(("set-cookie".to_string(), "koji_session=one; Path=/".to_string()));
        response
            .headers
            .push(("set-cookie".to_string(), "other=two".to_string()));
        mock.push_response(response);
        let mut client = client(&mock);

        client.call("login", &[]).unwrap();
        assert_eq!(client.cookie(), Some("koji_session=one"));
    }

    #[test]
    fn test_cookie_updates_on_every_response() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(with_cookie(xml_response(XmlRpcValue::Integer(1)), "sid=a"));
        mock.push_response(with_cookie(xml_response(XmlRpcValue::Integer(2)), "sid=b"));
        let mut client = client(&mock);

        client.call("login", &[]).unwrap();
        client.call("listTasks", &[]).unwrap();
        assert_eq!(client.cookie(), Some("sid=b"));
    }

    #[test]
    fn test_cookie_captured_even_from_error_response() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(with_cookie(
            HttpResponse {
                status: 503,
                status_text: "Service Unavailable".to_string(),
                headers: Vec::new(),
                body: String::new(),
            },
            "sid=survivor",
        ));
        let mut client = client(&mock);

        let err = client.call("listTasks", &[]).unwrap_err();
        assert!(matches!(err, HubError::Http { status: 503, .. }));
        assert_eq!(client.cookie(), Some("sid=survivor"));
    }

    #[test]
    fn test_http_error_carries_status_and_body() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(HttpResponse {
            status: 500,
            status_text: "Internal Server Error".to_string(),
            headers: Vec::new(),
            body: "boom".to_string(),
        });
        let mut client = client(&mock);

        let err = client.call("listBuilds", &[]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("500"), "got {message}");
        assert!(message.contains("boom"), "got {message}");
    }

    #[test]
    fn test_http_error_without_body_omits_suffix() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(HttpResponse {
            status: 404,
            status_text: "Not Found".to_string(),
            headers: Vec::new(),
            body: String::new(),
        });
        let mut client = client(&mock);

        let err = client.call("listBuilds", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Koji HTTP 404 Not Found");
    }

    #[test]
    fn test_fault_propagates() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(fault_response(1000, "Invalid method"));
        let mut client = client(&mock);

        let err = client.call("frobnicate", &[]).unwrap_err();
        match err {
            HubError::Fault(fault) => {
                assert_eq!(fault.code, Some(1000));
                assert_eq!(fault.message, "Invalid method");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_undecodable_body_is_protocol_error() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(HttpResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: Vec::new(),
            body: "<html>proxy error page</html>".to_string(),
        });
        let mut client = client(&mock);

        let err = client.call("listTasks", &[]).unwrap_err();
        assert!(matches!(err, HubError::Decode(_)));
    }

    #[test]
    fn test_transport_error_passes_through() {
        let mock = Arc::new(MockTransport::new());
        mock.push_error(TransportError::Timeout);
        let mut client = client(&mock);

        let err = client.call("listTasks", &[]).unwrap_err();
        assert!(matches!(
            err,
            HubError::Transport(TransportError::Timeout)
        ));
    }

    #[test]
    fn test_login_sends_credentials_in_order() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(with_cookie(
            xml_response(XmlRpcValue::Integer(1)),
            "koji_session=tok",
        ));
        let mut client = client(&mock);

        client.login("alice", "s3cret").unwrap();
        assert_eq!(client.cookie(), Some("koji_session=tok"));

        let body = mock.requests()[0].body.clone().unwrap();
        assert!(body.contains("<methodName>login</methodName>"));
        let user_at = body.find("<string>alice</string>").unwrap();
        let pass_at = body.find("<string>s3cret</string>").unwrap();
        assert!(user_at < pass_at);
    }

    #[test]
    fn test_ssl_login_sends_no_params() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(xml_response(XmlRpcValue::Integer(1)));
        let mut client = client(&mock);

        client.ssl_login().unwrap();
        let body = mock.requests()[0].body.clone().unwrap();
        assert!(body.contains("<methodName>sslLogin</methodName>"));
        assert!(body.contains("<params></params>"));
    }

    #[test]
    fn test_get_task_info_requests_full_detail() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(xml_response(task_value(77, "build", 2)));
        let mut client = client(&mock);

        let task = client.get_task_info(77).unwrap().unwrap();
        assert_eq!(task.id, 77);
        assert_eq!(task.method, "build");

        let body = mock.requests()[0].body.clone().unwrap();
        assert!(body.contains("<int>77</int>"));
        assert!(body.contains("<boolean>1</boolean>"));
    }

    #[test]
    fn test_get_task_info_non_struct_is_absent() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(xml_response(XmlRpcValue::Null));
        let mut client = client(&mock);

        assert!(client.get_task_info(1).unwrap().is_none());
    }

    #[test]
    fn test_list_tasks_includes_only_set_filters() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(xml_response(XmlRpcValue::Sequence(vec![])));
        mock.push_response(xml_response(XmlRpcValue::Sequence(vec![])));
        let mut client = client(&mock);

        client.list_tasks_latest(&TaskQuery::latest(50)).unwrap();
        let bare = mock.requests()[0].body.clone().unwrap();
        assert!(bare.contains("<name>order</name>"));
        assert!(bare.contains("<string>-id</string>"));
        assert!(bare.contains("<int>50</int>"));
        assert!(!bare.contains("owner"));
        assert!(!bare.contains("state"));

        let query = TaskQuery {
            limit: 10,
            owner: Some("mockbuilder".to_string()),
            state: Some(1),
        };
        client.list_tasks_latest(&query).unwrap();
        let filtered = mock.requests()[1].body.clone().unwrap();
        assert!(filtered.contains("<name>owner</name>"));
        assert!(filtered.contains("<string>mockbuilder</string>"));
        assert!(filtered.contains("<name>state</name>"));
        assert!(filtered.contains("<int>1</int>"));
    }

    #[test]
    fn test_list_tasks_decodes_records() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(xml_response(XmlRpcValue::Sequence(vec![
            task_value(9, "build", 1),
            task_value(8, "newRepo", 2),
        ])));
        let mut client = client(&mock);

        let tasks = client.list_tasks_latest(&TaskQuery::latest(2)).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, 9);
        assert_eq!(tasks[1].method, "newRepo");
    }

    #[test]
    fn test_list_tasks_non_sequence_is_empty() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(xml_response(XmlRpcValue::from("unexpected")));
        let mut client = client(&mock);

        let tasks = client.list_tasks_latest(&TaskQuery::latest(5)).unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_fetch_text_returns_body() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(HttpResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: Vec::new(),
            body: "log line\n".to_string(),
        });
        let client = client(&mock);

        let text = client.fetch_text("https://files.example/task.log").unwrap();
        assert_eq!(text, "log line\n");
        assert_eq!(mock.requests()[0].method, crate::transport::HttpMethod::Get);
    }

    #[test]
    fn test_fetch_text_surfaces_http_errors() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(HttpResponse {
            status: 404,
            status_text: "Not Found".to_string(),
            headers: Vec::new(),
            body: String::new(),
        });
        let client = client(&mock);

        let err = client.fetch_text("https://files.example/nope.log").unwrap_err();
        assert!(matches!(err, HubError::Http { status: 404, .. }));
    }
}
