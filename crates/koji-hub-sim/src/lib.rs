//! In-process Koji hub simulator.
//!
//! Serves a small XML-RPC surface (`login`, `sslLogin`, `listBuilds`,
//! `listTasks`, `getTaskInfo`) plus a file tree for task logs, backed by
//! scriptable in-memory state. Integration tests spawn it on a random
//! port; `main.rs` runs it standalone for manual poking.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use koji_xmlrpc::{
    decode_method_call, encode_method_response, Fault, MethodResponse, XmlRpcStruct, XmlRpcValue,
};
use tokio::net::TcpListener;

/// Fault message used when query options are switched off, matching the
/// wording of hubs that cannot bind a struct argument.
const REJECT_OPTS_MESSAGE: &str =
    "error: can't adapt type 'dict' while binding query parameters";

/// Scriptable hub state shared by every request handler.
#[derive(Default)]
pub struct SimState {
    builds: Mutex<Vec<XmlRpcValue>>,
    tasks: Mutex<Vec<XmlRpcValue>>,
    logs: Mutex<HashMap<(i64, String), String>>,
    reject_query_opts: AtomicBool,
    fail_next: Mutex<Option<(u16, String)>>,
    sessions: AtomicU64,
    calls: Mutex<Vec<String>>,
    cookies_seen: Mutex<Vec<Option<String>>>,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a build record.
    pub fn push_build(
        &self,
        build_id: i64,
        name: &str,
        version: &str,
        release: &str,
        completion_time: Option<&str>,
    ) {
        let mut fields = XmlRpcStruct::new();
        fields.insert("build_id", build_id);
        fields.insert("name", name);
        fields.insert("version", version);
        fields.insert("release", release);
        fields.insert("owner_name", "simbuilder");
        match completion_time {
            Some(time) => fields.insert("completion_time", time),
            None => fields.insert("completion_time", XmlRpcValue::Null),
        }
        self.builds.lock().unwrap().push(XmlRpcValue::Struct(fields));
    }

    /// Add a task record.
    pub fn push_task(&self, id: i64, method: &str, state: i64, owner: Option<&str>) {
        let mut fields = XmlRpcStruct::new();
        fields.insert("id", id);
        fields.insert("method", method);
        fields.insert("state", state);
        if let Some(owner) = owner {
            fields.insert("owner_name", owner);
        }
        fields.insert("create_time", "2024-01-01 00:00:00");
        self.tasks.lock().unwrap().push(XmlRpcValue::Struct(fields));
    }

    /// Store a log file for one task.
    pub fn put_log(&self, task_id: i64, file: &str, text: &str) {
        self.logs
            .lock()
            .unwrap()
            .insert((task_id, file.to_string()), text.to_string());
    }

    /// When set, `listBuilds` with arguments faults like a hub that cannot
    /// bind a struct-valued query options parameter.
    pub fn set_reject_query_opts(&self, reject: bool) {
        self.reject_query_opts.store(reject, Ordering::SeqCst);
    }

    /// Arm a plain HTTP failure for the next RPC request.
    pub fn fail_next_with(&self, status: u16, body: &str) {
        *self.fail_next.lock().unwrap() = Some((status, body.to_string()));
    }

    /// Method names of every RPC call received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Cookie header of every RPC call received, in order.
    pub fn observed_cookies(&self) -> Vec<Option<String>> {
        self.cookies_seen.lock().unwrap().clone()
    }

    /// Answer one decoded method call.
    pub fn dispatch(&self, method: &str, params: &[XmlRpcValue]) -> SimReply {
        self.calls.lock().unwrap().push(method.to_string());

        match method {
            "login" | "sslLogin" => {
                let session = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
                SimReply {
                    response: MethodResponse::Value(XmlRpcValue::Integer(session as i64)),
                    set_cookie: Some(format!("koji_session={session}; Path=/; HttpOnly")),
                }
            }
            "listBuilds" => {
                if !params.is_empty() && self.reject_query_opts.load(Ordering::SeqCst) {
                    return SimReply::fault(Fault::new(1, REJECT_OPTS_MESSAGE));
                }

                let mut builds = self.builds.lock().unwrap().clone();
                if let Some(options) = params.first().and_then(XmlRpcValue::as_struct) {
                    builds.sort_by_key(|b| std::cmp::Reverse(int_field(b, "build_id")));
                    if let Some(limit) = options.get("limit").and_then(XmlRpcValue::as_i64) {
                        builds.truncate(limit.max(0) as usize);
                    }
                }
                SimReply::value(XmlRpcValue::Sequence(builds))
            }
            "listTasks" => {
                let options = params.first().and_then(XmlRpcValue::as_struct);
                let owner = options
                    .and_then(|o| o.get("owner"))
                    .and_then(XmlRpcValue::as_str);
                let state = options
                    .and_then(|o| o.get("state"))
                    .and_then(XmlRpcValue::as_i64);

                let mut tasks: Vec<XmlRpcValue> = self
                    .tasks
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|t| owner.is_none() || str_field(t, "owner_name") == owner)
                    .filter(|t| state.is_none() || int_field(t, "state") == state)
                    .cloned()
                    .collect();
                tasks.sort_by_key(|t| std::cmp::Reverse(int_field(t, "id")));
                if let Some(limit) = options
                    .and_then(|o| o.get("limit"))
                    .and_then(XmlRpcValue::as_i64)
                {
                    tasks.truncate(limit.max(0) as usize);
                }
                SimReply::value(XmlRpcValue::Sequence(tasks))
            }
            "getTaskInfo" => {
                let id = params.first().and_then(XmlRpcValue::as_i64);
                let tasks = self.tasks.lock().unwrap();
                let found = tasks
                    .iter()
                    .find(|t| int_field(t, "id") == id)
                    .cloned()
                    .unwrap_or(XmlRpcValue::Null);
                SimReply::value(found)
            }
            other => SimReply::fault(Fault::new(1000, format!("Invalid method: {other}"))),
        }
    }
}

/// One dispatched answer: the RPC response plus an optional session cookie.
pub struct SimReply {
    pub response: MethodResponse,
    pub set_cookie: Option<String>,
}

impl SimReply {
    fn value(value: XmlRpcValue) -> Self {
        Self {
            response: MethodResponse::Value(value),
            set_cookie: None,
        }
    }

    fn fault(fault: Fault) -> Self {
        Self {
            response: MethodResponse::Fault(fault),
            set_cookie: None,
        }
    }
}

fn int_field(value: &XmlRpcValue, name: &str) -> Option<i64> {
    value.as_struct()?.get(name)?.as_i64()
}

fn str_field<'a>(value: &'a XmlRpcValue, name: &str) -> Option<&'a str> {
    value.as_struct()?.get(name)?.as_str()
}

/// Router serving the hub endpoint and the log file tree.
pub fn app(state: Arc<SimState>) -> Router {
    Router::new()
        .route("/kojihub", post(hub_endpoint))
        .route("/kojifiles/tasks/{bucket}/{task_id}/{file}", get(log_file))
        .with_state(state)
}

/// Serve until the listener closes.
pub async fn run(listener: TcpListener, state: Arc<SimState>) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn hub_endpoint(
    State(state): State<Arc<SimState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Some((status, message)) = state.fail_next.lock().unwrap().take() {
        let status =
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, message).into_response();
    }

    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.cookies_seen.lock().unwrap().push(cookie);

    let call = match decode_method_call(&body) {
        Ok(call) => call,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("bad methodCall: {e}")).into_response()
        }
    };

    let reply = state.dispatch(&call.method, &call.params);
    let body = match encode_method_response(&reply.response) {
        Ok(body) => body,
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("encode: {e}")).into_response()
        }
    };

    match reply.set_cookie {
        Some(cookie) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/xml".to_string()),
                (header::SET_COOKIE, cookie),
            ],
            body,
        )
            .into_response(),
        None => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/xml".to_string())],
            body,
        )
            .into_response(),
    }
}

async fn log_file(
    State(state): State<Arc<SimState>>,
    Path((bucket, task_id, file)): Path<(i64, i64, String)>,
) -> Response {
    // Wrong bucket means the caller derived the URL incorrectly.
    if bucket != task_id.rem_euclid(10_000) {
        return (StatusCode::NOT_FOUND, "wrong bucket").into_response();
    }

    match state.logs.lock().unwrap().get(&(task_id, file)) {
        Some(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain".to_string())],
            text.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "no such log").into_response(),
    }
}

/// A running simulator bound to a random local port.
pub struct SimHandle {
    pub state: Arc<SimState>,
    addr: SocketAddr,
}

impl SimHandle {
    /// XML-RPC endpoint URL.
    pub fn hub_url(&self) -> String {
        format!("http://{}/kojihub", self.addr)
    }

    /// File server base URL.
    pub fn files_url(&self) -> String {
        format!("http://{}/kojifiles", self.addr)
    }
}

/// Start the simulator on a random port in a background thread.
///
/// Panics when the port cannot be bound; callers are tests.
pub fn spawn() -> SimHandle {
    let state = Arc::new(SimState::new());
    let served = state.clone();

    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind sim port");
    let addr = std_listener.local_addr().expect("sim local addr");
    std_listener.set_nonblocking(true).expect("nonblocking sim listener");

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("sim runtime");
        rt.block_on(async {
            let listener = TcpListener::from_std(std_listener).expect("adopt sim listener");
            run(listener, served).await
        })
        .expect("sim server");
    });

    SimHandle { state, addr }
}
