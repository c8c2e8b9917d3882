//! Task log addressing on the hub's file server.
//!
//! Task output lives under `{filesUrl}/tasks/{bucket}/{taskId}/`, where the
//! bucket is the task id modulo 10000. Logs are plain text fetched with a
//! bare GET; the file server does not take part in the RPC session.

use crate::hub::{HubClient, HubError};

/// Log files most task methods produce, in display order.
pub const COMMON_TASK_LOG_FILES: [&str; 5] =
    ["task.log", "build.log", "root.log", "mock.log", "state.log"];

/// Directory holding every log file of one task.
pub fn task_logs_base_url(files_url: &str, task_id: i64) -> String {
    let base = files_url.trim_end_matches('/');
    // Bucket is the last four digits; negative ids wrap into [0, 10000).
    let bucket = task_id.rem_euclid(10_000);
    format!("{base}/tasks/{bucket}/{task_id}")
}

/// Full URL of one log file of one task.
pub fn task_log_url(files_url: &str, task_id: i64, file_name: &str) -> String {
    let clean = file_name.trim_start_matches('/');
    format!(
        "{}/{}",
        task_logs_base_url(files_url, task_id),
        percent_encode_component(clean)
    )
}

/// Fetch one task log as text through the client's transport.
pub fn fetch_task_log(
    client: &HubClient,
    files_url: &str,
    task_id: i64,
    file_name: &str,
) -> Result<String, HubError> {
    client.fetch_text(&task_log_url(files_url, task_id, file_name))
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Percent-encode one path segment. Alphanumerics and `-_.!~*'()` stay
/// bare; every other byte, including each byte of a multi-byte UTF-8
/// character, becomes `%XX`.
fn percent_encode_component(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for &byte in input.as_bytes() {
        if is_bare(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push('%');
            encoded.push(HEX_DIGITS[(byte >> 4) as usize] as char);
            encoded.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
        }
    }
    encoded
}

fn is_bare(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')'
        )
}
