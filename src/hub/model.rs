//! Build and task records returned by the hub.
//!
//! Field decoding is deliberately forgiving: hubs of different vintages
//! omit or null fields freely, so a record is only rejected when it is not
//! struct-shaped at all.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use koji_xmlrpc::{XmlRpcStruct, XmlRpcValue};
use serde::Serialize;

/// One build record, as returned by `listBuilds`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Build {
    pub build_id: i64,
    pub name: String,
    pub version: String,
    pub release: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
}

impl Build {
    /// Decode one listing record. Non-struct values are not a build.
    pub fn from_value(value: &XmlRpcValue) -> Option<Self> {
        let fields = value.as_struct()?;
        Some(Self {
            build_id: int_field(fields, "build_id").unwrap_or_default(),
            name: text_field(fields, "name").unwrap_or_default(),
            version: text_field(fields, "version").unwrap_or_default(),
            release: text_field(fields, "release").unwrap_or_default(),
            epoch: scalar_field(fields, "epoch"),
            state: int_field(fields, "state"),
            completion_time: text_field(fields, "completion_time"),
            creation_time: text_field(fields, "creation_time"),
            owner_name: text_field(fields, "owner_name"),
            task_id: int_field(fields, "task_id"),
        })
    }

    /// The conventional name-version-release label.
    pub fn nvr(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }

    /// Millisecond timestamp for ordering: completion time first, then
    /// creation time, then the zero epoch.
    pub fn sort_timestamp(&self) -> i64 {
        parse_hub_time(self.completion_time.as_deref())
            .or_else(|| parse_hub_time(self.creation_time.as_deref()))
            .map(|ts| ts.timestamp_millis())
            .unwrap_or(0)
    }
}

/// One task record, as returned by `listTasks` and `getTaskInfo`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: i64,
    pub method: String,
    pub state: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
}

impl Task {
    /// Decode one task record. Non-struct values are not a task.
    pub fn from_value(value: &XmlRpcValue) -> Option<Self> {
        let fields = value.as_struct()?;
        Some(Self {
            id: int_field(fields, "id").unwrap_or_default(),
            method: text_field(fields, "method").unwrap_or_default(),
            state: int_field(fields, "state").unwrap_or_default(),
            owner_name: text_field(fields, "owner_name"),
            create_time: text_field(fields, "create_time"),
            start_time: text_field(fields, "start_time"),
            completion_time: text_field(fields, "completion_time"),
        })
    }

    /// Human name of this task's state.
    pub fn state_label(&self) -> String {
        format_task_state(self.state)
    }
}

/// Human name of a numeric task state, `STATE_n` for codes the hub added
/// after this client was written.
pub fn format_task_state(state: i64) -> String {
    match state {
        0 => "FREE".to_string(),
        1 => "OPEN".to_string(),
        2 => "CLOSED".to_string(),
        3 => "CANCELED".to_string(),
        4 => "ASSIGNED".to_string(),
        5 => "FAILED".to_string(),
        other => format!("STATE_{other}"),
    }
}

/// Task state filter for listings. `All` sends no state constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStateFilter {
    #[default]
    All,
    Free,
    Open,
    Closed,
    Canceled,
    Assigned,
    Failed,
}

impl TaskStateFilter {
    /// Numeric hub code; `None` means no constraint.
    pub fn code(self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::Free => Some(0),
            Self::Open => Some(1),
            Self::Closed => Some(2),
            Self::Canceled => Some(3),
            Self::Assigned => Some(4),
            Self::Failed => Some(5),
        }
    }

    /// Parse a configuration or CLI spelling, case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ALL" => Some(Self::All),
            "FREE" => Some(Self::Free),
            "OPEN" => Some(Self::Open),
            "CLOSED" => Some(Self::Closed),
            "CANCELED" => Some(Self::Canceled),
            "ASSIGNED" => Some(Self::Assigned),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Canonical spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Free => "FREE",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Canceled => "CANCELED",
            Self::Assigned => "ASSIGNED",
            Self::Failed => "FAILED",
        }
    }
}

/// Web UI address of a build.
pub fn build_info_url(web_url: &str, build_id: i64) -> String {
    format!(
        "{}/buildinfo?buildID={}",
        web_url.trim_end_matches('/'),
        build_id
    )
}

/// Parse the time strings hubs put in records.
///
/// Accepts RFC 3339, the hub's `YYYY-MM-DD HH:MM:SS[.frac][±zone]` forms,
/// and bare dates. Anything else is `None`, which sorts as the zero epoch.
pub fn parse_hub_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn text_field(fields: &XmlRpcStruct, name: &str) -> Option<String> {
    match fields.get(name)? {
        XmlRpcValue::Text(s) if !s.is_empty() => Some(s.clone()),
        XmlRpcValue::Timestamp(ts) => Some(ts.to_rfc3339()),
        _ => None,
    }
}

fn int_field(fields: &XmlRpcStruct, name: &str) -> Option<i64> {
    fields.get(name)?.as_i64()
}

/// Field that arrives as either text or an integer (epoch does both).
fn scalar_field(fields: &XmlRpcStruct, name: &str) -> Option<String> {
    match fields.get(name)? {
        XmlRpcValue::Text(s) if !s.is_empty() => Some(s.clone()),
        XmlRpcValue::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_value(entries: &[(&str, XmlRpcValue)]) -> XmlRpcValue {
        let mut fields = XmlRpcStruct::new();
        for (name, value) in entries {
            fields.insert(*name, value.clone());
        }
        XmlRpcValue::Struct(fields)
    }

    #[test]
    fn test_task_state_labels() {
        assert_eq!(format_task_state(0), "FREE");
        assert_eq!(format_task_state(1), "OPEN");
        assert_eq!(format_task_state(2), "CLOSED");
        assert_eq!(format_task_state(3), "CANCELED");
        assert_eq!(format_task_state(4), "ASSIGNED");
        assert_eq!(format_task_state(5), "FAILED");
        assert_eq!(format_task_state(42), "STATE_42");
    }

    #[test]
    fn test_state_filter_codes() {
        assert_eq!(TaskStateFilter::All.code(), None);
        assert_eq!(TaskStateFilter::Free.code(), Some(0));
        assert_eq!(TaskStateFilter::Failed.code(), Some(5));
    }

    #[test]
    fn test_state_filter_parse() {
        assert_eq!(TaskStateFilter::parse("open"), Some(TaskStateFilter::Open));
        assert_eq!(TaskStateFilter::parse(" FAILED "), Some(TaskStateFilter::Failed));
        assert_eq!(TaskStateFilter::parse("ALL"), Some(TaskStateFilter::All));
        assert_eq!(TaskStateFilter::parse("bogus"), None);
    }

    #[test]
    fn test_parse_hub_time_forms() {
        let date_only = parse_hub_time(Some("2021-01-01")).unwrap();
        assert_eq!(date_only, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());

        let hub_form = parse_hub_time(Some("2021-01-01 08:30:00")).unwrap();
        assert_eq!(hub_form, Utc.with_ymd_and_hms(2021, 1, 1, 8, 30, 0).unwrap());

        let zoned = parse_hub_time(Some("2021-01-01 08:30:00.000000+00:00")).unwrap();
        assert_eq!(zoned, Utc.with_ymd_and_hms(2021, 1, 1, 8, 30, 0).unwrap());

        let rfc = parse_hub_time(Some("2021-01-01T08:30:00Z")).unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2021, 1, 1, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_hub_time_rejects_garbage() {
        assert!(parse_hub_time(None).is_none());
        assert!(parse_hub_time(Some("")).is_none());
        assert!(parse_hub_time(Some("not a date")).is_none());
    }

    #[test]
    fn test_build_from_struct() {
        let value = build_value(&[
            ("build_id", XmlRpcValue::Integer(42)),
            ("name", XmlRpcValue::from("kernel")),
            ("version", XmlRpcValue::from("6.8.1")),
            ("release", XmlRpcValue::from("300.fc40")),
            ("epoch", XmlRpcValue::Integer(1)),
            ("completion_time", XmlRpcValue::from("2021-01-01 00:00:00")),
            ("owner_name", XmlRpcValue::from("mockbuilder")),
            ("task_id", XmlRpcValue::Integer(900)),
        ]);
        let build = Build::from_value(&value).unwrap();
        assert_eq!(build.build_id, 42);
        assert_eq!(build.nvr(), "kernel-6.8.1-300.fc40");
        assert_eq!(build.epoch.as_deref(), Some("1"));
        assert_eq!(build.task_id, Some(900));
        assert!(build.creation_time.is_none());
    }

    #[test]
    fn test_build_from_non_struct_is_none() {
        assert!(Build::from_value(&XmlRpcValue::Integer(5)).is_none());
        assert!(Build::from_value(&XmlRpcValue::Null).is_none());
    }

    #[test]
    fn test_build_sort_timestamp_prefers_completion_time() {
        let both = build_value(&[
            ("completion_time", XmlRpcValue::from("2021-06-01")),
            ("creation_time", XmlRpcValue::from("2020-01-01")),
        ]);
        let creation_only = build_value(&[("creation_time", XmlRpcValue::from("2020-01-01"))]);
        let neither = build_value(&[("name", XmlRpcValue::from("x"))]);

        let both = Build::from_value(&both).unwrap();
        let creation_only = Build::from_value(&creation_only).unwrap();
        let neither = Build::from_value(&neither).unwrap();

        assert!(both.sort_timestamp() > creation_only.sort_timestamp());
        assert!(creation_only.sort_timestamp() > 0);
        assert_eq!(neither.sort_timestamp(), 0);
    }

    #[test]
    fn test_build_unparseable_time_sorts_as_zero_epoch() {
        let junk = build_value(&[("completion_time", XmlRpcValue::from("soonish"))]);
        assert_eq!(Build::from_value(&junk).unwrap().sort_timestamp(), 0);
    }

    #[test]
    fn test_task_from_struct() {
        let value = build_value(&[
            ("id", XmlRpcValue::Integer(77)),
            ("method", XmlRpcValue::from("build")),
            ("state", XmlRpcValue::Integer(2)),
            ("owner_name", XmlRpcValue::from("mockbuilder")),
            ("create_time", XmlRpcValue::from("2021-01-01 08:30:00")),
        ]);
        let task = Task::from_value(&value).unwrap();
        assert_eq!(task.id, 77);
        assert_eq!(task.method, "build");
        assert_eq!(task.state_label(), "CLOSED");
        assert!(task.start_time.is_none());
    }

    #[test]
    fn test_task_from_non_struct_is_none() {
        assert!(Task::from_value(&XmlRpcValue::from("nope")).is_none());
    }

    #[test]
    fn test_build_info_url_trims_trailing_slash() {
        assert_eq!(
            build_info_url("https://koji.fedoraproject.org/koji/", 42),
            "https://koji.fedoraproject.org/koji/buildinfo?buildID=42"
        );
    }
}
