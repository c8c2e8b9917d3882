//! Build listing with a version-skew fallback.
//!
//! Some hub deployments bind `listBuilds` query options server-side and
//! reject the struct argument with a type-adaptation fault. The listing
//! first asks the hub to order and limit; when that call fails it refetches
//! without options and sorts locally.

use std::cmp::Reverse;

use koji_xmlrpc::{Fault, XmlRpcStruct, XmlRpcValue};

use crate::hub::client::{decode_records, HubClient, HubError};
use crate::hub::model::Build;

/// Literal fragment of the fault raised by hubs that cannot bind a
/// struct-valued query options argument. Observed verbatim from
/// psycopg2-backed deployments; match it exactly, do not widen.
const QUERY_OPTS_REJECTED_FRAGMENT: &str = "can't adapt type 'dict'";

/// True when `fault` is the known rejection of a query options struct.
pub fn fault_rejects_query_opts(fault: &Fault) -> bool {
    fault.message.contains(QUERY_OPTS_REJECTED_FRAGMENT)
}

impl HubClient {
    /// List the newest builds, newest first, at most `limit` records.
    ///
    /// Tries `listBuilds` with `{order: "-id", limit}`. On any failure the
    /// full unfiltered listing is fetched, sorted by completion then
    /// creation time descending, and truncated locally. When the fallback
    /// fails too, the first attempt's error is the one reported.
    pub fn list_builds_latest(&mut self, limit: i64) -> Result<Vec<Build>, HubError> {
        let mut options = XmlRpcStruct::new();
        options.insert("order", "-id");
        options.insert("limit", limit);

        let original = match self.call("listBuilds", &[XmlRpcValue::Struct(options)]) {
            Ok(value) => return Ok(decode_records(&value, Build::from_value)),
            Err(err) => err,
        };

        match &original {
            HubError::Fault(fault) if fault_rejects_query_opts(fault) => {
                tracing::debug!("hub rejects query options, listing without them");
            }
            other => {
                tracing::warn!(error = %other, "listBuilds with query options failed, retrying without them");
            }
        }

        match self.call("listBuilds", &[]) {
            Ok(value) => {
                let mut builds = decode_records(&value, Build::from_value);
                builds.sort_by_key(|build| Reverse(build.sort_timestamp()));
                builds.truncate(limit.max(0) as usize);
                Ok(builds)
            }
            Err(_) => Err(original),
        }
    }
}
