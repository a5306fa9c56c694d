//! Ad-hoc metric queries through `POST /api/ds/query`.
//!
//! The response layout depends on the backend plugin, so every response type
//! tolerates missing fields and ignores ones it does not know.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::client::GrafanaClient;
use crate::datasource::null_as_default;
use crate::error::ApiError;
use crate::transport::Method;

const QUERY_PATH: &str = "/api/ds/query";

// ------------------------------------------------------------------ //
//  Request                                                            //
// ------------------------------------------------------------------ //

/// The data source a sub-query runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTarget {
    #[serde(rename = "type")]
    pub kind: String,
    pub uid: String,
}

impl QueryTarget {
    pub fn new(kind: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            uid: uid.into(),
        }
    }
}

/// One query of a [`QueryRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubQuery {
    /// Key of this query's entry in [`QueryResults`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    pub datasource: QueryTarget,
    pub editor_mode: String,
    pub expr: String,
    pub format: String,
    pub interval_factor: i64,
    pub legend_format: String,
    pub range: bool,
    pub exemplar: bool,
    pub request_id: String,
    pub utc_offset_sec: i64,
    pub interval: String,
    pub datasource_id: i64,
    pub interval_ms: i64,
    pub max_data_points: i64,
}

impl SubQuery {
    pub fn new(datasource: QueryTarget, expr: impl Into<String>) -> Self {
        Self {
            datasource,
            expr: expr.into(),
            ..Self::default()
        }
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }
}

/// Raw range bounds as the UI expresses them, e.g. `now-1h`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTimeRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    pub raw: RawTimeRange,
}

impl TimeRange {
    pub fn absolute(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            raw: RawTimeRange::default(),
        }
    }

    pub fn with_raw(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.raw = RawTimeRange {
            from: Some(from.into()),
            to: Some(to.into()),
        };
        self
    }
}

/// A batch of sub-queries over one time range.
///
/// The absolute range, the raw range and the top-level `from`/`to` are sent
/// exactly as given. Nothing here checks that they agree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub queries: Vec<SubQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl QueryRequest {
    /// `from`/`to` accept epoch milliseconds or relative expressions.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
            ..Self::default()
        }
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_query(mut self, query: SubQuery) -> Self {
        self.queries.push(query);
        self
    }
}

// ------------------------------------------------------------------ //
//  Response                                                           //
// ------------------------------------------------------------------ //

/// Results keyed by each sub-query's `refId`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryResults {
    #[serde(deserialize_with = "null_as_default")]
    pub results: BTreeMap<String, QueryResponse>,
}

impl QueryResults {
    pub fn get(&self, ref_id: &str) -> Option<&QueryResponse> {
        self.results.get(ref_id)
    }
}

/// The outcome of one sub-query. A failed sub-query does not fail the batch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryResponse {
    pub status: Option<u16>,
    pub error: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub frames: Vec<Frame>,
}

impl QueryResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.status.is_some_and(|s| s >= 400)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Frame {
    pub schema: Schema,
    pub data: FrameData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Schema {
    pub name: String,
    pub ref_id: String,
    pub meta: Option<FrameMeta>,
    #[serde(deserialize_with = "null_as_default")]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrameMeta {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub type_version: Vec<u32>,
    pub custom: Option<CustomMeta>,
    pub executed_query_string: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomMeta {
    pub result_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub type_info: Option<TypeInfo>,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
    pub config: Option<FieldConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TypeInfo {
    pub frame: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldConfig {
    pub interval: Option<i64>,
    pub frame: Option<String>,
    #[serde(rename = "displayNameFromDS")]
    pub display_name_from_ds: Option<String>,
}

/// Columnar values, one column per schema field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameData {
    #[serde(deserialize_with = "null_as_default")]
    pub values: Vec<Vec<Value>>,
}

impl FrameData {
    pub fn column(&self, index: usize) -> Option<&[Value]> {
        self.values.get(index).map(Vec::as_slice)
    }

    /// The column as integers, or `None` if any cell is not an `i64`.
    pub fn int_column(&self, index: usize) -> Option<Vec<i64>> {
        self.column(index)?.iter().map(Value::as_i64).collect()
    }
}

// ------------------------------------------------------------------ //
//  Dispatch                                                           //
// ------------------------------------------------------------------ //

impl GrafanaClient {
    /// Run every sub-query of `request` in one call.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResults, ApiError> {
        debug!(queries = request.queries.len(), "running data source query");
        let results: QueryResults = self.send_json(Method::Post, QUERY_PATH, request).await?;
        debug!(results = results.results.len(), "data source query finished");
        Ok(results)
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
