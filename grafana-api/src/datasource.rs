//! Data source entity and CRUD operations.
//!
//! A data source carries two free-form configuration maps. `jsonData` is
//! plain and returned verbatim on read. `secureJsonData` is write-only: the
//! platform stores it but only ever reports back which keys are set, as
//! `secureJsonFields`. The three maps get three distinct types so a
//! presence flag can never be passed off as a credential.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::{encode_body, GrafanaClient};
use crate::error::{ApiError, HeaderDecodeError};
use crate::headers::{self, DecodedHeaders};
use crate::transport::Method;

const DATASOURCES_PATH: &str = "/api/datasources";

// ------------------------------------------------------------------ //
//  Configuration containers                                           //
// ------------------------------------------------------------------ //

/// Plain configuration, visible on read.
pub type JsonData = Map<String, Value>;

/// Secret configuration sent on create/update and never read back.
///
/// `Debug` prints key names only.
#[derive(Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SecureJsonData(Map<String, Value>);

impl SecureJsonData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for SecureJsonData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Debug for SecureJsonData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

/// Read-side report of which secret keys hold a value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SecureJsonFields(Map<String, Value>);

impl SecureJsonFields {
    /// A key counts as set when present and not `false` or `null`.
    pub fn is_set(&self, key: &str) -> bool {
        !matches!(self.0.get(key), None | Some(Value::Null) | Some(Value::Bool(false)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }
}

impl From<Map<String, Value>> for SecureJsonFields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for SecureJsonFields {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ------------------------------------------------------------------ //
//  Entity                                                             //
// ------------------------------------------------------------------ //

/// How the platform reaches the backend.
///
/// Values other than `proxy` and `direct` (including the empty string some
/// provisioned data sources carry) are kept verbatim in [`Access::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Access {
    /// Requests are proxied through the Grafana server.
    #[default]
    Proxy,
    /// The browser talks to the backend directly.
    Direct,
    Other(String),
}

impl Access {
    pub fn as_str(&self) -> &str {
        match self {
            Access::Proxy => "proxy",
            Access::Direct => "direct",
            Access::Other(value) => value,
        }
    }
}

impl From<String> for Access {
    fn from(value: String) -> Self {
        match value.as_str() {
            "proxy" => Access::Proxy,
            "direct" => Access::Direct,
            _ => Access::Other(value),
        }
    }
}

impl From<Access> for String {
    fn from(access: Access) -> Self {
        match access {
            Access::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured connection to a metrics, logs or traces backend.
///
/// Empty optional fields are left out of the request body on write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    /// Assigned by the platform on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub name: String,
    /// Plugin identifier, e.g. `prometheus` or `loki`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub access: Access,

    /// Provisioning lock reported by the server; never sent.
    #[serde(default, skip_serializing)]
    pub read_only: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<i64>,
    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    pub basic_auth: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub basic_auth_user: String,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    pub json_data: JsonData,
    #[serde(default, skip_deserializing, skip_serializing_if = "SecureJsonData::is_empty")]
    pub secure_json_data: SecureJsonData,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing)]
    pub secure_json_fields: SecureJsonFields,
}

impl DataSource {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Address this data source by numeric id, if it has one.
    pub fn id_ref(&self) -> Option<DataSourceId> {
        self.id.map(DataSourceId::Id)
    }

    /// Address this data source by uid, if it has one.
    pub fn uid_ref(&self) -> Option<DataSourceId> {
        self.uid.clone().map(DataSourceId::Uid)
    }

    /// Encode `headers` into this data source's configuration maps.
    pub fn set_http_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let (json_data, secure_json_data) =
            headers::encode(&self.json_data, &self.secure_json_data, headers);
        self.json_data = json_data;
        self.secure_json_data = secure_json_data;
    }

    /// Recover the custom header names from data read back from the platform.
    pub fn http_headers(&self) -> Result<DecodedHeaders, HeaderDecodeError> {
        headers::decode(&self.json_data, &self.secure_json_fields)
    }
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Which addressing scheme an operation uses.
///
/// The two are not interchangeable: the variant picks the endpoint, and the
/// identifier must be the matching one for the target data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceId {
    Id(i64),
    Uid(String),
}

impl DataSourceId {
    pub fn path(&self) -> String {
        match self {
            DataSourceId::Id(id) => format!("{DATASOURCES_PATH}/{id}"),
            DataSourceId::Uid(uid) => format!("{DATASOURCES_PATH}/uid/{}", urlencoding::encode(uid)),
        }
    }
}

impl fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceId::Id(id) => write!(f, "id {id}"),
            DataSourceId::Uid(uid) => write!(f, "uid {uid}"),
        }
    }
}

impl From<i64> for DataSourceId {
    fn from(id: i64) -> Self {
        DataSourceId::Id(id)
    }
}

impl From<&str> for DataSourceId {
    fn from(uid: &str) -> Self {
        DataSourceId::Uid(uid.to_string())
    }
}

fn name_path(kind: &str, name: &str) -> String {
    format!("{DATASOURCES_PATH}/{kind}/{}", urlencoding::encode(name))
}

#[derive(Deserialize)]
struct IdResponse {
    id: i64,
}

// ------------------------------------------------------------------ //
//  Operations                                                         //
// ------------------------------------------------------------------ //

impl GrafanaClient {
    /// Create a data source and return the id the platform assigned.
    pub async fn create_data_source(&self, ds: &DataSource) -> Result<i64, ApiError> {
        debug!(name = %ds.name, kind = %ds.kind, "creating data source");
        let created: IdResponse = self.send_json(Method::Post, DATASOURCES_PATH, ds).await?;
        Ok(created.id)
    }

    /// Replace the data source addressed by `target` with `ds`.
    pub async fn update_data_source(
        &self,
        target: &DataSourceId,
        ds: &DataSource,
    ) -> Result<(), ApiError> {
        debug!(%target, name = %ds.name, "updating data source");
        self.call(Method::Put, &target.path(), Some(encode_body(ds)?))
            .await?;
        Ok(())
    }

    pub async fn data_source(&self, target: &DataSourceId) -> Result<DataSource, ApiError> {
        debug!(%target, "fetching data source");
        self.get_json(&target.path()).await
    }

    pub async fn data_source_by_name(&self, name: &str) -> Result<DataSource, ApiError> {
        debug!(name, "fetching data source by name");
        self.get_json(&name_path("name", name)).await
    }

    pub async fn data_source_id_by_name(&self, name: &str) -> Result<i64, ApiError> {
        debug!(name, "resolving data source id");
        let found: IdResponse = self.get_json(&name_path("id", name)).await?;
        Ok(found.id)
    }

    /// Every data source visible to the caller; empty when there are none.
    pub async fn data_sources(&self) -> Result<Vec<DataSource>, ApiError> {
        let list: Option<Vec<DataSource>> = self.get_json(DATASOURCES_PATH).await?;
        let list = list.unwrap_or_default();
        debug!(count = list.len(), "listed data sources");
        Ok(list)
    }

    /// Delete by id or uid. A second delete reports not-found.
    pub async fn delete_data_source(&self, target: &DataSourceId) -> Result<(), ApiError> {
        debug!(%target, "deleting data source");
        self.call(Method::Delete, &target.path(), None).await?;
        Ok(())
    }

    pub async fn delete_data_source_by_name(&self, name: &str) -> Result<(), ApiError> {
        debug!(name, "deleting data source by name");
        self.call(Method::Delete, &name_path("name", name), None)
            .await?;
        Ok(())
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
