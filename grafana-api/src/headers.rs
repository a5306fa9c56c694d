//! Custom HTTP header codec.
//!
//! Grafana has no dedicated field for the extra headers a data source sends
//! to its backend. Instead each header is stored as a numbered pair of
//! synthetic keys: `httpHeaderName<N>` in `jsonData` holds the name and
//! `httpHeaderValue<N>` in `secureJsonData` holds the value. Backend plugins
//! read the same keys, so the naming must be reproduced exactly.
//!
//! Secret values never come back from the platform; on read only a presence
//! flag is available. [`decode`] therefore reports a [`SecretPresence`]
//! marker per header name rather than a value.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::datasource::{JsonData, SecureJsonData, SecureJsonFields};
use crate::error::HeaderDecodeError;

pub const HEADER_NAME_PREFIX: &str = "httpHeaderName";
pub const HEADER_VALUE_PREFIX: &str = "httpHeaderValue";

/// `httpHeaderName<index>`
pub fn header_name_key(index: u32) -> String {
    format!("{HEADER_NAME_PREFIX}{index}")
}

/// `httpHeaderValue<index>`
pub fn header_value_key(index: u32) -> String {
    format!("{HEADER_VALUE_PREFIX}{index}")
}

// ------------------------------------------------------------------ //
//  Types                                                              //
// ------------------------------------------------------------------ //

/// Whether the platform reports a stored value for a decoded header.
///
/// This is all that can ever be learned about a header value after it has
/// been written. It is not, and cannot be turned into, the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecretPresence {
    /// No paired `httpHeaderValue<N>` entry was reported.
    Unset,
    Set,
}

impl SecretPresence {
    pub fn is_set(self) -> bool {
        self == SecretPresence::Set
    }
}

impl fmt::Display for SecretPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretPresence::Set => f.write_str("true"),
            SecretPresence::Unset => f.write_str("false"),
        }
    }
}

/// Output of [`decode`]: the configuration maps with every synthetic header
/// key stripped, plus the recovered header names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedHeaders {
    pub json_data: JsonData,
    pub secure_json_fields: SecureJsonFields,
    pub headers: BTreeMap<String, SecretPresence>,
}

impl DecodedHeaders {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.headers.keys().map(String::as_str)
    }
}

// ------------------------------------------------------------------ //
//  Encode                                                             //
// ------------------------------------------------------------------ //

/// Fold `headers` into copies of `plain` and `secret`.
///
/// Each header gets the lowest index `N >= 1` whose `httpHeaderName<N>` and
/// `httpHeaderValue<N>` keys are both free, so keys already present in the
/// inputs are never overwritten. Only the recoverability of the header
/// names is guaranteed, not the index a given header ends up with.
pub fn encode<I, K, V>(plain: &JsonData, secret: &SecureJsonData, headers: I) -> (JsonData, SecureJsonData)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut plain = plain.clone();
    let mut secret = secret.clone();

    let mut index = 1u32;
    for (name, value) in headers {
        while plain.contains_key(&header_name_key(index))
            || secret.contains_key(&header_value_key(index))
        {
            index += 1;
        }
        plain.insert(header_name_key(index), Value::String(name.as_ref().to_owned()));
        secret.insert(header_value_key(index), value.as_ref());
        index += 1;
    }

    (plain, secret)
}

// ------------------------------------------------------------------ //
//  Decode                                                             //
// ------------------------------------------------------------------ //

/// Strip the synthetic header keys from copies of `plain` and `secret` and
/// report the header names they encoded.
///
/// A name key without a paired value key is reported as
/// [`SecretPresence::Unset`]. A non-string value under a name key is a
/// caller bug and yields [`HeaderDecodeError::NonStringHeaderName`].
pub fn decode(
    plain: &JsonData,
    secret: &SecureJsonFields,
) -> Result<DecodedHeaders, HeaderDecodeError> {
    let mut json_data = plain.clone();
    let mut secure_json_fields = secret.clone();
    let mut headers = BTreeMap::new();

    for (key, value) in plain {
        let Some(suffix) = header_name_suffix(key) else {
            continue;
        };
        let name = value
            .as_str()
            .ok_or_else(|| HeaderDecodeError::NonStringHeaderName {
                key: key.clone(),
                found: json_kind(value),
            })?;

        let value_key = format!("{HEADER_VALUE_PREFIX}{suffix}");
        let presence = if secret.is_set(&value_key) {
            SecretPresence::Set
        } else {
            SecretPresence::Unset
        };

        json_data.remove(key);
        secure_json_fields.remove(&value_key);

        // The same name under two indices counts as set if either is.
        let slot = headers.entry(name.to_owned()).or_insert(presence);
        *slot = (*slot).max(presence);
    }

    Ok(DecodedHeaders {
        json_data,
        secure_json_fields,
        headers,
    })
}

/// The decimal suffix of a `httpHeaderName<N>` key, `N >= 1`.
fn header_name_suffix(key: &str) -> Option<&str> {
    let digits = key.strip_prefix(HEADER_NAME_PREFIX)?;
    let well_formed = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && digits.bytes().any(|b| b != b'0');
    well_formed.then_some(digits)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
