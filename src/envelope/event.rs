use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::DecodeError;

/// Business key of the subject instance an event refers to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventKey {
    /// Composite key (`[1, "a"]`).
    Composite(Vec<Value>),
    /// Single opaque key.
    Single(Value),
}

impl EventKey {
    /// Key components in order; a single key yields one component.
    pub fn components(&self) -> &[Value] {
        match self {
            EventKey::Composite(values) => values,
            EventKey::Single(value) => std::slice::from_ref(value),
        }
    }
}

impl From<&str> for EventKey {
    fn from(key: &str) -> Self {
        EventKey::Single(Value::String(key.to_string()))
    }
}

impl From<String> for EventKey {
    fn from(key: String) -> Self {
        EventKey::Single(Value::String(key))
    }
}

impl From<i64> for EventKey {
    fn from(key: i64) -> Self {
        EventKey::Single(Value::from(key))
    }
}

impl From<Vec<Value>> for EventKey {
    fn from(keys: Vec<Value>) -> Self {
        EventKey::Composite(keys)
    }
}

/// One event flowing through the subscriber pipeline.
///
/// `subject`, `action` and `key` form the routing/identity triple. `event_id`
/// is unique per logical emission but repeats across redeliveries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    #[serde(default = "Uuid::new_v4")]
    pub event_id: Uuid,
    pub subject: String,
    pub action: String,
    /// `None` only when the property is absent; an explicit `null` is a present key.
    #[serde(
        default,
        deserialize_with = "present_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<EventKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, rename = "etag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, rename = "userid", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

fn present_key<'de, D>(deserializer: D) -> Result<Option<EventKey>, D::Error>
where
    D: Deserializer<'de>,
{
    EventKey::deserialize(deserializer).map(Some)
}

impl EventEnvelope {
    /// Create a value-less envelope with a fresh id and the current time.
    pub fn new(subject: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            subject: subject.into(),
            action: action.into(),
            key: None,
            tenant_id: None,
            timestamp: Utc::now(),
            correlation_id: None,
            etag: None,
            partition_key: None,
            username: None,
            user_id: None,
            value: None,
        }
    }

    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_key(mut self, key: impl Into<EventKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    /// Set the originating actor.
    pub fn with_user(mut self, username: impl Into<String>, user_id: Option<String>) -> Self {
        self.username = Some(username.into());
        self.user_id = user_id;
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Attach a typed payload, stored as JSON.
    pub fn with_value<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.value = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Attach a raw JSON payload.
    pub fn with_raw_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Whether the envelope carries a payload.
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Materialise the payload as `T`.
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let value = self.value.as_ref().ok_or_else(|| DecodeError::MissingValue {
            event_id: self.event_id.to_string(),
        })?;
        Ok(T::deserialize(value)?)
    }

    /// Serialize to the JSON wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from the JSON wire format.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
