use crate::core::config::{UpdateDataType, UpdateMethod};
use crate::core::tracking::{PlaybackState, VideoIdentity};
use derive_more::Display;
use serde::{Serialize, Serializer};
use serde_json::Value;
use url::Url;

/// A snapshot of the tracking state which is reported to the collector.
///
/// The snapshot is captured by value, so later state mutations never leak into a pending report.
/// Metadata which hasn't been fetched yet is reported as an empty value.
#[derive(Debug, Display, Clone, PartialEq, Serialize)]
#[display(
    "video {:?}, furthest reached {}, watch time {}",
    video_id,
    furthest_reached,
    total_watch_time
)]
pub struct UpdateReport {
    #[serde(serialize_with = "serialize_or_empty")]
    pub video_id: Option<String>,
    #[serde(serialize_with = "serialize_or_empty")]
    pub video_title: Option<String>,
    pub video_duration: f64,
    pub furthest_reached: f64,
    pub total_watch_time: u64,
    pub view_session_hash: String,
}

impl UpdateReport {
    /// Create a new report from the current tracking state.
    pub fn new(
        identity: &VideoIdentity,
        state: &PlaybackState,
        view_session_hash: impl Into<String>,
    ) -> Self {
        Self {
            video_id: identity.id.clone(),
            video_title: identity.title.clone(),
            video_duration: state.duration,
            furthest_reached: state.furthest_reached,
            total_watch_time: state.total_watch_time,
            view_session_hash: view_session_hash.into(),
        }
    }

    /// Returns the report as key/value parameters.
    /// All six parameters are always present, unknown metadata values are empty.
    pub fn as_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("video_id", self.video_id.clone().unwrap_or_default()),
            ("video_title", self.video_title.clone().unwrap_or_default()),
            ("video_duration", self.video_duration.to_string()),
            ("furthest_reached", self.furthest_reached.to_string()),
            ("total_watch_time", self.total_watch_time.to_string()),
            ("view_session_hash", self.view_session_hash.clone()),
        ]
    }
}

fn serialize_or_empty<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or_default())
}

/// A request to deliver a report to the collector.
#[derive(Debug, Display, Clone, PartialEq)]
#[display("{} {}", method, url)]
pub struct UpdateRequest {
    pub url: Url,
    pub method: UpdateMethod,
    pub data_type: UpdateDataType,
    pub report: UpdateReport,
}

/// The body of a collector response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

/// The response of the collector to an update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl UpdateResponse {
    /// Returns the json body of the response, if the response was parsed as json.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}
