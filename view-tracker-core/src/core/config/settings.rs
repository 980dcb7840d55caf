use crate::core::config::{ConfigError, Result};
use crate::core::dispatch::{TransportError, UpdateResponse};
use crate::core::tracker::VideoTracker;
use derive_more::Display;
use log::trace;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use url::Url;

const DEFAULT_COMPLETED_AT: f64 = 1.0;
const DEFAULT_ALLOW_SEEK: bool = true;
const DEFAULT_INITIAL_SEEK_LIMIT: f64 = 0.0;
const DEFAULT_SEEK_DETECTION_THRESHOLD: f64 = 2.0;

/// The callback which is invoked when an update has been accepted by the collector.
pub type UpdateSuccessCallback = Box<dyn Fn(&VideoTracker, &UpdateResponse) + Send + Sync>;

/// The callback which is invoked when an update could not be delivered to the collector.
pub type UpdateErrorCallback = Box<dyn Fn(&VideoTracker, &TransportError) + Send + Sync>;

/// The http method used to deliver the tracking updates.
#[derive(Debug, Display, Copy, Clone, Default, PartialEq)]
pub enum UpdateMethod {
    #[default]
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
    #[display("PUT")]
    Put,
    #[display("PATCH")]
    Patch,
}

impl FromStr for UpdateMethod {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "patch" => Ok(Self::Patch),
            _ => Err(ConfigError::UnsupportedValue(
                value.to_string(),
                "update method",
            )),
        }
    }
}

/// The expected encoding of the collector responses.
#[derive(Debug, Display, Copy, Clone, Default, PartialEq)]
pub enum UpdateDataType {
    #[default]
    #[display("json")]
    Json,
    #[display("text")]
    Text,
}

impl FromStr for UpdateDataType {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            _ => Err(ConfigError::UnsupportedValue(
                value.to_string(),
                "update data type",
            )),
        }
    }
}

/// The settings of a single tracking session.
/// These settings are immutable for the lifetime of a [VideoTracker].
pub struct TrackerSettings {
    completed_at: f64,
    allow_seek: bool,
    initial_seek_limit: f64,
    seek_detection_threshold: f64,
    update_url: Option<Url>,
    update_method: UpdateMethod,
    update_data_type: UpdateDataType,
    update_success_callback: Option<UpdateSuccessCallback>,
    update_error_callback: Option<UpdateErrorCallback>,
    view_session_hash: String,
}

impl TrackerSettings {
    pub fn builder() -> TrackerSettingsBuilder {
        TrackerSettingsBuilder::builder()
    }

    /// The fraction of the video duration which marks the video as completed.
    pub fn completed_at(&self) -> f64 {
        self.completed_at
    }

    /// Returns `true` when the viewer is allowed to seek ahead of the furthest reached position.
    pub fn allow_seek(&self) -> bool {
        self.allow_seek
    }

    /// The position in seconds below which seeking is never flagged.
    pub fn initial_seek_limit(&self) -> f64 {
        self.initial_seek_limit
    }

    /// The forward jump in seconds which is tolerated past the furthest reached position.
    pub fn seek_detection_threshold(&self) -> f64 {
        self.seek_detection_threshold
    }

    pub fn update_url(&self) -> Option<&Url> {
        self.update_url.as_ref()
    }

    pub fn update_method(&self) -> UpdateMethod {
        self.update_method
    }

    pub fn update_data_type(&self) -> UpdateDataType {
        self.update_data_type
    }

    /// The initial session token which is sent along with each update.
    pub fn view_session_hash(&self) -> &str {
        self.view_session_hash.as_str()
    }

    pub(crate) fn update_success_callback(&self) -> Option<&UpdateSuccessCallback> {
        self.update_success_callback.as_ref()
    }

    pub(crate) fn update_error_callback(&self) -> Option<&UpdateErrorCallback> {
        self.update_error_callback.as_ref()
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            completed_at: DEFAULT_COMPLETED_AT,
            allow_seek: DEFAULT_ALLOW_SEEK,
            initial_seek_limit: DEFAULT_INITIAL_SEEK_LIMIT,
            seek_detection_threshold: DEFAULT_SEEK_DETECTION_THRESHOLD,
            update_url: None,
            update_method: Default::default(),
            update_data_type: Default::default(),
            update_success_callback: None,
            update_error_callback: None,
            view_session_hash: String::new(),
        }
    }
}

impl Debug for TrackerSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerSettings")
            .field("completed_at", &self.completed_at)
            .field("allow_seek", &self.allow_seek)
            .field("initial_seek_limit", &self.initial_seek_limit)
            .field("seek_detection_threshold", &self.seek_detection_threshold)
            .field("update_url", &self.update_url)
            .field("update_method", &self.update_method)
            .field("update_data_type", &self.update_data_type)
            .field(
                "update_success_callback",
                &self.update_success_callback.is_some(),
            )
            .field(
                "update_error_callback",
                &self.update_error_callback.is_some(),
            )
            .field("view_session_hash", &self.view_session_hash)
            .finish()
    }
}

/// Builder for constructing validated [TrackerSettings] instances.
///
/// # Examples
///
/// ```no_run
/// use view_tracker_core::core::config::{TrackerSettings, UpdateMethod};
///
/// let settings = TrackerSettings::builder()
///     .allow_seek(false)
///     .completed_at(0.9)
///     .update_url("https://example.com/track")
///     .update_method(UpdateMethod::Post)
///     .build()
///     .expect("expected valid settings");
/// ```
#[derive(Default)]
pub struct TrackerSettingsBuilder {
    completed_at: Option<f64>,
    allow_seek: Option<bool>,
    initial_seek_limit: Option<f64>,
    seek_detection_threshold: Option<f64>,
    update_url: Option<String>,
    update_method: Option<UpdateMethod>,
    update_data_type: Option<UpdateDataType>,
    update_success_callback: Option<UpdateSuccessCallback>,
    update_error_callback: Option<UpdateErrorCallback>,
    view_session_hash: Option<String>,
}

impl TrackerSettingsBuilder {
    /// Creates a new `TrackerSettingsBuilder`.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the fraction of the duration which marks the video as completed.
    pub fn completed_at(mut self, completed_at: f64) -> Self {
        self.completed_at = Some(completed_at);
        self
    }

    pub fn allow_seek(mut self, allow_seek: bool) -> Self {
        self.allow_seek = Some(allow_seek);
        self
    }

    /// Sets the position in seconds below which seeking is never flagged.
    pub fn initial_seek_limit(mut self, seconds: f64) -> Self {
        self.initial_seek_limit = Some(seconds);
        self
    }

    pub fn seek_detection_threshold(mut self, seconds: f64) -> Self {
        self.seek_detection_threshold = Some(seconds);
        self
    }

    /// Sets the collector url to which the tracking updates are sent.
    /// No updates are sent when the url is never set.
    pub fn update_url<S: Into<String>>(mut self, url: S) -> Self {
        self.update_url = Some(url.into());
        self
    }

    pub fn update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = Some(method);
        self
    }

    pub fn update_data_type(mut self, data_type: UpdateDataType) -> Self {
        self.update_data_type = Some(data_type);
        self
    }

    /// Sets the callback which is invoked for each update accepted by the collector.
    pub fn update_success_callback(mut self, callback: UpdateSuccessCallback) -> Self {
        self.update_success_callback = Some(callback);
        self
    }

    /// Sets the callback which is invoked for each update that failed to be delivered.
    pub fn update_error_callback(mut self, callback: UpdateErrorCallback) -> Self {
        self.update_error_callback = Some(callback);
        self
    }

    pub fn view_session_hash<S: Into<String>>(mut self, hash: S) -> Self {
        self.view_session_hash = Some(hash.into());
        self
    }

    /// Builds the `TrackerSettings` instance.
    ///
    /// It returns a [ConfigError] when one of the given values is out of range.
    pub fn build(self) -> Result<TrackerSettings> {
        let completed_at = self.completed_at.unwrap_or(DEFAULT_COMPLETED_AT);
        if !(0.0..=1.0).contains(&completed_at) {
            return Err(ConfigError::InvalidCompletion(completed_at));
        }

        let initial_seek_limit = self
            .initial_seek_limit
            .unwrap_or(DEFAULT_INITIAL_SEEK_LIMIT);
        if !initial_seek_limit.is_finite() || initial_seek_limit < 0.0 {
            return Err(ConfigError::InvalidSeekLimit(initial_seek_limit));
        }

        let seek_detection_threshold = self
            .seek_detection_threshold
            .unwrap_or(DEFAULT_SEEK_DETECTION_THRESHOLD);
        if !seek_detection_threshold.is_finite() || seek_detection_threshold < 0.0 {
            return Err(ConfigError::InvalidSeekThreshold(seek_detection_threshold));
        }

        let update_url = self
            .update_url
            .map(|url| {
                Url::parse(url.as_str()).map_err(|e| ConfigError::InvalidUrl(url, e.to_string()))
            })
            .transpose()?;

        let settings = TrackerSettings {
            completed_at,
            allow_seek: self.allow_seek.unwrap_or(DEFAULT_ALLOW_SEEK),
            initial_seek_limit,
            seek_detection_threshold,
            update_url,
            update_method: self.update_method.unwrap_or_default(),
            update_data_type: self.update_data_type.unwrap_or_default(),
            update_success_callback: self.update_success_callback,
            update_error_callback: self.update_error_callback,
            view_session_hash: self.view_session_hash.unwrap_or_default(),
        };
        trace!("Created tracker settings {:?}", settings);
        Ok(settings)
    }
}
