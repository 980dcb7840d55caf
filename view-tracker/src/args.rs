use clap::{ArgAction, Parser};
use derive_more::Display;
use log::LevelFilter;
use std::path::PathBuf;
use view_tracker_core::core::config::{
    TrackerSettings, TrackerSettingsBuilder, UpdateDataType, UpdateMethod,
};
use view_tracker_logging::parse_level;

/// The options of the view tracker application.
#[derive(Debug, Clone, Display, Parser)]
#[command(name = "view-tracker", version, about)]
#[display("script: {:?}, update url: {:?}", script, update_url)]
pub struct TrackerArgs {
    /// The playback script which should be replayed.
    pub script: PathBuf,
    /// The collector url to which the tracking updates are sent.
    /// No updates are sent when omitted.
    #[arg(long)]
    pub update_url: Option<String>,
    /// The http method used to send the tracking updates.
    #[arg(long, default_value_t = UpdateMethod::Get)]
    pub update_method: UpdateMethod,
    /// The expected encoding of the collector responses, `json` or `text`.
    #[arg(long, default_value_t = UpdateDataType::Json)]
    pub update_data_type: UpdateDataType,
    /// The fraction of the video duration at which the video is considered completed.
    #[arg(long, default_value_t = 1.0)]
    pub completed_at: f64,
    /// Indicates if the viewer is allowed to seek forward past the furthest reached position.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub allow_seek: bool,
    /// The position in seconds up to which seeking is always allowed.
    #[arg(long, default_value_t = 0.0)]
    pub initial_seek_limit: f64,
    /// The forward jump in seconds which is considered a seek.
    #[arg(long, default_value_t = 2.0)]
    pub seek_detection_threshold: f64,
    /// The initial session token which is sent along with each update.
    #[arg(long, default_value = "")]
    pub session_hash: String,
    /// The root log level of the application.
    #[arg(long, default_value = "info", value_parser = parse_level)]
    pub log_level: LevelFilter,
    /// The file to which the logs should also be written.
    #[arg(long)]
    pub log_path: Option<PathBuf>,
    /// The log4rs yaml config to load, overrides the other logging options.
    #[arg(long)]
    pub log_config: Option<PathBuf>,
}

impl TrackerArgs {
    /// Returns the tracker settings builder for the given options.
    pub fn settings_builder(&self) -> TrackerSettingsBuilder {
        let mut builder = TrackerSettings::builder()
            .completed_at(self.completed_at)
            .allow_seek(self.allow_seek)
            .initial_seek_limit(self.initial_seek_limit)
            .seek_detection_threshold(self.seek_detection_threshold)
            .update_method(self.update_method)
            .update_data_type(self.update_data_type)
            .view_session_hash(self.session_hash.as_str());

        if let Some(url) = self.update_url.as_ref() {
            builder = builder.update_url(url.as_str());
        }

        builder
    }
}
