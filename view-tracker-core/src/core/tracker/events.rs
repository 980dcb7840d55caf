use derive_more::Display;

/// The events published by a [crate::core::tracker::VideoTracker] to the host.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum TrackerEvent {
    /// The player is ready and the tracker has been attached to it.
    #[display("tracker initialized")]
    InitEnd,
    /// The duration of the video has been fetched from the player.
    #[display("video duration fetched {}", _0)]
    VideoDurationFetched(f64),
    /// The title of the video has been fetched from the player.
    #[display("video title fetched {}", _0)]
    VideoTitleFetched(String),
    /// The id of the video has been fetched from the player.
    #[display("video id fetched {}", _0)]
    VideoIdFetched(String),
    #[display("video played")]
    VideoPlayed,
    #[display("video paused")]
    VideoPaused,
    /// The viewer tried to skip ahead while seeking isn't allowed.
    #[display("unallowed seek detected")]
    UnallowedSeekDetected,
    /// The completion threshold of the video has been crossed.
    /// This event is published at most once per tracker.
    #[display("video completed")]
    VideoCompleted,
    #[display("before send update")]
    BeforeSendUpdate,
    #[display("after send update")]
    AfterSendUpdate,
}
