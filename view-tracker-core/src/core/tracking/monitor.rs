use crate::core::config::TrackerSettings;
use log::{debug, trace};

/// The rules applied by the [PlaybackMonitor] on the reported playback positions.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlaybackPolicy {
    /// The fraction of the duration which marks the video as completed.
    pub completed_at: f64,
    /// Disables the seek-ahead enforcement when `true`.
    pub allow_seek: bool,
    /// Positions at or below this limit are never flagged as unallowed seeks.
    pub initial_seek_limit: f64,
    /// The forward jump past the furthest reached position which is tolerated.
    pub seek_detection_threshold: f64,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self::from(&TrackerSettings::default())
    }
}

impl From<&TrackerSettings> for PlaybackPolicy {
    fn from(value: &TrackerSettings) -> Self {
        Self {
            completed_at: value.completed_at(),
            allow_seek: value.allow_seek(),
            initial_seek_limit: value.initial_seek_limit(),
            seek_detection_threshold: value.seek_detection_threshold(),
        }
    }
}

/// The watch progress of a single tracking session.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlaybackState {
    /// The last adopted playback position in seconds.
    pub current_time: f64,
    /// The furthest position in seconds which has been legitimately reached.
    pub furthest_reached: f64,
    /// The total number of seconds the video has been playing.
    pub total_watch_time: u64,
    /// The best-known duration of the video in seconds.
    pub duration: f64,
    /// Indicates if the completion threshold has been crossed.
    pub video_completed: bool,
    /// Indicates if the watch time ticker is running.
    pub playing: bool,
}

/// The result of processing a time update.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TimeUpdateOutcome {
    /// The position the player should be moved back to after an unallowed seek.
    pub seek_correction: Option<f64>,
    /// Indicates if the video has been completed by this update.
    pub completed: bool,
}

impl TimeUpdateOutcome {
    /// Returns `true` when the update has been rejected by the seek policy.
    pub fn is_unallowed_seek(&self) -> bool {
        self.seek_correction.is_some()
    }
}

/// Converts the raw position reports of a player into watch progress.
///
/// The monitor enforces the no-skip-ahead policy when seeking is not allowed,
/// by rejecting positions which jump too far ahead of the furthest reached position.
#[derive(Debug, Default)]
pub struct PlaybackMonitor {
    policy: PlaybackPolicy,
    state: PlaybackState,
}

impl PlaybackMonitor {
    pub fn new(policy: PlaybackPolicy) -> Self {
        Self {
            policy,
            state: Default::default(),
        }
    }

    pub fn policy(&self) -> &PlaybackPolicy {
        &self.policy
    }

    /// Returns a copy of the current watch progress.
    pub fn snapshot(&self) -> PlaybackState {
        self.state.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    /// Process a playback position reported by the player.
    ///
    /// # Arguments
    ///
    /// * `reported_time` - The reported playback position in seconds.
    /// * `reported_duration` - The duration of the video as known by the player.
    ///
    /// # Returns
    ///
    /// It returns the corrective actions and notifications resulting from the update.
    pub fn on_time_update(&mut self, reported_time: f64, reported_duration: f64) -> TimeUpdateOutcome {
        let mut outcome = TimeUpdateOutcome::default();

        self.refine_duration(reported_duration);

        if !self.policy.allow_seek && self.is_unallowed_seek(reported_time) {
            let target = self.state.furthest_reached.max(self.state.current_time);
            debug!(
                "Unallowed seek to {} detected, furthest reached position is {}",
                reported_time, self.state.furthest_reached
            );
            // the player might never report the corrected position
            self.state.current_time = target;
            outcome.seek_correction = Some(target);
        } else {
            self.state.current_time = reported_time;
        }

        if self.state.current_time > self.state.furthest_reached {
            self.state.furthest_reached = self.state.current_time;
        }

        if !self.state.video_completed
            && self.state.duration > 0.0
            && self.state.current_time >= self.state.duration * self.policy.completed_at
        {
            debug!(
                "Video has been completed at {} of {}",
                self.state.current_time, self.state.duration
            );
            self.state.video_completed = true;
            outcome.completed = true;
        }

        outcome
    }

    /// Apply a more precise duration of the video.
    pub fn refine_duration(&mut self, duration: f64) {
        if duration != self.state.duration {
            trace!(
                "Refining video duration from {} to {}",
                self.state.duration,
                duration
            );
            self.state.duration = duration;
        }
    }

    /// Mark the playback as started.
    ///
    /// # Returns
    ///
    /// It returns `true` when the playback transitioned to playing, else `false` when it was already playing.
    pub fn on_play(&mut self) -> bool {
        if self.state.playing {
            trace!("Playback is already playing, ignoring play");
            return false;
        }

        self.state.playing = true;
        true
    }

    /// Mark the playback as paused.
    ///
    /// # Returns
    ///
    /// It returns `true` when the playback transitioned to paused, else `false` when it was already paused.
    pub fn on_pause(&mut self) -> bool {
        if !self.state.playing {
            trace!("Playback is already paused, ignoring pause");
            return false;
        }

        self.state.playing = false;
        true
    }

    /// Process a single watch time tick.
    ///
    /// # Returns
    ///
    /// It returns the new total watch time, or [None] when the playback isn't playing.
    pub fn on_tick(&mut self) -> Option<u64> {
        if !self.state.playing {
            trace!("Ignoring watch time tick while paused");
            return None;
        }

        self.state.total_watch_time += 1;
        Some(self.state.total_watch_time)
    }

    fn is_unallowed_seek(&self, reported_time: f64) -> bool {
        let delta = reported_time - self.state.furthest_reached;

        delta > self.policy.seek_detection_threshold && reported_time > self.policy.initial_seek_limit
    }
}
