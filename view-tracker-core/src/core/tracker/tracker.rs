use crate::core::config::TrackerSettings;
use crate::core::dispatch::{
    self, HttpTransport, UpdateDispatcher, UpdateReport, UpdateResponse, UpdateTarget,
    UpdateTransport,
};
use crate::core::players::{PlayerError, PlayerEvent, VideoPlayer};
use crate::core::tracker::TrackerEvent;
use crate::core::tracking::{PlaybackMonitor, PlaybackPolicy, PlaybackState, VideoIdentity};
use derive_more::Display;
use fx_callback::{Callback, MultiThreadedCallback, Subscriber, Subscription};
use log::{debug, error, info, trace, warn};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::select;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// The interval at which the watch time is increased while the video is playing.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The lifecycle status of a [VideoTracker].
#[derive(Debug, Display, Copy, Clone, PartialEq)]
pub enum TrackerStatus {
    /// Waiting for the player to become ready.
    #[display("initializing")]
    Initializing,
    /// Attached to the player and tracking its events.
    #[display("ready")]
    Ready,
    /// The player couldn't be attached, no events will be published.
    #[display("failed")]
    Failed,
    /// The tracker has been closed by the host.
    #[display("closed")]
    Closed,
}

/// Tracks the engagement of a viewer with a single embedded video.
///
/// The tracker attaches itself to the [VideoPlayer] once it's ready, after which it tracks
/// the watch progress, enforces the seek policy and periodically reports the progress to the collector.
/// Each tracker owns its own state, multiple trackers never share any progress.
///
/// Clones of the tracker share the same underlying tracking session.
/// The session keeps running until [VideoTracker::close] is called, or the last clone is dropped.
#[derive(Debug, Clone)]
pub struct VideoTracker {
    inner: Arc<InnerVideoTracker>,
    handle: Arc<TrackerHandle>,
}

impl VideoTracker {
    pub fn builder() -> VideoTrackerBuilder {
        VideoTrackerBuilder::builder()
    }

    fn new(
        player: Arc<dyn VideoPlayer>,
        settings: TrackerSettings,
        transport: Arc<dyn UpdateTransport>,
    ) -> Self {
        let dispatcher = UpdateDispatcher::new(UpdateTarget::from_settings(&settings), transport);
        let cancellation_token = CancellationToken::new();
        let handle = Arc::new(TrackerHandle {
            cancellation_token: cancellation_token.clone(),
        });
        let inner = Arc::new(InnerVideoTracker {
            player,
            monitor: Mutex::new(PlaybackMonitor::new(PlaybackPolicy::from(&settings))),
            identity: Default::default(),
            dispatcher,
            view_session_hash: RwLock::new(settings.view_session_hash().to_string()),
            settings,
            status: Mutex::new(TrackerStatus::Initializing),
            ticker: Default::default(),
            callbacks: MultiThreadedCallback::new(),
            handle: Arc::downgrade(&handle),
            cancellation_token,
        });

        let inner_main = inner.clone();
        tokio::spawn(async move {
            inner_main.start().await;
        });

        Self { inner, handle }
    }

    /// Returns a snapshot of the current watch progress.
    pub async fn state(&self) -> PlaybackState {
        self.inner.monitor.lock().await.snapshot()
    }

    /// Returns the video identity as fetched so far from the player.
    pub async fn identity(&self) -> VideoIdentity {
        self.inner.identity.lock().await.clone()
    }

    /// Returns the lifecycle status of the tracker.
    pub async fn status(&self) -> TrackerStatus {
        *self.inner.status.lock().await
    }

    /// Returns `true` when the tracker has been attached to the player.
    pub async fn is_initialized(&self) -> bool {
        self.status().await == TrackerStatus::Ready
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.inner.settings
    }

    /// Returns `true` when a tracking update is still waiting on the collector response.
    pub fn is_update_in_flight(&self) -> bool {
        self.inner.dispatcher.is_in_flight()
    }

    /// Returns the session token which is sent along with each update.
    pub fn view_session_hash(&self) -> String {
        self.inner.view_session_hash()
    }

    /// Update the session token which is sent along with the next updates.
    /// This is usually the token the collector returned in response to the first update.
    pub fn set_view_session_hash<S: Into<String>>(&self, hash: S) {
        self.inner.set_view_session_hash(hash.into())
    }

    /// Close the tracking session.
    ///
    /// This cancels a pending initialization, stops the watch time ticker and detaches from the player.
    /// An update which is already in-flight is not cancelled and its callback will still be invoked.
    pub fn close(&self) {
        trace!("Closing video tracker {:?}", self);
        self.handle.cancellation_token.cancel();
    }
}

/// The handle shared by all clones of a [VideoTracker].
/// The tracking session is cancelled when the last clone is dropped.
#[derive(Debug)]
struct TrackerHandle {
    cancellation_token: CancellationToken,
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        trace!("Video tracker handle is being dropped");
        self.cancellation_token.cancel();
    }
}

impl Callback<TrackerEvent> for VideoTracker {
    fn subscribe(&self) -> Subscription<TrackerEvent> {
        self.inner.callbacks.subscribe()
    }

    fn subscribe_with(&self, subscriber: Subscriber<TrackerEvent>) {
        self.inner.callbacks.subscribe_with(subscriber)
    }
}

/// Builder for constructing [VideoTracker] instances.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use view_tracker_core::core::config::TrackerSettings;
/// use view_tracker_core::core::players::VideoPlayer;
/// use view_tracker_core::core::tracker::VideoTracker;
///
/// fn track(player: Arc<dyn VideoPlayer>) -> VideoTracker {
///     VideoTracker::builder()
///         .player(player)
///         .settings(TrackerSettings::builder()
///             .allow_seek(false)
///             .update_url("https://example.com/track")
///             .build()
///             .unwrap())
///         .build()
/// }
/// ```
#[derive(Debug, Default)]
pub struct VideoTrackerBuilder {
    player: Option<Arc<dyn VideoPlayer>>,
    settings: Option<TrackerSettings>,
    transport: Option<Arc<dyn UpdateTransport>>,
}

impl VideoTrackerBuilder {
    /// Creates a new `VideoTrackerBuilder`.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the player which should be tracked.
    pub fn player(mut self, player: Arc<dyn VideoPlayer>) -> Self {
        self.player = Some(player);
        self
    }

    /// Sets the settings of the tracking session.
    /// The default settings are used when not set.
    pub fn settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets the transport used to deliver the updates.
    /// The [HttpTransport] is used when not set.
    pub fn transport(mut self, transport: Arc<dyn UpdateTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the `VideoTracker` instance and starts its initialization.
    ///
    /// # Panics
    ///
    /// Panics if the player has not been set, or when called outside a tokio runtime.
    pub fn build(self) -> VideoTracker {
        VideoTracker::new(
            self.player.expect("expected the player to have been set"),
            self.settings.unwrap_or_default(),
            self.transport
                .unwrap_or_else(|| Arc::new(HttpTransport::new())),
        )
    }
}

#[derive(Debug)]
struct InnerVideoTracker {
    player: Arc<dyn VideoPlayer>,
    settings: TrackerSettings,
    monitor: Mutex<PlaybackMonitor>,
    identity: Mutex<VideoIdentity>,
    dispatcher: UpdateDispatcher,
    view_session_hash: RwLock<String>,
    status: Mutex<TrackerStatus>,
    ticker: Mutex<Option<CancellationToken>>,
    callbacks: MultiThreadedCallback<TrackerEvent>,
    handle: Weak<TrackerHandle>,
    cancellation_token: CancellationToken,
}

impl InnerVideoTracker {
    async fn start(self: Arc<Self>) {
        let result = select! {
            _ = self.cancellation_token.cancelled() => None,
            result = self.player.ready() => Some(result),
        };

        match result {
            None => {
                debug!("Video tracker has been closed before the player was ready");
                self.update_status(TrackerStatus::Closed).await;
                return;
            }
            Some(Err(e)) => {
                error!("Failed to initialize the video tracker, {}", e);
                self.update_status(TrackerStatus::Failed).await;
                return;
            }
            Some(Ok(_)) => {}
        }

        self.fetch_metadata();
        let mut player_receiver = self.player.subscribe();
        self.update_status(TrackerStatus::Ready).await;
        info!("Video tracker has been attached to {:?}", self.player);
        self.callbacks.invoke(TrackerEvent::InitEnd);

        loop {
            select! {
                _ = self.cancellation_token.cancelled() => break,
                Some(event) = player_receiver.recv() => self.handle_player_event(&*event).await,
            }
        }

        self.stop_ticker().await;
        self.update_status(TrackerStatus::Closed).await;
        debug!("Video tracker main loop ended");
    }

    async fn handle_player_event(self: &Arc<Self>, event: &PlayerEvent) {
        trace!("Received player event {:?}", event);
        match event {
            PlayerEvent::Play => self.on_play().await,
            PlayerEvent::Pause => self.on_pause().await,
            PlayerEvent::TimeUpdate { seconds, duration } => {
                self.on_time_update(*seconds, *duration).await
            }
        }
    }

    async fn on_play(self: &Arc<Self>) {
        if !self.monitor.lock().await.on_play() {
            return;
        }

        self.start_ticker().await;
        self.callbacks.invoke(TrackerEvent::VideoPlayed);
    }

    async fn on_pause(&self) {
        if !self.monitor.lock().await.on_pause() {
            return;
        }

        self.stop_ticker().await;
        self.callbacks.invoke(TrackerEvent::VideoPaused);
    }

    async fn on_time_update(&self, seconds: f64, duration: f64) {
        let outcome = self.monitor.lock().await.on_time_update(seconds, duration);

        if let Some(target) = outcome.seek_correction {
            debug!("Moving the player back to {} after an unallowed seek", target);
            if let Err(e) = self.player.set_current_time(target).await {
                warn!("Failed to correct the player position, {}", e);
            }
            self.callbacks.invoke(TrackerEvent::UnallowedSeekDetected);
        }

        if outcome.completed {
            info!("Video has been completed");
            self.callbacks.invoke(TrackerEvent::VideoCompleted);
        }
    }

    async fn start_ticker(self: &Arc<Self>) {
        let ticker_token = self.cancellation_token.child_token();
        {
            let mut mutex = self.ticker.lock().await;
            if let Some(previous) = mutex.replace(ticker_token.clone()) {
                previous.cancel();
            }
        }

        trace!("Starting watch time ticker");
        let inner = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            loop {
                select! {
                    biased;
                    _ = ticker_token.cancelled() => break,
                    _ = interval.tick() => inner.tick().await,
                }
            }
            trace!("Watch time ticker stopped");
        });
    }

    async fn stop_ticker(&self) {
        let mut mutex = self.ticker.lock().await;
        if let Some(ticker_token) = mutex.take() {
            ticker_token.cancel();
        }
    }

    async fn tick(self: &Arc<Self>) {
        let state = {
            let mut monitor = self.monitor.lock().await;
            match monitor.on_tick() {
                None => return,
                Some(_) => monitor.snapshot(),
            }
        };
        trace!("Video has been watched for {} seconds", state.total_watch_time);

        self.callbacks.invoke(TrackerEvent::BeforeSendUpdate);
        let report = {
            let identity = self.identity.lock().await;
            UpdateReport::new(&identity, &state, self.view_session_hash())
        };
        let inner = self.clone();
        let outcome = self
            .dispatcher
            .dispatch(report, move |result| inner.handle_dispatch_result(result));
        trace!("Tracking update has been {}", outcome);
        self.callbacks.invoke(TrackerEvent::AfterSendUpdate);
    }

    fn handle_dispatch_result(self: Arc<Self>, result: dispatch::Result<UpdateResponse>) {
        if let Err(e) = result.as_ref() {
            warn!("Failed to deliver the tracking update, {}", e);
        }

        let handle = match self.handle.upgrade() {
            None => {
                debug!("Video tracker has been dropped, ignoring the update result");
                return;
            }
            Some(e) => e,
        };
        let tracker = VideoTracker {
            inner: self,
            handle,
        };
        let settings = &tracker.inner.settings;

        match result {
            Ok(response) => {
                if let Some(callback) = settings.update_success_callback() {
                    callback(&tracker, &response);
                }
            }
            Err(e) => {
                if let Some(callback) = settings.update_error_callback() {
                    callback(&tracker, &e);
                }
            }
        }
    }

    fn fetch_metadata(self: &Arc<Self>) {
        let inner = self.clone();
        tokio::spawn(async move {
            select! {
                _ = inner.cancellation_token.cancelled() => {},
                result = inner.player.video_id() => inner.on_video_id(result).await,
            }
        });

        let inner = self.clone();
        tokio::spawn(async move {
            select! {
                _ = inner.cancellation_token.cancelled() => {},
                result = inner.player.video_title() => inner.on_video_title(result).await,
            }
        });

        let inner = self.clone();
        tokio::spawn(async move {
            select! {
                _ = inner.cancellation_token.cancelled() => {},
                result = inner.player.duration() => inner.on_duration(result).await,
            }
        });
    }

    async fn on_video_id(&self, result: Result<String, PlayerError>) {
        match result {
            Ok(id) => {
                debug!("Fetched video id {}", id);
                self.identity.lock().await.id = Some(id.clone());
                self.callbacks.invoke(TrackerEvent::VideoIdFetched(id));
            }
            Err(e) => warn!("Failed to fetch the video id, {}", e),
        }
    }

    async fn on_video_title(&self, result: Result<String, PlayerError>) {
        match result {
            Ok(title) => {
                debug!("Fetched video title {}", title);
                self.identity.lock().await.title = Some(title.clone());
                self.callbacks.invoke(TrackerEvent::VideoTitleFetched(title));
            }
            Err(e) => warn!("Failed to fetch the video title, {}", e),
        }
    }

    async fn on_duration(&self, result: Result<f64, PlayerError>) {
        match result {
            Ok(duration) => {
                debug!("Fetched video duration {}", duration);
                self.identity.lock().await.duration = Some(duration);
                self.monitor.lock().await.refine_duration(duration);
                self.callbacks
                    .invoke(TrackerEvent::VideoDurationFetched(duration));
            }
            Err(e) => warn!("Failed to fetch the video duration, {}", e),
        }
    }

    async fn update_status(&self, status: TrackerStatus) {
        let mut mutex = self.status.lock().await;
        if *mutex != status {
            debug!("Video tracker status changed from {} to {}", *mutex, status);
            *mutex = status;
        }
    }

    fn view_session_hash(&self) -> String {
        self.view_session_hash
            .read()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    fn set_view_session_hash(&self, hash: String) {
        match self.view_session_hash.write() {
            Ok(mut mutex) => {
                trace!("Updating view session hash to {}", hash);
                *mutex = hash;
            }
            Err(e) => error!("Failed to update the view session hash, {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::config::TrackerSettingsBuilder;
    use crate::core::dispatch::{
        MockUpdateTransport, ResponseBody, TransportError, UpdateRequest,
    };
    use crate::testing::MockVideoPlayer;
    use crate::{assert_timeout, init_logger, recv_timeout};

    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::sync::Notify;

    const VIDEO_ID: &str = "76979871";
    const VIDEO_TITLE: &str = "The New Vimeo Player";
    const VIDEO_DURATION: f64 = 62.0;
    const UPDATE_URL: &str = "http://localhost:9090/track";

    /// A player which never becomes ready.
    #[derive(Debug)]
    struct UnreadyPlayer {
        callbacks: MultiThreadedCallback<PlayerEvent>,
    }

    impl UnreadyPlayer {
        fn new() -> Self {
            Self {
                callbacks: MultiThreadedCallback::new(),
            }
        }
    }

    #[async_trait]
    impl VideoPlayer for UnreadyPlayer {
        async fn ready(&self) -> Result<(), PlayerError> {
            std::future::pending().await
        }

        async fn video_id(&self) -> Result<String, PlayerError> {
            Err(PlayerError::Metadata("id", "not ready".to_string()))
        }

        async fn video_title(&self) -> Result<String, PlayerError> {
            Err(PlayerError::Metadata("title", "not ready".to_string()))
        }

        async fn duration(&self) -> Result<f64, PlayerError> {
            Err(PlayerError::Metadata("duration", "not ready".to_string()))
        }

        async fn set_current_time(&self, _: f64) -> Result<(), PlayerError> {
            Ok(())
        }
    }

    impl Callback<PlayerEvent> for UnreadyPlayer {
        fn subscribe(&self) -> Subscription<PlayerEvent> {
            self.callbacks.subscribe()
        }

        fn subscribe_with(&self, subscriber: Subscriber<PlayerEvent>) {
            self.callbacks.subscribe_with(subscriber)
        }
    }

    /// A transport which keeps each request pending until it's released.
    #[derive(Debug, Default)]
    struct PendingTransport {
        calls: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl UpdateTransport for PendingTransport {
        async fn send(&self, _: UpdateRequest) -> dispatch::Result<UpdateResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(UpdateResponse {
                status: 200,
                body: ResponseBody::Json(json!({})),
            })
        }
    }

    fn create_player(callbacks: &MultiThreadedCallback<PlayerEvent>) -> MockVideoPlayer {
        let subscription = callbacks.subscribe();
        let mut player = MockVideoPlayer::new();
        player.expect_ready().returning(|| Ok(()));
        player
            .expect_video_id()
            .returning(|| Ok(VIDEO_ID.to_string()));
        player
            .expect_video_title()
            .returning(|| Ok(VIDEO_TITLE.to_string()));
        player.expect_duration().returning(|| Ok(VIDEO_DURATION));
        player
            .expect_subscribe()
            .times(1)
            .return_once(move || subscription);
        player
    }

    fn create_tracker(
        player: MockVideoPlayer,
        settings: TrackerSettingsBuilder,
        transport: Arc<dyn UpdateTransport>,
    ) -> VideoTracker {
        VideoTracker::builder()
            .player(Arc::new(player))
            .settings(settings.build().unwrap())
            .transport(transport)
            .build()
    }

    async fn wait_for_event(receiver: &mut Subscription<TrackerEvent>, expected: TrackerEvent) {
        loop {
            let event = recv_timeout!(
                receiver,
                Duration::from_secs(10),
                "expected to receive a tracker event"
            );
            if *event == expected {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_init_end() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let tracker = create_tracker(
            player,
            TrackerSettings::builder(),
            Arc::new(MockUpdateTransport::new()),
        );
        let mut receiver = tracker.subscribe();

        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;
        assert_eq!(true, tracker.is_initialized().await);

        assert_timeout!(
            Duration::from_millis(500),
            tracker.identity().await.is_complete(),
            "expected the video identity to have been fetched"
        );
        let result = tracker.identity().await;
        assert_eq!(
            VideoIdentity {
                id: Some(VIDEO_ID.to_string()),
                title: Some(VIDEO_TITLE.to_string()),
                duration: Some(VIDEO_DURATION),
            },
            result
        );
        assert_eq!(VIDEO_DURATION, tracker.state().await.duration);
    }

    #[tokio::test]
    async fn test_metadata_events() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let tracker = create_tracker(
            player,
            TrackerSettings::builder(),
            Arc::new(MockUpdateTransport::new()),
        );
        let mut receiver = tracker.subscribe();
        let mut events = Vec::new();

        while events.len() < 3 {
            let event = recv_timeout!(&mut receiver, Duration::from_millis(500));
            match &*event {
                TrackerEvent::VideoIdFetched(_)
                | TrackerEvent::VideoTitleFetched(_)
                | TrackerEvent::VideoDurationFetched(_) => events.push((*event).clone()),
                _ => {}
            }
        }

        assert!(events.contains(&TrackerEvent::VideoIdFetched(VIDEO_ID.to_string())));
        assert!(events.contains(&TrackerEvent::VideoTitleFetched(VIDEO_TITLE.to_string())));
        assert!(events.contains(&TrackerEvent::VideoDurationFetched(VIDEO_DURATION)));
    }

    #[tokio::test]
    async fn test_metadata_fetch_failure() {
        init_logger!();
        let callbacks = MultiThreadedCallback::<PlayerEvent>::new();
        let subscription = callbacks.subscribe();
        let mut player = MockVideoPlayer::new();
        player.expect_ready().returning(|| Ok(()));
        player
            .expect_video_id()
            .returning(|| Err(PlayerError::Metadata("id", "private video".to_string())));
        player
            .expect_video_title()
            .returning(|| Ok(VIDEO_TITLE.to_string()));
        player.expect_duration().returning(|| Ok(VIDEO_DURATION));
        player
            .expect_subscribe()
            .return_once(move || subscription);
        let tracker = create_tracker(
            player,
            TrackerSettings::builder(),
            Arc::new(MockUpdateTransport::new()),
        );

        assert_timeout!(
            Duration::from_millis(500),
            tracker.identity().await.title.is_some() && tracker.identity().await.duration.is_some()
        );
        assert_eq!(None, tracker.identity().await.id);
    }

    #[tokio::test]
    async fn test_init_player_unavailable() {
        init_logger!();
        let mut player = MockVideoPlayer::new();
        player
            .expect_ready()
            .returning(|| Err(PlayerError::Unavailable("no iframe element found".to_string())));
        player.expect_subscribe().times(0);
        player.expect_video_id().times(0);
        let tracker = create_tracker(
            player,
            TrackerSettings::builder(),
            Arc::new(MockUpdateTransport::new()),
        );
        let mut receiver = tracker.subscribe();

        assert_timeout!(
            Duration::from_millis(500),
            tracker.status().await == TrackerStatus::Failed,
            "expected the tracker initialization to have failed"
        );
        assert!(
            receiver.try_recv().is_err(),
            "expected no events to have been published"
        );
    }

    #[tokio::test]
    async fn test_close_before_ready() {
        init_logger!();
        let tracker = VideoTracker::builder()
            .player(Arc::new(UnreadyPlayer::new()))
            .transport(Arc::new(MockUpdateTransport::new()))
            .build();
        let mut receiver = tracker.subscribe();

        tracker.close();

        assert_timeout!(
            Duration::from_millis(500),
            tracker.status().await == TrackerStatus::Closed,
            "expected the tracker to have been closed"
        );
        assert!(
            receiver.try_recv().is_err(),
            "expected no events to have been published"
        );
    }

    #[tokio::test]
    async fn test_unallowed_seek() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let mut player = create_player(&callbacks);
        player
            .expect_set_current_time()
            .withf(|seconds| *seconds == 10.0)
            .times(1)
            .returning(|_| Ok(()));
        let tracker = create_tracker(
            player,
            TrackerSettings::builder().allow_seek(false),
            Arc::new(MockUpdateTransport::new()),
        );
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        for seconds in [2.0, 4.0, 6.0, 8.0, 10.0, 50.0] {
            callbacks.invoke(PlayerEvent::TimeUpdate {
                seconds,
                duration: VIDEO_DURATION,
            });
        }

        wait_for_event(&mut receiver, TrackerEvent::UnallowedSeekDetected).await;
        let result = tracker.state().await;
        assert_eq!(10.0, result.current_time);
        assert_eq!(10.0, result.furthest_reached);
    }

    #[tokio::test]
    async fn test_seek_allowed() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let mut player = create_player(&callbacks);
        player.expect_set_current_time().times(0);
        let tracker = create_tracker(
            player,
            TrackerSettings::builder(),
            Arc::new(MockUpdateTransport::new()),
        );
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        callbacks.invoke(PlayerEvent::TimeUpdate {
            seconds: 50.0,
            duration: VIDEO_DURATION,
        });

        assert_timeout!(
            Duration::from_millis(500),
            tracker.state().await.current_time == 50.0,
            "expected the seek to have been adopted"
        );
        assert_eq!(50.0, tracker.state().await.furthest_reached);
    }

    #[tokio::test]
    async fn test_video_completed() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let tracker = create_tracker(
            player,
            TrackerSettings::builder().completed_at(0.5),
            Arc::new(MockUpdateTransport::new()),
        );
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        callbacks.invoke(PlayerEvent::TimeUpdate {
            seconds: 31.0,
            duration: VIDEO_DURATION,
        });

        wait_for_event(&mut receiver, TrackerEvent::VideoCompleted).await;
        assert_eq!(true, tracker.state().await.video_completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_pause_watch_time() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let mut transport = MockUpdateTransport::new();
        transport.expect_send().times(0);
        let tracker = create_tracker(player, TrackerSettings::builder(), Arc::new(transport));
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        callbacks.invoke(PlayerEvent::Play);
        wait_for_event(&mut receiver, TrackerEvent::VideoPlayed).await;
        wait_for_event(&mut receiver, TrackerEvent::AfterSendUpdate).await;
        wait_for_event(&mut receiver, TrackerEvent::AfterSendUpdate).await;
        assert_eq!(2, tracker.state().await.total_watch_time);

        callbacks.invoke(PlayerEvent::Pause);
        wait_for_event(&mut receiver, TrackerEvent::VideoPaused).await;
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(2, tracker.state().await.total_watch_time);

        callbacks.invoke(PlayerEvent::Play);
        wait_for_event(&mut receiver, TrackerEvent::VideoPlayed).await;
        wait_for_event(&mut receiver, TrackerEvent::AfterSendUpdate).await;
        assert_eq!(3, tracker.state().await.total_watch_time);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_ticker_ignores_due_tick() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let mut transport = MockUpdateTransport::new();
        transport.expect_send().times(0);
        let tracker = create_tracker(player, TrackerSettings::builder(), Arc::new(transport));
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        callbacks.invoke(PlayerEvent::Play);
        wait_for_event(&mut receiver, TrackerEvent::VideoPlayed).await;

        // the tick becomes due while the ticker has already been cancelled
        tracker.inner.stop_ticker().await;
        time::advance(TICK_INTERVAL * 3).await;
        time::sleep(Duration::from_millis(100)).await;

        assert_eq!(0, tracker.state().await.total_watch_time);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_while_playing() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let tracker = create_tracker(
            player,
            TrackerSettings::builder(),
            Arc::new(MockUpdateTransport::new()),
        );
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        callbacks.invoke(PlayerEvent::Play);
        callbacks.invoke(PlayerEvent::Play);
        wait_for_event(&mut receiver, TrackerEvent::VideoPlayed).await;
        time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(3, tracker.state().await.total_watch_time);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_single_flight() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let transport = Arc::new(PendingTransport::default());
        let tracker = create_tracker(
            player,
            TrackerSettings::builder().update_url(UPDATE_URL),
            transport.clone(),
        );
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        callbacks.invoke(PlayerEvent::Play);
        wait_for_event(&mut receiver, TrackerEvent::AfterSendUpdate).await;
        wait_for_event(&mut receiver, TrackerEvent::AfterSendUpdate).await;

        assert_eq!(1, transport.calls.load(Ordering::SeqCst));
        assert_eq!(2, tracker.state().await.total_watch_time);
        assert_eq!(true, tracker.is_update_in_flight());

        transport.release.notify_one();
        wait_for_event(&mut receiver, TrackerEvent::AfterSendUpdate).await;
        assert_timeout!(
            Duration::from_millis(500),
            transport.calls.load(Ordering::SeqCst) == 2,
            "expected the next tick to have been dispatched after the release"
        );
        tracker.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_success_callback() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let (tx_report, mut rx_report) = unbounded_channel();
        let (tx_callback, mut rx_callback) = unbounded_channel();
        let mut transport = MockUpdateTransport::new();
        transport.expect_send().returning(move |request| {
            tx_report.send(request.report).unwrap();
            Ok(UpdateResponse {
                status: 200,
                body: ResponseBody::Json(json!({"view_session_hash": "d41d8cd9"})),
            })
        });
        let settings = TrackerSettings::builder()
            .update_url(UPDATE_URL)
            .view_session_hash("initial")
            .update_success_callback(Box::new(move |tracker, response| {
                if let Some(hash) = response
                    .json()
                    .and_then(|e| e["view_session_hash"].as_str())
                {
                    tracker.set_view_session_hash(hash);
                }
                tx_callback.send(response.status).unwrap();
            }));
        let tracker = create_tracker(player, settings, Arc::new(transport));
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        callbacks.invoke(PlayerEvent::TimeUpdate {
            seconds: 1.5,
            duration: VIDEO_DURATION,
        });
        callbacks.invoke(PlayerEvent::Play);

        let report = recv_timeout!(&mut rx_report, Duration::from_secs(5));
        assert_eq!(Some(VIDEO_ID.to_string()), report.video_id);
        assert_eq!(Some(VIDEO_TITLE.to_string()), report.video_title);
        assert_eq!(1.5, report.furthest_reached);
        assert_eq!(1, report.total_watch_time);
        assert_eq!("initial", report.view_session_hash);

        let status = recv_timeout!(&mut rx_callback, Duration::from_secs(5));
        assert_eq!(200, status);
        assert_eq!("d41d8cd9", tracker.view_session_hash());

        let report = recv_timeout!(&mut rx_report, Duration::from_secs(5));
        assert_eq!("d41d8cd9", report.view_session_hash);
        tracker.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_error_callback() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let (tx, mut rx) = unbounded_channel();
        let mut transport = MockUpdateTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(TransportError::Status(500, "internal error".to_string())));
        let settings = TrackerSettings::builder()
            .update_url(UPDATE_URL)
            .update_error_callback(Box::new(move |_, error| {
                tx.send(error.clone()).unwrap();
            }));
        let tracker = create_tracker(player, settings, Arc::new(transport));
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        callbacks.invoke(PlayerEvent::Play);

        let result = recv_timeout!(&mut rx, Duration::from_secs(5));
        assert_eq!(
            TransportError::Status(500, "internal error".to_string()),
            result
        );
        let result = recv_timeout!(&mut rx, Duration::from_secs(5));
        assert_eq!(
            TransportError::Status(500, "internal error".to_string()),
            result,
            "expected the next tick to have been dispatched after the failure"
        );
        tracker.close();
    }

    #[tokio::test]
    async fn test_independent_trackers() {
        init_logger!();
        let callbacks_first = MultiThreadedCallback::new();
        let callbacks_second = MultiThreadedCallback::new();
        let first = create_tracker(
            create_player(&callbacks_first),
            TrackerSettings::builder(),
            Arc::new(MockUpdateTransport::new()),
        );
        let second = create_tracker(
            create_player(&callbacks_second),
            TrackerSettings::builder(),
            Arc::new(MockUpdateTransport::new()),
        );
        let mut receiver_first = first.subscribe();
        let mut receiver_second = second.subscribe();
        wait_for_event(&mut receiver_first, TrackerEvent::InitEnd).await;
        wait_for_event(&mut receiver_second, TrackerEvent::InitEnd).await;

        callbacks_first.invoke(PlayerEvent::TimeUpdate {
            seconds: 20.0,
            duration: VIDEO_DURATION,
        });

        assert_timeout!(
            Duration::from_millis(500),
            first.state().await.furthest_reached == 20.0
        );
        assert_eq!(0.0, second.state().await.furthest_reached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_session() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let calls = Arc::new(AtomicUsize::new(0));
        let transport_calls = calls.clone();
        let mut transport = MockUpdateTransport::new();
        transport.expect_send().returning(move |_| {
            transport_calls.fetch_add(1, Ordering::SeqCst);
            Ok(UpdateResponse {
                status: 200,
                body: ResponseBody::Json(json!({})),
            })
        });
        let tracker = create_tracker(
            player,
            TrackerSettings::builder().update_url(UPDATE_URL),
            Arc::new(transport),
        );
        let mut receiver = tracker.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        callbacks.invoke(PlayerEvent::Play);
        wait_for_event(&mut receiver, TrackerEvent::AfterSendUpdate).await;
        assert_timeout!(
            Duration::from_millis(500),
            calls.load(Ordering::SeqCst) == 1,
            "expected the first update to have been sent"
        );

        drop(receiver);
        drop(tracker);
        time::sleep(Duration::from_secs(10)).await;

        assert_eq!(
            1,
            calls.load(Ordering::SeqCst),
            "expected no updates after the tracker has been dropped"
        );
    }

    #[tokio::test]
    async fn test_clone_keeps_session() {
        init_logger!();
        let callbacks = MultiThreadedCallback::new();
        let player = create_player(&callbacks);
        let tracker = create_tracker(
            player,
            TrackerSettings::builder(),
            Arc::new(MockUpdateTransport::new()),
        );
        let clone = tracker.clone();
        let mut receiver = clone.subscribe();
        wait_for_event(&mut receiver, TrackerEvent::InitEnd).await;

        drop(tracker);
        callbacks.invoke(PlayerEvent::TimeUpdate {
            seconds: 4.0,
            duration: VIDEO_DURATION,
        });

        assert_timeout!(
            Duration::from_millis(500),
            clone.state().await.current_time == 4.0,
            "expected the clone to keep tracking"
        );
        assert_eq!(true, clone.is_initialized().await);
    }

    #[tokio::test]
    async fn test_view_session_hash() {
        init_logger!();
        let tracker = VideoTracker::builder()
            .player(Arc::new(UnreadyPlayer::new()))
            .settings(
                TrackerSettings::builder()
                    .view_session_hash("abc")
                    .build()
                    .unwrap(),
            )
            .transport(Arc::new(MockUpdateTransport::new()))
            .build();

        assert_eq!("abc", tracker.view_session_hash());

        tracker.set_view_session_hash("def");
        assert_eq!("def", tracker.view_session_hash());
        tracker.close();
    }
}
