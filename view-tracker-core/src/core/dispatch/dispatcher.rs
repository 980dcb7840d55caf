use crate::core::config::{TrackerSettings, UpdateDataType, UpdateMethod};
use crate::core::dispatch::{Result, UpdateReport, UpdateRequest, UpdateResponse, UpdateTransport};
use derive_more::Display;
use log::{debug, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// The outcome of a dispatch attempt.
#[derive(Debug, Display, Copy, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// No update url has been configured, nothing has been sent.
    #[display("disabled")]
    Disabled,
    /// A previous update is still pending, the report has been dropped.
    #[display("dropped")]
    Dropped,
    /// The report is being delivered to the collector.
    #[display("dispatched")]
    Dispatched,
}

/// The destination of the tracking updates.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTarget {
    pub url: Url,
    pub method: UpdateMethod,
    pub data_type: UpdateDataType,
}

impl UpdateTarget {
    /// Returns the update target of the given settings, if an update url has been configured.
    pub fn from_settings(settings: &TrackerSettings) -> Option<Self> {
        settings.update_url().map(|url| Self {
            url: url.clone(),
            method: settings.update_method(),
            data_type: settings.update_data_type(),
        })
    }
}

/// Delivers tracking reports to the collector with single-flight semantics.
///
/// At most one report is in transit at any time, reports which are dispatched
/// while a previous one is still pending are dropped and never retried.
#[derive(Debug)]
pub struct UpdateDispatcher {
    target: Option<UpdateTarget>,
    transport: Arc<dyn UpdateTransport>,
    request_in_flight: Arc<AtomicBool>,
}

impl UpdateDispatcher {
    pub fn new(target: Option<UpdateTarget>, transport: Arc<dyn UpdateTransport>) -> Self {
        Self {
            target,
            transport,
            request_in_flight: Default::default(),
        }
    }

    pub fn target(&self) -> Option<&UpdateTarget> {
        self.target.as_ref()
    }

    /// Returns `true` when a report is still waiting on the collector response.
    pub fn is_in_flight(&self) -> bool {
        self.request_in_flight.load(Ordering::SeqCst)
    }

    /// Try to deliver the given report to the collector.
    ///
    /// The `on_complete` function is invoked with the transport result once the collector responded,
    /// after which the dispatcher accepts a new report.
    /// It's never invoked when the report wasn't dispatched.
    ///
    /// # Arguments
    ///
    /// * `report` - The snapshot to deliver.
    /// * `on_complete` - The function invoked with the result of the delivery.
    pub fn dispatch<F>(&self, report: UpdateReport, on_complete: F) -> DispatchOutcome
    where
        F: FnOnce(Result<UpdateResponse>) + Send + 'static,
    {
        let target = match self.target.as_ref() {
            None => {
                trace!("No update url configured, skipping report {}", report);
                return DispatchOutcome::Disabled;
            }
            Some(e) => e,
        };

        if self
            .request_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Video tracking update not sent, waiting on previous request's response");
            return DispatchOutcome::Dropped;
        }

        let request = UpdateRequest {
            url: target.url.clone(),
            method: target.method,
            data_type: target.data_type,
            report,
        };
        let transport = self.transport.clone();
        let slot = InFlightSlot(self.request_in_flight.clone());

        debug!("Dispatching tracking update {}", request.report);
        tokio::spawn(async move {
            // the slot is released when the task ends, even when on_complete panics
            let _slot = slot;
            let result = transport.send(request).await;
            on_complete(result);
        });

        DispatchOutcome::Dispatched
    }
}

/// The claimed in-flight slot of a dispatched update, released when dropped.
#[derive(Debug)]
struct InFlightSlot(Arc<AtomicBool>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
        trace!("Tracking update slot has been released");
    }
}
