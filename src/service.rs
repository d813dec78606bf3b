//! Runtime wiring around a `TrackRegistry`.
//!
//! `TrackService` is what a host embeds: it runs the periodic prune timer, forwards position
//! streams into the registry, and serves queries with the self position resolved on demand.
//! Shutdown cancels the timer and every subscription through one `CancellationToken`.

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use trackstore_types::position::Position;

use crate::compute::query::QueryParams;
use crate::error::{Result, TrackError};
use crate::source::{PositionUpdate, SelfPositionSource};
use crate::tracks::{TrackCollection, TrackRegistry};

/// A running track service.
pub struct TrackService {
    registry: Arc<TrackRegistry>,
    self_position: Arc<dyn SelfPositionSource>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to a position stream forwarded into the registry.
///
/// Dropping the handle leaves the forwarding task running; call [`Subscription::unsubscribe`]
/// or stop the service to end it.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop forwarding. Updates already applied stay applied.
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    /// True until the stream ends or the subscription is cancelled.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Wait for the forwarding task to finish.
    pub async fn closed(self) {
        if let Err(e) = self.handle.await {
            log::warn!("position subscription task failed: {}", e);
        }
    }
}

impl TrackService {
    pub fn new(registry: Arc<TrackRegistry>, self_position: Arc<dyn SelfPositionSource>) -> Self {
        if registry.config().fetch_initial_track {
            log::info!("initial track fetch enabled");
        }

        Self {
            registry,
            self_position,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<TrackRegistry> {
        &self.registry
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Start the prune timer on the current tokio runtime.
    ///
    /// Contexts idle for `maxAge` are evicted every `maxAge / 2`.
    pub fn start(&self) -> Result<()> {
        self.ensure_running()?;
        let handle = current_runtime()?;

        let config = self.registry.config();
        let period = config.prune_interval();
        let max_age = config.max_age();
        log::info!(
            "starting track pruning every {:?} for tracks idle {:?}",
            period,
            max_age
        );

        let task = handle.spawn(run_pruner(
            self.registry.clone(),
            period,
            max_age,
            self.shutdown.clone(),
        ));
        self.tasks.lock().push(task);
        Ok(())
    }

    /// Forward every update of `stream` into the registry until the stream ends, the returned
    /// subscription is cancelled, or the service stops.
    pub fn subscribe<S>(&self, stream: S) -> Result<Subscription>
    where
        S: Stream<Item = PositionUpdate> + Send + 'static,
    {
        self.ensure_running()?;
        let handle = current_runtime()?;

        let token = self.shutdown.child_token();
        let registry = self.registry.clone();
        let cancelled = token.clone();

        let handle = handle.spawn(async move {
            let mut stream = std::pin::pin!(stream);
            loop {
                tokio::select! {
                    biased;

                    _ = cancelled.cancelled() => {
                        log::debug!("position subscription cancelled");
                        break;
                    }

                    next = stream.next() => match next {
                        Some(update) => registry.apply(&update),
                        None => {
                            log::debug!("position stream ended");
                            break;
                        }
                    }
                }
            }
        });

        Ok(Subscription { token, handle })
    }

    /// Record a single update directly.
    pub fn record(&self, update: &PositionUpdate) -> Result<()> {
        self.ensure_running()?;
        self.registry.apply(update);
        Ok(())
    }

    /// The track of one context.
    pub fn track(&self, context: &str) -> Result<Vec<Position>> {
        self.ensure_running()?;
        self.registry.track(context)
    }

    /// Serve a multi-track query from raw `bbox` / `radius` parameter values.
    ///
    /// The configured `maxRadius` applies when no radius is given. The self position is looked
    /// up only when a radius filter is actually in effect.
    pub fn query(&self, bbox: Option<&str>, radius: Option<&str>) -> Result<TrackCollection> {
        self.ensure_running()?;
        let params = QueryParams::parse(bbox, radius, self.registry.config().default_radius())?;
        self.query_params(&params)
    }

    /// Serve a multi-track query from parsed parameters.
    pub fn query_params(&self, params: &QueryParams) -> Result<TrackCollection> {
        self.ensure_running()?;
        let reference = if params.needs_reference() {
            self.self_position.self_position()
        } else {
            None
        };
        log::debug!("track query {:?}, self position {:?}", params, reference);
        self.registry.filtered_tracks(params, reference)
    }

    /// Stop the prune timer and all subscriptions and wait for them to finish.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("track service task failed: {}", e);
            }
        }
        log::info!("track service stopped");
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(TrackError::ServiceStopped);
        }
        Ok(())
    }
}

impl Drop for TrackService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| TrackError::Runtime(e.to_string()))
}

async fn run_pruner(
    registry: Arc<TrackRegistry>,
    period: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                log::debug!("track pruner shutting down");
                break;
            }

            _ = ticker.tick() => {
                let removed = registry.prune(max_age);
                if !removed.is_empty() {
                    log::info!("pruned {} idle tracks", removed.len());
                }
            }
        }
    }
}
