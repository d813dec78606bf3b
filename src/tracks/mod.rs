//! The track registry.
//!
//! `TrackRegistry` owns one `TrackAccumulator` per tracked context, routes incoming positions
//! to them, answers single and filtered multi-track queries, and evicts contexts that have gone
//! quiet.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use trackstore_types::position::Position;

use crate::compute::matcher::TrackMatcher;
use crate::compute::query::QueryParams;
use crate::compute::validation::{retain_valid, validate_position};
use crate::config::TracksConfig;
use crate::error::{Result, TrackError};
use crate::source::{PositionUpdate, TrackFetcher};

mod accumulator;

pub use accumulator::{AccumulatorSettings, TrackAccumulator};

/// Tracks keyed by context, in context order.
pub type TrackCollection = BTreeMap<String, Vec<Position>>;

/// Registry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RegistryStats {
    /// Number of tracked contexts
    pub tracks: usize,
    /// Points held across all tracks, historical prefixes included
    pub points: usize,
}

/// Owner of all per-context track state.
///
/// Thread-safe: the map is sharded by `dashmap` and every accumulator guards its own state.
pub struct TrackRegistry {
    tracks: DashMap<String, Arc<TrackAccumulator>>,
    config: TracksConfig,
    settings: AccumulatorSettings,
    fetcher: Option<Arc<dyn TrackFetcher>>,
}

impl TrackRegistry {
    /// Create an empty registry. Fails if the configuration does not validate.
    pub fn new(config: TracksConfig) -> Result<Self> {
        config.validate().map_err(TrackError::InvalidConfig)?;
        log::debug!("track registry configured: {:?}", config);

        Ok(Self {
            tracks: DashMap::new(),
            settings: AccumulatorSettings::from(&config),
            config,
            fetcher: None,
        })
    }

    /// Attach the provider used for initial track fetches.
    ///
    /// It is only consulted when `fetchInitialTrack` is enabled.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn TrackFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn config(&self) -> &TracksConfig {
        &self.config
    }

    /// Whether `context` belongs to a recognized namespace, e.g. `vessels.<id>`.
    pub fn is_tracked_context(&self, context: &str) -> bool {
        match context.split_once('.') {
            Some((namespace, id)) => {
                !id.is_empty() && self.config.namespaces.iter().any(|ns| ns == namespace)
            }
            None => false,
        }
    }

    /// Record a position for `context` observed now.
    pub fn record_position(&self, context: &str, position: Position) {
        self.record_position_at(context, position, SystemTime::now());
    }

    /// Record a position for `context` observed at `at`.
    ///
    /// Unrecognized contexts and invalid positions are ignored. The first position of a new
    /// context creates its accumulator.
    pub fn record_position_at(&self, context: &str, position: Position, at: SystemTime) {
        if !self.is_tracked_context(context) {
            log::trace!("ignoring position for untracked context {}", context);
            return;
        }

        if let Err(e) = validate_position(&position) {
            log::debug!("ignoring position for {}: {}", context, e);
            return;
        }

        self.with_accumulator(context, at, |acc| {
            acc.record_position_at(position, at);
        });
    }

    /// Apply an update from the host's stream as arriving now.
    ///
    /// The update's own timestamp is ignored; liveness and throttling follow arrival time. Use
    /// [`TrackRegistry::record_position_at`] to replay on a recorded clock.
    pub fn apply(&self, update: &PositionUpdate) {
        self.record_position(&update.context, update.value);
    }

    /// Set the historical prefix of `context`, creating its accumulator if needed.
    pub fn initial_track(&self, context: &str, points: Vec<Position>) {
        if !self.is_tracked_context(context) {
            log::trace!("ignoring initial track for untracked context {}", context);
            return;
        }

        let (points, dropped) = retain_valid(points);
        if dropped > 0 {
            log::debug!("dropped {} invalid points from initial track of {}", dropped, context);
        }

        self.with_accumulator(context, SystemTime::now(), |acc| {
            acc.set_initial_segment(points);
        });
    }

    /// The current track of `context`.
    ///
    /// Never creates an accumulator; unknown contexts are `NotFound`.
    pub fn track(&self, context: &str) -> Result<Vec<Position>> {
        self.tracks
            .get(context)
            .map(|acc| acc.snapshot())
            .ok_or_else(|| TrackError::NotFound(context.to_string()))
    }

    /// Every track, unfiltered.
    pub fn all_tracks(&self) -> TrackCollection {
        self.accumulators()
            .into_iter()
            .map(|(context, acc)| (context, acc.snapshot()))
            .collect()
    }

    /// Tracks whose last point passes the filters in `params`.
    ///
    /// A radius filter needs `self_position`; without it the call fails with
    /// `MissingReferencePosition` before any track is inspected.
    pub fn filtered_tracks(
        &self,
        params: &QueryParams,
        self_position: Option<Position>,
    ) -> Result<TrackCollection> {
        let matcher = TrackMatcher::new(params, self_position)?;
        log::debug!("querying {} tracks with {:?}", self.tracks.len(), matcher);

        if matcher == TrackMatcher::All {
            return Ok(self.all_tracks());
        }

        Ok(self
            .accumulators()
            .into_iter()
            .filter_map(|(context, acc)| {
                let track = acc.snapshot();
                matcher.matches(&track).then_some((context, track))
            })
            .collect())
    }

    /// Evict every context idle for at least `max_age`. Returns the evicted contexts.
    pub fn prune(&self, max_age: Duration) -> Vec<String> {
        self.prune_at(max_age, SystemTime::now())
    }

    /// Evict every context whose last input is at least `max_age` before `now`.
    pub fn prune_at(&self, max_age: Duration, now: SystemTime) -> Vec<String> {
        let Some(cutoff) = now.checked_sub(max_age) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        self.tracks.retain(|context, acc| {
            let keep = acc.idle_timestamp() > cutoff;
            if !keep {
                removed.push(context.clone());
            }
            keep
        });

        if !removed.is_empty() {
            log::debug!("pruned idle tracks: {:?}", removed);
        }
        removed
    }

    /// Number of tracked contexts.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn contains(&self, context: &str) -> bool {
        self.tracks.contains_key(context)
    }

    pub fn stats(&self) -> RegistryStats {
        let points = self.tracks.iter().map(|entry| entry.value().len()).sum();
        RegistryStats {
            tracks: self.tracks.len(),
            points,
        }
    }

    /// Handles to every accumulator, collected so no map shard stays locked while tracks are
    /// snapshotted.
    fn accumulators(&self) -> Vec<(String, Arc<TrackAccumulator>)> {
        self.tracks
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Run `f` on the accumulator of `context`, creating it if needed.
    ///
    /// `f` runs while the map shard is locked, so a concurrent prune either removes the entry
    /// before `f` (and a fresh one is created) or sees what `f` wrote.
    fn with_accumulator<R>(
        &self,
        context: &str,
        at: SystemTime,
        f: impl FnOnce(&TrackAccumulator) -> R,
    ) -> R {
        if let Some(existing) = self.tracks.get(context) {
            return f(&existing);
        }

        let (result, created) = match self.tracks.entry(context.to_string()) {
            Entry::Occupied(entry) => (f(entry.get()), None),
            Entry::Vacant(entry) => {
                let accumulator = Arc::new(TrackAccumulator::new(self.settings, at));
                let result = f(&accumulator);
                entry.insert(accumulator.clone());
                (result, Some(accumulator))
            }
        };

        if let Some(accumulator) = created {
            log::debug!("tracking new context {}", context);
            if self.config.fetch_initial_track {
                self.request_initial_track(context, &accumulator);
            }
        }
        result
    }

    /// Spawn the one-time historical fetch for a new accumulator.
    ///
    /// The task holds only a weak handle; a result arriving after eviction is dropped.
    fn request_initial_track(&self, context: &str, accumulator: &Arc<TrackAccumulator>) {
        let Some(fetcher) = &self.fetcher else {
            return;
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!(
                    "initial track for {} not fetched: no async runtime available",
                    context
                );
                return;
            }
        };

        let fetch = fetcher.fetch(context);
        let target = Arc::downgrade(accumulator);
        let context = context.to_string();

        handle.spawn(async move {
            match fetch.await {
                Ok(Some(points)) => {
                    let Some(accumulator) = target.upgrade() else {
                        log::debug!("discarding initial track for evicted context {}", context);
                        return;
                    };
                    let (points, dropped) = retain_valid(points);
                    if dropped > 0 {
                        log::debug!(
                            "dropped {} invalid points from fetched track of {}",
                            dropped,
                            context
                        );
                    }
                    log::debug!("initial track of {} points for {}", points.len(), context);
                    accumulator.set_initial_segment(points);
                }
                Ok(None) => log::debug!("no initial track available for {}", context),
                Err(e) => log::warn!("initial track fetch for {} failed: {}", context, e),
            }
        });
    }
}

impl std::fmt::Debug for TrackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackRegistry")
            .field("tracks", &self.tracks.len())
            .field("config", &self.config)
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;
    use trackstore_types::bounds::GeoBounds;

    fn at(ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_millis(ms)
    }

    fn registry() -> TrackRegistry {
        TrackRegistry::new(
            TracksConfig::default()
                .with_resolution(Duration::from_millis(1000))
                .with_points_to_keep(3),
        )
        .unwrap()
    }

    #[test]
    fn test_unrecognized_namespace_ignored() {
        let reg = registry();
        reg.record_position_at("atons.lighthouse", Position::new(1.0, 1.0), at(0));
        reg.record_position_at("vessels", Position::new(1.0, 1.0), at(0));
        reg.record_position_at("vessels.", Position::new(1.0, 1.0), at(0));
        reg.record_position_at("somevessels.x", Position::new(1.0, 1.0), at(0));
        assert!(reg.is_empty());

        reg.record_position_at("aircraft.a1", Position::new(1.0, 1.0), at(0));
        reg.record_position_at("vessels.v1", Position::new(1.0, 1.0), at(0));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_invalid_position_does_not_create_track() {
        let reg = registry();
        reg.record_position_at("vessels.v1", Position::new(f64::NAN, 1.0), at(0));
        reg.record_position_at("vessels.v1", Position::new(91.0, 1.0), at(0));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_get_track_never_creates() {
        let reg = registry();
        let err = reg.track("vessels.nobody").unwrap_err();
        assert!(matches!(err, TrackError::NotFound(ref c) if c == "vessels.nobody"));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_end_to_end_sampling() {
        let reg = registry();
        for (i, t) in [0u64, 500, 1100, 1600, 2200].into_iter().enumerate() {
            reg.record_position_at("vessels.v1", Position::new(i as f64, 0.0), at(t));
        }
        assert_eq!(
            reg.track("vessels.v1").unwrap(),
            vec![
                Position::new(0.0, 0.0),
                Position::new(2.0, 0.0),
                Position::new(4.0, 0.0)
            ]
        );
    }

    #[test]
    fn test_contexts_are_independent() {
        let reg = registry();
        reg.record_position_at("vessels.a", Position::new(1.0, 1.0), at(0));
        // b's first sample is not throttled by a's window
        reg.record_position_at("vessels.b", Position::new(2.0, 2.0), at(10));
        assert_eq!(reg.track("vessels.a").unwrap().len(), 1);
        assert_eq!(reg.track("vessels.b").unwrap().len(), 1);
    }

    #[test]
    fn test_prune_boundary() {
        let reg = registry();
        reg.record_position_at("vessels.old", Position::new(1.0, 1.0), at(0));
        reg.record_position_at("vessels.young", Position::new(1.0, 1.0), at(1));

        let max_age = Duration::from_secs(600);
        // "old" idle exactly max_age, "young" one millisecond less
        let removed = reg.prune_at(max_age, at(600_000));
        assert_eq!(removed, vec!["vessels.old".to_string()]);
        assert!(reg.contains("vessels.young"));
        assert!(!reg.contains("vessels.old"));
    }

    #[test]
    fn test_prune_uses_raw_liveness() {
        let reg = TrackRegistry::new(
            TracksConfig::default().with_resolution(Duration::from_secs(3600)),
        )
        .unwrap();
        reg.record_position_at("vessels.chatty", Position::new(1.0, 1.0), at(0));
        // every later input is inside the throttle window
        for t in (60_000..=540_000).step_by(60_000) {
            reg.record_position_at("vessels.chatty", Position::new(1.0, 1.0), at(t));
        }

        let removed = reg.prune_at(Duration::from_secs(600), at(600_000));
        assert!(removed.is_empty());
        assert_eq!(reg.track("vessels.chatty").unwrap().len(), 1);
    }

    #[test]
    fn test_recreated_after_prune() {
        let reg = registry();
        reg.record_position_at("vessels.a", Position::new(1.0, 1.0), at(0));
        reg.prune_at(Duration::from_secs(1), at(5_000));
        assert!(reg.is_empty());

        reg.record_position_at("vessels.a", Position::new(2.0, 2.0), at(5_001));
        assert_eq!(reg.track("vessels.a").unwrap(), vec![Position::new(2.0, 2.0)]);
    }

    #[test]
    fn test_filtered_by_bbox() {
        let reg = registry();
        reg.record_position_at("vessels.in", Position::new(60.0, 25.0), at(0));
        reg.record_position_at("vessels.out", Position::new(40.0, 25.0), at(0));

        let bbox = GeoBounds::from_lon_lat(20.0, 59.0, 30.0, 61.0).unwrap();
        let result = reg.filtered_tracks(&QueryParams::within(bbox), None).unwrap();
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["vessels.in"]);
    }

    #[test]
    fn test_filtered_by_radius() {
        let reg = registry();
        let me = Position::new(60.0, 25.0);
        reg.record_position_at("vessels.near", Position::new(60.01, 25.0), at(0));
        reg.record_position_at("vessels.far", Position::new(61.0, 25.0), at(0));

        let result = reg
            .filtered_tracks(&QueryParams::within_radius(5_000.0), Some(me))
            .unwrap();
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["vessels.near"]);
    }

    #[test]
    fn test_radius_without_self_position_fails() {
        let reg = registry();
        reg.record_position_at("vessels.a", Position::new(60.0, 25.0), at(0));
        let err = reg
            .filtered_tracks(&QueryParams::within_radius(5_000.0), None)
            .unwrap_err();
        assert!(matches!(err, TrackError::MissingReferencePosition));
    }

    #[test]
    fn test_empty_params_return_everything() {
        let reg = registry();
        reg.initial_track("vessels.history_only", vec![]);
        reg.record_position_at("vessels.a", Position::new(60.0, 25.0), at(0));

        let result = reg.filtered_tracks(&QueryParams::all(), None).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result, reg.all_tracks());
    }

    #[test]
    fn test_initial_track_prefixes_live_points() {
        let reg = registry();
        reg.record_position_at("vessels.a", Position::new(3.0, 3.0), at(0));
        reg.initial_track(
            "vessels.a",
            vec![
                Position::new(1.0, 1.0),
                Position::new(f64::NAN, 0.0),
                Position::new(2.0, 2.0),
            ],
        );
        assert_eq!(
            reg.track("vessels.a").unwrap(),
            vec![
                Position::new(1.0, 1.0),
                Position::new(2.0, 2.0),
                Position::new(3.0, 3.0)
            ]
        );

        reg.initial_track("atons.x", vec![Position::new(1.0, 1.0)]);
        assert!(!reg.contains("atons.x"));
    }

    #[test]
    fn test_stats() {
        let reg = registry();
        reg.initial_track("vessels.a", vec![Position::new(1.0, 1.0)]);
        reg.record_position_at("vessels.a", Position::new(2.0, 2.0), at(0));
        reg.record_position_at("vessels.b", Position::new(2.0, 2.0), at(0));
        assert_eq!(reg.stats(), RegistryStats { tracks: 2, points: 3 });
    }

    #[test]
    fn test_custom_namespaces() {
        let reg = TrackRegistry::new(TracksConfig::default().with_namespaces(["sar"])).unwrap();
        reg.record_position_at("sar.heli1", Position::new(1.0, 1.0), at(0));
        reg.record_position_at("vessels.v1", Position::new(1.0, 1.0), at(0));
        assert!(reg.contains("sar.heli1"));
        assert!(!reg.contains("vessels.v1"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = TrackRegistry::new(TracksConfig {
            points_to_keep: 0,
            ..TracksConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, TrackError::InvalidConfig(_)));
    }
}
