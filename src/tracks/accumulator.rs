//! Per-context track accumulation.
//!
//! A `TrackAccumulator` turns a raw, possibly high-frequency position stream for one context
//! into a bounded, time-sampled track:
//! - leading-edge throttling: the first position of each `resolution` window is kept, later
//!   positions in the same window are dropped
//! - a fixed-capacity FIFO of accepted samples, oldest evicted first
//! - an optional historical prefix set once from an external fetch
//!
//! Every raw input refreshes the liveness timestamp, accepted or not, so a context that keeps
//! reporting is never considered idle.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};
use trackstore_types::position::Position;

use crate::config::TracksConfig;

/// Sampling parameters of a single accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorSettings {
    /// Minimum time between accepted samples
    pub resolution: Duration,
    /// Maximum number of live samples retained
    pub capacity: usize,
}

impl From<&TracksConfig> for AccumulatorSettings {
    fn from(config: &TracksConfig) -> Self {
        Self {
            resolution: config.resolution(),
            capacity: config.points_to_keep,
        }
    }
}

/// Throttled, bounded position history for one context.
///
/// All state sits behind a single mutex so a snapshot never observes a half-applied append or
/// eviction.
#[derive(Debug)]
pub struct TrackAccumulator {
    settings: AccumulatorSettings,
    state: Mutex<AccumulatorState>,
}

#[derive(Debug)]
struct AccumulatorState {
    initial: Vec<Position>,
    live: VecDeque<Position>,
    last_accepted: Option<SystemTime>,
    last_seen: SystemTime,
}

impl TrackAccumulator {
    /// Create an empty accumulator. `created_at` seeds the liveness timestamp.
    pub fn new(settings: AccumulatorSettings, created_at: SystemTime) -> Self {
        Self {
            settings,
            state: Mutex::new(AccumulatorState {
                initial: Vec::new(),
                live: VecDeque::with_capacity(settings.capacity.min(1024)),
                last_accepted: None,
                last_seen: created_at,
            }),
        }
    }

    pub fn settings(&self) -> AccumulatorSettings {
        self.settings
    }

    /// Record a raw position observed now. Returns true if it was kept as a sample.
    pub fn record_position(&self, position: Position) -> bool {
        self.record_position_at(position, SystemTime::now())
    }

    /// Record a raw position observed at `at`.
    ///
    /// Returns true if the position was accepted into the live buffer, false if it fell inside
    /// the throttle window of the previous accepted sample.
    pub fn record_position_at(&self, position: Position, at: SystemTime) -> bool {
        let mut state = self.state.lock();

        // liveness never moves backwards on out-of-order timestamps
        if at > state.last_seen {
            state.last_seen = at;
        }

        if let Some(last) = state.last_accepted {
            let elapsed = at.duration_since(last).unwrap_or(Duration::ZERO);
            if elapsed < self.settings.resolution {
                return false;
            }
        }

        state.live.push_back(position);
        state.last_accepted = Some(at);

        while state.live.len() > self.settings.capacity {
            state.live.pop_front();
        }

        true
    }

    /// Replace the historical prefix. The live buffer is untouched.
    pub fn set_initial_segment(&self, points: Vec<Position>) {
        self.state.lock().initial = points;
    }

    /// The current track: historical prefix followed by live samples, oldest first.
    pub fn snapshot(&self) -> Vec<Position> {
        let state = self.state.lock();
        let mut track = Vec::with_capacity(state.initial.len() + state.live.len());
        track.extend_from_slice(&state.initial);
        track.extend(state.live.iter().copied());
        track
    }

    /// The most recent point of the track, if any.
    pub fn last_position(&self) -> Option<Position> {
        let state = self.state.lock();
        state.live.back().or_else(|| state.initial.last()).copied()
    }

    /// Time of the most recent raw input.
    pub fn idle_timestamp(&self) -> SystemTime {
        self.state.lock().last_seen
    }

    /// True once at least one sample has been accepted.
    pub fn is_active(&self) -> bool {
        self.state.lock().last_accepted.is_some()
    }

    /// Number of live samples currently retained.
    pub fn live_len(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Total number of points in the track, prefix included.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.initial.len() + state.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn at(ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_millis(ms)
    }

    fn settings(resolution_ms: u64, capacity: usize) -> AccumulatorSettings {
        AccumulatorSettings {
            resolution: Duration::from_millis(resolution_ms),
            capacity,
        }
    }

    fn pos(i: u64) -> Position {
        Position::new(i as f64 * 0.01, 20.0)
    }

    #[test]
    fn test_throttle_end_to_end() {
        let acc = TrackAccumulator::new(settings(1000, 3), at(0));

        let accepted: Vec<bool> = [0, 500, 1100, 1600, 2200]
            .into_iter()
            .map(|t| acc.record_position_at(pos(t), at(t)))
            .collect();

        assert_eq!(accepted, vec![true, false, true, false, true]);
        assert_eq!(acc.snapshot(), vec![pos(0), pos(1100), pos(2200)]);
    }

    #[test]
    fn test_window_measured_from_last_accepted() {
        let acc = TrackAccumulator::new(settings(1000, 10), at(0));
        assert!(acc.record_position_at(pos(0), at(0)));
        // a stream of dropped inputs does not push the window forward
        for t in (100..1000).step_by(100) {
            assert!(!acc.record_position_at(pos(t), at(t)));
        }
        assert!(acc.record_position_at(pos(1000), at(1000)));
        assert_eq!(acc.live_len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let acc = TrackAccumulator::new(settings(0, 3), at(0));
        for t in 0..5 {
            acc.record_position_at(pos(t), at(t));
        }
        assert_eq!(acc.snapshot(), vec![pos(2), pos(3), pos(4)]);
    }

    #[test]
    fn test_liveness_tracks_raw_input() {
        let acc = TrackAccumulator::new(settings(60_000, 10), at(0));
        acc.record_position_at(pos(0), at(0));
        assert!(!acc.record_position_at(pos(1), at(30_000)));

        // dropped by the throttle, yet the context is not idle
        assert_eq!(acc.idle_timestamp(), at(30_000));
        assert_eq!(acc.live_len(), 1);
    }

    #[test]
    fn test_liveness_ignores_out_of_order_timestamps() {
        let acc = TrackAccumulator::new(settings(0, 10), at(0));
        acc.record_position_at(pos(0), at(5000));
        acc.record_position_at(pos(1), at(1000));
        assert_eq!(acc.idle_timestamp(), at(5000));
    }

    #[test]
    fn test_initial_segment_prefixes_live_buffer() {
        let acc = TrackAccumulator::new(settings(0, 2), at(0));
        acc.record_position_at(pos(10), at(10));

        acc.set_initial_segment(vec![pos(1), pos(2)]);
        assert_eq!(acc.snapshot(), vec![pos(1), pos(2), pos(10)]);

        // a later call replaces the prefix, never the live samples
        acc.set_initial_segment(vec![pos(3)]);
        assert_eq!(acc.snapshot(), vec![pos(3), pos(10)]);

        // the prefix does not count against capacity
        acc.record_position_at(pos(11), at(11));
        acc.record_position_at(pos(12), at(12));
        assert_eq!(acc.snapshot(), vec![pos(3), pos(11), pos(12)]);
    }

    #[test]
    fn test_snapshot_is_stable() {
        let acc = TrackAccumulator::new(settings(0, 5), at(0));
        acc.set_initial_segment(vec![pos(1)]);
        acc.record_position_at(pos(2), at(2));

        let first = acc.snapshot();
        let second = acc.snapshot();
        assert_eq!(first, second);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn test_idle_state_before_first_sample() {
        let acc = TrackAccumulator::new(settings(1000, 5), at(42));
        assert!(!acc.is_active());
        assert!(acc.is_empty());
        assert_eq!(acc.idle_timestamp(), at(42));
        assert_eq!(acc.last_position(), None);

        acc.record_position_at(pos(1), at(50));
        assert!(acc.is_active());
        assert_eq!(acc.last_position(), Some(pos(1)));
    }

    #[test]
    fn test_last_position_falls_back_to_prefix() {
        let acc = TrackAccumulator::new(settings(1000, 5), at(0));
        acc.set_initial_segment(vec![pos(7), pos(8)]);
        assert_eq!(acc.last_position(), Some(pos(8)));
    }

    #[test]
    fn test_concurrent_appends_respect_capacity() {
        use std::sync::Arc;
        use std::thread;

        let acc = Arc::new(TrackAccumulator::new(settings(0, 16), at(0)));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let acc = acc.clone();
                thread::spawn(move || {
                    for j in 0..200 {
                        acc.record_position_at(pos(i * 1000 + j), at(i * 1000 + j));
                        assert!(acc.live_len() <= 16);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(acc.live_len(), 16);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_buffer_bounded_and_ordered(
                resolution in 0u64..2_000,
                capacity in 1usize..20,
                gaps in proptest::collection::vec(0u64..1_500, 1..200),
            ) {
                let acc = TrackAccumulator::new(settings(resolution, capacity), at(0));
                let mut t = 0;
                let mut accepted = Vec::new();
                for (i, gap) in gaps.iter().enumerate() {
                    t += gap;
                    // encode arrival order in the latitude
                    let p = Position::new(i as f64 * 1e-3, 0.0);
                    if acc.record_position_at(p, at(t)) {
                        accepted.push((p, t));
                    }
                    prop_assert!(acc.live_len() <= capacity);
                }

                // no two accepted samples closer than the resolution
                for pair in accepted.windows(2) {
                    prop_assert!(pair[1].1 - pair[0].1 >= resolution);
                }

                let expected: Vec<Position> = accepted
                    .iter()
                    .skip(accepted.len().saturating_sub(capacity))
                    .map(|(p, _)| *p)
                    .collect();
                prop_assert_eq!(acc.snapshot(), expected);
            }
        }
    }
}
