// Input latency source: first input delay and interaction to next paint.

use std::collections::{HashMap, VecDeque};

use super::{SampleSink, SampleSource};
use crate::error::Result;

const SOURCE_NAME: &str = "input";

/// Event entries shorter than this are not reported by the browser
pub const EVENT_DURATION_THRESHOLD_MS: f64 = 40.0;

const MAX_TRACKED_INTERACTIONS: usize = 10;

// Events of one interaction arrive together; older ids outside the slowest
// set are forgotten.
const RECENT_INTERACTIONS: usize = 32;

/// Approximates the 98th percentile interaction latency: keep the slowest
/// interactions and skip one for every 50 seen.
#[derive(Debug, Clone, Default)]
pub struct InteractionLatencyTracker {
    // interaction id -> worst event duration, only the slowest few
    longest: Vec<(u64, f64)>,
    durations_by_id: HashMap<u64, f64>,
    recent_ids: VecDeque<u64>,
    interaction_count: usize,
}

impl InteractionLatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event entry. Entries without an interaction id (hover,
    /// scroll) are ignored. Returns the current INP estimate.
    pub fn add(&mut self, interaction_id: u64, duration: f64) -> Option<f64> {
        if interaction_id == 0 || !duration.is_finite() || duration < 0.0 {
            return None;
        }

        // Several events (pointerdown, pointerup, click) share one interaction.
        let worst = match self.durations_by_id.get_mut(&interaction_id) {
            Some(existing) => {
                *existing = existing.max(duration);
                *existing
            }
            None => {
                self.interaction_count += 1;
                self.durations_by_id.insert(interaction_id, duration);
                self.recent_ids.push_back(interaction_id);
                if self.recent_ids.len() > RECENT_INTERACTIONS {
                    self.recent_ids.pop_front();
                }
                duration
            }
        };

        match self.longest.iter_mut().find(|(id, _)| *id == interaction_id) {
            Some(entry) => entry.1 = worst,
            None => self.longest.push((interaction_id, worst)),
        }
        self.longest
            .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        self.longest.truncate(MAX_TRACKED_INTERACTIONS);

        let longest = &self.longest;
        let recent = &self.recent_ids;
        self.durations_by_id
            .retain(|id, _| recent.contains(id) || longest.iter().any(|(slow, _)| slow == id));

        self.inp()
    }

    pub fn inp(&self) -> Option<f64> {
        if self.longest.is_empty() {
            return None;
        }
        let index = (self.interaction_count / 50).min(self.longest.len() - 1);
        Some(self.longest[index].1)
    }

    pub fn interaction_count(&self) -> usize {
        self.interaction_count
    }
}

/// Delay between the first input and its handler starting
pub fn first_input_delay(start_time: f64, processing_start: f64) -> f64 {
    (processing_start - start_time).max(0.0)
}

#[derive(Default)]
pub struct InputLatencySource {
    #[cfg(target_arch = "wasm32")]
    observers: Vec<super::js::ObserverHandle>,
}

impl InputLatencySource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleSource for InputLatencySource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    #[cfg(target_arch = "wasm32")]
    fn attach(&mut self, sink: SampleSink) -> Result<()> {
        use super::js::{js_number, ObserverHandle};
        use crate::metrics::MetricSample;

        let fid_sink = sink.clone();
        let first_input = ObserverHandle::observe(SOURCE_NAME, "first-input", None, move |entry| {
            let delay = first_input_delay(
                js_number(entry, "startTime").unwrap_or(0.0),
                js_number(entry, "processingStart").unwrap_or(0.0),
            );
            fid_sink.push(MetricSample::Fid(delay));
        });

        let mut tracker = InteractionLatencyTracker::new();
        let events = ObserverHandle::observe(
            SOURCE_NAME,
            "event",
            Some(EVENT_DURATION_THRESHOLD_MS),
            move |entry| {
                let id = js_number(entry, "interactionId").unwrap_or(0.0) as u64;
                let duration = js_number(entry, "duration").unwrap_or(0.0);
                if let Some(inp) = tracker.add(id, duration) {
                    sink.push(MetricSample::Inp(inp));
                }
            },
        );

        // Either half is useful alone; only fail when neither can attach.
        match (first_input, events) {
            (Err(e), Err(_)) => Err(e),
            (first_input, events) => {
                self.observers.extend(first_input.ok());
                self.observers.extend(events.ok());
                Ok(())
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn attach(&mut self, _sink: SampleSink) -> Result<()> {
        super::browser_only(SOURCE_NAME)
    }

    fn detach(&mut self) {
        #[cfg(target_arch = "wasm32")]
        self.observers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_of_one_interaction_share_a_slot() {
        let mut tracker = InteractionLatencyTracker::new();
        tracker.add(7, 80.0);
        tracker.add(7, 120.0);
        assert_eq!(tracker.interaction_count(), 1);
        assert_eq!(tracker.inp(), Some(120.0));
    }

    #[test]
    fn test_inp_is_worst_for_few_interactions() {
        let mut tracker = InteractionLatencyTracker::new();
        for (id, duration) in [(1, 64.0), (2, 320.0), (3, 96.0)] {
            tracker.add(id, duration);
        }
        assert_eq!(tracker.inp(), Some(320.0));
    }

    #[test]
    fn test_inp_skips_one_outlier_per_fifty() {
        let mut tracker = InteractionLatencyTracker::new();
        tracker.add(1, 900.0);
        for id in 2..=60 {
            tracker.add(id, 100.0 + id as f64);
        }
        // 60 interactions: the single worst is treated as an outlier
        assert_eq!(tracker.interaction_count(), 60);
        assert_eq!(tracker.inp(), Some(160.0));
    }

    #[test]
    fn test_events_without_interaction_ignored() {
        let mut tracker = InteractionLatencyTracker::new();
        assert_eq!(tracker.add(0, 500.0), None);
        assert_eq!(tracker.inp(), None);
    }

    #[test]
    fn test_interaction_memory_is_bounded() {
        let mut tracker = InteractionLatencyTracker::new();
        for id in 1..=1000 {
            tracker.add(id, 50.0 + (id % 97) as f64);
        }
        assert_eq!(tracker.interaction_count(), 1000);
        assert!(tracker.durations_by_id.len() <= MAX_TRACKED_INTERACTIONS + RECENT_INTERACTIONS);

        // A late event for a recent interaction still merges into its slot.
        let before = tracker.interaction_count();
        tracker.add(1000, 400.0);
        assert_eq!(tracker.interaction_count(), before);
    }

    #[test]
    fn test_first_input_delay_not_negative() {
        assert_eq!(first_input_delay(1000.0, 1012.5), 12.5);
        assert_eq!(first_input_delay(1000.0, 990.0), 0.0);
    }
}
