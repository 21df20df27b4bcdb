// Gallery tracker: domain timings for the artwork gallery, written into the
// shared metrics through the aggregator, plus a bounded user journey log.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::clock::Clock;
use crate::metrics::MetricSample;
use crate::performance_monitor::PerformanceMonitor;
use crate::scheduler::Scheduler;
use crate::throttle::{Throttle, ThrottleCadence};

/// Default journey length
pub const JOURNEY_CAPACITY: usize = 100;

pub const SCROLL_THROTTLE_NAME: &str = "gallery.scroll";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    GalleryLoad,
    ArtworkDetail,
    Search,
    Filter,
    ImageLoad,
    Scroll,
}

/// One journey step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInteraction {
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub element: String,
    pub duration: f64,
    pub timestamp: f64,
    pub context: Value,
}

struct Journey {
    entries: VecDeque<UserInteraction>,
    capacity: usize,
}

impl Journey {
    fn push(&mut self, interaction: UserInteraction) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(interaction);
    }
}

pub struct GalleryTracker {
    monitor: PerformanceMonitor,
    clock: Rc<dyn Clock>,
    journey: Rc<RefCell<Journey>>,
    scroll: Throttle<f64>,
}

fn clamp_duration(what: &str, duration: f64) -> f64 {
    if duration.is_finite() && duration >= 0.0 {
        duration
    } else {
        log::warn!("Clamping invalid {} duration {} to 0", what, duration);
        0.0
    }
}

impl GalleryTracker {
    pub fn new(
        monitor: PerformanceMonitor,
        scheduler: Rc<dyn Scheduler>,
        journey_capacity: usize,
    ) -> Self {
        let clock = monitor.clock();
        let journey = Rc::new(RefCell::new(Journey {
            entries: VecDeque::with_capacity(journey_capacity.max(1)),
            capacity: journey_capacity.max(1),
        }));

        // Scroll frames arrive at display rate; sample at most once a frame and
        // keep the slowest frame of each burst so jank still reaches the budget.
        let scroll_monitor = monitor.clone();
        let scroll_journey = journey.clone();
        let scroll_clock = clock.clone();
        let scroll = Throttle::new(
            SCROLL_THROTTLE_NAME,
            ThrottleCadence::AnimationFrame,
            move |frame_ms: f64| {
                scroll_monitor.record(MetricSample::ScrollFrameTime(frame_ms));
                scroll_journey.borrow_mut().push(UserInteraction {
                    interaction_type: InteractionType::Scroll,
                    element: "gallery-grid".to_string(),
                    duration: frame_ms,
                    timestamp: scroll_clock.now_ms(),
                    context: json!({ "frameDuration": frame_ms }),
                });
            },
            clock.clone(),
            scheduler,
        )
        .coalesce_with(f64::max);

        GalleryTracker {
            monitor,
            clock,
            journey,
            scroll,
        }
    }

    fn log_interaction(
        &self,
        interaction_type: InteractionType,
        element: impl Into<String>,
        duration: f64,
        context: Value,
    ) {
        self.journey.borrow_mut().push(UserInteraction {
            interaction_type,
            element: element.into(),
            duration,
            timestamp: self.clock.now_ms(),
            context,
        });
    }

    /// `artworkListLoadTime = end - start`
    pub fn track_gallery_load(&self, start_ms: f64, end_ms: f64, item_count: usize) {
        let duration = clamp_duration("gallery load", end_ms - start_ms);
        // Journey first so alert listeners already see the step.
        self.log_interaction(
            InteractionType::GalleryLoad,
            "gallery",
            duration,
            json!({ "itemCount": item_count }),
        );
        self.monitor.record(MetricSample::ArtworkListLoadTime(duration));
    }

    pub fn track_artwork_detail(&self, artwork_id: &str, load_time_ms: f64) {
        let duration = clamp_duration("artwork detail", load_time_ms);
        self.log_interaction(
            InteractionType::ArtworkDetail,
            format!("artwork:{}", artwork_id),
            duration,
            json!({ "artworkId": artwork_id }),
        );
        self.monitor.record(MetricSample::ArtworkModalOpenTime(duration));
    }

    pub fn track_search_performance(&self, query: &str, response_time_ms: f64, result_count: usize) {
        let duration = clamp_duration("search", response_time_ms);
        self.log_interaction(
            InteractionType::Search,
            "search",
            duration,
            json!({ "query": query, "resultCount": result_count }),
        );
        self.monitor.record(MetricSample::SearchResponseTime(duration));
    }

    pub fn track_filter_performance(&self, filters: &[String], response_time_ms: f64) {
        let duration = clamp_duration("filter", response_time_ms);
        self.log_interaction(
            InteractionType::Filter,
            "filters",
            duration,
            json!({ "filters": filters }),
        );
        self.monitor.record(MetricSample::FilterResponseTime(duration));
    }

    pub fn track_image_loading(&self, url: &str, load_time_ms: f64, size_bytes: u64) {
        let duration = clamp_duration("image load", load_time_ms);
        self.log_interaction(
            InteractionType::ImageLoad,
            url,
            duration,
            json!({ "sizeBytes": size_bytes }),
        );
        self.monitor.record(MetricSample::ImageLoadingTime(duration));
    }

    /// Throttled to one sample per animation frame; the slowest frame
    /// duration in a burst is recorded on the trailing edge.
    pub fn track_scroll_performance(&self, frame_duration_ms: f64) {
        self.scroll
            .call(clamp_duration("scroll frame", frame_duration_ms));
    }

    /// Oldest first, most recent last
    pub fn user_journey(&self) -> Vec<UserInteraction> {
        self.journey.borrow().entries.iter().cloned().collect()
    }

    pub fn journey_capacity(&self) -> usize {
        self.journey.borrow().capacity
    }

    pub fn clear_journey(&self) {
        self.journey.borrow_mut().entries.clear();
    }

    /// Drop a pending trailing scroll sample.
    pub fn cancel_pending(&self) {
        self.scroll.cancel();
    }
}
