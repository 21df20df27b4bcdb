//! Domain trackers: gallery timings, bundle analytics and error correlation.

pub mod bundle;
pub mod error_correlation;
pub mod gallery;

pub use bundle::{
    BundleAnalytics, BundleAnalyzer, LoadingPattern, ResourceEntry, ResourceTimingProvider,
    StaticResourceTimings,
};
pub use error_correlation::{
    analyze_error_correlation, DegradedMetric, ErrorCorrelation, ErrorCorrelationAnalyzer,
    ObservedError,
};
pub use gallery::{GalleryTracker, InteractionType, UserInteraction};
