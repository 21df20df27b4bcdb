// Bundle analyzer: chunk sizes, duplication, unused prefetches and cache use,
// computed from resource timing entries each time it is asked.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

lazy_static! {
    // `main.3f2a9c1b`, `vendor-4e5f6a7b8c`, `index-B2x_Hk9Q`
    static ref HASHED_STEM: Regex =
        Regex::new(r"^(?P<stem>.+?)[.-](?P<hash>[A-Za-z0-9_]{8,})$").unwrap();
    static ref BUNDLE_EXTENSION: Regex = Regex::new(r"\.(?P<ext>m?js|css)$").unwrap();
}

/// The fields of a `PerformanceResourceTiming` entry the analyzer reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub name: String,
    pub initiator_type: String,
    pub transfer_size: u64,
    pub encoded_body_size: u64,
    pub decoded_body_size: u64,
    pub duration: f64,
}

impl ResourceEntry {
    fn size(&self) -> u64 {
        if self.decoded_body_size > 0 {
            self.decoded_body_size
        } else {
            self.encoded_body_size
        }
    }

    fn is_cache_hit(&self) -> bool {
        self.transfer_size == 0 && self.size() > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingPattern {
    /// Initiator type: `script`, `link`, `css`, ...
    pub pattern: String,
    pub chunk_count: usize,
    pub total_size: u64,
    pub compressed_size: u64,
    pub cache_hit_ratio: f64,
    pub average_duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleAnalytics {
    pub total_size: u64,
    pub compressed_size: u64,
    pub chunk_sizes: BTreeMap<String, u64>,
    pub duplicate_code: u64,
    pub unused_code: u64,
    pub compression_ratio: f64,
    pub loading_patterns: Vec<LoadingPattern>,
}

/// Where resource entries come from
pub trait ResourceTimingProvider {
    fn resource_entries(&self) -> LocalBoxFuture<'static, Result<Vec<ResourceEntry>>>;
}

/// Fixed entry list, for hosts that collect timings themselves
#[derive(Debug, Clone, Default)]
pub struct StaticResourceTimings {
    entries: Vec<ResourceEntry>,
}

impl StaticResourceTimings {
    pub fn new(entries: Vec<ResourceEntry>) -> Self {
        StaticResourceTimings { entries }
    }
}

impl ResourceTimingProvider for StaticResourceTimings {
    fn resource_entries(&self) -> LocalBoxFuture<'static, Result<Vec<ResourceEntry>>> {
        future::ready(Ok(self.entries.clone())).boxed_local()
    }
}

#[cfg(target_arch = "wasm32")]
pub use self::browser::BrowserResourceTimings;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::{ResourceEntry, ResourceTimingProvider};
    use crate::error::{MonitorError, Result};
    use crate::sources::js::{js_number, js_string};
    use futures::future::{self, FutureExt, LocalBoxFuture};

    /// `performance.getEntriesByType("resource")` of the current page
    #[derive(Debug, Default, Clone, Copy)]
    pub struct BrowserResourceTimings;

    fn read_entries() -> Result<Vec<ResourceEntry>> {
        let performance = web_sys::window()
            .and_then(|w| w.performance())
            .ok_or_else(|| MonitorError::environment_unavailable("performance"))?;
        let size = |entry: &wasm_bindgen::JsValue, key: &str| {
            js_number(entry, key).map_or(0, |v| v.max(0.0) as u64)
        };
        Ok(performance
            .get_entries_by_type("resource")
            .iter()
            .map(|entry| ResourceEntry {
                name: js_string(&entry, "name").unwrap_or_default(),
                initiator_type: js_string(&entry, "initiatorType").unwrap_or_default(),
                transfer_size: size(&entry, "transferSize"),
                encoded_body_size: size(&entry, "encodedBodySize"),
                decoded_body_size: size(&entry, "decodedBodySize"),
                duration: js_number(&entry, "duration").unwrap_or(0.0),
            })
            .collect())
    }

    impl ResourceTimingProvider for BrowserResourceTimings {
        fn resource_entries(&self) -> LocalBoxFuture<'static, Result<Vec<ResourceEntry>>> {
            future::ready(read_entries()).boxed_local()
        }
    }
}

/// File stem of a bundle URL, without query, extension or content hash.
/// `None` for anything that is not a script or stylesheet.
pub fn chunk_name(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let ext = BUNDLE_EXTENSION.find(file)?;
    let stem = &file[..ext.start()];
    if stem.is_empty() {
        return None;
    }

    let name = match HASHED_STEM.captures(stem) {
        Some(caps) if caps["hash"].chars().any(|c| c.is_ascii_digit()) => caps["stem"].to_string(),
        _ => stem.to_string(),
    };
    Some(name)
}

fn is_script(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    BUNDLE_EXTENSION
        .captures(path)
        .map_or(false, |caps| caps["ext"].ends_with("js"))
}

#[derive(Default)]
struct PatternTotals {
    chunks: BTreeSet<String>,
    entries: usize,
    total_size: u64,
    compressed_size: u64,
    cache_hits: usize,
    duration: f64,
}

/// Analytics over a set of resource entries; non-bundle resources are ignored.
pub fn compute_bundle_analytics(entries: &[ResourceEntry]) -> BundleAnalytics {
    let mut analytics = BundleAnalytics::default();
    // chunk -> (fetches, any fetch executed as a script)
    let mut fetches: BTreeMap<String, (usize, bool)> = BTreeMap::new();
    let mut patterns: BTreeMap<String, PatternTotals> = BTreeMap::new();
    let mut hinted_only_sizes: BTreeMap<String, u64> = BTreeMap::new();

    for entry in entries {
        let Some(chunk) = chunk_name(&entry.name) else {
            continue;
        };
        let size = entry.size();
        analytics.total_size += size;
        analytics.compressed_size += entry.encoded_body_size;

        let chunk_size = analytics.chunk_sizes.entry(chunk.clone()).or_insert(0);
        *chunk_size = (*chunk_size).max(size);

        let executed = entry.initiator_type != "link";
        let seen = fetches.entry(chunk.clone()).or_insert((0, false));
        seen.0 += 1;
        seen.1 |= executed;
        if seen.0 > 1 {
            analytics.duplicate_code += size;
        }
        if is_script(&entry.name) && !executed {
            hinted_only_sizes.entry(chunk.clone()).or_insert(size);
        }

        let pattern = patterns.entry(entry.initiator_type.clone()).or_default();
        pattern.chunks.insert(chunk);
        pattern.entries += 1;
        pattern.total_size += size;
        pattern.compressed_size += entry.encoded_body_size;
        pattern.cache_hits += entry.is_cache_hit() as usize;
        pattern.duration += entry.duration.max(0.0);
    }

    // Prefetched or preloaded scripts that never ran
    analytics.unused_code = hinted_only_sizes
        .iter()
        .filter(|(chunk, _)| fetches.get(*chunk).map_or(false, |(_, executed)| !executed))
        .map(|(_, size)| *size)
        .sum();

    if analytics.total_size > 0 {
        analytics.compression_ratio = analytics.compressed_size as f64 / analytics.total_size as f64;
    }

    analytics.loading_patterns = patterns
        .into_iter()
        .map(|(pattern, totals)| LoadingPattern {
            pattern,
            chunk_count: totals.chunks.len(),
            total_size: totals.total_size,
            compressed_size: totals.compressed_size,
            cache_hit_ratio: totals.cache_hits as f64 / totals.entries as f64,
            average_duration: totals.duration / totals.entries as f64,
        })
        .collect();

    analytics
}

/// Runs [`compute_bundle_analytics`] over whatever the provider reports.
#[derive(Clone)]
pub struct BundleAnalyzer {
    provider: Rc<dyn ResourceTimingProvider>,
}

impl BundleAnalyzer {
    pub fn new(provider: Rc<dyn ResourceTimingProvider>) -> Self {
        BundleAnalyzer { provider }
    }

    /// Analyzer over the current page's resource timings, or over nothing
    /// outside the browser.
    pub fn for_platform() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            BundleAnalyzer::new(Rc::new(BrowserResourceTimings))
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            BundleAnalyzer::new(Rc::new(StaticResourceTimings::default()))
        }
    }

    /// Never fails: a provider error yields empty analytics.
    pub fn analyze_bundles(&self) -> LocalBoxFuture<'static, BundleAnalytics> {
        let entries = self.provider.resource_entries();
        async move {
            match entries.await {
                Ok(entries) => compute_bundle_analytics(&entries),
                Err(e) => {
                    log::warn!("Bundle analysis failed, reporting empty analytics: {}", e);
                    BundleAnalytics::default()
                }
            }
        }
        .boxed_local()
    }
}
