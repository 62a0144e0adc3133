//! Load testing tool for WMS map servers.
//!
//! Simulates users browsing a WMS endpoint: fetches GetCapabilities once per
//! session, then issues randomized GetMap requests against varying
//! sub-regions and resolutions of the advertised layers. Provides:
//! - Randomized viewport/resolution sampling over layer bounding boxes
//! - Load execution with controlled concurrency and optional rate limiting
//! - Latency histograms and per-request-class failure counts
//! - Results in multiple formats (console table, JSON, CSV)

pub mod capabilities;
pub mod config;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod sink;

pub use capabilities::{BoundingBox, Layer};
pub use config::{LayerConfig, TestConfig};
pub use metrics::{MetricsCollector, TestResults};
pub use report::ResultsReport;
pub use runner::LoadRunner;
pub use sampler::{MapRequest, SamplerParams, ViewportSampler};
