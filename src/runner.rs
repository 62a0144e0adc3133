//! HTTP request execution and load test orchestration.

use crate::capabilities::{self, Layer};
use crate::config::TestConfig;
use crate::metrics::{MetricsCollector, TestResults};
use crate::sampler::ViewportSampler;
use crate::sink::ImageSink;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;

/// Executes load tests with controlled concurrency.
pub struct LoadRunner {
    client: reqwest::Client,
    config: TestConfig,
}

/// Raw outcome of a single HTTP request.
#[derive(Debug)]
pub struct RequestOutcome {
    pub status: u16,
    pub success_status: bool,
    pub content_type: String,
    pub body: bytes::Bytes,
    pub latency_us: u64,
    pub error: Option<String>,
}

/// How a completed request scores against the expected response shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    HttpError(u16),
    WrongContentType(String),
    Transport(String),
}

/// Score an outcome. A request succeeds only with a success status and the
/// exact content type that was asked for.
pub fn judge(outcome: &RequestOutcome, expected_format: &str) -> Verdict {
    if let Some(err) = &outcome.error {
        return Verdict::Transport(err.clone());
    }
    if !outcome.success_status {
        return Verdict::HttpError(outcome.status);
    }
    if outcome.content_type != expected_format {
        return Verdict::WrongContentType(outcome.content_type.clone());
    }
    Verdict::Success
}

impl LoadRunner {
    /// Create a new load runner.
    pub fn new(config: TestConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(config.concurrency as usize)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Run the load test.
    ///
    /// Fetches GetCapabilities once up front; a missing or malformed
    /// capabilities document, or zero usable layers, aborts the session.
    /// Individual GetMap failures are recorded and skipped.
    pub async fn run(&mut self) -> anyhow::Result<TestResults> {
        println!("Fetching capabilities from {}...", self.config.base_url);
        let advertised = capabilities::fetch_layers(&self.client, &self.config.base_url).await?;
        println!("  {} layer(s) advertised", advertised.len());

        let (layers, cumulative) = self.match_layers(&advertised)?;

        // Every matched layer must be renderable at the configured floor,
        // otherwise the exponent ladder is undefined for it.
        let params = self.config.sampler_params();
        for layer in &layers {
            params.max_exponent(layer)?;
        }

        let sink = match &self.config.output_dir {
            Some(dir) => {
                println!("  Saving images to {}", dir.display());
                Some(Arc::new(ImageSink::new(dir)?))
            }
            None => None,
        };

        let total_duration =
            Duration::from_secs(self.config.duration_secs + self.config.warmup_secs);
        let warmup_duration = Duration::from_secs(self.config.warmup_secs);

        println!("Starting load test: {}", self.config.name);
        println!("  Warmup: {}s", self.config.warmup_secs);
        println!("  Test duration: {}s", self.config.duration_secs);
        println!("  Concurrency: {}", self.config.concurrency);
        println!("  Raster: {0}x{0}px, {1}", self.config.raster_size, self.config.image_format);
        if let Some(rps) = self.config.requests_per_second {
            println!("  Rate limit: {:.1} req/s", rps);
        }
        println!();

        // Create progress bar
        let pb = ProgressBar::new(self.config.duration_secs);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}s {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("##-"),
        );

        // Shared state
        let metrics = Arc::new(Mutex::new(MetricsCollector::new()));
        let sampler = Arc::new(Mutex::new(ViewportSampler::new(params, self.config.seed)));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency as usize));
        let layers = Arc::new(layers);

        let start_time = Instant::now();
        let mut warmup_complete = false;

        // Rate limiting setup
        let request_interval = self
            .config
            .requests_per_second
            .map(|rps| Duration::from_secs_f64(1.0 / rps));
        let mut last_request_time = Instant::now();

        // Main request loop
        while start_time.elapsed() < total_duration {
            // Check if warmup is complete
            if !warmup_complete && start_time.elapsed() >= warmup_duration {
                warmup_complete = true;
                pb.set_message("Test phase");
                // Reset metrics after warmup
                let mut m = metrics.lock().await;
                *m = MetricsCollector::new();
            }

            // Rate limiting
            if let Some(interval) = request_interval {
                let time_since_last = last_request_time.elapsed();
                if time_since_last < interval {
                    sleep(interval - time_since_last).await;
                }
                last_request_time = Instant::now();
            }

            // Sample the next viewport
            let request = {
                let mut s = sampler.lock().await;
                let idx = s.pick_weighted(&cumulative);
                s.sample(&layers[idx])
            };
            let request = match request {
                Ok(request) => request,
                Err(e) => {
                    eprintln!("Sampling failed: {}", e);
                    continue;
                }
            };

            let url = request.to_url(&self.config.base_url);
            let label = request.label();
            let format = request.format.clone();

            // Acquire semaphore permit for concurrency control
            let permit = semaphore.clone().acquire_owned().await?;
            let client = self.client.clone();
            let metrics_clone = metrics.clone();
            let sink_clone = sink.clone();
            let in_warmup = !warmup_complete;

            // Spawn request task
            tokio::spawn(async move {
                let outcome = Self::execute_request_static(&client, &url).await;
                let verdict = judge(&outcome, &format);

                // Record metrics (skip during warmup)
                if !in_warmup {
                    {
                        let mut m = metrics_clone.lock().await;
                        match &verdict {
                            Verdict::Success => {
                                m.record_success(outcome.latency_us, outcome.body.len());
                            }
                            Verdict::HttpError(status) => {
                                m.record_failure(&label);
                                eprintln!("Request returned {}: {}", status, url);
                            }
                            Verdict::WrongContentType(ct) => {
                                m.record_failure(&label);
                                eprintln!("Invalid content type '{}': {}", ct, url);
                            }
                            Verdict::Transport(err) => {
                                m.record_failure(&label);
                                eprintln!("Request failed: {} - {}", url, err);
                            }
                        }
                    }

                    // Persist the image only for fully valid responses
                    if verdict == Verdict::Success {
                        if let Some(sink) = &sink_clone {
                            if let Err(e) = sink.save(&label, &format, &outcome.body) {
                                eprintln!("Failed to save {}: {}", label, e);
                            }
                        }
                    }
                }

                drop(permit);
            });

            // Update progress bar (only during test phase)
            if warmup_complete {
                let test_elapsed = (start_time.elapsed() - warmup_duration).as_secs();
                pb.set_position(test_elapsed.min(self.config.duration_secs));
            } else {
                pb.set_message(format!(
                    "Warmup ({}/{}s)",
                    start_time.elapsed().as_secs(),
                    self.config.warmup_secs
                ));
            }

            // Small yield to prevent tight loop
            tokio::task::yield_now().await;
        }

        // Wait for all in-flight requests to complete
        pb.set_message("Waiting for in-flight requests...");
        let _ = semaphore.acquire_many(self.config.concurrency).await;

        pb.finish_with_message("Complete!");
        println!();

        // Generate results
        let m = metrics.lock().await;
        let layer_names = layers.iter().map(|l| l.name.clone()).collect();

        Ok(m.results(self.config.name.clone(), layer_names, self.config.concurrency))
    }

    /// Intersect configured layer names with advertised layers, keeping the
    /// configured weights as a cumulative distribution.
    fn match_layers(&self, advertised: &[Layer]) -> anyhow::Result<(Vec<Layer>, Vec<f64>)> {
        let mut layers = Vec::new();
        let mut weights: Vec<f64> = Vec::new();

        for lc in &self.config.layers {
            match advertised.iter().find(|l| l.name == lc.name) {
                Some(layer) => {
                    layers.push(layer.clone());
                    weights.push(lc.weight);
                }
                None => {
                    eprintln!(
                        "Warning: layer '{}' not advertised by server, skipping",
                        lc.name
                    );
                }
            }
        }

        if layers.is_empty() {
            anyhow::bail!("none of the configured layers are advertised by the server");
        }

        // Normalize weights into a cumulative distribution
        let total: f64 = weights.iter().sum();
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut sum = 0.0;
        for w in &weights {
            sum += w / total;
            cumulative.push(sum);
        }

        Ok((layers, cumulative))
    }

    /// Execute a single HTTP request (static version for use in spawned tasks).
    async fn execute_request_static(client: &reqwest::Client, url: &str) -> RequestOutcome {
        let start = Instant::now();

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let success_status = response.status().is_success();
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();

                match response.bytes().await {
                    Ok(body) => RequestOutcome {
                        status,
                        success_status,
                        content_type,
                        body,
                        latency_us: start.elapsed().as_micros() as u64,
                        error: None,
                    },
                    Err(e) => RequestOutcome {
                        status,
                        success_status,
                        content_type,
                        body: bytes::Bytes::new(),
                        latency_us: start.elapsed().as_micros() as u64,
                        error: Some(e.to_string()),
                    },
                }
            }
            Err(e) => RequestOutcome {
                status: 0,
                success_status: false,
                content_type: String::new(),
                body: bytes::Bytes::new(),
                latency_us: start.elapsed().as_micros() as u64,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: u16, content_type: &str) -> RequestOutcome {
        RequestOutcome {
            status,
            success_status: (200..300).contains(&status),
            content_type: content_type.to_string(),
            body: bytes::Bytes::from_static(b"imagebytes"),
            latency_us: 1000,
            error: None,
        }
    }

    #[test]
    fn test_valid_response_succeeds() {
        let v = judge(&outcome(200, "image/jpeg"), "image/jpeg");
        assert_eq!(v, Verdict::Success);
    }

    #[test]
    fn test_server_error_is_not_a_success() {
        // A 500 must never be scored as success, so the runner never
        // writes its body to disk.
        let v = judge(&outcome(500, "image/jpeg"), "image/jpeg");
        assert_eq!(v, Verdict::HttpError(500));
    }

    #[test]
    fn test_wrong_content_type_fails() {
        // Servers often return an XML service exception with status 200
        let v = judge(
            &outcome(200, "application/vnd.ogc.se_xml"),
            "image/jpeg",
        );
        assert_eq!(
            v,
            Verdict::WrongContentType("application/vnd.ogc.se_xml".to_string())
        );
    }

    #[test]
    fn test_transport_error_wins_over_status() {
        let mut o = outcome(200, "image/jpeg");
        o.error = Some("connection reset".to_string());
        assert_eq!(
            judge(&o, "image/jpeg"),
            Verdict::Transport("connection reset".to_string())
        );
    }
}
