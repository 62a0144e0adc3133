//! Load test CLI for WMS map servers.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wms-bench")]
#[command(about = "Load testing tool for WMS map servers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override concurrency level
        #[arg(short, long)]
        concurrency: Option<u32>,

        /// Override test duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Output format: table (default), json, csv
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Run a quick smoke test against a single layer
    Quick {
        /// Layer to test (e.g., hel:Karttasarja)
        #[arg(short, long)]
        layer: String,

        /// Test duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Base URL
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            concurrency,
            duration,
            output,
        } => {
            println!("Loading scenario: {}", scenario.display());

            // Load and validate configuration
            let mut config = wms_bench::TestConfig::from_file(&scenario)?;

            // Apply overrides
            if let Some(c) = concurrency {
                config.concurrency = c;
            }
            if let Some(d) = duration {
                config.duration_secs = d;
            }

            config.validate()?;

            println!("✓ Configuration loaded successfully");
            println!("  Name: {}", config.name);
            println!("  Description: {}", config.description);
            println!("  Duration: {}s", config.duration_secs);
            println!("  Concurrency: {}", config.concurrency);
            println!("  Layers: {}", config.layers.len());
            println!();

            // Run the load test
            let mut runner = wms_bench::LoadRunner::new(config);
            let results = runner.run().await?;

            // Output results
            match output.as_str() {
                "json" => {
                    println!("{}", wms_bench::ResultsReport::format_json(&results)?);
                }
                "csv" => {
                    println!("{}", wms_bench::ResultsReport::csv_header());
                    println!("{}", wms_bench::ResultsReport::format_csv(&results));
                }
                _ => {
                    println!("{}", wms_bench::ResultsReport::format_table(&results));
                }
            }

            Ok(())
        }
        Commands::Quick { layer, duration, url } => {
            println!("Running quick test:");
            println!("  Layer: {}", layer);
            println!("  Duration: {}s", duration);
            println!("  URL: {}", url);
            println!();

            // Create a simple config
            let config = wms_bench::TestConfig {
                name: "quick".to_string(),
                description: "Quick smoke test".to_string(),
                base_url: url,
                duration_secs: duration,
                concurrency: 5,
                requests_per_second: None,
                warmup_secs: 0,
                seed: None,
                layers: vec![wms_bench::LayerConfig {
                    name: layer.clone(),
                    weight: 1.0,
                }],
                raster_size: 256,
                min_resolution: 0.05,
                image_format: "image/jpeg".to_string(),
                output_dir: None,
            };

            // Run the load test
            let mut runner = wms_bench::LoadRunner::new(config);
            let results = runner.run().await?;

            // Display results as table
            println!("{}", wms_bench::ResultsReport::format_table(&results));

            Ok(())
        }
        Commands::List { dir } => {
            println!("Available scenarios in {}:", dir.display());
            println!();

            // Read directory
            match std::fs::read_dir(&dir) {
                Ok(entries) => {
                    let mut scenarios = Vec::new();

                    for entry in entries.flatten() {
                        let path = entry.path();
                        if path.extension().and_then(|s| s.to_str()) == Some("yaml") {
                            // Try to load the config to get name and description
                            if let Ok(config) = wms_bench::TestConfig::from_file(&path) {
                                scenarios.push((
                                    path.file_name().unwrap().to_string_lossy().to_string(),
                                    config.name,
                                    config.description,
                                ));
                            }
                        }
                    }

                    scenarios.sort_by(|a, b| a.0.cmp(&b.0));

                    if scenarios.is_empty() {
                        println!("No scenario files found");
                    } else {
                        for (filename, name, desc) in scenarios {
                            println!("  {} - {}", filename, name);
                            println!("    {}", desc);
                            println!();
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Error reading directory: {}", e);
                    eprintln!("Make sure the directory exists and is readable");
                }
            }

            Ok(())
        }
    }
}
