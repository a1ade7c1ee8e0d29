use crate::config::HealthMonitorConfig;
use crate::event::{codes, WebEvent};
use crate::monitor::HealthMonitor;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_EVENTS: u64 = 10;
const DEFAULT_RUN_MS: u64 = 1_000;

const SAMPLE_CODES: [u32; 5] = [
    codes::APPLICATION_START,
    codes::RUNTIME_ERROR_UNHANDLED_EXCEPTION,
    codes::AUDIT_FORMS_AUTHENTICATION_FAILURE,
    codes::AUDIT_URL_AUTHORIZATION_SUCCESS,
    codes::WEB_EXTENDED_BASE + 1,
];

/// Load a monitor configuration, raise sample events, run for a while, shut
/// down and print the metrics of every buffered provider.
pub fn run() -> Result<()> {
    init_logging();
    let args = Args::parse()?;
    let config = HealthMonitorConfig::load_from_file(&args.config)
        .with_context(|| format!("unable to load {}", args.config.display()))?;
    let monitor = HealthMonitor::from_config(&config)?;

    for index in 0..args.events {
        let code = SAMPLE_CODES[(index % SAMPLE_CODES.len() as u64) as usize];
        let event = WebEvent::new(code, format!("sample event {index}"))
            .with_source("healthmon")
            .with_detail("index", index.to_string());
        let delivered = monitor.raise(event)?;
        info!(code, delivered, "raised sample event");
    }

    thread::sleep(Duration::from_millis(args.run_ms));
    let summary = monitor.shutdown();
    info!(
        notifications = summary.notifications,
        events = summary.events,
        deferred = summary.deferred,
        "drained providers"
    );
    print!("{}", monitor.render_metrics());
    Ok(())
}

/// Installs the global subscriber; `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug)]
struct Args {
    config: PathBuf,
    events: u64,
    run_ms: u64,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut config = None;
        let mut events = DEFAULT_EVENTS;
        let mut run_ms = DEFAULT_RUN_MS;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow!("--config requires a path to a JSON file"))?;
                    config = Some(PathBuf::from(path));
                }
                "--events" => {
                    let raw = args
                        .next()
                        .ok_or_else(|| anyhow!("--events requires a count"))?;
                    events = raw
                        .parse()
                        .with_context(|| format!("invalid --events value '{raw}'"))?;
                }
                "--run-ms" => {
                    let raw = args
                        .next()
                        .ok_or_else(|| anyhow!("--run-ms requires milliseconds"))?;
                    run_ms = raw
                        .parse()
                        .with_context(|| format!("invalid --run-ms value '{raw}'"))?;
                }
                "--help" | "-h" => {
                    println!("usage: healthmon --config <path> [--events N] [--run-ms MS]");
                    std::process::exit(0);
                }
                other => return Err(anyhow!("unknown argument: {other}")),
            }
        }
        Ok(Self {
            config: config.ok_or_else(|| anyhow!("--config is required"))?,
            events,
            run_ms,
        })
    }
}
