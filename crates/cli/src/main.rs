#![forbid(unsafe_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use kanvas_api::{HttpApi, RuntimeApi};
use kanvas_console::{Session, SessionConfig};
use kanvas_core::columns::{columns_for, format_row, header_for, row_for};
use kanvas_core::{RefreshTrigger, RegistryItem, ResourceKind, SearchResult};
use kanvas_ops::{CommandRecord, Dispatcher, NotificationCenter};
use kanvas_store::Synchronizer;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "kanvasctl", version, about = "Kanvas container console CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Backend base URL (default: http://localhost:5000)
    #[arg(long = "api-url", env = "KANVAS_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch once and list a collection
    Ls {
        /// containers | images | volumes | networks
        kind: ResourceKind,
    },
    /// Poll the backend and print a summary line after every refresh
    Watch,
    /// Search the image registry (ranked: official first, then pulls)
    Search {
        query: String,
    },
    /// Pull <image>:latest
    Pull {
        /// Repository name, e.g. "nginx" or "bitnami/redis"
        image: String,
    },
    /// Create a container from <image>:latest
    Create {
        image: String,
        #[arg(long)]
        name: String,
        /// Port mappings, e.g. "8080:80,3000:3000"
        #[arg(long, default_value = "")]
        ports: String,
    },
}

fn init_tracing() {
    let env = std::env::var("KANVAS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KANVAS_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid KANVAS_METRICS_ADDR; expected host:port");
        }
    }
}

/// One-shot commands have no collections to refresh.
struct LogOnlyRefresh;

impl RefreshTrigger for LogOnlyRefresh {
    fn request_refresh(&self) { info!("refresh requested (one-shot mode, skipped)"); }
}

fn as_search_result(image: &str) -> SearchResult {
    SearchResult::from(RegistryItem { repo_name: image.to_string(), ..Default::default() })
}

fn print_record(output: Output, rec: &CommandRecord) -> Result<()> {
    match output {
        Output::Human => match (&rec.message, rec.is_ok()) {
            (Some(m), true) => println!("{}", m),
            (Some(m), false) => eprintln!("{}", m),
            (None, _) => println!("{:?}", rec.status),
        },
        Output::Json => println!("{}", serde_json::to_string_pretty(rec)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let mut cfg = SessionConfig::from_env();
    if let Some(url) = cli.api_url.clone() {
        cfg.api_url = url;
    }
    let api: Arc<dyn RuntimeApi> = Arc::new(HttpApi::new(cfg.api_url.clone()));

    match cli.command {
        Commands::Ls { kind } => {
            info!(kind = %kind, api = %cfg.api_url, "ls invoked");
            let t0 = Instant::now();
            let sync = Synchronizer::new(api);
            let report = sync.refresh_all().await;
            if let Some((_, e)) = report.failed.iter().find(|(k, _)| *k == kind) {
                error!(kind = %kind, error = %e, "ls failed");
                eprintln!("ls error: {}", e);
                std::process::exit(1);
            }
            let items = sync.entities(kind);
            match cli.output {
                Output::Human => {
                    let cols = columns_for(kind);
                    println!("{}", header_for(kind));
                    for e in &items {
                        println!("{}", format_row(&cols, &row_for(e)));
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&items)?),
            }
            info!(kind = %kind, count = items.len(), took_ms = %t0.elapsed().as_millis(), "ls done");
        }
        Commands::Watch => {
            info!(api = %cfg.api_url, "watch invoked");
            let mut session = Session::start(api, cfg);
            let mut epochs = session.subscribe_epoch();
            loop {
                tokio::select! {
                    changed = epochs.changed() => {
                        if changed.is_err() { break; }
                        let epoch = *epochs.borrow_and_update();
                        let c = session.counts();
                        match cli.output {
                            Output::Human => println!(
                                "#{:<4} containers={} images={} volumes={} networks={}",
                                epoch, c.containers, c.images, c.volumes, c.networks
                            ),
                            Output::Json => println!(
                                "{}",
                                serde_json::json!({
                                    "epoch": epoch,
                                    "containers": c.containers,
                                    "images": c.images,
                                    "volumes": c.volumes,
                                    "networks": c.networks,
                                })
                            ),
                        }
                    }
                    _ = signal::ctrl_c() => {
                        info!("watch: interrupted");
                        break;
                    }
                }
            }
            session.shutdown();
        }
        Commands::Search { query } => {
            info!(query = %query, "search invoked");
            match kanvas_search::fetch_ranked(api.as_ref(), &query).await {
                Ok(results) => match cli.output {
                    Output::Human => {
                        println!("{:<40} {:<8} {:>12} {:>8}  DESCRIPTION", "NAME", "OFFICIAL", "PULLS", "STARS");
                        for r in &results {
                            let desc: String = r.description.chars().take(60).collect();
                            let official = if r.is_official { "yes" } else { "" };
                            println!("{:<40} {:<8} {:>12} {:>8}  {}", r.full_name, official, r.pull_count, r.star_count, desc);
                        }
                    }
                    Output::Json => println!("{}", serde_json::to_string_pretty(&results)?),
                },
                Err(e) => {
                    error!(error = %e, "search failed");
                    eprintln!("search error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Pull { image } => {
            let ops = Dispatcher::new(api, Arc::new(LogOnlyRefresh), NotificationCenter::new(cfg.notification_ttl));
            let rec = ops.pull_image(&as_search_result(&image)).await;
            print_record(cli.output, &rec)?;
            if !rec.is_ok() {
                std::process::exit(1);
            }
        }
        Commands::Create { image, name, ports } => {
            let ops = Dispatcher::new(api, Arc::new(LogOnlyRefresh), NotificationCenter::new(cfg.notification_ttl));
            let rec = ops.create_container(&name, &ports, &as_search_result(&image)).await;
            print_record(cli.output, &rec)?;
            if !rec.is_ok() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
