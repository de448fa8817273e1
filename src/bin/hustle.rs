use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use console::style;

use hustle::adapter::{HeadlessBrowser, UserNotifier};
use hustle::{
    AppConfig, CacheStorage, CapabilityAdapter, DiskCacheStorage, HttpNetwork, PageClients,
    Request, ResponseSource, ServiceWorker,
};

fn print_usage() {
    eprintln!("Usage: hustle [OPTIONS] <COMMAND> [ARGS]...");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  install               Fetch the precache list into the current cache generation");
    eprintln!("  activate              Delete stale cache generations");
    eprintln!("  fetch <url>           Serve a request cache-first (body on stdout)");
    eprintln!("  buckets               List cache generations and their entries");
    eprintln!("  alarm <title> <body>  Send an alarm through the capability adapter");
    eprintln!("  permissions           Request notification permission");
    eprintln!("  battery               Check battery optimization exemption");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <PATH>       Config file (default: {})", AppConfig::default_path().display());
    eprintln!("  -h, --help            Show this help");
}

/// Shows adapter messages on stderr.
struct ConsoleNotifier;

#[async_trait]
impl UserNotifier for ConsoleNotifier {
    async fn alert(&self, message: &str) {
        eprintln!("{}", style(message).yellow());
    }
}

fn build_worker(config: &AppConfig) -> hustle::Result<(ServiceWorker, Arc<DiskCacheStorage>)> {
    let storage = Arc::new(DiskCacheStorage::new(config.cache.cache_dir()));
    let worker = ServiceWorker::new(
        &config.cache,
        storage.clone(),
        Arc::new(HttpNetwork::new()?),
        Arc::new(PageClients::new()),
    )?;
    Ok((worker, storage))
}

fn build_adapter(config: &AppConfig) -> CapabilityAdapter {
    CapabilityAdapter::detect(
        Arc::new(HeadlessBrowser),
        None,
        Arc::new(ConsoleNotifier),
        config.adapter.clone(),
    )
}

fn require<'a>(args: &'a [String], index: usize, what: &str) -> &'a str {
    if let Some(arg) = args.get(index) {
        return arg;
    }
    eprintln!("Error: missing {what}");
    print_usage();
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> hustle::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config_path = AppConfig::default_path();
    let mut positional = Vec::new();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "--config" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    eprintln!("Error: --config requires a value");
                    std::process::exit(1);
                }
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    let Some(command) = positional.first() else {
        print_usage();
        std::process::exit(1);
    };
    let config = AppConfig::load_or_default(&config_path)?;

    match command.as_str() {
        "install" => {
            let (worker, _) = build_worker(&config)?;
            let outcome = worker.install().await?;
            println!(
                "{} {} ({} resources)",
                style("Installed").green().bold(),
                worker.generation(),
                outcome.cached
            );
        }
        "activate" => {
            let (worker, _) = build_worker(&config)?;
            let outcome = worker.activate().await?;
            for name in &outcome.deleted {
                println!("{} {name}", style("Deleted").red());
            }
            println!(
                "{} {}",
                style("Activated").green().bold(),
                worker.generation()
            );
        }
        "fetch" => {
            let url = require(&positional, 1, "<url>");
            let (worker, _) = build_worker(&config)?;
            let request = Request::get(worker.resolve(url)?);
            let outcome = worker.handle_fetch(&request).await?;
            let source = match outcome.source {
                ResponseSource::Cache => style("cache").green(),
                ResponseSource::Network => style("network").cyan(),
            };
            eprintln!(
                "{} {} from {source}, {} bytes",
                outcome.response.status,
                outcome.response.status_text,
                outcome.response.body.len()
            );
            std::io::stdout().write_all(&outcome.response.body)?;
        }
        "buckets" => {
            let (worker, storage) = build_worker(&config)?;
            for name in storage.keys().await? {
                let marker = if name == worker.generation() {
                    style("*").green().bold()
                } else {
                    style(" ")
                };
                println!("{marker} {name}");
                for request in storage.requests(&name).await? {
                    println!("    {}", request.url);
                }
            }
        }
        "alarm" => {
            let title = require(&positional, 1, "<title>");
            let body = require(&positional, 2, "<body>");
            let outcome = build_adapter(&config).send_system_alarm(title, body).await;
            println!("{outcome:?}");
        }
        "permissions" => {
            let granted = build_adapter(&config).request_permissions().await;
            println!("granted: {granted}");
        }
        "battery" => {
            let adapter = build_adapter(&config);
            if adapter.check_battery_optimization_exempt().await {
                println!("{}", style("Exempt from battery optimization").green());
            } else {
                adapter.request_battery_optimization_exemption().await;
            }
        }
        other => {
            eprintln!("Error: unknown command '{other}'");
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
