mod cache;
mod config;
mod event;
mod http;
mod logging;
#[cfg(test)]
mod testing;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use cache::{
  CacheStorage, MemoryStorage, OfflineFallback, OfflineLayer, ResponseSource, SqliteStorage,
};
use event::{EventOutcome, WorkerEvent};
use http::{Destination, HttpNetwork, Request};
use worker::notification::StdoutNotifier;
use worker::{Clients, ServiceWorker, WorkerSettings};

#[derive(Parser, Debug)]
#[command(name = "dashcache")]
#[command(about = "Offline cache layer for the rental-property dashboard")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/dashcache/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Keep caches in memory for this run only
  #[arg(long, global = true)]
  ephemeral: bool,

  /// Pages already open, claimed on activate (repeatable)
  #[arg(long = "client", global = true)]
  clients: Vec<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch a path or URL through the offline layer
  Fetch {
    url: String,
    /// Request destination (document, script, style, image, font, manifest)
    #[arg(short, long)]
    destination: Option<Destination>,
    /// Treat the request as a page load
    #[arg(short, long)]
    navigate: bool,
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,
  },
  /// Pre-cache the application shell
  Install,
  /// Delete obsolete caches and claim open clients
  Activate,
  /// List cache stores and their entries
  Stores,
  /// Raise the push notification
  Push { payload: Option<String> },
  /// Fire a background sync tag
  Sync {
    #[arg(default_value = event::BACKGROUND_SYNC_TAG)]
    tag: String,
  },
  /// Simulate a notification click
  Click,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  let storage: Arc<dyn CacheStorage> = if args.ephemeral {
    Arc::new(MemoryStorage::new())
  } else {
    Arc::new(SqliteStorage::open(config.cache.path.as_deref())?)
  };

  let layer = OfflineLayer::new(
    storage.clone(),
    Arc::new(HttpNetwork::new(&config)?),
    config.store_names(),
    config.selector(),
    OfflineFallback::new(config.resolve(&config.shell)?),
  );

  let clients = Arc::new(Clients::new());
  for client in &args.clients {
    clients.register(config.resolve(client)?)?;
  }

  let worker = ServiceWorker::new(
    layer,
    clients,
    Arc::new(StdoutNotifier),
    WorkerSettings::from_config(&config)?,
  );

  let event = match args.command {
    Command::Stores => return print_stores(storage.as_ref()).await,
    Command::Fetch {
      url,
      destination,
      navigate,
      method,
    } => {
      let url = config.resolve(&url)?;
      let mut request = if navigate {
        Request::navigate(url)
      } else {
        Request::new(&method, url)
      };
      if let Some(destination) = destination {
        request = request.with_destination(destination);
      }
      WorkerEvent::Fetch(request)
    }
    Command::Install => WorkerEvent::Install,
    Command::Activate => WorkerEvent::Activate,
    Command::Push { payload } => WorkerEvent::Push { payload },
    Command::Sync { tag } => WorkerEvent::Sync { tag },
    Command::Click => WorkerEvent::NotificationClick,
  };

  let outcome = worker.dispatch(event).await?;

  // Let background revalidations land before the process exits
  worker.layer().settle().await;

  print_outcome(outcome);
  Ok(())
}

fn print_outcome(outcome: EventOutcome) {
  match outcome {
    EventOutcome::Installed { cached } => println!("installed: {} entries pre-cached", cached),
    EventOutcome::Activated(report) => {
      for name in &report.deleted {
        println!("deleted cache {}", name);
      }
      println!("activated: {} client(s) claimed", report.claimed);
    }
    EventOutcome::Responded(served) => {
      eprintln!(
        "{} {} ({})",
        served.response.status, served.response.status_text, served.source
      );
      match (served.source, served.cached_at) {
        (ResponseSource::Cache, Some(cached_at)) => {
          eprintln!("cached at {}", cached_at.to_rfc3339())
        }
        (ResponseSource::Synthetic, _) => {
          eprintln!("generated offline, nothing usable from network or cache")
        }
        _ => {}
      }
      println!("{}", served.response.text());
    }
    EventOutcome::Synced { handled } => {
      println!("sync {}", if handled { "handled" } else { "ignored" })
    }
    // StdoutNotifier already printed it
    EventOutcome::Notified(_) => {}
    EventOutcome::Navigated { client, url } => println!("client {} -> {}", client, url),
  }
}

async fn print_stores(storage: &dyn CacheStorage) -> Result<()> {
  for name in storage.store_names().await? {
    let entries = storage.entries(&name).await?;
    println!("{} ({} entries)", name, entries.len());
    for entry in entries {
      println!(
        "  {} {} {} {}",
        entry.status,
        entry.method,
        entry.url,
        entry.cached_at.format("%Y-%m-%d %H:%M:%S")
      );
    }
  }
  Ok(())
}
