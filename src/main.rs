use std::sync::Arc;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use pulsefeed::adapters::{FileCredentialStore, SseConnector};
use pulsefeed::config::StreamConfig;
use pulsefeed::credential_watcher::spawn_file_watcher;
use pulsefeed::credentials::SignalBus;
use pulsefeed::feed::{describe, ActivityFeed, RefreshPolicy, RefreshSignal};
use pulsefeed::traits::CredentialStore;
use pulsefeed::{EventBus, LiveStream};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
Usage: pulsefeed [OPTIONS]

Options:
  --set-credential <KEY>  Store the API key and exit
  --clear-credential      Remove the stored API key and exit
  --version               Print version and exit

Environment:
  PULSEFEED_STREAM_URL, PULSEFEED_CREDENTIAL_KEY,
  PULSEFEED_BASE_DELAY_MS, PULSEFEED_MAX_DELAY_MS, RUST_LOG";

enum Command {
    Run,
    SetCredential(String),
    ClearCredential,
}

fn parse_args() -> Result<Option<Command>> {
    let mut args = std::env::args().skip(1);
    let Some(arg) = args.next() else {
        return Ok(Some(Command::Run));
    };

    match arg.as_str() {
        "--version" => {
            println!("pulsefeed {}", VERSION);
            Ok(None)
        }
        "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(None)
        }
        "--set-credential" => {
            let value = args
                .next()
                .ok_or_else(|| eyre!("--set-credential needs a value"))?;
            Ok(Some(Command::SetCredential(value)))
        }
        "--clear-credential" => Ok(Some(Command::ClearCredential)),
        other => Err(eyre!("Unknown argument '{}'\n\n{}", other, USAGE)),
    }
}

fn main() -> Result<()> {
    // Handle --version before any initialization
    let Some(command) = parse_args()? else {
        return Ok(());
    };

    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pulsefeed=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = StreamConfig::from_env().wrap_err("Invalid PULSEFEED_* environment")?;
    let signals = SignalBus::new(config.signal_capacity);
    let path = FileCredentialStore::default_path()?;
    let store = Arc::new(
        FileCredentialStore::open(&path, signals.clone())
            .wrap_err_with(|| format!("Failed to open {}", path.display()))?,
    );

    match command {
        Command::SetCredential(value) => {
            store.set(&config.credential_key, value.trim())?;
            println!("Stored credential in {}", path.display());
            Ok(())
        }
        Command::ClearCredential => {
            store.remove(&config.credential_key)?;
            println!("Removed credential from {}", path.display());
            Ok(())
        }
        Command::Run => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run(config, store, signals))
        }
    }
}

async fn run(config: StreamConfig, store: Arc<FileCredentialStore>, signals: SignalBus) -> Result<()> {
    tracing::info!("pulsefeed v{}", VERSION);

    // Keep alive for the whole run: dropping it stops watching
    let _file_watcher = spawn_file_watcher(Arc::clone(&store))
        .wrap_err("Failed to watch the settings file")?;

    let bus = EventBus::new();
    let feed = ActivityFeed::default();
    let _feed_guard = feed.attach(&bus).guard();
    let refresh = RefreshSignal::new(RefreshPolicy::Dashboard);
    let _refresh_guard = refresh.attach(&bus).guard();
    let _printer = bus
        .subscribe_named("stdout", |event| {
            if !event.is_heartbeat() {
                println!(
                    "{}  {}",
                    chrono::Local::now().format("%H:%M:%S"),
                    describe(event)
                );
            }
            Ok(())
        })
        .guard();

    if store.get(&config.credential_key).is_none() {
        eprintln!(
            "No credential stored under '{}'; run `pulsefeed --set-credential <KEY>`",
            config.credential_key
        );
    }

    let connector = SseConnector::new(config.connect_timeout)?;
    let stream = LiveStream::start_with_bus(&config, Arc::new(connector), store, &signals, bus);
    let mut status = stream.status_receiver();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                tracing::debug!("Stream status: {:?}", current);
            }
            _ = refresh.changed() => {
                for kind in refresh.take_pending() {
                    tracing::debug!("Incident list stale: {:?}", kind);
                }
            }
        }
    }

    stream.shutdown().await;
    tracing::info!("{} activities in feed at shutdown", feed.len());
    Ok(())
}
