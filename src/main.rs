use std::panic;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use localboard::config::Config;
use localboard::net::{discovery, ip, Transport};
use localboard::session::Session;
use localboard::store::{persist, OperationStore};

const CUSTOM_URL_SCHEME: &str = "localboard://";

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "localboard=debug,info".into()))
        .init();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    let store = Arc::new(OperationStore::new());
    let session = Arc::new(Session::new());
    info!("session site id: {}", session.site());

    if let Some(path) = &config.session_file {
        match persist::load(&store, path) {
            Ok(count) => info!("restored {} strokes from {}", count, path),
            Err(e) => warn!("could not restore session from {}: {}", path, e),
        }
    }

    let transport = Transport::new(Arc::clone(&store), Arc::clone(&session));
    // The renderer consumes this to schedule a redraw; it must stay cheap
    // because it runs on the delivering connection's read loop.
    transport.set_on_remote(Arc::new(|op| {
        debug!("applied remote operation from site {}", op.site());
    }));

    let args: Vec<String> = std::env::args().collect();
    match args.get(1) {
        Some(link) if link.starts_with(CUSTOM_URL_SCHEME) => {
            run_as_client(&transport, link).await;
        }
        _ => {
            run_as_host(&transport, &config).await;
        }
    }

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    if let Some(path) = &config.session_file {
        if let Err(e) = persist::save(&store, path) {
            error!("failed to save session to {}: {}", path, e);
        }
    }
    transport.close();
}

async fn run_as_host(transport: &Arc<Transport>, config: &Config) {
    info!("Starting as HOST");
    let addr = match transport.listen(&config.server_address()).await {
        Ok(addr) => addr,
        Err(e) => {
            // Without a listener this process cannot act as host.
            error!("fatal: {}", e);
            std::process::exit(1);
        }
    };

    match discovery::advertise(addr.port()) {
        Ok(ad) => transport.attach_advertisement(ad),
        Err(e) => warn!("LAN discovery unavailable, direct connection only: {}", e),
    }

    // A 0.0.0.0 bind is not dialable; the link carries the outgoing IP.
    info!("Share link: {}{}", CUSTOM_URL_SCHEME, ip::advertised_addr(addr));
}

async fn run_as_client(transport: &Arc<Transport>, link: &str) {
    info!("Starting as CLIENT, connecting to: {}", link);
    let address = link
        .trim_start_matches(CUSTOM_URL_SCHEME)
        .trim_end_matches('/')
        .to_string();

    if let Err(e) = transport.connect(&address).await {
        error!("could not connect to host at {}: {}", address, e);
        std::process::exit(1);
    }

    // Keep browsing so later-arriving peers get dialed as well; connect
    // ignores addresses that already have a live entry.
    let browse_transport = Arc::clone(transport);
    tokio::spawn(async move {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let browser = tokio::spawn(async move {
            if let Err(e) = discovery::browse(move |addr| {
                tx.send(addr).ok();
            })
            .await
            {
                warn!("peer browsing unavailable: {}", e);
            }
        });
        while let Some(addr) = rx.recv().await {
            if let Err(e) = browse_transport.connect(&addr).await {
                debug!("could not dial discovered peer {}: {}", addr, e);
            }
        }
        browser.abort();
    });
}
