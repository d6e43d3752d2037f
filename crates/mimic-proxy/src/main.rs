use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use mimic_proxy::config::Config;
use mimic_proxy::events::BroadcastPublisher;
use mimic_proxy::forward::Forwarder;
use mimic_proxy::rewrite::RewriteContext;
use mimic_proxy::rule::RuleStore;
use mimic_proxy::server::Server;

#[derive(Parser, Debug)]
#[command(name = "mimic-proxy")]
struct Args {
    /// Listen port; overrides the config file.
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    config: Option<String>,
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let mut config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    let forwarder = match Forwarder::new(&config.upstream) {
        Ok(forwarder) => forwarder,
        Err(e) => {
            error!("failed to initialize forwarder: {}", e);
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = match format!("{}:{}", config.listen.host, config.listen.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid listen address: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = Arc::new(RewriteContext {
        publisher: Arc::new(BroadcastPublisher::new(config.events.channel_capacity)),
        store: Arc::new(RuleStore::new()),
        forwarder: Arc::new(forwarder),
        config: Arc::new(config),
    });

    info!("starting mimic proxy on {}", addr);
    let server = match Server::bind(addr, ctx).await {
        Ok(server) => server,
        Err(e) => {
            error!("failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("server error: {}", e);
        std::process::exit(1);
    }
}
