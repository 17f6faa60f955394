//! SteamLens Daemon - cached Steam Web API shell

mod handler;

use anyhow::{Context, Result};
use clap::Parser;
use lensgate::{
    Aggregator, AggregatorConfig, CacheTtls, Gateway, GatewayConfig, ScoreWeights,
    ThrottlePolicy, DEFAULT_BASE_URL,
};
use serde_json::Value;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use crate::handler::{parse_line, Command, CommandHandler};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Steam Web API key
    #[arg(long, env = "STEAM_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Upstream base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Profile summary cache TTL (seconds)
    #[arg(long, default_value_t = 24 * 60 * 60)]
    profile_ttl: u64,

    /// Friend list cache TTL (seconds)
    #[arg(long, default_value_t = 10 * 60)]
    relation_ttl: u64,

    /// Owned games cache TTL (seconds)
    #[arg(long, default_value_t = 60 * 60)]
    owned_ttl: u64,

    /// Achievements cache TTL (seconds)
    #[arg(long, default_value_t = 60 * 60)]
    achievement_ttl: u64,

    /// Interval between cache sweeps (seconds)
    #[arg(long, default_value_t = 60 * 60)]
    sweep_interval: u64,

    /// Upstream request timeout (seconds)
    #[arg(long, default_value_t = 10)]
    request_timeout: u64,

    /// Score weight per shared game
    #[arg(long, default_value_t = 0.6)]
    match_weight: f64,

    /// Score weight per percentage point of the friend's library shared
    #[arg(long, default_value_t = 0.4)]
    percent_weight: f64,

    /// Run a single command and exit instead of reading commands from stdin
    #[command(subcommand)]
    command: Option<Command>,
}

impl Args {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
            ttls: CacheTtls {
                profiles: Duration::from_secs(self.profile_ttl),
                relations: Duration::from_secs(self.relation_ttl),
                owned_items: Duration::from_secs(self.owned_ttl),
                achievements: Duration::from_secs(self.achievement_ttl),
            },
            sweep_interval: Duration::from_secs(self.sweep_interval),
        }
    }

    fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            weights: ScoreWeights::new(self.match_weight, self.percent_weight),
            throttle: ThrottlePolicy::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON responses
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let gateway_config = args.gateway_config();

    info!("Starting SteamLens Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Upstream: {}", gateway_config.base_url);
    info!(
        "Cache TTLs: profiles {:?}, friends {:?}, games {:?}, achievements {:?}",
        gateway_config.ttls.profiles,
        gateway_config.ttls.relations,
        gateway_config.ttls.owned_items,
        gateway_config.ttls.achievements
    );

    let gateway =
        Arc::new(Gateway::new(&gateway_config).context("Failed to build upstream HTTP client")?);
    let sweepers = gateway
        .caches()
        .start_sweepers(gateway_config.sweep_interval);
    let aggregator = Arc::new(Aggregator::new(gateway, args.aggregator_config()));
    let handler = CommandHandler::new(aggregator);

    let outcome = match args.command {
        Some(command) => {
            let response = handler.handle(command).await;
            print_json(&response)
        }
        None => {
            let stdin = BufReader::new(tokio::io::stdin());
            run_shell(&handler, stdin, tokio::signal::ctrl_c()).await
        }
    };

    info!("Shutting down");
    for sweeper in sweepers {
        sweeper.shutdown().await;
    }

    outcome
}

/// Read one command per line until EOF, `quit`, or `shutdown` resolves.
///
/// `shutdown` is polled while waiting for input and while a command runs.
async fn run_shell<R, F>(handler: &CommandHandler, input: R, shutdown: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);
    info!("Ready; type 'help' for commands");

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupt received");
                return Ok(());
            }
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else {
            return Ok(());
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            return Ok(());
        }

        let command = match parse_line(line) {
            Ok(command) => command,
            Err(e) => {
                // clap renders usage and help text itself
                eprintln!("{}", e.render());
                continue;
            }
        };

        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupt received; abandoning '{}'", line);
                return Ok(());
            }
            response = handler.handle(command) => print_json(&response)?,
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lensgate::{GatewayCaches, Item, OwnedItemSet, Relation, RelationList};
    use tokio::time::Instant;

    // Games and friend list of "me" are pre-cached, so ranking never calls
    // upstream and only waits on the throttle: 4 friends over a 4s budget.
    fn cached_handler() -> CommandHandler {
        let config = GatewayConfig::new("test-key").with_base_url("http://127.0.0.1:1");
        let caches = GatewayCaches::new(config.ttls);
        let games = |owner: &str| OwnedItemSet {
            owner_id: owner.to_string(),
            total_count: 1,
            items: vec![Item {
                id: 10,
                name: "CS".to_string(),
                icon_ref: "x".to_string(),
            }],
        };

        caches.owned_items.put("me", games("me"));
        let mut relations = Vec::new();
        for i in 0..4 {
            let id = format!("r{i}");
            caches.owned_items.put(id.clone(), games(&id));
            relations.push(Relation {
                related_id: id,
                kind: "friend".to_string(),
                since: 0,
            });
        }
        caches.relations.put("me", RelationList { relations });

        let gateway = Arc::new(Gateway::with_caches(&config, caches).unwrap());
        CommandHandler::new(Arc::new(Aggregator::new(gateway, AggregatorConfig::default())))
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_running_command() {
        let handler = cached_handler();

        let start = Instant::now();
        run_shell(
            &handler,
            &b"rank me\n"[..],
            tokio::time::sleep(Duration::from_secs(1)),
        )
        .await
        .unwrap();

        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shell_stops_at_quit() {
        let handler = cached_handler();

        let start = Instant::now();
        run_shell(
            &handler,
            &b"\nbogus\nquit\nrank me\n"[..],
            tokio::time::sleep(Duration::from_secs(60)),
        )
        .await
        .unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_defaults_match_library_defaults() {
        let args = Args::try_parse_from(["lensd", "--api-key", "k"]).unwrap();

        let gateway = args.gateway_config();
        assert_eq!(gateway.api_key, "k");
        assert_eq!(gateway.base_url, DEFAULT_BASE_URL);
        assert_eq!(gateway.ttls, CacheTtls::default());
        assert_eq!(gateway.sweep_interval, GatewayConfig::default().sweep_interval);
        assert_eq!(args.aggregator_config(), AggregatorConfig::default());
        assert!(args.command.is_none());
    }

    #[test]
    fn test_one_shot_command() {
        let args = Args::try_parse_from([
            "lensd",
            "--api-key",
            "k",
            "--owned-ttl",
            "5",
            "--match-weight",
            "0.7",
            "--percent-weight",
            "0.3",
            "compare",
            "1",
            "2",
        ])
        .unwrap();

        assert_eq!(args.gateway_config().ttls.owned_items, Duration::from_secs(5));
        assert_eq!(args.aggregator_config().weights, ScoreWeights::new(0.7, 0.3));
        assert_eq!(
            args.command,
            Some(Command::Compare {
                user_id: "1".to_string(),
                friend_id: "2".to_string(),
                list: false,
            })
        );
    }
}
