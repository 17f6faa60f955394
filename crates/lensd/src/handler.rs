//! Command handler for the lensd shell

use std::sync::Arc;

use clap::{Parser, Subcommand};
use lensgate::{Aggregator, Error};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

/// Operations exposed by the shell
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Profile summaries for comma-separated Steam IDs
    Summaries {
        /// e.g. 76561197960435530,76561197960287930
        steam_ids: String,
    },
    /// Profile summaries of every friend of a user
    Friends {
        steam_id: String,
    },
    /// Games owned by a user
    Games {
        steam_id: String,
    },
    /// A user's achievements in one game
    Achievements {
        steam_id: String,
        app_id: String,
    },
    /// Two users' achievements in one game, side by side
    CompareAchievements {
        user_id: String,
        friend_id: String,
        app_id: String,
    },
    /// Rank a user's friends by shared games
    Rank {
        steam_id: String,
        /// Include matching and friend-only game lists
        #[arg(long)]
        list: bool,
    },
    /// Score one friend against a user
    Compare {
        user_id: String,
        friend_id: String,
        /// Include matching and friend-only game lists
        #[arg(long)]
        list: bool,
    },
    /// Cache statistics
    Stats,
}

#[derive(Parser, Debug)]
#[command(name = "lensd", no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

/// Parse one line of shell input
pub fn parse_line(line: &str) -> Result<Command, clap::Error> {
    Line::try_parse_from(line.split_whitespace()).map(|parsed| parsed.command)
}

pub struct CommandHandler {
    aggregator: Arc<Aggregator>,
}

impl CommandHandler {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }

    /// Run a command, rendering success or failure as one JSON document
    pub async fn handle(&self, command: Command) -> Value {
        match self.dispatch(command).await {
            Ok(value) => value,
            Err(e) => error_response(&e),
        }
    }

    async fn dispatch(&self, command: Command) -> Result<Value, Error> {
        let gateway = self.aggregator.gateway();

        let value = match command {
            Command::Summaries { steam_ids } => {
                let ids: Vec<&str> = steam_ids.split(',').collect();
                let players = gateway.fetch_profile_summaries(&ids[..]).await?;
                json!({ "players": players })
            }
            Command::Friends { steam_id } => {
                let players = self.aggregator.relation_summaries(&steam_id).await?;
                json!({ "players": players })
            }
            Command::Games { steam_id } => to_json(gateway.fetch_owned_items(&steam_id).await?),
            Command::Achievements { steam_id, app_id } => {
                to_json(gateway.fetch_achievements(&steam_id, &app_id).await?)
            }
            Command::CompareAchievements {
                user_id,
                friend_id,
                app_id,
            } => to_json(
                self.aggregator
                    .compare_achievements(&user_id, &friend_id, &app_id)
                    .await?,
            ),
            Command::Rank { steam_id, list } => {
                let ranking = self.aggregator.rank_relations(&steam_id, list).await?;
                json!({ "ranking": ranking })
            }
            Command::Compare {
                user_id,
                friend_id,
                list,
            } => to_json(self.aggregator.compare_two(&user_id, &friend_id, list).await?),
            Command::Stats => json!({ "caches": gateway.caches().snapshot() }),
        };

        Ok(value)
    }
}

fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        error!("Failed to serialize response: {}", e);
        json!({ "error": "failed to serialize response", "status": 500 })
    })
}

fn error_response(err: &Error) -> Value {
    let status = err.status_code();
    if err.is_client_error() {
        warn!("Rejected command: {}", err);
    } else {
        error!("Command failed: {}", err);
    }
    json!({ "error": err.to_string(), "status": status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lensgate::{AggregatorConfig, Gateway, GatewayConfig, ThrottlePolicy};
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn handler(base_url: String) -> CommandHandler {
        let config = GatewayConfig::new("test-key").with_base_url(base_url);
        let gateway = Arc::new(Gateway::new(&config).unwrap());
        let aggregator = Aggregator::new(
            gateway,
            AggregatorConfig {
                throttle: ThrottlePolicy::new(Duration::from_millis(10), vec![]),
                ..AggregatorConfig::default()
            },
        );
        CommandHandler::new(Arc::new(aggregator))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_line("rank 76561197960435530 --list").unwrap(),
            Command::Rank {
                steam_id: "76561197960435530".to_string(),
                list: true,
            }
        );
        assert_eq!(
            parse_line("compare-achievements 1 2 440").unwrap(),
            Command::CompareAchievements {
                user_id: "1".to_string(),
                friend_id: "2".to_string(),
                app_id: "440".to_string(),
            }
        );
        assert_eq!(parse_line("  stats ").unwrap(), Command::Stats);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_line("rank").is_err());
        assert!(parse_line("frobnicate 1").is_err());
        assert!(parse_line("").is_err());
    }

    #[tokio::test]
    async fn test_blank_id_is_client_error() {
        let handler = handler("http://127.0.0.1:1".to_string());

        let response = handler
            .handle(Command::Summaries {
                steam_ids: ",".to_string(),
            })
            .await;

        assert_eq!(response["status"], 400);
        assert_eq!(response["error"], "'steamIDs' parameter is required");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_server_error() {
        let handler = handler("http://127.0.0.1:1".to_string());

        let response = handler
            .handle(Command::Games {
                steam_id: "111".to_string(),
            })
            .await;

        assert_eq!(response["status"], 500);
    }

    #[tokio::test]
    async fn test_stats_lists_caches() {
        let handler = handler("http://127.0.0.1:1".to_string());

        let response = handler.handle(Command::Stats).await;

        let caches = response["caches"].as_array().unwrap();
        assert_eq!(caches.len(), 4);
        assert_eq!(caches[0]["name"], "PlayerCache");
        assert_eq!(caches[0]["ttlSecs"], 86_400);
    }

    #[tokio::test]
    async fn test_rank_renders_ranking() {
        let mut server = Server::new_async().await;
        let _me = server
            .mock("GET", "/IPlayerService/GetOwnedGames/v0001/")
            .match_query(Matcher::UrlEncoded("steamid".into(), "me".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":{"game_count":1,"games":[{"appid":10,"name":"CS","img_icon_url":"x"}]}}"#)
            .create_async()
            .await;
        let _friend = server
            .mock("GET", "/IPlayerService/GetOwnedGames/v0001/")
            .match_query(Matcher::UrlEncoded("steamid".into(), "f".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":{"game_count":2,"games":[{"appid":10,"name":"CS","img_icon_url":"x"},{"appid":20,"name":"TFC","img_icon_url":"y"}]}}"#)
            .create_async()
            .await;
        let _friends = server
            .mock("GET", "/ISteamUser/GetFriendList/v0001/")
            .match_query(Matcher::UrlEncoded("steamid".into(), "me".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"friendslist":{"friends":[{"steamid":"f","relationship":"friend","friend_since":1}]}}"#)
            .create_async()
            .await;

        let handler = handler(server.url());
        let response = handler.handle(parse_line("rank me --list").unwrap()).await;

        let entry = &response["ranking"][0];
        assert_eq!(entry["friendID"], "f");
        assert_eq!(entry["ranking"], 1);
        assert_eq!(entry["matches"], 1);
        assert_eq!(entry["friendOnlyGames"][0]["appID"], 20);
    }
}
