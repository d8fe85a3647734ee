//! Rulehaunt Player - headless client binary.
//!
//! ```text
//! rulehaunt-player health
//! rulehaunt-player new [difficulty] [npc_count]
//! rulehaunt-player join <game_id>
//! rulehaunt-player load <filename>
//! ```
//!
//! After a game is entered, commands are read from stdin until `quit`.

use std::ops::ControlFlow;
use std::sync::{Arc, PoisonError};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rulehaunt_domain::{Difficulty, NpcCount, RuleCost, RuleDescription, RuleDraft, RuleName};
use rulehaunt_player::application::services::STORE_BOUND_KINDS;
use rulehaunt_player::state::shared_store;
use rulehaunt_player::{ApiAdapter, ConnectionManager, GameApi, GameService, PlayerConfig};

const HELP: &str =
    "commands: turn | npcs | rules | rule <cost> <name> | <description> | save | state | quit";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rulehaunt_player=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PlayerConfig::from_env()?;
    tracing::info!(
        api_url = %config.api_url,
        ws_url = %config.ws_url,
        client_id = %config.client_id,
        "Starting Rulehaunt Player"
    );

    let raw_api = Arc::new(ApiAdapter::with_timeout(&config.api_url, config.request_timeout));
    let api = GameApi::new(raw_api);
    let store = shared_store(config.store);

    let connection = Arc::new(ConnectionManager::new(config.connection_config()));
    connection.set_on_state_change(|state| tracing::info!(%state, "Connection state"));
    connection.set_on_failure(|error| tracing::error!(%error, "Realtime connection gave up"));

    let service = GameService::new(api, store).with_connection(Arc::clone(&connection));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("health");

    match command {
        "health" => {
            let health = service.health().await?;
            tracing::info!(
                status = %health.status,
                active_games = health.active_games,
                "Backend health"
            );
            return Ok(());
        }
        "new" => {
            let difficulty: Difficulty = match args.get(1) {
                Some(value) => value.parse()?,
                None => Difficulty::default(),
            };
            let npc_count: u8 = match args.get(2) {
                Some(value) => value.parse().context("npc_count must be a number")?,
                None => NpcCount::default().get(),
            };
            service.create_game(difficulty, npc_count).await?;
        }
        "join" => {
            let game_id = args.get(1).context("usage: join <game_id>")?;
            service.load_game(game_id.as_str()).await?;
        }
        "load" => {
            let filename = args.get(1).context("usage: load <filename>")?;
            service.load_save(filename).await?;
        }
        other => bail!("unknown command `{other}` (expected health, new, join or load)"),
    }

    for kind in STORE_BOUND_KINDS {
        connection.on(kind, move |frame| {
            tracing::info!(kind = %kind, sequence = ?frame.sequence, "Update pushed");
            Ok(())
        });
    }

    print_state(&service);
    tracing::info!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match run_command(&service, line.trim()).await {
            Ok(ControlFlow::Break(())) => break,
            Ok(ControlFlow::Continue(())) => {}
            Err(e) => tracing::error!(error = %e, "Command failed"),
        }
    }

    service.leave_game().await;
    tracing::info!("Bye");
    Ok(())
}

async fn run_command(service: &GameService, line: &str) -> Result<ControlFlow<()>> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "" => {}
        "turn" => {
            let turn = service.advance_turn().await?;
            tracing::info!(turn = turn.turn, fear_gained = turn.fear_gained, "Turn complete");
            if let Some(narrative) = turn.narrative {
                tracing::info!("{narrative}");
            }
            for event in &turn.events {
                tracing::info!(kind = %event.kind, description = ?event.description, "Event");
            }
        }
        "npcs" => {
            service.refresh_npcs().await?;
            let store = service.store().read().unwrap_or_else(PoisonError::into_inner);
            for npc in store.npcs() {
                tracing::info!(
                    id = %npc.id,
                    name = %npc.name,
                    hp = npc.hp,
                    sanity = npc.sanity,
                    alive = npc.is_alive,
                    "NPC"
                );
            }
        }
        "rules" => {
            service.refresh_rules().await?;
            let store = service.store().read().unwrap_or_else(PoisonError::into_inner);
            for rule in store.rules() {
                tracing::info!(
                    id = %rule.id,
                    name = %rule.name,
                    cost = rule.cost,
                    active = rule.is_active,
                    triggered = rule.times_triggered,
                    "Rule"
                );
            }
        }
        "rule" => {
            let (cost, text) = rest
                .trim()
                .split_once(' ')
                .context("usage: rule <cost> <name> | <description>")?;
            let (name, description) = text.split_once('|').unwrap_or((text, text));
            let draft = RuleDraft::new(
                RuleName::new(name)?,
                RuleDescription::new(description)?,
                RuleCost::new(cost.parse().context("cost must be a number")?)?,
            );
            let created = service.create_rule(draft).await?;
            tracing::info!(rule_id = %created.rule_id, cost = created.cost, "Rule created");
        }
        "save" => {
            let saved = service.save_game().await?;
            tracing::info!(filename = %saved.filename, "{}", saved.message);
        }
        "state" => print_state(service),
        "quit" | "exit" => return Ok(ControlFlow::Break(())),
        "help" => tracing::info!("{HELP}"),
        other => tracing::warn!("unknown command `{other}`; {HELP}"),
    }
    Ok(ControlFlow::Continue(()))
}

fn print_state(service: &GameService) {
    let store = service.store().read().unwrap_or_else(PoisonError::into_inner);
    tracing::info!(
        game_id = ?store.game_id,
        turn = store.current_turn,
        phase = %store.phase,
        fear_points = store.fear_points,
        alive_npcs = store.alive_npcs().count(),
        active_rules = store.active_rule_list().count(),
        events = store.events().len(),
        last_error = ?store.last_error,
        "Game state"
    );
}
