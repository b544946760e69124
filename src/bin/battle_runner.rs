//! Headless Battle Runner
//!
//! Plays a battle spec to the end with a naive policy on every side and
//! prints the outcome as JSON. Useful for balance checks and replay tests.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use tactical_battle::battle::{
    build_battle, Battle, BattleSpec, GridCoord, SeededRandom, TimelineEntry, UnitId,
    UnitSnapshot,
};
use tactical_battle::core::EngineConfig;

const DEFAULT_SPEC: &str = include_str!("../../demos/skirmish.json");

/// Headless Battle Runner - policy vs policy battles
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Run a tactical battle to completion and report the outcome")]
struct Args {
    /// Battle spec (.json or .toml); the bundled skirmish when omitted
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Engine tuning (.toml); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many rounds
    #[arg(long, default_value_t = 50)]
    max_turns: u32,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Include the full timeline in the output
    #[arg(long)]
    timeline: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct RunResult {
    finished: bool,
    winner: Option<String>,
    turns: u32,
    seed: u64,
    events: usize,
    units: Vec<UnitSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeline: Option<Vec<TimelineEntry>>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let spec = match &args.spec {
        Some(path) => BattleSpec::load(path),
        None => BattleSpec::from_json(DEFAULT_SPEC),
    };
    let spec = match spec {
        Ok(spec) => spec,
        Err(e) => {
            tracing::error!("Failed to load battle spec: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to load engine config: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    let mut battle = match build_battle(&spec, config) {
        Ok(battle) => battle,
        Err(e) => {
            tracing::error!("Invalid battle spec: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = SeededRandom::new(seed);
    tracing::info!(seed, "Battle started");

    while !battle.is_finished() && battle.turn() <= args.max_turns {
        play_turn(&mut battle, &mut rng);
        if !battle.is_finished() && battle.end_turn().is_err() {
            break;
        }
    }

    let state = battle.state();
    let result = RunResult {
        finished: state.is_finished(),
        winner: state.winner().map(|f| f.to_string()),
        turns: state.turn,
        seed,
        events: state.timeline.len(),
        units: state.unit_snapshots(),
        timeline: args.timeline.then(|| state.timeline.entries().to_vec()),
    };

    match args.format.as_str() {
        "text" => {
            println!("Battle Result");
            println!("=============");
            match &result.winner {
                Some(winner) => println!("Winner: {}", winner),
                None if result.finished => println!("Winner: none"),
                None => println!("Unfinished after {} turns", args.max_turns),
            }
            println!("Turns: {}", result.turns);
            println!("Events: {}", result.events);
            for unit in &result.units {
                println!(
                    "  {} ({}) at {} hp {}/{} {:?}",
                    unit.id, unit.faction, unit.position, unit.health, unit.max_health, unit.stance
                );
            }
            println!("Seed: {}", result.seed);
        }
        format => {
            if format != "json" {
                tracing::warn!("Unknown format '{}', defaulting to json", format);
            }
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    tracing::error!("Failed to serialize result: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

/// Every unit of the active faction fires at the best target it can hit,
/// otherwise closes in on the nearest enemy it knows about
fn play_turn(battle: &mut Battle, rng: &mut SeededRandom) {
    let faction = battle.active_faction().clone();
    let unit_ids: Vec<UnitId> = battle
        .state()
        .side(&faction)
        .map(|s| s.living_units().map(|u| u.id.clone()).collect())
        .unwrap_or_default();

    for unit_id in unit_ids {
        // Each pass spends AP or gives up, so this is bounded by the AP pool
        for _ in 0..8 {
            if battle.is_finished() {
                return;
            }
            if let Some((target, weapon)) = best_attack(battle, &unit_id) {
                if battle.attack_unit(&unit_id, &target, &weapon, rng).is_ok() {
                    continue;
                }
            }
            if !advance(battle, &unit_id, rng) {
                break;
            }
        }
    }
}

fn best_attack(battle: &Battle, unit_id: &UnitId) -> Option<(UnitId, String)> {
    let state = battle.state();
    let unit = state.unit(unit_id)?;
    let mut best: Option<(f32, UnitId, String)> = None;

    for target in state.known_units(unit.faction()) {
        if &target.faction == unit.faction() {
            continue;
        }
        for weapon_id in unit.definition.weapons.keys() {
            let Ok(preview) = battle.attack_preview(unit_id, &target.id, weapon_id) else {
                continue;
            };
            if best
                .as_ref()
                .map_or(true, |(score, _, _)| preview.expected_damage > *score)
            {
                best = Some((preview.expected_damage, target.id.clone(), weapon_id.clone()));
            }
        }
    }
    best.map(|(_, target, weapon)| (target, weapon))
}

/// Step toward the nearest spotted enemy, or the map center when none is
/// known. Returns false when no move gets closer.
fn advance(battle: &mut Battle, unit_id: &UnitId, rng: &mut SeededRandom) -> bool {
    let state = battle.state();
    let Some(unit) = state.unit(unit_id) else {
        return false;
    };
    let map = &state.map;

    let goal = state
        .known_units(unit.faction())
        .into_iter()
        .filter(|u| &u.faction != unit.faction())
        .min_by_key(|u| (map.distance(unit.position, u.position), u.id.clone()))
        .map(|u| u.position)
        .unwrap_or_else(|| {
            GridCoord::new(map.width() as i32 / 2, map.height() as i32 / 2)
        });

    let current = map.distance(unit.position, goal);
    let Ok(reachable) = battle.reachable_tiles(unit_id) else {
        return false;
    };
    let destination = reachable
        .into_iter()
        .map(|(coord, cost)| (map.distance(coord, goal), cost, coord))
        .filter(|(distance, _, _)| *distance < current)
        .min_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)))
        .map(|(_, _, coord)| coord);

    match destination {
        Some(to) => battle.move_unit(unit_id, to, rng).is_ok(),
        None => false,
    }
}
