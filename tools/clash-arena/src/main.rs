//! clash-arena: scripted duels and catalog checks for the CLASH combat runtime.
//!
//! Usage:
//!   clash-arena duel --attacks attacks.json --attack slash --ticks 240
//!   clash-arena check --attacks attacks.json

use std::fs;
use std::path::PathBuf;
use std::process;

use glam::Vec3;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use clash_core::attack::AttackDefinition;
use clash_core::components::DamageReceiver;
use clash_core::config::CombatConfig;
use clash_core::enums::AttackPhase;
use clash_core::events::CombatEvent;
use clash_core::types::Contact;
use clash_sim::attacks::AttackPhaseManager;
use clash_sim::world_setup::Fighter;
use clash_sim::CombatEngine;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "duel" => cmd_duel(&args[2..]),
        "check" => cmd_check(&args[2..]),
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!(
        "clash-arena: CLASH combat sandbox\n\
         \n\
         Commands:\n\
         \n\
         duel      Script a duel and print every combat event as JSON lines\n\
         \n\
           --config <path>    Combat config JSON (optional)\n\
           --attacks <path>   Attack catalog JSON array (optional, built-in set otherwise)\n\
           --attack <name>    Attack the player presses whenever idle (default: slash)\n\
           --ticks <N>        Ticks to simulate (default: 120)\n\
           --dt <secs>        Tick length (default: 0.016)\n\
           --block            Enemy holds block for the whole fight\n\
         \n\
         check     Validate an attack catalog and list its attacks\n\
         \n\
           --attacks <path>   Attack catalog JSON array\n\
         \n\
         Set RUST_LOG=clash_sim=debug to trace phase transitions.\n"
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    for i in 0..args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_or_exit<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    match flag_value(args, flag) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            eprintln!("Error: invalid value for {flag}: {raw}");
            process::exit(1);
        }),
    }
}

fn read_or_exit(path: &str) -> String {
    fs::read_to_string(PathBuf::from(path)).unwrap_or_else(|e| {
        eprintln!("Error reading {path}: {e}");
        process::exit(1);
    })
}

fn builtin_attacks() -> Vec<AttackDefinition> {
    vec![
        AttackDefinition {
            startup_duration: 0.12,
            active_duration: 0.1,
            recovery_duration: 0.25,
            ..AttackDefinition::new("jab")
        },
        AttackDefinition {
            can_cancel_into_attack: true,
            next_combo_attack: "slash".to_string(),
            max_combo_chain: 3,
            ..AttackDefinition::new("slash")
        },
    ]
}

fn cmd_duel(args: &[String]) {
    let config = match flag_value(args, "--config") {
        Some(path) => CombatConfig::from_json_str(&read_or_exit(path)).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(1);
        }),
        None => CombatConfig::default(),
    };
    let attack = flag_value(args, "--attack").unwrap_or("slash").to_string();
    let ticks: u32 = parse_or_exit(args, "--ticks", 120);
    let dt: f32 = parse_or_exit(args, "--dt", 0.016);
    let block = has_flag(args, "--block");

    let mut engine = CombatEngine::new(config);
    match flag_value(args, "--attacks") {
        Some(path) => {
            if let Err(e) = engine.load_attacks_json(&read_or_exit(path)) {
                error!(error = %e, "attack catalog rejected");
                process::exit(1);
            }
        }
        None => engine.attacks_mut().register_attacks(builtin_attacks()),
    }
    if engine.attacks().get_attack(&attack).is_none() {
        eprintln!("Error: attack {attack} is not in the catalog");
        process::exit(1);
    }

    let player = engine.spawn_fighter(
        Fighter::new("player", "enemy")
            .at(Vec3::new(0.0, 0.0, 1.5))
            .facing(Vec3::ZERO),
    );
    let enemy = engine.spawn_fighter(Fighter {
        receiver: DamageReceiver {
            is_blocking: block,
            ..Default::default()
        },
        ..Fighter::new("enemy", "player")
    });

    // The arena has no geometry: the player's weapon always overlaps.
    let contacts = [Contact::new(player, enemy, "weapon").at(Vec3::new(0.0, 1.0, 0.5), Vec3::Z)];

    let mut dealt = 0.0_f32;
    let mut hits = 0_u32;
    for _ in 0..ticks {
        if engine.phase_of(player) == AttackPhase::None {
            if let Err(e) = engine.process_attack_input(player, &attack) {
                error!(error = %e, "attack input refused");
            }
        }
        for event in engine.tick(dt, &contacts) {
            if let CombatEvent::DamageDealt { info } = &event {
                dealt += info.final_damage;
                hits += 1;
            }
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => error!(error = %e, "failed to serialize event"),
            }
        }
    }

    info!(
        ticks,
        seconds = engine.time(),
        hits,
        damage = dealt,
        "duel finished"
    );
}

fn cmd_check(args: &[String]) {
    let Some(path) = flag_value(args, "--attacks") else {
        eprintln!("Error: --attacks is required");
        process::exit(1);
    };

    let mut attacks = AttackPhaseManager::new();
    match attacks.load_attacks_json(&read_or_exit(path)) {
        Ok(count) => {
            println!("{count} attacks OK");
            for name in attacks.get_registered_attacks() {
                if let Some(def) = attacks.get_attack(&name) {
                    println!(
                        "  {name:<20} {:.2}s total, combo {} -> {}",
                        def.total_duration(),
                        def.max_combo_chain,
                        def.next_combo().unwrap_or("-"),
                    );
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
