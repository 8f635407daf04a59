//! Arena Abilities - ability activation simulator
//!
//! Runs a JSON scenario headless and prints (or saves) its report.

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use std::process::ExitCode;
use std::time::Duration;

use arena_abilities::abilities::{load_ability_definitions_from, AbilityConfigPlugin};
use arena_abilities::cli::{parse_args, Args};
use arena_abilities::headless::{run_headless_scenario, HeadlessScenarioConfig};
use arena_abilities::simulation::AbilitiesPlugin;

fn main() -> ExitCode {
    let args = parse_args();

    match args.headless.clone() {
        Some(path) => match run_headless(&args, &path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
        None => {
            run_simulation(&args);
            ExitCode::SUCCESS
        }
    }
}

fn run_headless(args: &Args, path: &std::path::Path) -> Result<(), String> {
    let mut config = HeadlessScenarioConfig::load_from_file(path)?;
    if let Some(output) = &args.output {
        config.output_path = Some(output.display().to_string());
    }
    if let Some(max_duration) = args.max_duration {
        config.max_duration_secs = max_duration;
    }

    let definitions = load_ability_definitions_from(&args.abilities).map_err(|e| e.to_string())?;
    let result = run_headless_scenario(config, definitions)?;

    for owner in &result.owners {
        println!("{}", owner.name);
        for ability in &owner.abilities {
            println!(
                "  {}: {} activations, {} cooldowns, final state {}",
                ability.ability, ability.activations, ability.cooldowns_started, ability.state
            );
        }
    }
    Ok(())
}

/// Empty simulation loop; owners are spawned by whatever embeds the plugin.
fn run_simulation(args: &Args) {
    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 60.0,
            ))),
        )
        .add_plugins(LogPlugin::default())
        .add_plugins(AbilityConfigPlugin {
            path: args.abilities.clone(),
        })
        .add_plugins(AbilitiesPlugin)
        .run();
}
