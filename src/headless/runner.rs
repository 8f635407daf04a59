//! Headless scenario execution
//!
//! Runs an ability scenario without any graphical output, driving the Bevy
//! schedule with a fixed 60 Hz clock so runs are reproducible.

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use crate::abilities::AbilityDefinitions;
use crate::attributes::{Attribute, AttributeSet};
use crate::component::{Abilities, AbilityComponent, AbilityNotificationKind, InputPhase};
use crate::labels::Label;
use crate::simulation::events::{AbilityEvent, AbilityInputEvent};
use crate::simulation::log::{AbilityLog, AbilityLogEventType};
use crate::simulation::systems::{initialize_abilities, forward_ability_notifications, record_ability_log};
use crate::simulation::AbilitiesPlugin;

use super::config::{HeadlessScenarioConfig, ScriptedInput};

const FRAME_SECONDS: f64 = 1.0 / 60.0;

/// How long a randomly generated press is held before it is released
const RANDOM_HOLD_SECONDS: f32 = 0.25;

/// Result of a completed headless scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Simulated seconds
    pub duration: f32,
    /// Random seed used (if deterministic mode)
    pub random_seed: Option<u64>,
    pub owners: Vec<OwnerResult>,
    /// Formatted ability log lines
    pub log: Vec<String>,
}

impl ScenarioResult {
    pub fn owner(&self, name: &str) -> Option<&OwnerResult> {
        self.owners.iter().find(|o| o.name == name)
    }
}

/// Final state of one owner
#[derive(Debug, Clone, Serialize)]
pub struct OwnerResult {
    pub name: String,
    /// Current attribute values at the end of the run
    pub attributes: BTreeMap<String, f32>,
    /// Labels still held, sorted
    pub labels: Vec<String>,
    pub abilities: Vec<AbilityResult>,
}

impl OwnerResult {
    pub fn ability(&self, name: &str) -> Option<&AbilityResult> {
        self.abilities.iter().find(|a| a.ability == name)
    }
}

/// Counters and final state of one ability
#[derive(Debug, Clone, Default, Serialize)]
pub struct AbilityResult {
    pub ability: String,
    /// "Waiting" or "Activating"
    pub state: String,
    pub activations: u32,
    pub periods: u32,
    pub activations_finished: u32,
    pub cancellations: u32,
    pub finishes: u32,
    pub costs_paid: u32,
    pub cooldowns_started: u32,
    pub cooldowns_ended: u32,
    pub cooldown_remaining: f32,
}

impl AbilityResult {
    fn record(&mut self, kind: AbilityNotificationKind) {
        let counter = match kind {
            AbilityNotificationKind::ActivationStarted => &mut self.activations,
            AbilityNotificationKind::ActivationPeriod => &mut self.periods,
            AbilityNotificationKind::ActivationFinished => &mut self.activations_finished,
            AbilityNotificationKind::ActivationCancelled => &mut self.cancellations,
            AbilityNotificationKind::AbilityFinished => &mut self.finishes,
            AbilityNotificationKind::AttributeCostApplied => &mut self.costs_paid,
            AbilityNotificationKind::CooldownStarted => &mut self.cooldowns_started,
            AbilityNotificationKind::CooldownEnded => &mut self.cooldowns_ended,
        };
        *counter += 1;
    }
}

/// Seedable random source for generated input
#[derive(Resource)]
pub struct GameRng {
    rng: StdRng,
    /// The seed used to initialize this RNG (if deterministic)
    pub seed: Option<u64>,
}

impl GameRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            seed: None,
        }
    }

    /// Generate a random f32 in the range [0.0, 1.0)
    pub fn random_f32(&mut self) -> f32 {
        self.rng.gen()
    }

    pub fn random_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

struct SpawnedOwner {
    name: String,
    entity: Entity,
    /// Input actions any of the owner's abilities listen to
    actions: Vec<Label>,
}

/// Resource to track headless scenario state
#[derive(Resource)]
pub struct HeadlessScenarioState {
    pub max_duration: f32,
    pub elapsed_time: f32,
    pub output_path: Option<String>,
    pub complete: bool,
    pub random_seed: Option<u64>,
    /// Populated when the scenario completes
    pub result: Option<ScenarioResult>,
    presses_per_second: f32,
    owners: Vec<SpawnedOwner>,
    pending_inputs: VecDeque<ScriptedInput>,
    random_releases: Vec<(f32, Entity, Label)>,
    stats: HashMap<(Entity, Label), AbilityResult>,
}

impl HeadlessScenarioState {
    fn owner_entity(&self, name: &str) -> Option<Entity> {
        self.owners.iter().find(|o| o.name == name).map(|o| o.entity)
    }
}

#[derive(Resource)]
struct ScenarioSetup(HeadlessScenarioConfig);

/// Plugin for headless scenario execution
pub struct HeadlessPlugin {
    pub config: HeadlessScenarioConfig,
}

impl Plugin for HeadlessPlugin {
    fn build(&self, app: &mut App) {
        let game_rng = match self.config.random_seed {
            Some(seed) => {
                info!("Using deterministic RNG with seed: {}", seed);
                GameRng::from_seed(seed)
            }
            None => {
                info!("Using non-deterministic RNG (no seed provided)");
                GameRng::from_entropy()
            }
        };

        app.insert_resource(HeadlessScenarioState {
            max_duration: self.config.max_duration_secs,
            elapsed_time: 0.0,
            output_path: self.config.output_path.clone(),
            complete: false,
            random_seed: self.config.random_seed,
            result: None,
            presses_per_second: self.config.random_presses_per_second,
            owners: Vec::new(),
            pending_inputs: self.config.sorted_inputs().into(),
            random_releases: Vec::new(),
            stats: HashMap::new(),
        })
        .insert_resource(ScenarioSetup(self.config.clone()))
        .insert_resource(game_rng)
        .add_systems(Startup, headless_setup_scenario)
        .add_systems(Update, headless_feed_input.before(initialize_abilities))
        .add_systems(
            Update,
            headless_count_events
                .after(forward_ability_notifications)
                .before(record_ability_log),
        )
        .add_systems(Update, headless_check_scenario_end.after(record_ability_log));
    }
}

fn headless_setup_scenario(
    mut commands: Commands,
    setup: Res<ScenarioSetup>,
    definitions: Res<AbilityDefinitions>,
    mut headless_state: ResMut<HeadlessScenarioState>,
    mut ability_log: ResMut<AbilityLog>,
) {
    ability_log.clear();
    ability_log.log(
        AbilityLogEventType::Simulation,
        "Scenario started (headless mode)".to_string(),
    );

    for owner in &setup.0.owners {
        let attributes = match &owner.attributes {
            Some(values) => {
                let mut set = AttributeSet::new();
                for (name, value) in values {
                    set.set_base(Attribute::new(name), *value);
                }
                set
            }
            None => definitions.owner_attributes(),
        };

        let mut abilities = Abilities::new();
        let mut actions: Vec<Label> = Vec::new();
        for name in &owner.abilities {
            let Some(instance) = definitions.instantiate(Label::new(name)) else {
                warn!("Owner {} skips undefined ability {}", owner.name, name);
                continue;
            };
            for action in instance.input_actions() {
                if !actions.contains(action) {
                    actions.push(*action);
                }
            }
            if let Err(e) = abilities.add(instance) {
                warn!("Owner {}: {}", owner.name, e);
            }
        }

        let entity = commands.spawn(Name::new(owner.name.clone())).id();
        commands
            .entity(entity)
            .insert((AbilityComponent::new(entity, attributes), abilities));

        headless_state.owners.push(SpawnedOwner {
            name: owner.name.clone(),
            entity,
            actions,
        });
    }

    info!(
        "Headless scenario setup complete: {} owners, {} scripted inputs",
        headless_state.owners.len(),
        headless_state.pending_inputs.len()
    );
}

/// Send scripted and random input that is due this frame
fn headless_feed_input(
    time: Res<Time>,
    mut headless_state: ResMut<HeadlessScenarioState>,
    mut rng: ResMut<GameRng>,
    mut input_events: EventWriter<AbilityInputEvent>,
) {
    if headless_state.complete {
        return;
    }
    let dt = time.delta_secs();
    headless_state.elapsed_time += dt;
    let now = headless_state.elapsed_time;

    while headless_state
        .pending_inputs
        .front()
        .is_some_and(|input| input.time <= now)
    {
        let Some(input) = headless_state.pending_inputs.pop_front() else {
            break;
        };
        let Some(owner) = headless_state.owner_entity(&input.owner) else {
            continue;
        };
        input_events.send(AbilityInputEvent {
            owner,
            action: Label::new(&input.action),
            phase: input.phase,
        });
    }

    let mut due = Vec::new();
    headless_state.random_releases.retain(|(at, owner, action)| {
        if *at <= now {
            due.push((*owner, *action));
            false
        } else {
            true
        }
    });
    for (owner, action) in due {
        input_events.send(AbilityInputEvent {
            owner,
            action,
            phase: InputPhase::Released,
        });
    }

    if headless_state.presses_per_second <= 0.0 {
        return;
    }
    let chance = headless_state.presses_per_second * dt;
    let mut presses = Vec::new();
    for owner in &headless_state.owners {
        if owner.actions.is_empty() || rng.random_f32() >= chance {
            continue;
        }
        let action = owner.actions[rng.random_index(owner.actions.len())];
        presses.push((owner.entity, action));
    }
    for (owner, action) in presses {
        input_events.send(AbilityInputEvent {
            owner,
            action,
            phase: InputPhase::Pressed,
        });
        headless_state
            .random_releases
            .push((now + RANDOM_HOLD_SECONDS, owner, action));
    }
}

fn headless_count_events(
    mut ability_events: EventReader<AbilityEvent>,
    mut headless_state: ResMut<HeadlessScenarioState>,
) {
    for event in ability_events.read() {
        headless_state
            .stats
            .entry((event.owner, event.ability))
            .or_default()
            .record(event.kind);
    }
}

/// Finish once the configured duration has elapsed
fn headless_check_scenario_end(
    owners: Query<(Entity, &Name, &AbilityComponent, &Abilities)>,
    mut ability_log: ResMut<AbilityLog>,
    mut headless_state: ResMut<HeadlessScenarioState>,
) {
    if headless_state.complete || headless_state.elapsed_time < headless_state.max_duration {
        return;
    }

    info!(
        "Scenario complete after {:.1}s",
        headless_state.elapsed_time
    );
    ability_log.log(
        AbilityLogEventType::Simulation,
        "Scenario complete".to_string(),
    );

    let result = build_scenario_result(&owners, &ability_log, &headless_state);
    save_headless_report(&result, headless_state.output_path.as_deref());
    headless_state.result = Some(result);
    headless_state.complete = true;
}

fn build_scenario_result(
    owners: &Query<(Entity, &Name, &AbilityComponent, &Abilities)>,
    ability_log: &AbilityLog,
    headless_state: &HeadlessScenarioState,
) -> ScenarioResult {
    let mut results = Vec::new();

    // Report owners in scenario order
    for spawned in &headless_state.owners {
        let Ok((entity, name, host, abilities)) = owners.get(spawned.entity) else {
            continue;
        };

        let attributes = host
            .attributes()
            .owner
            .iter()
            .map(|(attribute, value)| (attribute.name().to_string(), value.current()))
            .collect();

        let mut labels: Vec<String> = host
            .labels()
            .iter()
            .map(|label| label.name().to_string())
            .collect();
        labels.sort();

        let abilities = abilities
            .iter()
            .map(|instance| {
                let mut result = headless_state
                    .stats
                    .get(&(entity, instance.label()))
                    .cloned()
                    .unwrap_or_default();
                result.ability = instance.label().name().to_string();
                result.state = format!("{:?}", instance.state());
                result.cooldown_remaining = instance.cooldown_remaining_time(host);
                result
            })
            .collect();

        results.push(OwnerResult {
            name: name.as_str().to_string(),
            attributes,
            labels,
            abilities,
        });
    }

    ScenarioResult {
        duration: headless_state.elapsed_time,
        random_seed: headless_state.random_seed,
        owners: results,
        log: ability_log.lines(),
    }
}

/// Write the JSON report when an output path is configured
fn save_headless_report(result: &ScenarioResult, output_path: Option<&str>) {
    let Some(path) = output_path else {
        return;
    };
    let json = match serde_json::to_string_pretty(result) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialize scenario report: {}", e);
            return;
        }
    };
    match std::fs::write(path, json) {
        Ok(()) => println!("Scenario complete. Report saved to: {}", path),
        Err(e) => eprintln!("Failed to save scenario report: {}", e),
    }
}

/// Run a headless scenario to completion and return its result
pub fn run_headless_scenario(
    config: HeadlessScenarioConfig,
    definitions: AbilityDefinitions,
) -> Result<ScenarioResult, String> {
    config.validate()?;
    config.validate_abilities(&definitions)?;

    println!("Starting headless ability scenario...");
    for owner in &config.owners {
        println!("  {}: {:?}", owner.name, owner.abilities);
    }
    println!("  Max duration: {:.1}s", config.max_duration_secs);

    let frame = Duration::from_secs_f64(FRAME_SECONDS);
    // A few spare frames for startup
    let max_frames = (config.max_duration_secs as f64 / FRAME_SECONDS).ceil() as usize + 10;

    let mut app = App::new();
    app
        // Minimal plugins - no window, no rendering
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame)))
        .insert_resource(TimeUpdateStrategy::ManualDuration(frame))
        .insert_resource(definitions)
        .add_plugins(AbilitiesPlugin)
        .add_plugins(HeadlessPlugin { config });

    app.finish();
    app.cleanup();

    for _ in 0..max_frames {
        app.update();
        let done = app
            .world()
            .get_resource::<HeadlessScenarioState>()
            .is_some_and(|state| state.complete);
        if done {
            break;
        }
    }

    app.world_mut()
        .get_resource_mut::<HeadlessScenarioState>()
        .and_then(|mut state| state.result.take())
        .ok_or_else(|| format!("Scenario did not complete within {} frames", max_frames))
}
