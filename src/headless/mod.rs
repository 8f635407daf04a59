//! Headless mode for scripted testing
//!
//! Runs ability scenarios without any graphical output, suitable for
//! automated testing and balance checks.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- --headless assets/scenarios/fireball.json
//! ```
//!
//! ## JSON Configuration
//!
//! ```json
//! {
//!   "owners": [ { "name": "Mage", "abilities": ["Ability.Fireball"] } ],
//!   "inputs": [ { "time": 0.5, "owner": "Mage", "action": "Input.Primary" } ],
//!   "max_duration_secs": 10
//! }
//! ```

pub mod config;
pub mod runner;

pub use config::{HeadlessScenarioConfig, ScenarioOwner, ScriptedInput};
pub use runner::{run_headless_scenario, AbilityResult, OwnerResult, ScenarioResult};
