//! Encounter files, the headless runner and its reports.

pub mod config;
pub mod report;
pub mod runner;

pub use config::{CombatantConfig, EncounterConfig, PresentationConfig, SEED_ENV};
pub use report::{CombatantSnapshot, EncounterReport};
pub use runner::{discover_encounters, run_encounter, MAX_ROUNDS};
