use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use combat_core::{scripted_party_action, AutoAck, Progress};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::EncounterConfig;
use crate::report::EncounterReport;

/// Encounters still undecided after this many rounds are reported as errors.
pub const MAX_ROUNDS: u32 = 200;

/// Plays an encounter to the end without a presentation layer. Every event is
/// acknowledged on the spot and party members follow the scripted policy.
pub fn run_encounter(config: &EncounterConfig, id: impl Into<String>) -> Result<EncounterReport> {
    config.validate()?;
    let id = id.into();
    let mut machine = config.build_machine();
    machine.listen(AutoAck);
    info!(
        target: "encounter.runner",
        id = %id,
        encounter = config.display_name(),
        seed = config.seed,
        "running encounter"
    );

    let mut progress = machine.start().context("failed to start encounter")?;
    let outcome = loop {
        match progress {
            Progress::AwaitingChoice(actor) => {
                if machine.round() > MAX_ROUNDS {
                    anyhow::bail!(
                        "`{}` was still undecided after {MAX_ROUNDS} rounds",
                        config.display_name()
                    );
                }
                let combatant = machine
                    .roster()
                    .get(actor)
                    .with_context(|| format!("chooser {actor} is not in the roster"))?;
                let action = scripted_party_action(combatant, machine.roster());
                debug!(target: "encounter.runner", actor = %actor, kind = ?action.kind(), "scripted choice");
                progress = machine.submit(action)?;
            }
            Progress::AwaitingAck(event) => {
                anyhow::bail!("`{event}` was left unacknowledged");
            }
            Progress::Finished(outcome) => break outcome,
        }
    };

    info!(
        target: "encounter.runner",
        id = %id,
        ?outcome,
        rounds = machine.round(),
        events = machine.journal().len(),
        "encounter finished"
    );
    Ok(EncounterReport::new(
        id,
        config.display_name(),
        config.seed,
        outcome,
        machine.round(),
        machine.journal().to_vec(),
        machine.roster(),
    ))
}

/// Every `*.toml` below `dir`, sorted. Build output and hidden directories are not
/// descended into.
pub fn discover_encounters(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_entry(is_searchable) {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() && is_encounter_file(entry.path()) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

fn is_searchable(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    name != "target" && !name.starts_with('.')
}

fn is_encounter_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}
