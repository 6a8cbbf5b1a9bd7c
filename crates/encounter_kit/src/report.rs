use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use combat_core::{Allegiance, CombatEvent, CombatOutcome, CombatantId, Roster};
use serde::{Deserialize, Serialize};

/// Result of one headless encounter run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterReport {
    pub id: String,
    pub timestamp: String,
    pub encounter: String,
    pub seed: u64,
    pub outcome: CombatOutcome,
    pub rounds: u32,
    pub journal: Vec<CombatEvent>,
    pub roster: Vec<CombatantSnapshot>,
}

impl EncounterReport {
    pub fn new(
        id: impl Into<String>,
        encounter: impl Into<String>,
        seed: u64,
        outcome: CombatOutcome,
        rounds: u32,
        journal: Vec<CombatEvent>,
        roster: &Roster,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now().to_rfc3339(),
            encounter: encounter.into(),
            seed,
            outcome,
            rounds,
            journal,
            roster: roster.iter().map(CombatantSnapshot::of).collect(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read report {}", path.display()))?;
        let report = serde_json::from_str(&data)
            .with_context(|| format!("{} is not an encounter report", path.display()))?;
        Ok(report)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        Ok(())
    }

    pub fn survivors(&self, side: Allegiance) -> impl Iterator<Item = &CombatantSnapshot> {
        self.roster
            .iter()
            .filter(move |c| c.side == side && c.hp > 0)
    }

    /// One-line summary for terminals.
    pub fn headline(&self) -> String {
        let result = match &self.outcome {
            CombatOutcome::Victory(summary) => format!(
                "victory (+{} exp, +{} gold)",
                summary.exp, summary.gold
            ),
            CombatOutcome::Defeat => "defeat".to_owned(),
            CombatOutcome::Escape { .. } => "escaped".to_owned(),
        };
        format!(
            "Report {} [{}] -> {} after {} round(s), {} event(s), seed {}",
            self.id,
            self.encounter,
            result,
            self.rounds,
            self.journal.len(),
            self.seed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub id: CombatantId,
    pub name: String,
    pub side: Allegiance,
    pub hp: i32,
    pub max_hp: i32,
}

impl CombatantSnapshot {
    fn of(combatant: &combat_core::Combatant) -> Self {
        Self {
            id: combatant.id(),
            name: combatant.name().to_owned(),
            side: combatant.allegiance(),
            hp: combatant.hp(),
            max_hp: combatant.max_hp(),
        }
    }
}
