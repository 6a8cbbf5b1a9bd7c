use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{self, Context, Result};
use combat_core::combatant::DEFAULT_HIT_RADIUS;
use combat_core::{
    Allegiance, CameraView, CombatMachine, CombatModel, CombatScene, FormulaParams, HitRegions,
    Placement, PresentationSettings, Roster, ScaledProjector, DEFAULT_SEED,
};
use serde::{Deserialize, Serialize};

pub const SEED_ENV: &str = "COMBAT_SEED";

/// Upper bound for combatant stats and formula terms.
pub const MAX_STAT: i32 = i32::MAX / 4;

/// One encounter as written in a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub formula: FormulaParams,
    #[serde(default)]
    pub presentation: PresentationConfig,
    #[serde(default)]
    pub party: Vec<CombatantConfig>,
    #[serde(default)]
    pub enemies: Vec<CombatantConfig>,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl EncounterConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read encounter {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("invalid encounter {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        let cfg: EncounterConfig = toml::from_str(data)?;
        Ok(cfg)
    }

    /// Applies `COMBAT_SEED` when it is set to a number.
    pub fn apply_env(&mut self) {
        self.apply_seed_override(std::env::var(SEED_ENV).ok().as_deref());
    }

    pub fn apply_seed_override(&mut self, raw: Option<&str>) {
        if let Some(seed) = raw.and_then(|val| val.trim().parse().ok()) {
            self.seed = seed;
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("encounter")
    }

    pub fn validate(&self) -> Result<()> {
        if self.party.is_empty() {
            anyhow::bail!("encounter has no party members");
        }
        if self.enemies.is_empty() {
            anyhow::bail!("encounter has no enemies");
        }
        let mut names = HashSet::new();
        for combatant in self.party.iter().chain(&self.enemies) {
            if !names.insert(combatant.name.as_str()) {
                anyhow::bail!("duplicate combatant name `{}`", combatant.name);
            }
            combatant.validate()?;
        }
        for (label, chance) in [
            ("hit_chance", self.formula.hit_chance),
            ("run_chance", self.formula.run_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                anyhow::bail!("formula.{label} must be within [0, 1], got {chance}");
            }
        }
        for (label, value) in [
            ("variance", self.formula.variance),
            ("min_damage", self.formula.min_damage),
            ("heal_power", self.formula.heal_power),
        ] {
            if !(0..=MAX_STAT).contains(&value) {
                anyhow::bail!("formula.{label} must be within [0, {MAX_STAT}], got {value}");
            }
        }
        self.presentation.validate()
    }

    pub fn build_roster(&self) -> Roster {
        let mut roster = Roster::new();
        for (side, members) in [
            (Allegiance::Party, &self.party),
            (Allegiance::Enemy, &self.enemies),
        ] {
            for member in members {
                roster.enlist(side, member.model(), member.placement());
            }
        }
        roster
    }

    pub fn build_scene(&self) -> CombatScene {
        CombatScene::new(HitRegions, ScaledProjector, self.presentation.camera())
    }

    /// A machine with the configured roster, formulas, seed and scene, ready to start.
    pub fn build_machine(&self) -> CombatMachine {
        let mut machine = CombatMachine::new(self.build_roster(), self.formula.clone(), self.seed)
            .with_scene(self.build_scene());
        machine
            .gate_mut()
            .set_stall_warning(self.presentation.settings().stall_warning);
        machine
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantConfig {
    pub name: String,
    /// Starting hit points. Defaults to `max_hp`.
    #[serde(default)]
    pub hp: Option<i32>,
    pub max_hp: i32,
    pub attack: i32,
    #[serde(default)]
    pub defense: i32,
    #[serde(default)]
    pub magic: i32,
    #[serde(default)]
    pub position: [f32; 2],
    #[serde(default = "default_hit_radius")]
    pub hit_radius: f32,
    #[serde(default)]
    pub exp: u32,
    #[serde(default)]
    pub gold: u32,
}

fn default_hit_radius() -> f32 {
    DEFAULT_HIT_RADIUS
}

impl CombatantConfig {
    fn validate(&self) -> Result<()> {
        if self.max_hp <= 0 {
            anyhow::bail!("`{}` needs a positive max_hp", self.name);
        }
        if let Some(hp) = self.hp {
            if hp > self.max_hp {
                anyhow::bail!("`{}` has hp {hp} above max_hp {}", self.name, self.max_hp);
            }
            if hp < 0 {
                anyhow::bail!("`{}` has negative hp", self.name);
            }
        }
        if self.hit_radius < 0.0 {
            anyhow::bail!("`{}` has a negative hit_radius", self.name);
        }
        for (label, value) in [
            ("max_hp", self.max_hp),
            ("attack", self.attack),
            ("defense", self.defense),
            ("magic", self.magic),
        ] {
            if !(0..=MAX_STAT).contains(&value) {
                anyhow::bail!("`{}` has {label} {value} outside [0, {MAX_STAT}]", self.name);
            }
        }
        Ok(())
    }

    pub fn model(&self) -> CombatModel {
        CombatModel::new(self.name.clone(), self.max_hp, self.attack, self.defense)
            .with_magic(self.magic)
            .with_hp(self.hp.unwrap_or(self.max_hp))
            .with_rewards(self.exp, self.gold)
    }

    pub fn placement(&self) -> Placement {
        Placement::at(self.position[0], self.position[1]).with_radius(self.hit_radius)
    }
}

/// Effect timings in seconds plus the camera used for projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    pub message_secs: f32,
    pub shake_secs: f32,
    pub popup_secs: f32,
    pub stall_warning_secs: Option<f32>,
    pub camera_scale: f32,
    pub camera_offset: [f32; 2],
}

impl Default for PresentationConfig {
    fn default() -> Self {
        let settings = PresentationSettings::default();
        let camera = CameraView::default();
        Self {
            message_secs: settings.message.as_secs_f32(),
            shake_secs: settings.shake.as_secs_f32(),
            popup_secs: settings.popup.as_secs_f32(),
            stall_warning_secs: settings.stall_warning.map(|d| d.as_secs_f32()),
            camera_scale: camera.scale,
            camera_offset: [camera.offset.x, camera.offset.y],
        }
    }
}

impl PresentationConfig {
    fn validate(&self) -> Result<()> {
        let timings = [
            ("message_secs", self.message_secs),
            ("shake_secs", self.shake_secs),
            ("popup_secs", self.popup_secs),
            ("stall_warning_secs", self.stall_warning_secs.unwrap_or(0.0)),
        ];
        for (label, secs) in timings {
            if !secs.is_finite() || secs < 0.0 {
                anyhow::bail!("presentation.{label} must be a non-negative number of seconds");
            }
        }
        if !(self.camera_scale.is_finite() && self.camera_scale > 0.0) {
            anyhow::bail!("presentation.camera_scale must be positive");
        }
        Ok(())
    }

    /// Assumes [`EncounterConfig::validate`] has passed.
    pub fn settings(&self) -> PresentationSettings {
        PresentationSettings {
            message: seconds(self.message_secs),
            shake: seconds(self.shake_secs),
            popup: seconds(self.popup_secs),
            stall_warning: self.stall_warning_secs.map(seconds),
        }
    }

    pub fn camera(&self) -> CameraView {
        CameraView {
            scale: self.camera_scale,
            offset: self.camera_offset.into(),
        }
    }
}

fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMBUSH: &str = r#"
name = "ambush"
seed = 9

[formula]
hit_chance = 1.0
variance = 0

[[party]]
name = "Warrior"
max_hp = 20
attack = 5

[[party]]
name = "Mage"
hp = 8
max_hp = 12
attack = 2
magic = 3
position = [0.0, 40.0]

[[enemies]]
name = "Goblin"
max_hp = 5
attack = 3
exp = 4
gold = 6
position = [120.0, 0.0]
"#;

    #[test]
    fn parses_and_fills_defaults() {
        let cfg = EncounterConfig::parse(AMBUSH).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.seed, 9);
        assert_eq!(cfg.formula.min_damage, FormulaParams::default().min_damage);
        assert_eq!(cfg.party[1].hp, Some(8));
        assert_eq!(cfg.enemies[0].hit_radius, DEFAULT_HIT_RADIUS);

        let roster = cfg.build_roster();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.living_ids(Allegiance::Party).len(), 2);
        let mage = roster.iter().find(|c| c.name() == "Mage").unwrap();
        assert_eq!((mage.hp(), mage.max_hp()), (8, 12));
    }

    #[test]
    fn seed_override_only_takes_numbers() {
        let mut cfg = EncounterConfig::parse(AMBUSH).unwrap();
        cfg.apply_seed_override(Some("not-a-seed"));
        assert_eq!(cfg.seed, 9);
        cfg.apply_seed_override(Some(" 77 "));
        assert_eq!(cfg.seed, 77);
        cfg.apply_seed_override(None);
        assert_eq!(cfg.seed, 77);
    }

    #[test]
    fn validation_rejects_broken_encounters() {
        let base = EncounterConfig::parse(AMBUSH).unwrap();

        let mut no_enemies = base.clone();
        no_enemies.enemies.clear();
        assert!(no_enemies.validate().is_err());

        let mut duplicate = base.clone();
        duplicate.enemies[0].name = "Warrior".into();
        let err = duplicate.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        let mut overfull = base.clone();
        overfull.party[0].hp = Some(25);
        assert!(overfull.validate().is_err());

        let mut hollow = base.clone();
        hollow.enemies[0].max_hp = 0;
        assert!(hollow.validate().is_err());

        let mut lucky = base;
        lucky.formula.run_chance = 1.5;
        assert!(lucky.validate().is_err());
    }

    #[test]
    fn stats_outside_range_are_rejected() {
        let base = EncounterConfig::parse(AMBUSH).unwrap();

        let mut overflowing = base.clone();
        overflowing.party[0].attack = i32::MAX;
        overflowing.enemies[0].defense = -1;
        let err = overflowing.validate().unwrap_err();
        assert!(err.to_string().contains("attack"));

        let mut brittle = base.clone();
        brittle.enemies[0].defense = -1;
        assert!(brittle.validate().is_err());

        let mut drained = base.clone();
        drained.party[1].magic = -3;
        assert!(drained.validate().is_err());

        let mut wild = base;
        wild.formula.variance = i32::MAX;
        assert!(wild.validate().is_err());
    }

    #[test]
    fn largest_valid_stats_run_to_completion() {
        let mut cfg = EncounterConfig::parse(AMBUSH).unwrap();
        cfg.party[0].attack = MAX_STAT;
        cfg.party[1].magic = MAX_STAT;
        cfg.formula.heal_power = MAX_STAT;
        let mut hobgoblin = cfg.enemies[0].clone();
        hobgoblin.name = "Hobgoblin".into();
        hobgoblin.exp = u32::MAX;
        hobgoblin.gold = u32::MAX;
        cfg.enemies.push(hobgoblin);
        cfg.validate().unwrap();

        let report = crate::runner::run_encounter(&cfg, "bounds").unwrap();
        match report.outcome {
            combat_core::CombatOutcome::Victory(summary) => {
                assert_eq!(summary.exp, u32::MAX);
                assert_eq!(summary.gold, u32::MAX);
            }
            other => panic!("expected victory, got {other:?}"),
        }
    }
}
