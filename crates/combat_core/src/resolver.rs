//! Turns a chosen action into numeric effects.
//!
//! Effect amounts follow one convention everywhere: a positive amount is damage, a
//! negative amount is healing and zero is an explicit miss.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::ActionKind;
use crate::combatant::{Combatant, CombatantId};
use crate::rng::RollSource;

/// Tunables of the combat formulas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaParams {
    /// Probability that an attack connects.
    pub hit_chance: f32,
    /// Extra damage is drawn uniformly from `0..=variance`.
    pub variance: i32,
    /// Floor applied to the damage of a connecting attack.
    pub min_damage: i32,
    /// Added to the healer's magic.
    pub heal_power: i32,
    /// Probability that a run attempt succeeds.
    pub run_chance: f32,
}

impl Default for FormulaParams {
    fn default() -> Self {
        Self {
            hit_chance: 0.9,
            variance: 2,
            min_damage: 1,
            heal_power: 4,
            run_chance: 0.5,
        }
    }
}

impl FormulaParams {
    /// Always hits, never varies. Handy for scripted fights.
    pub fn exact() -> Self {
        Self {
            hit_chance: 1.0,
            variance: 0,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub target: CombatantId,
    pub amount: i32,
}

impl Effect {
    pub fn is_miss(&self) -> bool {
        self.amount == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// One entry per target, in target order.
    Effects(Vec<Effect>),
    Escape { success: bool },
    Pass,
}

/// Resolves `kind` performed by `actor` against `targets`. Does not touch hit points;
/// see [`apply_effect`].
pub fn resolve(
    actor: &Combatant,
    kind: ActionKind,
    targets: &[&Combatant],
    params: &FormulaParams,
    rolls: &mut impl RollSource,
) -> Resolution {
    match kind {
        ActionKind::Attack => Resolution::Effects(
            targets
                .iter()
                .map(|target| Effect {
                    target: target.id(),
                    amount: attack_amount(actor, target, params, rolls),
                })
                .collect(),
        ),
        ActionKind::Heal => Resolution::Effects(
            targets
                .iter()
                .map(|target| Effect {
                    target: target.id(),
                    amount: heal_amount(actor, target, params),
                })
                .collect(),
        ),
        ActionKind::Run => {
            let success = rolls.roll() < params.run_chance;
            debug!(target: "combat.resolver", actor = %actor.id(), success, "run attempt");
            Resolution::Escape { success }
        }
        ActionKind::Wait => Resolution::Pass,
    }
}

fn attack_amount(
    actor: &Combatant,
    target: &Combatant,
    params: &FormulaParams,
    rolls: &mut impl RollSource,
) -> i32 {
    if rolls.roll() >= params.hit_chance {
        debug!(target: "combat.resolver", actor = %actor.id(), defender = %target.id(), "missed");
        return 0;
    }
    let base = actor
        .model()
        .attack
        .saturating_sub(target.model().defense)
        .max(params.min_damage.max(1));
    let spread = if params.variance > 0 {
        ((rolls.roll() * params.variance.saturating_add(1) as f32) as i32).min(params.variance)
    } else {
        0
    };
    let damage = base.saturating_add(spread);
    debug!(target: "combat.resolver", actor = %actor.id(), defender = %target.id(), damage, "hit");
    damage
}

fn heal_amount(actor: &Combatant, target: &Combatant, params: &FormulaParams) -> i32 {
    if !target.is_alive() {
        return 0;
    }
    -actor.model().magic.saturating_add(params.heal_power).max(1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HpChange {
    pub before: i32,
    pub after: i32,
}

impl HpChange {
    pub fn died(&self) -> bool {
        self.before > 0 && self.after == 0
    }
}

/// Applies an effect amount: damage clamps at zero, healing clamps at max.
pub fn apply_effect(target: &mut Combatant, amount: i32) -> HpChange {
    let before = target.hp();
    let after = match amount {
        0 => before,
        damage if damage > 0 => before.saturating_sub(damage).max(0),
        heal => before.saturating_sub(heal).min(target.max_hp()),
    };
    target.set_hp(after);
    HpChange { before, after }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{Allegiance, CombatModel, Placement, Roster};
    use crate::rng::FixedRolls;

    fn duel() -> (Roster, CombatantId, CombatantId) {
        let mut roster = Roster::new();
        let warrior = roster.enlist(
            Allegiance::Party,
            CombatModel::new("Warrior", 20, 5, 2).with_magic(3),
            Placement::default(),
        );
        let goblin = roster.enlist(
            Allegiance::Enemy,
            CombatModel::new("Goblin", 5, 3, 0),
            Placement::default(),
        );
        (roster, warrior, goblin)
    }

    #[test]
    fn damage_subtracts_and_clamps_at_zero() {
        let (mut roster, _, goblin) = duel();
        let target = roster.get_mut(goblin).unwrap();
        let change = apply_effect(target, 9);
        assert_eq!(change, HpChange { before: 5, after: 0 });
        assert!(change.died());
        assert!(!target.is_alive());
    }

    #[test]
    fn healing_clamps_at_max() {
        let (mut roster, warrior, _) = duel();
        let target = roster.get_mut(warrior).unwrap();
        apply_effect(target, 4);
        assert_eq!(target.hp(), 16);
        let change = apply_effect(target, -10);
        assert_eq!(change.after, 20);
    }

    #[test]
    fn miss_changes_nothing() {
        let (mut roster, warrior, _) = duel();
        let target = roster.get_mut(warrior).unwrap();
        let change = apply_effect(target, 0);
        assert_eq!(change.before, change.after);
    }

    #[test]
    fn attack_uses_attack_minus_defense() {
        let (roster, warrior, goblin) = duel();
        let actor = roster.get(goblin).unwrap();
        let target = roster.get(warrior).unwrap();
        let resolution = resolve(
            actor,
            ActionKind::Attack,
            &[target],
            &FormulaParams::exact(),
            &mut FixedRolls::new([0.0]),
        );
        assert_eq!(
            resolution,
            Resolution::Effects(vec![Effect {
                target: warrior,
                amount: 1
            }])
        );
    }

    #[test]
    fn failed_hit_roll_is_a_miss() {
        let (roster, warrior, goblin) = duel();
        let params = FormulaParams {
            hit_chance: 0.5,
            ..FormulaParams::exact()
        };
        let resolution = resolve(
            roster.get(warrior).unwrap(),
            ActionKind::Attack,
            &[roster.get(goblin).unwrap()],
            &params,
            &mut FixedRolls::new([0.75]),
        );
        assert_eq!(
            resolution,
            Resolution::Effects(vec![Effect {
                target: goblin,
                amount: 0
            }])
        );
    }

    #[test]
    fn variance_never_exceeds_bound() {
        let (roster, warrior, goblin) = duel();
        let params = FormulaParams {
            hit_chance: 1.0,
            variance: 3,
            ..FormulaParams::default()
        };
        let resolution = resolve(
            roster.get(warrior).unwrap(),
            ActionKind::Attack,
            &[roster.get(goblin).unwrap()],
            &params,
            &mut FixedRolls::new([0.0, 0.9999]),
        );
        assert_eq!(
            resolution,
            Resolution::Effects(vec![Effect {
                target: goblin,
                amount: 8
            }])
        );
    }

    #[test]
    fn heal_is_negative_and_skips_the_dead() {
        let (mut roster, warrior, goblin) = duel();
        let healer = roster.get(warrior).unwrap().clone();
        let params = FormulaParams::exact();
        let healed = resolve(
            &healer,
            ActionKind::Heal,
            &[&healer],
            &params,
            &mut FixedRolls::new([0.0]),
        );
        assert_eq!(
            healed,
            Resolution::Effects(vec![Effect {
                target: warrior,
                amount: -7
            }])
        );

        apply_effect(roster.get_mut(goblin).unwrap(), 99);
        let corpse = roster.get(goblin).unwrap();
        let missed = resolve(
            &healer,
            ActionKind::Heal,
            &[corpse],
            &params,
            &mut FixedRolls::new([0.0]),
        );
        assert_eq!(
            missed,
            Resolution::Effects(vec![Effect {
                target: goblin,
                amount: 0
            }])
        );
    }

    #[test]
    fn run_compares_roll_with_chance() {
        let (roster, warrior, _) = duel();
        let actor = roster.get(warrior).unwrap();
        let params = FormulaParams {
            run_chance: 0.5,
            ..FormulaParams::default()
        };
        let fled = resolve(actor, ActionKind::Run, &[], &params, &mut FixedRolls::new([0.2]));
        let caught = resolve(actor, ActionKind::Run, &[], &params, &mut FixedRolls::new([0.8]));
        assert_eq!(fled, Resolution::Escape { success: true });
        assert_eq!(caught, Resolution::Escape { success: false });
    }

    #[test]
    fn extreme_stats_saturate_instead_of_overflowing() {
        let mut roster = Roster::new();
        let titan = roster.enlist(
            Allegiance::Party,
            CombatModel::new("Titan", 10, i32::MAX, 0).with_magic(i32::MAX),
            Placement::default(),
        );
        let wisp = roster.enlist(
            Allegiance::Enemy,
            CombatModel::new("Wisp", 10, 1, -1),
            Placement::default(),
        );
        let params = FormulaParams {
            variance: i32::MAX,
            ..FormulaParams::exact()
        };
        let struck = resolve(
            roster.get(titan).unwrap(),
            ActionKind::Attack,
            &[roster.get(wisp).unwrap()],
            &params,
            &mut FixedRolls::new([0.0, 0.5]),
        );
        assert_eq!(
            struck,
            Resolution::Effects(vec![Effect {
                target: wisp,
                amount: i32::MAX
            }])
        );

        let healed = resolve(
            roster.get(titan).unwrap(),
            ActionKind::Heal,
            &[roster.get(titan).unwrap()],
            &params,
            &mut FixedRolls::new([0.0]),
        );
        assert_eq!(
            healed,
            Resolution::Effects(vec![Effect {
                target: titan,
                amount: -i32::MAX
            }])
        );
    }
}
