use crate::action::{Action, ActionKind};
use crate::combatant::{Allegiance, Combatant, Roster};
use crate::resolver::{resolve, FormulaParams, Resolution};
use crate::rng::SimulationRng;

/// Decides what an enemy does when its slot comes up.
pub trait EnemyPolicy: Send + Sync {
    fn decide(&mut self, actor: &Combatant, roster: &Roster, rng: &mut SimulationRng) -> Action;
}

/// Attacks a uniformly random living party member. Deterministic for a given seed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeededEnemyPolicy;

impl EnemyPolicy for SeededEnemyPolicy {
    fn decide(&mut self, actor: &Combatant, roster: &Roster, rng: &mut SimulationRng) -> Action {
        let candidates = roster.living_ids(actor.allegiance().opponent());
        match rng.pick_index(candidates.len()) {
            Some(idx) => Action::attack(actor.id(), candidates[idx]),
            None => Action::wait(actor.id()),
        }
    }
}

/// Always attacks the first living opponent in roster order.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstTargetPolicy;

impl EnemyPolicy for FirstTargetPolicy {
    fn decide(&mut self, actor: &Combatant, roster: &Roster, _rng: &mut SimulationRng) -> Action {
        match roster.first_living(actor.allegiance().opponent()) {
            Some(target) => Action::attack(actor.id(), target),
            None => Action::wait(actor.id()),
        }
    }
}

/// Decides whether a run attempt succeeds.
pub trait EscapePolicy: Send + Sync {
    fn attempt(
        &mut self,
        actor: &Combatant,
        params: &FormulaParams,
        rng: &mut SimulationRng,
    ) -> bool;
}

/// Succeeds when a roll lands below [`FormulaParams::run_chance`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ChanceEscape;

impl EscapePolicy for ChanceEscape {
    fn attempt(
        &mut self,
        actor: &Combatant,
        params: &FormulaParams,
        rng: &mut SimulationRng,
    ) -> bool {
        matches!(
            resolve(actor, ActionKind::Run, &[], params, rng),
            Resolution::Escape { success: true }
        )
    }
}

/// Fixed answer. `FixedEscape(false)` makes every enemy unshakeable.
#[derive(Debug, Clone, Copy)]
pub struct FixedEscape(pub bool);

impl EscapePolicy for FixedEscape {
    fn attempt(
        &mut self,
        _actor: &Combatant,
        _params: &FormulaParams,
        _rng: &mut SimulationRng,
    ) -> bool {
        self.0
    }
}

/// Called when the party's defeat has been acknowledged; resets the surrounding game
/// to a playable state.
pub trait GameStateHook: Send + Sync {
    fn reinitialize(&mut self);
}

impl<F> GameStateHook for F
where
    F: FnMut() + Send + Sync,
{
    fn reinitialize(&mut self) {
        self()
    }
}

/// Picks a party action for scripted or headless play: heal the most wounded ally
/// below a quarter of max hp when the actor has magic, otherwise attack the first
/// living enemy.
pub fn scripted_party_action(actor: &Combatant, roster: &Roster) -> Action {
    if actor.model().magic > 0 {
        let wounded = roster
            .living(Allegiance::Party)
            .filter(|ally| ally.hp().saturating_mul(4) < ally.max_hp())
            .min_by_key(|ally| ally.hp());
        if let Some(ally) = wounded {
            return Action::heal(actor.id(), ally.id());
        }
    }
    match roster.first_living(Allegiance::Enemy) {
        Some(target) => Action::attack(actor.id(), target),
        None => Action::wait(actor.id()),
    }
}
