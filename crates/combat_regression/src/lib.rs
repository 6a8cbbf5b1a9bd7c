//! Helpers for deterministic regression tests.

use combat_core::{
    scripted_party_action, Action, Allegiance, AutoAck, CombatError, CombatEvent, CombatMachine,
    CombatModel, CombatOutcome, CombatScene, CombatantId, FirstTargetPolicy, FixedOrder,
    FormulaParams, Placement, Progress, Roster,
};
use serde_json::json;

pub use combat_core::DEFAULT_SEED;

/// Knight and Cleric against a bat and an orc. Exact formulas and a fixed order,
/// so the whole fight is known in advance.
pub fn orc_ambush() -> CombatMachine {
    let mut roster = Roster::new();
    let knight = roster.enlist(
        Allegiance::Party,
        CombatModel::new("Knight", 20, 6, 0),
        Placement::at(48.0, 64.0),
    );
    let cleric = roster.enlist(
        Allegiance::Party,
        CombatModel::new("Cleric", 14, 2, 0).with_magic(3),
        Placement::at(48.0, 112.0),
    );
    let bat = roster.enlist(
        Allegiance::Enemy,
        CombatModel::new("Bat", 6, 3, 0).with_rewards(2, 1),
        Placement::at(224.0, 64.0),
    );
    let orc = roster.enlist(
        Allegiance::Enemy,
        CombatModel::new("Orc", 15, 7, 2).with_rewards(20, 12),
        Placement::at(224.0, 112.0),
    );
    scripted(roster, &[knight, bat, cleric, orc])
}

pub struct Mending {
    pub machine: CombatMachine,
    pub knight: CombatantId,
    pub cleric: CombatantId,
    pub slime: CombatantId,
}

/// A wounded Knight, a Cleric and a slime. Choices are submitted by hand.
pub fn mending() -> Mending {
    let mut roster = Roster::new();
    let knight = roster.enlist(
        Allegiance::Party,
        CombatModel::new("Knight", 20, 4, 0).with_hp(5),
        Placement::at(48.0, 64.0),
    );
    let cleric = roster.enlist(
        Allegiance::Party,
        CombatModel::new("Cleric", 14, 2, 0).with_magic(3),
        Placement::at(48.0, 112.0),
    );
    let slime = roster.enlist(
        Allegiance::Enemy,
        CombatModel::new("Slime", 9, 2, 0).with_rewards(3, 2),
        Placement::at(224.0, 88.0),
    );
    Mending {
        machine: scripted(roster, &[cleric, slime, knight]),
        knight,
        cleric,
        slime,
    }
}

fn scripted(roster: Roster, order: &[CombatantId]) -> CombatMachine {
    let mut machine = CombatMachine::new(roster, FormulaParams::exact(), DEFAULT_SEED)
        .with_turn_order(FixedOrder::new(order.to_vec()))
        .with_enemy_policy(FirstTargetPolicy)
        .with_scene(CombatScene::default());
    machine.listen(AutoAck);
    machine
}

/// Starts `machine` and plays the party with [`scripted_party_action`]. Expects every
/// event to be acknowledged synchronously.
pub fn drive_scripted(machine: &mut CombatMachine) -> Result<CombatOutcome, CombatError> {
    let mut progress = machine.start()?;
    loop {
        match progress {
            Progress::AwaitingChoice(actor) => {
                let action = match machine.roster().get(actor) {
                    Some(combatant) => scripted_party_action(combatant, machine.roster()),
                    None => Action::wait(actor),
                };
                progress = machine.submit(action)?;
            }
            Progress::AwaitingAck(event) => return Err(CombatError::StalledWait { event }),
            Progress::Finished(outcome) => return Ok(outcome),
        }
    }
}

pub fn trace_line(event: &CombatEvent) -> String {
    format!("{} {}", event.name(), event.message())
}

pub fn trace_lines(journal: &[CombatEvent]) -> Vec<String> {
    journal.iter().map(trace_line).collect()
}

/// Compact fingerprint of a run for determinism checks.
pub fn fingerprint(machine: &CombatMachine) -> serde_json::Value {
    let hp: Vec<i32> = machine.roster().iter().map(|c| c.hp()).collect();
    json!({
        "seed": machine.seed(),
        "round": machine.round(),
        "events": machine.journal().len(),
        "hp": hp,
    })
}
