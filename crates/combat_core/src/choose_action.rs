//! Collects one action per living party member, one member at a time.

use std::collections::VecDeque;

use tracing::debug;

use crate::action::{Action, ActionKind};
use crate::combatant::{Allegiance, CombatantId, Roster};
use crate::error::{ChoiceError, CombatError};

/// What the parent hands over when a round's choose-action phase begins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChooseActionPayload {
    pub pending: Vec<CombatantId>,
    pub enemies: Vec<CombatantId>,
}

/// The parent's submission callback. Records the action and shrinks the Pending Set,
/// or rejects it without changing anything.
pub trait ChoiceSink {
    fn submit_choice(&mut self, action: Action) -> Result<(), CombatError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    NextChooser(CombatantId),
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuSource {
    Combatant(CombatantId),
    Action(ActionKind),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub kind: ActionKind,
    pub source: MenuSource,
}

impl MenuItem {
    /// The action this item stands for when chosen by `actor`.
    pub fn action_for(&self, actor: CombatantId) -> Action {
        match self.source {
            MenuSource::Combatant(target) => Action::new(actor, self.kind, vec![target]),
            MenuSource::Action(kind) => Action::new(actor, kind, Vec::new()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Selecting(CombatantId),
    Inert,
}

#[derive(Clone, Debug)]
pub struct ChooseAction {
    queue: VecDeque<CombatantId>,
    enemies: Vec<CombatantId>,
    stage: Stage,
    pointed_at: Option<CombatantId>,
}

impl ChooseAction {
    pub fn new(payload: ChooseActionPayload) -> Self {
        Self {
            queue: payload.pending.into(),
            enemies: payload.enemies,
            stage: Stage::Inert,
            pointed_at: None,
        }
    }

    /// Pops the next pending combatant and starts accepting its choice. Once nobody is
    /// left the sub-machine goes inert and stays that way.
    pub fn advance(&mut self) -> Option<CombatantId> {
        self.pointed_at = None;
        match self.queue.pop_front() {
            Some(next) => {
                debug!(target: "combat.choose", chooser = %next, "choosing");
                self.stage = Stage::Selecting(next);
                Some(next)
            }
            None => {
                self.stage = Stage::Inert;
                None
            }
        }
    }

    pub fn current(&self) -> Option<CombatantId> {
        match self.stage {
            Stage::Selecting(current) => Some(current),
            Stage::Inert => None,
        }
    }

    pub fn is_inert(&self) -> bool {
        self.stage == Stage::Inert
    }

    /// Relays `action` to `sink` and moves on to the next pending combatant.
    pub fn submit(
        &mut self,
        action: Action,
        sink: &mut impl ChoiceSink,
    ) -> Result<SubmitOutcome, CombatError> {
        let current = self.current().ok_or(ChoiceError::NotChoosing)?;
        let actor = action.actor();
        if actor != current && self.queue.contains(&actor) {
            return Err(ChoiceError::OutOfTurn { actor, current }.into());
        }
        sink.submit_choice(action)?;
        Ok(match self.advance() {
            Some(next) => SubmitOutcome::NextChooser(next),
            None => SubmitOutcome::Complete,
        })
    }

    /// Transient target used only to place the indicator.
    pub fn pointed_at(&self) -> Option<CombatantId> {
        self.pointed_at
    }

    pub fn point_at(&mut self, target: Option<CombatantId>) {
        self.pointed_at = target;
    }

    /// Highlighting a menu item that refers to a combatant moves the pointer to it.
    pub fn select(&mut self, item: &MenuItem) {
        if let MenuSource::Combatant(target) = item.source {
            self.pointed_at = Some(target);
        }
    }

    /// Options open to the current chooser.
    pub fn menu(&self, roster: &Roster) -> Vec<MenuItem> {
        let Some(current) = self.current() else {
            return Vec::new();
        };
        let mut items: Vec<MenuItem> = self
            .enemies
            .iter()
            .filter_map(|&id| roster.get(id))
            .filter(|enemy| enemy.is_alive())
            .map(|enemy| MenuItem {
                label: format!("Attack {}", enemy.name()),
                kind: ActionKind::Attack,
                source: MenuSource::Combatant(enemy.id()),
            })
            .collect();
        if roster.get(current).is_some_and(|c| c.model().magic > 0) {
            items.extend(roster.living(Allegiance::Party).map(|ally| MenuItem {
                label: format!("Heal {}", ally.name()),
                kind: ActionKind::Heal,
                source: MenuSource::Combatant(ally.id()),
            }));
        }
        for kind in [ActionKind::Run, ActionKind::Wait] {
            items.push(MenuItem {
                label: kind.label().to_owned(),
                kind,
                source: MenuSource::Action(kind),
            });
        }
        items
    }
}
