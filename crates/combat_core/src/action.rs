use serde::{Deserialize, Serialize};

use crate::combatant::CombatantId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Attack,
    Heal,
    Run,
    /// Forfeit the turn.
    Wait,
}

impl ActionKind {
    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Attack => "Attack",
            ActionKind::Heal => "Heal",
            ActionKind::Run => "Run",
            ActionKind::Wait => "Wait",
        }
    }

    pub fn needs_target(self) -> bool {
        matches!(self, ActionKind::Attack | ActionKind::Heal)
    }
}

/// One submitted decision. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    actor: CombatantId,
    kind: ActionKind,
    targets: Vec<CombatantId>,
}

impl Action {
    pub fn new(actor: CombatantId, kind: ActionKind, targets: Vec<CombatantId>) -> Self {
        Self {
            actor,
            kind,
            targets,
        }
    }

    pub fn attack(actor: CombatantId, target: CombatantId) -> Self {
        Self::new(actor, ActionKind::Attack, vec![target])
    }

    pub fn heal(actor: CombatantId, target: CombatantId) -> Self {
        Self::new(actor, ActionKind::Heal, vec![target])
    }

    pub fn run(actor: CombatantId) -> Self {
        Self::new(actor, ActionKind::Run, Vec::new())
    }

    pub fn wait(actor: CombatantId) -> Self {
        Self::new(actor, ActionKind::Wait, Vec::new())
    }

    pub fn actor(&self) -> CombatantId {
        self.actor
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn targets(&self) -> &[CombatantId] {
        &self.targets
    }
}
