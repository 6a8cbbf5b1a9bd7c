use thiserror::Error;

use crate::combatant::CombatantId;

/// Failures surfaced by the combat engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    /// An operation ran without its preconditions (no scene bound, empty side,
    /// unknown combatant, missing recorded choice). Fatal to the encounter.
    #[error("invalid combat state: {0}")]
    InvalidState(String),
    /// A submission was rejected. Round state is left untouched.
    #[error("invalid choice: {0}")]
    InvalidChoice(#[from] ChoiceError),
    /// A completion token was dropped without being invoked.
    #[error("completion token for `{event}` was abandoned; combat cannot advance")]
    StalledWait { event: &'static str },
}

impl CombatError {
    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChoiceError {
    #[error("{0} is not waiting to choose an action")]
    NotPending(CombatantId),
    #[error("{0} already submitted an action this round")]
    AlreadySubmitted(CombatantId),
    #[error("{actor} submitted while {current} is choosing")]
    OutOfTurn {
        actor: CombatantId,
        current: CombatantId,
    },
    #[error("{target} is not a valid target for {actor}")]
    InvalidTarget {
        actor: CombatantId,
        target: CombatantId,
    },
    #[error("{0} submitted an action without a target")]
    MissingTarget(CombatantId),
    #[error("{0} has no magic to heal with")]
    CannotHeal(CombatantId),
    #[error("no combatant is choosing an action")]
    NotChoosing,
}
