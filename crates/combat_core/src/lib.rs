//! Turn-based combat engine.
//!
//! A [`CombatMachine`] owns one encounter. Party members pick their actions one at a
//! time through the [`ChooseAction`] sub-machine; the round then executes in a
//! seeded random turn order, and every resulting [`CombatEvent`] is handed to the
//! presentation layer through the [`Gate`] together with a [`CompletionToken`]. The
//! machine does not move on until that token is completed.

pub mod action;
pub mod choose_action;
pub mod combatant;
pub mod error;
pub mod event;
pub mod gate;
pub mod machine;
pub mod policy;
pub mod presentation;
pub mod resolver;
pub mod rng;
pub mod spatial;
pub mod turn;

pub use action::{Action, ActionKind};
pub use choose_action::{ChooseAction, ChooseActionPayload, MenuItem, MenuSource};
pub use combatant::{Allegiance, CombatModel, Combatant, CombatantId, Placement, Roster};
pub use error::{ChoiceError, CombatError};
pub use event::{CombatEvent, Participant};
pub use gate::{AutoAck, CompletionPart, CompletionToken, Gate, Listener, WaitStatus};
pub use machine::{CombatMachine, CombatOutcome, CombatPhase, Progress, VictorySummary};
pub use policy::{
    scripted_party_action, ChanceEscape, EnemyPolicy, EscapePolicy, FirstTargetPolicy,
    FixedEscape, GameStateHook, SeededEnemyPolicy,
};
pub use presentation::{ActiveEncounter, CombatPresentationPlugin, PresentationSettings};
pub use resolver::{FormulaParams, Resolution};
pub use rng::{SimulationRng, DEFAULT_SEED};
pub use spatial::{CameraView, CombatScene, HitRegions, ScaledProjector};
pub use turn::{FixedOrder, ShuffledOrder, TurnOrderSource};
