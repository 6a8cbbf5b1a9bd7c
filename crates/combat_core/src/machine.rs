//! Top-level combat controller.
//!
//! `choose-action -> begin-turn -> (attack | run | other-action) -> begin-turn* | victory | defeat | escape`
//!
//! The machine only ever advances inside [`CombatMachine::start`],
//! [`CombatMachine::submit`] and [`CombatMachine::pump`]. Whenever an event is out
//! through the gate it stops and reports [`Progress::AwaitingAck`] until the token is
//! completed, so turn N is fully presented before turn N+1 is computed.

use std::collections::{HashMap, VecDeque};

use bevy::math::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::{Action, ActionKind};
use crate::choose_action::{
    ChoiceSink, ChooseAction, ChooseActionPayload, MenuItem, SubmitOutcome,
};
use crate::combatant::{Allegiance, Combatant, CombatantId, Roster};
use crate::error::{ChoiceError, CombatError};
use crate::event::{CombatEvent, Participant};
use crate::gate::{Gate, Listener, WaitStatus};
use crate::policy::{ChanceEscape, EnemyPolicy, EscapePolicy, GameStateHook, SeededEnemyPolicy};
use crate::resolver::{apply_effect, resolve, FormulaParams, Resolution};
use crate::rng::SimulationRng;
use crate::spatial::CombatScene;
use crate::turn::{ShuffledOrder, TurnOrderSource, TurnQueue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombatPhase {
    Idle,
    ChooseAction,
    BeginTurn,
    Attack,
    Run,
    OtherAction,
    Victory,
    Defeat,
    Escape,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictorySummary {
    pub exp: u32,
    pub gold: u32,
    pub defeated: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum CombatOutcome {
    Victory(VictorySummary),
    Defeat,
    Escape { by: CombatantId },
}

/// Why the machine stopped advancing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    AwaitingChoice(CombatantId),
    AwaitingAck(&'static str),
    Finished(CombatOutcome),
}

/// Pending Set plus Player Choice Map for the current round.
#[derive(Clone, Debug, Default)]
pub struct RoundChoices {
    pending: Vec<CombatantId>,
    submitted: HashMap<CombatantId, Action>,
}

impl RoundChoices {
    fn reset(&mut self, pending: Vec<CombatantId>) {
        self.pending = pending;
        self.submitted.clear();
    }

    pub fn pending(&self) -> &[CombatantId] {
        &self.pending
    }

    pub fn get(&self, actor: CombatantId) -> Option<&Action> {
        self.submitted.get(&actor)
    }

    pub fn submitted(&self) -> usize {
        self.submitted.len()
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    fn record(&mut self, action: Action, roster: &Roster) -> Result<(), CombatError> {
        let actor = action.actor();
        if self.submitted.contains_key(&actor) {
            return Err(ChoiceError::AlreadySubmitted(actor).into());
        }
        let slot = self
            .pending
            .iter()
            .position(|id| *id == actor)
            .ok_or(ChoiceError::NotPending(actor))?;
        validate_targets(&action, roster)?;
        self.pending.remove(slot);
        self.submitted.insert(actor, action);
        Ok(())
    }
}

fn validate_targets(action: &Action, roster: &Roster) -> Result<(), ChoiceError> {
    let actor = action.actor();
    let combatant = roster.get(actor).ok_or(ChoiceError::NotPending(actor))?;
    if !action.kind().needs_target() {
        return match action.targets().first() {
            Some(&target) => Err(ChoiceError::InvalidTarget { actor, target }),
            None => Ok(()),
        };
    }
    let side = combatant.allegiance();
    let wanted = if action.kind() == ActionKind::Heal {
        if combatant.model().magic <= 0 {
            return Err(ChoiceError::CannotHeal(actor));
        }
        side
    } else {
        side.opponent()
    };
    if action.targets().is_empty() {
        return Err(ChoiceError::MissingTarget(actor));
    }
    for &target in action.targets() {
        let valid = roster
            .get(target)
            .is_some_and(|c| c.is_alive() && c.allegiance() == wanted);
        if !valid {
            return Err(ChoiceError::InvalidTarget { actor, target });
        }
    }
    Ok(())
}

struct Submission<'a> {
    choices: &'a mut RoundChoices,
    roster: &'a Roster,
}

impl ChoiceSink for Submission<'_> {
    fn submit_choice(&mut self, action: Action) -> Result<(), CombatError> {
        self.choices.record(action, self.roster)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AfterAck {
    NextTurn,
    Escape(CombatantId),
    Reinitialize,
}

#[derive(Debug)]
enum State {
    Idle,
    ChooseAction(ChooseAction),
    BeginTurn,
    Presenting {
        phase: CombatPhase,
        queued: VecDeque<CombatEvent>,
        then: AfterAck,
    },
    Finished(CombatOutcome),
}

/// Owns everything one encounter needs: roster, turn order, round choices, the gate
/// and the seeded RNG.
pub struct CombatMachine {
    roster: Roster,
    params: FormulaParams,
    rng: SimulationRng,
    order_source: Box<dyn TurnOrderSource>,
    enemy_policy: Box<dyn EnemyPolicy>,
    escape_policy: Box<dyn EscapePolicy>,
    reset_hook: Option<Box<dyn GameStateHook>>,
    scene: Option<CombatScene>,
    gate: Gate,
    queue: TurnQueue,
    choices: RoundChoices,
    state: State,
    round: u32,
    journal: Vec<CombatEvent>,
}

impl std::fmt::Debug for CombatMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatMachine")
            .field("phase", &self.phase())
            .field("round", &self.round)
            .field("seed", &self.rng.seed())
            .field("roster", &self.roster.len())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl CombatMachine {
    pub fn new(roster: Roster, params: FormulaParams, seed: u64) -> Self {
        Self {
            roster,
            params,
            rng: SimulationRng::new(seed),
            order_source: Box::new(ShuffledOrder),
            enemy_policy: Box::new(SeededEnemyPolicy),
            escape_policy: Box::new(ChanceEscape),
            reset_hook: None,
            scene: None,
            gate: Gate::new(),
            queue: TurnQueue::default(),
            choices: RoundChoices::default(),
            state: State::Idle,
            round: 0,
            journal: Vec::new(),
        }
    }

    pub fn with_turn_order(mut self, source: impl TurnOrderSource + 'static) -> Self {
        self.order_source = Box::new(source);
        self
    }

    pub fn with_enemy_policy(mut self, policy: impl EnemyPolicy + 'static) -> Self {
        self.enemy_policy = Box::new(policy);
        self
    }

    pub fn with_escape_policy(mut self, policy: impl EscapePolicy + 'static) -> Self {
        self.escape_policy = Box::new(policy);
        self
    }

    pub fn with_reset_hook(mut self, hook: impl GameStateHook + 'static) -> Self {
        self.reset_hook = Some(Box::new(hook));
        self
    }

    pub fn with_scene(mut self, scene: CombatScene) -> Self {
        self.bind_scene(scene);
        self
    }

    pub fn bind_scene(&mut self, scene: CombatScene) {
        self.scene = Some(scene);
    }

    pub fn listen(&mut self, listener: impl Listener + 'static) {
        self.gate.listen(listener);
    }

    pub fn gate_mut(&mut self) -> &mut Gate {
        &mut self.gate
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn params(&self) -> &FormulaParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Turn Order slots of the current round that have not acted yet.
    pub fn turn_order(&self) -> Vec<CombatantId> {
        self.queue.upcoming()
    }

    pub fn current_actor(&self) -> Option<CombatantId> {
        self.queue.current()
    }

    pub fn choices(&self) -> &RoundChoices {
        &self.choices
    }

    pub fn pending(&self) -> &[CombatantId] {
        self.choices.pending()
    }

    pub fn chooser(&self) -> Option<&ChooseAction> {
        match &self.state {
            State::ChooseAction(chooser) => Some(chooser),
            _ => None,
        }
    }

    /// Every event emitted so far, in emission order.
    pub fn journal(&self) -> &[CombatEvent] {
        &self.journal
    }

    pub fn outcome(&self) -> Option<&CombatOutcome> {
        match &self.state {
            State::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.state, State::Finished(_))
    }

    pub fn phase(&self) -> CombatPhase {
        match &self.state {
            State::Idle => CombatPhase::Idle,
            State::ChooseAction(_) => CombatPhase::ChooseAction,
            State::BeginTurn => CombatPhase::BeginTurn,
            State::Presenting { phase, .. } => *phase,
            State::Finished(CombatOutcome::Victory(_)) => CombatPhase::Victory,
            State::Finished(CombatOutcome::Defeat) => CombatPhase::Defeat,
            State::Finished(CombatOutcome::Escape { .. }) => CombatPhase::Escape,
        }
    }

    /// Enters the first choose-action phase.
    pub fn start(&mut self) -> Result<Progress, CombatError> {
        if !matches!(self.state, State::Idle) {
            return Err(CombatError::state("combat has already started"));
        }
        if self.scene.is_none() {
            return Err(CombatError::state("no combat scene bound"));
        }
        if self.roster.side_defeated(Allegiance::Party) {
            return Err(CombatError::state("no living party members"));
        }
        if self.roster.side_defeated(Allegiance::Enemy) {
            return Err(CombatError::state("no living enemies"));
        }
        info!(
            target: "combat.machine",
            seed = self.rng.seed(),
            combatants = self.roster.len(),
            "combat started"
        );
        self.enter_choose_action()?;
        self.pump()
    }

    /// Submission entry point for the current chooser. Rejected submissions leave the
    /// round untouched. The last submission runs the round up to the next suspension.
    pub fn submit(&mut self, action: Action) -> Result<Progress, CombatError> {
        let State::ChooseAction(chooser) = &mut self.state else {
            return Err(ChoiceError::NotChoosing.into());
        };
        let actor = action.actor();
        let kind = action.kind();
        let mut sink = Submission {
            choices: &mut self.choices,
            roster: &self.roster,
        };
        let outcome = chooser.submit(action, &mut sink)?;
        debug!(target: "combat.machine", actor = %actor, ?kind, pending = self.choices.pending().len(), "choice recorded");
        if let SubmitOutcome::NextChooser(next) = outcome {
            return Ok(Progress::AwaitingChoice(next));
        }
        if !self.choices.is_complete() {
            return Err(CombatError::state(
                "choose-action ended with party members still pending",
            ));
        }
        info!(target: "combat.machine", round = self.round, "begin-turn");
        self.state = State::BeginTurn;
        self.pump()
    }

    /// Advances as far as possible: executes turns until a choice is needed, an event
    /// is waiting for its token, or combat is over.
    pub fn pump(&mut self) -> Result<Progress, CombatError> {
        loop {
            match &self.state {
                State::Idle => return Err(CombatError::state("combat has not started")),
                State::ChooseAction(chooser) => {
                    return chooser
                        .current()
                        .map(Progress::AwaitingChoice)
                        .ok_or_else(|| CombatError::state("choose-action has nobody choosing"));
                }
                State::BeginTurn => self.begin_turn()?,
                State::Presenting { .. } => match self.gate.poll()? {
                    WaitStatus::Pending(event) => return Ok(Progress::AwaitingAck(event)),
                    WaitStatus::Completed(_) => self.after_ack()?,
                    WaitStatus::Idle => {
                        return Err(CombatError::state("presenting without an open wait"))
                    }
                },
                State::Finished(outcome) => return Ok(Progress::Finished(outcome.clone())),
            }
        }
    }

    /// Pointer input. When choosing and at least one living combatant is hit, the
    /// first one becomes the pointed-at target.
    pub fn click(&mut self, point: Vec2) -> Result<Option<CombatantId>, CombatError> {
        let scene = self
            .scene
            .as_ref()
            .ok_or_else(|| CombatError::state("no combat scene bound"))?;
        let hits = scene.spatial.hits_at(&self.roster, point);
        let State::ChooseAction(chooser) = &mut self.state else {
            return Ok(None);
        };
        let target = hits.into_iter().find(|id| self.roster.is_alive(*id));
        if let Some(target) = target {
            debug!(target: "combat.machine", combatant = %target, "pointer target");
            chooser.point_at(Some(target));
        }
        Ok(target)
    }

    pub fn menu(&self) -> Vec<MenuItem> {
        self.chooser()
            .map(|chooser| chooser.menu(&self.roster))
            .unwrap_or_default()
    }

    pub fn select_menu_item(&mut self, item: &MenuItem) {
        if let State::ChooseAction(chooser) = &mut self.state {
            chooser.select(item);
        }
    }

    /// Screen position of the targeting indicator: the pointed-at combatant, or the
    /// current chooser when nothing is pointed at.
    pub fn indicator_position(&self) -> Option<Vec2> {
        let chooser = self.chooser()?;
        let focus = chooser.pointed_at().or(chooser.current())?;
        self.screen_position(focus)
    }

    pub fn screen_position(&self, id: CombatantId) -> Option<Vec2> {
        let scene = self.scene.as_ref()?;
        self.roster.get(id).map(|c| scene.project(c.position()))
    }

    /// Ends the encounter and hands the roster back. Open waits are dropped.
    pub fn teardown(mut self) -> Roster {
        info!(target: "combat.machine", phase = ?self.phase(), "encounter torn down");
        self.gate.reset();
        self.roster
    }

    fn enter_choose_action(&mut self) -> Result<(), CombatError> {
        let party = self.roster.living_ids(Allegiance::Party);
        let enemies = self.roster.living_ids(Allegiance::Enemy);
        let living: Vec<CombatantId> = party.iter().chain(enemies.iter()).copied().collect();
        let order = self.order_source.order(living.clone(), &mut self.rng);
        if !is_permutation(&order, &living) {
            return Err(CombatError::state(
                "turn order is not a permutation of the living combatants",
            ));
        }
        self.round += 1;
        info!(target: "combat.machine", round = self.round, order = ?order, "choose-action");
        self.queue = TurnQueue::new(order);
        self.choices.reset(party.clone());
        let mut chooser = ChooseAction::new(ChooseActionPayload {
            pending: party,
            enemies,
        });
        chooser.advance();
        self.state = State::ChooseAction(chooser);
        Ok(())
    }

    fn begin_turn(&mut self) -> Result<(), CombatError> {
        while let Some(actor_id) = self.queue.next_actor() {
            let actor = self.roster.get(actor_id).ok_or_else(|| {
                CombatError::state(format!("unknown combatant {actor_id} in turn order"))
            })?;
            if !actor.is_alive() {
                debug!(target: "combat.machine", actor = %actor_id, "skipping fallen combatant");
                continue;
            }
            let action = match actor.allegiance() {
                Allegiance::Party => self.choices.get(actor_id).cloned().ok_or_else(|| {
                    CombatError::state(format!("no action recorded for {actor_id}"))
                })?,
                Allegiance::Enemy => self.enemy_policy.decide(actor, &self.roster, &mut self.rng),
            };
            return self.execute(action);
        }
        debug!(target: "combat.machine", round = self.round, "round complete");
        self.enter_choose_action()
    }

    fn execute(&mut self, action: Action) -> Result<(), CombatError> {
        let actor_id = action.actor();
        let actor = self
            .roster
            .get(actor_id)
            .cloned()
            .ok_or_else(|| CombatError::state(format!("unknown actor {actor_id}")))?;
        debug!(target: "combat.machine", actor = %actor_id, kind = ?action.kind(), targets = ?action.targets(), "execute");
        match action.kind() {
            ActionKind::Attack | ActionKind::Heal => {
                let target_ids = self.resolve_targets(&actor, &action);
                let targets: Vec<&Combatant> = target_ids
                    .iter()
                    .filter_map(|id| self.roster.get(*id))
                    .collect();
                let resolution =
                    resolve(&actor, action.kind(), &targets, &self.params, &mut self.rng);
                let Resolution::Effects(effects) = resolution else {
                    return Err(CombatError::state("attack resolved without effects"));
                };
                let mut events = VecDeque::with_capacity(effects.len());
                for effect in effects {
                    let target = self.roster.get_mut(effect.target).ok_or_else(|| {
                        CombatError::state(format!("unknown target {}", effect.target))
                    })?;
                    let change = apply_effect(target, effect.amount);
                    let defender = Participant::of(target);
                    if change.died() {
                        info!(target: "combat.machine", defender = %effect.target, "combatant fell");
                    }
                    let attacker = self
                        .roster
                        .get(actor_id)
                        .map(Participant::of)
                        .unwrap_or_else(|| Participant::of(&actor));
                    events.push_back(CombatEvent::Attack {
                        action: action.kind(),
                        damage: effect.amount,
                        attacker,
                        defender,
                    });
                }
                self.present(CombatPhase::Attack, events, AfterAck::NextTurn)
            }
            ActionKind::Run => {
                let success = self
                    .escape_policy
                    .attempt(&actor, &self.params, &mut self.rng);
                info!(target: "combat.machine", actor = %actor_id, success, "run attempted");
                let then = if success {
                    AfterAck::Escape(actor_id)
                } else {
                    AfterAck::NextTurn
                };
                let event = CombatEvent::Run {
                    player: Participant::of(&actor),
                    success,
                };
                self.present(CombatPhase::Run, VecDeque::from([event]), then)
            }
            ActionKind::Wait => {
                let event = CombatEvent::Wait {
                    actor: Participant::of(&actor),
                };
                self.present(
                    CombatPhase::OtherAction,
                    VecDeque::from([event]),
                    AfterAck::NextTurn,
                )
            }
        }
    }

    /// Attacks aimed at someone who fell before the actor's slot go to the first
    /// living opponent instead. Heals keep their target.
    fn resolve_targets(&self, actor: &Combatant, action: &Action) -> Vec<CombatantId> {
        let mut resolved: Vec<CombatantId> = Vec::with_capacity(action.targets().len());
        for &target in action.targets() {
            let target = if action.kind() == ActionKind::Attack && !self.roster.is_alive(target) {
                match self.roster.first_living(actor.allegiance().opponent()) {
                    Some(replacement) => replacement,
                    None => continue,
                }
            } else {
                target
            };
            if !resolved.contains(&target) {
                resolved.push(target);
            }
        }
        resolved
    }

    fn present(
        &mut self,
        phase: CombatPhase,
        mut events: VecDeque<CombatEvent>,
        then: AfterAck,
    ) -> Result<(), CombatError> {
        let Some(first) = events.pop_front() else {
            return self.conclude(then);
        };
        self.state = State::Presenting {
            phase,
            queued: events,
            then,
        };
        self.emit(first)
    }

    fn emit(&mut self, event: CombatEvent) -> Result<(), CombatError> {
        let token = self.gate.wait(event.name())?;
        self.journal.push(event.clone());
        self.gate.emit(&event, token);
        Ok(())
    }

    fn after_ack(&mut self) -> Result<(), CombatError> {
        let State::Presenting { queued, then, .. } = &mut self.state else {
            return Err(CombatError::state("acknowledgement outside of presentation"));
        };
        let then = *then;
        match queued.pop_front() {
            Some(next) => self.emit(next),
            None => self.conclude(then),
        }
    }

    fn conclude(&mut self, then: AfterAck) -> Result<(), CombatError> {
        match then {
            AfterAck::NextTurn => self.check_outcome(),
            AfterAck::Escape(by) => {
                info!(target: "combat.machine", by = %by, "party escaped");
                self.state = State::Finished(CombatOutcome::Escape { by });
                Ok(())
            }
            AfterAck::Reinitialize => {
                if let Some(hook) = self.reset_hook.as_mut() {
                    hook.reinitialize();
                }
                info!(target: "combat.machine", "defeat acknowledged; game state reinitialized");
                self.state = State::Finished(CombatOutcome::Defeat);
                Ok(())
            }
        }
    }

    fn check_outcome(&mut self) -> Result<(), CombatError> {
        if self.roster.side_defeated(Allegiance::Enemy) {
            let summary = self.victory_summary();
            info!(
                target: "combat.machine",
                exp = summary.exp,
                gold = summary.gold,
                round = self.round,
                "victory"
            );
            self.state = State::Finished(CombatOutcome::Victory(summary));
            return Ok(());
        }
        if self.roster.side_defeated(Allegiance::Party) {
            info!(target: "combat.machine", round = self.round, "party defeated");
            return self.present(
                CombatPhase::Defeat,
                VecDeque::from([CombatEvent::Defeat]),
                AfterAck::Reinitialize,
            );
        }
        self.state = State::BeginTurn;
        Ok(())
    }

    fn victory_summary(&self) -> VictorySummary {
        self.roster
            .iter()
            .filter(|c| c.allegiance() == Allegiance::Enemy)
            .fold(VictorySummary::default(), |mut summary, enemy| {
                summary.exp = summary.exp.saturating_add(enemy.model().exp);
                summary.gold = summary.gold.saturating_add(enemy.model().gold);
                summary.defeated.push(enemy.name().to_owned());
                summary
            })
    }
}

fn is_permutation(order: &[CombatantId], living: &[CombatantId]) -> bool {
    let mut left = order.to_vec();
    let mut right = living.to_vec();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}
