//! Hosts an encounter inside a bevy `App`.
//!
//! The gate listener installed here parks every `(event, token)` pair in a
//! [`NoticeInbox`]. Each frame the notices become timed effects that share the
//! event's token, effects tick down with [`Time`], and the machine is pumped once the
//! last effect has completed its part.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bevy::prelude::*;
use tracing::{debug, error, info, warn};

use crate::action::Action;
use crate::error::CombatError;
use crate::event::CombatEvent;
use crate::gate::{CompletionPart, CompletionToken, Listener};
use crate::machine::{CombatMachine, Progress};

const DEFAULT_MESSAGE_SECS: f32 = 1.2;
const DEFAULT_SHAKE_SECS: f32 = 0.25;
const DEFAULT_POPUP_SECS: f32 = 0.8;

pub struct CombatPresentationPlugin;

impl Plugin for CombatPresentationPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<PresentationSettings>() {
            app.insert_resource(PresentationSettings::default());
        }
        app.init_resource::<NoticeInbox>()
            .init_resource::<ActiveEffects>()
            .init_resource::<EncounterStatus>()
            .add_event::<PointerClicked>()
            .add_event::<SubmitAction>()
            .add_event::<CombatNotice>()
            .add_systems(Startup, begin_encounter)
            .add_systems(
                Update,
                (
                    route_clicks,
                    route_submissions,
                    collect_notices,
                    tick_effects,
                    pump_encounter,
                )
                    .chain(),
            );
    }
}

/// The encounter being presented. Inserted by the host before startup.
#[derive(Resource)]
pub struct ActiveEncounter(pub CombatMachine);

#[derive(Resource, Clone, Debug, PartialEq)]
pub struct PresentationSettings {
    pub message: Duration,
    pub shake: Duration,
    pub popup: Duration,
    /// Log a warning when one event has been on screen longer than this.
    pub stall_warning: Option<Duration>,
}

impl PresentationSettings {
    /// Every effect finishes on the first frame. Used by headless hosts and tests.
    pub fn instant() -> Self {
        Self {
            message: Duration::ZERO,
            shake: Duration::ZERO,
            popup: Duration::ZERO,
            stall_warning: None,
        }
    }
}

impl Default for PresentationSettings {
    fn default() -> Self {
        Self {
            message: Duration::from_secs_f32(DEFAULT_MESSAGE_SECS),
            shake: Duration::from_secs_f32(DEFAULT_SHAKE_SECS),
            popup: Duration::from_secs_f32(DEFAULT_POPUP_SECS),
            stall_warning: Some(Duration::from_secs(10)),
        }
    }
}

/// A pointer press in world coordinates.
#[derive(Event, Clone, Copy, Debug)]
pub struct PointerClicked(pub Vec2);

/// A party choice coming from the host's UI.
#[derive(Event, Clone, Debug)]
pub struct SubmitAction(pub Action);

/// Fired once per presented event so UI hosts can render the narrative line.
#[derive(Event, Clone, Debug)]
pub struct CombatNotice {
    pub event: CombatEvent,
    pub message: String,
}

/// Where the hosted encounter stopped last, and the last problem it reported.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct EncounterStatus {
    pub progress: Option<Progress>,
    pub rejected: Option<CombatError>,
    pub failure: Option<CombatError>,
}

impl EncounterStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self.progress, Some(Progress::Finished(_)))
    }

    fn record(&mut self, result: Result<Progress, CombatError>) {
        match result {
            Ok(progress) => {
                if self.progress.as_ref() != Some(&progress) {
                    debug!(target: "combat.presentation", ?progress, "encounter progress");
                }
                self.progress = Some(progress);
            }
            Err(err @ CombatError::InvalidChoice(_)) => {
                warn!(target: "combat.presentation", error = %err, "choice rejected");
                self.rejected = Some(err);
            }
            Err(err) => {
                error!(target: "combat.presentation", error = %err, "encounter failed");
                self.failure = Some(err);
            }
        }
    }
}

type Parked = (CombatEvent, CompletionToken);

/// Shared queue between the gate listener and the ECS.
#[derive(Resource, Clone, Default)]
pub struct NoticeInbox(Arc<Mutex<VecDeque<Parked>>>);

impl NoticeInbox {
    /// Gate listener that claims every token and parks it with its event.
    pub fn listener(&self) -> impl Listener + 'static {
        let inbox = Arc::clone(&self.0);
        move |event: &CombatEvent, done: &mut Option<CompletionToken>| {
            let Some(token) = done.take() else {
                return;
            };
            match inbox.lock() {
                Ok(mut queue) => queue.push_back((event.clone(), token)),
                Err(_) => {
                    warn!(target: "combat.presentation", event = event.name(), "notice inbox poisoned")
                }
            }
        }
    }

    fn drain(&self) -> Vec<Parked> {
        match self.0.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EffectKind {
    Message(String),
    Shake,
    /// Damage (positive) or healing (negative) number at a screen point.
    Popup { amount: i32, screen: Vec2 },
}

#[derive(Debug)]
pub struct TimedEffect {
    pub kind: EffectKind,
    remaining: Duration,
    part: Option<CompletionPart>,
}

impl TimedEffect {
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Returns true once the effect has run out and released its share of the token.
    fn tick(&mut self, delta: Duration) -> bool {
        self.remaining = self.remaining.saturating_sub(delta);
        if !self.remaining.is_zero() {
            return false;
        }
        if let Some(part) = self.part.take() {
            part.complete();
        }
        true
    }
}

#[derive(Resource, Debug, Default)]
pub struct ActiveEffects {
    effects: Vec<TimedEffect>,
}

impl ActiveEffects {
    pub fn iter(&self) -> impl Iterator<Item = &TimedEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

fn begin_encounter(
    mut encounter: Option<ResMut<ActiveEncounter>>,
    inbox: Res<NoticeInbox>,
    settings: Res<PresentationSettings>,
    mut status: ResMut<EncounterStatus>,
) {
    let Some(encounter) = encounter.as_mut() else {
        warn!(target: "combat.presentation", "no ActiveEncounter resource; nothing to present");
        return;
    };
    let machine = &mut encounter.0;
    machine.listen(inbox.listener());
    machine.gate_mut().set_stall_warning(settings.stall_warning);
    info!(target: "combat.presentation", seed = machine.seed(), "presenting encounter");
    status.record(machine.start());
}

fn route_clicks(
    mut clicks: EventReader<PointerClicked>,
    mut encounter: Option<ResMut<ActiveEncounter>>,
) {
    let Some(encounter) = encounter.as_mut() else {
        clicks.clear();
        return;
    };
    for PointerClicked(point) in clicks.read() {
        match encounter.0.click(*point) {
            Ok(Some(target)) => {
                debug!(target: "combat.presentation", combatant = %target, "pointer selected")
            }
            Ok(None) => {}
            Err(err) => warn!(target: "combat.presentation", error = %err, "click ignored"),
        }
    }
}

fn route_submissions(
    mut submissions: EventReader<SubmitAction>,
    mut encounter: Option<ResMut<ActiveEncounter>>,
    mut status: ResMut<EncounterStatus>,
) {
    let Some(encounter) = encounter.as_mut() else {
        submissions.clear();
        return;
    };
    for SubmitAction(action) in submissions.read() {
        status.record(encounter.0.submit(action.clone()));
    }
}

fn collect_notices(
    inbox: Res<NoticeInbox>,
    encounter: Option<Res<ActiveEncounter>>,
    settings: Res<PresentationSettings>,
    mut effects: ResMut<ActiveEffects>,
    mut notices: EventWriter<CombatNotice>,
) {
    for (event, token) in inbox.drain() {
        let message = event.message();
        let mut kinds = vec![(EffectKind::Message(message.clone()), settings.message)];
        if let CombatEvent::Attack {
            damage, defender, ..
        } = &event
        {
            if *damage > 0 {
                kinds.push((EffectKind::Shake, settings.shake));
            }
            if *damage != 0 {
                let screen = encounter
                    .as_ref()
                    .and_then(|encounter| encounter.0.screen_position(defender.id))
                    .unwrap_or_else(|| Vec2::from(defender.position));
                kinds.push((
                    EffectKind::Popup {
                        amount: *damage,
                        screen,
                    },
                    settings.popup,
                ));
            }
        }
        debug!(target: "combat.presentation", event = event.name(), effects = kinds.len(), "presenting");
        let parts = token.split(kinds.len());
        effects
            .effects
            .extend(kinds.into_iter().zip(parts).map(|((kind, duration), part)| {
                TimedEffect {
                    kind,
                    remaining: duration,
                    part: Some(part),
                }
            }));
        notices.send(CombatNotice { event, message });
    }
}

fn tick_effects(time: Res<Time>, mut effects: ResMut<ActiveEffects>) {
    let delta = time.delta();
    effects.effects.retain_mut(|effect| !effect.tick(delta));
}

fn pump_encounter(
    mut encounter: Option<ResMut<ActiveEncounter>>,
    mut status: ResMut<EncounterStatus>,
) {
    let Some(encounter) = encounter.as_mut() else {
        return;
    };
    if status.failure.is_some() || (encounter.0.is_over() && status.is_finished()) {
        return;
    }
    let result = encounter.0.pump();
    if let Ok(Progress::Finished(outcome)) = &result {
        if !status.is_finished() {
            info!(target: "combat.presentation", ?outcome, "encounter finished");
        }
    }
    status.record(result);
}
