use bevy::prelude::*;
use combat_core::presentation::{
    ActiveEffects, EffectKind, EncounterStatus, PointerClicked, SubmitAction,
};
use combat_core::{
    Action, ActiveEncounter, Allegiance, CameraView, CombatMachine, CombatModel, CombatOutcome,
    CombatPresentationPlugin, CombatScene, CombatantId, FirstTargetPolicy, FixedOrder,
    FormulaParams, HitRegions, Placement, PresentationSettings, Progress, Roster,
    ScaledProjector,
};

struct Duel {
    warrior: CombatantId,
    goblin: CombatantId,
    machine: CombatMachine,
}

fn duel() -> Duel {
    let mut roster = Roster::new();
    let warrior = roster.enlist(
        Allegiance::Party,
        CombatModel::new("Warrior", 20, 5, 0),
        Placement::at(10.0, 10.0),
    );
    let goblin = roster.enlist(
        Allegiance::Enemy,
        CombatModel::new("Goblin", 5, 3, 0).with_rewards(2, 5),
        Placement::at(110.0, 10.0),
    );
    let camera = CameraView {
        scale: 2.0,
        offset: Vec2::new(10.0, 10.0),
    };
    let machine = CombatMachine::new(roster, FormulaParams::exact(), 3)
        .with_turn_order(FixedOrder::new([goblin, warrior]))
        .with_enemy_policy(FirstTargetPolicy)
        .with_scene(CombatScene::new(HitRegions, ScaledProjector, camera));
    Duel {
        warrior,
        goblin,
        machine,
    }
}

fn app_with(machine: CombatMachine, settings: PresentationSettings) -> App {
    let mut app = App::new();
    app.insert_resource(ActiveEncounter(machine));
    app.insert_resource(settings);
    app.add_plugins(MinimalPlugins);
    app.add_plugins(CombatPresentationPlugin);
    app
}

#[test]
fn instant_presentation_runs_the_duel_to_victory() {
    let Duel {
        warrior,
        goblin,
        machine,
    } = duel();
    let mut app = app_with(machine, PresentationSettings::instant());

    app.update();
    assert_eq!(
        app.world().resource::<EncounterStatus>().progress,
        Some(Progress::AwaitingChoice(warrior))
    );

    app.world_mut()
        .send_event(SubmitAction(Action::attack(warrior, goblin)));
    for _ in 0..10 {
        app.update();
        if app.world().resource::<EncounterStatus>().is_finished() {
            break;
        }
    }

    let status = app.world().resource::<EncounterStatus>();
    assert!(status.failure.is_none(), "{:?}", status.failure);
    assert!(matches!(
        status.progress,
        Some(Progress::Finished(CombatOutcome::Victory(_)))
    ));
    let encounter = app.world().resource::<ActiveEncounter>();
    assert_eq!(encounter.0.journal().len(), 2);
    assert!(app.world().resource::<ActiveEffects>().is_empty());
}

#[test]
fn running_effects_hold_the_machine() {
    let Duel {
        warrior,
        goblin,
        machine,
    } = duel();
    let mut app = app_with(machine, PresentationSettings::default());

    app.update();
    app.world_mut()
        .send_event(SubmitAction(Action::attack(warrior, goblin)));
    app.update();

    let status = app.world().resource::<EncounterStatus>();
    assert_eq!(status.progress, Some(Progress::AwaitingAck("combat:attack")));

    let effects = app.world().resource::<ActiveEffects>();
    let kinds: Vec<&EffectKind> = effects.iter().map(|effect| &effect.kind).collect();
    assert_eq!(kinds.len(), 3);
    assert!(matches!(kinds[0], EffectKind::Message(text) if text.contains("Goblin hits Warrior")));
    assert_eq!(kinds[1], &EffectKind::Shake);
    assert_eq!(
        kinds[2],
        &EffectKind::Popup {
            amount: 3,
            screen: Vec2::ZERO,
        }
    );
    assert_eq!(app.world().resource::<ActiveEncounter>().0.journal().len(), 1);
}

#[test]
fn clicks_move_the_indicator() {
    let Duel { goblin, machine, .. } = duel();
    let mut app = app_with(machine, PresentationSettings::instant());

    app.update();
    app.world_mut()
        .send_event(PointerClicked(Vec2::new(112.0, 8.0)));
    app.update();

    let encounter = &app.world().resource::<ActiveEncounter>().0;
    assert_eq!(
        encounter.chooser().and_then(|chooser| chooser.pointed_at()),
        Some(goblin)
    );
    assert_eq!(encounter.indicator_position(), Some(Vec2::new(200.0, 0.0)));
}
