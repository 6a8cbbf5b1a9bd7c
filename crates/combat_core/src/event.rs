use serde::{Deserialize, Serialize};

use crate::action::ActionKind;
use crate::combatant::{Combatant, CombatantId};

pub const ATTACK: &str = "combat:attack";
pub const RUN: &str = "combat:run";
pub const WAIT: &str = "combat:wait";
pub const DEFEAT: &str = "combat:defeat";

/// A combatant as seen by the presentation layer at the moment an event fired.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: CombatantId,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub position: [f32; 2],
}

impl Participant {
    pub fn of(combatant: &Combatant) -> Self {
        let position = combatant.position();
        Self {
            id: combatant.id(),
            name: combatant.name().to_owned(),
            hp: combatant.hp(),
            max_hp: combatant.max_hp(),
            position: [position.x, position.y],
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

/// Events broadcast through the gate. Each one is paired with a completion token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CombatEvent {
    /// Damage (`damage > 0`), healing (`damage < 0`) or a miss (`damage == 0`).
    /// `action` tells a missed heal from a missed strike.
    #[serde(rename = "combat:attack")]
    Attack {
        action: ActionKind,
        damage: i32,
        attacker: Participant,
        defender: Participant,
    },
    #[serde(rename = "combat:run")]
    Run { player: Participant, success: bool },
    #[serde(rename = "combat:wait")]
    Wait { actor: Participant },
    #[serde(rename = "combat:defeat")]
    Defeat,
}

impl CombatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CombatEvent::Attack { .. } => ATTACK,
            CombatEvent::Run { .. } => RUN,
            CombatEvent::Wait { .. } => WAIT,
            CombatEvent::Defeat => DEFEAT,
        }
    }

    /// Narrative line shown while the event is presented.
    pub fn message(&self) -> String {
        match self {
            CombatEvent::Attack {
                action,
                damage,
                attacker,
                defender,
            } => {
                if *damage == 0 && *action == ActionKind::Heal {
                    format!("{} tries to heal {}... MISSED!", attacker.name, defender.name)
                } else if *damage == 0 {
                    format!("{} attacks {}... MISSED!", attacker.name, defender.name)
                } else if *damage < 0 {
                    format!("{} heals {} for {}.", attacker.name, defender.name, -damage)
                } else if !defender.is_alive() {
                    format!(
                        "{} hits {} for {} damage. {} is defeated!",
                        attacker.name, defender.name, damage, defender.name
                    )
                } else {
                    format!(
                        "{} hits {} for {} damage.",
                        attacker.name, defender.name, damage
                    )
                }
            }
            CombatEvent::Run { player, success } => {
                if *success {
                    format!("{} bravely runs away!", player.name)
                } else {
                    format!("{} tries to run, but cannot escape!", player.name)
                }
            }
            CombatEvent::Wait { actor } => format!("{} waits.", actor.name),
            CombatEvent::Defeat => "Your party has been defeated...".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(name: &str, hp: i32) -> Participant {
        Participant {
            id: CombatantId(1),
            name: name.to_owned(),
            hp,
            max_hp: 10,
            position: [0.0, 0.0],
        }
    }

    #[test]
    fn kind_tag_matches_event_name() {
        let event = CombatEvent::Run {
            player: participant("Warrior", 10),
            success: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], event.name());
        assert_eq!(json["success"], false);

        let defeat = serde_json::to_value(CombatEvent::Defeat).unwrap();
        assert_eq!(defeat["kind"], DEFEAT);
    }

    #[test]
    fn miss_message_names_the_missed_action() {
        let strike = CombatEvent::Attack {
            action: ActionKind::Attack,
            damage: 0,
            attacker: participant("Goblin", 5),
            defender: participant("Warrior", 10),
        };
        assert_eq!(strike.message(), "Goblin attacks Warrior... MISSED!");

        let heal = CombatEvent::Attack {
            action: ActionKind::Heal,
            damage: 0,
            attacker: participant("Mage", 8),
            defender: participant("Warrior", 0),
        };
        assert_eq!(heal.message(), "Mage tries to heal Warrior... MISSED!");
        let json = serde_json::to_value(&heal).unwrap();
        assert_eq!(json["action"], "heal");
    }
}
