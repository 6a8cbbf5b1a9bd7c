use std::fmt;

use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HIT_RADIUS: f32 = 16.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Allegiance {
    Party,
    Enemy,
}

impl Allegiance {
    pub fn opponent(self) -> Self {
        match self {
            Allegiance::Party => Allegiance::Enemy,
            Allegiance::Enemy => Allegiance::Party,
        }
    }
}

/// Display model of a combatant: name plus the stats the resolver reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatModel {
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    #[serde(default)]
    pub magic: i32,
    #[serde(default)]
    pub exp: u32,
    #[serde(default)]
    pub gold: u32,
}

impl CombatModel {
    pub fn new(name: impl Into<String>, max_hp: i32, attack: i32, defense: i32) -> Self {
        Self {
            name: name.into(),
            hp: max_hp,
            max_hp,
            attack,
            defense,
            magic: 0,
            exp: 0,
            gold: 0,
        }
    }

    pub fn with_magic(mut self, magic: i32) -> Self {
        self.magic = magic;
        self
    }

    pub fn with_hp(mut self, hp: i32) -> Self {
        self.hp = hp.clamp(0, self.max_hp);
        self
    }

    pub fn with_rewards(mut self, exp: u32, gold: u32) -> Self {
        self.exp = exp;
        self.gold = gold;
        self
    }
}

/// Where a combatant stands in world space and how large its hit region is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub position: Vec2,
    pub hit_radius: f32,
}

impl Placement {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            hit_radius: DEFAULT_HIT_RADIUS,
        }
    }

    pub fn with_radius(mut self, hit_radius: f32) -> Self {
        self.hit_radius = hit_radius;
        self
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

#[derive(Clone, Debug)]
pub struct Combatant {
    id: CombatantId,
    allegiance: Allegiance,
    model: CombatModel,
    placement: Placement,
}

impl Combatant {
    pub fn id(&self) -> CombatantId {
        self.id
    }

    pub fn allegiance(&self) -> Allegiance {
        self.allegiance
    }

    pub fn model(&self) -> &CombatModel {
        &self.model
    }

    pub fn name(&self) -> &str {
        &self.model.name
    }

    pub fn hp(&self) -> i32 {
        self.model.hp
    }

    pub fn max_hp(&self) -> i32 {
        self.model.max_hp
    }

    pub fn position(&self) -> Vec2 {
        self.placement.position
    }

    pub fn hit_radius(&self) -> f32 {
        self.placement.hit_radius
    }

    pub fn is_alive(&self) -> bool {
        self.model.hp > 0
    }

    pub(crate) fn set_hp(&mut self, hp: i32) {
        self.model.hp = hp;
    }
}

/// Every combatant taking part in one encounter, party and enemies alike.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    combatants: Vec<Combatant>,
    next_id: u32,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enlist(
        &mut self,
        allegiance: Allegiance,
        model: CombatModel,
        placement: Placement,
    ) -> CombatantId {
        self.next_id += 1;
        let id = CombatantId(self.next_id);
        self.combatants.push(Combatant {
            id,
            allegiance,
            model,
            placement,
        });
        id
    }

    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter()
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    pub fn living(&self, allegiance: Allegiance) -> impl Iterator<Item = &Combatant> {
        self.combatants
            .iter()
            .filter(move |c| c.allegiance == allegiance && c.is_alive())
    }

    pub fn living_ids(&self, allegiance: Allegiance) -> Vec<CombatantId> {
        self.living(allegiance).map(Combatant::id).collect()
    }

    pub fn is_alive(&self, id: CombatantId) -> bool {
        self.get(id).is_some_and(Combatant::is_alive)
    }

    /// True once no member of `allegiance` is left standing.
    pub fn side_defeated(&self, allegiance: Allegiance) -> bool {
        self.living(allegiance).next().is_none()
    }

    pub fn first_living(&self, allegiance: Allegiance) -> Option<CombatantId> {
        self.living(allegiance).next().map(Combatant::id)
    }
}
