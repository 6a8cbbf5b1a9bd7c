//! World-space collaborators: hit testing for pointer input and projection to screen
//! space for indicators and damage numbers.

use bevy::math::Vec2;

use crate::combatant::{CombatantId, Roster};

/// Answers "which combatants are under this world point".
pub trait SpatialQuery: Send + Sync {
    fn hits_at(&self, roster: &Roster, point: Vec2) -> Vec<CombatantId>;
}

/// Circular hit regions around each combatant's position.
#[derive(Debug, Default, Clone, Copy)]
pub struct HitRegions;

impl SpatialQuery for HitRegions {
    fn hits_at(&self, roster: &Roster, point: Vec2) -> Vec<CombatantId> {
        roster
            .iter()
            .filter(|c| c.position().distance(point) <= c.hit_radius())
            .map(|c| c.id())
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    pub scale: f32,
    pub offset: Vec2,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

/// Maps a world point to a screen point for a given camera.
pub trait CoordinateProjector: Send + Sync {
    fn project(&self, world: Vec2, camera: &CameraView) -> Vec2;
}

/// `screen = (world - offset) * scale`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScaledProjector;

impl CoordinateProjector for ScaledProjector {
    fn project(&self, world: Vec2, camera: &CameraView) -> Vec2 {
        (world - camera.offset) * camera.scale
    }
}

/// The scene an encounter is fought in. Binding one is a precondition for starting.
pub struct CombatScene {
    pub spatial: Box<dyn SpatialQuery>,
    pub projector: Box<dyn CoordinateProjector>,
    pub camera: CameraView,
}

impl CombatScene {
    pub fn new(
        spatial: impl SpatialQuery + 'static,
        projector: impl CoordinateProjector + 'static,
        camera: CameraView,
    ) -> Self {
        Self {
            spatial: Box::new(spatial),
            projector: Box::new(projector),
            camera,
        }
    }

    pub fn project(&self, world: Vec2) -> Vec2 {
        self.projector.project(world, &self.camera)
    }
}

impl Default for CombatScene {
    fn default() -> Self {
        Self::new(HitRegions, ScaledProjector, CameraView::default())
    }
}

impl std::fmt::Debug for CombatScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatScene")
            .field("camera", &self.camera)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{Allegiance, CombatModel, Placement};

    #[test]
    fn hit_regions_respect_radius() {
        let mut roster = Roster::new();
        let near = roster.enlist(
            Allegiance::Enemy,
            CombatModel::new("Goblin", 5, 3, 0),
            Placement::at(10.0, 0.0).with_radius(4.0),
        );
        roster.enlist(
            Allegiance::Enemy,
            CombatModel::new("Orc", 9, 4, 1),
            Placement::at(40.0, 0.0).with_radius(4.0),
        );
        assert_eq!(HitRegions.hits_at(&roster, Vec2::new(12.0, 1.0)), vec![near]);
        assert!(HitRegions.hits_at(&roster, Vec2::new(25.0, 0.0)).is_empty());
    }

    #[test]
    fn projection_applies_offset_then_scale() {
        let camera = CameraView {
            scale: 2.0,
            offset: Vec2::new(5.0, 5.0),
        };
        let screen = ScaledProjector.project(Vec2::new(7.0, 9.0), &camera);
        assert_eq!(screen, Vec2::new(4.0, 8.0));
    }
}
