use bevy::prelude::*;

/// Placement of an entity on the 2D scene, in meters and degrees.
///
/// The renderer reads this; the core only ever mutates it.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct Scene2D {
    pub center: Vec2,
    pub width: f32,
    pub height: f32,
    /// Degrees, counter-clockwise.
    pub rotation: f32,
    /// Size of the first visual child (the nine-patch image of a platform).
    pub image_size: Vec2,
    pub visible: bool,
    pub touchable: bool,
}

impl Scene2D {
    pub fn new(center: Vec2, width: f32, height: f32, rotation: f32) -> Self {
        Self {
            center,
            width,
            height,
            rotation,
            image_size: Vec2::new(width, height),
            visible: true,
            touchable: true,
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn set_shown(&mut self, shown: bool) {
        self.visible = shown;
        self.touchable = shown;
    }

    /// Corners of the rotated rectangle.
    pub fn corners(&self) -> [Vec2; 4] {
        let half = self.size() / 2.0;
        let rotation = Vec2::from_angle(self.rotation.to_radians());
        [
            Vec2::new(-half.x, -half.y),
            Vec2::new(half.x, -half.y),
            Vec2::new(half.x, half.y),
            Vec2::new(-half.x, half.y),
        ]
        .map(|corner| self.center + rotation.rotate(corner))
    }

    /// Axis-aligned bounds of the rotated rectangle as `(min, max)`.
    pub fn aabb(&self) -> (Vec2, Vec2) {
        let corners = self.corners();
        let min = corners.iter().copied().fold(Vec2::INFINITY, Vec2::min);
        let max = corners.iter().copied().fold(Vec2::NEG_INFINITY, Vec2::max);
        (min, max)
    }
}

/// Which color of the active scheme an entity is drawn with. The scheme itself
/// belongs to the renderer.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorType {
    Light,
    #[default]
    Dark,
    DarkerDark,
}
