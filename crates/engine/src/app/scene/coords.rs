use kurbo::{Point, Rect, Vec2};

use super::{EntityId, Scene};

/// Values that can be moved between entity coordinate frames.
///
/// Rectangles are mapped corner by corner, so a negative scale yields an
/// inverted rectangle. Call `Rect::abs` before using one for layout or hits.
pub trait Coord: Copy {
    fn translated(self, by: Vec2) -> Self;
    fn scaled(self, by: Vec2) -> Self;
    fn unscaled(self, by: Vec2) -> Self;
}

impl Coord for Point {
    fn translated(self, by: Vec2) -> Self {
        self + by
    }

    fn scaled(self, by: Vec2) -> Self {
        Point::new(self.x * by.x, self.y * by.y)
    }

    fn unscaled(self, by: Vec2) -> Self {
        Point::new(self.x / by.x, self.y / by.y)
    }
}

impl Coord for Rect {
    fn translated(self, by: Vec2) -> Self {
        Rect::new(self.x0 + by.x, self.y0 + by.y, self.x1 + by.x, self.y1 + by.y)
    }

    fn scaled(self, by: Vec2) -> Self {
        Rect::new(self.x0 * by.x, self.y0 * by.y, self.x1 * by.x, self.y1 * by.y)
    }

    fn unscaled(self, by: Vec2) -> Self {
        Rect::new(self.x0 / by.x, self.y0 / by.y, self.x1 / by.x, self.y1 / by.y)
    }
}

fn has_zero_axis(scale: Vec2) -> bool {
    scale.x == 0.0 || scale.y == 0.0
}

impl Scene {
    /// Maps from the entity's local space to its parent's: scale, then translate.
    pub fn to_parent<C: Coord>(&self, id: EntityId, coord: C) -> C {
        let Some(node) = self.nodes.get(id) else {
            return coord;
        };
        let scaled = match node.scale {
            Some(scale) => coord.scaled(scale),
            None => coord,
        };
        scaled.translated(node.position.to_vec2())
    }

    /// Maps from the parent's space into the entity's local space.
    ///
    /// A zero scale axis produces non-finite components.
    pub fn to_local<C: Coord>(&self, id: EntityId, coord: C) -> C {
        let Some(node) = self.nodes.get(id) else {
            return coord;
        };
        let moved = coord.translated(-node.position.to_vec2());
        match node.scale {
            Some(scale) => moved.unscaled(scale),
            None => moved,
        }
    }

    /// Maps from local space to root space (the space the root is drawn into).
    /// `None` when the entity is not under this scene's root.
    pub fn to_root<C: Coord>(&self, id: EntityId, coord: C) -> Option<C> {
        let mut current = id;
        let mut coord = coord;
        loop {
            self.nodes.get(current)?;
            coord = self.to_parent(current, coord);
            if current == self.root {
                return Some(coord);
            }
            current = self.parent_of(current)?;
        }
    }

    /// Inverse of [`Scene::to_root`]. `None` for detached entities and for
    /// chains containing a zero scale axis.
    pub fn from_root<C: Coord>(&self, id: EntityId, coord: C) -> Option<C> {
        let chain = self.chain_to_root(id)?;
        let mut coord = coord;
        for entity in chain.iter().rev() {
            if self.scale(*entity).is_some_and(has_zero_axis) {
                return None;
            }
            coord = self.to_local(*entity, coord);
        }
        Some(coord)
    }

    /// Converts between two entity spaces. `None` on either side means root space.
    pub fn convert<C: Coord>(
        &self,
        coord: C,
        from: Option<EntityId>,
        to: Option<EntityId>,
    ) -> Option<C> {
        let in_root = match from {
            Some(from) => self.to_root(from, coord)?,
            None => coord,
        };
        match to {
            Some(to) => self.from_root(to, in_root),
            None => Some(in_root),
        }
    }

    /// Maps a displacement from root space into the entity's local space.
    pub fn vector_from_root(&self, id: EntityId, vector: Vec2) -> Option<Vec2> {
        let origin = self.from_root(id, Point::ZERO)?;
        let tip = self.from_root(id, vector.to_point())?;
        Some(tip - origin)
    }

    /// Body rectangle of `target` expressed in `viewer` space, normalized.
    pub fn take_body(&self, viewer: EntityId, target: EntityId) -> Option<Rect> {
        let rect = self.body_rect(target)?;
        self.convert(rect, Some(target), Some(viewer))
            .map(|rect| rect.abs())
    }

    fn chain_to_root(&self, id: EntityId) -> Option<Vec<EntityId>> {
        let mut chain = Vec::new();
        let mut current = id;
        loop {
            self.nodes.get(current)?;
            chain.push(current);
            if current == self.root {
                return Some(chain);
            }
            current = self.parent_of(current)?;
        }
    }
}
