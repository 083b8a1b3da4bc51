use std::f64::consts::TAU;
use std::time::Duration;

use glass_engine::{
    AlphaRenderer, Behavior, BlinkRenderer, Color, Cx, EntityId, EntityLogic, FillRenderer,
    FlipRenderer, Interaction, Interactor, RectBody, Scene, SceneError, Senses,
    INTERACTOR_SLOT, RENDERER_SLOT,
};
use kurbo::{Point, Rect, Size, Vec2};
use tracing::{debug, info};

use crate::config::DemoConfig;

const TILE_SIZE: f64 = 160.0;
const TILE_GAP: f64 = 60.0;
const TILE_ORIGIN: Point = Point::new(160.0, 400.0);
const TILE_LAYER: i32 = 1;
const CONTROL_LAYER: i32 = 1_000;
const NEXT_BUTTON_ORIGIN: Point = Point::new(1720.0, 60.0);
const NEXT_BUTTON_SIZE: Size = Size::new(140.0, 80.0);
const ORBIT_CENTER: Point = Point::new(960.0, 900.0);
const ORBIT_RADIUS: f64 = 80.0;
const ORBIT_PERIOD: Duration = Duration::from_secs(4);

/// Builds one board. Each round rotates the palette so consecutive boards
/// are easy to tell apart after a hand-off.
pub fn build_board(config: &DemoConfig, round: usize) -> Result<Scene, SceneError> {
    let mut scene = Scene::new();
    let root = scene.root();
    scene.set_layer(root, Some(0))?;
    scene.set_behavior_now(
        root,
        Some(Box::new(FillRenderer::new(config.background))),
        None,
    )?;

    let tray = scene.spawn();
    scene.set_child_now(root, Some(tray), Some("tray"), "")?;
    let palette = if config.palette.is_empty() {
        vec![Color::WHITE]
    } else {
        config.palette.clone()
    };
    for index in 0..config.tile_count {
        let color = palette[(index + round) % palette.len()];
        let alternate = palette[(index + round + 1) % palette.len()];
        let tile = spawn_tile(&mut scene, color, alternate)?;
        let origin = TILE_ORIGIN + Vec2::new(index as f64 * (TILE_SIZE + TILE_GAP), 0.0);
        scene.set_position(tile, origin)?;
        scene.set_child_now(tray, Some(tile), None, "tile")?;
    }

    let next = scene.spawn();
    scene.set_layer(next, Some(CONTROL_LAYER))?;
    scene.set_position(next, NEXT_BUTTON_ORIGIN)?;
    scene.set_behavior_now(
        next,
        Some(Box::new(RectBody::new(Rect::from_origin_size(
            Point::ZERO,
            NEXT_BUTTON_SIZE,
        )))),
        None,
    )?;
    scene.set_behavior_now(
        next,
        Some(Box::new(AlphaRenderer::new(FillRenderer::new(Color::WHITE), 0.8))),
        None,
    )?;
    scene.set_behavior_now(
        next,
        Some(Box::new(NextButton {
            size: NEXT_BUTTON_SIZE,
        })),
        None,
    )?;
    scene.set_child_now(root, Some(next), Some("next"), "")?;

    let orbit = scene.spawn_with(Orbit {
        center: ORBIT_CENTER,
        radius: ORBIT_RADIUS,
        period: ORBIT_PERIOD,
    });
    scene.set_layer(orbit, Some(TILE_LAYER))?;
    scene.set_behavior_now(orbit, Some(Box::new(RectBody::sized(40.0, 40.0))), None)?;
    scene.set_behavior_now(
        orbit,
        Some(Box::new(BlinkRenderer::new(
            FlipRenderer::new(FillRenderer::new(palette[round % palette.len()]), true, false),
            Duration::from_millis(600),
        ))),
        None,
    )?;
    scene.set_child_now(root, Some(orbit), Some("orbit"), "")?;

    info!(
        round,
        tiles = config.tile_count,
        entities = scene.entity_count(),
        "board_built"
    );
    Ok(scene)
}

fn spawn_tile(scene: &mut Scene, color: Color, alternate: Color) -> Result<EntityId, SceneError> {
    let tile = scene.spawn();
    scene.set_layer(tile, Some(TILE_LAYER))?;
    scene.set_behavior_now(tile, Some(Box::new(RectBody::sized(TILE_SIZE, TILE_SIZE))), None)?;
    scene.set_behavior_now(tile, Some(Box::new(FillRenderer::new(color))), None)?;
    scene.set_behavior_now(
        tile,
        Some(Box::new(TileHandle {
            size: Size::new(TILE_SIZE, TILE_SIZE),
            alternate,
        })),
        None,
    )?;
    Ok(tile)
}

/// Drag to move, tap to swap colors. Touching a tile lifts it above its
/// siblings.
struct TileHandle {
    size: Size,
    alternate: Color,
}

impl Interactor for TileHandle {
    fn sense(&self, point: Point) -> Senses {
        if Rect::from_origin_size(Point::ZERO, self.size).contains(point) {
            Senses::TAP | Senses::DRAG
        } else {
            Senses::empty()
        }
    }

    fn interact(&mut self, interaction: Interaction, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        let id = cx.id();
        let scene = cx.scene_mut();
        match interaction {
            Interaction::Touch(_) => raise(scene, id),
            Interaction::Tap(_) => {
                if let Some(fill) = scene.behavior_as_mut::<FillRenderer>(id, RENDERER_SLOT) {
                    std::mem::swap(&mut fill.color, &mut self.alternate);
                    debug!(entity = ?id, "tile_recolored");
                }
                Ok(())
            }
            Interaction::Drag(by) => {
                let Some(position) = scene.position(id) else {
                    return Ok(());
                };
                scene.set_position(id, position + by)
            }
        }
    }
}

impl Behavior for TileHandle {
    fn default_slot(&self) -> Option<&'static str> {
        Some(INTERACTOR_SLOT)
    }

    fn as_interactor(&self) -> Option<&dyn Interactor> {
        Some(self)
    }

    fn as_interactor_mut(&mut self) -> Option<&mut dyn Interactor> {
        Some(self)
    }
}

fn raise(scene: &mut Scene, id: EntityId) -> Result<(), SceneError> {
    let Some(parent) = scene.parent_of(id) else {
        return Ok(());
    };
    let top = scene
        .children_of(parent)
        .into_iter()
        .filter(|sibling| *sibling != id)
        .filter_map(|sibling| scene.layer(sibling))
        .max();
    let current = scene.layer(id).unwrap_or(TILE_LAYER);
    match top {
        Some(top) if top >= current => {
            scene.set_layer(id, Some((top + 1).min(CONTROL_LAYER - 1)))
        }
        _ => Ok(()),
    }
}

/// Hands the window to a fresh board when tapped.
struct NextButton {
    size: Size,
}

impl Interactor for NextButton {
    fn sense(&self, point: Point) -> Senses {
        if Rect::from_origin_size(Point::ZERO, self.size).contains(point) {
            Senses::TAP
        } else {
            Senses::empty()
        }
    }

    fn interact(&mut self, interaction: Interaction, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        match interaction {
            Interaction::Tap(_) => {
                info!("next_board_requested");
                Err(cx.hand_off())
            }
            _ => Ok(()),
        }
    }
}

impl Behavior for NextButton {
    fn default_slot(&self) -> Option<&'static str> {
        Some(INTERACTOR_SLOT)
    }

    fn as_interactor(&self) -> Option<&dyn Interactor> {
        Some(self)
    }

    fn as_interactor_mut(&mut self) -> Option<&mut dyn Interactor> {
        Some(self)
    }
}

/// Circles its host around `center` once per `period` of scene time.
struct Orbit {
    center: Point,
    radius: f64,
    period: Duration,
}

impl Orbit {
    fn position_at(&self, time: Duration) -> Point {
        let turns = time.as_secs_f64() / self.period.as_secs_f64().max(f64::EPSILON);
        let angle = turns * TAU;
        self.center + Vec2::new(angle.cos(), angle.sin()) * self.radius
    }
}

impl EntityLogic for Orbit {
    fn activate(&mut self, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        let id = cx.id();
        let at = self.position_at(cx.time());
        cx.scene_mut().set_position(id, at)
    }

    fn update(&mut self, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        let id = cx.id();
        let at = self.position_at(cx.time());
        cx.scene_mut().set_position(id, at)
    }
}
