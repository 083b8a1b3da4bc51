use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

use kurbo::{Point, Rect, Vec2};

use super::*;
use crate::app::rendering::{Canvas, Color, FillRenderer, PixelCanvas};

type Journal = Rc<RefCell<Vec<String>>>;

fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.borrow().clone()
}

fn count(journal: &Journal, entry: &str) -> usize {
    journal.borrow().iter().filter(|item| *item == entry).count()
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

struct Traced {
    name: &'static str,
    journal: Journal,
}

impl Traced {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: Rc::clone(journal),
        }
    }

    fn log(&self, hook: &str) {
        self.journal
            .borrow_mut()
            .push(format!("{}.{hook}", self.name));
    }
}

impl EntityLogic for Traced {
    fn activate(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        self.log("activate");
        Ok(())
    }

    fn update(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        self.log("update");
        Ok(())
    }

    fn after(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        self.log("after");
        Ok(())
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        let origin = canvas.transform() * Point::ZERO;
        self.journal.borrow_mut().push(format!(
            "{}.draw@{},{}",
            self.name, origin.x, origin.y
        ));
        Ok(())
    }
}

struct TracedBehavior {
    name: &'static str,
    journal: Journal,
}

impl Behavior for TracedBehavior {
    fn attached(&mut self, host: Option<EntityId>) {
        let state = if host.is_some() { "attached" } else { "detached" };
        self.journal
            .borrow_mut()
            .push(format!("{}.{state}", self.name));
    }

    fn behave(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        self.journal
            .borrow_mut()
            .push(format!("{}.behave", self.name));
        Ok(())
    }

    fn stay(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        self.journal
            .borrow_mut()
            .push(format!("{}.stay", self.name));
        Ok(())
    }
}

fn scene_with_target() -> Scene {
    Scene::with_target(Box::new(PixelCanvas::new(64, 64)))
}

fn attach(scene: &mut Scene, parent: EntityId, child: EntityId, name: &str) {
    scene
        .set_child_now(parent, Some(child), Some(name), "")
        .expect("attach child");
}

fn traced(scene: &mut Scene, name: &'static str, layer: Option<i32>, journal: &Journal) -> EntityId {
    let id = scene.spawn_with(Traced::new(name, journal));
    scene.set_layer(id, layer).expect("layer");
    id
}

fn fresh_layers(scene: &Scene, id: EntityId) -> BTreeSet<i32> {
    let mut layers: BTreeSet<i32> = scene.layer(id).into_iter().collect();
    for child in scene.children_of(id) {
        layers.extend(fresh_layers(scene, child));
    }
    layers
}

struct Spawner {
    journal: Journal,
    into: EntityId,
    spawned: Option<EntityId>,
}

impl EntityLogic for Spawner {
    fn update(&mut self, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        if self.spawned.is_none() {
            let scene = cx.scene_mut();
            let late = scene.spawn_with(Traced::new("late", &self.journal));
            scene.set_layer(late, Some(1))?;
            scene.request_add_child(self.into, late)?;
            self.spawned = Some(late);
        }
        Ok(())
    }
}

#[test]
fn child_added_during_update_is_invisible_until_next_frame() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let later_sibling = traced(&mut scene, "sibling", None, &log);
    let spawner = scene.spawn_with(Spawner {
        journal: Rc::clone(&log),
        into: later_sibling,
        spawned: None,
    });
    attach(&mut scene, root, spawner, "spawner");
    attach(&mut scene, root, later_sibling, "sibling");

    scene.frame(ms(16)).expect("first frame");
    assert!(entries(&log).iter().all(|entry| !entry.starts_with("late.")));
    assert_eq!(scene.pending_edit_count(later_sibling), 1);

    log.borrow_mut().clear();
    scene.frame(ms(16)).expect("second frame");
    let late: Vec<String> = entries(&log)
        .into_iter()
        .filter(|entry| entry.starts_with("late."))
        .collect();
    assert_eq!(late, vec!["late.activate", "late.update", "late.after", "late.draw@0,0"]);
}

#[test]
fn edits_requested_between_frames_apply_on_the_next_frame() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let child = traced(&mut scene, "child", None, &log);
    scene.request_add_child(root, child).expect("request");

    assert_eq!(scene.parent_of(child), None);
    scene.frame(ms(16)).expect("frame");

    assert_eq!(scene.parent_of(child), Some(root));
    assert_eq!(scene.key_of(child), Some("ant1"));
    assert_eq!(entries(&log), vec!["child.activate", "child.update", "child.after"]);
}

#[test]
fn activation_fires_once_per_insertion() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let child = traced(&mut scene, "child", None, &log);
    attach(&mut scene, root, child, "child");

    for _ in 0..3 {
        scene.frame(ms(16)).expect("frame");
    }
    assert_eq!(count(&log, "child.activate"), 1);
    assert_eq!(count(&log, "child.update"), 3);

    scene.dropoff(child).expect("dropoff");
    attach(&mut scene, root, child, "child");
    scene.frame(ms(16)).expect("frame");
    assert_eq!(count(&log, "child.activate"), 2);
}

#[test]
fn removed_subtree_receives_no_more_phases() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let parent = traced(&mut scene, "parent", Some(1), &log);
    let leaf = traced(&mut scene, "leaf", Some(1), &log);
    attach(&mut scene, root, parent, "parent");
    attach(&mut scene, parent, leaf, "leaf");
    scene.frame(ms(16)).expect("frame");

    scene
        .request_remove_child(root, "parent")
        .expect("request removal");
    scene.frame(ms(16)).expect("flush frame");
    log.borrow_mut().clear();
    scene.frame(ms(16)).expect("frame");

    assert!(entries(&log).is_empty());
    assert_eq!(scene.parent_of(parent), None);
    assert_eq!(scene.parent_of(leaf), Some(parent));
    assert!(!scene.is_live(leaf));
    assert!(scene.contains(leaf));
}

#[test]
fn removal_without_value_or_name_is_rejected() {
    let mut scene = Scene::new();
    let root = scene.root();

    let child_error = scene
        .request_set_child(root, None, None, "ant")
        .expect_err("ambiguous child removal");
    assert!(matches!(
        child_error,
        SceneError::AmbiguousRemoval {
            kind: BudKind::Child
        }
    ));

    let behavior_error = scene
        .request_set_behavior(root, None, None)
        .expect_err("ambiguous behavior removal");
    assert!(matches!(
        behavior_error,
        SceneError::AmbiguousRemoval {
            kind: BudKind::Behavior
        }
    ));
    assert_eq!(scene.pending_edit_count(root), 0);
}

#[test]
fn synthesized_names_take_the_smallest_free_index() {
    let mut scene = Scene::new();
    let root = scene.root();
    let first = scene.spawn();
    let second = scene.spawn();
    let third = scene.spawn();

    let first_name = scene
        .set_child_now(root, Some(first), None, "tile")
        .expect("first");
    let second_name = scene
        .set_child_now(root, Some(second), None, "tile")
        .expect("second");
    scene.dropoff(first).expect("dropoff");
    let third_name = scene
        .set_child_now(root, Some(third), None, "tile")
        .expect("third");

    assert_eq!(first_name, "tile1");
    assert_eq!(second_name, "tile2");
    assert_eq!(third_name, "tile1");
}

#[test]
fn setting_an_occupied_name_detaches_the_previous_child() {
    let mut scene = Scene::new();
    let root = scene.root();
    let old = scene.spawn();
    let new = scene.spawn();
    attach(&mut scene, root, old, "slot");
    attach(&mut scene, root, new, "slot");

    assert_eq!(scene.child(root, "slot"), Some(new));
    assert_eq!(scene.parent_of(old), None);
    assert_eq!(scene.children_of(root), vec![new]);
}

#[test]
fn moving_a_child_detaches_it_from_its_old_parent() {
    let mut scene = Scene::new();
    let root = scene.root();
    let left = scene.spawn();
    let right = scene.spawn();
    let leaf = scene.spawn();
    attach(&mut scene, root, left, "left");
    attach(&mut scene, root, right, "right");
    attach(&mut scene, left, leaf, "leaf");
    attach(&mut scene, right, leaf, "leaf");

    assert!(scene.children_of(left).is_empty());
    assert_eq!(scene.parent_of(leaf), Some(right));
}

#[test]
fn attaching_an_ancestor_below_its_descendant_is_refused() {
    let mut scene = Scene::new();
    let root = scene.root();
    let parent = scene.spawn();
    let child = scene.spawn();
    attach(&mut scene, root, parent, "parent");
    attach(&mut scene, parent, child, "child");

    let error = scene
        .set_child_now(child, Some(parent), Some("loop"), "")
        .expect_err("cycle");
    assert!(matches!(error, SceneError::WouldCycle { .. }));
}

#[test]
fn behavior_slots_notify_attach_and_detach() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let host = scene.spawn();
    attach(&mut scene, root, host, "host");

    scene
        .request_set_behavior(
            host,
            Some(Box::new(TracedBehavior {
                name: "first",
                journal: Rc::clone(&log),
            })),
            Some("mover"),
        )
        .expect("request");
    assert!(entries(&log).is_empty());
    assert!(matches!(
        scene.search_bud(host, BudKind::Behavior, "mover"),
        Some(PendingEdit::Behavior(Some(_)))
    ));

    scene.frame(ms(16)).expect("frame");
    assert_eq!(entries(&log), vec!["first.attached", "first.behave", "first.stay"]);

    scene
        .request_set_behavior(
            host,
            Some(Box::new(TracedBehavior {
                name: "second",
                journal: Rc::clone(&log),
            })),
            Some("mover"),
        )
        .expect("request");
    log.borrow_mut().clear();
    scene.frame(ms(16)).expect("frame");
    assert_eq!(
        entries(&log),
        vec!["first.detached", "second.attached", "second.behave", "second.stay"]
    );

    scene
        .request_set_behavior(host, None, Some("mover"))
        .expect("request");
    log.borrow_mut().clear();
    scene.frame(ms(16)).expect("frame");
    assert_eq!(entries(&log), vec!["second.detached"]);
    assert!(scene.behavior(host, "mover").is_none());
}

#[test]
fn replacing_a_slot_detaches_the_old_behavior_first() {
    let log = journal();
    let mut scene = scene_with_target();
    let host = scene.spawn();
    for (name, slot) in [("first", "mover"), ("other", "other"), ("second", "mover")] {
        scene
            .set_behavior_now(
                host,
                Some(Box::new(TracedBehavior {
                    name,
                    journal: Rc::clone(&log),
                })),
                Some(slot),
            )
            .expect("behavior");
    }

    assert_eq!(
        entries(&log),
        vec![
            "first.attached",
            "other.attached",
            "first.detached",
            "second.attached",
        ]
    );
    assert_eq!(scene.behavior_slots(host), vec!["other", "mover"]);
}

#[test]
fn behaviors_run_after_their_host_and_before_children() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let host = traced(&mut scene, "host", None, &log);
    let child = traced(&mut scene, "child", None, &log);
    attach(&mut scene, root, host, "host");
    attach(&mut scene, host, child, "child");
    scene
        .set_behavior_now(
            host,
            Some(Box::new(TracedBehavior {
                name: "mover",
                journal: Rc::clone(&log),
            })),
            Some("mover"),
        )
        .expect("behavior");
    log.borrow_mut().clear();

    scene.frame(ms(16)).expect("frame");
    assert_eq!(
        entries(&log),
        vec![
            "host.activate",
            "host.update",
            "mover.behave",
            "child.activate",
            "child.update",
            "host.after",
            "mover.stay",
            "child.after",
        ]
    );
}

#[test]
fn layer_changes_clear_every_ancestor_cache() {
    let mut scene = Scene::new();
    let root = scene.root();
    let branch = scene.spawn();
    let leaf = scene.spawn();
    let other = scene.spawn();
    attach(&mut scene, root, branch, "branch");
    attach(&mut scene, branch, leaf, "leaf");
    attach(&mut scene, root, other, "other");
    scene.set_layer(leaf, Some(2)).expect("layer");
    scene.set_layer(other, Some(7)).expect("layer");

    assert_eq!(scene.layers(), vec![2, 7]);
    assert!(scene.cached_layer_set(branch).is_some());

    scene.set_layer(leaf, Some(4)).expect("layer");
    assert!(scene.cached_layer_set(leaf).is_none());
    assert!(scene.cached_layer_set(branch).is_none());
    assert!(scene.cached_layer_set(root).is_none());
    assert!(scene.cached_layer_set(other).is_some());

    assert_eq!(scene.layers(), vec![4, 7]);
}

#[test]
fn layer_cache_matches_fresh_recomputation_after_edits() {
    let mut scene = Scene::new();
    let root = scene.root();
    let ids: Vec<EntityId> = (0..6).map(|_| scene.spawn()).collect();
    attach(&mut scene, root, ids[0], "a");
    attach(&mut scene, ids[0], ids[1], "b");
    attach(&mut scene, ids[1], ids[2], "c");
    attach(&mut scene, root, ids[3], "d");
    for (index, id) in ids.iter().enumerate() {
        scene.set_layer(*id, Some(index as i32 % 3)).expect("layer");
    }
    let _ = scene.layers();

    scene.set_layer(ids[2], Some(9)).expect("layer");
    attach(&mut scene, ids[3], ids[4], "e");
    attach(&mut scene, ids[1], ids[5], "f");
    scene.set_layer(ids[5], None).expect("layer");
    scene.dropoff(ids[0]).expect("dropoff");
    attach(&mut scene, ids[4], ids[0], "moved");

    for id in std::iter::once(root).chain(ids.iter().copied()) {
        assert_eq!(scene.layer_set(id), fresh_layers(&scene, id));
    }
}

#[test]
fn draw_pass_groups_by_ascending_layer() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let five_a = traced(&mut scene, "five_a", Some(5), &log);
    let one = traced(&mut scene, "one", Some(1), &log);
    let five_b = traced(&mut scene, "five_b", Some(5), &log);
    let three = traced(&mut scene, "three", Some(3), &log);
    let holder = scene.spawn();
    attach(&mut scene, root, five_a, "five_a");
    attach(&mut scene, five_a, one, "one");
    attach(&mut scene, root, holder, "holder");
    attach(&mut scene, holder, five_b, "five_b");
    attach(&mut scene, five_b, three, "three");
    log.borrow_mut().clear();

    scene.frame(ms(16)).expect("frame");
    let draws: Vec<String> = entries(&log)
        .into_iter()
        .filter(|entry| entry.contains(".draw"))
        .map(|entry| entry.split(".draw").next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(draws, vec!["one", "three", "five_a", "five_b"]);
}

#[test]
fn zero_scale_entities_update_but_do_not_draw() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let flat = scene.spawn_scalable(Vec2::new(0.0, 1.0));
    let inside = traced(&mut scene, "inside", Some(1), &log);
    attach(&mut scene, root, flat, "flat");
    attach(&mut scene, flat, inside, "inside");

    scene.frame(ms(16)).expect("frame");
    assert_eq!(count(&log, "inside.update"), 1);
    assert!(entries(&log).iter().all(|entry| !entry.contains(".draw")));
}

#[test]
fn coordinates_round_trip_through_scaled_ancestors() {
    let mut scene = Scene::new();
    let root = scene.root();
    let outer = scene.spawn_scalable(Vec2::new(2.0, 0.5));
    let inner = scene.spawn_scalable(Vec2::new(-3.0, 4.0));
    let peer = scene.spawn_scalable(Vec2::new(1.5, 1.5));
    scene.set_position(outer, Point::new(10.0, -4.0)).expect("pos");
    scene.set_position(inner, Point::new(3.0, 7.0)).expect("pos");
    scene.set_position(peer, Point::new(-8.0, 2.0)).expect("pos");
    attach(&mut scene, root, outer, "outer");
    attach(&mut scene, outer, inner, "inner");
    attach(&mut scene, root, peer, "peer");

    for point in [Point::new(0.0, 0.0), Point::new(12.5, -3.25), Point::new(-7.0, 99.0)] {
        let global = scene.to_root(inner, point).expect("to_root");
        let back = scene.from_root(inner, global).expect("from_root");
        assert!((back - point).hypot() < 1e-9);

        let there = scene
            .convert(point, Some(inner), Some(peer))
            .expect("convert there");
        let again = scene
            .convert(there, Some(peer), Some(inner))
            .expect("convert back");
        assert!((again - point).hypot() < 1e-9);
    }
}

#[test]
fn take_body_normalizes_inverted_rectangles() {
    let mut scene = Scene::new();
    let root = scene.root();
    let mirrored = scene.spawn_scalable(Vec2::new(-1.0, 1.0));
    attach(&mut scene, root, mirrored, "mirrored");
    scene
        .set_behavior_now(mirrored, Some(Box::new(RectBody::sized(10.0, 5.0))), None)
        .expect("body");

    let rect = scene.take_body(root, mirrored).expect("body in root space");
    assert_eq!(rect, Rect::new(-10.0, 0.0, 0.0, 5.0));
    assert!(scene.take_body(mirrored, root).is_some());

    let bare = scene.spawn();
    attach(&mut scene, root, bare, "bare");
    assert!(scene.take_body(root, bare).is_none());
}

#[test]
fn required_capability_absence_is_an_error() {
    let mut scene = Scene::new();
    let bare = scene.spawn();

    let error = scene.require_body(bare).err().expect("missing body");
    assert!(matches!(
        error,
        SceneError::MissingCapability { ref slot, .. } if slot == BODY_SLOT
    ));
    assert!(scene.body(bare).is_none());
    assert!(scene.require_body(scene.root()).is_ok());
}

#[test]
fn scene_body_reports_the_target_area() {
    let mut scene = Scene::new();
    let root = scene.root();
    assert_eq!(scene.body_rect(root), Some(Rect::new(0.0, 0.0, 1.0, 1.0)));

    scene.set_target(Some(Box::new(PixelCanvas::new(40, 20))));
    scene.set_scale(root, Vec2::new(2.0, 2.0)).expect("scale");
    assert_eq!(scene.body_rect(root), Some(Rect::new(0.0, 0.0, 20.0, 10.0)));
}

struct Breaker {
    journal: Journal,
    error: fn() -> SceneError,
}

impl EntityLogic for Breaker {
    fn update(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        self.journal.borrow_mut().push("breaker.update".to_string());
        Err((self.error)())
    }

    fn after(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        self.journal.borrow_mut().push("breaker.after".to_string());
        Ok(())
    }
}

#[test]
fn frame_break_truncates_the_frame_silently() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let breaker = scene.spawn_with(Breaker {
        journal: Rc::clone(&log),
        error: || SceneError::FrameBreak,
    });
    attach(&mut scene, root, breaker, "breaker");

    scene.frame(ms(16)).expect("frame break is swallowed");
    assert_eq!(entries(&log), vec!["breaker.update"]);
    assert_eq!(scene.time(), ms(16));
}

#[test]
fn other_hook_errors_cross_the_frame_boundary() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let breaker = scene.spawn_with(Breaker {
        journal: Rc::clone(&log),
        error: || SceneError::hook(std::io::Error::other("boom")),
    });
    attach(&mut scene, root, breaker, "breaker");

    let error = scene.frame(ms(16)).expect_err("hook error propagates");
    assert!(matches!(error, SceneError::Hook(_)));
    assert_eq!(error.to_string(), "boom");
}

#[test]
fn missing_target_skips_draw_but_runs_other_phases() {
    let log = journal();
    let mut scene = Scene::new();
    let root = scene.root();
    let child = traced(&mut scene, "child", Some(1), &log);
    attach(&mut scene, root, child, "child");

    scene.frame(ms(16)).expect("frame");
    scene.frame(ms(16)).expect("frame");
    assert_eq!(count(&log, "child.after"), 2);
    assert!(entries(&log).iter().all(|entry| !entry.contains(".draw")));
}

struct HandOffOnUpdate;

impl EntityLogic for HandOffOnUpdate {
    fn update(&mut self, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        Err(cx.hand_off())
    }
}

#[test]
fn hand_off_request_breaks_the_frame_and_stays_queued() {
    let mut scene = scene_with_target();
    let root = scene.root();
    let trigger = scene.spawn_with(HandOffOnUpdate);
    attach(&mut scene, root, trigger, "trigger");

    scene.frame(ms(16)).expect("frame");
    assert!(scene.take_clock_commands().is_empty());
    assert!(scene.take_hand_off_request());
    assert!(!scene.take_hand_off_request());
    assert!(scene.target().is_some());
}

#[test]
fn end_to_end_frame_runs_phases_then_layers_in_order() {
    let log = journal();
    let mut scene = scene_with_target();
    let root = scene.root();
    let a = traced(&mut scene, "A", Some(2), &log);
    scene
        .set_behavior_now(a, Some(Box::new(RectBody::sized(50.0, 50.0))), None)
        .expect("body");
    let holder = scene.spawn_scalable(Vec2::new(2.0, 2.0));
    scene
        .set_position(holder, Point::new(10.0, 10.0))
        .expect("position");
    let b = traced(&mut scene, "B", Some(1), &log);
    attach(&mut scene, root, a, "a");
    attach(&mut scene, root, holder, "holder");
    attach(&mut scene, holder, b, "b");
    scene.frame(ms(16)).expect("warm-up frame");
    log.borrow_mut().clear();

    scene.frame(ms(16)).expect("frame");
    assert_eq!(
        entries(&log),
        vec![
            "A.update",
            "B.update",
            "A.after",
            "B.after",
            "B.draw@10,10",
            "A.draw@0,0",
        ]
    );
    assert_eq!(
        scene.take_body(root, a),
        Some(Rect::new(0.0, 0.0, 50.0, 50.0))
    );
    assert_eq!(scene.to_root(b, Point::ZERO), Some(Point::new(10.0, 10.0)));
}

#[test]
fn default_draw_paints_the_renderer_into_the_body() {
    let mut scene = Scene::with_target(Box::new(PixelCanvas::new(8, 8)));
    let root = scene.root();
    let tile = scene.spawn();
    scene.set_layer(tile, Some(0)).expect("layer");
    scene.set_position(tile, Point::new(2.0, 2.0)).expect("pos");
    scene
        .set_behavior_now(tile, Some(Box::new(RectBody::sized(2.0, 2.0))), None)
        .expect("body");
    scene
        .set_behavior_now(tile, Some(Box::new(FillRenderer::new(Color::WHITE))), None)
        .expect("renderer");
    attach(&mut scene, root, tile, "tile");

    scene.frame(ms(16)).expect("frame");
    let target = scene.target().expect("target");
    let pixels = target.rgba().expect("pixels");
    let at = |x: usize, y: usize| pixels[(y * 8 + x) * 4];
    assert_eq!(at(2, 2), 255);
    assert_eq!(at(3, 3), 255);
    assert_eq!(at(4, 4), 0);
}

#[test]
fn paths_and_dump_describe_the_tree() {
    let mut scene = Scene::new();
    let root = scene.root();
    let board = scene.spawn();
    let cell = scene.spawn();
    attach(&mut scene, root, board, "board");
    attach(&mut scene, board, cell, "cell");
    scene.set_layer(cell, Some(3)).expect("layer");

    assert_eq!(scene.path_of(cell).as_deref(), Some("/board/cell"));
    assert_eq!(scene.path_of(root).as_deref(), Some("/"));
    assert_eq!(scene.child_by_path(root, "board/cell"), Some(cell));
    assert_eq!(scene.child_by_path(root, "board/missing"), None);

    let dump = scene.dump(root);
    assert!(dump.starts_with("<root>"));
    assert!(dump.contains("\n  board layer=-"));
    assert!(dump.contains("\n    cell layer=3"));
}

#[test]
fn need_behavior_installs_only_when_missing() {
    let mut scene = Scene::new();
    let host = scene.spawn();
    let mut built = 0;

    scene
        .need_behavior(host, BODY_SLOT, || {
            built += 1;
            Box::new(RectBody::sized(1.0, 1.0))
        })
        .expect("first");
    scene
        .need_behavior(host, BODY_SLOT, || {
            built += 1;
            Box::new(RectBody::sized(2.0, 2.0))
        })
        .expect("second");

    assert_eq!(built, 1);
    assert_eq!(
        scene.behavior_as::<RectBody>(host, BODY_SLOT).map(|body| body.rect),
        Some(Rect::new(0.0, 0.0, 1.0, 1.0))
    );
}

#[test]
fn despawn_requires_a_detached_subtree() {
    let log = journal();
    let mut scene = Scene::new();
    let root = scene.root();
    let parent = scene.spawn();
    let child = scene.spawn();
    attach(&mut scene, root, parent, "parent");
    attach(&mut scene, parent, child, "child");
    scene
        .set_behavior_now(
            child,
            Some(Box::new(TracedBehavior {
                name: "tracer",
                journal: Rc::clone(&log),
            })),
            Some("tracer"),
        )
        .expect("behavior");

    assert!(matches!(
        scene.despawn(parent),
        Err(SceneError::StillAttached(_))
    ));
    scene.dropoff(parent).expect("dropoff");
    scene.despawn(parent).expect("despawn");

    assert!(!scene.contains(parent));
    assert!(!scene.contains(child));
    assert_eq!(entries(&log), vec!["tracer.attached", "tracer.detached"]);
}

#[test]
fn edit_for_a_freed_entity_is_skipped() {
    let mut scene = scene_with_target();
    let root = scene.root();
    let ghost = scene.spawn();
    scene.request_add_child(root, ghost).expect("request");
    scene.despawn(ghost).expect("despawn");

    scene.frame(ms(16)).expect("frame");
    assert!(scene.children_of(root).is_empty());
}

#[test]
fn snapshot_writes_a_png_of_the_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("frame.png");
    let mut scene = Scene::with_target(Box::new(PixelCanvas::new(4, 3)));
    let root = scene.root();
    scene.set_layer(root, Some(0)).expect("layer");
    scene
        .set_behavior_now(root, Some(Box::new(FillRenderer::new(Color::WHITE))), None)
        .expect("renderer");
    scene.frame(ms(16)).expect("frame");

    scene.snapshot_png(&path).expect("snapshot");
    let decoded = image::open(&path).expect("decode").to_rgba8();
    assert_eq!(decoded.dimensions(), (4, 3));
    assert_eq!(decoded.get_pixel(0, 0).0, [255, 255, 255, 255]);

    let bare = Scene::new();
    assert!(matches!(
        bare.snapshot_png(&path),
        Err(SceneError::SnapshotUnavailable)
    ));
}

#[test]
fn canvas_ratio_compares_target_pixels_to_display_size() {
    let mut scene = Scene::with_target(Box::new(PixelCanvas::new(200, 100)));
    assert_eq!(scene.canvas_ratio(), Vec2::new(1.0, 1.0));

    scene.set_display_size(Some(kurbo::Size::new(100.0, 100.0)));
    assert_eq!(scene.canvas_ratio(), Vec2::new(2.0, 1.0));
}
