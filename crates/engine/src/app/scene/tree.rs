use std::fmt::Write as _;

use kurbo::{Point, Vec2};
use tracing::{debug, warn};

use super::{
    Behavior, Body, Bud, BudKind, BudPayload, EntityId, EntityLogic, Interactor, Node, Scene,
    SceneError, BODY_SLOT, INTERACTOR_SLOT,
};

const BEHAVIOR_PREFIX: &str = "behavior";
pub const CHILD_PREFIX: &str = "ant";

/// Payload of an edit that is still waiting for its flush.
pub enum PendingEdit<'a> {
    Child(Option<EntityId>),
    Behavior(Option<&'a dyn Behavior>),
}

impl Scene {
    pub fn spawn(&mut self) -> EntityId {
        self.nodes.insert(Node::new(None))
    }

    pub fn spawn_scalable(&mut self, scale: Vec2) -> EntityId {
        self.nodes.insert(Node::new(Some(scale)))
    }

    pub fn spawn_with(&mut self, logic: impl EntityLogic) -> EntityId {
        let id = self.spawn();
        if let Some(node) = self.nodes.get_mut(id) {
            node.logic = Some(Box::new(logic));
        }
        id
    }

    pub fn set_logic(&mut self, id: EntityId, logic: impl EntityLogic) -> Result<(), SceneError> {
        self.node_mut(id)?.logic = Some(Box::new(logic));
        Ok(())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn entity_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn position(&self, id: EntityId) -> Option<Point> {
        self.nodes.get(id).map(|node| node.position)
    }

    pub fn set_position(&mut self, id: EntityId, position: Point) -> Result<(), SceneError> {
        self.node_mut(id)?.position = position;
        Ok(())
    }

    pub fn layer(&self, id: EntityId) -> Option<i32> {
        self.nodes.get(id).and_then(|node| node.layer)
    }

    pub fn set_layer(&mut self, id: EntityId, layer: Option<i32>) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.layer == layer {
            return Ok(());
        }
        node.layer = layer;
        self.invalidate_layers(id);
        Ok(())
    }

    /// Scale of a scalable entity. Plain entities report `None`.
    pub fn scale(&self, id: EntityId) -> Option<Vec2> {
        self.nodes.get(id).and_then(|node| node.scale)
    }

    /// Sets the scale, turning a plain entity into a scalable one.
    pub fn set_scale(&mut self, id: EntityId, scale: Vec2) -> Result<(), SceneError> {
        self.node_mut(id)?.scale = Some(scale);
        Ok(())
    }

    pub fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    pub fn children_of(&self, id: EntityId) -> Vec<EntityId> {
        self.nodes
            .get(id)
            .map(|node| node.children.iter().map(|(_, child)| *child).collect())
            .unwrap_or_default()
    }

    pub fn child(&self, id: EntityId, name: &str) -> Option<EntityId> {
        self.nodes.get(id).and_then(|node| node.child(name))
    }

    /// Name under which the entity is held by its parent.
    pub fn key_of(&self, id: EntityId) -> Option<&str> {
        let parent = self.parent_of(id)?;
        self.nodes
            .get(parent)?
            .children
            .iter()
            .find(|(_, child)| *child == id)
            .map(|(key, _)| key.as_str())
    }

    /// Topmost ancestor, the entity itself when it has no parent.
    pub fn scene_root(&self, id: EntityId) -> Option<EntityId> {
        let mut current = id;
        self.nodes.get(current)?;
        while let Some(parent) = self.parent_of(current) {
            current = parent;
        }
        Some(current)
    }

    /// True when the entity hangs under this scene's root.
    pub fn is_live(&self, id: EntityId) -> bool {
        self.scene_root(id) == Some(self.root)
    }

    pub fn path_of(&self, id: EntityId) -> Option<String> {
        if !self.is_live(id) {
            return None;
        }
        let mut keys = Vec::new();
        let mut current = id;
        while current != self.root {
            keys.push(self.key_of(current)?.to_string());
            current = self.parent_of(current)?;
        }
        keys.reverse();
        Some(format!("/{}", keys.join("/")))
    }

    /// Resolves a `/`-separated path of child names starting at `id`.
    pub fn child_by_path(&self, id: EntityId, path: &str) -> Option<EntityId> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(id, |current, segment| self.child(current, segment))
    }

    /// Queues a child edit applied at the start of the next update phase.
    ///
    /// `None` as the value removes the child held under `name`. Without a
    /// name a free one is synthesized from `prefix` when the edit is applied.
    pub fn request_set_child(
        &mut self,
        parent: EntityId,
        child: Option<EntityId>,
        name: Option<&str>,
        prefix: &str,
    ) -> Result<(), SceneError> {
        if child.is_none() && name.is_none() {
            return Err(SceneError::AmbiguousRemoval {
                kind: BudKind::Child,
            });
        }
        self.push_bud(parent, name, prefix, BudPayload::Child(child))
    }

    pub fn request_add_child(&mut self, parent: EntityId, child: EntityId) -> Result<(), SceneError> {
        self.request_set_child(parent, Some(child), None, CHILD_PREFIX)
    }

    pub fn request_remove_child(&mut self, parent: EntityId, name: &str) -> Result<(), SceneError> {
        self.request_set_child(parent, None, Some(name), CHILD_PREFIX)
    }

    pub fn request_set_behavior(
        &mut self,
        host: EntityId,
        behavior: Option<Box<dyn Behavior>>,
        name: Option<&str>,
    ) -> Result<(), SceneError> {
        if behavior.is_none() && name.is_none() {
            return Err(SceneError::AmbiguousRemoval {
                kind: BudKind::Behavior,
            });
        }
        self.push_bud(host, name, BEHAVIOR_PREFIX, BudPayload::Behavior(behavior))
    }

    fn push_bud(
        &mut self,
        id: EntityId,
        name: Option<&str>,
        prefix: &str,
        payload: BudPayload,
    ) -> Result<(), SceneError> {
        let epoch = self.epoch;
        self.node_mut(id)?.buds.push(Bud {
            name: name.map(str::to_string),
            prefix: prefix.to_string(),
            payload,
            epoch,
        });
        Ok(())
    }

    /// Latest queued edit for `name`, if any.
    pub fn search_bud(&self, id: EntityId, kind: BudKind, name: &str) -> Option<PendingEdit<'_>> {
        self.nodes
            .get(id)?
            .buds
            .iter()
            .rev()
            .filter(|bud| bud.payload.kind() == kind && bud.name.as_deref() == Some(name))
            .map(|bud| match &bud.payload {
                BudPayload::Child(child) => PendingEdit::Child(*child),
                BudPayload::Behavior(behavior) => PendingEdit::Behavior(behavior.as_deref()),
            })
            .next()
    }

    pub fn pending_edit_count(&self, id: EntityId) -> usize {
        self.nodes.get(id).map(|node| node.buds.len()).unwrap_or(0)
    }

    /// Applies the edits queued on `id` before the current frame began.
    pub(super) fn flush_buds(&mut self, id: EntityId) {
        let epoch = self.epoch;
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.buds.is_empty() {
            return;
        }
        let (ready, waiting): (Vec<Bud>, Vec<Bud>) =
            node.buds.drain(..).partition(|bud| bud.epoch < epoch);
        node.buds = waiting;

        for bud in ready {
            let kind = bud.payload.kind();
            let result = match bud.payload {
                BudPayload::Child(child) => self
                    .set_child_now(id, child, bud.name.as_deref(), &bud.prefix)
                    .map(|_| ()),
                BudPayload::Behavior(behavior) => self
                    .set_behavior_now(id, behavior, bud.name.as_deref())
                    .map(|_| ()),
            };
            if let Err(error) = result {
                warn!(entity = ?id, kind = %kind, error = %error, "edit_skipped");
            }
        }
    }

    /// Installs or removes a child immediately. Returns the slot name used.
    pub fn set_child_now(
        &mut self,
        parent: EntityId,
        child: Option<EntityId>,
        name: Option<&str>,
        prefix: &str,
    ) -> Result<String, SceneError> {
        if child.is_none() && name.is_none() {
            return Err(SceneError::AmbiguousRemoval {
                kind: BudKind::Child,
            });
        }
        self.node(parent)?;
        if let Some(child) = child {
            self.node(child)?;
            if child == self.root || self.is_ancestor_or_self(child, parent) {
                return Err(SceneError::WouldCycle { parent, child });
            }
            if self.parent_of(child).is_some() {
                self.dropoff(child)?;
            }
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => self.free_child_name(parent, prefix),
        };

        let node = self.node_mut(parent)?;
        let previous = node
            .children
            .iter()
            .position(|(key, _)| *key == name)
            .map(|index| node.children.remove(index).1);
        if let Some(previous) = previous {
            if let Some(old) = self.nodes.get_mut(previous) {
                old.parent = None;
            }
        }

        if let Some(child) = child {
            self.node_mut(parent)?.children.push((name.clone(), child));
            let node = self.node_mut(child)?;
            node.parent = Some(parent);
            node.activated = false;
        }
        self.invalidate_layers(parent);
        Ok(name)
    }

    /// Installs or removes a behavior immediately. Returns the slot name used.
    pub fn set_behavior_now(
        &mut self,
        host: EntityId,
        behavior: Option<Box<dyn Behavior>>,
        name: Option<&str>,
    ) -> Result<String, SceneError> {
        let name = match (name, &behavior) {
            (Some(name), _) => name.to_string(),
            (None, Some(value)) => match value.default_slot() {
                Some(slot) => slot.to_string(),
                None => self.free_behavior_name(host),
            },
            (None, None) => {
                return Err(SceneError::AmbiguousRemoval {
                    kind: BudKind::Behavior,
                })
            }
        };

        let node = self.node_mut(host)?;
        let previous = node
            .behaviors
            .iter()
            .position(|(key, _)| *key == name)
            .and_then(|index| node.behaviors.remove(index).1);
        // The previous occupant hears about its removal before the
        // replacement is attached; the replacement goes to the end.
        if let Some(mut previous) = previous {
            previous.attached(None);
        }
        if let Some(mut value) = behavior {
            value.attached(Some(host));
            self.node_mut(host)?.behaviors.push((name.clone(), Some(value)));
        }
        Ok(name)
    }

    /// Returns the behavior in `slot`, installing one from `make` if the slot is empty.
    pub fn need_behavior(
        &mut self,
        host: EntityId,
        slot: &str,
        make: impl FnOnce() -> Box<dyn Behavior>,
    ) -> Result<&mut dyn Behavior, SceneError> {
        if self.behavior(host, slot).is_none() {
            self.set_behavior_now(host, Some(make()), Some(slot))?;
        }
        self.behavior_mut(host, slot)
            .ok_or_else(|| SceneError::MissingCapability {
                entity: host,
                slot: slot.to_string(),
            })
    }

    /// Detaches the entity from its parent right away.
    pub fn dropoff(&mut self, id: EntityId) -> Result<(), SceneError> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        let key = self.key_of(id).map(str::to_string);
        match key {
            Some(key) => self.set_child_now(parent, None, Some(&key), "").map(|_| ()),
            None => {
                self.node_mut(id)?.parent = None;
                Ok(())
            }
        }
    }

    /// Frees a detached subtree. Its behaviors are told they lost their host.
    pub fn despawn(&mut self, id: EntityId) -> Result<(), SceneError> {
        let node = self.node(id)?;
        if node.parent.is_some() || id == self.root {
            return Err(SceneError::StillAttached(id));
        }
        let mut stack = vec![id];
        let mut freed = 0usize;
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.remove(current) else {
                continue;
            };
            stack.extend(node.children.iter().map(|(_, child)| *child));
            for (_, behavior) in node.behaviors {
                if let Some(mut behavior) = behavior {
                    behavior.attached(None);
                }
            }
            freed += 1;
        }
        debug!(entity = ?id, freed, "subtree_despawned");
        Ok(())
    }

    pub fn behavior(&self, host: EntityId, slot: &str) -> Option<&dyn Behavior> {
        self.nodes
            .get(host)?
            .behaviors
            .iter()
            .find(|(key, _)| key == slot)
            .and_then(|(_, behavior)| behavior.as_deref())
    }

    pub fn behavior_mut(&mut self, host: EntityId, slot: &str) -> Option<&mut dyn Behavior> {
        self.nodes
            .get_mut(host)?
            .behaviors
            .iter_mut()
            .find(|(key, _)| key == slot)
            .and_then(|(_, behavior)| behavior.as_deref_mut())
    }

    pub fn behavior_as<T: Behavior>(&self, host: EntityId, slot: &str) -> Option<&T> {
        self.behavior(host, slot)?.as_any().downcast_ref::<T>()
    }

    pub fn behavior_as_mut<T: Behavior>(&mut self, host: EntityId, slot: &str) -> Option<&mut T> {
        self.behavior_mut(host, slot)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn behavior_slots(&self, host: EntityId) -> Vec<String> {
        self.nodes
            .get(host)
            .map(|node| node.behaviors.iter().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default()
    }

    pub fn body(&self, host: EntityId) -> Option<&dyn Body> {
        self.behavior(host, BODY_SLOT)?.as_body()
    }

    pub fn require_body(&self, host: EntityId) -> Result<&dyn Body, SceneError> {
        self.body(host).ok_or_else(|| SceneError::MissingCapability {
            entity: host,
            slot: BODY_SLOT.to_string(),
        })
    }

    pub fn interactor(&self, host: EntityId) -> Option<&dyn Interactor> {
        self.behavior(host, INTERACTOR_SLOT)?.as_interactor()
    }

    /// Body rectangle of `host` in its own local space.
    pub fn body_rect(&self, host: EntityId) -> Option<kurbo::Rect> {
        self.body(host).map(|body| body.rect(self, host))
    }

    /// Indented listing of the subtree under `id`.
    pub fn dump(&self, id: EntityId) -> String {
        let mut out = String::new();
        let name = self.key_of(id).unwrap_or("<root>").to_string();
        self.dump_into(id, &name, 0, &mut out);
        out
    }

    fn dump_into(&self, id: EntityId, name: &str, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let layer = node
            .layer
            .map(|layer| layer.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = write!(
            out,
            "{indent}{name} layer={layer} pos=({}, {})",
            node.position.x, node.position.y
        );
        if let Some(scale) = node.scale {
            let _ = write!(out, " scale=({}, {})", scale.x, scale.y);
        }
        if !node.behaviors.is_empty() {
            let slots: Vec<&str> = node.behaviors.iter().map(|(key, _)| key.as_str()).collect();
            let _ = write!(out, " behaviors=[{}]", slots.join(", "));
        }
        if !node.buds.is_empty() {
            let _ = write!(out, " pending={}", node.buds.len());
        }
        out.push('\n');
        for (key, child) in &node.children {
            self.dump_into(*child, key, depth + 1, out);
        }
    }

    fn is_ancestor_or_self(&self, candidate: EntityId, id: EntityId) -> bool {
        let mut current = Some(id);
        while let Some(entity) = current {
            if entity == candidate {
                return true;
            }
            current = self.parent_of(entity);
        }
        false
    }

    fn free_child_name(&self, parent: EntityId, prefix: &str) -> String {
        let taken = |name: &str| self.child(parent, name).is_some();
        first_free_name(prefix, taken)
    }

    fn free_behavior_name(&self, host: EntityId) -> String {
        let taken = |name: &str| self.behavior_slots(host).iter().any(|key| key == name);
        first_free_name(BEHAVIOR_PREFIX, taken)
    }
}

fn first_free_name(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    (1u64..)
        .map(|index| format!("{prefix}{index}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| prefix.to_string())
}
