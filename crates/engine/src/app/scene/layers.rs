use std::collections::BTreeSet;

use super::{EntityId, Scene};

impl Scene {
    /// Clears the cached layer set of `id` and of every ancestor.
    pub(super) fn invalidate_layers(&mut self, id: EntityId) {
        let mut current = Some(id);
        while let Some(entity) = current {
            let Some(node) = self.nodes.get_mut(entity) else {
                return;
            };
            node.layer_cache = None;
            current = node.parent;
        }
    }

    pub(super) fn ensure_layer_cache(&mut self, id: EntityId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if node.layer_cache.is_some() {
            return;
        }
        let own = node.layer;
        let children: Vec<EntityId> = node.children.iter().map(|(_, child)| *child).collect();

        let mut layers = BTreeSet::new();
        layers.extend(own);
        for child in children {
            self.ensure_layer_cache(child);
            if let Some(cache) = self.nodes.get(child).and_then(|node| node.layer_cache.as_ref()) {
                layers.extend(cache.iter().copied());
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.layer_cache = Some(layers);
        }
    }

    pub(super) fn subtree_has_layer(&mut self, id: EntityId, layer: i32) -> bool {
        self.ensure_layer_cache(id);
        self.nodes
            .get(id)
            .and_then(|node| node.layer_cache.as_ref())
            .map(|cache| cache.contains(&layer))
            .unwrap_or(false)
    }

    /// Every layer present in the subtree under `id`, recomputing if stale.
    pub fn layer_set(&mut self, id: EntityId) -> BTreeSet<i32> {
        self.ensure_layer_cache(id);
        self.cached_layer_set(id).cloned().unwrap_or_default()
    }

    /// The memoized layer set, `None` while it is stale.
    pub fn cached_layer_set(&self, id: EntityId) -> Option<&BTreeSet<i32>> {
        self.nodes.get(id).and_then(|node| node.layer_cache.as_ref())
    }

    /// Distinct layers of the whole tree in ascending order.
    pub fn layers(&mut self) -> Vec<i32> {
        let root = self.root;
        self.layer_set(root).into_iter().collect()
    }
}
