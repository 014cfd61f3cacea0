use crate::scene_graph::SceneGraph;
use crate::sim::entity::Entity;
use crate::sim::physics::PhysicsWorld;

/// Live entities in spawn order. The front is always the oldest entity.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// Destroys every dirty entity, walking from the newest to the oldest so
    /// removal never skips an element. Returns the number destroyed.
    pub fn prune_dirty(&mut self, physics: &mut PhysicsWorld, graph: &mut SceneGraph) -> usize {
        let mut removed = 0;
        for index in (0..self.entities.len()).rev() {
            if self.entities[index].is_dirty() {
                self.entities.remove(index).destroy(physics, graph);
                removed += 1;
            }
        }
        removed
    }

    pub fn remove_first(&mut self, physics: &mut PhysicsWorld, graph: &mut SceneGraph) -> bool {
        if self.entities.is_empty() {
            return false;
        }
        self.entities.remove(0).destroy(physics, graph);
        true
    }

    /// Destroys up to `count` of the oldest entities.
    pub fn drain_front(
        &mut self,
        count: usize,
        physics: &mut PhysicsWorld,
        graph: &mut SceneGraph,
    ) -> usize {
        let count = count.min(self.entities.len());
        for entity in self.entities.drain(..count) {
            entity.destroy(physics, graph);
        }
        count
    }

    pub fn clear(&mut self, physics: &mut PhysicsWorld, graph: &mut SceneGraph) -> usize {
        let count = self.entities.len();
        for entity in self.entities.drain(..) {
            entity.destroy(physics, graph);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }
}
