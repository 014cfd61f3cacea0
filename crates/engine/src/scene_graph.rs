use std::collections::HashMap;

use thiserror::Error;

use crate::math::Vec2;

pub type Rgba = [u8; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    Graphics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Shapes,
    Debug,
}

/// Local transform applied as translate(position) * rotate * scale * translate(-pivot).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub position: Vec2,
    pub rotation_radians: f32,
    pub pivot: Vec2,
    pub scale: f32,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation_radians: 0.0,
            pivot: Vec2::ZERO,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    FilledRect {
        origin: Vec2,
        width: f32,
        height: f32,
        color: Rgba,
    },
    FilledCircle {
        center: Vec2,
        radius: f32,
        color: Rgba,
    },
    Sprite {
        key: String,
        origin: Vec2,
        width: f32,
        height: f32,
        fallback_color: Rgba,
    },
    PolygonOutline {
        points: Vec<Vec2>,
        color: Rgba,
    },
    CircleOutline {
        center: Vec2,
        radius: f32,
        color: Rgba,
    },
    Line {
        from: Vec2,
        to: Vec2,
        color: Rgba,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SceneGraphError {
    #[error("unknown scene node {0:?}")]
    UnknownNode(NodeId),
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCycle { parent: NodeId, child: NodeId },
}

/// Row-major 2x3 affine matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn from_transform(transform: &NodeTransform) -> Self {
        let (sin, cos) = transform.rotation_radians.sin_cos();
        let a = cos * transform.scale;
        let b = -sin * transform.scale;
        let c = sin * transform.scale;
        let d = cos * transform.scale;
        let pivot = transform.pivot;
        Self {
            a,
            b,
            c,
            d,
            tx: transform.position.x - (a * pivot.x + b * pivot.y),
            ty: transform.position.y - (c * pivot.x + d * pivot.y),
        }
    }

    pub fn then(&self, child: &Affine2) -> Affine2 {
        Affine2 {
            a: self.a * child.a + self.b * child.c,
            b: self.a * child.b + self.b * child.d,
            c: self.c * child.a + self.d * child.c,
            d: self.c * child.b + self.d * child.d,
            tx: self.a * child.tx + self.b * child.ty + self.tx,
            ty: self.c * child.tx + self.d * child.ty + self.ty,
        }
    }

    pub fn apply(&self, point: Vec2) -> Vec2 {
        Vec2 {
            x: self.a * point.x + self.b * point.y + self.tx,
            y: self.c * point.x + self.d * point.y + self.ty,
        }
    }

    pub fn inverse(&self) -> Option<Affine2> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Affine2 {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + b * self.ty),
            ty: -(c * self.tx + d * self.ty),
        })
    }

    /// Length scale for uniformly scaled transforms.
    pub fn uniform_scale(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    transform: NodeTransform,
    primitives: Vec<Primitive>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            transform: NodeTransform::default(),
            primitives: Vec::new(),
        }
    }
}

/// Retained tree of drawable nodes. Children draw after their parent, in
/// attachment order.
#[derive(Debug)]
pub struct SceneGraph {
    next_id: u64,
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    shapes_layer: NodeId,
    debug_layer: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            next_id: 0,
            nodes: HashMap::new(),
            root: NodeId(0),
            shapes_layer: NodeId(0),
            debug_layer: NodeId(0),
        };
        graph.root = graph.create_node(NodeKind::Container);
        graph.shapes_layer = graph.create_node(NodeKind::Container);
        graph.debug_layer = graph.create_node(NodeKind::Container);
        graph.link(graph.root, graph.shapes_layer);
        graph.link(graph.root, graph.debug_layer);
        graph
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn layer(&self, layer: Layer) -> NodeId {
        match layer {
            Layer::Shapes => self.shapes_layer,
            Layer::Debug => self.debug_layer,
        }
    }

    pub fn create_container(&mut self) -> NodeId {
        self.create_node(NodeKind::Container)
    }

    pub fn create_graphics(&mut self) -> NodeId {
        self.create_node(NodeKind::Graphics)
    }

    fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.nodes.insert(id, Node::new(kind));
        id
    }

    /// Attaches `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneGraphError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SceneGraphError::UnknownNode(parent));
        }
        if !self.nodes.contains_key(&child) {
            return Err(SceneGraphError::UnknownNode(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneGraphError::WouldCycle { parent, child });
        }
        self.unlink(child);
        self.link(parent, child);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.unlink(child);
        true
    }

    /// Detaches `node` and drops it together with every descendant. Returns
    /// the number of nodes released.
    pub fn release(&mut self, node: NodeId) -> usize {
        if !self.nodes.contains_key(&node) || node == self.root {
            return 0;
        }
        self.unlink(node);
        let mut released = 0;
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&next) {
                stack.extend(removed.children);
                released += 1;
            }
        }
        released
    }

    pub fn set_transform(&mut self, node: NodeId, transform: NodeTransform) -> bool {
        match self.nodes.get_mut(&node) {
            Some(entry) => {
                entry.transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn transform(&self, node: NodeId) -> Option<NodeTransform> {
        self.nodes.get(&node).map(|entry| entry.transform)
    }

    pub fn clear(&mut self, node: NodeId) -> bool {
        match self.nodes.get_mut(&node) {
            Some(entry) => {
                entry.primitives.clear();
                true
            }
            None => false,
        }
    }

    pub fn draw(&mut self, node: NodeId, primitive: Primitive) -> bool {
        match self.nodes.get_mut(&node) {
            Some(entry) => {
                entry.primitives.push(primitive);
                true
            }
            None => false,
        }
    }

    pub fn primitives(&self, node: NodeId) -> &[Primitive] {
        self.nodes
            .get(&node)
            .map(|entry| entry.primitives.as_slice())
            .unwrap_or(&[])
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(&node)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|entry| entry.parent)
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(&node).map(|entry| entry.kind)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Visits every primitive reachable from the root in draw order, paired
    /// with the world transform of its node.
    pub fn for_each_primitive<F>(&self, mut visit: F)
    where
        F: FnMut(&Affine2, &Primitive),
    {
        let mut stack = vec![(self.root, Affine2::IDENTITY)];
        while let Some((node_id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            let world = parent_world.then(&Affine2::from_transform(&node.transform));
            for primitive in &node.primitives {
                visit(&world, primitive);
            }
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(entry) = self.nodes.get_mut(&parent) {
            entry.children.push(child);
        }
        if let Some(entry) = self.nodes.get_mut(&child) {
            entry.parent = Some(parent);
        }
    }

    fn unlink(&mut self, child: NodeId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(entry) = self.nodes.get_mut(&parent) {
            entry.children.retain(|id| *id != child);
        }
        if let Some(entry) = self.nodes.get_mut(&child) {
            entry.parent = None;
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == candidate {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }
}
