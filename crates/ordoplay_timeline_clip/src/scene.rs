// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene tree of timeline clips.
//!
//! The tree is walked top-down once per tick. Each parent resolves its own
//! playhead first, then hands every child an explicit [`TickContext`]: the
//! synch offset of the child inside the parent's timeline, and the frame
//! rate inherited from the nearest independent ancestor.

use crate::clip::AnimatedNode;
use crate::frame_clock::FrameRate;
use crate::mode::SyncMode;
use crate::ticker::{TickEvent, TickSubscription, Ticker};
use crate::timeline::Timeline;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Values a parent hands to a child during the tick walk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Offset of the child inside the parent's timeline
    pub synch_offset: u32,
    /// Rate of the nearest independent ancestor
    pub inherited_rate: FrameRate,
}

/// A clip placed in the scene
#[derive(Debug, Clone)]
pub struct SceneNode<T: Timeline> {
    /// Unique node ID
    pub id: NodeId,
    /// Node name
    pub name: String,
    /// The clip
    pub clip: AnimatedNode<T>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Parent frame at which this node was placed
    placement_frame: u32,
}

impl<T: Timeline> SceneNode<T> {
    /// Parent node, if attached below another node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in tick order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Parent frame at which this node was placed
    pub fn placement_frame(&self) -> u32 {
        self.placement_frame
    }
}

/// Tree of clips driven by a single tick walk
#[derive(Debug, Clone)]
pub struct SceneTree<T: Timeline> {
    nodes: IndexMap<NodeId, SceneNode<T>>,
    roots: Vec<NodeId>,
    /// Rate handed to root clips that inherit
    pub framerate: FrameRate,
}

impl<T: Timeline> SceneTree<T> {
    /// Create an empty scene
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            roots: Vec::new(),
            framerate: FrameRate::Inherit,
        }
    }

    /// Add a clip at the top level
    pub fn add_root(&mut self, name: impl Into<String>, clip: AnimatedNode<T>) -> NodeId {
        let id = self.insert(name.into(), clip, None, 0);
        self.roots.push(id);
        id
    }

    /// Add a clip below `parent`, placed at `placement_frame` of the parent's timeline
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        clip: AnimatedNode<T>,
        placement_frame: u32,
    ) -> Result<NodeId, SceneError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SceneError::NodeNotFound(parent));
        }

        let id = self.insert(name.into(), clip, Some(parent), placement_frame);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }
        Ok(id)
    }

    fn insert(
        &mut self,
        name: String,
        clip: AnimatedNode<T>,
        parent: Option<NodeId>,
        placement_frame: u32,
    ) -> NodeId {
        let id = NodeId::new();
        tracing::debug!("Adding scene node {name} ({id:?})");
        self.nodes.insert(
            id,
            SceneNode {
                id,
                name,
                clip,
                parent,
                children: Vec::new(),
                placement_frame,
            },
        );
        id
    }

    /// Detach a node (and its subtree) from the scene. Detached nodes keep
    /// their state but receive no ticks.
    pub fn detach(&mut self, id: NodeId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(&id) {
            return Err(SceneError::NodeNotFound(id));
        }
        self.unlink(id);
        tracing::debug!("Detached scene node {id:?}");
        Ok(())
    }

    /// Remove a node from its parent's children, or from the roots
    fn unlink(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };

        match node.parent.take() {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    parent_node.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
    }

    /// Attach a detached node below `parent`, or at the top level when `parent` is `None`.
    ///
    /// A node inside a detached subtree is moved out of that subtree.
    pub fn attach(
        &mut self,
        id: NodeId,
        parent: Option<NodeId>,
        placement_frame: u32,
    ) -> Result<(), SceneError> {
        if !self.nodes.contains_key(&id) {
            return Err(SceneError::NodeNotFound(id));
        }
        if self.is_attached(id) {
            return Err(SceneError::AlreadyAttached(id));
        }

        match parent {
            Some(parent) => {
                if !self.nodes.contains_key(&parent) {
                    return Err(SceneError::NodeNotFound(parent));
                }
                if self.depth_first(id).contains(&parent) {
                    return Err(SceneError::WouldCreateCycle);
                }
                self.unlink(id);
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    parent_node.children.push(id);
                }
            }
            None => {
                self.unlink(id);
                self.roots.push(id);
            }
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = parent;
            node.placement_frame = placement_frame;
        }
        tracing::debug!("Attached scene node {id:?}");
        Ok(())
    }

    /// Remove a node and its subtree, returning the node's clip
    pub fn remove(&mut self, id: NodeId) -> Result<AnimatedNode<T>, SceneError> {
        self.detach(id)?;

        let subtree = self.depth_first(id);
        let mut removed = None;
        for node_id in subtree {
            if let Some(node) = self.nodes.swap_remove(&node_id) {
                if node_id == id {
                    removed = Some(node.clip);
                }
            }
        }
        removed.ok_or(SceneError::NodeNotFound(id))
    }

    /// Whether a node is reachable from a root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            match self.nodes.get(&current) {
                Some(node) => match node.parent {
                    Some(parent) => current = parent,
                    None => return self.roots.contains(&current),
                },
                None => return false,
            }
        }
    }

    /// Get a node
    pub fn node(&self, id: NodeId) -> Option<&SceneNode<T>> {
        self.nodes.get(&id)
    }

    /// Get a mutable node
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode<T>> {
        self.nodes.get_mut(&id)
    }

    /// Get a node's clip
    pub fn clip(&self, id: NodeId) -> Option<&AnimatedNode<T>> {
        self.nodes.get(&id).map(|node| &node.clip)
    }

    /// Get a node's clip mutably
    pub fn clip_mut(&mut self, id: NodeId) -> Option<&mut AnimatedNode<T>> {
        self.nodes.get_mut(&id).map(|node| &mut node.clip)
    }

    /// Find the first node with a name
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|node| node.name == name)
            .map(|node| node.id)
    }

    /// Top-level nodes in tick order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node and its descendants, parents before children
    pub fn depth_first(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            order.push(current);
            stack.extend(node.children.iter().rev().copied());
        }

        order
    }

    /// Advance every attached clip by one tick.
    ///
    /// Parents always resolve before their children, so synched children see
    /// the offset of the parent's frame for this tick.
    pub fn tick(&mut self, elapsed_ms: Option<f64>) {
        let root_context = TickContext {
            synch_offset: 0,
            inherited_rate: self.framerate,
        };
        let mut stack: Vec<(NodeId, TickContext)> = self
            .roots
            .iter()
            .rev()
            .map(|id| (*id, root_context))
            .collect();

        while let Some((id, context)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if !node.clip.display.tick_enabled {
                continue;
            }

            let clip = &mut node.clip;
            clip.synchronize(context.synch_offset);
            clip.advance(elapsed_ms, context.inherited_rate);

            let frame = clip.current_frame();
            let inherited_rate = match clip.mode() {
                SyncMode::Independent => clip.effective_framerate(),
                SyncMode::SingleFrame | SyncMode::Synched => context.inherited_rate,
            };
            let children = node.children.clone();

            for child in children.into_iter().rev() {
                let placement = self
                    .nodes
                    .get(&child)
                    .map_or(0, |node| node.placement_frame);
                stack.push((
                    child,
                    TickContext {
                        synch_offset: frame.saturating_sub(placement),
                        inherited_rate,
                    },
                ));
            }
        }
    }
}

impl<T: Timeline + Send + 'static> SceneTree<T> {
    /// Drive a shared scene from a ticker until the subscription is dropped
    pub fn bind(tree: &Arc<Mutex<Self>>, ticker: &Ticker) -> TickSubscription {
        let scene = Arc::downgrade(tree);
        ticker.subscribe(move |event: &TickEvent| match scene.upgrade() {
            Some(scene) => scene.lock().tick(Some(event.elapsed_ms)),
            None => tracing::warn!("Tick {} delivered to a dropped scene", event.sequence),
        })
    }
}

impl<T: Timeline> Default for SceneTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Error changing the scene structure
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Node is already part of the scene
    #[error("Node already attached: {0:?}")]
    AlreadyAttached(NodeId),

    /// Parent is inside the node's own subtree
    #[error("Attaching would create a cycle")]
    WouldCreateCycle,
}
