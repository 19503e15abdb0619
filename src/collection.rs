//! Collection Tree: an arena of collections, folders and requests
//!
//! Nodes are addressed by stable [`NodeId`]s and store their parent id plus an
//! ordered list of child ids. Nodes are only ever created as children of an
//! existing container and never re-parented, so the tree is acyclic.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::models::{HttpMethod, RequestTemplate};
use crate::variables::{Environment, ScopeChain, ScopeKind, VariableMap};

/// Session-local node identifier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name and variables shared by collections and folders
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub variables: VariableMap,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Collection(Container),
    Folder(Container),
    Request(RequestTemplate),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Collection(c) | NodeKind::Folder(c) => &c.name,
            NodeKind::Request(r) => &r.name,
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self.kind, NodeKind::Request(_))
    }

    pub fn as_request(&self) -> Option<&RequestTemplate> {
        match &self.kind {
            NodeKind::Request(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match &self.kind {
            NodeKind::Collection(c) | NodeKind::Folder(c) => Some(c),
            NodeKind::Request(_) => None,
        }
    }
}

/// What a flattened sidebar row shows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowKind {
    Collection,
    Folder,
    Request(HttpMethod),
}

/// One visible line of the tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeRow {
    pub id: NodeId,
    pub depth: usize,
    pub name: String,
    pub kind: RowKind,
    pub expanded: bool,
    pub has_children: bool,
}

#[derive(Clone, Debug, Default)]
pub struct CollectionTree {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    next_id: u64,
}

impl CollectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    pub fn add_collection(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.allocate();
        self.nodes.insert(
            id,
            Node {
                id,
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Collection(Container {
                    name: name.into(),
                    variables: VariableMap::new(),
                }),
            },
        );
        self.roots.push(id);
        id
    }

    pub fn add_folder(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId, TreeError> {
        let kind = NodeKind::Folder(Container {
            name: name.into(),
            variables: VariableMap::new(),
        });
        self.attach(parent, kind)
    }

    /// Insert a request; its `id` field is overwritten with the new node id
    pub fn add_request(&mut self, parent: NodeId, mut template: RequestTemplate) -> Result<NodeId, TreeError> {
        self.ensure_container(parent)?;
        let id = self.allocate();
        template.id = id;
        self.insert_child(parent, id, NodeKind::Request(template));
        Ok(id)
    }

    fn attach(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, TreeError> {
        self.ensure_container(parent)?;
        let id = self.allocate();
        self.insert_child(parent, id, kind);
        Ok(id)
    }

    fn ensure_container(&self, id: NodeId) -> Result<(), TreeError> {
        match self.nodes.get(&id) {
            None => Err(TreeError::UnknownNode(id)),
            Some(node) if !node.is_container() => Err(TreeError::NotAContainer(id)),
            Some(_) => Ok(()),
        }
    }

    fn insert_child(&mut self, parent: NodeId, id: NodeId, kind: NodeKind) {
        self.nodes.insert(
            id,
            Node {
                id,
                parent: Some(parent),
                children: Vec::new(),
                kind,
            },
        );
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
    }

    /// Remove a node and everything below it, returning the removed ids
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let parent = self.get(id).ok_or(TreeError::UnknownNode(id))?.parent;
        match parent {
            Some(p) => {
                if let Some(node) = self.nodes.get_mut(&p) {
                    node.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().copied());
                removed.push(current);
            }
        }
        Ok(removed)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn request(&self, id: NodeId) -> Result<&RequestTemplate, TreeError> {
        self.get(id)
            .ok_or(TreeError::UnknownNode(id))?
            .as_request()
            .ok_or(TreeError::NotARequest(id))
    }

    /// Replace a request's fields, keeping its identity and position
    pub fn replace_request(&mut self, id: NodeId, mut template: RequestTemplate) -> Result<(), TreeError> {
        let node = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode(id))?;
        match &mut node.kind {
            NodeKind::Request(existing) => {
                template.id = id;
                *existing = template;
                Ok(())
            }
            _ => Err(TreeError::NotARequest(id)),
        }
    }

    /// Replace a collection's or folder's name and variables
    pub fn replace_container(&mut self, id: NodeId, container: Container) -> Result<(), TreeError> {
        let node = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode(id))?;
        match &mut node.kind {
            NodeKind::Collection(existing) | NodeKind::Folder(existing) => {
                *existing = container;
                Ok(())
            }
            NodeKind::Request(_) => Err(TreeError::NotAContainer(id)),
        }
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Strict ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// The collection a node belongs to
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.contains(id) {
            return None;
        }
        Some(self.ancestors(id).last().copied().unwrap_or(id))
    }

    /// Whether `node` sits at or below `ancestor`
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    /// Nearest container at or above `id`
    pub fn container_of(&self, id: NodeId) -> Option<NodeId> {
        let node = self.get(id)?;
        if node.is_container() {
            Some(id)
        } else {
            node.parent
        }
    }

    /// Scopes visible to a request: its own overrides, folders nearest first,
    /// its collection, then the environment if one is active
    pub fn scope_chain(&self, request_id: NodeId, environment: Option<&Environment>) -> Result<ScopeChain, TreeError> {
        let request = self.request(request_id)?;
        let mut chain = ScopeChain::new().with(ScopeKind::Request, request.variables.clone());

        for ancestor in self.ancestors(request_id) {
            if let Some(node) = self.get(ancestor) {
                match &node.kind {
                    NodeKind::Folder(c) => {
                        chain.push(ScopeKind::Folder(c.name.clone()), c.variables.clone())
                    }
                    NodeKind::Collection(c) => {
                        chain.push(ScopeKind::Collection(c.name.clone()), c.variables.clone())
                    }
                    NodeKind::Request(_) => {}
                }
            }
        }

        if let Some(env) = environment {
            chain.push(ScopeKind::Environment(env.name.clone()), env.variables.clone());
        }
        Ok(chain)
    }

    /// Depth-first rows for every node whose ancestors are all expanded
    pub fn visible_rows(&self, expanded: &HashSet<NodeId>) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        for root in &self.roots {
            self.collect_rows(*root, 0, expanded, &mut rows);
        }
        rows
    }

    fn collect_rows(&self, id: NodeId, depth: usize, expanded: &HashSet<NodeId>, rows: &mut Vec<TreeRow>) {
        let Some(node) = self.get(id) else {
            return;
        };
        let kind = match &node.kind {
            NodeKind::Collection(_) => RowKind::Collection,
            NodeKind::Folder(_) => RowKind::Folder,
            NodeKind::Request(r) => RowKind::Request(r.method),
        };
        let is_expanded = expanded.contains(&id);
        rows.push(TreeRow {
            id,
            depth,
            name: node.name().to_string(),
            kind,
            expanded: is_expanded,
            has_children: !node.children.is_empty(),
        });
        if is_expanded {
            for child in &node.children {
                self.collect_rows(*child, depth + 1, expanded, rows);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
