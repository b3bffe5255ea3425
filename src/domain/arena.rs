use std::collections::HashMap;
use std::fmt;

use generational_arena::{Arena, Index};
use serde_json::{Map, Value};
use termtree::Tree;
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};

/// Attribute marking a node that must not be expanded again.
pub const TERMINAL_ATTRIBUTE: &str = "terminal";

/// Open attribute mapping carried by every node.
pub type Attributes = Map<String, Value>;

/// Tree node in the arena-based skills taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillNode {
    /// Skill or category label
    pub name: String,
    /// Arbitrary attributes; only `terminal` has meaning to the engine
    pub attributes: Attributes,
    /// Index of parent node in the arena, None for the root and detached nodes
    pub parent: Option<Index>,
    /// Indices of child nodes in insertion order
    pub children: Vec<Index>,
}

impl SkillNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_terminal(&self) -> bool {
        self.attributes
            .get(TERMINAL_ATTRIBUTE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Arena-based skills tree.
///
/// The arena owns every node; parent links and child lists are plain indices,
/// so a parent link never implies ownership. Nodes created with
/// [`SkillsTree::insert_detached`] live outside the rooted tree until they are
/// attached with [`SkillsTree::add_child`].
#[derive(Debug, Clone)]
pub struct SkillsTree {
    arena: Arena<SkillNode>,
    root: Index,
}

impl SkillsTree {
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(SkillNode {
            name: name.into(),
            attributes,
            parent: None,
            children: Vec::new(),
        });
        Self { arena, root }
    }

    pub fn root(&self) -> Index {
        self.root
    }

    pub fn get(&self, idx: Index) -> Option<&SkillNode> {
        self.arena.get(idx)
    }

    fn node(&self, idx: Index) -> DomainResult<&SkillNode> {
        self.arena
            .get(idx)
            .ok_or_else(|| DomainError::InvariantViolation(format!("stale node index {idx:?}")))
    }

    fn node_mut(&mut self, idx: Index) -> DomainResult<&mut SkillNode> {
        self.arena
            .get_mut(idx)
            .ok_or_else(|| DomainError::InvariantViolation(format!("stale node index {idx:?}")))
    }

    /// Creates a node that has no parent yet.
    #[instrument(level = "trace", skip(self, attributes))]
    pub fn insert_detached(&mut self, name: impl Into<String> + fmt::Debug, attributes: Attributes) -> Index {
        self.arena.insert(SkillNode {
            name: name.into(),
            attributes,
            parent: None,
            children: Vec::new(),
        })
    }

    /// Appends `child` to the children of `parent` and returns `child`.
    ///
    /// A node may be owned once: attaching a node that already has a parent,
    /// attaching the root, or attaching an ancestor of `parent` fails with
    /// [`DomainError::InvariantViolation`].
    #[instrument(level = "trace", skip(self))]
    pub fn add_child(&mut self, parent: Index, child: Index) -> DomainResult<Index> {
        let child_node = self.node(child)?;
        if child == self.root {
            return Err(DomainError::InvariantViolation(format!(
                "root '{}' cannot be attached as a child",
                child_node.name
            )));
        }
        if let Some(owner) = child_node.parent {
            let owner_name = self.get(owner).map(|n| n.name.as_str()).unwrap_or("?");
            return Err(DomainError::InvariantViolation(format!(
                "'{}' is already a child of '{}'",
                child_node.name, owner_name
            )));
        }

        let mut cursor = Some(parent);
        while let Some(idx) = cursor {
            if idx == child {
                return Err(DomainError::InvariantViolation(format!(
                    "attaching '{}' below itself would create a cycle",
                    child_node.name
                )));
            }
            cursor = self.node(idx)?.parent;
        }

        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(child)
    }

    /// Creates a new node and attaches it below `parent`.
    pub fn add_new_child(
        &mut self,
        parent: Index,
        name: impl Into<String> + fmt::Debug,
        attributes: Attributes,
    ) -> DomainResult<Index> {
        self.node(parent)?;
        let child = self.insert_detached(name, attributes);
        self.add_child(parent, child)
    }

    /// Deep-copies the subtree of `source` rooted at `source_idx` below `parent`.
    ///
    /// Returns the index of the copied subtree root in this tree.
    #[instrument(level = "trace", skip(self, source))]
    pub fn graft(&mut self, parent: Index, source: &SkillsTree, source_idx: Index) -> DomainResult<Index> {
        self.node(parent)?;
        let src_root = source.node(source_idx)?;
        let new_root = self.insert_detached(src_root.name.clone(), src_root.attributes.clone());

        let mut stack = vec![(source_idx, new_root)];
        while let Some((src, dst)) = stack.pop() {
            for &src_child in &source.node(src)?.children {
                let child = source.node(src_child)?;
                let copy = self.insert_detached(child.name.clone(), child.attributes.clone());
                self.add_child(dst, copy)?;
                stack.push((src_child, copy));
            }
        }

        self.add_child(parent, new_root)
    }

    pub fn set_attribute(&mut self, idx: Index, key: &str, value: Value) -> DomainResult<()> {
        self.node_mut(idx)?.attributes.insert(key.to_string(), value);
        Ok(())
    }

    pub fn is_terminal(&self, idx: Index) -> bool {
        self.get(idx).map(SkillNode::is_terminal).unwrap_or(false)
    }

    pub fn iter(&self) -> TreeIterator<'_> {
        self.iter_from(self.root)
    }

    /// Pre-order traversal starting at `idx` (the node itself first).
    pub fn iter_from(&self, idx: Index) -> TreeIterator<'_> {
        TreeIterator::new(self, idx)
    }

    pub fn iter_postorder_from(&self, idx: Index) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self, idx)
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self.root, 1usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(node) = self.get(idx) {
                stack.extend(node.children.iter().map(|&c| (c, depth + 1)));
            }
        }
        max_depth
    }

    /// Collects all leaf nodes below `idx` in depth-first pre-order.
    #[instrument(level = "debug", skip(self))]
    pub fn leaves(&self, idx: Index) -> Vec<Index> {
        self.iter_from(idx)
            .filter(|(_, node)| node.is_leaf())
            .map(|(leaf, _)| leaf)
            .collect()
    }

    /// Names of `idx` and all its descendants, root first, subtrees in child order.
    pub fn names(&self, idx: Index) -> Vec<String> {
        self.iter_from(idx).map(|(_, node)| node.name.clone()).collect()
    }

    /// Flattens the subtree at `idx` into `{name, children, [attributes]}`.
    pub fn to_record(&self, idx: Index, include_attributes: bool) -> Value {
        let mut built: HashMap<Index, Value> = HashMap::new();
        for (current, node) in self.iter_postorder_from(idx) {
            let children: Vec<Value> = node.children.iter().filter_map(|c| built.remove(c)).collect();
            let mut record = Map::new();
            record.insert("name".to_string(), Value::String(node.name.clone()));
            record.insert("children".to_string(), Value::Array(children));
            if include_attributes {
                record.insert("attributes".to_string(), Value::Object(node.attributes.clone()));
            }
            built.insert(current, Value::Object(record));
        }
        built.remove(&idx).unwrap_or(Value::Null)
    }

    /// Indented outline, one `|--- name` line per node.
    pub fn to_outline(&self, idx: Index) -> String {
        let mut lines = Vec::new();
        let mut stack = vec![(idx, 0usize)];
        while let Some((current, level)) = stack.pop() {
            if let Some(node) = self.get(current) {
                lines.push(format!("|{} {}", "-".repeat(level), node.name));
                stack.extend(node.children.iter().rev().map(|&c| (c, level + 1)));
            }
        }
        lines.join("\n")
    }

    pub fn to_termtree(&self, idx: Index) -> Tree<String> {
        let mut built: HashMap<Index, Tree<String>> = HashMap::new();
        for (current, node) in self.iter_postorder_from(idx) {
            let label = if node.is_terminal() {
                format!("{} (terminal)", node.name)
            } else {
                node.name.clone()
            };
            let leaves: Vec<_> = node.children.iter().filter_map(|c| built.remove(c)).collect();
            built.insert(current, Tree::new(label).with_leaves(leaves));
        }
        built
            .remove(&idx)
            .unwrap_or_else(|| Tree::new("Empty tree".to_string()))
    }
}

impl fmt::Display for SkillsTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_outline(self.root))
    }
}

pub struct TreeIterator<'a> {
    tree: &'a SkillsTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a SkillsTree, start: Index) -> Self {
        Self {
            tree,
            stack: vec![start],
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a SkillNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.get(current_idx) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children.iter().rev());
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a SkillsTree,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a SkillsTree, start: Index) -> Self {
        Self {
            tree,
            stack: vec![(start, false)],
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a SkillNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.get(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}
