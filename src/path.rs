//! Finds the path from the root down to wherever a key's traversal stops,
//! whether or not the key is actually present. The mutator consumes this to
//! decide how to rewrite the trie without re-walking it.

use crate::{
    error::Result,
    store::NodeStore,
    types::{Nibble, Node, NodeRef},
};

/// One frame of the path from the root to the stopping point.
///
/// `branch_edge` records which nibble was taken out of a `Branch` node to
/// reach the next (deeper) stack item — `Leaf`/`Extension` frames don't need
/// it since they each own exactly one child/key already.
#[derive(Clone, Debug)]
pub struct StackItem {
    pub node: Node,
    pub branch_edge: Option<Nibble>,
}

/// The result of a path search.
pub struct PathResult {
    /// Frames from the root (index 0) down to the stopping point (last).
    pub stack: Vec<StackItem>,
    /// Whatever of the target key's nibbles were not consumed by the time
    /// traversal stopped.
    pub remainder: crate::types::NibblePath,
    /// Set when the key was found exactly (a matching leaf, or a branch
    /// whose own value is occupied with an empty remainder).
    pub found: Option<Node>,
}

/// Walks from `root` towards `key`, stopping as soon as either the key is
/// exhausted, a leaf is reached, or the next step isn't present.
pub async fn find(
    store: &NodeStore,
    root: NodeRef,
    key: &crate::types::NibblePath,
) -> Result<PathResult> {
    let mut stack = Vec::new();
    let mut current_ref = root;
    let mut remaining = key.clone();

    loop {
        let node = resolve(store, current_ref).await?;

        match &node {
            Node::Leaf(leaf) => {
                let found = if leaf.key == remaining { Some(node.clone()) } else { None };
                let remainder = if found.is_some() { crate::types::NibblePath::empty() } else { remaining };
                stack.push(StackItem { node, branch_edge: None });
                return Ok(PathResult { stack, remainder, found });
            }

            Node::Extension(ext) => {
                let m = ext.key.common_prefix_len(&remaining);
                if m == ext.key.len() {
                    let child_ref = ext.child.clone();
                    let next_remaining = remaining.slice(m, remaining.len());
                    stack.push(StackItem { node, branch_edge: None });
                    remaining = next_remaining;
                    current_ref = child_ref;
                    continue;
                }
                stack.push(StackItem { node, branch_edge: None });
                return Ok(PathResult { stack, remainder: remaining, found: None });
            }

            Node::Branch(branch) => {
                if remaining.is_empty() {
                    let found = branch.value.as_ref().map(|_| node.clone());
                    stack.push(StackItem { node, branch_edge: None });
                    return Ok(PathResult { stack, remainder: remaining, found });
                }
                let nibble = remaining.get_nibble(0);
                match &branch.slots[nibble.byte() as usize] {
                    Some(child_ref) => {
                        let child_ref = child_ref.clone();
                        let next_remaining = remaining.slice(1, remaining.len());
                        stack.push(StackItem { node, branch_edge: Some(nibble) });
                        remaining = next_remaining;
                        current_ref = child_ref;
                        continue;
                    }
                    None => {
                        stack.push(StackItem { node, branch_edge: Some(nibble) });
                        return Ok(PathResult { stack, remainder: remaining, found: None });
                    }
                }
            }
        }
    }
}

async fn resolve(store: &NodeStore, node_ref: NodeRef) -> Result<Node> {
    match node_ref {
        NodeRef::Inline(node) => Ok(*node),
        NodeRef::Hash(hash) => store.lookup(&hash).await,
    }
}
