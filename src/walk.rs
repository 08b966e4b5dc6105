//! The generic traversal engine: a single recursive walk parameterized by a
//! visitor that decides, at each node, whether to descend further, descend
//! into one specific branch slot, abort the whole walk with a result, or
//! prune just the current subtree.

use futures::future::BoxFuture;

use crate::{
    error::Result,
    store::NodeStore,
    types::{Nibble, NibblePath, Node, NodeRef},
};

/// What the visitor wants to happen next at the node it was just given.
pub enum WalkControl<R> {
    /// Descend into every child (an extension's sole child, or all 16
    /// branch slots in order, stopping at the first one that yields
    /// `Some`).
    Next,
    /// Descend into exactly one branch slot.
    OnlyChild(Nibble),
    /// Abort the entire walk immediately with this result.
    Return(R),
    /// Prune this subtree — siblings elsewhere in the walk still run.
    Stop,
}

/// Walks the trie rooted at `node_ref`, calling `visit` at every node
/// reached. `prefix` is the nibble path already consumed to reach
/// `node_ref` from the root; `visit` receives it alongside the node so
/// callers can reconstruct full keys (a node's own key, for a leaf or
/// extension, still needs to be appended on top of it).
pub fn walk<'a, R, F>(
    store: &'a NodeStore,
    node_ref: NodeRef,
    prefix: NibblePath,
    visit: &'a F,
) -> BoxFuture<'a, Result<Option<R>>>
where
    R: Send + 'a,
    F: Fn(&Node, &NibblePath) -> WalkControl<R> + Sync + 'a,
{
    Box::pin(async move {
        let node = resolve(store, node_ref).await?;

        match visit(&node, &prefix) {
            WalkControl::Return(r) => Ok(Some(r)),
            WalkControl::Stop => Ok(None),
            WalkControl::OnlyChild(nibble) => {
                let Node::Branch(branch) = &node else {
                    return Ok(None);
                };
                match &branch.slots[nibble.byte() as usize] {
                    Some(child) => {
                        let mut child_prefix = prefix;
                        child_prefix.push(nibble);
                        walk(store, child.clone(), child_prefix, visit).await
                    }
                    None => Ok(None),
                }
            }
            WalkControl::Next => {
                for (edge, child_ref) in node.children() {
                    let mut child_prefix = prefix.clone();
                    child_prefix.push_path(&edge);
                    if let Some(r) = walk(store, child_ref, child_prefix, visit).await? {
                        return Ok(Some(r));
                    }
                }
                Ok(None)
            }
        }
    })
}

async fn resolve(store: &NodeStore, node_ref: NodeRef) -> Result<Node> {
    match node_ref {
        NodeRef::Inline(node) => Ok(*node),
        NodeRef::Hash(hash) => store.lookup(&hash).await,
    }
}
