//! Rewrites the trie for a single key's insert or delete, given the path the
//! key's traversal stopped at. This is where the three-node shape gets
//! rebalanced: leaves split into branches on first divergence, and branches
//! collapse back into leaves/extensions once they're down to a single
//! occupant.

use crate::{
    codec::format_node,
    error::Result,
    path::{find, StackItem},
    store::NodeStore,
    types::{BranchNode, Hash, Nibble, NibblePath, Node, NodeRef, EMPTY_ROOT},
};

pub async fn put(
    store: &NodeStore,
    root: Hash,
    key: &NibblePath,
    value: Vec<u8>,
) -> Result<(Hash, Vec<(Hash, Vec<u8>)>)> {
    if value.is_empty() {
        return delete(store, root, key).await;
    }

    let mut ops = Vec::new();

    if root == *EMPTY_ROOT {
        let node_ref = format_node(Node::leaf(key.clone(), value), true, &mut ops);
        return Ok((expect_hash(node_ref), ops));
    }

    let path = find(store, NodeRef::Hash(root), key).await?;
    let mut stack = path.stack;
    let remainder = path.remainder;
    let last = stack.pop().expect("a non-empty trie always yields at least one path frame");

    let chain = match last.node {
        Node::Branch(branch) if remainder.is_empty() => {
            let mut branch = *branch;
            branch.value = Some(value);
            vec![StackItem { node: Node::branch(branch), branch_edge: None }]
        }
        Node::Branch(branch) => {
            let mut branch = *branch;
            let nibble = remainder.get_nibble(0);
            let suffix = remainder.slice(1, remainder.len());
            let leaf_ref = format_node(Node::leaf(suffix, value), false, &mut ops);
            branch.slots[nibble.byte() as usize] = Some(leaf_ref);
            vec![StackItem { node: Node::branch(branch), branch_edge: None }]
        }
        Node::Leaf(leaf) if leaf.key == remainder => {
            vec![StackItem { node: Node::leaf(leaf.key, value), branch_edge: None }]
        }
        old @ (Node::Leaf(_) | Node::Extension(_)) => split(old, &remainder, value, &mut ops),
    };

    stack.extend(chain);
    let root_ref = save_stack(stack, &mut ops);
    Ok((expect_hash(root_ref), ops))
}

/// Splits a diverging leaf or extension into a branch carrying both the old
/// and the new value, wrapped in an extension if they still share a common
/// prefix beyond the split point.
fn split(old: Node, remainder: &NibblePath, new_value: Vec<u8>, ops: &mut Vec<(Hash, Vec<u8>)>) -> Vec<StackItem> {
    let old_key = match &old {
        Node::Leaf(leaf) => leaf.key.clone(),
        Node::Extension(ext) => ext.key.clone(),
        Node::Branch(_) => unreachable!("split is never called on a branch"),
    };
    let m = old_key.common_prefix_len(remainder);
    let mut branch = BranchNode::empty();

    match old {
        Node::Leaf(leaf) => {
            if leaf.key.len() == m {
                branch.value = Some(leaf.value);
            } else {
                let old_nibble = leaf.key.get_nibble(m);
                let old_suffix = leaf.key.slice(m + 1, leaf.key.len());
                let old_ref = format_node(Node::leaf(old_suffix, leaf.value), false, ops);
                branch.slots[old_nibble.byte() as usize] = Some(old_ref);
            }
        }
        Node::Extension(ext) => {
            // path-finding only stops at an extension on true divergence, so
            // `m` is always strictly shorter than the extension's own key.
            let old_nibble = ext.key.get_nibble(m);
            let old_suffix = ext.key.slice(m + 1, ext.key.len());
            if old_suffix.is_empty() {
                branch.slots[old_nibble.byte() as usize] = Some(ext.child);
            } else {
                let old_ref = format_node(Node::extension(old_suffix, ext.child), false, ops);
                branch.slots[old_nibble.byte() as usize] = Some(old_ref);
            }
        }
        Node::Branch(_) => unreachable!(),
    }

    if remainder.len() == m {
        branch.value = Some(new_value);
    } else {
        let new_nibble = remainder.get_nibble(m);
        let new_suffix = remainder.slice(m + 1, remainder.len());
        let new_ref = format_node(Node::leaf(new_suffix, new_value), false, ops);
        branch.slots[new_nibble.byte() as usize] = Some(new_ref);
    }

    if m > 0 {
        let prefix = remainder.slice(0, m);
        // child is a placeholder: save_stack always overwrites it once the
        // branch immediately below is formatted.
        let placeholder = NodeRef::Hash(Hash::from_bytes([0u8; 32]));
        vec![
            StackItem { node: Node::extension(prefix, placeholder), branch_edge: None },
            StackItem { node: Node::branch(branch), branch_edge: None },
        ]
    } else {
        vec![StackItem { node: Node::branch(branch), branch_edge: None }]
    }
}

pub async fn delete(store: &NodeStore, root: Hash, key: &NibblePath) -> Result<(Hash, Vec<(Hash, Vec<u8>)>)> {
    let mut ops = Vec::new();

    if root == *EMPTY_ROOT {
        return Ok((root, ops));
    }

    let path = find(store, NodeRef::Hash(root), key).await?;
    if path.found.is_none() {
        return Ok((root, ops));
    }
    let mut stack = path.stack;
    let last = stack.pop().expect("a matched path always has at least one frame");

    // `current` is the nearest branch that just lost an occupant — its value
    // cleared, or one of its slots emptied — and still needs a collapse/vanish
    // check. `None` means the branch at this level vanished entirely (no
    // slots, no value) and the check must ascend to its parent.
    let mut current: Option<BranchNode> = match last.node {
        Node::Branch(branch) => {
            let mut branch = *branch;
            branch.value = None;
            Some(branch)
        }
        Node::Leaf(_) => None,
        Node::Extension(_) => unreachable!("an extension node never terminates a matched path"),
    };

    loop {
        let branch = match current {
            Some(branch) => branch,
            None => loop {
                // an extension only ever wraps a branch, so a vanished
                // extension frame carries no occupancy of its own — skip
                // past it to the branch above that actually owns a slot
                let Some(parent) = stack.pop() else {
                    // the deleted key was the whole trie, or the last thing
                    // anchoring a chain of now-vanished branches
                    return Ok((*EMPTY_ROOT, ops));
                };
                match parent.node {
                    Node::Branch(parent_branch) => {
                        let mut parent_branch = *parent_branch;
                        let nibble =
                            parent.branch_edge.expect("a branch stack frame always carries its edge");
                        parent_branch.slots[nibble.byte() as usize] = None;
                        break parent_branch;
                    }
                    Node::Extension(_) => continue,
                    Node::Leaf(_) => unreachable!("a leaf can never be an ancestor frame"),
                }
            },
        };

        let slot_count = branch.slots.iter().filter(|s| s.is_some()).count();
        let has_value = branch.value.is_some();

        if slot_count == 0 && !has_value {
            // this branch vanished too (its last remaining occupant was the
            // one we just removed); keep ascending
            current = None;
            continue;
        }

        if slot_count == 1 && !has_value {
            let lone = resolve_lone_occupant(store, &branch).await?;
            let parent = stack.pop();
            collapse(lone, parent, &mut stack);
        } else {
            // a branch with >= 2 slots, or with a value regardless of slot
            // count (including zero slots — a value-only branch is a stable
            // shape, not a collapse candidate), stays a branch
            stack.push(StackItem { node: Node::branch(branch), branch_edge: None });
        }
        break;
    }

    let root_ref = save_stack(stack, &mut ops);
    Ok((expect_hash(root_ref), ops))
}

/// What remains of a branch that has been reduced to exactly one occupied
/// slot (never triggered when the sole occupant is the branch's own value —
/// a value-only branch is a stable shape, not a collapse candidate).
enum Lone {
    /// The sole occupant is itself a branch, reached through slot `nibble`.
    Branch { nibble: Nibble, child_ref: NodeRef },
    /// The sole occupant is a leaf or extension.
    KeyBearing { nibble: Nibble, node: Node },
}

async fn resolve_lone_occupant(store: &NodeStore, branch: &BranchNode) -> Result<Lone> {
    let (index, child_ref) = branch
        .slots
        .iter()
        .enumerate()
        .find_map(|(i, slot)| slot.as_ref().map(|r| (i, r.clone())))
        .expect("slot_count == 1 guarantees exactly one occupied slot");
    let nibble = Nibble::from(index as u8);
    let child = resolve(store, child_ref.clone()).await?;
    match child {
        Node::Branch(_) => Ok(Lone::Branch { nibble, child_ref }),
        _ => Ok(Lone::KeyBearing { nibble, node: child }),
    }
}

fn collapse(lone: Lone, parent: Option<StackItem>, stack: &mut Vec<StackItem>) {
    match parent {
        None => stack.push(StackItem { node: lone_into_root(lone), branch_edge: None }),
        Some(parent) => match parent.node {
            Node::Branch(pb) => {
                let node = lone_into_root(lone);
                stack.push(StackItem { node: Node::branch(*pb), branch_edge: parent.branch_edge });
                stack.push(StackItem { node, branch_edge: None });
            }
            Node::Extension(mut pe) => match lone {
                Lone::Branch { nibble, child_ref } => {
                    pe.key.push(nibble);
                    pe.child = child_ref;
                    stack.push(StackItem { node: Node::Extension(pe), branch_edge: None });
                }
                Lone::KeyBearing { nibble, node } => {
                    let mut merged_key = pe.key;
                    merged_key.push(nibble);
                    stack.push(StackItem { node: prepend(merged_key, node), branch_edge: None });
                }
            },
            Node::Leaf(_) => unreachable!("a leaf can never be an ancestor frame"),
        },
    }
}

fn lone_into_root(lone: Lone) -> Node {
    match lone {
        Lone::Branch { nibble, child_ref } => {
            let mut key = NibblePath::empty();
            key.push(nibble);
            Node::extension(key, child_ref)
        }
        Lone::KeyBearing { nibble, node } => {
            let mut prefix = NibblePath::empty();
            prefix.push(nibble);
            prepend(prefix, node)
        }
    }
}

fn prepend(prefix: NibblePath, node: Node) -> Node {
    let mut key = prefix;
    match node {
        Node::Leaf(leaf) => {
            key.push_path(&leaf.key);
            Node::leaf(key, leaf.value)
        }
        Node::Extension(ext) => {
            key.push_path(&ext.key);
            Node::extension(key, ext.child)
        }
        Node::Branch(_) => unreachable!("a key-bearing collapse never carries a branch"),
    }
}

/// Threads formatted node refs bottom-up through a path stack, replacing
/// each ancestor's link to its (already-resolved) child, then formats the
/// node itself. The outermost frame (index 0) is always the trie root and so
/// is always written out by hash.
fn save_stack(items: Vec<StackItem>, ops: &mut Vec<(Hash, Vec<u8>)>) -> NodeRef {
    let len = items.len();
    let mut last_ref: Option<NodeRef> = None;

    for (rev_index, item) in items.into_iter().rev().enumerate() {
        let index = len - 1 - rev_index;
        let mut node = item.node;
        if let Some(child_ref) = last_ref.take() {
            match &mut node {
                Node::Branch(branch) => {
                    let nibble = item.branch_edge.expect("a branch stack frame always carries its edge");
                    branch.slots[nibble.byte() as usize] = Some(child_ref);
                }
                Node::Extension(ext) => ext.child = child_ref,
                Node::Leaf(_) => unreachable!("a leaf node cannot have a threaded child"),
            }
        }
        last_ref = Some(format_node(node, index == 0, ops));
    }

    last_ref.expect("save_stack is never called with an empty stack")
}

async fn resolve(store: &NodeStore, node_ref: NodeRef) -> Result<Node> {
    match node_ref {
        NodeRef::Inline(node) => Ok(*node),
        NodeRef::Hash(hash) => store.lookup(&hash).await,
    }
}

fn expect_hash(node_ref: NodeRef) -> Hash {
    match node_ref {
        NodeRef::Hash(hash) => hash,
        NodeRef::Inline(_) => unreachable!("a top-level node is always written out by hash"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::memory::MemoryDb, store::BatchOp};
    use std::sync::Arc;

    async fn new_store() -> NodeStore {
        NodeStore::new(Arc::new(MemoryDb::new()))
    }

    async fn commit(store: &NodeStore, ops: Vec<(Hash, Vec<u8>)>) {
        store.batch(ops.into_iter().map(|(h, b)| BatchOp::Put(h, b)).collect()).await.unwrap();
    }

    #[tokio::test]
    async fn put_into_empty_trie_creates_a_leaf_root() {
        let store = new_store().await;
        let key = NibblePath::from(b"ab");
        let (root, ops) = put(&store, *EMPTY_ROOT, &key, b"v1".to_vec()).await.unwrap();
        commit(&store, ops).await;
        let node = store.lookup(&root).await.unwrap();
        assert!(matches!(node, Node::Leaf(_)));
    }

    #[tokio::test]
    async fn overwriting_a_leaf_key_preserves_the_root_shape() {
        let store = new_store().await;
        let key = NibblePath::from(b"ab");
        let (root, ops) = put(&store, *EMPTY_ROOT, &key, b"v1".to_vec()).await.unwrap();
        commit(&store, ops).await;
        let (root2, ops2) = put(&store, root, &key, b"v2".to_vec()).await.unwrap();
        commit(&store, ops2).await;
        let Node::Leaf(leaf) = store.lookup(&root2).await.unwrap() else { panic!("expected leaf") };
        assert_eq!(leaf.value, b"v2");
    }

    #[tokio::test]
    async fn diverging_key_splits_leaf_into_branch() {
        let store = new_store().await;
        let key1 = NibblePath::from(b"ab");
        let (root, ops) = put(&store, *EMPTY_ROOT, &key1, b"v1".to_vec()).await.unwrap();
        commit(&store, ops).await;

        let key2 = NibblePath::from(b"ac");
        let (root2, ops2) = put(&store, root, &key2, b"v2".to_vec()).await.unwrap();
        commit(&store, ops2).await;

        let node = store.lookup(&root2).await.unwrap();
        assert!(matches!(node, Node::Extension(_)) || matches!(node, Node::Branch(_)));
    }

    #[tokio::test]
    async fn delete_of_missing_key_is_a_no_op() {
        let store = new_store().await;
        let key = NibblePath::from(b"ab");
        let (root, ops) = put(&store, *EMPTY_ROOT, &key, b"v1".to_vec()).await.unwrap();
        commit(&store, ops).await;

        let missing = NibblePath::from(b"zz");
        let (root2, ops2) = delete(&store, root, &missing).await.unwrap();
        assert_eq!(root, root2);
        assert!(ops2.is_empty());
    }

    #[tokio::test]
    async fn delete_of_only_key_empties_the_trie() {
        let store = new_store().await;
        let key = NibblePath::from(b"ab");
        let (root, ops) = put(&store, *EMPTY_ROOT, &key, b"v1".to_vec()).await.unwrap();
        commit(&store, ops).await;

        let (root2, _ops2) = delete(&store, root, &key).await.unwrap();
        assert_eq!(root2, *EMPTY_ROOT);
    }

    #[tokio::test]
    async fn delete_collapses_branch_back_to_lone_leaf() {
        let store = new_store().await;
        let key1 = NibblePath::from(b"ab");
        let key2 = NibblePath::from(b"ac");

        let (root, ops) = put(&store, *EMPTY_ROOT, &key1, b"v1".to_vec()).await.unwrap();
        commit(&store, ops).await;
        let (root, ops) = put(&store, root, &key2, b"v2".to_vec()).await.unwrap();
        commit(&store, ops).await;

        let (root, ops) = delete(&store, root, &key2).await.unwrap();
        commit(&store, ops).await;

        let node = store.lookup(&root).await.unwrap();
        let Node::Leaf(leaf) = node else { panic!("expected a lone leaf after collapse, got {node:?}") };
        assert_eq!(leaf.key, key1);
        assert_eq!(leaf.value, b"v1");
    }

    #[tokio::test]
    async fn delete_leaves_a_value_only_branch_uncollapsed() {
        let store = new_store().await;
        let key1 = NibblePath::from(b"a");
        let key2 = NibblePath::from(b"ab");

        let (root, ops) = put(&store, *EMPTY_ROOT, &key1, b"v1".to_vec()).await.unwrap();
        commit(&store, ops).await;
        let (root, ops) = put(&store, root, &key2, b"v2".to_vec()).await.unwrap();
        commit(&store, ops).await;

        let (root, ops) = delete(&store, root, &key2).await.unwrap();
        commit(&store, ops).await;

        let node = store.lookup(&root).await.unwrap();
        let Node::Extension(ext) = node else { panic!("expected an extension wrapping the branch, got {node:?}") };
        let child = resolve(&store, ext.child).await.unwrap();
        let Node::Branch(branch) = child else { panic!("expected a value-only branch, got {child:?}") };
        assert_eq!(branch.value, Some(b"v1".to_vec()));
        assert!(branch.slots.iter().all(|s| s.is_none()));
    }

    #[tokio::test]
    async fn deleting_the_value_of_a_value_only_branch_cascades_upward() {
        let store = new_store().await;
        let key1 = NibblePath::from(b"a");
        let key2 = NibblePath::from(b"ab");

        let (root, ops) = put(&store, *EMPTY_ROOT, &key1, b"v1".to_vec()).await.unwrap();
        commit(&store, ops).await;
        let (root, ops) = put(&store, root, &key2, b"v2".to_vec()).await.unwrap();
        commit(&store, ops).await;

        let (root, ops) = delete(&store, root, &key2).await.unwrap();
        commit(&store, ops).await;
        let (root, ops) = delete(&store, root, &key1).await.unwrap();
        commit(&store, ops).await;

        assert_eq!(root, *EMPTY_ROOT);
    }

    #[tokio::test]
    async fn insertion_order_does_not_affect_final_root() {
        let keys: Vec<(&[u8], &[u8])> =
            vec![(b"alpha", b"1"), (b"alphabet", b"2"), (b"beta", b"3"), (b"be", b"4")];

        let store_a = new_store().await;
        let mut root_a = *EMPTY_ROOT;
        for (k, v) in &keys {
            let (r, ops) = put(&store_a, root_a, &NibblePath::from(*k), v.to_vec()).await.unwrap();
            commit(&store_a, ops).await;
            root_a = r;
        }

        let store_b = new_store().await;
        let mut root_b = *EMPTY_ROOT;
        for (k, v) in keys.iter().rev() {
            let (r, ops) = put(&store_b, root_b, &NibblePath::from(*k), v.to_vec()).await.unwrap();
            commit(&store_b, ops).await;
            root_b = r;
        }

        assert_eq!(root_a, root_b);
    }
}
