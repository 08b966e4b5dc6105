use super::{Hash, Nibble, NibblePath};

/// A reference to a child node: either inlined directly (when its RLP
/// encoding is shorter than 32 bytes) or stored separately and referenced by
/// its keccak-256 hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRef {
    Hash(Hash),
    Inline(Box<Node>),
}

/// The three node shapes of a Modified Merkle-Patricia Trie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Leaf(LeafNode),
    Extension(ExtensionNode),
    Branch(Box<BranchNode>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafNode {
    pub key: NibblePath,
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionNode {
    pub key: NibblePath,
    pub child: NodeRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchNode {
    pub slots: [Option<NodeRef>; 16],
    pub value: Option<Vec<u8>>,
}

impl BranchNode {
    pub fn empty() -> Self {
        Self { slots: Default::default(), value: None }
    }
}

impl Node {
    pub fn leaf(key: NibblePath, value: Vec<u8>) -> Self {
        Self::Leaf(LeafNode { key, value })
    }

    pub fn extension(key: NibblePath, child: NodeRef) -> Self {
        Self::Extension(ExtensionNode { key, child })
    }

    pub fn branch(branch: BranchNode) -> Self {
        Self::Branch(Box::new(branch))
    }

    /// This node's children, paired with the nibble-path edge consumed to
    /// reach each one from this node (a single nibble for a branch slot, the
    /// whole key for an extension). Leaves have none.
    pub fn children(&self) -> Vec<(NibblePath, NodeRef)> {
        match self {
            Node::Leaf(_) => vec![],
            Node::Extension(ext) => vec![(ext.key.clone(), ext.child.clone())],
            Node::Branch(branch) => branch
                .slots
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| {
                    slot.as_ref().map(|child| {
                        let mut edge = NibblePath::empty();
                        edge.push(Nibble::from(i as u8));
                        (edge, child.clone())
                    })
                })
                .collect(),
        }
    }

    /// The value stored directly at this node, if any: a leaf's value, or a
    /// branch's own terminal value. Extensions never carry one.
    pub fn terminal_value(&self) -> Option<&[u8]> {
        match self {
            Node::Leaf(leaf) => Some(&leaf.value),
            Node::Branch(branch) => branch.value.as_deref(),
            Node::Extension(_) => None,
        }
    }
}
