mod hash;
mod nibble;
mod nibble_path;
mod node;

pub use {
    hash::{Hash, EMPTY_ROOT, HASH_LEN},
    nibble::Nibble,
    nibble_path::{NibbleIterator, NibblePath},
    node::{BranchNode, ExtensionNode, LeafNode, Node, NodeRef},
};
