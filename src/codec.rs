//! Hex-prefix (HP) path encoding and RLP node (de)serialization.
//!
//! HP encoding folds a node's remaining nibble path and its leaf/extension
//! tag into a single byte string: the first nibble carries the tag plus an
//! odd-length flag, and if the path has odd length its first nibble is
//! packed alongside the flag rather than padded. We build this by
//! constructing a fresh [`NibblePath`] with the flag nibble(s) prepended and
//! the real path appended, then exporting its packed bytes — this sidesteps
//! hand-rolled bit shuffling that's easy to get wrong around the parity
//! boundary.

use rlp::{Rlp, RlpStream};

use crate::{
    error::{Error, Result},
    types::{BranchNode, ExtensionNode, Hash, LeafNode, Nibble, NibblePath, Node, NodeRef},
};

const INLINE_THRESHOLD: usize = 32;

pub fn hp_encode(path: &NibblePath, is_leaf: bool) -> Vec<u8> {
    let is_odd = path.len() % 2 == 1;
    let flag: u8 = match (is_leaf, is_odd) {
        (false, false) => 0,
        (false, true) => 1,
        (true, false) => 2,
        (true, true) => 3,
    };

    let mut flagged = NibblePath::empty();
    flagged.push(Nibble::from(flag));
    if !is_odd {
        flagged.push(Nibble::from(0));
    }
    flagged.push_path(path);

    flagged.bytes().to_vec()
}

pub fn hp_decode(bytes: &[u8]) -> (NibblePath, bool) {
    let full = NibblePath::from_packed(bytes.to_vec(), bytes.len() * 2);
    let flag = full.get_nibble(0).byte();
    let is_leaf = flag >= 2;
    let is_odd = flag % 2 == 1;
    let start = if is_odd { 1 } else { 2 };
    (full.slice(start, full.len()), is_leaf)
}

fn append_node_ref(stream: &mut RlpStream, node_ref: &NodeRef) {
    match node_ref {
        NodeRef::Hash(hash) => {
            stream.append(&hash.as_ref());
        }
        NodeRef::Inline(node) => {
            stream.append_raw(&node.serialize(), 1);
        }
    }
}

fn decode_node_ref(rlp: &Rlp) -> Result<Option<NodeRef>> {
    if rlp.is_list() {
        if rlp.is_empty() {
            return Ok(None);
        }
        return Ok(Some(NodeRef::Inline(Box::new(decode_node(rlp)?))));
    }
    let data = rlp.data()?;
    if data.is_empty() {
        return Ok(None);
    }
    let hash = Hash::try_from(data).map_err(|_| Error::InvalidRootLength { got: data.len() })?;
    Ok(Some(NodeRef::Hash(hash)))
}

fn decode_node(rlp: &Rlp) -> Result<Node> {
    let count = rlp.item_count()?;
    match count {
        2 => {
            let hp = rlp.at(0)?;
            let hp_bytes = hp.data()?;
            let (key, is_leaf) = hp_decode(hp_bytes);
            if is_leaf {
                let value = rlp.at(1)?.data()?.to_vec();
                Ok(Node::leaf(key, value))
            } else {
                let child_rlp = rlp.at(1)?;
                let child = decode_node_ref(&child_rlp)?
                    .expect("extension node must have a child");
                Ok(Node::extension(key, child))
            }
        }
        17 => {
            let mut branch = BranchNode::empty();
            for i in 0..16 {
                let slot_rlp = rlp.at(i)?;
                branch.slots[i] = decode_node_ref(&slot_rlp)?;
            }
            let value_rlp = rlp.at(16)?;
            let value = value_rlp.data()?;
            branch.value = if value.is_empty() { None } else { Some(value.to_vec()) };
            Ok(Node::branch(branch))
        }
        _ => Err(Error::Decode(rlp::DecoderError::RlpIncorrectListLen)),
    }
}

impl Node {
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Node::Leaf(LeafNode { key, value }) => {
                let mut stream = RlpStream::new_list(2);
                stream.append(&hp_encode(key, true));
                stream.append(value);
                stream.out().to_vec()
            }
            Node::Extension(ExtensionNode { key, child }) => {
                let mut stream = RlpStream::new_list(2);
                stream.append(&hp_encode(key, false));
                append_node_ref(&mut stream, child);
                stream.out().to_vec()
            }
            Node::Branch(branch) => {
                let mut stream = RlpStream::new_list(17);
                for slot in &branch.slots {
                    match slot {
                        Some(node_ref) => append_node_ref(&mut stream, node_ref),
                        None => {
                            stream.append_empty_data();
                        }
                    }
                }
                match &branch.value {
                    Some(value) => {
                        stream.append(value);
                    }
                    None => {
                        stream.append_empty_data();
                    }
                }
                stream.out().to_vec()
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Node> {
        let rlp = Rlp::new(bytes);
        decode_node(&rlp)
    }
}

/// Resolves a freshly-built node into a [`NodeRef`], deciding whether it is
/// stored in the backend by hash or inlined directly into its parent.
///
/// A node is inlined whenever its RLP encoding is shorter than 32 bytes,
/// *unless* it is the trie root (`is_top_level`), which is always written out
/// by hash so callers always have a fixed-size root to remember. Every
/// out-of-line node is appended to `puts` for the caller to persist.
pub fn format_node(node: Node, is_top_level: bool, puts: &mut Vec<(Hash, Vec<u8>)>) -> NodeRef {
    let bytes = node.serialize();
    if bytes.len() < INLINE_THRESHOLD && !is_top_level {
        return NodeRef::Inline(Box::new(node));
    }
    let hash = Hash::keccak256(&bytes);
    puts.push((hash, bytes));
    NodeRef::Hash(hash)
}
