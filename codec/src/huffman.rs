//! Huffman tree over the field-path opcodes.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use bitstream::BitReader;

use crate::error::CodecResult;
use crate::field_path::FIELD_PATH_OPS;

#[derive(Debug, Clone, Copy)]
struct Node {
    symbol: usize,
    children: Option<(usize, usize)>,
}

/// A Huffman tree stored as an arena of nodes.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    root: usize,
}

impl HuffmanTree {
    /// Builds a tree from symbol weights. Zero weights count as one.
    ///
    /// The two lightest nodes are merged first; among equal weights the higher
    /// symbol is taken first. Merged nodes receive symbols after the last
    /// leaf, so the shape is fully determined by `weights`.
    ///
    /// # Panics
    ///
    /// Panics if `weights` is empty.
    #[must_use]
    pub fn build(weights: &[u32]) -> Self {
        assert!(!weights.is_empty(), "huffman tree needs at least one symbol");
        let mut nodes: Vec<Node> = Vec::with_capacity(weights.len() * 2);
        let mut heap = BinaryHeap::with_capacity(weights.len());
        for (symbol, &weight) in weights.iter().enumerate() {
            nodes.push(Node {
                symbol,
                children: None,
            });
            heap.push(Reverse((u64::from(weight.max(1)), Reverse(symbol))));
        }

        while heap.len() > 1 {
            let (Some(Reverse((lw, Reverse(left)))), Some(Reverse((rw, Reverse(right))))) =
                (heap.pop(), heap.pop())
            else {
                break;
            };
            let symbol = nodes.len();
            nodes.push(Node {
                symbol,
                children: Some((left, right)),
            });
            heap.push(Reverse((lw + rw, Reverse(symbol))));
        }

        let root = heap.pop().map_or(0, |Reverse((_, Reverse(node)))| node);
        Self { nodes, root }
    }

    /// Walks the tree one bit at a time until a leaf is reached. A set bit
    /// selects the right child.
    pub fn decode_symbol(&self, reader: &mut BitReader<'_>) -> CodecResult<usize> {
        let mut node = self.nodes[self.root];
        while let Some((left, right)) = node.children {
            node = self.nodes[if reader.read_bit()? { right } else { left }];
        }
        Ok(node.symbol)
    }

    /// The bit sequence of every leaf symbol, indexed by symbol.
    #[must_use]
    pub fn codes(&self) -> Vec<Vec<bool>> {
        let leaves = self.nodes.iter().filter(|n| n.children.is_none()).count();
        let mut codes = vec![Vec::new(); leaves];
        let mut stack = vec![(self.root, Vec::new())];
        while let Some((index, code)) = stack.pop() {
            let node = self.nodes[index];
            match node.children {
                Some((left, right)) => {
                    let mut right_code = code.clone();
                    right_code.push(true);
                    let mut left_code = code;
                    left_code.push(false);
                    stack.push((right, right_code));
                    stack.push((left, left_code));
                }
                None => codes[node.symbol] = code,
            }
        }
        codes
    }

    /// Preorder text dump: one `path:symbol` line per leaf and `path:*` per
    /// internal node, paths written as `0`/`1` strings.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root, String::new())];
        while let Some((index, path)) = stack.pop() {
            let node = self.nodes[index];
            match node.children {
                Some((left, right)) => {
                    let _ = writeln!(out, "{path}:*");
                    stack.push((right, format!("{path}1")));
                    stack.push((left, format!("{path}0")));
                }
                None => {
                    let _ = writeln!(out, "{path}:{}", node.symbol);
                }
            }
        }
        out
    }
}

/// The tree for [`FIELD_PATH_OPS`], built on first use.
pub fn field_path_tree() -> &'static HuffmanTree {
    static TREE: OnceLock<HuffmanTree> = OnceLock::new();
    TREE.get_or_init(|| {
        let weights: Vec<u32> = FIELD_PATH_OPS.iter().map(|op| op.weight).collect();
        HuffmanTree::build(&weights)
    })
}
