//! The skipping adaptive-Huffman coder.
//!
//! The logical stream is split into `skip_size` interleaved lanes: byte
//! `i` belongs to lane `i % skip_size`. Each lane owns an adaptive Huffman
//! tree; the code bits of all lanes share one MSB-first bit stream in the
//! backing element. Because encoder and decoder update their trees with
//! the identical procedure after every symbol, no code table is stored.
//!
//! A tree starts as a lone escape leaf. The first occurrence of a symbol
//! is sent as the escape code followed by eight raw bits; later
//! occurrences use the symbol's current code. After each symbol the tree
//! reweights, swapping equal-weight nodes toward the root so frequent
//! symbols drift to shorter codes.
//!
//! Encoding is sequential; a backward read restarts every lane from the
//! element start.

use rustyhdf4_format::SkipHuffmanParams;

use crate::compress::bitio::{BitReader, BitWriter};
use crate::compress::coder::{ByteStream, CoderMode, StreamMode};
use crate::error::{Error, Result};

const NIL: usize = usize::MAX;
const INTERNAL: u16 = u16::MAX;
const ESCAPE: u16 = 256;

/// One adaptive Huffman tree over byte symbols plus the escape.
struct AdaptiveTree {
    weight: Vec<u64>,
    parent: Vec<usize>,
    left: Vec<usize>,
    right: Vec<usize>,
    symbol: Vec<u16>,
    /// Node ids ordered by implicit node number, root (highest) first.
    order: Vec<usize>,
    /// Node id → index in `order`.
    pos: Vec<usize>,
    /// Symbol → leaf node id.
    leaf: [usize; 257],
    root: usize,
    escape: usize,
}

impl AdaptiveTree {
    fn new() -> AdaptiveTree {
        let mut t = AdaptiveTree {
            weight: Vec::with_capacity(64),
            parent: Vec::with_capacity(64),
            left: Vec::with_capacity(64),
            right: Vec::with_capacity(64),
            symbol: Vec::with_capacity(64),
            order: Vec::with_capacity(64),
            pos: Vec::with_capacity(64),
            leaf: [NIL; 257],
            root: 0,
            escape: 0,
        };
        let id = t.new_node(0, NIL, ESCAPE);
        t.root = id;
        t.escape = id;
        t.leaf[ESCAPE as usize] = id;
        t
    }

    fn new_node(&mut self, weight: u64, parent: usize, symbol: u16) -> usize {
        let id = self.weight.len();
        self.weight.push(weight);
        self.parent.push(parent);
        self.left.push(NIL);
        self.right.push(NIL);
        self.symbol.push(symbol);
        self.pos.push(self.order.len());
        self.order.push(id);
        id
    }

    fn is_leaf(&self, id: usize) -> bool {
        self.left[id] == NIL
    }

    /// Whether `a` lies on the parent chain of `b`.
    fn is_ancestor(&self, a: usize, b: usize) -> bool {
        let mut n = self.parent[b];
        while n != NIL {
            if n == a {
                return true;
            }
            n = self.parent[n];
        }
        false
    }

    /// Exchange two disjoint subtrees, numbers included.
    fn swap(&mut self, a: usize, b: usize) {
        let pa = self.parent[a];
        let pb = self.parent[b];
        if pa == pb {
            let p = pa;
            if self.left[p] == a {
                self.left[p] = b;
                self.right[p] = a;
            } else {
                self.left[p] = a;
                self.right[p] = b;
            }
        } else {
            if self.left[pa] == a {
                self.left[pa] = b;
            } else {
                self.right[pa] = b;
            }
            if self.left[pb] == b {
                self.left[pb] = a;
            } else {
                self.right[pb] = a;
            }
            self.parent[a] = pb;
            self.parent[b] = pa;
        }
        let ia = self.pos[a];
        let ib = self.pos[b];
        self.order.swap(ia, ib);
        self.pos[a] = ib;
        self.pos[b] = ia;
    }

    /// Reweight the tree after transmitting `sym`.
    fn update(&mut self, sym: u8) {
        let mut node;
        if self.leaf[sym as usize] == NIL {
            // Split the escape leaf: it becomes internal, with a fresh
            // escape on the left and the new symbol's leaf on the right.
            // The new nodes take the two lowest numbers.
            let old = self.escape;
            let leaf = self.new_node(1, old, u16::from(sym));
            let esc = self.new_node(0, old, ESCAPE);
            self.left[old] = esc;
            self.right[old] = leaf;
            self.symbol[old] = INTERNAL;
            self.escape = esc;
            self.leaf[ESCAPE as usize] = esc;
            self.leaf[sym as usize] = leaf;
            self.weight[old] += 1;
            node = self.parent[old];
        } else {
            node = self.leaf[sym as usize];
        }
        while node != NIL {
            // Find the highest-numbered node of the same weight.
            let mut i = self.pos[node];
            while i > 0 && self.weight[self.order[i - 1]] == self.weight[node] {
                i -= 1;
            }
            let leader = self.order[i];
            if leader != node
                && leader != self.parent[node]
                && !self.is_ancestor(leader, node)
                && !self.is_ancestor(node, leader)
            {
                self.swap(node, leader);
            }
            self.weight[node] += 1;
            node = self.parent[node];
        }
    }

    /// Append the code bits of `node` (leaf to root path, reversed).
    fn path_bits(&self, node: usize, out: &mut Vec<bool>) {
        let start = out.len();
        let mut n = node;
        while self.parent[n] != NIL {
            out.push(self.right[self.parent[n]] == n);
            n = self.parent[n];
        }
        out[start..].reverse();
    }

    /// Emit the code for `sym`, then reweight.
    fn encode(&mut self, sym: u8, out: &mut Vec<bool>) {
        let leaf = self.leaf[sym as usize];
        if leaf == NIL {
            self.path_bits(self.escape, out);
            for i in (0..8).rev() {
                out.push((sym >> i) & 1 == 1);
            }
        } else {
            self.path_bits(leaf, out);
        }
        self.update(sym);
    }

    /// Consume one code from the bit stream, then reweight.
    fn decode(
        &mut self,
        br: &mut BitReader,
        io: &mut dyn ByteStream,
    ) -> Result<u8> {
        let mut node = self.root;
        while !self.is_leaf(node) {
            node = if br.next_bit(io)? {
                self.right[node]
            } else {
                self.left[node]
            };
        }
        let sym = if node == self.escape {
            br.next_bits(io, 8)? as u8
        } else {
            self.symbol[node] as u8
        };
        self.update(sym);
        Ok(sym)
    }
}

pub(crate) struct SkipHuffmanCoder {
    skip: u64,
    mode: StreamMode,
    flushed: bool,
    enc_pos: u64,
    enc_trees: Vec<AdaptiveTree>,
    bw: BitWriter,
    bits: Vec<bool>,
    dec_pos: u64,
    dec_trees: Vec<AdaptiveTree>,
    br: BitReader,
}

impl SkipHuffmanCoder {
    pub fn new(params: &SkipHuffmanParams, mode: CoderMode) -> SkipHuffmanCoder {
        let skip = params.skip_size as usize;
        SkipHuffmanCoder {
            skip: skip as u64,
            mode: match mode {
                CoderMode::Read => StreamMode::Decode,
                CoderMode::Write => StreamMode::Encode,
            },
            flushed: false,
            enc_pos: 0,
            enc_trees: (0..skip).map(|_| AdaptiveTree::new()).collect(),
            bw: BitWriter::new(),
            bits: Vec::new(),
            dec_pos: 0,
            dec_trees: (0..skip).map(|_| AdaptiveTree::new()).collect(),
            br: BitReader::new(),
        }
    }

    fn reset_decoder(&mut self) {
        self.dec_pos = 0;
        self.dec_trees = (0..self.skip as usize).map(|_| AdaptiveTree::new()).collect();
        self.br = BitReader::new();
    }

    fn finish_encode(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        self.bw.flush(io)?;
        self.flushed = true;
        Ok(())
    }

    pub fn write(&mut self, io: &mut dyn ByteStream, posn: u64, data: &[u8]) -> Result<()> {
        if self.mode != StreamMode::Encode || self.flushed || posn != self.enc_pos {
            return Err(Error::CannotRandomWrite);
        }
        for &b in data {
            let lane = (self.enc_pos % self.skip) as usize;
            self.bits.clear();
            self.enc_trees[lane].encode(b, &mut self.bits);
            for i in 0..self.bits.len() {
                self.bw.push_bit(io, self.bits[i])?;
            }
            self.enc_pos += 1;
        }
        Ok(())
    }

    fn decode_one(&mut self, io: &mut dyn ByteStream) -> Result<u8> {
        let lane = (self.dec_pos % self.skip) as usize;
        let sym = self.dec_trees[lane].decode(&mut self.br, io)?;
        self.dec_pos += 1;
        Ok(sym)
    }

    pub fn read(&mut self, io: &mut dyn ByteStream, posn: u64, buf: &mut [u8]) -> Result<()> {
        if self.mode == StreamMode::Encode {
            self.finish_encode(io)?;
            self.mode = StreamMode::Decode;
            self.reset_decoder();
        }
        if posn < self.dec_pos {
            self.reset_decoder();
        }
        while self.dec_pos < posn {
            self.decode_one(io)?;
        }
        for b in buf.iter_mut() {
            *b = self.decode_one(io)?;
        }
        Ok(())
    }

    pub fn seek(&mut self, io: &mut dyn ByteStream, posn: u64) -> Result<()> {
        if self.mode == StreamMode::Encode && posn != self.enc_pos {
            self.finish_encode(io)?;
            self.mode = StreamMode::Decode;
            self.reset_decoder();
        }
        Ok(())
    }

    pub fn flush(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        if self.mode == StreamMode::Encode && !self.flushed {
            self.finish_encode(io)?;
        }
        Ok(())
    }
}
