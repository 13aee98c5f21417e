use kmers::Kmer;
use serde::{Deserialize, Serialize};

use crate::bitvec::Bitmap;

// 1-based node indexing; 0 marks "no node".
pub type NodeIndex = u64;
pub const NPOS: NodeIndex = 0;

// Graphs are shared read-only after load; matrices and buffers hold
// non-owning handles through this alias.
pub type SharedGraph = std::sync::Arc<dyn DeBruijnGraph + Send + Sync>;

pub const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

// sentinel spelled by dummy nodes at sequence boundaries
pub const SENTINEL: u8 = b'$';

#[inline]
pub fn encode_base(c: u8) -> Option<u64> {
    match c {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

#[inline]
pub fn complement(c: u8) -> u8 {
    match c {
        b'A' | b'a' => b'T',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        b'T' | b't' => b'A',
        other => other,
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&c| complement(c)).collect()
}

fn encode_kmer(seq: &[u8]) -> Option<u64> {
    let mut code = 0u64;
    for &c in seq {
        code = (code << 2) | encode_base(c)?;
    }
    Some(code)
}

fn decode_kmer(code: u64, k: usize) -> Vec<u8> {
    let mut out = vec![0u8; k];
    let mut code = code;
    for i in (0..k).rev() {
        out[i] = BASES[(code & 3) as usize];
        code >>= 2;
    }
    out
}

fn rc_code(code: u64, k: usize) -> u64 {
    Kmer::from_u64(code).rev_comp(k).0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphMode {
    Basic,
    Canonical,
}

// The annotation and alignment layers only consume this interface; the
// backing representation is free to vary.
pub trait DeBruijnGraph {
    fn k(&self) -> usize;

    // Largest node index; nodes are 1..=max_index().
    fn max_index(&self) -> u64;

    fn mode(&self) -> GraphMode;

    fn node_sequence(&self, node: NodeIndex) -> Vec<u8>;

    // NPOS for k-mers absent from the graph.
    fn map_to_nodes(&self, seq: &[u8]) -> Vec<NodeIndex>;

    fn call_outgoing(&self, node: NodeIndex, cb: &mut dyn FnMut(NodeIndex, u8));

    fn call_incoming(&self, node: NodeIndex, cb: &mut dyn FnMut(NodeIndex, u8));

    fn outdegree(&self, node: NodeIndex) -> usize {
        let mut n = 0;
        self.call_outgoing(node, &mut |_, _| n += 1);
        n
    }

    fn indegree(&self, node: NodeIndex) -> usize {
        let mut n = 0;
        self.call_incoming(node, &mut |_, _| n += 1);
        n
    }

    fn has_multiple_outgoing(&self, node: NodeIndex) -> bool {
        self.outdegree(node) > 1
    }

    // The node spelling the reverse complement k-mer, NPOS if absent.
    fn reverse_complement_node(&self, node: NodeIndex) -> NodeIndex;

    // Identity on basic graphs; canonical wrappers fold a node with its
    // reverse complement onto the base node.
    fn get_base_node(&self, node: NodeIndex) -> NodeIndex {
        node
    }

    // Enumerate maximal non-branching paths. Each callback gets the spelled
    // sequence and the node path.
    fn call_unitigs(&self, cb: &mut dyn FnMut(&[u8], &[NodeIndex]));

    // The graph-chosen successor used by the row-diff transform. On branching
    // nodes the per-edge `fork_succ` flag picks the successor; edge index is
    // (node - 1) * 4 + base_code.
    fn row_diff_successor(&self, node: NodeIndex, fork_succ: &Bitmap) -> NodeIndex {
        let mut single = NPOS;
        let mut count = 0;
        let mut flagged = NPOS;
        self.call_outgoing(node, &mut |next, c| {
            count += 1;
            single = next;
            let edge = (node - 1) as usize * 4 + encode_base(c).unwrap() as usize;
            if edge < fork_succ.size() && fork_succ.get(edge) && flagged == NPOS {
                flagged = next;
            }
        });
        match count {
            0 => NPOS,
            1 => single,
            _ => {
                if flagged != NPOS {
                    flagged
                } else {
                    // take the smallest outgoing base when no flag is set
                    let mut first = NPOS;
                    self.call_outgoing(node, &mut |next, _| {
                        if first == NPOS {
                            first = next;
                        }
                    });
                    first
                }
            }
        }
    }
}

/******************************************************************************/
// HashGraph -- k-mer hash map graph used for tests, annotation builds, and
// the path index builder. Node ids are ranks in the sorted k-mer code order.
/******************************************************************************/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashGraph {
    k: usize,
    // sorted 2-bit k-mer codes; node id = position + 1
    codes: Vec<u64>,
}

impl HashGraph {
    pub fn from_sequences<S: AsRef<[u8]>>(k: usize, seqs: &[S]) -> Self {
        assert!(k >= 2 && k <= 31);
        let mut codes = Vec::new();
        for seq in seqs {
            let seq = seq.as_ref();
            if seq.len() < k {
                continue;
            }
            for win in seq.windows(k) {
                if let Some(code) = encode_kmer(win) {
                    codes.push(code);
                }
            }
        }
        codes.sort_unstable();
        codes.dedup();
        HashGraph { k, codes }
    }

    fn node_of_code(&self, code: u64) -> NodeIndex {
        match self.codes.binary_search(&code) {
            Ok(i) => (i + 1) as NodeIndex,
            Err(_) => NPOS,
        }
    }

    fn code_of_node(&self, node: NodeIndex) -> u64 {
        debug_assert!(node != NPOS && node <= self.max_index());
        self.codes[(node - 1) as usize]
    }
}

impl DeBruijnGraph for HashGraph {
    fn k(&self) -> usize {
        self.k
    }

    fn max_index(&self) -> u64 {
        self.codes.len() as u64
    }

    fn mode(&self) -> GraphMode {
        GraphMode::Basic
    }

    fn node_sequence(&self, node: NodeIndex) -> Vec<u8> {
        decode_kmer(self.code_of_node(node), self.k)
    }

    fn map_to_nodes(&self, seq: &[u8]) -> Vec<NodeIndex> {
        if seq.len() < self.k {
            return Vec::new();
        }
        seq.windows(self.k)
            .map(|win| match encode_kmer(win) {
                Some(code) => self.node_of_code(code),
                None => NPOS,
            })
            .collect()
    }

    fn call_outgoing(&self, node: NodeIndex, cb: &mut dyn FnMut(NodeIndex, u8)) {
        let code = self.code_of_node(node);
        let mask = (1u64 << (2 * self.k)) - 1;
        let base = (code << 2) & mask;
        for c in 0..4u64 {
            let next = self.node_of_code(base | c);
            if next != NPOS {
                cb(next, BASES[c as usize]);
            }
        }
    }

    fn call_incoming(&self, node: NodeIndex, cb: &mut dyn FnMut(NodeIndex, u8)) {
        let code = self.code_of_node(node);
        let base = code >> 2;
        for c in 0..4u64 {
            let pred_code = (c << (2 * (self.k - 1))) | base;
            let pred = self.node_of_code(pred_code);
            if pred != NPOS {
                cb(pred, BASES[c as usize]);
            }
        }
    }

    fn reverse_complement_node(&self, node: NodeIndex) -> NodeIndex {
        self.node_of_code(rc_code(self.code_of_node(node), self.k))
    }

    fn call_unitigs(&self, cb: &mut dyn FnMut(&[u8], &[NodeIndex])) {
        let n = self.max_index() as usize;
        let mut visited = vec![false; n];

        let is_start = |g: &Self, node: NodeIndex| -> bool {
            if g.indegree(node) != 1 {
                return true;
            }
            let mut pred = NPOS;
            g.call_incoming(node, &mut |p, _| pred = p);
            g.outdegree(pred) > 1
        };

        let mut emit = |g: &Self, start: NodeIndex, visited: &mut Vec<bool>| {
            let mut path = vec![start];
            visited[(start - 1) as usize] = true;
            let mut cur = start;
            loop {
                if g.outdegree(cur) != 1 {
                    break;
                }
                let mut next = NPOS;
                g.call_outgoing(cur, &mut |nx, _| next = nx);
                if next == start || g.indegree(next) != 1 || visited[(next - 1) as usize] {
                    break;
                }
                visited[(next - 1) as usize] = true;
                path.push(next);
                cur = next;
            }
            let mut seq = g.node_sequence(path[0]);
            for &node in &path[1..] {
                let s = g.node_sequence(node);
                seq.push(s[g.k - 1]);
            }
            (seq, path)
        };

        for i in 0..n {
            let node = (i + 1) as NodeIndex;
            if !visited[i] && is_start(self, node) {
                let (seq, path) = emit(self, node, &mut visited);
                cb(&seq, &path);
            }
        }

        // leftover nodes sit on isolated cycles
        for i in 0..n {
            let node = (i + 1) as NodeIndex;
            if !visited[i] {
                let (seq, path) = emit(self, node, &mut visited);
                cb(&seq, &path);
            }
        }
    }
}

/******************************************************************************/
// CanonicalGraph -- wraps a base graph holding canonical k-mers only and
// doubles the index space: ids 1..=n spell the stored k-mers, ids
// n+1..=2n their reverse complements. A palindromic k-mer keeps one id.
/******************************************************************************/
#[derive(Debug, Clone)]
pub struct CanonicalGraph {
    base: HashGraph,
}

impl CanonicalGraph {
    pub fn from_sequences<S: AsRef<[u8]>>(k: usize, seqs: &[S]) -> Self {
        let mut canon: Vec<Vec<u8>> = Vec::new();
        for seq in seqs {
            let seq = seq.as_ref();
            if seq.len() < k {
                continue;
            }
            for win in seq.windows(k) {
                if let Some(code) = encode_kmer(win) {
                    let rc = rc_code(code, k);
                    canon.push(decode_kmer(code.min(rc), k));
                }
            }
        }
        CanonicalGraph {
            base: HashGraph::from_sequences(k, &canon),
        }
    }

    pub fn base(&self) -> &HashGraph {
        &self.base
    }

    fn num_base(&self) -> u64 {
        self.base.max_index()
    }

    fn is_palindrome(&self, base_node: NodeIndex) -> bool {
        let code = self.base.code_of_node(base_node);
        rc_code(code, self.base.k) == code
    }

    fn node_code(&self, node: NodeIndex) -> u64 {
        let n = self.num_base();
        if node <= n {
            self.base.code_of_node(node)
        } else {
            rc_code(self.base.code_of_node(node - n), self.base.k)
        }
    }

    fn node_of_code(&self, code: u64) -> NodeIndex {
        let rc = rc_code(code, self.base.k);
        let canon = code.min(rc);
        let base = self.base.node_of_code(canon);
        if base == NPOS {
            return NPOS;
        }
        if code == canon {
            base
        } else {
            base + self.num_base()
        }
    }
}

impl DeBruijnGraph for CanonicalGraph {
    fn k(&self) -> usize {
        self.base.k()
    }

    fn max_index(&self) -> u64 {
        2 * self.num_base()
    }

    fn mode(&self) -> GraphMode {
        GraphMode::Canonical
    }

    fn node_sequence(&self, node: NodeIndex) -> Vec<u8> {
        decode_kmer(self.node_code(node), self.base.k)
    }

    fn map_to_nodes(&self, seq: &[u8]) -> Vec<NodeIndex> {
        if seq.len() < self.base.k {
            return Vec::new();
        }
        seq.windows(self.base.k)
            .map(|win| match encode_kmer(win) {
                Some(code) => self.node_of_code(code),
                None => NPOS,
            })
            .collect()
    }

    fn call_outgoing(&self, node: NodeIndex, cb: &mut dyn FnMut(NodeIndex, u8)) {
        let code = self.node_code(node);
        let mask = (1u64 << (2 * self.base.k)) - 1;
        let shifted = (code << 2) & mask;
        for c in 0..4u64 {
            let next = self.node_of_code(shifted | c);
            if next != NPOS {
                cb(next, BASES[c as usize]);
            }
        }
    }

    fn call_incoming(&self, node: NodeIndex, cb: &mut dyn FnMut(NodeIndex, u8)) {
        let code = self.node_code(node);
        let base = code >> 2;
        for c in 0..4u64 {
            let pred_code = (c << (2 * (self.base.k - 1))) | base;
            let pred = self.node_of_code(pred_code);
            if pred != NPOS {
                cb(pred, BASES[c as usize]);
            }
        }
    }

    fn reverse_complement_node(&self, node: NodeIndex) -> NodeIndex {
        let n = self.num_base();
        if node <= n {
            if self.is_palindrome(node) {
                node
            } else {
                node + n
            }
        } else {
            node - n
        }
    }

    fn get_base_node(&self, node: NodeIndex) -> NodeIndex {
        let n = self.num_base();
        if node <= n {
            node
        } else {
            node - n
        }
    }

    fn call_unitigs(&self, cb: &mut dyn FnMut(&[u8], &[NodeIndex])) {
        self.base.call_unitigs(cb)
    }
}

// Spell the sequence read along a node path: the first node's k-mer plus
// one character per following node.
pub fn spell_path(graph: &dyn DeBruijnGraph, path: &[NodeIndex]) -> Vec<u8> {
    if path.is_empty() {
        return Vec::new();
    }
    let mut seq = graph.node_sequence(path[0]);
    for &node in &path[1..] {
        let s = graph.node_sequence(node);
        seq.push(s[graph.k() - 1]);
    }
    seq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_and_spell() {
        let g = HashGraph::from_sequences(4, &[b"ACGTACGG".as_ref()]);
        let nodes = g.map_to_nodes(b"ACGTACGG");
        assert_eq!(nodes.len(), 5);
        assert!(nodes.iter().all(|&n| n != NPOS));
        assert_eq!(spell_path(&g, &nodes), b"ACGTACGG".to_vec());
        assert_eq!(g.map_to_nodes(b"AAAA"), vec![NPOS]);
    }

    #[test]
    fn adjacency() {
        let g = HashGraph::from_sequences(3, &[b"ACGT".as_ref(), b"ACGA".as_ref()]);
        let acg = g.map_to_nodes(b"ACG")[0];
        let mut succ = Vec::new();
        g.call_outgoing(acg, &mut |n, c| succ.push((n, c)));
        assert_eq!(succ.len(), 2);
        assert!(succ.iter().any(|&(_, c)| c == b'T'));
        assert!(succ.iter().any(|&(_, c)| c == b'A'));
        assert!(g.has_multiple_outgoing(acg));

        let cgt = g.map_to_nodes(b"CGT")[0];
        let mut pred = Vec::new();
        g.call_incoming(cgt, &mut |n, c| pred.push((n, c)));
        assert_eq!(pred, vec![(acg, b'A')]);
    }

    #[test]
    fn unitigs_split_at_branches() {
        // ACG -> CGT -> GTA and CGT -> GTC: branch after CGT
        let g = HashGraph::from_sequences(3, &[b"ACGTA".as_ref(), b"ACGTC".as_ref()]);
        let mut unitigs = Vec::new();
        g.call_unitigs(&mut |seq, path| unitigs.push((seq.to_vec(), path.to_vec())));
        // one unitig ACGT, then the two branch tails
        let seqs: Vec<Vec<u8>> = unitigs.iter().map(|(s, _)| s.clone()).collect();
        assert!(seqs.contains(&b"ACGT".to_vec()));
        assert!(seqs.contains(&b"GTA".to_vec()));
        assert!(seqs.contains(&b"GTC".to_vec()));
        let total_nodes: usize = unitigs.iter().map(|(_, p)| p.len()).sum();
        assert_eq!(total_nodes, g.max_index() as usize);
    }

    #[test]
    fn cycle_is_covered() {
        // pure cycle ACG -> CGA -> GAC -> ACG, no unitig start anywhere
        let g = HashGraph::from_sequences(3, &[b"ACGACG".as_ref()]);
        let mut covered = 0;
        g.call_unitigs(&mut |_, path| covered += path.len());
        assert_eq!(covered, g.max_index() as usize);
    }

    #[test]
    fn canonical_folding() {
        let g = CanonicalGraph::from_sequences(4, &[b"ACGTAC".as_ref()]);
        let fwd = g.map_to_nodes(b"ACGTAC");
        let bwd = g.map_to_nodes(&reverse_complement(b"ACGTAC"));
        assert!(fwd.iter().all(|&n| n != NPOS));
        assert!(bwd.iter().all(|&n| n != NPOS));
        for (i, &f) in fwd.iter().enumerate() {
            let r = bwd[bwd.len() - 1 - i];
            assert_eq!(g.get_base_node(f), g.get_base_node(r));
            assert_eq!(g.reverse_complement_node(f), r);
        }
    }

    #[test]
    fn row_diff_successor_respects_fork_flag() {
        let g = HashGraph::from_sequences(3, &[b"ACGTA".as_ref(), b"ACGTC".as_ref()]);
        let gt_node = g.map_to_nodes(b"CGT")[0];
        let gta = g.map_to_nodes(b"GTA")[0];
        let gtc = g.map_to_nodes(b"GTC")[0];

        let edges = (g.max_index() as usize) * 4;
        let no_flags = Bitmap::from_bools(std::iter::repeat(false).take(edges));
        // no flag set: smallest base wins
        assert_eq!(g.row_diff_successor(gt_node, &no_flags), gta);

        let mut flags = vec![false; edges];
        flags[(gt_node - 1) as usize * 4 + 1] = true; // select the 'C' edge
        let flags = Bitmap::from_bools(flags);
        assert_eq!(g.row_diff_successor(gt_node, &flags), gtc);
    }
}
