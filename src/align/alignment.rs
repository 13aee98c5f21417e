use super::cigar::{Cigar, Op};
use super::config::AlignerConfig;
use super::Score;
use crate::annot::{Column, Tuple};
use crate::graph::{reverse_complement, spell_path, DeBruijnGraph, NodeIndex, NPOS};

// A seed: an exact match of a query window to a node path, optionally
// carrying labels and per-label coordinates of its first character.
//
// Seeds and alignments borrow the query; the query buffer must outlive them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Seed<'a> {
    query: &'a [u8],
    nodes: Vec<NodeIndex>,
    orientation: bool,
    offset: usize,
    clipping: usize,
    end_clipping: usize,

    pub label_columns: Vec<Column>,
    // per column, coordinates of the first matched character
    pub label_coordinates: Vec<Tuple>,
}

impl<'a> Seed<'a> {
    pub fn new(
        query: &'a [u8],
        nodes: Vec<NodeIndex>,
        orientation: bool,
        offset: usize,
        clipping: usize,
        end_clipping: usize,
    ) -> Self {
        Seed {
            query,
            nodes,
            orientation,
            offset,
            clipping,
            end_clipping,
            label_columns: Vec::new(),
            label_coordinates: Vec::new(),
        }
    }

    pub fn empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_query_view(&self) -> &'a [u8] {
        &self.query[self.clipping..self.query.len() - self.end_clipping]
    }

    pub fn get_full_query(&self) -> &'a [u8] {
        self.query
    }

    pub fn get_nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn get_offset(&self) -> usize {
        self.offset
    }

    pub fn get_orientation(&self) -> bool {
        self.orientation
    }

    pub fn get_clipping(&self) -> usize {
        self.clipping
    }

    pub fn get_end_clipping(&self) -> usize {
        self.end_clipping
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    // Extend the matched path to the right; the query must spell the added
    // nodes as well.
    pub fn expand(&mut self, next: &[NodeIndex]) {
        assert!(self.end_clipping >= next.len());
        self.end_clipping -= next.len();
        self.nodes.extend_from_slice(next);
    }

    pub fn get_score(&self, config: &AlignerConfig) -> Score {
        config.match_score_of(self.get_query_view().len())
            + if self.clipping == 0 {
                config.left_end_bonus
            } else {
                0
            }
            + if self.end_clipping == 0 {
                config.right_end_bonus
            } else {
                0
            }
    }
}

// Start of a spliced segment beyond the first: at node `node_pos` the path
// restarts with its own offset, with no spelling continuity to the previous
// node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Splice {
    node_pos: usize,
    offset: usize,
}

// One alignment of a query window to a path in the graph.
//
// Invariants maintained by every mutator:
//   - the CIGAR spells query_view() against `sequence`
//   - each spliced segment of `nodes` spells the matching window of `sequence`
//   - score == config.score_from_cigar(cigar) + extra_score
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment<'a> {
    query: &'a [u8],
    nodes: Vec<NodeIndex>,
    sequence: Vec<u8>,
    score: Score,
    cigar: Cigar,
    orientation: bool,
    offset: usize,
    splices: Vec<Splice>,

    pub label_columns: Vec<Column>,
    pub label_coordinates: Vec<Tuple>,
    // per-path-step label sets for chains that switch labels; either empty
    // or exactly one entry per node
    pub label_column_diffs: Vec<Vec<Column>>,
    pub extra_score: Score,
}

impl<'a> Alignment<'a> {
    pub fn from_seed(seed: &Seed<'a>, config: &AlignerConfig) -> Self {
        let mut cigar = Cigar::with_clipping(seed.clipping);
        cigar.append_op(Op::Match, seed.get_query_view().len());
        cigar.append_op(Op::Clipped, seed.end_clipping);
        Alignment {
            query: seed.query,
            nodes: seed.nodes.clone(),
            sequence: seed.get_query_view().to_vec(),
            score: seed.get_score(config),
            cigar,
            orientation: seed.orientation,
            offset: seed.offset,
            splices: Vec::new(),
            label_columns: seed.label_columns.clone(),
            label_coordinates: seed.label_coordinates.clone(),
            label_column_diffs: Vec::new(),
            extra_score: 0,
        }
    }

    pub fn empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_query_view(&self) -> &'a [u8] {
        &self.query[self.get_clipping()..self.query.len() - self.get_end_clipping()]
    }

    pub fn get_full_query(&self) -> &'a [u8] {
        self.query
    }

    // query coordinates of the aligned window
    pub fn query_begin(&self) -> usize {
        self.get_clipping()
    }

    pub fn query_end(&self) -> usize {
        self.query.len() - self.get_end_clipping()
    }

    pub fn get_nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn get_sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn get_score(&self) -> Score {
        self.score
    }

    pub fn get_cigar(&self) -> &Cigar {
        &self.cigar
    }

    pub fn get_clipping(&self) -> usize {
        self.cigar.get_clipping()
    }

    pub fn get_end_clipping(&self) -> usize {
        self.cigar.get_end_clipping()
    }

    pub fn get_offset(&self) -> usize {
        self.offset
    }

    pub fn get_orientation(&self) -> bool {
        self.orientation
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_annotation(&self) -> bool {
        !self.label_columns.is_empty()
    }

    pub fn trim_clipping(&mut self) -> usize {
        self.cigar.trim_clipping()
    }

    pub fn trim_end_clipping(&mut self) -> usize {
        self.cigar.trim_end_clipping()
    }

    fn recompute_score(&mut self, config: &AlignerConfig) {
        self.score = config.score_from_cigar(&self.cigar) + self.extra_score;
    }

    // drop one reference character from the front of the spelled sequence
    fn consume_ref_prefix_char(&mut self, node_overlap: usize) {
        if self.nodes.is_empty() {
            return;
        }
        if self.offset < node_overlap {
            self.offset += 1;
        } else {
            self.nodes.remove(0);
            // a splice reaching the front becomes the base segment
            self.splices.retain_mut(|s| {
                if s.node_pos == 0 {
                    false
                } else {
                    s.node_pos -= 1;
                    true
                }
            });
            if !self.label_column_diffs.is_empty() {
                self.label_column_diffs.remove(0);
            }
        }
    }

    // Remove `n` characters from the query prefix, extending the left
    // clipping. Trimming through an insertion consumes inserted query
    // characters; trimming through a deletion consumes reference characters
    // only. Deletions left dangling at the new front are dropped.
    pub fn trim_query_prefix(&mut self, n: usize, node_overlap: usize, config: &AlignerConfig) {
        if n == 0 {
            return;
        }
        let clip = self.cigar.trim_clipping();
        let mut remaining = n;
        let mut ref_trimmed = 0usize;

        while remaining > 0 {
            let (op, len) = match self.cigar.pop_front() {
                Some(x) => x,
                None => break,
            };
            match op {
                Op::Match | Op::Mismatch => {
                    let t = remaining.min(len);
                    remaining -= t;
                    ref_trimmed += t;
                    for _ in 0..t {
                        self.consume_ref_prefix_char(node_overlap);
                    }
                    if t < len {
                        self.cigar.push_front_op(op, len - t);
                    }
                }
                Op::Insertion => {
                    let t = remaining.min(len);
                    remaining -= t;
                    if t < len {
                        self.cigar.push_front_op(op, len - t);
                    }
                }
                Op::Deletion => {
                    ref_trimmed += len;
                    for _ in 0..len {
                        self.consume_ref_prefix_char(node_overlap);
                    }
                }
                Op::NodeInsertion => {}
                Op::Clipped => unreachable!("clipping inside CIGAR"),
            }
        }

        // excess non-query operations at the new boundary are dropped
        loop {
            match self.cigar.pop_front() {
                Some((Op::Deletion, len)) => {
                    ref_trimmed += len;
                    for _ in 0..len {
                        self.consume_ref_prefix_char(node_overlap);
                    }
                }
                Some((Op::NodeInsertion, _)) => {}
                Some((op, len)) => {
                    self.cigar.push_front_op(op, len);
                    break;
                }
                None => break,
            }
        }

        self.sequence.drain(..ref_trimmed);
        self.cigar.extend_clipping(clip + n);

        // the first matched character moved right in every labeled reference
        for tuple in self.label_coordinates.iter_mut() {
            for coord in tuple.iter_mut() {
                *coord += ref_trimmed as i64;
            }
        }

        if self.nodes.is_empty() {
            *self = Alignment::default();
            return;
        }
        self.recompute_score(config);
    }

    // Remove `n` characters from the query suffix.
    pub fn trim_query_suffix(&mut self, n: usize, config: &AlignerConfig) {
        if n == 0 {
            return;
        }
        let clip = self.cigar.trim_end_clipping();
        let mut remaining = n;
        let mut ref_trimmed = 0usize;

        while remaining > 0 {
            let (op, len) = match self.cigar.pop_back() {
                Some(x) => x,
                None => break,
            };
            match op {
                Op::Match | Op::Mismatch => {
                    let t = remaining.min(len);
                    remaining -= t;
                    ref_trimmed += t;
                    if t < len {
                        self.cigar.append_op(op, len - t);
                    }
                }
                Op::Insertion => {
                    let t = remaining.min(len);
                    remaining -= t;
                    if t < len {
                        self.cigar.append_op(op, len - t);
                    }
                }
                Op::Deletion => {
                    ref_trimmed += len;
                }
                Op::NodeInsertion => {}
                Op::Clipped => unreachable!("clipping inside CIGAR"),
            }
        }

        // dangling reference-only operations at the new end are dropped
        loop {
            match self.cigar.pop_back() {
                Some((Op::Deletion, len)) => ref_trimmed += len,
                Some((Op::NodeInsertion, _)) => {}
                Some((op, len)) => {
                    self.cigar.append_op(op, len);
                    break;
                }
                None => break,
            }
        }

        for _ in 0..ref_trimmed {
            self.nodes.pop();
            if !self.label_column_diffs.is_empty() {
                self.label_column_diffs.pop();
            }
        }
        self.sequence.truncate(self.sequence.len() - ref_trimmed);
        self.cigar.extend_end_clipping(clip + n);

        if self.nodes.is_empty() {
            *self = Alignment::default();
            return;
        }
        while let Some(s) = self.splices.last() {
            if s.node_pos >= self.nodes.len() {
                self.splices.pop();
            } else {
                break;
            }
        }
        self.recompute_score(config);
    }

    // Drop up to `num_nodes` leading nodes covered by the offset; the
    // inverse of extend_offset. Returns how many nodes were removed.
    pub fn trim_offset(&mut self, num_nodes: usize) -> usize {
        // the last node always stays, it spells at least one character
        let trimmed = num_nodes
            .min(self.offset)
            .min(self.nodes.len().saturating_sub(1));
        if trimmed == 0 {
            return 0;
        }
        self.nodes.drain(..trimmed);
        self.offset -= trimmed;
        self.splices.retain_mut(|s| {
            if s.node_pos <= trimmed {
                false
            } else {
                s.node_pos -= trimmed;
                true
            }
        });
        if !self.label_column_diffs.is_empty() {
            self.label_column_diffs.drain(..trimmed);
        }
        trimmed
    }

    // Prepend virtual predecessor nodes; they contribute no spelled
    // characters, only path context for splicing into a node start.
    pub fn extend_offset(&mut self, extra_nodes: Vec<NodeIndex>) {
        let m = extra_nodes.len();
        if m == 0 {
            return;
        }
        for s in self.splices.iter_mut() {
            s.node_pos += m;
        }
        if !self.label_column_diffs.is_empty() {
            let first = self.label_column_diffs[0].clone();
            for _ in 0..m {
                self.label_column_diffs.insert(0, first.clone());
            }
        }
        let mut nodes = extra_nodes;
        nodes.extend_from_slice(&self.nodes);
        self.nodes = nodes;
        self.offset += m;
    }

    // Prepare this alignment for concatenation after a predecessor with a
    // signed graph gap: `gap >= 0` opens an insertion of that many query
    // characters, `gap < 0` records a reference overlap already spelled by
    // the predecessor. Either way the splice is marked with a NODE_INSERTION
    // and charged when the score is recomputed.
    pub fn insert_gap_prefix(&mut self, gap: isize, node_overlap: usize, config: &AlignerConfig) {
        assert!(-gap <= node_overlap as isize);
        self.trim_clipping();
        if gap > 0 {
            self.cigar.push_front_op(Op::Insertion, gap as usize);
        }
        self.cigar.push_front_op(Op::NodeInsertion, 1);
        self.splices.insert(0, Splice {
            node_pos: 0,
            offset: self.offset,
        });
        self.recompute_score(config);
    }

    // Concatenate `next` onto this alignment. The caller has already trimmed
    // clipping at the junction; `extra` carries any junction score such as a
    // label change.
    pub fn append(&mut self, mut next: Alignment<'a>, extra: Score, config: &AlignerConfig) {
        assert_eq!(self.orientation, next.orientation);
        assert!(std::ptr::eq(self.query.as_ptr(), next.query.as_ptr()));

        let base = self.nodes.len();

        let labels_differ = self.label_columns != next.label_columns
            || !next.label_column_diffs.is_empty()
            || !self.label_column_diffs.is_empty();
        if labels_differ {
            if self.label_column_diffs.is_empty() {
                self.label_column_diffs = vec![self.label_columns.clone(); base];
            }
            if next.label_column_diffs.is_empty() {
                self.label_column_diffs
                    .extend(vec![next.label_columns.clone(); next.nodes.len()]);
            } else {
                self.label_column_diffs.append(&mut next.label_column_diffs);
            }
        }

        for s in &next.splices {
            self.splices.push(Splice {
                node_pos: s.node_pos + base,
                offset: s.offset,
            });
        }
        self.nodes.extend_from_slice(&next.nodes);
        self.sequence.extend_from_slice(&next.sequence);
        self.cigar.append(next.cigar);
        self.extra_score += next.extra_score + extra;
        self.recompute_score(config);
    }

    // Like append, but the junction records a label change.
    pub fn splice(&mut self, next: Alignment<'a>, label_change_score: Score, config: &AlignerConfig) {
        self.append(next, label_change_score, config);
    }

    // Flip to the other strand. `query_rc` is the reverse complement of the
    // full query buffer.
    pub fn reverse_complement(
        &mut self,
        graph: &dyn DeBruijnGraph,
        query_rc: &'a [u8],
    ) {
        assert_eq!(self.offset, 0, "cannot reverse an offset alignment");
        assert!(self.splices.is_empty(), "cannot reverse a spliced alignment");
        assert_eq!(query_rc.len(), self.query.len());

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for &node in self.nodes.iter().rev() {
            let rc = graph.reverse_complement_node(node);
            if rc == NPOS {
                *self = Alignment::default();
                return;
            }
            nodes.push(rc);
        }
        self.nodes = nodes;
        self.sequence = reverse_complement(&self.sequence);
        self.label_column_diffs.reverse();

        let mut cigar = Cigar::new();
        for &(op, len) in self.cigar.ops().rev() {
            cigar.append_op(op, len);
        }
        self.cigar = cigar;

        self.query = query_rc;
        self.orientation = !self.orientation;
    }

    // Validates every invariant a mutator must maintain.
    pub fn is_valid(&self, graph: &dyn DeBruijnGraph, config: &AlignerConfig) -> bool {
        if self.empty() {
            return false;
        }

        if !self.cigar.is_valid(&self.sequence, self.get_query_view()) {
            return false;
        }

        // each spliced segment must spell its window of the sequence
        let mut starts: Vec<(usize, usize)> = vec![(0, self.offset)];
        starts.extend(self.splices.iter().map(|s| (s.node_pos, s.offset)));
        let mut spelled = Vec::new();
        for (i, &(node_pos, offset)) in starts.iter().enumerate() {
            let end = starts
                .get(i + 1)
                .map(|&(p, _)| p)
                .unwrap_or(self.nodes.len());
            if node_pos >= end {
                log::error!("Empty spliced segment");
                return false;
            }
            let seg = spell_path(graph, &self.nodes[node_pos..end]);
            if offset >= seg.len() {
                log::error!("Offset {} exceeds segment spelling", offset);
                return false;
            }
            spelled.extend_from_slice(&seg[offset..]);
        }
        if spelled != self.sequence {
            log::error!(
                "Path spells {:?}, alignment stores {:?}",
                String::from_utf8_lossy(&spelled),
                String::from_utf8_lossy(&self.sequence)
            );
            return false;
        }

        if !self.label_column_diffs.is_empty()
            && self.label_column_diffs.len() != self.nodes.len()
        {
            log::error!("Label diff array length does not match path length");
            return false;
        }

        if self.score != config.score_from_cigar(&self.cigar) + self.extra_score {
            log::error!(
                "Score {} disagrees with CIGAR-derived {}",
                self.score,
                config.score_from_cigar(&self.cigar) + self.extra_score
            );
            return false;
        }

        true
    }

    // prefix_scores[i]: score lost by trimming i characters off the query
    // prefix (identical to what trim_query_prefix(i) would subtract).
    pub fn query_prefix_scores(&self, config: &AlignerConfig) -> Vec<Score> {
        let mut out = Vec::with_capacity(self.get_query_view().len() + 1);
        out.push(0);
        let mut probe = self.clone();
        for _ in 0..self.get_query_view().len() {
            probe.trim_query_prefix(1, usize::MAX / 2, config);
            if probe.empty() {
                out.push(self.score);
            } else {
                out.push(self.score - probe.score);
            }
        }
        out
    }

    // suffix_scores[i]: score kept when the alignment is restricted to its
    // first i query characters.
    pub fn query_suffix_scores(&self, config: &AlignerConfig) -> Vec<Score> {
        let len = self.get_query_view().len();
        let mut out = vec![0; len + 1];
        out[len] = self.score;
        let mut probe = self.clone();
        for i in (0..len).rev() {
            probe.trim_query_suffix(1, config);
            out[i] = if probe.empty() { 0 } else { probe.score };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::HashGraph;

    const K: usize = 4;

    fn graph_and_query() -> (HashGraph, &'static [u8]) {
        // query equals a path through the graph
        let g = HashGraph::from_sequences(K, &[b"ACGTAGCATG".as_ref()]);
        (g, b"ACGTAGCATG")
    }

    fn full_match<'a>(g: &HashGraph, query: &'a [u8], config: &AlignerConfig) -> Alignment<'a> {
        let nodes = g.map_to_nodes(query);
        assert!(nodes.iter().all(|&n| n != NPOS));
        let seed = Seed::new(query, nodes, false, 0, 0, 0);
        Alignment::from_seed(&seed, config)
    }

    #[test]
    fn seed_to_alignment() {
        let config = AlignerConfig::default();
        let (g, query) = graph_and_query();
        let aln = full_match(&g, query, &config);
        assert!(aln.is_valid(&g, &config));
        assert_eq!(aln.get_score(), config.match_score_of(query.len()));
        assert_eq!(aln.get_cigar().to_string(), "10=");
        assert_eq!(aln.size(), query.len() - K + 1);
    }

    #[test]
    fn trim_prefix_laws() {
        let config = AlignerConfig::default();
        let (g, query) = graph_and_query();
        let aln = full_match(&g, query, &config);
        let prefix_scores = aln.query_prefix_scores(&config);

        for n in 1..=4 {
            let mut t = aln.clone();
            t.trim_query_prefix(n, K - 1, &config);
            assert!(t.is_valid(&g, &config), "n={}", n);
            assert_eq!(t.get_query_view().len(), query.len() - n);
            assert_eq!(t.get_clipping(), n);
            assert_eq!(aln.get_score() - t.get_score(), prefix_scores[n]);
        }
    }

    #[test]
    fn trim_suffix_laws() {
        let config = AlignerConfig::default();
        let (g, query) = graph_and_query();
        let aln = full_match(&g, query, &config);
        let suffix_scores = aln.query_suffix_scores(&config);

        for n in 1..=4 {
            let mut t = aln.clone();
            t.trim_query_suffix(n, &config);
            assert!(t.is_valid(&g, &config), "n={}", n);
            assert_eq!(t.get_end_clipping(), n);
            assert_eq!(t.get_score(), suffix_scores[query.len() - n]);
        }
    }

    #[test]
    fn trim_prefix_beyond_first_node_drops_nodes() {
        let config = AlignerConfig::default();
        let (g, query) = graph_and_query();
        let aln = full_match(&g, query, &config);
        let mut t = aln.clone();
        // k - 1 = 3 trims fill the offset; the fourth drops a node
        t.trim_query_prefix(K, K - 1, &config);
        assert!(t.is_valid(&g, &config));
        assert_eq!(t.get_offset(), K - 1);
        assert_eq!(t.size(), aln.size() - 1);
    }

    #[test]
    fn trim_offset_inverts_extend_offset() {
        let config = AlignerConfig::default();
        let (g, query) = graph_and_query();
        let aln = full_match(&g, query, &config);

        // nothing to trim on an offset-free alignment
        let mut t = aln.clone();
        assert_eq!(t.trim_offset(5), 0);
        assert_eq!(t, aln);

        // the walked-in predecessors of the first node
        let mut extended = aln.clone();
        let preds: Vec<_> = g.map_to_nodes(query)[..2].to_vec();
        extended.extend_offset(preds);
        assert_eq!(extended.get_offset(), 2);
        assert_eq!(extended.size(), aln.size() + 2);

        assert_eq!(extended.trim_offset(usize::MAX), 2);
        assert_eq!(extended, aln);
        assert!(extended.is_valid(&g, &config));

        // partial trim leaves the remaining virtual nodes in place
        let mut partial = aln.clone();
        partial.extend_offset(g.map_to_nodes(query)[..2].to_vec());
        assert_eq!(partial.trim_offset(1), 1);
        assert_eq!(partial.get_offset(), 1);
        assert_eq!(partial.size(), aln.size() + 1);
    }

    #[test]
    fn append_concatenates() {
        let config = AlignerConfig::default();
        let (g, query) = graph_and_query();

        let mut a = full_match(&g, query, &config);
        a.trim_query_suffix(5, &config);
        let mut b = full_match(&g, query, &config);
        b.trim_query_prefix(5, K - 1, &config);

        // the pieces abut on the query and on the graph
        a.trim_end_clipping();
        b.trim_clipping();
        let b_seq_len = b.get_sequence().len();
        a.append(b, 0, &config);
        assert_eq!(a.get_query_view(), query);
        assert_eq!(a.get_sequence().len(), 5 + b_seq_len);
    }

    #[test]
    fn splice_with_gap_prefix() {
        let config = AlignerConfig::default();
        // two unconnected stretches of graph
        let g = HashGraph::from_sequences(K, &[b"ACGTACG".as_ref(), b"TTGCAATC".as_ref()]);
        let query: &[u8] = b"ACGTACGTTGCAATC";

        let nodes_a = g.map_to_nodes(&query[..7]);
        let a_seed = Seed::new(query, nodes_a, false, 0, 0, 8);
        let mut a = Alignment::from_seed(&a_seed, &config);

        let nodes_b = g.map_to_nodes(&query[7..]);
        let b_seed = Seed::new(query, nodes_b, false, 0, 7, 0);
        let mut b = Alignment::from_seed(&b_seed, &config);

        assert!(a.is_valid(&g, &config));
        assert!(b.is_valid(&g, &config));

        b.insert_gap_prefix(0, K - 1, &config);
        a.trim_end_clipping();
        let expected = a.get_score()
            + b.get_score()
            + config.node_insertion_penalty
            + config.gap_opening_penalty;
        a.append(b, 0, &config);
        assert!(a.is_valid(&g, &config));
        assert_eq!(a.get_query_view(), query);
        assert_eq!(a.get_score(), expected);
        assert!(a.get_cigar().to_string().contains('G'));
    }

    #[test]
    fn reverse_complement_involution() {
        let config = AlignerConfig::default();
        let query: &[u8] = b"ACGTAGCATG";
        let rc: Vec<u8> = reverse_complement(query);
        // both strands present so every node has a reverse complement
        let g = HashGraph::from_sequences(K, &[query.to_vec(), rc.clone()]);

        let aln = full_match(&g, query, &config);
        let mut flipped = aln.clone();
        flipped.reverse_complement(&g, &rc);
        assert!(!flipped.empty());
        assert!(flipped.is_valid(&g, &config));
        assert_eq!(flipped.get_orientation(), true);

        let mut back = flipped.clone();
        back.reverse_complement(&g, query);
        assert_eq!(back, aln);
    }

    #[test]
    fn label_diffs_track_path_length() {
        let config = AlignerConfig::default();
        let (g, query) = graph_and_query();

        let mut a = full_match(&g, query, &config);
        a.label_columns = vec![0];
        a.trim_query_suffix(5, &config);
        let mut b = full_match(&g, query, &config);
        b.label_columns = vec![1];
        b.trim_query_prefix(5, K - 1, &config);

        a.trim_end_clipping();
        b.trim_clipping();
        let total = a.size() + b.size();
        a.splice(b, -1, &config);
        assert_eq!(a.label_column_diffs.len(), total);
        assert_eq!(a.extra_score, -1);
    }
}
