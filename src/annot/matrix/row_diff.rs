use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{BinaryMatrix, IntMatrix, MultiIntMatrix};
use crate::annot::{Column, Row, RowTuples, RowValues, SetBitPositions, Tuple};
use crate::bitvec::Bitmap;
use crate::graph::{DeBruijnGraph, SharedGraph, NPOS};
use crate::io::{check_magic, write_magic};

// coordinates increase by 1 at each edge traversal
pub const SHIFT: i64 = 1;

const MAGIC: &[u8; 4] = b"v2.0";

// typical successor-path length, used to reserve walk buffers
const RD_PATH_RESERVE_SIZE: usize = 2;

/******************************************************************************/
// Delta codes for the integer variant: zero deltas are never stored, so the
// code space starts at zero for delta +1.
//      1 -> 0, -1 -> 1, 2 -> 2, -2 -> 3, ...
/******************************************************************************/
#[inline]
pub fn encode_diff(x: i64) -> u64 {
    debug_assert!(x != 0);
    (x.unsigned_abs() - 1) * 2 + (x < 0) as u64
}

#[inline]
pub fn decode_diff(c: u64) -> i64 {
    if c & 1 == 0 {
        (c / 2 + 1) as i64
    } else {
        -(((c + 1) / 2) as i64)
    }
}

/******************************************************************************/
// Sorted-merge helpers shared by reconstruction and the chainer.
/******************************************************************************/

// symmetric difference of two strictly ascending sets
pub fn xor_merge(a: &[Column], b: &[Column]) -> SetBitPositions {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

// merge by column summing values; zero sums are dropped
fn add_diff_int(diff: &[(Column, i64)], row: &[(Column, i64)]) -> Vec<(Column, i64)> {
    let mut out = Vec::with_capacity(diff.len() + row.len());
    let (mut i, mut j) = (0, 0);
    while i < diff.len() && j < row.len() {
        match diff[i].0.cmp(&row[j].0) {
            std::cmp::Ordering::Less => {
                out.push(diff[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(row[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                let sum = diff[i].1 + row[j].1;
                if sum != 0 {
                    out.push((diff[i].0, sum));
                }
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&diff[i..]);
    out.extend_from_slice(&row[j..]);
    out
}

// per-column symmetric difference of coordinate sets; empty results dropped
pub fn tuple_sym_diff(a: &RowTuples, b: &RowTuples) -> RowTuples {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => {
                out.push(a[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                let sd = coord_sym_diff(&a[i].1, &b[j].1);
                if !sd.is_empty() {
                    out.push((a[i].0, sd));
                }
                i += 1;
                j += 1;
            }
        }
    }
    out.extend(a[i..].iter().cloned());
    out.extend(b[j..].iter().cloned());
    out
}

fn coord_sym_diff(a: &Tuple, b: &Tuple) -> Tuple {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

pub fn shift_tuples(row: &RowTuples, by: i64) -> RowTuples {
    row.iter()
        .map(|(c, t)| (*c, t.iter().map(|&x| x + by).collect()))
        .collect()
}

// merge successor row with a stored diff, then un-shift one edge
fn add_diff_tuples(diff: &RowTuples, row: &RowTuples) -> RowTuples {
    let merged = if diff.is_empty() {
        row.clone()
    } else {
        tuple_sym_diff(diff, row)
    };
    shift_tuples(&merged, -SHIFT)
}

/******************************************************************************/
// Shared state of every row-diff wrapper: anchor bits, fork-successor edge
// flags, and the non-owning graph handle installed after load.
/******************************************************************************/
#[derive(Clone, Serialize, Deserialize)]
pub struct RowDiffCore {
    anchor: Bitmap,
    fork_succ: Bitmap,
    #[serde(skip)]
    graph: Option<SharedGraph>,
}

impl std::fmt::Debug for RowDiffCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowDiffCore")
            .field("anchors", &self.anchor.num_set_bits())
            .field("fork_flags", &self.fork_succ.num_set_bits())
            .finish()
    }
}

impl RowDiffCore {
    pub fn new(anchor: Bitmap, fork_succ: Bitmap) -> Self {
        RowDiffCore {
            anchor,
            fork_succ,
            graph: None,
        }
    }

    pub fn set_graph(&mut self, graph: SharedGraph) {
        assert_eq!(
            graph.max_index(),
            self.anchor.size() as u64,
            "graph/anchor size mismatch"
        );
        self.graph = Some(graph);
    }

    pub fn anchor(&self) -> &Bitmap {
        &self.anchor
    }

    pub fn is_anchor(&self, row: Row) -> bool {
        self.anchor.get(row as usize)
    }

    pub fn successor_row(&self, row: Row) -> Row {
        let graph = self.graph.as_ref().expect("graph must be set");
        let node = graph.row_diff_successor(row + 1, &self.fork_succ);
        assert!(node != NPOS, "non-anchor row has no successor");
        node - 1
    }

    // Walk the successor chain of every query row until an anchor or a row
    // already scheduled in this batch. Returns the deduplicated fetch list and
    // per-query step sequences (indices into the fetch list). Interrupting on
    // previously-seen rows keeps shared chain suffixes linear.
    pub fn get_rd_ids(&self, row_ids: &[Row]) -> (Vec<Row>, Vec<Vec<usize>>) {
        let mut rd_ids: Vec<Row> = Vec::with_capacity(row_ids.len() * RD_PATH_RESERVE_SIZE);
        let mut node_to_rd: HashMap<Row, usize> =
            HashMap::with_capacity(row_ids.len() * RD_PATH_RESERVE_SIZE);
        let mut rd_paths_trunc = vec![Vec::new(); row_ids.len()];

        for (i, &start) in row_ids.iter().enumerate() {
            let mut row = start;
            loop {
                match node_to_rd.entry(row) {
                    Entry::Occupied(e) => {
                        // reached a row reconstructed earlier in this batch
                        rd_paths_trunc[i].push(*e.get());
                        break;
                    }
                    Entry::Vacant(e) => {
                        let idx = rd_ids.len();
                        e.insert(idx);
                        rd_paths_trunc[i].push(idx);
                        rd_ids.push(row);
                    }
                }
                if self.is_anchor(row) {
                    break;
                }
                row = self.successor_row(row);
            }
        }

        (rd_ids, rd_paths_trunc)
    }

    fn serialize_to(&self, w: &mut dyn Write) -> bincode::Result<()> {
        write_magic(w, MAGIC).map_err(bincode::Error::from)?;
        bincode::serialize_into(&mut *w, &self.anchor)?;
        bincode::serialize_into(w, &self.fork_succ)
    }

    fn load_from(r: &mut dyn Read) -> Option<Self> {
        if !check_magic(r, MAGIC) {
            return None;
        }
        let anchor = bincode::deserialize_from(&mut *r).ok()?;
        let fork_succ = bincode::deserialize_from(r).ok()?;
        Some(RowDiffCore {
            anchor,
            fork_succ,
            graph: None,
        })
    }
}

macro_rules! row_diff_common {
    ($name:ident) => {
        impl<B: Serialize + DeserializeOwned> $name<B> {
            pub fn new(anchor: Bitmap, fork_succ: Bitmap, diffs: B) -> Self {
                $name {
                    core: RowDiffCore::new(anchor, fork_succ),
                    diffs,
                }
            }

            pub fn set_graph(&mut self, graph: SharedGraph) {
                self.core.set_graph(graph);
            }

            pub fn core(&self) -> &RowDiffCore {
                &self.core
            }

            pub fn diffs(&self) -> &B {
                &self.diffs
            }

            pub fn serialize_to(&self, w: &mut dyn Write) -> bincode::Result<()> {
                self.core.serialize_to(w)?;
                bincode::serialize_into(w, &self.diffs)
            }

            pub fn load_from(r: &mut dyn Read) -> Option<Self> {
                let core = RowDiffCore::load_from(r)?;
                let diffs = bincode::deserialize_from(r).ok()?;
                Some($name { core, diffs })
            }
        }
    };
}

/******************************************************************************/
// Binary variant: stored rows are symmetric differences against the
// successor row; anchors store the absolute row.
/******************************************************************************/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowDiff<B> {
    core: RowDiffCore,
    diffs: B,
}

row_diff_common!(RowDiff);

impl<B: BinaryMatrix + Serialize + DeserializeOwned> BinaryMatrix for RowDiff<B> {
    fn num_rows(&self) -> u64 {
        self.diffs.num_rows()
    }

    fn num_columns(&self) -> u64 {
        self.diffs.num_columns()
    }

    fn num_relations(&self) -> u64 {
        self.diffs.num_relations()
    }

    fn get(&self, row: Row, col: Column) -> bool {
        self.get_row(row).binary_search(&col).is_ok()
    }

    fn get_row(&self, row: Row) -> SetBitPositions {
        self.get_rows(&[row]).pop().unwrap()
    }

    fn get_rows(&self, row_ids: &[Row]) -> Vec<SetBitPositions> {
        let (rd_ids, rd_paths) = self.core.get_rd_ids(row_ids);
        let mut rd_rows = self.diffs.get_rows(&rd_ids);

        let mut rows = Vec::with_capacity(row_ids.len());
        for path in &rd_paths {
            let mut it = path.iter().rev();
            let mut result = rd_rows[*it.next().unwrap()].clone();
            for &step in it {
                result = xor_merge(&rd_rows[step], &result);
                // cache the full reconstruction for truncated paths
                rd_rows[step] = result.clone();
            }
            rows.push(result);
        }
        rows
    }

    fn get_column(&self, col: Column) -> Vec<Row> {
        // TODO: walk the anchor forest instead of scanning all rows
        (0..self.num_rows()).filter(|&r| self.get(r, col)).collect()
    }
}

/******************************************************************************/
// Integer variant: signed deltas folded into unsigned codes so zero deltas
// need not be stored.
/******************************************************************************/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntRowDiff<B> {
    core: RowDiffCore,
    diffs: B,
}

row_diff_common!(IntRowDiff);

impl<B: IntMatrix + Serialize + DeserializeOwned> IntRowDiff<B> {
    fn reconstruct_values(&self, row_ids: &[Row]) -> Vec<Vec<(Column, i64)>> {
        let (rd_ids, rd_paths) = self.core.get_rd_ids(row_ids);
        let mut rd_rows: Vec<Vec<(Column, i64)>> = self
            .diffs
            .get_rows_values(&rd_ids)
            .into_iter()
            .map(|row| {
                let mut row: Vec<(Column, i64)> = row
                    .into_iter()
                    .map(|(c, v)| (c, decode_diff(v)))
                    .collect();
                row.sort_unstable();
                row
            })
            .collect();

        let mut rows = Vec::with_capacity(row_ids.len());
        for path in &rd_paths {
            let mut it = path.iter().rev();
            let mut result = rd_rows[*it.next().unwrap()].clone();
            for &step in it {
                result = add_diff_int(&rd_rows[step], &result);
                rd_rows[step] = result.clone();
            }
            debug_assert!(result.iter().all(|&(_, v)| v > 0));
            rows.push(result);
        }
        rows
    }
}

impl<B: IntMatrix + Serialize + DeserializeOwned> BinaryMatrix for IntRowDiff<B> {
    fn num_rows(&self) -> u64 {
        self.diffs.num_rows()
    }

    fn num_columns(&self) -> u64 {
        self.diffs.num_columns()
    }

    fn num_relations(&self) -> u64 {
        self.diffs.num_relations()
    }

    fn get(&self, row: Row, col: Column) -> bool {
        self.get_row(row).binary_search(&col).is_ok()
    }

    fn get_row(&self, row: Row) -> SetBitPositions {
        self.get_row_values(row).into_iter().map(|(c, _)| c).collect()
    }

    fn get_rows(&self, row_ids: &[Row]) -> Vec<SetBitPositions> {
        self.reconstruct_values(row_ids)
            .into_iter()
            .map(|row| row.into_iter().map(|(c, _)| c).collect())
            .collect()
    }

    fn get_column(&self, col: Column) -> Vec<Row> {
        (0..self.num_rows()).filter(|&r| self.get(r, col)).collect()
    }
}

impl<B: IntMatrix + Serialize + DeserializeOwned> IntMatrix for IntRowDiff<B> {
    fn get_row_values(&self, row: Row) -> RowValues {
        self.get_rows_values(&[row]).pop().unwrap()
    }

    fn get_rows_values(&self, rows: &[Row]) -> Vec<RowValues> {
        self.reconstruct_values(rows)
            .into_iter()
            .map(|row| row.into_iter().map(|(c, v)| (c, v as u64)).collect())
            .collect()
    }
}

/******************************************************************************/
// Coordinate variant: stored rows are per-column coordinate symmetric
// differences against the successor, with coordinates shifted by one per
// edge; anchors store absolute coordinates.
/******************************************************************************/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TupleRowDiff<B> {
    core: RowDiffCore,
    diffs: B,
}

row_diff_common!(TupleRowDiff);

impl<B: MultiIntMatrix + Serialize + DeserializeOwned> TupleRowDiff<B> {
    fn reconstruct_tuples(&self, row_ids: &[Row]) -> Vec<RowTuples> {
        let (rd_ids, rd_paths) = self.core.get_rd_ids(row_ids);
        let mut rd_rows = self.diffs.get_rows_tuples(&rd_ids);
        for row in rd_rows.iter_mut() {
            row.sort_unstable_by_key(|(c, _)| *c);
        }

        let mut rows = Vec::with_capacity(row_ids.len());
        for path in &rd_paths {
            let mut it = path.iter().rev();
            let mut result = rd_rows[*it.next().unwrap()].clone();
            for &step in it {
                result = add_diff_tuples(&rd_rows[step], &result);
                rd_rows[step] = result.clone();
            }
            debug_assert!(result.iter().all(|(_, t)| !t.is_empty()));
            rows.push(result);
        }
        rows
    }

    // Batched reconstruction for a path of consecutive query rows. The first
    // result is absolute (taken from `first_tuple` when supplied, saving a
    // walk); each following result is the row-to-row coordinate delta: the
    // per-column symmetric difference against the previous row shifted by
    // one edge.
    pub fn get_row_tuple_diffs(
        &self,
        row_ids: &[Row],
        first_tuple: Option<&RowTuples>,
    ) -> Vec<RowTuples> {
        if row_ids.is_empty() {
            return Vec::new();
        }
        if row_ids.len() == 1 {
            return match first_tuple {
                Some(t) => vec![t.clone()],
                None => self.reconstruct_tuples(row_ids),
            };
        }

        let abs = if let Some(first) = first_tuple {
            let mut rest = self.reconstruct_tuples(&row_ids[1..]);
            let mut all = Vec::with_capacity(row_ids.len());
            all.push(first.clone());
            all.append(&mut rest);
            all
        } else {
            self.reconstruct_tuples(row_ids)
        };

        let mut out = Vec::with_capacity(abs.len());
        out.push(abs[0].clone());
        for i in 1..abs.len() {
            let shifted = shift_tuples(&abs[i - 1], SHIFT);
            out.push(tuple_sym_diff(&abs[i], &shifted));
        }
        out
    }
}

impl<B: MultiIntMatrix + Serialize + DeserializeOwned> BinaryMatrix for TupleRowDiff<B> {
    fn num_rows(&self) -> u64 {
        self.diffs.num_rows()
    }

    fn num_columns(&self) -> u64 {
        self.diffs.num_columns()
    }

    fn num_relations(&self) -> u64 {
        self.diffs.num_relations()
    }

    fn get(&self, row: Row, col: Column) -> bool {
        self.get_row(row).binary_search(&col).is_ok()
    }

    fn get_row(&self, row: Row) -> SetBitPositions {
        self.get_row_tuples(row).into_iter().map(|(c, _)| c).collect()
    }

    fn get_rows(&self, row_ids: &[Row]) -> Vec<SetBitPositions> {
        self.reconstruct_tuples(row_ids)
            .into_iter()
            .map(|row| row.into_iter().map(|(c, _)| c).collect())
            .collect()
    }

    fn get_column(&self, col: Column) -> Vec<Row> {
        (0..self.num_rows()).filter(|&r| self.get(r, col)).collect()
    }
}

impl<B: MultiIntMatrix + Serialize + DeserializeOwned> MultiIntMatrix for TupleRowDiff<B> {
    fn get_row_tuples(&self, row: Row) -> RowTuples {
        self.get_rows_tuples(&[row]).pop().unwrap()
    }

    fn get_rows_tuples(&self, rows: &[Row]) -> Vec<RowTuples> {
        self.reconstruct_tuples(rows)
    }
}

/******************************************************************************/
// Build-time assignment of anchors, fork-successor flags, and stored diffs
// for in-memory graphs.
/******************************************************************************/
pub struct RowDiffBuilder {
    anchor: Vec<bool>,
    fork_succ: Vec<bool>,
    succ: Vec<Row>,
}

impl RowDiffBuilder {
    // Chooses a successor per node (the smallest outgoing base, flagged in
    // `fork_succ` on branching nodes), anchors every sink and cycle entry,
    // and cuts successor chains at `max_path_length`.
    pub fn new(graph: &dyn DeBruijnGraph, max_path_length: usize) -> Self {
        assert!(max_path_length >= 1);
        let n = graph.max_index() as usize;
        let mut anchor = vec![false; n];
        let mut fork_succ = vec![false; n * 4];
        let mut succ = vec![NPOS; n];

        for node in 1..=n as u64 {
            let mut chosen: Option<(u64, u8)> = None;
            let mut outdeg = 0;
            graph.call_outgoing(node, &mut |next, c| {
                outdeg += 1;
                if chosen.is_none() {
                    chosen = Some((next, c));
                }
            });
            match chosen {
                None => anchor[(node - 1) as usize] = true,
                Some((next, c)) => {
                    succ[(node - 1) as usize] = next - 1;
                    if outdeg > 1 {
                        let edge =
                            (node - 1) as usize * 4 + crate::graph::encode_base(c).unwrap() as usize;
                        fork_succ[edge] = true;
                    }
                }
            }
        }

        // distance-to-anchor pass; cycles get broken by anchoring the
        // re-entered node
        let mut depth = vec![usize::MAX; n];
        for start in 0..n {
            if depth[start] != usize::MAX {
                continue;
            }
            let mut stack = Vec::new();
            let mut on_stack: HashMap<usize, usize> = HashMap::new();
            let mut cur = start;
            loop {
                if anchor[cur] {
                    depth[cur] = 0;
                    break;
                }
                if depth[cur] != usize::MAX {
                    break;
                }
                if on_stack.contains_key(&cur) {
                    // successor chain closed a cycle; break it here
                    anchor[cur] = true;
                    depth[cur] = 0;
                    break;
                }
                on_stack.insert(cur, stack.len());
                stack.push(cur);
                cur = succ[cur] as usize;
            }
            let mut d = depth[cur];
            for &node in stack.iter().rev() {
                if depth[node] != usize::MAX {
                    break;
                }
                d += 1;
                if d >= max_path_length {
                    anchor[node] = true;
                    d = 0;
                }
                depth[node] = d;
            }
        }

        RowDiffBuilder {
            anchor,
            fork_succ,
            succ,
        }
    }

    pub fn anchor_bitmap(&self) -> Bitmap {
        Bitmap::from_bools(self.anchor.iter().copied())
    }

    pub fn fork_succ_bitmap(&self) -> Bitmap {
        let ones: Vec<usize> = self
            .fork_succ
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect();
        Bitmap::adaptive_from_ones(self.fork_succ.len(), &ones)
    }

    pub fn stored_binary_rows(&self, rows: &[SetBitPositions]) -> Vec<SetBitPositions> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                if self.anchor[i] {
                    row.clone()
                } else {
                    xor_merge(row, &rows[self.succ[i] as usize])
                }
            })
            .collect()
    }

    pub fn stored_int_rows(&self, rows: &[RowValues]) -> Vec<RowValues> {
        let signed: Vec<Vec<(Column, i64)>> = rows
            .iter()
            .map(|r| r.iter().map(|&(c, v)| (c, v as i64)).collect())
            .collect();
        signed
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let delta = if self.anchor[i] {
                    row.clone()
                } else {
                    let negated: Vec<(Column, i64)> = signed[self.succ[i] as usize]
                        .iter()
                        .map(|&(c, v)| (c, -v))
                        .collect();
                    add_diff_int(row, &negated)
                };
                delta
                    .into_iter()
                    .map(|(c, v)| (c, encode_diff(v)))
                    .collect()
            })
            .collect()
    }

    pub fn stored_tuple_rows(&self, rows: &[RowTuples]) -> Vec<RowTuples> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                if self.anchor[i] {
                    row.clone()
                } else {
                    tuple_sym_diff(&shift_tuples(row, SHIFT), &rows[self.succ[i] as usize])
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annot::matrix::ColumnMajor;
    use crate::graph::HashGraph;
    use std::sync::Arc;

    // linear 5-node graph: ACGTAGCA with k=4
    fn linear_graph() -> Arc<HashGraph> {
        let g = HashGraph::from_sequences(4, &[b"ACGTAGCA".as_ref()]);
        assert_eq!(g.max_index(), 5);
        Arc::new(g)
    }

    fn rows_on_path(
        graph: &HashGraph,
        seq: &[u8],
        per_node: Vec<SetBitPositions>,
    ) -> Vec<SetBitPositions> {
        let path = graph.map_to_nodes(seq);
        let mut rows = vec![Vec::new(); graph.max_index() as usize];
        for (node, row) in path.iter().zip(per_node) {
            rows[(node - 1) as usize] = row;
        }
        rows
    }

    #[test]
    fn encode_decode_codes() {
        for x in [-5i64, -2, -1, 1, 2, 7] {
            assert_eq!(decode_diff(encode_diff(x)), x);
        }
        assert_eq!(encode_diff(1), 0);
        assert_eq!(encode_diff(-1), 1);
        assert_eq!(encode_diff(2), 2);
        assert_eq!(encode_diff(-2), 3);
    }

    #[test]
    fn chain_of_three_stores_expected_deltas() {
        // r0 -> r1 -> r2 with r0={A,B}, r1={B,C}, r2={C}; the stored deltas
        // are symmetric differences with the successor row
        let g = linear_graph();
        let seq = b"ACGTAG"; // first three nodes of the linear graph
        let path = g.map_to_nodes(seq);
        assert_eq!(path.len(), 3);

        let rows = rows_on_path(&g, seq, vec![vec![0, 1], vec![1, 2], vec![2]]);
        let builder = RowDiffBuilder::new(g.as_ref(), 64);
        let stored = builder.stored_binary_rows(&rows);

        let r = |i: usize| (path[i] - 1) as usize;
        // r1 keeps only what differs from r2; r2 differs from the empty row
        // past the end of the annotated path
        assert_eq!(stored[r(1)], vec![1]);
        assert_eq!(stored[r(2)], vec![2]);

        let diffs = ColumnMajor::from_rows(rows.len() as u64, 3, &stored);
        let mut rd = RowDiff::new(builder.anchor_bitmap(), builder.fork_succ_bitmap(), diffs);
        rd.set_graph(g.clone());

        assert_eq!(rd.get_row(r(0) as Row), vec![0, 1]);
        assert_eq!(rd.get_row(r(1) as Row), vec![1, 2]);
        assert_eq!(rd.get_row(r(2) as Row), vec![2]);
    }

    #[test]
    fn anchors_store_absolute_rows() {
        let g = linear_graph();
        let builder = RowDiffBuilder::new(g.as_ref(), 64);
        let rows: Vec<SetBitPositions> =
            (0..g.max_index()).map(|i| vec![i % 3, 3 + i % 2]).collect();
        let stored = builder.stored_binary_rows(&rows);
        for (i, row) in rows.iter().enumerate() {
            if builder.anchor[i] {
                assert_eq!(&stored[i], row);
            }
        }
        // the sink of the linear graph must be an anchor
        let last = g.map_to_nodes(b"ACGTAGCA".as_ref()).pop().unwrap();
        assert!(builder.anchor[(last - 1) as usize]);
    }

    #[test]
    fn binary_roundtrip_equals_base() {
        let g = Arc::new(HashGraph::from_sequences(
            4,
            &[b"ACGTACGGATCGA".as_ref(), b"ACGTTTGACCA".as_ref()],
        ));
        let n = g.max_index() as usize;
        let rows: Vec<SetBitPositions> = (0..n)
            .map(|i| {
                let mut r: Vec<Column> = (0..5).filter(|&c| (i * 7 + c as usize) % 3 == 0).collect();
                r.sort_unstable();
                r
            })
            .collect();

        for max_len in [1, 2, 64] {
            let builder = RowDiffBuilder::new(g.as_ref(), max_len);
            let stored = builder.stored_binary_rows(&rows);
            let diffs = ColumnMajor::from_rows(n as u64, 5, &stored);
            let mut rd = RowDiff::new(builder.anchor_bitmap(), builder.fork_succ_bitmap(), diffs);
            rd.set_graph(g.clone());

            for (i, row) in rows.iter().enumerate() {
                assert_eq!(&rd.get_row(i as Row), row, "max_len={} row={}", max_len, i);
                for c in 0..5u64 {
                    assert_eq!(rd.get(i as Row, c), row.contains(&c));
                }
            }
            // batch equals singles, shared suffixes included
            let all: Vec<Row> = (0..n as u64).collect();
            assert_eq!(rd.get_rows(&all), rows);
        }
    }

    #[test]
    fn int_roundtrip_equals_base() {
        let g = linear_graph();
        let n = g.max_index() as usize;
        let rows: Vec<RowValues> = (0..n)
            .map(|i| {
                (0..3u64)
                    .filter(|&c| (i + c as usize) % 2 == 0)
                    .map(|c| (c, (i as u64 + c + 1) * 2))
                    .collect()
            })
            .collect();

        let builder = RowDiffBuilder::new(g.as_ref(), 64);
        let stored = builder.stored_int_rows(&rows);
        let diffs = ColumnMajor::from_row_values(n as u64, 3, &stored);
        let mut rd = IntRowDiff::new(builder.anchor_bitmap(), builder.fork_succ_bitmap(), diffs);
        rd.set_graph(g.clone());

        for (i, row) in rows.iter().enumerate() {
            assert_eq!(&rd.get_row_values(i as Row), row, "row {}", i);
        }
    }

    #[test]
    fn tuple_roundtrip_and_diffs() {
        let g = linear_graph();
        let n = g.max_index() as usize;
        let seq = b"ACGTAGCA";
        let path = g.map_to_nodes(seq);

        // coordinates increase along the path, like a contig annotation
        let mut rows: Vec<RowTuples> = vec![Vec::new(); n];
        for (d, &node) in path.iter().enumerate() {
            rows[(node - 1) as usize] = vec![(0, vec![d as i64, 100 + d as i64])];
        }

        let builder = RowDiffBuilder::new(g.as_ref(), 64);
        let stored = builder.stored_tuple_rows(&rows);
        let diffs = ColumnMajor::from_row_tuples(n as u64, 1, &stored);
        let mut rd = TupleRowDiff::new(builder.anchor_bitmap(), builder.fork_succ_bitmap(), diffs);
        rd.set_graph(g.clone());

        for (i, row) in rows.iter().enumerate() {
            assert_eq!(&rd.get_row_tuples(i as Row), row, "row {}", i);
        }

        // consecutive coordinates annihilate in the delta form
        let query: Vec<Row> = path.iter().map(|&v| v - 1).collect();
        let deltas = rd.get_row_tuple_diffs(&query, None);
        assert_eq!(deltas[0], rows[(path[0] - 1) as usize]);
        for d in &deltas[1..] {
            assert!(d.is_empty(), "clean extension must produce empty deltas");
        }

        // first_tuple shortcut returns it verbatim
        let seeded = rd.get_row_tuple_diffs(&query, Some(&rows[(path[0] - 1) as usize]));
        assert_eq!(seeded, deltas);
    }

    #[test]
    fn serialize_magic_and_roundtrip() {
        let g = linear_graph();
        let n = g.max_index() as usize;
        let rows: Vec<SetBitPositions> = (0..n).map(|i| vec![i as Column % 2]).collect();
        let builder = RowDiffBuilder::new(g.as_ref(), 8);
        let stored = builder.stored_binary_rows(&rows);
        let diffs = ColumnMajor::from_rows(n as u64, 2, &stored);
        let mut rd = RowDiff::new(builder.anchor_bitmap(), builder.fork_succ_bitmap(), diffs);
        rd.set_graph(g.clone());

        let mut buf = Vec::new();
        rd.serialize_to(&mut buf).unwrap();
        assert_eq!(&buf[..4], b"v2.0");

        let mut loaded =
            RowDiff::<ColumnMajor>::load_from(&mut std::io::Cursor::new(&buf)).unwrap();
        loaded.set_graph(g.clone());
        for i in 0..n as u64 {
            assert_eq!(loaded.get_row(i), rd.get_row(i));
        }

        // corrupt magic fails the load
        buf[0] = b'x';
        assert!(RowDiff::<ColumnMajor>::load_from(&mut std::io::Cursor::new(&buf)).is_none());
    }
}
