use serde::{Deserialize, Serialize};

use super::{split_slice, BinaryMatrix, IntMatrix};
use crate::annot::{Column, Row, RowValues, SetBitPositions, COLUMN_SENTINEL};
use crate::bitvec::Bitmap;
use crate::serde_ext::PackedInts;

// default arity of internal nodes built by the clustering constructor
const DEFAULT_ARITY: usize = 2;

// rows sampled per column when estimating pairwise similarity
const SIMILARITY_SAMPLE: usize = 1024;

// Maps each of a node's columns to a child subtree and a local column id,
// and back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignments {
    // column -> child
    groups: Vec<u32>,
    // column -> local id within its child
    ranks: Vec<u64>,
    // child -> local id -> column
    group_cols: Vec<Vec<Column>>,
}

impl Assignments {
    pub fn from_groups(group_cols: Vec<Vec<Column>>) -> Self {
        let size: usize = group_cols.iter().map(|g| g.len()).sum();
        let mut groups = vec![u32::MAX; size];
        let mut ranks = vec![0u64; size];
        for (g, cols) in group_cols.iter().enumerate() {
            for (r, &col) in cols.iter().enumerate() {
                assert!(
                    groups[col as usize] == u32::MAX,
                    "column {} assigned to two groups",
                    col
                );
                groups[col as usize] = g as u32;
                ranks[col as usize] = r as u64;
            }
        }
        assert!(
            groups.iter().all(|&g| g != u32::MAX),
            "column groups must cover [0, num_columns)"
        );
        Assignments {
            groups,
            ranks,
            group_cols,
        }
    }

    pub fn single_column() -> Self {
        Self::from_groups(vec![vec![0]])
    }

    // number of columns of the owning node
    pub fn size(&self) -> usize {
        self.groups.len()
    }

    pub fn num_groups(&self) -> usize {
        self.group_cols.len()
    }

    #[inline]
    pub fn group(&self, col: Column) -> usize {
        self.groups[col as usize] as usize
    }

    #[inline]
    pub fn rank(&self, col: Column) -> Column {
        self.ranks[col as usize]
    }

    // inverse: local column id of child `group` back to this node's column
    #[inline]
    pub fn get(&self, group: usize, local_col: Column) -> Column {
        self.group_cols[group][local_col as usize]
    }
}

// Elements of the flat slice buffer; plain columns for binary queries,
// (column, rank) pairs when leaf ranks are needed to address values.
trait SliceElem: Clone {
    fn delim() -> Self;
    fn is_delim(&self) -> bool;
    fn at_leaf(rank: usize) -> Self;
    fn map_col(&mut self, f: &dyn Fn(Column) -> Column);
    fn col(&self) -> Column;
}

impl SliceElem for Column {
    fn delim() -> Self {
        COLUMN_SENTINEL
    }
    fn is_delim(&self) -> bool {
        *self == COLUMN_SENTINEL
    }
    fn at_leaf(_rank: usize) -> Self {
        0
    }
    fn map_col(&mut self, f: &dyn Fn(Column) -> Column) {
        *self = f(*self);
    }
    fn col(&self) -> Column {
        *self
    }
}

impl SliceElem for (Column, u64) {
    fn delim() -> Self {
        (COLUMN_SENTINEL, 0)
    }
    fn is_delim(&self) -> bool {
        self.0 == COLUMN_SENTINEL
    }
    fn at_leaf(rank: usize) -> Self {
        (0, rank as u64)
    }
    fn map_col(&mut self, f: &dyn Fn(Column) -> Column) {
        self.0 = f(self.0);
    }
    fn col(&self) -> Column {
        self.0
    }
}

// Multi-ary binary relation wavelet tree. Each node's bitmap filters the rows
// passed down from its parent: a set bit means the row has at least one
// relation in the columns owned by this subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brwt {
    assignments: Assignments,
    nonzero_rows: Bitmap,
    children: Vec<Brwt>,
}

impl Brwt {
    fn leaf(num_rows: usize, ones: &[usize]) -> Self {
        Brwt {
            assignments: Assignments::single_column(),
            nonzero_rows: Bitmap::adaptive_from_ones(num_rows, ones),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    // Flat tree: the root partitions its columns into one leaf each.
    pub fn from_columns(num_rows: u64, cols: &[Vec<Row>]) -> Self {
        Self::build(num_rows as usize, cols, usize::MAX)
    }

    // Clustered tree: greedy similarity grouping, `arity` columns per child.
    pub fn build_clustered(num_rows: u64, cols: &[Vec<Row>], arity: usize) -> Self {
        assert!(arity >= 2);
        Self::build(num_rows as usize, cols, arity)
    }

    pub fn build_default(num_rows: u64, cols: &[Vec<Row>]) -> Self {
        Self::build(num_rows as usize, cols, DEFAULT_ARITY)
    }

    fn build(num_rows: usize, cols: &[Vec<Row>], arity: usize) -> Self {
        assert!(!cols.is_empty());
        for col in cols {
            debug_assert!(col.windows(2).all(|w| w[0] < w[1]));
        }

        if cols.len() == 1 {
            let ones: Vec<usize> = cols[0].iter().map(|&r| r as usize).collect();
            return Self::leaf(num_rows, &ones);
        }

        // rows with any relation under this subtree
        let union_rows: Vec<usize> = {
            let mut all: Vec<usize> = cols
                .iter()
                .flat_map(|c| c.iter().map(|&r| r as usize))
                .collect();
            all.sort_unstable();
            all.dedup();
            all
        };
        let nonzero_rows = Bitmap::adaptive_from_ones(num_rows, &union_rows);

        // project columns into the filtered row space
        let project = |col: &Vec<Row>| -> Vec<Row> {
            col.iter()
                .map(|&r| union_rows.binary_search(&(r as usize)).unwrap() as Row)
                .collect()
        };

        let groups = if cols.len() <= arity {
            // one leaf per column
            (0..cols.len()).map(|c| vec![c]).collect::<Vec<_>>()
        } else {
            cluster_columns(cols, arity)
        };

        let children: Vec<Brwt> = groups
            .iter()
            .map(|group| {
                let sub: Vec<Vec<Row>> = group.iter().map(|&c| project(&cols[c])).collect();
                Self::build(union_rows.len(), &sub, arity)
            })
            .collect();

        let group_cols = groups
            .iter()
            .map(|g| g.iter().map(|&c| c as Column).collect())
            .collect();

        Brwt {
            assignments: Assignments::from_groups(group_cols),
            nonzero_rows,
            children,
        }
    }

    // Structural invariants checked after load: a node has either no children
    // or exactly one per column group, leaves own one column, and each child
    // bitmap covers exactly the rows that survive this node's filter.
    pub fn validate(&self) -> bool {
        if self.children.is_empty() {
            return self.assignments.size() == 1;
        }
        if self.children.len() != self.assignments.num_groups() {
            return false;
        }
        let passed = self.nonzero_rows.num_set_bits();
        self.children
            .iter()
            .all(|child| child.nonzero_rows.size() == passed && child.validate())
    }

    pub fn avg_arity(&self) -> f64 {
        let mut internal = 0u64;
        let mut edges = 0u64;
        self.for_each_node(&mut |node| {
            if !node.children.is_empty() {
                internal += 1;
                edges += node.children.len() as u64;
            }
        });
        if internal == 0 {
            0.0
        } else {
            edges as f64 / internal as f64
        }
    }

    pub fn num_nodes(&self) -> u64 {
        let mut n = 0;
        self.for_each_node(&mut |_| n += 1);
        n
    }

    fn for_each_node(&self, cb: &mut dyn FnMut(&Brwt)) {
        cb(self);
        for child in &self.children {
            child.for_each_node(cb);
        }
    }

    fn slice_rows<T: SliceElem>(&self, row_ids: &[Row]) -> Vec<T> {
        let mut slice: Vec<T> = Vec::with_capacity(row_ids.len() * 2);

        if self.children.is_empty() {
            debug_assert_eq!(self.assignments.size(), 1);
            for &i in row_ids {
                let rank = self.nonzero_rows.conditional_rank1(i as usize);
                if rank > 0 {
                    slice.push(T::at_leaf(rank));
                }
                slice.push(T::delim());
            }
            return slice;
        }

        // project row ids into each child's coordinate system
        let mut child_row_ids: Vec<Row> = Vec::with_capacity(row_ids.len());
        let mut skip_row = vec![true; row_ids.len()];

        let mut i = 0;
        while i < row_ids.len() {
            let global_offset = row_ids[i] as usize;

            // If the next word holds 4 or more queried positions, read it
            // whole; one get_int costs about as much as 5 single-bit reads.
            if i + 3 < row_ids.len()
                && (row_ids[i + 3] as usize) < global_offset + 64
                && row_ids[i + 3] as usize >= global_offset
                && global_offset + 64 <= self.nonzero_rows.size()
            {
                let word = self.nonzero_rows.get_int(global_offset, 64);
                let mut rank_before: Option<usize> = None;

                while i < row_ids.len() {
                    let pos = row_ids[i] as usize;
                    if pos < global_offset || pos >= global_offset + 64 {
                        break;
                    }
                    let offset = pos - global_offset;
                    if word & (1u64 << offset) != 0 {
                        let base = *rank_before.get_or_insert_with(|| {
                            if global_offset > 0 {
                                self.nonzero_rows.rank1(global_offset - 1)
                            } else {
                                0
                            }
                        });
                        let low_mask = if offset == 63 {
                            u64::MAX
                        } else {
                            (1u64 << (offset + 1)) - 1
                        };
                        let within = (word & low_mask).count_ones() as usize;
                        child_row_ids.push((base + within - 1) as Row);
                        skip_row[i] = false;
                    }
                    i += 1;
                }
            } else {
                let rank = self.nonzero_rows.conditional_rank1(global_offset);
                if rank > 0 {
                    child_row_ids.push((rank - 1) as Row);
                    skip_row[i] = false;
                }
                i += 1;
            }
        }

        if child_row_ids.is_empty() {
            return vec![T::delim(); row_ids.len()];
        }

        // query all child subtrees and remap their local columns
        let child_slices: Vec<Vec<T>> = self
            .children
            .iter()
            .enumerate()
            .map(|(j, child)| {
                let mut s = child.slice_rows::<T>(&child_row_ids);
                for v in s.iter_mut() {
                    if !v.is_delim() {
                        v.map_col(&|c| self.assignments.get(j, c));
                    }
                }
                debug_assert!(s.len() >= child_row_ids.len());
                s
            })
            .collect();

        let mut pos = vec![0usize; child_slices.len()];
        let mut merged: Vec<T> = Vec::new();
        for &skip in skip_row.iter() {
            if !skip {
                merged.clear();
                for (j, s) in child_slices.iter().enumerate() {
                    while !s[pos[j]].is_delim() {
                        merged.push(s[pos[j]].clone());
                        pos[j] += 1;
                    }
                    pos[j] += 1;
                }
                merged.sort_by_key(|v| v.col());
                slice.extend(merged.iter().cloned());
            }
            slice.push(T::delim());
        }

        slice
    }

    // (column, leaf rank) pairs per row; the rank addresses per-column
    // attribute storage.
    pub fn get_rows_ranks(&self, rows: &[Row]) -> Vec<Vec<(Column, u64)>> {
        let slice = self.slice_rows::<(Column, u64)>(rows);
        let mut out = Vec::with_capacity(rows.len());
        let mut cur = Vec::new();
        for v in slice {
            if v.is_delim() {
                out.push(std::mem::take(&mut cur));
            } else {
                cur.push(v);
            }
        }
        assert_eq!(out.len(), rows.len());
        out
    }
}

impl BinaryMatrix for Brwt {
    fn num_rows(&self) -> u64 {
        self.nonzero_rows.size() as u64
    }

    fn num_columns(&self) -> u64 {
        self.assignments.size() as u64
    }

    fn num_relations(&self) -> u64 {
        if self.children.is_empty() {
            return self.nonzero_rows.num_set_bits() as u64;
        }
        self.children.iter().map(|c| c.num_relations()).sum()
    }

    fn get(&self, row: Row, col: Column) -> bool {
        debug_assert!(row < self.num_rows());
        debug_assert!(col < self.num_columns());

        if self.children.is_empty() {
            return self.nonzero_rows.get(row as usize);
        }

        let rank = self.nonzero_rows.conditional_rank1(row as usize);
        if rank == 0 {
            return false;
        }

        let child = self.assignments.group(col);
        self.children[child].get((rank - 1) as Row, self.assignments.rank(col))
    }

    fn get_row(&self, row: Row) -> SetBitPositions {
        self.get_rows(&[row]).pop().unwrap()
    }

    fn get_rows(&self, rows: &[Row]) -> Vec<SetBitPositions> {
        let slice = self.slice_rows::<Column>(rows);
        split_slice(&slice, rows.len())
    }

    fn get_column(&self, col: Column) -> Vec<Row> {
        debug_assert!(col < self.num_columns());

        let num_nonzero = self.nonzero_rows.num_set_bits();
        if num_nonzero == 0 {
            return Vec::new();
        }

        if self.children.is_empty() {
            let mut result = Vec::with_capacity(num_nonzero);
            self.nonzero_rows.call_ones(|i| result.push(i as Row));
            return result;
        }

        let child = self.assignments.group(col);
        let mut rows = self.children[child].get_column(self.assignments.rank(col));

        // identity filter: no remapping needed
        if num_nonzero == self.nonzero_rows.size() {
            return rows;
        }

        for r in rows.iter_mut() {
            *r = self.nonzero_rows.select1(*r as usize + 1) as Row;
        }
        rows
    }
}

// Integer-annotated BRWT: per-column packed values addressed by leaf rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntBrwt {
    brwt: Brwt,
    values: Vec<PackedInts>,
}

impl IntBrwt {
    // `vals[c]` holds the values of column c in ascending row order.
    pub fn new(brwt: Brwt, vals: Vec<Vec<u64>>) -> Self {
        assert_eq!(brwt.num_columns() as usize, vals.len());
        IntBrwt {
            brwt,
            values: vals.into_iter().map(PackedInts::pack_from).collect(),
        }
    }

    pub fn matrix(&self) -> &Brwt {
        &self.brwt
    }

    pub fn validate(&self) -> bool {
        self.brwt.validate()
    }
}

impl BinaryMatrix for IntBrwt {
    fn num_rows(&self) -> u64 {
        self.brwt.num_rows()
    }

    fn num_columns(&self) -> u64 {
        self.brwt.num_columns()
    }

    fn num_relations(&self) -> u64 {
        self.brwt.num_relations()
    }

    fn get(&self, row: Row, col: Column) -> bool {
        self.brwt.get(row, col)
    }

    fn get_row(&self, row: Row) -> SetBitPositions {
        self.brwt.get_row(row)
    }

    fn get_rows(&self, rows: &[Row]) -> Vec<SetBitPositions> {
        self.brwt.get_rows(rows)
    }

    fn get_column(&self, col: Column) -> Vec<Row> {
        self.brwt.get_column(col)
    }
}

impl IntMatrix for IntBrwt {
    fn get_row_values(&self, row: Row) -> RowValues {
        self.get_rows_values(&[row]).pop().unwrap()
    }

    fn get_rows_values(&self, rows: &[Row]) -> Vec<RowValues> {
        self.brwt
            .get_rows_ranks(rows)
            .into_iter()
            .map(|ranks| {
                ranks
                    .into_iter()
                    .map(|(c, rank)| (c, self.values[c as usize].get(rank as usize - 1)))
                    .collect()
            })
            .collect()
    }
}

// Greedy similarity grouping: pick the heaviest unassigned column, then pull
// in its most similar peers until the group reaches `arity`. Similarity is
// the intersection size over a sample of each column's set rows.
fn cluster_columns(cols: &[Vec<Row>], arity: usize) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..cols.len()).collect();
    order.sort_by_key(|&c| std::cmp::Reverse(cols[c].len()));

    let sample = |c: usize| -> &[Row] {
        let col = &cols[c];
        &col[..col.len().min(SIMILARITY_SAMPLE)]
    };

    let similarity = |a: usize, b: usize| -> usize {
        let (sa, sb) = (sample(a), sample(b));
        let mut i = 0;
        let mut j = 0;
        let mut inter = 0;
        while i < sa.len() && j < sb.len() {
            match sa[i].cmp(&sb[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    inter += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        inter
    };

    let mut assigned = vec![false; cols.len()];
    let mut groups = Vec::new();
    for &c in &order {
        if assigned[c] {
            continue;
        }
        assigned[c] = true;
        let mut group = vec![c];
        while group.len() < arity {
            let mut best: Option<(usize, usize)> = None;
            for &d in &order {
                if assigned[d] {
                    continue;
                }
                let s = similarity(c, d);
                if best.map_or(true, |(bs, _)| s > bs) {
                    best = Some((s, d));
                }
            }
            match best {
                Some((_, d)) => {
                    assigned[d] = true;
                    group.push(d);
                }
                None => break,
            }
        }
        group.sort_unstable();
        groups.push(group);
    }
    groups
}
