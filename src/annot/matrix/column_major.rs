use serde::{Deserialize, Serialize};

use super::{BinaryMatrix, IntMatrix, MultiIntMatrix};
use crate::annot::{Column, Row, RowTuples, RowValues, SetBitPositions, Tuple};
use crate::bitvec::Bitmap;
use crate::serde_ext::PackedInts;

// Per-column coordinate storage: all coordinates of one column concatenated
// in row order, with prefix offsets per set row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnCoords {
    starts: PackedInts,
    coords: PackedInts,
}

impl ColumnCoords {
    fn new(tuples_in_row_order: &[Tuple]) -> Self {
        let mut starts = Vec::with_capacity(tuples_in_row_order.len() + 1);
        let mut coords = Vec::new();
        starts.push(0);
        for tuple in tuples_in_row_order {
            debug_assert!(tuple.windows(2).all(|w| w[0] < w[1]));
            for &c in tuple {
                assert!(c >= 0, "stored coordinates are non-negative");
                coords.push(c as u64);
            }
            starts.push(coords.len() as u64);
        }
        ColumnCoords {
            starts: PackedInts::pack_from(starts),
            coords: PackedInts::pack_from(coords),
        }
    }

    // tuple of the r-th set row of this column, r >= 1
    fn tuple(&self, r: usize) -> Tuple {
        let s = self.starts.get(r - 1) as usize;
        let e = self.starts.get(r) as usize;
        (s..e).map(|i| self.coords.get(i) as i64).collect()
    }

    fn num_coords(&self) -> usize {
        self.coords.len()
    }
}

// The build-time representation: one bitmap per column, with optional
// per-relation integer values or coordinate sets. Also serves as the base
// matrix under the row-diff transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMajor {
    num_rows: u64,
    columns: Vec<Bitmap>,
    values: Option<Vec<PackedInts>>,
    tuples: Option<Vec<ColumnCoords>>,
}

impl ColumnMajor {
    pub fn from_columns(num_rows: u64, cols: Vec<Vec<Row>>) -> Self {
        let columns = cols
            .iter()
            .map(|ones| {
                let ones: Vec<usize> = ones.iter().map(|&r| r as usize).collect();
                Bitmap::adaptive_from_ones(num_rows as usize, &ones)
            })
            .collect();
        ColumnMajor {
            num_rows,
            columns,
            values: None,
            tuples: None,
        }
    }

    pub fn from_rows(num_rows: u64, num_columns: u64, rows: &[SetBitPositions]) -> Self {
        assert!(rows.len() as u64 <= num_rows);
        let mut cols = vec![Vec::new(); num_columns as usize];
        for (i, row) in rows.iter().enumerate() {
            for &c in row {
                cols[c as usize].push(i as Row);
            }
        }
        Self::from_columns(num_rows, cols)
    }

    // Attach one integer per relation; `vals[c]` are the values of column c
    // in ascending row order.
    pub fn with_values(mut self, vals: Vec<Vec<u64>>) -> Self {
        assert_eq!(vals.len(), self.columns.len());
        for (bm, v) in self.columns.iter().zip(&vals) {
            assert_eq!(bm.num_set_bits(), v.len());
        }
        self.values = Some(vals.into_iter().map(PackedInts::pack_from).collect());
        self
    }

    // Attach a coordinate tuple per relation, in ascending row order.
    pub fn with_tuples(mut self, tuples: Vec<Vec<Tuple>>) -> Self {
        assert_eq!(tuples.len(), self.columns.len());
        for (bm, t) in self.columns.iter().zip(&tuples) {
            assert_eq!(bm.num_set_bits(), t.len());
        }
        self.tuples = Some(tuples.iter().map(|t| ColumnCoords::new(t)).collect());
        self
    }

    pub fn from_row_tuples(num_rows: u64, num_columns: u64, rows: &[RowTuples]) -> Self {
        let mut cols = vec![Vec::new(); num_columns as usize];
        let mut coltuples = vec![Vec::new(); num_columns as usize];
        for (i, row) in rows.iter().enumerate() {
            for (c, tuple) in row {
                cols[*c as usize].push(i as Row);
                coltuples[*c as usize].push(tuple.clone());
            }
        }
        Self::from_columns(num_rows, cols).with_tuples(coltuples)
    }

    pub fn from_row_values(num_rows: u64, num_columns: u64, rows: &[RowValues]) -> Self {
        let mut cols = vec![Vec::new(); num_columns as usize];
        let mut colvals = vec![Vec::new(); num_columns as usize];
        for (i, row) in rows.iter().enumerate() {
            for &(c, v) in row {
                cols[c as usize].push(i as Row);
                colvals[c as usize].push(v);
            }
        }
        Self::from_columns(num_rows, cols).with_values(colvals)
    }

    pub fn has_values(&self) -> bool {
        self.values.is_some()
    }

    pub fn has_tuples(&self) -> bool {
        self.tuples.is_some()
    }

    pub fn num_attributes(&self) -> u64 {
        match &self.tuples {
            Some(t) => t.iter().map(|c| c.num_coords() as u64).sum(),
            None => self.num_relations(),
        }
    }

    pub fn column_bitmap(&self, col: Column) -> &Bitmap {
        &self.columns[col as usize]
    }
}

impl BinaryMatrix for ColumnMajor {
    fn num_rows(&self) -> u64 {
        self.num_rows
    }

    fn num_columns(&self) -> u64 {
        self.columns.len() as u64
    }

    fn num_relations(&self) -> u64 {
        self.columns.iter().map(|c| c.num_set_bits() as u64).sum()
    }

    fn get(&self, row: Row, col: Column) -> bool {
        self.columns[col as usize].get(row as usize)
    }

    fn get_row(&self, row: Row) -> SetBitPositions {
        (0..self.num_columns())
            .filter(|&c| self.get(row, c))
            .collect()
    }

    fn get_column(&self, col: Column) -> Vec<Row> {
        self.columns[col as usize]
            .to_ones()
            .into_iter()
            .map(|r| r as Row)
            .collect()
    }
}

impl IntMatrix for ColumnMajor {
    fn get_row_values(&self, row: Row) -> RowValues {
        let values = self.values.as_ref().expect("no values attached");
        let mut out = Vec::new();
        for (c, bm) in self.columns.iter().enumerate() {
            let r = bm.conditional_rank1(row as usize);
            if r > 0 {
                out.push((c as Column, values[c].get(r - 1)));
            }
        }
        out
    }
}

impl MultiIntMatrix for ColumnMajor {
    fn get_row_tuples(&self, row: Row) -> RowTuples {
        let tuples = self.tuples.as_ref().expect("no tuples attached");
        let mut out = Vec::new();
        for (c, bm) in self.columns.iter().enumerate() {
            let r = bm.conditional_rank1(row as usize);
            if r > 0 {
                out.push((c as Column, tuples[c].tuple(r)));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_matrices::*;
    use super::*;

    #[test]
    fn scenario_4x4() {
        let rows = scenario_rows();
        let m = ColumnMajor::from_rows(4, 4, &rows);
        assert_eq!(m.num_rows(), 4);
        assert_eq!(m.num_columns(), 4);
        assert_eq!(m.num_relations(), 5);
        assert_eq!(m.get_row(1), vec![1, 3]);
        assert_eq!(m.get_row(2), Vec::<Column>::new());
        assert_eq!(m.get_column(0), vec![0, 3]);
        for (r, row) in rows.iter().enumerate() {
            for c in 0..4u64 {
                assert_eq!(m.get(r as Row, c), row.contains(&c));
                assert_eq!(m.get(r as Row, c), m.get_column(c).contains(&(r as Row)));
            }
        }
    }

    #[test]
    fn values_follow_rows() {
        let rows: Vec<RowValues> = vec![vec![(0, 7)], vec![(0, 2), (1, 9)], vec![], vec![(1, 4)]];
        let m = ColumnMajor::from_row_values(4, 2, &rows);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(&m.get_row_values(i as Row), row);
        }
    }

    #[test]
    fn tuples_follow_rows() {
        let rows: Vec<RowTuples> = vec![
            vec![(0, vec![1, 5])],
            vec![(0, vec![2]), (1, vec![0, 3, 4])],
            vec![],
        ];
        let m = ColumnMajor::from_row_tuples(3, 2, &rows);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(&m.get_row_tuples(i as Row), row);
        }
        assert_eq!(m.num_attributes(), 6);
    }

    #[test]
    fn serde_roundtrip() {
        let rows: Vec<RowTuples> = vec![vec![(0, vec![1])], vec![(1, vec![2, 3])]];
        let m = ColumnMajor::from_row_tuples(2, 2, &rows);
        let bytes = bincode::serialize(&m).unwrap();
        let de: ColumnMajor = bincode::deserialize(&bytes).unwrap();
        assert_eq!(de.num_rows(), 2);
        for i in 0..2 {
            assert_eq!(de.get_row(i), m.get_row(i));
            assert_eq!(de.get_row_tuples(i), m.get_row_tuples(i));
        }
    }

    #[quickcheck]
    fn qc_row_column_duality(seed_rows: Vec<Vec<u8>>) -> bool {
        let rows: Vec<SetBitPositions> = seed_rows
            .iter()
            .map(|r| {
                let mut r: Vec<Column> = r.iter().map(|&c| (c % 8) as Column).collect();
                r.sort_unstable();
                r.dedup();
                r
            })
            .collect();
        let m = ColumnMajor::from_rows(rows.len() as u64, 8, &rows);
        (0..rows.len()).all(|i| {
            let row = m.get_row(i as Row);
            row == rows[i]
                && (0..8u64).all(|c| m.get(i as Row, c) == m.get_column(c).contains(&(i as Row)))
        })
    }
}
