use super::{Column, Row, RowTuples, RowValues, SetBitPositions, COLUMN_SENTINEL};

pub mod brwt;
pub mod column_major;
pub mod row_diff;
pub mod row_sparse;

pub use brwt::{Assignments, Brwt, IntBrwt};
pub use column_major::ColumnMajor;
pub use row_diff::{IntRowDiff, RowDiff, RowDiffBuilder, TupleRowDiff};
pub use row_sparse::RowSparse;

// The row-query contract every compressed representation implements.
pub trait BinaryMatrix {
    fn num_rows(&self) -> u64;
    fn num_columns(&self) -> u64;

    // number of stored (row, column) relations
    fn num_relations(&self) -> u64;

    fn get(&self, row: Row, col: Column) -> bool;

    // sorted set of columns present at `row`
    fn get_row(&self, row: Row) -> SetBitPositions;

    fn get_rows(&self, rows: &[Row]) -> Vec<SetBitPositions> {
        rows.iter().map(|&r| self.get_row(r)).collect()
    }

    // sorted list of rows where `col` is present
    fn get_column(&self, col: Column) -> Vec<Row>;
}

// Matrices that attach one integer per relation.
pub trait IntMatrix: BinaryMatrix {
    fn get_row_values(&self, row: Row) -> RowValues;

    fn get_rows_values(&self, rows: &[Row]) -> Vec<RowValues> {
        rows.iter().map(|&r| self.get_row_values(r)).collect()
    }
}

// Matrices that attach a coordinate set per relation.
pub trait MultiIntMatrix: BinaryMatrix {
    fn get_row_tuples(&self, row: Row) -> RowTuples;

    fn get_rows_tuples(&self, rows: &[Row]) -> Vec<RowTuples> {
        rows.iter().map(|&r| self.get_row_tuples(r)).collect()
    }
}

// Splits a flat delimiter-separated slice buffer into per-row column lists.
pub fn split_slice(slice: &[Column], num_rows: usize) -> Vec<SetBitPositions> {
    let mut rows = Vec::with_capacity(num_rows);
    let mut cur = Vec::new();
    for &c in slice {
        if c == COLUMN_SENTINEL {
            rows.push(std::mem::take(&mut cur));
        } else {
            cur.push(c);
        }
    }
    assert_eq!(rows.len(), num_rows);
    rows
}
