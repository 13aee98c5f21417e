use serde::{Deserialize, Serialize};

use super::BinaryMatrix;
use crate::annot::{Column, Row, SetBitPositions};
use crate::bitvec::Bitmap;
use crate::serde_ext::PackedInts;

// Row-major representation: the column ids of all rows concatenated into one
// packed vector, with a delimiter bitmap marking row ends. Row queries are
// cheap; column queries scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSparse {
    num_columns: u64,
    // one position per stored relation plus one delimiter per row
    boundary: Bitmap,
    ids: PackedInts,
}

impl RowSparse {
    pub fn from_rows(num_columns: u64, rows: &[SetBitPositions]) -> Self {
        let mut ids = Vec::new();
        let mut delims = Vec::new();
        let mut pos = 0usize;
        for row in rows {
            debug_assert!(row.windows(2).all(|w| w[0] < w[1]));
            for &c in row {
                ids.push(c);
                pos += 1;
            }
            delims.push(pos);
            pos += 1;
        }
        RowSparse {
            num_columns,
            boundary: Bitmap::adaptive_from_ones(pos, &delims),
            ids: PackedInts::pack_from(ids),
        }
    }

    // range of `ids` indices covering `row`
    fn row_range(&self, row: Row) -> (usize, usize) {
        let i = row as usize;
        let start = if i == 0 {
            0
        } else {
            self.boundary.select1(i) + 1
        };
        let end = self.boundary.select1(i + 1);
        (start - i, end - i)
    }
}

impl BinaryMatrix for RowSparse {
    fn num_rows(&self) -> u64 {
        self.boundary.num_set_bits() as u64
    }

    fn num_columns(&self) -> u64 {
        self.num_columns
    }

    fn num_relations(&self) -> u64 {
        self.ids.len() as u64
    }

    fn get(&self, row: Row, col: Column) -> bool {
        let (s, e) = self.row_range(row);
        (s..e).any(|i| self.ids.get(i) == col)
    }

    fn get_row(&self, row: Row) -> SetBitPositions {
        let (s, e) = self.row_range(row);
        (s..e).map(|i| self.ids.get(i)).collect()
    }

    fn get_column(&self, col: Column) -> Vec<Row> {
        let mut out = Vec::new();
        for row in 0..self.num_rows() {
            if self.get(row, col) {
                out.push(row);
            }
        }
        out
    }
}
