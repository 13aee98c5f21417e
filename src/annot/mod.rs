pub mod annotator;
pub mod label_encoder;
pub mod matrix;

// Annotation indexing: row i annotates graph node i + 1.
pub type Row = u64;
pub type Column = u64;

// delimiter between rows in flat slice buffers
pub const COLUMN_SENTINEL: Column = Column::MAX;

// A row as the sorted set of its columns.
pub type SetBitPositions = Vec<Column>;

// Integer-annotated row: sorted (column, value) pairs.
pub type RowValues = Vec<(Column, u64)>;

// Coordinate tuple; negative offsets appear transiently during trimming.
pub type Tuple = Vec<i64>;

// Coordinate-annotated row: sorted (column, sorted coordinates) pairs.
pub type RowTuples = Vec<(Column, Tuple)>;

pub use annotator::{Annotator, MatrixVariant};
pub use label_encoder::LabelEncoder;
