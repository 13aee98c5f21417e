use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, error};

use super::matrix::{
    BinaryMatrix, Brwt, ColumnMajor, IntBrwt, IntRowDiff, MultiIntMatrix, RowDiff, RowSparse,
    TupleRowDiff,
};
use super::{LabelEncoder, Row, RowTuples, SetBitPositions};
use crate::annot::matrix::IntMatrix;
use crate::annot::{Column, RowValues};
use crate::graph::{DeBruijnGraph, SharedGraph};

// One annotation matrix in any of its compressed representations. The tag
// doubles as the on-disk format dispatch.
pub enum MatrixVariant {
    ColumnMajor(ColumnMajor),
    RowSparse(RowSparse),
    Brwt(Brwt),
    RowDiff(RowDiff<ColumnMajor>),
    RowDiffBrwt(RowDiff<Brwt>),
    RowDiffIntBrwt(IntRowDiff<IntBrwt>),
    RowDiffCoord(TupleRowDiff<ColumnMajor>),
}

impl MatrixVariant {
    pub fn extension(&self) -> &'static str {
        match self {
            MatrixVariant::ColumnMajor(_) => ".column.annodbg",
            MatrixVariant::RowSparse(_) => ".row_sparse.annodbg",
            MatrixVariant::Brwt(_) => ".brwt.annodbg",
            MatrixVariant::RowDiff(_) => ".row_diff.annodbg",
            MatrixVariant::RowDiffBrwt(_) => ".row_diff_brwt.annodbg",
            MatrixVariant::RowDiffIntBrwt(_) => ".row_diff_int_brwt.annodbg",
            MatrixVariant::RowDiffCoord(_) => ".row_diff_coord.annodbg",
        }
    }

    // Row-diff wrappers need the graph before any query.
    pub fn set_graph(&mut self, graph: SharedGraph) {
        match self {
            MatrixVariant::RowDiff(m) => m.set_graph(graph),
            MatrixVariant::RowDiffBrwt(m) => m.set_graph(graph),
            MatrixVariant::RowDiffIntBrwt(m) => m.set_graph(graph),
            MatrixVariant::RowDiffCoord(m) => m.set_graph(graph),
            _ => {}
        }
    }

    pub fn has_coordinates(&self) -> bool {
        match self {
            MatrixVariant::ColumnMajor(m) => m.has_tuples(),
            MatrixVariant::RowDiffCoord(_) => true,
            _ => false,
        }
    }

    pub fn has_values(&self) -> bool {
        match self {
            MatrixVariant::ColumnMajor(m) => m.has_values(),
            MatrixVariant::RowDiffIntBrwt(_) => true,
            _ => false,
        }
    }

    pub fn get_row_values(&self, rows: &[Row]) -> Vec<RowValues> {
        match self {
            MatrixVariant::ColumnMajor(m) => m.get_rows_values(rows),
            MatrixVariant::RowDiffIntBrwt(m) => m.get_rows_values(rows),
            _ => panic!("matrix variant stores no integer values"),
        }
    }

    pub fn get_row_tuples(&self, rows: &[Row]) -> Vec<RowTuples> {
        match self {
            MatrixVariant::ColumnMajor(m) => m.get_rows_tuples(rows),
            MatrixVariant::RowDiffCoord(m) => m.get_rows_tuples(rows),
            _ => panic!("matrix variant stores no coordinates"),
        }
    }

    pub fn get_row_tuple_diffs(
        &self,
        rows: &[Row],
        first_tuple: Option<&RowTuples>,
    ) -> Vec<RowTuples> {
        match self {
            MatrixVariant::RowDiffCoord(m) => m.get_row_tuple_diffs(rows, first_tuple),
            _ => panic!("row-to-row tuple diffs need the row-diff coordinate variant"),
        }
    }

    pub fn serialize_to(&self, w: &mut dyn Write) -> bincode::Result<()> {
        match self {
            MatrixVariant::ColumnMajor(m) => bincode::serialize_into(w, m),
            MatrixVariant::RowSparse(m) => bincode::serialize_into(w, m),
            MatrixVariant::Brwt(m) => bincode::serialize_into(w, m),
            MatrixVariant::RowDiff(m) => m.serialize_to(w),
            MatrixVariant::RowDiffBrwt(m) => m.serialize_to(w),
            MatrixVariant::RowDiffIntBrwt(m) => m.serialize_to(w),
            MatrixVariant::RowDiffCoord(m) => m.serialize_to(w),
        }
    }

    fn load_from(ext: &str, r: &mut dyn Read) -> Option<Self> {
        match ext {
            ".column.annodbg" => bincode::deserialize_from(r)
                .ok()
                .map(MatrixVariant::ColumnMajor),
            ".row_sparse.annodbg" => bincode::deserialize_from(r)
                .ok()
                .map(MatrixVariant::RowSparse),
            ".brwt.annodbg" => {
                let brwt: Brwt = bincode::deserialize_from(r).ok()?;
                brwt.validate().then_some(MatrixVariant::Brwt(brwt))
            }
            ".row_diff.annodbg" => RowDiff::load_from(r).map(MatrixVariant::RowDiff),
            ".row_diff_brwt.annodbg" => {
                let rd: RowDiff<Brwt> = RowDiff::load_from(r)?;
                rd.diffs().validate().then_some(MatrixVariant::RowDiffBrwt(rd))
            }
            ".row_diff_int_brwt.annodbg" => {
                let rd: IntRowDiff<IntBrwt> = IntRowDiff::load_from(r)?;
                rd.diffs()
                    .validate()
                    .then_some(MatrixVariant::RowDiffIntBrwt(rd))
            }
            ".row_diff_coord.annodbg" => {
                TupleRowDiff::load_from(r).map(MatrixVariant::RowDiffCoord)
            }
            _ => None,
        }
    }
}

impl BinaryMatrix for MatrixVariant {
    fn num_rows(&self) -> u64 {
        match self {
            MatrixVariant::ColumnMajor(m) => m.num_rows(),
            MatrixVariant::RowSparse(m) => m.num_rows(),
            MatrixVariant::Brwt(m) => m.num_rows(),
            MatrixVariant::RowDiff(m) => m.num_rows(),
            MatrixVariant::RowDiffBrwt(m) => m.num_rows(),
            MatrixVariant::RowDiffIntBrwt(m) => m.num_rows(),
            MatrixVariant::RowDiffCoord(m) => m.num_rows(),
        }
    }

    fn num_columns(&self) -> u64 {
        match self {
            MatrixVariant::ColumnMajor(m) => m.num_columns(),
            MatrixVariant::RowSparse(m) => m.num_columns(),
            MatrixVariant::Brwt(m) => m.num_columns(),
            MatrixVariant::RowDiff(m) => m.num_columns(),
            MatrixVariant::RowDiffBrwt(m) => m.num_columns(),
            MatrixVariant::RowDiffIntBrwt(m) => m.num_columns(),
            MatrixVariant::RowDiffCoord(m) => m.num_columns(),
        }
    }

    fn num_relations(&self) -> u64 {
        match self {
            MatrixVariant::ColumnMajor(m) => m.num_relations(),
            MatrixVariant::RowSparse(m) => m.num_relations(),
            MatrixVariant::Brwt(m) => m.num_relations(),
            MatrixVariant::RowDiff(m) => m.num_relations(),
            MatrixVariant::RowDiffBrwt(m) => m.num_relations(),
            MatrixVariant::RowDiffIntBrwt(m) => m.num_relations(),
            MatrixVariant::RowDiffCoord(m) => m.num_relations(),
        }
    }

    fn get(&self, row: Row, col: Column) -> bool {
        match self {
            MatrixVariant::ColumnMajor(m) => m.get(row, col),
            MatrixVariant::RowSparse(m) => m.get(row, col),
            MatrixVariant::Brwt(m) => m.get(row, col),
            MatrixVariant::RowDiff(m) => m.get(row, col),
            MatrixVariant::RowDiffBrwt(m) => m.get(row, col),
            MatrixVariant::RowDiffIntBrwt(m) => m.get(row, col),
            MatrixVariant::RowDiffCoord(m) => m.get(row, col),
        }
    }

    fn get_row(&self, row: Row) -> SetBitPositions {
        match self {
            MatrixVariant::ColumnMajor(m) => m.get_row(row),
            MatrixVariant::RowSparse(m) => m.get_row(row),
            MatrixVariant::Brwt(m) => m.get_row(row),
            MatrixVariant::RowDiff(m) => m.get_row(row),
            MatrixVariant::RowDiffBrwt(m) => m.get_row(row),
            MatrixVariant::RowDiffIntBrwt(m) => m.get_row(row),
            MatrixVariant::RowDiffCoord(m) => m.get_row(row),
        }
    }

    fn get_rows(&self, rows: &[Row]) -> Vec<SetBitPositions> {
        match self {
            MatrixVariant::ColumnMajor(m) => m.get_rows(rows),
            MatrixVariant::RowSparse(m) => m.get_rows(rows),
            MatrixVariant::Brwt(m) => m.get_rows(rows),
            MatrixVariant::RowDiff(m) => m.get_rows(rows),
            MatrixVariant::RowDiffBrwt(m) => m.get_rows(rows),
            MatrixVariant::RowDiffIntBrwt(m) => m.get_rows(rows),
            MatrixVariant::RowDiffCoord(m) => m.get_rows(rows),
        }
    }

    fn get_column(&self, col: Column) -> Vec<Row> {
        match self {
            MatrixVariant::ColumnMajor(m) => m.get_column(col),
            MatrixVariant::RowSparse(m) => m.get_column(col),
            MatrixVariant::Brwt(m) => m.get_column(col),
            MatrixVariant::RowDiff(m) => m.get_column(col),
            MatrixVariant::RowDiffBrwt(m) => m.get_column(col),
            MatrixVariant::RowDiffIntBrwt(m) => m.get_column(col),
            MatrixVariant::RowDiffCoord(m) => m.get_column(col),
        }
    }
}

// Top-level annotation container: the label encoder followed by the matrix
// bytes of the variant named by the file extension.
pub struct Annotator {
    pub label_encoder: LabelEncoder,
    pub matrix: MatrixVariant,
}

impl Annotator {
    pub fn new(label_encoder: LabelEncoder, matrix: MatrixVariant) -> Self {
        assert_eq!(label_encoder.len() as u64, matrix.num_columns());
        Annotator {
            label_encoder,
            matrix,
        }
    }

    pub fn extension(&self) -> &'static str {
        self.matrix.extension()
    }

    // Full output path for a given basename.
    pub fn file_path(&self, basename: &str) -> String {
        format!("{}{}", basename, self.extension())
    }

    pub fn serialize_to_file(&self, basename: &str) -> bincode::Result<()> {
        let path = self.file_path(basename);
        debug!("Serializing annotation to {}", path);
        let mut out = BufWriter::new(File::create(&path).map_err(bincode::Error::from)?);
        bincode::serialize_into(&mut out, &self.label_encoder)?;
        self.matrix.serialize_to(&mut out)
    }

    // Dispatches the matrix decoder on the file extension.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let name = path.file_name()?.to_str()?;
        let ext = KNOWN_EXTENSIONS
            .iter()
            .find(|ext| name.ends_with(*ext))
            .copied()?;

        let mut input = BufReader::new(File::open(path).ok()?);
        let label_encoder: LabelEncoder = bincode::deserialize_from(&mut input).ok()?;
        let matrix = MatrixVariant::load_from(ext, &mut input)?;

        if label_encoder.len() as u64 != matrix.num_columns() {
            error!(
                "Annotation {} has {} labels but {} matrix columns",
                name,
                label_encoder.len(),
                matrix.num_columns()
            );
            return None;
        }

        Some(Annotator {
            label_encoder,
            matrix,
        })
    }

    // Row i annotates graph node i + 1; the row count must cover the graph.
    pub fn check_compatibility(&self, graph: &dyn DeBruijnGraph) -> bool {
        let ok = self.matrix.num_rows() == graph.max_index();
        if !ok {
            error!(
                "Graph and annotation are incompatible: {} nodes vs {} rows",
                graph.max_index(),
                self.matrix.num_rows()
            );
        }
        ok
    }
}

pub const KNOWN_EXTENSIONS: [&str; 7] = [
    ".column.annodbg",
    ".row_sparse.annodbg",
    ".brwt.annodbg",
    ".row_diff.annodbg",
    ".row_diff_brwt.annodbg",
    ".row_diff_int_brwt.annodbg",
    ".row_diff_coord.annodbg",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annot::matrix::test_matrices::*;
    use crate::test_utils::temp_file_name;

    fn encoder(n: usize) -> LabelEncoder {
        let mut enc = LabelEncoder::new();
        for i in 0..n {
            enc.insert_and_encode(&format!("label_{}", i));
        }
        enc
    }

    #[test]
    fn column_roundtrip_through_file() {
        let rows = scenario_rows();
        let m = ColumnMajor::from_rows(4, 4, &rows);
        let anno = Annotator::new(encoder(4), MatrixVariant::ColumnMajor(m));

        let base = temp_file_name("anno_column");
        let base = base.to_str().unwrap();
        anno.serialize_to_file(base).unwrap();

        let loaded = Annotator::load_from_file(anno.file_path(base)).unwrap();
        assert_eq!(loaded.label_encoder, anno.label_encoder);
        for r in 0..4 {
            assert_eq!(loaded.matrix.get_row(r), anno.matrix.get_row(r));
        }
        for c in 0..4 {
            assert_eq!(loaded.matrix.get_column(c), anno.matrix.get_column(c));
        }
        std::fs::remove_file(anno.file_path(base)).unwrap();
    }

    #[test]
    fn brwt_roundtrip_through_file() {
        let rows = scenario_rows();
        let cols = to_columns(&rows, 4);
        let m = Brwt::build_default(4, &cols);
        let anno = Annotator::new(encoder(4), MatrixVariant::Brwt(m));
        assert_eq!(anno.extension(), ".brwt.annodbg");

        let base = temp_file_name("anno_brwt");
        let base = base.to_str().unwrap();
        anno.serialize_to_file(base).unwrap();
        let loaded = Annotator::load_from_file(anno.file_path(base)).unwrap();
        for r in 0..4 {
            assert_eq!(loaded.matrix.get_row(r), anno.matrix.get_row(r));
        }
        std::fs::remove_file(anno.file_path(base)).unwrap();
    }

    #[test]
    fn unknown_extension_rejected() {
        assert!(Annotator::load_from_file("/no/such/file.mystery").is_none());
    }

    #[test]
    fn compatibility_check() {
        use crate::graph::HashGraph;
        let g = HashGraph::from_sequences(4, &[b"ACGTA".as_ref()]);
        let rows = vec![vec![0]; g.max_index() as usize];
        let m = ColumnMajor::from_rows(g.max_index(), 1, &rows);
        let anno = Annotator::new(encoder(1), MatrixVariant::ColumnMajor(m));
        assert!(anno.check_compatibility(&g));

        let small = ColumnMajor::from_rows(1, 1, &[vec![0]]);
        let anno = Annotator::new(encoder(1), MatrixVariant::ColumnMajor(small));
        assert!(!anno.check_compatibility(&g));
    }
}
