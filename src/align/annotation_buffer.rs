use std::collections::HashMap;
use std::sync::Arc;

use crate::annot::annotator::MatrixVariant;
use crate::annot::matrix::BinaryMatrix;
use crate::annot::{Column, Row, Tuple};
use crate::graph::{DeBruijnGraph, GraphMode, NodeIndex, NPOS};

// column-set id reserved for the empty set
pub const EMPTY_COLUMNS: usize = 0;

// sentinel: node seen but annotations not yet fetched
const NANNOT: usize = usize::MAX;

// Request-coalescing cache in front of the annotation matrix. Collects the
// node paths a query will touch, resolves all of them in one batched matrix
// call, and interns the resolved column sets under small integer ids.
//
// One buffer serves one query; it is never shared across threads.
pub struct AnnotationBuffer<'a> {
    graph: &'a dyn DeBruijnGraph,
    matrix: &'a MatrixVariant,

    // interned distinct column sets; id 0 is the empty set
    column_sets: Vec<Vec<Column>>,
    column_sets_index: HashMap<Vec<Column>, usize>,

    node_to_cols: HashMap<NodeIndex, usize>,
    label_coords: HashMap<NodeIndex, Arc<Vec<Tuple>>>,

    queued_paths: Vec<Vec<NodeIndex>>,
    max_coords_per_node: usize,
}

impl<'a> AnnotationBuffer<'a> {
    pub fn new(
        graph: &'a dyn DeBruijnGraph,
        matrix: &'a MatrixVariant,
        max_coords_per_node: usize,
    ) -> Self {
        AnnotationBuffer {
            graph,
            matrix,
            column_sets: vec![Vec::new()],
            column_sets_index: HashMap::from([(Vec::new(), 0)]),
            node_to_cols: HashMap::new(),
            label_coords: HashMap::new(),
            queued_paths: Vec::new(),
            max_coords_per_node,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.matrix.has_coordinates()
    }

    // Interns a sorted column set, returning its id.
    pub fn cache_column_set(&mut self, columns: Vec<Column>) -> usize {
        debug_assert!(columns.windows(2).all(|w| w[0] < w[1]));
        if let Some(&id) = self.column_sets_index.get(&columns) {
            return id;
        }
        let id = self.column_sets.len();
        self.column_sets.push(columns.clone());
        self.column_sets_index.insert(columns, id);
        id
    }

    pub fn get_cached_column_set(&self, id: usize) -> &[Column] {
        &self.column_sets[id]
    }

    pub fn num_column_sets(&self) -> usize {
        self.column_sets.len()
    }

    // Record nodes whose annotations a later fetch must resolve.
    pub fn queue_path(&mut self, path: Vec<NodeIndex>) {
        self.queued_paths.push(path);
    }

    // In canonical mode a node and its reverse complement share one entry
    // under the base node.
    fn storage_node(&self, node: NodeIndex) -> NodeIndex {
        match self.graph.mode() {
            GraphMode::Canonical => self.graph.get_base_node(node),
            GraphMode::Basic => node,
        }
    }

    // Resolve all queued nodes with a single batched matrix call.
    pub fn fetch_queued_annotations(&mut self) {
        let mut queued_nodes: Vec<NodeIndex> = Vec::new();
        let mut queued_rows: Vec<Row> = Vec::new();

        let paths = std::mem::take(&mut self.queued_paths);
        for path in &paths {
            for &node in path {
                if node == NPOS {
                    continue;
                }
                let base = self.storage_node(node);
                if base == NPOS {
                    // dummy: annotate as empty
                    self.node_to_cols.entry(node).or_insert(EMPTY_COLUMNS);
                    continue;
                }
                if let std::collections::hash_map::Entry::Vacant(e) =
                    self.node_to_cols.entry(base)
                {
                    e.insert(NANNOT);
                    queued_nodes.push(base);
                    queued_rows.push(base - 1);
                }
            }
        }

        if queued_nodes.is_empty() {
            return;
        }

        if self.has_coordinates() {
            let fetched = self.matrix.get_row_tuples(&queued_rows);
            for (node, mut row_tuples) in queued_nodes.into_iter().zip(fetched) {
                row_tuples.sort_by_key(|(c, _)| *c);
                let labels: Vec<Column> = row_tuples.iter().map(|(c, _)| *c).collect();
                let coords: Vec<Tuple> = row_tuples
                    .into_iter()
                    .map(|(_, t)| {
                        // cap per-node blowup; an empty set means "not kept"
                        if t.len() <= self.max_coords_per_node {
                            t
                        } else {
                            Vec::new()
                        }
                    })
                    .collect();
                let id = self.cache_column_set(labels);
                self.node_to_cols.insert(node, id);
                self.label_coords.insert(node, Arc::new(coords));
            }
        } else {
            let fetched = self.matrix.get_rows(&queued_rows);
            for (node, mut labels) in queued_nodes.into_iter().zip(fetched) {
                labels.sort_unstable();
                let id = self.cache_column_set(labels);
                self.node_to_cols.insert(node, id);
            }
        }
    }

    // Column-set id of a node, None until fetched.
    pub fn get_column_set_id(&self, node: NodeIndex) -> Option<usize> {
        let base = self.storage_node(node);
        match self.node_to_cols.get(&base) {
            Some(&id) if id != NANNOT => Some(id),
            _ => None,
        }
    }

    pub fn get_labels(&self, node: NodeIndex) -> Option<&[Column]> {
        self.get_column_set_id(node)
            .map(|id| self.column_sets[id].as_slice())
    }

    // Labels and coordinates of one node. Coordinates skipped during the
    // batched fetch are resolved lazily with a single-row query.
    pub fn get_labels_and_coords(
        &mut self,
        node: NodeIndex,
    ) -> (Option<usize>, Option<Arc<Vec<Tuple>>>) {
        let id = match self.get_column_set_id(node) {
            Some(id) => id,
            None => return (None, None),
        };

        if !self.has_coordinates() {
            return (Some(id), None);
        }

        let base = self.storage_node(node);
        if let Some(coords) = self.label_coords.get(&base) {
            // a capped entry is an empty tuple; only then re-fetch
            if coords.iter().all(|t| !t.is_empty()) {
                return (Some(id), Some(coords.clone()));
            }
        }

        let fetched = self.matrix.get_row_tuples(&[base - 1]);
        let mut row_tuples = fetched.into_iter().next().unwrap();
        row_tuples.sort_by_key(|(c, _)| *c);
        let coords = Arc::new(row_tuples.into_iter().map(|(_, t)| t).collect::<Vec<_>>());
        self.label_coords.insert(base, coords.clone());
        (Some(id), Some(coords))
    }
}
