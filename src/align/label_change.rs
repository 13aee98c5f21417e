use super::annotation_buffer::AnnotationBuffer;
use super::config::AlignerConfig;
use super::{Score, NINF};
use crate::annot::Column;

// register count = 2^P
const HLL_P: u32 = 8;
const HLL_M: usize = 1 << HLL_P;

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

// Fixed-size HyperLogLog sketch of one column's row set; unions are
// register-wise maxima, so overlap estimates come from inclusion-exclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HllSketch {
    registers: Vec<u8>,
}

impl Default for HllSketch {
    fn default() -> Self {
        HllSketch {
            registers: vec![0; HLL_M],
        }
    }
}

impl HllSketch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items<I: IntoIterator<Item = u64>>(items: I) -> Self {
        let mut sketch = Self::new();
        for item in items {
            sketch.insert(item);
        }
        sketch
    }

    pub fn insert(&mut self, item: u64) {
        let h = splitmix64(item);
        let idx = (h >> (64 - HLL_P)) as usize;
        let rest = h << HLL_P;
        let rank = (rest.leading_zeros() + 1).min(64 - HLL_P) as u8;
        if rank > self.registers[idx] {
            self.registers[idx] = rank;
        }
    }

    fn raw_estimate(registers: &[u8]) -> f64 {
        let m = registers.len() as f64;
        let alpha = 0.7213 / (1.0 + 1.079 / m);
        let sum: f64 = registers.iter().map(|&r| 2f64.powi(-(r as i32))).sum();
        let e = alpha * m * m / sum;
        if e <= 2.5 * m {
            let zeros = registers.iter().filter(|&&r| r == 0).count();
            if zeros > 0 {
                return m * (m / zeros as f64).ln();
            }
        }
        e
    }

    pub fn estimate(&self) -> f64 {
        Self::raw_estimate(&self.registers)
    }

    pub fn union_estimate(&self, other: &HllSketch) -> f64 {
        let merged: Vec<u8> = self
            .registers
            .iter()
            .zip(&other.registers)
            .map(|(&a, &b)| a.max(b))
            .collect();
        Self::raw_estimate(&merged)
    }
}

// Scores a transition from one label set to another along a chain.
//
//   - 0 when the target is contained in the source (no change to pay for)
//   - with sketches, a non-positive score derived from the estimated
//     overlap: rare transitions cost more
//   - otherwise the configured constant; NINF forbids the transition
pub struct LabelChangeScorer {
    sketches: Option<Vec<HllSketch>>,
}

impl LabelChangeScorer {
    // fall back to the configured constant score
    pub fn new() -> Self {
        LabelChangeScorer { sketches: None }
    }

    // one sketch per column, indexed by column id
    pub fn with_sketches(sketches: Vec<HllSketch>) -> Self {
        LabelChangeScorer {
            sketches: Some(sketches),
        }
    }

    // Sketch every column of a matrix; the per-column row sets feed the
    // overlap estimates.
    pub fn from_matrix(matrix: &crate::annot::annotator::MatrixVariant) -> Self {
        use crate::annot::matrix::BinaryMatrix;
        let sketches = (0..matrix.num_columns())
            .map(|c| HllSketch::from_items(matrix.get_column(c).into_iter()))
            .collect();
        Self::with_sketches(sketches)
    }

    // Score the change from the interned set `from_id` to `to_id`. Returns
    // the interned id of the labels actually carried forward plus the score;
    // never allocates when the sets are interned already.
    pub fn get_label_change_score(
        &self,
        buffer: &mut AnnotationBuffer,
        from_id: usize,
        to_id: usize,
        config: &AlignerConfig,
    ) -> (usize, Score) {
        if from_id == to_id {
            return (to_id, 0);
        }

        let from = buffer.get_cached_column_set(from_id);
        let to = buffer.get_cached_column_set(to_id);

        let mut inter: Vec<Column> = Vec::new();
        let mut diff: Vec<Column> = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < from.len() && j < to.len() {
            match from[i].cmp(&to[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => {
                    diff.push(to[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    inter.push(to[j]);
                    i += 1;
                    j += 1;
                }
            }
        }
        diff.extend_from_slice(&to[j..]);

        // superset: nothing changes
        if diff.is_empty() {
            return (to_id, 0);
        }

        // some labels continue: carry those at no cost
        if !inter.is_empty() {
            let id = buffer.cache_column_set(inter);
            return (id, 0);
        }

        let from = buffer.get_cached_column_set(from_id).to_vec();
        match &self.sketches {
            None => (to_id, config.label_change_score),
            Some(sketches) => {
                let lambda = config.match_score as f64;
                let mut best = NINF;
                for &d in &diff {
                    let sd = &sketches[d as usize];
                    let d_size = sd.estimate();
                    for &c in &from {
                        let sc = &sketches[c as usize];
                        let c_size = sc.estimate();
                        let union = sc.union_estimate(sd);
                        let overlap = c_size + d_size - union;
                        if overlap <= 0.0 {
                            continue;
                        }
                        let score =
                            ((overlap.min(d_size)).log2() - d_size.log2()) * lambda;
                        best = best.max(score.round() as Score);
                    }
                }
                (to_id, best)
            }
        }
    }
}

impl Default for LabelChangeScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annot::annotator::MatrixVariant;
    use crate::annot::matrix::ColumnMajor;
    use crate::graph::{DeBruijnGraph, HashGraph};

    fn setup() -> (HashGraph, MatrixVariant) {
        let g = HashGraph::from_sequences(4, &[b"ACGTA".as_ref()]);
        let rows = vec![vec![0u64, 1]; g.max_index() as usize];
        let m = MatrixVariant::ColumnMajor(ColumnMajor::from_rows(g.max_index(), 3, &rows));
        (g, m)
    }

    #[test]
    fn hll_estimates_are_sane() {
        let a = HllSketch::from_items(0..1000);
        let est = a.estimate();
        assert!((800.0..1200.0).contains(&est), "estimate {}", est);

        // heavy overlap: union is barely larger
        let b = HllSketch::from_items(100..1100);
        let union = a.union_estimate(&b);
        assert!(union < 1500.0, "union {}", union);
        // disjoint: union is roughly the sum
        let c = HllSketch::from_items(100_000..101_000);
        let union = a.union_estimate(&c);
        assert!(union > 1500.0, "union {}", union);
    }

    #[test]
    fn same_or_subset_is_free() {
        let (g, m) = setup();
        let mut buffer = AnnotationBuffer::new(&g, &m, 10);
        let config = AlignerConfig::default();
        let scorer = LabelChangeScorer::new();

        let ab = buffer.cache_column_set(vec![0, 1]);
        let a = buffer.cache_column_set(vec![0]);

        assert_eq!(scorer.get_label_change_score(&mut buffer, ab, ab, &config), (ab, 0));
        // target contained in source
        assert_eq!(scorer.get_label_change_score(&mut buffer, ab, a, &config), (a, 0));
    }

    #[test]
    fn constant_fallback_and_forbidden() {
        let (g, m) = setup();
        let mut buffer = AnnotationBuffer::new(&g, &m, 10);
        let mut config = AlignerConfig::default();
        let scorer = LabelChangeScorer::new();

        let a = buffer.cache_column_set(vec![0]);
        let b = buffer.cache_column_set(vec![1]);

        // default config forbids label changes
        let (_, score) = scorer.get_label_change_score(&mut buffer, a, b, &config);
        assert_eq!(score, NINF);

        config.label_change_score = -5;
        let (id, score) = scorer.get_label_change_score(&mut buffer, a, b, &config);
        assert_eq!((id, score), (b, -5));
    }

    #[test]
    fn partial_overlap_carries_intersection() {
        let (g, m) = setup();
        let mut buffer = AnnotationBuffer::new(&g, &m, 10);
        let config = AlignerConfig::default();
        let scorer = LabelChangeScorer::new();

        let ab = buffer.cache_column_set(vec![0, 1]);
        let bc = buffer.cache_column_set(vec![1, 2]);
        let (id, score) = scorer.get_label_change_score(&mut buffer, ab, bc, &config);
        assert_eq!(score, 0);
        assert_eq!(buffer.get_cached_column_set(id), &[1]);
    }

    #[test]
    fn sketch_scores_penalize_rare_transitions() {
        let (g, m) = setup();
        let mut buffer = AnnotationBuffer::new(&g, &m, 10);
        let mut config = AlignerConfig::default();
        config.label_change_score = -1; // sketches take precedence anyway

        // column 1 overlaps column 0 heavily; column 2 does not
        let sketches = vec![
            HllSketch::from_items(0..1000),
            HllSketch::from_items(0..900),
            HllSketch::from_items(50_000..51_000),
        ];
        let scorer = LabelChangeScorer::with_sketches(sketches);

        let a = buffer.cache_column_set(vec![0]);
        let b = buffer.cache_column_set(vec![1]);
        let c = buffer.cache_column_set(vec![2]);

        let (_, frequent) = scorer.get_label_change_score(&mut buffer, a, b, &config);
        let (_, rare) = scorer.get_label_change_score(&mut buffer, a, c, &config);
        assert!(frequent <= 0);
        assert!(rare < frequent, "rare {} frequent {}", rare, frequent);
    }
}
