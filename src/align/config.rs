use super::cigar::{Cigar, Op};
use super::{Score, NINF};

// Scoring configuration shared by the extender and both chainers. Penalties
// are stored negative and added, never subtracted.
#[derive(Debug, Clone)]
pub struct AlignerConfig {
    pub match_score: Score,
    pub mismatch_score: Score,
    pub gap_opening_penalty: Score,
    pub gap_extension_penalty: Score,
    pub node_insertion_penalty: Score,

    // constant fallback for the label-change oracle; NINF forbids changes
    pub label_change_score: Score,

    pub min_seed_length: usize,
    pub min_exact_match: f32,
    pub max_num_seeds_per_locus: usize,

    pub allow_jump: bool,

    pub left_end_bonus: Score,
    pub right_end_bonus: Score,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        AlignerConfig {
            match_score: 2,
            mismatch_score: -3,
            gap_opening_penalty: -6,
            gap_extension_penalty: -2,
            node_insertion_penalty: -10,
            label_change_score: NINF,
            min_seed_length: 19,
            min_exact_match: 0.7,
            max_num_seeds_per_locus: 100,
            allow_jump: false,
            left_end_bonus: 0,
            right_end_bonus: 0,
        }
    }
}

impl AlignerConfig {
    pub fn match_score_of(&self, len: usize) -> Score {
        self.match_score * len as Score
    }

    pub fn gap_score(&self, len: usize) -> Score {
        if len == 0 {
            0
        } else {
            self.gap_opening_penalty + (len as Score - 1) * self.gap_extension_penalty
        }
    }

    // The score an alignment with this CIGAR carries, before any per-step
    // extra scores. A NODE_INSERTION charges the splice: one node insertion
    // plus one gap opening.
    pub fn score_from_cigar(&self, cigar: &Cigar) -> Score {
        let mut score = 0;
        for &(op, len) in cigar.ops() {
            score += match op {
                Op::Match => self.match_score * len as Score,
                Op::Mismatch => self.mismatch_score * len as Score,
                Op::Insertion | Op::Deletion => self.gap_score(len),
                Op::NodeInsertion => self.node_insertion_penalty + self.gap_opening_penalty,
                Op::Clipped => 0,
            };
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cigar_scoring() {
        let config = AlignerConfig::default();
        let cigar: Cigar = "3S10=2X3I5=".parse().unwrap();
        let want = 10 * 2 + 2 * (-3) + (-6 + 2 * (-2)) + 5 * 2;
        assert_eq!(config.score_from_cigar(&cigar), want);
    }

    #[test]
    fn gap_score_shape() {
        let config = AlignerConfig::default();
        assert_eq!(config.gap_score(0), 0);
        assert_eq!(config.gap_score(1), -6);
        assert_eq!(config.gap_score(3), -10);
    }
}
