pub mod alignment;
pub mod annotation_buffer;
pub mod chain_alignments;
pub mod chainer;
pub mod cigar;
pub mod config;
pub mod label_change;

pub use alignment::{Alignment, Seed};
pub use annotation_buffer::AnnotationBuffer;
pub use chain_alignments::chain_alignments;
pub use chainer::{call_seed_chains_both_strands, chain_and_filter_seeds, chain_seeds, Chain};
pub use cigar::{Cigar, Op};
pub use config::AlignerConfig;
pub use label_change::LabelChangeScorer;

pub type Score = i32;

// "forbidden"; safely below any reachable score, with headroom for sums
pub const NINF: Score = i32::MIN / 2;
