use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use simple_sds::bit_vector::BitVector;
use simple_sds::ops::{BitVec, Rank, Select};
use simple_sds::sparse_vector::{SparseBuilder, SparseVector};

use crate::serde_ext;

// Rank/select bit sequence with two storage flavors sharing one contract.
//
// Rank convention: rank1(i) counts set bits in [0, i] (INCLUSIVE).
// select1(r) is 1-indexed: select1(rank1(i)) == i whenever bit i is set.
// simple-sds uses exclusive rank and 0-indexed select; the adaptation
// happens here and nowhere else.
#[derive(Debug, Clone)]
pub enum Bitmap {
    Dense(BitVector),
    Sparse(SparseVector),
}

// density cutoff for the adaptive constructor, ones per 16 positions
const SPARSE_CUTOFF: usize = 16;

impl Bitmap {
    pub fn from_bools<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut bv: BitVector = bits.into_iter().collect();
        bv.enable_rank();
        bv.enable_select();
        Bitmap::Dense(bv)
    }

    pub fn dense_from_ones(len: usize, ones: &[usize]) -> Self {
        let mut next = ones.iter();
        let mut cur = next.next();
        let bv = (0..len).map(|i| {
            if cur == Some(&i) {
                cur = next.next();
                true
            } else {
                false
            }
        });
        Self::from_bools(bv)
    }

    pub fn sparse_from_ones(len: usize, ones: &[usize]) -> Self {
        debug_assert!(ones.windows(2).all(|w| w[0] < w[1]));
        if len == 0 {
            return Self::from_bools(std::iter::empty());
        }
        let mut builder = SparseBuilder::new(len, ones.len()).unwrap();
        for &pos in ones {
            builder.set(pos);
        }
        Bitmap::Sparse(SparseVector::try_from(builder).unwrap())
    }

    // Picks the flavor by density, like the smart vectors in succinct
    // annotation codebases.
    pub fn adaptive_from_ones(len: usize, ones: &[usize]) -> Self {
        if len > 0 && ones.len() * SPARSE_CUTOFF < len {
            Self::sparse_from_ones(len, ones)
        } else {
            Self::dense_from_ones(len, ones)
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Bitmap::Dense(bv) => bv.len(),
            Bitmap::Sparse(sv) => sv.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn num_set_bits(&self) -> usize {
        match self {
            Bitmap::Dense(bv) => bv.count_ones(),
            Bitmap::Sparse(sv) => sv.count_ones(),
        }
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.size());
        match self {
            Bitmap::Dense(bv) => bv.get(i),
            Bitmap::Sparse(sv) => sv.get(i),
        }
    }

    // set bits in [0, i]
    #[inline]
    pub fn rank1(&self, i: usize) -> usize {
        match self {
            Bitmap::Dense(bv) => bv.rank(i + 1),
            Bitmap::Sparse(sv) => sv.rank(i + 1),
        }
    }

    // rank1(i) if bit i is set, 0 otherwise
    #[inline]
    pub fn conditional_rank1(&self, i: usize) -> usize {
        if self.get(i) {
            self.rank1(i)
        } else {
            0
        }
    }

    // position of the r-th set bit, r >= 1
    #[inline]
    pub fn select1(&self, r: usize) -> usize {
        debug_assert!(r >= 1);
        match self {
            Bitmap::Dense(bv) => bv.select(r - 1).unwrap(),
            Bitmap::Sparse(sv) => sv.select(r - 1).unwrap(),
        }
    }

    // Read w <= 64 bits starting at position i, zero-padded past the end.
    // On the dense flavor this touches at most two backing words; the
    // batched matrix queries treat one get_int as worth ~5 single-bit reads.
    pub fn get_int(&self, i: usize, w: usize) -> u64 {
        assert!(w <= 64);
        if w == 0 {
            return 0;
        }

        let val = match self {
            Bitmap::Dense(bv) => {
                let raw: &simple_sds::raw_vector::RawVector = bv.as_ref();
                let words: &[u64] = raw.as_ref();
                let wi = i / 64;
                let off = i % 64;
                let mut val = words.get(wi).copied().unwrap_or(0) >> off;
                if off != 0 && off + w > 64 {
                    val |= words.get(wi + 1).copied().unwrap_or(0) << (64 - off);
                }
                val
            }
            Bitmap::Sparse(sv) => {
                // no backing words; assemble from the positions of set bits
                let mut val = 0u64;
                let mut r = sv.rank(i);
                while r < sv.count_ones() {
                    let pos = sv.select(r).unwrap();
                    if pos >= i + w {
                        break;
                    }
                    val |= 1u64 << (pos - i);
                    r += 1;
                }
                val
            }
        };

        if w < 64 {
            val & ((1u64 << w) - 1)
        } else {
            val
        }
    }

    pub fn call_ones<F: FnMut(usize)>(&self, mut cb: F) {
        for r in 1..=self.num_set_bits() {
            cb(self.select1(r));
        }
    }

    pub fn to_ones(&self) -> Vec<usize> {
        let mut v = Vec::with_capacity(self.num_set_bits());
        self.call_ones(|i| v.push(i));
        v
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.to_ones() == other.to_ones()
    }
}

impl Eq for Bitmap {}

/******************************************************************************/
// Serde views. The dense flavor round-trips through serde_ext (raw words);
// the sparse flavor stores its set positions.
/******************************************************************************/
#[derive(Serialize, Deserialize)]
struct SparseView {
    len: u64,
    ones: Vec<u64>,
}

#[derive(Serialize)]
enum BitmapSer<'a> {
    Dense(#[serde(with = "serde_ext")] &'a BitVector),
    Sparse(SparseView),
}

#[derive(Deserialize)]
enum BitmapDe {
    Dense(#[serde(with = "serde_ext")] BitVector),
    Sparse(SparseView),
}

impl Serialize for Bitmap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let view = match self {
            Bitmap::Dense(bv) => BitmapSer::Dense(bv),
            Bitmap::Sparse(sv) => BitmapSer::Sparse(SparseView {
                len: sv.len() as u64,
                ones: {
                    let mut ones = Vec::with_capacity(sv.count_ones());
                    for r in 0..sv.count_ones() {
                        ones.push(sv.select(r).unwrap() as u64);
                    }
                    ones
                },
            }),
        };
        view.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bitmap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match BitmapDe::deserialize(deserializer)? {
            BitmapDe::Dense(mut bv) => {
                bv.enable_rank();
                bv.enable_select();
                Ok(Bitmap::Dense(bv))
            }
            BitmapDe::Sparse(view) => {
                let ones: Vec<usize> = view.ones.iter().map(|&x| x as usize).collect();
                Ok(Bitmap::sparse_from_ones(view.len as usize, &ones))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_bitmaps(bits: &[bool]) -> Vec<Bitmap> {
        let ones: Vec<usize> = bits
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect();
        vec![
            Bitmap::from_bools(bits.iter().copied()),
            Bitmap::sparse_from_ones(bits.len(), &ones),
        ]
    }

    #[test]
    fn rank_select_conventions() {
        let bits = vec![true, false, true, true, false];
        for bm in model_bitmaps(&bits) {
            assert_eq!(bm.size(), 5);
            assert_eq!(bm.num_set_bits(), 3);
            assert_eq!(bm.rank1(0), 1);
            assert_eq!(bm.rank1(1), 1);
            assert_eq!(bm.rank1(2), 2);
            assert_eq!(bm.rank1(4), 3);
            assert_eq!(bm.select1(1), 0);
            assert_eq!(bm.select1(2), 2);
            assert_eq!(bm.select1(3), 3);
            assert_eq!(bm.conditional_rank1(1), 0);
            assert_eq!(bm.conditional_rank1(2), 2);
        }
    }

    #[test]
    fn select_inverts_rank() {
        let bits: Vec<bool> = (0..200).map(|i| i % 7 == 0 || i % 11 == 3).collect();
        for bm in model_bitmaps(&bits) {
            for (i, &b) in bits.iter().enumerate() {
                if b {
                    assert_eq!(bm.select1(bm.rank1(i)), i);
                    assert_eq!(bm.conditional_rank1(i), bm.rank1(i));
                } else {
                    assert_eq!(bm.conditional_rank1(i), 0);
                }
            }
        }
    }

    #[test]
    fn get_int_matches_bits() {
        let bits: Vec<bool> = (0..300).map(|i| (i * 2654435761usize) % 5 < 2).collect();
        for bm in model_bitmaps(&bits) {
            for start in [0usize, 1, 63, 64, 65, 250] {
                for w in [1usize, 3, 17, 63, 64] {
                    let mut want = 0u64;
                    for j in 0..w {
                        if start + j < bits.len() && bits[start + j] {
                            want |= 1 << j;
                        }
                    }
                    assert_eq!(bm.get_int(start, w), want, "start={} w={}", start, w);
                }
            }
        }
    }

    #[test]
    fn call_ones_enumerates_in_order() {
        let ones = vec![1usize, 5, 6, 63, 64, 120];
        for bm in [
            Bitmap::dense_from_ones(128, &ones[..5]),
            Bitmap::sparse_from_ones(128, &ones[..5]),
        ] {
            assert_eq!(bm.to_ones(), ones[..5].to_vec());
        }
    }

    #[test]
    fn adaptive_picks_sparse_for_low_density() {
        let bm = Bitmap::adaptive_from_ones(10_000, &[17, 4096]);
        assert!(matches!(bm, Bitmap::Sparse(_)));
        let bm = Bitmap::adaptive_from_ones(16, &[0, 1, 2, 3]);
        assert!(matches!(bm, Bitmap::Dense(_)));
    }

    #[quickcheck]
    fn qc_flavors_agree(words: Vec<u64>) -> bool {
        let bits: Vec<bool> = words
            .iter()
            .flat_map(|w| (0..64).map(move |i| (w >> i) & 1 == 1))
            .collect();
        let [dense, sparse] = <[Bitmap; 2]>::try_from(model_bitmaps(&bits)).unwrap();
        if dense.num_set_bits() != sparse.num_set_bits() {
            return false;
        }
        (0..bits.len()).all(|i| {
            dense.get(i) == sparse.get(i)
                && dense.rank1(i) == sparse.rank1(i)
                && dense.conditional_rank1(i) == sparse.conditional_rank1(i)
        })
    }

    #[quickcheck]
    fn qc_serde_roundtrip(words: Vec<u64>, sparse: bool) -> bool {
        let bits: Vec<bool> = words
            .iter()
            .flat_map(|w| (0..64).map(move |i| (w >> i) & 1 == 1))
            .collect();
        let ones: Vec<usize> = bits
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect();
        let bm = if sparse {
            Bitmap::sparse_from_ones(bits.len(), &ones)
        } else {
            Bitmap::from_bools(bits.iter().copied())
        };
        let bytes = bincode::serialize(&bm).unwrap();
        let de: Bitmap = bincode::deserialize(&bytes).unwrap();
        de == bm
    }
}
