use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use simple_sds::bit_vector::BitVector;
use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Push, Rank, Select, SelectZero, Vector};
use simple_sds::raw_vector::{AccessRaw, RawVector};
use std::borrow::Borrow;

// Extension traits to serialize simple-sds datastructures since they do not
// derive serde drivers.

pub trait AsSerialize<'a>
where
    Self: Borrow<Self>,
{
    type S: Serialize;
    fn as_serialize(&'a self) -> Self::S;
}

pub trait FromDeserialize<'de> {
    type D: Deserialize<'de>;
    fn from_deserialized(value: Self::D) -> Self;
}

pub fn serialize<'a, S, T>(item: &'a T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: AsSerialize<'a>,
    T::S: Serialize,
{
    item.as_serialize().serialize(serializer)
}

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromDeserialize<'de>,
    T::D: Deserialize<'de>,
{
    let view = T::D::deserialize(deserializer)?;
    Ok(T::from_deserialized(view))
}

impl<'a, T> AsSerialize<'a> for &'a T
where
    T: AsSerialize<'a>,
{
    type S = T::S;
    fn as_serialize(&'a self) -> Self::S {
        (*self).as_serialize()
    }
}

// Serde-serializable view structs for simple-sds types
#[derive(Serialize)]
pub struct RawVecSer<'rv> {
    pub len: usize,
    pub data: &'rv [u64],
}

#[derive(Deserialize)]
pub struct RawVecDe {
    pub len: usize,
    pub data: Vec<u64>,
}

impl<'a> AsSerialize<'a> for RawVector {
    type S = RawVecSer<'a>;
    fn as_serialize(&'a self) -> RawVecSer {
        RawVecSer {
            len: self.len(),
            data: self.as_ref(),
        }
    }
}

impl<'de> FromDeserialize<'de> for RawVector {
    type D = RawVecDe;
    fn from_deserialized(view: Self::D) -> Self {
        let mut result = RawVector::with_len(view.len, false);
        for (i, word) in view.data.into_iter().enumerate() {
            let bit_offset = i * 64;
            if bit_offset >= view.len {
                break;
            }
            let width = std::cmp::min(64, view.len - bit_offset);
            unsafe {
                result.set_int(bit_offset, word, width);
            }
        }
        result
    }
}

#[derive(Serialize)]
pub struct BitVecSer<'a> {
    pub supports_rank: bool,
    pub supports_select: bool,
    pub supports_select_zero: bool,

    #[serde(with = "self")]
    pub data: &'a RawVector,
}

#[derive(Deserialize)]
pub struct BitVecDe {
    pub supports_rank: bool,
    pub supports_select: bool,
    pub supports_select_zero: bool,

    #[serde(with = "self")]
    pub data: RawVector,
}

impl<'a> AsSerialize<'a> for BitVector {
    type S = BitVecSer<'a>;
    fn as_serialize(&'a self) -> BitVecSer<'a> {
        BitVecSer {
            supports_rank: self.supports_rank(),
            supports_select: self.supports_select(),
            supports_select_zero: self.supports_select_zero(),
            data: self.as_ref(),
        }
    }
}

impl FromDeserialize<'_> for BitVector {
    type D = BitVecDe;
    fn from_deserialized(view: BitVecDe) -> Self {
        let mut bv = Self::from(view.data);
        if view.supports_rank {
            bv.enable_rank()
        }
        if view.supports_select {
            bv.enable_select()
        }
        if view.supports_select_zero {
            bv.enable_select_zero()
        }
        bv
    }
}

#[derive(Serialize)]
pub struct IntVecSer<'a> {
    pub len: usize,
    pub width: usize,

    #[serde(with = "self")]
    pub data: &'a RawVector,
}

#[derive(Deserialize)]
pub struct IntVecDe {
    pub len: usize,
    pub width: usize,

    #[serde(with = "self")]
    pub data: RawVector,
}

impl<'a> AsSerialize<'a> for IntVector {
    type S = IntVecSer<'a>;
    fn as_serialize(&'a self) -> IntVecSer<'a> {
        IntVecSer {
            len: self.len(),
            width: self.width(),
            data: self.as_ref(),
        }
    }
}

impl FromDeserialize<'_> for IntVector {
    type D = IntVecDe;
    fn from_deserialized(view: Self::D) -> Self {
        let mut result = IntVector::new(view.width).unwrap();
        for i in 0..view.len {
            let bit_offset = i * view.width;
            let value = unsafe { view.data.int(bit_offset, view.width) };
            result.push(value);
        }
        result
    }
}

impl<'a, T> AsSerialize<'a> for Vec<T>
where
    T: 'a,
    T: AsSerialize<'a>,
{
    type S = Vec<<T as AsSerialize<'a>>::S>;
    fn as_serialize(&'a self) -> Self::S {
        self.iter().map(|x| x.as_serialize()).collect()
    }
}

impl<'de, T> FromDeserialize<'de> for Vec<T>
where
    T: FromDeserialize<'de>,
{
    type D = Vec<T::D>;
    fn from_deserialized(views: Self::D) -> Self {
        views.into_iter().map(T::from_deserialized).collect()
    }
}

// Owned IntVector with serde wired through the view structs, for use as a
// plain struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedInts(pub IntVector);

impl PackedInts {
    pub fn pack_from(vals: Vec<u64>) -> Self {
        use simple_sds::ops::Pack;
        let mut iv = IntVector::from(vals);
        iv.pack();
        PackedInts(iv)
    }

    pub fn get(&self, i: usize) -> u64 {
        use simple_sds::ops::Access;
        self.0.get(i)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.len() == 0
    }
}

impl Serialize for PackedInts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for PackedInts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize(deserializer).map(PackedInts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_sds::ops::{Pack, Resize};

    #[quickcheck]
    fn bv(xs: Vec<u64>, size: usize) -> bool {
        let mut rv = RawVector::from_deserialized(RawVecDe { len: xs.len() * 64, data: xs });
        let size = size % 10000;
        rv.resize(size, false);
        let mut bv = BitVector::from(rv);
        bv.enable_rank();
        bv.enable_select();
        let ser = bincode::serialize(&bv.as_serialize()).unwrap();
        let de = bincode::deserialize(&ser).unwrap();
        let de = BitVector::from_deserialized(de);
        de == bv
    }

    #[quickcheck]
    fn iv(xs: Vec<u64>, size: usize) -> bool {
        let mut iv = IntVector::from(xs);
        let size = size % 10000;
        iv.resize(size, 0);
        iv.pack();
        let ser = bincode::serialize(&iv.as_serialize()).unwrap();
        let de = bincode::deserialize(&ser).unwrap();
        let de = IntVector::from_deserialized(de);
        de == iv
    }
}
