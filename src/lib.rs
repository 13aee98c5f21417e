pub mod align;
pub mod annot;
pub mod bitvec;
pub mod graph;
pub mod io;
pub mod log;
pub mod path_index;

pub mod serde_ext;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
