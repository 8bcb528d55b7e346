// In: src/kernels/mod.rs

//! Pure, stateless compression kernels. Each kernel is a standalone transform
//! with no knowledge of columns, counters or containers.

pub mod bitpack;
pub mod leb128;
pub mod rans;
