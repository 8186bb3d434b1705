//! Memory management for allocation-free operation.

pub mod buffer;

pub use buffer::ReusableBuffer;
