//! Byte storage: the medium an image lives on and the cursor store over it.

pub mod medium;
pub mod store;
