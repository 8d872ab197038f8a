//! On-disk layout: region geometry, the descriptor table and allocation bitmaps.

pub mod bitmap;
pub mod codec;
pub mod geometry;
