pub mod boundary;
pub mod lod;
pub mod sizing;
