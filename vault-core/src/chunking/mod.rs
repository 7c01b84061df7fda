pub mod fastcdc;

pub use fastcdc::{FastCdcParams, StreamingChunker};
