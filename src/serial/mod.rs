pub mod assembler;
pub mod reader;

pub use assembler::FrameAssembler;
pub use reader::{open_serial, read_bytes};
