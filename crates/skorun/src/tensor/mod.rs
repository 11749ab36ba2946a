pub mod cpu;
pub mod dtype;

pub use cpu::TypedTensor;
pub use dtype::DType;
