// FFI 모듈 - 호스트(C ABI) 연동

pub mod encoder;
pub mod types;

pub use encoder::*;
pub use types::ErrorCode;
