// Frame Video 엔진
// 정지 이미지 시퀀스 (+ 선택 오디오) → H.264 MP4, ffmpeg-next 기반

/// 디버그 로그 매크로 - `cargo build --features debug_log` 시에만 출력
/// 평소 릴리스 빌드에서는 컴파일 자체에서 제외됨
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug_log")]
        log::debug!($($arg)*);
    };
}

pub mod config;
pub mod encoding;
pub mod error;
pub mod ffi;
pub mod ffmpeg;
pub mod frames;
pub mod muxing;

pub use config::{EncodeRequest, EncoderSettings, ValidatedRequest};
pub use encoding::{create_video, run_request, EncodeJob, EncodeResponse, ExportOutcome};
pub use error::{Error, ErrorCategory, Result};

// FFI 함수들을 최상위에서 재export
pub use ffi::*;

/// env_logger 설치 (RUST_LOG로 필터, 중복 호출 무시)
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).try_init();
}
