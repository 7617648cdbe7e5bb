// 에러 타입 - 호스트 계약 카테고리(INVALID_ARGS / ENCODING_ERROR)로 매핑

use ffmpeg_next as ffmpeg;
use std::path::PathBuf;

/// 크레이트 공통 Result
pub type Result<T> = std::result::Result<T, Error>;

/// 호스트에 전달되는 에러 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 필수 인자 누락, 빈 프레임 목록 등 (리소스 할당 전 거부)
    InvalidArguments,
    /// 비디오 스트림 자체를 만들지 못한 경우
    EncodingError,
}

impl ErrorCategory {
    /// 호스트가 분기하는 기계 판독용 코드
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::InvalidArguments => "INVALID_ARGS",
            ErrorCategory::EncodingError => "ENCODING_ERROR",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("no frames")]
    NoFrames,

    /// 개별 프레임 디코딩 실패 (파이프라인에서는 해당 프레임만 건너뜀)
    #[error("failed to decode frame {}: {source}", path.display())]
    FrameDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("none of the frames could be decoded")]
    NoDecodableFrame,

    #[error("H.264 encoder not found")]
    EncoderNotFound,

    #[error("FFmpeg {stage} failed: {source}")]
    Ffmpeg {
        stage: &'static str,
        #[source]
        source: ffmpeg::Error,
    },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidState {
        from: &'static str,
        to: &'static str,
    },

    #[error("no {0} track found")]
    MissingTrack(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// FFmpeg 에러에 단계 이름 부착 (`.map_err(Error::ffmpeg("write header"))`)
    pub fn ffmpeg(stage: &'static str) -> impl FnOnce(ffmpeg::Error) -> Self {
        move |source| Error::Ffmpeg { stage, source }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidArguments(_) | Error::NoFrames => ErrorCategory::InvalidArguments,
            _ => ErrorCategory::EncodingError,
        }
    }
}
