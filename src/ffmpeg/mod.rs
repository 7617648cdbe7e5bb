// FFmpeg 래퍼 모듈
// 네이티브 핸들(출력/입력 컨텍스트)을 단독 소유하는 RAII 타입들

pub mod extractor;
pub mod sample;
pub mod writer;

pub use extractor::{ContainerSummary, Extractor, TrackInfo};
pub use sample::{Sample, SampleReader, SampleSink, TrackKind, MICROS};
pub use writer::ContainerWriter;

use crate::error::{Error, Result};
use ffmpeg_next as ffmpeg;
use std::sync::Once;

static LOG_LEVEL: Once = Once::new();

/// FFmpeg 초기화 (여러 번 호출해도 안전)
/// 라이브러리 자체 로그는 경고 이상만 stderr로
pub fn init() -> Result<()> {
    ffmpeg::init().map_err(Error::ffmpeg("init"))?;
    LOG_LEVEL.call_once(|| {
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Warning);
    });
    Ok(())
}
