// 인코딩된 샘플 + 읽기/쓰기 seam
// 플래그(키프레임 등)는 Packet에 그대로 실려 수정 없이 통과

use crate::error::Result;
use ffmpeg_next as ffmpeg;
use ffmpeg::{Packet, Rational, Rescale};

/// 마이크로초 타임베이스 (프레젠테이션 타임스탬프 기준 단위)
pub const MICROS: Rational = Rational(1, 1_000_000);

/// 트랙 종류 (미디어 타입 접두사로 판별)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub fn mime_prefix(self) -> &'static str {
        match self {
            TrackKind::Video => "video/",
            TrackKind::Audio => "audio/",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        }
    }

    /// "video/h264" 같은 MIME 문자열에서 종류 판별
    pub fn from_mime(mime: &str) -> Option<Self> {
        [TrackKind::Video, TrackKind::Audio]
            .into_iter()
            .find(|kind| mime.starts_with(kind.mime_prefix()))
    }
}

/// 인코더 출력 또는 소스 컨테이너에서 읽은 샘플 1개
pub struct Sample {
    pub packet: Packet,
    /// packet 타임스탬프의 단위
    pub time_base: Rational,
}

impl Sample {
    pub fn new(packet: Packet, time_base: Rational) -> Self {
        Self { packet, time_base }
    }

    /// 프레젠테이션 타임스탬프 (μs). PTS가 없으면 DTS, 둘 다 없으면 0
    pub fn pts_us(&self) -> i64 {
        self.packet
            .pts()
            .or_else(|| self.packet.dts())
            .map(|ts| ts.rescale(self.time_base, MICROS))
            .unwrap_or(0)
    }

    pub fn is_key(&self) -> bool {
        self.packet.is_key()
    }

    pub fn size(&self) -> usize {
        self.packet.size()
    }
}

/// 샘플을 순서대로 꺼내는 소스 (Ok(None) = 스트림 끝)
pub trait SampleReader {
    fn read_sample(&mut self) -> Result<Option<Sample>>;
}

/// 샘플을 지정 트랙에 기록하는 대상
pub trait SampleSink {
    fn write_sample(&mut self, track: usize, sample: Sample) -> Result<()>;
}
