// 컨테이너 extractor - 입력 컨텍스트 RAII 래퍼
// 트랙 스캔(MIME 접두사 매칭) → 트랙 선택 → 선택 트랙의 샘플만 소스 순서대로 읽기

use crate::error::{Error, Result};
use crate::ffmpeg::sample::{Sample, SampleReader, TrackKind, MICROS};
use ffmpeg_next as ffmpeg;
use ffmpeg::{codec, format, media, Packet, Rational, Rescale};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 소스 컨테이너의 트랙 설명
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub index: usize,
    /// "video/h264", "audio/aac" 형식
    pub mime: String,
    pub time_base: Rational,
}

impl TrackInfo {
    pub fn kind(&self) -> Option<TrackKind> {
        TrackKind::from_mime(&self.mime)
    }
}

fn medium_name(medium: media::Type) -> &'static str {
    match medium {
        media::Type::Video => "video",
        media::Type::Audio => "audio",
        media::Type::Subtitle => "text",
        media::Type::Data | media::Type::Attachment => "application",
        _ => "unknown",
    }
}

/// 컨테이너 extractor (입력 컨텍스트 핸들 1개를 단독 소유)
pub struct Extractor {
    input: format::context::Input,
    path: PathBuf,
    /// 선택된 트랙 (index, time_base)
    selected: Option<(usize, Rational)>,
}

impl Extractor {
    pub fn open(path: &Path) -> Result<Self> {
        crate::ffmpeg::init()?;
        let input = format::input(&path).map_err(Error::ffmpeg("open input"))?;

        Ok(Self {
            input,
            path: path.to_path_buf(),
            selected: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tracks(&self) -> Result<Vec<TrackInfo>> {
        Ok(self
            .input
            .streams()
            .map(|stream| {
                let params = stream.parameters();
                TrackInfo {
                    index: stream.index(),
                    mime: format!("{}/{}", medium_name(params.medium()), params.id().name()),
                    time_base: stream.time_base(),
                }
            })
            .collect())
    }

    /// 해당 종류의 첫 번째 트랙
    pub fn find_track(&self, kind: TrackKind) -> Result<Option<TrackInfo>> {
        Ok(self
            .tracks()?
            .into_iter()
            .find(|t| t.mime.starts_with(kind.mime_prefix())))
    }

    /// 트랙 포맷 (writer에 그대로 복사 등록)
    pub fn parameters(&self, index: usize) -> Result<codec::Parameters> {
        self.input
            .stream(index)
            .map(|s| s.parameters())
            .ok_or(Error::MissingTrack("selected"))
    }

    pub fn select_track(&mut self, index: usize) -> Result<()> {
        let time_base = self
            .input
            .stream(index)
            .map(|s| s.time_base())
            .ok_or(Error::MissingTrack("selected"))?;
        self.selected = Some((index, time_base));
        Ok(())
    }
}

impl SampleReader for Extractor {
    fn read_sample(&mut self) -> Result<Option<Sample>> {
        let (selected, time_base) = self.selected.ok_or(Error::MissingTrack("selected"))?;
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() == selected => {
                    return Ok(Some(Sample::new(packet, time_base)));
                }
                Ok(()) => continue,
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == libc::EAGAIN => continue,
                Err(e) => return Err(Error::ffmpeg("read sample")(e)),
            }
        }
    }
}

/// 컨테이너 요약 (트랙/샘플 수, 마지막 타임스탬프) - 실행 후 진단 로그 + 테스트 검증용
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSummary {
    pub video_tracks: usize,
    pub audio_tracks: usize,
    pub video_samples: usize,
    pub audio_samples: usize,
    /// 종류별 마지막 샘플 PTS (μs)
    pub last_video_pts_us: Option<i64>,
    pub last_audio_pts_us: Option<i64>,
    /// 마지막 샘플 끝 시각 (pts + duration, μs)
    pub end_us: i64,
    /// 파일 순서대로의 (종류, PTS μs)
    pub samples: Vec<(TrackKind, i64)>,
}

impl ContainerSummary {
    pub fn probe(path: &Path) -> Result<Self> {
        let mut extractor = Extractor::open(path)?;
        let tracks = extractor.tracks()?;

        let mut summary = ContainerSummary::default();
        let mut kinds: HashMap<usize, (TrackKind, Rational)> = HashMap::new();
        for track in &tracks {
            let Some(kind) = track.kind() else {
                continue;
            };
            match kind {
                TrackKind::Video => summary.video_tracks += 1,
                TrackKind::Audio => summary.audio_tracks += 1,
            }
            kinds.insert(track.index, (kind, track.time_base));
        }

        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut extractor.input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => break,
                Err(ffmpeg::Error::Other { errno }) if errno == libc::EAGAIN => continue,
                Err(e) => return Err(Error::ffmpeg("read sample")(e)),
            }
            let Some(&(kind, time_base)) = kinds.get(&packet.stream()) else {
                continue;
            };
            let duration = packet.duration().rescale(time_base, MICROS);
            let sample = Sample::new(packet, time_base);
            let pts = sample.pts_us();

            match kind {
                TrackKind::Video => {
                    summary.video_samples += 1;
                    summary.last_video_pts_us = Some(pts);
                }
                TrackKind::Audio => {
                    summary.audio_samples += 1;
                    summary.last_audio_pts_us = Some(pts);
                }
            }
            summary.end_us = summary.end_us.max(pts + duration);
            summary.samples.push((kind, pts));
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let err = Extractor::open(Path::new("/nonexistent/audio.m4a")).unwrap_err();
        assert!(matches!(err, Error::Ffmpeg { stage: "open input", .. }));
    }

    #[test]
    fn test_medium_names() {
        assert_eq!(medium_name(media::Type::Video), "video");
        assert_eq!(medium_name(media::Type::Audio), "audio");
        assert_eq!(medium_name(media::Type::Subtitle), "text");
    }

    #[test]
    fn test_track_info_kind() {
        let info = TrackInfo {
            index: 0,
            mime: "audio/mp3".to_string(),
            time_base: Rational(1, 44_100),
        };
        assert_eq!(info.kind(), Some(TrackKind::Audio));
    }
}
