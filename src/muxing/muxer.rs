// 비디오 + 오디오 먹서
// 비디오 전용 임시 컨테이너와 외부 오디오 파일 → 하나의 MP4 (오디오는 재인코딩 없이 복사)
// extractor 2개 + writer 1개는 모든 종료 경로에서 Drop으로 해제

use crate::error::{Error, Result};
use crate::ffmpeg::{ContainerWriter, Extractor, TrackKind};
use crate::muxing::interleave::{copy_track, interleave, InterleaveStats};
use std::path::Path;

/// 먹싱 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxReport {
    pub has_video: bool,
    pub has_audio: bool,
    pub stats: InterleaveStats,
}

/// 소스에서 해당 종류의 첫 트랙을 선택하고 writer에 복사 트랙으로 등록
fn register_track(
    extractor: &mut Extractor,
    kind: TrackKind,
    writer: &mut ContainerWriter,
) -> Result<Option<usize>> {
    let Some(track) = extractor.find_track(kind)? else {
        log::warn!(
            "[MUXER] {}에 {} 트랙 없음",
            extractor.path().display(),
            kind.name()
        );
        return Ok(None);
    };

    extractor.select_track(track.index)?;
    let parameters = extractor.parameters(track.index)?;
    let index = writer.add_copy_track(kind, parameters, track.time_base)?;
    log::info!(
        "[MUXER] {} 트랙 등록: {} (source #{} → output #{})",
        kind.name(),
        track.mime,
        track.index,
        index
    );
    Ok(Some(index))
}

/// 비디오 컨테이너 + 오디오 파일 병합
/// - 두 트랙 모두 있으면 PTS 순 병합
/// - 하나만 있으면 그 트랙만 복사
/// - 어떤 실패든 Err (호출자는 비디오 전용 출력으로 대체)
pub fn mux_video_with_audio(
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
) -> Result<MuxReport> {
    let mut video = Extractor::open(video_path)?;
    let mut audio = Extractor::open(audio_path)?;
    let mut writer = ContainerWriter::create(output_path)?;

    // 트랙 등록은 writer 시작 전에 모두 끝남
    let video_track = register_track(&mut video, TrackKind::Video, &mut writer)?;
    let audio_track = register_track(&mut audio, TrackKind::Audio, &mut writer)?;

    let stats = match (video_track, audio_track) {
        (Some(v), Some(a)) => {
            writer.start()?;
            interleave(&mut video, v, &mut audio, a, &mut writer)?
        }
        (Some(v), None) => {
            writer.start()?;
            copy_track(&mut video, TrackKind::Video, v, &mut writer)?
        }
        (None, Some(a)) => {
            writer.start()?;
            copy_track(&mut audio, TrackKind::Audio, a, &mut writer)?
        }
        (None, None) => return Err(Error::MissingTrack("video")),
    };

    // 해제 = 마무리 (별도 stop 호출 없음)
    writer.release()?;

    log::info!(
        "[MUXER] 완료: 비디오 {} / 오디오 {} 샘플 → {}",
        stats.video_samples,
        stats.audio_samples,
        output_path.display()
    );

    Ok(MuxReport {
        has_video: video_track.is_some(),
        has_audio: audio_track.is_some(),
        stats,
    })
}
