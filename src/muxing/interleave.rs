// 타임스탬프 순 병합
// 두 소스에서 각각 다음 샘플을 하나씩 보류해 두고, PTS가 작은 쪽부터 기록 (동률이면 비디오)
// 기록한 쪽 소스만 전진

use crate::error::Result;
use crate::ffmpeg::{Sample, SampleReader, SampleSink, TrackKind};

/// 다음에 기록할 트랙 결정
pub fn next_track(video_pts: Option<i64>, audio_pts: Option<i64>) -> Option<TrackKind> {
    match (video_pts, audio_pts) {
        (Some(v), Some(a)) if v <= a => Some(TrackKind::Video),
        (Some(_), Some(_)) => Some(TrackKind::Audio),
        (Some(_), None) => Some(TrackKind::Video),
        (None, Some(_)) => Some(TrackKind::Audio),
        (None, None) => None,
    }
}

/// 병합/복사 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterleaveStats {
    pub video_samples: usize,
    pub audio_samples: usize,
    /// 마지막으로 기록한 샘플의 PTS (μs)
    pub last_pts_us: Option<i64>,
}

impl InterleaveStats {
    fn record(&mut self, kind: TrackKind, pts_us: i64) {
        match kind {
            TrackKind::Video => self.video_samples += 1,
            TrackKind::Audio => self.audio_samples += 1,
        }
        self.last_pts_us = Some(pts_us);
    }
}

/// 비디오/오디오 소스를 하나의 sink로 시간순 병합
pub fn interleave<V, A, W>(
    video: &mut V,
    video_track: usize,
    audio: &mut A,
    audio_track: usize,
    sink: &mut W,
) -> Result<InterleaveStats>
where
    V: SampleReader,
    A: SampleReader,
    W: SampleSink,
{
    let mut stats = InterleaveStats::default();
    let mut pending_video: Option<Sample> = video.read_sample()?;
    let mut pending_audio: Option<Sample> = audio.read_sample()?;

    loop {
        let next = next_track(
            pending_video.as_ref().map(Sample::pts_us),
            pending_audio.as_ref().map(Sample::pts_us),
        );

        let (sample, track, kind) = match next {
            Some(TrackKind::Video) => match pending_video.take() {
                Some(sample) => {
                    pending_video = video.read_sample()?;
                    (sample, video_track, TrackKind::Video)
                }
                None => break,
            },
            Some(TrackKind::Audio) => match pending_audio.take() {
                Some(sample) => {
                    pending_audio = audio.read_sample()?;
                    (sample, audio_track, TrackKind::Audio)
                }
                None => break,
            },
            None => break,
        };

        crate::debug_log!("[MUXER] {} pts_us={}", kind.name(), sample.pts_us());
        stats.record(kind, sample.pts_us());
        sink.write_sample(track, sample)?;
    }

    Ok(stats)
}

/// 단일 트랙 복사 (소스 순서, 타임스탬프/플래그 그대로)
pub fn copy_track<R, W>(
    reader: &mut R,
    kind: TrackKind,
    track: usize,
    sink: &mut W,
) -> Result<InterleaveStats>
where
    R: SampleReader,
    W: SampleSink,
{
    let mut stats = InterleaveStats::default();
    while let Some(sample) = reader.read_sample()? {
        stats.record(kind, sample.pts_us());
        sink.write_sample(track, sample)?;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ffmpeg_next as ffmpeg;
    use ffmpeg::{packet, Packet, Rational};
    use std::collections::VecDeque;

    /// 메모리 샘플 소스
    struct MemoryReader {
        samples: VecDeque<Sample>,
        fail_after: Option<usize>,
        reads: usize,
    }

    impl MemoryReader {
        fn new(time_base: Rational, timestamps: &[i64]) -> Self {
            let samples = timestamps
                .iter()
                .enumerate()
                .map(|(i, &ts)| {
                    let mut packet = Packet::copy(&[i as u8; 8]);
                    packet.set_pts(Some(ts));
                    packet.set_dts(Some(ts));
                    if i == 0 {
                        packet.set_flags(packet::Flags::KEY);
                    }
                    Sample::new(packet, time_base)
                })
                .collect();
            Self {
                samples,
                fail_after: None,
                reads: 0,
            }
        }

        fn failing_after(mut self, reads: usize) -> Self {
            self.fail_after = Some(reads);
            self
        }
    }

    impl SampleReader for MemoryReader {
        fn read_sample(&mut self) -> Result<Option<Sample>> {
            if self.fail_after == Some(self.reads) {
                return Err(Error::ffmpeg("read sample")(ffmpeg::Error::InvalidData));
            }
            self.reads += 1;
            Ok(self.samples.pop_front())
        }
    }

    /// 기록 순서를 보관하는 sink
    #[derive(Default)]
    struct RecordingSink {
        written: Vec<(usize, i64, bool)>,
    }

    impl SampleSink for RecordingSink {
        fn write_sample(&mut self, track: usize, sample: Sample) -> Result<()> {
            self.written.push((track, sample.pts_us(), sample.is_key()));
            Ok(())
        }
    }

    #[test]
    fn test_next_track_rules() {
        assert_eq!(next_track(Some(0), Some(0)), Some(TrackKind::Video));
        assert_eq!(next_track(Some(10), Some(5)), Some(TrackKind::Audio));
        assert_eq!(next_track(Some(5), Some(10)), Some(TrackKind::Video));
        assert_eq!(next_track(None, Some(5)), Some(TrackKind::Audio));
        assert_eq!(next_track(Some(5), None), Some(TrackKind::Video));
        assert_eq!(next_track(None, None), None);
    }

    #[test]
    fn test_interleave_is_non_decreasing() {
        // 비디오 15fps (μs), 오디오 AAC 1024 샘플 @ 44.1kHz
        let video_ts: Vec<i64> = (0..10).map(|i| i * 66_666).collect();
        let audio_ts: Vec<i64> = (0..30).map(|i| i * 1024).collect();
        let mut video = MemoryReader::new(Rational(1, 1_000_000), &video_ts);
        let mut audio = MemoryReader::new(Rational(1, 44_100), &audio_ts);
        let mut sink = RecordingSink::default();

        let stats = interleave(&mut video, 0, &mut audio, 1, &mut sink).unwrap();

        assert_eq!(stats.video_samples, 10);
        assert_eq!(stats.audio_samples, 30);
        assert_eq!(sink.written.len(), 40);
        for pair in sink.written.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "{:?} > {:?}", pair[0], pair[1]);
        }
        // 마지막 샘플 = 두 스트림 끝 중 큰 쪽 (오디오 ≈ 673ms > 비디오 600ms)
        let last = sink.written.last().map(|w| w.1);
        assert_eq!(stats.last_pts_us, last);
        assert_eq!(sink.written.last().map(|w| w.0), Some(1));
        assert!(last.unwrap() > 9 * 66_666);
    }

    #[test]
    fn test_ties_favor_video_and_flags_pass_through() {
        let mut video = MemoryReader::new(Rational(1, 1000), &[0, 100]);
        let mut audio = MemoryReader::new(Rational(1, 1000), &[0, 100]);
        let mut sink = RecordingSink::default();

        interleave(&mut video, 0, &mut audio, 1, &mut sink).unwrap();

        let order: Vec<usize> = sink.written.iter().map(|w| w.0).collect();
        assert_eq!(order, vec![0, 1, 0, 1]);
        // 각 트랙 첫 샘플만 키프레임
        let keys: Vec<bool> = sink.written.iter().map(|w| w.2).collect();
        assert_eq!(keys, vec![true, true, false, false]);
    }

    #[test]
    fn test_one_side_exhausted_first() {
        let mut video = MemoryReader::new(Rational(1, 1000), &[0, 40, 80, 120, 160]);
        let mut audio = MemoryReader::new(Rational(1, 1000), &[10]);
        let mut sink = RecordingSink::default();

        let stats = interleave(&mut video, 0, &mut audio, 1, &mut sink).unwrap();
        assert_eq!(stats.video_samples, 5);
        assert_eq!(stats.audio_samples, 1);
        let ts: Vec<i64> = sink.written.iter().map(|w| w.1).collect();
        assert_eq!(ts, vec![0, 10_000, 40_000, 80_000, 120_000, 160_000]);
    }

    #[test]
    fn test_empty_sources() {
        let mut video = MemoryReader::new(Rational(1, 1000), &[]);
        let mut audio = MemoryReader::new(Rational(1, 1000), &[]);
        let mut sink = RecordingSink::default();

        let stats = interleave(&mut video, 0, &mut audio, 1, &mut sink).unwrap();
        assert_eq!(stats, InterleaveStats::default());
        assert!(sink.written.is_empty());
    }

    #[test]
    fn test_reader_error_is_propagated() {
        let mut video = MemoryReader::new(Rational(1, 1000), &[0, 40, 80]);
        let mut audio = MemoryReader::new(Rational(1, 1000), &[0, 40, 80]).failing_after(1);
        let mut sink = RecordingSink::default();

        let err = interleave(&mut video, 0, &mut audio, 1, &mut sink).unwrap_err();
        assert!(matches!(err, Error::Ffmpeg { stage: "read sample", .. }));
    }

    #[test]
    fn test_copy_track_preserves_source_order() {
        // 소스 순서 그대로 (재정렬하지 않음)
        let mut reader = MemoryReader::new(Rational(1, 1000), &[0, 20, 10, 30]);
        let mut sink = RecordingSink::default();

        let stats = copy_track(&mut reader, TrackKind::Audio, 3, &mut sink).unwrap();
        assert_eq!(stats.audio_samples, 4);
        assert_eq!(stats.video_samples, 0);
        let ts: Vec<i64> = sink.written.iter().map(|w| w.1).collect();
        assert_eq!(ts, vec![0, 20_000, 10_000, 30_000]);
        assert!(sink.written.iter().all(|w| w.0 == 3));
    }
}
