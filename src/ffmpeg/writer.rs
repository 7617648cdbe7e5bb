// 컨테이너 writer - MP4 출력 컨텍스트 RAII 래퍼
// 트랙 등록은 start() 이전에만 가능, release()는 멱등이며 시작된 writer는 해제 시 trailer까지 기록

use crate::error::{Error, Result};
use crate::ffmpeg::sample::{Sample, SampleSink, TrackKind};
use ffmpeg_next as ffmpeg;
use ffmpeg::{codec, format, Rational};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// 트랙 등록 가능
    Configured,
    /// 헤더 기록 완료, 샘플 기록 가능
    Started,
    /// trailer 기록 완료
    Stopped,
    Released,
}

impl WriterState {
    fn name(self) -> &'static str {
        match self {
            WriterState::Configured => "configured",
            WriterState::Started => "started",
            WriterState::Stopped => "stopped",
            WriterState::Released => "released",
        }
    }
}

/// MP4 컨테이너 writer (출력 컨텍스트 핸들 1개를 단독 소유)
pub struct ContainerWriter {
    output: Option<format::context::Output>,
    path: PathBuf,
    tracks: Vec<TrackKind>,
    state: WriterState,
}

impl ContainerWriter {
    /// 출력 파일 생성 (확장자와 무관하게 MP4)
    pub fn create(path: &Path) -> Result<Self> {
        crate::ffmpeg::init()?;
        let output = format::output_as(&path, "mp4").map_err(Error::ffmpeg("create output"))?;

        Ok(Self {
            output: Some(output),
            path: path.to_path_buf(),
            tracks: Vec::new(),
            state: WriterState::Configured,
        })
    }

    pub fn is_started(&self) -> bool {
        self.state == WriterState::Started
    }

    /// 인코더가 extradata를 글로벌 헤더로 내보내야 하는지 (MP4 = true)
    pub fn needs_global_header(&self) -> bool {
        self.output
            .as_ref()
            .map(|o| o.format().flags().contains(format::flag::Flags::GLOBAL_HEADER))
            .unwrap_or(false)
    }

    /// 열린 인코더의 출력 포맷으로 트랙 등록
    pub fn add_encoder_track(
        &mut self,
        kind: TrackKind,
        codec: ffmpeg::Codec,
        encoder: &ffmpeg::encoder::Video,
        time_base: Rational,
    ) -> Result<usize> {
        let output = self.configurable_output("add track")?;
        let mut stream = output.add_stream(codec).map_err(Error::ffmpeg("add stream"))?;
        stream.set_time_base(time_base);
        stream.set_parameters(encoder);
        let index = stream.index();

        self.tracks.push(kind);
        log::debug!("[WRITER] {} 트랙 {} 등록 ({})", kind.name(), index, self.path.display());
        Ok(index)
    }

    /// 소스 컨테이너 트랙 포맷을 그대로 복사해 등록 (재인코딩 없음)
    pub fn add_copy_track(
        &mut self,
        kind: TrackKind,
        parameters: codec::Parameters,
        time_base: Rational,
    ) -> Result<usize> {
        let output = self.configurable_output("add track")?;
        let mut stream = output
            .add_stream(ffmpeg::encoder::find(codec::Id::None))
            .map_err(Error::ffmpeg("add stream"))?;
        stream.set_parameters(parameters);
        stream.set_time_base(time_base);
        // 소스 컨테이너의 codec tag는 MP4와 맞지 않을 수 있음 → 먹서가 다시 고르게 함
        unsafe {
            (*stream.parameters().as_mut_ptr()).codec_tag = 0;
        }
        let index = stream.index();

        self.tracks.push(kind);
        log::debug!("[WRITER] {} 복사 트랙 {} 등록 ({})", kind.name(), index, self.path.display());
        Ok(index)
    }

    /// 헤더 기록 (이후 트랙 추가 불가)
    pub fn start(&mut self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(Error::MissingTrack("output"));
        }
        let output = self.configurable_output("start")?;
        output.write_header().map_err(Error::ffmpeg("write header"))?;
        self.state = WriterState::Started;
        Ok(())
    }

    /// trailer 기록. 시작되지 않은 writer에는 아무것도 하지 않음
    pub fn stop(&mut self) -> Result<()> {
        if self.state != WriterState::Started {
            return Ok(());
        }
        // 실패해도 다시 trailer를 시도하지 않도록 먼저 상태 변경
        self.state = WriterState::Stopped;
        if let Some(output) = self.output.as_mut() {
            output.write_trailer().map_err(Error::ffmpeg("write trailer"))?;
        }
        Ok(())
    }

    /// 핸들 해제 (멱등). 시작된 상태라면 먼저 마무리
    pub fn release(&mut self) -> Result<()> {
        if self.state == WriterState::Released {
            return Ok(());
        }
        let result = self.stop();
        self.output = None;
        self.state = WriterState::Released;
        result
    }

    fn configurable_output(
        &mut self,
        action: &'static str,
    ) -> Result<&mut format::context::Output> {
        if self.state != WriterState::Configured {
            return Err(Error::InvalidState {
                from: self.state.name(),
                to: action,
            });
        }
        self.output.as_mut().ok_or(Error::InvalidState {
            from: WriterState::Released.name(),
            to: action,
        })
    }
}

impl SampleSink for ContainerWriter {
    fn write_sample(&mut self, track: usize, sample: Sample) -> Result<()> {
        if self.state != WriterState::Started {
            return Err(Error::InvalidState {
                from: self.state.name(),
                to: "write sample",
            });
        }
        let output = self.output.as_mut().ok_or(Error::InvalidState {
            from: WriterState::Released.name(),
            to: "write sample",
        })?;
        let stream_time_base = output
            .stream(track)
            .ok_or(Error::MissingTrack("output"))?
            .time_base();

        crate::debug_log!(
            "[WRITER] track={} pts_us={} size={} key={}",
            track,
            sample.pts_us(),
            sample.size(),
            sample.is_key()
        );

        let Sample { mut packet, time_base } = sample;
        packet.set_stream(track);
        packet.rescale_ts(time_base, stream_time_base);
        packet.set_position(-1);
        packet.write(output).map_err(Error::ffmpeg("write sample"))?;
        Ok(())
    }
}

impl Drop for ContainerWriter {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("[WRITER] 해제 중 에러 ({}): {}", self.path.display(), e);
        }
    }
}
