// 인코더 세션 - H.264 인코더 + 임시 MP4 writer 수명 관리
// 상태 머신: Unconfigured → Configured → Running → Draining → Stopped → Released
// NV21 입력 → (필요 시 인코더 포맷으로 재배열) → H.264 → 단일 비디오 트랙

use crate::config::{EncoderSettings, MAX_FPS};
use crate::error::{Error, Result};
use crate::ffmpeg::{ContainerWriter, Sample, SampleSink, TrackKind, MICROS};
use crate::frames::{nv21_len, Dimensions, FrameSource};
use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::{codec, Packet, Rational};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// 입력/출력 큐 폴링 간격 (대기 예산 안에서 반복)
const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconfigured,
    Configured,
    Running,
    Draining,
    Stopped,
    Released,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Unconfigured => "unconfigured",
            SessionState::Configured => "configured",
            SessionState::Running => "running",
            SessionState::Draining => "draining",
            SessionState::Stopped => "stopped",
            SessionState::Released => "released",
        }
    }

    /// 허용된 전이만 통과. 해제는 어느 상태에서든 가능 (이미 해제된 경우 제외)
    pub fn transition(self, to: SessionState) -> Result<SessionState> {
        use SessionState::*;
        let allowed = matches!(
            (self, to),
            (Unconfigured, Configured)
                | (Configured, Running)
                | (Running, Draining)
                | (Draining, Stopped)
                | (Unconfigured | Configured | Running | Draining | Stopped, Released)
        );
        if allowed {
            Ok(to)
        } else {
            Err(Error::InvalidState {
                from: self.name(),
                to: to.name(),
            })
        }
    }
}

/// 프레임 제출 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    /// 대기 예산 안에 입력 슬롯을 얻지 못함
    Skipped,
}

/// 세션 통계 (로그/진단용)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// 인코더에 제출된 프레임
    pub submitted: usize,
    /// 입력 슬롯 부족으로 건너뛴 프레임
    pub skipped: usize,
    /// 디코딩 실패로 입력 없이 지나간 프레임
    pub dropped: usize,
    /// 컨테이너에 기록된 샘플
    pub written: usize,
    /// 인코더가 EOS를 돌려줬는지
    pub reached_eos: bool,
}

/// 인코더가 받아들이는 4:2:0 레이아웃 중 하나 선택 (NV21 우선)
fn negotiate_format(codec: &ffmpeg::Codec) -> Pixel {
    let supported: Vec<Pixel> = codec
        .video()
        .ok()
        .and_then(|video| video.formats().map(|formats| formats.collect()))
        .unwrap_or_default();

    [Pixel::NV21, Pixel::NV12, Pixel::YUV420P]
        .into_iter()
        .find(|format| supported.contains(format))
        .unwrap_or(Pixel::YUV420P)
}

fn is_again(error: &ffmpeg::Error) -> bool {
    matches!(error, ffmpeg::Error::Other { errno } if *errno == libc::EAGAIN)
}

/// H.264 인코더 세션 (인코더/writer/스케일러 핸들을 단독 소유)
pub struct EncoderSession {
    state: SessionState,
    codec: ffmpeg::Codec,
    /// 설정만 된 인코더 (start() 전)
    pending: Option<codec::encoder::video::Video>,
    /// 열린 인코더
    encoder: Option<ffmpeg::encoder::Video>,
    writer: Option<ContainerWriter>,
    /// 첫 출력에서 등록되는 트랙
    track: Option<usize>,
    /// NV21 → 인코더 포맷 (인코더가 NV21을 직접 받으면 None)
    converter: Option<scaling::Context>,
    dimensions: Dimensions,
    frame_duration_us: i64,
    settings: EncoderSettings,
    stats: SessionStats,
    output_path: PathBuf,
}

impl EncoderSession {
    /// Unconfigured → Configured: 인코더 + 컨테이너 writer 생성 (아직 시작하지 않음)
    pub fn configure(
        output_path: &Path,
        dimensions: Dimensions,
        fps: u32,
        settings: EncoderSettings,
    ) -> Result<Self> {
        if fps == 0 || fps > MAX_FPS {
            return Err(Error::InvalidArguments(format!(
                "fps must be in 1..={}, got {}",
                MAX_FPS, fps
            )));
        }
        if dimensions.width % 2 != 0 || dimensions.height % 2 != 0 {
            return Err(Error::InvalidArguments(format!(
                "4:2:0 encoding requires even dimensions, got {}",
                dimensions
            )));
        }
        crate::ffmpeg::init()?;

        let codec = ffmpeg::encoder::find(codec::Id::H264).ok_or(Error::EncoderNotFound)?;
        let input_format = negotiate_format(&codec);

        let writer = ContainerWriter::create(output_path)?;

        let mut video = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(Error::ffmpeg("create encoder context"))?;

        video.set_width(dimensions.width);
        video.set_height(dimensions.height);
        video.set_format(input_format);
        video.set_time_base(MICROS);
        video.set_frame_rate(Some(Rational::new(fps as i32, 1)));
        video.set_bit_rate(settings.bit_rate);
        video.set_gop(fps * settings.i_frame_interval_secs);
        video.set_max_b_frames(settings.max_b_frames);

        // 글로벌 헤더 플래그 (MP4 컨테이너 호환)
        if writer.needs_global_header() {
            unsafe {
                (*video.as_mut_ptr()).flags |= codec::flag::Flags::GLOBAL_HEADER.bits() as i32;
            }
        }

        let converter = if input_format == Pixel::NV21 {
            None
        } else {
            Some(
                scaling::Context::get(
                    Pixel::NV21,
                    dimensions.width,
                    dimensions.height,
                    input_format,
                    dimensions.width,
                    dimensions.height,
                    scaling::Flags::BILINEAR,
                )
                .map_err(Error::ffmpeg("create converter"))?,
            )
        };

        log::info!(
            "[ENCODER] 설정: {} {} @ {}fps, {}bps, 입력 포맷 {:?}",
            codec.name(),
            dimensions,
            fps,
            settings.bit_rate,
            input_format
        );

        let state = SessionState::Unconfigured.transition(SessionState::Configured)?;
        Ok(Self {
            state,
            codec,
            pending: Some(video),
            encoder: None,
            writer: Some(writer),
            track: None,
            converter,
            dimensions,
            frame_duration_us: 1_000_000 / fps as i64,
            settings,
            stats: SessionStats::default(),
            output_path: output_path.to_path_buf(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// 프레임 i의 프레젠테이션 타임스탬프 (μs)
    pub fn pts_for(&self, index: usize) -> i64 {
        index as i64 * self.frame_duration_us
    }

    /// Configured → Running: 인코더 열기. writer 트랙은 첫 출력에서 등록
    pub fn start(&mut self) -> Result<()> {
        self.state = self.state.transition(SessionState::Running)?;
        let pending = self.pending.take().ok_or(Error::InvalidState {
            from: self.state.name(),
            to: "open encoder",
        })?;

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("preset", self.settings.preset);
        let encoder = pending.open_with(opts).map_err(Error::ffmpeg("open encoder"))?;
        self.encoder = Some(encoder);
        Ok(())
    }

    /// 변환된 NV21 버퍼를 프레임 i의 PTS로 제출 후, 나온 출력을 논블로킹으로 모두 기록
    pub fn submit_frame(&mut self, index: usize, nv21: &[u8]) -> Result<SubmitOutcome> {
        self.expect_state(SessionState::Running, "submit frame")?;

        let expected = nv21_len(self.dimensions.width, self.dimensions.height);
        if nv21.len() != expected {
            return Err(Error::InvalidArguments(format!(
                "Invalid frame data size: got {}, expected {} ({})",
                nv21.len(),
                expected,
                self.dimensions
            )));
        }

        let frame = self.build_frame(nv21, self.pts_for(index))?;
        let deadline = Instant::now() + self.settings.input_timeout;

        let outcome = loop {
            let sent = self.encoder_mut()?.send_frame(&frame);
            match sent {
                Ok(()) => break SubmitOutcome::Submitted,
                Err(e) if is_again(&e) => {
                    // 입력 슬롯 없음: 출력부터 비우고 예산 안에서 재시도
                    self.drain_available()?;
                    if Instant::now() >= deadline {
                        break SubmitOutcome::Skipped;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(Error::ffmpeg("submit frame")(e)),
            }
        };

        match outcome {
            SubmitOutcome::Submitted => self.stats.submitted += 1,
            SubmitOutcome::Skipped => {
                self.stats.skipped += 1;
                log::warn!("[ENCODER] 입력 슬롯 대기 초과, 프레임 {} 건너뜀", index);
            }
        }

        self.drain_available()?;
        Ok(outcome)
    }

    /// 입력을 만들 수 없는 프레임: 제출 없이 지나가고 PTS 스케줄은 유지
    pub fn skip_frame(&mut self, index: usize) -> Result<()> {
        self.expect_state(SessionState::Running, "skip frame")?;
        self.stats.dropped += 1;
        log::warn!(
            "[ENCODER] 프레임 {} 입력 없음 (pts={}us 비워둠)",
            index,
            self.pts_for(index)
        );
        self.drain_available()
    }

    /// Running → Draining → Stopped: EOS 제출, 남은 출력 기록, writer 마무리 후 해제
    /// 샘플이 하나도 기록되지 않았으면 (헤더 없는 컨테이너) 에러
    pub fn finish(&mut self) -> Result<SessionStats> {
        self.state = self.state.transition(SessionState::Draining)?;
        self.signal_end_of_stream()?;
        self.drain_until_eos()?;

        self.state = self.state.transition(SessionState::Stopped)?;
        if let Some(writer) = self.writer.as_mut() {
            // 트랙이 시작되지 않았다면 stop()은 아무것도 하지 않음
            writer.stop()?;
        }
        self.release()?;

        if self.track.is_none() || self.stats.written == 0 {
            log::error!(
                "[ENCODER] 출력 샘플 없음: 제출 {}, 스킵 {}, 누락 {} ({})",
                self.stats.submitted,
                self.stats.skipped,
                self.stats.dropped,
                self.output_path.display()
            );
            return Err(Error::MissingTrack("video"));
        }

        log::info!(
            "[ENCODER] 완료: 제출 {}, 스킵 {}, 누락 {}, 기록 {} ({})",
            self.stats.submitted,
            self.stats.skipped,
            self.stats.dropped,
            self.stats.written,
            self.output_path.display()
        );
        Ok(self.stats)
    }

    /// 모든 핸들 해제 (멱등, 모든 종료 경로에서 호출)
    pub fn release(&mut self) -> Result<()> {
        if self.state == SessionState::Released {
            return Ok(());
        }
        self.state = self.state.transition(SessionState::Released)?;

        let result = match self.writer.take() {
            Some(mut writer) => writer.release(),
            None => Ok(()),
        };
        self.encoder = None;
        self.pending = None;
        self.converter = None;
        result
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                from: self.state.name(),
                to: action,
            });
        }
        Ok(())
    }

    fn encoder_mut(&mut self) -> Result<&mut ffmpeg::encoder::Video> {
        let from = self.state.name();
        self.encoder.as_mut().ok_or(Error::InvalidState {
            from,
            to: "use encoder",
        })
    }

    /// NV21 버퍼 → 인코더 입력 프레임 (stride 고려해 행 단위 복사)
    fn build_frame(&mut self, nv21: &[u8], pts: i64) -> Result<ffmpeg::frame::Video> {
        let width = self.dimensions.width as usize;
        let height = self.dimensions.height as usize;
        let (luma, chroma) = nv21.split_at(width * height);

        let mut src = ffmpeg::frame::Video::new(
            Pixel::NV21,
            self.dimensions.width,
            self.dimensions.height,
        );
        copy_plane(&mut src, 0, luma, width, height);
        copy_plane(&mut src, 1, chroma, width, height / 2);

        let mut frame = match self.converter.as_mut() {
            Some(converter) => {
                let mut converted = ffmpeg::frame::Video::empty();
                converter
                    .run(&src, &mut converted)
                    .map_err(Error::ffmpeg("convert frame"))?;
                converted
            }
            None => src,
        };
        frame.set_pts(Some(pts));
        Ok(frame)
    }

    /// 현재 나와 있는 출력만 논블로킹으로 기록
    fn drain_available(&mut self) -> Result<()> {
        loop {
            let mut packet = Packet::empty();
            let received = self.encoder_mut()?.receive_packet(&mut packet);
            match received {
                Ok(()) => self.write_output(packet)?,
                Err(ffmpeg::Error::Eof) => return Ok(()),
                Err(e) if is_again(&e) => return Ok(()),
                Err(e) => return Err(Error::ffmpeg("drain output")(e)),
            }
        }
    }

    fn signal_end_of_stream(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.settings.input_timeout;
        loop {
            let sent = self.encoder_mut()?.send_eof();
            match sent {
                Ok(()) | Err(ffmpeg::Error::Eof) => return Ok(()),
                Err(e) if is_again(&e) && Instant::now() < deadline => {
                    self.drain_available()?;
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(Error::ffmpeg("signal end of stream")(e)),
            }
        }
    }

    /// EOS 이후: EOS가 오거나 대기 예산 동안 출력이 없을 때까지 기록
    fn drain_until_eos(&mut self) -> Result<()> {
        let mut last_output = Instant::now();
        loop {
            let mut packet = Packet::empty();
            let received = self.encoder_mut()?.receive_packet(&mut packet);
            match received {
                Ok(()) => {
                    self.write_output(packet)?;
                    last_output = Instant::now();
                }
                Err(ffmpeg::Error::Eof) => {
                    self.stats.reached_eos = true;
                    return Ok(());
                }
                Err(e) if is_again(&e) => {
                    if last_output.elapsed() >= self.settings.drain_timeout {
                        log::warn!("[ENCODER] EOS 없이 드레인 종료 (출력 대기 초과)");
                        return Ok(());
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(Error::ffmpeg("drain output")(e)),
            }
        }
    }

    /// 인코더 출력 1개 기록. 첫 출력 = 포맷 확정 시점 → 트랙 등록 + writer 시작
    fn write_output(&mut self, mut packet: Packet) -> Result<()> {
        let track = match self.track {
            Some(track) => track,
            None => {
                let (Some(encoder), Some(writer)) = (self.encoder.as_ref(), self.writer.as_mut())
                else {
                    return Err(Error::InvalidState {
                        from: self.state.name(),
                        to: "register track",
                    });
                };
                let track =
                    writer.add_encoder_track(TrackKind::Video, self.codec, encoder, MICROS)?;
                writer.start()?;
                log::info!("[ENCODER] 출력 포맷 확정 → 트랙 {} 등록, writer 시작", track);
                self.track = Some(track);
                track
            }
        };

        if packet.duration() == 0 {
            packet.set_duration(self.frame_duration_us);
        }

        let writer = self.writer.as_mut().ok_or(Error::InvalidState {
            from: self.state.name(),
            to: "write sample",
        })?;
        writer.write_sample(track, Sample::new(packet, MICROS))?;
        self.stats.written += 1;
        Ok(())
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("[ENCODER] 해제 중 에러: {}", e);
        }
    }
}

/// 행 단위 평면 복사 (프레임 stride ≥ 행 길이)
fn copy_plane(
    frame: &mut ffmpeg::frame::Video,
    plane: usize,
    src: &[u8],
    row_len: usize,
    rows: usize,
) {
    let stride = frame.stride(plane);
    let dst = frame.data_mut(plane);
    for row in 0..rows {
        let src_offset = row * row_len;
        let dst_offset = row * stride;
        dst[dst_offset..dst_offset + row_len]
            .copy_from_slice(&src[src_offset..src_offset + row_len]);
    }
}

/// 프레임 목록 전체를 임시 컨테이너로 인코딩 (빈 목록은 인코더 생성 전에 거부)
pub fn encode_frames(
    frame_paths: &[PathBuf],
    source: &FrameSource,
    output_path: &Path,
    fps: u32,
    settings: EncoderSettings,
) -> Result<SessionStats> {
    if frame_paths.is_empty() {
        return Err(Error::NoFrames);
    }

    let mut session = EncoderSession::configure(output_path, source.target(), fps, settings)?;
    session.start()?;

    for (index, path) in frame_paths.iter().enumerate() {
        match source.load_nv21(path) {
            Ok(nv21) => {
                session.submit_frame(index, &nv21)?;
            }
            Err(e) => {
                log::warn!("[FRAMES] 프레임 {} 디코딩 실패: {}", index, e);
                session.skip_frame(index)?;
            }
        }
    }

    session.finish()
}
