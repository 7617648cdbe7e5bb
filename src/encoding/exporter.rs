// 내보내기 작업 관리 - 전용 워커 스레드, 요청 1개당 응답 1개
// 흐름: 해상도 탐색 → 임시 비디오 인코딩 → (오디오 먹싱 | 이름 변경) → 임시 파일 정리

use crate::config::{EncodeRequest, EncoderSettings, ValidatedRequest};
use crate::encoding::session::encode_frames;
use crate::error::{ErrorCategory, Result};
use crate::ffmpeg::ContainerSummary;
use crate::frames::FrameSource;
use crate::muxing::mux_video_with_audio;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tempfile::TempPath;

/// 최종 출력 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// 오디오 요청 없음
    VideoOnly,
    /// 오디오 병합 성공
    WithAudio,
    /// 오디오 먹싱 실패 또는 오디오 트랙 없음 → 비디오만
    AudioDropped,
}

/// 호스트로 돌려주는 응답 (작업당 정확히 한 번)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeResponse {
    Success(bool),
    Failure {
        category: ErrorCategory,
        message: String,
    },
}

impl EncodeResponse {
    pub fn from_result(result: Result<ExportOutcome>) -> Self {
        match result {
            Ok(_) => EncodeResponse::Success(true),
            Err(e) => EncodeResponse::Failure {
                category: e.category(),
                message: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EncodeResponse::Success(true))
    }
}

/// 임시 컨테이너를 최종 경로로 이동 (다른 파일시스템이면 복사 후 삭제)
fn deliver(temp: TempPath, output_path: &Path) -> Result<()> {
    match temp.persist(output_path) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!("[EXPORT] rename 실패 ({}), 복사로 대체", e.error);
            std::fs::copy(&e.path, output_path)?;
            // e.path(TempPath) drop 시 임시 파일 삭제
            Ok(())
        }
    }
}

/// 검증된 요청 실행 (워커 스레드에서 호출)
pub fn create_video(
    request: &ValidatedRequest,
    settings: EncoderSettings,
) -> Result<ExportOutcome> {
    log::info!(
        "[EXPORT] 시작: 프레임 {}개, fps={}, duration={}s, audio={}",
        request.frame_paths.len(),
        request.fps,
        request.duration,
        request.audio_path.is_some()
    );

    // 해상도 탐색용 디코딩 (이미지는 바로 버림)
    let native = FrameSource::probe_dimensions(&request.frame_paths)?;
    let dimensions = native.to_even();
    if dimensions != native {
        log::warn!("[EXPORT] 해상도 {} → {} (4:2:0 짝수 정렬)", native, dimensions);
    }
    log::info!("[EXPORT] 비디오 해상도: {}", dimensions);

    let source = FrameSource::new(dimensions);
    let temp = tempfile::Builder::new()
        .prefix("temp_video_")
        .suffix(".mp4")
        .tempfile_in(&request.temp_dir)?
        .into_temp_path();

    let stats = encode_frames(&request.frame_paths, &source, &temp, request.fps, settings)
        .map_err(|e| {
            log::error!(
                "[EXPORT] 비디오 인코딩 실패 (프레임 {}개, {} @ {}fps): {}",
                request.frame_paths.len(),
                dimensions,
                request.fps,
                e
            );
            e
        })?;
    if stats.dropped > 0 || stats.skipped > 0 {
        log::warn!(
            "[EXPORT] 입력 없이 지나간 프레임: 디코딩 실패 {}, 슬롯 대기 초과 {}",
            stats.dropped,
            stats.skipped
        );
    }

    let outcome = match &request.audio_path {
        None => {
            deliver(temp, &request.output_path)?;
            ExportOutcome::VideoOnly
        }
        Some(audio_path) => match mux_video_with_audio(&temp, audio_path, &request.output_path) {
            Ok(report) => {
                if let Err(e) = temp.close() {
                    log::warn!("[EXPORT] 임시 파일 삭제 실패: {}", e);
                }
                if report.has_audio {
                    ExportOutcome::WithAudio
                } else {
                    ExportOutcome::AudioDropped
                }
            }
            Err(e) => {
                log::warn!(
                    "[EXPORT] 오디오 먹싱 실패 ({}), 비디오만 출력: {}",
                    audio_path.display(),
                    e
                );
                // 먹서가 남긴 불완전 출력 제거 후 임시 비디오로 대체
                match std::fs::remove_file(&request.output_path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
                deliver(temp, &request.output_path)?;
                ExportOutcome::AudioDropped
            }
        },
    };

    match ContainerSummary::probe(&request.output_path) {
        Ok(summary) => log::info!(
            "[EXPORT] 완료: {} (비디오 샘플 {}, 오디오 샘플 {}, 길이 {}ms, {:?})",
            request.output_path.display(),
            summary.video_samples,
            summary.audio_samples,
            summary.end_us / 1000,
            outcome
        ),
        Err(e) => log::warn!("[EXPORT] 출력 요약 실패: {}", e),
    }

    Ok(outcome)
}

/// 요청 검증 + 실행 → 응답
pub fn run_request(request: EncodeRequest) -> EncodeResponse {
    let result = request
        .validate()
        .and_then(|valid| create_video(&valid, EncoderSettings::default()));
    if let Err(e) = &result {
        log::error!("[EXPORT] 에러: {}", e);
    }
    EncodeResponse::from_result(result)
}

/// 인코딩 작업 핸들 (호스트는 폴링 또는 대기로 응답 확인)
pub struct EncodeJob {
    /// 완료 플래그
    finished: Arc<AtomicBool>,
    /// 응답 (take_response로 한 번만 꺼냄)
    response: Arc<Mutex<Option<EncodeResponse>>>,
    handle: Option<JoinHandle<()>>,
}

impl EncodeJob {
    /// 작업 시작 (전용 워커 스레드)
    pub fn start(request: EncodeRequest) -> Self {
        let finished = Arc::new(AtomicBool::new(false));
        let response: Arc<Mutex<Option<EncodeResponse>>> = Arc::new(Mutex::new(None));

        let f = finished.clone();
        let r = response.clone();
        let spawned = Self::spawn_worker(request, move |result| {
            if let Ok(mut slot) = r.lock() {
                *slot = Some(result);
            }
            f.store(true, Ordering::SeqCst);
        });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("[EXPORT] 워커 스레드 생성 실패: {}", e);
                if let Ok(mut slot) = response.lock() {
                    *slot = Some(EncodeResponse::Failure {
                        category: ErrorCategory::EncodingError,
                        message: e.to_string(),
                    });
                }
                finished.store(true, Ordering::SeqCst);
                None
            }
        };

        Self {
            finished,
            response,
            handle,
        }
    }

    /// 콜백 방식: 완료 시 워커 스레드에서 on_complete가 정확히 한 번 호출됨
    pub fn start_with_callback<F>(
        request: EncodeRequest,
        on_complete: F,
    ) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce(EncodeResponse) + Send + 'static,
    {
        Self::spawn_worker(request, on_complete)
    }

    fn spawn_worker<F>(request: EncodeRequest, on_complete: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce(EncodeResponse) + Send + 'static,
    {
        thread::Builder::new()
            .name("video-encoder".to_string())
            .spawn(move || on_complete(run_request(request)))
    }

    /// 완료 여부
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// 응답 꺼내기 (완료 후 첫 호출에서만 Some)
    pub fn take_response(&self) -> Option<EncodeResponse> {
        if !self.is_finished() {
            return None;
        }
        self.response.lock().ok().and_then(|mut slot| slot.take())
    }

    /// 완료까지 대기 후 응답 반환
    pub fn wait(mut self) -> Option<EncodeResponse> {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[EXPORT] 워커 스레드 패닉");
                return Some(EncodeResponse::Failure {
                    category: ErrorCategory::EncodingError,
                    message: "encoder worker panicked".to_string(),
                });
            }
        }
        self.take_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_response_from_result() {
        assert_eq!(
            EncodeResponse::from_result(Ok(ExportOutcome::AudioDropped)),
            EncodeResponse::Success(true)
        );
        let failure = EncodeResponse::from_result(Err(Error::NoFrames));
        assert_eq!(
            failure,
            EncodeResponse::Failure {
                category: ErrorCategory::InvalidArguments,
                message: "no frames".to_string(),
            }
        );
        assert!(!failure.is_success());
    }

    #[test]
    fn test_empty_frames_rejected_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");

        let response = run_request(EncodeRequest::new(vec![], &output).with_temp_dir(dir.path()));

        assert!(matches!(
            response,
            EncodeResponse::Failure {
                category: ErrorCategory::InvalidArguments,
                ..
            }
        ));
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_undecodable_frames_are_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame.png");
        std::fs::write(&frame, b"garbage").unwrap();
        let output = dir.path().join("out.mp4");

        let request = EncodeRequest::new(vec![frame], &output).with_temp_dir(dir.path());
        let response = run_request(request);

        match response {
            EncodeResponse::Failure { category, .. } => {
                assert_eq!(category, ErrorCategory::EncodingError)
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_job_delivers_exactly_one_response() {
        let job = EncodeJob::start(EncodeRequest::new(vec![], "/tmp/never.mp4"));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !job.is_finished() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let first = job.take_response();
        assert!(matches!(first, Some(EncodeResponse::Failure { .. })));
        assert!(job.take_response().is_none());
    }

    #[test]
    fn test_callback_is_invoked_once() {
        let (tx, rx) = mpsc::channel();
        let handle = EncodeJob::start_with_callback(
            EncodeRequest::new(vec![PathBuf::from("a.png")], "/tmp/x.mp4").with_fps(0),
            move |response| tx.send(response).unwrap(),
        )
        .unwrap();
        handle.join().unwrap();

        let response = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            response,
            EncodeResponse::Failure {
                category: ErrorCategory::InvalidArguments,
                ..
            }
        ));
        assert!(rx.try_recv().is_err());
    }
}
