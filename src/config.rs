// 설정 - 호스트 요청 인자 + 인코더 튜닝 상수
// 요청은 호스트 앱이 보내는 인자 맵(JSON)을 그대로 역직렬화

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// fps 미지정 시 기본값
pub const DEFAULT_FPS: u32 = 15;
/// duration 미지정 시 기본값 (초, 정보용)
pub const DEFAULT_DURATION_SECS: u32 = 5;
/// fps 상한 (프레임 간격이 1μs 단위로 표현 가능한 범위 안)
pub const MAX_FPS: u32 = 1_000;

/// 인코딩 요청 (호스트 → 엔진, 요청 하나당 응답 하나)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeRequest {
    /// 프레임 이미지 경로 (호출자 순서 그대로, 재정렬하지 않음)
    #[serde(default)]
    pub frame_paths: Option<Vec<PathBuf>>,
    /// 최종 MP4 출력 경로
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// 오디오 파일 (없으면 무음 비디오)
    #[serde(default)]
    pub audio_path: Option<PathBuf>,
    /// 미지정/null이면 DEFAULT_FPS
    #[serde(default)]
    pub fps: Option<u32>,
    /// 정보용 길이 힌트 (파이프라인 동작에는 영향 없음), 미지정/null이면 DEFAULT_DURATION_SECS
    #[serde(default)]
    pub duration: Option<u32>,
    /// 임시 비디오 컨테이너 생성 위치 (기본: 시스템 임시 디렉토리)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

/// 검증을 통과한 요청
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub frame_paths: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub audio_path: Option<PathBuf>,
    pub fps: u32,
    pub duration: u32,
    pub temp_dir: PathBuf,
}

impl EncodeRequest {
    pub fn new(frame_paths: Vec<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            frame_paths: Some(frame_paths),
            output_path: Some(output_path.into()),
            audio_path: None,
            fps: None,
            duration: None,
            temp_dir: None,
        }
    }

    pub fn with_audio(mut self, audio_path: impl Into<PathBuf>) -> Self {
        self.audio_path = Some(audio_path.into());
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    /// JSON 인자 맵 파싱 (파싱 실패 = INVALID_ARGS)
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidArguments(e.to_string()))
    }

    /// 필수 인자 확인 - 실패 시 어떤 리소스도 할당하지 않음
    pub fn validate(self) -> Result<ValidatedRequest> {
        let frame_paths = self
            .frame_paths
            .ok_or_else(|| Error::InvalidArguments("missing framePaths".to_string()))?;
        let output_path = self
            .output_path
            .ok_or_else(|| Error::InvalidArguments("missing outputPath".to_string()))?;

        if frame_paths.is_empty() {
            return Err(Error::NoFrames);
        }
        let fps = self.fps.unwrap_or(DEFAULT_FPS);
        if fps == 0 || fps > MAX_FPS {
            return Err(Error::InvalidArguments(format!(
                "fps must be in 1..={}, got {}",
                MAX_FPS, fps
            )));
        }

        Ok(ValidatedRequest {
            frame_paths,
            output_path,
            audio_path: self.audio_path,
            fps,
            duration: self.duration.unwrap_or(DEFAULT_DURATION_SECS),
            temp_dir: self.temp_dir.unwrap_or_else(std::env::temp_dir),
        })
    }
}

/// 인코더 세션 튜닝 값
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    /// 고정 비트레이트 (bits/sec)
    pub bit_rate: usize,
    /// I-프레임 간격 (초)
    pub i_frame_interval_secs: u32,
    /// 입력 슬롯 대기 예산
    pub input_timeout: Duration,
    /// 출력 드레인 대기 예산 (EOS 이후)
    pub drain_timeout: Duration,
    /// 0이면 출력 순서 = 제출 순서 (PTS 단조 증가)
    pub max_b_frames: usize,
    /// x264 계열 preset (지원하지 않는 인코더는 무시)
    pub preset: &'static str,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            bit_rate: 2_000_000,
            i_frame_interval_secs: 1,
            input_timeout: Duration::from_millis(10),
            drain_timeout: Duration::from_millis(10),
            max_b_frames: 0,
            preset: "medium",
        }
    }
}
