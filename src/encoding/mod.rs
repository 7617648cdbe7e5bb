// 인코딩 & 내보내기 모듈
// 정지 이미지 시퀀스 → H.264 비디오 → (오디오 병합) → MP4

pub mod exporter;
pub mod session;

pub use exporter::{create_video, run_request, EncodeJob, EncodeResponse, ExportOutcome};
pub use session::{encode_frames, EncoderSession, SessionState, SessionStats, SubmitOutcome};
