// 먹싱 모듈
// 비디오 전용 컨테이너 + 오디오 파일 → 시간순 병합된 최종 MP4

pub mod interleave;
pub mod muxer;

pub use interleave::{copy_track, interleave, next_track, InterleaveStats};
pub use muxer::{mux_video_with_audio, MuxReport};
