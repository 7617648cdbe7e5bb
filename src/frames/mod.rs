// 프레임 모듈
// 이미지 파일 → 목표 해상도 RGBA → NV21 인코더 입력

pub mod source;
pub mod yuv;

pub use source::{Dimensions, FrameSource};
pub use yuv::{nv21_len, rgba_to_nv21};
