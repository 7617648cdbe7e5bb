// 프레임 소스 - 프레임 이미지 디코딩 + 목표 해상도 정규화
// 디코딩 원본/리사이즈 중간 버퍼는 프레임마다 즉시 해제 (다음 프레임으로 넘기지 않음)

use crate::error::{Error, Result};
use crate::frames::yuv::rgba_to_nv21;
use image::imageops::FilterType;
use image::RgbaImage;
use std::path::{Path, PathBuf};

/// 실행 전체에서 고정되는 출력 해상도 (width, height > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidArguments(format!(
                "frame dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    /// 4:2:0 인코더용 짝수 해상도로 내림 (최소 2)
    pub fn to_even(self) -> Self {
        Self {
            width: (self.width & !1).max(2),
            height: (self.height & !1).max(2),
        }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 프레임 이미지 → 목표 해상도 RGBA → NV21
pub struct FrameSource {
    target: Dimensions,
    filter: FilterType,
}

impl FrameSource {
    pub fn new(target: Dimensions) -> Self {
        Self {
            target,
            filter: FilterType::Lanczos3,
        }
    }

    pub fn target(&self) -> Dimensions {
        self.target
    }

    /// 첫 번째로 디코딩 가능한 프레임에서 해상도 결정 (이미지 자체는 바로 버림)
    pub fn probe_dimensions(paths: &[PathBuf]) -> Result<Dimensions> {
        for path in paths {
            match decode(path) {
                Ok(image) => return Dimensions::new(image.width(), image.height()),
                Err(e) => log::warn!("[FRAMES] 해상도 탐색 중 디코딩 실패: {}", e),
            }
        }
        Err(Error::NoDecodableFrame)
    }

    /// 프레임 i 로드: 해상도가 다르면 고품질 리샘플링으로 목표 크기 사본 생성
    pub fn load(&self, path: &Path) -> Result<RgbaImage> {
        let image = decode(path)?;
        if image.width() == self.target.width && image.height() == self.target.height {
            return Ok(image);
        }

        crate::debug_log!(
            "[FRAMES] 리사이즈 {}x{} → {} ({})",
            image.width(),
            image.height(),
            self.target,
            path.display()
        );
        // 원본은 여기서 drop
        Ok(image::imageops::resize(
            &image,
            self.target.width,
            self.target.height,
            self.filter,
        ))
    }

    /// 로드 + NV21 변환 (인코더 입력 버퍼)
    pub fn load_nv21(&self, path: &Path) -> Result<Vec<u8>> {
        let image = self.load(path)?;
        Ok(rgba_to_nv21(image.as_raw(), image.width(), image.height()))
    }
}

fn decode(path: &Path) -> Result<RgbaImage> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| Error::FrameDecode {
            path: path.to_path_buf(),
            source,
        })
}
