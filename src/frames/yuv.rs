// RGBA → NV21 (YUV 4:2:0 semi-planar) 변환
// Y 평면 뒤에 V,U 인터리브 평면 (2x2 블록당 1쌍, 짝수 행/열에서만 샘플링)

/// 변환 결과 버퍼 크기 (w*h*3/2)
#[inline]
pub fn nv21_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3 / 2
}

/// BT.601 계열 선형 변환, 각 성분은 [0,255]로 clamp 후 8bit 절삭
#[inline]
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f64, g as f64, b as f64);

    let y = (0.299 * r + 0.587 * g + 0.114 * b) as i32;
    let u = (-0.147 * r - 0.289 * g + 0.436 * b + 128.0) as i32;
    let v = (0.615 * r - 0.515 * g - 0.100 * b + 128.0) as i32;

    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}

/// 인터리브 RGBA(픽셀당 4바이트) → NV21
/// 순수 함수: 출력 버퍼 할당 외 부작용 없음
pub fn rgba_to_nv21(rgba: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    debug_assert!(rgba.len() >= w * h * 4);

    let mut yuv = vec![0u8; nv21_len(width, height)];
    let mut y_index = 0usize;
    let mut uv_index = w * h;

    for row in 0..h {
        for col in 0..w {
            let px = (row * w + col) * 4;
            let (y, u, v) = rgb_to_yuv(rgba[px], rgba[px + 1], rgba[px + 2]);

            yuv[y_index] = y;
            y_index += 1;

            // 홀수 크기에서는 마지막 블록이 버퍼를 넘지 않도록 잘림
            if row % 2 == 0 && col % 2 == 0 && uv_index + 1 < yuv.len() {
                yuv[uv_index] = v;
                yuv[uv_index + 1] = u;
                uv_index += 2;
            }
        }
    }

    yuv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        data
    }

    #[test]
    fn test_mid_gray_has_no_chroma_shift() {
        let out = rgba_to_nv21(&solid(4, 4, [128, 128, 128]), 4, 4);
        let luma = &out[..16];
        let chroma = &out[16..];

        for &y in luma {
            assert!((127..=128).contains(&y), "luma {}", y);
        }
        for &c in chroma {
            assert!((127..=128).contains(&c), "chroma {}", c);
        }
    }

    #[test]
    fn test_chroma_is_interleaved_v_then_u() {
        // 순수 빨강: V가 크고 U가 작음
        let out = rgba_to_nv21(&solid(2, 2, [255, 0, 0]), 2, 2);
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], 76);
        let (v, u) = (out[4], out[5]);
        assert!(v > 200, "v {}", v);
        assert!(u < 128, "u {}", u);
    }

    #[test]
    fn test_values_are_clamped() {
        // 파랑/노랑 극단값에서도 패닉 없이 [0,255]
        for rgb in [[0, 0, 255], [255, 255, 0], [0, 255, 0], [255, 255, 255], [0, 0, 0]] {
            let out = rgba_to_nv21(&solid(2, 2, rgb), 2, 2);
            assert_eq!(out.len(), 6);
        }
        let white = rgba_to_nv21(&solid(2, 2, [255, 255, 255]), 2, 2);
        assert!(white[0] >= 254);
        let black = rgba_to_nv21(&solid(2, 2, [0, 0, 0]), 2, 2);
        assert_eq!(black[0], 0);
        assert_eq!(black[4], 128);
        assert_eq!(black[5], 128);
    }

    #[test]
    fn test_buffer_size_even_and_odd_dimensions() {
        for (w, h) in [(2, 2), (4, 6), (16, 9), (3, 3), (5, 7), (1, 1), (7, 2)] {
            let out = rgba_to_nv21(&solid(w, h, [10, 20, 30]), w, h);
            assert_eq!(out.len(), (w * h * 3 / 2) as usize, "{}x{}", w, h);
            assert_eq!(out.len(), nv21_len(w, h));
        }
    }

    #[test]
    fn test_chroma_plane_is_quarter_of_luma() {
        let (w, h) = (8u32, 6u32);
        let out = rgba_to_nv21(&solid(w, h, [200, 100, 50]), w, h);
        let luma_len = (w * h) as usize;
        let chroma_pairs = (out.len() - luma_len) / 2;
        assert_eq!(chroma_pairs, luma_len / 4);
    }

    #[test]
    fn test_chroma_sampled_from_even_positions() {
        // 2x2 블록 좌상단만 빨강, 나머지 검정 → 블록 chroma는 빨강 기준
        let (w, h) = (2u32, 2u32);
        let mut data = solid(w, h, [0, 0, 0]);
        data[0] = 255;
        let out = rgba_to_nv21(&data, w, h);
        assert!(out[4] > 200);
    }

    #[test]
    fn test_deterministic() {
        let input: Vec<u8> = (0..(6 * 4 * 4)).map(|i| (i * 37 % 256) as u8).collect();
        assert_eq!(rgba_to_nv21(&input, 6, 4), rgba_to_nv21(&input, 6, 4));
    }
}
