// FFI 공통 타입

/// FFI 반환 코드 (음수 = 실패)
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NullPointer = -1,
    InvalidParam = -2,
    /// 작업이 아직 끝나지 않음
    NotReady = -3,
    /// 응답을 이미 가져감
    AlreadyTaken = -4,
}

