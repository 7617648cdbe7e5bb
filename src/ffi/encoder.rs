// Encoder FFI - 호스트 연동
// 인코딩 작업 생성/완료 확인/결과 수신/파괴

use crate::config::EncodeRequest;
use crate::encoding::{EncodeJob, EncodeResponse};
use crate::ffi::types::ErrorCode;
use std::ffi::{c_char, c_void, CStr, CString};

/// 로거 초기화 (여러 번 호출해도 안전)
#[no_mangle]
pub extern "C" fn video_engine_init_logging() -> i32 {
    crate::init_logging();
    ErrorCode::Success as i32
}

/// 인코딩 시작 (전용 워커 스레드에서 실행)
/// request_json: UTF-8 JSON 요청 (framePaths, outputPath, audioPath, fps, duration)
/// out_job: EncodeJob 핸들 반환
#[no_mangle]
pub extern "C" fn video_encoder_start(
    request_json: *const c_char,
    out_job: *mut *mut c_void,
) -> i32 {
    if request_json.is_null() || out_job.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let json = match CStr::from_ptr(request_json).to_str() {
            Ok(s) => s,
            Err(_) => return ErrorCode::InvalidParam as i32,
        };

        let request = match EncodeRequest::from_json(json) {
            Ok(request) => request,
            Err(e) => {
                log::error!("[FFI] 요청 파싱 실패: {}", e);
                return ErrorCode::InvalidParam as i32;
            }
        };

        let job = Box::new(EncodeJob::start(request));
        *out_job = Box::into_raw(job) as *mut c_void;
    }

    ErrorCode::Success as i32
}

/// 완료 여부 확인
/// 반환: 1=완료, 0=진행중
#[no_mangle]
pub extern "C" fn video_encoder_is_finished(job: *mut c_void) -> i32 {
    if job.is_null() {
        return 1;
    }

    unsafe {
        let job_ref = &*(job as *const EncodeJob);
        if job_ref.is_finished() { 1 } else { 0 }
    }
}

/// 결과 가져오기 (작업당 한 번)
/// out_success: 1=성공, 0=실패
/// out_error_code / out_error_message: 실패 시 문자열 (성공 시 null), video_engine_free_string()으로 해제
#[no_mangle]
pub extern "C" fn video_encoder_take_result(
    job: *mut c_void,
    out_success: *mut i32,
    out_error_code: *mut *mut c_char,
    out_error_message: *mut *mut c_char,
) -> i32 {
    if job.is_null()
        || out_success.is_null()
        || out_error_code.is_null()
        || out_error_message.is_null()
    {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let job_ref = &*(job as *const EncodeJob);
        if !job_ref.is_finished() {
            return ErrorCode::NotReady as i32;
        }

        *out_error_code = std::ptr::null_mut();
        *out_error_message = std::ptr::null_mut();

        match job_ref.take_response() {
            Some(EncodeResponse::Success(ok)) => {
                *out_success = if ok { 1 } else { 0 };
            }
            Some(EncodeResponse::Failure { category, message }) => {
                *out_success = 0;
                *out_error_code = into_c_string(category.code());
                *out_error_message = into_c_string(&message);
            }
            None => return ErrorCode::AlreadyTaken as i32,
        }
    }

    ErrorCode::Success as i32
}

/// EncodeJob 파괴 (진행 중이면 워커 스레드는 분리되어 끝까지 실행)
#[no_mangle]
pub extern "C" fn video_encoder_destroy(job: *mut c_void) -> i32 {
    if job.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let _ = Box::from_raw(job as *mut EncodeJob);
    }

    ErrorCode::Success as i32
}

/// Rust가 할당한 문자열 해제
#[no_mangle]
pub extern "C" fn video_engine_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    unsafe {
        let _ = CString::from_raw(ptr);
    }
}

fn into_c_string(s: &str) -> *mut c_char {
    // 내부 NUL은 제거
    match CString::new(s.replace('\0', "")) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
