//! # pcmogg-ffi
//!
//! pcmogg 的 C FFI 导出层.
//!
//! 编译为 DLL (Windows) / SO (Linux) / dylib (macOS) / 静态库, 供移动端插件等
//! 宿主通过四个函数调用:
//! - `encode_pcm_to_ogg()` - 编码, 失败返回空指针
//! - `get_ogg_output_data()` / `get_ogg_output_size()` - 读取结果
//! - `free_ogg_output()` - 释放结果
//!
//! # 内存管理
//!
//! - 每个非空句柄必须且只能调用一次 `free_ogg_output()`
//! - 释放后句柄及其数据指针均失效
//! - 输入 PCM 缓冲区由调用方负责, 调用返回后不再被访问

use std::ffi::{CStr, c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

use log::warn;
use pcmogg::{EncodeRequest, OggOutput, encode};

const VERSION_BYTES: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();

const VERSION: &CStr = match CStr::from_bytes_with_nul(VERSION_BYTES) {
    Ok(v) => v,
    Err(_) => c"unknown",
};

/// 获取 pcmogg 版本号字符串
///
/// 返回的字符串指针为静态分配, 无需释放.
#[unsafe(no_mangle)]
pub extern "C" fn pcmogg_version() -> *const c_char {
    VERSION.as_ptr()
}

/// 将交错的 f32 PCM 编码为 Ogg/Vorbis
///
/// `num_samples` 为所有声道的采样总数 (帧数 * 声道数). 参数无效、参数不受支持
/// 或内存不足时返回空指针.
///
/// # Safety
///
/// `pcm` 为空或指向至少 `num_samples` 个可读的 f32.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encode_pcm_to_ogg(
    pcm: *const f32,
    num_samples: i64,
    channels: i32,
    sample_rate: i64,
    quality: f32,
) -> *mut c_void {
    let samples: &[f32] = match usize::try_from(num_samples) {
        Ok(len) if !pcm.is_null() && len > 0 => {
            if len > isize::MAX as usize / size_of::<f32>() {
                warn!("encode_pcm_to_ogg: 采样数过大 ({num_samples})");
                return ptr::null_mut();
            }
            // SAFETY: 调用方保证 pcm 指向 len 个可读的 f32
            unsafe { slice::from_raw_parts(pcm, len) }
        }
        _ => &[],
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        encode(&EncodeRequest::new(samples, channels, sample_rate, quality))
    }));
    match result {
        Ok(Ok(output)) => Box::into_raw(Box::new(output)).cast::<c_void>(),
        Ok(Err(e)) => {
            warn!("encode_pcm_to_ogg 失败 ({:?}): {e}", e.kind());
            ptr::null_mut()
        }
        Err(_) => {
            warn!("encode_pcm_to_ogg: 编码过程中发生 panic");
            ptr::null_mut()
        }
    }
}

/// 借用句柄中的结果
///
/// # Safety
///
/// `handle` 为空或为未释放的 `encode_pcm_to_ogg` 返回值.
unsafe fn output_ref<'a>(handle: *mut c_void) -> Option<&'a OggOutput> {
    // SAFETY: 由调用方保证句柄有效
    unsafe { handle.cast::<OggOutput>().as_ref() }
}

/// 获取编码结果的首字节指针
///
/// 指针在 `free_ogg_output()` 之前有效. 空句柄返回空指针.
///
/// # Safety
///
/// `handle` 为空或为未释放的 `encode_pcm_to_ogg` 返回值.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_ogg_output_data(handle: *mut c_void) -> *const u8 {
    // SAFETY: 同上
    match unsafe { output_ref(handle) } {
        Some(output) => output.as_ptr(),
        None => ptr::null(),
    }
}

/// 获取编码结果的字节数, 空句柄返回 0
///
/// # Safety
///
/// `handle` 为空或为未释放的 `encode_pcm_to_ogg` 返回值.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_ogg_output_size(handle: *mut c_void) -> i32 {
    // SAFETY: 同上
    match unsafe { output_ref(handle) } {
        // 输出上限为 i32::MAX, 不会截断
        Some(output) => i32::try_from(output.len()).unwrap_or(i32::MAX),
        None => 0,
    }
}

/// 释放编码结果, 空句柄忽略
///
/// # Safety
///
/// `handle` 为空或为未释放的 `encode_pcm_to_ogg` 返回值; 调用后不得再使用.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_ogg_output(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    // SAFETY: 句柄由 encode_pcm_to_ogg 中的 Box::into_raw 产生且尚未释放
    drop(unsafe { Box::from_raw(handle.cast::<OggOutput>()) });
}
