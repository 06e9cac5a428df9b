//! C ABI 集成测试: 通过导出函数完成 编码 → 读取 → 释放.

use std::ffi::CStr;
use std::ptr;
use std::slice;

use pcmogg_ffi::{
    encode_pcm_to_ogg, free_ogg_output, get_ogg_output_data, get_ogg_output_size,
    pcmogg_version,
};
use pcmogg_format::{PageFlags, parse_pages, validate_stream};

fn sine(frames: usize, channels: usize, rate: f32) -> Vec<f32> {
    (0..frames * channels)
        .map(|i| {
            let t = (i / channels) as f32 / rate;
            (t * 440.0 * std::f32::consts::TAU).sin() * 0.5
        })
        .collect()
}

/// 通过 ABI 编码并拷贝出结果
fn encode_via_abi(pcm: &[f32], channels: i32, rate: i64, quality: f32) -> Option<Vec<u8>> {
    unsafe {
        let handle = encode_pcm_to_ogg(pcm.as_ptr(), pcm.len() as i64, channels, rate, quality);
        if handle.is_null() {
            return None;
        }
        let data = get_ogg_output_data(handle);
        let size = get_ogg_output_size(handle);
        assert!(!data.is_null());
        assert!(size > 0);
        let bytes = slice::from_raw_parts(data, size as usize).to_vec();
        free_ogg_output(handle);
        Some(bytes)
    }
}

#[test]
fn test_abi_编码成功() {
    let pcm = sine(22050, 2, 44100.0);
    let bytes = encode_via_abi(&pcm, 2, 44100, 0.4).unwrap();
    let pages = parse_pages(&bytes).unwrap();
    let summary = validate_stream(&pages).unwrap();
    assert_eq!(summary.last_granule, 22050);
    assert!(pages[0].flags.contains(PageFlags::FIRST));
    assert_eq!(&pages[0].body[1..7], b"vorbis");
}

#[test]
fn test_abi_参数无效返回空() {
    let pcm = [0.0f32; 5];
    unsafe {
        // 5 个采样, 2 个声道
        assert!(encode_pcm_to_ogg(pcm.as_ptr(), 5, 2, 44100, 0.5).is_null());
        assert!(encode_pcm_to_ogg(pcm.as_ptr(), 4, 0, 44100, 0.5).is_null());
        assert!(encode_pcm_to_ogg(ptr::null(), 4, 1, 44100, 0.5).is_null());
        assert!(encode_pcm_to_ogg(pcm.as_ptr(), 0, 1, 44100, 0.5).is_null());
        assert!(encode_pcm_to_ogg(pcm.as_ptr(), -3, 1, 44100, 0.5).is_null());
        assert!(encode_pcm_to_ogg(pcm.as_ptr(), 4, 1, -1, 0.5).is_null());
        assert!(encode_pcm_to_ogg(pcm.as_ptr(), 4, 1, 44100, 2.0).is_null());
        // 不支持的采样率
        assert!(encode_pcm_to_ogg(pcm.as_ptr(), 4, 1, 100, 0.5).is_null());
    }
}

#[test]
fn test_abi_空句柄() {
    unsafe {
        assert!(get_ogg_output_data(ptr::null_mut()).is_null());
        assert_eq!(get_ogg_output_size(ptr::null_mut()), 0);
        free_ogg_output(ptr::null_mut());
    }
}

#[test]
fn test_abi_版本号() {
    let v = unsafe { CStr::from_ptr(pcmogg_version()) };
    assert_eq!(v.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_abi_多线程并发() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let pcm = sine(8000 + i * 1000, 1, 16000.0);
                encode_via_abi(&pcm, 1, 16000, 0.2).map(|b| (i, b))
            })
        })
        .collect();
    let mut serials = Vec::new();
    for h in handles {
        let (i, bytes) = h.join().unwrap().unwrap();
        let pages = parse_pages(&bytes).unwrap();
        let summary = validate_stream(&pages).unwrap();
        assert_eq!(summary.last_granule, (8000 + i * 1000) as i64);
        serials.push(summary.serial);
    }
    serials.sort_unstable();
    serials.dedup();
    assert_eq!(serials.len(), 4);
}
