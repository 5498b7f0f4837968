//! The vendor driver, through bindgen generated bindings to `spcm_drv.h`.

use crate::regs::{ERRORTEXTLEN, ERR_OK};
use crate::{Driver, DrvResult, ErrorCode, ErrorInfo};
use log::{debug, warn};
use std::{
    ffi::{c_void, CString},
    ptr,
};

#[allow(non_upper_case_globals, non_camel_case_types, non_snake_case, dead_code)]
mod ffi {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

fn status(res: u32) -> DrvResult<()> {
    if res == ERR_OK {
        Ok(())
    } else {
        Err(ErrorCode(res))
    }
}

/// A card handle from `spcm_hOpen`.
pub struct SpcmDriver {
    handle: ffi::drv_handle,
}

// The handle is an opaque token; the driver serialises access per card and
// `Driver` methods take `&mut self`.
unsafe impl Send for SpcmDriver {}

impl SpcmDriver {
    pub fn new() -> Self {
        Self {
            handle: ptr::null_mut(),
        }
    }
}

impl Default for SpcmDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for SpcmDriver {
    fn open(&mut self, device: &str) -> bool {
        let Ok(name) = CString::new(device) else {
            warn!("Device name {device:?} contains a NUL byte");
            return false;
        };
        let handle = unsafe { ffi::spcm_hOpen(name.as_ptr() as _) };
        if handle.is_null() {
            return false;
        }
        self.handle = handle;
        debug!("spcm_hOpen({device}) -> {handle:p}");
        true
    }

    fn close(&mut self) {
        if !self.handle.is_null() {
            unsafe { ffi::spcm_vClose(self.handle) };
            self.handle = ptr::null_mut();
        }
    }

    fn get_param_i32(&mut self, register: i32) -> DrvResult<i32> {
        let mut value = 0;
        let res = unsafe { ffi::spcm_dwGetParam_i32(self.handle, register, &mut value) };
        status(res).map(|_| value)
    }

    fn get_param_i64(&mut self, register: i32) -> DrvResult<i64> {
        let mut value = 0;
        let res = unsafe { ffi::spcm_dwGetParam_i64(self.handle, register, &mut value) };
        status(res).map(|_| value)
    }

    fn set_param_i32(&mut self, register: i32, value: i32) -> DrvResult<()> {
        status(unsafe { ffi::spcm_dwSetParam_i32(self.handle, register, value) })
    }

    fn set_param_i64(&mut self, register: i32, value: i64) -> DrvResult<()> {
        status(unsafe { ffi::spcm_dwSetParam_i64(self.handle, register, value) })
    }

    unsafe fn def_transfer(
        &mut self,
        buf_type: u32,
        direction: u32,
        notify_size: u32,
        buffer: *mut u8,
        board_offset: u64,
        length: u64,
    ) -> DrvResult<()> {
        status(ffi::spcm_dwDefTransfer_i64(
            self.handle,
            buf_type,
            direction,
            notify_size,
            buffer as *mut c_void,
            board_offset,
            length,
        ))
    }

    fn get_cont_buf(&mut self, buf_type: u32) -> DrvResult<(*mut u8, u64)> {
        let mut buffer: *mut c_void = ptr::null_mut();
        let mut len = 0u64;
        let res = unsafe { ffi::spcm_dwGetContBuf_i64(self.handle, buf_type, &mut buffer, &mut len) };
        status(res).map(|_| (buffer as *mut u8, len))
    }

    fn error_info(&mut self) -> ErrorInfo {
        let mut register = 0u32;
        let mut value = 0i32;
        let mut text = vec![0u8; ERRORTEXTLEN];
        unsafe {
            ffi::spcm_dwGetErrorInfo_i32(
                self.handle,
                &mut register,
                &mut value,
                text.as_mut_ptr() as _,
            );
        }
        if let Some(end) = text.iter().position(|&b| b == 0) {
            text.truncate(end);
        }
        ErrorInfo {
            register,
            value,
            text: String::from_utf8_lossy(&text).into_owned(),
        }
    }
}

impl Drop for SpcmDriver {
    fn drop(&mut self) {
        self.close();
    }
}
