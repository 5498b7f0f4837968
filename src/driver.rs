use crate::regs::*;
use std::fmt;

/// Non-zero status returned by a driver call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    pub const TIMEOUT: ErrorCode = ErrorCode(ERR_TIMEOUT);

    pub fn is_timeout(self) -> bool {
        self.0 == ERR_TIMEOUT
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            ERR_OK => "ERR_OK",
            ERR_INIT => "ERR_INIT",
            ERR_TYP => "ERR_TYP",
            ERR_FNCNOTSUPPORTED => "ERR_FNCNOTSUPPORTED",
            ERR_INVALIDHANDLE => "ERR_INVALIDHANDLE",
            ERR_BOARDNOTFOUND => "ERR_BOARDNOTFOUND",
            ERR_BOARDINUSE => "ERR_BOARDINUSE",
            ERR_REG => "ERR_REG",
            ERR_VALUE => "ERR_VALUE",
            ERR_FEATURE => "ERR_FEATURE",
            ERR_SEQUENCE => "ERR_SEQUENCE",
            ERR_READABORT => "ERR_READABORT",
            ERR_NOACCESS => "ERR_NOACCESS",
            ERR_TIMEOUT => "ERR_TIMEOUT",
            ERR_CALLTYPE => "ERR_CALLTYPE",
            ERR_EXCEEDSINT32 => "ERR_EXCEEDSINT32",
            ERR_NOWRITEALLOWED => "ERR_NOWRITEALLOWED",
            ERR_SETUP => "ERR_SETUP",
            ERR_CLOCKNOTLOCKED => "ERR_CLOCKNOTLOCKED",
            ERR_CHANNEL => "ERR_CHANNEL",
            ERR_NOTIFYSIZE => "ERR_NOTIFYSIZE",
            ERR_FIFOBUFOVERRUN => "ERR_FIFOBUFOVERRUN",
            ERR_FIFOHWOVERRUN => "ERR_FIFOHWOVERRUN",
            ERR_FIFOFINISHED => "ERR_FIFOFINISHED",
            ERR_ABORT => "ERR_ABORT",
            _ => "ERR_UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04x})", self.name(), self.0)
    }
}

pub type DrvResult<T> = Result<T, ErrorCode>;

/// Extended information about the last failed call, as reported by
/// `spcm_dwGetErrorInfo_i32`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    pub register: u32,
    pub value: i32,
    pub text: String,
}

/// The calls a card driver exposes. One value drives one card.
///
/// Methods mirror the vendor C API one to one and return the raw status code
/// on failure; turning that into an [`SpcmError`](crate::SpcmError) is the job
/// of [`Registers`](crate::Registers).
pub trait Driver: Send {
    /// Opens the card. Returns `false` when the driver handed back an invalid handle.
    fn open(&mut self, device: &str) -> bool;

    /// Releases the handle. Safe to call on a closed driver.
    fn close(&mut self);

    fn get_param_i32(&mut self, register: i32) -> DrvResult<i32>;

    fn get_param_i64(&mut self, register: i32) -> DrvResult<i64>;

    fn set_param_i32(&mut self, register: i32, value: i32) -> DrvResult<()>;

    fn set_param_i64(&mut self, register: i32, value: i64) -> DrvResult<()>;

    /// Registers a transfer buffer with the card.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for writes of `length` bytes until the transfer
    /// is stopped with `M2CMD_DATA_STOPDMA` or the card is closed.
    unsafe fn def_transfer(
        &mut self,
        buf_type: u32,
        direction: u32,
        notify_size: u32,
        buffer: *mut u8,
        board_offset: u64,
        length: u64,
    ) -> DrvResult<()>;

    /// Returns the driver-owned continuous memory for `buf_type`.
    /// A zero length means no continuous memory is reserved.
    fn get_cont_buf(&mut self, buf_type: u32) -> DrvResult<(*mut u8, u64)>;

    fn error_info(&mut self) -> ErrorInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_display_names_the_code() {
        assert_eq!(ErrorCode(ERR_TIMEOUT).to_string(), "ERR_TIMEOUT (0x0107)");
        assert_eq!(ErrorCode(0xdead).name(), "ERR_UNKNOWN");
        assert!(ErrorCode::TIMEOUT.is_timeout());
        assert!(!ErrorCode(ERR_VALUE).is_timeout());
    }
}
