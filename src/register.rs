use crate::{Driver, ErrorCode, Result, SpcmError};
use log::{debug, info};

/// Owns the driver handle and turns raw register calls into `Result`s.
///
/// Any non-zero status is fatal to the call that produced it; the extended
/// error text is fetched from the driver right away so it describes that call.
/// The handle is released on drop.
pub struct Registers<D: Driver> {
    driver: D,
    device: String,
    open: bool,
}

impl<D: Driver> Registers<D> {
    pub fn open(mut driver: D, device: &str) -> Result<Self> {
        if !driver.open(device) {
            return Err(SpcmError::Open {
                device: device.to_string(),
                reason: "driver returned an invalid handle".to_string(),
            });
        }
        info!("Opened card {device}");
        Ok(Self {
            driver,
            device: device.to_string(),
            open: true,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn get_i32(&mut self, register: i32) -> Result<i32> {
        self.ensure_open()?;
        let res = self.driver.get_param_i32(register);
        self.check(res)
    }

    pub fn get_i64(&mut self, register: i32) -> Result<i64> {
        self.ensure_open()?;
        let res = self.driver.get_param_i64(register);
        self.check(res)
    }

    pub fn set_i32(&mut self, register: i32, value: i32) -> Result<()> {
        self.ensure_open()?;
        let res = self.driver.set_param_i32(register, value);
        self.check(res)
    }

    pub fn set_i64(&mut self, register: i32, value: i64) -> Result<()> {
        self.ensure_open()?;
        let res = self.driver.set_param_i64(register, value);
        self.check(res)
    }

    /// Writes a 32-bit register and hands back the raw status, for callers that
    /// treat some codes (the DMA wait timeout) as normal outcomes.
    pub fn try_set_i32(&mut self, register: i32, value: i32) -> Result<Result<(), ErrorCode>> {
        self.ensure_open()?;
        Ok(self.driver.set_param_i32(register, value))
    }

    /// # Safety
    ///
    /// See [`Driver::def_transfer`].
    pub unsafe fn def_transfer(
        &mut self,
        buf_type: u32,
        direction: u32,
        notify_size: u32,
        buffer: *mut u8,
        length: u64,
    ) -> Result<()> {
        self.ensure_open()?;
        let res = self
            .driver
            .def_transfer(buf_type, direction, notify_size, buffer, 0, length);
        self.check(res)
    }

    pub fn get_cont_buf(&mut self, buf_type: u32) -> Result<(*mut u8, u64)> {
        self.ensure_open()?;
        let res = self.driver.get_cont_buf(buf_type);
        self.check(res)
    }

    /// Builds the error for a failed call from the driver's extended error info.
    pub fn fail(&mut self, code: ErrorCode) -> SpcmError {
        let info = self.driver.error_info();
        let message = if info.text.trim().is_empty() {
            code.name().to_string()
        } else {
            info.text.trim().to_string()
        };
        SpcmError::Driver {
            code,
            register: info.register,
            value: info.value,
            message,
        }
    }

    /// Releases the handle. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.open {
            self.driver.close();
            self.open = false;
            info!("Closed card {}", self.device);
        } else {
            debug!("Card {} already closed", self.device);
        }
    }

    fn check<T>(&mut self, res: Result<T, ErrorCode>) -> Result<T> {
        res.map_err(|code| self.fail(code))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(SpcmError::Closed)
        }
    }
}

impl<D: Driver> Drop for Registers<D> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::*;
    use crate::{SimCard, SimDriver};

    #[test]
    fn open_fails_on_invalid_handle() {
        let res = Registers::open(SimDriver::unplugged(), "/dev/spcm0");
        assert!(matches!(res, Err(SpcmError::Open { .. })));
    }

    #[test]
    fn failed_write_carries_driver_text() {
        let driver = SimDriver::new(SimCard::default()).fail_on(SPC_CLOCKOUT);
        let mut regs = Registers::open(driver, "sim0").unwrap();
        match regs.set_i32(SPC_CLOCKOUT, 1) {
            Err(SpcmError::Driver {
                code,
                register,
                message,
                ..
            }) => {
                assert_eq!(code, ErrorCode(ERR_REG));
                assert_eq!(register, SPC_CLOCKOUT as u32);
                assert!(message.contains("20110"), "{message}");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn reads_and_writes_pass_through() {
        let mut regs = Registers::open(SimDriver::new(SimCard::default()), "sim0").unwrap();
        regs.set_i64(SPC_SEGMENTSIZE, 4096).unwrap();
        assert_eq!(regs.get_i64(SPC_SEGMENTSIZE).unwrap(), 4096);
        assert_eq!(regs.get_i32(SPC_SEGMENTSIZE).unwrap(), 4096);
    }

    #[test]
    fn close_is_idempotent_and_blocks_further_calls() {
        let mut regs = Registers::open(SimDriver::new(SimCard::default()), "sim0").unwrap();
        regs.close();
        regs.close();
        assert!(!regs.is_open());
        assert_eq!(regs.driver().close_count(), 1);
        assert!(matches!(regs.get_i32(SPC_PCITYP), Err(SpcmError::Closed)));
    }
}
