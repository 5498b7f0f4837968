use crate::regs::*;
use crate::trigger::{self, TriggerSetup};
use crate::{
    CardCapabilities, ChannelTrigger, Driver, ExternalTrigger, Registers, Result, SpcmError,
};
use log::{debug, info, warn};
use std::time::Duration;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionState {
    Open,
    Configured,
    Streaming,
    Closed,
}

/// FIFO acquisition modes.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordMode {
    /// Continuous recording of segments with a fixed pre-trigger count.
    FifoSingle {
        channel_mask: u64,
        pre_trigger: i64,
        segment_size: i64,
        loops: i64,
    },
    /// One segment per trigger event with a fixed post-trigger count.
    FifoMulti {
        channel_mask: u64,
        segment_size: i64,
        post_trigger: i64,
        loops: i64,
    },
}

/// Buffer-type tags understood by the driver.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BufferType {
    Data,
    Aba,
    Timestamp,
}

impl BufferType {
    pub fn raw(self) -> u32 {
        match self {
            Self::Data => SPCM_BUF_DATA,
            Self::Aba => SPCM_BUF_ABA,
            Self::Timestamp => SPCM_BUF_TIMESTAMP,
        }
    }
}

/// An open card: capability limits plus the configuration applied so far.
///
/// Configuration calls are only accepted before streaming starts; the
/// streaming loop borrows the device mutably, so nothing else can touch the
/// registers while it runs.
pub struct Device<D: Driver> {
    regs: Registers<D>,
    caps: CardCapabilities,
    state: SessionState,
    sample_rate: Option<i64>,
    oversampling_factor: i32,
    channel_mask: u64,
    channel_count: i32,
    mode: Option<RecordMode>,
}

impl<D: Driver> Device<D> {
    pub fn open(driver: D, device: &str) -> Result<Self> {
        let mut regs = Registers::open(driver, device)?;
        let caps = CardCapabilities::read(&mut regs)?;
        info!("Card {device}: {caps}");
        Ok(Self {
            regs,
            caps,
            state: SessionState::Open,
            sample_rate: None,
            oversampling_factor: 1,
            channel_mask: 0,
            channel_count: 0,
            mode: None,
        })
    }

    pub fn name(&self) -> &str {
        self.regs.device()
    }

    pub fn capabilities(&self) -> &CardCapabilities {
        &self.caps
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sample rate the card actually runs at, after the last clock setup.
    pub fn sample_rate(&self) -> Option<i64> {
        self.sample_rate
    }

    pub fn oversampling_factor(&self) -> i32 {
        self.oversampling_factor
    }

    pub fn channel_mask(&self) -> u64 {
        self.channel_mask
    }

    /// Enabled channel count as read back from the card.
    pub fn channel_count(&self) -> i32 {
        self.channel_count
    }

    pub fn mode(&self) -> Option<&RecordMode> {
        self.mode.as_ref()
    }

    pub fn driver(&self) -> &D {
        self.regs.driver()
    }

    pub fn driver_mut(&mut self) -> &mut D {
        self.regs.driver_mut()
    }

    pub fn get_i32(&mut self, register: i32) -> Result<i32> {
        self.regs.get_i32(register)
    }

    pub fn get_i64(&mut self, register: i32) -> Result<i64> {
        self.regs.get_i64(register)
    }

    pub fn set_i32(&mut self, register: i32, value: i32) -> Result<()> {
        self.regs.set_i32(register, value)
    }

    pub fn set_i64(&mut self, register: i32, value: i64) -> Result<()> {
        self.regs.set_i64(register, value)
    }

    pub fn setup_clock_pll(&mut self, sample_rate: i64, clock_out: bool) -> Result<()> {
        self.ensure_configurable()?;
        self.caps.check_sample_rate(sample_rate)?;

        self.regs.set_i32(SPC_CLOCKMODE, SPC_CM_INTPLL)?;
        self.regs.set_i64(SPC_SAMPLERATE, sample_rate)?;
        self.regs.set_i32(SPC_CLOCKOUT, clock_out as i32)?;

        // the PLL snaps to the nearest rate it can generate
        let actual = self.regs.get_i64(SPC_SAMPLERATE)?;
        self.oversampling_factor = self.regs.get_i32(SPC_OVERSAMPLINGFACTOR)?;
        self.sample_rate = Some(actual);
        if actual != sample_rate {
            debug!("Requested {sample_rate} S/s, card runs at {actual} S/s");
        }
        info!(
            "Clock: internal PLL at {actual} S/s (oversampling {}, clock out {clock_out})",
            self.oversampling_factor
        );
        self.state = SessionState::Configured;
        Ok(())
    }

    pub fn setup_software_trigger(&mut self, trigger_out: bool) -> Result<()> {
        self.ensure_configurable()?;
        trigger::setup_software(&mut self.regs, trigger_out)?;
        self.state = SessionState::Configured;
        Ok(())
    }

    pub fn setup_external_trigger(&mut self, ext: &ExternalTrigger) -> Result<()> {
        self.ensure_configurable()?;
        trigger::setup_external(&mut self.regs, &self.caps, ext)?;
        self.state = SessionState::Configured;
        Ok(())
    }

    pub fn setup_channel_trigger(&mut self, trig: &ChannelTrigger) -> Result<()> {
        self.ensure_configurable()?;
        trigger::setup_channel(&mut self.regs, &self.caps, trig)?;
        self.state = SessionState::Configured;
        Ok(())
    }

    pub fn setup_trigger(&mut self, setup: &TriggerSetup) -> Result<()> {
        match setup {
            TriggerSetup::Software { trigger_out } => self.setup_software_trigger(*trigger_out),
            TriggerSetup::External(ext) => self.setup_external_trigger(ext),
            TriggerSetup::Channel(trig) => self.setup_channel_trigger(trig),
        }
    }

    pub fn setup_fifo_single(
        &mut self,
        channel_mask: u64,
        pre_trigger: i64,
        segment_size: i64,
        loops: i64,
    ) -> Result<()> {
        self.setup_mode(&RecordMode::FifoSingle {
            channel_mask,
            pre_trigger,
            segment_size,
            loops,
        })
    }

    pub fn setup_fifo_multi(
        &mut self,
        channel_mask: u64,
        segment_size: i64,
        post_trigger: i64,
        loops: i64,
    ) -> Result<()> {
        self.setup_mode(&RecordMode::FifoMulti {
            channel_mask,
            segment_size,
            post_trigger,
            loops,
        })
    }

    pub fn setup_mode(&mut self, mode: &RecordMode) -> Result<()> {
        self.ensure_configurable()?;
        let (channel_mask, segment_size, loops) = match *mode {
            RecordMode::FifoSingle {
                channel_mask,
                segment_size,
                loops,
                ..
            }
            | RecordMode::FifoMulti {
                channel_mask,
                segment_size,
                loops,
                ..
            } => (channel_mask, segment_size, loops),
        };
        if segment_size < 1 {
            return Err(SpcmError::invalid(
                "segment size",
                format!("{segment_size} must be at least 1"),
            ));
        }
        if loops < 0 {
            return Err(SpcmError::invalid("loops", format!("{loops} is negative")));
        }
        self.caps.check_channel_mask(channel_mask)?;

        match *mode {
            RecordMode::FifoSingle { pre_trigger, .. } => {
                if pre_trigger < 0 {
                    return Err(SpcmError::invalid(
                        "pre-trigger",
                        format!("{pre_trigger} is negative"),
                    ));
                }
                self.regs.set_i32(SPC_CARDMODE, SPC_REC_FIFO_SINGLE)?;
                self.regs.set_i64(SPC_CHENABLE, channel_mask as i64)?;
                self.regs.set_i64(SPC_PRETRIGGER, pre_trigger)?;
            }
            RecordMode::FifoMulti { post_trigger, .. } => {
                if post_trigger < 1 || post_trigger > segment_size {
                    return Err(SpcmError::invalid(
                        "post-trigger",
                        format!("{post_trigger} not in [1, {segment_size}]"),
                    ));
                }
                self.regs.set_i32(SPC_CARDMODE, SPC_REC_FIFO_MULTI)?;
                self.regs.set_i64(SPC_CHENABLE, channel_mask as i64)?;
                self.regs.set_i64(SPC_POSTTRIGGER, post_trigger)?;
            }
        }
        self.regs.set_i64(SPC_SEGMENTSIZE, segment_size)?;
        self.regs.set_i64(SPC_LOOPS, loops)?;

        self.channel_mask = channel_mask;
        self.channel_count = self.regs.get_i32(SPC_CHCOUNT)?;
        self.mode = Some(mode.clone());
        info!(
            "Mode: {mode:?}, {} channels enabled",
            self.channel_count
        );
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Driver-owned continuous memory for `buf_type`; a zero length means
    /// the driver has none reserved.
    pub fn continuous_buffer(&mut self, buf_type: BufferType) -> Result<(*mut u8, u64)> {
        let (ptr, len) = self.regs.get_cont_buf(buf_type.raw())?;
        debug!("Continuous buffer {buf_type:?}: {len} bytes");
        Ok((ptr, len))
    }

    /// # Safety
    ///
    /// `buffer` must stay valid for `length` bytes until [`Device::stop`] runs
    /// or the device is dropped.
    pub(crate) unsafe fn define_transfer(
        &mut self,
        buf_type: BufferType,
        notify_size: u32,
        buffer: *mut u8,
        length: u64,
    ) -> Result<()> {
        self.regs.def_transfer(
            buf_type.raw(),
            SPCM_DIR_CARDTOPC,
            notify_size,
            buffer,
            length,
        )
    }

    /// Bounds every DMA wait. The driver reads 0 as "no timeout", so anything
    /// below 1 ms is rejected.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout < Duration::from_millis(1) {
            return Err(SpcmError::invalid(
                "DMA timeout",
                format!("{timeout:?} is below 1 ms"),
            ));
        }
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        self.regs.set_i32(SPC_TIMEOUT, ms)
    }

    /// Starts the card, enables the trigger and starts the DMA transfer.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Configured => {}
            SessionState::Closed => return Err(SpcmError::Closed),
            other => {
                return Err(SpcmError::invalid(
                    "session state",
                    format!("cannot start from {other:?}"),
                ))
            }
        }
        if self.sample_rate.is_none() {
            return Err(SpcmError::invalid("clock", "sample rate not configured"));
        }
        if self.mode.is_none() {
            return Err(SpcmError::invalid("mode", "acquisition mode not configured"));
        }
        self.regs.set_i32(
            SPC_M2CMD,
            M2CMD_CARD_START | M2CMD_CARD_ENABLETRIGGER | M2CMD_DATA_STARTDMA,
        )?;
        self.state = SessionState::Streaming;
        info!("Card {} started", self.name());
        Ok(())
    }

    /// Blocks until the driver signals a new notify block or the timeout
    /// expires. Returns `false` on timeout.
    pub fn wait_dma(&mut self) -> Result<bool> {
        match self.regs.try_set_i32(SPC_M2CMD, M2CMD_DATA_WAITDMA)? {
            Ok(()) => Ok(true),
            Err(code) if code.is_timeout() => Ok(false),
            Err(code) => Err(self.regs.fail(code)),
        }
    }

    /// Disables the trigger and stops card and DMA. Failures are logged only.
    pub fn stop(&mut self) {
        if self.state != SessionState::Streaming {
            return;
        }
        let cmd = M2CMD_CARD_DISABLETRIGGER | M2CMD_CARD_STOP | M2CMD_DATA_STOPDMA;
        if let Err(e) = self.regs.set_i32(SPC_M2CMD, cmd) {
            warn!("Stopping card {} failed: {e}", self.name());
        } else {
            info!("Card {} stopped", self.name());
        }
        self.state = SessionState::Configured;
    }

    /// Releases the card. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.stop();
        self.regs.close();
        self.state = SessionState::Closed;
    }

    fn ensure_configurable(&self) -> Result<()> {
        match self.state {
            SessionState::Open | SessionState::Configured => Ok(()),
            SessionState::Streaming => Err(SpcmError::invalid(
                "session state",
                "card is streaming; stop it before reconfiguring",
            )),
            SessionState::Closed => Err(SpcmError::Closed),
        }
    }
}

impl<D: Driver> Drop for Device<D> {
    fn drop(&mut self) {
        self.close();
    }
}
