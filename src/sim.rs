//! In-process stand-in for a card and its driver.
//!
//! `SimDriver` keeps a register file, answers the capability registers from a
//! [`SimCard`], and emulates the FIFO DMA ring: it writes into the buffer given
//! to `def_transfer` and reports the filled window through
//! `SPC_DATA_AVAIL_USER_POS`/`SPC_DATA_AVAIL_USER_LEN` like the real driver.
//! DMA waits either follow a script of [`DmaStep`]s or produce data on their own.

use crate::regs::*;
use crate::{Driver, DrvResult, ErrorCode, ErrorInfo};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use std::{
    collections::{HashMap, VecDeque},
    thread,
    time::{Duration, Instant},
};

#[derive(Clone, Debug)]
pub struct SimCard {
    pub card_type: i32,
    pub function: i32,
    pub serial_number: i32,
    pub min_sample_rate: i64,
    pub max_sample_rate: i64,
    /// PLL granularity; written rates snap to a multiple of this.
    pub rate_step: i64,
    pub modules: i32,
    pub channels_per_module: i32,
    pub bytes_per_sample: i32,
    pub memory_size: i64,
    /// Size of the driver-reserved continuous memory, 0 for none.
    pub continuous_len: usize,
}

impl Default for SimCard {
    fn default() -> Self {
        Self {
            card_type: TYP_M4IEXPSERIES | 0x4480,
            function: SPCM_TYPE_AI,
            serial_number: 12345,
            min_sample_rate: 1_000,
            max_sample_rate: 500_000_000,
            rate_step: 1_000,
            modules: 2,
            channels_per_module: 4,
            bytes_per_sample: 2,
            memory_size: 4 << 30,
            continuous_len: 0,
        }
    }
}

/// Outcome of one scripted `M2CMD_DATA_WAITDMA`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaStep {
    Timeout,
    /// Driver reports `len` bytes available at `offset`.
    Data { offset: usize, len: usize },
    Fail(u32),
}

/// What the generated DMA data looks like.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Byte `n` of the stream is [`pattern_byte`]`(n)`.
    #[default]
    Counter,
    /// Uniform random bytes from a fixed seed, identical between runs.
    Noise,
}

const NOISE_SEED: u64 = 0x5ec0_da7a;

/// Value of byte `index` of a [`Payload::Counter`] stream.
pub fn pattern_byte(index: u64) -> u8 {
    (index % 251) as u8
}

struct Transfer {
    ptr: *mut u8,
    len: usize,
    notify: usize,
}

pub struct SimDriver {
    card: SimCard,
    plugged: bool,
    open: bool,
    close_count: usize,
    registers: HashMap<i32, i64>,
    writes: Vec<(i32, i64)>,
    fail_register: Option<i32>,
    fail_cont_buf: Option<u32>,
    last_error: ErrorInfo,
    script: Option<VecDeque<DmaStep>>,
    realtime: bool,
    payload: Payload,
    rng: StdRng,
    continuous: Vec<u8>,
    transfer: Option<Transfer>,
    running: bool,
    dma: bool,
    user_pos: usize,
    user_len: usize,
    overrun: bool,
    produced: u64,
    started: Instant,
}

// The transfer pointer is only dereferenced by the thread that owns the driver.
unsafe impl Send for SimDriver {}

impl SimDriver {
    pub fn new(card: SimCard) -> Self {
        let continuous = vec![0u8; card.continuous_len];
        Self {
            card,
            plugged: true,
            open: false,
            close_count: 0,
            registers: HashMap::new(),
            writes: Vec::new(),
            fail_register: None,
            fail_cont_buf: None,
            last_error: ErrorInfo::default(),
            script: None,
            realtime: false,
            payload: Payload::default(),
            rng: StdRng::seed_from_u64(NOISE_SEED),
            continuous,
            transfer: None,
            running: false,
            dma: false,
            user_pos: 0,
            user_len: 0,
            overrun: false,
            produced: 0,
            started: Instant::now(),
        }
    }

    /// A driver whose open always yields a null handle.
    pub fn unplugged() -> Self {
        Self {
            plugged: false,
            ..Self::new(SimCard::default())
        }
    }

    pub fn fail_on(mut self, register: i32) -> Self {
        self.fail_register = Some(register);
        self
    }

    /// Makes `get_cont_buf` fail with `code`.
    pub fn fail_cont_buf(mut self, code: u32) -> Self {
        self.fail_cont_buf = Some(code);
        self
    }

    pub fn with_script(mut self, steps: impl IntoIterator<Item = DmaStep>) -> Self {
        self.script = Some(steps.into_iter().collect());
        self
    }

    /// Produce data at the configured sample rate instead of one notify
    /// block per wait. A slow reader then overruns like on hardware.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn set_fail_register(&mut self, register: Option<i32>) {
        self.fail_register = register;
    }

    /// Last value written to `register`, if any.
    pub fn written(&self, register: i32) -> Option<i64> {
        self.writes
            .iter()
            .rev()
            .find(|(r, _)| *r == register)
            .map(|(_, v)| *v)
    }

    pub fn writes(&self) -> &[(i32, i64)] {
        &self.writes
    }

    /// Every length acknowledged through `SPC_DATA_AVAIL_CARD_LEN`.
    pub fn acks(&self) -> Vec<i64> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == SPC_DATA_AVAIL_CARD_LEN)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }

    pub fn is_running(&self) -> bool {
        self.running || self.dma
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn fail(&mut self, code: u32, register: i32, value: i64, text: String) -> ErrorCode {
        self.last_error = ErrorInfo {
            register: register as u32,
            value: value as i32,
            text,
        };
        ErrorCode(code)
    }

    fn timeout_ms(&self) -> u64 {
        self.registers
            .get(&SPC_TIMEOUT)
            .copied()
            .unwrap_or(0)
            .max(0) as u64
    }

    fn read(&mut self, register: i32) -> DrvResult<i64> {
        if !self.open {
            return Err(self.fail(ERR_INVALIDHANDLE, register, 0, "card not open".into()));
        }
        if self.fail_register == Some(register) {
            return Err(self.fail(
                ERR_REG,
                register,
                0,
                format!("register {register} rejected by simulated card"),
            ));
        }
        let card = &self.card;
        let value = match register {
            SPC_PCITYP => card.card_type as i64,
            SPC_FNCTYPE => card.function as i64,
            SPC_PCISERIALNO => card.serial_number as i64,
            SPC_PCIMEMSIZE => card.memory_size,
            SPC_MIINST_MODULES => card.modules as i64,
            SPC_MIINST_CHPERMODULE => card.channels_per_module as i64,
            SPC_MIINST_BYTESPERSAMPLE => card.bytes_per_sample as i64,
            SPC_MIINST_BITSPERSAMPLE => card.bytes_per_sample as i64 * 8,
            SPC_MIINST_MAXADCVALUE => (1i64 << (card.bytes_per_sample * 8 - 1)) - 1,
            SPC_MIINST_MINADCLOCK => card.min_sample_rate,
            SPC_MIINST_MAXADCLOCK => card.max_sample_rate,
            SPC_CHCOUNT => self
                .registers
                .get(&SPC_CHENABLE)
                .map_or(0, |mask| mask.count_ones() as i64),
            SPC_OVERSAMPLINGFACTOR => 1,
            SPC_M2STATUS => self.status() as i64,
            SPC_DATA_AVAIL_USER_LEN => match &self.transfer {
                Some(t) if self.overrun => t.len as i64,
                _ => self.user_len as i64,
            },
            SPC_DATA_AVAIL_USER_POS => self.user_pos as i64,
            _ => self.registers.get(&register).copied().unwrap_or(0),
        };
        Ok(value)
    }

    fn status(&self) -> i32 {
        let mut status = 0;
        if self.running {
            status |= M2STAT_CARD_TRIGGER;
        }
        if self.user_len > 0 {
            status |= M2STAT_DATA_BLOCKREADY;
        }
        if self.overrun {
            status |= M2STAT_DATA_OVERRUN;
        }
        status
    }

    fn write(&mut self, register: i32, value: i64) -> DrvResult<()> {
        if !self.open {
            return Err(self.fail(ERR_INVALIDHANDLE, register, value, "card not open".into()));
        }
        if self.fail_register == Some(register) {
            return Err(self.fail(
                ERR_REG,
                register,
                value,
                format!("register {register} rejected by simulated card"),
            ));
        }
        match register {
            SPC_M2CMD => {
                self.writes.push((register, value));
                self.command(value as i32)
            }
            SPC_DATA_AVAIL_CARD_LEN => {
                self.writes.push((register, value));
                self.acknowledge(value)
            }
            SPC_SAMPLERATE => {
                let (min, max, step) = (
                    self.card.min_sample_rate,
                    self.card.max_sample_rate,
                    self.card.rate_step.max(1),
                );
                if value < min || value > max {
                    return Err(self.fail(
                        ERR_VALUE,
                        register,
                        value,
                        format!("sample rate {value} outside [{min}, {max}]"),
                    ));
                }
                let snapped = ((value + step / 2) / step * step).clamp(min, max);
                self.writes.push((register, value));
                self.registers.insert(register, snapped);
                Ok(())
            }
            SPC_CHENABLE => {
                let channels = (self.card.modules * self.card.channels_per_module) as u32;
                if value == 0 || (channels < 64 && (value as u64) >> channels != 0) {
                    return Err(self.fail(
                        ERR_VALUE,
                        register,
                        value,
                        format!("channel mask 0x{value:x} not supported"),
                    ));
                }
                self.writes.push((register, value));
                self.registers.insert(register, value);
                Ok(())
            }
            _ => {
                self.writes.push((register, value));
                self.registers.insert(register, value);
                Ok(())
            }
        }
    }

    fn command(&mut self, cmd: i32) -> DrvResult<()> {
        if cmd & M2CMD_CARD_RESET != 0 {
            self.registers.clear();
            self.running = false;
            self.dma = false;
            self.transfer = None;
        }
        if cmd & M2CMD_CARD_STOP != 0 {
            self.running = false;
        }
        if cmd & M2CMD_DATA_STOPDMA != 0 {
            self.dma = false;
            self.transfer = None;
        }
        if cmd & M2CMD_DATA_STARTDMA != 0 {
            if self.transfer.is_none() {
                return Err(self.fail(
                    ERR_SEQUENCE,
                    SPC_M2CMD,
                    cmd as i64,
                    "DMA started without a defined transfer".into(),
                ));
            }
            self.dma = true;
            self.user_pos = 0;
            self.user_len = 0;
            self.overrun = false;
            self.produced = 0;
        }
        if cmd & M2CMD_CARD_START != 0 {
            self.running = true;
            self.started = Instant::now();
        }
        if cmd & M2CMD_DATA_WAITDMA != 0 {
            return self.wait_dma();
        }
        Ok(())
    }

    fn wait_dma(&mut self) -> DrvResult<()> {
        if !self.dma {
            return Err(self.fail(
                ERR_SEQUENCE,
                SPC_M2CMD,
                M2CMD_DATA_WAITDMA as i64,
                "DMA not started".into(),
            ));
        }
        if let Some(script) = self.script.as_mut() {
            return match script.pop_front() {
                Some(DmaStep::Data { offset, len }) => {
                    self.user_pos = offset;
                    self.user_len = len;
                    Ok(())
                }
                Some(DmaStep::Fail(code)) => Err(self.fail(
                    code,
                    SPC_M2CMD,
                    M2CMD_DATA_WAITDMA as i64,
                    "simulated DMA failure".into(),
                )),
                Some(DmaStep::Timeout) | None => self.timeout(),
            };
        }
        if self.realtime && self.bytes_per_second() > 0.0 {
            self.wait_realtime()
        } else {
            let (len, notify) = match &self.transfer {
                Some(t) => (t.len, t.notify),
                None => return self.timeout(),
            };
            let free = len - self.user_len;
            if free == 0 {
                self.overrun = true;
            } else {
                self.produce(notify.min(free));
            }
            Ok(())
        }
    }

    fn wait_realtime(&mut self) -> DrvResult<()> {
        let (len, notify) = match &self.transfer {
            Some(t) => (t.len, t.notify),
            None => return self.timeout(),
        };
        let bps = self.bytes_per_second();
        let timeout = self.timeout_ms();
        let deadline = (timeout > 0).then(|| Instant::now() + Duration::from_millis(timeout));
        loop {
            let due = (self.started.elapsed().as_secs_f64() * bps) as u64;
            let pending = due.saturating_sub(self.produced);
            let free = (len - self.user_len) as u64;
            if pending > free {
                self.produce(free as usize);
                self.overrun = true;
                return Ok(());
            }
            self.produce(pending as usize);
            if self.user_len >= notify {
                return Ok(());
            }
            let missing = (notify - self.user_len) as f64;
            let nap = Duration::from_secs_f64(missing / bps);
            match deadline {
                Some(deadline) if Instant::now() + nap > deadline => {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                    return Err(self.fail(
                        ERR_TIMEOUT,
                        SPC_M2CMD,
                        M2CMD_DATA_WAITDMA as i64,
                        "timeout waiting for DMA".into(),
                    ));
                }
                _ => thread::sleep(nap),
            }
        }
    }

    fn timeout(&mut self) -> DrvResult<()> {
        let ms = self.timeout_ms();
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
        Err(self.fail(
            ERR_TIMEOUT,
            SPC_M2CMD,
            M2CMD_DATA_WAITDMA as i64,
            "timeout waiting for DMA".into(),
        ))
    }

    fn bytes_per_second(&self) -> f64 {
        let rate = self.registers.get(&SPC_SAMPLERATE).copied().unwrap_or(0) as f64;
        let channels = self
            .registers
            .get(&SPC_CHENABLE)
            .map_or(0, |mask| mask.count_ones()) as f64;
        rate * channels * self.card.bytes_per_sample as f64
    }

    fn produce(&mut self, n: usize) {
        let Some(transfer) = &self.transfer else {
            return;
        };
        if n == 0 {
            return;
        }
        let (ptr, len) = (transfer.ptr, transfer.len);
        let start = (self.user_pos + self.user_len) % len;
        let first = n.min(len - start);
        // SAFETY: def_transfer's contract keeps `ptr` valid for `len` bytes while
        // the transfer is defined; both ranges lie inside it.
        let (head, tail) = unsafe {
            (
                std::slice::from_raw_parts_mut(ptr.add(start), first),
                std::slice::from_raw_parts_mut(ptr, n - first),
            )
        };
        for part in [head, tail] {
            match self.payload {
                Payload::Counter => {
                    for (i, byte) in part.iter_mut().enumerate() {
                        *byte = pattern_byte(self.produced + i as u64);
                    }
                }
                Payload::Noise => self.rng.fill(part),
            }
            self.produced += part.len() as u64;
        }
        self.user_len += n;
    }

    fn acknowledge(&mut self, value: i64) -> DrvResult<()> {
        let Some(len) = self.transfer.as_ref().map(|t| t.len) else {
            return Err(self.fail(
                ERR_SEQUENCE,
                SPC_DATA_AVAIL_CARD_LEN,
                value,
                "no transfer defined".into(),
            ));
        };
        if value < 0 || value as usize > self.user_len {
            return Err(self.fail(
                ERR_VALUE,
                SPC_DATA_AVAIL_CARD_LEN,
                value,
                format!("acknowledged {value} of {} available bytes", self.user_len),
            ));
        }
        let value = value as usize;
        self.user_len -= value;
        self.user_pos = (self.user_pos + value) % len;
        Ok(())
    }
}

impl Driver for SimDriver {
    fn open(&mut self, device: &str) -> bool {
        if !self.plugged || device.is_empty() {
            return false;
        }
        self.open = true;
        true
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.close_count += 1;
            self.running = false;
            self.dma = false;
            self.transfer = None;
        }
    }

    fn get_param_i32(&mut self, register: i32) -> DrvResult<i32> {
        let value = self.read(register)?;
        i32::try_from(value).map_err(|_| {
            self.fail(
                ERR_EXCEEDSINT32,
                register,
                0,
                format!("value {value} exceeds 32 bit"),
            )
        })
    }

    fn get_param_i64(&mut self, register: i32) -> DrvResult<i64> {
        self.read(register)
    }

    fn set_param_i32(&mut self, register: i32, value: i32) -> DrvResult<()> {
        self.write(register, value as i64)
    }

    fn set_param_i64(&mut self, register: i32, value: i64) -> DrvResult<()> {
        self.write(register, value)
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
        if !self.open {
            return Err(self.fail(ERR_INVALIDHANDLE, 0, 0, "card not open".into()));
        }
        if buf_type != SPCM_BUF_DATA || direction != SPCM_DIR_CARDTOPC || board_offset != 0 {
            return Err(self.fail(
                ERR_FNCNOTSUPPORTED,
                0,
                buf_type as i64,
                "simulated card only records into the data buffer".into(),
            ));
        }
        let (len, notify) = (length as usize, notify_size as usize);
        if buffer.is_null() || len == 0 {
            return Err(self.fail(ERR_VALUE, 0, 0, "empty transfer buffer".into()));
        }
        if notify == 0 || len % notify != 0 {
            return Err(self.fail(
                ERR_NOTIFYSIZE,
                0,
                notify_size as i64,
                format!("notify size {notify} does not divide buffer length {len}"),
            ));
        }
        self.transfer = Some(Transfer {
            ptr: buffer,
            len,
            notify,
        });
        Ok(())
    }

    fn get_cont_buf(&mut self, buf_type: u32) -> DrvResult<(*mut u8, u64)> {
        if !self.open {
            return Err(self.fail(ERR_INVALIDHANDLE, 0, 0, "card not open".into()));
        }
        if let Some(code) = self.fail_cont_buf {
            return Err(self.fail(
                code,
                0,
                buf_type as i64,
                "continuous buffer not accessible".into(),
            ));
        }
        if buf_type == SPCM_BUF_DATA && !self.continuous.is_empty() {
            Ok((self.continuous.as_mut_ptr(), self.continuous.len() as u64))
        } else {
            Ok((std::ptr::null_mut(), 0))
        }
    }

    fn error_info(&mut self) -> ErrorInfo {
        self.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_snaps_to_pll_step() {
        let mut drv = SimDriver::new(SimCard::default());
        assert!(drv.open("sim0"));
        drv.set_param_i64(SPC_SAMPLERATE, 1_234_567).unwrap();
        assert_eq!(drv.get_param_i64(SPC_SAMPLERATE).unwrap(), 1_235_000);
        assert_eq!(drv.written(SPC_SAMPLERATE), Some(1_234_567));
    }

    #[test]
    fn generated_ring_wraps_and_acknowledges() {
        let mut drv = SimDriver::new(SimCard::default());
        assert!(drv.open("sim0"));
        let mut buf = vec![0u8; 300];
        unsafe {
            drv.def_transfer(SPCM_BUF_DATA, SPCM_DIR_CARDTOPC, 100, buf.as_mut_ptr(), 0, 300)
                .unwrap();
        }
        drv.set_param_i32(SPC_M2CMD, M2CMD_CARD_START | M2CMD_DATA_STARTDMA)
            .unwrap();
        for _ in 0..3 {
            drv.set_param_i32(SPC_M2CMD, M2CMD_DATA_WAITDMA).unwrap();
        }
        assert_eq!(drv.get_param_i64(SPC_DATA_AVAIL_USER_LEN).unwrap(), 300);
        drv.set_param_i64(SPC_DATA_AVAIL_CARD_LEN, 200).unwrap();
        drv.set_param_i32(SPC_M2CMD, M2CMD_DATA_WAITDMA).unwrap();
        assert_eq!(drv.get_param_i64(SPC_DATA_AVAIL_USER_POS).unwrap(), 200);
        assert_eq!(drv.get_param_i64(SPC_DATA_AVAIL_USER_LEN).unwrap(), 200);
        // the fourth block wrapped to the start of the buffer
        assert_eq!(buf[0], pattern_byte(300));
        assert_eq!(buf[299], pattern_byte(299));
    }

    fn generate(payload: Payload, blocks: usize) -> (Vec<u8>, u64) {
        let mut drv = SimDriver::new(SimCard::default()).payload(payload);
        assert!(drv.open("sim0"));
        let mut buf = vec![0u8; 256];
        unsafe {
            drv.def_transfer(SPCM_BUF_DATA, SPCM_DIR_CARDTOPC, 64, buf.as_mut_ptr(), 0, 256)
                .unwrap();
        }
        drv.set_param_i32(SPC_M2CMD, M2CMD_DATA_STARTDMA).unwrap();
        for _ in 0..blocks {
            drv.set_param_i32(SPC_M2CMD, M2CMD_DATA_WAITDMA).unwrap();
        }
        let produced = drv.produced();
        drop(drv);
        (buf, produced)
    }

    #[test]
    fn noise_is_repeatable_for_the_fixed_seed() {
        let (first, produced) = generate(Payload::Noise, 3);
        let (second, _) = generate(Payload::Noise, 3);
        assert_eq!(produced, 192);
        assert_eq!(first, second);
        let pattern: Vec<u8> = (0..192).map(pattern_byte).collect();
        assert_ne!(&first[..192], pattern.as_slice());
        assert!(first[192..].iter().all(|b| *b == 0));

        let (counter, _) = generate(Payload::Counter, 3);
        assert_eq!(&counter[..192], pattern.as_slice());
    }

    #[test]
    fn continuous_buffer_failure_is_reported() {
        let mut drv = SimDriver::new(SimCard {
            continuous_len: 4096,
            ..SimCard::default()
        })
        .fail_cont_buf(ERR_NOACCESS);
        assert!(drv.open("sim0"));
        assert_eq!(
            drv.get_cont_buf(SPCM_BUF_DATA).map(|(_, len)| len),
            Err(ErrorCode(ERR_NOACCESS))
        );
        assert_eq!(drv.error_info().text, "continuous buffer not accessible");
    }

    #[test]
    fn full_ring_reports_overrun() {
        let mut drv = SimDriver::new(SimCard::default());
        assert!(drv.open("sim0"));
        let mut buf = vec![0u8; 200];
        unsafe {
            drv.def_transfer(SPCM_BUF_DATA, SPCM_DIR_CARDTOPC, 100, buf.as_mut_ptr(), 0, 200)
                .unwrap();
        }
        drv.set_param_i32(SPC_M2CMD, M2CMD_DATA_STARTDMA).unwrap();
        for _ in 0..3 {
            drv.set_param_i32(SPC_M2CMD, M2CMD_DATA_WAITDMA).unwrap();
        }
        assert_eq!(drv.get_param_i64(SPC_DATA_AVAIL_USER_LEN).unwrap(), 200);
        assert_ne!(drv.get_param_i32(SPC_M2STATUS).unwrap() & M2STAT_DATA_OVERRUN, 0);
    }

    #[test]
    fn wait_without_dma_is_a_sequence_error() {
        let mut drv = SimDriver::new(SimCard::default());
        assert!(drv.open("sim0"));
        assert_eq!(
            drv.set_param_i32(SPC_M2CMD, M2CMD_DATA_WAITDMA),
            Err(ErrorCode(ERR_SEQUENCE))
        );
        assert_eq!(drv.error_info().text, "DMA not started");
    }

    #[test]
    fn over_acknowledging_is_rejected() {
        let mut drv = SimDriver::new(SimCard::default()).with_script([DmaStep::Data {
            offset: 0,
            len: 10,
        }]);
        assert!(drv.open("sim0"));
        let mut buf = vec![0u8; 100];
        unsafe {
            drv.def_transfer(SPCM_BUF_DATA, SPCM_DIR_CARDTOPC, 10, buf.as_mut_ptr(), 0, 100)
                .unwrap();
        }
        drv.set_param_i32(SPC_M2CMD, M2CMD_DATA_STARTDMA).unwrap();
        drv.set_param_i32(SPC_M2CMD, M2CMD_DATA_WAITDMA).unwrap();
        assert_eq!(
            drv.set_param_i64(SPC_DATA_AVAIL_CARD_LEN, 11),
            Err(ErrorCode(ERR_VALUE))
        );
    }
}
