//! FIFO streaming: the DMA wait / read / acknowledge loop.
//!
//! The card fills a ring of `buffer_size` bytes and after each notify block
//! reports the filled window as (`SPC_DATA_AVAIL_USER_POS`,
//! `SPC_DATA_AVAIL_USER_LEN`). Each iteration copies that window out, clamped
//! to the end of the ring, hands the copy downstream and acknowledges the
//! bytes through `SPC_DATA_AVAIL_CARD_LEN` so the card can reuse them.
//! A window that covers the whole ring means the card caught up with the
//! reader: that is an overrun and ends the acquisition.

use crate::regs::*;
use crate::{BufferType, Chunk, Device, DmaBuffer, Driver, ErrorCode, Result, SpcmError};
use crossbeam_channel::Sender;
use log::{debug, error, info, trace};
use std::{
    ops::{ControlFlow, Range},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

#[derive(Clone, Debug, PartialEq)]
pub struct StreamSettings {
    /// Ring length in bytes (`dataLength`).
    pub buffer_size: usize,
    /// Bytes per driver notification.
    pub notify_size: usize,
    /// Upper bound of one DMA wait; also bounds cancellation latency.
    pub timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            buffer_size: 160 * 1024 * 1024,
            notify_size: 10 * 1024 * 1024,
            timeout: Duration::from_millis(100),
        }
    }
}

impl StreamSettings {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(SpcmError::invalid("buffer size", "must be non-zero"));
        }
        if self.notify_size == 0 || self.notify_size > self.buffer_size {
            return Err(SpcmError::invalid(
                "notify size",
                format!("{} not in [1, {}]", self.notify_size, self.buffer_size),
            ));
        }
        if self.buffer_size % self.notify_size != 0 {
            return Err(SpcmError::invalid(
                "notify size",
                format!(
                    "{} does not divide buffer size {}",
                    self.notify_size, self.buffer_size
                ),
            ));
        }
        if u32::try_from(self.notify_size).is_err() {
            return Err(SpcmError::invalid("notify size", "exceeds 32 bit"));
        }
        // SPC_TIMEOUT = 0 makes the driver wait forever
        if self.timeout < Duration::from_millis(1) {
            return Err(SpcmError::invalid(
                "DMA timeout",
                format!("{:?} is below 1 ms", self.timeout),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: u64,
    pub bytes: u64,
    pub timeouts: u64,
}

/// Range of the ring that may be read for a reported (offset, length) pair.
///
/// Fails with [`SpcmError::Overrun`] when `len` reaches `data_length`. A window
/// running past the end of the ring is cut at the end; the wrapped rest is
/// reported again from offset 0 once this part is acknowledged.
pub fn available_window(offset: usize, len: usize, data_length: usize) -> Result<Range<usize>> {
    if len >= data_length {
        return Err(SpcmError::Overrun {
            available: len,
            capacity: data_length,
        });
    }
    if offset >= data_length {
        return Err(SpcmError::Driver {
            code: ErrorCode(ERR_VALUE),
            register: SPC_DATA_AVAIL_USER_POS as u32,
            value: i32::try_from(offset).unwrap_or(i32::MAX),
            message: format!("reported offset {offset} outside {data_length} byte buffer"),
        });
    }
    let end = if offset + len >= data_length {
        data_length
    } else {
        offset + len
    };
    Ok(offset..end)
}

fn read_len<D: Driver>(device: &mut Device<D>, register: i32) -> Result<usize> {
    let value = device.get_i64(register)?;
    usize::try_from(value).map_err(|_| SpcmError::Driver {
        code: ErrorCode(ERR_VALUE),
        register: register as u32,
        value: value as i32,
        message: format!("driver reported negative length {value}"),
    })
}

/// Runs a FIFO acquisition on a configured device until `shutdown` is set,
/// `deliver` breaks, or a fatal error occurs.
///
/// Chunks are delivered synchronously, in acquisition order. The card is
/// stopped before this returns, whatever the outcome.
pub fn stream<D, F>(
    device: &mut Device<D>,
    settings: &StreamSettings,
    shutdown: &AtomicBool,
    mut deliver: F,
) -> Result<StreamStats>
where
    D: Driver,
    F: FnMut(Chunk) -> ControlFlow<()>,
{
    settings.validate()?;
    let buffer = DmaBuffer::for_transfer(device, settings.buffer_size)?;

    // SAFETY: `buffer` outlives the transfer; the card is stopped (or never
    // started) before it is dropped at the end of this function.
    unsafe {
        device.define_transfer(
            BufferType::Data,
            settings.notify_size as u32,
            buffer.as_mut_ptr(),
            buffer.len() as u64,
        )?;
    }

    let result = device
        .set_timeout(settings.timeout)
        .and_then(|_| device.start())
        .and_then(|_| pump(device, &buffer, shutdown, &mut deliver));
    device.stop();

    match &result {
        Ok(stats) => info!(
            "Acquisition finished: {} chunks, {} bytes, {} timeouts",
            stats.chunks, stats.bytes, stats.timeouts
        ),
        Err(e) => error!("Acquisition aborted: {e}"),
    }
    result
}

fn pump<D, F>(
    device: &mut Device<D>,
    buffer: &DmaBuffer,
    shutdown: &AtomicBool,
    deliver: &mut F,
) -> Result<StreamStats>
where
    D: Driver,
    F: FnMut(Chunk) -> ControlFlow<()>,
{
    let data_length = buffer.len();
    let mut stats = StreamStats::default();

    while !shutdown.load(Ordering::Acquire) {
        if !device.wait_dma()? {
            stats.timeouts += 1;
            trace!("DMA wait timed out");
            continue;
        }

        let status = device.get_i32(SPC_M2STATUS)?;
        let avail_len = read_len(device, SPC_DATA_AVAIL_USER_LEN)?;
        let avail_offset = read_len(device, SPC_DATA_AVAIL_USER_POS)?;
        trace!("status 0x{status:x}, {avail_len} bytes at {avail_offset}");

        let window = available_window(avail_offset, avail_len, data_length)?;
        if window.is_empty() {
            continue;
        }
        let len = window.len();
        let chunk = Chunk::copy_from(stats.chunks, window.start, buffer.read(window));
        let flow = deliver(chunk);

        device.set_i64(SPC_DATA_AVAIL_CARD_LEN, len as i64)?;
        stats.chunks += 1;
        stats.bytes += len as u64;

        if flow.is_break() {
            debug!("Consumer went away after {} chunks", stats.chunks);
            break;
        }
    }
    Ok(stats)
}

/// A streaming acquisition running on its own thread.
///
/// The worker owns the device; dropping it when the loop ends releases the card.
pub struct Acquisition {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<Result<StreamStats>>,
}

impl Acquisition {
    /// Starts streaming from `device`, sending every chunk to `tx`.
    ///
    /// The loop ends when [`cancel`](Self::cancel) is called, every receiver
    /// is dropped, or an error occurs.
    pub fn spawn<D>(mut device: Device<D>, settings: StreamSettings, tx: Sender<Chunk>) -> Result<Self>
    where
        D: Driver + 'static,
    {
        settings.validate()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name(format!("spcm-fifo-{}", device.name().trim_start_matches("/dev/")))
            .spawn(move || {
                let result = stream(&mut device, &settings, &worker_shutdown, |chunk| {
                    match tx.send(chunk) {
                        Ok(()) => ControlFlow::Continue(()),
                        Err(_) => ControlFlow::Break(()),
                    }
                });
                device.close();
                result
            })?;
        Ok(Self { shutdown, handle })
    }

    /// Asks the worker to stop after the current iteration.
    pub fn cancel(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<StreamStats> {
        self.handle.join().map_err(|_| SpcmError::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::pattern_byte;
    use crate::{DmaStep, SimCard, SimDriver};
    use crossbeam_channel::{bounded, unbounded};
    use std::time::Instant;

    fn configured(driver: SimDriver) -> Device<SimDriver> {
        let mut dev = Device::open(driver, "sim0").unwrap();
        dev.setup_fifo_single(0xff, 1024, 1024, 0).unwrap();
        dev.setup_clock_pll(1_000_000, false).unwrap();
        dev.setup_software_trigger(false).unwrap();
        dev
    }

    fn settings(buffer_size: usize, notify_size: usize) -> StreamSettings {
        StreamSettings {
            buffer_size,
            notify_size,
            timeout: Duration::from_millis(1),
        }
    }

    /// Streams a script and collects (offset, len) per chunk. The loop is
    /// cancelled once `expected` chunks arrived.
    fn run_script(
        steps: Vec<DmaStep>,
        data_length: usize,
        expected: usize,
    ) -> (Result<StreamStats>, Vec<(usize, usize)>, Vec<i64>) {
        let mut dev = configured(SimDriver::new(SimCard::default()).with_script(steps));
        let shutdown = AtomicBool::new(false);
        let mut seen = Vec::new();
        let res = stream(&mut dev, &settings(data_length, 50), &shutdown, |chunk| {
            seen.push((chunk.offset, chunk.len()));
            if seen.len() >= expected {
                shutdown.store(true, Ordering::Release);
            }
            ControlFlow::Continue(())
        });
        let acks = dev.driver().acks();
        (res, seen, acks)
    }

    #[test]
    fn window_length_is_clamped_to_ring_end() {
        let data_length = 1000;
        for (offset, len) in [(0, 0), (0, 999), (10, 100), (900, 99), (900, 100), (900, 150), (999, 998)] {
            let window = available_window(offset, len, data_length).unwrap();
            assert_eq!(window.start, offset);
            assert_eq!(window.len(), len.min(data_length - offset));
            assert!(window.end <= data_length);
        }
    }

    #[test]
    fn window_rejects_full_ring() {
        for len in [1000, 1001, usize::MAX] {
            let err = available_window(0, len, 1000).unwrap_err();
            assert!(err.is_overrun(), "{err}");
        }
        assert!(matches!(
            available_window(1000, 10, 1000),
            Err(SpcmError::Driver { .. })
        ));
    }

    #[test]
    fn wraparound_scenario() {
        let steps = vec![
            DmaStep::Data { offset: 0, len: 100 },
            DmaStep::Data { offset: 100, len: 150 },
            DmaStep::Data { offset: 900, len: 150 },
            DmaStep::Data { offset: 0, len: 50 },
        ];
        let (res, seen, acks) = run_script(steps, 1000, 4);
        let stats = res.unwrap();
        assert_eq!(seen, vec![(0, 100), (100, 150), (900, 100), (0, 50)]);
        assert_eq!(acks, vec![100, 150, 100, 50]);
        assert_eq!(stats.chunks, 4);
        assert_eq!(stats.bytes, 400);
    }

    #[test]
    fn overrun_scenario_emits_nothing() {
        let steps = vec![DmaStep::Data { offset: 0, len: 500 }];
        let (res, seen, acks) = run_script(steps, 500, 1);
        assert!(matches!(
            res,
            Err(SpcmError::Overrun {
                available: 500,
                capacity: 500
            })
        ));
        assert!(seen.is_empty());
        assert!(acks.is_empty());
    }

    #[test]
    fn overrun_after_data_keeps_earlier_chunks() {
        let steps = vec![
            DmaStep::Data { offset: 0, len: 100 },
            DmaStep::Data { offset: 100, len: 1000 },
        ];
        let (res, seen, _) = run_script(steps, 1000, 10);
        assert!(res.unwrap_err().is_overrun());
        assert_eq!(seen, vec![(0, 100)]);
    }

    #[test]
    fn timeouts_are_retried_without_chunks() {
        let steps = vec![
            DmaStep::Timeout,
            DmaStep::Timeout,
            DmaStep::Data { offset: 0, len: 100 },
            DmaStep::Timeout,
            DmaStep::Data { offset: 100, len: 100 },
        ];
        let (res, seen, _) = run_script(steps, 1000, 2);
        let stats = res.unwrap();
        assert_eq!(seen, vec![(0, 100), (100, 100)]);
        assert_eq!(stats.timeouts, 3);
    }

    #[test]
    fn driver_failure_aborts_the_loop() {
        let steps = vec![
            DmaStep::Data { offset: 0, len: 100 },
            DmaStep::Fail(ERR_FIFOHWOVERRUN),
        ];
        let (res, seen, _) = run_script(steps, 1000, 10);
        match res {
            Err(SpcmError::Driver { code, .. }) => assert_eq!(code, ErrorCode(ERR_FIFOHWOVERRUN)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn card_is_stopped_after_any_exit() {
        let mut dev = configured(
            SimDriver::new(SimCard::default()).with_script([DmaStep::Data { offset: 0, len: 1000 }]),
        );
        let shutdown = AtomicBool::new(false);
        let res = stream(&mut dev, &settings(1000, 100), &shutdown, |_| {
            ControlFlow::Continue(())
        });
        assert!(res.is_err());
        assert!(!dev.driver().is_running());
        let stop = M2CMD_CARD_DISABLETRIGGER | M2CMD_CARD_STOP | M2CMD_DATA_STOPDMA;
        assert_eq!(dev.driver().written(SPC_M2CMD), Some(stop as i64));
    }

    #[test]
    fn cancelled_before_start_emits_nothing() {
        let mut dev = configured(SimDriver::new(SimCard::default()));
        let shutdown = AtomicBool::new(true);
        let mut count = 0;
        let stats = stream(&mut dev, &settings(1000, 100), &shutdown, |_| {
            count += 1;
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(count, 0);
        assert_eq!(stats, StreamStats::default());
    }

    #[test]
    fn cancellation_stops_before_next_chunk() {
        let mut dev = configured(SimDriver::new(SimCard::default()));
        let shutdown = AtomicBool::new(false);
        let mut count = 0;
        let stats = stream(&mut dev, &settings(1000, 100), &shutdown, |_| {
            count += 1;
            if count == 3 {
                shutdown.store(true, Ordering::Release);
            }
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(count, 3);
        assert_eq!(stats.chunks, 3);
    }

    #[test]
    fn generated_stream_is_continuous_across_wraps() {
        let mut dev = configured(SimDriver::new(SimCard::default()));
        let shutdown = AtomicBool::new(false);
        let mut received = Vec::new();
        let mut expected_seq = 0;
        stream(&mut dev, &settings(1000, 100), &shutdown, |chunk| {
            assert_eq!(chunk.seq, expected_seq);
            expected_seq += 1;
            assert!(chunk.offset + chunk.len() <= 1000);
            received.extend_from_slice(chunk.bytes());
            if received.len() >= 3500 {
                shutdown.store(true, Ordering::Release);
            }
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(received.len(), 3500);
        for (i, byte) in received.iter().enumerate() {
            assert_eq!(*byte, pattern_byte(i as u64), "byte {i}");
        }
    }

    #[test]
    fn continuous_memory_streams_the_same() {
        let card = SimCard {
            continuous_len: 2000,
            ..SimCard::default()
        };
        let mut dev = configured(SimDriver::new(card));
        let shutdown = AtomicBool::new(false);
        let mut received = Vec::new();
        stream(&mut dev, &settings(1000, 250), &shutdown, |chunk| {
            received.extend_from_slice(chunk.bytes());
            if received.len() >= 1500 {
                shutdown.store(true, Ordering::Release);
            }
            ControlFlow::Continue(())
        })
        .unwrap();
        assert!(received.iter().enumerate().all(|(i, b)| *b == pattern_byte(i as u64)));
    }

    #[test]
    fn invalid_settings_are_rejected_before_start() {
        let mut dev = configured(SimDriver::new(SimCard::default()));
        let shutdown = AtomicBool::new(false);
        let zero_timeout = StreamSettings {
            timeout: Duration::ZERO,
            ..settings(1000, 100)
        };
        let sub_ms_timeout = StreamSettings {
            timeout: Duration::from_micros(500),
            ..settings(1000, 100)
        };
        for s in [
            settings(0, 1),
            settings(1000, 0),
            settings(1000, 300),
            settings(100, 200),
            zero_timeout,
            sub_ms_timeout,
        ] {
            let res = stream(&mut dev, &s, &shutdown, |_| ControlFlow::Continue(()));
            assert!(matches!(res, Err(SpcmError::InvalidConfiguration { .. })), "{s:?}");
        }
        assert_eq!(dev.driver().written(SPC_M2CMD), None);
    }

    #[test]
    fn continuous_buffer_failure_aborts_before_start() {
        let mut dev = configured(SimDriver::new(SimCard::default()).fail_cont_buf(ERR_NOACCESS));
        let shutdown = AtomicBool::new(false);
        let mut delivered = 0;
        let res = stream(&mut dev, &settings(1000, 100), &shutdown, |_| {
            delivered += 1;
            ControlFlow::Continue(())
        });
        match res {
            Err(SpcmError::Driver { code, message, .. }) => {
                assert_eq!(code, ErrorCode(ERR_NOACCESS));
                assert_eq!(message, "continuous buffer not accessible");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(delivered, 0);
        assert!(dev.driver().writes().iter().all(|(r, _)| *r != SPC_M2CMD));
        assert_eq!(dev.driver().written(SPC_TIMEOUT), None);
    }

    #[test]
    fn unconfigured_device_does_not_start() {
        let mut dev = Device::open(SimDriver::new(SimCard::default()), "sim0").unwrap();
        let shutdown = AtomicBool::new(false);
        let res = stream(&mut dev, &settings(1000, 100), &shutdown, |_| {
            ControlFlow::Continue(())
        });
        assert!(matches!(res, Err(SpcmError::InvalidConfiguration { .. })));
    }

    #[test]
    fn worker_delivers_in_order_and_cancels() {
        let dev = configured(SimDriver::new(SimCard::default()));
        let (tx, rx) = unbounded();
        let acq = Acquisition::spawn(dev, settings(1000, 100), tx).unwrap();
        let mut seqs = Vec::new();
        while seqs.len() < 20 {
            let chunk = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            seqs.push(chunk.seq);
        }
        let cancelled_at = Instant::now();
        acq.cancel();
        let stats = acq.join().unwrap();
        assert!(cancelled_at.elapsed() < Duration::from_secs(1));
        seqs.extend(rx.try_iter().map(|c| c.seq));
        assert_eq!(seqs.len() as u64, stats.chunks);
        assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
        // sender dropped with the worker
        assert!(rx.recv().is_err());
    }

    #[test]
    fn worker_stops_when_receiver_is_dropped() {
        let dev = configured(SimDriver::new(SimCard::default()));
        let (tx, rx) = bounded(4);
        let acq = Acquisition::spawn(dev, settings(1000, 100), tx).unwrap();
        let _ = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        drop(rx);
        let stats = acq.join().unwrap();
        assert!(stats.chunks >= 1);
    }

    #[test]
    fn worker_reports_overrun() {
        let dev = configured(
            SimDriver::new(SimCard::default()).with_script([DmaStep::Data { offset: 0, len: 500 }]),
        );
        let (tx, rx) = unbounded();
        let acq = Acquisition::spawn(dev, settings(500, 100), tx).unwrap();
        assert!(acq.join().unwrap_err().is_overrun());
        assert!(rx.try_recv().is_err());
    }
}
