use crate::{Conf, Device, Driver, Result};
use log::info;
use std::{
    collections::VecDeque,
    fs,
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Throughput statistics: all-time totals plus a 1 s sliding window rate.
#[derive(Debug, Clone)]
pub struct Counter {
    pub total_bytes: u64,
    pub chunks: u64,
    pub t_begin: Instant,

    window: Duration,
    recent: VecDeque<(Instant, usize)>,
    bytes_in_window: usize,
}

impl Default for Counter {
    fn default() -> Self {
        Self::with_window(Duration::from_secs(1))
    }
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            total_bytes: 0,
            chunks: 0,
            t_begin: Instant::now(),
            window,
            recent: VecDeque::new(),
            bytes_in_window: 0,
        }
    }

    /// MiB/s since `t_begin`.
    pub fn average_rate(&self) -> f64 {
        let secs = self.t_begin.elapsed().as_secs_f64().max(1e-6);
        (self.total_bytes as f64 / secs) / (1024.0 * 1024.0)
    }

    /// MiB/s over the sliding window.
    pub fn rate(&self) -> f64 {
        let secs = self.window.as_secs_f64().max(1e-6);
        (self.bytes_in_window as f64 / secs) / (1024.0 * 1024.0)
    }

    pub fn increment(&mut self, size: usize) {
        self.increment_at(Instant::now(), size);
    }

    fn increment_at(&mut self, now: Instant, size: usize) {
        self.total_bytes += size as u64;
        self.chunks += 1;

        self.recent.push_back((now, size));
        self.bytes_in_window += size;
        while let Some(&(ts, sz)) = self.recent.front() {
            if now.duration_since(ts) > self.window {
                self.recent.pop_front();
                self.bytes_in_window -= sz;
            } else {
                break;
            }
        }
    }

    pub fn reset(&mut self) {
        self.total_bytes = 0;
        self.chunks = 0;
        self.t_begin = Instant::now();
        self.recent.clear();
        self.bytes_in_window = 0;
    }
}

/// Applies clock, acquisition mode and trigger from `config`, in that order.
pub fn configure_card<D: Driver>(device: &mut Device<D>, config: &Conf) -> Result<()> {
    device.setup_clock_pll(
        config.card_settings.sample_rate,
        config.card_settings.clock_out,
    )?;
    device.setup_mode(&config.record_mode())?;
    device.setup_trigger(&config.trigger_setup())?;
    info!("Card {} configured", device.name());
    Ok(())
}

/// `<output_dir>/camp<N>`, created when missing.
pub fn create_camp_dir(output_dir: &Path, campaign: usize) -> io::Result<PathBuf> {
    let path = output_dir.join(format!("camp{campaign}"));
    if !path.exists() {
        fs::create_dir_all(&path)?;
        info!("Created campaign directory {}", path.display());
    }
    Ok(path)
}

/// Next free run file in the campaign directory: `run<M>_0.<ext>` with `M` one
/// past the highest run number present, whatever its extension.
pub fn next_run_file(output_dir: &Path, campaign: usize, ext: &str) -> io::Result<(usize, PathBuf)> {
    let camp_dir = create_camp_dir(output_dir, campaign)?;
    let max_run = fs::read_dir(&camp_dir)?
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let stripped = name.to_str()?.strip_prefix("run")?.to_owned();
            stripped.split('_').next()?.parse::<usize>().ok()
        })
        .max();
    let run = max_run.map_or(0, |max| max + 1);
    Ok((run, camp_dir.join(format!("run{run}_0.{ext}"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_window_drops_old_entries() {
        let mut counter = Counter::with_window(Duration::from_secs(1));
        let t0 = Instant::now();
        counter.increment_at(t0, 1024 * 1024);
        counter.increment_at(t0 + Duration::from_millis(500), 1024 * 1024);
        assert!((counter.rate() - 2.0).abs() < 1e-9);
        counter.increment_at(t0 + Duration::from_millis(1400), 1024 * 1024);
        assert!((counter.rate() - 2.0).abs() < 1e-9);
        assert_eq!(counter.chunks, 3);
        assert_eq!(counter.total_bytes, 3 * 1024 * 1024);
        counter.reset();
        assert_eq!(counter.rate(), 0.0);
    }

    #[test]
    fn average_rate_covers_the_whole_run() {
        let mut counter = Counter::new();
        assert_eq!(counter.average_rate(), 0.0);
        counter.t_begin = Instant::now() - Duration::from_secs(4);
        counter.increment(2 * 1024 * 1024);
        counter.increment(2 * 1024 * 1024);
        let rate = counter.average_rate();
        assert!(rate > 0.9 && rate <= 1.0, "{rate}");
        assert!(counter.rate() > rate);
    }

    #[test]
    fn run_numbers_continue_after_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let (run, path) = next_run_file(dir.path(), 3, "bin").unwrap();
        assert_eq!(run, 0);
        assert_eq!(path, dir.path().join("camp3").join("run0_0.bin"));

        fs::write(dir.path().join("camp3/run0_0.bin"), b"").unwrap();
        fs::write(dir.path().join("camp3/run4_0.h5"), b"").unwrap();
        fs::write(dir.path().join("camp3/notes.txt"), b"").unwrap();
        let (run, path) = next_run_file(dir.path(), 3, "bin").unwrap();
        assert_eq!(run, 5);
        assert!(path.ends_with("run5_0.bin"));
    }

    #[test]
    fn configure_card_applies_config() {
        use crate::regs::*;
        use crate::{SessionState, SimCard, SimDriver};
        use confique::Config;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.toml");
        fs::write(
            &path,
            "[card_settings]\nsample_rate = 50000000\n[mode_settings]\nchannel_mask = 15\n",
        )
        .unwrap();
        let conf = Conf::from_file(&path).unwrap();
        let mut dev = Device::open(SimDriver::new(SimCard::default()), "sim0").unwrap();
        configure_card(&mut dev, &conf).unwrap();
        assert_eq!(dev.state(), SessionState::Configured);
        assert_eq!(dev.sample_rate(), Some(50_000_000));
        assert_eq!(dev.channel_count(), 4);
        assert_eq!(
            dev.driver().written(SPC_TRIG_ORMASK),
            Some(SPC_TMASK_SOFTWARE as i64)
        );
    }
}
