use anyhow::{bail, Context, Result};
use clap::Parser;
use confique::Config;
use crossbeam_channel::{bounded, unbounded};
use log::{error, info, LevelFilter};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode, WriteLogger,
};
use spcm_daq::*;
use std::{fs::File, path::PathBuf, thread, time::Duration};
use time::macros::format_description;

#[derive(Parser, Debug)]
#[command(name = "spcm_daq")]
#[command(about = "Stream data from a Spectrum digitizer to disk", long_about = None)]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Use the simulated card instead of the driver
    #[arg(long)]
    simulate: bool,

    /// Run duration in seconds, overrides the configuration (0 runs until stopped)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Log to the terminal instead of showing the status screen
    #[arg(long)]
    headless: bool,
}

fn init_logging(config: &Conf, headless: bool) -> Result<()> {
    let level = config
        .run_settings
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::Info);
    let log_config = ConfigBuilder::new()
        .set_time_format_custom(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .set_thread_level(LevelFilter::Debug)
        .build();
    let log_file = File::create(&config.run_settings.log_file)
        .with_context(|| format!("creating log file {}", config.run_settings.log_file))?;

    if headless {
        CombinedLogger::init(vec![
            TermLogger::new(
                level,
                log_config.clone(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            ),
            WriteLogger::new(level, log_config, log_file),
        ])?;
    } else {
        WriteLogger::init(level, log_config, log_file)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Conf::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(duration) = args.duration {
        config.run_settings.run_duration = duration;
    }
    init_logging(&config, args.headless)?;

    if args.simulate || config.run_settings.simulate {
        let payload = config.sim_payload();
        info!("Using the simulated card ({payload:?} data)");
        let driver = SimDriver::new(SimCard::default())
            .realtime(true)
            .payload(payload);
        run(driver, &config, args.headless)
    } else {
        native(&config, args.headless)
    }
}

#[cfg(feature = "spcm")]
fn native(config: &Conf, headless: bool) -> Result<()> {
    run(SpcmDriver::new(), config, headless)
}

#[cfg(not(feature = "spcm"))]
fn native(_config: &Conf, _headless: bool) -> Result<()> {
    bail!("built without the `spcm` feature; rebuild with it or pass --simulate")
}

fn open_writer(config: &Conf, run: &RunInfo) -> Result<(usize, Option<Box<dyn ChunkWriter>>)> {
    let output_dir = PathBuf::from(&config.run_settings.output_dir);
    let campaign = config.run_settings.campaign_num;
    match config.file_format() {
        FileFormat::None => Ok((0, None)),
        FileFormat::Raw => {
            let (run_num, path) = next_run_file(&output_dir, campaign, "bin")?;
            let writer: Box<dyn ChunkWriter> = Box::new(RawWriter::create(path, run)?);
            Ok((run_num, Some(writer)))
        }
        #[cfg(feature = "hdf5")]
        FileFormat::Hdf5 => {
            let (run_num, path) = next_run_file(&output_dir, campaign, "h5")?;
            let writer: Box<dyn ChunkWriter> = Box::new(Hdf5Writer::create(
                path,
                run,
                config.stream_settings.notify_size,
                config.run_settings.blosc_threads,
                config.run_settings.compression_level,
            )?);
            Ok((run_num, Some(writer)))
        }
        #[cfg(not(feature = "hdf5"))]
        FileFormat::Hdf5 => bail!("built without the `hdf5` feature; use file_format = \"raw\""),
    }
}

fn run<D: Driver + 'static>(driver: D, config: &Conf, headless: bool) -> Result<()> {
    let mut device = Device::open(driver, &config.card_settings.device)?;
    card_info::log_all(&mut device);
    configure_card(&mut device, config)?;

    let run = RunInfo::from_device(&device);
    let card = device.capabilities().to_string();
    let (run_num, writer) = open_writer(config, &run)?;

    let capacity = config.stream_settings.queue_capacity;
    let (tx, rx) = if capacity > 0 {
        bounded(capacity)
    } else {
        unbounded()
    };
    let (tx_stats, rx_stats) = unbounded();

    let acquisition = Acquisition::spawn(device, config.stream(), tx)?;
    let processing = thread::Builder::new()
        .name("chunk-processing".into())
        .spawn(move || chunk_processing(rx, tx_stats, writer))?;

    let mut status = Status::new(
        card,
        config.run_settings.campaign_num,
        run_num,
        Duration::from_secs(config.run_settings.run_duration),
    );
    let exit = if headless {
        status.run_headless(&rx_stats, &acquisition)
    } else {
        let mut terminal = ratatui::init();
        let exit = status.run(&mut terminal, &rx_stats, &acquisition);
        ratatui::restore();
        exit?
    };
    info!("Status loop ended: {exit:?}");

    // worker first, so the processing thread sees the channel close
    acquisition.cancel();
    let streamed = acquisition.join();
    let consumed = match processing.join() {
        Ok(res) => res?,
        Err(_) => bail!("chunk processing thread panicked"),
    };

    match streamed {
        Ok(stats) => {
            info!(
                "Run {run_num}: {} chunks ({} bytes, {} timeouts) streamed, {consumed} processed",
                stats.chunks, stats.bytes, stats.timeouts
            );
            Ok(())
        }
        Err(e) => {
            error!("Run {run_num} failed after {consumed} chunks: {e}");
            Err(e.into())
        }
    }
}
