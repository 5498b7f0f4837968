use crate::{
    ChannelTrigger, Edge, ExternalTrigger, Payload, PulseWidth, RecordMode, StreamSettings,
    TriggerMode, TriggerSetup,
};
use confique::Config;
use serde::Deserialize;
use std::time::Duration;

#[derive(Config, Debug, Clone)]
pub struct Conf {
    #[config(nested)]
    pub run_settings: RunSettings,
    #[config(nested)]
    pub card_settings: CardSettings,
    #[config(nested)]
    pub mode_settings: ModeSettings,
    #[config(nested)]
    pub trigger_settings: TriggerSettings,
    #[config(nested)]
    pub stream_settings: StreamConf,
}

#[derive(Config, Debug, Clone)]
pub struct RunSettings {
    #[config(default = "data")]
    pub output_dir: String,
    #[config(default = 0)]
    pub campaign_num: usize,
    /// Seconds; 0 runs until stopped.
    #[config(default = 0)]
    pub run_duration: u64,
    #[config(default = false)]
    pub simulate: bool,
    /// Data produced by the simulated card; defaults to counter.
    pub sim_payload: Option<Payload>,
    /// Defaults to raw.
    pub file_format: Option<FileFormat>,
    #[config(default = "spcm_daq.log")]
    pub log_file: String,
    #[config(default = "info")]
    pub log_level: String,
    #[config(default = 5)]
    pub blosc_threads: u8,
    #[config(default = 2)]
    pub compression_level: u8,
}

#[derive(Config, Debug, Clone)]
pub struct CardSettings {
    #[config(default = "/dev/spcm0")]
    pub device: String,
    #[config(default = 200_000_000)]
    pub sample_rate: i64,
    #[config(default = false)]
    pub clock_out: bool,
}

#[derive(Config, Debug, Clone)]
pub struct ModeSettings {
    /// Defaults to FIFO single.
    pub mode: Option<ModeKind>,
    #[config(default = 255)]
    pub channel_mask: u64,
    #[config(default = 1024)]
    pub pre_trigger: i64,
    #[config(default = 1024)]
    pub post_trigger: i64,
    #[config(default = 4096)]
    pub segment_size: i64,
    /// 0 records until stopped.
    #[config(default = 0)]
    pub loops: i64,
}

#[derive(Config, Debug, Clone)]
pub struct TriggerSettings {
    /// Defaults to the software trigger.
    pub source: Option<TriggerSource>,
    #[config(default = false)]
    pub trigger_out: bool,
    #[config(default = true)]
    pub single: bool,
    /// Defaults to the rising edge.
    pub edge: Option<Edge>,
    pub pulse_width_mode: Option<PulseWidth>,
    #[config(default = 0)]
    pub pulse_width: i32,
    #[config(default = 0)]
    pub ext_line: u8,
    #[config(default = false)]
    pub termination: bool,
    #[config(default = false)]
    pub ac_coupling: bool,
    #[config(default = 1500)]
    pub ext_level0_mv: i32,
    #[config(default = 800)]
    pub ext_level1_mv: i32,
    #[config(default = 0)]
    pub channel: usize,
    #[config(default = 0)]
    pub channel_level0: i32,
    #[config(default = 0)]
    pub channel_level1: i32,
}

#[derive(Config, Debug, Clone)]
pub struct StreamConf {
    #[config(default = 167_772_160)]
    pub buffer_size: usize,
    #[config(default = 10_485_760)]
    pub notify_size: usize,
    #[config(default = 100)]
    pub timeout_ms: u64,
    /// Chunks held between the card and the writer; 0 is unbounded.
    #[config(default = 0)]
    pub queue_capacity: usize,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    FifoSingle,
    FifoMulti,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Software,
    External,
    Channel,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Raw,
    Hdf5,
    None,
}

impl Conf {
    pub fn record_mode(&self) -> RecordMode {
        let m = &self.mode_settings;
        match m.mode.unwrap_or(ModeKind::FifoSingle) {
            ModeKind::FifoSingle => RecordMode::FifoSingle {
                channel_mask: m.channel_mask,
                pre_trigger: m.pre_trigger,
                segment_size: m.segment_size,
                loops: m.loops,
            },
            ModeKind::FifoMulti => RecordMode::FifoMulti {
                channel_mask: m.channel_mask,
                segment_size: m.segment_size,
                post_trigger: m.post_trigger,
                loops: m.loops,
            },
        }
    }

    pub fn trigger_setup(&self) -> TriggerSetup {
        let t = &self.trigger_settings;
        let mode = TriggerMode {
            edge: t.edge.unwrap_or(Edge::Pos),
            pulse_width: t.pulse_width_mode,
        };
        match t.source.unwrap_or(TriggerSource::Software) {
            TriggerSource::Software => TriggerSetup::Software {
                trigger_out: t.trigger_out,
            },
            TriggerSource::External => TriggerSetup::External(ExternalTrigger {
                line: t.ext_line,
                mode,
                termination: t.termination,
                pulse_width: t.pulse_width,
                trigger_out: t.trigger_out,
                single: t.single,
                level0_mv: t.ext_level0_mv,
                level1_mv: t.ext_level1_mv,
                ac_coupling: t.ac_coupling,
            }),
            TriggerSource::Channel => TriggerSetup::Channel(ChannelTrigger {
                channel: t.channel,
                mode,
                level0: t.channel_level0,
                level1: t.channel_level1,
                pulse_width: t.pulse_width,
                trigger_out: t.trigger_out,
                single: t.single,
            }),
        }
    }

    pub fn file_format(&self) -> FileFormat {
        self.run_settings.file_format.unwrap_or(FileFormat::Raw)
    }

    pub fn sim_payload(&self) -> Payload {
        self.run_settings.sim_payload.unwrap_or_default()
    }

    pub fn stream(&self) -> StreamSettings {
        let s = &self.stream_settings;
        StreamSettings {
            buffer_size: s.buffer_size,
            notify_size: s.notify_size,
            timeout: Duration::from_millis(s.timeout_ms),
        }
    }
}
