use crate::regs::*;
use crate::{Driver, Registers, Result, SpcmError};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CardFunction {
    AnalogIn,
    AnalogOut,
    DigitalIn,
    DigitalOut,
    DigitalIo,
}

impl CardFunction {
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            SPCM_TYPE_AI => Some(Self::AnalogIn),
            SPCM_TYPE_AO => Some(Self::AnalogOut),
            SPCM_TYPE_DI => Some(Self::DigitalIn),
            SPCM_TYPE_DO => Some(Self::DigitalOut),
            SPCM_TYPE_DIO => Some(Self::DigitalIo),
            _ => None,
        }
    }

    pub fn is_analog(self) -> bool {
        matches!(self, Self::AnalogIn | Self::AnalogOut)
    }
}

/// Card families, from the series bits of `SPC_PCITYP`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CardSeries {
    M2i,
    M2iExpress,
    M3i,
    M3iExpress,
    M4iExpress,
    M4xExpress,
    Other(i32),
}

/// Which external-trigger registers a series implements.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExtTriggerProfile {
    /// Trigger output and external pulse width registers.
    pub trigger_out: bool,
    /// EXT0 level0/level1 must be programmed explicitly.
    pub ext0_levels: bool,
    /// EXT0 AC/DC coupling plus a second external line (EXT1 level0, AC/DC).
    pub coupling_and_ext1: bool,
}

impl CardSeries {
    pub fn from_card_type(card_type: i32) -> Self {
        match card_type & TYP_SERIESMASK {
            TYP_M2ISERIES => Self::M2i,
            TYP_M2IEXPSERIES => Self::M2iExpress,
            TYP_M3ISERIES => Self::M3i,
            TYP_M3IEXPSERIES => Self::M3iExpress,
            TYP_M4IEXPSERIES => Self::M4iExpress,
            TYP_M4XEXPSERIES => Self::M4xExpress,
            other => Self::Other(other),
        }
    }

    pub fn ext_trigger_profile(self) -> ExtTriggerProfile {
        match self {
            Self::M2i | Self::M2iExpress => ExtTriggerProfile {
                trigger_out: true,
                ext0_levels: false,
                coupling_and_ext1: false,
            },
            Self::M3i | Self::M3iExpress => ExtTriggerProfile {
                trigger_out: false,
                ext0_levels: true,
                coupling_and_ext1: false,
            },
            Self::M4iExpress | Self::M4xExpress => ExtTriggerProfile {
                trigger_out: false,
                ext0_levels: true,
                coupling_and_ext1: true,
            },
            Self::Other(_) => ExtTriggerProfile {
                trigger_out: false,
                ext0_levels: false,
                coupling_and_ext1: false,
            },
        }
    }

    fn name_parts(self) -> (&'static str, &'static str) {
        match self {
            Self::M2i => ("M2i", ""),
            Self::M2iExpress => ("M2i", "-Exp"),
            Self::M3i => ("M3i", ""),
            Self::M3iExpress => ("M3i", "-Exp"),
            Self::M4iExpress => ("M4i", "-x8"),
            Self::M4xExpress => ("M4x", "-x4"),
            Self::Other(_) => ("Unknown", ""),
        }
    }
}

/// Limits read from the card once at open.
#[derive(Clone, Debug, PartialEq)]
pub struct CardCapabilities {
    pub card_type: i32,
    pub function: CardFunction,
    pub serial_number: i32,
    pub min_sample_rate: i64,
    pub max_sample_rate: i64,
    pub modules: i32,
    pub channels_per_module: i32,
    pub bytes_per_sample: i32,
}

impl CardCapabilities {
    pub fn read<D: Driver>(regs: &mut Registers<D>) -> Result<Self> {
        let card_type = regs.get_i32(SPC_PCITYP)?;
        let raw_function = regs.get_i32(SPC_FNCTYPE)?;
        let function = CardFunction::from_raw(raw_function).ok_or_else(|| SpcmError::Open {
            device: regs.device().to_string(),
            reason: format!("unsupported card function 0x{raw_function:x}"),
        })?;
        Ok(Self {
            card_type,
            function,
            serial_number: regs.get_i32(SPC_PCISERIALNO)?,
            min_sample_rate: regs.get_i64(SPC_MIINST_MINADCLOCK)?,
            max_sample_rate: regs.get_i64(SPC_MIINST_MAXADCLOCK)?,
            modules: regs.get_i32(SPC_MIINST_MODULES)?,
            channels_per_module: regs.get_i32(SPC_MIINST_CHPERMODULE)?,
            bytes_per_sample: regs.get_i32(SPC_MIINST_BYTESPERSAMPLE)?,
        })
    }

    pub fn series(&self) -> CardSeries {
        CardSeries::from_card_type(self.card_type)
    }

    pub fn max_channels(&self) -> usize {
        (self.modules.max(0) as usize) * (self.channels_per_module.max(0) as usize)
    }

    /// Vendor style model name, e.g. `M4i.4480-x8`.
    pub fn model_name(&self) -> String {
        let (prefix, suffix) = self.series().name_parts();
        format!("{prefix}.{:04x}{suffix}", self.card_type & TYP_VERSIONMASK)
    }

    pub fn check_sample_rate(&self, sample_rate: i64) -> Result<()> {
        if sample_rate < self.min_sample_rate || sample_rate > self.max_sample_rate {
            return Err(SpcmError::invalid(
                "sample rate",
                format!(
                    "{sample_rate} S/s outside [{}, {}]",
                    self.min_sample_rate, self.max_sample_rate
                ),
            ));
        }
        Ok(())
    }

    pub fn check_channel(&self, channel: usize) -> Result<()> {
        if channel >= self.max_channels() {
            return Err(SpcmError::invalid(
                "channel",
                format!("{channel} not in [0, {})", self.max_channels()),
            ));
        }
        Ok(())
    }

    pub fn check_channel_mask(&self, mask: u64) -> Result<()> {
        let max = self.max_channels();
        if mask == 0 || (max < 64 && mask >> max != 0) {
            return Err(SpcmError::invalid(
                "channel mask",
                format!("0x{mask:x} does not select channels in [0, {max})"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for CardCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sn {:05} ({:?}, {} ch, {} B/sample, {}..{} S/s)",
            self.model_name(),
            self.serial_number,
            self.function,
            self.max_channels(),
            self.bytes_per_sample,
            self.min_sample_rate,
            self.max_sample_rate
        )
    }
}
