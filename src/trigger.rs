use crate::regs::*;
use crate::{CardCapabilities, Driver, Registers, Result, SpcmError};
use log::debug;
use serde::Deserialize;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    None,
    Pos,
    Neg,
    Both,
    High,
    Low,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PulseWidth {
    Smaller,
    Greater,
}

/// Trigger condition for one source: an edge or level, optionally qualified
/// by a pulse width comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerMode {
    pub edge: Edge,
    pub pulse_width: Option<PulseWidth>,
}

impl TriggerMode {
    pub const fn edge(edge: Edge) -> Self {
        Self {
            edge,
            pulse_width: None,
        }
    }

    pub fn bits(self) -> i32 {
        let edge = match self.edge {
            Edge::None => SPC_TM_NONE,
            Edge::Pos => SPC_TM_POS,
            Edge::Neg => SPC_TM_NEG,
            Edge::Both => SPC_TM_BOTH,
            Edge::High => SPC_TM_HIGH,
            Edge::Low => SPC_TM_LOW,
        };
        match self.pulse_width {
            None => edge,
            Some(PulseWidth::Smaller) => edge | SPC_TM_PW_SMALLER,
            Some(PulseWidth::Greater) => edge | SPC_TM_PW_GREATER,
        }
    }

    pub fn is_pulse_width(self) -> bool {
        self.pulse_width.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExternalTrigger {
    pub line: u8,
    pub mode: TriggerMode,
    pub termination: bool,
    pub pulse_width: i32,
    pub trigger_out: bool,
    pub single: bool,
    pub level0_mv: i32,
    pub level1_mv: i32,
    pub ac_coupling: bool,
}

impl Default for ExternalTrigger {
    fn default() -> Self {
        Self {
            line: 0,
            mode: TriggerMode::edge(Edge::Pos),
            termination: false,
            pulse_width: 0,
            trigger_out: false,
            single: true,
            level0_mv: 1500,
            level1_mv: 800,
            ac_coupling: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChannelTrigger {
    pub channel: usize,
    pub mode: TriggerMode,
    pub level0: i32,
    pub level1: i32,
    pub pulse_width: i32,
    pub trigger_out: bool,
    pub single: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TriggerSetup {
    Software { trigger_out: bool },
    External(ExternalTrigger),
    Channel(ChannelTrigger),
}

fn clear_masks<D: Driver>(regs: &mut Registers<D>) -> Result<()> {
    regs.set_i32(SPC_TRIG_ORMASK, SPC_TMASK_NONE)?;
    regs.set_i32(SPC_TRIG_ANDMASK, 0)?;
    regs.set_i32(SPC_TRIG_CH_ORMASK0, 0)?;
    regs.set_i32(SPC_TRIG_CH_ORMASK1, 0)?;
    regs.set_i32(SPC_TRIG_CH_ANDMASK0, 0)?;
    regs.set_i32(SPC_TRIG_CH_ANDMASK1, 0)
}

fn add_to_mask<D: Driver>(regs: &mut Registers<D>, register: i32, bits: i32) -> Result<()> {
    let current = regs.get_i32(register)?;
    regs.set_i32(register, current | bits)
}

pub(crate) fn setup_software<D: Driver>(regs: &mut Registers<D>, trigger_out: bool) -> Result<()> {
    regs.set_i32(SPC_TRIG_ORMASK, SPC_TMASK_SOFTWARE)?;
    regs.set_i32(SPC_TRIG_ANDMASK, 0)?;
    regs.set_i32(SPC_TRIG_CH_ORMASK0, 0)?;
    regs.set_i32(SPC_TRIG_CH_ORMASK1, 0)?;
    regs.set_i32(SPC_TRIG_CH_ANDMASK0, 0)?;
    regs.set_i32(SPC_TRIG_CH_ANDMASK1, 0)?;
    regs.set_i32(SPC_TRIGGEROUT, trigger_out as i32)?;
    debug!("Software trigger armed (trigger out {trigger_out})");
    Ok(())
}

pub(crate) fn setup_external<D: Driver>(
    regs: &mut Registers<D>,
    caps: &CardCapabilities,
    ext: &ExternalTrigger,
) -> Result<()> {
    let profile = caps.series().ext_trigger_profile();
    let max_line = if profile.coupling_and_ext1 || !(profile.trigger_out || profile.ext0_levels) {
        1
    } else {
        0
    };
    if ext.line > max_line {
        return Err(SpcmError::invalid(
            "external trigger line",
            format!("EXT{} not available on {}", ext.line, caps.model_name()),
        ));
    }
    let line = ext.line as i32;
    let mask = if line == 0 {
        SPC_TMASK_EXT0
    } else {
        SPC_TMASK_EXT1
    };

    if ext.single {
        clear_masks(regs)?;
        regs.set_i32(SPC_TRIG_ORMASK, mask)?;
    } else {
        add_to_mask(regs, SPC_TRIG_ORMASK, mask)?;
    }

    regs.set_i32(SPC_TRIG_EXT0_MODE + line, ext.mode.bits())?;
    regs.set_i32(SPC_TRIG_TERM, ext.termination as i32)?;

    if profile.trigger_out {
        regs.set_i32(SPC_TRIG_EXT0_PULSEWIDTH + line, ext.pulse_width)?;
        regs.set_i32(SPC_TRIG_OUTPUT, ext.trigger_out as i32)?;
    }
    if profile.coupling_and_ext1 {
        if line == 0 {
            regs.set_i32(SPC_TRIG_EXT0_ACDC, ext.ac_coupling as i32)?;
            regs.set_i32(SPC_TRIG_EXT0_LEVEL0, ext.level0_mv)?;
            regs.set_i32(SPC_TRIG_EXT0_LEVEL1, ext.level1_mv)?;
        } else {
            regs.set_i32(SPC_TRIG_EXT1_ACDC, ext.ac_coupling as i32)?;
            regs.set_i32(SPC_TRIG_EXT1_LEVEL0, ext.level0_mv)?;
        }
    } else if profile.ext0_levels {
        regs.set_i32(SPC_TRIG_EXT0_LEVEL0, ext.level0_mv)?;
        regs.set_i32(SPC_TRIG_EXT0_LEVEL1, ext.level1_mv)?;
    }
    debug!(
        "External trigger EXT{line} mode 0x{:x} on {:?}",
        ext.mode.bits(),
        caps.series()
    );
    Ok(())
}

pub(crate) fn setup_channel<D: Driver>(
    regs: &mut Registers<D>,
    caps: &CardCapabilities,
    trig: &ChannelTrigger,
) -> Result<()> {
    caps.check_channel(trig.channel)?;
    let channel = trig.channel as i32;

    // pulse width qualified modes are combined through the AND mask
    let (mask_lo, mask_hi) = if trig.mode.is_pulse_width() {
        (SPC_TRIG_CH_ANDMASK0, SPC_TRIG_CH_ANDMASK1)
    } else {
        (SPC_TRIG_CH_ORMASK0, SPC_TRIG_CH_ORMASK1)
    };
    let (mask_reg, bit) = if channel < 32 {
        (mask_lo, 1i32 << channel)
    } else {
        (mask_hi, 1i32 << (channel - 32))
    };

    if trig.single {
        clear_masks(regs)?;
        regs.set_i32(mask_reg, bit)?;
    } else {
        add_to_mask(regs, mask_reg, bit)?;
    }

    regs.set_i32(SPC_TRIG_CH0_MODE + channel, trig.mode.bits())?;
    regs.set_i32(SPC_TRIG_CH0_PULSEWIDTH + channel, trig.pulse_width)?;
    if caps.function.is_analog() {
        regs.set_i32(SPC_TRIG_CH0_LEVEL0 + channel, trig.level0)?;
        regs.set_i32(SPC_TRIG_CH0_LEVEL1 + channel, trig.level1)?;
    }
    if caps.series().ext_trigger_profile().trigger_out {
        regs.set_i32(SPC_TRIG_OUTPUT, trig.trigger_out as i32)?;
    }
    debug!(
        "Channel trigger CH{channel} mode 0x{:x} via register {mask_reg}",
        trig.mode.bits()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits_combine_edge_and_pulse_width() {
        assert_eq!(TriggerMode::edge(Edge::Pos).bits(), SPC_TM_POS);
        let pw = TriggerMode {
            edge: Edge::Neg,
            pulse_width: Some(PulseWidth::Greater),
        };
        assert_eq!(pw.bits(), SPC_TM_NEG | SPC_TM_PW_GREATER);
        assert!(pw.is_pulse_width());
        assert!(!TriggerMode::edge(Edge::High).is_pulse_width());
    }

    #[test]
    fn external_defaults_use_vendor_levels() {
        let ext = ExternalTrigger::default();
        assert_eq!((ext.level0_mv, ext.level1_mv), (1500, 800));
        assert!(ext.single);
    }
}
