use crate::regs::*;
use crate::{Device, Driver};
use log::info;

/// Identification and limit registers dumped at start-up.
const CARD_REGISTERS: &[(&str, i32)] = &[
    ("PCITYP", SPC_PCITYP),
    ("FNCTYPE", SPC_FNCTYPE),
    ("PCIVERSION", SPC_PCIVERSION),
    ("PCIDATE", SPC_PCIDATE),
    ("PCISERIALNO", SPC_PCISERIALNO),
    ("PCIMEMSIZE", SPC_PCIMEMSIZE),
    ("PCIFEATURES", SPC_PCIFEATURES),
    ("MIINST_MODULES", SPC_MIINST_MODULES),
    ("MIINST_CHPERMODULE", SPC_MIINST_CHPERMODULE),
    ("MIINST_BYTESPERSAMPLE", SPC_MIINST_BYTESPERSAMPLE),
    ("MIINST_BITSPERSAMPLE", SPC_MIINST_BITSPERSAMPLE),
    ("MIINST_MAXADCVALUE", SPC_MIINST_MAXADCVALUE),
    ("MIINST_MINADCLOCK", SPC_MIINST_MINADCLOCK),
    ("MIINST_MAXADCLOCK", SPC_MIINST_MAXADCLOCK),
];

/// Driver version words are packed as major.minor.build (8/8/16 bits).
const VERSION_REGISTERS: &[(&str, i32)] = &[
    ("GETDRVVERSION", SPC_GETDRVVERSION),
    ("GETKERNELVERSION", SPC_GETKERNELVERSION),
];

fn unpack_version(word: i64) -> String {
    format!(
        "{}.{}.{}",
        (word >> 24) & 0xff,
        (word >> 16) & 0xff,
        word & 0xffff
    )
}

/// Reads every identification register that the card answers and logs them
/// in one block. Registers the card rejects are skipped.
pub fn log_all<D: Driver>(device: &mut Device<D>) -> String {
    let mut param_log = format!("Model: {}\n", device.capabilities().model_name());

    for &(name, register) in CARD_REGISTERS {
        if let Ok(value) = device.get_i64(register) {
            param_log.push_str(&format!("{name}: {value}\n"));
        }
    }
    for &(name, register) in VERSION_REGISTERS {
        if let Ok(value) = device.get_i64(register) {
            param_log.push_str(&format!("{name}: {}\n", unpack_version(value)));
        }
    }

    if param_log.ends_with('\n') {
        param_log.pop();
    }
    info!("Card {} parameters:\n{}", device.name(), param_log);
    param_log
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SimCard, SimDriver};

    #[test]
    fn dump_lists_answered_registers() {
        let mut dev = Device::open(
            SimDriver::new(SimCard::default()).fail_on(SPC_PCIFEATURES),
            "sim0",
        )
        .unwrap();
        let dump = log_all(&mut dev);
        assert!(dump.starts_with("Model: M4i.4480-x8"));
        assert!(dump.contains("PCISERIALNO: 12345"));
        assert!(dump.contains("MIINST_MAXADCLOCK: 500000000"));
        assert!(!dump.contains("PCIFEATURES"));
        assert!(dump.contains("GETDRVVERSION: 0.0.0"));
    }

    #[test]
    fn version_words_unpack() {
        assert_eq!(unpack_version(0x0712_1a2b), "7.18.6699");
    }
}
