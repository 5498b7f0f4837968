//! Register ids, command bits and error codes of the Spectrum `spcm` driver.
//!
//! Values match the vendor `regs.h` and `spcerr.h` headers. Only the subset the
//! crate touches is listed; anything else can be passed to
//! [`Device::get_i64`](crate::Device::get_i64) and friends as a raw id.

// ----- card information -----
pub const SPC_MIINST_MODULES: i32 = 1100;
pub const SPC_MIINST_CHPERMODULE: i32 = 1110;
pub const SPC_MIINST_BYTESPERSAMPLE: i32 = 1120;
pub const SPC_MIINST_BITSPERSAMPLE: i32 = 1125;
pub const SPC_MIINST_MAXADCVALUE: i32 = 1126;
pub const SPC_MIINST_MINADCLOCK: i32 = 1130;
pub const SPC_MIINST_MAXADCLOCK: i32 = 1140;
pub const SPC_GETDRVVERSION: i32 = 1200;
pub const SPC_GETKERNELVERSION: i32 = 1210;
pub const SPC_PCITYP: i32 = 2000;
pub const SPC_FNCTYPE: i32 = 2001;
pub const SPC_PCIVERSION: i32 = 2010;
pub const SPC_PCIDATE: i32 = 2020;
pub const SPC_PCISERIALNO: i32 = 2030;
pub const SPC_PCIMEMSIZE: i32 = 2110;
pub const SPC_PCIFEATURES: i32 = 2120;

// ----- card type -----
pub const TYP_VERSIONMASK: i32 = 0x0000_FFFF;
pub const TYP_SERIESMASK: i32 = 0x00FF_0000;
pub const TYP_M2ISERIES: i32 = 0x0003_0000;
pub const TYP_M2IEXPSERIES: i32 = 0x0004_0000;
pub const TYP_M3ISERIES: i32 = 0x0005_0000;
pub const TYP_M3IEXPSERIES: i32 = 0x0006_0000;
pub const TYP_M4IEXPSERIES: i32 = 0x0007_0000;
pub const TYP_M4XEXPSERIES: i32 = 0x0008_0000;
pub const TYP_M2PEXPSERIES: i32 = 0x0009_0000;

// ----- card function -----
pub const SPCM_TYPE_AI: i32 = 0x01;
pub const SPCM_TYPE_AO: i32 = 0x02;
pub const SPCM_TYPE_DI: i32 = 0x04;
pub const SPCM_TYPE_DO: i32 = 0x08;
pub const SPCM_TYPE_DIO: i32 = 0x10;

// ----- commands -----
pub const SPC_M2CMD: i32 = 100;
pub const M2CMD_CARD_RESET: i32 = 0x0000_0001;
pub const M2CMD_CARD_WRITESETUP: i32 = 0x0000_0002;
pub const M2CMD_CARD_START: i32 = 0x0000_0004;
pub const M2CMD_CARD_ENABLETRIGGER: i32 = 0x0000_0008;
pub const M2CMD_CARD_FORCETRIGGER: i32 = 0x0000_0010;
pub const M2CMD_CARD_DISABLETRIGGER: i32 = 0x0000_0020;
pub const M2CMD_CARD_STOP: i32 = 0x0000_0040;
pub const M2CMD_CARD_FLUSHFIFO: i32 = 0x0000_0080;
pub const M2CMD_DATA_STARTDMA: i32 = 0x0001_0000;
pub const M2CMD_DATA_WAITDMA: i32 = 0x0002_0000;
pub const M2CMD_DATA_STOPDMA: i32 = 0x0004_0000;
pub const M2CMD_DATA_POLL: i32 = 0x0008_0000;

// ----- status -----
pub const SPC_M2STATUS: i32 = 110;
pub const M2STAT_CARD_PRETRIGGER: i32 = 0x0000_0001;
pub const M2STAT_CARD_TRIGGER: i32 = 0x0000_0002;
pub const M2STAT_CARD_READY: i32 = 0x0000_0004;
pub const M2STAT_DATA_BLOCKREADY: i32 = 0x0000_0100;
pub const M2STAT_DATA_END: i32 = 0x0000_0200;
pub const M2STAT_DATA_OVERRUN: i32 = 0x0000_0400;
pub const M2STAT_DATA_ERROR: i32 = 0x0000_0800;

// ----- data transfer -----
pub const SPC_DATA_AVAIL_USER_LEN: i32 = 200;
pub const SPC_DATA_AVAIL_USER_POS: i32 = 201;
pub const SPC_DATA_AVAIL_CARD_LEN: i32 = 202;
pub const SPC_TIMEOUT: i32 = 295_130;

pub const SPCM_BUF_DATA: u32 = 1000;
pub const SPCM_BUF_ABA: u32 = 2000;
pub const SPCM_BUF_TIMESTAMP: u32 = 3000;

pub const SPCM_DIR_PCTOCARD: u32 = 0;
pub const SPCM_DIR_CARDTOPC: u32 = 1;

// ----- acquisition mode -----
pub const SPC_CARDMODE: i32 = 9500;
pub const SPC_REC_STD_SINGLE: i32 = 0x0000_0001;
pub const SPC_REC_STD_MULTI: i32 = 0x0000_0002;
pub const SPC_REC_FIFO_SINGLE: i32 = 0x0000_0010;
pub const SPC_REC_FIFO_MULTI: i32 = 0x0000_0020;

pub const SPC_MEMSIZE: i32 = 10_000;
pub const SPC_SEGMENTSIZE: i32 = 10_010;
pub const SPC_LOOPS: i32 = 10_020;
pub const SPC_PRETRIGGER: i32 = 10_030;
pub const SPC_POSTTRIGGER: i32 = 10_100;

pub const SPC_CHENABLE: i32 = 11_000;
pub const SPC_CHCOUNT: i32 = 11_001;

// ----- clock -----
pub const SPC_SAMPLERATE: i32 = 20_000;
pub const SPC_CLOCKOUT: i32 = 20_110;
pub const SPC_CLOCKMODE: i32 = 20_200;
pub const SPC_CM_INTPLL: i32 = 0x0000_0001;
pub const SPC_OVERSAMPLINGFACTOR: i32 = 200_123;

// ----- trigger -----
pub const SPC_TRIGGEROUT: i32 = 40_100;
pub const SPC_TRIG_OUTPUT: i32 = 40_100;
pub const SPC_TRIG_TERM: i32 = 40_110;
pub const SPC_TRIG_EXT0_ACDC: i32 = 40_120;
pub const SPC_TRIG_EXT1_ACDC: i32 = 40_121;

pub const SPC_TRIG_ORMASK: i32 = 40_410;
pub const SPC_TRIG_ANDMASK: i32 = 40_430;
pub const SPC_TMASK_NONE: i32 = 0x0000_0000;
pub const SPC_TMASK_SOFTWARE: i32 = 0x0000_0001;
pub const SPC_TMASK_EXT0: i32 = 0x0000_0002;
pub const SPC_TMASK_EXT1: i32 = 0x0000_0004;

pub const SPC_TRIG_CH_ORMASK0: i32 = 40_450;
pub const SPC_TRIG_CH_ORMASK1: i32 = 40_451;
pub const SPC_TRIG_CH_ANDMASK0: i32 = 40_470;
pub const SPC_TRIG_CH_ANDMASK1: i32 = 40_471;

pub const SPC_TRIG_EXT0_MODE: i32 = 40_510;
pub const SPC_TRIG_EXT1_MODE: i32 = 40_511;
pub const SPC_TRIG_CH0_MODE: i32 = 40_610;

pub const SPC_TRIG_CH0_PULSEWIDTH: i32 = 44_101;
pub const SPC_TRIG_EXT0_PULSEWIDTH: i32 = 44_210;
pub const SPC_TRIG_EXT1_PULSEWIDTH: i32 = 44_211;

pub const SPC_TRIG_CH0_LEVEL0: i32 = 42_200;
pub const SPC_TRIG_CH0_LEVEL1: i32 = 42_300;
pub const SPC_TRIG_EXT0_LEVEL0: i32 = 42_320;
pub const SPC_TRIG_EXT1_LEVEL0: i32 = 42_321;
pub const SPC_TRIG_EXT0_LEVEL1: i32 = 42_330;

pub const SPC_TM_NONE: i32 = 0x0000_0000;
pub const SPC_TM_POS: i32 = 0x0000_0001;
pub const SPC_TM_NEG: i32 = 0x0000_0002;
pub const SPC_TM_BOTH: i32 = 0x0000_0004;
pub const SPC_TM_HIGH: i32 = 0x0000_0008;
pub const SPC_TM_LOW: i32 = 0x0000_0010;
pub const SPC_TM_PW_SMALLER: i32 = 0x0100_0000;
pub const SPC_TM_PW_GREATER: i32 = 0x0200_0000;

// ----- error codes -----
pub const ERR_OK: u32 = 0x0000;
pub const ERR_INIT: u32 = 0x0001;
pub const ERR_TYP: u32 = 0x0003;
pub const ERR_FNCNOTSUPPORTED: u32 = 0x0004;
pub const ERR_INVALIDHANDLE: u32 = 0x0009;
pub const ERR_BOARDNOTFOUND: u32 = 0x000A;
pub const ERR_BOARDINUSE: u32 = 0x000B;
pub const ERR_REG: u32 = 0x0100;
pub const ERR_VALUE: u32 = 0x0101;
pub const ERR_FEATURE: u32 = 0x0102;
pub const ERR_SEQUENCE: u32 = 0x0103;
pub const ERR_READABORT: u32 = 0x0104;
pub const ERR_NOACCESS: u32 = 0x0105;
pub const ERR_TIMEOUT: u32 = 0x0107;
pub const ERR_CALLTYPE: u32 = 0x0108;
pub const ERR_EXCEEDSINT32: u32 = 0x0109;
pub const ERR_NOWRITEALLOWED: u32 = 0x010A;
pub const ERR_SETUP: u32 = 0x010B;
pub const ERR_CLOCKNOTLOCKED: u32 = 0x010C;
pub const ERR_CHANNEL: u32 = 0x0110;
pub const ERR_NOTIFYSIZE: u32 = 0x0111;
pub const ERR_FIFOBUFOVERRUN: u32 = 0x0300;
pub const ERR_FIFOHWOVERRUN: u32 = 0x0301;
pub const ERR_FIFOFINISHED: u32 = 0x0302;
pub const ERR_ABORT: u32 = 0x0380;

/// Length of the text buffer `spcm_dwGetErrorInfo_i32` fills.
pub const ERRORTEXTLEN: usize = 200;
