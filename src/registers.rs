//! Register map of the BQ27441: command codes, data-flash locations and flag words

use core::ops::RangeInclusive;

use crate::fmt::bitflags;

/// Standard and extended command codes, each one addresses a register pair
pub mod commands {
    pub const CONTROL: u8 = 0x00;
    pub const TEMPERATURE: u8 = 0x02;
    pub const VOLTAGE: u8 = 0x04;
    pub const FLAGS: u8 = 0x06;
    pub const NOMINAL_AVAILABLE_CAPACITY: u8 = 0x08;
    pub const FULL_AVAILABLE_CAPACITY: u8 = 0x0A;
    pub const REMAINING_CAPACITY: u8 = 0x0C;
    pub const FULL_CHARGE_CAPACITY: u8 = 0x0E;
    pub const AVERAGE_CURRENT: u8 = 0x10;
    pub const STANDBY_CURRENT: u8 = 0x12;
    pub const MAX_LOAD_CURRENT: u8 = 0x14;
    pub const AVERAGE_POWER: u8 = 0x18;
    pub const STATE_OF_CHARGE: u8 = 0x1C;
    pub const INTERNAL_TEMPERATURE: u8 = 0x1E;
    pub const STATE_OF_HEALTH: u8 = 0x20;
    pub const REMAINING_CAPACITY_UNFILTERED: u8 = 0x28;
    pub const REMAINING_CAPACITY_FILTERED: u8 = 0x2A;
    pub const FULL_CHARGE_CAPACITY_UNFILTERED: u8 = 0x2C;
    pub const FULL_CHARGE_CAPACITY_FILTERED: u8 = 0x2E;
    pub const STATE_OF_CHARGE_UNFILTERED: u8 = 0x30;

    // Extended commands
    pub const OP_CONFIG: u8 = 0x3A;
    pub const DESIGN_CAPACITY: u8 = 0x3C;

    // Data-flash window
    pub const DATA_CLASS: u8 = 0x3E;
    pub const DATA_BLOCK: u8 = 0x3F;
    pub const BLOCK_DATA: u8 = 0x40;
    pub const BLOCK_DATA_CHECKSUM: u8 = 0x60;
    pub const BLOCK_DATA_CONTROL: u8 = 0x61;
}

/// Data-flash subclasses holding the parameters this driver configures
pub mod memory_subclass {
    pub const DISCHARGE: u8 = 49;
    pub const REGISTERS: u8 = 64;
    pub const POWER: u8 = 68;
    pub const STATE: u8 = 82;
}

/// Byte offsets of the configurable parameters inside their subclass.
/// Offsets past 31 live in the following 32-byte block.
pub mod memory_offsets {
    // State subclass
    pub const DESIGN_CAPACITY: u8 = 10;
    pub const DESIGN_ENERGY: u8 = 12;
    pub const TERMINATE_VOLTAGE: u8 = 16;
    pub const SOCI_DELTA: u8 = 26;
    pub const TAPER_RATE: u8 = 27;
    pub const TAPER_VOLTAGE: u8 = 29;
    pub const V_AT_CHG_TERM: u8 = 33;

    // Power subclass
    pub const HIBERNATE_CURRENT: u8 = 7;

    // Discharge subclass
    pub const SOC1_SET_THRESHOLD: u8 = 0;
    pub const SOC1_CLEAR_THRESHOLD: u8 = 1;
    pub const SOCF_SET_THRESHOLD: u8 = 2;
    pub const SOCF_CLEAR_THRESHOLD: u8 = 3;

    // Registers subclass
    pub const OP_CONFIG: u8 = 0;
}

/// Accepted values of the two-byte data-flash parameters, in their own units.
/// The fields are signed on the gauge, nothing above `i16::MAX` fits.
pub mod memory_limits {
    use super::RangeInclusive;

    /// mAh
    pub const DESIGN_CAPACITY: RangeInclusive<u16> = 0..=8000;
    /// mWh
    pub const DESIGN_ENERGY: RangeInclusive<u16> = 0..=32767;
    /// mV
    pub const TERMINATE_VOLTAGE: RangeInclusive<u16> = 2500..=3700;
    /// mV
    pub const V_AT_CHG_TERM: RangeInclusive<u16> = 0..=5000;
    /// 0.1 h
    pub const TAPER_RATE: RangeInclusive<u16> = 0..=2000;
    /// mV
    pub const TAPER_VOLTAGE: RangeInclusive<u16> = 0..=5000;
    /// mA
    pub const HIBERNATE_CURRENT: RangeInclusive<u16> = 0..=700;
}

/// Subcommand codes written to the Control() register pair.
/// Those with a response leave it in Control() for the next read.
pub mod control_subcommands {
    pub const CONTROL_STATUS: u16 = 0x0000;
    pub const DEVICE_TYPE: u16 = 0x0001;
    pub const FW_VERSION: u16 = 0x0002;
    pub const SET_HIBERNATE: u16 = 0x0011;
    pub const CLEAR_HIBERNATE: u16 = 0x0012;
    pub const SET_CFGUPDATE: u16 = 0x0013;
    pub const SEALED: u16 = 0x0020;
    pub const PULSE_SOC_INT: u16 = 0x0023;
    pub const RESET: u16 = 0x0041;
    pub const SOFT_RESET: u16 = 0x0042;
    pub const EXIT_CFGUPDATE: u16 = 0x0043;
    pub const EXIT_RESIM: u16 = 0x0044;

    /// Written twice in a row to leave the SEALED state
    pub const UNSEAL_KEY: u16 = 0x8000;
}

bitflags! {
    /// Flags() word
    pub struct StatusFlags: u16 {
        const OT = 1 << 15;
        const UT = 1 << 14;
        const FC = 1 << 9;
        const CHG = 1 << 8;
        const OCVTAKEN = 1 << 7;
        const ITPOR = 1 << 5;
        const CFGUPMODE = 1 << 4;
        const BAT_DET = 1 << 3;
        const SOC1 = 1 << 2;
        const SOCF = 1 << 1;
        const DSG = 1 << 0;
    }
}

bitflags! {
    /// Response of the CONTROL_STATUS subcommand
    pub struct ControlStatus: u16 {
        const SHUTDOWNEN = 1 << 15;
        const WDRESET = 1 << 14;
        const SS = 1 << 13;
        const CALMODE = 1 << 12;
        const CCA = 1 << 11;
        const BCA = 1 << 10;
        const QMAX_UP = 1 << 9;
        const RES_UP = 1 << 8;
        const INITCOMP = 1 << 7;
        const HIBERNATE = 1 << 6;
        const SLEEP = 1 << 4;
        const LDMD = 1 << 3;
        const RUP_DIS = 1 << 2;
        const VOK = 1 << 1;
    }
}

bitflags! {
    /// Operation Configuration register, mirrored at the OpConfig() extended command
    pub struct OpConfig: u16 {
        const BIE = 1 << 13;
        const BI_PU_EN = 1 << 12;
        const GPIOPOL = 1 << 11;
        const SLEEP = 1 << 5;
        const RMFCC = 1 << 4;
        const BATLOWEN = 1 << 2;
        const TEMPS = 1 << 0;
    }
}
