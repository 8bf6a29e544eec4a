//! The BQ27441 shares its command set with the rest of the BQ274xx line,
//! but only the parts reporting 0x0421 are driven by this crate.

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipType {
    /// BQ27441-G1 and its BQ27421-G1 sibling report the same device type
    BQ27441,
    BQ27426,
    BQ27427,
    Unknown(u16),
}

impl ChipType {
    /// Device type reported by the DEVICE_TYPE subcommand on supported parts
    pub const BQ27441_DEVICE_TYPE: u16 = 0x0421;

    /// Whether this crate's data-flash map applies to the chip
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::BQ27441)
    }
}

impl From<u16> for ChipType {
    fn from(code: u16) -> Self {
        match code {
            Self::BQ27441_DEVICE_TYPE => Self::BQ27441,
            0x0426 => Self::BQ27426,
            0x0427 => Self::BQ27427,
            other => Self::Unknown(other),
        }
    }
}
