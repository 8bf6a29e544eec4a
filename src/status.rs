//! Battery characteristics, read straight from the standard commands.
//! None of these need config mode.

use embedded_hal_async::delay;

use crate::registers::{commands, StatusFlags};
use crate::{Bq27441, ChipError, Transport};

/// Which current the gauge should report
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentMeasure {
    #[default]
    Average,
    Standby,
    Max,
}

impl CurrentMeasure {
    fn command(self) -> u8 {
        match self {
            Self::Average => commands::AVERAGE_CURRENT,
            Self::Standby => commands::STANDBY_CURRENT,
            Self::Max => commands::MAX_LOAD_CURRENT,
        }
    }
}

/// Which capacity the gauge should report
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityMeasure {
    #[default]
    Remaining,
    Full,
    Available,
    AvailableFull,
    RemainingFiltered,
    RemainingUnfiltered,
    FullFiltered,
    FullUnfiltered,
    /// Design capacity as programmed in the data flash
    Design,
}

impl CapacityMeasure {
    fn command(self) -> u8 {
        match self {
            Self::Remaining => commands::REMAINING_CAPACITY,
            Self::Full => commands::FULL_CHARGE_CAPACITY,
            Self::Available => commands::NOMINAL_AVAILABLE_CAPACITY,
            Self::AvailableFull => commands::FULL_AVAILABLE_CAPACITY,
            Self::RemainingFiltered => commands::REMAINING_CAPACITY_FILTERED,
            Self::RemainingUnfiltered => commands::REMAINING_CAPACITY_UNFILTERED,
            Self::FullFiltered => commands::FULL_CHARGE_CAPACITY_FILTERED,
            Self::FullUnfiltered => commands::FULL_CHARGE_CAPACITY_UNFILTERED,
            Self::Design => commands::DESIGN_CAPACITY,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocMeasure {
    #[default]
    Filtered,
    Unfiltered,
}

impl SocMeasure {
    fn command(self) -> u8 {
        match self {
            Self::Filtered => commands::STATE_OF_CHARGE,
            Self::Unfiltered => commands::STATE_OF_CHARGE_UNFILTERED,
        }
    }
}

/// StateOfHealth() packs the percentage in the low byte and the status in the high one
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SohMeasure {
    #[default]
    Percent,
    Status,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempMeasure {
    #[default]
    Battery,
    Internal,
}

impl TempMeasure {
    fn command(self) -> u8 {
        match self {
            Self::Battery => commands::TEMPERATURE,
            Self::Internal => commands::INTERNAL_TEMPERATURE,
        }
    }
}

impl<T, D, E> Bq27441<T, D>
where
    D: delay::DelayNs,
    T: Transport<Error = E>,
{
    /// Cell voltage in mV
    pub async fn voltage(&mut self) -> Result<u16, ChipError<E>> {
        self.read_word(commands::VOLTAGE).await
    }

    /// Current in milliamps, negative while discharging
    pub async fn current(&mut self, measure: CurrentMeasure) -> Result<i16, ChipError<E>> {
        let raw = self.read_word(measure.command()).await?;
        Ok(raw as i16)
    }

    /// Capacity in mAh
    pub async fn capacity(&mut self, measure: CapacityMeasure) -> Result<u16, ChipError<E>> {
        self.read_word(measure.command()).await
    }

    /// Average power in milliwatts, negative while discharging
    pub async fn power(&mut self) -> Result<i16, ChipError<E>> {
        let raw = self.read_word(commands::AVERAGE_POWER).await?;
        Ok(raw as i16)
    }

    /// State of charge in percent
    pub async fn soc(&mut self, measure: SocMeasure) -> Result<u16, ChipError<E>> {
        self.read_word(measure.command()).await
    }

    pub async fn soh(&mut self, measure: SohMeasure) -> Result<u8, ChipError<E>> {
        let [percent, status] = self
            .read_word(commands::STATE_OF_HEALTH)
            .await?
            .to_le_bytes();

        match measure {
            SohMeasure::Percent => Ok(percent),
            SohMeasure::Status => Ok(status),
        }
    }

    /// Reads the temperature in units of 0.1 K
    pub async fn temperature(&mut self, measure: TempMeasure) -> Result<u16, ChipError<E>> {
        self.read_word(measure.command()).await
    }

    async fn has_flag(&mut self, flag: StatusFlags) -> Result<bool, ChipError<E>> {
        Ok(self.get_flags().await?.contains(flag))
    }

    /// State of charge dropped below the SOC1 set threshold
    pub async fn soc_flag(&mut self) -> Result<bool, ChipError<E>> {
        self.has_flag(StatusFlags::SOC1).await
    }

    /// State of charge dropped below the SOCF (final) set threshold
    pub async fn socf_flag(&mut self) -> Result<bool, ChipError<E>> {
        self.has_flag(StatusFlags::SOCF).await
    }

    /// Set after a power-on reset or a full reset, the data flash holds defaults
    pub async fn itpor_flag(&mut self) -> Result<bool, ChipError<E>> {
        self.has_flag(StatusFlags::ITPOR).await
    }

    /// Full charge detected
    pub async fn fc_flag(&mut self) -> Result<bool, ChipError<E>> {
        self.has_flag(StatusFlags::FC).await
    }

    /// Fast charging allowed
    pub async fn chg_flag(&mut self) -> Result<bool, ChipError<E>> {
        self.has_flag(StatusFlags::CHG).await
    }

    /// Discharging
    pub async fn dsg_flag(&mut self) -> Result<bool, ChipError<E>> {
        self.has_flag(StatusFlags::DSG).await
    }
}
