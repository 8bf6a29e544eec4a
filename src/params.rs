//! Configurable battery parameters stored in the data flash
//!
//! Multi-byte data-flash fields are big-endian, unlike the standard commands.

use core::ops::RangeInclusive;

use byteorder::{BigEndian, ByteOrder};
use embedded_hal_async::delay;

use crate::registers::{commands, memory_limits, memory_offsets, memory_subclass, OpConfig};
use crate::{Bq27441, ChipError, Transport};

/// Highest value accepted for percentage thresholds
const MAX_PERCENT: u8 = 100;

/// What the GPOUT pin signals
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpoutFunction {
    /// Pulses on state of charge changes
    SocInt,
    /// Follows the SOC1/SOCF low battery flags
    BatLow,
}

fn check_thresholds<E>(set: u8, clear: u8) -> Result<(), ChipError<E>> {
    if clear > set || set > MAX_PERCENT {
        Err(ChipError::InvalidThreshold)
    } else {
        Ok(())
    }
}

fn check_range<E>(value: u16, range: RangeInclusive<u16>) -> Result<(), ChipError<E>> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ChipError::OutOfRange)
    }
}

impl<T, D, E> Bq27441<T, D>
where
    D: delay::DelayNs,
    T: Transport<Error = E>,
{
    /// Values outside `range` are refused before the bus is touched
    async fn write_u16_param(
        &mut self,
        class: u8,
        offset: u8,
        value: u16,
        range: RangeInclusive<u16>,
    ) -> Result<(), ChipError<E>> {
        check_range(value, range)?;

        let mut raw = [0; 2];
        BigEndian::write_u16(&mut raw, value);

        self.write_extended(class, offset, &raw).await
    }

    async fn read_u8_param(&mut self, class: u8, offset: u8) -> Result<u8, ChipError<E>> {
        let mut raw = [0];
        self.read_extended(class, offset, &mut raw).await?;
        Ok(raw[0])
    }

    /// Programs the design capacity in mAh, up to 8000
    pub async fn set_capacity(&mut self, capacity: u16) -> Result<(), ChipError<E>> {
        info!("setting design capacity to {} mAh", capacity);
        self.write_u16_param(
            memory_subclass::STATE,
            memory_offsets::DESIGN_CAPACITY,
            capacity,
            memory_limits::DESIGN_CAPACITY,
        )
        .await
    }

    /// Current below which the gauge is allowed to hibernate, in mA
    pub async fn set_hibernate_current(&mut self, current: u16) -> Result<(), ChipError<E>> {
        self.write_u16_param(
            memory_subclass::POWER,
            memory_offsets::HIBERNATE_CURRENT,
            current,
            memory_limits::HIBERNATE_CURRENT,
        )
        .await
    }

    /// Programs the design energy in mWh
    pub async fn set_design_energy(&mut self, energy: u16) -> Result<(), ChipError<E>> {
        self.write_u16_param(
            memory_subclass::STATE,
            memory_offsets::DESIGN_ENERGY,
            energy,
            memory_limits::DESIGN_ENERGY,
        )
        .await
    }

    /// Minimum operating voltage in mV, the zero point of the state of charge.
    /// Accepted between 2500 and 3700 mV.
    pub async fn set_terminate_voltage_min(&mut self, voltage: u16) -> Result<(), ChipError<E>> {
        self.write_u16_param(
            memory_subclass::STATE,
            memory_offsets::TERMINATE_VOLTAGE,
            voltage,
            memory_limits::TERMINATE_VOLTAGE,
        )
        .await
    }

    /// Charging voltage at which charge termination is detected, in mV
    pub async fn set_charge_v_chg_termination(&mut self, voltage: u16) -> Result<(), ChipError<E>> {
        self.write_u16_param(
            memory_subclass::STATE,
            memory_offsets::V_AT_CHG_TERM,
            voltage,
            memory_limits::V_AT_CHG_TERM,
        )
        .await
    }

    /// Taper rate in 0.1 h units (design capacity / taper current)
    pub async fn set_taper_rate_time(&mut self, rate: u16) -> Result<(), ChipError<E>> {
        self.write_u16_param(
            memory_subclass::STATE,
            memory_offsets::TAPER_RATE,
            rate,
            memory_limits::TAPER_RATE,
        )
        .await
    }

    /// Minimum voltage for the taper current to be considered, in mV
    pub async fn set_taper_rate_voltage(&mut self, voltage: u16) -> Result<(), ChipError<E>> {
        self.write_u16_param(
            memory_subclass::STATE,
            memory_offsets::TAPER_VOLTAGE,
            voltage,
            memory_limits::TAPER_VOLTAGE,
        )
        .await
    }

    pub async fn soc1_set_threshold(&mut self) -> Result<u8, ChipError<E>> {
        self.read_u8_param(
            memory_subclass::DISCHARGE,
            memory_offsets::SOC1_SET_THRESHOLD,
        )
        .await
    }

    pub async fn soc1_clear_threshold(&mut self) -> Result<u8, ChipError<E>> {
        self.read_u8_param(
            memory_subclass::DISCHARGE,
            memory_offsets::SOC1_CLEAR_THRESHOLD,
        )
        .await
    }

    /// Programs the SOC1 thresholds in percent. `clear` may not exceed `set`.
    pub async fn set_soc1_thresholds(&mut self, set: u8, clear: u8) -> Result<(), ChipError<E>> {
        check_thresholds(set, clear)?;
        self.write_extended(
            memory_subclass::DISCHARGE,
            memory_offsets::SOC1_SET_THRESHOLD,
            &[set, clear],
        )
        .await
    }

    pub async fn socf_set_threshold(&mut self) -> Result<u8, ChipError<E>> {
        self.read_u8_param(
            memory_subclass::DISCHARGE,
            memory_offsets::SOCF_SET_THRESHOLD,
        )
        .await
    }

    pub async fn socf_clear_threshold(&mut self) -> Result<u8, ChipError<E>> {
        self.read_u8_param(
            memory_subclass::DISCHARGE,
            memory_offsets::SOCF_CLEAR_THRESHOLD,
        )
        .await
    }

    /// Programs the SOCF thresholds in percent. `clear` may not exceed `set`.
    pub async fn set_socf_thresholds(&mut self, set: u8, clear: u8) -> Result<(), ChipError<E>> {
        check_thresholds(set, clear)?;
        self.write_extended(
            memory_subclass::DISCHARGE,
            memory_offsets::SOCF_SET_THRESHOLD,
            &[set, clear],
        )
        .await
    }

    /// State of charge change (in percent) that pulses GPOUT in SOC_INT mode
    pub async fn soci_delta(&mut self) -> Result<u8, ChipError<E>> {
        self.read_u8_param(memory_subclass::STATE, memory_offsets::SOCI_DELTA)
            .await
    }

    /// Sets the SOC_INT delta, values above 100 % are clamped
    pub async fn set_soci_delta(&mut self, delta: u8) -> Result<(), ChipError<E>> {
        self.write_extended(
            memory_subclass::STATE,
            memory_offsets::SOCI_DELTA,
            &[delta.min(MAX_PERCENT)],
        )
        .await
    }

    /// Reads the Operation Configuration register (no config mode needed)
    pub async fn op_config(&mut self) -> Result<OpConfig, ChipError<E>> {
        let raw = self.read_word(commands::OP_CONFIG).await?;
        Ok(OpConfig::from_bits_truncate(raw))
    }

    /// Writes the raw Operation Configuration word to the data flash.
    /// Reserved bits are written as given, so start from the current value.
    pub async fn set_op_config(&mut self, raw: u16) -> Result<(), ChipError<E>> {
        let mut word = [0; 2];
        BigEndian::write_u16(&mut word, raw);

        self.write_extended(memory_subclass::REGISTERS, memory_offsets::OP_CONFIG, &word)
            .await
    }

    async fn update_op_config(&mut self, flag: OpConfig, enable: bool) -> Result<(), ChipError<E>> {
        let current = self.read_word(commands::OP_CONFIG).await?;
        let updated = if enable {
            current | flag.bits()
        } else {
            current & !flag.bits()
        };

        if updated == current {
            return Ok(());
        }

        self.set_op_config(updated).await
    }

    /// Whether GPOUT is active-high
    pub async fn gpout_polarity(&mut self) -> Result<bool, ChipError<E>> {
        Ok(self.op_config().await?.contains(OpConfig::GPIOPOL))
    }

    pub async fn set_gpout_polarity(&mut self, active_high: bool) -> Result<(), ChipError<E>> {
        self.update_op_config(OpConfig::GPIOPOL, active_high).await
    }

    pub async fn gpout_function(&mut self) -> Result<GpoutFunction, ChipError<E>> {
        if self.op_config().await?.contains(OpConfig::BATLOWEN) {
            Ok(GpoutFunction::BatLow)
        } else {
            Ok(GpoutFunction::SocInt)
        }
    }

    pub async fn set_gpout_function(&mut self, function: GpoutFunction) -> Result<(), ChipError<E>> {
        self.update_op_config(OpConfig::BATLOWEN, function == GpoutFunction::BatLow)
            .await
    }

    /// Allows the gauge to enter SLEEP
    pub async fn set_sleep_enable(&mut self, enable: bool) -> Result<(), ChipError<E>> {
        self.update_op_config(OpConfig::SLEEP, enable).await
    }

    /// Enables the internal pull-up on the BIN pin used for battery detection
    pub async fn set_bi_pu_en(&mut self, enable: bool) -> Result<(), ChipError<E>> {
        self.update_op_config(OpConfig::BI_PU_EN, enable).await
    }
}
