#![no_std]

//! An async driver for the Texas Instruments BQ27441 battery fuel gauge
//!
//! The gauge is accessed through three kinds of commands: standard commands
//! (plain 16-bit registers), control subcommands (a 16-bit code written to the
//! Control() register pair) and extended commands, which include direct access
//! to the data flash in 32-byte blocks. Parameters stored in the data flash can
//! only be changed while the gauge is in CONFIG UPDATE mode, see [`mode`].

pub(crate) mod fmt;

pub mod known_chips;
pub mod memory;
pub mod mode;
pub mod params;
pub mod registers;
pub mod shared;
pub mod status;
pub mod transport;

use core::fmt as core_fmt;

use embedded_hal_async::delay;
use known_chips::ChipType;
use registers::*;

pub use memory::MemoryBlock;
pub use mode::Mode;
pub use params::GpoutFunction;
pub use shared::SharedGauge;
pub use status::{CapacityMeasure, CurrentMeasure, SocMeasure, SohMeasure, TempMeasure};
pub use transport::Transport;

/// Default 7-bit bus address of the gauge
pub const DEFAULT_ADDRESS: u8 = 0x55;

/// Number of flag polls made while waiting for a mode change
pub const DEFAULT_POLL_ATTEMPTS: u32 = 20_000;

/// Everything a gauge operation can fail with
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq)]
pub enum ChipError<E> {
    /// The transport failed or timed out
    Bus(E),
    /// The selected data-flash block did not come back consistent with its checksum
    BlockSelect,
    /// CFGUPMODE did not get set in time
    ConfigEntryTimeout,
    /// CFGUPMODE did not clear in time, the mode of the gauge is unknown
    ConfigExitTimeout,
    /// Threshold pair rejected before touching the bus
    InvalidThreshold,
    /// The checksum read back after a block write differs from the one written
    ChecksumMismatch,
    /// A block write was attempted while the gauge reports normal mode
    NotInConfigMode,
    /// A parameter value outside its data-flash field, or an access crossing a block
    OutOfRange,
    /// The liveness probe returned an unexpected device type
    UnknownDevice(u16),
}

impl<E> From<E> for ChipError<E> {
    fn from(e: E) -> Self {
        Self::Bus(e)
    }
}

impl<E: core_fmt::Debug> core_fmt::Display for ChipError<E> {
    fn fmt(&self, f: &mut core_fmt::Formatter<'_>) -> core_fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus error: {:?}", e),
            Self::BlockSelect => write!(f, "data-flash block selection was not accepted"),
            Self::ConfigEntryTimeout => write!(f, "timed out entering config update mode"),
            Self::ConfigExitTimeout => write!(f, "timed out leaving config update mode"),
            Self::InvalidThreshold => write!(f, "clear threshold exceeds set threshold"),
            Self::ChecksumMismatch => write!(f, "block checksum mismatch after write"),
            Self::NotInConfigMode => write!(f, "gauge is not in config update mode"),
            Self::OutOfRange => write!(f, "value or offset out of range"),
            Self::UnknownDevice(code) => write!(f, "unexpected device type {:#06x}", code),
        }
    }
}

/// Driver settings
#[derive(Debug, Clone, Copy)]
pub struct GaugeConfig {
    /// 7-bit bus address
    pub address: u8,
    /// How many times the flags are polled after a mode change request
    pub poll_attempts: u32,
    /// Delay before every poll
    pub poll_interval_ms: u32,
    /// Read the block checksum back after every data-flash write
    pub verify_writes: bool,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval_ms: 1,
            verify_writes: true,
        }
    }
}

/// One BQ27441 on a bus
pub struct Bq27441<T, D> {
    pub(crate) transport: T,
    pub(crate) delay: D,
    pub(crate) config: GaugeConfig,
    /// The caller brackets config mode itself, setters must not enter or exit it
    pub(crate) user_config_control: bool,
    /// The gauge was sealed when config mode was entered and is sealed again on exit
    pub(crate) seal_on_exit: bool,
}

impl<T, D, E> Bq27441<T, D>
where
    D: delay::DelayNs,
    T: Transport<Error = E>,
{
    /// Driver with default polling and verification settings at `address`
    pub fn new(transport: T, delay: D, address: u8) -> Self {
        Self::with_config(
            transport,
            delay,
            GaugeConfig {
                address,
                ..GaugeConfig::default()
            },
        )
    }

    /// Creates the driver instance with non-default polling or verification settings
    pub fn with_config(transport: T, delay: D, config: GaugeConfig) -> Self {
        Self {
            transport,
            delay,
            config,
            user_config_control: false,
            seal_on_exit: false,
        }
    }

    /// Gives back the bus and the delay provider
    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }

    pub fn config(&self) -> &GaugeConfig {
        &self.config
    }

    /// Reads a 16-bit standard command
    pub async fn read_word(&mut self, command: u8) -> Result<u16, ChipError<E>> {
        let mut response = [0, 0];

        self.transport
            .read(self.config.address, command, &mut response)
            .await?;

        Ok(u16::from_le_bytes(response))
    }

    /// Writes a subcommand into the Control() register pair
    pub async fn write_control(&mut self, subcommand: u16) -> Result<(), ChipError<E>> {
        self.transport
            .write(
                self.config.address,
                commands::CONTROL,
                &subcommand.to_le_bytes(),
            )
            .await?;
        Ok(())
    }

    /// Reads back the Control() register pair after a subcommand with a response
    pub async fn read_control_result(&mut self) -> Result<u16, ChipError<E>> {
        self.read_word(commands::CONTROL).await
    }

    // Subcommand and response are separate transfers, the gauge needs the
    // stop condition in between to latch the result.
    async fn read_control(&mut self, subcommand: u16) -> Result<u16, ChipError<E>> {
        self.write_control(subcommand).await?;
        self.read_control_result().await
    }

    /// Reads the device type, 0x0421 for the BQ27441
    pub async fn device_type(&mut self) -> Result<u16, ChipError<E>> {
        self.read_control(control_subcommands::DEVICE_TYPE).await
    }

    /// Firmware version word, e.g. 0x0109
    pub async fn fw_version(&mut self) -> Result<u16, ChipError<E>> {
        self.read_control(control_subcommands::FW_VERSION).await
    }

    /// Reads the CONTROL_STATUS word
    pub async fn control_status(&mut self) -> Result<ControlStatus, ChipError<E>> {
        let raw = self.read_control(control_subcommands::CONTROL_STATUS).await?;
        Ok(ControlStatus::from_bits_truncate(raw))
    }

    /// Raw CONTROL_STATUS word
    pub async fn status(&mut self) -> Result<u16, ChipError<E>> {
        self.read_control(control_subcommands::CONTROL_STATUS).await
    }

    /// Decoded Flags() word
    pub async fn get_flags(&mut self) -> Result<StatusFlags, ChipError<E>> {
        let raw = self.read_word(commands::FLAGS).await?;
        Ok(StatusFlags::from_bits_truncate(raw))
    }

    /// Raw Flags word
    pub async fn flags(&mut self) -> Result<u16, ChipError<E>> {
        self.read_word(commands::FLAGS).await
    }

    /// Whether the gauge only accepts a restricted command set
    pub async fn sealed(&mut self) -> Result<bool, ChipError<E>> {
        Ok(self.control_status().await?.contains(ControlStatus::SS))
    }

    /// Puts the gauge into the SEALED state
    pub async fn seal(&mut self) -> Result<(), ChipError<E>> {
        info!("sealing the gauge");
        self.write_control(control_subcommands::SEALED).await
    }

    /// Moves the gauge from SEALED to UNSEALED by sending the key twice
    pub async fn unseal(&mut self) -> Result<(), ChipError<E>> {
        info!("unsealing the gauge");
        self.write_control(control_subcommands::UNSEAL_KEY).await?;
        self.write_control(control_subcommands::UNSEAL_KEY).await
    }

    /// Whether the gauge finished its initialization after reset
    pub async fn init_complete(&mut self) -> Result<bool, ChipError<E>> {
        Ok(self.control_status().await?.contains(ControlStatus::INITCOMP))
    }

    /// Forces the gauge into HIBERNATE once it reaches sleep
    pub async fn set_hibernate(&mut self) -> Result<(), ChipError<E>> {
        self.write_control(control_subcommands::SET_HIBERNATE).await
    }

    pub async fn clear_hibernate(&mut self) -> Result<(), ChipError<E>> {
        self.write_control(control_subcommands::CLEAR_HIBERNATE).await
    }

    /// Pulses GPOUT when it is configured as SOC_INT
    pub async fn pulse_gpout(&mut self) -> Result<(), ChipError<E>> {
        self.write_control(control_subcommands::PULSE_SOC_INT).await
    }

    /// Full reset: the data flash falls back to factory defaults and every
    /// parameter has to be programmed again.
    pub async fn reset(&mut self) -> Result<(), ChipError<E>> {
        info!("resetting the gauge to factory defaults");
        self.write_control(control_subcommands::RESET).await
    }

    /// Restarts the gauge keeping the data flash, also leaves config update mode
    pub async fn soft_reset(&mut self) -> Result<(), ChipError<E>> {
        info!("soft resetting the gauge");
        self.write_control(control_subcommands::SOFT_RESET).await
    }

    /// Tries to communicate with the chip and checks the device type
    pub async fn init(&mut self) -> Result<ChipType, ChipError<E>> {
        let response = self.device_type().await?;
        let chip = ChipType::from(response);

        if chip.is_supported() {
            info!("found bq27441 at {:#x}", self.config.address);
            Ok(chip)
        } else {
            warn!("unexpected device type {:#x}", response);
            Err(ChipError::UnknownDevice(response))
        }
    }
}
