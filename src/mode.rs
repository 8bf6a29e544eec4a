//! CONFIG UPDATE mode handling
//!
//! The gauge only accepts data-flash writes while in config update mode. The
//! mode is never cached by the driver: the gauge may be left in either mode by
//! a previous session or a brown-out, so every transition is confirmed by
//! polling CFGUPMODE in the Flags register and [`Bq27441::mode`] always asks
//! the gauge.
//!
//! Failures never trigger an automatic exit. Leaving config mode commits
//! whatever the data flash currently holds, so after an error the caller is
//! expected to inspect the gauge, fix the block if needed and exit explicitly.

use embedded_hal_async::delay;

use crate::registers::{control_subcommands, StatusFlags};
use crate::{Bq27441, ChipError, Transport};

/// Operating mode as reported by the gauge
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Config,
}

impl<T, D, E> Bq27441<T, D>
where
    D: delay::DelayNs,
    T: Transport<Error = E>,
{
    /// Reads the current mode without requesting any transition
    pub async fn mode(&mut self) -> Result<Mode, ChipError<E>> {
        if self.get_flags().await?.contains(StatusFlags::CFGUPMODE) {
            Ok(Mode::Config)
        } else {
            Ok(Mode::Normal)
        }
    }

    /// Polls until the flags given as a mask are all set (or all cleared).
    /// Returns `false` if that did not happen within the configured bound.
    async fn wait_flags(&mut self, mask: StatusFlags, set: bool) -> Result<bool, ChipError<E>> {
        for _ in 0..self.config.poll_attempts {
            self.delay.delay_ms(self.config.poll_interval_ms).await;

            let flags = self.get_flags().await?;

            if flags.contains(mask) == set {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Moves the chip to config update mode
    ///
    /// With `user_control` set, the data-flash setters stop bracketing their
    /// writes with their own enter/exit until [`Self::exit_config`] is called,
    /// so several parameters can be changed in one session.
    /// Entering while the gauge already reports config mode does nothing.
    pub async fn enter_config(&mut self, user_control: bool) -> Result<(), ChipError<E>> {
        if user_control {
            self.user_config_control = true;
        }

        if self.mode().await? == Mode::Config {
            debug!("already in cfgupdate mode");
            return Ok(());
        }

        if self.sealed().await? {
            self.seal_on_exit = true;
            self.unseal().await?;
        }

        info!("requesting cfgupdate mode");

        self.write_control(control_subcommands::SET_CFGUPDATE)
            .await?;

        if !self.wait_flags(StatusFlags::CFGUPMODE, true).await? {
            warn!("gauge did not enter cfgupdate mode");
            return Err(ChipError::ConfigEntryTimeout);
        }

        info!("in cfgupdate mode");

        Ok(())
    }

    /// Leaves config update mode
    ///
    /// With `resim` the gauge recomputes its capacity model from the new
    /// parameters right away, which is needed whenever capacity related
    /// fields were changed. A gauge that was sealed on entry is sealed again.
    pub async fn exit_config(&mut self, resim: bool) -> Result<(), ChipError<E>> {
        let subcommand = if resim {
            control_subcommands::EXIT_RESIM
        } else {
            control_subcommands::EXIT_CFGUPDATE
        };

        info!("leaving cfgupdate mode (resim: {})...", resim);

        self.write_control(subcommand).await?;

        if !self.wait_flags(StatusFlags::CFGUPMODE, false).await? {
            warn!("gauge is stuck in cfgupdate mode");
            return Err(ChipError::ConfigExitTimeout);
        }

        self.user_config_control = false;

        if self.seal_on_exit {
            self.seal_on_exit = false;
            self.seal().await?;
        }

        info!("cfgupdate mode left");

        Ok(())
    }

    /// Enters config mode on behalf of a single data-flash access.
    /// Returns whether the caller of this function owns the session and has to exit it.
    pub(crate) async fn begin_update(&mut self) -> Result<bool, ChipError<E>> {
        if self.user_config_control {
            return Ok(false);
        }

        self.enter_config(false).await?;
        Ok(true)
    }

    pub(crate) async fn end_update(&mut self, owned: bool, resim: bool) -> Result<(), ChipError<E>> {
        if owned {
            self.exit_config(resim).await
        } else {
            Ok(())
        }
    }
}
