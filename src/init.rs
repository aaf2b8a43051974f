use crate::{
    command::Command,
    config::SdCardConfig,
    consts::arguments,
    error::InitError,
    response::{IfCond, Ocr, R1Response},
    CardType, SdCard, SdError,
};

use embedded_hal::blocking::spi::Transfer;
use switch_hal::{InputSwitch, OutputSwitch};

#[cfg(feature = "defmt-log")]
use defmt::{debug, error, info, warn};
#[cfg(feature = "log")]
use log::{debug, error, info, warn};

impl<Spi, Cs, Detect, Config> SdCard<Spi, Cs, Detect, Config>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdCardConfig,
{
    /// Init sequence value.
    const INIT_SET_VALUE: u8 = 0xFF;

    /// Initialize SD.
    ///
    /// Negotiates voltage, capacity class and readiness, raises the bus clock
    /// through the high-speed hook and returns the card type. Chip select is
    /// released on every failure after the presence check.
    pub fn init(&mut self) -> Result<CardType, SdError<Spi, Cs>> {
        if self.card_type.is_initialized() {
            warn!("SD already is initialized");
            return Ok(self.card_type);
        }

        info!("SD initialize started");

        if !self.check_presence() {
            error!("SD card not detected");
            return Err(InitError::CardNotDetected.into());
        }

        self.synchronize()?;

        let result = self.cs_scope(|s| {
            s.enter_idle_state()?;
            s.send_if_cond()?;
            s.send_op_cond()?;

            let card_type = s.read_ocr()?;
            s.raise_clock();

            Ok(card_type)
        });

        match result {
            Ok(card_type) => {
                info!("SD successfully initialized, type: {:?}", card_type);
                self.card_type = card_type;
            }
            Err(_) => error!("Failed to initialize SD"),
        }

        result
    }

    /// Clock the card with chip select high so it can start up.
    fn synchronize(&mut self) -> Result<(), SdError<Spi, Cs>> {
        self.unselect()?;

        for _ in 0..Config::SYNC_BYTES {
            self.send(Self::INIT_SET_VALUE)?;
        }

        Ok(())
    }

    /// Wait for `expected` as the answer to the last command, re-reading the bus.
    fn await_response(
        &mut self,
        first: R1Response,
        expected: R1Response,
        attempts: usize,
    ) -> Result<bool, SdError<Spi, Cs>> {
        if first == expected {
            return Ok(true);
        }

        Ok(self
            .poll_token(attempts, |token| token == expected.0)?
            .is_some())
    }

    /// Enter SD to SPI mode.
    fn enter_idle_state(&mut self) -> Result<(), SdError<Spi, Cs>> {
        info!("Enter to SPI mode for SD");

        let r1 = self.send_command(Command::GoIdleState, 0x0000_0000)?;

        if !self.await_response(r1, R1Response::IN_IDLE_STATE, Config::IDLE_ATTEMPTS)? {
            warn!("Wrong response from CMD0: 0x{:02X}", r1.0);
            return Err(InitError::IdleStateError.into());
        }

        Ok(())
    }

    /// Verify SD Memory Card interface operating condition.
    fn send_if_cond(&mut self) -> Result<(), SdError<Spi, Cs>> {
        info!("Verifying SD Memory Card interface operating condition");

        let r1 = self.send_command(Command::SendIfCond, arguments::IF_COND)?;

        if !self.await_response(r1, R1Response::IN_IDLE_STATE, Config::IF_COND_ATTEMPTS)? {
            warn!("CMD8 not recognized: 0x{:02X}", r1.0);
            return Err(InitError::OldVersionOrNotACard.into());
        }

        let mut payload = [0u8; 4];
        self.receive_slice(&mut payload)?;
        let if_cond = IfCond::from(payload);

        if !if_cond.is_valid() {
            error!(
                "CMD8 echo mismatch, voltage: 0x{:02X}, pattern: 0x{:02X}",
                if_cond.voltage_accepted(),
                if_cond.check_pattern()
            );
            return Err(InitError::SendIfCondError.into());
        }

        Ok(())
    }

    /// Sends host capacity support information and activates.
    fn send_op_cond(&mut self) -> Result<(), SdError<Spi, Cs>> {
        info!("Sending host capacity support information and activates");

        for attempt in 0..Config::OP_COND_ATTEMPTS {
            self.send_command(Command::AppCmd, 0x0000_0000)?;

            if self.send_command(Command::SdSendOpCond, arguments::HOST_CAPACITY_SUPPORT)?
                == R1Response::READY_STATE
            {
                debug!("SD ready after {} ACMD41 rounds", attempt + 1);
                return Ok(());
            }
        }

        Err(InitError::SendOpCondTimeout.into())
    }

    /// Check SD capacity class.
    fn read_ocr(&mut self) -> Result<CardType, SdError<Spi, Cs>> {
        info!("Checking SD type");

        let r1 = self.send_command(Command::ReadOcr, 0x0000_0000)?;

        if r1 != R1Response::READY_STATE {
            warn!("Wrong response from CMD58: 0x{:02X}", r1.0);
            return Err(InitError::ReadOcrError.into());
        }

        let mut payload = [0u8; 4];
        self.receive_slice(&mut payload)?;

        Ok(if Ocr::from(payload).card_capacity_status() {
            CardType::HighCapacityV2
        } else {
            CardType::StandardCapacityV2
        })
    }

    /// Switch the bus to the transfer clock.
    fn raise_clock(&mut self) {
        if let Some(hook) = self.high_speed {
            debug!("Raising SD bus clock");
            hook(&mut self.spi);
        }
    }
}
