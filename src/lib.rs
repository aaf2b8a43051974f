//! SD/MMC block driver written in Embedded Rust.
//!
//! This crate brings an SD card up in SPI mode and reads, writes and erases
//! 512-byte sectors over any [`embedded_hal`] SPI bus, with the chip select
//! and card-detect lines driven through [`switch_hal`].
//!
//! ```ignore
//! let mut card = SdCard::<_, _, _>::new(spi, cs, detect)
//!     .with_high_speed(|spi| spi.reclock(25.MHz()));
//!
//! let card_type = card.init()?;
//! let mut block = [0u8; BLOCK_SIZE];
//! card.read_block(&mut block, 0)?;
//! ```
//!
//! ## Features
//!
//! * `log` (default): log through the [`log`](https://crates.io/crates/log) facade.
//! * `defmt-log`: log through [`defmt`](https://crates.io/crates/defmt) instead.
//!   Turn off the default features when enabling it.

#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "defmt-log", feature = "log"))]
compile_error!("Cannot enable both log and defmt-log");

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
compile_error!("Must enable either log or defmt-log");

mod block;
mod command;
mod config;
mod consts;
mod csd;
mod disk;
mod error;
mod init;
mod registers;
mod response;

pub use crate::command::Command;
pub use crate::config::{DefaultSdCardConfig, SdCardConfig};
pub use crate::consts::BLOCK_SIZE;
pub use crate::csd::{CapacityProvider, Csd, CsdV1, CsdV2};
pub use crate::disk::SdCardDisk;
pub use crate::error::{Error, InitError, IoError};
pub use crate::response::{CardStatus, DataResponse, IfCond, Ocr, R1Response};

use crate::consts::{tokens, BLOCK_SIZE_U32};

use core::marker::PhantomData;
use embedded_hal::blocking::spi::Transfer;
use switch_hal::{InputSwitch, OutputSwitch};

#[cfg(feature = "defmt-log")]
use defmt::{trace, warn};
#[cfg(feature = "log")]
use log::{trace, warn};

/// One sector.
pub type Block = [u8; BLOCK_SIZE];

/// Error type of an [`SdCard`] over the given bus and chip select.
pub type SdError<Spi, Cs> = Error<<Spi as Transfer<u8>>::Error, <Cs as OutputSwitch>::Error>;

/// Card type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum CardType {
    /// No initialization has succeeded yet.
    Undefined,
    /// Device answered but is not a usable SD memory card.
    NotACard,
    /// Version 1.x standard capacity card.
    StandardV1,
    /// Version 2.00+ SDHC or SDXC card, block addressed.
    HighCapacityV2,
    /// Version 2.00+ SDSC card, byte addressed.
    StandardCapacityV2,
}

impl CardType {
    /// Card finished initialization and can transfer data.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self,
            CardType::StandardV1 | CardType::HighCapacityV2 | CardType::StandardCapacityV2
        )
    }
}

/// SD Card SPI driver session.
///
/// `Spi` - SPI.
/// `Cs` - Chip select output switch, `on` selects the card.
/// `Detect` - Card detect input switch, active while a card is inserted.
/// `Config` - Config implementation of driver config trait.
///
/// Every operation takes `&mut self`: one transaction is on the bus at a time.
pub struct SdCard<Spi, Cs, Detect, Config = DefaultSdCardConfig>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdCardConfig,
{
    spi: Spi,
    cs: Cs,
    detect: Detect,
    card_type: CardType,
    high_speed: Option<fn(&mut Spi)>,
    config: PhantomData<Config>,
}

impl<Spi, Cs, Detect, Config> SdCard<Spi, Cs, Detect, Config>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdCardConfig,
{
    /// Creates a new [`SdCard<Spi, Cs, Detect, Config>`].
    ///
    /// `spi` - SPI instance, clocked slow enough for card identification.
    /// `cs` - chip select output switch.
    /// `detect` - card detect input switch.
    pub fn new(spi: Spi, cs: Cs, detect: Detect) -> Self {
        SdCard {
            spi,
            cs,
            detect,
            card_type: CardType::Undefined,
            high_speed: None,
            config: PhantomData::<Config>,
        }
    }

    /// Set the hook that raises the bus clock once identification is done.
    pub fn with_high_speed(mut self, hook: fn(&mut Spi)) -> Self {
        self.high_speed = Some(hook);
        self
    }

    /// Card type resolved by the last successful [`init`](Self::init).
    pub fn card_type(&self) -> CardType {
        self.card_type
    }

    /// Mark the card as requiring a new initialization.
    pub fn mark_card_uninit(&mut self) {
        self.card_type = CardType::Undefined;
    }

    /// Is a card inserted. A failing detect input counts as no card.
    pub fn check_presence(&mut self) -> bool {
        match self.detect.is_active() {
            Ok(present) => present,
            Err(_) => {
                warn!("SD card detect input failed");
                false
            }
        }
    }

    /// Address argument that selects sector `block` on the initialized card.
    ///
    /// Block commands take the address as given; this maps a sector index to
    /// a byte address on standard capacity cards. `None` before
    /// initialization or when the byte address does not fit in 32 bits.
    pub fn block_address(&self, block: u32) -> Option<u32> {
        match self.card_type {
            CardType::HighCapacityV2 => Some(block),
            CardType::StandardCapacityV2 | CardType::StandardV1 => {
                block.checked_mul(BLOCK_SIZE_U32)
            }
            CardType::Undefined | CardType::NotACard => None,
        }
    }

    /// Release the bus, chip select and detect input.
    pub fn free(self) -> (Spi, Cs, Detect) {
        (self.spi, self.cs, self.detect)
    }

    /// Activate chip select.
    fn select(&mut self) -> Result<(), SdError<Spi, Cs>> {
        self.cs.on().map_err(Error::SelectError)
    }

    /// Deactivate chip select.
    fn unselect(&mut self) -> Result<(), SdError<Spi, Cs>> {
        self.cs.off().map_err(Error::SelectError)
    }

    /// Deactivate chip select and clock a few bytes so the card frees MISO.
    fn release(&mut self) -> Result<(), SdError<Spi, Cs>> {
        self.unselect()?;

        for _ in 0..Config::RELEASE_BYTES {
            self.send(tokens::FLOATING)?;
        }

        Ok(())
    }

    /// CS scope. Chip select is released on every path out of `f`.
    fn cs_scope<R, F>(&mut self, f: F) -> Result<R, SdError<Spi, Cs>>
    where
        F: FnOnce(&mut Self) -> Result<R, SdError<Spi, Cs>>,
    {
        self.select()?;
        let result = f(self);
        let released = self.release();

        result.and_then(|value| released.map(|_| value))
    }

    /// Send one byte and receive one byte.
    fn transfer(&mut self, data: u8) -> Result<u8, SdError<Spi, Cs>> {
        self.spi
            .transfer(&mut [data])
            .map(|b| b[0])
            .map_err(Error::Transport)
    }

    /// Receive a byte from the SD card by clocking in an 0xFF byte.
    fn receive(&mut self) -> Result<u8, SdError<Spi, Cs>> {
        self.transfer(tokens::FLOATING)
    }

    /// Send a byte to the SD card.
    fn send(&mut self, data: u8) -> Result<(), SdError<Spi, Cs>> {
        self.transfer(data).map(|_| ())
    }

    /// Receive a slice from the SD card.
    fn receive_slice(&mut self, data: &mut [u8]) -> Result<(), SdError<Spi, Cs>> {
        for byte in data.iter_mut() {
            *byte = self.receive()?;
        }

        Ok(())
    }

    /// Send a slice to the SD card.
    fn send_slice(&mut self, data: &[u8]) -> Result<(), SdError<Spi, Cs>> {
        for byte in data.iter() {
            self.send(*byte)?;
        }

        Ok(())
    }

    /// Skip byte.
    fn skip_byte(&mut self) -> Result<(), SdError<Spi, Cs>> {
        self.receive().map(|_| ())
    }

    /// Read up to `attempts` bytes, return the first one `accept` takes.
    fn poll_token<F: Fn(u8) -> bool>(
        &mut self,
        attempts: usize,
        accept: F,
    ) -> Result<Option<u8>, SdError<Spi, Cs>> {
        for _ in 0..attempts {
            let token = self.receive()?;

            if accept(token) {
                return Ok(Some(token));
            }
        }

        Ok(None)
    }

    /// Send a command frame and read its R1 response.
    ///
    /// Returns [`R1Response::FLOATING`] when the card never drove the bus.
    fn send_command(&mut self, command: Command, arg: u32) -> Result<R1Response, SdError<Spi, Cs>> {
        self.send_slice(&command.frame(arg))?;

        let r1 = self
            .poll_token(Config::RESPONSE_ATTEMPTS, |token| token != tokens::FLOATING)?
            .map_or(R1Response::FLOATING, R1Response);

        trace!("CMD{} 0x{:08X} -> 0x{:02X}", command.index(), arg, r1.0);

        Ok(r1)
    }

    /// Send a command that must be answered with the ready state.
    fn expect_ready(&mut self, command: Command, arg: u32) -> Result<(), SdError<Spi, Cs>> {
        let r1 = self.send_command(command, arg)?;

        if r1 != R1Response::READY_STATE {
            warn!("CMD{} rejected: 0x{:02X}", command.index(), r1.0);
            return Err(IoError::CommandRejected {
                command,
                response: r1.0,
            }
            .into());
        }

        Ok(())
    }

    /// Wait for the start token, then read a data block and drop its CRC.
    fn read_data(&mut self, data: &mut [u8]) -> Result<(), SdError<Spi, Cs>> {
        self.poll_token(Config::START_TOKEN_ATTEMPTS, |token| {
            token == tokens::DATA_START_BLOCK
        })?
        .ok_or(IoError::StartTokenTimeout)?;

        self.receive_slice(data)?;
        self.skip_byte()?;
        self.skip_byte()?;

        Ok(())
    }
}
