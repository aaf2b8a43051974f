use crate::{
    command::Command,
    config::SdCardConfig,
    csd::{CapacityProvider, Csd, CsdData},
    error::IoError,
    response::CardStatus,
    SdCard, SdError,
};

use embedded_hal::blocking::spi::Transfer;
use size::Size;
use switch_hal::{InputSwitch, OutputSwitch};

#[cfg(feature = "defmt-log")]
use defmt::debug;
#[cfg(feature = "log")]
use log::debug;

impl<Spi, Cs, Detect, Config> SdCard<Spi, Cs, Detect, Config>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdCardConfig,
{
    /// Read the Card Specific Data register.
    pub fn read_csd(&mut self) -> Result<Csd, SdError<Spi, Cs>> {
        let mut csd_data: CsdData = Default::default();

        self.cs_scope(|s| {
            s.expect_ready(Command::SendCsd, 0x0000_0000)?;
            s.read_data(&mut csd_data)
        })?;

        Ok(Csd::from(csd_data))
    }

    /// Card capacity in 512-byte blocks.
    pub fn card_capacity_blocks(&mut self) -> Result<u64, SdError<Spi, Cs>> {
        let blocks = self.read_csd()?.card_capacity_blocks();
        debug!("SD capacity: {} blocks", blocks);

        Ok(blocks)
    }

    /// Card capacity.
    pub fn card_capacity(&mut self) -> Result<Size, SdError<Spi, Cs>> {
        Ok(self.read_csd()?.card_capacity())
    }

    /// Read the card status register.
    pub fn card_status(&mut self) -> Result<CardStatus, SdError<Spi, Cs>> {
        self.cs_scope(|s| {
            let r1 = s.send_command(Command::SendStatus, 0x0000_0000)?;
            if !r1.is_present() {
                return Err(IoError::CommandRejected {
                    command: Command::SendStatus,
                    response: r1.0,
                }
                .into());
            }

            Ok(CardStatus::new(r1, s.receive()?))
        })
    }
}
