use crate::{
    command::Command,
    config::SdCardConfig,
    consts::tokens,
    error::IoError,
    response::{DataResponse, R1Response},
    Block, SdCard, SdError,
};

use embedded_hal::blocking::spi::Transfer;
use switch_hal::{InputSwitch, OutputSwitch};

#[cfg(feature = "defmt-log")]
use defmt::{debug, warn};
#[cfg(feature = "log")]
use log::{debug, warn};

impl<Spi, Cs, Detect, Config> SdCard<Spi, Cs, Detect, Config>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdCardConfig,
{
    /// Write one sector.
    ///
    /// `address` goes to the card unchanged: a sector index on high capacity
    /// cards, a byte address on standard capacity ones.
    pub fn write_block(&mut self, data: &Block, address: u32) -> Result<(), SdError<Spi, Cs>> {
        debug!("SD write block {}", address);

        self.cs_scope(|s| {
            s.expect_ready(Command::WriteBlock, address)?;

            s.send(tokens::DATA_START_BLOCK)?;
            s.send_slice(data)?;
            s.send(tokens::CRC_FILLER)?;
            s.send(tokens::CRC_FILLER)?;

            let response = DataResponse(s.receive()?);
            if !response.is_accepted() {
                warn!("SD data rejected: 0x{:02X}", response.0);
                return Err(IoError::DataRejected.into());
            }

            s.poll_token(Config::BUSY_ATTEMPTS, |token| token != tokens::BUSY)?
                .ok_or(IoError::WriteTimeout)?;

            Ok(())
        })
    }

    /// Read one sector.
    pub fn read_block(&mut self, out: &mut Block, address: u32) -> Result<(), SdError<Spi, Cs>> {
        debug!("SD read block {}", address);

        self.cs_scope(|s| {
            s.expect_ready(Command::ReadSingleBlock, address)?;
            s.read_data(out)
        })
    }

    /// Erase the sectors from `start` to `stop`, both included.
    ///
    /// Erased sectors read back as zeros on the cards this driver targets;
    /// cards that report an erased state of `0xFF` read back `0xFF`.
    pub fn erase_blocks(&mut self, start: u32, stop: u32) -> Result<(), SdError<Spi, Cs>> {
        debug!("SD erase blocks {}..={}", start, stop);

        self.cs_scope(|s| {
            for (command, address) in [(Command::EraseStart, start), (Command::EraseEnd, stop)] {
                let r1 = s.send_command(command, address)?;

                if r1 != R1Response::READY_STATE {
                    warn!("CMD{} rejected: 0x{:02X}", command.index(), r1.0);
                    return Err(IoError::EraseRangeError.into());
                }
            }

            // Busy wait below covers a missing or failed CMD38 answer.
            s.send_command(Command::Erase, 0x0000_0000)?;

            s.poll_token(Config::BUSY_ATTEMPTS, |token| token != tokens::BUSY)?
                .ok_or(IoError::EraseTimeout)?;

            Ok(())
        })
    }
}
