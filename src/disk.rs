use crate::{
    command::Command, config::SdCardConfig, consts::BLOCK_SIZE, error::IoError,
    DefaultSdCardConfig, SdCard, SdError,
};

use core::cell::RefCell;
use diskio::{DiskioDevice, Error as DiskioError, IoctlCmd, Lba, Status, StatusFlag};
use embedded_hal::blocking::spi::Transfer;
use switch_hal::{InputSwitch, OutputSwitch};

#[cfg(feature = "defmt-log")]
use defmt::{error, info, warn};
#[cfg(feature = "log")]
use log::{error, info, warn};

/// Error type alias.
type ErrorFor<T> = <T as DiskioDevice>::HardwareError;

/// [`DiskioDevice`] over an [`SdCard`].
///
/// Multi-sector buffers are transferred one single-block command at a time.
/// LBAs are mapped through [`SdCard::block_address`].
pub struct SdCardDisk<Spi, Cs, Detect, Config = DefaultSdCardConfig>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdCardConfig,
{
    card: RefCell<SdCard<Spi, Cs, Detect, Config>>,
    status: Status,
}

impl<Spi, Cs, Detect, Config> SdCardDisk<Spi, Cs, Detect, Config>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdCardConfig,
{
    /// Creates a new [`SdCardDisk`], not initialized until
    /// [`DiskioDevice::initialize`] is called.
    pub fn new(card: SdCard<Spi, Cs, Detect, Config>) -> Self {
        SdCardDisk {
            card: RefCell::new(card),
            status: StatusFlag::NotInitialized.into(),
        }
    }

    /// Give back the driver session.
    pub fn into_inner(self) -> SdCard<Spi, Cs, Detect, Config> {
        self.card.into_inner()
    }

    /// Validate buffer for read/write.
    fn validate_buffer_len(buf_len: usize) -> Result<(), DiskioError<ErrorFor<Self>>> {
        if buf_len == 0 || buf_len % BLOCK_SIZE != 0 {
            error!(
                "SD invalid buffer, length: {}, block size: {}",
                buf_len, BLOCK_SIZE
            );
            Err(DiskioError::InvalidArgument)
        } else {
            Ok(())
        }
    }

    /// Validate initialized.
    fn validate_initialized(&self) -> Result<(), DiskioError<ErrorFor<Self>>> {
        if self.status.contains(StatusFlag::NotInitialized) {
            Err(DiskioError::NotInitialized)
        } else {
            Ok(())
        }
    }

    /// First sector index, checked so the whole buffer stays addressable.
    fn first_block(lba: Lba, buf_len: usize) -> Result<u32, DiskioError<ErrorFor<Self>>> {
        let first = u32::try_from(lba).map_err(|_| DiskioError::InvalidArgument)?;
        let count = u32::try_from(buf_len / BLOCK_SIZE).map_err(|_| DiskioError::InvalidArgument)?;

        first
            .checked_add(count - 1)
            .map(|_| first)
            .ok_or(DiskioError::InvalidArgument)
    }
}

impl<Spi, Cs, Detect, Config> DiskioDevice for SdCardDisk<Spi, Cs, Detect, Config>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdCardConfig,
{
    type HardwareError = SdError<Spi, Cs>;

    fn status(&self) -> Status {
        self.status
    }

    fn reset(&mut self) {
        info!("SD reset invoked");
        self.card.get_mut().mark_card_uninit();
        self.status = StatusFlag::NotInitialized.into();
    }

    fn initialize(&mut self) -> Result<(), DiskioError<Self::HardwareError>> {
        if !self.status.contains(StatusFlag::NotInitialized) {
            warn!("SD already is initialized");
            return Err(DiskioError::AlreadyInitialized);
        }

        match self.card.get_mut().init() {
            Ok(_) => {
                self.status = Status::default();
                Ok(())
            }
            Err(err) => {
                self.status = StatusFlag::ErrorOccured | StatusFlag::NotInitialized;
                Err(DiskioError::Hardware(err))
            }
        }
    }

    fn read(&self, buf: &mut [u8], lba: Lba) -> Result<(), DiskioError<Self::HardwareError>> {
        Self::validate_buffer_len(buf.len())?;
        self.validate_initialized()?;

        let first = Self::first_block(lba, buf.len())?;
        let mut card = self.card.borrow_mut();

        for (index, chunk) in buf.chunks_mut(BLOCK_SIZE).enumerate() {
            let chunk = chunk
                .try_into()
                .map_err(|_| DiskioError::InvalidArgument)?;
            let address = card
                .block_address(first + index as u32)
                .ok_or(DiskioError::InvalidArgument)?;
            card.read_block(chunk, address)
                .map_err(DiskioError::Hardware)?;
        }

        Ok(())
    }

    fn write(&self, buf: &[u8], lba: Lba) -> Result<(), DiskioError<Self::HardwareError>> {
        Self::validate_buffer_len(buf.len())?;
        self.validate_initialized()?;

        let first = Self::first_block(lba, buf.len())?;
        let mut card = self.card.borrow_mut();

        for (index, chunk) in buf.chunks(BLOCK_SIZE).enumerate() {
            let chunk = chunk
                .try_into()
                .map_err(|_| DiskioError::InvalidArgument)?;
            let address = card
                .block_address(first + index as u32)
                .ok_or(DiskioError::InvalidArgument)?;
            card.write_block(chunk, address)
                .map_err(DiskioError::Hardware)?;
        }

        Ok(())
    }

    fn ioctl(&self, cmd: IoctlCmd) -> Result<(), DiskioError<Self::HardwareError>> {
        match cmd {
            IoctlCmd::CtrlSync => {
                self.validate_initialized()?;

                let status = self
                    .card
                    .borrow_mut()
                    .card_status()
                    .map_err(DiskioError::Hardware)?;

                if status.is_ready() {
                    Ok(())
                } else {
                    warn!("SD not ready, status: 0x{:04X}", status.0);
                    Err(DiskioError::Hardware(IoError::CommandRejected {
                        command: Command::SendStatus,
                        response: status.r1(),
                    }
                    .into()))
                }
            }
            IoctlCmd::GetBlockSize(block_size) => {
                *block_size = BLOCK_SIZE;
                Ok(())
            }
            _ => Err(DiskioError::NotSupported),
        }
    }
}
