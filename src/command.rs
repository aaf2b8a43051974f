use crate::consts::arguments;

/// Frame start bits, OR-ed with the command index.
const CMD_BASE: u8 = 0x40;
/// Checksum byte sent when the card is not checking CRC.
const CRC_FILLER: u8 = 0xFF;

/// Commands used by the driver, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// CMD0 GO_IDLE_STATE - software reset, enters SPI mode when CS is low.
    GoIdleState = 0,
    /// CMD8 SEND_IF_COND - check voltage range and card version.
    SendIfCond = 8,
    /// CMD9 SEND_CSD - read the Card Specific Data register.
    SendCsd = 9,
    /// CMD13 SEND_STATUS - read the card status register.
    SendStatus = 13,
    /// CMD17 READ_SINGLE_BLOCK.
    ReadSingleBlock = 17,
    /// CMD24 WRITE_BLOCK.
    WriteBlock = 24,
    /// CMD32 ERASE_WR_BLK_START_ADDR.
    EraseStart = 32,
    /// CMD33 ERASE_WR_BLK_END_ADDR.
    EraseEnd = 33,
    /// CMD38 ERASE - erase the selected range.
    Erase = 38,
    /// ACMD41 SD_SEND_OP_COND - start the card's initialization process.
    SdSendOpCond = 41,
    /// CMD55 APP_CMD - next command is application specific.
    AppCmd = 55,
    /// CMD58 READ_OCR - read the Operation Conditions Register.
    ReadOcr = 58,
}

/// Source of the four argument bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Argument {
    /// Argument is fixed by the protocol stage, caller value is ignored.
    Fixed(u32),
    /// Argument comes from the caller.
    Caller,
}

/// Trailing checksum byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checksum {
    /// CRC7 of the fixed frame, required before CRC checking is off.
    Precomputed(u8),
    Filler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Framing {
    argument: Argument,
    checksum: Checksum,
}

impl Framing {
    const fn new(argument: Argument, checksum: Checksum) -> Self {
        Framing { argument, checksum }
    }
}

impl Command {
    /// Frame size in bytes.
    pub const FRAME_SIZE: usize = 6;

    /// Command index.
    pub const fn index(self) -> u8 {
        self as u8
    }

    const fn framing(self) -> Framing {
        use Argument::{Caller, Fixed};
        use Checksum::{Filler, Precomputed};

        match self {
            Command::GoIdleState => Framing::new(Fixed(0), Precomputed(0x95)),
            Command::SendIfCond => Framing::new(Fixed(arguments::IF_COND), Precomputed(0x87)),
            Command::SendCsd | Command::SendStatus | Command::AppCmd | Command::ReadOcr => {
                Framing::new(Fixed(0), Filler)
            }
            Command::SdSendOpCond => {
                Framing::new(Fixed(arguments::HOST_CAPACITY_SUPPORT), Filler)
            }
            Command::ReadSingleBlock
            | Command::WriteBlock
            | Command::EraseStart
            | Command::EraseEnd
            | Command::Erase => Framing::new(Caller, Filler),
        }
    }

    /// Encode the 6-byte command frame.
    pub fn frame(self, argument: u32) -> [u8; Self::FRAME_SIZE] {
        let framing = self.framing();
        let argument = match framing.argument {
            Argument::Fixed(fixed) => fixed,
            Argument::Caller => argument,
        };
        let crc = match framing.checksum {
            Checksum::Precomputed(crc) => crc,
            Checksum::Filler => CRC_FILLER,
        };
        let [a3, a2, a1, a0] = argument.to_be_bytes();

        [CMD_BASE | self.index(), a3, a2, a1, a0, crc]
    }
}
