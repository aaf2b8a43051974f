use crate::command::Command;

/// Reason the initialization sequence stopped.
///
/// None of these are retried by the driver; the caller may run
/// [`SdCard::init`](crate::SdCard::init) again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum InitError {
    /// Card-detect input reports no card.
    CardNotDetected,
    /// GO_IDLE_STATE never answered with the idle state.
    IdleStateError,
    /// SEND_IF_COND answer did not carry the voltage window or check pattern.
    SendIfCondError,
    /// The card stayed in its initialization process.
    SendOpCondTimeout,
    /// READ_OCR was not accepted.
    ReadOcrError,
    /// SEND_IF_COND was not recognized: version 1.x card or not an SD card.
    OldVersionOrNotACard,
}

/// Reason a block operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum IoError {
    /// Card answered the command with a non-ready R1.
    CommandRejected { command: Command, response: u8 },
    /// Data response token did not report accepted data.
    DataRejected,
    /// Card stayed busy after a write.
    WriteTimeout,
    /// No start data token arrived.
    StartTokenTimeout,
    /// Erase start or end address was not accepted.
    EraseRangeError,
    /// Card stayed busy after an erase.
    EraseTimeout,
}

/// [`SdCard`](crate::SdCard) result error.
///
/// `T` - transport error type.
/// `S` - select switch error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<T, S> {
    /// Error from the SPI peripheral.
    Transport(T),
    /// Couldn't set a select.
    SelectError(S),
    /// Initialization failed.
    Init(InitError),
    /// Block operation failed.
    Io(IoError),
}

impl<T, S> From<InitError> for Error<T, S> {
    fn from(err: InitError) -> Self {
        Error::Init(err)
    }
}

impl<T, S> From<IoError> for Error<T, S> {
    fn from(err: IoError) -> Self {
        Error::Io(err)
    }
}
