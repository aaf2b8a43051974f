/// Represents config for [`SdCard`](crate::SdCard).
///
/// All waits in the driver are bus polls bounded by these counts.
pub trait SdCardConfig {
    /// Count of `0xFF` bytes clocked with the card deselected before CMD0.
    const SYNC_BYTES: usize;
    /// Max bytes read while waiting for a command response.
    const RESPONSE_ATTEMPTS: usize;
    /// Max bus reads while waiting for the idle state after CMD0.
    const IDLE_ATTEMPTS: usize;
    /// Max bus reads while waiting for CMD8 to be accepted.
    const IF_COND_ATTEMPTS: usize;
    /// Max CMD55 + ACMD41 rounds.
    const OP_COND_ATTEMPTS: usize;
    /// Max bus reads while waiting for a start data token.
    const START_TOKEN_ATTEMPTS: usize;
    /// Max bus reads while the card is busy programming or erasing.
    const BUSY_ATTEMPTS: usize;
    /// Count of `0xFF` bytes clocked after chip select is released.
    const RELEASE_BYTES: usize;
}

/// Default implementation of [`SdCardConfig`](crate::SdCardConfig).
pub struct DefaultSdCardConfig;

impl SdCardConfig for DefaultSdCardConfig {
    const SYNC_BYTES: usize = 16;
    const RESPONSE_ATTEMPTS: usize = 8;
    const IDLE_ATTEMPTS: usize = 100;
    const IF_COND_ATTEMPTS: usize = 100;
    const OP_COND_ATTEMPTS: usize = 1000;
    const START_TOKEN_ATTEMPTS: usize = 1000;
    const BUSY_ATTEMPTS: usize = 0xFFFF;
    const RELEASE_BYTES: usize = 6;
}
