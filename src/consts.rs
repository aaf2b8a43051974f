/// Size of one sector in bytes.
pub const BLOCK_SIZE: usize = 512;
/// Size of one sector in bytes, as `u32` for address arithmetic.
pub const BLOCK_SIZE_U32: u32 = BLOCK_SIZE as u32;
/// Size of one sector in bytes, as `u64` for capacity arithmetic.
pub const BLOCK_SIZE_U64: u64 = BLOCK_SIZE as u64;

pub mod tokens {
    /// Value of an undriven bus, also clocked out while receiving.
    pub const FLOATING: u8 = 0xFF;
    /// Card holds the bus low while it is programming or erasing.
    pub const BUSY: u8 = 0x00;
    /// Start data token for read or write single block.
    pub const DATA_START_BLOCK: u8 = 0xFE;
    /// Stub CRC byte sent after a data block.
    pub const CRC_FILLER: u8 = 0xFF;
    /// Data response status field value for accepted data.
    pub const DATA_ACCEPTED: u8 = 0b010;
}

pub mod arguments {
    /// Voltage window code 2.7-3.6V sent with SEND_IF_COND.
    pub const IF_COND_VOLTAGE: u8 = 0x01;
    /// Check pattern the card must echo back from SEND_IF_COND.
    pub const IF_COND_CHECK_PATTERN: u8 = 0xAA;
    /// Full SEND_IF_COND argument.
    pub const IF_COND: u32 = ((IF_COND_VOLTAGE as u32) << 8) | IF_COND_CHECK_PATTERN as u32;
    /// Host capacity support bit for SD_SEND_OP_COND.
    pub const HOST_CAPACITY_SUPPORT: u32 = 0x4000_0000;
}
