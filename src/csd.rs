use crate::consts::BLOCK_SIZE_U64;

use bitfield::bitfield;
use size::Size;

/// Card Specific Data block.
pub type CsdData = [u8; 16];

bitfield! {
    /// Card Specific Data, version 1 (standard capacity).
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct CsdV1(u128);
    impl Debug;
    pub u8, version, _: 127, 126;
    pub u8, max_data_transfer_rate, _: 103, 96;
    pub u16, card_command_classes, _: 95, 84;
    pub u8, read_block_length, _: 83, 80;
    pub u16, device_size, _: 73, 62;
    pub u8, device_size_multiplier, _: 49, 47;
    pub erase_single_block_enabled, _: 46;
    pub u8, erase_sector_size, _: 45, 39;
    pub permanent_write_protection, _: 13;
    pub temporary_write_protection, _: 12;
}

bitfield! {
    /// Card Specific Data, version 2 (high and extended capacity).
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct CsdV2(u128);
    impl Debug;
    pub u8, version, _: 127, 126;
    pub u8, max_data_transfer_rate, _: 103, 96;
    pub u16, card_command_classes, _: 95, 84;
    pub u8, read_block_length, _: 83, 80;
    pub u32, device_size, _: 69, 48;
    pub erase_single_block_enabled, _: 46;
    pub u8, erase_sector_size, _: 45, 39;
    pub permanent_write_protection, _: 13;
    pub temporary_write_protection, _: 12;
}

/// Card Specific Data, generic container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Csd {
    V1(CsdV1),
    V2(CsdV2),
}

/// Represents capacity provider.
pub trait CapacityProvider {
    /// Returns the card capacity in 512-byte blocks.
    fn card_capacity_blocks(&self) -> u64;

    /// Returns the card capacity in bytes.
    fn card_capacity(&self) -> Size {
        Size::from_bytes(self.card_capacity_blocks() * BLOCK_SIZE_U64)
    }
}

impl From<CsdData> for Csd {
    /// Pick the layout from the CSD_STRUCTURE field.
    fn from(csd_data: CsdData) -> Self {
        let raw = u128::from_be_bytes(csd_data);

        match CsdV1(raw).version() {
            0 => Csd::V1(CsdV1(raw)),
            _ => Csd::V2(CsdV2(raw)),
        }
    }
}

impl CapacityProvider for CsdV1 {
    fn card_capacity_blocks(&self) -> u64 {
        let shift = u32::from(self.device_size_multiplier()) + 2 + u32::from(self.read_block_length());

        (u64::from(self.device_size()) + 1) << shift >> 9
    }
}

impl CapacityProvider for CsdV2 {
    fn card_capacity_blocks(&self) -> u64 {
        (u64::from(self.device_size()) + 1) * 1024
    }
}

impl CapacityProvider for Csd {
    fn card_capacity_blocks(&self) -> u64 {
        match self {
            Csd::V1(csd) => csd.card_capacity_blocks(),
            Csd::V2(csd) => csd.card_capacity_blocks(),
        }
    }
}
