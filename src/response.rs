use crate::consts::{arguments, tokens};

use bitfield::bitfield;

bitfield! {
    /// R1 response bitset.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct R1Response(u8);
    impl Debug;
    pub in_idle_state, _: 0;
    pub erase_reset, _: 1;
    pub illegal_command, _: 2;
    pub command_crc_error, _: 3;
    pub erase_sequence_error, _: 4;
    pub address_error, _: 5;
    pub parameter_error, _: 6;
}

impl R1Response {
    /// Card is initialized and accepted the command.
    pub const READY_STATE: Self = R1Response(0x00);
    /// Card is in the idle state, no error.
    pub const IN_IDLE_STATE: Self = R1Response(0x01);
    /// Nothing drove the bus within the response window.
    pub const FLOATING: Self = R1Response(tokens::FLOATING);

    /// Was a response received at all.
    pub fn is_present(&self) -> bool {
        *self != Self::FLOATING
    }
}

bitfield! {
    /// R7 payload of SEND_IF_COND, big-endian.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct IfCond(u32);
    impl Debug;
    pub u8, command_version, _: 31, 28;
    pub u8, voltage_accepted, _: 15, 8;
    pub u8, check_pattern, _: 7, 0;
}

impl IfCond {
    /// Card accepted the 2.7-3.6V window and echoed the check pattern.
    pub fn is_valid(&self) -> bool {
        self.voltage_accepted() == arguments::IF_COND_VOLTAGE
            && self.check_pattern() == arguments::IF_COND_CHECK_PATTERN
    }
}

impl From<[u8; 4]> for IfCond {
    fn from(payload: [u8; 4]) -> Self {
        IfCond(u32::from_be_bytes(payload))
    }
}

bitfield! {
    /// R3 payload of READ_OCR, big-endian.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Ocr(u32);
    impl Debug;
    pub power_up_complete, _: 31;
    pub card_capacity_status, _: 30;
    pub u16, voltage_window, _: 23, 15;
}

impl From<[u8; 4]> for Ocr {
    fn from(payload: [u8; 4]) -> Self {
        Ocr(u32::from_be_bytes(payload))
    }
}

bitfield! {
    /// Data response token after a written block.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct DataResponse(u8);
    impl Debug;
    pub u8, status, _: 3, 1;
}

impl DataResponse {
    pub fn is_accepted(&self) -> bool {
        self.status() == tokens::DATA_ACCEPTED
    }
}

bitfield! {
    /// R2 response of SEND_STATUS: R1 in the high byte, status in the low byte.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
    pub struct CardStatus(u16);
    impl Debug;
    pub card_is_locked, _: 0;
    pub lock_unlock_failed, _: 1;
    pub error, _: 2;
    pub cc_error, _: 3;
    pub card_ecc_failed, _: 4;
    pub wp_violation, _: 5;
    pub erase_param, _: 6;
    pub out_of_range, _: 7;
    pub u8, r1, _: 15, 8;
}

impl CardStatus {
    pub fn new(r1: R1Response, status: u8) -> Self {
        CardStatus(u16::from_be_bytes([r1.0, status]))
    }

    /// No R1 flag and no status flag set.
    pub fn is_ready(&self) -> bool {
        self.0 == 0
    }
}
