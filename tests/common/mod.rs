//! Simulated SD card in SPI mode, shared by the integration tests.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    convert::Infallible,
    rc::Rc,
};

use embedded_hal::blocking::spi::Transfer;
use switch_hal::{InputSwitch, OutputSwitch};
use usdcard_spi::{DefaultSdCardConfig, SdCard, SdCardConfig, BLOCK_SIZE};

pub type SimCard<Config = DefaultSdCardConfig> =
    SdCard<SimSpi, SimCs, SimDetect, Config>;

/// Card behaviour knobs.
#[derive(Debug, Clone)]
pub struct Profile {
    pub present: bool,
    pub high_capacity: bool,
    /// Answer CMD0 with this instead of the idle state.
    pub cmd0_response: Option<u8>,
    /// Version 1 card: CMD8 is an illegal command.
    pub legacy: bool,
    /// Echo this check pattern instead of the one sent.
    pub cmd8_echo: Option<u8>,
    /// ACMD41 rounds answered with the idle state before ready.
    pub op_cond_rounds: usize,
    /// ACMD41 never reports ready.
    pub never_ready: bool,
    pub reject_ocr: bool,
    /// Data response token returned after a written block.
    pub data_response: u8,
    pub write_busy: usize,
    pub erase_busy: usize,
    /// Bus stays low after a write or erase.
    pub stuck_busy: bool,
    /// Bytes of 0xFF before the read start token.
    pub read_latency: usize,
    pub no_start_token: bool,
    /// Commands answered with this R1 instead of ready.
    pub reject: Vec<(u8, u8)>,
    /// Erased sectors read back as this byte.
    pub erased_value: u8,
    pub csd: [u8; 16],
    /// Bytes of 0xFF the card clocks out before each command response.
    pub response_delay: usize,
}

impl Default for Profile {
    fn default() -> Self {
        Profile {
            present: true,
            high_capacity: true,
            cmd0_response: None,
            legacy: false,
            cmd8_echo: None,
            op_cond_rounds: 3,
            never_ready: false,
            reject_ocr: false,
            data_response: 0xE5,
            write_busy: 4,
            erase_busy: 10,
            stuck_busy: false,
            read_latency: 2,
            no_start_token: false,
            reject: Vec::new(),
            erased_value: 0x00,
            csd: [
                0x40, 0x0E, 0x00, 0x32, 0x5B, 0x59, 0x00, 0x00, 0x76, 0x37, 0x7F, 0x80, 0x0A,
                0x40, 0x00, 0x8B,
            ],
            response_delay: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Command,
    AwaitWriteToken(u32),
    WriteData(u32),
}

/// Events seen on the chip select line and the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Select,
    Deselect,
    /// Command index and argument of a complete frame.
    Command(u8, u32),
    HighSpeed { selected: bool },
}

#[derive(Debug)]
pub struct Card {
    pub profile: Profile,
    pub selected: bool,
    pub sectors: HashMap<u32, [u8; BLOCK_SIZE]>,
    pub events: Vec<Event>,
    pub frames: Vec<[u8; 6]>,
    /// `(mosi, miso)` of every byte clocked while selected.
    pub bus: Vec<(u8, u8)>,
    /// Bytes clocked while the card was not selected.
    pub idle_clocks: usize,
    pub high_speed: bool,
    frame: Vec<u8>,
    data: Vec<u8>,
    out: VecDeque<u8>,
    mode: Mode,
    stuck: bool,
    op_cond_rounds: usize,
    erase_start: u32,
    erase_end: u32,
}

impl Card {
    fn new(profile: Profile) -> Self {
        Card {
            op_cond_rounds: profile.op_cond_rounds,
            profile,
            selected: false,
            sectors: HashMap::new(),
            events: Vec::new(),
            frames: Vec::new(),
            bus: Vec::new(),
            idle_clocks: 0,
            high_speed: false,
            frame: Vec::new(),
            data: Vec::new(),
            out: VecDeque::new(),
            mode: Mode::Command,
            stuck: false,
            erase_start: 0,
            erase_end: 0,
        }
    }

    pub fn sector(&self, index: u32) -> [u8; BLOCK_SIZE] {
        self.sectors
            .get(&index)
            .copied()
            .unwrap_or([self.profile.erased_value; BLOCK_SIZE])
    }

    pub fn commands(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Command(index, _) => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn commands_with_arguments(&self) -> Vec<(u8, u32)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Command(index, argument) => Some((*index, *argument)),
                _ => None,
            })
            .collect()
    }

    fn exchange(&mut self, mosi: u8) -> u8 {
        if !self.selected {
            self.idle_clocks += 1;
            return 0xFF;
        }

        let miso = match self.out.pop_front() {
            Some(byte) => byte,
            None if self.stuck => 0x00,
            None => 0xFF,
        };
        self.bus.push((mosi, miso));
        self.consume(mosi);

        miso
    }

    fn consume(&mut self, mosi: u8) {
        match self.mode {
            Mode::Command => {
                if self.frame.is_empty() && mosi & 0xC0 != 0x40 {
                    return;
                }
                self.frame.push(mosi);
                if self.frame.len() == 6 {
                    let frame: [u8; 6] = self.frame[..].try_into().unwrap();
                    self.frame.clear();
                    self.command(frame);
                }
            }
            Mode::AwaitWriteToken(sector) => {
                if mosi == 0xFE {
                    self.data.clear();
                    self.mode = Mode::WriteData(sector);
                }
            }
            Mode::WriteData(sector) => {
                self.data.push(mosi);
                if self.data.len() == BLOCK_SIZE + 2 {
                    let accepted = (self.profile.data_response >> 1) & 0b111 == 0b010;
                    if accepted {
                        let block: [u8; BLOCK_SIZE] = self.data[..BLOCK_SIZE].try_into().unwrap();
                        self.sectors.insert(sector, block);
                    }
                    self.out.push_back(self.profile.data_response);
                    if accepted {
                        self.busy(self.profile.write_busy);
                    }
                    self.mode = Mode::Command;
                }
            }
        }
    }

    fn busy(&mut self, bytes: usize) {
        self.out.extend(std::iter::repeat(0x00).take(bytes));
        if self.profile.stuck_busy {
            self.stuck = true;
        }
    }

    fn sector_of(&self, argument: u32) -> u32 {
        if self.profile.high_capacity {
            argument
        } else {
            argument / BLOCK_SIZE as u32
        }
    }

    fn respond(&mut self, bytes: &[u8]) {
        self.out
            .extend(std::iter::repeat(0xFF).take(self.profile.response_delay));
        self.out.extend(bytes.iter().copied());
    }

    fn command(&mut self, frame: [u8; 6]) {
        let index = frame[0] & 0x3F;
        let argument = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
        self.frames.push(frame);
        self.events.push(Event::Command(index, argument));

        if let Some(&(_, r1)) = self.profile.reject.iter().find(|(cmd, _)| *cmd == index) {
            self.respond(&[r1]);
            return;
        }

        match index {
            0 => {
                let r1 = self.profile.cmd0_response.unwrap_or(0x01);
                self.respond(&[r1]);
            }
            8 => {
                if self.profile.legacy {
                    self.respond(&[0x05]);
                } else {
                    let echo = self.profile.cmd8_echo.unwrap_or(frame[4]);
                    self.respond(&[0x01, 0x00, 0x00, frame[3] & 0x0F, echo]);
                }
            }
            9 => {
                let mut bytes = vec![0x00, 0xFF, 0xFE];
                bytes.extend_from_slice(&self.profile.csd);
                bytes.extend_from_slice(&[0x12, 0x34]);
                self.respond(&bytes);
            }
            13 => self.respond(&[0x00, 0x00]),
            17 => {
                let sector = self.sector(self.sector_of(argument));
                let mut bytes = vec![0x00];
                if !self.profile.no_start_token {
                    bytes.extend(std::iter::repeat(0xFF).take(self.profile.read_latency));
                    bytes.push(0xFE);
                    bytes.extend_from_slice(&sector);
                    bytes.extend_from_slice(&[0xAB, 0xCD]);
                }
                self.respond(&bytes);
            }
            24 => {
                self.respond(&[0x00]);
                self.mode = Mode::AwaitWriteToken(self.sector_of(argument));
            }
            32 => {
                self.erase_start = self.sector_of(argument);
                self.respond(&[0x00]);
            }
            33 => {
                self.erase_end = self.sector_of(argument);
                self.respond(&[0x00]);
            }
            38 => {
                for sector in self.erase_start..=self.erase_end {
                    self.sectors
                        .insert(sector, [self.profile.erased_value; BLOCK_SIZE]);
                }
                self.respond(&[0x00]);
                self.busy(self.profile.erase_busy);
            }
            41 => {
                if self.profile.never_ready || self.op_cond_rounds > 0 {
                    self.op_cond_rounds = self.op_cond_rounds.saturating_sub(1);
                    self.respond(&[0x01]);
                } else {
                    self.respond(&[0x00]);
                }
            }
            55 => self.respond(&[0x01]),
            58 => {
                if self.profile.reject_ocr {
                    self.respond(&[0x05]);
                } else {
                    let first = if self.profile.high_capacity { 0xC0 } else { 0x80 };
                    self.respond(&[0x00, first, 0xFF, 0x80, 0x00]);
                }
            }
            _ => self.respond(&[0x04]),
        }
    }
}

pub type Shared = Rc<RefCell<Card>>;

pub struct SimSpi(Shared);

impl SimSpi {
    pub fn set_high_speed(&mut self) {
        let mut card = self.0.borrow_mut();
        card.high_speed = true;
        let selected = card.selected;
        card.events.push(Event::HighSpeed { selected });
    }
}

impl Transfer<u8> for SimSpi {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        let mut card = self.0.borrow_mut();
        for word in words.iter_mut() {
            *word = card.exchange(*word);
        }
        Ok(words)
    }
}

pub struct SimCs(Shared);

impl OutputSwitch for SimCs {
    type Error = Infallible;

    fn on(&mut self) -> Result<(), Self::Error> {
        let mut card = self.0.borrow_mut();
        card.selected = true;
        card.events.push(Event::Select);
        Ok(())
    }

    fn off(&mut self) -> Result<(), Self::Error> {
        let mut card = self.0.borrow_mut();
        card.selected = false;
        card.frame.clear();
        card.out.clear();
        card.mode = Mode::Command;
        card.stuck = false;
        card.events.push(Event::Deselect);
        Ok(())
    }
}

pub struct SimDetect(Shared);

impl InputSwitch for SimDetect {
    type Error = Infallible;

    fn is_active(&self) -> Result<bool, Self::Error> {
        Ok(self.0.borrow().profile.present)
    }
}

/// Driver wired to a fresh simulated card.
pub fn sim_card(profile: Profile) -> (SimCard, Shared) {
    sim_card_with::<DefaultSdCardConfig>(profile)
}

/// Driver with custom polling bounds wired to a fresh simulated card.
pub fn sim_card_with<Config: SdCardConfig>(profile: Profile) -> (SimCard<Config>, Shared) {
    let shared = Rc::new(RefCell::new(Card::new(profile)));
    let card = SdCard::new(
        SimSpi(shared.clone()),
        SimCs(shared.clone()),
        SimDetect(shared.clone()),
    )
    .with_high_speed(|spi: &mut SimSpi| spi.set_high_speed());

    (card, shared)
}

/// Driver over an initialized simulated card.
pub fn ready_card(profile: Profile) -> (SimCard, Shared) {
    let (mut card, shared) = sim_card(profile);
    card.init().expect("init");
    {
        let mut sim = shared.borrow_mut();
        sim.events.clear();
        sim.frames.clear();
        sim.bus.clear();
    }

    (card, shared)
}

/// Chip select ends released and every select is matched by a deselect.
pub fn assert_released(shared: &Shared) {
    let card = shared.borrow();
    assert!(!card.selected, "card left selected");

    let selects = card.events.iter().filter(|e| **e == Event::Select).count();
    let deselects = card.events.iter().filter(|e| **e == Event::Deselect).count();
    assert!(deselects >= selects, "unbalanced chip select: {:?}", card.events);
}

/// MOSI bytes clocked after the R1 that answered `frame`.
pub fn sent_after_response(shared: &Shared, frame: [u8; 6], count: usize) -> Vec<u8> {
    let card = shared.borrow();
    let bus = &card.bus;
    let end = bus
        .windows(6)
        .position(|w| w.iter().map(|(mosi, _)| *mosi).eq(frame))
        .expect("frame on the bus")
        + 6;
    let r1 = end
        + bus[end..]
            .iter()
            .position(|(_, miso)| *miso != 0xFF)
            .expect("response on the bus");

    bus[r1 + 1..]
        .iter()
        .take(count)
        .map(|(mosi, _)| *mosi)
        .collect()
}

pub fn filled(value: u8) -> [u8; BLOCK_SIZE] {
    [value; BLOCK_SIZE]
}
