//! Register level model of an nRF24L01+ for the unit tests
//!
//! The model keeps the register map, both FIFOs and the CE/CSN/IRQ lines,
//! and records every SPI transfer and delay so tests can check timing.
//! Nothing is transmitted on its own: tests move frames with
//! [`Chip::receive`] and [`Chip::complete_tx`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;

use crate::config::Params;
use crate::netdev::NetDev;
use crate::registers::{
    CONFIG, EN_AA, EN_RXADDR, FIFO_STATUS, RF_CH, RF_SETUP, RX_ADDR_P0, RX_ADDR_P1, RX_ADDR_P2,
    RX_ADDR_P3, RX_ADDR_P4, RX_ADDR_P5, SETUP_AW, SETUP_RETR, STATUS, TX_ADDR,
};
use crate::{IrqFlag, IrqPin, MAX_ADDR_BYTES, MAX_PAYLOAD_WIDTH, NRF24L01};

const FIFO_DEPTH: usize = 3;
const IRQ_FLAGS: u8 = 0x70;
const RX_DR: u8 = 0x40;
const TX_DS: u8 = 0x20;
const MAX_RT: u8 = 0x10;

pub type SimIrqFlag = &'static IrqFlag<SimIrq>;
pub type SimRadio = NRF24L01<SimCe, SimCsn, SimSpi, SimDelay, SimIrqFlag>;

/// Error of a [`SimSpi`] transfer after [`Chip::fail_after`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError;
pub type SharedChip = Rc<RefCell<Chip>>;

pub struct Chip {
    regs: [u8; 0x20],
    /// RX_ADDR_P0, RX_ADDR_P1 and TX_ADDR, LSByte first like the chip stores them
    long_addrs: [[u8; MAX_ADDR_BYTES]; 3],
    rx_fifo: VecDeque<(u8, Vec<u8>)>,
    tx_fifo: VecDeque<(Vec<u8>, bool)>,
    forced_rx_width: Option<u8>,
    connected: bool,
    ce: bool,
    ce_high_since: u64,
    ce_edges: usize,
    ce_pulses: Vec<u64>,
    csn_high: bool,
    irq_enabled: bool,
    now_us: u64,
    delays: Vec<u32>,
    transfers: Vec<Vec<u8>>,
    transactions: usize,
    unframed_transfers: usize,
    transfers_until_failure: Option<usize>,
}

impl Chip {
    fn new() -> Self {
        let mut regs = [0; 0x20];
        regs[usize::from(CONFIG)] = 0x08;
        regs[usize::from(EN_AA)] = 0x3F;
        regs[usize::from(EN_RXADDR)] = 0x03;
        regs[usize::from(SETUP_AW)] = 0x03;
        regs[usize::from(SETUP_RETR)] = 0x03;
        regs[usize::from(RF_CH)] = 0x02;
        regs[usize::from(RF_SETUP)] = 0x0E;
        regs[usize::from(STATUS)] = 0x0E;
        regs[usize::from(RX_ADDR_P2)] = 0xC3;
        regs[usize::from(RX_ADDR_P3)] = 0xC4;
        regs[usize::from(RX_ADDR_P4)] = 0xC5;
        regs[usize::from(RX_ADDR_P5)] = 0xC6;
        Chip {
            regs,
            long_addrs: [[0xE7; MAX_ADDR_BYTES], [0xC2; MAX_ADDR_BYTES], [0xE7; MAX_ADDR_BYTES]],
            rx_fifo: VecDeque::new(),
            tx_fifo: VecDeque::new(),
            forced_rx_width: None,
            connected: true,
            ce: false,
            ce_high_since: 0,
            ce_edges: 0,
            ce_pulses: Vec::new(),
            csn_high: true,
            irq_enabled: false,
            now_us: 0,
            delays: Vec::new(),
            transfers: Vec::new(),
            transactions: 0,
            unframed_transfers: 0,
            transfers_until_failure: None,
        }
    }

    fn long_addr_index(addr: u8) -> Option<usize> {
        match addr {
            RX_ADDR_P0 => Some(0),
            RX_ADDR_P1 => Some(1),
            TX_ADDR => Some(2),
            _ => None,
        }
    }

    fn status(&self) -> u8 {
        let rx_p_no = self.rx_fifo.front().map(|(pipe, _)| *pipe).unwrap_or(7);
        let tx_full = u8::from(self.tx_fifo.len() >= FIFO_DEPTH);
        (self.regs[usize::from(STATUS)] & IRQ_FLAGS) | (rx_p_no << 1) | tx_full
    }

    fn fifo_status(&self) -> u8 {
        let mut fifo_status = 0;
        if self.tx_fifo.len() >= FIFO_DEPTH {
            fifo_status |= 0x20;
        }
        if self.tx_fifo.is_empty() {
            fifo_status |= 0x10;
        }
        if self.rx_fifo.len() >= FIFO_DEPTH {
            fifo_status |= 0x02;
        }
        if self.rx_fifo.is_empty() {
            fifo_status |= 0x01;
        }
        fifo_status
    }

    fn read_byte(&self, addr: u8, index: usize) -> u8 {
        if let Some(i) = Self::long_addr_index(addr) {
            return self.long_addrs[i].get(index).copied().unwrap_or(0);
        }
        if index > 0 {
            return 0;
        }
        match addr {
            STATUS => self.status(),
            FIFO_STATUS => self.fifo_status(),
            _ => self.regs[usize::from(addr)],
        }
    }

    fn write(&mut self, addr: u8, data: &[u8]) {
        if let Some(i) = Self::long_addr_index(addr) {
            for (dst, src) in self.long_addrs[i].iter_mut().zip(data) {
                *dst = *src;
            }
            return;
        }
        let value = match data.first() {
            Some(value) => *value,
            None => return,
        };
        match addr {
            STATUS => self.regs[usize::from(STATUS)] &= !(value & IRQ_FLAGS),
            FIFO_STATUS => {}
            _ => self.regs[usize::from(addr)] = value,
        }
    }

    fn execute(&mut self, words: &mut [u8]) {
        let mosi = words.to_vec();
        let cmd = mosi[0];
        for word in words.iter_mut() {
            *word = 0;
        }
        self.transfers.push(mosi.clone());
        if !self.connected {
            return;
        }
        words[0] = self.status();
        let data = &mosi[1..];
        match cmd {
            0x00..=0x1F => {
                for (i, word) in words[1..].iter_mut().enumerate() {
                    *word = self.read_byte(cmd, i);
                }
            }
            0x20..=0x3F => self.write(cmd & 0x1F, data),
            0x60 => {
                let width = self
                    .rx_fifo
                    .front()
                    .map(|(_, payload)| payload.len() as u8)
                    .unwrap_or(0);
                words[1] = self.forced_rx_width.unwrap_or(width);
            }
            0x61 => {
                if let Some((_, payload)) = self.rx_fifo.pop_front() {
                    for (word, byte) in words[1..].iter_mut().zip(payload.iter().rev()) {
                        *word = *byte;
                    }
                }
            }
            0xA0 | 0xB0 => {
                if self.tx_fifo.len() < FIFO_DEPTH {
                    let payload = data.iter().rev().copied().collect();
                    self.tx_fifo.push_back((payload, cmd == 0xB0));
                }
            }
            0xE1 => self.tx_fifo.clear(),
            0xE2 => self.rx_fifo.clear(),
            _ => {}
        }
    }

    /// Value of a single byte register; LSByte of the address registers
    pub fn reg(&self, addr: u8) -> u8 {
        self.read_byte(addr, 0)
    }

    pub fn set_reg(&mut self, addr: u8, value: u8) {
        self.regs[usize::from(addr)] = value;
    }

    /// First `len` bytes of an address register, MSByte first
    pub fn address(&self, addr: u8, len: usize) -> Vec<u8> {
        let mut address: Vec<u8> = (0..len).map(|i| self.read_byte(addr, i)).collect();
        address.reverse();
        address
    }

    /// Store `address` (MSByte first) into an address register
    pub fn set_address(&mut self, addr: u8, address: &[u8]) {
        let wire: Vec<u8> = address.iter().rev().copied().collect();
        self.write(addr, &wire);
    }

    /// A frame arrives on `pipe`
    pub fn receive(&mut self, pipe: u8, payload: &[u8]) {
        assert!(payload.len() <= MAX_PAYLOAD_WIDTH);
        if self.rx_fifo.len() < FIFO_DEPTH {
            self.rx_fifo.push_back((pipe, payload.to_vec()));
        }
        self.regs[usize::from(STATUS)] |= RX_DR;
    }

    /// The payload at the head of the TX FIFO was acknowledged (`TX_DS`) or
    /// ran out of retransmissions (`MAX_RT`, payload stays in the FIFO)
    pub fn complete_tx(&mut self, acked: bool) {
        if acked {
            self.tx_fifo.pop_front();
            self.regs[usize::from(STATUS)] |= TX_DS;
        } else {
            self.regs[usize::from(STATUS)] |= MAX_RT;
        }
    }

    /// Report `width` from `R_RX_PL_WID` instead of the real payload width
    pub fn force_rx_width(&mut self, width: Option<u8>) {
        self.forced_rx_width = width;
    }

    pub fn rx_fifo_len(&self) -> usize {
        self.rx_fifo.len()
    }

    pub fn tx_fifo_len(&self) -> usize {
        self.tx_fifo.len()
    }

    /// Queued payloads with their `NO_ACK` flag
    pub fn tx_fifo(&self) -> Vec<(Vec<u8>, bool)> {
        self.tx_fifo.iter().cloned().collect()
    }

    /// Every SPI transaction ever made
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    /// MOSI bytes of the transactions since the last [`clear_log`](Self::clear_log)
    pub fn transfers(&self) -> &[Vec<u8>] {
        &self.transfers
    }

    pub fn delays(&self) -> &[u32] {
        &self.delays
    }

    pub fn clear_log(&mut self) {
        self.transfers.clear();
        self.delays.clear();
        self.ce_pulses.clear();
    }

    pub fn ce(&self) -> bool {
        self.ce
    }

    /// Number of CE level changes
    pub fn ce_edges(&self) -> usize {
        self.ce_edges
    }

    /// Durations in µs of the finished CE high periods
    pub fn ce_pulses(&self) -> Vec<u64> {
        self.ce_pulses.clone()
    }

    pub fn csn_high(&self) -> bool {
        self.csn_high
    }

    /// Transfers made without CSN asserted
    pub fn unframed_transfers(&self) -> usize {
        self.unframed_transfers
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    /// Let `transfers` more SPI transfers succeed, fail every one after them
    pub fn fail_after(&mut self, transfers: usize) {
        self.transfers_until_failure = Some(transfers);
    }

    /// MISO stays low from now on
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    fn set_ce(&mut self, high: bool) {
        if self.ce == high {
            return;
        }
        self.ce_edges += 1;
        if high {
            self.ce_high_since = self.now_us;
        } else {
            self.ce_pulses.push(self.now_us - self.ce_high_since);
        }
        self.ce = high;
    }
}

pub struct SimCe(SharedChip);

impl OutputPin for SimCe {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_ce(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_ce(true);
        Ok(())
    }
}

pub struct SimCsn(SharedChip);

impl OutputPin for SimCsn {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().csn_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().csn_high = true;
        Ok(())
    }
}

pub struct SimSpi(SharedChip);

impl Transfer<u8> for SimSpi {
    type Error = BusError;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        let mut chip = self.0.borrow_mut();
        if let Some(left) = chip.transfers_until_failure.as_mut() {
            if *left == 0 {
                return Err(BusError);
            }
            *left -= 1;
        }
        chip.transactions += 1;
        if chip.csn_high {
            chip.unframed_transfers += 1;
        }
        chip.execute(words);
        Ok(words)
    }
}

pub struct SimDelay(SharedChip);

impl DelayUs<u32> for SimDelay {
    fn delay_us(&mut self, us: u32) {
        let mut chip = self.0.borrow_mut();
        chip.now_us += u64::from(us);
        chip.delays.push(us);
    }
}

pub struct SimIrq(SharedChip);

impl SimIrq {
    pub fn enabled(&self) -> bool {
        self.0.borrow().irq_enabled
    }
}

impl IrqPin for SimIrq {
    fn enable_interrupt(&self) {
        self.0.borrow_mut().irq_enabled = true;
    }

    fn disable_interrupt(&self) {
        self.0.borrow_mut().irq_enabled = false;
    }
}

/// A driver on a freshly powered simulated transceiver, not initialized
pub fn radio(params: &Params) -> (SimRadio, SharedChip) {
    let chip = Rc::new(RefCell::new(Chip::new()));
    let irq: SimIrqFlag = Box::leak(Box::new(IrqFlag::new(SimIrq(chip.clone()))));
    let radio = NRF24L01::new(
        SimCe(chip.clone()),
        SimCsn(chip.clone()),
        SimSpi(chip.clone()),
        SimDelay(chip.clone()),
        irq,
        params,
    );
    (radio, chip)
}

/// An initialized driver listening in RX mode, with default parameters
pub fn initialized() -> (SimRadio, SharedChip) {
    let (mut radio, chip) = radio(&Params::default());
    NetDev::init(&mut radio).unwrap();
    (radio, chip)
}
