//! Register map of the nRF24L01+
//!
//! Single byte registers are typed with [`bitfield`]. The multi byte address
//! registers are accessed through their raw addresses, see
//! [`Device::read_register_bytes`](crate::Device::read_register_bytes).

use crate::config::Pipe;

pub const CONFIG: u8 = 0x00;
pub const EN_AA: u8 = 0x01;
pub const EN_RXADDR: u8 = 0x02;
pub const SETUP_AW: u8 = 0x03;
pub const SETUP_RETR: u8 = 0x04;
pub const RF_CH: u8 = 0x05;
pub const RF_SETUP: u8 = 0x06;
pub const STATUS: u8 = 0x07;
pub const OBSERVE_TX: u8 = 0x08;
pub const RPD: u8 = 0x09;
pub const RX_ADDR_P0: u8 = 0x0A;
pub const RX_ADDR_P1: u8 = 0x0B;
pub const RX_ADDR_P2: u8 = 0x0C;
pub const RX_ADDR_P3: u8 = 0x0D;
pub const RX_ADDR_P4: u8 = 0x0E;
pub const RX_ADDR_P5: u8 = 0x0F;
pub const TX_ADDR: u8 = 0x10;
pub const RX_PW_P0: u8 = 0x11;
pub const FIFO_STATUS: u8 = 0x17;
pub const DYNPD: u8 = 0x1C;
pub const FEATURE: u8 = 0x1D;

/// Address of the `RX_ADDR_Px` register of `pipe`
pub fn rx_addr(pipe: Pipe) -> u8 {
    RX_ADDR_P0 + pipe as u8
}

/// Address of the `RX_PW_Px` register of `pipe`
pub fn rx_pw(pipe: Pipe) -> u8 {
    RX_PW_P0 + pipe as u8
}

/// A typed single byte register
pub trait Register {
    /// Register address in the register map
    fn addr() -> u8;
    /// Number of bytes clocked out when reading
    fn read_len() -> usize {
        1
    }
    /// Construct from the bytes following the status byte
    fn decode(data: &[u8]) -> Self;
    /// Serialize into the bytes following the command byte
    fn encode(&self, data: &mut [u8]);
}

macro_rules! def_reg {
    ($name: ident, $addr: expr) => {
        impl Register for $name {
            fn addr() -> u8 {
                $addr
            }

            fn decode(data: &[u8]) -> Self {
                $name(data[0])
            }

            fn encode(&self, data: &mut [u8]) {
                data[0] = self.0;
            }
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                $name(value)
            }
        }

        impl From<$name> for u8 {
            fn from(register: $name) -> u8 {
                register.0
            }
        }
    };
}

macro_rules! def_pipe_reg {
    ($name: ident, $addr: expr) => {
        #[doc = concat!("Per pipe flags of the `", stringify!($name), "` register")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub u8);

        impl $name {
            /// Builds the register value from a pipe bit mask
            pub fn from_mask(mask: u8) -> Self {
                $name(mask & 0b0011_1111)
            }

            /// Is the flag of `pipe` set?
            pub fn pipe(&self, pipe: Pipe) -> bool {
                self.0 & (1 << pipe as u8) != 0
            }

            /// Sets or clears the flag of `pipe`
            pub fn set_pipe(&mut self, pipe: Pipe, value: bool) {
                if value {
                    self.0 |= 1 << pipe as u8;
                } else {
                    self.0 &= !(1 << pipe as u8);
                }
            }
        }

        def_reg!($name, $addr);
    };
}

bitfield! {
    /// The `CONFIG` register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Config(u8);
    impl Debug;
    pub mask_rx_dr, set_mask_rx_dr: 6;
    pub mask_tx_ds, set_mask_tx_ds: 5;
    pub mask_max_rt, set_mask_max_rt: 4;
    pub en_crc, set_en_crc: 3;
    pub crco, set_crco: 2;
    pub pwr_up, set_pwr_up: 1;
    pub prim_rx, set_prim_rx: 0;
}
def_reg!(Config, CONFIG);

def_pipe_reg!(EnAa, EN_AA);
def_pipe_reg!(EnRxaddr, EN_RXADDR);
def_pipe_reg!(Dynpd, DYNPD);

bitfield! {
    /// The `SETUP_AW` register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct SetupAw(u8);
    impl Debug;
    pub u8, aw, set_aw: 1, 0;
}
def_reg!(SetupAw, SETUP_AW);

bitfield! {
    /// The `SETUP_RETR` register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct SetupRetr(u8);
    impl Debug;
    pub u8, ard, set_ard: 7, 4;
    pub u8, arc, set_arc: 3, 0;
}
def_reg!(SetupRetr, SETUP_RETR);

bitfield! {
    /// The `RF_CH` register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct RfCh(u8);
    impl Debug;
    pub u8, rf_ch, set_rf_ch: 6, 0;
}
def_reg!(RfCh, RF_CH);

bitfield! {
    /// The `RF_SETUP` register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct RfSetup(u8);
    impl Debug;
    pub cont_wave, set_cont_wave: 7;
    pub rf_dr_low, set_rf_dr_low: 5;
    pub pll_lock, set_pll_lock: 4;
    pub rf_dr_high, set_rf_dr_high: 3;
    pub u8, rf_pwr, set_rf_pwr: 2, 1;
}
def_reg!(RfSetup, RF_SETUP);

bitfield! {
    /// The `STATUS` register
    ///
    /// The transceiver shifts it out as the first byte of every SPI
    /// transaction, so every command returns it.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Status(u8);
    impl Debug;
    pub rx_dr, set_rx_dr: 6;
    pub tx_ds, set_tx_ds: 5;
    pub max_rt, set_max_rt: 4;
    pub u8, rx_p_no, _: 3, 1;
    pub tx_full, _: 0;
}
def_reg!(Status, STATUS);

impl Status {
    /// Mask of the three interrupt flags
    pub const IRQ_MASK: u8 = 0b0111_0000;

    /// Is any of RX_DR, TX_DS or MAX_RT set?
    pub fn has_irq(&self) -> bool {
        self.0 & Self::IRQ_MASK != 0
    }

    /// A value that clears every interrupt flag when written
    pub fn clear_all() -> Self {
        Status(Self::IRQ_MASK)
    }
}

bitfield! {
    /// The `OBSERVE_TX` register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ObserveTx(u8);
    impl Debug;
    pub u8, plos_cnt, _: 7, 4;
    pub u8, arc_cnt, _: 3, 0;
}
def_reg!(ObserveTx, OBSERVE_TX);

bitfield! {
    /// The `RPD` (received power detector) register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Rpd(u8);
    impl Debug;
    pub rpd, _: 0;
}
def_reg!(Rpd, RPD);

bitfield! {
    /// The `FIFO_STATUS` register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FifoStatus(u8);
    impl Debug;
    pub tx_reuse, _: 6;
    pub tx_full, _: 5;
    pub tx_empty, _: 4;
    pub rx_full, _: 1;
    pub rx_empty, _: 0;
}
def_reg!(FifoStatus, FIFO_STATUS);

bitfield! {
    /// The `FEATURE` register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Feature(u8);
    impl Debug;
    pub en_dpl, set_en_dpl: 2;
    pub en_ack_pay, set_en_ack_pay: 1;
    pub en_dyn_ack, set_en_dyn_ack: 0;
}
def_reg!(Feature, FEATURE);

impl Default for Feature {
    fn default() -> Self {
        Feature(0)
    }
}
