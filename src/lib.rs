// Copyright 2018, Astro <astro@spaceboyz.net>
//
// Licensed under the Apache License, Version 2.0 <LICENSE>. This file
// may not be copied, modified, or distributed except according to
// those terms.

//! Interrupt driven nRF24L01+ driver for use with [embedded-hal](https://crates.io/crates/embedded-hal)
//!
//! The driver runs the transceiver in Enhanced ShockBurst mode: automatic
//! acknowledgements, automatic retransmissions and dynamic payload lengths
//! on every enabled pipe. Frames are `destination address ++ payload`.
//!
//! The interrupt line is split in two halves. An [`IrqFlag`], usually a
//! `static`, is shared between the pin interrupt and the driver:
//! [`IrqFlag::on_irq`] is called from the pin interrupt and only records
//! that the transceiver needs attention; [`NRF24L01::isr`] runs in thread
//! context, talks to the transceiver and queues [`Event`]s, which are
//! fetched with [`NRF24L01::poll_event`].
//!
//! [`NetDev`] exposes the driver through a netdev-style interface and
//! [`netif::Netif`] adds link layer framing on top of it.

#![warn(missing_docs, unused)]
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate bitfield;

use core::fmt;
use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer as SpiTransfer;
use embedded_hal::digital::v2::OutputPin;
use heapless::Deque;

pub(crate) mod log;

pub mod config;
pub use crate::config::{
    Address, AddressWidth, Configuration, CrcMode, DataRate, Params, Pipe, RadioConfig,
    RetransmitDelay, TxPower,
};
#[allow(missing_docs)]
pub mod registers;
use crate::registers::{Config, EnRxaddr, Status};
#[allow(missing_docs)]
pub mod command;
use crate::command::{Command, COMMAND_BUF_LEN};
mod payload;
pub use crate::payload::Payload;
mod error;
pub use crate::error::Error;

mod device;
pub use crate::device::Device;
pub mod state;
pub use crate::state::State;
mod rx;
pub use crate::rx::Rx;
mod tx;
pub use crate::tx::Tx;
pub mod mode;
pub use crate::mode::ChangeModes;
mod isr;
pub use crate::isr::{Event, Frame, IrqFlag, Stats, EVENT_QUEUE_LEN};
pub mod netdev;
pub use crate::netdev::NetDev;
pub mod netif;
pub mod registry;
pub mod diagnostics;

#[cfg(test)]
mod sim;

/// Number of RX pipes with configurable addresses
pub const PIPES_COUNT: usize = 6;
/// Minimum address length
pub const MIN_ADDR_BYTES: usize = 3;
/// Maximum address length
pub const MAX_ADDR_BYTES: usize = 5;
/// Maximum payload of a single frame
pub const MAX_PAYLOAD_WIDTH: usize = 32;
/// Maximum frame length: address plus payload
pub const MAX_FRAME_LEN: usize = MAX_ADDR_BYTES + MAX_PAYLOAD_WIDTH;

/// The transceiver's IRQ line
///
/// Edge selection (the line is active low) and the interrupt handler
/// registration are left to the board; the driver only masks and unmasks it.
pub trait IrqPin {
    /// Unmask the pin interrupt
    fn enable_interrupt(&self);
    /// Mask the pin interrupt
    fn disable_interrupt(&self);
}

/// Access to the [`IrqFlag`] a driver shares with the pin interrupt
pub trait IrqHandle {
    /// The IRQ line behind the flag
    type Pin: IrqPin;

    /// The shared flag
    fn flag(&self) -> &IrqFlag<Self::Pin>;
}

impl<'a, P: IrqPin> IrqHandle for &'a IrqFlag<P> {
    type Pin = P;

    fn flag(&self) -> &IrqFlag<P> {
        self
    }
}

/// Driver for the nRF24L01+
///
/// Created in [`State::Undefined`] from a [`Params`] entry;
/// [`NetDev::init`] brings it to [`State::RxMode`]. The type-state wrappers
/// in [`mode`] are an alternative for applications that drive the states
/// themselves.
pub struct NRF24L01<CE, CSN, SPI, D, IRQ> {
    ce: CE,
    csn: CSN,
    spi: SPI,
    delay: D,
    irq: IRQ,
    config: Config,
    radio: RadioConfig,
    address_width: AddressWidth,
    rx_addr_p0: Address,
    rx_addr_p1: Address,
    rx_addr_px: [u8; PIPES_COUNT - 2],
    enabled_pipes: EnRxaddr,
    proto: netdev::NetType,
    state: State,
    idle_state: State,
    // RX_ADDR_P0 and SETUP_AW hold a destination waiting for its ACK
    pipe0_overridden: bool,
    events: Deque<Event, EVENT_QUEUE_LEN>,
    stats: Stats,
}

impl<CE, CSN, SPI, D, IRQ> fmt::Debug for NRF24L01<CE, CSN, SPI, D, IRQ> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NRF24L01({:?})", self.state)
    }
}

impl<E, SPIE, CE, CSN, SPI, D, IRQ> NRF24L01<CE, CSN, SPI, D, IRQ>
where
    E: Debug,
    SPIE: Debug,
    CE: OutputPin<Error = E>,
    CSN: OutputPin<Error = E>,
    SPI: SpiTransfer<u8, Error = SPIE>,
    D: DelayUs<u32>,
    IRQ: IrqHandle,
{
    /// Construct a new driver instance.
    ///
    /// Drives CE low and CSN high but does not talk to the transceiver yet.
    /// If the pins fail, the driver still starts out in
    /// [`State::Undefined`] and [`NetDev::init`] reports the error.
    pub fn new(mut ce: CE, mut csn: CSN, spi: SPI, delay: D, irq: IRQ, params: &Params) -> Self {
        if ce.set_low().is_err() || csn.set_high().is_err() {
            crate::log::warn!("failed to set CE/CSN idle levels");
        }
        let width = params.address_width;
        let rx_addr_p1 = Address::from_array(params.rx_address, width);

        NRF24L01 {
            ce,
            csn,
            spi,
            delay,
            irq,
            // Reset value
            config: Config::from(0b0000_1000),
            radio: params.config,
            address_width: width,
            rx_addr_p0: Address::broadcast(width),
            rx_addr_p1,
            rx_addr_px: params.rx_address_lsb,
            enabled_pipes: EnRxaddr::default(),
            proto: params.proto,
            state: State::Undefined,
            idle_state: State::RxMode,
            pipe0_overridden: false,
            events: Deque::new(),
            stats: Stats::default(),
        }
    }

    /// The interrupt handle passed to [`new`](Self::new)
    pub fn irq_handle(&self) -> &IRQ {
        &self.irq
    }

    /// Hand back the peripherals: `(ce, csn, spi, delay, irq)`
    pub fn release(self) -> (CE, CSN, SPI, D, IRQ) {
        (self.ce, self.csn, self.spi, self.delay, self.irq)
    }

    /// Snapshot of the radio settings
    pub fn radio_config(&self) -> RadioConfig {
        self.radio
    }

    /// Reads and validates content of the `SETUP_AW` register.
    pub fn is_connected(&mut self) -> Result<bool, Error<SPIE, E>> {
        let (_, setup_aw) = self.read_register::<registers::SetupAw>()?;
        let valid = setup_aw.aw() != 0 && u8::from(setup_aw) <= 3;
        Ok(valid)
    }
}

impl<E, SPIE, CE, CSN, SPI, D, IRQ> Device for NRF24L01<CE, CSN, SPI, D, IRQ>
where
    E: Debug,
    SPIE: Debug,
    CE: OutputPin<Error = E>,
    CSN: OutputPin<Error = E>,
    SPI: SpiTransfer<u8, Error = SPIE>,
    D: DelayUs<u32>,
    IRQ: IrqHandle,
{
    type Error = Error<SPIE, E>;

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn ce_enable(&mut self) -> Result<(), Self::Error> {
        self.ce.set_high().map_err(Error::Pin)
    }

    fn ce_disable(&mut self) -> Result<(), Self::Error> {
        self.ce.set_low().map_err(Error::Pin)
    }

    fn send_command<C: Command>(
        &mut self,
        command: &C,
    ) -> Result<(Status, C::Response), Self::Error> {
        // Allocate storage
        let mut buf_storage = [0; COMMAND_BUF_LEN];
        let len = command.len();
        let buf = &mut buf_storage[0..len];
        // Serialize the command
        command.encode(buf);

        // SPI transaction
        self.csn.set_low().map_err(Error::Pin)?;
        let transfer_result = self.spi.transfer(buf).map(|_| {});
        self.csn.set_high().map_err(Error::Pin)?;
        // Propagate Err only after csn.set_high():
        transfer_result.map_err(Error::Spi)?;

        // Parse response
        let status = Status::from(buf[0]);
        let response = C::decode_response(buf);

        Ok((status, response))
    }

    fn update_config<F, R>(&mut self, f: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&mut Config) -> R,
    {
        // Mutate
        let old_config = self.config;
        let result = f(&mut self.config);

        if self.config != old_config {
            let config = self.config;
            if let Err(e) = self.write_register(config) {
                self.config = old_config;
                return Err(e);
            }
        }
        Ok(result)
    }
}

impl<E, SPIE, CE, CSN, SPI, D, IRQ> ChangeModes for NRF24L01<CE, CSN, SPI, D, IRQ>
where
    E: Debug,
    SPIE: Debug,
    CE: OutputPin<Error = E>,
    CSN: OutputPin<Error = E>,
    SPI: SpiTransfer<u8, Error = SPIE>,
    D: DelayUs<u32>,
    IRQ: IrqHandle,
{
    type Error = Error<SPIE, E>;

    fn to_power_down(&mut self) -> Result<(), Self::Error> {
        self.transition_to_power_down()
    }

    fn to_standby(&mut self) -> Result<(), Self::Error> {
        self.transition_to_standby_1()
    }

    fn to_standby_2(&mut self) -> Result<(), Self::Error> {
        self.transition_to_standby_2()
    }

    fn to_rx(&mut self) -> Result<(), Self::Error> {
        self.transition_to_rx_mode()
    }

    fn to_tx(&mut self) -> Result<(), Self::Error> {
        self.transition_to_tx_mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim;

    #[test]
    fn new_does_not_touch_the_transceiver() {
        let (radio, chip) = sim::radio(&Params::default());
        assert_eq!(radio.state(), State::Undefined);
        assert_eq!(chip.borrow().transactions(), 0);
        assert!(!chip.borrow().ce());
        assert!(chip.borrow().csn_high());
    }

    #[test]
    fn connected_chip_reports_valid_address_width() {
        let (mut radio, chip) = sim::radio(&Params::default());
        assert_eq!(radio.is_connected(), Ok(true));
        chip.borrow_mut().disconnect();
        assert_eq!(radio.is_connected(), Ok(false));
    }

    #[test]
    fn every_transaction_is_framed_by_csn() {
        let (mut radio, chip) = sim::initialized();
        radio.get_status().unwrap();
        assert_eq!(chip.borrow().unframed_transfers(), 0);
        assert!(chip.borrow().csn_high());
    }

    #[test]
    fn release_returns_peripherals() {
        let (radio, chip) = sim::initialized();
        let (_ce, _csn, _spi, _delay, irq) = radio.release();
        assert!(irq.pin().enabled());
        drop(chip);
    }
}
