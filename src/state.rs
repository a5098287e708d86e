//! Operational states of the transceiver and the transitions between them

use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer as SpiTransfer;
use embedded_hal::digital::v2::OutputPin;

use crate::device::Device;
use crate::error::Error;
use crate::registers::{FifoStatus, RX_ADDR_P0};
use crate::{IrqHandle, NRF24L01};

/// Power-on to Standby-I start-up time (Tpd2stby with an external clock)
pub const DELAY_US_START_UP: u32 = 1500;
/// Standby-I to RX mode settling time
pub const DELAY_US_RX_SETTLING: u32 = 130;
/// Standby-I to TX mode settling time
pub const DELAY_US_TX_SETTLING: u32 = 130;
/// Minimum CE high time to start a transmission
pub const DELAY_US_CE_HIGH_PULSE: u32 = 10;

/// Operational state of the transceiver as tracked by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Not initialized yet
    Undefined,
    /// Power Down, registers are kept
    PowerDown,
    /// Standby-I, crystal running, CE low
    Standby1,
    /// Standby-II, CE high with an empty TX FIFO
    Standby2,
    /// RX mode, listening
    RxMode,
    /// TX mode, sending the TX FIFO
    TxMode,
}

impl State {
    /// States reachable from `self` in a single step
    pub fn legal_transitions(self) -> &'static [State] {
        match self {
            State::Undefined => &[State::PowerDown],
            State::PowerDown => &[State::Standby1],
            State::Standby1 => &[
                State::PowerDown,
                State::Standby2,
                State::RxMode,
                State::TxMode,
            ],
            State::Standby2 => &[State::PowerDown, State::TxMode],
            State::RxMode => &[State::PowerDown, State::Standby1],
            State::TxMode => &[State::PowerDown, State::Standby1, State::Standby2],
        }
    }

    /// Is a single step from `self` to `to` allowed?
    pub fn can_transition(self, to: State) -> bool {
        self.legal_transitions().contains(&to)
    }

    /// May registers be reconfigured in this state?
    pub fn accepts_configuration(self) -> bool {
        matches!(self, State::PowerDown | State::Standby1 | State::RxMode)
    }

    /// Is a transmission in progress?
    pub fn is_transmitting(self) -> bool {
        matches!(self, State::TxMode | State::Standby2)
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
    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// State the device returns to once the TX FIFO has been sent
    pub fn idle_state(&self) -> State {
        self.idle_state
    }

    /// `Ok(true)` if a transition has to be made, `Ok(false)` if the device is
    /// already in `to`
    fn check_transition(&self, to: State) -> Result<bool, Error<SPIE, E>> {
        if self.state == to {
            Ok(false)
        } else if self.state.can_transition(to) {
            crate::log::trace!("{:?} -> {:?}", self.state, to);
            Ok(true)
        } else {
            crate::log::debug!("illegal transition {:?} -> {:?}", self.state, to);
            Err(Error::IllegalTransition {
                from: self.state,
                to,
            })
        }
    }

    /// Enter Power Down: CE low, `PWR_UP` cleared
    pub fn transition_to_power_down(&mut self) -> Result<(), Error<SPIE, E>> {
        if !self.check_transition(State::PowerDown)? {
            return Ok(());
        }
        self.ce_disable()?;
        if self.state == State::Undefined {
            // cached CONFIG does not match the chip yet
            let mut config = self.config;
            config.set_pwr_up(false);
            self.write_register(config)?;
            self.config = config;
        } else {
            self.update_config(|config| config.set_pwr_up(false))?;
        }
        self.state = State::PowerDown;
        Ok(())
    }

    /// Enter Standby-I
    ///
    /// Leaving a transmission restores the pipe 0 address and the address
    /// width if [`Tx::send`](crate::Tx::send) overwrote them for an ACK.
    pub fn transition_to_standby_1(&mut self) -> Result<(), Error<SPIE, E>> {
        if !self.check_transition(State::Standby1)? {
            return Ok(());
        }
        match self.state {
            State::PowerDown => {
                self.update_config(|config| config.set_pwr_up(true))?;
                self.delay_us(DELAY_US_START_UP);
            }
            State::TxMode | State::Standby2 => {
                self.ce_disable()?;
                if self.pipe0_overridden {
                    let rx_addr_p0 = self.rx_addr_p0;
                    self.write_register_bytes(RX_ADDR_P0, &rx_addr_p0)?;
                    self.write_register(self.address_width.setup_aw())?;
                    self.pipe0_overridden = false;
                }
            }
            _ => self.ce_disable()?,
        }
        self.state = State::Standby1;
        Ok(())
    }

    /// Enter Standby-II: TX mode with CE held high
    pub fn transition_to_standby_2(&mut self) -> Result<(), Error<SPIE, E>> {
        if !self.check_transition(State::Standby2)? {
            return Ok(());
        }
        if self.state == State::Standby1 {
            self.update_config(|config| config.set_prim_rx(false))?;
        }
        self.ce_enable()?;
        self.delay_us(DELAY_US_TX_SETTLING);
        self.state = State::Standby2;
        Ok(())
    }

    /// Enter RX mode
    ///
    /// A full RX FIFO is flushed first, otherwise nothing could be received.
    pub fn transition_to_rx_mode(&mut self) -> Result<(), Error<SPIE, E>> {
        if !self.check_transition(State::RxMode)? {
            return Ok(());
        }
        let (_, fifo_status) = self.read_register::<FifoStatus>()?;
        if fifo_status.rx_full() {
            crate::log::debug!("RX FIFO full, flushing");
            self.flush_rx()?;
        }
        self.update_config(|config| config.set_prim_rx(true))?;
        self.ce_enable()?;
        self.delay_us(DELAY_US_RX_SETTLING);
        self.state = State::RxMode;
        Ok(())
    }

    /// Enter TX mode
    ///
    /// CE stays low; a transmission starts with a CE pulse.
    pub fn transition_to_tx_mode(&mut self) -> Result<(), Error<SPIE, E>> {
        if !self.check_transition(State::TxMode)? {
            return Ok(());
        }
        match self.state {
            State::Standby1 => {
                self.update_config(|config| config.set_prim_rx(false))?;
                self.delay_us(DELAY_US_TX_SETTLING);
            }
            _ => self.ce_disable()?,
        }
        self.state = State::TxMode;
        Ok(())
    }

    /// Move to `target` over legal steps and make it the idle state
    ///
    /// Only [`State::PowerDown`], [`State::Standby1`] and [`State::RxMode`]
    /// can be requested; TX mode is entered by sending. Returns the previous
    /// state.
    pub fn set_state(&mut self, target: State) -> Result<State, Error<SPIE, E>> {
        let previous = self.state;
        if previous.is_transmitting() {
            return Err(Error::TryAgain);
        }
        if previous == State::Undefined {
            return Err(Error::TryAgain);
        }
        match target {
            State::PowerDown => self.transition_to_power_down()?,
            State::Standby1 => self.transition_to_standby_1()?,
            State::RxMode => {
                self.transition_to_standby_1()?;
                self.transition_to_rx_mode()?;
            }
            _ => return Err(Error::NotSupported),
        }
        self.idle_state = target;
        Ok(previous)
    }
}
