use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer as SpiTransfer;
use embedded_hal::digital::v2::OutputPin;

use crate::config::{is_broadcast, AddressWidth};
use crate::device::Device;
use crate::error::Error;
use crate::registers::{FifoStatus, ObserveTx, RX_ADDR_P0, TX_ADDR};
use crate::state::{State, DELAY_US_CE_HIGH_PULSE, DELAY_US_TX_SETTLING};
use crate::{IrqHandle, MAX_PAYLOAD_WIDTH, NRF24L01};

/// Represents **TX Mode** and the associated **TX Settling** and
/// **Standby-II** states
///
/// # Timing
///
/// The datasheet states the follwing:
///
/// > It is important to never keep the nRF24L01 in TX mode for more than 4ms at a time.
///
/// Each transmission is started with a short CE pulse, so the transceiver
/// falls back to Standby-I on its own once the TX FIFO is empty.
pub trait Tx {
    /// Error from performing TX Operations
    type Error;

    /// Queue a frame for `dst` and start sending
    ///
    /// The payload is the concatenation of `payload`, at most 32 bytes.
    /// Frames to the broadcast address are not acknowledged. Returns the
    /// number of payload bytes; completion is reported as an
    /// [`Event`](crate::Event) by the interrupt handler.
    ///
    /// Fails with [`Error::TryAgain`] before initialization or while
    /// interrupts are pending and with
    /// [`Error::Busy`] while the TX FIFO is full.
    fn send(&mut self, dst: &[u8], payload: &[&[u8]]) -> Result<usize, Self::Error>;

    /// Read the `OBSERVE_TX` register
    fn observe(&mut self) -> Result<ObserveTx, Self::Error>;
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
    /// Pulse CE to send the next payload of the TX FIFO
    pub(crate) fn trigger_send(&mut self) -> Result<(), Error<SPIE, E>> {
        self.ce_enable()?;
        self.delay_us(DELAY_US_CE_HIGH_PULSE);
        self.ce_disable()?;
        self.delay_us(DELAY_US_TX_SETTLING);
        Ok(())
    }
}

impl<E, SPIE, CE, CSN, SPI, D, IRQ> Tx for NRF24L01<CE, CSN, SPI, D, IRQ>
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

    fn send(&mut self, dst: &[u8], payload: &[&[u8]]) -> Result<usize, Self::Error> {
        if dst.is_empty() || payload.is_empty() {
            crate::log::debug!("no TX address or no payload");
            return Err(Error::NotSupported);
        }
        if self.state == State::Undefined {
            crate::log::debug!("not initialized");
            return Err(Error::TryAgain);
        }
        let (status, fifo_status) = self.read_register::<FifoStatus>()?;
        if status.has_irq() {
            crate::log::debug!("pending IRQ, handle it before sending");
            self.irq.flag().raise();
            return Err(Error::TryAgain);
        }
        if fifo_status.tx_full() {
            crate::log::debug!("TX FIFO full");
            return Err(Error::Busy);
        }
        let dst_width = match AddressWidth::from_len(dst.len()) {
            Some(width) => width,
            None => {
                crate::log::debug!("invalid destination address length: {}", dst.len());
                return Err(Error::NotSupported);
            }
        };
        let mut frame = [0; MAX_PAYLOAD_WIDTH];
        let mut pl_width = 0;
        for chunk in payload {
            if pl_width + chunk.len() > MAX_PAYLOAD_WIDTH {
                crate::log::debug!("frame too big");
                return Err(Error::TooBig);
            }
            frame[pl_width..pl_width + chunk.len()].copy_from_slice(chunk);
            pl_width += chunk.len();
        }

        self.write_register_bytes(TX_ADDR, dst)?;
        if is_broadcast(dst) {
            self.write_tx_payload_no_ack(&frame[..pl_width])?;
        } else {
            self.write_tx_payload(&frame[..pl_width])?;
            // ACKs arrive on pipe 0, restored when leaving TX mode
            self.write_register_bytes(RX_ADDR_P0, dst)?;
            self.write_register(dst_width.setup_aw())?;
            self.pipe0_overridden = true;
        }
        if !self.state.is_transmitting() {
            self.idle_state = self.state;
            if self.state != State::Standby1 {
                self.transition_to_standby_1()?;
            }
            self.transition_to_tx_mode()?;
        }
        self.trigger_send()?;
        crate::log::debug!("sending {} bytes", pl_width);
        Ok(pl_width)
    }

    fn observe(&mut self) -> Result<ObserveTx, Self::Error> {
        let (_, observe_tx) = self.read_register()?;
        Ok(observe_tx)
    }
}
