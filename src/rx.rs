use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer as SpiTransfer;
use embedded_hal::digital::v2::OutputPin;

use crate::config::{Configuration, Pipe};
use crate::device::Device;
use crate::error::Error;
use crate::{IrqHandle, MAX_PAYLOAD_WIDTH, NRF24L01};

/// Represents **RX Mode**
pub trait Rx {
    /// Error from read states (most commonly SPI errors)
    type Error;

    /// Read the frame at the top of the RX FIFO into `buf`
    ///
    /// The frame is the destination address it was received on followed by
    /// the payload. Returns the frame length, or `0` if there was no valid
    /// frame (an invalid one is flushed).
    ///
    /// With `buf == None` nothing is read and an upper bound of the frame
    /// length is returned. If `buf` is too short the frame is dropped and
    /// [`Error::NoBuffer`] is returned.
    fn recv(&mut self, buf: Option<&mut [u8]>) -> Result<usize, Self::Error>;

    /// Exact length of the frame at the top of the RX FIFO, without dropping
    /// it; `0` if there is none
    fn frame_len(&mut self) -> Result<usize, Self::Error>;
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
    /// Pipe and payload width of the frame at the top of the RX FIFO
    ///
    /// The transceiver occasionally reports widths above 32 bytes; such a
    /// frame can not be read and the whole RX FIFO is flushed.
    fn pending_frame(&mut self) -> Result<Option<(Pipe, usize)>, Error<SPIE, E>> {
        let (status, width) = self.read_rx_payload_width()?;
        let width = usize::from(width);
        match Pipe::try_from(status.rx_p_no()) {
            Ok(pipe) if width > 0 && width <= MAX_PAYLOAD_WIDTH => Ok(Some((pipe, width))),
            _ => {
                crate::log::debug!("RX error, flush RX FIFO");
                self.flush_rx()?;
                if width > 0 {
                    self.stats.frames_dropped += 1;
                }
                Ok(None)
            }
        }
    }
}

impl<E, SPIE, CE, CSN, SPI, D, IRQ> Rx for NRF24L01<CE, CSN, SPI, D, IRQ>
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

    fn recv(&mut self, buf: Option<&mut [u8]>) -> Result<usize, Self::Error> {
        let width = self.address_width.bytes();
        let buf = match buf {
            Some(buf) => buf,
            None => return Ok(width + MAX_PAYLOAD_WIDTH),
        };
        let (pipe, pl_width) = match self.pending_frame()? {
            Some(frame) => frame,
            None => return Ok(0),
        };
        let frame_len = width + pl_width;
        if buf.len() < frame_len {
            crate::log::debug!(
                "buffer too small: {} < {}, dropping frame",
                buf.len(),
                frame_len
            );
            self.read_rx_payload(pl_width)?;
            self.stats.frames_dropped += 1;
            return Err(Error::NoBuffer);
        }
        let dst = self.rx_address(pipe);
        buf[..width].copy_from_slice(&dst);
        let (_, payload) = self.read_rx_payload(pl_width)?;
        buf[width..frame_len].copy_from_slice(&payload);
        crate::log::debug!("received frame length: {}", frame_len);
        Ok(frame_len)
    }

    fn frame_len(&mut self) -> Result<usize, Self::Error> {
        Ok(match self.pending_frame()? {
            Some((_, pl_width)) => self.address_width.bytes() + pl_width,
            None => 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AddressWidth, Params, RadioConfig};
    use crate::netdev::NetDev;
    use crate::sim;
    use crate::MAX_FRAME_LEN;

    #[test]
    fn upper_bound_without_buffer() {
        let (mut radio, chip) = sim::initialized();
        let before = chip.borrow().transactions();
        assert_eq!(Rx::recv(&mut radio, None), Ok(5 + 32));
        assert_eq!(chip.borrow().transactions(), before);

        let params = Params::new(RadioConfig::DEFAULT, AddressWidth::Three);
        let (mut radio, _chip) = sim::radio(&params);
        radio.init().unwrap();
        assert_eq!(Rx::recv(&mut radio, None), Ok(3 + 32));
    }

    #[test]
    fn frame_on_pipe_1() {
        let (mut radio, chip) = sim::initialized();
        chip.borrow_mut().receive(1, &[0x10, 0x20, 0x30]);
        let mut buf = [0; MAX_FRAME_LEN];
        assert_eq!(Rx::recv(&mut radio, Some(&mut buf)), Ok(8));
        assert_eq!(&buf[..8], &[0xC2, 0xC2, 0xC2, 0xC2, 0xC2, 0x10, 0x20, 0x30]);
        assert_eq!(chip.borrow().rx_fifo_len(), 0);
    }

    #[test]
    fn frame_on_pipe_4_uses_its_lsb() {
        let (mut radio, chip) = sim::initialized();
        chip.borrow_mut().receive(4, &[7]);
        let mut buf = [0; MAX_FRAME_LEN];
        assert_eq!(Rx::recv(&mut radio, Some(&mut buf)), Ok(6));
        assert_eq!(&buf[..6], &[0xC2, 0xC2, 0xC2, 0xC2, 0xC5, 7]);
    }

    #[test]
    fn zero_width_flushes() {
        let (mut radio, chip) = sim::initialized();
        chip.borrow_mut().receive(1, &[1, 2]);
        chip.borrow_mut().force_rx_width(Some(0));
        let mut buf = [0; MAX_FRAME_LEN];
        assert_eq!(Rx::recv(&mut radio, Some(&mut buf)), Ok(0));
        assert_eq!(chip.borrow().rx_fifo_len(), 0);
    }

    #[test]
    fn oversized_width_flushes() {
        let (mut radio, chip) = sim::initialized();
        chip.borrow_mut().receive(1, &[1, 2]);
        chip.borrow_mut().receive(1, &[3]);
        chip.borrow_mut().force_rx_width(Some(33));
        let mut buf = [0; MAX_FRAME_LEN];
        assert_eq!(Rx::recv(&mut radio, Some(&mut buf)), Ok(0));
        assert_eq!(chip.borrow().rx_fifo_len(), 0);
        assert_eq!(radio.stats().frames_dropped, 1);
    }

    #[test]
    fn empty_fifo_reads_nothing() {
        let (mut radio, _chip) = sim::initialized();
        let mut buf = [0; MAX_FRAME_LEN];
        assert_eq!(Rx::recv(&mut radio, Some(&mut buf)), Ok(0));
        assert_eq!(radio.frame_len(), Ok(0));
    }

    #[test]
    fn small_buffer_drains_frame() {
        let (mut radio, chip) = sim::initialized();
        chip.borrow_mut().receive(1, &[0; 10]);
        chip.borrow_mut().receive(1, &[1]);
        let mut buf = [0; 12];
        assert_eq!(Rx::recv(&mut radio, Some(&mut buf)), Err(Error::NoBuffer));
        assert_eq!(chip.borrow().rx_fifo_len(), 1);
        assert_eq!(Rx::recv(&mut radio, Some(&mut buf)), Ok(6));
        assert_eq!(buf[5], 1);
    }

    #[test]
    fn frame_len_keeps_the_frame() {
        let (mut radio, chip) = sim::initialized();
        chip.borrow_mut().receive(0, &[1, 2, 3, 4]);
        assert_eq!(radio.frame_len(), Ok(9));
        assert_eq!(chip.borrow().rx_fifo_len(), 1);
    }
}
