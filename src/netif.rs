//! Link layer framing on top of a [`NetDev`]
//!
//! The transceiver only carries the destination address. The link layer
//! adds the source address to the payload:
//!
//! ```text
//! | dst (3..5) | src_len (1) | src (3..5) | payload |
//! ```

use rand_core::RngCore;

use crate::config::{is_broadcast, Address, AddressWidth};
use crate::error::Error;
use crate::netdev::{NetDev, NetOpt, NetOptValue, NetType};
use crate::{Event, MAX_ADDR_BYTES, MAX_PAYLOAD_WIDTH, MIN_ADDR_BYTES};

/// Payload bytes of a frame, after the link layer header
pub type Pdu = heapless::Vec<u8, MAX_PAYLOAD_WIDTH>;

/// A frame received through [`Netif::poll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPacket {
    /// Address the frame was sent to
    pub dst: Address,
    /// Address of the sender
    pub src: Address,
    /// Was the frame sent to the broadcast address?
    pub broadcast: bool,
    /// Protocol of `payload`
    pub proto: NetType,
    /// Upper layer payload
    pub payload: Pdu,
}

/// What [`Netif::poll`] reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indication {
    /// A frame for this device
    Received(ReceivedPacket),
    /// The last frame has been sent
    TxComplete,
    /// The last frame was not acknowledged
    TxNoAck,
}

/// Derive a locally administered address of `width` bytes
///
/// The first byte has the locally administered bit set and the group bit
/// cleared. The last byte must differ from the broadcast address, which
/// occupies pipe 0, so it is drawn again until it does.
pub fn local_address<R: RngCore>(rng: &mut R, width: AddressWidth) -> Address {
    let mut bytes = [0; MAX_ADDR_BYTES];
    let len = width.bytes();
    loop {
        rng.fill_bytes(&mut bytes[..len]);
        if bytes[len - 1] != 0xFF {
            break;
        }
    }
    bytes[0] = (bytes[0] | 0x02) & !0x01;
    Address::from_array(bytes, width)
}

fn parse(frame: &[u8], width: usize, proto: NetType) -> Option<ReceivedPacket> {
    if frame.len() <= width {
        return None;
    }
    let (dst, rest) = frame.split_at(width);
    let src_len = usize::from(rest[0]);
    if !(MIN_ADDR_BYTES..=MAX_ADDR_BYTES).contains(&src_len) || rest.len() < 1 + src_len {
        return None;
    }
    let (src, payload) = rest[1..].split_at(src_len);
    Some(ReceivedPacket {
        dst: Address::new(dst)?,
        src: Address::new(src)?,
        broadcast: is_broadcast(dst),
        proto,
        payload: Pdu::from_slice(payload).ok()?,
    })
}

/// Network interface: adds and strips the link layer header
pub struct Netif<DEV> {
    dev: DEV,
}

impl<DEV, SPIE, PE> Netif<DEV>
where
    DEV: NetDev<Error = Error<SPIE, PE>>,
{
    /// Wrap a device
    pub fn new(dev: DEV) -> Self {
        Netif { dev }
    }

    /// The wrapped device
    pub fn device(&mut self) -> &mut DEV {
        &mut self.dev
    }

    /// Release the wrapped device
    pub fn release(self) -> DEV {
        self.dev
    }

    /// Initialize the device and give it a random local address
    pub fn init<R: RngCore>(&mut self, rng: &mut R) -> Result<Address, Error<SPIE, PE>> {
        self.dev.init()?;
        let address = local_address(rng, self.width()?);
        self.dev.set(NetOptValue::Address(address))?;
        crate::log::debug!("local address {:?}", address);
        Ok(address)
    }

    /// The device's own address
    pub fn address(&self) -> Result<Address, Error<SPIE, PE>> {
        match self.dev.get(NetOpt::Address)? {
            NetOptValue::Address(address) => Ok(address),
            _ => Err(Error::NotSupported),
        }
    }

    fn width(&self) -> Result<AddressWidth, Error<SPIE, PE>> {
        match self.dev.get(NetOpt::AddressLen)? {
            NetOptValue::AddressLen(len) => {
                AddressWidth::from_len(usize::from(len)).ok_or(Error::NotSupported)
            }
            _ => Err(Error::NotSupported),
        }
    }

    fn proto(&self) -> Result<NetType, Error<SPIE, PE>> {
        match self.dev.get(NetOpt::Proto)? {
            NetOptValue::Proto(proto) => Ok(proto),
            _ => Err(Error::NotSupported),
        }
    }

    /// Send `payload` to `dst`, returns the number of payload bytes
    pub fn send(&mut self, dst: &[u8], payload: &[&[u8]]) -> Result<usize, Error<SPIE, PE>> {
        let src = self.address()?;
        let mut frame = [0; MAX_PAYLOAD_WIDTH];
        frame[0] = src.len() as u8;
        frame[1..=src.len()].copy_from_slice(&src);
        let header_len = 1 + src.len();
        let mut len = header_len;
        for chunk in payload {
            if len + chunk.len() > MAX_PAYLOAD_WIDTH {
                crate::log::debug!("payload too big for a single frame");
                return Err(Error::TooBig);
            }
            frame[len..len + chunk.len()].copy_from_slice(chunk);
            len += chunk.len();
        }
        let sent = self.dev.send(&[dst, &frame[..len]])?;
        Ok(sent - header_len)
    }

    /// Service the device and fetch the next indication
    ///
    /// Runs the device interrupt handler if it is pending. A received frame
    /// with a malformed header is dropped with [`Error::NotSupported`].
    pub fn poll(&mut self) -> nb::Result<Indication, Error<SPIE, PE>> {
        if self.dev.irq_pending() {
            self.dev.isr()?;
        }
        let event = match self.dev.poll_event() {
            Ok(event) => event,
            Err(nb::Error::WouldBlock) => return Err(nb::Error::WouldBlock),
            Err(nb::Error::Other(e)) => match e {},
        };
        match event {
            Event::RxComplete(frame) => {
                let width = self.width()?.bytes();
                match parse(&frame, width, self.proto()?) {
                    Some(packet) => Ok(Indication::Received(packet)),
                    None => {
                        crate::log::debug!("malformed link layer header, dropping frame");
                        Err(nb::Error::Other(Error::NotSupported))
                    }
                }
            }
            Event::TxComplete => Ok(Indication::TxComplete),
            Event::TxNoAck => Ok(Indication::TxNoAck),
        }
    }
}
