//! SPI commands of the nRF24L01+
//!
//! The transceiver clocks multi byte values LSByte first. Every command that
//! carries more than one data byte stores them reversed on the bus, so callers
//! always deal with natural (MSB first) byte order.

use core::marker::PhantomData;

use crate::config::Pipe;
use crate::payload::Payload;
use crate::registers::Register;
use crate::MAX_PAYLOAD_WIDTH;

/// Size of the transfer buffer: one command byte plus a full payload
pub const COMMAND_BUF_LEN: usize = 1 + MAX_PAYLOAD_WIDTH;

/// A single SPI transaction
pub trait Command {
    /// Number of bytes clocked in both directions, including the command byte
    fn len(&self) -> usize;
    /// Serialize the command into `buf`, which has exactly `len()` bytes
    fn encode(&self, buf: &mut [u8]);

    /// Type of the decoded response
    type Response;
    /// Decode the bytes clocked out by the transceiver; `data[0]` is `STATUS`
    fn decode_response(data: &[u8]) -> Self::Response;
}

/// Copy `data` into `buf` in reversed order
fn encode_reversed(data: &[u8], buf: &mut [u8]) {
    for (dst, src) in buf.iter_mut().zip(data.iter().rev()) {
        *dst = *src;
    }
}

/// Capped length of an outgoing payload
fn payload_len(data: &[u8]) -> usize {
    data.len().min(MAX_PAYLOAD_WIDTH)
}

/// `R_REGISTER` of a typed single byte register
pub struct ReadRegister<R: Register> {
    register: PhantomData<R>,
}

impl<R: Register> ReadRegister<R> {
    pub fn new() -> Self {
        ReadRegister {
            register: PhantomData,
        }
    }
}

impl<R: Register> Command for ReadRegister<R> {
    fn len(&self) -> usize {
        1 + R::read_len()
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = R::addr();
    }

    type Response = R;
    fn decode_response(data: &[u8]) -> Self::Response {
        R::decode(&data[1..])
    }
}

/// `W_REGISTER` of a typed single byte register
pub struct WriteRegister<R: Register> {
    register: R,
}

impl<R: Register> WriteRegister<R> {
    pub fn new(register: R) -> Self {
        WriteRegister { register }
    }
}

impl<R: Register> Command for WriteRegister<R> {
    fn len(&self) -> usize {
        1 + R::read_len()
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = 0b10_0000 | R::addr();
        self.register.encode(&mut buf[1..]);
    }

    type Response = ();
    fn decode_response(_: &[u8]) -> Self::Response {}
}

/// `R_REGISTER` of an arbitrary register, e.g. an address register
pub struct ReadRegisterBytes {
    addr: u8,
    len: usize,
}

impl ReadRegisterBytes {
    pub fn new(addr: u8, len: usize) -> Self {
        ReadRegisterBytes {
            addr,
            len: len.min(MAX_PAYLOAD_WIDTH),
        }
    }
}

impl Command for ReadRegisterBytes {
    fn len(&self) -> usize {
        1 + self.len
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = self.addr & 0b1_1111;
    }

    type Response = Payload;
    fn decode_response(data: &[u8]) -> Self::Response {
        Payload::from_wire(&data[1..])
    }
}

/// `W_REGISTER` of an arbitrary register
pub struct WriteRegisterBytes<'a> {
    addr: u8,
    data: &'a [u8],
}

impl<'a> WriteRegisterBytes<'a> {
    pub fn new(addr: u8, data: &'a [u8]) -> Self {
        WriteRegisterBytes { addr, data }
    }
}

impl<'a> Command for WriteRegisterBytes<'a> {
    fn len(&self) -> usize {
        1 + payload_len(self.data)
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = 0b10_0000 | (self.addr & 0b1_1111);
        encode_reversed(&self.data[..payload_len(self.data)], &mut buf[1..]);
    }

    type Response = ();
    fn decode_response(_: &[u8]) -> Self::Response {}
}

/// `R_RX_PL_WID`: width of the payload at the top of the RX FIFO
pub struct ReadRxPayloadWidth;

impl Command for ReadRxPayloadWidth {
    fn len(&self) -> usize {
        2
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = 0b0110_0000;
    }

    type Response = u8;
    fn decode_response(data: &[u8]) -> Self::Response {
        data[1]
    }
}

/// `R_RX_PAYLOAD`: pops one payload off the RX FIFO
pub struct ReadRxPayload {
    payload_width: usize,
}

impl ReadRxPayload {
    pub fn new(payload_width: usize) -> Self {
        ReadRxPayload {
            payload_width: payload_width.min(MAX_PAYLOAD_WIDTH),
        }
    }
}

impl Command for ReadRxPayload {
    fn len(&self) -> usize {
        1 + self.payload_width
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = 0b0110_0001;
    }

    type Response = Payload;
    fn decode_response(data: &[u8]) -> Self::Response {
        Payload::from_wire(&data[1..])
    }
}

/// `W_TX_PAYLOAD`: queues an acknowledged payload
pub struct WriteTxPayload<'a> {
    data: &'a [u8],
}

impl<'a> WriteTxPayload<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        WriteTxPayload { data }
    }
}

impl<'a> Command for WriteTxPayload<'a> {
    fn len(&self) -> usize {
        1 + payload_len(self.data)
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = 0b1010_0000;
        encode_reversed(&self.data[..payload_len(self.data)], &mut buf[1..]);
    }

    type Response = ();
    fn decode_response(_: &[u8]) -> Self::Response {}
}

/// `W_TX_PAYLOAD_NOACK`: queues a payload that expects no acknowledgement
pub struct WriteTxPayloadNoAck<'a> {
    data: &'a [u8],
}

impl<'a> WriteTxPayloadNoAck<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        WriteTxPayloadNoAck { data }
    }
}

impl<'a> Command for WriteTxPayloadNoAck<'a> {
    fn len(&self) -> usize {
        1 + payload_len(self.data)
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = 0b1011_0000;
        encode_reversed(&self.data[..payload_len(self.data)], &mut buf[1..]);
    }

    type Response = ();
    fn decode_response(_: &[u8]) -> Self::Response {}
}

/// `W_ACK_PAYLOAD`: payload piggybacked on the next ACK sent on `pipe`
pub struct WriteAckPayload<'a> {
    pipe: Pipe,
    data: &'a [u8],
}

impl<'a> WriteAckPayload<'a> {
    pub fn new(pipe: Pipe, data: &'a [u8]) -> Self {
        WriteAckPayload { pipe, data }
    }
}

impl<'a> Command for WriteAckPayload<'a> {
    fn len(&self) -> usize {
        1 + payload_len(self.data)
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = 0b1010_1000 | self.pipe as u8;
        encode_reversed(&self.data[..payload_len(self.data)], &mut buf[1..]);
    }

    type Response = ();
    fn decode_response(_: &[u8]) -> Self::Response {}
}

macro_rules! def_simple_command {
    ($(#[$meta:meta])* $name: ident, $opcode: expr) => {
        $(#[$meta])*
        pub struct $name;

        impl Command for $name {
            fn len(&self) -> usize {
                1
            }

            fn encode(&self, buf: &mut [u8]) {
                buf[0] = $opcode;
            }

            type Response = ();
            fn decode_response(_: &[u8]) -> Self::Response {}
        }
    };
}

def_simple_command!(
    /// `FLUSH_TX`
    FlushTx,
    0b1110_0001
);
def_simple_command!(
    /// `FLUSH_RX`
    FlushRx,
    0b1110_0010
);
def_simple_command!(
    /// `REUSE_TX_PL`: retransmit the last payload while CE is high
    ReuseTxPayload,
    0b1110_0011
);
def_simple_command!(
    /// `NOP`, clocks out nothing but `STATUS`
    Nop,
    0b1111_1111
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{RfCh, RX_ADDR_P0};

    fn encode<C: Command>(command: &C) -> ([u8; COMMAND_BUF_LEN], usize) {
        let mut buf = [0; COMMAND_BUF_LEN];
        let len = command.len();
        command.encode(&mut buf[..len]);
        (buf, len)
    }

    #[test]
    fn register_write_reverses_bytes() {
        let (buf, len) = encode(&WriteRegisterBytes::new(RX_ADDR_P0, &[1, 2, 3, 4, 5]));
        assert_eq!(&buf[..len], &[0x2A, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn register_read_restores_order() {
        let (buf, len) = encode(&ReadRegisterBytes::new(RX_ADDR_P0, 5));
        assert_eq!(&buf[..len], &[0x0A, 0, 0, 0, 0, 0]);
        let response = ReadRegisterBytes::decode_response(&[0x0E, 5, 4, 3, 2, 1]);
        assert_eq!(&*response, &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn typed_register() {
        let mut rf_ch = RfCh::from(0);
        rf_ch.set_rf_ch(76);
        let (buf, len) = encode(&WriteRegister::new(rf_ch));
        assert_eq!(&buf[..len], &[0x25, 76]);
        let (buf, len) = encode(&ReadRegister::<RfCh>::new());
        assert_eq!(&buf[..len], &[0x05, 0]);
    }

    #[test]
    fn opcodes() {
        assert_eq!(encode(&FlushTx).0[0], 0xE1);
        assert_eq!(encode(&FlushRx).0[0], 0xE2);
        assert_eq!(encode(&ReuseTxPayload).0[0], 0xE3);
        assert_eq!(encode(&Nop).0[0], 0xFF);
        assert_eq!(encode(&ReadRxPayloadWidth).0[0], 0x60);
        assert_eq!(encode(&ReadRxPayload::new(4)).0[0], 0x61);
        assert_eq!(encode(&WriteTxPayload::new(&[1])).0[0], 0xA0);
        assert_eq!(encode(&WriteTxPayloadNoAck::new(&[1])).0[0], 0xB0);
        assert_eq!(encode(&WriteAckPayload::new(Pipe::P3, &[1])).0[0], 0xAB);
    }

    #[test]
    fn payload_is_capped() {
        let data = [0x55; 40];
        let command = WriteTxPayload::new(&data);
        assert_eq!(command.len(), COMMAND_BUF_LEN);
        assert_eq!(ReadRxPayload::new(40).len(), COMMAND_BUF_LEN);
    }

    #[test]
    fn tx_payload_is_reversed() {
        let (buf, len) = encode(&WriteTxPayload::new(&[0xA, 0xB, 0xC]));
        assert_eq!(&buf[..len], &[0xA0, 0xC, 0xB, 0xA]);
        let payload = ReadRxPayload::decode_response(&[0x40, 0xC, 0xB, 0xA]);
        assert_eq!(&*payload, &[0xA, 0xB, 0xC]);
    }
}
