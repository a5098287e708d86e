use crate::command::{
    Command, FlushRx, FlushTx, Nop, ReadRegister, ReadRegisterBytes, ReadRxPayload,
    ReadRxPayloadWidth, ReuseTxPayload, WriteAckPayload, WriteRegister, WriteRegisterBytes,
    WriteTxPayload, WriteTxPayloadNoAck,
};
use crate::config::Pipe;
use crate::payload::Payload;
use crate::registers::{Config, Register, Status};

/// Low level access to the transceiver
///
/// Every method is exactly one SPI transaction (or a pin/delay operation)
/// and returns the `STATUS` byte the transceiver shifted out first. A status
/// with flags set is not an error.
pub trait Device {
    /// Error from the bus or the pins
    type Error;

    /// Busy-wait for `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Drive CE high
    fn ce_enable(&mut self) -> Result<(), Self::Error>;

    /// Drive CE low
    fn ce_disable(&mut self) -> Result<(), Self::Error>;

    /// Run one command, framed by CSN
    fn send_command<C: Command>(
        &mut self,
        command: &C,
    ) -> Result<(Status, C::Response), Self::Error>;

    /// Modify the cached `CONFIG` register and write it if it changed
    fn update_config<F, R>(&mut self, f: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&mut Config) -> R;

    /// Write a typed register
    fn write_register<R: Register>(&mut self, register: R) -> Result<Status, Self::Error> {
        let (status, ()) = self.send_command(&WriteRegister::new(register))?;
        Ok(status)
    }

    /// Read a typed register
    fn read_register<R: Register>(&mut self) -> Result<(Status, R), Self::Error> {
        self.send_command(&ReadRegister::new())
    }

    /// Read `len` bytes of the register at `addr`, in natural byte order
    fn read_register_bytes(&mut self, addr: u8, len: usize) -> Result<(Status, Payload), Self::Error> {
        self.send_command(&ReadRegisterBytes::new(addr, len))
    }

    /// Write `data` to the register at `addr`; the bytes are sent LSByte first
    fn write_register_bytes(&mut self, addr: u8, data: &[u8]) -> Result<Status, Self::Error> {
        let (status, ()) = self.send_command(&WriteRegisterBytes::new(addr, data))?;
        Ok(status)
    }

    /// Width of the payload at the top of the RX FIFO
    ///
    /// The pipe it was received on is in [`Status::rx_p_no`].
    fn read_rx_payload_width(&mut self) -> Result<(Status, u8), Self::Error> {
        self.send_command(&ReadRxPayloadWidth)
    }

    /// Pop `len` bytes of payload off the RX FIFO
    fn read_rx_payload(&mut self, len: usize) -> Result<(Status, Payload), Self::Error> {
        self.send_command(&ReadRxPayload::new(len))
    }

    /// Queue a payload that requests an acknowledgement
    fn write_tx_payload(&mut self, data: &[u8]) -> Result<Status, Self::Error> {
        let (status, ()) = self.send_command(&WriteTxPayload::new(data))?;
        Ok(status)
    }

    /// Queue a payload that is not acknowledged
    fn write_tx_payload_no_ack(&mut self, data: &[u8]) -> Result<Status, Self::Error> {
        let (status, ()) = self.send_command(&WriteTxPayloadNoAck::new(data))?;
        Ok(status)
    }

    /// Queue a payload to be piggybacked on the next ACK sent on `pipe`
    fn write_ack_payload(&mut self, pipe: Pipe, data: &[u8]) -> Result<Status, Self::Error> {
        let (status, ()) = self.send_command(&WriteAckPayload::new(pipe, data))?;
        Ok(status)
    }

    /// Discard every payload in the TX FIFO
    fn flush_tx(&mut self) -> Result<Status, Self::Error> {
        let (status, ()) = self.send_command(&FlushTx)?;
        Ok(status)
    }

    /// Discard every payload in the RX FIFO
    fn flush_rx(&mut self) -> Result<Status, Self::Error> {
        let (status, ()) = self.send_command(&FlushRx)?;
        Ok(status)
    }

    /// Keep retransmitting the last payload while CE is high
    fn reuse_tx_payload(&mut self) -> Result<Status, Self::Error> {
        let (status, ()) = self.send_command(&ReuseTxPayload)?;
        Ok(status)
    }

    /// Read `STATUS` without any side effect
    fn get_status(&mut self) -> Result<Status, Self::Error> {
        let (status, ()) = self.send_command(&Nop)?;
        Ok(status)
    }
}
