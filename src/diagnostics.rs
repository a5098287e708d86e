//! Register dumps and a summary of the driver state for debugging

use core::fmt;
use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer as SpiTransfer;
use embedded_hal::digital::v2::OutputPin;

use crate::config::{Address, Configuration, Pipe, RadioConfig};
use crate::device::Device;
use crate::error::Error;
use crate::registers::{
    self, Config, Dynpd, EnAa, EnRxaddr, Feature, FifoStatus, ObserveTx, RfCh, RfSetup, Rpd,
    SetupAw, SetupRetr, Status, RX_ADDR_P0, RX_ADDR_P1, TX_ADDR,
};
use crate::state::State;
use crate::{IrqHandle, Stats, MAX_ADDR_BYTES, NRF24L01, PIPES_COUNT};

/// Contents of every register, read from the transceiver
///
/// Fields are named after the registers they hold.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDump {
    pub config: Config,
    pub en_aa: EnAa,
    pub en_rxaddr: EnRxaddr,
    pub setup_aw: SetupAw,
    pub setup_retr: SetupRetr,
    pub rf_ch: RfCh,
    pub rf_setup: RfSetup,
    pub status: Status,
    pub observe_tx: ObserveTx,
    pub rpd: Rpd,
    pub rx_addr_p0: Address,
    pub rx_addr_p1: Address,
    /// Last byte of the addresses of pipes 2..5
    pub rx_addr_px: [u8; PIPES_COUNT - 2],
    pub tx_addr: Address,
    /// `RX_PW_P0` to `RX_PW_P5`
    pub rx_pw: [u8; PIPES_COUNT],
    pub fifo_status: FifoStatus,
    pub dynpd: Dynpd,
    pub feature: Feature,
}

impl fmt::Display for RegisterDump {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "CONFIG      {:#04x}", u8::from(self.config))?;
        writeln!(f, "EN_AA       {:#04x}", u8::from(self.en_aa))?;
        writeln!(f, "EN_RXADDR   {:#04x}", u8::from(self.en_rxaddr))?;
        writeln!(f, "SETUP_AW    {:#04x}", u8::from(self.setup_aw))?;
        writeln!(f, "SETUP_RETR  {:#04x}", u8::from(self.setup_retr))?;
        writeln!(f, "RF_CH       {:#04x}", u8::from(self.rf_ch))?;
        writeln!(f, "RF_SETUP    {:#04x}", u8::from(self.rf_setup))?;
        writeln!(f, "STATUS      {:#04x}", u8::from(self.status))?;
        writeln!(f, "OBSERVE_TX  {:#04x}", u8::from(self.observe_tx))?;
        writeln!(f, "RPD         {:#04x}", u8::from(self.rpd))?;
        writeln!(f, "RX_ADDR_P0  {:02x?}", self.rx_addr_p0.as_slice())?;
        writeln!(f, "RX_ADDR_P1  {:02x?}", self.rx_addr_p1.as_slice())?;
        for (i, lsb) in self.rx_addr_px.iter().enumerate() {
            writeln!(f, "RX_ADDR_P{}  {:#04x}", i + 2, lsb)?;
        }
        writeln!(f, "TX_ADDR     {:02x?}", self.tx_addr.as_slice())?;
        for (i, width) in self.rx_pw.iter().enumerate() {
            writeln!(f, "RX_PW_P{}    {}", i, width)?;
        }
        writeln!(f, "FIFO_STATUS {:#04x}", u8::from(self.fifo_status))?;
        writeln!(f, "DYNPD       {:#04x}", u8::from(self.dynpd))?;
        write!(f, "FEATURE     {:#04x}", u8::from(self.feature))
    }
}

/// The driver's view of the device, without talking to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Current state
    pub state: State,
    /// State returned to after a transmission
    pub idle_state: State,
    /// Cached radio settings
    pub radio: RadioConfig,
    /// Receive address of every pipe, `None` for disabled pipes
    pub rx_addresses: [Option<Address>; PIPES_COUNT],
    /// Recovery counters
    pub stats: Stats,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "state:        {:?} (idle {:?})", self.state, self.idle_state)?;
        writeln!(f, "channel:      {}", self.radio.channel)?;
        writeln!(f, "data rate:    {:?}", self.radio.data_rate)?;
        writeln!(f, "tx power:     {} dBm", self.radio.tx_power.dbm())?;
        writeln!(f, "crc:          {} bytes", self.radio.crc.len())?;
        writeln!(
            f,
            "retransmit:   {} times every {} us",
            self.radio.max_retransmissions,
            self.radio.retransmit_delay.as_us()
        )?;
        for (pipe, address) in Pipe::ALL.iter().zip(self.rx_addresses.iter()) {
            match address {
                Some(address) => writeln!(f, "pipe {:?}:     {:02x?}", pipe, address.as_slice())?,
                None => writeln!(f, "pipe {:?}:     disabled", pipe)?,
            }
        }
        write!(
            f,
            "dropped:      {} events, {} frames",
            self.stats.events_dropped, self.stats.frames_dropped
        )
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
    fn read_address(&mut self, addr: u8) -> Result<Address, Error<SPIE, E>> {
        let width = self.address_width;
        let (_, payload) = self.read_register_bytes(addr, width.bytes())?;
        let mut bytes = [0; MAX_ADDR_BYTES];
        bytes[..payload.len()].copy_from_slice(&payload);
        Ok(Address::from_array(bytes, width))
    }

    /// Read every register
    pub fn dump_registers(&mut self) -> Result<RegisterDump, Error<SPIE, E>> {
        let mut rx_addr_px = [0; PIPES_COUNT - 2];
        for (lsb, pipe) in rx_addr_px.iter_mut().zip(&Pipe::ALL[2..]) {
            let (_, payload) = self.read_register_bytes(registers::rx_addr(*pipe), 1)?;
            *lsb = payload[0];
        }
        let mut rx_pw = [0; PIPES_COUNT];
        for (width, pipe) in rx_pw.iter_mut().zip(&Pipe::ALL) {
            let (_, payload) = self.read_register_bytes(registers::rx_pw(*pipe), 1)?;
            *width = payload[0];
        }
        Ok(RegisterDump {
            config: self.read_register()?.1,
            en_aa: self.read_register()?.1,
            en_rxaddr: self.read_register()?.1,
            setup_aw: self.read_register()?.1,
            setup_retr: self.read_register()?.1,
            rf_ch: self.read_register()?.1,
            rf_setup: self.read_register()?.1,
            status: self.read_register()?.1,
            observe_tx: self.read_register()?.1,
            rpd: self.read_register()?.1,
            rx_addr_p0: self.read_address(RX_ADDR_P0)?,
            rx_addr_p1: self.read_address(RX_ADDR_P1)?,
            rx_addr_px,
            tx_addr: self.read_address(TX_ADDR)?,
            rx_pw,
            fifo_status: self.read_register()?.1,
            dynpd: self.read_register()?.1,
            feature: self.read_register()?.1,
        })
    }

    /// Summary of the cached configuration and state
    pub fn device_info(&self) -> DeviceInfo {
        let mut rx_addresses = [None; PIPES_COUNT];
        for (address, pipe) in rx_addresses.iter_mut().zip(Pipe::ALL) {
            if self.pipe_enabled(pipe) {
                *address = Some(self.rx_address(pipe));
            }
        }
        DeviceInfo {
            state: self.state,
            idle_state: self.idle_state,
            radio: self.radio,
            rx_addresses,
            stats: self.stats,
        }
    }
}
