//! Network device interface
//!
//! [`NetDev`] is the contract a network stack uses to drive a radio:
//! bring it up, move frames, service its interrupt and query or change
//! options. Frames are `destination address ++ payload`.

use core::convert::Infallible;
use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer as SpiTransfer;
use embedded_hal::digital::v2::OutputPin;

use crate::config::{Address, Configuration, CrcMode, Pipe, RetransmitDelay, TxPower, NUM_CHANNELS};
use crate::device::Device;
use crate::error::Error;
use crate::registers::{self, Config, Dynpd, EnAa, EnRxaddr, Feature, Status, RX_ADDR_P0, RX_ADDR_P1};
use crate::rx::Rx;
use crate::state::State;
use crate::tx::Tx;
use crate::{Event, IrqHandle, MAX_PAYLOAD_WIDTH, NRF24L01};

/// Kind of device behind a [`NetDev`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceType {
    /// nRF24L01+ transceiver
    Nrf24l01pNg,
}

/// Upper layer protocol carried in the frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetType {
    /// Raw payload
    Undefined,
    /// 6LoWPAN
    SixLowPan,
    /// Uncompressed IPv6
    Ipv6,
}

/// Operational state as seen by the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetState {
    /// Not operational
    Off,
    /// Lowest power mode that keeps the configuration
    Sleep,
    /// Ready, neither sending nor listening
    Standby,
    /// Listening
    Rx,
    /// Sending
    Tx,
}

impl From<State> for NetState {
    fn from(state: State) -> Self {
        match state {
            State::PowerDown => NetState::Sleep,
            State::Standby1 => NetState::Standby,
            State::Standby2 | State::TxMode => NetState::Tx,
            State::RxMode => NetState::Rx,
            State::Undefined => NetState::Off,
        }
    }
}

impl From<NetState> for State {
    fn from(state: NetState) -> Self {
        match state {
            NetState::Sleep => State::PowerDown,
            NetState::Standby => State::Standby1,
            NetState::Tx => State::TxMode,
            NetState::Rx => State::RxMode,
            NetState::Off => State::Undefined,
        }
    }
}

/// Options that can be queried with [`NetDev::get`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetOpt {
    /// Length of the device address
    AddressLen,
    /// Length of the source address in outgoing frames
    SrcLen,
    /// The device's own address (pipe 1)
    Address,
    /// Automatic acknowledgements
    AutoAck,
    /// Virtual channel
    Channel,
    /// CRC
    Checksum,
    /// Same as [`NetOpt::Checksum`]
    IntegrityCheck,
    /// Kind of device
    DeviceType,
    /// Upper layer protocol
    Proto,
    /// Largest upper layer payload of a single frame
    MaxPduSize,
    /// Maximum number of retransmissions
    Retrans,
    /// Retransmission delay in µs
    RxTimeout,
    /// Operational state
    State,
    /// Output power in dBm
    TxPower,
    /// Loading a frame without sending it
    Preloading,
    /// Receiving frames for any address
    Promiscuous,
    /// Carrier sense before sending
    Csma,
}

/// An option together with its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetOptValue {
    /// See [`NetOpt::AddressLen`]
    AddressLen(u16),
    /// See [`NetOpt::SrcLen`]
    SrcLen(u16),
    /// See [`NetOpt::Address`]
    Address(Address),
    /// See [`NetOpt::AutoAck`]
    AutoAck(bool),
    /// See [`NetOpt::Channel`]
    Channel(u16),
    /// See [`NetOpt::Checksum`]
    Checksum(bool),
    /// See [`NetOpt::IntegrityCheck`]
    IntegrityCheck(bool),
    /// See [`NetOpt::DeviceType`]
    DeviceType(DeviceType),
    /// See [`NetOpt::Proto`]
    Proto(NetType),
    /// See [`NetOpt::MaxPduSize`]
    MaxPduSize(u16),
    /// See [`NetOpt::Retrans`]
    Retrans(u8),
    /// See [`NetOpt::RxTimeout`]
    RxTimeout(u32),
    /// See [`NetOpt::State`]
    State(NetState),
    /// See [`NetOpt::TxPower`]
    TxPower(i16),
    /// See [`NetOpt::Preloading`]
    Preloading(bool),
    /// See [`NetOpt::Promiscuous`]
    Promiscuous(bool),
    /// See [`NetOpt::Csma`]
    Csma(bool),
}

impl NetOptValue {
    /// The option this value belongs to
    pub fn opt(&self) -> NetOpt {
        match self {
            NetOptValue::AddressLen(_) => NetOpt::AddressLen,
            NetOptValue::SrcLen(_) => NetOpt::SrcLen,
            NetOptValue::Address(_) => NetOpt::Address,
            NetOptValue::AutoAck(_) => NetOpt::AutoAck,
            NetOptValue::Channel(_) => NetOpt::Channel,
            NetOptValue::Checksum(_) => NetOpt::Checksum,
            NetOptValue::IntegrityCheck(_) => NetOpt::IntegrityCheck,
            NetOptValue::DeviceType(_) => NetOpt::DeviceType,
            NetOptValue::Proto(_) => NetOpt::Proto,
            NetOptValue::MaxPduSize(_) => NetOpt::MaxPduSize,
            NetOptValue::Retrans(_) => NetOpt::Retrans,
            NetOptValue::RxTimeout(_) => NetOpt::RxTimeout,
            NetOptValue::State(_) => NetOpt::State,
            NetOptValue::TxPower(_) => NetOpt::TxPower,
            NetOptValue::Preloading(_) => NetOpt::Preloading,
            NetOptValue::Promiscuous(_) => NetOpt::Promiscuous,
            NetOptValue::Csma(_) => NetOpt::Csma,
        }
    }
}

/// A network device
pub trait NetDev {
    /// Error of a failed operation
    type Error;

    /// Bring the device into its listening state
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Read a received frame, see [`Rx::recv`]
    fn recv(&mut self, buf: Option<&mut [u8]>) -> Result<usize, Self::Error>;

    /// Send a frame: `iolist[0]` is the destination address, the remaining
    /// entries are concatenated to the payload. Returns the payload length.
    fn send(&mut self, iolist: &[&[u8]]) -> Result<usize, Self::Error>;

    /// Does [`isr`](NetDev::isr) have to run?
    fn irq_pending(&self) -> bool;

    /// Service the device interrupt in thread context
    fn isr(&mut self) -> Result<(), Self::Error>;

    /// Fetch the next event found by [`isr`](NetDev::isr)
    fn poll_event(&mut self) -> nb::Result<Event, Infallible>;

    /// Query an option
    fn get(&self, opt: NetOpt) -> Result<NetOptValue, Self::Error>;

    /// Change an option
    fn set(&mut self, value: NetOptValue) -> Result<(), Self::Error>;
}

impl<E, SPIE, CE, CSN, SPI, D, IRQ> NetDev for NRF24L01<CE, CSN, SPI, D, IRQ>
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

    /// Write the whole configuration and enter RX mode
    ///
    /// Pipes 0 (broadcast address) and 1 (own address) are enabled with
    /// auto acknowledgement and dynamic payload length.
    fn init(&mut self) -> Result<(), Self::Error> {
        let radio = self.radio;
        if radio.crc == CrcMode::Disabled || radio.channel >= NUM_CHANNELS {
            crate::log::debug!("unsupported parameters: {:?}", radio);
            return Err(Error::NotSupported);
        }
        self.ce_disable()?;
        if self.state != State::PowerDown {
            self.transition_to_power_down()?;
        }
        self.flush_tx()?;
        self.flush_rx()?;

        let width = self.address_width;
        self.rx_addr_p0 = Address::broadcast(width);
        let rx_addr_p0 = self.rx_addr_p0;
        self.write_register_bytes(RX_ADDR_P0, &rx_addr_p0)?;
        let rx_addr_p1 = self.rx_addr_p1;
        self.write_register_bytes(RX_ADDR_P1, &rx_addr_p1)?;
        for (pipe, lsb) in Pipe::ALL[2..].iter().zip(self.rx_addr_px) {
            self.write_register_bytes(registers::rx_addr(*pipe), &[lsb])?;
        }
        self.write_register(width.setup_aw())?;
        self.pipe0_overridden = false;
        self.write_register(radio.rf_setup())?;
        self.write_register(radio.setup_retr())?;
        self.write_register(radio.rf_ch())?;

        let pipes = (1 << Pipe::P0 as u8) | (1 << Pipe::P1 as u8);
        self.write_register(EnRxaddr::from_mask(pipes))?;
        self.enabled_pipes = EnRxaddr::from_mask(pipes);
        let mut config = Config::from(0);
        radio.crc.apply(&mut config);
        self.write_register(config)?;
        self.config = config;
        let mut feature = Feature::default();
        feature.set_en_dyn_ack(true);
        feature.set_en_dpl(true);
        feature.set_en_ack_pay(true);
        self.write_register(feature)?;
        self.write_register(EnAa::from_mask(pipes))?;
        self.write_register(Dynpd::from_mask(pipes))?;
        self.write_register(Status::clear_all())?;

        self.transition_to_standby_1()?;
        let (_, config) = self.read_register::<Config>()?;
        if !config.pwr_up() {
            crate::log::warn!("transceiver does not respond");
            return Err(Error::NotConnected);
        }
        self.transition_to_rx_mode()?;
        self.idle_state = State::RxMode;
        self.irq.flag().unmask();
        crate::log::debug!("initialized, listening on channel {}", radio.channel);
        Ok(())
    }

    fn recv(&mut self, buf: Option<&mut [u8]>) -> Result<usize, Self::Error> {
        Rx::recv(self, buf)
    }

    fn send(&mut self, iolist: &[&[u8]]) -> Result<usize, Self::Error> {
        match iolist.split_first() {
            Some((dst, payload)) => Tx::send(self, dst, payload),
            None => Err(Error::NotSupported),
        }
    }

    fn irq_pending(&self) -> bool {
        NRF24L01::irq_pending(self)
    }

    fn isr(&mut self) -> Result<(), Self::Error> {
        NRF24L01::isr(self)
    }

    fn poll_event(&mut self) -> nb::Result<Event, Infallible> {
        NRF24L01::poll_event(self)
    }

    fn get(&self, opt: NetOpt) -> Result<NetOptValue, Self::Error> {
        let width = self.address_width.bytes() as u16;
        let value = match opt {
            NetOpt::AddressLen => NetOptValue::AddressLen(width),
            NetOpt::SrcLen => NetOptValue::SrcLen(width),
            NetOpt::Address => NetOptValue::Address(self.rx_address(Pipe::P1)),
            // Enhanced ShockBurst can not work without them
            NetOpt::AutoAck => NetOptValue::AutoAck(true),
            NetOpt::Checksum => NetOptValue::Checksum(true),
            NetOpt::IntegrityCheck => NetOptValue::IntegrityCheck(true),
            NetOpt::Channel => NetOptValue::Channel(u16::from(self.channel())),
            NetOpt::DeviceType => NetOptValue::DeviceType(DeviceType::Nrf24l01pNg),
            NetOpt::Proto => NetOptValue::Proto(self.proto),
            // one byte for the source address length
            NetOpt::MaxPduSize => NetOptValue::MaxPduSize(MAX_PAYLOAD_WIDTH as u16 - width - 1),
            NetOpt::Retrans => NetOptValue::Retrans(self.max_retransmissions()),
            NetOpt::RxTimeout => NetOptValue::RxTimeout(self.retransmit_delay().as_us()),
            NetOpt::State => NetOptValue::State(self.state.into()),
            NetOpt::TxPower => NetOptValue::TxPower(self.tx_power().dbm()),
            _ => {
                crate::log::debug!("unsupported option {:?}", opt);
                return Err(Error::NotSupported);
            }
        };
        Ok(value)
    }

    fn set(&mut self, value: NetOptValue) -> Result<(), Self::Error> {
        match value {
            NetOptValue::Address(address) => self.set_rx_address(Pipe::P1, &address),
            NetOptValue::Channel(channel) => {
                let channel = u8::try_from(channel).map_err(|_| Error::InvalidArgument)?;
                self.set_channel(channel)
            }
            NetOptValue::Checksum(enable) | NetOptValue::IntegrityCheck(enable) => {
                self.set_crc(if enable {
                    CrcMode::TwoBytes
                } else {
                    CrcMode::Disabled
                })
            }
            NetOptValue::Retrans(count) => self.set_max_retransmissions(count),
            NetOptValue::RxTimeout(us) => self.set_retransmit_delay(RetransmitDelay::from_us(us)),
            NetOptValue::State(state) => self.set_state(state.into()).map(|_| ()),
            NetOptValue::TxPower(dbm) => self.set_tx_power(TxPower::from_dbm(dbm)),
            _ => {
                crate::log::debug!("unsupported option {:?}", value.opt());
                Err(Error::NotSupported)
            }
        }
    }
}
