use core::fmt::Debug;
use core::ops::Deref;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer as SpiTransfer;
use embedded_hal::digital::v2::OutputPin;

use crate::device::Device;
use crate::error::Error;
use crate::netdev::NetType;
use crate::registers::{self, Dynpd, EnAa, EnRxaddr, RfCh, RfSetup, SetupRetr};
use crate::{IrqHandle, MAX_ADDR_BYTES, MIN_ADDR_BYTES, NRF24L01, PIPES_COUNT};

/// Number of virtual channels
pub const NUM_CHANNELS: u8 = 16;

/// RF channel (`RF_CH`) of every virtual channel, spaced by 8 MHz so that
/// 2 Mbps transmissions on adjacent channels do not overlap
pub const CHANNEL_MAP: [u8; NUM_CHANNELS as usize] = [
    2, 10, 18, 26, 34, 42, 50, 58, 66, 74, 82, 90, 98, 106, 114, 122,
];

/// Supported air data rates.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRate {
    /// 1 Mbps
    #[default]
    R1Mbps,
    /// 250 Kbps
    R250Kbps,
    /// 2 Mbps
    R2Mbps,
}

impl DataRate {
    pub(crate) fn apply(self, rf_setup: &mut RfSetup) {
        rf_setup.set_rf_dr_low(self == DataRate::R250Kbps);
        rf_setup.set_rf_dr_high(self == DataRate::R2Mbps);
    }

    pub(crate) fn from_rf_setup(rf_setup: &RfSetup) -> Self {
        match (rf_setup.rf_dr_low(), rf_setup.rf_dr_high()) {
            (true, _) => DataRate::R250Kbps,
            (false, true) => DataRate::R2Mbps,
            (false, false) => DataRate::R1Mbps,
        }
    }
}

/// Supported CRC modes
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrcMode {
    /// Disable all CRC generation/checking
    ///
    /// Enhanced ShockBurst needs a CRC, so the driver refuses this mode.
    Disabled,
    /// One byte checksum
    OneByte,
    /// Two bytes checksum
    #[default]
    TwoBytes,
}

impl CrcMode {
    /// Length of the checksum in bytes
    pub fn len(self) -> u8 {
        match self {
            CrcMode::Disabled => 0,
            CrcMode::OneByte => 1,
            CrcMode::TwoBytes => 2,
        }
    }

    pub(crate) fn apply(self, config: &mut registers::Config) {
        config.set_en_crc(self != CrcMode::Disabled);
        config.set_crco(self == CrcMode::TwoBytes);
    }
}

/// Output power of the power amplifier
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxPower {
    /// -18 dBm
    Minus18dBm,
    /// -12 dBm
    Minus12dBm,
    /// -6 dBm
    Minus6dBm,
    /// 0 dBm
    #[default]
    ZeroDbm,
}

impl TxPower {
    /// Highest supported level not above `dbm`, or -18 dBm below that
    pub fn from_dbm(dbm: i16) -> Self {
        if dbm < -12 {
            TxPower::Minus18dBm
        } else if dbm < -6 {
            TxPower::Minus12dBm
        } else if dbm < 0 {
            TxPower::Minus6dBm
        } else {
            TxPower::ZeroDbm
        }
    }

    /// Output power in dBm
    pub fn dbm(self) -> i16 {
        match self {
            TxPower::Minus18dBm => -18,
            TxPower::Minus12dBm => -12,
            TxPower::Minus6dBm => -6,
            TxPower::ZeroDbm => 0,
        }
    }

    fn rf_pwr(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_rf_setup(rf_setup: &RfSetup) -> Self {
        match rf_setup.rf_pwr() & 0b11 {
            0 => TxPower::Minus18dBm,
            1 => TxPower::Minus12dBm,
            2 => TxPower::Minus6dBm,
            _ => TxPower::ZeroDbm,
        }
    }
}

/// Auto retransmit delay, 250 µs to 4000 µs in steps of 250 µs
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetransmitDelay(u8);

impl RetransmitDelay {
    /// Shortest delay, 250 µs
    pub const MIN: RetransmitDelay = RetransmitDelay(0);
    /// Longest delay, 4000 µs
    pub const MAX: RetransmitDelay = RetransmitDelay(15);
    const DEFAULT: RetransmitDelay = RetransmitDelay(10);

    /// Delay of `(steps + 1) * 250` µs, `None` if `steps > 15`
    pub const fn from_steps(steps: u8) -> Option<Self> {
        if steps <= 15 {
            Some(RetransmitDelay(steps))
        } else {
            None
        }
    }

    /// Longest supported delay not above `us`, clamped to 250..=4000 µs
    pub fn from_us(us: u32) -> Self {
        let steps = (us / 250).clamp(1, 16) - 1;
        RetransmitDelay(steps as u8)
    }

    /// The `ARD` field value
    pub fn steps(self) -> u8 {
        self.0
    }

    /// Delay in µs
    pub fn as_us(self) -> u32 {
        (u32::from(self.0) + 1) * 250
    }
}

impl Default for RetransmitDelay {
    fn default() -> Self {
        RetransmitDelay::DEFAULT
    }
}

/// A receive pipe
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pipe {
    /// Pipe 0, also used to receive ACKs while transmitting
    P0 = 0,
    /// Pipe 1, the device's own address
    P1 = 1,
    /// Pipe 2
    P2 = 2,
    /// Pipe 3
    P3 = 3,
    /// Pipe 4
    P4 = 4,
    /// Pipe 5
    P5 = 5,
}

impl Pipe {
    /// All pipes in ascending order
    pub const ALL: [Pipe; PIPES_COUNT] = [Pipe::P0, Pipe::P1, Pipe::P2, Pipe::P3, Pipe::P4, Pipe::P5];

    /// Pipes 2..5 only store the least significant address byte
    pub fn has_full_address(self) -> bool {
        self <= Pipe::P1
    }
}

impl TryFrom<u8> for Pipe {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Pipe::ALL.get(usize::from(value)).copied().ok_or(value)
    }
}

/// Address width shared by all pipes
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressWidth {
    /// 3 bytes
    Three = 3,
    /// 4 bytes
    Four = 4,
    /// 5 bytes
    #[default]
    Five = 5,
}

impl AddressWidth {
    /// Width of an address of `len` bytes
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            3 => Some(AddressWidth::Three),
            4 => Some(AddressWidth::Four),
            5 => Some(AddressWidth::Five),
            _ => None,
        }
    }

    /// Number of address bytes
    pub fn bytes(self) -> usize {
        self as usize
    }

    pub(crate) fn setup_aw(self) -> registers::SetupAw {
        let mut setup_aw = registers::SetupAw::from(0);
        setup_aw.set_aw(self as u8 - 2);
        setup_aw
    }
}

/// A 3 to 5 byte link layer address, most significant byte first
#[derive(Clone, Copy)]
pub struct Address {
    bytes: [u8; MAX_ADDR_BYTES],
    width: AddressWidth,
}

impl Address {
    /// Copy an address out of `bytes`, `None` unless it has 3 to 5 bytes
    pub fn new(bytes: &[u8]) -> Option<Self> {
        let width = AddressWidth::from_len(bytes.len())?;
        let mut address = Address {
            bytes: [0; MAX_ADDR_BYTES],
            width,
        };
        address.bytes[..bytes.len()].copy_from_slice(bytes);
        Some(address)
    }

    /// Build an address from a full 5 byte array, keeping the first `width` bytes
    pub const fn from_array(bytes: [u8; MAX_ADDR_BYTES], width: AddressWidth) -> Self {
        Address { bytes, width }
    }

    /// The reserved broadcast address: all bytes `0xFF`
    pub const fn broadcast(width: AddressWidth) -> Self {
        Address {
            bytes: [0xFF; MAX_ADDR_BYTES],
            width,
        }
    }

    /// Is this the broadcast address?
    pub fn is_broadcast(&self) -> bool {
        is_broadcast(self)
    }

    /// Address width
    pub fn width(&self) -> AddressWidth {
        self.width
    }

    /// The address bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.width.bytes()]
    }

    /// Least significant (last) byte, which must be unique among pipes
    pub fn lsb(&self) -> u8 {
        self.bytes[self.width.bytes() - 1]
    }

    pub(crate) fn with_lsb(mut self, lsb: u8) -> Self {
        let last = self.width.bytes() - 1;
        self.bytes[last] = lsb;
        self
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Address {}

impl Deref for Address {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "Address({:02X?})", self.as_slice())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Address {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Address({=[u8]:02X})", self.as_slice())
    }
}

/// Is `address` a broadcast address of any width?
pub fn is_broadcast(address: &[u8]) -> bool {
    (MIN_ADDR_BYTES..=MAX_ADDR_BYTES).contains(&address.len()) && address.iter().all(|b| *b == 0xFF)
}

/// Radio settings, as cached by the driver
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioConfig {
    /// Virtual channel, `0..NUM_CHANNELS`
    pub channel: u8,
    /// CRC length
    pub crc: CrcMode,
    /// Output power
    pub tx_power: TxPower,
    /// Air data rate
    pub data_rate: DataRate,
    /// Maximum number of auto retransmissions, `0..=15`
    pub max_retransmissions: u8,
    /// Delay between auto retransmissions
    pub retransmit_delay: RetransmitDelay,
}

impl RadioConfig {
    /// Channel 0, 2 byte CRC, 0 dBm, 1 Mbps, 15 retransmissions every 2750 µs
    pub const DEFAULT: RadioConfig = RadioConfig {
        channel: 0,
        crc: CrcMode::TwoBytes,
        tx_power: TxPower::ZeroDbm,
        data_rate: DataRate::R1Mbps,
        max_retransmissions: 15,
        retransmit_delay: RetransmitDelay::DEFAULT,
    };

    pub(crate) fn rf_setup(&self) -> RfSetup {
        let mut rf_setup = RfSetup::from(0);
        self.data_rate.apply(&mut rf_setup);
        rf_setup.set_rf_pwr(self.tx_power.rf_pwr());
        rf_setup
    }

    pub(crate) fn setup_retr(&self) -> SetupRetr {
        let mut setup_retr = SetupRetr::from(0);
        setup_retr.set_ard(self.retransmit_delay.steps());
        setup_retr.set_arc(self.max_retransmissions);
        setup_retr
    }

    pub(crate) fn rf_ch(&self) -> RfCh {
        let mut rf_ch = RfCh::from(0);
        rf_ch.set_rf_ch(CHANNEL_MAP[usize::from(self.channel)]);
        rf_ch
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig::DEFAULT
    }
}

/// Board parameters of one transceiver
///
/// Can be declared in a `static` table with [`Params::new`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Params {
    /// Initial radio settings
    pub config: RadioConfig,
    /// Address width of all pipes
    pub address_width: AddressWidth,
    /// Address of pipe 1, the device's own address
    pub rx_address: [u8; MAX_ADDR_BYTES],
    /// Least significant address bytes of pipes 2..5
    pub rx_address_lsb: [u8; PIPES_COUNT - 2],
    /// Protocol carried in the frames
    pub proto: NetType,
}

impl Params {
    /// Parameters with the transceiver's reset addresses
    pub const fn new(config: RadioConfig, address_width: AddressWidth) -> Self {
        Params {
            config,
            address_width,
            rx_address: [0xC2; MAX_ADDR_BYTES],
            rx_address_lsb: [0xC3, 0xC4, 0xC5, 0xC6],
            proto: NetType::Undefined,
        }
    }

    /// Replace the address of pipe 1
    pub const fn with_rx_address(mut self, rx_address: [u8; MAX_ADDR_BYTES]) -> Self {
        self.rx_address = rx_address;
        self
    }

    /// Replace the protocol
    pub const fn with_proto(mut self, proto: NetType) -> Self {
        self.proto = proto;
        self
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::new(RadioConfig::DEFAULT, AddressWidth::Five)
    }
}

/// Runtime configuration of the transceiver
///
/// Getters return the cached value. Setters validate their argument, refuse
/// to run while a transmission is in progress and only update the cache once
/// the register has been written.
pub trait Configuration {
    /// Error of a failed setter
    type Error;

    /// Virtual channel
    fn channel(&self) -> u8;
    /// Tune to virtual channel `channel`, `0..NUM_CHANNELS`
    fn set_channel(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// CRC length
    fn crc(&self) -> CrcMode;
    /// Set the CRC length; [`CrcMode::Disabled`] is refused
    fn set_crc(&mut self, crc: CrcMode) -> Result<(), Self::Error>;

    /// Output power
    fn tx_power(&self) -> TxPower;
    /// Set the output power
    fn set_tx_power(&mut self, tx_power: TxPower) -> Result<(), Self::Error>;

    /// Air data rate
    fn data_rate(&self) -> DataRate;
    /// Set the air data rate
    fn set_data_rate(&mut self, data_rate: DataRate) -> Result<(), Self::Error>;

    /// Maximum number of auto retransmissions
    fn max_retransmissions(&self) -> u8;
    /// Set the maximum number of auto retransmissions, `0..=15`
    fn set_max_retransmissions(&mut self, count: u8) -> Result<(), Self::Error>;

    /// Auto retransmission delay
    fn retransmit_delay(&self) -> RetransmitDelay;
    /// Set the auto retransmission delay
    fn set_retransmit_delay(&mut self, delay: RetransmitDelay) -> Result<(), Self::Error>;

    /// Address width of all pipes
    fn address_width(&self) -> AddressWidth;

    /// Receive address of `pipe`
    ///
    /// Pipes 2..5 share all but their last byte with pipe 1.
    fn rx_address(&self, pipe: Pipe) -> Address;
    /// Set the receive address of `pipe`
    ///
    /// Pipes 0 and 1 take a full address of the configured width, pipes 2..5
    /// only their last byte.
    fn set_rx_address(&mut self, pipe: Pipe, address: &[u8]) -> Result<(), Self::Error>;

    /// Is reception on `pipe` enabled?
    fn pipe_enabled(&self, pipe: Pipe) -> bool;
    /// Enable reception, auto acknowledgement and dynamic payloads on `pipe`
    fn enable_pipe(&mut self, pipe: Pipe) -> Result<(), Self::Error>;
    /// Disable reception on `pipe`
    fn disable_pipe(&mut self, pipe: Pipe) -> Result<(), Self::Error>;
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
    fn check_configurable(&self) -> Result<(), Error<SPIE, E>> {
        if self.state.accepts_configuration() {
            Ok(())
        } else {
            crate::log::debug!("configuration refused in {:?}", self.state);
            Err(Error::TryAgain)
        }
    }

    fn set_pipe_flags(&mut self, pipe: Pipe, enable: bool) -> Result<(), Error<SPIE, E>> {
        let (_, mut en_rxaddr) = self.read_register::<EnRxaddr>()?;
        en_rxaddr.set_pipe(pipe, enable);
        self.write_register(en_rxaddr)?;
        self.enabled_pipes = en_rxaddr;
        let (_, mut en_aa) = self.read_register::<EnAa>()?;
        en_aa.set_pipe(pipe, enable);
        self.write_register(en_aa)?;
        let (_, mut dynpd) = self.read_register::<Dynpd>()?;
        dynpd.set_pipe(pipe, enable);
        self.write_register(dynpd)?;
        Ok(())
    }
}

impl<E, SPIE, CE, CSN, SPI, D, IRQ> Configuration for NRF24L01<CE, CSN, SPI, D, IRQ>
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

    fn channel(&self) -> u8 {
        self.radio.channel
    }

    fn set_channel(&mut self, channel: u8) -> Result<(), Self::Error> {
        if channel >= NUM_CHANNELS {
            return Err(Error::InvalidArgument);
        }
        self.check_configurable()?;
        let config = RadioConfig { channel, ..self.radio };
        self.write_register(config.rf_ch())?;
        self.radio = config;
        Ok(())
    }

    fn crc(&self) -> CrcMode {
        self.radio.crc
    }

    fn set_crc(&mut self, crc: CrcMode) -> Result<(), Self::Error> {
        if crc == CrcMode::Disabled {
            return Err(Error::InvalidArgument);
        }
        self.check_configurable()?;
        self.update_config(|config| crc.apply(config))?;
        self.radio.crc = crc;
        Ok(())
    }

    fn tx_power(&self) -> TxPower {
        self.radio.tx_power
    }

    fn set_tx_power(&mut self, tx_power: TxPower) -> Result<(), Self::Error> {
        self.check_configurable()?;
        let (_, mut rf_setup) = self.read_register::<RfSetup>()?;
        rf_setup.set_rf_pwr(tx_power.rf_pwr());
        self.write_register(rf_setup)?;
        self.radio.tx_power = tx_power;
        Ok(())
    }

    fn data_rate(&self) -> DataRate {
        self.radio.data_rate
    }

    fn set_data_rate(&mut self, data_rate: DataRate) -> Result<(), Self::Error> {
        self.check_configurable()?;
        let (_, mut rf_setup) = self.read_register::<RfSetup>()?;
        data_rate.apply(&mut rf_setup);
        self.write_register(rf_setup)?;
        self.radio.data_rate = data_rate;
        Ok(())
    }

    fn max_retransmissions(&self) -> u8 {
        self.radio.max_retransmissions
    }

    fn set_max_retransmissions(&mut self, count: u8) -> Result<(), Self::Error> {
        if count > 15 {
            return Err(Error::InvalidArgument);
        }
        self.check_configurable()?;
        let (_, mut setup_retr) = self.read_register::<SetupRetr>()?;
        setup_retr.set_arc(count);
        self.write_register(setup_retr)?;
        self.radio.max_retransmissions = count;
        Ok(())
    }

    fn retransmit_delay(&self) -> RetransmitDelay {
        self.radio.retransmit_delay
    }

    fn set_retransmit_delay(&mut self, delay: RetransmitDelay) -> Result<(), Self::Error> {
        self.check_configurable()?;
        let (_, mut setup_retr) = self.read_register::<SetupRetr>()?;
        setup_retr.set_ard(delay.steps());
        self.write_register(setup_retr)?;
        self.radio.retransmit_delay = delay;
        Ok(())
    }

    fn address_width(&self) -> AddressWidth {
        self.address_width
    }

    fn rx_address(&self, pipe: Pipe) -> Address {
        match pipe {
            Pipe::P0 => self.rx_addr_p0,
            Pipe::P1 => self.rx_addr_p1,
            px => self.rx_addr_p1.with_lsb(self.rx_addr_px[px as usize - 2]),
        }
    }

    fn set_rx_address(&mut self, pipe: Pipe, address: &[u8]) -> Result<(), Self::Error> {
        let expected = if pipe.has_full_address() {
            self.address_width.bytes()
        } else {
            1
        };
        if address.len() != expected {
            return Err(Error::InvalidArgument);
        }
        self.check_configurable()?;
        self.write_register_bytes(registers::rx_addr(pipe), address)?;
        match pipe {
            Pipe::P0 => self.rx_addr_p0 = Address::new(address).ok_or(Error::InvalidArgument)?,
            Pipe::P1 => self.rx_addr_p1 = Address::new(address).ok_or(Error::InvalidArgument)?,
            px => self.rx_addr_px[px as usize - 2] = address[0],
        }
        Ok(())
    }

    fn pipe_enabled(&self, pipe: Pipe) -> bool {
        self.enabled_pipes.pipe(pipe)
    }

    fn enable_pipe(&mut self, pipe: Pipe) -> Result<(), Self::Error> {
        self.check_configurable()?;
        self.set_pipe_flags(pipe, true)
    }

    fn disable_pipe(&mut self, pipe: Pipe) -> Result<(), Self::Error> {
        self.check_configurable()?;
        self.set_pipe_flags(pipe, false)
    }
}
