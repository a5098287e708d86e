use core::fmt;

use crate::state::State;

/// Errors reported by the driver
///
/// `SPIE` is the error type of the SPI bus, `PE` the error type shared by the
/// chip-select and chip-enable pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<SPIE, PE> {
    /// The SPI transfer failed
    Spi(SPIE),
    /// Driving the CE or CSN pin failed
    Pin(PE),
    /// The transceiver did not respond as expected while initializing
    NotConnected,
    /// An argument was out of range (pipe, address width, channel, ...)
    InvalidArgument,
    /// The device is busy with a transmission or has unhandled interrupts;
    /// retry once it returned to idle
    TryAgain,
    /// The TX FIFO is full
    Busy,
    /// The payload does not fit into a single frame
    TooBig,
    /// The receive buffer was too small; the frame has been dropped
    NoBuffer,
    /// The request is not supported by this driver
    NotSupported,
    /// The requested state transition is not allowed from the current state
    IllegalTransition {
        /// State of the device when the transition was requested
        from: State,
        /// Requested target state
        to: State,
    },
}

impl<SPIE: fmt::Debug, PE: fmt::Debug> fmt::Display for Error<SPIE, PE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(e) => write!(f, "SPI error: {:?}", e),
            Error::Pin(e) => write!(f, "pin error: {:?}", e),
            Error::NotConnected => f.write_str("transceiver not connected"),
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::TryAgain => f.write_str("device busy, try again"),
            Error::Busy => f.write_str("TX FIFO full"),
            Error::TooBig => f.write_str("payload too big"),
            Error::NoBuffer => f.write_str("buffer too small, frame dropped"),
            Error::NotSupported => f.write_str("not supported"),
            Error::IllegalTransition { from, to } => {
                write!(f, "illegal transition {:?} -> {:?}", from, to)
            }
        }
    }
}
