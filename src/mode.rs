//! Type-state wrappers around the driver
//!
//! Each wrapper only offers the transitions the transceiver allows from its
//! state, so an illegal transition does not compile. A failed transition
//! hands the wrapper back together with the error.

use core::ops::{Deref, DerefMut};

/// Change the nRF24L01+ Device between the states defined in the datasheet
pub trait ChangeModes {
    /// Error for changing the device state (most likely a SPI error)
    type Error;

    /// Converts the device into Power Down mode
    fn to_power_down(&mut self) -> Result<(), Self::Error>;

    /// Converts the device into Standby-I
    fn to_standby(&mut self) -> Result<(), Self::Error>;

    /// Converts the device into Standby-II
    fn to_standby_2(&mut self) -> Result<(), Self::Error>;

    /// Converts the device into RX mode
    fn to_rx(&mut self) -> Result<(), Self::Error>;

    /// Converts the device into TX mode
    fn to_tx(&mut self) -> Result<(), Self::Error>;
}

macro_rules! mode_wrapper {
    ($(#[$meta:meta])* $name: ident) => {
        $(#[$meta])*
        pub struct $name<D: ChangeModes> {
            device: D,
        }

        impl<D: ChangeModes> $name<D> {
            /// Release the driver, leaving the transceiver in its state
            pub fn release(self) -> D {
                self.device
            }
        }

        impl<D: ChangeModes> core::fmt::Debug for $name<D> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        impl<D: ChangeModes> Deref for $name<D> {
            type Target = D;

            fn deref(&self) -> &D {
                &self.device
            }
        }

        impl<D: ChangeModes> DerefMut for $name<D> {
            fn deref_mut(&mut self) -> &mut D {
                &mut self.device
            }
        }
    };
}

macro_rules! transition {
    ($(#[$meta:meta])* $method: ident, $change: ident, $target: ident) => {
        $(#[$meta])*
        pub fn $method(mut self) -> Result<$target<D>, (Self, D::Error)> {
            match self.device.$change() {
                Ok(()) => Ok($target { device: self.device }),
                Err(e) => Err((self, e)),
            }
        }
    };
}

mode_wrapper!(
    /// Represents **Power Down**
    PowerDownMode
);
mode_wrapper!(
    /// Represents **Standby-I**
    StandbyMode
);
mode_wrapper!(
    /// Represents **Standby-II**
    Standby2Mode
);
mode_wrapper!(
    /// Represents **RX Mode**
    RxMode
);
mode_wrapper!(
    /// Represents **TX Mode**
    TxMode
);

impl<D: ChangeModes> PowerDownMode<D> {
    /// Power the device down and wrap it
    pub fn power_down(mut device: D) -> Result<Self, (D, D::Error)> {
        match device.to_power_down() {
            Ok(()) => Ok(PowerDownMode { device }),
            Err(e) => Err((device, e)),
        }
    }

    transition!(
        /// Power up, waiting for the oscillator to start
        standby,
        to_standby,
        StandbyMode
    );
}

impl<D: ChangeModes> StandbyMode<D> {
    transition!(
        /// Power down
        power_down,
        to_power_down,
        PowerDownMode
    );
    transition!(
        /// Start listening
        rx,
        to_rx,
        RxMode
    );
    transition!(
        /// Prepare for sending
        tx,
        to_tx,
        TxMode
    );
    transition!(
        /// Hold CE high with an empty TX FIFO
        standby_2,
        to_standby_2,
        Standby2Mode
    );
}

impl<D: ChangeModes> Standby2Mode<D> {
    transition!(
        /// Power down
        power_down,
        to_power_down,
        PowerDownMode
    );
    transition!(
        /// Resume sending
        tx,
        to_tx,
        TxMode
    );
}

impl<D: ChangeModes> RxMode<D> {
    transition!(
        /// Power down
        power_down,
        to_power_down,
        PowerDownMode
    );
    transition!(
        /// Stop listening
        standby,
        to_standby,
        StandbyMode
    );
}

impl<D: ChangeModes> TxMode<D> {
    transition!(
        /// Power down
        power_down,
        to_power_down,
        PowerDownMode
    );
    transition!(
        /// Stop sending
        standby,
        to_standby,
        StandbyMode
    );
    transition!(
        /// Keep CE high once the TX FIFO is empty
        standby_2,
        to_standby_2,
        Standby2Mode
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Params;
    use crate::error::Error;
    use crate::sim;
    use crate::state::State;
    use crate::Tx;

    #[test]
    fn wrappers_follow_the_device() {
        let (radio, chip) = sim::radio(&Params::default());
        let power_down = PowerDownMode::power_down(radio).unwrap();
        assert_eq!(power_down.state(), State::PowerDown);
        let standby = power_down.standby().unwrap();
        assert_eq!(standby.state(), State::Standby1);
        let rx = standby.rx().unwrap();
        assert_eq!(rx.state(), State::RxMode);
        assert!(chip.borrow().ce());
        let tx = rx.standby().unwrap().tx().unwrap();
        assert_eq!(tx.state(), State::TxMode);
        let standby_2 = tx.standby_2().unwrap();
        assert_eq!(standby_2.state(), State::Standby2);
        let radio = standby_2.power_down().unwrap().release();
        assert_eq!(radio.state(), State::PowerDown);
    }

    #[test]
    fn failed_transition_returns_the_wrapper() {
        let (radio, _chip) = sim::radio(&Params::default());
        let mut standby = PowerDownMode::power_down(radio).unwrap().standby().unwrap();
        // the wrapper is out of sync with the device once it is moved behind its back
        standby.transition_to_power_down().unwrap();
        let (standby, e) = match standby.rx() {
            Ok(_) => panic!("RX mode entered from Power Down"),
            Err(failed) => failed,
        };
        assert_eq!(
            e,
            Error::IllegalTransition {
                from: State::PowerDown,
                to: State::RxMode
            }
        );
        assert_eq!(standby.state(), State::PowerDown);
    }

    #[test]
    fn wrapped_device_keeps_its_traits() {
        let (radio, _chip) = sim::radio(&Params::default());
        let mut tx = PowerDownMode::power_down(radio)
            .unwrap()
            .standby()
            .unwrap()
            .tx()
            .unwrap();
        let observe = tx.observe().unwrap();
        assert_eq!(observe.plos_cnt(), 0);
    }
}
