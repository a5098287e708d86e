//! Fixed capacity table of the devices of a board
//!
//! Applications create one driver per [`Params`](crate::Params) entry,
//! register it and hand out [`DeviceId`]s to the code that needs a device.

use heapless::Vec;

use crate::netdev::NetDev;

/// Index of a device in a [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId(usize);

impl DeviceId {
    /// Position in registration order
    pub fn index(self) -> usize {
        self.0
    }
}

/// Up to `N` devices, in registration order
#[derive(Debug)]
pub struct Registry<T, const N: usize> {
    devices: Vec<T, N>,
}

impl<T, const N: usize> Registry<T, N> {
    /// An empty registry
    pub const fn new() -> Self {
        Registry {
            devices: Vec::new(),
        }
    }

    /// Add a device; hands it back if the registry is full
    pub fn register(&mut self, device: T) -> Result<DeviceId, T> {
        let id = DeviceId(self.devices.len());
        self.devices.push(device)?;
        Ok(id)
    }

    /// The device registered as `id`
    pub fn get(&self, id: DeviceId) -> Option<&T> {
        self.devices.get(id.0)
    }

    /// The device registered as `id`
    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut T> {
        self.devices.get_mut(id.0)
    }

    /// All devices with their ids
    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &T)> {
        self.devices.iter().enumerate().map(|(i, device)| (DeviceId(i), device))
    }

    /// All devices with their ids
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (DeviceId, &mut T)> {
        self.devices
            .iter_mut()
            .enumerate()
            .map(|(i, device)| (DeviceId(i), device))
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// `true` if no device has been registered
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl<T, const N: usize> Default for Registry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NetDev, const N: usize> Registry<T, N> {
    /// Initialize every device, stopping at the first failure
    pub fn init_all(&mut self) -> Result<(), (DeviceId, T::Error)> {
        for (id, device) in self.iter_mut() {
            device.init().map_err(|e| (id, e))?;
        }
        Ok(())
    }

    /// Run the interrupt handler of every device with a pending interrupt
    ///
    /// Returns the number of devices serviced. A failing device does not
    /// keep the others from being serviced; the first error is returned.
    pub fn service_pending(&mut self) -> Result<usize, (DeviceId, T::Error)> {
        let mut serviced = 0;
        let mut first_error = None;
        for (id, device) in self.iter_mut() {
            if !device.irq_pending() {
                continue;
            }
            match device.isr() {
                Ok(()) => serviced += 1,
                Err(e) => {
                    crate::log::warn!("interrupt handling of device {} failed", id.0);
                    if first_error.is_none() {
                        first_error = Some((id, e));
                    }
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(serviced),
        }
    }
}
