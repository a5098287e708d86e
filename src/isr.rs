use core::convert::Infallible;
use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer as SpiTransfer;
use embedded_hal::digital::v2::OutputPin;

use crate::device::Device;
use crate::error::Error;
use crate::registers::FifoStatus;
use crate::rx::Rx;
use crate::state::State;
use crate::{IrqHandle, IrqPin, MAX_FRAME_LEN, NRF24L01};

/// Capacity of the event queue
pub const EVENT_QUEUE_LEN: usize = 8;

/// Number of payloads the RX FIFO holds
const RX_FIFO_DEPTH: usize = 3;

/// A received frame: destination address followed by the payload
pub type Frame = heapless::Vec<u8, MAX_FRAME_LEN>;

/// What the interrupt handler found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A frame has been received
    RxComplete(Frame),
    /// A frame has been sent (and acknowledged, unless it was a broadcast)
    TxComplete,
    /// No acknowledgement after the maximum number of retransmissions; the
    /// TX FIFO has been flushed
    TxNoAck,
}

/// Interrupt context half of the driver
///
/// Shared between the pin interrupt handler and the driver, which holds it
/// through an [`IrqHandle`] such as `&'static IrqFlag<P>`:
///
/// ```ignore
/// static IRQ: IrqFlag<BoardIrq> = IrqFlag::new(BoardIrq);
///
/// fn on_pin_interrupt() {
///     IRQ.on_irq();
/// }
/// ```
pub struct IrqFlag<P> {
    pin: P,
    pending: AtomicBool,
}

impl<P> IrqFlag<P> {
    /// A flag for the IRQ line `pin`, nothing pending
    pub const fn new(pin: P) -> Self {
        IrqFlag {
            pin,
            pending: AtomicBool::new(false),
        }
    }

    /// The IRQ line
    pub fn pin(&self) -> &P {
        &self.pin
    }

    /// Does [`NRF24L01::isr`] have to run?
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }
}

impl<P: IrqPin> IrqFlag<P> {
    /// Pin interrupt handler
    ///
    /// Masks the IRQ line until [`NRF24L01::isr`] ran, so a stuck line
    /// cannot flood the interrupt context, and marks the device as pending.
    pub fn on_irq(&self) {
        self.pin.disable_interrupt();
        self.raise();
    }

    pub(crate) fn unmask(&self) {
        self.pin.enable_interrupt();
    }

    /// Clear the pending mark and unmask the line; `true` if it was pending
    pub(crate) fn acknowledge(&self) -> bool {
        let pending = self.pending.swap(false, Ordering::AcqRel);
        self.unmask();
        pending
    }
}

/// Counters of conditions the driver recovered from on its own
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Events lost because the event queue was full
    pub events_dropped: u32,
    /// Frames discarded: invalid payload width, or a buffer too small
    pub frames_dropped: u32,
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
    /// Does [`isr`](Self::isr) have to run?
    pub fn irq_pending(&self) -> bool {
        self.irq.flag().is_pending()
    }

    /// Thread context half of the interrupt handling
    ///
    /// Consumes the mark set by [`IrqFlag::on_irq`], unmasks the IRQ line,
    /// acknowledges all interrupt flags and handles
    /// them in the order RX_DR, MAX_RT, TX_DS. Then either keeps sending
    /// what is left in the TX FIFO or returns to the idle state.
    pub fn isr(&mut self) -> Result<(), Error<SPIE, E>> {
        self.irq.flag().acknowledge();
        let status = self.get_status()?;
        // flags are cleared by writing 1
        self.write_register(status)?;

        if status.rx_dr() {
            crate::log::debug!("ISR RX_DR");
            self.isr_rx_dr()?;
        }
        if status.max_rt() {
            crate::log::debug!("ISR MAX_RT");
            self.flush_tx()?;
            self.push_event(Event::TxNoAck);
        }
        if status.tx_ds() {
            crate::log::debug!("ISR TX_DS");
            self.push_event(Event::TxComplete);
        }

        if self.state.is_transmitting() {
            let (_, fifo_status) = self.read_register::<FifoStatus>()?;
            if !fifo_status.tx_empty() {
                return self.trigger_send();
            }
        }
        self.return_to_idle()
    }

    /// Fetch the next event queued by [`isr`](Self::isr)
    pub fn poll_event(&mut self) -> nb::Result<Event, Infallible> {
        self.events.pop_front().ok_or(nb::Error::WouldBlock)
    }

    /// Counters of dropped events and frames
    pub fn stats(&self) -> Stats {
        self.stats
    }

    fn isr_rx_dr(&mut self) -> Result<(), Error<SPIE, E>> {
        for _ in 0..RX_FIFO_DEPTH {
            let (_, fifo_status) = self.read_register::<FifoStatus>()?;
            if fifo_status.rx_empty() {
                break;
            }
            let mut buf = [0; MAX_FRAME_LEN];
            let len = self.recv(Some(&mut buf))?;
            if len == 0 {
                continue;
            }
            if let Ok(frame) = Frame::from_slice(&buf[..len]) {
                self.push_event(Event::RxComplete(frame));
            }
        }
        Ok(())
    }

    fn push_event(&mut self, event: Event) {
        if self.events.push_back(event).is_err() {
            self.stats.events_dropped += 1;
            crate::log::warn!("event queue full, dropping event");
        }
    }

    fn return_to_idle(&mut self) -> Result<(), Error<SPIE, E>> {
        // already idle: no Standby-I round trip, RX keeps listening
        if self.state == self.idle_state {
            return Ok(());
        }
        self.transition_to_standby_1()?;
        match self.idle_state {
            State::Standby1 => Ok(()),
            State::PowerDown => self.transition_to_power_down(),
            _ => {
                self.idle_state = State::RxMode;
                self.transition_to_rx_mode()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, Pipe};
    use crate::registers::{RX_ADDR_P0, STATUS, TX_ADDR};
    use crate::sim::{self, SimRadio};
    use crate::Tx;

    fn events(radio: &mut SimRadio) -> std::vec::Vec<Event> {
        let mut events = std::vec::Vec::new();
        while let Ok(event) = radio.poll_event() {
            events.push(event);
        }
        events
    }

    #[test]
    fn on_irq_only_masks_and_flags() {
        let (mut radio, chip) = sim::initialized();
        let irq = *radio.irq_handle();
        let before = chip.borrow().transactions();
        irq.on_irq();
        assert!(irq.is_pending());
        assert!(radio.irq_pending());
        assert!(!chip.borrow().irq_enabled());
        assert_eq!(chip.borrow().transactions(), before);

        radio.isr().unwrap();
        assert!(!irq.is_pending());
        assert!(chip.borrow().irq_enabled());
    }

    struct NoPin;

    impl IrqPin for NoPin {
        fn enable_interrupt(&self) {}
        fn disable_interrupt(&self) {}
    }

    static SHARED: IrqFlag<NoPin> = IrqFlag::new(NoPin);

    #[test]
    fn flag_is_raised_from_another_context() {
        std::thread::spawn(|| SHARED.on_irq()).join().unwrap();
        assert!(SHARED.is_pending());
        assert!(SHARED.acknowledge());
        assert!(!SHARED.is_pending());
        assert!(!SHARED.acknowledge());
    }

    #[test]
    fn received_frames_are_queued() {
        let (mut radio, chip) = sim::initialized();
        radio.set_rx_address(Pipe::P1, &[1, 2, 3, 4, 5]).unwrap();
        chip.borrow_mut().receive(1, &[0xAA, 0xBB]);
        chip.borrow_mut().receive(0, &[0xCC]);
        radio.irq_handle().on_irq();
        radio.isr().unwrap();
        assert!(!radio.irq_pending());
        assert!(chip.borrow().irq_enabled());
        assert_eq!(chip.borrow().reg(STATUS) & 0x70, 0);
        let events = events(&mut radio);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            Event::RxComplete(Frame::from_slice(&[1, 2, 3, 4, 5, 0xAA, 0xBB]).unwrap())
        );
        assert_eq!(
            events[1],
            Event::RxComplete(Frame::from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xCC]).unwrap())
        );
        assert_eq!(radio.state(), State::RxMode);
        assert!(radio.poll_event().is_err());
    }

    #[test]
    fn listening_device_stays_in_rx_mode() {
        let (mut radio, chip) = sim::initialized();
        chip.borrow_mut().receive(1, &[1]);
        let ce_edges = chip.borrow().ce_edges();
        radio.isr().unwrap();
        assert_eq!(radio.state(), State::RxMode);
        assert_eq!(chip.borrow().ce_edges(), ce_edges);
    }

    #[test]
    fn tx_complete_returns_to_rx() {
        let (mut radio, chip) = sim::initialized();
        radio.send(&[1, 2, 3, 4, 5], &[&[9, 9]]).unwrap();
        assert_eq!(radio.state(), State::TxMode);
        chip.borrow_mut().complete_tx(true);
        radio.irq_handle().on_irq();
        radio.isr().unwrap();
        assert_eq!(events(&mut radio), [Event::TxComplete]);
        assert_eq!(radio.state(), State::RxMode);
        assert!(chip.borrow().ce());
        assert_eq!(chip.borrow().address(RX_ADDR_P0, 5), [0xFF; 5]);
        assert_eq!(chip.borrow().address(TX_ADDR, 5), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn broadcast_leaves_pipe_0_alone() {
        let (mut radio, chip) = sim::initialized();
        chip.borrow_mut().clear_log();
        radio.send(&[0xFF; 5], &[&[1, 2, 3]]).unwrap();
        chip.borrow_mut().complete_tx(true);
        radio.isr().unwrap();
        assert_eq!(events(&mut radio), [Event::TxComplete]);
        assert_eq!(radio.state(), State::RxMode);
        let chip = chip.borrow();
        // W_REGISTER RX_ADDR_P0 and SETUP_AW
        assert!(!chip.transfers().iter().any(|t| t[0] == 0x2A || t[0] == 0x23));
    }

    #[test]
    fn invalid_width_is_flushed_without_event() {
        for (width, dropped) in [(0, 0), (33, 1)] {
            let (mut radio, chip) = sim::initialized();
            chip.borrow_mut().receive(1, &[1, 2]);
            chip.borrow_mut().force_rx_width(Some(width));
            chip.borrow_mut().clear_log();
            radio.isr().unwrap();
            assert!(chip.borrow().transfers().iter().any(|t| t.as_slice() == [0xE2]));
            assert_eq!(chip.borrow().rx_fifo_len(), 0);
            assert!(radio.poll_event().is_err());
            assert_eq!(radio.stats().frames_dropped, dropped);
            assert_eq!(radio.state(), State::RxMode);
        }
    }

    #[test]
    fn max_rt_flushes_tx_fifo() {
        let (mut radio, chip) = sim::initialized();
        radio.send(&[1, 2, 3, 4, 5], &[&[1]]).unwrap();
        radio.send(&[1, 2, 3, 4, 5], &[&[2]]).unwrap();
        chip.borrow_mut().complete_tx(false);
        radio.isr().unwrap();
        assert_eq!(events(&mut radio), [Event::TxNoAck]);
        assert_eq!(chip.borrow().tx_fifo_len(), 0);
        assert_eq!(radio.state(), State::RxMode);
    }

    #[test]
    fn pending_tx_payload_is_sent_next() {
        let (mut radio, chip) = sim::initialized();
        radio.send(&[1, 2, 3, 4, 5], &[&[1]]).unwrap();
        radio.send(&[1, 2, 3, 4, 5], &[&[2]]).unwrap();
        chip.borrow_mut().complete_tx(true);
        let pulses = chip.borrow().ce_pulses().len();
        radio.isr().unwrap();
        assert_eq!(events(&mut radio), [Event::TxComplete]);
        assert_eq!(radio.state(), State::TxMode);
        assert_eq!(chip.borrow().ce_pulses().len(), pulses + 1);
    }

    #[test]
    fn power_down_idle_state_is_restored() {
        let (mut radio, chip) = sim::initialized();
        radio.set_state(State::PowerDown).unwrap();
        radio.send(&[1, 2, 3, 4, 5], &[&[1]]).unwrap();
        assert_eq!(radio.idle_state(), State::PowerDown);
        chip.borrow_mut().complete_tx(true);
        radio.isr().unwrap();
        assert_eq!(radio.state(), State::PowerDown);
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let (mut radio, chip) = sim::initialized();
        for _ in 0..EVENT_QUEUE_LEN {
            radio.push_event(Event::TxComplete);
        }
        chip.borrow_mut().receive(1, &[1]);
        radio.isr().unwrap();
        assert_eq!(radio.stats().events_dropped, 1);
        assert_eq!(events(&mut radio).len(), EVENT_QUEUE_LEN);
        assert_eq!(chip.borrow().rx_fifo_len(), 0);
    }
}
