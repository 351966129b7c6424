use serde::{Deserialize, Serialize};

use crate::ctc::CounterTimerBank;
use crate::devices::{SioDevice, UartDevice};

/// The UART is not on the daisy chain, its interrupt is delivered with this
/// vector and nobody waits for its RETI
pub const UART_VECTOR: u8 = 0xFF;

/// Where an accepted vector goes, the CPU's interrupt input
pub trait InterruptLine {
    fn inject(&mut self, vector: u8);
}

/// Holds the vector on the bus until the CPU takes it.
#[derive(Default, Serialize, Deserialize)]
pub struct IrqLatch {
    vector: Option<u8>,
}

impl IrqLatch {
    pub fn peek(&self) -> Option<u8> {
        self.vector
    }

    pub fn take(&mut self) -> Option<u8> {
        self.vector.take()
    }

    pub fn reset(&mut self) {
        self.vector = None;
    }
}

impl InterruptLine for IrqLatch {
    fn inject(&mut self, vector: u8) {
        if let Some(old) = self.vector {
            log::trace!("vector {:02X} replaced before being taken", old);
        }
        self.vector = Some(vector);
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LiveSource {
    Sio,
    Ctc(usize),
}

/// The devices taking part in one arbitration, in priority order
pub struct DaisyChain<'a> {
    pub sio: &'a mut Option<Box<dyn SioDevice>>,
    pub ctc: &'a mut CounterTimerBank,
    pub uart: &'a Option<Box<dyn UartDevice>>,
    pub line: &'a mut dyn InterruptLine,
}

/// Emulates the IEI/IEO chain: only one device can be in service, and
/// nothing else is accepted until its routine returns with RETI.
#[derive(Default, Serialize, Deserialize)]
pub struct InterruptArbiter {
    live: Option<LiveSource>,
}

impl InterruptArbiter {
    pub fn poll(&mut self, chain: &mut DaisyChain) {
        if self.live.is_some() {
            return;
        }

        if let Some(sio) = chain.sio.as_mut() {
            if let Some(vector) = sio.check_im2() {
                log::trace!("SIO interrupt, vector {:02X}", vector);
                self.live = Some(LiveSource::Sio);
                chain.line.inject(vector);
                return;
            }
        }

        if let Some((channel, vector)) = chain.ctc.pending_interrupt() {
            log::trace!("CTC {} interrupt, vector {:02X}", channel, vector);
            self.live = Some(LiveSource::Ctc(channel));
            chain.line.inject(vector);
            return;
        }

        if let Some(uart) = chain.uart {
            if uart.irq_pending() {
                log::trace!("UART interrupt");
                chain.line.inject(UART_VECTOR);
            }
        }
    }

    /// RETI seen, finish the live source and let the next one in
    pub fn on_reti(&mut self, chain: &mut DaisyChain) {
        match self.live.take() {
            Some(LiveSource::Sio) => {
                if let Some(sio) = chain.sio.as_mut() {
                    sio.reti();
                }
            }
            Some(LiveSource::Ctc(channel)) => chain.ctc.acknowledge(channel),
            None => log::trace!("RETI with nothing in service"),
        }

        self.poll(chain);
    }

    /// Forget `source` if it is in service, used when a device drops its
    /// request on its own
    pub fn release(&mut self, source: LiveSource) {
        if self.live == Some(source) {
            log::trace!("{:?} released without RETI", source);
            self.live = None;
        }
    }

    pub fn live_source(&self) -> Option<LiveSource> {
        self.live
    }

    pub fn reset(&mut self) {
        self.live = None;
    }
}
