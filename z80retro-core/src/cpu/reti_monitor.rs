use serde::{Deserialize, Serialize};

const PREFIX_IX: u8 = 0xDD;
const PREFIX_IY: u8 = 0xFD;
const PREFIX_BITS: u8 = 0xCB;
const PREFIX_EXTENDED: u8 = 0xED;
const RETI_OPCODE: u8 = 0x4D;

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
enum ScanState {
    Idle,
    /// An `ED` was fetched at the start of an instruction
    Extended,
    /// `DD`, `FD` or `CB` was fetched, an `ED` right after is part of the
    /// same instruction and does not start a RETI
    Prefixed,
}

impl Default for ScanState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Spots `ED 4D` (RETI) in the stream of CPU reads.
///
/// The Z80 peripherals find out an interrupt routine finished by snooping
/// the data bus for RETI, the CPU core does not tell us, so we do the same.
/// See the Z80 family interrupt application note for the prefix rules.
#[derive(Default, Serialize, Deserialize)]
pub struct RetiMonitor {
    state: ScanState,
}

impl RetiMonitor {
    /// Feed one memory read, `m1` is set for opcode fetches.
    ///
    /// Returns `true` when a RETI has just been fetched.
    pub fn observe(&mut self, byte: u8, m1: bool) -> bool {
        if m1 {
            match byte {
                PREFIX_IX | PREFIX_IY | PREFIX_BITS => {
                    self.state = ScanState::Prefixed;
                    return false;
                }
                PREFIX_EXTENDED if self.state == ScanState::Idle => {
                    self.state = ScanState::Extended;
                    return false;
                }
                _ => {}
            }
        }

        let reti = byte == RETI_OPCODE && self.state == ScanState::Extended;
        if reti {
            log::trace!("RETI fetched");
        }

        self.state = ScanState::Idle;
        reti
    }

    pub fn reset(&mut self) {
        self.state = ScanState::Idle;
    }
}
