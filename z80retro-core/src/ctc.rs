use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub const CTC_CHANNELS: usize = 4;

bitflags! {
    #[derive(Default, Serialize, Deserialize)]
    struct ChannelControl: u8 {
        const INTERRUPT     = 1 << 7;
        const COUNTER_MODE  = 1 << 6;
        const PRESCALER_256 = 1 << 5;
        const RISING_EDGE   = 1 << 4;
        const PULSE_TRIGGER = 1 << 3;
        const TIME_CONSTANT = 1 << 2;
        const RESET         = 1 << 1;
        const CONTROL       = 1 << 0;
    }
}

impl ChannelControl {
    /// Waiting for a time constant after a reset
    fn stopped(&self) -> bool {
        self.contains(Self::TIME_CONSTANT | Self::RESET)
    }

    fn interrupt_enabled(&self) -> bool {
        self.contains(Self::INTERRUPT)
    }

    fn counter_mode(&self) -> bool {
        self.contains(Self::COUNTER_MODE)
    }

    /// How much faster than the 256 prescaler the channel is counting
    fn prescaler_shift(&self) -> u32 {
        if self.contains(Self::PRESCALER_256) {
            0
        } else {
            4
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CtcChannel {
    /// Remaining count scaled by 256, the low byte carries the prescaler
    /// progress between ticks
    count: u16,
    /// 0 means 256
    reload: u8,
    /// Only meaningful on channel 0
    vector: u8,
    control: ChannelControl,
    interrupt_pending: bool,
    terminal_counts: u64,
}

impl Default for CtcChannel {
    fn default() -> Self {
        Self {
            count: 0,
            reload: 0,
            vector: 0,
            control: ChannelControl::RESET,
            interrupt_pending: false,
            terminal_counts: 0,
        }
    }
}

impl CtcChannel {
    fn reload_value(&self) -> i64 {
        if self.reload == 0 {
            256
        } else {
            self.reload as i64
        }
    }

    fn reload_count(&mut self) {
        self.count = ((self.reload_value() - 1) << 8) as u16;
    }
}

/// What a register write did that the rest of the bus must know about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum CtcWriteEffect {
    None,
    /// A pending interrupt of this channel was dropped by disabling its
    /// interrupt, if it was being serviced the daisy chain must let it go
    InterruptWithdrawn(usize),
}

/// Z80 CTC, four down counters sharing one interrupt vector base.
///
/// Only timer mode is clocked, counter mode channels would be fed by pulses
/// from the CLK/TRG pins which are not wired to anything we emulate.
#[derive(Default, Serialize, Deserialize)]
pub struct CounterTimerBank {
    channels: [CtcChannel; CTC_CHANNELS],
}

impl CounterTimerBank {
    pub fn reset(&mut self) {
        for channel in self.channels.iter_mut() {
            *channel = CtcChannel::default();
        }
    }

    pub fn read(&self, channel: usize) -> u8 {
        let value = (self.channels[channel].count >> 8) as u8;
        log::trace!("CTC {} reads {:02X}", channel, value);
        value
    }

    pub fn write(&mut self, channel: usize, data: u8) -> CtcWriteEffect {
        let c = &mut self.channels[channel];

        if c.control.contains(ChannelControl::TIME_CONSTANT) {
            log::debug!("CTC {} constant loaded with {:02X}", channel, data);
            c.reload = data;
            if c.control.stopped() {
                c.reload_count();
                log::debug!("CTC {} constant reloaded with {:02X}", channel, data);
            }
            // the reset bit is kept, so the channel starts counting from here
            c.control.remove(ChannelControl::TIME_CONSTANT);

            CtcWriteEffect::None
        } else if data & ChannelControl::CONTROL.bits() != 0 {
            // TODO: model the trigger edge/clock start rules of timer mode
            //  with `PULSE_TRIGGER`, for now the channel starts right away
            log::debug!("CTC {} control loaded with {:02X}", channel, data);
            c.control = ChannelControl::from_bits_truncate(data);

            if c.control & (ChannelControl::TIME_CONSTANT | ChannelControl::RESET)
                == ChannelControl::RESET
            {
                c.reload_count();
                log::debug!("CTC {} reloaded with {:02X}", channel, c.reload);
            }

            // Undocumented: dropping the interrupt enable also drops a pending
            // interrupt of that channel
            if !c.control.interrupt_enabled() && c.interrupt_pending {
                c.interrupt_pending = false;
                log::trace!("CTC {} irq reset", channel);
                CtcWriteEffect::InterruptWithdrawn(channel)
            } else {
                CtcWriteEffect::None
            }
        } else {
            log::debug!("CTC {} vector loaded with {:02X}", channel, data);
            // only channel 0 holds the vector
            if channel == 0 {
                c.vector = data;
            }

            CtcWriteEffect::None
        }
    }

    /// Clocks all the timers by `clocks` CPU clocks, the count is kept
    /// downscaled by 256, so 16 prescaler channels count 16 times faster.
    pub fn advance(&mut self, clocks: u32) {
        for i in 0..CTC_CHANNELS {
            let c = &self.channels[i];
            if c.control.stopped() || c.control.counter_mode() {
                continue;
            }

            let decrement = (clocks as i64) << c.control.prescaler_shift();
            let mut n = c.count as i64 - decrement;

            // a big step can wrap more than once, every wrap is an event
            while n < 0 {
                self.terminal_count(i);
                n += self.channels[i].reload_value() << 8;
            }

            self.channels[i].count = n as u16;
        }
    }

    /// The highest priority channel waiting to be serviced and its vector
    pub fn pending_interrupt(&self) -> Option<(usize, u8)> {
        self.channels
            .iter()
            .position(|c| c.interrupt_pending)
            .map(|i| (i, (self.channels[0].vector & 0xF8) + 2 * i as u8))
    }

    pub fn interrupt_pending(&self, channel: usize) -> bool {
        self.channels[channel].interrupt_pending
    }

    /// Service of this channel's interrupt finished (RETI)
    pub fn acknowledge(&mut self, channel: usize) {
        let c = &mut self.channels[channel];
        if c.interrupt_pending {
            c.interrupt_pending = false;
            log::trace!("Acked interrupt from CTC {}", channel);
        }
    }

    /// Number of zero crossings since reset
    pub fn terminal_counts(&self, channel: usize) -> u64 {
        self.channels[channel].terminal_counts
    }
}

impl CounterTimerBank {
    fn terminal_count(&mut self, channel: usize) {
        let c = &mut self.channels[channel];
        c.terminal_counts = c.terminal_counts.wrapping_add(1);

        if c.control.interrupt_enabled() && !c.interrupt_pending {
            c.interrupt_pending = true;
            log::trace!("CTC {} wants to interrupt", channel);
        }

        self.zc_pulse(channel);
    }

    /// ZC/TO output of a channel, on the board these are not chained into
    /// the next channel's CLK/TRG, so nothing receives the pulse
    fn zc_pulse(&mut self, _channel: usize) {}
}
