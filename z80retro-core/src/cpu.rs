mod reti_monitor;

pub use reti_monitor::RetiMonitor;

/// What the Z80 core sees of the board, every memory and I/O cycle it makes
/// goes through here.
pub trait CpuBusProvider {
    /// Memory read that is not an opcode fetch
    fn read(&mut self, addr: u16) -> u8;

    /// M1 cycle read
    fn fetch_opcode(&mut self, addr: u16) -> u8;

    fn write(&mut self, addr: u16, data: u8);

    fn io_read(&mut self, port: u16) -> u8;

    fn io_write(&mut self, port: u16, data: u8);

    /// The IM2 vector of the interrupt currently asserted, if any
    fn peek_interrupt(&self) -> Option<u8>;

    /// Acknowledges the asserted interrupt and returns its vector
    fn take_interrupt(&mut self) -> Option<u8>;

    /// For cores that can report executing RETI themselves, only used when
    /// [`RetiDetection::CpuSignal`](crate::RetiDetection) is configured
    fn signal_reti(&mut self);
}

/// The instruction interpreter, provided from outside of this crate.
pub trait Z80Cpu {
    /// Execute instructions until at least `tstates` T-states have passed
    fn execute_tstates<B: CpuBusProvider>(&mut self, bus: &mut B, tstates: u32);

    /// HALT with interrupts disabled, nothing can ever wake the CPU up again
    fn is_halted_with_interrupts_disabled(&self) -> bool;

    fn reset(&mut self);
}
