#![cfg(test)]

use super::{
    CpuBusProvider, MachineBuilder, MachineConfig, SioDevice, SioPort, SpiDevice, UartDevice,
    VideoDevice, Z80Cpu, Z80Retro,
};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

macro_rules! unmapped_port_tests {
    ($($test_name: ident, $fitted: expr, [$($port: expr),* $(,)?];)*) => {
        $(
            /// Every listed port reads as the bus pull ups and ignores writes
            #[test]
            fn $test_name() {
                let mut machine = crate::tests::TestingMachine::new(
                    crate::tests::rom_with(&[]),
                    $fitted,
                    crate::MachineConfig::default(),
                );

                $(
                    machine.io_write($port, 0x00);
                    assert_eq!(machine.io_read($port), 0xFF, "port {:02X}", $port);
                )*
            }
        )*
    };
}


pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 16K of NOPs with `program` at address 0
pub fn rom_with(program: &[u8]) -> Vec<u8> {
    let mut data = vec![0; 0x4000];
    data[..program.len()].copy_from_slice(program);
    data
}

#[derive(Clone, Copy, Debug)]
pub enum BusOp {
    Fetch(u16),
    Read(u16),
    Write(u16, u8),
    In(u16),
    Out(u16, u8),
    TakeInterrupt,
    SignalReti,
}

/// Stands in for the Z80 core, every slice performs the next batch of bus
/// cycles from its script, if any.
#[derive(Default)]
pub struct ScriptedCpu {
    script: VecDeque<Vec<BusOp>>,
    pub reads: Vec<u8>,
    pub vectors: Vec<u8>,
    pub slices: u32,
    pub tstates: u64,
    pub halted_with_di: bool,
    pub resets: u32,
}

impl ScriptedCpu {
    pub fn push_slice(&mut self, ops: &[BusOp]) {
        self.script.push_back(ops.to_vec());
    }
}

impl Z80Cpu for ScriptedCpu {
    fn execute_tstates<B: CpuBusProvider>(&mut self, bus: &mut B, tstates: u32) {
        self.slices += 1;
        self.tstates += tstates as u64;

        if let Some(ops) = self.script.pop_front() {
            for op in ops {
                match op {
                    BusOp::Fetch(addr) => {
                        let data = bus.fetch_opcode(addr);
                        self.reads.push(data);
                    }
                    BusOp::Read(addr) => {
                        let data = bus.read(addr);
                        self.reads.push(data);
                    }
                    BusOp::Write(addr, data) => bus.write(addr, data),
                    BusOp::In(port) => {
                        let data = bus.io_read(port);
                        self.reads.push(data);
                    }
                    BusOp::Out(port, data) => bus.io_write(port, data),
                    BusOp::TakeInterrupt => {
                        if let Some(vector) = bus.take_interrupt() {
                            self.vectors.push(vector);
                        }
                    }
                    BusOp::SignalReti => bus.signal_reti(),
                }
            }
        }
    }

    fn is_halted_with_interrupts_disabled(&self) -> bool {
        self.halted_with_di
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.halted_with_di = false;
    }
}

#[derive(Default)]
pub struct SioState {
    pub vector: Option<u8>,
    pub retis: u32,
    pub ticks: u32,
    pub reads: Vec<SioPort>,
    pub writes: Vec<(SioPort, u8)>,
}

pub struct MockSio(Rc<RefCell<SioState>>);

impl SioDevice for MockSio {
    fn read(&mut self, port: SioPort) -> u8 {
        self.0.borrow_mut().reads.push(port);
        0x5A
    }

    fn write(&mut self, port: SioPort, data: u8) {
        self.0.borrow_mut().writes.push((port, data));
    }

    fn check_im2(&mut self) -> Option<u8> {
        self.0.borrow().vector
    }

    fn reti(&mut self) {
        let mut state = self.0.borrow_mut();
        state.retis += 1;
        state.vector = None;
    }

    fn timer(&mut self) {
        self.0.borrow_mut().ticks += 1;
    }
}

/// Register file shared by the UART and video mocks
#[derive(Default)]
pub struct ChipState {
    pub irq: bool,
    pub registers: [u8; 8],
    pub writes: Vec<(u8, u8)>,
}

pub struct MockChip(Rc<RefCell<ChipState>>);

impl MockChip {
    fn read_reg(&mut self, reg: u8) -> u8 {
        self.0.borrow().registers[reg as usize]
    }

    fn write_reg(&mut self, reg: u8, data: u8) {
        let mut state = self.0.borrow_mut();
        state.registers[reg as usize] = data;
        state.writes.push((reg, data));
    }
}

impl UartDevice for MockChip {
    fn read(&mut self, reg: u8) -> u8 {
        self.read_reg(reg)
    }

    fn write(&mut self, reg: u8, data: u8) {
        self.write_reg(reg, data);
    }

    fn irq_pending(&self) -> bool {
        self.0.borrow().irq
    }
}

impl VideoDevice for MockChip {
    fn read(&mut self, reg: u8) -> u8 {
        self.read_reg(reg)
    }

    fn write(&mut self, reg: u8, data: u8) {
        self.write_reg(reg, data);
    }

    fn irq_pending(&self) -> bool {
        self.0.borrow().irq
    }
}

#[derive(Default)]
pub struct CardState {
    pub selected: bool,
    pub received: Vec<u8>,
    pub reply: u8,
}

pub struct MockCard(Rc<RefCell<CardState>>);

impl SpiDevice for MockCard {
    fn exchange(&mut self, byte: u8) -> u8 {
        let mut state = self.0.borrow_mut();
        state.received.push(byte);
        state.reply
    }

    fn select(&mut self) {
        self.0.borrow_mut().selected = true;
    }

    fn deselect(&mut self) {
        self.0.borrow_mut().selected = false;
    }
}

/// Which optional chips are plugged in
#[derive(Clone, Copy)]
pub struct Fitted {
    pub sio: bool,
    pub uart: bool,
    pub video: bool,
    pub storage: bool,
}

impl Fitted {
    pub const NONE: Self = Self {
        sio: false,
        uart: false,
        video: false,
        storage: false,
    };

    pub const ALL: Self = Self {
        sio: true,
        uart: true,
        video: true,
        storage: true,
    };
}

pub struct TestingMachine {
    machine: Z80Retro<ScriptedCpu>,
    pub sio: Rc<RefCell<SioState>>,
    pub uart: Rc<RefCell<ChipState>>,
    pub video: Rc<RefCell<ChipState>>,
    pub card: Rc<RefCell<CardState>>,
}

impl TestingMachine {
    pub fn new(rom: Vec<u8>, fitted: Fitted, config: MachineConfig) -> Self {
        init_logger();

        let sio = Rc::new(RefCell::new(SioState::default()));
        let uart = Rc::new(RefCell::new(ChipState::default()));
        let video = Rc::new(RefCell::new(ChipState::default()));
        let card = Rc::new(RefCell::new(CardState::default()));

        let mut builder = MachineBuilder::new(rom).config(config);
        if fitted.sio {
            builder = builder.sio(Box::new(MockSio(sio.clone())));
        }
        if fitted.uart {
            builder = builder.uart(Box::new(MockChip(uart.clone())));
        }
        if fitted.video {
            builder = builder.video(Box::new(MockChip(video.clone())));
        }
        if fitted.storage {
            builder = builder.storage(Box::new(MockCard(card.clone())));
        }

        Self {
            machine: builder.build(ScriptedCpu::default()).unwrap(),
            sio,
            uart,
            video,
            card,
        }
    }

    pub fn fully_fitted() -> Self {
        Self::new(rom_with(&[]), Fitted::ALL, MachineConfig::default())
    }

    /// Runs one slice performing `ops`
    pub fn run_ops(&mut self, ops: &[BusOp]) {
        self.machine.cpu_mut().push_slice(ops);
        self.machine.run_slice();
    }

    pub fn io_read(&mut self, port: u16) -> u8 {
        self.machine.bus_mut().io_read(port)
    }

    pub fn io_write(&mut self, port: u16, data: u8) {
        self.machine.bus_mut().io_write(port, data);
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        self.machine.bus_mut().read(addr)
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        self.machine.bus_mut().write(addr, data);
    }

    pub fn pending_vector(&self) -> Option<u8> {
        self.machine.bus().peek_interrupt()
    }
}

impl Deref for TestingMachine {
    type Target = Z80Retro<ScriptedCpu>;

    fn deref(&self) -> &Self::Target {
        &self.machine
    }
}

impl DerefMut for TestingMachine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.machine
    }
}
