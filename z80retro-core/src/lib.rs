mod cpu;
mod ctc;
mod devices;
mod joystick;
mod memory;
mod rom;
mod save_error;
mod spi;

#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

pub use cpu::{CpuBusProvider, RetiMonitor, Z80Cpu};
pub use ctc::{CounterTimerBank, CtcWriteEffect, CTC_CHANNELS};
pub use devices::{DeviceSlots, SioDevice, SioPort, UartDevice, VideoDevice};
pub use joystick::{JoystickButton, JoystickPort, JOYSTICK_PORTS};
pub use memory::{Bus, InterruptLine, LiveSource, MemoryBanks, UART_VECTOR};
pub use rom::{RomError, RomImage, MAX_ROM_SIZE};
pub use save_error::SaveError;
pub use spi::SpiDevice;

const SAVE_STATE_MAGIC: &[u8; 4] = b"Z2S\x01";
const SAVE_STATE_VERSION: u32 = 1;

/// How the end of an interrupt routine is found, only one is ever active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetiDetection {
    /// Watch the opcode fetches for `ED 4D`
    OpcodeScan,
    /// The CPU core calls [`CpuBusProvider::signal_reti`]
    CpuSignal,
}

impl Default for RetiDetection {
    fn default() -> Self {
        Self::OpcodeScan
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MachineConfig {
    /// T-states executed before the timers catch up, 50 is 5us at 10MHz
    pub tstate_steps: u32,
    /// Execution slices run by [`Z80Retro::clock_for_frame`]
    pub slices_per_frame: u32,
    pub reti_detection: RetiDetection,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            tstate_steps: 50,
            slices_per_frame: 333 * 10,
            reti_detection: RetiDetection::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    /// HALT with interrupts disabled, the machine will never do anything again
    Halted,
}

/// Collects the ROM and the optional chips before the machine is powered on.
pub struct MachineBuilder {
    rom_data: Vec<u8>,
    config: MachineConfig,
    devices: DeviceSlots,
}

impl MachineBuilder {
    pub fn new(rom_data: Vec<u8>) -> Self {
        Self {
            rom_data,
            config: MachineConfig::default(),
            devices: DeviceSlots::default(),
        }
    }

    pub fn from_rom_file<P: AsRef<Path>>(file_path: P) -> Result<Self, RomError> {
        let mut file = File::open(file_path.as_ref())?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        Ok(Self::new(data))
    }

    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sio(mut self, sio: Box<dyn SioDevice>) -> Self {
        self.devices.sio = Some(sio);
        self
    }

    pub fn uart(mut self, uart: Box<dyn UartDevice>) -> Self {
        self.devices.uart = Some(uart);
        self
    }

    pub fn video(mut self, video: Box<dyn VideoDevice>) -> Self {
        self.devices.video = Some(video);
        self
    }

    pub fn storage(mut self, storage: Box<dyn SpiDevice>) -> Self {
        self.devices.storage = Some(storage);
        self
    }

    pub fn build<C: Z80Cpu>(self, mut cpu: C) -> Result<Z80Retro<C>, RomError> {
        let rom = RomImage::new(self.rom_data)?;
        cpu.reset();

        Ok(Z80Retro {
            cpu,
            bus: Bus::new(rom, self.devices, self.config),
        })
    }
}

/// The Z80 Retro board with the given CPU core plugged in.
pub struct Z80Retro<C: Z80Cpu> {
    cpu: C,
    bus: Bus,
}

impl<C: Z80Cpu> Z80Retro<C> {
    /// Run the CPU for one slice then let the timers catch up
    pub fn run_slice(&mut self) {
        let tstates = self.bus.config().tstate_steps;

        self.cpu.execute_tstates(&mut self.bus, tstates);
        self.bus.advance_timers(tstates);
    }

    /// Runs `slices_per_frame` slices, about 1/30 of a second of machine
    /// time with the default config
    pub fn clock_for_frame(&mut self) -> MachineState {
        if self.cpu.is_halted_with_interrupts_disabled() {
            return MachineState::Halted;
        }

        for _ in 0..self.bus.config().slices_per_frame {
            self.run_slice();
        }

        if self.bus.live_source().is_none() {
            self.bus.poll_interrupts();
        }

        MachineState::Running
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
    }

    pub fn press_joystick(&mut self, port: JoystickPort, button: JoystickButton) {
        self.bus.press_joystick(port, button);
    }

    pub fn release_joystick(&mut self, port: JoystickPort, button: JoystickButton) {
        self.bus.release_joystick(port, button);
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// The CPU registers are not part of the state, the core owns them
    pub fn save_state<W: Write>(&self, mut writer: W) -> Result<(), SaveError> {
        writer.write_all(SAVE_STATE_MAGIC)?;
        writer.write_u32::<LittleEndian>(SAVE_STATE_VERSION)?;
        writer.write_all(self.bus.rom().hash())?;

        self.bus.save_state(&mut writer)
    }

    pub fn load_state<R: Read>(&mut self, mut reader: R) -> Result<(), SaveError> {
        let mut magic = [0u8; 4];
        let mut hash = [0u8; 32];

        reader.read_exact(&mut magic)?;
        if &magic != SAVE_STATE_MAGIC {
            return Err(SaveError::InvalidSaveStateHeader);
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != SAVE_STATE_VERSION {
            return Err(SaveError::UnmatchedSaveStateVersion(version));
        }

        reader.read_exact(&mut hash)?;
        if &hash != self.bus.rom().hash() {
            return Err(SaveError::InvalidRomHash);
        }

        self.bus.load_state(&mut reader)
    }
}
