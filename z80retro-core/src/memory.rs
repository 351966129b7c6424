mod banks;
mod interrupts;
mod io_map;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub use banks::MemoryBanks;
pub use interrupts::{InterruptLine, LiveSource, UART_VECTOR};

use crate::cpu::{CpuBusProvider, RetiMonitor};
use crate::ctc::{CounterTimerBank, CtcWriteEffect, CTC_CHANNELS};
use crate::devices::{DeviceSlots, SioDevice, UartDevice, VideoDevice};
use crate::joystick::{JoystickButton, JoystickPort, Joysticks};
use crate::rom::RomImage;
use crate::save_error::SaveError;
use crate::spi::{SpiBitBanger, SpiDevice};
use crate::{MachineConfig, RetiDetection};
use interrupts::{DaisyChain, InterruptArbiter, IrqLatch};
use io_map::{DevicePresence, IoMap, PortDevice};

bitflags! {
    #[derive(Default, Serialize, Deserialize)]
    struct GpioOut: u8 {
        const BANK           = 0xF0;
        const PRINTER_STROBE = 1 << 3;
        const SD_CHIP_SELECT = 1 << 2;
        const SPI_CLOCK      = 1 << 1;
        const SPI_DATA_OUT   = 1 << 0;
    }
}

/// GPIO input bit 6, the card pulls it down while inserted
const GPIO_IN_SD_DETECT: u8 = 1 << 6;
/// GPIO input bit 7, SPI data in
const GPIO_IN_SPI_DATA_IN: u8 = 1 << 7;

/// Everything in a save state, in order
type SavedBoard = (
    MemoryBanks,
    GpioOut,
    SpiBitBanger,
    CounterTimerBank,
    InterruptArbiter,
    IrqLatch,
    RetiMonitor,
);

/// Catches decoded states that would index out of bounds later on
fn is_reachable_state(
    banks: &MemoryBanks,
    spi: &SpiBitBanger,
    arbiter: &InterruptArbiter,
) -> bool {
    let live_ctc_in_range = match arbiter.live_source() {
        Some(LiveSource::Ctc(channel)) => channel < CTC_CHANNELS,
        _ => true,
    };

    banks.has_full_ram() && spi.pending_bits() < 8 && live_ctc_in_range
}

fn attached(slot: &mut Option<Box<dyn SpiDevice>>) -> Option<&mut dyn SpiDevice> {
    match slot {
        Some(device) => Some(&mut **device),
        None => None,
    }
}

pub struct Bus {
    rom: RomImage,
    banks: MemoryBanks,
    gpio_out: GpioOut,
    spi: SpiBitBanger,
    ctc: CounterTimerBank,
    arbiter: InterruptArbiter,
    irq_latch: IrqLatch,
    reti_monitor: RetiMonitor,
    joysticks: Joysticks,

    io_map: IoMap,
    sio: Option<Box<dyn SioDevice>>,
    uart: Option<Box<dyn UartDevice>>,
    video: Option<Box<dyn VideoDevice>>,
    storage: Option<Box<dyn SpiDevice>>,

    config: MachineConfig,
}

impl Bus {
    pub fn new(rom: RomImage, devices: DeviceSlots, config: MachineConfig) -> Self {
        let io_map = IoMap::new(DevicePresence {
            sio: devices.sio.is_some(),
            uart: devices.uart.is_some(),
            video: devices.video.is_some(),
        });

        Self {
            rom,
            banks: MemoryBanks::default(),
            gpio_out: GpioOut::default(),
            spi: SpiBitBanger::default(),
            ctc: CounterTimerBank::default(),
            arbiter: InterruptArbiter::default(),
            irq_latch: IrqLatch::default(),
            reti_monitor: RetiMonitor::default(),
            joysticks: Joysticks::default(),

            io_map,
            sio: devices.sio,
            uart: devices.uart,
            video: devices.video,
            storage: devices.storage,

            config,
        }
    }

    /// Back to the power on state, RAM keeps its contents
    pub fn reset(&mut self) {
        self.banks.reset();
        self.gpio_out = GpioOut::default();
        self.spi.reset();
        self.ctc.reset();
        self.arbiter.reset();
        self.irq_latch.reset();
        self.reti_monitor.reset();
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn rom(&self) -> &RomImage {
        &self.rom
    }

    pub fn banks(&self) -> &MemoryBanks {
        &self.banks
    }

    pub fn ctc(&self) -> &CounterTimerBank {
        &self.ctc
    }

    /// The interrupt source currently being serviced
    pub fn live_source(&self) -> Option<LiveSource> {
        self.arbiter.live_source()
    }

    pub fn press_joystick(&mut self, port: JoystickPort, button: JoystickButton) {
        self.joysticks.press(port, button);
    }

    pub fn release_joystick(&mut self, port: JoystickPort, button: JoystickButton) {
        self.joysticks.release(port, button);
    }

    /// Time passing outside of the CPU, called after every execution slice
    /// with the same number of T-states
    pub fn advance_timers(&mut self, tstates: u32) {
        self.ctc.advance(tstates);
        if let Some(sio) = self.sio.as_mut() {
            sio.timer();
        }
    }

    pub fn poll_interrupts(&mut self) {
        let mut chain = DaisyChain {
            sio: &mut self.sio,
            ctc: &mut self.ctc,
            uart: &self.uart,
            line: &mut self.irq_latch,
        };
        self.arbiter.poll(&mut chain);
    }

    pub(crate) fn save_state<W: std::io::Write>(&self, writer: W) -> Result<(), SaveError> {
        bincode::serialize_into(
            writer,
            &(
                &self.banks,
                &self.gpio_out,
                &self.spi,
                &self.ctc,
                &self.arbiter,
                &self.irq_latch,
                &self.reti_monitor,
            ),
        )?;

        Ok(())
    }

    /// Nothing is changed if the state could not be read completely or is
    /// not one the board can be in
    pub(crate) fn load_state<R: std::io::Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let (banks, gpio_out, spi, ctc, arbiter, irq_latch, reti_monitor): SavedBoard =
            bincode::deserialize_from(reader)?;

        if !is_reachable_state(&banks, &spi, &arbiter) {
            return Err(SaveError::InvalidSaveStateData);
        }

        self.banks = banks;
        self.gpio_out = gpio_out;
        self.spi = spi;
        self.ctc = ctc;
        self.arbiter = arbiter;
        self.irq_latch = irq_latch;
        self.reti_monitor = reti_monitor;

        Ok(())
    }
}

impl Bus {
    fn on_reti(&mut self) {
        log::trace!("RETI, {:?} was in service", self.arbiter.live_source());
        let mut chain = DaisyChain {
            sio: &mut self.sio,
            ctc: &mut self.ctc,
            uart: &self.uart,
            line: &mut self.irq_latch,
        };
        self.arbiter.on_reti(&mut chain);
    }

    fn observe_read(&mut self, data: u8, m1: bool) {
        if self.config.reti_detection == RetiDetection::OpcodeScan
            && self.reti_monitor.observe(data, m1)
        {
            self.on_reti();
        }
    }

    fn read_gpio_in(&self) -> u8 {
        // bits 0-5 are floating
        let mut result = !GPIO_IN_SPI_DATA_IN;

        if self.spi.data_in() {
            result |= GPIO_IN_SPI_DATA_IN;
        }
        if self.storage.is_some() {
            result &= !GPIO_IN_SD_DETECT;
        }

        result
    }

    fn write_gpio_out(&mut self, data: u8) {
        let new = GpioOut::from_bits_truncate(data);
        let delta = self.gpio_out ^ new;
        self.gpio_out = new;

        self.banks.set_bank_select(data);
        if delta.intersects(GpioOut::BANK) {
            log::debug!("bank: {}", data >> 4);
        }

        if delta.contains(GpioOut::SD_CHIP_SELECT) {
            self.spi.chip_select(
                new.contains(GpioOut::SD_CHIP_SELECT),
                attached(&mut self.storage),
            );
        }

        if delta.contains(GpioOut::SPI_CLOCK) {
            if new.contains(GpioOut::SPI_CLOCK) {
                self.spi.clock_high(
                    new.contains(GpioOut::SPI_DATA_OUT),
                    attached(&mut self.storage),
                );
            } else {
                self.spi.clock_low();
            }
        }
    }

    fn read_io(&mut self, port: u16) -> u8 {
        match self.io_map.read_device(port) {
            PortDevice::GpioIn => self.read_gpio_in(),
            PortDevice::Sio(sio_port) => self.sio.as_mut().map_or(0xFF, |sio| sio.read(sio_port)),
            PortDevice::Ctc(channel) => self.ctc.read(channel),
            PortDevice::Uart(reg) => self.uart.as_mut().map_or(0xFF, |uart| uart.read(reg)),
            PortDevice::BootOverlayOff => {
                self.banks.disable_boot_overlay();
                0xFF
            }
            PortDevice::Video(reg) => self.video.as_mut().map_or(0xFF, |video| video.read(reg)),
            PortDevice::Joystick(joystick) => {
                let video_irq = self
                    .video
                    .as_ref()
                    .map_or(false, |video| video.irq_pending());
                self.joysticks.read(joystick, video_irq)
            }
            PortDevice::GpioOut | PortDevice::Printer | PortDevice::Unmapped => {
                log::trace!("Unknown read from port {:04X}", port);
                // the data bus has pull ups
                0xFF
            }
        }
    }

    fn write_io(&mut self, port: u16, data: u8) {
        match self.io_map.write_device(port) {
            PortDevice::GpioOut => self.write_gpio_out(data),
            PortDevice::Printer => log::trace!("printer data {:02X}", data),
            PortDevice::Sio(sio_port) => {
                if let Some(sio) = self.sio.as_mut() {
                    sio.write(sio_port, data);
                }
            }
            PortDevice::Ctc(channel) => {
                if let CtcWriteEffect::InterruptWithdrawn(channel) = self.ctc.write(channel, data)
                {
                    self.arbiter.release(LiveSource::Ctc(channel));
                }
            }
            PortDevice::Uart(reg) => {
                if let Some(uart) = self.uart.as_mut() {
                    uart.write(reg, data);
                }
            }
            PortDevice::BootOverlayOff => self.banks.disable_boot_overlay(),
            PortDevice::Video(reg) => {
                if let Some(video) = self.video.as_mut() {
                    video.write(reg, data);
                }
            }
            PortDevice::GpioIn | PortDevice::Joystick(_) | PortDevice::Unmapped => {
                log::trace!("Unknown write to port {:04X} of {:02X}", port, data);
            }
        }
    }
}

impl CpuBusProvider for Bus {
    fn read(&mut self, addr: u16) -> u8 {
        let result = self.banks.read(&self.rom, addr);
        self.observe_read(result, false);
        result
    }

    fn fetch_opcode(&mut self, addr: u16) -> u8 {
        let result = self.banks.read(&self.rom, addr);
        self.observe_read(result, true);
        result
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.banks.write(addr, data);
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.read_io(port)
    }

    fn io_write(&mut self, port: u16, data: u8) {
        self.write_io(port, data);
    }

    fn peek_interrupt(&self) -> Option<u8> {
        self.irq_latch.peek()
    }

    fn take_interrupt(&mut self) -> Option<u8> {
        self.irq_latch.take()
    }

    fn signal_reti(&mut self) {
        match self.config.reti_detection {
            RetiDetection::CpuSignal => self.on_reti(),
            RetiDetection::OpcodeScan => {
                log::warn!("RETI signal ignored, RETI is detected from the opcode stream")
            }
        }
    }
}
