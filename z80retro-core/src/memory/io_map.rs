use crate::devices::SioPort;
use crate::joystick::JoystickPort;

/// What sits behind an I/O port, after decoding
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PortDevice {
    Unmapped,
    GpioIn,
    GpioOut,
    Printer,
    Sio(SioPort),
    Ctc(usize),
    Uart(u8),
    BootOverlayOff,
    Video(u8),
    Joystick(JoystickPort),
}

/// The optional boards plugged in, fixed for the life of the machine
#[derive(Copy, Clone, Default, Debug)]
pub struct DevicePresence {
    pub sio: bool,
    pub uart: bool,
    pub video: bool,
}

/// Port decoding, done once for all 256 ports in each direction.
///
/// Only the low 8 address bits are decoded on the board, the upper half of
/// the port address (B register for `IN r,(C)`) is ignored.
pub struct IoMap {
    read: [PortDevice; 256],
    write: [PortDevice; 256],
}

impl IoMap {
    pub fn new(present: DevicePresence) -> Self {
        let mut read = [PortDevice::Unmapped; 256];
        let mut write = [PortDevice::Unmapped; 256];

        for port in 0..=0xFFu8 {
            read[port as usize] = decode_read(port, present);
            write[port as usize] = decode_write(port, present);
        }

        Self { read, write }
    }

    #[inline]
    pub fn read_device(&self, port: u16) -> PortDevice {
        self.read[port as usize & 0xFF]
    }

    #[inline]
    pub fn write_device(&self, port: u16) -> PortDevice {
        self.write[port as usize & 0xFF]
    }
}

fn decode_shared(port: u8, present: DevicePresence) -> PortDevice {
    match port & 0xF0 {
        0x30 if present.sio => PortDevice::Sio(SioPort::from_address(port)),
        0x40 => PortDevice::Ctc(port as usize & 3),
        0x50 if present.uart && port & 8 != 0 => PortDevice::Uart(port & 7),
        0x70 => PortDevice::BootOverlayOff,
        0x80 if present.video => PortDevice::Video(port & 1),
        _ => PortDevice::Unmapped,
    }
}

fn decode_read(port: u8, present: DevicePresence) -> PortDevice {
    match port {
        0x00..=0x0F => PortDevice::GpioIn,
        0xA8 if present.video => PortDevice::Joystick(JoystickPort::Zero),
        0xA9 if present.video => PortDevice::Joystick(JoystickPort::One),
        _ => decode_shared(port, present),
    }
}

fn decode_write(port: u8, present: DevicePresence) -> PortDevice {
    match port & 0xF0 {
        0x10 => PortDevice::GpioOut,
        0x20 => PortDevice::Printer,
        _ => decode_shared(port, present),
    }
}
