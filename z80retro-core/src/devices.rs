//! Chips on the board that are emulated outside of this crate, they are
//! plugged into the bus at startup and stay there.

/// Registers of the Z80 SIO/2, A0 picks the channel and A1 data/control
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SioPort {
    ChannelAData,
    ChannelBData,
    ChannelAControl,
    ChannelBControl,
}

impl SioPort {
    pub fn from_address(addr: u8) -> Self {
        match addr & 3 {
            0 => Self::ChannelAData,
            1 => Self::ChannelBData,
            2 => Self::ChannelAControl,
            _ => Self::ChannelBControl,
        }
    }
}

/// The SIO is the head of the interrupt daisy chain.
pub trait SioDevice {
    fn read(&mut self, port: SioPort) -> u8;

    fn write(&mut self, port: SioPort, data: u8);

    /// The vector the SIO would put on the bus if it is requesting an
    /// interrupt, `None` if it is not
    fn check_im2(&mut self) -> Option<u8>;

    /// RETI was executed while the SIO interrupt was being serviced
    fn reti(&mut self);

    /// Called once per execution slice, for baud rate timing and polling
    /// the attached terminals
    fn timer(&mut self) {}
}

/// Optional 16x50 UART, it does not take part in the IM2 daisy chain.
pub trait UartDevice {
    /// `reg` is 0-7
    fn read(&mut self, reg: u8) -> u8;

    fn write(&mut self, reg: u8, data: u8);

    fn irq_pending(&self) -> bool;
}

/// Optional TMS9918A video card, its interrupt line is only visible through
/// the joystick port.
pub trait VideoDevice {
    /// `reg` is 0 for data and 1 for control
    fn read(&mut self, reg: u8) -> u8;

    fn write(&mut self, reg: u8, data: u8);

    fn irq_pending(&self) -> bool;
}

/// The optional chips a machine is built with
#[derive(Default)]
pub struct DeviceSlots {
    pub sio: Option<Box<dyn SioDevice>>,
    pub uart: Option<Box<dyn UartDevice>>,
    pub video: Option<Box<dyn VideoDevice>>,
    /// SD card on the bit-banged SPI port
    pub storage: Option<Box<dyn crate::spi::SpiDevice>>,
}
