use bitflags::bitflags;

use std::convert::From;

pub const JOYSTICK_PORTS: usize = 2;

/// Port 0 is `0xA8`, port 1 is `0xA9`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoystickPort {
    Zero,
    One,
}

impl JoystickPort {
    fn index(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

pub enum JoystickButton {
    Up,
    Down,
    Left,
    Right,
    Fire,
    Fire2,
}

bitflags! {
    #[derive(Default)]
    struct JoystickButtons: u8 {
        const UP    = 1 << 0;
        // bit 1 is the video interrupt line on port 0
        const DOWN  = 1 << 2;
        const LEFT  = 1 << 3;
        const RIGHT = 1 << 4;
        const FIRE  = 1 << 5;
        const FIRE2 = 1 << 6;
    }
}

impl From<JoystickButton> for JoystickButtons {
    fn from(button: JoystickButton) -> Self {
        match button {
            JoystickButton::Up => Self::UP,
            JoystickButton::Down => Self::DOWN,
            JoystickButton::Left => Self::LEFT,
            JoystickButton::Right => Self::RIGHT,
            JoystickButton::Fire => Self::FIRE,
            JoystickButton::Fire2 => Self::FIRE2,
        }
    }
}

/// The two joystick ports on the video card, pressed buttons read as 0.
///
/// Only the frontend changes these, so they are not part of save states.
#[derive(Default)]
pub struct Joysticks {
    buttons: [JoystickButtons; JOYSTICK_PORTS],
}

impl Joysticks {
    /// `video_irq` pulls bit 1 of port 0 low
    pub fn read(&self, port: JoystickPort, video_irq: bool) -> u8 {
        let mut result = !self.buttons[port.index()].bits();

        if port == JoystickPort::Zero && video_irq {
            result &= !0x02;
        }

        result
    }

    pub fn press(&mut self, port: JoystickPort, button: JoystickButton) {
        self.buttons[port.index()].insert(button.into())
    }

    pub fn release(&mut self, port: JoystickPort, button: JoystickButton) {
        self.buttons[port.index()].remove(button.into())
    }
}
