use serde::{Deserialize, Serialize};

/// The storage device on the other end of the bit-banged SPI bus (the SD
/// card slot).
pub trait SpiDevice {
    /// Full duplex exchange, `byte` is shifted out while the returned byte is
    /// shifted in
    fn exchange(&mut self, byte: u8) -> u8;

    /// The chip select line went low
    fn select(&mut self);

    /// The chip select line went high
    fn deselect(&mut self);
}

/// Turns the GPIO pin wiggling of the ROM's SD driver into whole bytes.
///
/// A byte is framed purely by counting rising clock edges, the time between
/// edges does not matter.
#[derive(Serialize, Deserialize)]
pub struct SpiBitBanger {
    bit_count: u8,
    tx_bits: u8,
    rx_bits: u8,
    /// MISO level as seen on GPIO input bit 7
    data_in: bool,
}

impl Default for SpiBitBanger {
    fn default() -> Self {
        Self {
            bit_count: 0,
            tx_bits: 0,
            rx_bits: 0,
            // pulled up
            data_in: true,
        }
    }
}

impl SpiBitBanger {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Rising clock edge, the device samples MOSI here
    pub fn clock_high(&mut self, data_out: bool, device: Option<&mut dyn SpiDevice>) {
        self.tx_bits = (self.tx_bits << 1) | data_out as u8;
        self.bit_count += 1;

        if self.bit_count == 8 {
            let tx_bits = self.tx_bits;
            // nothing on the bus reads as all ones
            self.rx_bits = device.map_or(0xFF, |device| device.exchange(tx_bits));
            log::trace!("spi {:02X} | {:02X}", self.rx_bits, self.tx_bits);
            self.bit_count = 0;
        }
    }

    /// Falling clock edge, the next received bit shows up on MISO
    pub fn clock_low(&mut self) {
        self.data_in = self.rx_bits & 0x80 != 0;
        self.rx_bits = (self.rx_bits << 1) | 1;
    }

    /// Follows the chip select GPIO line, low selects the card and starts
    /// a new byte frame
    pub fn chip_select(&mut self, line_high: bool, device: Option<&mut dyn SpiDevice>) {
        if line_high {
            if let Some(device) = device {
                device.deselect();
            }
        } else {
            if let Some(device) = device {
                device.select();
            }
            self.bit_count = 0;
        }
    }

    pub fn data_in(&self) -> bool {
        self.data_in
    }

    /// Bits shifted since the last complete byte
    pub fn pending_bits(&self) -> u8 {
        self.bit_count
    }
}
