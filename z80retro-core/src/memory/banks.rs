use serde::{Deserialize, Serialize};

use crate::rom::RomImage;

const BANK_SIZE: usize = 0x8000;
const BANKS_COUNT: usize = 16;
/// The upper half of the address space is always this bank
pub const FIXED_BANK: usize = 15;

/// 512K of RAM split in 32K windows, the lower half of the address space
/// is selected by the top nibble of the GPIO output latch.
///
/// The boot flash sits on top of everything for reads only, writes always
/// go through to RAM, so the ROM can copy itself down before kicking the
/// flash out.
#[derive(Serialize, Deserialize)]
pub struct MemoryBanks {
    ram: Vec<u8>,
    bank_select: u8,
    boot_overlay: bool,
}

impl Default for MemoryBanks {
    fn default() -> Self {
        Self {
            ram: vec![0; BANK_SIZE * BANKS_COUNT],
            bank_select: 0,
            boot_overlay: true,
        }
    }
}

impl MemoryBanks {
    /// The RAM window index and offset inside the whole RAM
    #[inline]
    pub fn map_ram(&self, addr: u16) -> usize {
        let bank = if addr >= 0x8000 {
            FIXED_BANK
        } else {
            (self.bank_select >> 4) as usize
        };

        bank * BANK_SIZE + (addr as usize & (BANK_SIZE - 1))
    }

    pub fn read(&self, rom: &RomImage, addr: u16) -> u8 {
        if self.boot_overlay {
            rom.read(addr)
        } else {
            self.ram[self.map_ram(addr)]
        }
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        let index = self.map_ram(addr);
        self.ram[index] = data;
    }

    pub fn set_bank_select(&mut self, data: u8) {
        self.bank_select = data;
    }

    pub fn current_bank(&self) -> u8 {
        self.bank_select >> 4
    }

    pub fn disable_boot_overlay(&mut self) {
        if self.boot_overlay {
            log::debug!("boot flash mapped out");
        }
        self.boot_overlay = false;
    }

    pub fn boot_overlay_active(&self) -> bool {
        self.boot_overlay
    }

    /// RAM contents survive a reset, only the mapping goes back to boot
    pub fn reset(&mut self) {
        self.bank_select = 0;
        self.boot_overlay = true;
    }

    /// A decoded save state could carry RAM of any size
    pub fn has_full_ram(&self) -> bool {
        self.ram.len() == BANK_SIZE * BANKS_COUNT
    }

    /// Raw access to a RAM window, bypassing the mapping
    pub fn ram_bank(&self, bank: usize) -> &[u8] {
        let start = bank * BANK_SIZE;
        &self.ram[start..start + BANK_SIZE]
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryBanks, BANK_SIZE, FIXED_BANK};
    use crate::rom::RomImage;

    fn rom() -> RomImage {
        let mut data = vec![0xEE; 0x4000];
        data[0] = 0xC3;
        RomImage::new(data).unwrap()
    }

    #[test]
    fn upper_half_is_always_fixed_bank() {
        let mut banks = MemoryBanks::default();
        banks.disable_boot_overlay();

        for select in 0..=0xFFu8 {
            banks.set_bank_select(select);
            for &addr in &[0x8000u16, 0x9ABC, 0xFFFF] {
                assert_eq!(
                    banks.map_ram(addr),
                    FIXED_BANK * BANK_SIZE + (addr as usize & 0x7FFF)
                );
            }
        }
    }

    #[test]
    fn lower_half_follows_selector() {
        let mut banks = MemoryBanks::default();
        banks.disable_boot_overlay();
        let rom = rom();

        for select in (0..=0xF0u8).step_by(0x10) {
            banks.set_bank_select(select | 0x0F);
            banks.write(0x1234, select);
            assert_eq!(banks.map_ram(0x1234), (select >> 4) as usize * BANK_SIZE + 0x1234);
            assert_eq!(banks.read(&rom, 0x1234), select);
        }

        // every bank kept its own value
        for select in (0..=0xF0u8).step_by(0x10) {
            banks.set_bank_select(select);
            assert_eq!(banks.read(&rom, 0x1234), select);
        }
    }

    #[test]
    fn overlay_only_intercepts_reads() {
        let mut banks = MemoryBanks::default();
        let rom = rom();

        banks.write(0x0000, 0x42);
        banks.write(0xC000, 0x24);
        assert_eq!(banks.read(&rom, 0x0000), 0xC3);
        assert_eq!(banks.read(&rom, 0xC000), 0xC3);
        assert_eq!(banks.read(&rom, 0x8001), 0xEE);

        banks.disable_boot_overlay();
        assert_eq!(banks.read(&rom, 0x0000), 0x42);
        assert_eq!(banks.read(&rom, 0xC000), 0x24);

        banks.reset();
        assert!(banks.boot_overlay_active());
        assert_eq!(banks.ram_bank(0)[0], 0x42);
    }
}
