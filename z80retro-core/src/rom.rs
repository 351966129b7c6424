mod error;

use sha2::{Digest, Sha256};

pub use error::RomError;

/// The whole Z80 address space, anything bigger can never be reached
pub const MAX_ROM_SIZE: usize = 0x10000;

/// The flash image the board boots from.
///
/// Reads are mirrored over the whole address space using `len - 1` as a mask,
/// which is why the length must be a power of two.
pub struct RomImage {
    data: Vec<u8>,
    mask: u16,
    hash: [u8; 32],
}

impl RomImage {
    pub fn new(data: Vec<u8>) -> Result<Self, RomError> {
        let len = data.len();

        if len == 0 {
            return Err(RomError::EmptyImage);
        }
        if !len.is_power_of_two() {
            return Err(RomError::SizeNotPowerOfTwo(len));
        }
        if len > MAX_ROM_SIZE {
            return Err(RomError::ImageTooLarge(len));
        }

        let hash: [u8; 32] = Sha256::digest(&data).into();

        log::debug!("rom image of {:#X} bytes, mask {:04X}", len, len - 1);

        Ok(Self {
            mask: (len - 1) as u16,
            data,
            hash,
        })
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.data[(addr & self.mask) as usize]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn mask(&self) -> u16 {
        self.mask
    }

    /// SHA-256 of the image, save states are bound to it
    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }
}
