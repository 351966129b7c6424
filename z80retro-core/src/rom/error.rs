use std::convert::From;
use std::fmt::Debug;
use std::io::Error as ioError;

/// An error that may occur when loading the boot ROM image.
#[derive(thiserror::Error, Debug)]
pub enum RomError {
    /// File error happened while reading the ROM file.
    #[error("File error: {0}")]
    FileError(ioError),
    /// The ROM file is empty.
    #[error("The rom image is empty")]
    EmptyImage,
    /// The address mask is `len - 1`, so the size must be a power of two.
    #[error("The rom image should be a power of 2 in size, got {0} bytes")]
    SizeNotPowerOfTwo(usize),
    /// The image does not fit in the 64K address space.
    #[error("The rom image of {0} bytes is bigger than the 64K address space")]
    ImageTooLarge(usize),
}

impl From<ioError> for RomError {
    fn from(from: ioError) -> Self {
        Self::FileError(from)
    }
}
