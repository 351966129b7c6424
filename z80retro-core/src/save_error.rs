use crate::SAVE_STATE_VERSION;
use std::io::Error as ioError;

#[derive(thiserror::Error, Debug)]
pub enum SaveError {
    #[error("Io error: {0}")]
    Io(#[from] ioError),
    #[error("Could not encode/decode the machine state: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("This is not a valid save_state file")]
    InvalidSaveStateHeader,
    #[error(
        "The save_state file does not match the emulator version, got ({0}), needed {}",
        SAVE_STATE_VERSION
    )]
    UnmatchedSaveStateVersion(u32),
    #[error("This save_state file is not for this rom image")]
    InvalidRomHash,
    #[error("This save_state file holds a machine state the board can never be in")]
    InvalidSaveStateData,
}
