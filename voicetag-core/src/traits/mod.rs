pub mod audio_device;
pub mod card_reader;
pub mod session_delegate;
