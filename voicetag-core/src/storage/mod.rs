pub mod library;
pub mod metadata;
pub mod wav_reader;
pub mod wav_writer;
