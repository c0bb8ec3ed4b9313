//! Bundle assembly and persistence

mod assembler;
pub mod audio;
mod locks;
mod persister;
mod staging;

pub use assembler::BundleAssembler;
pub use audio::{read_audio_metadata, AudioMetadata};
pub use locks::KeyedLocks;
pub use persister::{BundlePersister, ListUpdate, Progress, SaveReport};
pub use staging::GitStager;
