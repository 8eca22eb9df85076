//! Sound descriptors, raw sample lumps and the decoded sample cache.
pub mod asset_manager;
pub mod descriptor;
pub mod loader;
pub mod sfx;
pub mod sfx_loader;
pub mod util;

pub use asset_manager::SoundCatalog;
pub use descriptor::{PitchProfile, ResolvedSound, SoundDescriptor, SoundId};
pub use loader::{LumpSource, MemoryLumps, SampleCache};
pub use sfx::{PcmSample, RawSample};
pub use util::AssetError;
