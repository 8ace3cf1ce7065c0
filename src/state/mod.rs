pub mod player;
pub mod registry;

pub use player::PlayerRecord;
pub use registry::{Registry, RegistryStore, SCHEMA_VERSION};
