pub mod credentials;
pub mod earth_engine;

pub use credentials::{MetadataServerToken, StaticToken, TokenSource};
pub use earth_engine::RestEarthEngine;
