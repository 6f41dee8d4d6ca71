mod env_overrides;
mod loader;
mod types;
mod validate;

pub use types::Config;
