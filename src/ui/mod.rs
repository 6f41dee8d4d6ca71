pub mod banner;
pub mod style;

pub use banner::SyncBanner;
