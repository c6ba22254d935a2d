pub mod loader;
pub mod window;

pub use loader::{BackgroundLoader, LoaderConfig, LoaderEvent};
pub use window::{Delivery, FileWindow};
