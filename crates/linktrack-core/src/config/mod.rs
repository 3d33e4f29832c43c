pub mod settings;

pub use settings::{Settings, CONFIG_ENV, DEFAULT_PACKAGE, DEFAULT_PATH};
