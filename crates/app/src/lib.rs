// Library exports for the CLI binary and other consumers

pub mod logging;
pub mod state;
pub mod version;

pub use state::{AppConfig, AppSession, AppState, StateError};
pub use version::{build_info, BuildInfo};
