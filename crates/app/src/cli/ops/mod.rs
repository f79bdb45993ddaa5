pub mod chain;
pub mod init;
pub mod session;
pub mod version;

pub use chain::Chain;
pub use init::Init;
pub use session::Session;
pub use version::Version;
