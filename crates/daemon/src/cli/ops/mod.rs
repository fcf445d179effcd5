pub mod daemon;
pub mod del;
pub mod down;
pub mod init;
pub mod ls;
pub mod up;
pub mod version;

pub use daemon::Daemon;
pub use del::Del;
pub use down::Down;
pub use init::Init;
pub use ls::Ls;
pub use up::Up;
pub use version::Version;
