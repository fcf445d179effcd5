pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Daemon, Del, Down, Init, Ls, Up, Version};
