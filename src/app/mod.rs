pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{CheckLinksArgs, Cli, Command, ConfigArgs, InvokeArgs, ServeArgs};
pub use commands::{run, CommandOutput};
pub use error::AppError;
