//! CLI command implementations

mod ps;
mod run;
mod socket;

pub use ps::ps_command;
pub use run::run_command;
pub use socket::socket_path_command;
