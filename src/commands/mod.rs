pub mod completions;
pub mod configure;
pub mod exec;

pub use completions::CompletionsCommand;
pub use configure::ConfigureCommand;
pub use exec::ExecCommand;
