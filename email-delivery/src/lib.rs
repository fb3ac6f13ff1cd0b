pub mod config;
pub mod notifier;

pub use config::{EmailerConfig, Stage};
pub use notifier::{build_message, construct_emailer, ConsoleNotifier, SmtpNotifier};
