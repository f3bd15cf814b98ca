pub mod console;
pub mod twilio;

pub use console::ConsoleMessenger;
pub use twilio::{TwilioMessenger, TwilioTranscriber, TwilioWebhookForm};
