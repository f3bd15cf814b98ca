pub mod approval;
pub mod clock;
pub mod config;
pub mod connectors;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod heuristic;
pub mod intent;
pub mod memory_writer;
pub mod replies;
pub mod reviser;
pub mod sanitize;
pub mod sender_lock;
pub mod state;

pub use approval::*;
pub use clock::*;
pub use config::*;
pub use dispatcher::*;
pub use error::*;
pub use extractor::*;
pub use heuristic::*;
pub use intent::*;
pub use memory_writer::*;
pub use reviser::*;
pub use sanitize::*;
pub use sender_lock::*;
pub use state::*;
