pub mod event_parsing;
mod logs;
mod types;

pub use logs::{decode_logs, LogDecoder};
pub use types::DecoderMessage;
