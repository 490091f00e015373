use crate::raw_data::historical::logs::LogData;

/// Message sent through the decoder channel
#[derive(Debug)]
pub enum DecoderMessage {
    /// Raw logs ready for decoding, in (block, log index) order
    LogsReady { logs: Vec<LogData> },
    /// Source exhausted (shutdown signal)
    AllComplete,
}
