//! Raw log source: a JSON-lines file with one log per line, ordered by
//! (block number, log index).

use std::path::{Path, PathBuf};

use alloy::primitives::{Address, Bytes, B256};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;

use crate::raw_data::decoding::DecoderMessage;

#[derive(Debug, Error)]
pub enum LogCollectionError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed log at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Decoder channel closed")]
    ChannelClosed,
}

/// A raw EVM log as read from the source file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogData {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: B256,
    pub log_index: u32,
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl LogData {
    pub fn position(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }
}

pub fn parse_log_line(line: &str, line_number: usize) -> Result<LogData, LogCollectionError> {
    serde_json::from_str(line).map_err(|source| LogCollectionError::Parse {
        line: line_number,
        source,
    })
}

/// Stream logs from `path` to the decoder in batches of `batch_size`.
///
/// A log positioned at or before its predecessor is dropped with a warning,
/// since the engine only ever moves forward.
pub async fn collect_logs(
    path: &Path,
    batch_size: usize,
    decoder_tx: Sender<DecoderMessage>,
) -> Result<(), LogCollectionError> {
    let io_err = |source| LogCollectionError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let mut lines = BufReader::new(file).lines();

    tracing::info!("Reading logs from {}", path.display());

    let mut batch = Vec::with_capacity(batch_size);
    let mut last_position: Option<(u64, u32)> = None;
    let mut line_number = 0usize;
    let mut total = 0usize;
    let mut dropped = 0usize;

    while let Some(line) = lines.next_line().await.map_err(io_err)? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let log = parse_log_line(&line, line_number)?;
        let position = log.position();

        if last_position.is_some_and(|last| position <= last) {
            tracing::warn!(
                "Dropping out-of-order log at line {} (block {}, log index {})",
                line_number,
                position.0,
                position.1
            );
            dropped += 1;
            continue;
        }
        last_position = Some(position);

        batch.push(log);
        total += 1;

        if batch.len() >= batch_size {
            let logs = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            send(&decoder_tx, DecoderMessage::LogsReady { logs }).await?;
        }
    }

    if !batch.is_empty() {
        send(&decoder_tx, DecoderMessage::LogsReady { logs: batch }).await?;
    }
    send(&decoder_tx, DecoderMessage::AllComplete).await?;

    tracing::info!(
        "Finished reading {} logs from {} ({} dropped as out of order)",
        total,
        path.display(),
        dropped
    );
    Ok(())
}

async fn send(
    tx: &Sender<DecoderMessage>,
    message: DecoderMessage,
) -> Result<(), LogCollectionError> {
    tx.send(message)
        .await
        .map_err(|_| LogCollectionError::ChannelClosed)
}
