use alloy_primitives::U256;
use serde::Serialize;

fn serialize_hex<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: AsRef<[u8]>,
{
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes.as_ref())))
}

/// An immutable, append-only record of a single on-chain event.
///
/// The id is `"<block number>-<log index>"`, so replaying the same log
/// produces the same row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub id: String,
    pub block_number: u64,
    pub transaction_id: [u8; 32],
    pub kind: HistoryKind,
}

/// Event-specific payload of a history record.
///
/// Serialized (internally tagged by `type`) into the `payload` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum HistoryKind {
    AddrChanged {
        resolver: String,
        addr: String,
    },
    MulticoinAddrChanged {
        resolver: String,
        coin_type: i32,
        #[serde(serialize_with = "serialize_hex")]
        addr: Vec<u8>,
    },
    NameChanged {
        resolver: String,
        name: String,
    },
    AbiChanged {
        resolver: String,
        content_type: U256,
    },
    PubkeyChanged {
        resolver: String,
        #[serde(serialize_with = "serialize_hex")]
        x: [u8; 32],
        #[serde(serialize_with = "serialize_hex")]
        y: [u8; 32],
    },
    ContenthashChanged {
        resolver: String,
        #[serde(serialize_with = "serialize_hex")]
        hash: Vec<u8>,
    },
    InterfaceChanged {
        resolver: String,
        #[serde(rename = "interfaceID", serialize_with = "serialize_hex")]
        interface_id: Vec<u8>,
        #[serde(serialize_with = "serialize_hex")]
        implementer: [u8; 20],
    },
    AuthorisationChanged {
        resolver: String,
        #[serde(serialize_with = "serialize_hex")]
        owner: [u8; 20],
        #[serde(serialize_with = "serialize_hex")]
        target: [u8; 20],
        is_authorized: bool,
    },
    TextChanged {
        resolver: String,
        key: String,
        value: Option<String>,
    },
    NameRegistered {
        registration: String,
        registrant: String,
        expiry_date: u64,
    },
    NameRenewed {
        registration: String,
        expiry_date: u64,
    },
    NameTransferred {
        registration: String,
        new_owner: String,
    },
}

impl HistoryKind {
    /// Name of the history entity type.
    pub fn name(&self) -> &'static str {
        match self {
            HistoryKind::AddrChanged { .. } => "AddrChanged",
            HistoryKind::MulticoinAddrChanged { .. } => "MulticoinAddrChanged",
            HistoryKind::NameChanged { .. } => "NameChanged",
            HistoryKind::AbiChanged { .. } => "AbiChanged",
            HistoryKind::PubkeyChanged { .. } => "PubkeyChanged",
            HistoryKind::ContenthashChanged { .. } => "ContenthashChanged",
            HistoryKind::InterfaceChanged { .. } => "InterfaceChanged",
            HistoryKind::AuthorisationChanged { .. } => "AuthorisationChanged",
            HistoryKind::TextChanged { .. } => "TextChanged",
            HistoryKind::NameRegistered { .. } => "NameRegistered",
            HistoryKind::NameRenewed { .. } => "NameRenewed",
            HistoryKind::NameTransferred { .. } => "NameTransferred",
        }
    }

    /// Resolver id this record belongs to, for resolver events.
    pub fn resolver(&self) -> Option<&str> {
        match self {
            HistoryKind::AddrChanged { resolver, .. }
            | HistoryKind::MulticoinAddrChanged { resolver, .. }
            | HistoryKind::NameChanged { resolver, .. }
            | HistoryKind::AbiChanged { resolver, .. }
            | HistoryKind::PubkeyChanged { resolver, .. }
            | HistoryKind::ContenthashChanged { resolver, .. }
            | HistoryKind::InterfaceChanged { resolver, .. }
            | HistoryKind::AuthorisationChanged { resolver, .. }
            | HistoryKind::TextChanged { resolver, .. } => Some(resolver),
            _ => None,
        }
    }

    /// Registration id this record belongs to, for registrar events.
    pub fn registration(&self) -> Option<&str> {
        match self {
            HistoryKind::NameRegistered { registration, .. }
            | HistoryKind::NameRenewed { registration, .. }
            | HistoryKind::NameTransferred { registration, .. } => Some(registration),
            _ => None,
        }
    }
}
