use alloy_primitives::U256;

/// An address that has owned or been pointed at by a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// `0x`-prefixed lowercase hex address.
    pub id: String,
}

/// A node in the registry. Domains are created by the registry handlers
/// outside this crate; the handlers here only refine their name fields and
/// resolved address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Domain {
    /// `0x`-prefixed namehash.
    pub id: String,
    pub label_name: Option<String>,
    pub name: Option<String>,
    /// Id of the currently configured `Resolver`.
    pub resolver: Option<String>,
    pub resolved_address: Option<String>,
}

impl Domain {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// A second-level registration in the base registrar, keyed by label hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: String,
    pub domain: String,
    /// Block timestamp of the `NameRegistered` event.
    pub registration_date: u64,
    pub expiry_date: Option<u64>,
    /// Account id of the current registrant.
    pub registrant: String,
    pub label_name: Option<String>,
    pub cost: Option<U256>,
}

/// A (resolver contract, node) pair and the record keys it has published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    /// `"<resolver address>-<node>"`.
    pub id: String,
    pub domain: String,
    pub address: [u8; 20],
    pub addr: Option<String>,
    pub coin_types: Option<Vec<i32>>,
    pub texts: Option<Vec<String>>,
    /// Encoded RRSet keys, see `transformations::util::rrset`.
    pub rrs: Option<Vec<Vec<u8>>>,
    pub content_hash: Option<Vec<u8>>,
}

impl Resolver {
    pub fn new(id: impl Into<String>, domain: impl Into<String>, address: [u8; 20]) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            address,
            addr: None,
            coin_types: None,
            texts: None,
            rrs: None,
            content_hash: None,
        }
    }
}
