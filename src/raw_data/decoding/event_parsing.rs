use alloy::dyn_abi::DynSolType;
use alloy::primitives::keccak256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("Invalid event signature: {0}")]
    InvalidSignature(String),
    #[error("Failed to parse type '{0}': {1}")]
    TypeParse(String, String),
    #[error("Missing closing parenthesis")]
    MissingCloseParen,
    #[error("Unnamed parameter {index} in {event}")]
    UnnamedParam { event: String, index: usize },
}

/// Parsed event parameter
#[derive(Debug, Clone)]
pub struct EventParam {
    pub name: String,
    pub param_type: DynSolType,
    pub indexed: bool,
}

/// Parsed event definition
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub name: String,
    /// Types only, e.g. `NameRegistered(uint256,address,uint256)`.
    pub canonical_signature: String,
    pub topic0: [u8; 32],
    pub params: Vec<EventParam>,
}

impl ParsedEvent {
    /// Parse a full ABI signature like
    /// `"AddrChanged(bytes32 indexed node, address a)"`.
    ///
    /// Every parameter needs a name, since handlers look values up by name.
    /// Type aliases are normalised (`uint` becomes `uint256`) before topic0
    /// is hashed.
    pub fn from_signature(signature: &str) -> Result<Self, EventParseError> {
        let signature = signature.trim();

        let open_paren = signature
            .find('(')
            .ok_or_else(|| EventParseError::InvalidSignature(signature.to_string()))?;

        let name = signature[..open_paren].trim().to_string();
        if name.is_empty() {
            return Err(EventParseError::InvalidSignature(
                "Empty event name".to_string(),
            ));
        }

        let close_paren = signature
            .rfind(')')
            .ok_or(EventParseError::MissingCloseParen)?;
        if close_paren < open_paren {
            return Err(EventParseError::MissingCloseParen);
        }

        let params = split_params(&signature[open_paren + 1..close_paren])
            .into_iter()
            .map(parse_single_param)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(index) = params.iter().position(|p| p.name.is_empty()) {
            return Err(EventParseError::UnnamedParam { event: name, index });
        }

        let type_names: Vec<String> = params
            .iter()
            .map(|p| p.param_type.sol_type_name().into_owned())
            .collect();
        let canonical_signature = format!("{}({})", name, type_names.join(","));
        let topic0 = keccak256(canonical_signature.as_bytes()).0;

        Ok(ParsedEvent {
            name,
            canonical_signature,
            topic0,
            params,
        })
    }

    pub fn indexed_params(&self) -> impl Iterator<Item = &EventParam> {
        self.params.iter().filter(|p| p.indexed)
    }

    pub fn data_params(&self) -> impl Iterator<Item = &EventParam> {
        self.params.iter().filter(|p| !p.indexed)
    }
}

/// Split on top-level commas, respecting nested parentheses (tuple types).
fn split_params(params_str: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in params_str.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(params_str[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(params_str[start..].trim());

    parts.retain(|p| !p.is_empty());
    parts
}

/// Parse a single parameter like "address indexed owner" or "uint256 expires"
fn parse_single_param(param_str: &str) -> Result<EventParam, EventParseError> {
    let parts: Vec<&str> = param_str.split_whitespace().collect();

    let (type_string, indexed, name) = match parts.as_slice() {
        [ty] => (*ty, false, ""),
        [ty, "indexed"] => (*ty, true, ""),
        [ty, name] => (*ty, false, *name),
        [ty, "indexed", name] => (*ty, true, *name),
        _ => {
            return Err(EventParseError::InvalidSignature(format!(
                "Invalid parameter format: {}",
                param_str
            )))
        }
    };

    let param_type = DynSolType::parse(type_string)
        .map_err(|e| EventParseError::TypeParse(type_string.to_string(), e.to_string()))?;

    Ok(EventParam {
        name: name.to_string(),
        param_type,
        indexed,
    })
}
