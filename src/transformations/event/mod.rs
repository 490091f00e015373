//! Event handlers for transformation.
//!
//! Add new event handler modules here and register them in `register_handlers`.

pub mod eth_registrar;
pub mod resolver;

#[cfg(test)]
pub(crate) mod test_support;

use super::registry::TransformationRegistry;

/// Contract names the handlers are triggered by. They must match the keys of
/// the `contracts` map in the chain config.
pub const SOURCE_RESOLVER: &str = "Resolver";
pub const SOURCE_REGISTRAR: &str = "BaseRegistrar";
pub const SOURCE_CONTROLLER: &str = "EthRegistrarController";

/// Register all event handlers with the registry.
pub fn register_handlers(registry: &mut TransformationRegistry) {
    resolver::register_handlers(registry);
    eth_registrar::register_handlers(registry);
}
