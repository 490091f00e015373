//! Handlers for public resolver events.
//!
//! Resolvers can be deployed by anyone, so these are configured without an
//! address filter and keyed by `(emitting contract, node)`.

use async_trait::async_trait;

use crate::transformations::context::TransformationContext;
use crate::transformations::error::TransformationError;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, EventTrigger, TransformationHandler};
use crate::transformations::util::ids::{account_id, resolver_id};
use crate::transformations::util::records::{
    add_coin_type, add_text_key, clear_rrsets, delete_rrset, upsert_rrset,
};
use crate::types::ens::{Account, EntityWrite, HistoryKind};

use super::SOURCE_RESOLVER;

/// Resolver id for the node of the current event, without loading it.
fn event_resolver_id(ctx: &TransformationContext<'_>) -> Result<String, TransformationError> {
    let node = ctx.event.bytes32("node")?;
    Ok(resolver_id(ctx.event.contract_address, node))
}

fn resolver_trigger(signature: &str) -> EventTrigger {
    EventTrigger::new(SOURCE_RESOLVER, signature)
}

pub struct AddrChangedHandler;

#[async_trait]
impl TransformationHandler for AddrChangedHandler {
    fn name(&self) -> &'static str {
        "AddrChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let event = ctx.event;
        let node = event.bytes32("node")?;
        let account = Account {
            id: account_id(event.address("a")?),
        };

        let mut resolver = ctx.load_or_create_resolver(node).await?;
        resolver.addr = Some(account.id.clone());

        let mut writes = vec![
            EntityWrite::Account(account.clone()),
            EntityWrite::Resolver(resolver.clone()),
        ];

        // Only the domain's active resolver decides its resolved address.
        if let Some(mut domain) = ctx.load_domain(&resolver.domain).await? {
            if domain.resolver.as_deref() == Some(resolver.id.as_str()) {
                domain.resolved_address = Some(account.id.clone());
                writes.push(EntityWrite::Domain(domain));
            }
        }

        writes.push(EntityWrite::History(ctx.history(HistoryKind::AddrChanged {
            resolver: resolver.id,
            addr: account.id,
        })));
        Ok(writes)
    }
}

impl EventHandler for AddrChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("AddrChanged(bytes32,address)")]
    }
}

pub struct MulticoinAddrChangedHandler;

#[async_trait]
impl TransformationHandler for MulticoinAddrChangedHandler {
    fn name(&self) -> &'static str {
        "MulticoinAddrChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let event = ctx.event;
        let node = event.bytes32("node")?;
        let raw_coin_type = event.uint256("coinType")?;
        let new_address = event.bytes("newAddress")?.to_vec();

        let Some(coin_type) = u64::try_from(raw_coin_type)
            .ok()
            .and_then(|c| i32::try_from(c).ok())
        else {
            tracing::debug!(
                "Ignoring coin type {} outside the supported range at {}-{}",
                raw_coin_type,
                event.block_number,
                event.log_index
            );
            return Ok(Vec::new());
        };

        let mut resolver = ctx.load_or_create_resolver(node).await?;
        add_coin_type(&mut resolver.coin_types, coin_type);

        let history = ctx.history(HistoryKind::MulticoinAddrChanged {
            resolver: resolver.id.clone(),
            coin_type,
            addr: new_address,
        });
        Ok(vec![
            EntityWrite::Resolver(resolver),
            EntityWrite::History(history),
        ])
    }
}

impl EventHandler for MulticoinAddrChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("AddressChanged(bytes32,uint256,bytes)")]
    }
}

pub struct NameChangedHandler;

#[async_trait]
impl TransformationHandler for NameChangedHandler {
    fn name(&self) -> &'static str {
        "NameChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let name = ctx.event.string("name")?;
        if name.contains('\0') {
            tracing::warn!(
                "Dropping NameChanged with embedded null byte at {}-{}",
                ctx.event.block_number,
                ctx.event.log_index
            );
            return Ok(Vec::new());
        }

        Ok(vec![EntityWrite::History(ctx.history(
            HistoryKind::NameChanged {
                resolver: event_resolver_id(ctx)?,
                name: name.to_string(),
            },
        ))])
    }
}

impl EventHandler for NameChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("NameChanged(bytes32,string)")]
    }
}

pub struct AbiChangedHandler;

#[async_trait]
impl TransformationHandler for AbiChangedHandler {
    fn name(&self) -> &'static str {
        "AbiChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        Ok(vec![EntityWrite::History(ctx.history(
            HistoryKind::AbiChanged {
                resolver: event_resolver_id(ctx)?,
                content_type: ctx.event.uint256("contentType")?,
            },
        ))])
    }
}

impl EventHandler for AbiChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("ABIChanged(bytes32,uint256)")]
    }
}

pub struct PubkeyChangedHandler;

#[async_trait]
impl TransformationHandler for PubkeyChangedHandler {
    fn name(&self) -> &'static str {
        "PubkeyChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        Ok(vec![EntityWrite::History(ctx.history(
            HistoryKind::PubkeyChanged {
                resolver: event_resolver_id(ctx)?,
                x: ctx.event.bytes32("x")?,
                y: ctx.event.bytes32("y")?,
            },
        ))])
    }
}

impl EventHandler for PubkeyChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("PubkeyChanged(bytes32,bytes32,bytes32)")]
    }
}

/// Handles both the legacy three-argument event and the newer one that
/// also carries the record value.
pub struct TextChangedHandler;

#[async_trait]
impl TransformationHandler for TextChangedHandler {
    fn name(&self) -> &'static str {
        "TextChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let event = ctx.event;
        let node = event.bytes32("node")?;
        let key = event.string("key")?;
        let value = event
            .try_get("value")
            .and_then(|v| v.as_string())
            .map(str::to_string);

        let mut resolver = ctx.load_or_create_resolver(node).await?;
        add_text_key(&mut resolver.texts, key);

        let history = ctx.history(HistoryKind::TextChanged {
            resolver: resolver.id.clone(),
            key: key.to_string(),
            value,
        });
        Ok(vec![
            EntityWrite::Resolver(resolver),
            EntityWrite::History(history),
        ])
    }
}

impl EventHandler for TextChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![
            resolver_trigger("TextChanged(bytes32,string,string)"),
            resolver_trigger("TextChanged(bytes32,string,string,string)"),
        ]
    }
}

pub struct ContenthashChangedHandler;

#[async_trait]
impl TransformationHandler for ContenthashChangedHandler {
    fn name(&self) -> &'static str {
        "ContenthashChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let node = ctx.event.bytes32("node")?;
        let hash = ctx.event.bytes("hash")?.to_vec();

        let mut resolver = ctx.load_or_create_resolver(node).await?;
        resolver.content_hash = Some(hash.clone());

        let history = ctx.history(HistoryKind::ContenthashChanged {
            resolver: resolver.id.clone(),
            hash,
        });
        Ok(vec![
            EntityWrite::Resolver(resolver),
            EntityWrite::History(history),
        ])
    }
}

impl EventHandler for ContenthashChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("ContenthashChanged(bytes32,bytes)")]
    }
}

pub struct InterfaceChangedHandler;

#[async_trait]
impl TransformationHandler for InterfaceChangedHandler {
    fn name(&self) -> &'static str {
        "InterfaceChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        Ok(vec![EntityWrite::History(ctx.history(
            HistoryKind::InterfaceChanged {
                resolver: event_resolver_id(ctx)?,
                interface_id: ctx.event.bytes("interfaceID")?.to_vec(),
                implementer: ctx.event.address("implementer")?,
            },
        ))])
    }
}

impl EventHandler for InterfaceChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("InterfaceChanged(bytes32,bytes4,address)")]
    }
}

pub struct AuthorisationChangedHandler;

#[async_trait]
impl TransformationHandler for AuthorisationChangedHandler {
    fn name(&self) -> &'static str {
        "AuthorisationChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        Ok(vec![EntityWrite::History(ctx.history(
            HistoryKind::AuthorisationChanged {
                resolver: event_resolver_id(ctx)?,
                owner: ctx.event.address("owner")?,
                target: ctx.event.address("target")?,
                is_authorized: ctx.event.bool("isAuthorised")?,
            },
        ))])
    }
}

impl EventHandler for AuthorisationChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger(
            "AuthorisationChanged(bytes32,address,address,bool)",
        )]
    }
}

/// DNS resource types are `uint16` on chain.
fn dns_resource(ctx: &TransformationContext<'_>) -> Result<i32, TransformationError> {
    let resource = ctx.event.u64("resource")?;
    i32::try_from(resource).map_err(|_| {
        TransformationError::TypeConversion(format!("resource {} does not fit in i32", resource))
    })
}

pub struct DnsRecordChangedHandler;

#[async_trait]
impl TransformationHandler for DnsRecordChangedHandler {
    fn name(&self) -> &'static str {
        "DnsRecordChangedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let node = ctx.event.bytes32("node")?;
        let name = ctx.event.bytes("name")?;
        let resource = dns_resource(ctx)?;

        let mut resolver = ctx.load_or_create_resolver(node).await?;
        let updated = upsert_rrset(&resolver.rrs, name, resource).map_err(|e| {
            TransformationError::InvariantViolation(format!("resolver {}: {}", resolver.id, e))
        })?;
        resolver.rrs = Some(updated);

        Ok(vec![EntityWrite::Resolver(resolver)])
    }
}

impl EventHandler for DnsRecordChangedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("DNSRecordChanged(bytes32,bytes,uint16,bytes)")]
    }
}

pub struct DnsRecordDeletedHandler;

#[async_trait]
impl TransformationHandler for DnsRecordDeletedHandler {
    fn name(&self) -> &'static str {
        "DnsRecordDeletedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let node = ctx.event.bytes32("node")?;
        let name = ctx.event.bytes("name")?;
        let resource = dns_resource(ctx)?;

        let mut resolver = ctx.load_or_create_resolver(node).await?;
        if resolver.rrs.is_none() {
            return Ok(Vec::new());
        }
        delete_rrset(&mut resolver.rrs, name, resource);

        Ok(vec![EntityWrite::Resolver(resolver)])
    }
}

impl EventHandler for DnsRecordDeletedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("DNSRecordDeleted(bytes32,bytes,uint16)")]
    }
}

pub struct DnsZoneClearedHandler;

#[async_trait]
impl TransformationHandler for DnsZoneClearedHandler {
    fn name(&self) -> &'static str {
        "DnsZoneClearedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let node = ctx.event.bytes32("node")?;
        let mut resolver = ctx.load_or_create_resolver(node).await?;
        clear_rrsets(&mut resolver.rrs);
        Ok(vec![EntityWrite::Resolver(resolver)])
    }
}

impl EventHandler for DnsZoneClearedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![resolver_trigger("DNSZoneCleared(bytes32)")]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(AddrChangedHandler);
    registry.register_event_handler(MulticoinAddrChangedHandler);
    registry.register_event_handler(NameChangedHandler);
    registry.register_event_handler(AbiChangedHandler);
    registry.register_event_handler(PubkeyChangedHandler);
    registry.register_event_handler(TextChangedHandler);
    registry.register_event_handler(ContenthashChangedHandler);
    registry.register_event_handler(InterfaceChangedHandler);
    registry.register_event_handler(AuthorisationChangedHandler);
    registry.register_event_handler(DnsRecordChangedHandler);
    registry.register_event_handler(DnsRecordDeletedHandler);
    registry.register_event_handler(DnsZoneClearedHandler);
}
