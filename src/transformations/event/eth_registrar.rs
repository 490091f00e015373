//! Handlers for the `.eth` base registrar and its registration controllers.
//!
//! The base registrar identifies names by token id (the label hash as a
//! uint256) and never sees the plaintext label. Controllers do, so their
//! events are used to fill in label and full names after the fact.

use alloy::primitives::U256;
use async_trait::async_trait;

use crate::transformations::context::TransformationContext;
use crate::transformations::error::TransformationError;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, EventTrigger, TransformationHandler};
use crate::transformations::util::format_bytes32;
use crate::transformations::util::ids::{account_id, domain_id, registration_id};
use crate::transformations::util::names::{label_hash, subnode, token_id_to_label};
use crate::types::ens::{Account, EntityWrite, HistoryKind, Registration};

use super::{SOURCE_CONTROLLER, SOURCE_REGISTRAR};

fn label_from_token_id(
    ctx: &TransformationContext<'_>,
    param: &str,
) -> Result<[u8; 32], TransformationError> {
    Ok(token_id_to_label(ctx.event.uint256(param)?))
}

pub struct NameRegisteredHandler;

#[async_trait]
impl TransformationHandler for NameRegisteredHandler {
    fn name(&self) -> &'static str {
        "NameRegisteredHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let event = ctx.event;
        let account = Account {
            id: account_id(event.address("owner")?),
        };
        let label = label_from_token_id(ctx, "id")?;
        let expires = event.u64("expires")?;
        let domain_id = domain_id(subnode(&ctx.registrar.root_node, &label));
        let label_name = ctx.label_name(&label).map(str::to_string);

        let registration = Registration {
            id: registration_id(label),
            domain: domain_id.clone(),
            registration_date: event.block_timestamp,
            expiry_date: Some(expires),
            registrant: account.id.clone(),
            label_name: label_name.clone(),
            cost: None,
        };

        let mut writes = vec![
            EntityWrite::Account(account.clone()),
            EntityWrite::Registration(registration.clone()),
        ];

        match (ctx.load_domain(&domain_id).await?, label_name) {
            (Some(mut domain), Some(label_name)) => {
                domain.name = Some(ctx.registrar.full_name(&label_name));
                domain.label_name = Some(label_name);
                writes.push(EntityWrite::Domain(domain));
            }
            (None, _) => tracing::debug!(
                "Domain {} not found for registration {}",
                domain_id,
                registration.id
            ),
            (Some(_), None) => {}
        }

        writes.push(EntityWrite::History(ctx.history(
            HistoryKind::NameRegistered {
                registration: registration.id,
                registrant: account.id,
                expiry_date: expires,
            },
        )));
        Ok(writes)
    }
}

impl EventHandler for NameRegisteredHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            SOURCE_REGISTRAR,
            "NameRegistered(uint256,address,uint256)",
        )]
    }
}

pub struct NameRenewedHandler;

#[async_trait]
impl TransformationHandler for NameRenewedHandler {
    fn name(&self) -> &'static str {
        "NameRenewedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let label = label_from_token_id(ctx, "id")?;
        let expires = ctx.event.u64("expires")?;

        let Some(mut registration) = ctx.load_registration(&registration_id(label)).await? else {
            return Ok(Vec::new());
        };
        registration.expiry_date = Some(expires);

        let history = ctx.history(HistoryKind::NameRenewed {
            registration: registration.id.clone(),
            expiry_date: expires,
        });
        Ok(vec![
            EntityWrite::Registration(registration),
            EntityWrite::History(history),
        ])
    }
}

impl EventHandler for NameRenewedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            SOURCE_REGISTRAR,
            "NameRenewed(uint256,uint256)",
        )]
    }
}

pub struct NameTransferredHandler;

#[async_trait]
impl TransformationHandler for NameTransferredHandler {
    fn name(&self) -> &'static str {
        "NameTransferredHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let account = Account {
            id: account_id(ctx.event.address("to")?),
        };
        let label = label_from_token_id(ctx, "tokenId")?;

        let mut writes = vec![EntityWrite::Account(account.clone())];

        let Some(mut registration) = ctx.load_registration(&registration_id(label)).await? else {
            return Ok(writes);
        };
        registration.registrant = account.id.clone();

        let history = ctx.history(HistoryKind::NameTransferred {
            registration: registration.id.clone(),
            new_owner: account.id,
        });
        writes.push(EntityWrite::Registration(registration));
        writes.push(EntityWrite::History(history));
        Ok(writes)
    }
}

impl EventHandler for NameTransferredHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            SOURCE_REGISTRAR,
            "Transfer(address,address,uint256)",
        )]
    }
}

/// Record the plaintext label revealed by a controller event.
///
/// The name must hash to `label` and be a single label; anything else is
/// logged and ignored.
async fn set_name_preimage(
    ctx: &TransformationContext<'_>,
    name: &str,
    label: [u8; 32],
    cost: U256,
) -> Result<Vec<EntityWrite>, TransformationError> {
    let hash = label_hash(name);
    if hash != label {
        tracing::warn!(
            "Expected '{}' to hash to {}, but got {} instead. Skipping.",
            name,
            format_bytes32(hash),
            format_bytes32(label)
        );
        return Ok(Vec::new());
    }

    if name.contains('.') {
        tracing::warn!("Invalid label '{}'. Skipping.", name);
        return Ok(Vec::new());
    }

    let mut writes = Vec::new();

    let domain_id = domain_id(subnode(&ctx.registrar.root_node, &label));
    if let Some(mut domain) = ctx.load_domain(&domain_id).await? {
        if domain.label_name.as_deref() != Some(name) {
            domain.label_name = Some(name.to_string());
            domain.name = Some(ctx.registrar.full_name(name));
            writes.push(EntityWrite::Domain(domain));
        }
    }

    if let Some(mut registration) = ctx.load_registration(&registration_id(label)).await? {
        registration.label_name = Some(name.to_string());
        registration.cost = Some(cost);
        writes.push(EntityWrite::Registration(registration));
    }

    Ok(writes)
}

/// Controller `NameRegistered`, both the single-cost form and the newer one
/// that splits the price into base cost and premium.
pub struct ControllerNameRegisteredHandler;

#[async_trait]
impl TransformationHandler for ControllerNameRegisteredHandler {
    fn name(&self) -> &'static str {
        "ControllerNameRegisteredHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let event = ctx.event;
        let cost = match event.try_get("cost") {
            Some(_) => event.uint256("cost")?,
            None => {
                let base_cost = event.uint256("baseCost")?;
                let premium = event.uint256("premium")?;
                base_cost.checked_add(premium).ok_or_else(|| {
                    TransformationError::InvariantViolation(format!(
                        "cost overflow: {} + {}",
                        base_cost, premium
                    ))
                })?
            }
        };

        set_name_preimage(ctx, event.string("name")?, event.bytes32("label")?, cost).await
    }
}

impl EventHandler for ControllerNameRegisteredHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![
            EventTrigger::new(
                SOURCE_CONTROLLER,
                "NameRegistered(string,bytes32,address,uint256,uint256)",
            ),
            EventTrigger::new(
                SOURCE_CONTROLLER,
                "NameRegistered(string,bytes32,address,uint256,uint256,uint256)",
            ),
        ]
    }
}

pub struct ControllerNameRenewedHandler;

#[async_trait]
impl TransformationHandler for ControllerNameRenewedHandler {
    fn name(&self) -> &'static str {
        "ControllerNameRenewedHandler"
    }

    async fn handle(
        &self,
        ctx: &TransformationContext<'_>,
    ) -> Result<Vec<EntityWrite>, TransformationError> {
        let event = ctx.event;
        set_name_preimage(
            ctx,
            event.string("name")?,
            event.bytes32("label")?,
            event.uint256("cost")?,
        )
        .await
    }
}

impl EventHandler for ControllerNameRenewedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            SOURCE_CONTROLLER,
            "NameRenewed(string,bytes32,uint256,uint256)",
        )]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(NameRegisteredHandler);
    registry.register_event_handler(NameRenewedHandler);
    registry.register_event_handler(NameTransferredHandler);
    registry.register_event_handler(ControllerNameRegisteredHandler);
    registry.register_event_handler(ControllerNameRenewedHandler);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformations::context::{DecodedEvent, DecodedValue};
    use crate::transformations::engine::EventOutcome;
    use crate::transformations::event::test_support::{Harness, TIMESTAMP};
    use crate::transformations::util::names::namehash;
    use crate::types::ens::Domain;

    const REGISTRAR: [u8; 20] = [0x57; 20];
    const CONTROLLER: [u8; 20] = [0x28; 20];
    const OWNER: [u8; 20] = [0xa1; 20];
    const EXPIRES: u64 = 1_611_923_011;

    fn token_id(label: &str) -> U256 {
        U256::from_be_bytes(label_hash(label))
    }

    fn registered(harness: &Harness, label: &str) -> DecodedEvent {
        harness.event(
            SOURCE_REGISTRAR,
            "NameRegistered(uint256,address,uint256)",
            REGISTRAR,
            vec![
                ("id", DecodedValue::Uint256(token_id(label))),
                ("owner", DecodedValue::Address(OWNER)),
                ("expires", DecodedValue::Uint256(U256::from(EXPIRES))),
            ],
        )
    }

    fn controller_registered(harness: &Harness, name: &str, label: [u8; 32], cost: u64) -> DecodedEvent {
        harness.event(
            SOURCE_CONTROLLER,
            "NameRegistered(string,bytes32,address,uint256,uint256)",
            CONTROLLER,
            vec![
                ("name", DecodedValue::String(name.to_string())),
                ("label", DecodedValue::Bytes32(label)),
                ("owner", DecodedValue::Address(OWNER)),
                ("cost", DecodedValue::Uint256(U256::from(cost))),
                ("expires", DecodedValue::Uint256(U256::from(EXPIRES))),
            ],
        )
    }

    async fn seed_domain(harness: &Harness, name: &str) -> String {
        let id = domain_id(namehash(name));
        harness.store.insert_domain(Domain::new(id.clone())).await;
        id
    }

    #[tokio::test]
    async fn test_registration_then_controller_reveals_name() {
        let harness = Harness::new();
        let domain = seed_domain(&harness, "alice.eth").await;

        harness.deliver(&registered(&harness, "alice")).await;

        let reg_id = registration_id(label_hash("alice"));
        let registration = harness.store.registration(&reg_id).await.unwrap();
        assert_eq!(registration.domain, domain);
        assert_eq!(registration.registration_date, TIMESTAMP);
        assert_eq!(registration.expiry_date, Some(EXPIRES));
        assert_eq!(registration.registrant, account_id(OWNER));
        assert_eq!(registration.label_name, None);
        assert!(harness.store.account(&account_id(OWNER)).await.is_some());

        harness
            .deliver(&controller_registered(&harness, "alice", label_hash("alice"), 100))
            .await;

        let domain = harness.store.domain(&domain).await.unwrap();
        assert_eq!(domain.label_name.as_deref(), Some("alice"));
        assert_eq!(domain.name.as_deref(), Some("alice.eth"));

        let registration = harness.store.registration(&reg_id).await.unwrap();
        assert_eq!(registration.label_name.as_deref(), Some("alice"));
        assert_eq!(registration.cost, Some(U256::from(100u64)));

        let history = harness.store.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].kind,
            HistoryKind::NameRegistered {
                registration: reg_id,
                registrant: account_id(OWNER),
                expiry_date: EXPIRES,
            }
        );
    }

    #[tokio::test]
    async fn test_registration_uses_known_preimage() {
        let harness = Harness::with_preimages(&["vitalik"]);
        let domain = seed_domain(&harness, "vitalik.eth").await;

        let outcome = harness.deliver(&registered(&harness, "vitalik")).await;
        assert_eq!(outcome, EventOutcome::Committed { writes: 4 });

        let domain = harness.store.domain(&domain).await.unwrap();
        assert_eq!(domain.label_name.as_deref(), Some("vitalik"));
        assert_eq!(domain.name.as_deref(), Some("vitalik.eth"));
        let registration = harness
            .store
            .registration(&registration_id(label_hash("vitalik")))
            .await
            .unwrap();
        assert_eq!(registration.label_name.as_deref(), Some("vitalik"));
    }

    #[tokio::test]
    async fn test_registration_without_domain_still_records() {
        let harness = Harness::with_preimages(&["bob"]);

        let outcome = harness.deliver(&registered(&harness, "bob")).await;

        // account, registration and history; no domain to update
        assert_eq!(outcome, EventOutcome::Committed { writes: 3 });
        assert!(harness
            .store
            .registration(&registration_id(label_hash("bob")))
            .await
            .is_some());
        assert_eq!(harness.store.counts().await.domains, 0);
    }

    #[tokio::test]
    async fn test_preimage_hash_mismatch_is_ignored() {
        let harness = Harness::new();
        let domain = seed_domain(&harness, "alice.eth").await;
        harness.deliver(&registered(&harness, "alice")).await;

        let outcome = harness
            .deliver(&controller_registered(&harness, "mallory", label_hash("alice"), 100))
            .await;

        assert_eq!(outcome, EventOutcome::Committed { writes: 0 });
        assert_eq!(harness.store.domain(&domain).await.unwrap().label_name, None);
    }

    #[tokio::test]
    async fn test_dotted_preimage_is_ignored() {
        let harness = Harness::new();
        let domain = seed_domain(&harness, "sub.alice.eth").await;

        let outcome = harness
            .deliver(&controller_registered(&harness, "sub.alice", label_hash("sub.alice"), 1))
            .await;

        assert_eq!(outcome, EventOutcome::Committed { writes: 0 });
        assert_eq!(harness.store.domain(&domain).await.unwrap().name, None);
    }

    #[tokio::test]
    async fn test_preimage_without_registration_updates_domain_only() {
        let harness = Harness::new();
        let domain = seed_domain(&harness, "carol.eth").await;

        let outcome = harness
            .deliver(&controller_registered(&harness, "carol", label_hash("carol"), 5))
            .await;

        assert_eq!(outcome, EventOutcome::Committed { writes: 1 });
        assert_eq!(
            harness.store.domain(&domain).await.unwrap().name.as_deref(),
            Some("carol.eth")
        );
        assert_eq!(harness.store.counts().await.registrations, 0);
    }

    #[tokio::test]
    async fn test_controller_v2_sums_base_cost_and_premium() {
        let harness = Harness::new();
        harness.deliver(&registered(&harness, "dave")).await;

        let event = harness.event(
            SOURCE_CONTROLLER,
            "NameRegistered(string,bytes32,address,uint256,uint256,uint256)",
            CONTROLLER,
            vec![
                ("name", DecodedValue::String("dave".to_string())),
                ("label", DecodedValue::Bytes32(label_hash("dave"))),
                ("owner", DecodedValue::Address(OWNER)),
                ("baseCost", DecodedValue::Uint256(U256::from(70u64))),
                ("premium", DecodedValue::Uint256(U256::from(30u64))),
                ("expires", DecodedValue::Uint256(U256::from(EXPIRES))),
            ],
        );
        harness.deliver(&event).await;

        let registration = harness
            .store
            .registration(&registration_id(label_hash("dave")))
            .await
            .unwrap();
        assert_eq!(registration.cost, Some(U256::from(100u64)));
    }

    #[tokio::test]
    async fn test_renewals_extend_expiry() {
        let harness = Harness::new();
        harness.deliver(&registered(&harness, "erin")).await;

        let renewed = harness.event(
            SOURCE_REGISTRAR,
            "NameRenewed(uint256,uint256)",
            REGISTRAR,
            vec![
                ("id", DecodedValue::Uint256(token_id("erin"))),
                ("expires", DecodedValue::Uint256(U256::from(EXPIRES + 1000))),
            ],
        );
        harness.deliver(&renewed).await;

        let controller_renewed = harness.event(
            SOURCE_CONTROLLER,
            "NameRenewed(string,bytes32,uint256,uint256)",
            CONTROLLER,
            vec![
                ("name", DecodedValue::String("erin".to_string())),
                ("label", DecodedValue::Bytes32(label_hash("erin"))),
                ("cost", DecodedValue::Uint256(U256::from(42u64))),
                ("expires", DecodedValue::Uint256(U256::from(EXPIRES + 1000))),
            ],
        );
        harness.deliver(&controller_renewed).await;

        let reg_id = registration_id(label_hash("erin"));
        let registration = harness.store.registration(&reg_id).await.unwrap();
        assert_eq!(registration.expiry_date, Some(EXPIRES + 1000));
        assert_eq!(registration.label_name.as_deref(), Some("erin"));
        assert_eq!(registration.cost, Some(U256::from(42u64)));

        let history = harness.store.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(
            history[1].kind,
            HistoryKind::NameRenewed {
                registration: reg_id,
                expiry_date: EXPIRES + 1000,
            }
        );
    }

    #[tokio::test]
    async fn test_renewal_of_unknown_registration_is_skipped() {
        let harness = Harness::new();
        let renewed = harness.event(
            SOURCE_REGISTRAR,
            "NameRenewed(uint256,uint256)",
            REGISTRAR,
            vec![
                ("id", DecodedValue::Uint256(token_id("frank"))),
                ("expires", DecodedValue::Uint256(U256::from(EXPIRES))),
            ],
        );

        assert_eq!(harness.deliver(&renewed).await, EventOutcome::Committed { writes: 0 });
        assert!(harness.store.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_updates_registrant() {
        let harness = Harness::new();
        let new_owner = [0xb2; 20];
        let transfer = |label: &str| {
            harness.event(
                SOURCE_REGISTRAR,
                "Transfer(address,address,uint256)",
                REGISTRAR,
                vec![
                    ("from", DecodedValue::Address(OWNER)),
                    ("to", DecodedValue::Address(new_owner)),
                    ("tokenId", DecodedValue::Uint256(token_id(label))),
                ],
            )
        };

        // unknown registration: only the account is stored
        assert_eq!(
            harness.deliver(&transfer("grace")).await,
            EventOutcome::Committed { writes: 1 }
        );
        assert!(harness.store.account(&account_id(new_owner)).await.is_some());
        assert!(harness.store.history().await.is_empty());

        harness.deliver(&registered(&harness, "grace")).await;
        harness.deliver(&transfer("grace")).await;

        let reg_id = registration_id(label_hash("grace"));
        let registration = harness.store.registration(&reg_id).await.unwrap();
        assert_eq!(registration.registrant, account_id(new_owner));

        let history = harness.store.history().await;
        assert_eq!(
            history.last().map(|h| &h.kind),
            Some(&HistoryKind::NameTransferred {
                registration: reg_id,
                new_owner: account_id(new_owner),
            })
        );
    }
}
