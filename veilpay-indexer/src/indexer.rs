//! The indexing cycle.
//!
//! Each cycle resumes from the max persisted chain version, pages new
//! transactions through the RPC gate, decodes their events, upserts rows
//! by natural key, attributes ownership, pairs internal transfers, and
//! fires cache invalidation after every persisted row.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use veilpay_cache::BalanceInvalidator;
use veilpay_core::constants::{DEFAULT_FETCH_BATCH_SIZE, DEFAULT_MAX_PROCESS_ATTEMPTS};
use veilpay_core::error::Result;
use veilpay_core::traits::{ChainReader, LedgerStore};
use veilpay_core::types::{
    AccountAddress, Chain, ChainTransaction, IndexedPayment, IndexedWithdrawal, ProcessType,
    TransactionDetail,
};
use veilpay_stealth::resolve::resolve_ownership;

use crate::events::{decode_event, ChainEvent};
use crate::gate::RpcGate;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG & STATS
// ═══════════════════════════════════════════════════════════════════════════════

/// Indexer configuration.
#[derive(Clone, Debug)]
pub struct IndexerConfig {
    /// The payments contract whose transactions are indexed.
    pub contract: AccountAddress,
    /// Which chain this indexer follows.
    pub chain: Chain,
    /// Transactions fetched per page.
    pub batch_size: u64,
    /// Retry ceiling for attribution attempts.
    pub max_attempts: u32,
    /// Upper bound on pages per cycle, so one cycle cannot run unbounded
    /// against a deep backlog.
    pub max_pages_per_cycle: u64,
}

impl IndexerConfig {
    /// Creates a config with default batch and retry settings.
    pub fn new(contract: AccountAddress, chain: Chain) -> Self {
        Self {
            contract,
            chain,
            batch_size: DEFAULT_FETCH_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_PROCESS_ATTEMPTS,
            max_pages_per_cycle: 20,
        }
    }
}

/// Counters for one indexing cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexerStats {
    /// Transactions inspected.
    pub transactions_seen: u64,
    /// New payment rows inserted.
    pub payments_inserted: u64,
    /// Payment events whose natural key already existed.
    pub payments_duplicate: u64,
    /// New withdrawal rows inserted.
    pub withdrawals_inserted: u64,
    /// Withdrawal events whose natural key already existed.
    pub withdrawals_duplicate: u64,
    /// Successful ownership attributions.
    pub attributed: u64,
    /// Attribution attempts that matched no key.
    pub attribution_misses: u64,
    /// Synthesized internal-transfer withdrawals.
    pub internal_transfers: u64,
    /// Events skipped because they failed to decode.
    pub events_skipped: u64,
    /// Events with unrecognized type tags.
    pub unknown_events: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INDEXER
// ═══════════════════════════════════════════════════════════════════════════════

/// Discovers, deduplicates, and attributes chain events.
pub struct EventIndexer {
    reader: Arc<dyn ChainReader>,
    store: Arc<dyn LedgerStore>,
    invalidator: Arc<BalanceInvalidator>,
    gate: Arc<RpcGate>,
    config: IndexerConfig,
}

impl EventIndexer {
    /// Creates an indexer over the given collaborators.
    pub fn new(
        reader: Arc<dyn ChainReader>,
        store: Arc<dyn LedgerStore>,
        invalidator: Arc<BalanceInvalidator>,
        gate: Arc<RpcGate>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            reader,
            store,
            invalidator,
            gate,
            config,
        }
    }

    /// Runs one full indexing cycle.
    ///
    /// A remote read failure aborts the cycle and propagates; resuming on
    /// the next tick is safe because progress is keyed by persisted max
    /// version and upserts are idempotent.
    #[instrument(skip(self), fields(chain = ?self.config.chain))]
    pub async fn run_cycle(&self) -> Result<IndexerStats> {
        let resume = self.store.max_indexed_version(self.config.chain).await?;
        let mut stats = IndexerStats::default();
        let mut offset = 0u64;

        debug!(resume, "starting indexing cycle");

        for _ in 0..self.config.max_pages_per_cycle {
            let page = self.fetch_page(resume, offset).await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len() as u64;

            for tx in page {
                stats.transactions_seen += 1;
                if !tx.success {
                    continue;
                }
                let detail = self.fetch_detail(tx.version).await?;
                self.process_transaction(&detail, &mut stats).await?;
            }

            offset += page_len;
            if page_len < self.config.batch_size {
                break;
            }
        }

        info!(
            payments = stats.payments_inserted,
            withdrawals = stats.withdrawals_inserted,
            attributed = stats.attributed,
            skipped = stats.events_skipped,
            "indexing cycle complete"
        );
        Ok(stats)
    }

    async fn fetch_page(&self, resume: u64, offset: u64) -> Result<Vec<ChainTransaction>> {
        let _permit = self.gate.acquire().await;
        self.reader
            .fetch_transactions_since(&self.config.contract, resume, self.config.batch_size, offset)
            .await
    }

    async fn fetch_detail(&self, version: u64) -> Result<TransactionDetail> {
        let _permit = self.gate.acquire().await;
        self.reader.fetch_transaction_detail(version).await
    }

    /// Processes every event of one transaction. Decode failures skip the
    /// single event; store failures propagate.
    async fn process_transaction(
        &self,
        detail: &TransactionDetail,
        stats: &mut IndexerStats,
    ) -> Result<()> {
        for raw in &detail.events {
            let event = match decode_event(raw) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        tx_hash = %detail.tx_hash,
                        event_index = raw.event_index,
                        error = %e,
                        "skipping undecodable event"
                    );
                    stats.events_skipped += 1;
                    continue;
                }
            };

            match event {
                ChainEvent::Payment(payment) => {
                    let row = payment.into_indexed(
                        detail.version,
                        detail.tx_hash.clone(),
                        raw.event_index,
                        self.config.chain,
                        detail.timestamp,
                    );
                    self.handle_payment(row, stats).await?;
                }
                ChainEvent::Withdrawal(withdrawal) => {
                    let row = withdrawal.into_indexed(
                        detail.version,
                        detail.tx_hash.clone(),
                        self.config.chain,
                        detail.timestamp,
                    );
                    self.handle_withdrawal(row, stats).await?;
                }
                ChainEvent::Unknown { type_tag } => {
                    debug!(%type_tag, "ignoring unknown event type");
                    stats.unknown_events += 1;
                }
            }
        }
        Ok(())
    }

    // ─── payments ───────────────────────────────────────────────────────────

    async fn handle_payment(&self, row: IndexedPayment, stats: &mut IndexerStats) -> Result<()> {
        let chain = self.config.chain;
        let process_id = format!("{}:{}", row.tx_hash, row.event_index);
        let key = row.natural_key();

        let inserted = self.store.insert_payment(row.clone()).await?;
        if inserted {
            stats.payments_inserted += 1;
        } else {
            stats.payments_duplicate += 1;
            // Re-attempt attribution on duplicates only while the retry
            // budget lasts and no attempt has succeeded yet.
            if let Some(entry) = self
                .store
                .processing_entry(&process_id, ProcessType::PaymentAttribution)
                .await?
            {
                if !entry.should_attempt() {
                    return Ok(());
                }
            }
        }

        let keys = self.store.active_viewing_keys(chain).await?;
        let attribution = resolve_ownership(&row, &keys);
        let succeeded = attribution.is_some();
        let mut link_id = None;

        if let Some(attribution) = attribution {
            // A payer that is itself an attributed stealth address marks an
            // internal transfer; both legs must appear on the ledger.
            let payer_user_id = self
                .store
                .attributed_owner_of(&row.payer_address, chain)
                .await?;

            self.store
                .attribute_payment(
                    &key,
                    attribution.user_id,
                    attribution.link_id,
                    payer_user_id,
                )
                .await?;
            stats.attributed += 1;
            link_id = attribution.link_id;

            if let Some(payer_user_id) = payer_user_id {
                self.synthesize_internal_withdrawal(&row, payer_user_id, attribution.user_id, stats)
                    .await?;
            }
        } else {
            stats.attribution_misses += 1;
        }

        self.store
            .record_attempt(
                &process_id,
                ProcessType::PaymentAttribution,
                succeeded,
                self.config.max_attempts,
            )
            .await?;

        self.invalidator
            .on_new_payment(&row.stealth_owner, chain, link_id)
            .await?;
        Ok(())
    }

    /// Writes the payer-side leg of an internal transfer.
    async fn synthesize_internal_withdrawal(
        &self,
        payment: &IndexedPayment,
        payer_user_id: Uuid,
        destination_user_id: Uuid,
        stats: &mut IndexerStats,
    ) -> Result<()> {
        let chain = self.config.chain;
        let withdrawal = IndexedWithdrawal {
            version: payment.version,
            tx_hash: payment.tx_hash.clone(),
            chain,
            stealth_owner: payment.payer_address,
            destination: payment.stealth_owner,
            asset_id: payment.asset_id.clone(),
            amount: payment.amount,
            amount_after_fee: None,
            timestamp: payment.timestamp,
            user_id: Some(payer_user_id),
            destination_user_id: Some(destination_user_id),
            is_internal_transfer: true,
        };

        if self.store.insert_withdrawal(withdrawal).await? {
            stats.withdrawals_inserted += 1;
            stats.internal_transfers += 1;
            self.invalidator
                .on_new_withdrawal(&payment.payer_address, chain, Some(payer_user_id))
                .await?;
        }
        Ok(())
    }

    // ─── withdrawals ────────────────────────────────────────────────────────

    async fn handle_withdrawal(
        &self,
        row: IndexedWithdrawal,
        stats: &mut IndexerStats,
    ) -> Result<()> {
        let chain = self.config.chain;
        let process_id = format!("{}:{}", row.tx_hash, row.stealth_owner.to_hex());
        let key = row.natural_key();

        let inserted = self.store.insert_withdrawal(row.clone()).await?;
        if inserted {
            stats.withdrawals_inserted += 1;
        } else {
            stats.withdrawals_duplicate += 1;
            if let Some(entry) = self
                .store
                .processing_entry(&process_id, ProcessType::WithdrawalAttribution)
                .await?
            {
                if !entry.should_attempt() {
                    return Ok(());
                }
            }
        }

        // The owner of a withdrawing address is whoever was attributed the
        // most recent payment that funded it.
        let owner = match self.store.latest_payment_at(&row.stealth_owner, chain).await? {
            Some(payment) => payment.owner_user_id,
            None => None,
        };
        let succeeded = owner.is_some();

        if let Some(user_id) = owner {
            self.store.attribute_withdrawal(&key, user_id).await?;
            stats.attributed += 1;
        } else {
            stats.attribution_misses += 1;
        }

        self.store
            .record_attempt(
                &process_id,
                ProcessType::WithdrawalAttribution,
                succeeded,
                self.config.max_attempts,
            )
            .await?;

        self.invalidator
            .on_new_withdrawal(&row.stealth_owner, chain, owner)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for EventIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventIndexer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{payment_tx, withdrawal_tx, MockChainReader};
    use chrono::Utc;
    use std::time::Duration;
    use veilpay_cache::{AddressBalanceStore, UserSummaryStore};
    use veilpay_core::constants::ADDRESS_SIZE;
    use veilpay_core::error::VeilpayError;
    use veilpay_core::types::{AssetId, MetaKeyPair, RegisteredViewingKey};
    use veilpay_crypto::derive_meta_keys;
    use veilpay_stealth::create_payment_bundle;
    use veilpay_store::MemoryLedgerStore;

    struct Harness {
        reader: Arc<MockChainReader>,
        store: Arc<MemoryLedgerStore>,
        address_cache: Arc<AddressBalanceStore>,
        indexer: EventIndexer,
    }

    fn harness() -> Harness {
        let reader = Arc::new(MockChainReader::new());
        let store = Arc::new(MemoryLedgerStore::new());
        let address_cache = Arc::new(AddressBalanceStore::new());
        let user_summaries = Arc::new(UserSummaryStore::new());
        let invalidator = Arc::new(BalanceInvalidator::new(
            store.clone(),
            address_cache.clone(),
            user_summaries,
        ));
        let gate = Arc::new(RpcGate::new(Duration::ZERO));
        let config = IndexerConfig::new(
            AccountAddress::from_array([0xCC; ADDRESS_SIZE]),
            Chain::AptosTestnet,
        );
        let indexer = EventIndexer::new(
            reader.clone(),
            store.clone(),
            invalidator,
            gate,
            config,
        );
        Harness {
            reader,
            store,
            address_cache,
            indexer,
        }
    }

    async fn register_user(store: &MemoryLedgerStore, seed_byte: u8) -> (Uuid, MetaKeyPair) {
        let meta = derive_meta_keys(&[seed_byte; 32], Chain::AptosTestnet).unwrap();
        let user_id = Uuid::new_v4();
        store
            .register_viewing_key(RegisteredViewingKey {
                user_id,
                chain: Chain::AptosTestnet,
                spend_pub: meta.spend.public,
                view_pub: meta.view.public,
                view_secret: meta.view.secret.clone(),
                active: true,
                registered_at: Utc::now(),
            })
            .await
            .unwrap();
        (user_id, meta)
    }

    #[tokio::test]
    async fn test_idempotent_indexing() {
        let h = harness();
        let (_, meta) = register_user(&h.store, 1).await;
        let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();

        h.reader.push(payment_tx(10, "0xp1", &bundle, [9u8; 32], 500_000));

        let first = h.indexer.run_cycle().await.unwrap();
        assert_eq!(first.payments_inserted, 1);

        // Same backlog again: resume skips it entirely.
        let second = h.indexer.run_cycle().await.unwrap();
        assert_eq!(second.payments_inserted, 0);
        assert_eq!(h.store.payment_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_event_in_backlog_inserts_once() {
        let h = harness();
        let (_, meta) = register_user(&h.store, 2).await;
        let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();

        // The same event delivered at two versions with identical natural
        // key: the second upsert is a no-op.
        let tx = payment_tx(10, "0xp1", &bundle, [9u8; 32], 500_000);
        h.reader.push(tx.clone());
        h.reader.push(TransactionDetail { version: 11, ..tx });

        let stats = h.indexer.run_cycle().await.unwrap();
        assert_eq!(stats.payments_inserted, 1);
        assert_eq!(stats.payments_duplicate, 1);
        assert_eq!(h.store.payment_count(), 1);
    }

    #[tokio::test]
    async fn test_attribution_assigns_single_user() {
        let h = harness();
        let (user_a, meta_a) = register_user(&h.store, 3).await;
        let (_user_b, _meta_b) = register_user(&h.store, 4).await;

        let bundle = create_payment_bundle(&meta_a.spend.public, &meta_a.view.public).unwrap();
        h.reader.push(payment_tx(10, "0xp1", &bundle, [9u8; 32], 500_000));

        let stats = h.indexer.run_cycle().await.unwrap();
        assert_eq!(stats.attributed, 1);

        let rows = h
            .store
            .payments_for_user(user_a, Chain::AptosTestnet)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 500_000);
        assert_eq!(rows[0].asset_id, AssetId::native());
    }

    #[tokio::test]
    async fn test_internal_transfer_synthesizes_paired_withdrawal() {
        let h = harness();
        let (user_a, meta_a) = register_user(&h.store, 5).await;
        let (user_b, meta_b) = register_user(&h.store, 6).await;

        // First payment lands at A's stealth address S1.
        let bundle_a = create_payment_bundle(&meta_a.spend.public, &meta_a.view.public).unwrap();
        h.reader
            .push(payment_tx(10, "0xp1", &bundle_a, [9u8; 32], 800_000));
        h.indexer.run_cycle().await.unwrap();

        // Second payment to B is paid FROM S1.
        let bundle_b = create_payment_bundle(&meta_b.spend.public, &meta_b.view.public).unwrap();
        h.reader.push(payment_tx(
            20,
            "0xp2",
            &bundle_b,
            *bundle_a.stealth_address.as_array(),
            300_000,
        ));
        let stats = h.indexer.run_cycle().await.unwrap();
        assert_eq!(stats.internal_transfers, 1);

        let legs = h
            .store
            .withdrawals_for_user(user_a, Chain::AptosTestnet)
            .await
            .unwrap();
        assert_eq!(legs.len(), 1);
        assert!(legs[0].is_internal_transfer);
        assert_eq!(legs[0].amount, 300_000);
        assert_eq!(legs[0].stealth_owner, bundle_a.stealth_address);
        assert_eq!(legs[0].destination_user_id, Some(user_b));
    }

    #[tokio::test]
    async fn test_withdrawal_back_matched_to_owner() {
        let h = harness();
        let (user_a, meta_a) = register_user(&h.store, 7).await;

        let bundle = create_payment_bundle(&meta_a.spend.public, &meta_a.view.public).unwrap();
        h.reader.push(payment_tx(10, "0xp1", &bundle, [9u8; 32], 700_000));
        h.reader.push(withdrawal_tx(
            20,
            "0xw1",
            bundle.stealth_address,
            [0x44; 32],
            200_000,
            Some(200_500),
        ));

        h.indexer.run_cycle().await.unwrap();

        let withdrawals = h
            .store
            .withdrawals_for_user(user_a, Chain::AptosTestnet)
            .await
            .unwrap();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].effective_amount(), 200_500);
    }

    #[tokio::test]
    async fn test_malformed_event_skipped_batch_continues() {
        let h = harness();
        let (_, meta) = register_user(&h.store, 8).await;
        let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();

        let mut tx = payment_tx(10, "0xp1", &bundle, [9u8; 32], 500_000);
        tx.events.insert(
            0,
            veilpay_core::types::RawEvent {
                event_index: 99,
                type_tag: "0x1::veil::PaymentEvent".into(),
                data: serde_json::json!({ "garbage": true }),
            },
        );
        h.reader.push(tx);

        let stats = h.indexer.run_cycle().await.unwrap();
        assert_eq!(stats.events_skipped, 1);
        assert_eq!(stats.payments_inserted, 1);
    }

    #[tokio::test]
    async fn test_unknown_events_counted_not_parsed() {
        let h = harness();
        let mut tx = withdrawal_tx(10, "0xw1", AccountAddress::from_array([1; 32]), [2; 32], 5, None);
        tx.events.push(veilpay_core::types::RawEvent {
            event_index: 7,
            type_tag: "0x1::coin::DepositEvent".into(),
            data: serde_json::json!({}),
        });
        h.reader.push(tx);

        let stats = h.indexer.run_cycle().await.unwrap();
        assert_eq!(stats.unknown_events, 1);
        assert_eq!(stats.withdrawals_inserted, 1);
    }

    #[tokio::test]
    async fn test_chain_read_failure_aborts_cycle() {
        let h = harness();
        h.reader.fail_next();

        let result = h.indexer.run_cycle().await;
        assert!(matches!(result, Err(VeilpayError::ChainRead(_))));

        // Next cycle resumes cleanly.
        let stats = h.indexer.run_cycle().await.unwrap();
        assert_eq!(stats.transactions_seen, 0);
    }

    #[tokio::test]
    async fn test_attribution_retry_stops_at_ceiling() {
        let h = harness();
        // No viewing keys registered: attribution can never succeed.
        let meta = derive_meta_keys(&[9u8; 32], Chain::AptosTestnet).unwrap();
        let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();
        let tx = payment_tx(10, "0xp1", &bundle, [9u8; 32], 100);

        h.reader.push(tx.clone());
        h.indexer.run_cycle().await.unwrap();

        // Redeliver the same event well past the ceiling.
        for version in 11..=(11 + DEFAULT_MAX_PROCESS_ATTEMPTS as u64 + 5) {
            h.reader.push(TransactionDetail {
                version,
                ..tx.clone()
            });
            h.indexer.run_cycle().await.unwrap();
        }

        let entry = h
            .store
            .processing_entry("0xp1:0", ProcessType::PaymentAttribution)
            .await
            .unwrap()
            .unwrap();
        assert!(entry.exhausted());
        assert_eq!(entry.attempts, DEFAULT_MAX_PROCESS_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_invalidation_fires_before_cycle_returns() {
        let h = harness();
        let (_, meta) = register_user(&h.store, 10).await;
        let bundle = create_payment_bundle(&meta.spend.public, &meta.view.public).unwrap();

        // Seed a snapshot that must be gone once the payment is indexed.
        h.address_cache.upsert(veilpay_core::types::AddressBalanceCache {
            address: bundle.stealth_address,
            chain: Chain::AptosTestnet,
            native_amount: 1,
            assets: Vec::new(),
            last_fetched: Utc::now(),
            last_activity: None,
        });

        h.reader.push(payment_tx(10, "0xp1", &bundle, [9u8; 32], 500));
        h.indexer.run_cycle().await.unwrap();

        assert!(h
            .address_cache
            .peek(&bundle.stealth_address, Chain::AptosTestnet)
            .is_none());
    }
}
