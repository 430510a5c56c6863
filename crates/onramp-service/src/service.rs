//! Engine service facade

use std::sync::Arc;

use chrono::Utc;
use onramp_channel::{
    AddressPool, AddressProvisioner, AddressStats, AddressStore, ChannelFilter, ChannelMachine,
    ChannelStore, CreationMethod, ExpirySweeper, OpenChannelRequest, PaymentChannel,
};
use onramp_consolidation::{
    ChainClient, ConsolidationInfo, ConsolidationPlan, ConsolidationResult, Consolidator,
    PlanStore, Priority,
};
use onramp_core::{ChannelId, CryptoType, EngineConfig, PlanTxId, Result, TxHash};
use onramp_creation::{
    AccountCreationResolver, CreationOperation, LedgerSample, LedgerSnapshot, LedgerStore,
    ResourceLedger,
};
use onramp_monitor::{DepositEvent, DepositSource, MonitorHealth, MonitorIngestor};
use onramp_store::{MemoryAddressStore, MemoryChannelStore, MemoryLedgerStore, MemoryPlanStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Stores and external collaborators the engine is wired from
#[derive(Clone)]
pub struct EngineDeps {
    /// Channel row persistence
    pub channels: Arc<dyn ChannelStore>,
    /// Address pool persistence
    pub addresses: Arc<dyn AddressStore>,
    /// Consolidation plan persistence
    pub plans: Arc<dyn PlanStore>,
    /// Operator ACT/RC ledger persistence
    pub ledger: Arc<dyn LedgerStore>,
    /// Fresh-address collaborator
    pub provisioner: Arc<dyn AddressProvisioner>,
    /// Chain-side balance/fee/broadcast collaborator
    pub chain: Arc<dyn ChainClient>,
    /// Deposit event feed
    pub source: Arc<dyn DepositSource>,
}

impl EngineDeps {
    /// Deps backed by the in-memory reference stores, for tests and the
    /// simulator wiring. `act_balance`/`rc_mana` seed the operator ledger.
    pub fn in_memory(
        provisioner: Arc<dyn AddressProvisioner>,
        chain: Arc<dyn ChainClient>,
        source: Arc<dyn DepositSource>,
        act_balance: u64,
        rc_mana: u64,
    ) -> Self {
        Self {
            channels: Arc::new(MemoryChannelStore::new()),
            addresses: Arc::new(MemoryAddressStore::new()),
            plans: Arc::new(MemoryPlanStore::new()),
            ledger: Arc::new(MemoryLedgerStore::new(act_balance, rc_mana, rc_mana.max(1))),
            provisioner,
            chain,
            source,
        }
    }
}

/// Handles to the spawned background workers
pub struct WorkerHandles {
    /// Deposit ingestion loop
    pub ingestor: JoinHandle<()>,
    /// Channel expiry sweep loop
    pub sweeper: JoinHandle<()>,
}

/// The wired engine, one instance per service process
pub struct EngineService {
    config: EngineConfig,
    machine: Arc<ChannelMachine>,
    pool: Arc<AddressPool>,
    resolver: Arc<AccountCreationResolver>,
    ledger: ResourceLedger,
    consolidator: Consolidator,
    ingestor: Arc<MonitorIngestor>,
    shutdown: watch::Sender<bool>,
}

impl EngineService {
    /// Wire the engine from configuration and dependencies
    pub fn new(config: EngineConfig, deps: EngineDeps) -> Self {
        let pool = Arc::new(AddressPool::new(
            Arc::clone(&deps.addresses),
            Arc::clone(&deps.provisioner),
        ));
        let machine = Arc::new(ChannelMachine::new(
            Arc::clone(&deps.channels),
            Arc::clone(&pool),
            config.clone(),
        ));
        let resolver = Arc::new(AccountCreationResolver::new(
            Arc::clone(&machine),
            Arc::clone(&deps.ledger),
            config.clone(),
        ));
        let ledger = ResourceLedger::new(Arc::clone(&deps.ledger), config.act_claim_rc_cost);
        let consolidator = Consolidator::new(
            Arc::clone(&deps.plans),
            Arc::clone(&pool),
            Arc::clone(&deps.chain),
            config.clone(),
        );
        let ingestor = Arc::new(MonitorIngestor::new(
            Arc::clone(&deps.source),
            Arc::clone(&machine),
            Arc::clone(&deps.channels),
            Arc::clone(&pool),
            config.recent_detections,
        ));
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            machine,
            pool,
            resolver,
            ledger,
            consolidator,
            ingestor,
            shutdown,
        }
    }

    /// Spawn the deposit ingestor and expiry sweeper
    pub fn spawn_workers(&self) -> WorkerHandles {
        let ingestor = Arc::clone(&self.ingestor).spawn(self.shutdown.subscribe());
        let sweeper = ExpirySweeper::new(
            Arc::clone(&self.machine),
            std::time::Duration::from_secs(self.config.sweep_interval_secs),
        )
        .spawn(self.shutdown.subscribe());
        WorkerHandles { ingestor, sweeper }
    }

    /// Signal every worker to stop
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Open a new payment channel
    pub async fn open_channel(&self, request: OpenChannelRequest) -> Result<PaymentChannel> {
        self.machine.open(request).await
    }

    /// List channels for the console
    pub async fn list_channels(&self, filter: ChannelFilter) -> Result<Vec<PaymentChannel>> {
        self.machine.list(filter).await
    }

    /// One channel's current snapshot
    pub async fn channel(&self, id: ChannelId) -> Result<PaymentChannel> {
        self.machine.get(id).await
    }

    /// Operator deletion of a channel, permitted from any status
    pub async fn delete_channel(&self, id: ChannelId) -> Result<()> {
        self.machine.cancel(id).await
    }

    // =========================================================================
    // Account creation
    // =========================================================================

    /// Decide the funding method for one confirmed channel
    pub async fn resolve_creation(&self, id: ChannelId) -> Result<CreationOperation> {
        self.resolver.resolve(id).await
    }

    /// Report the broadcast creation transaction back
    pub async fn complete_creation(
        &self,
        id: ChannelId,
        creation_tx: TxHash,
        method: CreationMethod,
    ) -> Result<()> {
        self.resolver.complete(id, creation_tx, method).await
    }

    /// Drive every channel still owing a creation
    pub async fn process_pending_accounts(&self) -> Result<Vec<CreationOperation>> {
        self.resolver.process_pending().await
    }

    // =========================================================================
    // Consolidation
    // =========================================================================

    /// Phase 1: read-only sweep preview
    pub async fn consolidation_info(&self, crypto_type: CryptoType) -> Result<ConsolidationInfo> {
        self.consolidator.info(crypto_type).await
    }

    /// Phase 2: snapshot a plan (single flight per asset)
    pub async fn prepare_consolidation(
        &self,
        crypto_type: CryptoType,
        destination: &str,
        priority: Priority,
    ) -> Result<ConsolidationPlan> {
        self.consolidator.prepare(crypto_type, destination, priority).await
    }

    /// Phase 3: execute a plan, idempotent on its `tx_id`
    pub async fn execute_consolidation(&self, tx_id: PlanTxId) -> Result<ConsolidationResult> {
        self.consolidator.execute(tx_id).await
    }

    /// The in-flight plan for an asset, if any
    pub async fn active_plan(&self, crypto_type: CryptoType) -> Result<Option<ConsolidationPlan>> {
        self.consolidator.active_plan(crypto_type).await
    }

    // =========================================================================
    // Addresses, ledger, monitor
    // =========================================================================

    /// Address pool statistics for one asset
    pub async fn address_stats(&self, crypto_type: CryptoType) -> Result<AddressStats> {
        self.pool.stats(crypto_type, Utc::now()).await
    }

    /// Operator request to return a swept address to the pool
    pub async fn mark_address_reusable(&self, address: &str) -> Result<()> {
        self.pool.mark_reusable(address, Utc::now()).await
    }

    /// Current ACT balance, RC mana, and cost table
    pub async fn ledger_status(&self) -> Result<LedgerSnapshot> {
        self.ledger.status().await
    }

    /// ACT/RC trend series
    pub async fn ledger_history(&self, limit: usize) -> Result<Vec<LedgerSample>> {
        self.ledger.history(limit).await
    }

    /// Convert RC into one ACT
    pub async fn claim_act(&self) -> Result<LedgerSnapshot> {
        self.ledger.claim_act().await
    }

    /// Monitor feed health
    pub async fn monitor_health(&self) -> Result<MonitorHealth> {
        self.ingestor.health().await
    }

    /// Recent deposit detections, oldest first
    pub fn recent_detections(&self) -> Vec<DepositEvent> {
        self.ingestor.recent_detections()
    }

    /// Direct ingestion entry point for poll-style deployments and tests
    pub async fn ingest_deposit(&self, event: DepositEvent) {
        self.ingestor.ingest(event).await;
    }

    /// Run one expiry sweep pass immediately
    pub async fn sweep_expired(&self) -> Result<Vec<PaymentChannel>> {
        self.machine.expire_overdue(Utc::now()).await
    }
}
