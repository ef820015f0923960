//! A simulated full node for end-to-end wallet tests.
//!
//! The node keeps a chain of [`BlockNotification`]s and a mempool. Every
//! connection gets an inbound transaction channel (drained into the mempool)
//! and an outbound [`ChainEvent`] stream. Farming a block confirms the whole
//! mempool and pays the farmer a reward and a fee record.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use light_wallet::builder::SignedTransaction;
use light_wallet::chain::{BlockNotification, BlockSource, ChainEvent, RecordNotice, ReorgNotice, RewardSchedule};
use light_wallet::error::{NetworkError, NetworkResult, SyncResult};
use light_wallet::ledger::RecordKind;
use light_wallet::network::PeerHandle;
use light_wallet::types::{Amount, BlockHash, ChainTip, Height, Identity, PeerId, RecordId, TxId};
use light_wallet::Wallet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::helpers::ErrorInjector;

const CONNECTION_CAPACITY: usize = 256;

struct MinedBlock {
    block: BlockNotification,
    transactions: Vec<SignedTransaction>,
}

#[derive(Default)]
struct NodeState {
    chain: Vec<MinedBlock>,
    mempool: BTreeMap<TxId, SignedTransaction>,
    salt: u32,
}

impl NodeState {
    fn tip(&self) -> ChainTip {
        self.chain.last().map(|mined| mined.block.tip()).unwrap_or_else(ChainTip::genesis)
    }

    fn is_confirmed(&self, tx_id: &TxId) -> bool {
        self.chain.iter().any(|mined| mined.block.confirmed_tx_ids.contains(tx_id))
    }
}

/// The pieces a wallet needs to talk to one node connection.
pub struct NodeConnection {
    pub handle: PeerHandle,
    pub events: mpsc::Receiver<ChainEvent>,
    pub source: Arc<dyn BlockSource>,
    pub inbound: JoinHandle<()>,
}

/// In-process stand-in for a full-node peer.
pub struct SimulatedFullNode {
    id: PeerId,
    schedule: Arc<dyn RewardSchedule>,
    state: Mutex<NodeState>,
    subscribers: Mutex<Vec<mpsc::Sender<ChainEvent>>>,
    failures: ErrorInjector,
}

impl SimulatedFullNode {
    pub fn new(id: u64, schedule: impl RewardSchedule + 'static) -> Arc<Self> {
        Arc::new(Self {
            id: PeerId(id),
            schedule: Arc::new(schedule),
            state: Mutex::new(NodeState::default()),
            subscribers: Mutex::new(Vec::new()),
            failures: ErrorInjector::new(),
        })
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Failure injection for `block_at`.
    pub fn failures(&self) -> &ErrorInjector {
        &self.failures
    }

    pub fn chain_tip(&self) -> ChainTip {
        self.state.lock().unwrap().tip()
    }

    pub fn block(&self, height: Height) -> Option<BlockNotification> {
        let state = self.state.lock().unwrap();
        height.checked_sub(1).and_then(|i| state.chain.get(i as usize)).map(|mined| mined.block.clone())
    }

    pub fn in_mempool(&self, tx_id: &TxId) -> bool {
        self.state.lock().unwrap().mempool.contains_key(tx_id)
    }

    pub fn mempool_len(&self) -> usize {
        self.state.lock().unwrap().mempool.len()
    }

    /// Look a transaction up in the mempool or the chain.
    pub fn get_transaction(&self, tx_id: &TxId) -> Option<SignedTransaction> {
        let state = self.state.lock().unwrap();
        state.mempool.get(tx_id).cloned().or_else(|| {
            state.chain.iter().flat_map(|mined| mined.transactions.iter()).find(|tx| tx.tx_id() == *tx_id).cloned()
        })
    }

    /// Accept a transaction into the mempool. Returns false if it is already known.
    pub fn submit_transaction(&self, tx: SignedTransaction) -> bool {
        let mut state = self.state.lock().unwrap();
        let tx_id = tx.tx_id();
        if state.is_confirmed(&tx_id) || state.mempool.contains_key(&tx_id) {
            return false;
        }
        tracing::debug!("{} accepted transaction {} into the mempool", self.id, tx_id);
        state.mempool.insert(tx_id, tx);
        true
    }

    /// Mine the next block, confirming the mempool, and announce it.
    pub async fn farm_new_block(&self, reward_to: Identity) -> BlockNotification {
        let block = {
            let mut state = self.state.lock().unwrap();
            self.mine(&mut state, reward_to)
        };
        self.broadcast(ChainEvent::Block(block.clone())).await;
        block
    }

    /// Mine `count` blocks paying `reward_to`, returning the new tip.
    pub async fn farm_blocks(&self, count: u32, reward_to: Identity) -> ChainTip {
        for _ in 0..count {
            self.farm_new_block(reward_to).await;
        }
        self.chain_tip()
    }

    /// Replace every block from `fork_height` with a competing branch ending at
    /// `new_tip_height`, then announce the reorg.
    ///
    /// Transactions from orphaned blocks return to the mempool unless they
    /// spend a record created on the orphaned branch.
    pub async fn reorg(&self, fork_height: Height, new_tip_height: Height, reward_to: Identity) -> ReorgNotice {
        assert!(fork_height >= 1, "cannot reorg genesis");
        assert!(new_tip_height + 1 >= fork_height, "new tip below the fork point");

        let notice = {
            let mut state = self.state.lock().unwrap();
            assert!(fork_height <= state.tip().height + 1, "fork point above the node tip");

            let orphaned = state.chain.split_off(fork_height as usize - 1);
            let orphaned_records: HashSet<RecordId> =
                orphaned.iter().flat_map(|mined| mined.block.records.iter().map(|r| r.id)).collect();
            for tx in orphaned.into_iter().flat_map(|mined| mined.transactions) {
                if tx.inputs().iter().any(|input| orphaned_records.contains(input)) {
                    tracing::debug!("{} dropping transaction {} spending an orphaned record", self.id, tx.tx_id());
                    continue;
                }
                state.mempool.insert(tx.tx_id(), tx);
            }

            state.salt += 1;
            while state.tip().height < new_tip_height {
                self.mine(&mut state, reward_to);
            }

            let tip = state.tip();
            ReorgNotice {
                fork_height,
                new_tip_height: tip.height,
                new_tip_hash: tip.hash,
            }
        };

        tracing::info!(
            "{} reorganized from height {} to new tip {} at {}",
            self.id,
            fork_height,
            notice.new_tip_hash,
            notice.new_tip_height
        );
        self.broadcast(ChainEvent::Reorg(notice)).await;
        notice
    }

    /// Announce the current tip without sending a block.
    pub async fn announce_tip(&self) {
        let tip = self.chain_tip();
        self.broadcast(ChainEvent::Tip(tip)).await;
    }

    /// Open a connection: transactions sent on the handle land in the mempool,
    /// chain events arrive on the receiver.
    pub fn connect(self: &Arc<Self>) -> NodeConnection {
        let (handle, mut inbound_rx) = PeerHandle::channel(self.id, CONNECTION_CAPACITY);
        let (events_tx, events) = mpsc::channel(CONNECTION_CAPACITY);
        self.subscribers.lock().unwrap().push(events_tx);

        let node = self.clone();
        let inbound = tokio::spawn(async move {
            while let Some(tx) = inbound_rx.recv().await {
                node.submit_transaction(tx);
            }
        });

        NodeConnection {
            handle,
            events,
            source: self.clone(),
            inbound,
        }
    }

    /// Connect `wallet` to this node and start its sync session.
    pub async fn attach(self: &Arc<Self>, wallet: &Wallet) -> JoinHandle<SyncResult<()>> {
        let connection = self.connect();
        wallet.on_peer_connected(connection.handle).await;
        wallet.spawn_sync_session(connection.source, connection.events)
    }

    /// Close every event stream, ending the sessions reading them.
    pub fn disconnect_all(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    fn mine(&self, state: &mut NodeState, reward_to: Identity) -> BlockNotification {
        let parent = state.tip();
        let height = parent.height + 1;

        let mut preimage = Vec::with_capacity(40);
        preimage.extend_from_slice(parent.hash.as_byte_array());
        preimage.extend_from_slice(&height.to_le_bytes());
        preimage.extend_from_slice(&state.salt.to_le_bytes());
        let hash = BlockHash::hash(&preimage);

        let transactions: Vec<SignedTransaction> = std::mem::take(&mut state.mempool).into_values().collect();
        let tx_fees: Amount = transactions.iter().map(|tx| tx.fee()).sum();
        let (base_fee, block_reward) = self.schedule.reward(height);

        let mut records = vec![
            RecordNotice {
                id: RecordId::derive(hash.as_byte_array(), 0),
                amount: block_reward,
                kind: RecordKind::Reward,
                owner: reward_to,
            },
            RecordNotice {
                id: RecordId::derive(hash.as_byte_array(), 1),
                amount: base_fee + tx_fees,
                kind: RecordKind::Fee,
                owner: reward_to,
            },
        ];
        for tx in &transactions {
            let tx_id = tx.tx_id();
            records.extend(tx.outputs().iter().enumerate().map(|(index, output)| RecordNotice {
                id: RecordId::for_output(&tx_id, index as u32),
                amount: output.amount,
                kind: RecordKind::Payment,
                owner: output.recipient,
            }));
        }

        let block = BlockNotification {
            height,
            hash,
            records,
            confirmed_tx_ids: transactions.iter().map(|tx| tx.tx_id()).collect(),
        };
        tracing::debug!("{} farmed block {} at height {} with {} transactions", self.id, hash, height, transactions.len());
        state.chain.push(MinedBlock {
            block: block.clone(),
            transactions,
        });
        block
    }

    async fn broadcast(&self, event: ChainEvent) {
        let subscribers = self.subscribers.lock().unwrap().clone();
        for subscriber in subscribers {
            // A closed stream belongs to a finished session.
            let _ = subscriber.send(event.clone()).await;
        }
        self.subscribers.lock().unwrap().retain(|s| !s.is_closed());
    }
}

#[async_trait]
impl BlockSource for SimulatedFullNode {
    fn peer_id(&self) -> PeerId {
        self.id
    }

    async fn tip(&self) -> NetworkResult<ChainTip> {
        Ok(self.chain_tip())
    }

    async fn block_at(&self, height: Height) -> NetworkResult<BlockNotification> {
        if self.failures.should_fail() {
            return Err(NetworkError::PeerDisconnected(self.id));
        }
        self.block(height).ok_or(NetworkError::BlockUnavailable {
            peer: self.id,
            height,
        })
    }
}
