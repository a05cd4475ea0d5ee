//! Reward state storage interface and in-memory implementation.
//!
//! Provides the [`RewardStore`] trait holding every mutable record the
//! controller owns: the controller state, one [`Period`] per entered period,
//! one [`Pool`] per registered pool and one [`Position`] per
//! (pool, participant) pair. All single-entity reads are direct key lookups.
//!
//! Writes can be grouped into a transaction with
//! [`begin`](RewardStore::begin) / [`commit`](RewardStore::commit) /
//! [`rollback`](RewardStore::rollback). While a transaction is open the store
//! keeps undo data for every overwritten record, so a failed operation leaves
//! no trace.

use std::collections::{BTreeMap, HashMap};

use crate::constants::SNAPSHOT_VERSION;
use crate::error::StoreError;
use crate::types::{Address, ControllerState, Period, Pool, PoolId, Position};

/// Mutable reward state storage interface.
///
/// Not thread-safe; callers serialize access (see the controller's shared
/// handle).
pub trait RewardStore: Send {
    /// Controller-wide state.
    fn state(&self) -> &ControllerState;

    fn set_state(&mut self, state: ControllerState);

    /// Period record by index. `None` if the clock never recorded it.
    fn period(&self, index: u64) -> Option<Period>;

    fn put_period(&mut self, period: Period);

    /// Pool record by identity. `None` if never registered.
    fn pool(&self, id: &PoolId) -> Option<Pool>;

    /// Insert or overwrite a pool. New identities are appended to the
    /// registration order.
    fn put_pool(&mut self, pool: Pool);

    /// Registered pool identities in registration order.
    fn pool_ids(&self) -> Vec<PoolId>;

    /// Number of registered pools.
    fn pool_count(&self) -> usize {
        self.pool_ids().len()
    }

    /// A participant's position. Unknown pairs read as an empty position.
    fn position(&self, pool: &PoolId, participant: &Address) -> Position;

    fn put_position(&mut self, pool: &PoolId, participant: &Address, position: Position);

    /// Every participant with a stored position in `pool`.
    fn participants(&self, pool: &PoolId) -> Vec<Address>;

    /// Open a transaction. Calling `begin` while one is open nests it; only
    /// the outermost `commit` discards undo data.
    fn begin(&mut self);

    /// Close the innermost open transaction, keeping its writes.
    fn commit(&mut self);

    /// Undo every write since the outermost `begin` and close all transactions.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NoTransaction`] if no transaction is open
    fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Undo record for one overwritten entry.
#[derive(Clone, Debug)]
enum Undo {
    State(ControllerState),
    Period(u64, Option<Period>),
    Pool(PoolId, Option<Pool>),
    Position(PoolId, Address, Option<Position>),
}

/// Encoded form of a [`MemoryRewardStore`].
#[derive(bincode::Encode, bincode::Decode)]
struct Snapshot {
    version: u32,
    state: ControllerState,
    periods: Vec<Period>,
    pools: Vec<Pool>,
    positions: Vec<(PoolId, Address, Position)>,
}

/// In-memory reward state.
///
/// Periods and positions live in ordered maps so snapshots are deterministic.
#[derive(Clone, Debug)]
pub struct MemoryRewardStore {
    state: ControllerState,
    periods: BTreeMap<u64, Period>,
    pools: HashMap<PoolId, Pool>,
    /// Pool identities in registration order.
    pool_order: Vec<PoolId>,
    positions: BTreeMap<(PoolId, Address), Position>,
    /// Undo log for the open transaction, oldest first.
    journal: Vec<Undo>,
    /// Open transaction depth. Zero means writes are not journaled.
    depth: usize,
}

impl MemoryRewardStore {
    /// Create an empty store around an initial controller state.
    pub fn new(state: ControllerState) -> Self {
        Self {
            state,
            periods: BTreeMap::new(),
            pools: HashMap::new(),
            pool_order: Vec::new(),
            positions: BTreeMap::new(),
            journal: Vec::new(),
            depth: 0,
        }
    }

    /// Number of stored period records.
    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    /// Every stored period record in index order.
    pub fn periods(&self) -> Vec<Period> {
        self.periods.values().cloned().collect()
    }

    /// Number of stored positions across all pools.
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Whether a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    fn record(&mut self, undo: Undo) {
        if self.depth > 0 {
            self.journal.push(undo);
        }
    }

    /// Encode the committed contents as a versioned bincode snapshot.
    ///
    /// Undo data of an open transaction is not part of the snapshot.
    pub fn encode_snapshot(&self) -> Result<Vec<u8>, StoreError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            state: self.state.clone(),
            periods: self.periods.values().cloned().collect(),
            pools: self
                .pool_order
                .iter()
                .filter_map(|id| self.pools.get(id).cloned())
                .collect(),
            positions: self
                .positions
                .iter()
                .map(|((pool, who), pos)| (*pool, *who, *pos))
                .collect(),
        };
        bincode::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| StoreError::Encode(e.to_string()))
    }

    /// Rebuild a store from [`encode_snapshot`](Self::encode_snapshot) output.
    pub fn decode_snapshot(bytes: &[u8]) -> Result<Self, StoreError> {
        let (snapshot, _): (Snapshot, _) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| StoreError::Decode(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Version(snapshot.version));
        }

        let mut store = Self::new(snapshot.state);
        for period in snapshot.periods {
            store.periods.insert(period.index, period);
        }
        for pool in snapshot.pools {
            store.pool_order.push(pool.id);
            store.pools.insert(pool.id, pool);
        }
        for (pool, who, pos) in snapshot.positions {
            store.positions.insert((pool, who), pos);
        }
        Ok(store)
    }
}

impl RewardStore for MemoryRewardStore {
    fn state(&self) -> &ControllerState {
        &self.state
    }

    fn set_state(&mut self, state: ControllerState) {
        let previous = std::mem::replace(&mut self.state, state);
        self.record(Undo::State(previous));
    }

    fn period(&self, index: u64) -> Option<Period> {
        self.periods.get(&index).cloned()
    }

    fn put_period(&mut self, period: Period) {
        let index = period.index;
        let previous = self.periods.insert(index, period);
        self.record(Undo::Period(index, previous));
    }

    fn pool(&self, id: &PoolId) -> Option<Pool> {
        self.pools.get(id).cloned()
    }

    fn put_pool(&mut self, pool: Pool) {
        let id = pool.id;
        let previous = self.pools.insert(id, pool);
        if previous.is_none() {
            self.pool_order.push(id);
        }
        self.record(Undo::Pool(id, previous));
    }

    fn pool_ids(&self) -> Vec<PoolId> {
        self.pool_order.clone()
    }

    fn pool_count(&self) -> usize {
        self.pool_order.len()
    }

    fn position(&self, pool: &PoolId, participant: &Address) -> Position {
        self.positions
            .get(&(*pool, *participant))
            .copied()
            .unwrap_or_default()
    }

    fn put_position(&mut self, pool: &PoolId, participant: &Address, position: Position) {
        let previous = self.positions.insert((*pool, *participant), position);
        self.record(Undo::Position(*pool, *participant, previous));
    }

    fn participants(&self, pool: &PoolId) -> Vec<Address> {
        let lo = (*pool, Address([0x00; 20]));
        let hi = (*pool, Address([0xff; 20]));
        self.positions.range(lo..=hi).map(|((_, who), _)| *who).collect()
    }

    fn begin(&mut self) {
        self.depth += 1;
    }

    fn commit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if self.depth == 0 {
            return Err(StoreError::NoTransaction);
        }
        // Stop journaling before replaying undo data.
        self.depth = 0;
        let journal = std::mem::take(&mut self.journal);
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::State(state) => self.state = state,
                Undo::Period(index, Some(period)) => {
                    self.periods.insert(index, period);
                }
                Undo::Period(index, None) => {
                    self.periods.remove(&index);
                }
                Undo::Pool(id, Some(pool)) => {
                    self.pools.insert(id, pool);
                }
                Undo::Pool(id, None) => {
                    self.pools.remove(&id);
                    if let Some(pos) = self.pool_order.iter().rposition(|p| *p == id) {
                        self.pool_order.remove(pos);
                    }
                }
                Undo::Position(pool, who, Some(position)) => {
                    self.positions.insert((pool, who), position);
                }
                Undo::Position(pool, who, None) => {
                    self.positions.remove(&(pool, who));
                }
            }
        }
        Ok(())
    }
}
