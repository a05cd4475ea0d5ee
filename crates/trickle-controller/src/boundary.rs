//! In-memory adapters for the controller's external collaborators.
//!
//! These back the CLI simulator and the test suites. Each one keeps its
//! state behind a `parking_lot` lock so it can be shared as `Arc<dyn _>`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use trickle_core::error::BoundaryError;
use trickle_core::traits::{AdminRegistry, SecondaryRewarder, TokenAuthority, Treasury};
use trickle_core::types::{Address, Asset, PoolId};

/// The collaborators a controller calls out to.
#[derive(Clone)]
pub struct Boundaries {
    pub token: Arc<dyn TokenAuthority>,
    pub admin: Arc<dyn AdminRegistry>,
    pub treasury: Arc<dyn Treasury>,
    pub secondary: Option<Arc<dyn SecondaryRewarder>>,
}

impl Boundaries {
    pub fn new(
        token: Arc<dyn TokenAuthority>,
        admin: Arc<dyn AdminRegistry>,
        treasury: Arc<dyn Treasury>,
    ) -> Self {
        Self { token, admin, treasury, secondary: None }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn SecondaryRewarder>) -> Self {
        self.secondary = Some(secondary);
        self
    }
}

/// A capped reward token that records balances in memory.
#[derive(Debug)]
pub struct MemoryTokenAuthority {
    token: Address,
    cap: u128,
    inner: Mutex<Minted>,
}

#[derive(Debug, Default)]
struct Minted {
    total: u128,
    balances: HashMap<Address, u128>,
}

impl MemoryTokenAuthority {
    pub fn new(token: Address, cap: u128) -> Self {
        Self { token, cap, inner: Mutex::new(Minted::default()) }
    }

    pub fn balance_of(&self, who: &Address) -> u128 {
        self.inner.lock().balances.get(who).copied().unwrap_or(0)
    }

    pub fn total_minted(&self) -> u128 {
        self.inner.lock().total
    }

    pub fn cap(&self) -> u128 {
        self.cap
    }
}

impl TokenAuthority for MemoryTokenAuthority {
    fn reward_token(&self) -> Address {
        self.token
    }

    fn mint(&self, to: &Address, amount: u128) -> Result<(), BoundaryError> {
        let mut inner = self.inner.lock();
        let total = inner
            .total
            .checked_add(amount)
            .filter(|t| *t <= self.cap)
            .ok_or_else(|| {
                BoundaryError::MintRejected(format!(
                    "supply cap {} exceeded: minted {} + {}",
                    self.cap, inner.total, amount
                ))
            })?;
        inner.total = total;
        *inner.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }
}

/// An admin registry whose admin can be replaced at any time.
#[derive(Debug)]
pub struct MemoryAdminRegistry {
    admin: RwLock<Address>,
}

impl MemoryAdminRegistry {
    pub fn new(admin: Address) -> Self {
        Self { admin: RwLock::new(admin) }
    }

    /// Hand the admin role to `admin`. Takes effect on the next privileged call.
    pub fn set_admin(&self, admin: Address) {
        *self.admin.write() = admin;
    }
}

impl AdminRegistry for MemoryAdminRegistry {
    fn current_admin(&self) -> Address {
        *self.admin.read()
    }
}

/// Balances held by the controller, with a record of outgoing transfers.
#[derive(Debug, Default)]
pub struct MemoryTreasury {
    balances: Mutex<HashMap<Asset, u128>>,
    received: Mutex<HashMap<(Asset, Address), u128>>,
}

impl MemoryTreasury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit the controller with `amount` of `asset`.
    pub fn deposit(&self, asset: Asset, amount: u128) {
        *self.balances.lock().entry(asset).or_insert(0) += amount;
    }

    /// Total of `asset` transferred out to `to`.
    pub fn received(&self, asset: &Asset, to: &Address) -> u128 {
        self.received.lock().get(&(*asset, *to)).copied().unwrap_or(0)
    }
}

impl Treasury for MemoryTreasury {
    fn balance_of(&self, asset: &Asset) -> u128 {
        self.balances.lock().get(asset).copied().unwrap_or(0)
    }

    fn transfer(&self, asset: &Asset, to: &Address, amount: u128) -> Result<(), BoundaryError> {
        let mut balances = self.balances.lock();
        let balance = balances.entry(*asset).or_insert(0);
        if *balance < amount {
            return Err(BoundaryError::TransferFailed(format!(
                "{asset}: balance {} < {amount}",
                *balance
            )));
        }
        *balance -= amount;
        *self.received.lock().entry((*asset, *to)).or_insert(0) += amount;
        Ok(())
    }
}

/// A secondary rewarder that mirrors the latest share count per participant.
#[derive(Debug, Default)]
pub struct RecordingRewarder {
    shares: Mutex<HashMap<(PoolId, Address), u128>>,
    collections: Mutex<u64>,
}

impl RecordingRewarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shares(&self, pool: &PoolId, who: &Address) -> u128 {
        self.shares.lock().get(&(*pool, *who)).copied().unwrap_or(0)
    }

    pub fn collections(&self) -> u64 {
        *self.collections.lock()
    }
}

impl SecondaryRewarder for RecordingRewarder {
    fn on_shares_changed(
        &self,
        pool: &PoolId,
        participant: &Address,
        shares: u128,
    ) -> Result<(), BoundaryError> {
        self.shares.lock().insert((*pool, *participant), shares);
        Ok(())
    }

    fn on_collect(
        &self,
        _pool: &PoolId,
        _participant: &Address,
        _to: &Address,
        _amount: u128,
    ) -> Result<(), BoundaryError> {
        *self.collections.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address([0xEE; 20]);

    #[test]
    fn mint_tracks_balances_and_total() {
        let auth = MemoryTokenAuthority::new(TOKEN, 1_000);
        auth.mint(&Address([1; 20]), 300).unwrap();
        auth.mint(&Address([1; 20]), 200).unwrap();
        assert_eq!(auth.balance_of(&Address([1; 20])), 500);
        assert_eq!(auth.total_minted(), 500);
    }

    #[test]
    fn mint_rejects_past_cap() {
        let auth = MemoryTokenAuthority::new(TOKEN, 1_000);
        auth.mint(&Address([1; 20]), 900).unwrap();
        assert!(matches!(
            auth.mint(&Address([1; 20]), 101),
            Err(BoundaryError::MintRejected(_))
        ));
        assert_eq!(auth.total_minted(), 900);
    }

    #[test]
    fn admin_can_be_replaced() {
        let registry = MemoryAdminRegistry::new(Address([1; 20]));
        registry.set_admin(Address([2; 20]));
        assert_eq!(registry.current_admin(), Address([2; 20]));
    }

    #[test]
    fn treasury_transfer_moves_balance() {
        let treasury = MemoryTreasury::new();
        treasury.deposit(Asset::Native, 50);
        treasury.transfer(&Asset::Native, &Address([3; 20]), 20).unwrap();
        assert_eq!(treasury.balance_of(&Asset::Native), 30);
        assert_eq!(treasury.received(&Asset::Native, &Address([3; 20])), 20);
    }

    #[test]
    fn treasury_rejects_overdraft() {
        let treasury = MemoryTreasury::new();
        assert!(treasury.transfer(&Asset::Native, &Address([3; 20]), 1).is_err());
    }
}
