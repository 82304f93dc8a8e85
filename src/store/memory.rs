//! In-memory store backed by `DashMap`.
//!
//! Used by the test suite and for local runs without Redis. Can be switched
//! into an "unavailable" mode to exercise failure policies.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::domain::{Account, ClientWindow, LiquidType, Tap};
use crate::store::{Store, StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    accounts: DashMap<String, Account>,
    windows: DashMap<String, ClientWindow>,
    audit: Mutex<VecDeque<String>>,
    taps: DashMap<String, Tap>,
    tap_ids: Mutex<Vec<String>>,
    categories: DashMap<LiquidType, BTreeSet<String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Ids currently indexed under a category.
    pub fn category_ids(&self, category: LiquidType) -> Vec<String> {
        self.categories
            .get(&category)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Backend("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> StoreResult<MutexGuard<'a, T>> {
        mutex
            .lock()
            .map_err(|_| StoreError::Backend(format!("{what} lock poisoned")))
    }

    fn index(&self, category: LiquidType, id: &str) {
        self.categories
            .entry(category)
            .or_default()
            .insert(id.to_string());
    }

    fn unindex(&self, category: LiquidType, id: &str) {
        if let Some(mut set) = self.categories.get_mut(&category) {
            set.remove(id);
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.available()
    }

    async fn get_account(&self, email: &str) -> StoreResult<Option<Account>> {
        self.available()?;
        Ok(self.accounts.get(email).map(|r| r.value().clone()))
    }

    async fn create_account(&self, account: &Account) -> StoreResult<bool> {
        self.available()?;
        match self.accounts.entry(account.email.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                Ok(true)
            }
        }
    }

    async fn save_account(&self, account: &Account) -> StoreResult<()> {
        self.available()?;
        self.accounts.insert(account.email.clone(), account.clone());
        Ok(())
    }

    async fn delete_account(&self, email: &str) -> StoreResult<bool> {
        self.available()?;
        Ok(self.accounts.remove(email).is_some())
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        self.available()?;
        Ok(self.accounts.iter().map(|r| r.value().clone()).collect())
    }

    async fn count_accounts(&self) -> StoreResult<usize> {
        self.available()?;
        Ok(self.accounts.len())
    }

    async fn get_window(&self, address: &str) -> StoreResult<Option<ClientWindow>> {
        self.available()?;
        Ok(self.windows.get(address).map(|r| *r.value()))
    }

    async fn swap_window(
        &self,
        address: &str,
        expected: Option<u64>,
        next: &ClientWindow,
    ) -> StoreResult<bool> {
        self.available()?;
        match (self.windows.entry(address.to_string()), expected) {
            (Entry::Vacant(slot), None) => {
                slot.insert(*next);
                Ok(true)
            }
            (Entry::Occupied(mut slot), Some(version)) if slot.get().version == version => {
                slot.insert(*next);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_window(&self, address: &str) -> StoreResult<bool> {
        self.available()?;
        Ok(self.windows.remove(address).is_some())
    }

    async fn append_audit(&self, address: &str, capacity: usize) -> StoreResult<()> {
        self.available()?;
        let mut audit = Self::lock(&self.audit, "audit")?;
        audit.push_back(address.to_string());
        while audit.len() > capacity {
            audit.pop_front();
        }
        Ok(())
    }

    async fn recent_audit(&self, limit: usize) -> StoreResult<Vec<String>> {
        self.available()?;
        let audit = Self::lock(&self.audit, "audit")?;
        let skip = audit.len().saturating_sub(limit);
        Ok(audit.iter().skip(skip).cloned().collect())
    }

    async fn get_tap(&self, id: &str) -> StoreResult<Option<Tap>> {
        self.available()?;
        Ok(self.taps.get(id).map(|r| r.value().clone()))
    }

    async fn list_taps(&self) -> StoreResult<Vec<Tap>> {
        self.available()?;
        let ids = Self::lock(&self.tap_ids, "tap id")?;
        Ok(ids
            .iter()
            .filter_map(|id| self.taps.get(id).map(|r| r.value().clone()))
            .collect())
    }

    async fn list_taps_in_category(&self, category: LiquidType) -> StoreResult<Vec<Tap>> {
        let members = self.category_ids(category);
        Ok(self
            .list_taps()
            .await?
            .into_iter()
            .filter(|tap| members.contains(&tap.id))
            .collect())
    }

    async fn create_tap(&self, tap: &Tap) -> StoreResult<()> {
        self.available()?;
        self.taps.insert(tap.id.clone(), tap.clone());
        Self::lock(&self.tap_ids, "tap id")?.push(tap.id.clone());
        self.index(tap.liquid_type, &tap.id);
        Ok(())
    }

    async fn save_tap(&self, tap: &Tap, previous_category: LiquidType) -> StoreResult<()> {
        self.available()?;
        self.taps.insert(tap.id.clone(), tap.clone());
        if previous_category != tap.liquid_type {
            self.unindex(previous_category, &tap.id);
            self.index(tap.liquid_type, &tap.id);
        }
        Ok(())
    }

    async fn delete_tap(&self, id: &str) -> StoreResult<bool> {
        self.available()?;
        let Some((_, tap)) = self.taps.remove(id) else {
            return Ok(false);
        };
        Self::lock(&self.tap_ids, "tap id")?.retain(|existing| existing != id);
        self.unindex(tap.liquid_type, id);
        Ok(true)
    }
}
