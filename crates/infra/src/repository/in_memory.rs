use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};

use quotedesk_core::{ExpectedVersion, OfferId, OfferItemId, UserId};
use quotedesk_offers::{Offer, OfferHeader, OfferItem, RevisionLink, Sale};

use super::query::{OfferFilter, OfferPage, OfferSummary, Pagination};
use super::r#trait::{OfferStore, StoreError, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct StoreState {
    offers: HashMap<OfferId, OfferHeader>,
    items: BTreeMap<OfferItemId, OfferItem>,
    revisions: Vec<RevisionLink>,
    sales: HashMap<OfferId, Sale>,
}

impl StoreState {
    fn offer(&self, id: OfferId) -> Option<Offer> {
        let header = self.offers.get(&id)?.clone();
        let items = self
            .items
            .values()
            .filter(|item| item.offer_id == id)
            .cloned()
            .collect();
        Some(Offer::from_storage(header, items))
    }

    fn item_count(&self, id: OfferId) -> u64 {
        self.items.values().filter(|item| item.offer_id == id).count() as u64
    }
}

/// In-memory offer store.
///
/// Intended for tests/dev. Transactions are fully serialized by a single
/// writer lock; each one works on a private copy of the state that replaces
/// the committed state on commit. Readers only ever see committed state.
#[derive(Debug, Default)]
pub struct InMemoryOfferStore {
    committed: Arc<RwLock<StoreState>>,
    writer: Arc<Mutex<()>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryOfferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make the next commit fail with a transient error, as a dropped
    /// connection would.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreState>, StoreError> {
        self.committed
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl OfferStore for InMemoryOfferStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.writer.clone().lock_owned().await;
        let working = self.read()?.clone();
        tracing::debug!("in-memory transaction started");

        Ok(Box::new(InMemoryUnitOfWork {
            _guard: guard,
            committed: self.committed.clone(),
            fail_commit: self.fail_next_commit.clone(),
            working,
        }))
    }

    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        Ok(self.read()?.offer(id))
    }

    async fn list_offers(
        &self,
        filter: &OfferFilter,
        pagination: Pagination,
    ) -> Result<OfferPage, StoreError> {
        let state = self.read()?;

        let mut matching: Vec<&OfferHeader> = state
            .offers
            .values()
            .filter(|header| filter.matches(header))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let offers = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .map(|header| OfferSummary {
                header: header.clone(),
                item_count: state.item_count(header.id),
            })
            .collect();

        Ok(OfferPage::new(offers, total, pagination))
    }

    async fn revisions_of(&self, original: OfferId) -> Result<Vec<RevisionLink>, StoreError> {
        let state = self.read()?;
        let mut links: Vec<RevisionLink> = state
            .revisions
            .iter()
            .filter(|link| link.original_offer_id == original)
            .cloned()
            .collect();
        links.sort_by_key(|link| link.revision_number);
        Ok(links)
    }

    async fn sale_for_offer(&self, offer_id: OfferId) -> Result<Option<Sale>, StoreError> {
        Ok(self.read()?.sales.get(&offer_id).cloned())
    }
}

struct InMemoryUnitOfWork {
    // Held for the lifetime of the transaction; serializes all writers.
    _guard: OwnedMutexGuard<()>,
    committed: Arc<RwLock<StoreState>>,
    fail_commit: Arc<AtomicBool>,
    working: StoreState,
}

#[async_trait::async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_offer(&mut self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        Ok(self.working.offer(id))
    }

    async fn next_offer_number(&mut self, owner: UserId) -> Result<u64, StoreError> {
        let current = self
            .working
            .offers
            .values()
            .filter(|header| header.owner_id == owner)
            .map(|header| header.offer_number)
            .max()
            .unwrap_or(0);
        Ok(current + 1)
    }

    async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
        let header = offer.header();
        if self.working.offers.contains_key(&header.id) {
            return Err(StoreError::Conflict(format!("offer {} already exists", header.id)));
        }
        if self
            .working
            .offers
            .values()
            .any(|h| h.owner_id == header.owner_id && h.offer_number == header.offer_number)
        {
            return Err(StoreError::Conflict(format!(
                "offer number {} already taken for owner {}",
                header.offer_number, header.owner_id
            )));
        }

        let mut stored = header.clone();
        stored.version = 1;
        self.working.offers.insert(stored.id, stored);
        for item in offer.items() {
            self.insert_item(item).await?;
        }
        Ok(())
    }

    async fn save_header(
        &mut self,
        header: &OfferHeader,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let stored = self
            .working
            .offers
            .get_mut(&header.id)
            .ok_or_else(|| StoreError::Missing(format!("offer {}", header.id)))?;

        if !expected.matches(stored.version) {
            return Err(StoreError::Conflict(format!(
                "offer {}: expected {expected:?}, found {}",
                header.id, stored.version
            )));
        }

        let version = stored.version + 1;
        // The lock flag never reverts, whatever the caller sends.
        let is_locked = stored.is_locked || header.is_locked;
        *stored = OfferHeader {
            is_locked,
            version,
            ..header.clone()
        };
        Ok(version)
    }

    async fn insert_item(&mut self, item: &OfferItem) -> Result<(), StoreError> {
        if !self.working.offers.contains_key(&item.offer_id) {
            return Err(StoreError::Missing(format!("offer {}", item.offer_id)));
        }
        if self.working.items.contains_key(&item.id) {
            return Err(StoreError::Conflict(format!("offer item {} already exists", item.id)));
        }
        self.working.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_item(&mut self, item: &OfferItem) -> Result<(), StoreError> {
        match self.working.items.get_mut(&item.id) {
            Some(stored) if stored.offer_id == item.offer_id => {
                *stored = item.clone();
                Ok(())
            }
            _ => Err(StoreError::Missing(format!("offer item {}", item.id))),
        }
    }

    async fn delete_item(&mut self, offer_id: OfferId, item_id: OfferItemId) -> Result<(), StoreError> {
        let owned = self
            .working
            .items
            .get(&item_id)
            .is_some_and(|stored| stored.offer_id == offer_id);
        if !owned {
            return Err(StoreError::Missing(format!("offer item {item_id}")));
        }
        self.working.items.remove(&item_id);
        Ok(())
    }

    async fn max_revision_number(&mut self, original: OfferId) -> Result<Option<u32>, StoreError> {
        Ok(self
            .working
            .revisions
            .iter()
            .filter(|link| link.original_offer_id == original)
            .map(|link| link.revision_number)
            .max())
    }

    async fn insert_revision(&mut self, link: &RevisionLink) -> Result<(), StoreError> {
        if self.working.revisions.iter().any(|existing| {
            existing.original_offer_id == link.original_offer_id
                && existing.revision_number == link.revision_number
        }) {
            return Err(StoreError::Conflict(format!(
                "revision {} of offer {} already exists",
                link.revision_number, link.original_offer_id
            )));
        }
        self.working.revisions.push(link.clone());
        Ok(())
    }

    async fn sale_for_offer(&mut self, offer_id: OfferId) -> Result<Option<Sale>, StoreError> {
        Ok(self.working.sales.get(&offer_id).cloned())
    }

    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        if self.working.sales.contains_key(&sale.offer_id) {
            return Err(StoreError::Conflict(format!("sale for offer {} already exists", sale.offer_id)));
        }
        self.working.sales.insert(sale.offer_id, sale.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnitOfWork {
            _guard,
            committed,
            fail_commit,
            working,
        } = *self;

        if fail_commit.swap(false, Ordering::SeqCst) {
            tracing::debug!("in-memory transaction failed on commit");
            return Err(StoreError::Transient("injected commit failure".to_string()));
        }

        let mut state = committed
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        *state = working;
        tracing::debug!("in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        tracing::debug!("in-memory transaction rolled back");
        Ok(())
    }
}
