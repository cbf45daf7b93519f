//! Engine tests against the in-memory store and catalog.
//!
//! Verifies:
//! - totals always follow the items and survive rejected mutations
//! - the lock is one-way and gates every item mutation
//! - per-owner numbering and revision numbering stay unique under parallel load
//! - a failed commit leaves no trace

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use quotedesk_auth::Actor;
    use quotedesk_core::{ClientId, OfferId, OfferItemId, ProductId, UserId};
    use quotedesk_offers::{ItemInput, Offer, OfferStatus};

    use crate::catalog::InMemoryCatalog;
    use crate::config::EngineSettings;
    use crate::engine::{OfferEngine, OfferError};
    use crate::repository::{InMemoryOfferStore, OfferFilter, Pagination};

    type Engine = OfferEngine<Arc<InMemoryOfferStore>, Arc<InMemoryCatalog>>;

    struct Fixture {
        engine: Arc<Engine>,
        store: Arc<InMemoryOfferStore>,
        catalog: Arc<InMemoryCatalog>,
        client: ClientId,
        product: ProductId,
        owner: Actor,
    }

    fn setup() -> Fixture {
        quotedesk_observability::init();

        let client = ClientId::new();
        let product = ProductId::new();
        let store = InMemoryOfferStore::arc();
        let catalog = Arc::new(
            InMemoryCatalog::new()
                .with_client(client, true)
                .with_product(product, true, Some(dec!(12.50))),
        );
        let engine = Arc::new(OfferEngine::new(
            store.clone(),
            catalog.clone(),
            EngineSettings::default(),
        ));

        Fixture {
            engine,
            store,
            catalog,
            client,
            product,
            owner: Actor::user(UserId::new()),
        }
    }

    fn line(product: ProductId, quantity: Decimal, price: Decimal, discount: Decimal) -> ItemInput {
        ItemInput::new(product, quantity, price, discount)
    }

    impl Fixture {
        async fn draft(&self) -> Offer {
            self.engine
                .create_offer(&self.owner, self.client, None)
                .await
                .unwrap()
        }

        /// The two-line offer: 2 x 100 at 10% off, 1 x 50.
        async fn priced_offer(&self) -> Offer {
            let offer = self.draft().await;
            self.engine
                .add_item(&self.owner, offer.id_typed(), line(self.product, dec!(2), dec!(100), dec!(10)))
                .await
                .unwrap();
            self.engine
                .add_item(&self.owner, offer.id_typed(), line(self.product, dec!(1), dec!(50), dec!(0)))
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn create_offer_starts_an_empty_draft() {
        let fx = setup();

        let offer = fx.draft().await;

        assert_eq!(offer.offer_number(), 1);
        assert_eq!(offer.owner_id(), fx.owner.id);
        assert_eq!(offer.status(), OfferStatus::Draft);
        assert!(!offer.is_locked());
        assert_eq!(offer.tax_rate(), dec!(20));
        assert_eq!(offer.totals().total_with_tax, Decimal::ZERO);
        assert_eq!(fx.engine.get_offer(offer.id_typed()).await.unwrap(), offer);
    }

    #[tokio::test]
    async fn create_offer_rejects_unknown_or_inactive_clients() {
        let fx = setup();
        let inactive = ClientId::new();
        fx.catalog.put_client(inactive, false).unwrap();

        for client in [ClientId::new(), inactive] {
            let err = fx.engine.create_offer(&fx.owner, client, None).await.unwrap_err();
            assert_eq!(err, OfferError::ClientNotFound);
        }
    }

    #[tokio::test]
    async fn create_offer_validates_tax_rate_before_writing() {
        let fx = setup();

        let err = fx
            .engine
            .create_offer(&fx.owner, fx.client, Some(dec!(101)))
            .await
            .unwrap_err();

        assert!(matches!(err, OfferError::InvalidInput(_)));
        let page = fx
            .engine
            .list_offers(&OfferFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn two_line_example_produces_expected_totals() {
        let fx = setup();

        let offer = fx.priced_offer().await;

        assert_eq!(offer.totals().total_amount, dec!(230));
        assert_eq!(offer.totals().total_discount, dec!(20));
        assert_eq!(offer.totals().total_with_tax, dec!(276.00));
        assert_eq!(offer.items().len(), 2);
        assert_eq!(offer.items()[0].line_total, dec!(180));

        let stored = fx.engine.get_offer(offer.id_typed()).await.unwrap();
        assert_eq!(stored.totals(), offer.totals());
    }

    #[tokio::test]
    async fn update_and_remove_recompute_totals() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        let first = offer.items()[0].id;
        let second = offer.items()[1].id;

        let offer = fx
            .engine
            .update_item(&fx.owner, offer.id_typed(), first, dec!(1), dec!(100), dec!(0))
            .await
            .unwrap();
        assert_eq!(offer.totals().total_amount, dec!(150));
        assert_eq!(offer.totals().total_discount, dec!(0));
        assert_eq!(offer.totals().total_with_tax, dec!(180.00));

        let offer = fx
            .engine
            .remove_item(&fx.owner, offer.id_typed(), second)
            .await
            .unwrap();
        assert_eq!(offer.items().len(), 1);
        assert_eq!(offer.totals().total_amount, dec!(100));

        let offer = fx
            .engine
            .remove_item(&fx.owner, offer.id_typed(), first)
            .await
            .unwrap();
        assert!(offer.items().is_empty());
        assert_eq!(offer.totals().total_with_tax, Decimal::ZERO);
    }

    #[tokio::test]
    async fn invalid_line_input_is_rejected() {
        let fx = setup();
        let offer = fx.draft().await;

        for input in [
            line(fx.product, dec!(0), dec!(10), dec!(0)),
            line(fx.product, dec!(1), dec!(-1), dec!(0)),
            line(fx.product, dec!(1), dec!(10), dec!(150)),
            line(fx.product, dec!(0.005), dec!(10), dec!(0)),
        ] {
            let err = fx
                .engine
                .add_item(&fx.owner, offer.id_typed(), input)
                .await
                .unwrap_err();
            assert!(matches!(err, OfferError::InvalidInput(_)), "{err:?}");
        }

        assert!(fx.engine.get_offer(offer.id_typed()).await.unwrap().items().is_empty());
    }

    #[tokio::test]
    async fn amounts_beyond_storable_range_are_rejected() {
        use quotedesk_offers::pricing::{MAX_QUANTITY, MAX_UNIT_PRICE};

        let fx = setup();
        let offer = fx.priced_offer().await;
        let item = offer.items()[0].id;

        for input in [
            line(fx.product, Decimal::MAX, Decimal::MAX, dec!(0)),
            line(fx.product, MAX_QUANTITY + dec!(0.01), dec!(1), dec!(0)),
            line(fx.product, MAX_QUANTITY, MAX_UNIT_PRICE, dec!(0)),
        ] {
            let err = fx
                .engine
                .add_item(&fx.owner, offer.id_typed(), input)
                .await
                .unwrap_err();
            assert!(matches!(err, OfferError::InvalidInput(_)), "{err:?}");
        }
        let err = fx
            .engine
            .update_item(&fx.owner, offer.id_typed(), item, MAX_QUANTITY, MAX_UNIT_PRICE, dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, OfferError::InvalidInput(_)), "{err:?}");

        let stored = fx.engine.get_offer(offer.id_typed()).await.unwrap();
        assert_eq!(stored.items(), offer.items());
        assert_eq!(stored.totals(), offer.totals());
    }

    #[tokio::test]
    async fn missing_unit_price_falls_back_to_catalog_price() {
        let fx = setup();
        let offer = fx.draft().await;
        let input = ItemInput {
            product_id: fx.product,
            quantity: dec!(2),
            unit_price: None,
            discount_percent: Decimal::ZERO,
        };

        let offer = fx.engine.add_item(&fx.owner, offer.id_typed(), input).await.unwrap();

        assert_eq!(offer.items()[0].pricing.unit_price(), dec!(12.50));
        assert_eq!(offer.totals().total_amount, dec!(25));
    }

    #[tokio::test]
    async fn missing_unit_price_without_catalog_price_is_invalid() {
        let fx = setup();
        let unpriced = ProductId::new();
        fx.catalog.put_product(unpriced, true, None).unwrap();
        let offer = fx.draft().await;
        let input = ItemInput {
            product_id: unpriced,
            quantity: dec!(1),
            unit_price: None,
            discount_percent: Decimal::ZERO,
        };

        let err = fx.engine.add_item(&fx.owner, offer.id_typed(), input).await.unwrap_err();
        assert!(matches!(err, OfferError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_or_inactive_products_are_rejected() {
        let fx = setup();
        let inactive = ProductId::new();
        fx.catalog.put_product(inactive, false, Some(dec!(1))).unwrap();
        let offer = fx.draft().await;

        for product in [ProductId::new(), inactive] {
            let err = fx
                .engine
                .add_item(&fx.owner, offer.id_typed(), line(product, dec!(1), dec!(1), dec!(0)))
                .await
                .unwrap_err();
            assert_eq!(err, OfferError::ProductNotFound);
        }
    }

    #[tokio::test]
    async fn unknown_items_and_offers_are_not_found() {
        let fx = setup();
        let offer = fx.priced_offer().await;

        let err = fx
            .engine
            .update_item(&fx.owner, offer.id_typed(), OfferItemId::new(), dec!(1), dec!(1), dec!(0))
            .await
            .unwrap_err();
        assert_eq!(err, OfferError::ItemNotFound);

        let err = fx
            .engine
            .remove_item(&fx.owner, offer.id_typed(), OfferItemId::new())
            .await
            .unwrap_err();
        assert_eq!(err, OfferError::ItemNotFound);

        assert_eq!(
            fx.engine.get_offer(OfferId::new()).await.unwrap_err(),
            OfferError::OfferNotFound
        );
        assert_eq!(
            fx.engine.lock(&fx.owner, OfferId::new()).await.unwrap_err(),
            OfferError::OfferNotFound
        );
    }

    #[tokio::test]
    async fn items_of_another_offer_cannot_be_touched() {
        let fx = setup();
        let first = fx.priced_offer().await;
        let second = fx.draft().await;
        let foreign_item = first.items()[0].id;

        let err = fx
            .engine
            .remove_item(&fx.owner, second.id_typed(), foreign_item)
            .await
            .unwrap_err();

        assert_eq!(err, OfferError::ItemNotFound);
        assert_eq!(fx.engine.get_offer(first.id_typed()).await.unwrap().items().len(), 2);
    }

    #[tokio::test]
    async fn lock_sets_flag_timestamp_and_status() {
        let fx = setup();
        let offer = fx.priced_offer().await;

        let locked = fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap();

        assert!(locked.is_locked());
        assert!(locked.locked_at().is_some());
        assert_eq!(locked.status(), OfferStatus::Locked);
        assert_eq!(locked.totals(), offer.totals());
    }

    #[tokio::test]
    async fn empty_offer_cannot_be_locked() {
        let fx = setup();
        let offer = fx.draft().await;

        let err = fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap_err();

        assert_eq!(err, OfferError::EmptyOffer);
        assert!(!fx.engine.get_offer(offer.id_typed()).await.unwrap().is_locked());
    }

    #[tokio::test]
    async fn locking_twice_fails() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap();

        let err = fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap_err();

        assert_eq!(err, OfferError::OfferLocked);
    }

    #[tokio::test]
    async fn locked_offer_rejects_item_mutations_and_keeps_totals() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        let item = offer.items()[0].id;
        let locked = fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap();

        let add = fx
            .engine
            .add_item(&fx.owner, offer.id_typed(), line(fx.product, dec!(1), dec!(1), dec!(0)))
            .await;
        let update = fx
            .engine
            .update_item(&fx.owner, offer.id_typed(), item, dec!(9), dec!(9), dec!(0))
            .await;
        let remove = fx.engine.remove_item(&fx.owner, offer.id_typed(), item).await;

        assert_eq!(add.unwrap_err(), OfferError::OfferLocked);
        assert_eq!(update.unwrap_err(), OfferError::OfferLocked);
        assert_eq!(remove.unwrap_err(), OfferError::OfferLocked);

        let stored = fx.engine.get_offer(offer.id_typed()).await.unwrap();
        assert_eq!(stored, locked);
    }

    #[tokio::test]
    async fn lock_check_comes_before_ownership_check() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap();
        let stranger = Actor::user(UserId::new());

        let err = fx
            .engine
            .add_item(&stranger, offer.id_typed(), line(fx.product, dec!(1), dec!(1), dec!(0)))
            .await
            .unwrap_err();

        assert_eq!(err, OfferError::OfferLocked);
    }

    #[tokio::test]
    async fn strangers_are_forbidden_and_admins_are_not() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        let stranger = Actor::user(UserId::new());
        let admin = Actor::admin(UserId::new());

        let err = fx
            .engine
            .add_item(&stranger, offer.id_typed(), line(fx.product, dec!(1), dec!(1), dec!(0)))
            .await
            .unwrap_err();
        assert_eq!(err, OfferError::Forbidden);
        assert_eq!(
            fx.engine.set_status(&stranger, offer.id_typed(), "past").await.unwrap_err(),
            OfferError::Forbidden
        );
        assert_eq!(
            fx.engine.lock(&stranger, offer.id_typed()).await.unwrap_err(),
            OfferError::Forbidden
        );
        assert_eq!(
            fx.engine.create_revision(&stranger, offer.id_typed()).await.unwrap_err(),
            OfferError::Forbidden
        );

        let offer = fx
            .engine
            .add_item(&admin, offer.id_typed(), line(fx.product, dec!(1), dec!(10), dec!(0)))
            .await
            .unwrap();
        assert_eq!(offer.items().len(), 3);
        assert_eq!(offer.owner_id(), fx.owner.id);
        fx.engine.lock(&admin, offer.id_typed()).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_status_is_rejected() {
        let fx = setup();
        let offer = fx.draft().await;

        let err = fx
            .engine
            .set_status(&fx.owner, offer.id_typed(), "archived")
            .await
            .unwrap_err();

        assert_eq!(err, OfferError::InvalidStatus("archived".to_string()));
    }

    #[tokio::test]
    async fn status_changes_never_unlock() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap();

        let past = fx.engine.set_status(&fx.owner, offer.id_typed(), "past").await.unwrap();
        assert_eq!(past.status(), OfferStatus::Past);
        assert!(past.is_locked());

        let draft = fx.engine.set_status(&fx.owner, offer.id_typed(), "draft").await.unwrap();
        assert_eq!(draft.status(), OfferStatus::Draft);
        assert!(draft.is_locked());

        let err = fx
            .engine
            .add_item(&fx.owner, offer.id_typed(), line(fx.product, dec!(1), dec!(1), dec!(0)))
            .await
            .unwrap_err();
        assert_eq!(err, OfferError::OfferLocked);
    }

    #[tokio::test]
    async fn status_may_change_without_locking() {
        let fx = setup();
        let offer = fx.draft().await;

        let offer = fx
            .engine
            .set_status(&fx.owner, offer.id_typed(), "locked")
            .await
            .unwrap();

        assert_eq!(offer.status(), OfferStatus::Locked);
        assert!(!offer.is_locked());
        fx.engine
            .add_item(&fx.owner, offer.id_typed(), line(fx.product, dec!(1), dec!(1), dec!(0)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn revision_copies_items_and_records_lineage() {
        let fx = setup();
        let original = fx.priced_offer().await;
        let original = fx.engine.lock(&fx.owner, original.id_typed()).await.unwrap();

        let created = fx
            .engine
            .create_revision(&fx.owner, original.id_typed())
            .await
            .unwrap();
        let revision = &created.offer;

        assert_ne!(revision.id_typed(), original.id_typed());
        assert_eq!(revision.offer_number(), 2);
        assert_eq!(revision.client_id(), original.client_id());
        assert_eq!(revision.tax_rate(), original.tax_rate());
        assert_eq!(revision.status(), OfferStatus::Draft);
        assert!(!revision.is_locked());
        assert_eq!(revision.totals(), original.totals());
        assert_eq!(revision.items().len(), original.items().len());
        for (copy, source) in revision.items().iter().zip(original.items()) {
            assert_ne!(copy.id, source.id);
            assert_eq!(copy.product_id, source.product_id);
            assert_eq!(copy.pricing, source.pricing);
            assert_eq!(copy.line_total, source.line_total);
            assert_eq!(copy.line_no, source.line_no);
        }

        assert_eq!(created.link.original_offer_id, original.id_typed());
        assert_eq!(created.link.revision_offer_id, revision.id_typed());
        assert_eq!(created.link.revision_number, 1);

        let second = fx
            .engine
            .create_revision(&fx.owner, original.id_typed())
            .await
            .unwrap();
        assert_eq!(second.link.revision_number, 2);

        let links = fx.engine.revisions_of(original.id_typed()).await.unwrap();
        let numbers: Vec<u32> = links.iter().map(|l| l.revision_number).collect();
        assert_eq!(numbers, vec![1, 2]);

        // The original is untouched.
        assert_eq!(fx.engine.get_offer(original.id_typed()).await.unwrap(), original);
        assert_eq!(
            fx.engine.get_offer(revision.id_typed()).await.unwrap(),
            *revision
        );
    }

    #[tokio::test]
    async fn revision_by_admin_is_owned_by_the_admin() {
        let fx = setup();
        let original = fx.priced_offer().await;
        let admin = Actor::admin(UserId::new());

        let created = fx.engine.create_revision(&admin, original.id_typed()).await.unwrap();

        assert_eq!(created.offer.owner_id(), admin.id);
        assert_eq!(created.offer.offer_number(), 1);
    }

    #[tokio::test]
    async fn revisions_of_unknown_offer_is_not_found() {
        let fx = setup();
        assert_eq!(
            fx.engine.revisions_of(OfferId::new()).await.unwrap_err(),
            OfferError::OfferNotFound
        );
        let offer = fx.draft().await;
        assert!(fx.engine.revisions_of(offer.id_typed()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_creations_get_unique_increasing_numbers() {
        let fx = setup();
        const N: u64 = 32;

        let mut handles = Vec::new();
        for _ in 0..N {
            let engine = fx.engine.clone();
            let owner = fx.owner.clone();
            let client = fx.client;
            handles.push(tokio::spawn(async move {
                engine.create_offer(&owner, client, None).await
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().offer_number());
        }
        numbers.sort_unstable();

        assert_eq!(numbers, (1..=N).collect::<Vec<_>>());

        // Numbering is per owner.
        let other = Actor::user(UserId::new());
        let offer = fx.engine.create_offer(&other, fx.client, None).await.unwrap();
        assert_eq!(offer.offer_number(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_revisions_get_unique_numbers() {
        let fx = setup();
        let original = fx.priced_offer().await;
        const N: u32 = 16;

        let mut handles = Vec::new();
        for _ in 0..N {
            let engine = fx.engine.clone();
            let owner = fx.owner.clone();
            let id = original.id_typed();
            handles.push(tokio::spawn(async move { engine.create_revision(&owner, id).await }));
        }

        let mut revision_numbers = Vec::new();
        let mut offer_numbers = HashSet::new();
        for handle in handles {
            let created = handle.await.unwrap().unwrap();
            revision_numbers.push(created.link.revision_number);
            offer_numbers.insert(created.offer.offer_number());
        }
        revision_numbers.sort_unstable();

        assert_eq!(revision_numbers, (1..=N).collect::<Vec<_>>());
        assert_eq!(offer_numbers.len(), N as usize);
        assert!(!offer_numbers.contains(&original.offer_number()));
        assert_eq!(fx.engine.revisions_of(original.id_typed()).await.unwrap().len(), N as usize);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_item_additions_are_not_lost() {
        let fx = setup();
        let offer = fx.draft().await;
        const N: usize = 20;

        let mut handles = Vec::new();
        for _ in 0..N {
            let engine = fx.engine.clone();
            let owner = fx.owner.clone();
            let input = line(fx.product, dec!(1), dec!(10), dec!(0));
            let id = offer.id_typed();
            handles.push(tokio::spawn(async move { engine.add_item(&owner, id, input).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = fx.engine.get_offer(offer.id_typed()).await.unwrap();
        assert_eq!(stored.items().len(), N);
        assert_eq!(stored.totals().total_amount, dec!(200));
        let line_numbers: HashSet<u32> = stored.items().iter().map(|i| i.line_no).collect();
        assert_eq!(line_numbers.len(), N);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_partial_state() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        let before = fx.engine.get_offer(offer.id_typed()).await.unwrap();

        fx.store.fail_next_commit();
        let err = fx
            .engine
            .add_item(&fx.owner, offer.id_typed(), line(fx.product, dec!(5), dec!(5), dec!(0)))
            .await
            .unwrap_err();

        assert!(matches!(err, OfferError::TransientStore(_)));
        assert!(err.is_retryable());
        assert_eq!(fx.engine.get_offer(offer.id_typed()).await.unwrap(), before);

        fx.store.fail_next_commit();
        let err = fx
            .engine
            .create_revision(&fx.owner, offer.id_typed())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(fx.engine.revisions_of(offer.id_typed()).await.unwrap().is_empty());
        let page = fx
            .engine
            .list_offers(&OfferFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        // A retry goes through.
        let retried = fx
            .engine
            .add_item(&fx.owner, offer.id_typed(), line(fx.product, dec!(5), dec!(5), dec!(0)))
            .await
            .unwrap();
        assert_eq!(retried.items().len(), 3);
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let fx = setup();
        let other_client = ClientId::new();
        fx.catalog.put_client(other_client, true).unwrap();
        let colleague = Actor::user(UserId::new());

        for _ in 0..3 {
            fx.priced_offer().await;
        }
        let rejected = fx.draft().await;
        fx.engine
            .set_status(&fx.owner, rejected.id_typed(), "rejected")
            .await
            .unwrap();
        fx.engine
            .create_offer(&colleague, other_client, None)
            .await
            .unwrap();

        let all = fx
            .engine
            .list_offers(&OfferFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.total, 5);
        assert_eq!(all.offers.len(), 5);
        assert!(!all.has_more);

        let by_status = OfferFilter {
            status: Some(OfferStatus::Rejected),
            ..OfferFilter::default()
        };
        let page = fx.engine.list_offers(&by_status, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.offers[0].header.id, rejected.id_typed());
        assert_eq!(page.offers[0].item_count, 0);

        let by_owner = OfferFilter {
            owner_id: Some(colleague.id),
            ..OfferFilter::default()
        };
        assert_eq!(fx.engine.list_offers(&by_owner, Pagination::default()).await.unwrap().total, 1);

        let by_client = OfferFilter {
            client_id: Some(fx.client),
            ..OfferFilter::default()
        };
        let page = fx.engine.list_offers(&by_client, Pagination::new(0, 2)).await.unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.offers.len(), 2);
        assert!(page.has_more);

        let last = fx.engine.list_offers(&by_client, Pagination::page(2, 2)).await.unwrap();
        assert_eq!(last.offers.len(), 2);
        assert!(!last.has_more);

        let priced = all.offers.iter().filter(|s| s.item_count == 2).count();
        assert_eq!(priced, 3);
    }

    #[tokio::test]
    async fn sale_is_recorded_once_for_the_taxed_total() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();

        let sale = fx
            .engine
            .record_sale(&fx.owner, offer.id_typed(), date, Some("signed".into()))
            .await
            .unwrap();

        assert_eq!(sale.total_amount, dec!(276.00));
        assert_eq!(sale.sale_date, date);
        assert_eq!(fx.engine.sale_for_offer(offer.id_typed()).await.unwrap(), Some(sale));

        let err = fx
            .engine
            .record_sale(&fx.owner, offer.id_typed(), date, None)
            .await
            .unwrap_err();
        assert_eq!(err, OfferError::SaleExists);
    }

    #[tokio::test]
    async fn sale_requires_a_locked_offer_and_ownership() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();

        assert_eq!(
            fx.engine
                .record_sale(&fx.owner, offer.id_typed(), date, None)
                .await
                .unwrap_err(),
            OfferError::OfferNotLocked
        );
        assert_eq!(
            fx.engine
                .record_sale(&fx.owner, OfferId::new(), date, None)
                .await
                .unwrap_err(),
            OfferError::OfferNotFound
        );

        fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap();
        let stranger = Actor::user(UserId::new());
        assert_eq!(
            fx.engine
                .record_sale(&stranger, offer.id_typed(), date, None)
                .await
                .unwrap_err(),
            OfferError::Forbidden
        );
        assert!(fx.engine.sale_for_offer(offer.id_typed()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sales_record_exactly_one() {
        let fx = setup();
        let offer = fx.priced_offer().await;
        fx.engine.lock(&fx.owner, offer.id_typed()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = fx.engine.clone();
            let owner = fx.owner.clone();
            let id = offer.id_typed();
            handles.push(tokio::spawn(async move { engine.record_sale(&owner, id, date, None).await }));
        }

        let mut recorded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => recorded += 1,
                Err(err) => assert_eq!(err, OfferError::SaleExists),
            }
        }
        assert_eq!(recorded, 1);
    }

    /// Runs the main lifecycle against a real database.
    ///
    /// `DATABASE_URL=postgres://... cargo test -p quotedesk-infra -- --ignored`
    #[tokio::test]
    #[ignore = "needs a Postgres database in DATABASE_URL"]
    async fn postgres_lifecycle() {
        use crate::catalog::PgCatalog;
        use crate::config::StoreConfig;
        use crate::repository::PgOfferStore;

        let config = StoreConfig::from_env().unwrap();
        let pool = config.connect().await.unwrap();
        crate::schema::apply(&pool).await.unwrap();

        let client = ClientId::new();
        let product = ProductId::new();
        sqlx::query("INSERT INTO clients (id, is_active) VALUES ($1, TRUE)")
            .bind(client.as_uuid())
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO products (id, price, is_active) VALUES ($1, 12.50, TRUE)")
            .bind(product.as_uuid())
            .execute(&pool)
            .await
            .unwrap();

        let engine = Arc::new(OfferEngine::new(
            PgOfferStore::new(pool.clone()),
            PgCatalog::new(pool),
            config.settings,
        ));
        let owner = Actor::user(UserId::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let owner = owner.clone();
            handles.push(tokio::spawn(async move {
                engine.create_offer(&owner, client, None).await
            }));
        }
        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().offer_number());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());

        let offer = engine.create_offer(&owner, client, None).await.unwrap();
        engine
            .add_item(&owner, offer.id_typed(), line(product, dec!(2), dec!(100), dec!(10)))
            .await
            .unwrap();
        let offer = engine
            .add_item(&owner, offer.id_typed(), line(product, dec!(1), dec!(50), dec!(0)))
            .await
            .unwrap();
        assert_eq!(offer.totals().total_with_tax, dec!(276.00));

        let locked = engine.lock(&owner, offer.id_typed()).await.unwrap();
        assert_eq!(
            engine.lock(&owner, offer.id_typed()).await.unwrap_err(),
            OfferError::OfferLocked
        );

        let created = engine.create_revision(&owner, offer.id_typed()).await.unwrap();
        assert_eq!(created.link.revision_number, 1);
        assert_eq!(created.offer.totals(), locked.totals());

        let reloaded = engine.get_offer(created.offer.id_typed()).await.unwrap();
        assert_eq!(reloaded.items().len(), 2);
        assert_eq!(reloaded.totals(), locked.totals());
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database in DATABASE_URL"]
    async fn postgres_reads_never_mix_snapshots() {
        use crate::catalog::PgCatalog;
        use crate::config::StoreConfig;
        use crate::repository::PgOfferStore;
        use quotedesk_offers::pricing::MAX_QUANTITY;

        let config = StoreConfig::from_env().unwrap();
        let pool = config.connect().await.unwrap();
        crate::schema::apply(&pool).await.unwrap();

        let client = ClientId::new();
        let product = ProductId::new();
        sqlx::query("INSERT INTO clients (id, is_active) VALUES ($1, TRUE)")
            .bind(client.as_uuid())
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO products (id, price, is_active) VALUES ($1, 1.00, TRUE)")
            .bind(product.as_uuid())
            .execute(&pool)
            .await
            .unwrap();

        let engine = Arc::new(OfferEngine::new(
            PgOfferStore::new(pool.clone()),
            PgCatalog::new(pool),
            config.settings,
        ));
        let owner = Actor::user(UserId::new());
        let offer = engine.create_offer(&owner, client, None).await.unwrap();

        // Largest accepted quantity fits the quantity column.
        let stored = engine
            .add_item(&owner, offer.id_typed(), line(product, MAX_QUANTITY, dec!(0.01), dec!(0)))
            .await
            .unwrap();
        assert_eq!(stored.items()[0].pricing.quantity(), MAX_QUANTITY);

        let writer = {
            let engine = engine.clone();
            let owner = owner.clone();
            let id = offer.id_typed();
            tokio::spawn(async move {
                for _ in 0..25 {
                    engine
                        .add_item(&owner, id, line(product, dec!(3), dec!(7.77), dec!(5)))
                        .await
                        .unwrap();
                }
            })
        };

        while !writer.is_finished() {
            let read = engine.get_offer(offer.id_typed()).await.unwrap();
            let sum: Decimal = read.items().iter().map(|item| item.line_total).sum();
            assert_eq!(read.totals().total_amount, sum);
        }
        writer.await.unwrap();

        let page = engine
            .list_offers(&OfferFilter::default(), Pagination::page(u64::MAX, 200))
            .await
            .unwrap();
        assert!(page.offers.is_empty());
    }
}
