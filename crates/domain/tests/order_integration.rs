//! Integration tests for the order service and repository.
//!
//! These tests run against the in-memory store, whose query log stands in for
//! a mock datastore when counting round-trips.

use common::{Address, ItemId, MemberId, Money, OrderStatus};
use domain::{DomainError, FetchConfig, OrderSearch, OrderService};
use order_store::{InMemoryOrderStore, OrderStoreExt, QueryKind, UnitOfWork};

/// Helper to create a service with one member and the given items.
async fn create_service(
    config: FetchConfig,
    items: &[(&str, i64, u32)],
) -> (OrderService<InMemoryOrderStore>, MemberId, Vec<ItemId>) {
    let store = InMemoryOrderStore::new();
    let service = OrderService::new(store.clone(), config);

    let mut uow = UnitOfWork::read_write();
    let member = service
        .members()
        .register(
            &mut uow,
            "Alice",
            Address::new("Seoul", "123 Main St", "00001"),
        )
        .await
        .unwrap();
    let mut item_ids = Vec::new();
    for (name, price, stock) in items {
        let item = service
            .items()
            .register(&mut uow, *name, Money::from_cents(*price), *stock)
            .await
            .unwrap();
        item_ids.push(item.id());
    }
    store.commit(uow).await.unwrap();

    (service, member.id(), item_ids)
}

async fn stock_of(service: &OrderService<InMemoryOrderStore>, id: ItemId) -> u32 {
    service.items().find_one(id).await.unwrap().stock_quantity()
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn alice_orders_three_widgets() {
        let (service, alice, items) =
            create_service(FetchConfig::default(), &[("Widget", 1000, 10)]).await;
        let widget = items[0];

        let order_id = service.place_order(alice, widget, 3).await.unwrap();
        assert_eq!(stock_of(&service, widget).await, 7);

        let mut orders = service.find_orders(&OrderSearch::new()).await.unwrap();
        service
            .orders()
            .initialize_graph(&mut orders)
            .await
            .unwrap();
        let order = orders
            .iter()
            .find(|o| o.id() == Some(order_id))
            .unwrap();
        assert_eq!(order.member().unwrap().name(), "Alice");
        assert_eq!(order.status(), OrderStatus::Order);
        let lines = order.order_items().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].item().unwrap().name(), "Widget");
        assert_eq!(lines[0].order_price(), Money::from_cents(1000));
        assert_eq!(lines[0].count(), 3);
        assert_eq!(order.total_price().unwrap(), Money::from_cents(3000));

        service.cancel_order(order_id).await.unwrap();
        assert_eq!(stock_of(&service, widget).await, 10);
        let order = service.find_order(order_id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Cancel);
    }

    #[tokio::test]
    async fn valid_counts_take_exactly_count_from_stock() {
        for count in [1, 5, 10] {
            let (service, member, items) =
                create_service(FetchConfig::default(), &[("Widget", 250, 10)]).await;

            let order_id = service.place_order(member, items[0], count).await.unwrap();

            let order = service.find_order(order_id).await.unwrap();
            assert_eq!(order.status(), OrderStatus::Order);
            assert_eq!(
                order.total_price().unwrap(),
                Money::from_cents(250 * i64::from(count))
            );
            assert_eq!(stock_of(&service, items[0]).await, 10 - count);
        }
    }

    #[tokio::test]
    async fn excessive_count_fails_without_side_effects() {
        let (service, member, items) =
            create_service(FetchConfig::default(), &[("Widget", 1000, 2)]).await;

        let err = service.place_order(member, items[0], 3).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(stock_of(&service, items[0]).await, 2);
        assert!(
            service
                .find_orders(&OrderSearch::new())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn cancelling_twice_is_illegal() {
        let (service, member, items) =
            create_service(FetchConfig::default(), &[("Widget", 1000, 10)]).await;
        let order_id = service.place_order(member, items[0], 4).await.unwrap();
        service.cancel_order(order_id).await.unwrap();

        let err = service.cancel_order(order_id).await.unwrap_err();
        assert!(matches!(err, DomainError::IllegalState(_)));
        assert_eq!(stock_of(&service, items[0]).await, 10);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let (service, member, _) = create_service(FetchConfig::default(), &[]).await;
        let err = service
            .place_order(member, ItemId::new(7), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::NotFound {
                entity: "Item",
                id: 7
            }
        ));
    }
}

mod search {
    use super::*;

    #[tokio::test]
    async fn search_by_status_after_cancel() {
        let (service, member, items) =
            create_service(FetchConfig::default(), &[("Widget", 1000, 10)]).await;
        let first = service.place_order(member, items[0], 1).await.unwrap();
        let second = service.place_order(member, items[0], 1).await.unwrap();
        service.cancel_order(first).await.unwrap();

        let cancelled = service
            .find_orders(&OrderSearch::new().order_status(OrderStatus::Cancel))
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id(), Some(first));

        let ordered = service
            .find_orders(
                &OrderSearch::new()
                    .member_name("Ali")
                    .order_status(OrderStatus::Order),
            )
            .await
            .unwrap();
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].id(), Some(second));

        let nobody = service
            .find_orders(&OrderSearch::new().member_name("Bob"))
            .await
            .unwrap();
        assert!(nobody.is_empty());
    }

    #[tokio::test]
    async fn search_leaves_relations_unloaded() {
        let (service, member, items) =
            create_service(FetchConfig::default(), &[("Widget", 1000, 10)]).await;
        service.place_order(member, items[0], 1).await.unwrap();

        let orders = service.find_orders(&OrderSearch::new()).await.unwrap();
        assert!(matches!(
            orders[0].member(),
            Err(DomainError::NotLoaded("member"))
        ));
    }
}

mod fetch_strategies {
    use super::*;

    async fn place_many(
        service: &OrderService<InMemoryOrderStore>,
        member: MemberId,
        items: &[ItemId],
        orders: usize,
    ) {
        for n in 0..orders {
            let item = items[n % items.len()];
            service.place_order(member, item, 1).await.unwrap();
        }
    }

    #[tokio::test]
    async fn paged_strategy_returns_at_most_limit() {
        let (service, member, items) =
            create_service(FetchConfig::default(), &[("Widget", 1000, 100)]).await;
        place_many(&service, member, &items, 7).await;

        for limit in [0, 1, 3, 7, 20] {
            let orders = service
                .orders()
                .find_all_with_member_delivery(0, limit)
                .await
                .unwrap();
            assert!(orders.len() <= limit as usize);
        }

        let tail = service
            .orders()
            .find_all_with_member_delivery(5, 10)
            .await
            .unwrap();
        assert_eq!(tail.len(), 2);
    }

    #[tokio::test]
    async fn negative_window_is_invalid_argument() {
        let (service, _, _) = create_service(FetchConfig::default(), &[]).await;
        let err = service
            .orders()
            .find_all_with_member_delivery(-1, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn batched_lines_cost_ceil_n_over_k_queries() {
        for (orders, batch_size) in [(10usize, 3usize), (9, 3), (4, 100), (1, 1)] {
            let (service, member, items) = create_service(
                FetchConfig::new(batch_size),
                &[("Widget", 1000, 100), ("Gadget", 500, 100)],
            )
            .await;
            place_many(&service, member, &items, orders).await;
            service.store().clear_query_log();

            let loaded = service
                .orders()
                .find_all_with_member_delivery(0, 100)
                .await
                .unwrap();
            assert_eq!(loaded.len(), orders);
            assert!(loaded.iter().all(|o| o.order_items().unwrap().len() == 1));

            let batches = service.store().count_of(QueryKind::FetchOrderItemsIn);
            assert!(batches <= orders.div_ceil(batch_size));
            assert_eq!(
                service.store().query_count(),
                1 + orders.div_ceil(batch_size)
            );
        }
    }

    #[tokio::test]
    async fn strategies_agree_on_totals() {
        let (service, member, items) = create_service(
            FetchConfig::new(2),
            &[("Widget", 1000, 100), ("Gadget", 500, 100)],
        )
        .await;
        place_many(&service, member, &items, 5).await;

        let mut traversed = service.find_orders(&OrderSearch::new()).await.unwrap();
        service
            .orders()
            .initialize_graph(&mut traversed)
            .await
            .unwrap();
        let joined = service.orders().find_all_with_items(None).await.unwrap();
        let batched = service
            .orders()
            .find_all_with_member_delivery(0, 100)
            .await
            .unwrap();

        let totals = |orders: &[domain::Order]| -> Vec<(i64, Money)> {
            orders
                .iter()
                .map(|o| (o.id().unwrap().as_i64(), o.total_price().unwrap()))
                .collect()
        };
        assert_eq!(totals(&traversed), totals(&joined));
        assert_eq!(totals(&joined), totals(&batched));
    }
}
