//! Demo data for local runs.

use common::{Address, Money};
use domain::{Delivery, Member, Order, OrderItem, OrderService};
use order_store::{OrderStore, OrderStoreExt, UnitOfWork};

const CATALOG: [(&str, i64, u32); 4] = [
    ("Rust in Action", 10_000, 100),
    ("Zero to Production", 20_000, 100),
    ("Programming Rust", 30_000, 100),
    ("Rust Atomics and Locks", 40_000, 100),
];

/// Registers two members and four items, then places one two-line order per
/// member, all in one unit of work.
#[tracing::instrument(skip(service))]
pub async fn seed_demo_data<S: OrderStore + Clone>(
    service: &OrderService<S>,
) -> domain::Result<()> {
    let mut uow = UnitOfWork::read_write();

    let members = [
        ("userA", Address::new("Seoul", "1 Main St", "11111")),
        ("userB", Address::new("Busan", "2 Harbor Rd", "22222")),
    ];
    let mut registered: Vec<Member> = Vec::with_capacity(members.len());
    for (name, address) in members {
        registered.push(service.members().register(&mut uow, name, address).await?);
    }

    let mut items = Vec::with_capacity(CATALOG.len());
    for (name, price, stock) in CATALOG {
        items.push(
            service
                .items()
                .register(&mut uow, name, Money::from_cents(price), stock)
                .await?,
        );
    }

    for (member, pair) in registered.into_iter().zip(items.chunks_mut(2)) {
        let mut lines = Vec::with_capacity(pair.len());
        for (count, item) in (1..).zip(pair.iter_mut()) {
            let price = item.price();
            lines.push(OrderItem::create(item, price, count)?);
        }
        let delivery = Delivery::new(member.address().clone());
        let mut order = Order::create(member, delivery, lines)?;
        service.orders().save(&mut uow, &mut order).await?;
        for line in order.order_items()? {
            service
                .items()
                .remove_stock(&mut uow, line.item_id(), line.count())?;
        }
    }

    service.store().commit(uow).await?;
    tracing::info!("demo data seeded");
    Ok(())
}
