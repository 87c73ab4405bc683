use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    Address, DeliveryId, DeliveryStatus, ItemId, MemberId, Money, OrderId, OrderItemId,
    OrderStatus,
};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use crate::query::{OrderFilter, Page, Sequence};
use crate::record::{
    DeliveryRecord, ItemRecord, MemberRecord, OrderFetchRow, OrderFlatRow, OrderGraphRow,
    OrderItemRecord, OrderItemRow, OrderLineRow, OrderRecord, OrderSummaryRow,
};
use crate::store::{OrderStore, QueryKind, check_batch_size};
use crate::unit_of_work::Write;
use crate::{Result, StoreError};

// Column lists share aliases so the row decoders below work for every query.
const ORDER_COLUMNS: &str = "o.id AS order_id, o.member_id, o.delivery_id, \
     o.order_date, o.status AS order_status";
const MEMBER_COLUMNS: &str = "m.name AS member_name, m.city AS member_city, \
     m.street AS member_street, m.zipcode AS member_zipcode";
const DELIVERY_COLUMNS: &str = "d.city AS delivery_city, d.street AS delivery_street, \
     d.zipcode AS delivery_zipcode, d.status AS delivery_status";
const LINE_COLUMNS: &str = "oi.id AS order_item_id, oi.order_id, oi.item_id, \
     oi.order_price, oi.quantity";
const ITEM_COLUMNS: &str =
    "i.name AS item_name, i.price AS item_price, i.stock_quantity";

/// Connection for one read: pooled, or the transaction of a read-only scope.
enum Conn<'a> {
    Pooled(PoolConnection<Postgres>),
    Scoped(MutexGuard<'a, Transaction<'static, Postgres>>),
}

impl Deref for Conn<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            Conn::Pooled(conn) => conn,
            Conn::Scoped(tx) => tx,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            Conn::Pooled(conn) => conn,
            Conn::Scoped(tx) => tx,
        }
    }
}

/// PostgreSQL-backed order store implementation.
///
/// A read-only scope pins one connection in a `REPEATABLE READ, READ ONLY`
/// transaction; its reads run there one at a time and it rolls back when the
/// last clone is dropped.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
    scope: Option<Arc<Mutex<Transaction<'static, Postgres>>>>,
    max_batch_size: usize,
}

impl PostgresOrderStore {
    /// Default IN-list limit.
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            scope: None,
            max_batch_size: Self::DEFAULT_MAX_BATCH_SIZE,
        }
    }

    /// Overrides the largest key list accepted by multi-key lookups.
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn conn(&self) -> Result<Conn<'_>> {
        Ok(match &self.scope {
            Some(tx) => Conn::Scoped(tx.lock().await),
            None => Conn::Pooled(self.pool.acquire().await?),
        })
    }

    async fn apply_one(tx: &mut Transaction<'_, Postgres>, write: Write) -> Result<()> {
        match write {
            Write::InsertMember(member) => {
                sqlx::query(
                    "INSERT INTO members (id, name, city, street, zipcode) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(member.id.as_i64())
                .bind(&member.name)
                .bind(member.address.city())
                .bind(member.address.street())
                .bind(member.address.zipcode())
                .execute(&mut **tx)
                .await?;
            }
            Write::InsertItem(item) => {
                sqlx::query(
                    "INSERT INTO items (id, name, price, stock_quantity) VALUES ($1, $2, $3, $4)",
                )
                .bind(item.id.as_i64())
                .bind(&item.name)
                .bind(item.price.cents())
                .bind(i64::from(item.stock_quantity))
                .execute(&mut **tx)
                .await?;
            }
            Write::RemoveItemStock { id, quantity } => {
                let result = sqlx::query(
                    "UPDATE items SET stock_quantity = stock_quantity - $2 \
                     WHERE id = $1 AND stock_quantity >= $2",
                )
                .bind(id.as_i64())
                .bind(i64::from(quantity))
                .execute(&mut **tx)
                .await?;
                if result.rows_affected() == 0 {
                    let available: Option<i64> =
                        sqlx::query_scalar("SELECT stock_quantity FROM items WHERE id = $1")
                            .bind(id.as_i64())
                            .fetch_optional(&mut **tx)
                            .await?;
                    return Err(match available {
                        Some(available) => StoreError::InsufficientStock {
                            item_id: id,
                            requested: quantity,
                            available: to_count(available, "stock_quantity")?,
                        },
                        None => StoreError::RowNotFound {
                            table: "items",
                            id: id.as_i64(),
                        },
                    });
                }
            }
            Write::AddItemStock { id, quantity } => {
                let result = sqlx::query(
                    "UPDATE items SET stock_quantity = stock_quantity + $2 WHERE id = $1",
                )
                .bind(id.as_i64())
                .bind(i64::from(quantity))
                .execute(&mut **tx)
                .await?;
                ensure_updated(result.rows_affected(), "items", id.as_i64())?;
            }
            Write::InsertDelivery(delivery) => {
                sqlx::query(
                    "INSERT INTO deliveries (id, city, street, zipcode, status) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(delivery.id.as_i64())
                .bind(delivery.address.city())
                .bind(delivery.address.street())
                .bind(delivery.address.zipcode())
                .bind(delivery.status.as_str())
                .execute(&mut **tx)
                .await?;
            }
            Write::InsertOrder(order) => {
                sqlx::query(
                    "INSERT INTO orders (id, member_id, delivery_id, order_date, status) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(order.id.as_i64())
                .bind(order.member_id.as_i64())
                .bind(order.delivery_id.as_i64())
                .bind(order.order_date)
                .bind(order.status.as_str())
                .execute(&mut **tx)
                .await?;
            }
            Write::InsertOrderItem(line) => {
                sqlx::query(
                    "INSERT INTO order_items (id, order_id, item_id, order_price, quantity) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(line.id.as_i64())
                .bind(line.order_id.as_i64())
                .bind(line.item_id.as_i64())
                .bind(line.order_price.cents())
                .bind(i64::from(line.count))
                .execute(&mut **tx)
                .await?;
            }
            Write::UpdateOrderStatus {
                id,
                expected,
                status,
            } => {
                Self::update_status(tx, "orders", id.as_i64(), expected.as_str(), status.as_str())
                    .await?;
            }
            Write::UpdateDeliveryStatus {
                id,
                expected,
                status,
            } => {
                Self::update_status(
                    tx,
                    "deliveries",
                    id.as_i64(),
                    expected.as_str(),
                    status.as_str(),
                )
                .await?;
            }
        }
        Ok(())
    }
}

impl PostgresOrderStore {
    /// Compare-and-set on a status column.
    async fn update_status(
        tx: &mut Transaction<'_, Postgres>,
        table: &'static str,
        id: i64,
        expected: &'static str,
        status: &str,
    ) -> Result<()> {
        let result = sqlx::query(&format!(
            "UPDATE {table} SET status = $2 WHERE id = $1 AND status = $3"
        ))
        .bind(id)
        .bind(status)
        .bind(expected)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let found: Option<String> =
            sqlx::query_scalar(&format!("SELECT status FROM {table} WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        Err(match found {
            Some(found) => StoreError::Conflict {
                table,
                id,
                expected,
                found,
            },
            None => StoreError::RowNotFound { table, id },
        })
    }
}

fn ensure_updated(rows_affected: u64, table: &'static str, id: i64) -> Result<()> {
    if rows_affected == 0 {
        return Err(StoreError::RowNotFound { table, id });
    }
    Ok(())
}

fn to_count(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn to_status<T: FromStr>(value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StoreError::Corrupt(e.to_string()))
}

fn ids<T: Copy + Into<i64>>(ids: &[T]) -> Vec<i64> {
    ids.iter().map(|id| (*id).into()).collect()
}

fn row_to_member(row: &PgRow) -> Result<MemberRecord> {
    Ok(MemberRecord {
        id: MemberId::new(row.try_get("member_id")?),
        name: row.try_get("member_name")?,
        address: Address::new(
            row.try_get::<String, _>("member_city")?,
            row.try_get::<String, _>("member_street")?,
            row.try_get::<String, _>("member_zipcode")?,
        ),
    })
}

fn row_to_item(row: &PgRow) -> Result<ItemRecord> {
    Ok(ItemRecord {
        id: ItemId::new(row.try_get("item_id")?),
        name: row.try_get("item_name")?,
        price: Money::from_cents(row.try_get("item_price")?),
        stock_quantity: to_count(row.try_get("stock_quantity")?, "stock_quantity")?,
    })
}

fn row_to_delivery(row: &PgRow) -> Result<DeliveryRecord> {
    Ok(DeliveryRecord {
        id: DeliveryId::new(row.try_get("delivery_id")?),
        address: Address::new(
            row.try_get::<String, _>("delivery_city")?,
            row.try_get::<String, _>("delivery_street")?,
            row.try_get::<String, _>("delivery_zipcode")?,
        ),
        status: to_status::<DeliveryStatus>(row.try_get("delivery_status")?)?,
    })
}

fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
    Ok(OrderRecord {
        id: OrderId::new(row.try_get("order_id")?),
        member_id: MemberId::new(row.try_get("member_id")?),
        delivery_id: DeliveryId::new(row.try_get("delivery_id")?),
        order_date: row.try_get("order_date")?,
        status: to_status::<OrderStatus>(row.try_get("order_status")?)?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItemRecord> {
    Ok(OrderItemRecord {
        id: OrderItemId::new(row.try_get("order_item_id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        item_id: ItemId::new(row.try_get("item_id")?),
        order_price: Money::from_cents(row.try_get("order_price")?),
        count: to_count(row.try_get("quantity")?, "quantity")?,
    })
}

fn row_to_graph(row: &PgRow) -> Result<OrderGraphRow> {
    Ok(OrderGraphRow {
        order: row_to_order(row)?,
        member: row_to_member(row)?,
        delivery: row_to_delivery(row)?,
    })
}

fn row_to_line(row: &PgRow) -> Result<OrderItemRow> {
    Ok(OrderItemRow {
        order_item: row_to_order_item(row)?,
        item: row_to_item(row)?,
    })
}

fn row_to_summary(row: &PgRow) -> Result<OrderSummaryRow> {
    Ok(OrderSummaryRow {
        order_id: OrderId::new(row.try_get("order_id")?),
        member_name: row.try_get("member_name")?,
        order_date: row.try_get("order_date")?,
        status: to_status::<OrderStatus>(row.try_get("order_status")?)?,
        address: Address::new(
            row.try_get::<String, _>("delivery_city")?,
            row.try_get::<String, _>("delivery_street")?,
            row.try_get::<String, _>("delivery_zipcode")?,
        ),
    })
}

fn row_to_line_columns(row: &PgRow) -> Result<OrderLineRow> {
    Ok(OrderLineRow {
        order_id: OrderId::new(row.try_get("order_id")?),
        item_name: row.try_get("item_name")?,
        order_price: Money::from_cents(row.try_get("order_price")?),
        count: to_count(row.try_get("quantity")?, "quantity")?,
    })
}

fn row_to_flat(row: &PgRow) -> Result<OrderFlatRow> {
    let summary = row_to_summary(row)?;
    let line = row_to_line_columns(row)?;
    Ok(OrderFlatRow {
        order_id: summary.order_id,
        member_name: summary.member_name,
        order_date: summary.order_date,
        status: summary.status,
        address: summary.address,
        item_name: line.item_name,
        order_price: line.order_price,
        count: line.count,
    })
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn next_id(&self, sequence: Sequence) -> Result<i64> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        QueryKind::NextId.record();
        let sql = format!("SELECT nextval('{}')", sequence.name());
        let id: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(id)
    }

    async fn apply(&self, writes: Vec<Write>) -> Result<()> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        QueryKind::Apply.record();

        // Start a transaction; dropping it on error rolls back
        let mut tx = self.pool.begin().await?;
        for write in writes {
            Self::apply_one(&mut tx, write).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn read_only(&self) -> Result<Self> {
        if self.is_read_only() {
            return Ok(self.clone());
        }
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(Self {
            scope: Some(Arc::new(Mutex::new(tx))),
            ..self.clone()
        })
    }

    fn is_read_only(&self) -> bool {
        self.scope.is_some()
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn find_member(&self, id: MemberId) -> Result<Option<MemberRecord>> {
        QueryKind::FindMember.record();
        let mut conn = self.conn().await?;
        let row = sqlx::query(&format!(
            "SELECT m.id AS member_id, {MEMBER_COLUMNS} FROM members m WHERE m.id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_member).transpose()
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<ItemRecord>> {
        QueryKind::FindItem.record();
        let mut conn = self.conn().await?;
        let row = sqlx::query(&format!(
            "SELECT i.id AS item_id, {ITEM_COLUMNS} FROM items i WHERE i.id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn find_items(&self, ids_in: &[ItemId]) -> Result<Vec<ItemRecord>> {
        check_batch_size(ids_in.len(), self.max_batch_size)?;
        QueryKind::FindItems.record();
        let mut conn = self.conn().await?;
        let rows = sqlx::query(&format!(
            "SELECT i.id AS item_id, {ITEM_COLUMNS} FROM items i \
             WHERE i.id = ANY($1) ORDER BY i.id"
        ))
        .bind(ids(ids_in))
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_item).collect()
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        QueryKind::FindOrder.record();
        let mut conn = self.conn().await?;
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_delivery(&self, id: DeliveryId) -> Result<Option<DeliveryRecord>> {
        QueryKind::FindDelivery.record();
        let mut conn = self.conn().await?;
        let row = sqlx::query(&format!(
            "SELECT d.id AS delivery_id, {DELIVERY_COLUMNS} FROM deliveries d WHERE d.id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_delivery).transpose()
    }

    async fn find_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        QueryKind::FindOrderItems.record();
        let mut conn = self.conn().await?;
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM order_items oi WHERE oi.order_id = $1 ORDER BY oi.id"
        ))
        .bind(order_id.as_i64())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_order_item).collect()
    }

    async fn search_orders(&self, filter: &OrderFilter) -> Result<Vec<OrderRecord>> {
        QueryKind::SearchOrders.record();
        let mut conn = self.conn().await?;
        let limit = i64::try_from(filter.max_results).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o \
             JOIN members m ON m.id = o.member_id \
             WHERE ($1::TEXT IS NULL OR strpos(m.name, $1) > 0) \
               AND ($2::TEXT IS NULL OR o.status = $2) \
             ORDER BY o.id LIMIT $3"
        ))
        .bind(filter.member_name.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    async fn fetch_orders_with_member_delivery(
        &self,
        page: Option<Page>,
    ) -> Result<Vec<OrderGraphRow>> {
        QueryKind::FetchOrdersWithMemberDelivery.record();
        let mut conn = self.conn().await?;
        let (offset, limit) = match page {
            Some(page) => (
                i64::try_from(page.offset).unwrap_or(i64::MAX),
                Some(i64::try_from(page.limit).unwrap_or(i64::MAX)),
            ),
            None => (0, None),
        };
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS}, {MEMBER_COLUMNS}, {DELIVERY_COLUMNS} FROM orders o \
             JOIN members m ON m.id = o.member_id \
             JOIN deliveries d ON d.id = o.delivery_id \
             ORDER BY o.id OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_graph).collect()
    }

    async fn fetch_orders_with_items(&self) -> Result<Vec<OrderFetchRow>> {
        QueryKind::FetchOrdersWithItems.record();
        let mut conn = self.conn().await?;
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS}, {MEMBER_COLUMNS}, {DELIVERY_COLUMNS}, \
                    oi.id AS order_item_id, oi.order_price, oi.quantity, \
                    i.id AS item_id, {ITEM_COLUMNS} \
             FROM orders o \
             JOIN members m ON m.id = o.member_id \
             JOIN deliveries d ON d.id = o.delivery_id \
             JOIN order_items oi ON oi.order_id = o.id \
             JOIN items i ON i.id = oi.item_id \
             ORDER BY o.id, oi.id"
        ))
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderFetchRow {
                    graph: row_to_graph(row)?,
                    line: row_to_line(row)?,
                })
            })
            .collect()
    }

    async fn fetch_order_items_in(&self, order_ids: &[OrderId]) -> Result<Vec<OrderItemRow>> {
        check_batch_size(order_ids.len(), self.max_batch_size)?;
        QueryKind::FetchOrderItemsIn.record();
        let mut conn = self.conn().await?;
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS}, {ITEM_COLUMNS} FROM order_items oi \
             JOIN items i ON i.id = oi.item_id \
             WHERE oi.order_id = ANY($1) ORDER BY oi.id"
        ))
        .bind(ids(order_ids))
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_line).collect()
    }

    async fn order_summaries(&self) -> Result<Vec<OrderSummaryRow>> {
        QueryKind::OrderSummaries.record();
        let mut conn = self.conn().await?;
        let rows = sqlx::query(&format!(
            "SELECT o.id AS order_id, o.order_date, o.status AS order_status, \
                    m.name AS member_name, {DELIVERY_COLUMNS} \
             FROM orders o \
             JOIN members m ON m.id = o.member_id \
             JOIN deliveries d ON d.id = o.delivery_id \
             ORDER BY o.id"
        ))
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_summary).collect()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLineRow>> {
        QueryKind::OrderLines.record();
        let mut conn = self.conn().await?;
        let rows = sqlx::query(
            "SELECT oi.order_id, i.name AS item_name, oi.order_price, oi.quantity \
             FROM order_items oi JOIN items i ON i.id = oi.item_id \
             WHERE oi.order_id = $1 ORDER BY oi.id",
        )
        .bind(order_id.as_i64())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_line_columns).collect()
    }

    async fn order_lines_in(&self, order_ids: &[OrderId]) -> Result<Vec<OrderLineRow>> {
        check_batch_size(order_ids.len(), self.max_batch_size)?;
        QueryKind::OrderLinesIn.record();
        let mut conn = self.conn().await?;
        let rows = sqlx::query(
            "SELECT oi.order_id, i.name AS item_name, oi.order_price, oi.quantity \
             FROM order_items oi JOIN items i ON i.id = oi.item_id \
             WHERE oi.order_id = ANY($1) ORDER BY oi.id",
        )
        .bind(ids(order_ids))
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_line_columns).collect()
    }

    async fn order_flat_rows(&self) -> Result<Vec<OrderFlatRow>> {
        QueryKind::OrderFlatRows.record();
        let mut conn = self.conn().await?;
        let rows = sqlx::query(&format!(
            "SELECT o.id AS order_id, o.order_date, o.status AS order_status, \
                    m.name AS member_name, {DELIVERY_COLUMNS}, \
                    i.name AS item_name, oi.order_price, oi.quantity \
             FROM orders o \
             JOIN members m ON m.id = o.member_id \
             JOIN deliveries d ON d.id = o.delivery_id \
             JOIN order_items oi ON oi.order_id = o.id \
             JOIN items i ON i.id = oi.item_id \
             ORDER BY o.id, oi.id"
        ))
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_flat).collect()
    }
}
