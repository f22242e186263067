//! Order repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use emporium_core::{Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::{RepositoryError, like_pattern};
use crate::models::Pagination;
use crate::models::order::{Order, OrderFilter, OrderItem, OrderStatusChange, ShippingAddress};

const ORDER_COLUMNS: &str = r"
    o.id, o.order_number, o.user_id, o.status, o.subtotal, o.shipping_cost, o.total,
    o.shipping_address, o.contact_phone, o.note, o.cancelled_at, o.delivered_at,
    o.created_at, o.updated_at";

const FILTER_WHERE: &str = r"
    WHERE ($1::order_status IS NULL OR o.status = $1)
      AND ($2::int IS NULL OR o.user_id = $2)
      AND ($3::text IS NULL OR o.order_number ILIKE $3 OR u.email ILIKE $3)";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: i32,
    status: OrderStatus,
    subtotal: Money,
    shipping_cost: Money,
    total: Money,
    shipping_address: Json<ShippingAddress>,
    contact_phone: Option<String>,
    note: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            order_number: self.order_number,
            user_id: UserId::new(self.user_id),
            status: self.status,
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            total: self.total,
            shipping_address: self.shipping_address.0,
            contact_phone: self.contact_phone,
            note: self.note,
            cancelled_at: self.cancelled_at,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: Option<i32>,
    product_name: String,
    unit_price: Money,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative quantity on order item {}", row.id))
        })?;
        let line_total = row
            .unit_price
            .line_total(quantity)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: row.product_id.map(ProductId::new),
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: i32,
    order_id: i32,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    changed_by: Option<i32>,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<HistoryRow> for OrderStatusChange {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.id,
            order_id: OrderId::new(row.order_id),
            from_status: row.from_status,
            to_status: row.to_status,
            changed_by: row.changed_by.map(UserId::new),
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

/// Values for a new order row.
#[derive(Debug)]
pub struct NewOrder<'r> {
    pub order_number: &'r str,
    pub user_id: UserId,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub shipping_address: &'r ShippingAddress,
    pub contact_phone: Option<&'r str>,
    pub note: Option<&'r str>,
}

/// Values for a new order line.
#[derive(Debug)]
pub struct NewOrderItem<'r> {
    pub product_id: ProductId,
    pub product_name: &'r str,
    pub unit_price: Money,
    pub quantity: i32,
}

/// Item fields needed to put stock back.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct StockLine {
    pub product_id: Option<ProductId>,
    pub quantity: i32,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// An order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = self.items_for(&[id]).await?;
        let items = items.remove(&id).unwrap_or_default();
        Ok(Some(row.into_order(items)))
    }

    /// Filtered page of orders, newest first, with items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM orders o JOIN users u ON u.id = o.user_id {FILTER_WHERE}"
        ))
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(search.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders o JOIN users u ON u.id = o.user_id
            {FILTER_WHERE}
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(search.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<OrderId> = rows.iter().map(|r| OrderId::new(r.id)).collect();
        let mut items = self.items_for(&ids).await?;
        let orders = rows
            .into_iter()
            .map(|row| {
                let own = items.remove(&OrderId::new(row.id)).unwrap_or_default();
                row.into_order(own)
            })
            .collect();

        Ok((orders, total))
    }

    async fn items_for(
        &self,
        ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            r"
            SELECT id, order_id, product_id, product_name, unit_price, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let item = OrderItem::try_from(row)?;
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }

    /// Status changes of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, id: OrderId) -> Result<Vec<OrderStatusChange>, RepositoryError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r"
            SELECT id, order_id, from_status, to_status, changed_by, comment, created_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Whether `user` has a delivered order containing `product`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_delivered_purchase(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1 FROM orders o
                JOIN order_items i ON i.order_id = o.id
                WHERE o.user_id = $1 AND i.product_id = $2 AND o.status = 'DELIVERED'
            )
            ",
        )
        .bind(user)
        .bind(product)
        .fetch_one(self.pool)
        .await?;

        Ok(found)
    }

    // =========================================================================
    // Transactional steps
    // =========================================================================

    /// Insert the order header and return its id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    pub async fn insert(
        conn: &mut PgConnection,
        order: &NewOrder<'_>,
    ) -> Result<OrderId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO orders
                (order_number, user_id, subtotal, shipping_cost, total,
                 shipping_address, contact_phone, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(order.order_number)
        .bind(order.user_id)
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.total)
        .bind(Json(order.shipping_address))
        .bind(order.contact_phone)
        .bind(order.note)
        .fetch_one(conn)
        .await
        .map_err(super::conflict_on_unique("order number already exists"))?;

        Ok(OrderId::new(id))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_item(
        conn: &mut PgConnection,
        order: OrderId,
        item: &NewOrderItem<'_>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO order_items (order_id, product_id, product_name, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(order)
        .bind(item.product_id)
        .bind(item.product_name)
        .bind(item.unit_price)
        .bind(item.quantity)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record_status(
        conn: &mut PgConnection,
        order: OrderId,
        from: Option<OrderStatus>,
        to: OrderStatus,
        changed_by: Option<UserId>,
        comment: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO order_status_history (order_id, from_status, to_status, changed_by, comment)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(order)
        .bind(from)
        .bind(to)
        .bind(changed_by)
        .bind(comment)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Lock an order row and return its owner and status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn lock_status(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<(UserId, OrderStatus, String), RepositoryError> {
        let row: Option<(i32, OrderStatus, String)> = sqlx::query_as(
            "SELECT user_id, status, order_number FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        row.map(|(user, status, number)| (UserId::new(user), status, number))
            .ok_or(RepositoryError::NotFound)
    }

    /// Set the status and the matching timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE orders SET
                status = $2,
                cancelled_at = CASE WHEN $2 = 'CANCELLED'::order_status THEN NOW() ELSE cancelled_at END,
                delivered_at = CASE WHEN $2 = 'DELIVERED'::order_status THEN NOW() ELSE delivered_at END,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Item quantities of an order, for restoring stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stock_lines(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<Vec<StockLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, StockLine>(
            "SELECT product_id, quantity FROM order_items WHERE order_id = $1 ORDER BY product_id",
        )
        .bind(id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }
}
