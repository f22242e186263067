//! Checkout and order lifecycle.
//!
//! Every stock movement happens in the same transaction as the status change
//! that causes it: placing an order takes stock, entering `CANCELLED` or
//! `REFUNDED` puts it back. Product rows are locked in id order first.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use sqlx::{Acquire, PgPool};
use tracing::instrument;

use emporium_core::{Money, NotificationKind, OrderId, OrderStatus, ProductId, UserId};

use super::not_found_as;
use super::notifications::notify;
use crate::db::orders::{NewOrder, NewOrderItem};
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::error::AppError;
use crate::models::notification::NewNotification;
use crate::models::order::{
    CreateOrderRequest, Order, OrderFilter, OrderLineRequest, OrderStatusChange, StatusOption,
};
use crate::models::{CurrentUser, Paginated, Pagination, optional_text};

const MAX_LINES: usize = 50;
const MAX_QUANTITY: u32 = 999;
const MAX_NOTE_LENGTH: usize = 1000;
const MAX_PHONE_LENGTH: usize = 32;
const ORDER_NUMBER_ATTEMPTS: u32 = 5;
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Subtotal at or above which shipping is free.
const FREE_SHIPPING_FROM: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);
const FLAT_SHIPPING: Decimal = Decimal::from_parts(300, 0, 0, false, 0);

pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
        }
    }

    /// Place an order for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for malformed lines or an unavailable
    /// product, `AppError::Conflict` when stock runs short.
    #[instrument(skip(self, request), fields(user_id = %user, lines = request.items.len()))]
    pub async fn create(&self, user: UserId, request: CreateOrderRequest) -> Result<Order, AppError> {
        let lines = merge_lines(&request.items)?;
        request
            .shipping_address
            .validate()
            .map_err(AppError::BadRequest)?;
        let contact_phone = bounded_optional("contactPhone", request.contact_phone, MAX_PHONE_LENGTH)?;
        let note = bounded_optional("note", request.note, MAX_NOTE_LENGTH)?;

        let ids: Vec<ProductId> = lines.keys().copied().collect();
        let mut tx = self.pool.begin().await?;

        let locked: HashMap<ProductId, _> = ProductRepository::lock_for_update(&mut tx, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut items = Vec::with_capacity(lines.len());
        let mut subtotal = Money::ZERO;
        for (&product_id, &quantity) in &lines {
            let product = locked
                .get(&product_id)
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    AppError::bad_request(format!("product {product_id} is not available"))
                })?;
            let wanted = i32::try_from(quantity)
                .map_err(|_| AppError::bad_request("quantity out of range"))?;
            if product.stock < wanted {
                return Err(AppError::conflict(format!(
                    "insufficient stock for '{}': requested {wanted}, available {}",
                    product.name, product.stock
                )));
            }
            ProductRepository::adjust_stock(&mut tx, product_id, -wanted).await?;
            subtotal = (subtotal + product.price.line_total(quantity)?)?;
            items.push(NewOrderItem {
                product_id,
                product_name: &product.name,
                unit_price: product.price,
                quantity: wanted,
            });
        }

        let shipping = shipping_cost(subtotal)?;
        let total = (subtotal + shipping)?;

        let mut attempt = 0;
        let (order_id, placed_number) = loop {
            attempt += 1;
            let number = order_number(Utc::now(), &mut rand::rng());
            let mut savepoint = tx.begin().await?;
            let inserted = OrderRepository::insert(
                &mut savepoint,
                &NewOrder {
                    order_number: &number,
                    user_id: user,
                    subtotal,
                    shipping_cost: shipping,
                    total,
                    shipping_address: &request.shipping_address,
                    contact_phone: contact_phone.as_deref(),
                    note: note.as_deref(),
                },
            )
            .await;
            match inserted {
                Ok(id) => {
                    savepoint.commit().await?;
                    break (id, number);
                }
                Err(RepositoryError::Conflict(_)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    savepoint.rollback().await?;
                    tracing::warn!(order_number = %number, "Order number collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        for item in &items {
            OrderRepository::insert_item(&mut tx, order_id, item).await?;
        }
        OrderRepository::record_status(&mut tx, order_id, None, OrderStatus::Pending, Some(user), None)
            .await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            order_number = %placed_number,
            total = %total,
            "Order placed"
        );
        self.orders
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("order {order_id} vanished after commit")))
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_mine(
        &self,
        user: UserId,
        page: Pagination,
    ) -> Result<Paginated<Order>, AppError> {
        let filter = OrderFilter {
            user_id: Some(user),
            ..OrderFilter::default()
        };
        self.list(&filter, page).await
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<Paginated<Order>, AppError> {
        let (items, total) = self.orders.list(filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// An order visible to `viewer`: their own, or any for order staff.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order does not exist or belongs to
    /// someone else.
    pub async fn get(&self, viewer: &CurrentUser, id: OrderId) -> Result<Order, AppError> {
        self.orders
            .get_by_id(id)
            .await?
            .filter(|order| order.user_id == viewer.id || viewer.role.can_view_all_orders())
            .ok_or_else(|| AppError::not_found("Order"))
    }

    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn history(
        &self,
        viewer: &CurrentUser,
        id: OrderId,
    ) -> Result<Vec<OrderStatusChange>, AppError> {
        self.get(viewer, id).await?;
        Ok(self.orders.history(id).await?)
    }

    #[must_use]
    pub fn statuses() -> Vec<StatusOption> {
        StatusOption::all()
    }

    /// Move an order along the status machine on behalf of staff.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a transition the machine forbids,
    /// `AppError::NotFound` if the order does not exist.
    #[instrument(skip(self, actor, comment), fields(order_id = %id, actor = %actor.id, to = %status))]
    pub async fn update_status(
        &self,
        actor: &CurrentUser,
        id: OrderId,
        status: OrderStatus,
        comment: Option<String>,
    ) -> Result<Order, AppError> {
        self.transition(actor.id, id, status, comment, None).await
    }

    /// Cancel an order.
    ///
    /// Customers may cancel their own orders while they are still
    /// cancellable; order staff follow the status machine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when the order can no longer be
    /// cancelled, `AppError::NotFound` when it is not visible to `actor`.
    #[instrument(skip(self, actor, reason), fields(order_id = %id, actor = %actor.id))]
    pub async fn cancel(
        &self,
        actor: &CurrentUser,
        id: OrderId,
        reason: Option<String>,
    ) -> Result<Order, AppError> {
        let customer = (!actor.role.can_manage_orders()).then_some(actor.id);
        self.transition(actor.id, id, OrderStatus::Cancelled, reason, customer)
            .await
    }

    /// Apply `self → to` under a row lock. `customer` restricts the change to
    /// that owner's order within the customer cancellation window.
    async fn transition(
        &self,
        actor: UserId,
        id: OrderId,
        to: OrderStatus,
        comment: Option<String>,
        customer: Option<UserId>,
    ) -> Result<Order, AppError> {
        let comment = bounded_optional("comment", comment, MAX_NOTE_LENGTH)?;
        let mut tx = self.pool.begin().await?;

        let (owner, from, number) = OrderRepository::lock_status(&mut tx, id)
            .await
            .map_err(|e| not_found_as("Order", e))?;

        if let Some(customer) = customer {
            if customer != owner {
                return Err(AppError::not_found("Order"));
            }
            if !from.customer_cancellable() {
                return Err(customer_cancel_error(from));
            }
        }
        check_transition(from, to)?;

        if to.restores_stock() {
            for line in OrderRepository::stock_lines(&mut tx, id).await? {
                if let Some(product) = line.product_id {
                    ProductRepository::adjust_stock(&mut tx, product, line.quantity).await?;
                }
            }
        }
        OrderRepository::set_status(&mut tx, id, to).await?;
        OrderRepository::record_status(&mut tx, id, Some(from), to, Some(actor), comment.as_deref())
            .await?;

        if owner != actor {
            notify(
                &mut tx,
                &NewNotification {
                    user_id: owner,
                    kind: NotificationKind::OrderStatus,
                    title: format!("Order {number}: {}", to.label()),
                    body: comment.unwrap_or_else(|| {
                        format!("Your order {number} is now {}.", to.label().to_lowercase())
                    }),
                    link: Some(format!("/account/orders/{id}")),
                },
            )
            .await?;
        }
        tx.commit().await?;

        tracing::info!(order_id = %id, from = %from, to = %to, "Order status changed");
        self.orders
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Order"))
    }
}

/// Merge duplicate product lines and check the line limits.
fn merge_lines(lines: &[OrderLineRequest]) -> Result<BTreeMap<ProductId, u32>, AppError> {
    if lines.is_empty() {
        return Err(AppError::bad_request("an order needs at least one item"));
    }
    if lines.len() > MAX_LINES {
        return Err(AppError::bad_request(format!(
            "an order can have at most {MAX_LINES} items"
        )));
    }

    let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(AppError::bad_request(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        let quantity = merged.entry(line.product_id).or_default();
        *quantity = quantity.saturating_add(line.quantity);
        if *quantity > MAX_QUANTITY {
            return Err(AppError::bad_request(format!(
                "quantity for product {} cannot exceed {MAX_QUANTITY}",
                line.product_id
            )));
        }
    }
    Ok(merged)
}

/// Shipping is free from `FREE_SHIPPING_FROM`, flat otherwise.
///
/// # Errors
///
/// Never in practice; the constants are valid amounts.
pub fn shipping_cost(subtotal: Money) -> Result<Money, AppError> {
    if subtotal.amount() >= FREE_SHIPPING_FROM {
        Ok(Money::ZERO)
    } else {
        Ok(Money::new(FLAT_SHIPPING)?)
    }
}

/// `ORD-YYYYMMDD-XXXXXX`, the suffix drawn from an unambiguous alphabet.
fn order_number(now: DateTime<Utc>, rng: &mut impl Rng) -> String {
    let suffix: String = (0..6)
        .filter_map(|_| ORDER_NUMBER_ALPHABET.choose(&mut *rng).copied().map(char::from))
        .collect();
    format!("ORD-{}-{suffix}", now.format("%Y%m%d"))
}

fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), AppError> {
    if from == to {
        return Err(AppError::bad_request(format!("order is already {from}")));
    }
    if from.can_transition_to(to) {
        return Ok(());
    }
    if from == OrderStatus::Delivered && to == OrderStatus::Cancelled {
        return Err(AppError::bad_request("cannot cancel a delivered order"));
    }
    Err(AppError::bad_request(format!(
        "cannot change order status from {from} to {to}"
    )))
}

fn customer_cancel_error(from: OrderStatus) -> AppError {
    match from {
        OrderStatus::Delivered => AppError::bad_request("cannot cancel a delivered order"),
        OrderStatus::Cancelled => AppError::bad_request("order is already CANCELLED"),
        other => AppError::bad_request(format!(
            "order in status {other} can no longer be cancelled; contact support"
        )),
    }
}

fn bounded_optional(
    field: &str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, AppError> {
    let value = optional_text(value.as_deref());
    if let Some(v) = &value
        && v.chars().count() > max
    {
        return Err(AppError::bad_request(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn line(product: i32, quantity: u32) -> OrderLineRequest {
        OrderLineRequest {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    fn money(amount: i64) -> Money {
        Money::new(Decimal::from(amount)).unwrap()
    }

    #[test]
    fn test_duplicate_lines_are_merged() {
        let merged = merge_lines(&[line(3, 2), line(1, 1), line(3, 5)]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&ProductId::new(3)], 7);
        assert_eq!(merged.keys().next(), Some(&ProductId::new(1)));
    }

    #[test]
    fn test_line_limits() {
        assert!(merge_lines(&[]).is_err());
        assert!(merge_lines(&[line(1, 0)]).is_err());
        assert!(merge_lines(&[line(1, 999)]).is_ok());
        assert!(merge_lines(&[line(1, 500), line(1, 500)]).is_err());
        let many: Vec<_> = (1..=51).map(|i| line(i, 1)).collect();
        assert!(merge_lines(&many).is_err());
    }

    #[test]
    fn test_shipping_threshold() {
        assert_eq!(shipping_cost(money(4999)).unwrap(), money(300));
        assert_eq!(shipping_cost(money(5000)).unwrap(), Money::ZERO);
        assert_eq!(shipping_cost(Money::ZERO).unwrap(), money(300));
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        let number = order_number(now, &mut StdRng::seed_from_u64(7));
        assert!(number.starts_with("ORD-20240307-"), "{number}");
        let suffix = number.strip_prefix("ORD-20240307-").unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| ORDER_NUMBER_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_delivered_cancel_message() {
        let err = check_transition(OrderStatus::Delivered, OrderStatus::Cancelled).unwrap_err();
        assert_eq!(err.to_string(), "cannot cancel a delivered order");
    }

    #[test]
    fn test_transition_message_names_both_statuses() {
        let err = check_transition(OrderStatus::Pending, OrderStatus::Shipped).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot change order status from PENDING to SHIPPED"
        );
        assert!(check_transition(OrderStatus::Shipped, OrderStatus::Shipped).is_err());
        assert!(check_transition(OrderStatus::Shipped, OrderStatus::Delivered).is_ok());
    }

    #[test]
    fn test_customer_cancel_window_message() {
        let err = customer_cancel_error(OrderStatus::Processing);
        assert!(err.to_string().contains("PROCESSING"));
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_note_length() {
        assert_eq!(bounded_optional("note", Some("  ".into()), 5).unwrap(), None);
        assert!(bounded_optional("note", Some("abcdef".into()), 5).is_err());
    }
}
