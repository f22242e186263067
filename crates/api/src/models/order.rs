//! Orders, their line items and status history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub shipping_address: ShippingAddress,
    pub contact_phone: Option<String>,
    pub note: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// A line snapshot. `product_id` is `None` once the product is deleted; the
/// name and price stay as they were when the order was placed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// Delivery address, stored as JSONB.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub recipient: String,
    pub city: String,
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl ShippingAddress {
    /// Names the first blank required field.
    ///
    /// # Errors
    ///
    /// Returns a message suitable for a 400 response.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("recipient", &self.recipient),
            ("city", &self.city),
            ("street", &self.street),
        ] {
            if value.trim().is_empty() {
                return Err(format!("shippingAddress.{field} is required"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChange {
    pub id: i32,
    pub order_id: OrderId,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub changed_by: Option<UserId>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub shipping_address: ShippingAddress,
    pub contact_phone: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
    /// Matches the order number or the customer's email.
    pub search: Option<String>,
}

/// Entry of `GET /orders/statuses`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusOption {
    pub value: OrderStatus,
    pub label: &'static str,
}

impl StatusOption {
    #[must_use]
    pub fn all() -> Vec<Self> {
        OrderStatus::ALL
            .into_iter()
            .map(|value| Self {
                value,
                label: value.label(),
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        let mut address = ShippingAddress {
            recipient: "Ann Lee".into(),
            city: "Kazan".into(),
            street: "Baumana 1".into(),
            postal_code: None,
            country: None,
        };
        assert!(address.validate().is_ok());
        address.city = "  ".into();
        assert_eq!(
            address.validate().unwrap_err(),
            "shippingAddress.city is required"
        );
    }

    #[test]
    fn test_status_options_cover_all() {
        let options = StatusOption::all();
        assert_eq!(options.len(), OrderStatus::ALL.len());
        let json = serde_json::to_value(&options[0]).unwrap();
        assert_eq!(json["value"], "PENDING");
        assert_eq!(json["label"], "Awaiting confirmation");
    }

    #[test]
    fn test_create_request_shape() {
        let req: CreateOrderRequest = serde_json::from_str(
            r#"{"items":[{"productId":4,"quantity":2}],
                "shippingAddress":{"recipient":"A","city":"B","street":"C"}}"#,
        )
        .unwrap();
        assert_eq!(req.items[0].product_id, ProductId::new(4));
        assert_eq!(req.items[0].quantity, 2);
        assert!(req.note.is_none());
    }
}
