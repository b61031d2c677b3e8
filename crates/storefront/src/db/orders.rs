//! Order repository.
//!
//! Placing an order and changing its status are single transactions that
//! also touch stock and coupon usage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use animart_core::catalog::StockKey;
use animart_core::{CouponId, OrderId, OrderItemId, OrderStatus, ProductId, UserId, VariantId};

use super::{Page, RepositoryError, coupons, products};
use crate::models::order::{Order, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = r"
    id, order_number, user_id, email, shipping_address, subtotal, discount,
    shipping_cost, total, coupon_id, coupon_code, status, created_at, updated_at
";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: Option<UserId>,
    email: String,
    shipping_address: Json<ShippingAddress>,
    subtotal: Decimal,
    discount: Decimal,
    shipping_cost: Decimal,
    total: Decimal,
    coupon_id: Option<CouponId>,
    coupon_code: Option<String>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            email: self.email,
            shipping_address: self.shipping_address.0,
            subtotal: self.subtotal,
            discount: self.discount,
            shipping_cost: self.shipping_cost,
            total: self.total,
            coupon_code: self.coupon_code,
            status: self.status,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    variant_id: Option<VariantId>,
    product_name: String,
    color: String,
    size: String,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            variant_id: r.variant_id,
            product_name: r.product_name,
            color: r.color,
            size: r.size,
            quantity: r.quantity,
            unit_price: r.unit_price,
            total_price: r.total_price,
        }
    }
}

impl OrderItem {
    /// The stock row this item was taken from, if the product still exists.
    fn stock_key(&self) -> Option<(ProductId, StockKey)> {
        let product_id = self.product_id?;
        let key = self.variant_id.map_or_else(
            || StockKey::Size {
                size: self.size.clone(),
            },
            |id| StockKey::Variant { id },
        );
        Some((product_id, key))
    }
}

/// A server-priced line ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub stock_key: StockKey,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// A fully validated order ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub email: String,
    pub shipping_address: ShippingAddress,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub coupon: Option<(CouponId, String)>,
    pub lines: Vec<NewOrderLine>,
}

/// Constraints on a status change.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange {
    pub next: OrderStatus,
    /// Only change orders owned by this user.
    pub owner: Option<UserId>,
    /// Only change orders currently in this status.
    pub only_from: Option<OrderStatus>,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub processing_orders: i64,
    pub revenue: Decimal,
    pub revenue_last_30_days: Decimal,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist an order in one transaction: take stock for every line,
    /// redeem the coupon, insert the order and its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a line is out of stock or the
    /// coupon was used up concurrently. Nothing is written in that case.
    pub async fn place(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for line in &order.lines {
            if !products::take_stock(&mut tx, line.product_id, &line.stock_key, line.quantity)
                .await?
            {
                return Err(RepositoryError::Conflict(format!(
                    "insufficient stock for {} ({})",
                    line.product_name,
                    describe(&line.color, &line.size)
                )));
            }
        }

        if let Some((coupon_id, _)) = &order.coupon
            && !coupons::redeem(&mut tx, *coupon_id).await?
        {
            return Err(RepositoryError::Conflict(
                "This coupon has reached its usage limit".to_owned(),
            ));
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop.order
                (user_id, email, shipping_address, subtotal, discount, shipping_cost,
                 total, coupon_id, coupon_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(&order.email)
        .bind(Json(&order.shipping_address))
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.shipping_cost)
        .bind(order.total)
        .bind(order.coupon.as_ref().map(|(id, _)| *id))
        .bind(order.coupon.as_ref().map(|(_, code)| code.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let variant_id = match &line.stock_key {
                StockKey::Variant { id } => Some(*id),
                StockKey::Size { .. } => None,
            };
            let item = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO shop.order_item
                    (order_id, product_id, variant_id, product_name, color, size,
                     quantity, unit_price, total_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id, order_id, product_id, variant_id, product_name, color, size,
                          quantity, unit_price, total_price
                ",
            )
            .bind(row.id)
            .bind(line.product_id)
            .bind(variant_id)
            .bind(&line.product_name)
            .bind(&line.color)
            .bind(&line.size)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.total_price)
            .fetch_one(&mut *tx)
            .await?;
            items.push(OrderItem::from(item));
        }

        tx.commit().await?;
        Ok(row.into_order(items))
    }

    /// Get an order by ID, optionally restricted to an owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(
        &self,
        id: OrderId,
        owner: Option<UserId>,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1 AND ($2::INTEGER IS NULL OR user_id = $2)"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = load_items(&mut *self.pool.acquire().await?, &[row.id]).await?;
        Ok(Some(row.into_order(items.into_values().flatten().collect())))
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        self.with_items(rows).await
    }

    /// All orders, optionally filtered by status, newest first. Returns the
    /// page and the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        page: Page,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.order WHERE $1::shop.order_status IS NULL OR status = $1",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.order
            WHERE $1::shop.order_status IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((self.with_items(rows).await?, total))
    }

    /// Move an order to a new status.
    ///
    /// The order row is locked for the duration. Moving to a status that
    /// releases inventory puts the stock back and returns the coupon use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no matching order exists.
    /// Returns `RepositoryError::Conflict` if the transition is not allowed.
    pub async fn change_status(
        &self,
        id: OrderId,
        change: StatusChange,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.order
            WHERE id = $1 AND ($2::INTEGER IS NULL OR user_id = $2)
            FOR UPDATE
            "
        ))
        .bind(id)
        .bind(change.owner)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        check_transition(row.status, change)?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE shop.order SET status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(change.next)
        .fetch_one(&mut *tx)
        .await?;

        let items: Vec<OrderItem> = load_items(&mut tx, &[id])
            .await?
            .into_values()
            .flatten()
            .collect();

        if change.next.releases_inventory() {
            for item in &items {
                if let Some((product_id, key)) = item.stock_key() {
                    products::return_stock(&mut tx, product_id, &key, item.quantity).await?;
                }
            }
            if let Some(coupon_id) = row.coupon_id {
                coupons::release(&mut tx, coupon_id).await?;
            }
        }

        tx.commit().await?;
        Ok(row.into_order(items))
    }

    /// Headline order numbers. Cancelled and refunded orders don't count as revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let stats = sqlx::query_as::<_, OrderStats>(
            r"
            SELECT
                COUNT(*) AS total_orders,
                COUNT(*) FILTER (WHERE status = 'PENDING') AS pending_orders,
                COUNT(*) FILTER (WHERE status = 'PROCESSING') AS processing_orders,
                COALESCE(SUM(total) FILTER (WHERE status NOT IN ('CANCELLED', 'REFUNDED')), 0)
                    AS revenue,
                COALESCE(SUM(total) FILTER (
                    WHERE status NOT IN ('CANCELLED', 'REFUNDED')
                      AND created_at >= NOW() - INTERVAL '30 days'
                ), 0) AS revenue_last_30_days
            FROM shop.order
            ",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }

    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let mut items = load_items(&mut *self.pool.acquire().await?, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let order_items = items.remove(&r.id).unwrap_or_default();
                r.into_order(order_items)
            })
            .collect())
    }
}

fn check_transition(current: OrderStatus, change: StatusChange) -> Result<(), RepositoryError> {
    if let Some(required) = change.only_from
        && current != required
    {
        return Err(RepositoryError::Conflict(format!(
            "order is {current} and can no longer be changed"
        )));
    }
    if !current.can_transition_to(change.next) {
        return Err(RepositoryError::Conflict(format!(
            "cannot change order status from {current} to {}",
            change.next
        )));
    }
    Ok(())
}

async fn load_items(
    conn: &mut PgConnection,
    order_ids: &[OrderId],
) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
    let ids: Vec<i32> = order_ids.iter().map(|id| id.as_i32()).collect();
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, variant_id, product_name, color, size,
               quantity, unit_price, total_price
        FROM shop.order_item WHERE order_id = ANY($1)
        ORDER BY order_id, id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut map: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        map.entry(row.order_id).or_default().push(row.into());
    }
    Ok(map)
}

fn describe(color: &str, size: &str) -> String {
    if color.is_empty() {
        size.to_owned()
    } else {
        format!("{color} / {size}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn change(next: OrderStatus, only_from: Option<OrderStatus>) -> StatusChange {
        StatusChange {
            next,
            owner: None,
            only_from,
        }
    }

    #[test]
    fn test_check_transition_follows_lifecycle() {
        assert!(check_transition(OrderStatus::Pending, change(OrderStatus::Processing, None)).is_ok());
        let err =
            check_transition(OrderStatus::Delivered, change(OrderStatus::Pending, None)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "constraint violation: cannot change order status from DELIVERED to PENDING"
        );
    }

    #[test]
    fn test_customer_cancel_only_while_pending() {
        let c = change(OrderStatus::Cancelled, Some(OrderStatus::Pending));
        assert!(check_transition(OrderStatus::Pending, c).is_ok());
        // Admins may cancel while processing, customers may not.
        assert!(check_transition(OrderStatus::Processing, c).is_err());
        assert!(
            check_transition(OrderStatus::Processing, change(OrderStatus::Cancelled, None)).is_ok()
        );
    }

    #[test]
    fn test_stock_key_from_item() {
        let mut item = OrderItem {
            id: OrderItemId::new(1),
            product_id: Some(ProductId::new(4)),
            variant_id: Some(VariantId::new(9)),
            product_name: "Chainsaw Man Tee".into(),
            color: "Red".into(),
            size: "S".into(),
            quantity: 1,
            unit_price: Decimal::ONE,
            total_price: Decimal::ONE,
        };
        assert_eq!(
            item.stock_key().unwrap().1,
            StockKey::Variant {
                id: VariantId::new(9)
            }
        );
        item.variant_id = None;
        assert_eq!(item.stock_key().unwrap().1, StockKey::Size { size: "S".into() });
        item.product_id = None;
        assert!(item.stock_key().is_none());
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe("", "M"), "M");
        assert_eq!(describe("Navy", "M"), "Navy / M");
    }
}
