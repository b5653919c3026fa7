//! Order repository.
//!
//! Orders and items are inserted once by the checkout workflow and never
//! rewritten. The only later writes are status changes, which use a
//! compare-and-set on the current status, and the stock restore on cancel.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use pet_market_core::{
    AddressSnapshot, OrderId, OrderItemId, OrderNumber, OrderStatus, Price, ProductId, Quantity,
    SpecSelection, UserId,
};

use super::{RepositoryError, document_or_empty, stored_quantity};
use crate::models::{Order, OrderItem, ProductSummary};

const ORDER_COLUMNS: &str = "id, order_number, user_id, payment_method, total_amount, status, \
     create_time, address_snapshot";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: OrderNumber,
    user_id: UserId,
    payment_method: String,
    total_amount: Price,
    status: OrderStatus,
    create_time: DateTime<Utc>,
    address_snapshot: String,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        let address = document_or_empty(
            AddressSnapshot::from_storage(Some(&self.address_snapshot)),
            "orders.address_snapshot",
            self.id,
        );
        Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            payment_method: self.payment_method,
            total_amount: self.total_amount,
            status: self.status,
            create_time: self.create_time,
            address,
            items,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    price: Price,
    selected_specs: String,
    name: String,
    current_price: Price,
    image: String,
    stock: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            quantity: stored_quantity(row.quantity, "order_items", row.id)?,
            price: row.price,
            selected_specs: document_or_empty(
                SpecSelection::from_storage(Some(&row.selected_specs)),
                "order_items.selected_specs",
                row.id,
            ),
            product: ProductSummary {
                id: row.product_id,
                name: row.name,
                price: row.current_price,
                image: row.image,
                stock: row.stock,
            },
        })
    }
}

/// Header values for a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder<'o> {
    pub id: OrderId,
    pub order_number: &'o OrderNumber,
    pub user_id: UserId,
    pub payment_method: &'o str,
    pub total_amount: Price,
    pub address: &'o AddressSnapshot,
}

/// Repository for orders and their items.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders with their items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY create_time DESC, order_number DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        self.attach_items(rows).await
    }

    /// Get an order with its items.
    ///
    /// With `owner` set, orders of other users are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(
        &self,
        id: OrderId,
        owner: Option<UserId>,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2)"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Insert the order header.
    ///
    /// Returns `None` without writing if the order number is already taken, so
    /// the caller can retry with a fresh number inside the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        order: &NewOrder<'_>,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let created = sqlx::query_scalar::<_, DateTime<Utc>>(
            "INSERT INTO orders \
                 (id, order_number, user_id, payment_method, total_amount, address_snapshot) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (order_number) DO NOTHING \
             RETURNING create_time",
        )
        .bind(order.id)
        .bind(order.order_number)
        .bind(order.user_id)
        .bind(order.payment_method)
        .bind(order.total_amount)
        .bind(order.address.to_storage())
        .fetch_optional(&mut **tx)
        .await?;
        Ok(created)
    }

    /// Insert one order item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_item(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
        product_id: ProductId,
        quantity: Quantity,
        price: Price,
        specs: &SpecSelection,
    ) -> Result<OrderItemId, RepositoryError> {
        let id = sqlx::query_scalar::<_, OrderItemId>(
            "INSERT INTO order_items (order_id, product_id, quantity, price, selected_specs) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(quantity.as_i32())
        .bind(price)
        .bind(specs.to_storage())
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Lock an order row and read its status.
    ///
    /// With `owner` set, orders of other users are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_status(
        tx: &mut Transaction<'_, Postgres>,
        id: OrderId,
        owner: Option<UserId>,
    ) -> Result<Option<OrderStatus>, RepositoryError> {
        let status = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM orders \
             WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2) \
             FOR UPDATE",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(status)
    }

    /// Read an order's status without locking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status(
        &self,
        id: OrderId,
        owner: Option<UserId>,
    ) -> Result<Option<OrderStatus>, RepositoryError> {
        let status = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM orders WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2)",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;
        Ok(status)
    }

    /// Move an order from `from` to `to` if it is still in `from`.
    ///
    /// Returns `false` if another writer changed the status first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn compare_and_set_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        payment_method: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, payment_method = COALESCE($4, payment_method) \
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(payment_method)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Mark a locked order as cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_cancelled(
        tx: &mut Transaction<'_, Postgres>,
        id: OrderId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET status = 'cancelled' WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Put an order's quantities back into stock and take them off sales.
    ///
    /// Product rows are locked in id order first, the same order checkout
    /// uses, so overlapping cancels and checkouts cannot deadlock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn restore_stock(
        tx: &mut Transaction<'_, Postgres>,
        id: OrderId,
    ) -> Result<u64, RepositoryError> {
        sqlx::query(
            "SELECT p.id FROM products p \
             WHERE p.id IN (SELECT product_id FROM order_items WHERE order_id = $1) \
             ORDER BY p.id FOR UPDATE",
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        let result = sqlx::query(
            "UPDATE products p \
             SET stock = p.stock + q.total, sales = GREATEST(p.sales - q.total, 0) \
             FROM (SELECT product_id, SUM(quantity)::int AS total \
                   FROM order_items WHERE order_id = $1 GROUP BY product_id) q \
             WHERE p.id = q.product_id",
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id.as_uuid()).collect();

        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT i.id, i.order_id, i.product_id, i.quantity, i.price, i.selected_specs, \
                    p.name, p.price AS current_price, p.image, p.stock \
             FROM order_items i \
             JOIN products p ON p.id = i.product_id \
             WHERE i.order_id = ANY($1) \
             ORDER BY i.order_id, i.id",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let order_id = row.order_id;
            items
                .entry(order_id)
                .or_default()
                .push(OrderItem::try_from(row)?);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect())
    }
}
