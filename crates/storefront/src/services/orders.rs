//! Order workflow.
//!
//! Checkout turns the user's cart (or an explicit list of lines for
//! direct-buy) and a shipping address into a persisted order, in a single
//! database transaction:
//!
//! 1. Lock the source cart lines (cart checkout only).
//! 2. Lock the referenced product rows in id order and price every line at
//!    the current catalog price, checking stock ([`price_lines`]).
//! 3. Resolve the address (a saved one owned by the user, or inline fields)
//!    and freeze it into an [`AddressSnapshot`].
//! 4. Insert the order under a fresh order number, retrying on collision.
//! 5. Insert the items, take the stock, and clear the consumed cart lines.
//!
//! Any failure drops the transaction, which rolls every write back, so a
//! failed checkout leaves the cart and stock untouched. Holding the product
//! row locks from step 2 until commit closes the check-then-act race between
//! concurrent checkouts of the same product.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use pet_market_core::{
    AddressError, AddressFields, AddressId, AddressSnapshot, CartLineId, OrderId, OrderNumber,
    OrderStatus, Price, PriceError, ProductId, Quantity, SpecSelection, StatusTransitionError,
    UserId,
};

use crate::db::RepositoryError;
use crate::db::addresses::AddressRepository;
use crate::db::cart::CartRepository;
use crate::db::orders::{NewOrder, OrderRepository};
use crate::db::products::{ProductRepository, StockRow};
use crate::models::{Order, OrderItem, ProductSummary};

/// How many order numbers to try before giving up.
pub const ORDER_NUMBER_ATTEMPTS: u32 = 5;

/// Maximum payment method length (matches the `orders.payment_method` column).
const MAX_PAYMENT_METHOD_LENGTH: usize = 50;

/// Largest total `orders.total_amount` (`NUMERIC(14, 2)`) can hold, in cents.
const MAX_ORDER_TOTAL_CENTS: i64 = 99_999_999_999_999;

/// Errors that can occur in the order workflow.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Nothing to order: the cart is empty or no lines were supplied.
    #[error("order has no items")]
    EmptyOrder,

    /// A line references a product that does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Not enough stock to cover the requested quantity.
    #[error("insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u64,
        available: i32,
    },

    /// The inline shipping address is invalid.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// The saved address does not exist or belongs to another user.
    #[error("address not found")]
    AddressNotFound,

    /// The payment method is blank or too long.
    #[error("invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    /// The order total does not fit the currency range.
    #[error("order total out of range: {0}")]
    Pricing(#[from] PriceError),

    /// Every generated order number collided with an existing order.
    #[error("could not allocate a unique order number after {ORDER_NUMBER_ATTEMPTS} attempts")]
    OrderNumberExhausted,

    /// Persisting the order failed; nothing was written.
    #[error("order creation failed: {0}")]
    OrderCreationFailed(#[source] RepositoryError),

    /// The order does not exist or belongs to another user.
    #[error("order not found")]
    NotFound,

    /// The requested status change is not part of the order lifecycle.
    #[error(transparent)]
    InvalidStatusTransition(#[from] StatusTransitionError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// One line to purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub selected_specs: SpecSelection,
}

/// Where the order lines come from.
#[derive(Debug, Clone)]
pub enum OrderSource {
    /// The user's whole cart; consumed lines are removed on success.
    Cart,
    /// Explicit lines (direct-buy); the cart is left alone.
    Direct(Vec<RequestedLine>),
}

/// Which address to ship to.
#[derive(Debug, Clone)]
pub enum AddressChoice {
    /// A saved address of the ordering user.
    Saved(AddressId),
    /// Address fields typed in at checkout.
    Inline(AddressFields),
}

/// Checkout input.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub payment_method: String,
    pub address: AddressChoice,
    pub source: OrderSource,
}

/// A line priced at the current catalog price.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit_price: Price,
    pub selected_specs: SpecSelection,
    pub product: ProductSummary,
}

/// Priced lines, their exact total, and the stock to take per product.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total: Price,
    pub stock_taken: BTreeMap<ProductId, i32>,
}

/// Price `requested` against locked product rows.
///
/// Quantities are summed per product before the stock check, so two lines of
/// the same product with different specs cannot together oversell it.
///
/// # Errors
///
/// Returns `OrderError::EmptyOrder`, `OrderError::ProductNotFound`,
/// `OrderError::InsufficientStock` or `OrderError::Pricing`. The latter also
/// covers totals too large to store on the order.
pub fn price_lines(
    requested: &[RequestedLine],
    products: &[StockRow],
) -> Result<PricedOrder, OrderError> {
    if requested.is_empty() {
        return Err(OrderError::EmptyOrder);
    }
    let catalog: HashMap<ProductId, &StockRow> = products.iter().map(|p| (p.id, p)).collect();
    let find = |id: ProductId| catalog.get(&id).copied().ok_or(OrderError::ProductNotFound(id));

    let mut wanted: BTreeMap<ProductId, u64> = BTreeMap::new();
    for line in requested {
        find(line.product_id)?;
        *wanted.entry(line.product_id).or_default() += u64::from(line.quantity.get());
    }

    let mut stock_taken = BTreeMap::new();
    for (&product_id, &requested) in &wanted {
        let product = find(product_id)?;
        let available = u64::try_from(product.stock).unwrap_or(0);
        let taken = i32::try_from(requested).ok().filter(|_| requested <= available);
        let Some(taken) = taken else {
            return Err(OrderError::InsufficientStock {
                product_id,
                name: product.name.clone(),
                requested,
                available: product.stock,
            });
        };
        stock_taken.insert(product_id, taken);
    }

    let lines = requested
        .iter()
        .map(|line| {
            let product = find(line.product_id)?;
            let taken = stock_taken.get(&line.product_id).copied().unwrap_or_default();
            Ok(PricedLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: product.price,
                selected_specs: line.selected_specs.clone(),
                product: ProductSummary {
                    id: product.id,
                    name: product.name.clone(),
                    price: product.price,
                    image: product.image.clone(),
                    stock: product.stock - taken,
                },
            })
        })
        .collect::<Result<Vec<_>, OrderError>>()?;

    let line_totals = lines
        .iter()
        .map(|l| l.unit_price.line_total(l.quantity))
        .collect::<Result<Vec<_>, _>>()?;
    let total = Price::try_sum(line_totals)?;
    if total > Price::from_cents(MAX_ORDER_TOTAL_CENTS)? {
        return Err(OrderError::Pricing(PriceError::Overflow));
    }

    Ok(PricedOrder {
        lines,
        total,
        stock_taken,
    })
}

fn validate_payment_method(raw: &str) -> Result<String, OrderError> {
    let method = raw.trim();
    if method.is_empty() {
        return Err(OrderError::InvalidPaymentMethod(
            "payment method is required".to_owned(),
        ));
    }
    if method.chars().count() > MAX_PAYMENT_METHOD_LENGTH {
        return Err(OrderError::InvalidPaymentMethod(format!(
            "payment method must be at most {MAX_PAYMENT_METHOD_LENGTH} characters"
        )));
    }
    Ok(method.to_owned())
}

/// Order operations for one request.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
        }
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns a validation error (`EmptyOrder`, `ProductNotFound`,
    /// `InsufficientStock`, `AddressNotFound`, `InvalidPaymentMethod`,
    /// `Pricing`) before anything is written, `OrderNumberExhausted` if no
    /// unique order number was found, or `OrderCreationFailed` if the
    /// database rejected a write. In every error case nothing is persisted.
    #[tracing::instrument(skip(self, checkout), fields(order_id, order_number))]
    pub async fn create(&self, user_id: UserId, checkout: Checkout) -> Result<Order, OrderError> {
        let payment_method = validate_payment_method(&checkout.payment_method)?;

        let mut tx = self.pool.begin().await?;
        let order = match place(&mut tx, user_id, &payment_method, checkout).await {
            Ok(order) => order,
            Err(OrderError::Repository(e)) => {
                tracing::error!(error = %e, "Order creation rolled back");
                return Err(OrderError::OrderCreationFailed(e));
            }
            Err(e) => return Err(e),
        };
        tx.commit()
            .await
            .map_err(|e| OrderError::OrderCreationFailed(RepositoryError::Database(e)))?;

        let span = tracing::Span::current();
        span.record("order_id", tracing::field::display(order.id));
        span.record("order_number", tracing::field::display(&order.order_number));
        tracing::info!(
            total = %order.total_amount,
            items = order.items.len(),
            "Order created"
        );
        Ok(order)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the database read fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// One of a user's orders (`owner = None` for admins).
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist or is not the user's.
    pub async fn get(&self, id: OrderId, owner: Option<UserId>) -> Result<Order, OrderError> {
        self.orders.get(id, owner).await?.ok_or(OrderError::NotFound)
    }

    /// Confirm payment: `pending` to `paid`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is not the user's.
    /// Returns `OrderError::InvalidStatusTransition` if the order is not pending.
    #[tracing::instrument(skip(self))]
    pub async fn pay(
        &self,
        id: OrderId,
        owner: UserId,
        payment_method: Option<&str>,
    ) -> Result<Order, OrderError> {
        let payment_method = payment_method
            .filter(|m| !m.trim().is_empty())
            .map(validate_payment_method)
            .transpose()?;
        self.advance(id, Some(owner), OrderStatus::Paid, payment_method.as_deref())
            .await
    }

    /// Cancel a pending or paid order, returning its stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is not the user's.
    /// Returns `OrderError::InvalidStatusTransition` once the order has shipped.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: OrderId, owner: Option<UserId>) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let current = OrderRepository::lock_status(&mut tx, id, owner)
            .await?
            .ok_or(OrderError::NotFound)?;
        current.transition(OrderStatus::Cancelled)?;

        OrderRepository::set_cancelled(&mut tx, id).await?;
        let products = OrderRepository::restore_stock(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, from = %current, products, "Order cancelled");
        self.get(id, owner).await
    }

    /// Admin status change. Cancelling goes through [`Self::cancel`].
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist.
    /// Returns `OrderError::InvalidStatusTransition` for moves outside the lifecycle.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, OrderError> {
        if status == OrderStatus::Cancelled {
            return self.cancel(id, None).await;
        }
        self.advance(id, None, status, None).await
    }

    async fn advance(
        &self,
        id: OrderId,
        owner: Option<UserId>,
        to: OrderStatus,
        payment_method: Option<&str>,
    ) -> Result<Order, OrderError> {
        let current = self
            .orders
            .status(id, owner)
            .await?
            .ok_or(OrderError::NotFound)?;
        current.transition(to)?;

        if !self
            .orders
            .compare_and_set_status(id, current, to, payment_method)
            .await?
        {
            // Lost a race; report against whatever status won.
            let now = self
                .orders
                .status(id, owner)
                .await?
                .ok_or(OrderError::NotFound)?;
            return Err(OrderError::InvalidStatusTransition(StatusTransitionError {
                from: now,
                to,
            }));
        }

        tracing::info!(order_id = %id, from = %current, to = %to, "Order status changed");
        self.get(id, owner).await
    }
}

async fn place(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    payment_method: &str,
    checkout: Checkout,
) -> Result<Order, OrderError> {
    let (requested, consumed): (Vec<RequestedLine>, Vec<CartLineId>) = match checkout.source {
        OrderSource::Cart => {
            let lines = CartRepository::lock_for_checkout(tx, user_id).await?;
            let ids = lines.iter().map(|l| l.id).collect();
            let requested = lines
                .into_iter()
                .map(|l| RequestedLine {
                    product_id: l.product_id,
                    quantity: l.quantity,
                    selected_specs: l.selected_specs,
                })
                .collect();
            (requested, ids)
        }
        OrderSource::Direct(lines) => (lines, Vec::new()),
    };
    if requested.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    let mut product_ids: Vec<ProductId> = requested.iter().map(|l| l.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();
    let stock = ProductRepository::lock_for_checkout(tx, &product_ids).await?;
    let priced = price_lines(&requested, &stock)?;

    let address = resolve_address(tx, user_id, checkout.address).await?;

    let order_id = OrderId::generate();
    let (order_number, create_time) = insert_header(
        tx,
        order_id,
        user_id,
        payment_method,
        priced.total,
        &address,
        || OrderNumber::generate(Utc::now(), &mut rand::rng()),
    )
    .await?;

    let mut items = Vec::with_capacity(priced.lines.len());
    for line in priced.lines {
        let item_id = OrderRepository::insert_item(
            tx,
            order_id,
            line.product_id,
            line.quantity,
            line.unit_price,
            &line.selected_specs,
        )
        .await?;
        items.push(OrderItem {
            id: item_id,
            product_id: line.product_id,
            quantity: line.quantity,
            price: line.unit_price,
            selected_specs: line.selected_specs,
            product: line.product,
        });
    }

    for (&product_id, &quantity) in &priced.stock_taken {
        if !ProductRepository::take_stock(tx, product_id, quantity).await? {
            // Rows are locked, so this only trips if the lock was not taken.
            let row = stock.iter().find(|p| p.id == product_id);
            return Err(OrderError::InsufficientStock {
                product_id,
                name: row.map(|p| p.name.clone()).unwrap_or_default(),
                requested: u64::from(quantity.unsigned_abs()),
                available: row.map_or(0, |p| p.stock),
            });
        }
    }

    if !consumed.is_empty() {
        CartRepository::remove_lines(tx, user_id, &consumed).await?;
    }

    Ok(Order {
        id: order_id,
        order_number,
        user_id,
        payment_method: payment_method.to_owned(),
        total_amount: priced.total,
        status: OrderStatus::Pending,
        create_time,
        address,
        items,
    })
}

async fn resolve_address(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    choice: AddressChoice,
) -> Result<AddressSnapshot, OrderError> {
    match choice {
        AddressChoice::Saved(id) => {
            let saved = AddressRepository::get_in(tx, user_id, id)
                .await?
                .ok_or(OrderError::AddressNotFound)?;
            Ok(AddressSnapshot::capture(&saved.fields, Some(saved.id)))
        }
        AddressChoice::Inline(fields) => Ok(AddressSnapshot::capture(&fields, None)),
    }
}

/// Insert the order header, drawing order numbers from `next_number` until
/// one is free.
///
/// # Errors
///
/// Returns `OrderError::OrderNumberExhausted` if every candidate collided.
/// Returns `OrderError::Repository` if an insert fails.
pub async fn insert_header(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    user_id: UserId,
    payment_method: &str,
    total_amount: Price,
    address: &AddressSnapshot,
    mut next_number: impl FnMut() -> OrderNumber,
) -> Result<(OrderNumber, chrono::DateTime<Utc>), OrderError> {
    for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
        let candidate = next_number();
        let header = NewOrder {
            id: order_id,
            order_number: &candidate,
            user_id,
            payment_method,
            total_amount,
            address,
        };
        if let Some(created) = OrderRepository::insert(tx, &header).await? {
            return Ok((candidate, created));
        }
        tracing::warn!(attempt, order_number = %candidate, "Order number collision, retrying");
    }
    Err(OrderError::OrderNumberExhausted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;

    fn price(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap()).unwrap()
    }

    fn product(name: &str, unit: &str, stock: i32) -> StockRow {
        StockRow {
            id: ProductId::generate(),
            name: name.to_owned(),
            price: price(unit),
            image: format!("/uploads/{name}.jpg"),
            stock,
        }
    }

    fn line(product: &StockRow, quantity: i64, specs: &[(&str, &str)]) -> RequestedLine {
        RequestedLine {
            product_id: product.id,
            quantity: Quantity::new(quantity).unwrap(),
            selected_specs: SpecSelection::from_pairs(specs.iter().copied()),
        }
    }

    #[test]
    fn test_total_beyond_storable_range_is_a_pricing_error() {
        let kennel = product("kennel", "9999999999.99", 1000);
        let err = price_lines(&[line(&kennel, 200, &[])], &[kennel.clone()]).unwrap_err();
        assert!(matches!(err, OrderError::Pricing(PriceError::Overflow)));

        let largest = product("largest", "9999999999.99", 1000);
        let priced = price_lines(&[line(&largest, 100, &[])], &[largest.clone()]).unwrap();
        assert_eq!(priced.total, price("999999999999.00"));
    }

    #[test]
    fn test_total_is_sum_of_line_totals() {
        let food = product("food", "19.99", 10);
        let toy = product("toy", "0.10", 1000);
        let priced = price_lines(
            &[line(&food, 3, &[]), line(&toy, 7, &[("color", "red")])],
            &[food.clone(), toy.clone()],
        )
        .unwrap();

        assert_eq!(priced.total, price("60.67"));
        let recomputed = Price::try_sum(
            priced
                .lines
                .iter()
                .map(|l| l.unit_price.line_total(l.quantity).unwrap()),
        )
        .unwrap();
        assert_eq!(priced.total, recomputed);
    }

    #[test]
    fn test_many_small_lines_have_no_drift() {
        let treat = product("treat", "0.10", 10_000);
        let requested: Vec<_> = (0..1000).map(|_| line(&treat, 1, &[])).collect();
        let priced = price_lines(&requested, std::slice::from_ref(&treat)).unwrap();
        assert_eq!(priced.total, price("100.00"));
    }

    #[test]
    fn test_captures_current_price() {
        let leash = product("leash", "12.50", 5);
        let priced = price_lines(&[line(&leash, 2, &[])], std::slice::from_ref(&leash)).unwrap();
        assert_eq!(priced.lines.first().unwrap().unit_price, price("12.50"));
        assert_eq!(priced.lines.first().unwrap().product.stock, 3);
    }

    #[test]
    fn test_empty_order_is_rejected() {
        assert!(matches!(price_lines(&[], &[]), Err(OrderError::EmptyOrder)));
    }

    #[test]
    fn test_unknown_product_is_rejected() {
        let bowl = product("bowl", "5.00", 5);
        let err = price_lines(&[line(&bowl, 1, &[])], &[]).unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound(id) if id == bowl.id));
    }

    #[test]
    fn test_insufficient_stock_names_product() {
        let bed = product("bed", "45.00", 1);
        let err = price_lines(&[line(&bed, 2, &[])], std::slice::from_ref(&bed)).unwrap_err();
        match err {
            OrderError::InsufficientStock {
                product_id,
                name,
                requested,
                available,
            } => {
                assert_eq!(product_id, bed.id);
                assert_eq!(name, "bed");
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stock_check_sums_lines_of_same_product() {
        let collar = product("collar", "8.00", 3);
        let requested = [
            line(&collar, 2, &[("size", "S")]),
            line(&collar, 2, &[("size", "M")]),
        ];
        let err = price_lines(&requested, std::slice::from_ref(&collar)).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { requested: 4, available: 3, .. }
        ));
    }

    #[test]
    fn test_stock_taken_is_aggregated() {
        let collar = product("collar", "8.00", 5);
        let requested = [
            line(&collar, 2, &[("size", "S")]),
            line(&collar, 3, &[("size", "M")]),
        ];
        let priced = price_lines(&requested, std::slice::from_ref(&collar)).unwrap();
        assert_eq!(priced.stock_taken.get(&collar.id), Some(&5));
        assert_eq!(priced.lines.len(), 2);
        assert_eq!(priced.lines.get(1).unwrap().selected_specs.get("size"), Some("M"));
    }

    #[test]
    fn test_payment_method_is_trimmed_and_required() {
        assert_eq!(validate_payment_method(" alipay ").unwrap(), "alipay");
        assert!(validate_payment_method("   ").is_err());
        assert!(validate_payment_method(&"x".repeat(51)).is_err());
    }
}
