//! Checkout against a real database.
//!
//! Requires `TEST_DATABASE_URL`; run with `cargo test -- --ignored`.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use pet_market_core::{
    AddressSnapshot, OrderId, OrderNumber, OrderStatus, Price, ProductId, Quantity,
    SpecSelection, UserId,
};
use pet_market_integration_tests::{
    address_fields, create_product, create_user, price, test_pool,
};
use pet_market_storefront::services::address_book::AddressBook;
use pet_market_storefront::services::cart::CartService;
use pet_market_storefront::services::catalog::CatalogService;
use pet_market_storefront::services::orders::{
    AddressChoice, Checkout, ORDER_NUMBER_ATTEMPTS, OrderError, OrderService, OrderSource,
    RequestedLine, insert_header,
};
use sqlx::PgPool;

fn direct(product_id: ProductId, quantity: i64) -> Checkout {
    Checkout {
        payment_method: "alipay".to_string(),
        address: AddressChoice::Inline(address_fields("Mia")),
        source: OrderSource::Direct(vec![RequestedLine {
            product_id,
            quantity: Quantity::new(quantity).unwrap(),
            selected_specs: SpecSelection::empty(),
        }]),
    }
}

fn direct_lines(products: &[ProductId], quantity: i64) -> Checkout {
    Checkout {
        payment_method: "alipay".to_string(),
        address: AddressChoice::Inline(address_fields("Mia")),
        source: OrderSource::Direct(
            products
                .iter()
                .map(|&product_id| RequestedLine {
                    product_id,
                    quantity: Quantity::new(quantity).unwrap(),
                    selected_specs: SpecSelection::empty(),
                })
                .collect(),
        ),
    }
}

fn from_cart() -> Checkout {
    Checkout {
        payment_method: "wechat".to_string(),
        address: AddressChoice::Inline(address_fields("Mia")),
        source: OrderSource::Cart,
    }
}

async fn stock_and_sales(pool: &PgPool, id: ProductId) -> (i32, i32) {
    let product = CatalogService::new(pool).get(id).await.unwrap();
    (product.stock, product.sales)
}

async fn add_to_cart(pool: &PgPool, user: UserId, product: ProductId, color: &str, qty: i64) {
    CartService::new(pool)
        .add(
            user,
            product,
            &SpecSelection::from_pairs([("color", color)]),
            qty,
        )
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_cart_checkout_total_matches_items_and_consumes_cart() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let cheap = create_product(&pool, "0.10", 5_000).await;
    let food = create_product(&pool, "19.90", 10).await;

    add_to_cart(&pool, user.id, cheap, "red", 1000).await;
    add_to_cart(&pool, user.id, food, "red", 2).await;
    add_to_cart(&pool, user.id, food, "blue", 1).await;

    let order = OrderService::new(&pool)
        .create(user.id, from_cart())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 3);
    assert_eq!(order.total_amount, price("159.70"));
    assert_eq!(order.total_amount, order.items_total().unwrap());

    // The persisted order agrees with what create returned.
    let stored = OrderService::new(&pool)
        .get(order.id, Some(user.id))
        .await
        .unwrap();
    assert_eq!(stored.total_amount, stored.items_total().unwrap());
    assert_eq!(stored.order_number, order.order_number);

    assert!(CartService::new(&pool).list(user.id).await.unwrap().is_empty());
    assert_eq!(stock_and_sales(&pool, cheap).await, (4_000, 1000));
    assert_eq!(stock_and_sales(&pool, food).await, (7, 3));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_price_is_captured_at_checkout() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "10.00", 5).await;
    add_to_cart(&pool, user.id, product, "red", 1).await;

    sqlx::query("UPDATE products SET price = 12.50 WHERE id = $1")
        .bind(product)
        .execute(&pool)
        .await
        .unwrap();

    let order = OrderService::new(&pool)
        .create(user.id, from_cart())
        .await
        .unwrap();
    assert_eq!(order.items.first().unwrap().price, price("12.50"));

    sqlx::query("UPDATE products SET price = 99.00 WHERE id = $1")
        .bind(product)
        .execute(&pool)
        .await
        .unwrap();

    let stored = OrderService::new(&pool)
        .get(order.id, Some(user.id))
        .await
        .unwrap();
    let item = stored.items.first().unwrap();
    assert_eq!(item.price, price("12.50"));
    assert_eq!(item.product.price, price("99.00"));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_failed_checkout_leaves_cart_and_stock_untouched() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let plenty = create_product(&pool, "5.00", 100).await;
    let scarce = create_product(&pool, "8.00", 1).await;

    add_to_cart(&pool, user.id, plenty, "red", 3).await;
    add_to_cart(&pool, user.id, scarce, "red", 2).await;

    let err = OrderService::new(&pool)
        .create(user.id, from_cart())
        .await
        .unwrap_err();
    assert!(
        matches!(err, OrderError::InsufficientStock { product_id, requested: 2, available: 1, .. } if product_id == scarce)
    );

    assert_eq!(CartService::new(&pool).list(user.id).await.unwrap().len(), 2);
    assert_eq!(stock_and_sales(&pool, plenty).await, (100, 0));
    assert_eq!(stock_and_sales(&pool, scarce).await, (1, 0));
    assert!(OrderService::new(&pool).list(user.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_empty_cart_is_rejected() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;

    let err = OrderService::new(&pool)
        .create(user.id, from_cart())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::EmptyOrder));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_direct_buy_leaves_cart_alone() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "3.30", 10).await;
    add_to_cart(&pool, user.id, product, "red", 1).await;

    let order = OrderService::new(&pool)
        .create(user.id, direct(product, 3))
        .await
        .unwrap();

    assert_eq!(order.total_amount, price("9.90"));
    assert_eq!(CartService::new(&pool).list(user.id).await.unwrap().len(), 1);
    assert_eq!(stock_and_sales(&pool, product).await, (7, 3));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_concurrent_checkouts_cannot_oversell() {
    let pool = test_pool().await;
    let product = create_product(&pool, "49.00", 1).await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;

    let service = OrderService::new(&pool);
    let (first, second) = tokio::join!(
        service.create(alice.id, direct(product, 1)),
        service.create(bob.id, direct(product, 1)),
    );

    let results = [first, second];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let out_of_stock = results
        .iter()
        .filter(|r| matches!(r, Err(OrderError::InsufficientStock { .. })))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(out_of_stock, 1);
    assert_eq!(stock_and_sales(&pool, product).await, (0, 1));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_snapshot_survives_address_deletion() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "15.00", 10).await;
    let fields = address_fields("Mia Chen");

    let book = AddressBook::new(&pool);
    let saved = book.create(user.id, &fields, false).await.unwrap();

    let mut checkout = direct(product, 1);
    checkout.address = AddressChoice::Saved(saved.id);
    let order = OrderService::new(&pool)
        .create(user.id, checkout)
        .await
        .unwrap();

    book.delete(user.id, saved.id).await.unwrap();

    let stored = OrderService::new(&pool)
        .get(order.id, Some(user.id))
        .await
        .unwrap();
    assert_eq!(stored.address, AddressSnapshot::capture(&fields, Some(saved.id)));
    assert_eq!(stored.address.get("name"), Some("Mia Chen"));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_foreign_address_is_not_found() {
    let pool = test_pool().await;
    let owner = create_user(&pool).await;
    let other = create_user(&pool).await;
    let product = create_product(&pool, "15.00", 10).await;
    let saved = AddressBook::new(&pool)
        .create(owner.id, &address_fields("Owner"), false)
        .await
        .unwrap();

    let mut checkout = direct(product, 1);
    checkout.address = AddressChoice::Saved(saved.id);
    let err = OrderService::new(&pool)
        .create(other.id, checkout)
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::AddressNotFound));
    assert_eq!(stock_and_sales(&pool, product).await, (10, 0));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_orders_are_private() {
    let pool = test_pool().await;
    let owner = create_user(&pool).await;
    let other = create_user(&pool).await;
    let product = create_product(&pool, "2.00", 10).await;

    let order = OrderService::new(&pool)
        .create(owner.id, direct(product, 1))
        .await
        .unwrap();

    let err = OrderService::new(&pool)
        .get(order.id, Some(other.id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound));

    let err = OrderService::new(&pool)
        .cancel(order.id, Some(other.id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_status_lifecycle_and_cancel_restores_stock() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "20.00", 5).await;
    let service = OrderService::new(&pool);

    let order = service.create(user.id, direct(product, 2)).await.unwrap();
    assert_eq!(stock_and_sales(&pool, product).await, (3, 2));

    let paid = service
        .pay(order.id, user.id, Some("card"))
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);
    assert_eq!(paid.payment_method, "card");

    let err = service.pay(order.id, user.id, None).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidStatusTransition(_)));

    let cancelled = service.cancel(order.id, Some(user.id)).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_and_sales(&pool, product).await, (5, 0));

    // Cancelling twice must not restore stock twice.
    let err = service.cancel(order.id, Some(user.id)).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidStatusTransition(_)));
    assert_eq!(stock_and_sales(&pool, product).await, (5, 0));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_shipped_order_cannot_be_cancelled() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "20.00", 5).await;
    let service = OrderService::new(&pool);

    let order = service.create(user.id, direct(product, 1)).await.unwrap();
    service.pay(order.id, user.id, None).await.unwrap();
    let shipped = service
        .set_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);

    let err = service.cancel(order.id, Some(user.id)).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidStatusTransition(_)));

    let completed = service
        .set_status(order.id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    assert_eq!(stock_and_sales(&pool, product).await, (4, 1));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_order_numbers_are_unique() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "1.00", 100).await;
    let service = OrderService::new(&pool);

    let mut numbers = Vec::new();
    for _ in 0..10 {
        let order = service.create(user.id, direct(product, 1)).await.unwrap();
        assert_ne!(order.order_number.as_str(), order.id.to_string());
        numbers.push(order.order_number.to_string());
    }
    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), 10);

    let listed = service.list(user.id).await.unwrap();
    assert_eq!(listed.len(), 10);
    assert!(
        listed
            .windows(2)
            .all(|w| w.first().unwrap().create_time >= w.get(1).unwrap().create_time)
    );
    let total: Price = Price::try_sum(listed.iter().map(|o| o.total_amount)).unwrap();
    assert_eq!(total, price("10.00"));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_order_number_collision_retries_then_exhausts() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "1.00", 10).await;
    let taken = OrderService::new(&pool)
        .create(user.id, direct(product, 1))
        .await
        .unwrap()
        .order_number;
    let address = AddressSnapshot::capture(&address_fields("Mia"), None);

    let mut tx = pool.begin().await.unwrap();

    // One collision, then a free number.
    let fresh = OrderNumber::generate(Utc::now(), &mut rand::rng());
    let mut candidates = vec![taken.clone(), fresh.clone()].into_iter();
    let mut drawn = 0;
    let (number, _) = insert_header(
        &mut tx,
        OrderId::generate(),
        user.id,
        "alipay",
        price("1.00"),
        &address,
        || {
            drawn += 1;
            candidates.next().unwrap()
        },
    )
    .await
    .unwrap();
    assert_eq!(number, fresh);
    assert_eq!(drawn, 2);

    // Every candidate collides.
    let mut drawn = 0;
    let err = insert_header(
        &mut tx,
        OrderId::generate(),
        user.id,
        "alipay",
        price("1.00"),
        &address,
        || {
            drawn += 1;
            taken.clone()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, OrderError::OrderNumberExhausted));
    assert_eq!(drawn, ORDER_NUMBER_ATTEMPTS);

    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_overlapping_cancels_restore_all_stock() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let first = create_product(&pool, "5.00", 100).await;
    let second = create_product(&pool, "7.00", 100).await;
    let service = OrderService::new(&pool);

    for _ in 0..10 {
        let a = service
            .create(user.id, direct_lines(&[first, second], 1))
            .await
            .unwrap();
        let b = service
            .create(user.id, direct_lines(&[second, first], 1))
            .await
            .unwrap();

        let (cancel_a, cancel_b) = tokio::join!(
            service.cancel(a.id, Some(user.id)),
            service.cancel(b.id, Some(user.id)),
        );
        assert_eq!(cancel_a.unwrap().status, OrderStatus::Cancelled);
        assert_eq!(cancel_b.unwrap().status, OrderStatus::Cancelled);
    }

    assert_eq!(stock_and_sales(&pool, first).await, (100, 0));
    assert_eq!(stock_and_sales(&pool, second).await, (100, 0));
}
