//! Cart lines, favorites and catalog listing against a real database.
//!
//! Requires `TEST_DATABASE_URL`; run with `cargo test -- --ignored`.

#![allow(clippy::unwrap_used)]

use pet_market_core::{PageRequest, QuantityError, SpecSelection};
use pet_market_integration_tests::{create_product, create_user, price, test_pool};
use pet_market_storefront::db::FavoriteRepository;
use pet_market_storefront::models::{ProductFilter, ProductSort};
use pet_market_storefront::services::cart::{CartError, CartService};
use pet_market_storefront::services::catalog::CatalogService;

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_spec_selection_round_trips() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "9.90", 10).await;
    let specs = SpecSelection::from_pairs([("color", "red")]);

    let line = CartService::new(&pool)
        .add(user.id, product, &specs, 1)
        .await
        .unwrap();
    assert_eq!(line.selected_specs, specs);

    let listed = CartService::new(&pool).list(user.id).await.unwrap();
    assert_eq!(listed.first().unwrap().selected_specs, specs);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_add_increments_and_update_sets() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "9.90", 10).await;
    let cart = CartService::new(&pool);
    let red = SpecSelection::from_pairs([("color", "red")]);
    let blue = SpecSelection::from_pairs([("color", "blue")]);

    let first = cart.add(user.id, product, &red, 2).await.unwrap();
    let again = cart.add(user.id, product, &red, 3).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(again.quantity.get(), 5);

    let other = cart.add(user.id, product, &blue, 1).await.unwrap();
    assert_ne!(other.id, first.id);

    let updated = cart.update(user.id, first.id, 1).await.unwrap();
    assert_eq!(updated.quantity.get(), 1);
    assert_eq!(updated.subtotal().unwrap(), price("9.90"));

    assert!(matches!(
        cart.update(user.id, first.id, 0).await.unwrap_err(),
        CartError::InvalidQuantity(_)
    ));
    assert!(matches!(
        cart.add(user.id, product, &red, -1).await.unwrap_err(),
        CartError::InvalidQuantity(_)
    ));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_add_past_line_limit_is_rejected_without_change() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "1.00", 10).await;
    let cart = CartService::new(&pool);
    let specs = SpecSelection::empty();

    let line = cart.add(user.id, product, &specs, 9_998).await.unwrap();
    assert!(matches!(
        cart.add(user.id, product, &specs, 5).await.unwrap_err(),
        CartError::InvalidQuantity(QuantityError::LineFull { max: 9_999 })
    ));

    let listed = cart.list(user.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed.first().unwrap().id, line.id);
    assert_eq!(listed.first().unwrap().quantity.get(), 9_998);

    let full = cart.add(user.id, product, &specs, 1).await.unwrap();
    assert_eq!(full.quantity.get(), 9_999);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_cart_lines_are_private() {
    let pool = test_pool().await;
    let owner = create_user(&pool).await;
    let other = create_user(&pool).await;
    let product = create_product(&pool, "9.90", 10).await;
    let cart = CartService::new(&pool);

    let line = cart
        .add(owner.id, product, &SpecSelection::empty(), 1)
        .await
        .unwrap();

    assert!(matches!(
        cart.remove(other.id, line.id).await.unwrap_err(),
        CartError::NotFound
    ));
    assert!(matches!(
        cart.update(other.id, line.id, 4).await.unwrap_err(),
        CartError::NotFound
    ));
    assert_eq!(cart.list(owner.id).await.unwrap().len(), 1);

    cart.remove(owner.id, line.id).await.unwrap();
    assert!(cart.list(owner.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_cart_list_is_idempotent_and_live() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "9.90", 10).await;
    let cart = CartService::new(&pool);
    cart.add(user.id, product, &SpecSelection::empty(), 2)
        .await
        .unwrap();

    let first = cart.list(user.id).await.unwrap();
    let second = cart.list(user.id).await.unwrap();
    assert_eq!(first, second);

    sqlx::query("UPDATE products SET price = 7.00 WHERE id = $1")
        .bind(product)
        .execute(&pool)
        .await
        .unwrap();
    let line = cart.list(user.id).await.unwrap().pop().unwrap();
    assert_eq!(line.product.price, price("7.00"));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_unknown_product_is_rejected() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;

    let err = CartService::new(&pool)
        .add(
            user.id,
            pet_market_core::ProductId::generate(),
            &SpecSelection::empty(),
            1,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::ProductNotFound));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_favorites_are_idempotent() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let product = create_product(&pool, "9.90", 10).await;
    let favorites = FavoriteRepository::new(&pool);

    let first = favorites.add(user.id, product).await.unwrap();
    let again = favorites.add(user.id, product).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(favorites.list(user.id).await.unwrap().len(), 1);

    favorites.remove(user.id, product).await.unwrap();
    assert!(favorites.list(user.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_pagination_clamps_and_filters() {
    let pool = test_pool().await;
    let catalog = CatalogService::new(&pool);

    let first = create_product(&pool, "30.00", 1).await;
    let category = catalog.get(first).await.unwrap().category;
    // Put two more products in the same category.
    for unit in ["10.00", "20.00"] {
        let id = create_product(&pool, unit, 1).await;
        sqlx::query("UPDATE products SET category = $2 WHERE id = $1")
            .bind(id)
            .bind(&category)
            .execute(&pool)
            .await
            .unwrap();
    }

    let filter = ProductFilter {
        category: Some(category),
        sort: ProductSort::PriceAsc,
        ..ProductFilter::default()
    };

    let clamped = catalog
        .list(&filter, PageRequest::new(Some(-5), Some(1_000), 100), None)
        .await
        .unwrap();
    let unclamped = catalog
        .list(&filter, PageRequest::new(Some(0), Some(100), 100), None)
        .await
        .unwrap();
    assert_eq!(clamped.total, 3);
    assert_eq!(clamped.size, 100);
    assert_eq!(clamped.page, 1);
    let prices: Vec<_> = clamped.items.iter().map(|p| p.price).collect();
    assert_eq!(prices, [price("10.00"), price("20.00"), price("30.00")]);
    assert_eq!(
        clamped.items.iter().map(|p| p.id).collect::<Vec<_>>(),
        unclamped.items.iter().map(|p| p.id).collect::<Vec<_>>()
    );

    let second_page = catalog
        .list(&filter, PageRequest::new(Some(1), Some(1), 100), None)
        .await
        .unwrap();
    assert_eq!(second_page.total, 3);
    assert_eq!(second_page.page, 2);
    assert_eq!(second_page.items.first().unwrap().price, price("20.00"));

    let ranged = catalog
        .list(
            &ProductFilter {
                min_price: Some(price("15.00")),
                max_price: Some(price("25.00")),
                ..filter
            },
            PageRequest::new(None, None, 100),
            None,
        )
        .await
        .unwrap();
    assert_eq!(ranged.total, 1);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_keyword_search_is_recorded() {
    let pool = test_pool().await;
    let user = create_user(&pool).await;
    let catalog = CatalogService::new(&pool);

    let filter = ProductFilter {
        keyword: Some("catnip".to_string()),
        ..ProductFilter::default()
    };
    catalog
        .list(&filter, PageRequest::new(None, None, 100), Some(user.id))
        .await
        .unwrap();

    let history = catalog.search_history(user.id).await.unwrap();
    assert_eq!(history.first().unwrap().keyword, "catnip");

    catalog.clear_search_history(user.id).await.unwrap();
    assert!(catalog.search_history(user.id).await.unwrap().is_empty());
}
