//! Product catalog repository.
//!
//! Image and spec lists live in their own tables and are attached to products
//! with one extra query per page (`product_id = ANY($1)`), never per row.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use pet_market_core::{PageRequest, Price, ProductId};

use super::{RepositoryError, contains_pattern};
use crate::models::product::{NewProduct, Product, ProductFilter};

const PRODUCT_COLUMNS: &str =
    "id, name, price, category, image, description, rating, sales, stock, created_at";

/// Filter shared by the listing and its count. `$1`..`$4` are category,
/// keyword pattern, minimum and maximum price; `NULL` disables a filter.
const FILTER_CLAUSE: &str = "WHERE ($1::text IS NULL OR category = $1) \
       AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2) \
       AND ($3::numeric IS NULL OR price >= $3) \
       AND ($4::numeric IS NULL OR price <= $4)";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price: Price,
    category: String,
    image: String,
    description: String,
    rating: f64,
    sales: i32,
    stock: i32,
    created_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, images: Vec<String>, specs: Vec<String>) -> Product {
        Product {
            id: self.id,
            name: self.name,
            price: self.price,
            category: self.category,
            image: self.image,
            images,
            description: self.description,
            rating: self.rating,
            sales: self.sales,
            stock: self.stock,
            specs,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ListEntryRow {
    product_id: ProductId,
    value: String,
}

/// Product row locked for checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockRow {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: String,
    pub stock: i32,
}

/// Repository for catalog reads and admin writes.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List one page of products matching `filter`, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let pattern = filter.keyword.as_deref().map(contains_pattern);
        let min_price = filter.min_price.map(Price::amount);
        let max_price = filter.max_price.map(Price::amount);

        let count_sql = format!("SELECT COUNT(*) FROM products {FILTER_CLAUSE}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.category.as_deref())
            .bind(pattern.as_deref())
            .bind(min_price)
            .bind(max_price)
            .fetch_one(self.pool)
            .await?;

        let list_sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {FILTER_CLAUSE} \
             ORDER BY {} OFFSET $5 LIMIT $6",
            filter.sort.order_by()
        );
        let rows = sqlx::query_as::<_, ProductRow>(&list_sql)
            .bind(filter.category.as_deref())
            .bind(pattern.as_deref())
            .bind(min_price)
            .bind(max_price)
            .bind(page.skip())
            .bind(page.limit())
            .fetch_all(self.pool)
            .await?;

        let products = self.attach_lists(rows).await?;
        Ok((products, total))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_lists(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Whether a product exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(found)
    }

    /// Create a product together with its image and spec lists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails; nothing is
    /// written in that case.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO products (id, name, price, category, image, description, rating, stock) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(ProductId::generate())
            .bind(&new.name)
            .bind(new.price)
            .bind(&new.category)
            .bind(&new.image)
            .bind(&new.description)
            .bind(new.rating)
            .bind(new.stock)
            .fetch_one(&mut *tx)
            .await?;

        insert_list(&mut tx, "product_images", "url", row.id, &new.images).await?;
        insert_list(&mut tx, "product_specs", "spec", row.id, &new.specs).await?;

        tx.commit().await?;

        Ok(row.into_product(new.images.clone(), new.specs.clone()))
    }

    /// Lock the given products for the rest of the transaction.
    ///
    /// Rows are locked in id order so concurrent checkouts over overlapping
    /// products cannot deadlock. Missing ids are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_for_checkout(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[ProductId],
    ) -> Result<Vec<StockRow>, RepositoryError> {
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query_as::<_, StockRow>(
            "SELECT id, name, price, image, stock FROM products \
             WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    /// Take `quantity` units out of stock and count them as sold.
    ///
    /// Returns `false` without changing anything if fewer than `quantity`
    /// units are in stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn take_stock(
        tx: &mut Transaction<'_, Postgres>,
        id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, sales = sales + $2 \
             WHERE id = $1 AND stock >= $2",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn attach_lists(&self, rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id.as_uuid()).collect();

        let mut images = self.fetch_list("product_images", "url", &ids).await?;
        let mut specs = self.fetch_list("product_specs", "spec", &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let images = images.remove(&row.id).unwrap_or_default();
                let specs = specs.remove(&row.id).unwrap_or_default();
                row.into_product(images, specs)
            })
            .collect())
    }

    async fn fetch_list(
        &self,
        table: &'static str,
        column: &'static str,
        ids: &[Uuid],
    ) -> Result<HashMap<ProductId, Vec<String>>, RepositoryError> {
        let sql = format!(
            "SELECT product_id, {column} AS value FROM {table} \
             WHERE product_id = ANY($1) ORDER BY product_id, position"
        );
        let rows = sqlx::query_as::<_, ListEntryRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool)
            .await?;

        let mut lists: HashMap<ProductId, Vec<String>> = HashMap::new();
        for row in rows {
            lists.entry(row.product_id).or_default().push(row.value);
        }
        Ok(lists)
    }
}

async fn insert_list(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    column: &'static str,
    product_id: ProductId,
    values: &[String],
) -> Result<(), RepositoryError> {
    let sql = format!("INSERT INTO {table} (product_id, position, {column}) VALUES ($1, $2, $3)");
    for (position, value) in (0_i32..).zip(values) {
        sqlx::query(&sql)
            .bind(product_id)
            .bind(position)
            .bind(value)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
