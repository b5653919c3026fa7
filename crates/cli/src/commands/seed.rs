//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! categories:
//!   - { name: Dogs, icon: /uploads/icons/dog.png, sort_order: 1 }
//! banners:
//!   - { title: Spring sale, image_url: /uploads/banners/spring.jpg, link_url: /products?category=Dogs }
//! products:
//!   - name: Rope Toy
//!     price: "9.90"
//!     category: Dogs
//!     stock: 40
//!     images: [/uploads/products/rope.jpg]
//!     specs: [small, large]
//! ```
//!
//! Re-running the same file is safe: categories are upserted by name, and
//! banners and products whose title or name already exists are skipped.

use std::path::Path;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use pet_market_storefront::db;
use pet_market_storefront::models::NewProduct;
use pet_market_storefront::services::catalog::CatalogService;

const fn active() -> bool {
    true
}

/// A category row to upsert.
#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "active")]
    pub is_active: bool,
}

/// A banner row to insert.
#[derive(Debug, Deserialize)]
pub struct SeedBanner {
    pub title: String,
    pub image_url: String,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "active")]
    pub is_active: bool,
}

/// Contents of a seed file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub banners: Vec<SeedBanner>,
    #[serde(default)]
    pub products: Vec<NewProduct>,
}

/// Load a seed file into the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the database
/// cannot be reached. Individual products that fail validation are logged and
/// skipped.
pub async fn from_file(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed data from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(
        categories = seed.categories.len(),
        banners = seed.banners.len(),
        products = seed.products.len(),
        "Parsed seed file"
    );

    let database_url = super::database_url().ok_or("STOREFRONT_DATABASE_URL not set")?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    for category in &seed.categories {
        upsert_category(&pool, category).await?;
    }

    let mut banners_inserted = 0;
    for banner in &seed.banners {
        if insert_banner(&pool, banner).await? {
            banners_inserted += 1;
        }
    }

    let catalog = CatalogService::new(&pool);
    let mut products_inserted = 0;
    let mut products_failed = 0;
    for product in seed.products {
        if product_exists(&pool, &product.name).await? {
            continue;
        }
        let name = product.name.clone();
        match catalog.create(product).await {
            Ok(_) => products_inserted += 1,
            Err(e) => {
                error!(product = %name, error = %e, "Skipping product");
                products_failed += 1;
            }
        }
    }

    info!("Seeding complete!");
    info!("  Categories upserted: {}", seed.categories.len());
    info!("  Banners inserted: {banners_inserted}");
    info!("  Products inserted: {products_inserted}");
    if products_failed > 0 {
        error!("  Products failed: {products_failed}");
    }
    Ok(())
}

async fn upsert_category(pool: &PgPool, category: &SeedCategory) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO categories (name, icon, sort_order, is_active) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (name) DO UPDATE \
         SET icon = EXCLUDED.icon, sort_order = EXCLUDED.sort_order, is_active = EXCLUDED.is_active",
    )
    .bind(&category.name)
    .bind(&category.icon)
    .bind(category.sort_order)
    .bind(category.is_active)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_banner(pool: &PgPool, banner: &SeedBanner) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO banners (title, image_url, link_url, sort_order, is_active) \
         SELECT $1, $2, $3, $4, $5 \
         WHERE NOT EXISTS (SELECT 1 FROM banners WHERE title = $1)",
    )
    .bind(&banner.title)
    .bind(&banner.image_url)
    .bind(&banner.link_url)
    .bind(banner.sort_order)
    .bind(banner.is_active)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

async fn product_exists(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM products WHERE name = $1)")
        .bind(name.trim())
        .fetch_one(pool)
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_file_with_defaults() {
        let seed: SeedFile = serde_yaml::from_str(
            r#"
categories:
  - name: Cats
banners:
  - title: Spring sale
    image_url: /uploads/banners/spring.jpg
products:
  - name: Scratching Post
    price: "59.00"
    category: Cats
    stock: 3
"#,
        )
        .unwrap();

        let category = seed.categories.first().unwrap();
        assert!(category.is_active);
        assert_eq!(category.sort_order, 0);
        assert!(seed.banners.first().unwrap().link_url.is_none());
        let product = seed.products.first().unwrap();
        assert_eq!(product.stock, 3);
        assert!(product.images.is_empty());
    }

    #[test]
    fn test_empty_seed_file() {
        let seed: SeedFile = serde_yaml::from_str("{}").unwrap();
        assert!(seed.categories.is_empty());
        assert!(seed.products.is_empty());
    }
}
