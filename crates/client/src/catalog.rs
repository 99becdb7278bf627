//! Catalog endpoint group: products, categories, subcategories, coupons.
//!
//! Read-only catalog responses are cached with `moka` (5-minute TTL). Coupon
//! lookups are never cached - coupons are fetched on demand at checkout and
//! discarded afterwards.

use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use clovemart_core::{CategoryId, ProductId, SubcategoryId, VariantId};

use crate::gateway::RequestGateway;
use crate::pricing::Coupon;

// ─────────────────────────────────────────────────────────────────────────────
// Catalog types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub subcategory_id: Option<SubcategoryId>,
}

/// A purchasable SKU-level option of a product: the unit of stock and cart
/// identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub category_id: CategoryId,
    pub name: String,
}

/// Pagination cursor reported by paginated list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "currentPage")]
    pub current_page: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
}

/// Query parameters for paginated endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

#[derive(Debug, Deserialize)]
struct ProductsPage {
    #[serde(default)]
    products: Vec<Product>,
    pagination: PageInfo,
}

#[derive(Debug, Deserialize)]
struct CategoriesPage {
    #[serde(default)]
    categories: Vec<Category>,
    pagination: PageInfo,
}

#[derive(Debug, Deserialize)]
struct SubcategoriesPage {
    #[serde(default)]
    subcategories: Vec<Subcategory>,
    pagination: PageInfo,
}

#[derive(Clone)]
enum CacheValue {
    Products(Vec<Product>),
    Product(Box<Product>),
    Variants(Vec<ProductVariant>),
    Categories(Vec<Category>),
    Category(Box<Category>),
    Subcategories(Vec<Subcategory>),
}

// ─────────────────────────────────────────────────────────────────────────────
// CatalogApi
// ─────────────────────────────────────────────────────────────────────────────

/// Catalog endpoint group with a short-lived response cache.
#[derive(Clone)]
pub struct CatalogApi {
    gateway: RequestGateway,
    cache: Cache<String, CacheValue>,
}

impl CatalogApi {
    pub(crate) fn new(gateway: RequestGateway) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self { gateway, cache }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Products
    // ─────────────────────────────────────────────────────────────────────────

    /// All products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products(&self) -> crate::error::Result<Vec<Product>> {
        let cache_key = "products".to_string();

        if let Some(CacheValue::Products(products)) = self.cache.get(&cache_key).await {
            debug!("cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self.gateway.get("products").await?;
        self.cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// One page of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products_page(&self, query: PageQuery) -> crate::error::Result<Page<Product>> {
        let page: ProductsPage = self
            .gateway
            .get_query("products/paginated", &query)
            .await?;
        Ok(Page {
            items: page.products,
            page_info: page.pagination,
        })
    }

    /// A single product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the request fails.
    #[instrument(skip(self))]
    pub async fn product(&self, id: ProductId) -> crate::error::Result<Product> {
        let cache_key = format!("product:{id}");

        if let Some(CacheValue::Product(product)) = self.cache.get(&cache_key).await {
            debug!("cache hit for product");
            return Ok(*product);
        }

        let product: Product = self.gateway.get(&format!("products/{id}")).await?;
        self.cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Purchasable variants of a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn variants(&self, product_id: ProductId) -> crate::error::Result<Vec<ProductVariant>> {
        let cache_key = format!("variants:{product_id}");

        if let Some(CacheValue::Variants(variants)) = self.cache.get(&cache_key).await {
            debug!("cache hit for variants");
            return Ok(variants);
        }

        let variants: Vec<ProductVariant> = self
            .gateway
            .get(&format!("products/variant/{product_id}"))
            .await?;
        self.cache
            .insert(cache_key, CacheValue::Variants(variants.clone()))
            .await;
        Ok(variants)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Categories
    // ─────────────────────────────────────────────────────────────────────────

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> crate::error::Result<Vec<Category>> {
        let cache_key = "categories".to_string();

        if let Some(CacheValue::Categories(categories)) = self.cache.get(&cache_key).await {
            debug!("cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self.gateway.get("categories").await?;
        self.cache
            .insert(cache_key, CacheValue::Categories(categories.clone()))
            .await;
        Ok(categories)
    }

    /// A single category. The API takes the ID as a query parameter here.
    ///
    /// # Errors
    ///
    /// Returns an error if the category is not found or the request fails.
    #[instrument(skip(self))]
    pub async fn category(&self, id: CategoryId) -> crate::error::Result<Category> {
        let cache_key = format!("category:{id}");

        if let Some(CacheValue::Category(category)) = self.cache.get(&cache_key).await {
            debug!("cache hit for category");
            return Ok(*category);
        }

        let category: Category = self
            .gateway
            .get_query("categories/category", &[("id", id.as_i64())])
            .await?;
        self.cache
            .insert(cache_key, CacheValue::Category(Box::new(category.clone())))
            .await;
        Ok(category)
    }

    /// One page of categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn categories_page(&self, query: PageQuery) -> crate::error::Result<Page<Category>> {
        let page: CategoriesPage = self
            .gateway
            .get_query("categories/paginated", &query)
            .await?;
        Ok(Page {
            items: page.categories,
            page_info: page.pagination,
        })
    }

    /// Subcategories under a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn subcategories_of(
        &self,
        category_id: CategoryId,
    ) -> crate::error::Result<Vec<Subcategory>> {
        let cache_key = format!("subcategories:{category_id}");

        if let Some(CacheValue::Subcategories(subcategories)) = self.cache.get(&cache_key).await {
            debug!("cache hit for subcategories");
            return Ok(subcategories);
        }

        let subcategories: Vec<Subcategory> = self
            .gateway
            .get(&format!("categories/subcategories/{category_id}"))
            .await?;
        self.cache
            .insert(cache_key, CacheValue::Subcategories(subcategories.clone()))
            .await;
        Ok(subcategories)
    }

    /// Products under a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products_in_category(
        &self,
        category_id: CategoryId,
    ) -> crate::error::Result<Vec<Product>> {
        self.gateway
            .get(&format!("categories/products/{category_id}"))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subcategories
    // ─────────────────────────────────────────────────────────────────────────

    /// All subcategories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn subcategories(&self) -> crate::error::Result<Vec<Subcategory>> {
        self.gateway.get("subcategories").await
    }

    /// One page of subcategories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn subcategories_page(
        &self,
        query: PageQuery,
    ) -> crate::error::Result<Page<Subcategory>> {
        let page: SubcategoriesPage = self
            .gateway
            .get_query("subcategories/paginated", &query)
            .await?;
        Ok(Page {
            items: page.subcategories,
            page_info: page.pagination,
        })
    }

    /// Products under a subcategory.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products_in_subcategory(
        &self,
        subcategory_id: SubcategoryId,
    ) -> crate::error::Result<Vec<Product>> {
        self.gateway
            .get(&format!("subcategories/products/{subcategory_id}"))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Coupons (never cached)
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up a coupon by code. Expired or exhausted coupons are still
    /// returned; acceptance is evaluated locally by the pricing engine.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Business` if the code is unknown.
    #[instrument(skip(self))]
    pub async fn coupon_by_code(&self, code: &str) -> crate::error::Result<Coupon> {
        self.gateway.get(&format!("coupons/{code}")).await
    }

    /// Drop all cached catalog data.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
