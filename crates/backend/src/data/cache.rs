//! Read cache entries for the storefront's public catalog reads.

use alpine_guardian_core::models::{Product, Review, SiteSettings};

/// Cache key; one entry per whole-table read.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Products,
    ApprovedReviews,
    Settings,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Vec<Product>),
    ApprovedReviews(Vec<Review>),
    Settings(Option<Box<SiteSettings>>),
}
