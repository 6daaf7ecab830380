//! Catalog search, price filter, sorting and review ratings.
//!
//! Everything runs over the full product list fetched from the hosted table;
//! there is no pagination.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{Product, Review};
use crate::types::{Price, ProductId};

/// Loose match used by the store search box.
///
/// An empty search matches everything. Otherwise the text matches if it
/// contains the search as a substring, or if every search word is a prefix
/// of some word in the text. Case-insensitive.
#[must_use]
pub fn fuzzy_match(text: &str, search: &str) -> bool {
    let search = search.trim().to_lowercase();
    if search.is_empty() {
        return true;
    }

    let text = text.to_lowercase();
    if text.contains(&search) {
        return true;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    search
        .split_whitespace()
        .all(|s| words.iter().any(|w| w.starts_with(s)))
}

/// Sort order for the store listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    PriceLow,
    PriceHigh,
    Rating,
}

impl SortKey {
    pub const ALL: [Self; 4] = [Self::Name, Self::PriceLow, Self::PriceHigh, Self::Rating];

    /// Query-string value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::PriceLow => "price-low",
            Self::PriceHigh => "price-high",
            Self::Rating => "rating",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::PriceLow => "Price: Low to High",
            Self::PriceHigh => "Price: High to Low",
            Self::Rating => "Highest Rated",
        }
    }

    /// Parse a query-string value; anything unknown sorts by name.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == value)
            .unwrap_or_default()
    }
}

/// Average approved rating per product.
#[derive(Debug, Clone, Default)]
pub struct RatingIndex {
    ratings: HashMap<ProductId, (u32, u32)>,
}

/// Average rating and review count for one product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
}

impl RatingSummary {
    /// Average with one decimal place, e.g. `4.5`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{:.1}", self.average)
    }
}

impl RatingIndex {
    /// Build from any review list; reviews that are not approved are skipped.
    #[must_use]
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let mut ratings: HashMap<ProductId, (u32, u32)> = HashMap::new();
        for review in reviews.iter().filter(|r| r.is_approved()) {
            let entry = ratings.entry(review.product_id.clone()).or_default();
            entry.0 += u32::from(review.rating);
            entry.1 += 1;
        }
        Self { ratings }
    }

    /// `None` when the product has no approved reviews.
    #[must_use]
    pub fn summary(&self, id: &ProductId) -> Option<RatingSummary> {
        self.ratings.get(id).map(|&(sum, count)| RatingSummary {
            average: f64::from(sum) / f64::from(count),
            count,
        })
    }

    /// Average for sorting; unrated products count as zero.
    #[must_use]
    pub fn sort_value(&self, id: &ProductId) -> f64 {
        self.summary(id).map_or(0.0, |s| s.average)
    }
}

/// Store listing filters.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub search: String,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub sort: SortKey,
}

impl ProductQuery {
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let text_ok = fuzzy_match(&product.name, &self.search)
            || fuzzy_match(&product.description, &self.search);
        let min_ok = self.min_price.is_none_or(|min| product.price >= min);
        let max_ok = self.max_price.is_none_or(|max| product.price <= max);
        text_ok && min_ok && max_ok
    }

    /// Filter then sort. The sort is stable, so ties keep fetch order.
    #[must_use]
    pub fn apply<'a>(&self, products: &'a [Product], ratings: &RatingIndex) -> Vec<&'a Product> {
        let mut out: Vec<&Product> = products.iter().filter(|p| self.matches(p)).collect();
        match self.sort {
            SortKey::Name => out.sort_by_cached_key(|p| p.name.to_lowercase()),
            SortKey::PriceLow => out.sort_by(|a, b| a.price.cmp(&b.price)),
            SortKey::PriceHigh => out.sort_by(|a, b| b.price.cmp(&a.price)),
            SortKey::Rating => out.sort_by(|a, b| {
                ratings
                    .sort_value(&b.id)
                    .partial_cmp(&ratings.sort_value(&a.id))
                    .unwrap_or(Ordering::Equal)
            }),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReviewId;

    fn product(id: &str, name: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Price::from_cents(cents),
            description: String::new(),
            image: None,
            images: vec![],
            rating: None,
            is_subscription: false,
            subscription_interval: None,
            stripe_price_id: None,
            stripe_recurring_price_id: None,
            template_url: None,
            variations: vec![],
            created_date: None,
        }
    }

    fn review(product: &str, rating: u8, status: &str) -> Review {
        Review {
            id: ReviewId::new(format!("{product}-{rating}-{status}")),
            product_id: ProductId::new(product),
            product_name: String::new(),
            user_name: String::new(),
            user_email: String::new(),
            rating,
            comment: String::new(),
            status: status.to_string(),
            created_date: None,
        }
    }

    #[test]
    fn test_fuzzy_match() {
        assert!(fuzzy_match("Avalanche Kit", ""));
        assert!(fuzzy_match("Avalanche Kit", "ava"));
        assert!(fuzzy_match("Avalanche Kit", "LANCHE"));
        assert!(fuzzy_match("Avalanche Rescue Kit", "av kit"));
        assert!(!fuzzy_match("Radio Beacon", "ava"));
        assert!(!fuzzy_match("Avalanche Kit", "av probe"));
    }

    #[test]
    fn test_search_filters_listing() {
        let products = vec![product("1", "Avalanche Kit", 100), product("2", "Radio Beacon", 200)];
        let query = ProductQuery {
            search: "ava".into(),
            ..ProductQuery::default()
        };
        let out = query.apply(&products, &RatingIndex::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Avalanche Kit");
    }

    #[test]
    fn test_price_range_inclusive() {
        let products = vec![
            product("1", "A", 1000),
            product("2", "B", 2000),
            product("3", "C", 3000),
        ];
        let query = ProductQuery {
            min_price: Some(Price::from_cents(1000)),
            max_price: Some(Price::from_cents(2000)),
            ..ProductQuery::default()
        };
        let names: Vec<_> = query
            .apply(&products, &RatingIndex::default())
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_sort_keys() {
        let products = vec![
            product("1", "beacon", 300),
            product("2", "Anchor", 100),
            product("3", "Cable", 200),
        ];
        let ratings = RatingIndex::from_reviews(&[review("3", 5, "approved"), review("1", 2, "approved")]);

        let sorted = |sort| {
            ProductQuery {
                sort,
                ..ProductQuery::default()
            }
            .apply(&products, &ratings)
            .iter()
            .map(|p| p.id.as_str().to_string())
            .collect::<Vec<_>>()
        };

        assert_eq!(sorted(SortKey::Name), vec!["2", "1", "3"]);
        assert_eq!(sorted(SortKey::PriceLow), vec!["2", "3", "1"]);
        assert_eq!(sorted(SortKey::PriceHigh), vec!["1", "3", "2"]);
        assert_eq!(sorted(SortKey::Rating), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_rating_sort_is_stable_for_ties() {
        let products = vec![product("a", "Z", 1), product("b", "Y", 1)];
        let out = ProductQuery {
            sort: SortKey::Rating,
            ..ProductQuery::default()
        }
        .apply(&products, &RatingIndex::default());
        assert_eq!(out[0].id.as_str(), "a");
    }

    #[test]
    fn test_ratings_use_approved_only() {
        let index = RatingIndex::from_reviews(&[
            review("p", 5, "approved"),
            review("p", 4, "approved"),
            review("p", 1, "pending"),
            review("q", 3, "rejected"),
        ]);
        let summary = index.summary(&ProductId::new("p"));
        assert_eq!(summary.map(|s| s.count), Some(2));
        assert_eq!(summary.map(|s| s.display()), Some("4.5".to_string()));
        assert!(index.summary(&ProductId::new("q")).is_none());
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("price-high"), SortKey::PriceHigh);
        assert_eq!(SortKey::parse("bogus"), SortKey::Name);
    }
}
