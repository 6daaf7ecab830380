//! Display data shared by templates.
//!
//! Handlers turn domain values into these flat, pre-formatted structs so the
//! templates only print strings.

use alpine_guardian_backend::AuthContext;
use alpine_guardian_core::cart::{Cart, CartLine};
use alpine_guardian_core::catalog::RatingIndex;
use alpine_guardian_core::checkout::price_reference;
use alpine_guardian_core::models::{Order, OrderItem, Product, Review, format_date};

use crate::pages::Page;
use crate::state::AppState;

const DEFAULT_TAGLINE: &str = "Modern tools for mountain heroes.";

/// A footer social link.
#[derive(Clone)]
pub struct SocialLink {
    pub label: String,
    pub url: String,
}

/// Layout data every page renders: navigation, cart badge and footer.
#[derive(Clone)]
pub struct Shell {
    pub signed_in: bool,
    pub display_name: String,
    pub is_admin: bool,
    pub cart_count: u32,
    pub logo_url: Option<String>,
    pub tagline: String,
    pub contact_email: Option<String>,
    pub social_links: Vec<SocialLink>,
}

impl Shell {
    /// Build the layout for the current visitor. Site settings come from the
    /// read cache; if they cannot be loaded the defaults are used.
    pub async fn build(state: &AppState, ctx: &AuthContext, cart: &Cart) -> Self {
        let settings = match state.backend().data.get_settings().await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                tracing::debug!(error = %e, "Site settings unavailable; using defaults");
                Default::default()
            }
        };

        Self {
            signed_in: ctx.is_authenticated(),
            display_name: ctx.user().map(|u| u.display_name()).unwrap_or_default(),
            is_admin: ctx.is_admin(),
            cart_count: cart.item_count(),
            logo_url: settings.logo_url.clone().filter(|u| !u.trim().is_empty()),
            tagline: settings
                .tagline
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TAGLINE.to_string()),
            contact_email: settings.contact_email.clone().filter(|e| !e.trim().is_empty()),
            social_links: settings
                .social_links()
                .into_iter()
                .map(|(label, url)| SocialLink {
                    label: label.to_string(),
                    url: url.to_string(),
                })
                .collect(),
        }
    }
}

/// Product tile for listings.
#[derive(Clone)]
pub struct ProductCard {
    pub url: String,
    pub name: String,
    pub price: String,
    pub image: Option<String>,
    pub rating: Option<String>,
    pub review_count: u32,
    pub is_subscription: bool,
}

impl ProductCard {
    #[must_use]
    pub fn new(product: &Product, ratings: &RatingIndex) -> Self {
        let summary = ratings.summary(&product.id);
        Self {
            url: Page::ProductDetail.with_id(&product.id),
            name: product.name.clone(),
            price: product.price_label(),
            image: product.gallery().first().map(|s| (*s).to_string()),
            rating: summary.as_ref().map(|s| s.display()),
            review_count: summary.map_or(0, |s| s.count),
            is_subscription: product.is_subscription,
        }
    }
}

/// A cart line as shown on the checkout page.
#[derive(Clone)]
pub struct CartLineView {
    pub product_id: String,
    pub url: String,
    pub name: String,
    pub image: Option<String>,
    pub selections: String,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
    pub is_subscription: bool,
    /// The line cannot be paid online.
    pub missing_price: bool,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product.id.to_string(),
            url: Page::ProductDetail.with_id(&line.product.id),
            name: line.product.name.clone(),
            image: line.product.image.clone(),
            selections: line.selections_label(),
            unit_price: line.unit_price.display(),
            quantity: line.quantity,
            line_total: line.line_total().display(),
            is_subscription: line.product.is_subscription,
            missing_price: price_reference(line).is_none(),
        }
    }
}

/// Cart summary.
#[derive(Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart.lines().iter().map(CartLineView::from).collect(),
            subtotal: cart.subtotal().display(),
            item_count: cart.item_count(),
        }
    }
}

/// One row of an order list.
#[derive(Clone)]
pub struct OrderRow {
    pub url: String,
    pub reference: String,
    pub date: String,
    pub status: String,
    pub total: String,
    pub item_count: u32,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            url: Page::OrderDetails.with_id(&order.id),
            reference: short_reference(order.id.as_str()),
            date: format_date(order.created_date.as_ref()),
            status: order.status.clone(),
            total: order.total.display(),
            item_count: order.item_count(),
        }
    }
}

/// One item of an order's detail page.
#[derive(Clone)]
pub struct OrderItemRow {
    pub name: String,
    pub image: Option<String>,
    pub selections: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
}

impl From<&OrderItem> for OrderItemRow {
    fn from(item: &OrderItem) -> Self {
        let selections = item
            .selected_variations
            .as_ref()
            .map(|s| {
                s.iter()
                    .map(|(name, value)| format!("{name}: {value}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        Self {
            name: item.name.clone(),
            image: item.image.clone(),
            selections,
            quantity: item.quantity,
            price: item.price.display(),
            line_total: item.line_total().display(),
        }
    }
}

/// An approved review under a product.
#[derive(Clone)]
pub struct ReviewView {
    pub user_name: String,
    pub stars: String,
    pub comment: String,
    pub date: String,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        Self {
            user_name: review.user_name.clone(),
            stars: review.stars(),
            comment: review.comment.clone(),
            date: format_date(review.created_date.as_ref()),
        }
    }
}

/// First eight characters of an id, upper-cased, for display.
#[must_use]
pub fn short_reference(id: &str) -> String {
    id.chars().take(8).collect::<String>().to_uppercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use alpine_guardian_core::models::Selections;
    use serde_json::json;

    fn product(value: serde_json::Value) -> Product {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_short_reference() {
        assert_eq!(short_reference("3f2a9c01-77aa"), "3F2A9C01");
        assert_eq!(short_reference("17"), "17");
    }

    #[test]
    fn test_product_card_without_reviews_has_no_rating() {
        let p = product(json!({"id": 7, "name": "Avalanche Kit", "price": 120.0}));
        let card = ProductCard::new(&p, &RatingIndex::default());
        assert_eq!(card.url, "/ProductDetail?id=7");
        assert_eq!(card.price, "$120.00");
        assert!(card.rating.is_none());
        assert_eq!(card.review_count, 0);
    }

    #[test]
    fn test_cart_line_flags_missing_price() {
        let p = product(json!({
            "id": "p1", "name": "Radio Beacon", "price": 10.0,
            "is_subscription": true, "stripe_price_id": "price_once"
        }));
        let mut cart = Cart::new();
        cart.add(&p, &Selections::new(), 2);

        let view = CartView::from(&cart);
        assert_eq!(view.subtotal, "$20.00");
        assert_eq!(view.item_count, 2);
        assert!(view.lines.first().unwrap().missing_price);
    }
}
