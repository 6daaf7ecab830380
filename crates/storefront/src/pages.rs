//! Page identifiers and the single router table that dispatches them.
//!
//! Every page answers at `/<PageName>`. A few also have a conventional path
//! (`/` for the landing page, `/checkout/success` and `/checkout/cancel` for
//! the payment return pages), which is where links point.

use std::fmt;

use axum::{
    Router,
    routing::{MethodRouter, get},
};

use crate::routes::{account, auth, checkout, home, store};
use crate::state::AppState;

/// Storefront pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Home,
    CustomLogin,
    CustomSignup,
    ForgotPassword,
    ResetPassword,
    Dashboard,
    StoreFront,
    ProductDetail,
    Checkout,
    CheckoutSuccess,
    CheckoutCancel,
    UserProfile,
    OrderHistory,
    OrderDetails,
    AdminDashboard,
}

impl Page {
    pub const ALL: [Self; 15] = [
        Self::Home,
        Self::CustomLogin,
        Self::CustomSignup,
        Self::ForgotPassword,
        Self::ResetPassword,
        Self::Dashboard,
        Self::StoreFront,
        Self::ProductDetail,
        Self::Checkout,
        Self::CheckoutSuccess,
        Self::CheckoutCancel,
        Self::UserProfile,
        Self::OrderHistory,
        Self::OrderDetails,
        Self::AdminDashboard,
    ];

    /// Page identifier, also its `/<PageName>` path segment.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::CustomLogin => "CustomLogin",
            Self::CustomSignup => "CustomSignup",
            Self::ForgotPassword => "ForgotPassword",
            Self::ResetPassword => "ResetPassword",
            Self::Dashboard => "Dashboard",
            Self::StoreFront => "StoreFront",
            Self::ProductDetail => "ProductDetail",
            Self::Checkout => "Checkout",
            Self::CheckoutSuccess => "CheckoutSuccess",
            Self::CheckoutCancel => "CheckoutCancel",
            Self::UserProfile => "UserProfile",
            Self::OrderHistory => "OrderHistory",
            Self::OrderDetails => "OrderDetails",
            Self::AdminDashboard => "AdminDashboard",
        }
    }

    /// Canonical path.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::CustomLogin => "/CustomLogin",
            Self::CustomSignup => "/CustomSignup",
            Self::ForgotPassword => "/ForgotPassword",
            Self::ResetPassword => "/ResetPassword",
            Self::Dashboard => "/Dashboard",
            Self::StoreFront => "/StoreFront",
            Self::ProductDetail => "/ProductDetail",
            Self::Checkout => "/Checkout",
            Self::CheckoutSuccess => "/checkout/success",
            Self::CheckoutCancel => "/checkout/cancel",
            Self::UserProfile => "/UserProfile",
            Self::OrderHistory => "/OrderHistory",
            Self::OrderDetails => "/OrderDetails",
            Self::AdminDashboard => "/AdminDashboard",
        }
    }

    /// `/<PageName>`.
    #[must_use]
    pub fn named_path(self) -> String {
        format!("/{}", self.name())
    }

    /// Path with an `?id=` parameter, for the detail pages.
    #[must_use]
    pub fn with_id(self, id: &impl fmt::Display) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(id.to_string().as_bytes())
            .collect();
        format!("{}?id={encoded}", self.path())
    }

    /// Look a page up by identifier.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    fn handler(self) -> MethodRouter<AppState> {
        match self {
            Self::Home => get(home::home),
            Self::CustomLogin => get(auth::login_page).post(auth::login),
            Self::CustomSignup => get(auth::signup_page).post(auth::signup),
            Self::ForgotPassword => get(auth::forgot_password_page).post(auth::forgot_password),
            Self::ResetPassword => get(auth::reset_password_page).post(auth::reset_password),
            Self::Dashboard => get(account::dashboard),
            Self::StoreFront => get(store::index),
            Self::ProductDetail => get(store::show),
            Self::Checkout => get(checkout::show),
            Self::CheckoutSuccess => get(checkout::success),
            Self::CheckoutCancel => get(checkout::cancel),
            Self::UserProfile => get(account::profile).post(account::update_profile),
            Self::OrderHistory => get(account::orders),
            Self::OrderDetails => get(account::order),
            Self::AdminDashboard => get(account::admin_dashboard),
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Router table for every page, at both its canonical and named path.
pub fn page_routes() -> Router<AppState> {
    Page::ALL.into_iter().fold(Router::new(), |router, page| {
        let router = router.route(page.path(), page.handler());
        let named = page.named_path();
        if named == page.path() {
            router
        } else {
            router.route(&named, page.handler())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_paths_are_unique() {
        let mut seen = HashSet::new();
        for page in Page::ALL {
            assert!(seen.insert(page.path().to_string()), "{page} path");
            if page.named_path() != page.path() {
                assert!(seen.insert(page.named_path()), "{page} named path");
            }
        }
    }

    #[test]
    fn test_from_name() {
        for page in Page::ALL {
            assert_eq!(Page::from_name(page.name()), Some(page));
        }
        assert_eq!(Page::from_name("Admin"), None);
    }

    #[test]
    fn test_with_id_encodes() {
        assert_eq!(Page::ProductDetail.with_id(&42), "/ProductDetail?id=42");
        assert_eq!(Page::OrderDetails.with_id(&"a b&c"), "/OrderDetails?id=a+b%26c");
    }

    #[test]
    fn test_named_paths() {
        assert_eq!(Page::Home.path(), "/");
        assert_eq!(Page::Home.named_path(), "/Home");
        assert_eq!(Page::CheckoutSuccess.named_path(), "/CheckoutSuccess");
        assert_eq!(Page::Checkout.named_path(), Page::Checkout.path());
    }
}
