//! Domain models for the marketplace API.
//!
//! These are the shapes handlers work with and return as JSON. Row types
//! stay private to the repositories in [`crate::db`].

pub mod category;
pub mod discovery;
pub mod offer;
pub mod order;
pub mod product;
pub mod store;
pub mod support;
pub mod webhook;

pub use category::{Category, CategoryNode, CategoryUpdate, NewCategory};
pub use discovery::DiscoveryJob;
pub use offer::{CounterOffer, NewOffer, Offer, OfferDetail, OfferEvent, OfferListQuery};
pub use order::Order;
pub use product::{
    CurationQueueItem, NewProduct, Page, Product, ProductDetail, ProductFilter, ProductListItem,
    ProductSort, ProductUpdate, SimilarProduct,
};
pub use store::{
    NewService, NewStore, NewStoreCategory, Store, StoreCategory, StoreProfile, StoreService,
    StoreUpdate,
};
pub use support::{Ticket, TicketDetail, TicketMessage};
pub use webhook::{WebhookDiagnostics, WebhookEventSummary, WebhookTypeCount};

/// Trim a text field and check its length in characters.
///
/// Returns the trimmed value or a message naming the field.
pub(crate) fn bounded_text(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(format!(
            "{field} must be between {min} and {max} characters"
        ));
    }
    Ok(trimmed.to_owned())
}

/// Trim an optional text field, mapping blank values to `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_text_trims() {
        assert_eq!(bounded_text("name", "  Gravel  ", 1, 60), Ok("Gravel".to_string()));
    }

    #[test]
    fn test_bounded_text_counts_chars() {
        assert!(bounded_text("name", "ñññ", 3, 3).is_ok());
        assert_eq!(
            bounded_text("name", "   ", 1, 60),
            Err("name must be between 1 and 60 characters".to_string())
        );
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  ".to_string())), None);
        assert_eq!(optional_text(Some(" Oslo ".to_string())), Some("Oslo".to_string()));
        assert_eq!(optional_text(None), None);
    }
}
