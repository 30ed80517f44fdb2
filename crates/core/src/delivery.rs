//! Store delivery fee quotes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::round_to_cents;

/// Errors raised when quoting delivery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("this store does not deliver")]
    Unavailable,
    #[error("delivery is limited to {max_km} km")]
    OutOfRange { max_km: Decimal },
    #[error("invalid delivery input: {0}")]
    InvalidInput(&'static str),
}

/// A store's delivery settings sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySettings {
    pub enabled: bool,
    pub base_fee: Decimal,
    pub per_km_fee: Decimal,
    /// Orders at or above this subtotal ship free.
    pub free_over: Option<Decimal>,
    pub max_distance_km: Option<Decimal>,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_fee: Decimal::ZERO,
            per_km_fee: Decimal::ZERO,
            free_over: None,
            max_distance_km: None,
        }
    }
}

impl DeliverySettings {
    /// Check the settings a store owner submitted.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidInput`] for negative fees, a
    /// non-positive free-delivery threshold or delivery radius.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        if self.base_fee.is_sign_negative() || self.per_km_fee.is_sign_negative() {
            return Err(DeliveryError::InvalidInput("fees cannot be negative"));
        }
        if self.free_over.is_some_and(|v| v <= Decimal::ZERO) {
            return Err(DeliveryError::InvalidInput(
                "free delivery threshold must be positive",
            ));
        }
        if self.max_distance_km.is_some_and(|v| v <= Decimal::ZERO) {
            return Err(DeliveryError::InvalidInput(
                "delivery radius must be positive",
            ));
        }
        Ok(())
    }
}

/// A computed delivery fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryQuote {
    pub fee: Decimal,
    pub free: bool,
    pub distance_km: Decimal,
}

/// Quote delivery of an order worth `subtotal` over `distance_km`.
///
/// # Errors
///
/// - [`DeliveryError::Unavailable`] when the store has delivery switched off
/// - [`DeliveryError::InvalidInput`] for negative distance or subtotal, or a
///   distance too large to price
/// - [`DeliveryError::OutOfRange`] beyond the store's radius
pub fn quote(
    settings: &DeliverySettings,
    subtotal: Decimal,
    distance_km: Decimal,
) -> Result<DeliveryQuote, DeliveryError> {
    if !settings.enabled {
        return Err(DeliveryError::Unavailable);
    }
    if distance_km.is_sign_negative() && !distance_km.is_zero() {
        return Err(DeliveryError::InvalidInput("distance cannot be negative"));
    }
    if subtotal.is_sign_negative() && !subtotal.is_zero() {
        return Err(DeliveryError::InvalidInput("subtotal cannot be negative"));
    }
    if let Some(max_km) = settings.max_distance_km
        && distance_km > max_km
    {
        return Err(DeliveryError::OutOfRange { max_km });
    }

    if settings.free_over.is_some_and(|threshold| subtotal >= threshold) {
        return Ok(DeliveryQuote {
            fee: Decimal::ZERO,
            free: true,
            distance_km,
        });
    }

    let fee = settings
        .per_km_fee
        .checked_mul(distance_km)
        .and_then(|distance_fee| distance_fee.checked_add(settings.base_fee))
        .map(round_to_cents)
        .ok_or(DeliveryError::InvalidInput("distance is too large"))?;
    Ok(DeliveryQuote {
        fee,
        free: fee.is_zero(),
        distance_km,
    })
}
