//! Pricing calculator.
//!
//! Pure function from listing rates, guests, nights and add-ons to an
//! itemised total. The result is snapshotted onto the booking at creation and
//! never recomputed, so later rate changes leave existing bookings alone.

use crate::error::ValidationErrors;
use crate::money::{Currency, Money, MoneyError};
use crate::types::{Addon, GuestBreakdown, Listing};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Service fee applied to homestay room subtotals when the listing sets none:
/// 500 basis points = 5%.
pub const DEFAULT_SERVICE_FEE_BPS: u32 = 500;

/// Pricing could not be computed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Minimum occupancy of one adult.
    #[error("At least one adult is required")]
    NoAdults,

    /// Homestay stays need at least one night.
    #[error("Stay must be at least one night")]
    NoNights,

    /// An add-on was priced in another currency than the listing.
    #[error("Add-on {index} is priced in {found}, listing uses {expected}")]
    CurrencyMismatch {
        /// Position of the add-on in the request
        index: usize,
        /// Listing currency
        expected: Currency,
        /// Add-on currency
        found: Currency,
    },

    /// An add-on was requested with quantity zero.
    #[error("Add-on {index} has zero quantity")]
    ZeroQuantity {
        /// Position of the add-on in the request
        index: usize,
    },

    /// Arithmetic overflow.
    #[error("Price overflow")]
    Overflow,
}

impl From<MoneyError> for PricingError {
    fn from(_: MoneyError) -> Self {
        Self::Overflow
    }
}

impl From<PricingError> for ValidationErrors {
    fn from(err: PricingError) -> Self {
        let field = match &err {
            PricingError::NoAdults => "guests.adults".to_string(),
            PricingError::NoNights => "dates.check_out".to_string(),
            PricingError::CurrencyMismatch { index, .. } => format!("addons[{index}].unit_price"),
            PricingError::ZeroQuantity { index } => format!("addons[{index}].quantity"),
            PricingError::Overflow => "total_amount".to_string(),
        };
        Self::single(field, err.to_string())
    }
}

/// One itemised charge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLine {
    /// Label shown on invoices
    pub label: String,
    /// Charge
    pub amount: Money,
}

/// Itemised total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Charges in display order
    pub lines: SmallVec<[PriceLine; 6]>,
    /// Sum of all lines
    pub total: Money,
}

impl PriceBreakdown {
    fn new(currency: Currency) -> Self {
        Self {
            lines: SmallVec::new(),
            total: Money::zero(currency),
        }
    }

    fn push(&mut self, label: impl Into<String>, amount: Money) -> Result<(), PricingError> {
        self.total = self.total.checked_add(amount)?;
        self.lines.push(PriceLine {
            label: label.into(),
            amount,
        });
        Ok(())
    }
}

/// Inputs to [`compute_total`].
#[derive(Clone, Copy, Debug)]
pub struct PricingRequest<'a> {
    /// Listing supplying rates
    pub listing: &'a Listing,
    /// Guests
    pub guests: &'a GuestBreakdown,
    /// Nights for homestays; ignored for tours
    pub nights: u32,
    /// Requested add-ons
    pub addons: &'a [Addon],
    /// Service fee in basis points when the listing sets none
    pub service_fee_bps: u32,
}

/// Computes the itemised total for a booking request.
///
/// Tour: `adults*price_adult + children*price_child + infants*price_infant + add-ons`.
/// Homestay: `nightly_rate*nights + cleaning_fee + service_fee + add-ons`, where
/// the service fee falls back to `service_fee_bps` of the room subtotal.
/// Add-ons cost `unit_price * (per_person ? guests : 1) * quantity`.
///
/// # Errors
///
/// See [`PricingError`].
pub fn compute_total(request: &PricingRequest<'_>) -> Result<PriceBreakdown, PricingError> {
    let guests = request.guests;
    if guests.adults == 0 {
        return Err(PricingError::NoAdults);
    }
    let currency = request.listing.currency();
    let mut breakdown = PriceBreakdown::new(currency);

    match request.listing {
        Listing::Tour(tour) => {
            let tiers = [
                ("Adults", tour.price_adult, guests.adults),
                ("Children", tour.price_child, guests.children),
                ("Infants", tour.price_infant, guests.infants),
            ];
            for (label, rate, count) in tiers {
                if count > 0 {
                    breakdown.push(format!("{label} x{count}"), rate.checked_mul(count)?)?;
                }
            }
        }
        Listing::Homestay(homestay) => {
            if request.nights == 0 {
                return Err(PricingError::NoNights);
            }
            let room = homestay.nightly_rate.checked_mul(request.nights)?;
            breakdown.push(format!("Room x{} night(s)", request.nights), room)?;
            if !homestay.cleaning_fee.is_zero() {
                breakdown.push("Cleaning fee", homestay.cleaning_fee)?;
            }
            let service_fee = match homestay.service_fee {
                Some(fee) => fee,
                None => room.basis_points(request.service_fee_bps)?,
            };
            if !service_fee.is_zero() {
                breakdown.push("Service fee", service_fee)?;
            }
        }
    }

    for (index, addon) in request.addons.iter().enumerate() {
        if addon.unit_price.currency() != currency {
            return Err(PricingError::CurrencyMismatch {
                index,
                expected: currency,
                found: addon.unit_price.currency(),
            });
        }
        if addon.quantity == 0 {
            return Err(PricingError::ZeroQuantity { index });
        }
        let multiplier = if addon.per_person { guests.total() } else { 1 };
        let amount = addon
            .unit_price
            .checked_mul(multiplier)?
            .checked_mul(addon.quantity)?;
        breakdown.push(addon.name.clone(), amount)?;
    }

    Ok(breakdown)
}
