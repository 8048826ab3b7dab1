//! In-memory listing catalog and customer directory.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Poisoned locks only happen after a test panicked

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;
use tourbook_core::environment::{CustomerDirectory, ListingCatalog};
use tourbook_core::store::StoreError;
use tourbook_core::types::{Customer, CustomerId, CustomerInfo, Listing, ListingId};

/// Listing catalog backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryListingCatalog {
    listings: RwLock<HashMap<ListingId, Listing>>,
}

impl InMemoryListingCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a listing (e.g. to simulate a price change).
    pub fn upsert(&self, listing: Listing) {
        self.listings.write().unwrap().insert(listing.id(), listing);
    }
}

impl ListingCatalog for InMemoryListingCatalog {
    fn get_listing(
        &self,
        id: ListingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Listing>, StoreError>> + Send + '_>> {
        let listing = self.listings.read().unwrap().get(&id).cloned();
        Box::pin(async move { Ok(listing) })
    }
}

/// Customer directory keyed by normalised email.
#[derive(Debug, Default)]
pub struct InMemoryCustomerDirectory {
    by_email: RwLock<HashMap<String, Customer>>,
}

impl InMemoryCustomerDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known customers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_email.read().unwrap().len()
    }

    /// Check if the directory is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_email.read().unwrap().is_empty()
    }
}

impl CustomerDirectory for InMemoryCustomerDirectory {
    fn find_or_create(
        &self,
        info: CustomerInfo,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Customer, StoreError>> + Send + '_>> {
        let email = info.normalized_email();
        let customer = {
            let mut customers = self.by_email.write().unwrap();
            let customer = customers.entry(email.clone()).or_insert_with(|| Customer {
                id: CustomerId::new(),
                full_name: info.full_name.trim().to_string(),
                email,
                phone: info.phone.clone(),
                created_at: now,
            });
            customer.clone()
        };
        Box::pin(async move { Ok(customer) })
    }

    fn refresh_contact(
        &self,
        id: CustomerId,
        info: CustomerInfo,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        if let Some(customer) = self.by_email.write().unwrap().values_mut().find(|c| c.id == id) {
            customer.full_name = info.full_name.trim().to_string();
            if info.phone.is_some() {
                customer.phone = info.phone;
            }
        }
        Box::pin(async { Ok(()) })
    }

    fn get_customer(
        &self,
        id: CustomerId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Customer>, StoreError>> + Send + '_>> {
        let customer = self
            .by_email
            .read()
            .unwrap()
            .values()
            .find(|customer| customer.id == id)
            .cloned();
        Box::pin(async move { Ok(customer) })
    }
}
