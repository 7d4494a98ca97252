//! Address book collaborator trait and in-memory implementation.
//!
//! Address management is owned elsewhere; checkout only needs an
//! ownership-checked lookup that hides soft-deleted rows.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, UserId};
use serde::{Deserialize, Serialize};

/// A shipping or billing address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub label: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Trait for ownership-checked address lookups.
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// Returns the address if it exists, belongs to the user, and is not
    /// soft-deleted.
    async fn find_owned(&self, user_id: UserId, address_id: AddressId) -> Option<Address>;
}

/// In-memory address book for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAddressBook {
    addresses: Arc<RwLock<HashMap<AddressId, Address>>>,
}

impl InMemoryAddressBook {
    /// Creates a new empty address book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an address for a user and returns its ID.
    pub fn add(&self, user_id: UserId, label: impl Into<String>) -> AddressId {
        let address = Address {
            id: AddressId::new(),
            user_id,
            label: label.into(),
            deleted_at: None,
        };
        let id = address.id;
        self.addresses.write().unwrap().insert(id, address);
        id
    }

    /// Soft-deletes an address.
    pub fn soft_delete(&self, address_id: AddressId) {
        if let Some(address) = self.addresses.write().unwrap().get_mut(&address_id) {
            address.deleted_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl AddressBook for InMemoryAddressBook {
    async fn find_owned(&self, user_id: UserId, address_id: AddressId) -> Option<Address> {
        self.addresses
            .read()
            .unwrap()
            .get(&address_id)
            .filter(|a| a.user_id == user_id && a.deleted_at.is_none())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_owned_checks_ownership() {
        let book = InMemoryAddressBook::new();
        let owner = UserId::new();
        let id = book.add(owner, "home");

        assert!(book.find_owned(owner, id).await.is_some());
        assert!(book.find_owned(UserId::new(), id).await.is_none());
        assert!(book.find_owned(owner, AddressId::new()).await.is_none());
    }

    #[tokio::test]
    async fn soft_deleted_addresses_are_hidden() {
        let book = InMemoryAddressBook::new();
        let owner = UserId::new();
        let id = book.add(owner, "home");

        book.soft_delete(id);
        assert!(book.find_owned(owner, id).await.is_none());
    }
}
