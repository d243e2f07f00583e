//! Customer account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Address, AddressId, Email, UserId};

/// An address saved on a customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAddress {
    pub id: AddressId,
    #[serde(flatten)]
    pub address: Address,
    #[serde(default)]
    pub is_default: bool,
}

/// A customer account.
///
/// Exactly one saved address should carry `is_default`; the account
/// management flow owns that rule; this type only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub addresses: Vec<SavedAddress>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The flagged default address, or the first saved address if none is flagged.
    #[must_use]
    pub fn default_address(&self) -> Option<&SavedAddress> {
        self.addresses
            .iter()
            .find(|saved| saved.is_default)
            .or_else(|| self.addresses.first())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address(city: &str, is_default: bool) -> SavedAddress {
        SavedAddress {
            id: AddressId::generate(),
            address: Address {
                name: "Alex".to_string(),
                line1: "2 Sample Rd".to_string(),
                line2: None,
                city: city.to_string(),
                state: "NSW".to_string(),
                postcode: "2000".to_string(),
                country: "AU".to_string(),
                phone: None,
            },
            is_default,
        }
    }

    fn user(addresses: Vec<SavedAddress>) -> User {
        User {
            id: UserId::generate(),
            email: Email::parse("alex@example.com").unwrap(),
            name: "Alex".to_string(),
            phone: None,
            addresses,
            is_admin: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_default_address_prefers_flag() {
        let u = user(vec![address("Sydney", false), address("Newcastle", true)]);
        assert_eq!(u.default_address().unwrap().address.city, "Newcastle");
    }

    #[test]
    fn test_default_address_falls_back_to_first() {
        let u = user(vec![address("Sydney", false), address("Wollongong", false)]);
        assert_eq!(u.default_address().unwrap().address.city, "Sydney");
    }

    #[test]
    fn test_default_address_none_when_empty() {
        assert!(user(Vec::new()).default_address().is_none());
    }

    #[test]
    fn test_saved_address_flattens_fields() {
        let json = serde_json::to_value(address("Sydney", true)).unwrap();
        assert_eq!(json["city"], "Sydney");
        assert_eq!(json["isDefault"], true);
    }
}
