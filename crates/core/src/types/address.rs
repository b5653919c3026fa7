//! Shipping address fields and the immutable snapshot stored with orders.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::contact::{ContactError, Phone};
use super::document::{self, DocumentError};
use super::id::AddressId;

/// Errors that can occur when validating address fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A required field is blank.
    #[error("{0} is required")]
    Missing(&'static str),
    /// A field exceeds its column width.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Which field was rejected.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
    /// The contact phone is invalid.
    #[error(transparent)]
    Phone(#[from] ContactError),
}

/// Validated location and contact fields of an address.
///
/// Used both for saved addresses in the address book and for addresses typed
/// in at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
    /// Recipient name.
    pub name: String,
    /// Recipient phone.
    pub phone: Phone,
    /// Province or state.
    pub province: String,
    /// City.
    pub city: String,
    /// District.
    pub district: String,
    /// Street, building and unit.
    pub detail: String,
}

impl AddressFields {
    /// Validate raw address input.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if a field is blank, too long, or the phone is
    /// malformed.
    pub fn new(
        name: &str,
        phone: &str,
        province: &str,
        city: &str,
        district: &str,
        detail: &str,
    ) -> Result<Self, AddressError> {
        Ok(Self {
            name: required("name", name, 50)?,
            phone: Phone::parse(phone)?,
            province: required("province", province, 50)?,
            city: required("city", city, 50)?,
            district: required("district", district, 50)?,
            detail: required("detail", detail, 200)?,
        })
    }
}

fn required(field: &'static str, value: &str, max: usize) -> Result<String, AddressError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AddressError::Missing(field));
    }
    if value.chars().count() > max {
        return Err(AddressError::TooLong { field, max });
    }
    Ok(value.to_owned())
}

/// A frozen copy of a shipping address, taken when an order is created.
///
/// The snapshot is a flat string map stored as text alongside the order. It
/// never references the live address row, so editing or deleting the saved
/// address leaves historical orders untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressSnapshot(BTreeMap<String, String>);

impl AddressSnapshot {
    /// Capture address fields, optionally recording the saved address they
    /// came from (for display only; the snapshot never follows it).
    #[must_use]
    pub fn capture(fields: &AddressFields, source: Option<AddressId>) -> Self {
        let mut map = BTreeMap::new();
        map.insert("name".to_owned(), fields.name.clone());
        map.insert("phone".to_owned(), fields.phone.as_str().to_owned());
        map.insert("province".to_owned(), fields.province.clone());
        map.insert("city".to_owned(), fields.city.clone());
        map.insert("district".to_owned(), fields.district.clone());
        map.insert("detail".to_owned(), fields.detail.clone());
        if let Some(id) = source {
            map.insert("address_id".to_owned(), id.to_string());
        }
        Self(map)
    }

    /// Text stored in the `address_snapshot` column.
    #[must_use]
    pub fn to_storage(&self) -> String {
        document::encode(&self.0)
    }

    /// Decode a stored snapshot. `None` (a `NULL` column) is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] if the stored text is malformed; callers
    /// decide whether to fall back to an empty snapshot.
    pub fn from_storage(text: Option<&str>) -> Result<Self, DocumentError> {
        text.map_or_else(|| Ok(Self::default()), |t| document::decode(t).map(Self))
    }

    /// Look up a snapshot field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether the snapshot holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fields() -> AddressFields {
        AddressFields::new(
            "Zhang San",
            "138****8888",
            "Guangdong",
            "Shenzhen",
            "Nanshan",
            "Keyuan Road 1",
        )
        .unwrap()
    }

    #[test]
    fn test_fields_are_trimmed_and_required() {
        let f = AddressFields::new(" A ", "1", "P", "C", "D", " street ").unwrap();
        assert_eq!(f.name, "A");
        assert_eq!(f.detail, "street");
        assert_eq!(
            AddressFields::new("", "1", "P", "C", "D", "x"),
            Err(AddressError::Missing("name"))
        );
        assert!(matches!(
            AddressFields::new("A", "phone?", "P", "C", "D", "x"),
            Err(AddressError::Phone(_))
        ));
    }

    #[test]
    fn test_field_length_counts_characters() {
        let long = "区".repeat(51);
        assert!(matches!(
            AddressFields::new(&long, "1", "P", "C", "D", "x"),
            Err(AddressError::TooLong { field: "name", .. })
        ));
    }

    #[test]
    fn test_snapshot_survives_storage() {
        let id = AddressId::generate();
        let snapshot = AddressSnapshot::capture(&fields(), Some(id));
        let stored = snapshot.to_storage();
        let parsed = AddressSnapshot::from_storage(Some(&stored)).unwrap();

        assert_eq!(parsed, snapshot);
        assert_eq!(parsed.get("city"), Some("Shenzhen"));
        assert_eq!(parsed.get("address_id"), Some(id.to_string().as_str()));
    }

    #[test]
    fn test_snapshot_serializes_as_object() {
        let snapshot = AddressSnapshot::capture(&fields(), None);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["name"], "Zhang San");
        assert!(value.get("address_id").is_none());
    }

    #[test]
    fn test_malformed_snapshot_is_an_error() {
        assert!(AddressSnapshot::from_storage(Some("not json")).is_err());
        assert!(AddressSnapshot::from_storage(None).unwrap().is_empty());
    }
}
