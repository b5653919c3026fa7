//! Line-item building blocks shared by carts and orders.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::document::{self, DocumentError};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantity must be at least one.
    #[error("quantity must be a positive integer (got {0})")]
    NotPositive(i64),
    /// Quantity exceeds what a single line may hold.
    #[error("quantity must be at most {max} (got {got})")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
        /// Requested quantity.
        got: i64,
    },
    /// Adding to an existing line would take it past the maximum.
    #[error("line quantity would exceed {max}")]
    LineFull {
        /// Maximum allowed quantity.
        max: u32,
    },
}

/// A positive line-item quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Largest quantity a single line may carry.
    pub const MAX: u32 = 9_999;

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError`] when `n` is zero, negative or above [`Self::MAX`].
    pub fn new(n: i64) -> Result<Self, QuantityError> {
        if n < 1 {
            return Err(QuantityError::NotPositive(n));
        }
        match u32::try_from(n) {
            Ok(q) if q <= Self::MAX => Ok(Self(q)),
            _ => Err(QuantityError::TooLarge {
                max: Self::MAX,
                got: n,
            }),
        }
    }

    /// Get the quantity.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Quantity as the database integer type.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // bounded by Self::MAX
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

/// The variant options a buyer chose for one line item.
///
/// Maps a spec category (e.g. `color`) to the chosen value (e.g. `red`).
/// Two cart lines for the same product with different selections are distinct
/// lines. The canonical storage text (see [`SpecSelection::to_storage`]) is
/// used as part of the cart line identity, so equal selections always encode
/// identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecSelection(BTreeMap<String, String>);

impl SpecSelection {
    /// An empty selection.
    #[must_use]
    pub const fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a selection from key/value pairs. Keys and values are trimmed and
    /// entries with an empty key are dropped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self(
            pairs
                .into_iter()
                .filter_map(|(k, v)| {
                    let k = k.as_ref().trim();
                    (!k.is_empty()).then(|| (k.to_owned(), v.as_ref().trim().to_owned()))
                })
                .collect(),
        )
    }

    /// Canonical text stored in `selected_specs` columns.
    #[must_use]
    pub fn to_storage(&self) -> String {
        document::encode(&self.0)
    }

    /// Decode a stored selection. `None` (a `NULL` column) is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] if the stored text is malformed; callers
    /// decide whether to fall back to [`SpecSelection::empty`].
    pub fn from_storage(text: Option<&str>) -> Result<Self, DocumentError> {
        text.map_or_else(|| Ok(Self::empty()), |t| document::decode(t).map(Self))
    }

    /// Whether no options were selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up the chosen value for a spec category.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        assert!(matches!(Quantity::new(0), Err(QuantityError::NotPositive(0))));
        assert!(matches!(Quantity::new(-3), Err(QuantityError::NotPositive(-3))));
        assert!(matches!(
            Quantity::new(i64::from(Quantity::MAX) + 1),
            Err(QuantityError::TooLarge { .. })
        ));
        assert_eq!(Quantity::new(1).unwrap().get(), 1);
    }

    #[test]
    fn test_quantity_deserialize_validates() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("2").unwrap().get(), 2);
    }

    #[test]
    fn test_selection_roundtrip_through_storage() {
        let selection = SpecSelection::from_pairs([("color", "red")]);
        let stored = selection.to_storage();
        assert_eq!(stored, r#"{"color":"red"}"#);
        assert_eq!(SpecSelection::from_storage(Some(&stored)).unwrap(), selection);
    }

    #[test]
    fn test_selection_storage_is_order_independent() {
        let a = SpecSelection::from_pairs([("size", "M"), ("color", "blue")]);
        let b = SpecSelection::from_pairs([("color", "blue"), ("size", "M")]);
        assert_eq!(a.to_storage(), b.to_storage());
    }

    #[test]
    fn test_selection_null_is_empty() {
        assert!(SpecSelection::from_storage(None).unwrap().is_empty());
        assert_eq!(SpecSelection::empty().to_storage(), "{}");
    }

    #[test]
    fn test_selection_drops_blank_keys() {
        let selection = SpecSelection::from_pairs([(" ", "x"), (" color ", " red ")]);
        assert_eq!(selection.get("color"), Some("red"));
        assert_eq!(selection, SpecSelection::from_pairs([("color", "red")]));
    }
}
