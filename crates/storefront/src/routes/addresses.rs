//! Address book routes.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use pet_market_core::{AddressError, AddressFields, AddressId};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::Address;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::services::address_book::{AddressBook, AddressBookError};
use crate::state::AppState;

/// Address fields as sent by clients. Validated by [`Self::to_fields`].
#[derive(Debug, Clone, Deserialize)]
pub struct AddressRequest {
    pub name: String,
    pub phone: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub detail: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressRequest {
    /// Validate into address fields.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if a field is blank, too long, or the phone is
    /// malformed.
    pub fn to_fields(&self) -> std::result::Result<AddressFields, AddressError> {
        AddressFields::new(
            &self.name,
            &self.phone,
            &self.province,
            &self.city,
            &self.district,
            &self.detail,
        )
    }
}

/// The user's addresses, default first.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(AddressBook::new(state.pool()).list(user.id).await?))
}

/// One saved address.
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(AddressBook::new(state.pool()).get(user.id, id).await?))
}

/// Save a new address.
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(body): ApiJson<AddressRequest>,
) -> Result<(StatusCode, Json<Address>)> {
    let fields = body.to_fields().map_err(AddressBookError::from)?;
    let address = AddressBook::new(state.pool())
        .create(user.id, &fields, body.is_default)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// Replace an address's fields.
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<AddressId>,
    ApiJson(body): ApiJson<AddressRequest>,
) -> Result<Json<Address>> {
    let fields = body.to_fields().map_err(AddressBookError::from)?;
    let address = AddressBook::new(state.pool())
        .update(user.id, id, &fields, body.is_default)
        .await?;
    Ok(Json(address))
}

/// Make an address the default.
pub async fn set_default(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(
        AddressBook::new(state.pool())
            .set_default(user.id, id)
            .await?,
    ))
}

/// Delete an address.
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<StatusCode> {
    AddressBook::new(state.pool()).delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(phone: &str) -> AddressRequest {
        AddressRequest {
            name: "Mia".to_string(),
            phone: phone.to_string(),
            province: "Zhejiang".to_string(),
            city: "Hangzhou".to_string(),
            district: "Xihu".to_string(),
            detail: "12 Lakeside Road".to_string(),
            is_default: false,
        }
    }

    #[test]
    fn test_to_fields_validates() {
        let fields = request("13800000000").to_fields().unwrap();
        assert_eq!(fields.city, "Hangzhou");
        assert!(request("call me").to_fields().is_err());
    }

    #[test]
    fn test_is_default_is_optional() {
        let body: AddressRequest = serde_json::from_str(
            r#"{"name":"Mia","phone":"138","province":"Z","city":"H","district":"X","detail":"D"}"#,
        )
        .unwrap();
        assert!(!body.is_default);
    }
}
