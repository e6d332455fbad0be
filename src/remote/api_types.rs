//! Serde-deserializable types matching the remote user API.
//!
//! These types are separate from domain types so the remote shape is
//! validated once, at the boundary, and never trusted further in.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::warn;

use crate::error::NetworkError;
use crate::models::{Location, Name, Picture, User};

#[derive(Debug, Deserialize)]
pub struct ApiUsersResponse {
  #[serde(default)]
  pub results: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
pub struct ApiLogin {
  pub uuid: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiName {
  #[serde(default)]
  pub first: String,
  #[serde(default)]
  pub last: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPicture {
  pub large: String,
  pub medium: String,
  pub thumbnail: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiLocation {
  #[serde(default)]
  pub city: String,
  #[serde(default)]
  pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub login: ApiLogin,
  pub name: ApiName,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub phone: String,
  pub picture: ApiPicture,
  pub location: ApiLocation,
}

impl ApiUser {
  /// Normalize into the canonical shape. New records are never favorites;
  /// the store merges favorites afterwards.
  pub fn into_user(self, cached_at: DateTime<Utc>) -> Result<User, NetworkError> {
    let uuid = self.login.uuid.trim().to_string();
    if uuid.is_empty() {
      return Err(NetworkError::InvalidPayload(
        "record without login.uuid".to_string(),
      ));
    }

    Ok(User {
      uuid,
      name: Name {
        first: self.name.first,
        last: self.name.last,
      },
      email: self.email,
      phone: self.phone,
      picture: Picture {
        large: self.picture.large,
        medium: self.picture.medium,
        thumbnail: self.picture.thumbnail,
      },
      location: Location {
        city: self.location.city,
        country: self.location.country,
      },
      is_favorite: false,
      cached_at,
    })
  }
}

/// Parse and validate a response body into users, stamping `cached_at`.
///
/// Repeated uuids keep their first occurrence.
pub fn parse_users(body: &[u8], cached_at: DateTime<Utc>) -> Result<Vec<User>, NetworkError> {
  let response: ApiUsersResponse =
    serde_json::from_slice(body).map_err(|e| NetworkError::InvalidPayload(e.to_string()))?;

  let mut seen = HashSet::new();
  let mut users = Vec::with_capacity(response.results.len());
  for raw in response.results {
    let user = raw.into_user(cached_at)?;
    if seen.insert(user.uuid.clone()) {
      users.push(user);
    } else {
      warn!(uuid = %user.uuid, "dropping duplicate user from response");
    }
  }
  Ok(users)
}
