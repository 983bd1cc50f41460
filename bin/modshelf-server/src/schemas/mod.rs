//! Request / response bodies for the HTTP API.
//!
//! Wire field names are camelCase to match the public API contract; the
//! structs derive [`utoipa::ToSchema`] so they appear in the generated
//! OpenAPI document.

pub mod admin;
pub mod items;
pub mod upload;
