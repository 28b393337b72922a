//! Shipping address form and its validation.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One or more ASCII digits, nothing else.
static AREA_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("Invalid regex"));

/// Raw address input as typed by the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressForm {
    pub country: String,
    pub province: String,
    pub suburb: String,
    pub city: String,
    pub street_name: String,
    pub area_code: String,
}

/// An address that passed [`AddressForm::validate`].
///
/// Serializes with the field names the order endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ShippingAddress {
    pub country: String,
    pub province: String,
    pub suburb: String,
    pub city: String,
    pub street_name: String,
    pub area_code: String,
}

/// Address form fields, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    Country,
    Province,
    Suburb,
    City,
    StreetName,
    AreaCode,
}

impl AddressField {
    /// Label used in validation messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Country => "Country",
            Self::Province => "Province",
            Self::Suburb => "Suburb",
            Self::City => "City",
            Self::StreetName => "Street name",
            Self::AreaCode => "Area code",
        }
    }
}

/// What is wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    Required,
    NotNumeric,
}

/// A single failed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldError {
    pub field: AddressField,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problem {
            FieldProblem::Required => write!(f, "{} is required", self.field.label()),
            FieldProblem::NotNumeric => write!(f, "{} must be numeric", self.field.label()),
        }
    }
}

impl std::error::Error for FieldError {}

/// Every failed field of an address form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_messages(.0))]
pub struct AddressErrors(pub Vec<FieldError>);

impl AddressErrors {
    /// One message per failed field, in form order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Whether `field` failed.
    #[must_use]
    pub fn has(&self, field: AddressField) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl AddressForm {
    /// Value of a given field.
    #[must_use]
    pub fn get(&self, field: AddressField) -> &str {
        match field {
            AddressField::Country => &self.country,
            AddressField::Province => &self.province,
            AddressField::Suburb => &self.suburb,
            AddressField::City => &self.city,
            AddressField::StreetName => &self.street_name,
            AddressField::AreaCode => &self.area_code,
        }
    }

    /// Whether every field holds something. Weaker than [`Self::validate`].
    #[must_use]
    pub fn is_complete(&self) -> bool {
        ALL_FIELDS.iter().all(|&f| !self.get(f).is_empty())
    }

    /// Check every field and report each failure.
    ///
    /// The five text fields must be non-empty after trimming. The area code
    /// must be non-empty after trimming and, untrimmed, consist of digits only.
    ///
    /// # Errors
    ///
    /// Returns [`AddressErrors`] listing every failed field.
    pub fn validate(&self) -> Result<ShippingAddress, AddressErrors> {
        let mut errors = Vec::new();

        for field in ALL_FIELDS {
            let value = self.get(field);
            if value.trim().is_empty() {
                errors.push(FieldError {
                    field,
                    problem: FieldProblem::Required,
                });
            } else if field == AddressField::AreaCode && !AREA_CODE_RE.is_match(value) {
                errors.push(FieldError {
                    field,
                    problem: FieldProblem::NotNumeric,
                });
            }
        }

        if !errors.is_empty() {
            return Err(AddressErrors(errors));
        }

        Ok(ShippingAddress {
            country: self.country.clone(),
            province: self.province.clone(),
            suburb: self.suburb.clone(),
            city: self.city.clone(),
            street_name: self.street_name.clone(),
            area_code: self.area_code.clone(),
        })
    }
}

impl From<&ShippingAddress> for AddressForm {
    fn from(address: &ShippingAddress) -> Self {
        Self {
            country: address.country.clone(),
            province: address.province.clone(),
            suburb: address.suburb.clone(),
            city: address.city.clone(),
            street_name: address.street_name.clone(),
            area_code: address.area_code.clone(),
        }
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

const ALL_FIELDS: [AddressField; 6] = [
    AddressField::Country,
    AddressField::Province,
    AddressField::Suburb,
    AddressField::City,
    AddressField::StreetName,
    AddressField::AreaCode,
];
