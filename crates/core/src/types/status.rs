//! Status enums shared by the storefront and the CLI.

use serde::{Deserialize, Serialize};

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    Cash,
    /// Online payment through the PayFast gateway (simulated).
    Online,
}

impl PaymentMethod {
    /// Human-readable label shown when the method is chosen.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cash => "Pay With Cash on Delivery",
            Self::Online => "Online Payment with PayFast",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Online => write!(f, "online"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "online" => Ok(Self::Online),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}
