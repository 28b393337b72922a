//! Checkout command.

use std::path::PathBuf;

use clap::Args;
use thiserror::Error;

use spaza_core::PaymentMethod;
use spaza_storefront::AppState;
use spaza_storefront::error::StorefrontError;
use spaza_storefront::models::AddressForm;
use spaza_storefront::services::DraftOrder;

use crate::output;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    #[error("Failed to write invoice to {path}: {source}")]
    WriteInvoice {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shipping address and payment choice.
///
/// Blank fields are left to address validation so every missing field is
/// reported at once.
#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// Payment method (`cash`, `online`)
    #[arg(long, default_value_t = PaymentMethod::Cash)]
    pub payment: PaymentMethod,

    #[arg(long, default_value = "")]
    pub country: String,

    #[arg(long, default_value = "")]
    pub province: String,

    #[arg(long, default_value = "")]
    pub suburb: String,

    #[arg(long, default_value = "")]
    pub city: String,

    #[arg(long = "street", default_value = "")]
    pub street_name: String,

    #[arg(long, default_value = "")]
    pub area_code: String,

    /// Write the invoice once the order is confirmed
    #[arg(long)]
    pub invoice: bool,
}

impl CheckoutArgs {
    fn draft(self) -> DraftOrder {
        DraftOrder {
            address: AddressForm {
                country: self.country,
                province: self.province,
                suburb: self.suburb,
                city: self.city,
                street_name: self.street_name,
                area_code: self.area_code,
            },
            payment: self.payment,
        }
    }
}

/// Submit the order and optionally write its invoice.
pub async fn run(state: &AppState, args: CheckoutArgs) -> Result<(), CheckoutError> {
    let write_invoice = args.invoice;
    let checkout = state.checkout();

    let draft = args.draft();
    checkout.choose_payment_method(draft.payment);
    let confirmation = checkout.submit(&draft).await?;
    output::confirmation(&confirmation);

    if !write_invoice {
        return Ok(());
    }

    let invoice = checkout.generate_invoice().await?;
    let dir = &state.config().invoice_dir;
    let path = dir.join(&invoice.file_name);
    let written = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, &invoice.bytes).await
    }
    .await;
    written.map_err(|source| CheckoutError::WriteInvoice {
        path: path.clone(),
        source,
    })?;

    tracing::info!(path = %path.display(), "Invoice written");
    output::line(&format!("Invoice written to {}", path.display()));
    Ok(())
}
