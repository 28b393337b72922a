//! Invoice document.
//!
//! An [`Invoice`] is assembled from the shipping address, the cart lines and
//! the order total, then handed to an [`InvoiceRenderer`]. The bundled
//! [`TextInvoiceRenderer`] produces a paginated plain-text document through
//! an askama template.

use askama::Template;
use chrono::NaiveDate;
use thiserror::Error;

use spaza_core::Price;

use crate::error::PreconditionError;
use crate::models::{AddressForm, CartLine};

/// Item rows per page.
pub const ROWS_PER_PAGE: usize = 20;

/// File name of the rendered document.
pub const INVOICE_FILE_NAME: &str = "invoice.txt";

const FORM_FEED: &str = "\u{c}";

/// Errors that can occur while rendering an invoice.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invoice template error: {0}")]
    Template(#[from] askama::Error),
}

/// One invoice row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

impl TryFrom<&CartLine> for InvoiceLine {
    type Error = PreconditionError;

    fn try_from(line: &CartLine) -> Result<Self, Self::Error> {
        Ok(Self {
            name: line.product.name.clone(),
            quantity: line.quantity,
            unit_price: line.product.price,
            line_total: line
                .line_total()
                .ok_or(PreconditionError::LineTotalOutOfRange)?,
        })
    }
}

/// A finalized order ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub issued_on: NaiveDate,
    pub address: AddressForm,
    pub lines: Vec<InvoiceLine>,
    pub total: Price,
}

impl Invoice {
    /// Assemble an invoice.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionError::IncompleteAddress` if any address field is
    /// empty, `PreconditionError::EmptyCart` if there are no lines and
    /// `PreconditionError::LineTotalOutOfRange` if a line total overflows.
    pub fn build(
        address: &AddressForm,
        lines: &[CartLine],
        total: Price,
        issued_on: NaiveDate,
    ) -> Result<Self, PreconditionError> {
        if !address.is_complete() {
            return Err(PreconditionError::IncompleteAddress);
        }
        if lines.is_empty() {
            return Err(PreconditionError::EmptyCart);
        }

        Ok(Self {
            issued_on,
            address: address.clone(),
            lines: lines
                .iter()
                .map(InvoiceLine::try_from)
                .collect::<Result<_, _>>()?,
            total,
        })
    }

    /// Number of pages at [`ROWS_PER_PAGE`].
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.lines.len().div_ceil(ROWS_PER_PAGE).max(1)
    }
}

/// A rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedInvoice {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Turns an [`Invoice`] into a document.
pub trait InvoiceRenderer: Send + Sync {
    /// Render the whole document. Nothing partial is produced on error.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError` if the document cannot be produced.
    fn render(&self, invoice: &Invoice) -> Result<RenderedInvoice, InvoiceError>;
}

// =============================================================================
// Plain-text renderer
// =============================================================================

#[derive(Template)]
#[template(path = "invoice.txt", escape = "none")]
struct InvoiceTemplate<'a> {
    date: String,
    address: &'a AddressForm,
    header: String,
    pages: Vec<InvoicePage>,
    page_count: usize,
    total: String,
    form_feed: &'static str,
}

struct InvoicePage {
    number: usize,
    rows: Vec<String>,
}

/// Paginated plain-text invoices.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextInvoiceRenderer;

impl InvoiceRenderer for TextInvoiceRenderer {
    fn render(&self, invoice: &Invoice) -> Result<RenderedInvoice, InvoiceError> {
        let pages: Vec<InvoicePage> = invoice
            .lines
            .chunks(ROWS_PER_PAGE)
            .enumerate()
            .map(|(i, chunk)| InvoicePage {
                number: i + 1,
                rows: chunk.iter().map(format_row).collect(),
            })
            .collect();

        let template = InvoiceTemplate {
            date: invoice.issued_on.format("%Y-%m-%d").to_string(),
            address: &invoice.address,
            header: format!("{:<30} {:>8} {:>12} {:>12}", "Item", "Quantity", "Price", "Total"),
            page_count: pages.len(),
            pages,
            total: invoice.total.to_string(),
            form_feed: FORM_FEED,
        };

        Ok(RenderedInvoice {
            file_name: INVOICE_FILE_NAME.to_string(),
            bytes: template.render()?.into_bytes(),
        })
    }
}

fn format_row(line: &InvoiceLine) -> String {
    format!(
        "{:<30} {:>8} {:>12} {:>12}",
        line.name,
        line.quantity,
        line.unit_price.to_string(),
        line.line_total.to_string()
    )
}
