//! Rendered documents.

pub mod invoice_pdf;
