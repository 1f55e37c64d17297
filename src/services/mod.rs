// Record management
pub mod customers;
pub mod projects;
pub mod tasks;

// Invoicing
pub mod invoice_numbering;
pub mod invoice_status;
pub mod invoices;
pub mod payments;

// Reporting
pub mod dashboard;

pub mod validation;
