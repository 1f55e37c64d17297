pub mod customer;
pub mod invoice;
pub mod invoice_sequence;
pub mod payment;
pub mod project;
pub mod task;
