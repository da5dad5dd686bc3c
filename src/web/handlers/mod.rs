pub mod bag;
pub mod checkout;
pub mod ops;
pub mod orders;
pub mod payments;
