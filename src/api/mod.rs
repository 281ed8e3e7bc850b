pub mod accounting;
pub mod commission;
pub mod commitments;
pub mod employee;
pub mod permissions;
pub mod records;
pub mod tasks;
