pub mod branch;
pub mod commission;
pub mod commitment;
pub mod daily;
pub mod employee;
pub mod permission;
pub mod record;
pub mod task;
pub mod user;
pub mod alert;
