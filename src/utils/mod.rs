pub mod db_utils;
pub mod expiry;
pub mod form;
