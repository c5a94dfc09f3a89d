pub mod catalog;
pub mod id;
pub mod record;
