pub mod persistence;
pub mod validation;
