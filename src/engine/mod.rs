//! Storage for Yee field components

pub mod array;

pub use array::{Complex64, FieldArray};
