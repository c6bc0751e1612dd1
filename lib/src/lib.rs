#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod error;
pub mod farmer;
pub mod field;
pub mod witness;

pub use error::FieldError;
pub use farmer::{parse_farmer_hash, CropRegistration, CropType, FarmerHash, FarmerRegistration};
pub use field::{
    encode_date, encode_length, parse_integer, validate_field, validate_range, FieldValue,
    FIELD_MAX,
};
pub use witness::{FarmerWitnesses, TestWitnesses};
