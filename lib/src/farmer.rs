//! Farmer and crop inputs, validated and ready to hand to the contract.

use crate::error::FieldError;
use crate::field::{encode_date, encode_length, parse_integer, validate_field, FieldValue};
use alloy_primitives::{keccak256, FixedBytes};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte identifier of a registered farmer
pub type FarmerHash = FixedBytes<32>;

/// Parse a farmer hash from hex, with or without a `0x` prefix.
pub fn parse_farmer_hash(input: &str) -> Result<FarmerHash, FieldError> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes = hex::decode(digits).map_err(|e| FieldError::MalformedHash {
        input: input.to_string(),
        reason: e.to_string(),
    })?;

    FarmerHash::try_from(bytes.as_slice()).map_err(|_| FieldError::MalformedHash {
        input: input.to_string(),
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })
}

/// Farmer sign-up arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerRegistration {
    pub farmer_hash: FarmerHash,
    pub full_name: FieldValue,
    pub region: FieldValue,
    pub registration_date: FieldValue,
}

impl FarmerRegistration {
    /// Encode raw prompt answers. The farmer hash is derived from the raw
    /// answers so that distinct farmers get distinct hashes.
    pub fn from_input(
        full_name: &str,
        region: &str,
        registration_date: &str,
    ) -> Result<Self, FieldError> {
        let full_name_field = validate_field("Full name", encode_length(full_name))?;
        let region_field = validate_field("Region", encode_length(region))?;
        let date_field = validate_field("Registration date", encode_date(registration_date))?;

        let preimage = format!("{full_name}\u{0}{region}\u{0}{registration_date}");

        Ok(Self {
            farmer_hash: keccak256(preimage.as_bytes()),
            full_name: full_name_field,
            region: region_field,
            registration_date: date_field,
        })
    }
}

/// Crop registration arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegistration {
    pub farmer_hash: FarmerHash,
    pub crop_name: FieldValue,
    pub planting_date: FieldValue,
    pub expected_harvest_date: FieldValue,
    pub crop_type: FieldValue,
}

impl CropRegistration {
    pub fn from_input(
        farmer_hash: &str,
        crop_name: &str,
        planting_date: &str,
        expected_harvest_date: &str,
        crop_type: &str,
    ) -> Result<Self, FieldError> {
        Ok(Self {
            farmer_hash: parse_farmer_hash(farmer_hash)?,
            crop_name: validate_field("Crop name", encode_length(crop_name))?,
            planting_date: validate_field("Planting date", encode_date(planting_date))?,
            expected_harvest_date: validate_field(
                "Harvest date",
                encode_date(expected_harvest_date),
            )?,
            crop_type: validate_field("Crop type", parse_integer(crop_type)?)?,
        })
    }

    #[must_use]
    pub fn crop_kind(&self) -> Option<CropType> {
        CropType::from_field(self.crop_type)
    }
}

/// Crop categories offered at the prompt. Other in-range values are still
/// accepted by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropType {
    Grains,
    Vegetables,
    Fruits,
    Legumes,
}

impl CropType {
    #[must_use]
    pub fn from_field(value: FieldValue) -> Option<Self> {
        [Self::Grains, Self::Vegetables, Self::Fruits, Self::Legumes]
            .into_iter()
            .find(|kind| FieldValue::from_u64(kind.code()) == value)
    }

    #[must_use]
    pub const fn code(self) -> u64 {
        match self {
            Self::Grains => 1,
            Self::Vegetables => 2,
            Self::Fruits => 3,
            Self::Legumes => 4,
        }
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Grains => "Grains",
            Self::Vegetables => "Vegetables",
            Self::Fruits => "Fruits",
            Self::Legumes => "Legumes",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_HEX: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn test_parse_farmer_hash_accepts_prefix() {
        let plain = parse_farmer_hash(HASH_HEX).unwrap();
        let prefixed = parse_farmer_hash(&format!("0x{HASH_HEX}")).unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(plain, FarmerHash::repeat_byte(1));
    }

    #[test]
    fn test_parse_farmer_hash_rejects_bad_input() {
        assert!(matches!(
            parse_farmer_hash("zz"),
            Err(FieldError::MalformedHash { .. })
        ));
        let err = parse_farmer_hash("0x0102").unwrap_err();
        assert!(err.to_string().contains("expected 32 bytes, got 2"));
    }

    #[test]
    fn test_farmer_registration_from_input() {
        let registration =
            FarmerRegistration::from_input("Amina Okafor", "Kano", "2024-03-15").unwrap();
        assert_eq!(registration.full_name, FieldValue::from_u64(12));
        assert_eq!(registration.region, FieldValue::from_u64(4));
        assert_eq!(
            registration.registration_date,
            FieldValue::from_u64(1_710_460_800)
        );

        let again = FarmerRegistration::from_input("Amina Okafor", "Kano", "2024-03-15").unwrap();
        assert_eq!(registration.farmer_hash, again.farmer_hash);

        let other = FarmerRegistration::from_input("Amina Okafor", "Kaduna", "2024-03-15").unwrap();
        assert_ne!(registration.farmer_hash, other.farmer_hash);
    }

    #[test]
    fn test_farmer_registration_rejects_pre_epoch_date() {
        let err = FarmerRegistration::from_input("Amina", "Kano", "1960-10-01").unwrap_err();
        assert!(matches!(
            err,
            FieldError::OutOfRange {
                field: "Registration date",
                ..
            }
        ));
    }

    #[test]
    fn test_crop_registration_from_input() {
        let crop =
            CropRegistration::from_input(HASH_HEX, "Sorghum", "2024-04-01", "2024-08-15", "3")
                .unwrap();
        assert_eq!(crop.crop_type, FieldValue::from_u64(3));
        assert_eq!(crop.crop_kind(), Some(CropType::Fruits));
        assert_eq!(crop.crop_name, FieldValue::from_u64(7));
    }

    #[test]
    fn test_crop_registration_rejects_negative_type() {
        let err = CropRegistration::from_input(HASH_HEX, "Sorghum", "2024-04-01", "2024-08-15", "-1")
            .unwrap_err();
        assert!(matches!(err, FieldError::OutOfRange { field: "Crop type", .. }));

        let err = CropRegistration::from_input(HASH_HEX, "Sorghum", "2024-04-01", "2024-08-15", "x")
            .unwrap_err();
        assert!(matches!(err, FieldError::NotAnInteger { .. }));
    }

    #[test]
    fn test_unlisted_crop_type_is_still_valid() {
        let crop =
            CropRegistration::from_input(HASH_HEX, "Cotton", "2024-04-01", "2024-08-15", "9")
                .unwrap();
        assert_eq!(crop.crop_kind(), None);
    }
}
