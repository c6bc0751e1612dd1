use crate::farmer::FarmerHash;
use crate::field::FieldValue;

/// Private inputs for the self-test circuit, supplied at proving time
pub trait FarmerWitnesses: Send + Sync {
    fn create_test_farmer_hash(&self) -> FarmerHash;
    fn create_test_farmer_name(&self) -> FieldValue;
    fn create_test_region(&self) -> FieldValue;
    fn create_test_crop_name(&self) -> FieldValue;
}

/// Fixed witness values used by `test_farmer_registration`
#[derive(Debug, Default, Clone, Copy)]
pub struct TestWitnesses;

impl FarmerWitnesses for TestWitnesses {
    fn create_test_farmer_hash(&self) -> FarmerHash {
        let mut bytes = [0u8; 32];
        for (byte, value) in bytes.iter_mut().zip(1u8..) {
            *byte = value;
        }
        FarmerHash::new(bytes)
    }

    fn create_test_farmer_name(&self) -> FieldValue {
        FieldValue::from_u64(123_456_789)
    }

    fn create_test_region(&self) -> FieldValue {
        FieldValue::from_u64(987_654_321)
    }

    fn create_test_crop_name(&self) -> FieldValue {
        FieldValue::from_u64(555_666_777)
    }
}
