// Validation utilities module
// Custom validation functions for domain-specific rules, used from
// `#[validate(custom = "...")]` attributes on request DTOs.

use validator::ValidationError;

/// Cart and order item quantities live in [1, 99]
pub fn validate_item_quantity(quantity: i32) -> Result<(), ValidationError> {
    if (1..=99).contains(&quantity) {
        Ok(())
    } else {
        Err(ValidationError::new("quantity_out_of_range"))
    }
}

/// Latitude must be within [-90, 90]
pub fn validate_latitude(latitude: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&latitude) {
        Ok(())
    } else {
        Err(ValidationError::new("latitude_out_of_range"))
    }
}

/// Longitude must be within [-180, 180]
pub fn validate_longitude(longitude: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&longitude) {
        Ok(())
    } else {
        Err(ValidationError::new("longitude_out_of_range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_item_quantity(1).is_ok());
        assert!(validate_item_quantity(99).is_ok());
        assert!(validate_item_quantity(0).is_err());
        assert!(validate_item_quantity(100).is_err());
        assert!(validate_item_quantity(-4).is_err());
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(validate_latitude(19.4326).is_ok());
        assert!(validate_latitude(-91.0).is_err());
        assert!(validate_longitude(-99.1332).is_ok());
        assert!(validate_longitude(181.0).is_err());
    }
}
