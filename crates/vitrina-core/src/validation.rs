//! # Validation Module
//!
//! Input validation for everything that arrives over the API.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP handler                                                  │
//! │  └── JSON deserialization (types, required fields)                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Field rules (lengths, characters, ranges)                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  └── NOT NULL, UNIQUE, FOREIGN KEY, CHECK (quantity >= 0)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use vitrina_core::validation::{validate_product_code, validate_quantity};
//!
//! assert!(validate_product_code("TEE-BLK-M").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - 1 to 40 characters after trimming
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use vitrina_core::validation::validate_product_code;
///
/// assert!(validate_product_code("JEANS_32").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("has space").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(required("code"));
    }

    if code.chars().count() > 40 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 40,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product description (1 to 200 characters).
pub fn validate_description(description: &str) -> ValidationResult<()> {
    validate_name("description", description, 200)
}

/// Validates a free-text name field: not blank, at most `max` characters.
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a login name.
///
/// ## Rules
/// - 3 to 40 characters
/// - Letters, digits, `.`, `_` and `-`
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.is_empty() {
        return Err(required("username"));
    }

    let len = username.chars().count();
    if len < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }
    if len > 40 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 40,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, dots, hyphens, and underscores"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a new password (at least 6 characters).
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(required("password"));
    }

    if password.chars().count() < 6 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 6,
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// Empty is fine (lists everything). Returns the trimmed query.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## User Workflow
/// ```text
/// Cashier types quantity: 5
///      │
///      ▼
/// validate_quantity(5) ← THIS FUNCTION
///      │
///      ├── qty <= 0?   → "quantity must be positive"
///      ├── qty > 999?  → "quantity must be between 1 and 999"
///      └── OK → add to cart / transfer / invoice line
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price or cost in cents. Zero is allowed.
///
/// ```rust
/// use vitrina_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// assert!(validate_price_cents(i64::MAX).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }

    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment or deposit amount (1 to [`MAX_AMOUNT_CENTS`]).
pub fn validate_amount_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 1,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Prices one line as `unit * quantity`.
pub fn line_total_cents(unit_cents: i64, quantity: i64) -> ValidationResult<i64> {
    Money::from_cents(unit_cents)
        .checked_multiply_quantity(quantity)
        .map(|m| m.cents())
        .ok_or_else(|| total_out_of_range("line_total"))
}

/// Adds line totals into a document total.
pub fn document_total<I>(line_totals: I) -> ValidationResult<Money>
where
    I: IntoIterator<Item = i64>,
{
    line_totals
        .into_iter()
        .try_fold(Money::zero(), |acc, cents| acc.checked_add(Money::from_cents(cents)))
        .ok_or_else(|| total_out_of_range("total"))
}

fn total_out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

/// Validates a register opening float or counted cash (0 to [`MAX_AMOUNT_CENTS`]).
pub fn validate_opening_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "amount".to_string(),
        });
    }

    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_code() {
        assert!(validate_product_code("TEE-BLK-M").is_ok());
        assert!(validate_product_code("jeans_32").is_ok());

        assert!(validate_product_code("").is_err());
        assert!(validate_product_code("   ").is_err());
        assert!(validate_product_code("has space").is_err());
        assert!(validate_product_code(&"A".repeat(41)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Tienda Centro", 100).is_ok());
        assert!(validate_name("name", "  ", 100).is_err());
        assert!(validate_description(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ana.lopez").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("ana lopez").is_err());
        assert!(validate_username(&"a".repeat(41)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret1").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_amount_cents(1).is_ok());
        assert!(validate_amount_cents(0).is_err());
        assert!(validate_amount_cents(MAX_AMOUNT_CENTS).is_ok());
        assert!(matches!(
            validate_amount_cents(MAX_AMOUNT_CENTS + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate_opening_cents(0).is_ok());
        assert!(validate_opening_cents(-1).is_err());
        assert!(validate_opening_cents(MAX_AMOUNT_CENTS + 1).is_err());
    }

    #[test]
    fn test_price_bound() {
        assert!(validate_price_cents(MAX_AMOUNT_CENTS).is_ok());
        assert!(matches!(
            validate_price_cents(MAX_AMOUNT_CENTS + 1),
            Err(ValidationError::OutOfRange { max: MAX_AMOUNT_CENTS, .. })
        ));
        assert!(validate_price_cents(i64::MAX / 2 + 1).is_err());
    }

    #[test]
    fn test_totals_refuse_overflow() {
        assert_eq!(line_total_cents(1500, 3).unwrap(), 4500);
        assert!(matches!(
            line_total_cents(i64::MAX / 2 + 1, 2),
            Err(ValidationError::OutOfRange { .. })
        ));

        assert_eq!(document_total([4500, 1500]).unwrap().cents(), 6000);
        assert_eq!(document_total(std::iter::empty()).unwrap(), Money::zero());
        assert!(document_total([i64::MAX, 1]).is_err());

        // The largest valid line still fits many times over
        let max_line = line_total_cents(MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY).unwrap();
        assert!(document_total(vec![max_line; 500]).is_ok());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  tee ").unwrap(), "tee");
        assert_eq!(validate_search_query("").unwrap(), "");
        assert!(validate_search_query(&"q".repeat(101)).is_err());
    }
}
