//! Field rules shared by the request payloads of several services.

use rust_decimal::Decimal;
use std::borrow::Cow;
use validator::ValidationError;

use crate::errors::FieldErrors;
use crate::services::invoice_status::money;

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule("required", "This field is required"));
    }
    Ok(())
}

pub fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(rule("min", "Must be at least 0"));
    }
    Ok(())
}

/// Strictly positive once rounded to the cent, so sub-cent amounts fail.
pub fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if money(*value) <= Decimal::ZERO {
        return Err(rule("min", "Must be at least 0.01"));
    }
    Ok(())
}

pub fn percentage(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        return Err(rule("between", "Must be between 0 and 100"));
    }
    Ok(())
}

/// Accumulates field errors from derive-based and hand-written checks.
#[derive(Debug, Default)]
pub struct FieldErrorSet(FieldErrors);

impl FieldErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Folds in the outcome of a `Validate::validate` call.
    pub fn merge(&mut self, result: Result<(), validator::ValidationErrors>) {
        if let Err(errors) = result {
            for (field, messages) in crate::errors::collect_field_errors(&errors) {
                self.0.entry(field).or_default().extend(messages);
            }
        }
    }

    /// Applies a single-value rule under `field`.
    pub fn check<T: ?Sized>(
        &mut self,
        field: impl Into<String>,
        value: &T,
        rule: fn(&T) -> Result<(), ValidationError>,
    ) {
        if let Err(err) = rule(value) {
            let message = err
                .message
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string());
            self.add(field, message);
        }
    }

    pub fn into_result(self) -> Result<(), crate::errors::ServiceError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(crate::errors::ServiceError::FieldValidation(self.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use validator::Validate;

    #[derive(Validate)]
    struct PaymentForm {
        #[validate(custom = "not_blank")]
        name: String,
        #[validate(custom = "positive")]
        amount: Decimal,
    }

    #[test]
    fn decimal_rules() {
        assert!(non_negative(&dec!(0)).is_ok());
        assert!(non_negative(&dec!(-0.01)).is_err());
        assert!(positive(&dec!(0)).is_err());
        assert!(positive(&dec!(0.01)).is_ok());
        assert!(positive(&dec!(0.004)).is_err());
        assert!(positive(&dec!(0.005)).is_err());
        assert!(positive(&dec!(0.006)).is_ok());
        assert!(percentage(&dec!(100)).is_ok());
        assert!(percentage(&dec!(100.01)).is_err());
    }

    #[test]
    fn merges_derived_and_manual_errors() {
        let form = PaymentForm {
            name: "   ".into(),
            amount: dec!(0),
        };
        let mut errors = FieldErrorSet::new();
        errors.merge(form.validate());
        errors.check("items.0.price", &dec!(-1), non_negative);
        errors.add("due_date", "Due date must be on or after the invoice date");

        match errors.into_result() {
            Err(crate::errors::ServiceError::FieldValidation(fields)) => {
                assert_eq!(fields["name"], vec!["This field is required".to_string()]);
                assert_eq!(fields["amount"], vec!["Must be at least 0.01".to_string()]);
                assert_eq!(fields["items.0.price"], vec!["Must be at least 0".to_string()]);
                assert!(fields.contains_key("due_date"));
            }
            other => panic!("expected field errors, got {:?}", other),
        }
    }
}
