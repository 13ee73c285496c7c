//! Input validation
//!
//! Collects every violated field before reporting, so a request with two bad
//! fields gets both back in one response.

use crate::error::{FieldError, SubscriptionError};

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `ok` holds
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError {
                field: field.to_string(),
                message: message.to_string(),
            });
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn finish(self) -> Result<(), SubscriptionError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(SubscriptionError::Validation(self.errors))
        }
    }
}

pub(crate) fn validate_plan_id(v: &mut Validator, field: &str, plan_id: i32) {
    v.check(plan_id > 0, field, "plan id must be a positive integer");
}

pub(crate) fn validate_amount(v: &mut Validator, amount: i64) {
    v.check(amount > 0, "amount", "amount must be greater than zero");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input_passes() {
        let mut v = Validator::new();
        validate_plan_id(&mut v, "plan_id", 3);
        validate_amount(&mut v, 10);
        assert!(v.is_valid());
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_collects_all_violations() {
        let mut v = Validator::new();
        validate_plan_id(&mut v, "plan_id", 0);
        validate_amount(&mut v, -5);
        assert_eq!(v.errors().len(), 2);

        match v.finish() {
            Err(SubscriptionError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["plan_id", "amount"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut v = Validator::new();
        validate_amount(&mut v, 0);
        assert!(!v.is_valid());
    }
}
