//! Range validation for feature records.
//!
//! Validation is a pure check: it returns every violation it finds and leaves
//! the decision of how to reject the record to the caller.

use serde::{Deserialize, Serialize};

use crate::features::{Bounds, FeatureField, FeatureRecord, FieldKind, FieldSpec};

/// Which column of the range table a record is checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsPolicy {
    /// Looser runtime bounds.
    #[default]
    Advisory,
    /// Schema-level bounds.
    Strict,
    /// Intersection of strict and advisory bounds.
    Both,
}

impl BoundsPolicy {
    /// Effective bounds for a field under this policy.
    pub fn bounds_for(self, spec: &FieldSpec) -> Bounds {
        match self {
            BoundsPolicy::Advisory => spec.advisory,
            BoundsPolicy::Strict => spec.strict,
            BoundsPolicy::Both => spec.strict.intersect(spec.advisory),
        }
    }
}

/// A single field outside its declared range.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub field: FeatureField,
    pub value: f64,
    pub bounds: Bounds,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field.spec().kind {
            FieldKind::Flag => write!(f, "{} must be 0 or 1", self.field),
            FieldKind::Integer | FieldKind::Float => {
                write!(f, "{} out of typical range ({})", self.field, self.bounds)
            }
        }
    }
}

/// Check a record against the advisory bounds.
///
/// Returns one message per violated field, in column order. An empty list
/// means the record is valid.
pub fn validate(record: &FeatureRecord) -> Vec<String> {
    validate_with(record, BoundsPolicy::Advisory)
}

/// Check a record against the bounds selected by `policy`.
pub fn validate_with(record: &FeatureRecord, policy: BoundsPolicy) -> Vec<String> {
    violations(record, policy)
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Structured form of [`validate_with`].
pub fn violations(record: &FeatureRecord, policy: BoundsPolicy) -> Vec<Violation> {
    FeatureField::ALL
        .iter()
        .filter_map(|&field| {
            let bounds = policy.bounds_for(field.spec());
            let value = record.value(field);
            (!bounds.contains(value)).then_some(Violation {
                field,
                value,
                bounds,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_record() -> FeatureRecord {
        FeatureRecord {
            account_length: 120,
            area_code: 415,
            intl_plan: 0,
            vmail_plan: 1,
            vmail_message: 30,
            cust_serv_calls: 3,
            total_calls: 500.0,
            total_mins: 1000.0,
            total_charge: 200.0,
            high_usage: 0,
            many_cust_serv_calls: 0,
        }
    }

    #[test]
    fn documented_record_is_valid_under_every_policy() {
        let record = valid_record();
        for policy in [BoundsPolicy::Advisory, BoundsPolicy::Strict, BoundsPolicy::Both] {
            assert!(validate_with(&record, policy).is_empty(), "{policy:?}");
        }
    }

    #[test]
    fn low_area_code_is_reported() {
        let mut record = valid_record();
        record.area_code = 50;
        let messages = validate(&record);
        assert_eq!(messages, vec!["Area_Code out of typical range (200-999)"]);
    }

    #[test]
    fn collects_every_violation_in_column_order() {
        let mut record = valid_record();
        record.account_length = -1;
        record.intl_plan = 2;
        record.total_charge = 2500.0;
        record.many_cust_serv_calls = -3;
        let messages = validate(&record);
        assert_eq!(
            messages,
            vec![
                "Account_Length out of typical range (0-500)",
                "Intl_Plan must be 0 or 1",
                "Total_Charge out of typical range (0-2000)",
                "Many_CustServ_Calls must be 0 or 1",
            ]
        );
    }

    #[test]
    fn strict_policy_uses_schema_bounds() {
        let mut record = valid_record();
        record.account_length = 400;
        record.area_code = 150;
        assert!(validate_with(&record, BoundsPolicy::Advisory)
            .iter()
            .all(|msg| msg.starts_with("Area_Code")));
        assert_eq!(
            validate_with(&record, BoundsPolicy::Strict),
            vec!["Account_Length out of typical range (0-300)"]
        );
        assert_eq!(validate_with(&record, BoundsPolicy::Both).len(), 2);
    }

    #[test]
    fn non_finite_amounts_are_violations() {
        let mut record = valid_record();
        record.total_mins = f64::INFINITY;
        let found = violations(&record, BoundsPolicy::Advisory);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, FeatureField::TotalMins);
    }
}
