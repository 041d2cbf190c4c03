//! Canonical feature contract shared by training and serving.
//!
//! The trained tree only sees positional slots, so the order of
//! [`FeatureField::ALL`] is the single source of truth for how a
//! [`FeatureRecord`] becomes a model input vector. Both range columns (strict
//! schema bounds and the looser advisory bounds) live in [`FIELD_SPECS`].

use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};

/// Number of values in a model input vector.
pub const FEATURE_COUNT: usize = 11;

/// Column names in model input order.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "Account_Length",
    "Area_Code",
    "Intl_Plan",
    "Vmail_Plan",
    "Vmail_Message",
    "CustServ_Calls",
    "Total_Calls",
    "Total_Mins",
    "Total_Charge",
    "High_Usage",
    "Many_CustServ_Calls",
];

/// One named slot of the model input vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureField {
    AccountLength,
    AreaCode,
    IntlPlan,
    VmailPlan,
    VmailMessage,
    CustServCalls,
    TotalCalls,
    TotalMins,
    TotalCharge,
    HighUsage,
    ManyCustServCalls,
}

impl FeatureField {
    /// All fields in model input order.
    pub const ALL: [FeatureField; FEATURE_COUNT] = [
        FeatureField::AccountLength,
        FeatureField::AreaCode,
        FeatureField::IntlPlan,
        FeatureField::VmailPlan,
        FeatureField::VmailMessage,
        FeatureField::CustServCalls,
        FeatureField::TotalCalls,
        FeatureField::TotalMins,
        FeatureField::TotalCharge,
        FeatureField::HighUsage,
        FeatureField::ManyCustServCalls,
    ];

    /// Position of this field in the model input vector.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Wire/column name of the field.
    pub const fn name(self) -> &'static str {
        FEATURE_COLUMNS[self.index()]
    }

    /// Declared kind and bounds for the field.
    pub fn spec(self) -> &'static FieldSpec {
        &FIELD_SPECS[self.index()]
    }
}

impl std::fmt::Display for FeatureField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Value domain of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-negative integer count or code.
    Integer,
    /// Integer flag restricted to 0 or 1.
    Flag,
    /// Continuous amount.
    Float,
}

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True when `value` is finite and within `[min, max]`.
    pub fn contains(self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Range accepted by both `self` and `other`.
    pub fn intersect(self, other: Bounds) -> Bounds {
        Bounds {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Declared kind and ranges of one feature field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub field: FeatureField,
    pub kind: FieldKind,
    /// Schema-level bounds.
    pub strict: Bounds,
    /// Looser bounds used by the runtime validator.
    pub advisory: Bounds,
}

const fn spec(
    field: FeatureField,
    kind: FieldKind,
    strict: (f64, f64),
    advisory: (f64, f64),
) -> FieldSpec {
    FieldSpec {
        field,
        kind,
        strict: Bounds::new(strict.0, strict.1),
        advisory: Bounds::new(advisory.0, advisory.1),
    }
}

/// Range table indexed by [`FeatureField::index`].
pub static FIELD_SPECS: [FieldSpec; FEATURE_COUNT] = [
    spec(FeatureField::AccountLength, FieldKind::Integer, (0.0, 300.0), (0.0, 500.0)),
    spec(FeatureField::AreaCode, FieldKind::Integer, (100.0, 999.0), (200.0, 999.0)),
    spec(FeatureField::IntlPlan, FieldKind::Flag, (0.0, 1.0), (0.0, 1.0)),
    spec(FeatureField::VmailPlan, FieldKind::Flag, (0.0, 1.0), (0.0, 1.0)),
    spec(FeatureField::VmailMessage, FieldKind::Integer, (0.0, 200.0), (0.0, 1000.0)),
    spec(FeatureField::CustServCalls, FieldKind::Integer, (0.0, 20.0), (0.0, 20.0)),
    spec(FeatureField::TotalCalls, FieldKind::Float, (0.0, 1000.0), (0.0, 5000.0)),
    spec(FeatureField::TotalMins, FieldKind::Float, (0.0, 2000.0), (0.0, 10000.0)),
    spec(FeatureField::TotalCharge, FieldKind::Float, (0.0, 500.0), (0.0, 2000.0)),
    spec(FeatureField::HighUsage, FieldKind::Flag, (0.0, 1.0), (0.0, 1.0)),
    spec(FeatureField::ManyCustServCalls, FieldKind::Flag, (0.0, 1.0), (0.0, 1.0)),
];

/// One customer's attributes, as received over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "Account_Length", deserialize_with = "whole_number")]
    pub account_length: i64,
    #[serde(rename = "Area_Code", deserialize_with = "whole_number")]
    pub area_code: i64,
    #[serde(rename = "Intl_Plan", deserialize_with = "whole_number")]
    pub intl_plan: i64,
    #[serde(rename = "Vmail_Plan", deserialize_with = "whole_number")]
    pub vmail_plan: i64,
    #[serde(rename = "Vmail_Message", deserialize_with = "whole_number")]
    pub vmail_message: i64,
    #[serde(rename = "CustServ_Calls", deserialize_with = "whole_number")]
    pub cust_serv_calls: i64,
    #[serde(rename = "Total_Calls")]
    pub total_calls: f64,
    #[serde(rename = "Total_Mins")]
    pub total_mins: f64,
    #[serde(rename = "Total_Charge")]
    pub total_charge: f64,
    #[serde(rename = "High_Usage", deserialize_with = "whole_number")]
    pub high_usage: i64,
    #[serde(rename = "Many_CustServ_Calls", deserialize_with = "whole_number")]
    pub many_cust_serv_calls: i64,
}

impl FeatureRecord {
    /// Numeric value of a single field.
    pub fn value(&self, field: FeatureField) -> f64 {
        match field {
            FeatureField::AccountLength => self.account_length as f64,
            FeatureField::AreaCode => self.area_code as f64,
            FeatureField::IntlPlan => self.intl_plan as f64,
            FeatureField::VmailPlan => self.vmail_plan as f64,
            FeatureField::VmailMessage => self.vmail_message as f64,
            FeatureField::CustServCalls => self.cust_serv_calls as f64,
            FeatureField::TotalCalls => self.total_calls,
            FeatureField::TotalMins => self.total_mins,
            FeatureField::TotalCharge => self.total_charge,
            FeatureField::HighUsage => self.high_usage as f64,
            FeatureField::ManyCustServCalls => self.many_cust_serv_calls as f64,
        }
    }

    /// Model input vector in [`FeatureField::ALL`] order.
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        FeatureField::ALL.map(|field| self.value(field))
    }
}

/// Accepts integers and integral floats such as `415.0`; rejects fractions.
fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    deserializer.deserialize_any(WholeNumber)
}

struct WholeNumber;

impl<'de> Visitor<'de> for WholeNumber {
    type Value = i64;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a whole number")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<i64, E> {
        Ok(value)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<i64, E> {
        i64::try_from(value).map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<i64, E> {
        // i64::MAX rounds up to 2^63 as f64, so the upper check is exclusive.
        let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
        if value.is_finite() && value.fract() == 0.0 && in_range {
            Ok(value as i64)
        } else {
            Err(E::invalid_value(Unexpected::Float(value), &self))
        }
    }
}

/// Canonical column list as owned strings, as stored in model artifacts.
pub fn feature_columns() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|name| (*name).to_string()).collect()
}
