use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const PROFILE_FIELDS: [&str; 6] = [
    "age",
    "occupation",
    "monthly_income",
    "monthly_expenses",
    "assets",
    "risk_preference",
];

pub const SIMULATION_FIELDS: [&str; 3] = ["initial_amount", "annual_rate", "years"];

pub const MAX_SIMULATION_YEARS: u32 = 1000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Request data is empty")]
    EmptyRequest,
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Invalid number format")]
    InvalidNumber,
    #[error("All values must be positive numbers")]
    NonPositive,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Request data is empty, please provide user information")]
    EmptyRequest,
    #[error("Missing required information: {}", .0.join(", "))]
    MissingFields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileInput {
    pub age: String,
    pub occupation: String,
    pub monthly_income: String,
    pub monthly_expenses: String,
    pub assets: String,
    pub risk_preference: String,
}

impl ProfileInput {
    // absent and falsy values (null, "", 0, false, [], {}) both count as missing
    pub fn from_json(data: &Value) -> Result<Self, ProfileError> {
        let Some(map) = data.as_object().filter(|m| !m.is_empty()) else {
            return Err(ProfileError::EmptyRequest);
        };

        let missing: Vec<String> = PROFILE_FIELDS
            .iter()
            .filter(|field| map.get(**field).is_none_or(is_falsy))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ProfileError::MissingFields(missing));
        }

        Ok(Self {
            age: display_value(map, "age"),
            occupation: display_value(map, "occupation"),
            monthly_income: display_value(map, "monthly_income"),
            monthly_expenses: display_value(map, "monthly_expenses"),
            assets: display_value(map, "assets"),
            risk_preference: display_value(map, "risk_preference"),
        })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "age" => Some(&self.age),
            "occupation" => Some(&self.occupation),
            "monthly_income" => Some(&self.monthly_income),
            "monthly_expenses" => Some(&self.monthly_expenses),
            "assets" => Some(&self.assets),
            "risk_preference" => Some(&self.risk_preference),
            _ => None,
        }
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn display_value(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationInput {
    pub initial_amount: f64,
    // percent, 5.0 is 5%
    pub annual_rate: f64,
    pub years: u32,
}

impl SimulationInput {
    pub fn new(initial_amount: f64, annual_rate: f64, years: u32) -> Result<Self, SimulationError> {
        if !initial_amount.is_finite() || !annual_rate.is_finite() {
            return Err(SimulationError::InvalidNumber);
        }
        if initial_amount <= 0.0 || annual_rate < 0.0 || years == 0 {
            return Err(SimulationError::NonPositive);
        }
        if years > MAX_SIMULATION_YEARS {
            return Err(SimulationError::InvalidNumber);
        }
        // final amount and ROI must stay representable
        let growth = (1.0 + annual_rate / 100.0).powf(f64::from(years));
        if !(initial_amount * growth).is_finite() || !((growth - 1.0) * 100.0).is_finite() {
            return Err(SimulationError::InvalidNumber);
        }
        Ok(Self {
            initial_amount,
            annual_rate,
            years,
        })
    }

    pub fn from_json(data: &Value) -> Result<Self, SimulationError> {
        let Some(map) = data.as_object().filter(|m| !m.is_empty()) else {
            return Err(SimulationError::EmptyRequest);
        };

        let missing: Vec<String> = SIMULATION_FIELDS
            .iter()
            .filter(|field| !map.contains_key(**field))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SimulationError::MissingFields(missing));
        }

        let initial_amount = parse_real(&map["initial_amount"])?;
        let annual_rate = parse_real(&map["annual_rate"])?;
        let years = parse_whole(&map["years"])?;
        if years <= 0 {
            return Err(SimulationError::NonPositive);
        }
        let years = u32::try_from(years).map_err(|_| SimulationError::InvalidNumber)?;

        Self::new(initial_amount, annual_rate, years)
    }
}

fn parse_real(value: &Value) -> Result<f64, SimulationError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or(SimulationError::InvalidNumber)
}

fn parse_whole(value: &Value) -> Result<i64, SimulationError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                    .map(|v| v as i64)
            })
            .ok_or(SimulationError::InvalidNumber),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| SimulationError::InvalidNumber),
        _ => Err(SimulationError::InvalidNumber),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearBreakdown {
    pub year: u32,
    pub amount: f64,
    pub growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub initial_amount: f64,
    pub annual_rate: f64,
    pub years: u32,
    pub final_amount: f64,
    pub total_return: f64,
    pub roi_percentage: f64,
    pub yearly_breakdown: Vec<YearBreakdown>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_from_json_reports_every_missing_field_in_order() {
        let err = ProfileInput::from_json(&json!({
            "age": 30,
            "occupation": "",
            "assets": 0,
            "risk_preference": "moderate"
        }))
        .expect_err("incomplete profile");

        assert_eq!(
            err,
            ProfileError::MissingFields(vec![
                "occupation".into(),
                "monthly_income".into(),
                "monthly_expenses".into(),
                "assets".into(),
            ])
        );
        assert_eq!(
            err.to_string(),
            "Missing required information: occupation, monthly_income, monthly_expenses, assets"
        );
    }

    #[test]
    fn profile_from_json_renders_numbers_as_text() {
        let profile = ProfileInput::from_json(&json!({
            "age": 42,
            "occupation": "nurse",
            "monthly_income": 5200.5,
            "monthly_expenses": "3100",
            "assets": "savings 20k",
            "risk_preference": "conservative"
        }))
        .expect("valid profile");

        assert_eq!(profile.age, "42");
        assert_eq!(profile.monthly_income, "5200.5");
        assert_eq!(profile.monthly_expenses, "3100");
        assert_eq!(profile.field("risk_preference"), Some("conservative"));
        assert_eq!(profile.field("unknown"), None);
    }

    #[test]
    fn profile_from_json_rejects_empty_body() {
        assert_eq!(
            ProfileInput::from_json(&json!({})),
            Err(ProfileError::EmptyRequest)
        );
        assert_eq!(
            ProfileInput::from_json(&json!(null)),
            Err(ProfileError::EmptyRequest)
        );
    }

    #[test]
    fn simulation_from_json_accepts_numeric_strings() {
        let input = SimulationInput::from_json(&json!({
            "initial_amount": "1000",
            "annual_rate": 5,
            "years": "2"
        }))
        .expect("valid input");

        assert_eq!(input.initial_amount, 1000.0);
        assert_eq!(input.annual_rate, 5.0);
        assert_eq!(input.years, 2);
    }

    #[test]
    fn simulation_from_json_lists_missing_fields() {
        let err = SimulationInput::from_json(&json!({ "annual_rate": 5 }))
            .expect_err("missing fields");
        assert_eq!(
            err.to_string(),
            "Missing required fields: initial_amount, years"
        );
    }

    #[test]
    fn simulation_from_json_rejects_non_positive_values() {
        for body in [
            json!({ "initial_amount": 0, "annual_rate": 5, "years": 2 }),
            json!({ "initial_amount": 1000, "annual_rate": 5, "years": 0 }),
            json!({ "initial_amount": 1000, "annual_rate": -1, "years": 2 }),
            json!({ "initial_amount": 1000, "annual_rate": 5, "years": -3 }),
        ] {
            assert_eq!(
                SimulationInput::from_json(&body),
                Err(SimulationError::NonPositive),
                "body {body}"
            );
        }
    }

    #[test]
    fn simulation_from_json_rejects_bad_number_format() {
        for body in [
            json!({ "initial_amount": "lots", "annual_rate": 5, "years": 2 }),
            json!({ "initial_amount": 1000, "annual_rate": [5], "years": 2 }),
            json!({ "initial_amount": 1000, "annual_rate": 5, "years": 2.5 }),
            json!({ "initial_amount": 1000, "annual_rate": 5, "years": null }),
        ] {
            assert_eq!(
                SimulationInput::from_json(&body),
                Err(SimulationError::InvalidNumber),
                "body {body}"
            );
        }
    }

    #[test]
    fn simulation_new_rejects_non_finite_amounts() {
        assert_eq!(
            SimulationInput::new(f64::INFINITY, 5.0, 2),
            Err(SimulationError::InvalidNumber)
        );
        assert_eq!(
            SimulationInput::new(1000.0, f64::NAN, 2),
            Err(SimulationError::InvalidNumber)
        );
    }

    #[test]
    fn simulation_new_rejects_horizons_that_overflow() {
        assert!(SimulationInput::new(1000.0, 5.0, MAX_SIMULATION_YEARS).is_ok());
        assert_eq!(
            SimulationInput::new(1000.0, 0.0, MAX_SIMULATION_YEARS + 1),
            Err(SimulationError::InvalidNumber)
        );
        assert_eq!(
            SimulationInput::new(1000.0, 5.0, u32::MAX),
            Err(SimulationError::InvalidNumber)
        );
        // 1000 years at 200% overflows f64 well before the cap
        assert_eq!(
            SimulationInput::new(1000.0, 200.0, 1000),
            Err(SimulationError::InvalidNumber)
        );
        assert_eq!(
            SimulationInput::from_json(&json!({
                "initial_amount": 1000,
                "annual_rate": 5,
                "years": 20000
            })),
            Err(SimulationError::InvalidNumber)
        );
    }
}
