use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pounds per kilogram
pub const LBS_PER_KG: f64 = 2.20462;

/// Message shown instead of a number when a denominator is zero
pub const CANNOT_CALCULATE: &str = "Cannot calculate";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DosingError {
    #[error("{field} must be a number")]
    NotANumber { field: &'static str },

    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} is too large")]
    NotFinite { field: &'static str },
}

/// Reject NaN, infinite and negative inputs
fn validate(field: &'static str, value: f64) -> Result<f64, DosingError> {
    if value.is_nan() {
        Err(DosingError::NotANumber { field })
    } else if value.is_infinite() {
        Err(DosingError::NotFinite { field })
    } else if value < 0.0 {
        Err(DosingError::Negative { field, value })
    } else {
        Ok(value)
    }
}

/// A computed quantity, or the reason it has no value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Quantity {
    Value { value: f64, unit: String },
    CannotCalculate { reason: String },
}

impl Quantity {
    fn value(value: f64, unit: &str) -> Self {
        Self::Value {
            value,
            unit: unit.to_string(),
        }
    }

    fn cannot_calculate(reason: &str) -> Self {
        Self::CannotCalculate {
            reason: reason.to_string(),
        }
    }

    /// The numeric value, if there is one
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value { value, .. } => Some(*value),
            Self::CannotCalculate { .. } => None,
        }
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value { value, unit } => write!(f, "{value:.2} {unit}"),
            Self::CannotCalculate { reason } => write!(f, "{CANNOT_CALCULATE}: {reason}"),
        }
    }
}

/// Weight-based dose request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseRequest {
    pub weight_kg: f64,
    pub dose_mg_per_kg: f64,
    /// Drug amount in the stock solution
    pub concentration_mg: f64,
    /// Stock solution volume holding `concentration_mg`
    #[serde(default = "default_concentration_ml")]
    pub concentration_ml: f64,
}

fn default_concentration_ml() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseResult {
    /// Total drug to administer, in mg
    pub total_dose: Quantity,
    /// Volume of stock solution to draw, in mL
    pub volume: Quantity,
}

/// Total dose (`weight * dose/kg`) and the volume of stock solution holding
/// it. The volume cannot be calculated when the concentration is zero; the
/// total dose is still reported.
pub fn weight_based_dose(request: &DoseRequest) -> Result<DoseResult, DosingError> {
    let weight = validate("weight", request.weight_kg)?;
    let dose_per_kg = validate("dose", request.dose_mg_per_kg)?;
    let concentration_mg = validate("concentration (mg)", request.concentration_mg)?;
    let concentration_ml = validate("concentration (mL)", request.concentration_ml)?;

    let total_mg = weight * dose_per_kg;
    if !total_mg.is_finite() {
        return Err(DosingError::NotFinite { field: "total dose" });
    }

    let volume = if concentration_mg == 0.0 {
        Quantity::cannot_calculate("drug concentration is zero")
    } else if concentration_ml == 0.0 {
        Quantity::cannot_calculate("concentration volume is zero")
    } else {
        let mg_per_ml = concentration_mg / concentration_ml;
        let ml = total_mg / mg_per_ml;
        if ml.is_finite() {
            Quantity::value(ml, "mL")
        } else {
            Quantity::cannot_calculate("volume is out of range")
        }
    };

    Ok(DoseResult {
        total_dose: Quantity::value(total_mg, "mg"),
        volume,
    })
}

/// IV drip rate request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripRequest {
    pub volume_ml: f64,
    pub time_min: f64,
    /// Administration set drop factor, gtts/mL
    pub drop_factor: f64,
}

/// Drip rate in whole drops per minute: `round(volume * drop_factor / time)`
pub fn drip_rate(request: &DripRequest) -> Result<Quantity, DosingError> {
    let volume = validate("volume", request.volume_ml)?;
    let time = validate("time", request.time_min)?;
    let drop_factor = validate("drop factor", request.drop_factor)?;

    if time == 0.0 {
        return Ok(Quantity::cannot_calculate("infusion time is zero"));
    }

    let rate = (volume * drop_factor / time).round();
    if rate.is_finite() {
        Ok(Quantity::value(rate, "gtts/min"))
    } else {
        Ok(Quantity::cannot_calculate("rate is out of range"))
    }
}

/// Weight unit for conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    Kg,
    Lbs,
}

impl std::fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kg => write!(f, "kg"),
            Self::Lbs => write!(f, "lbs"),
        }
    }
}

pub fn lbs_to_kg(lbs: f64) -> Result<f64, DosingError> {
    Ok(validate("weight", lbs)? / LBS_PER_KG)
}

pub fn kg_to_lbs(kg: f64) -> Result<f64, DosingError> {
    let lbs = validate("weight", kg)? * LBS_PER_KG;
    if lbs.is_finite() {
        Ok(lbs)
    } else {
        Err(DosingError::NotFinite { field: "weight" })
    }
}

/// Convert a weight into `to` units. Values already in `to` units are only
/// validated.
pub fn convert_weight(value: f64, from: WeightUnit, to: WeightUnit) -> Result<f64, DosingError> {
    match (from, to) {
        (WeightUnit::Lbs, WeightUnit::Kg) => lbs_to_kg(value),
        (WeightUnit::Kg, WeightUnit::Lbs) => kg_to_lbs(value),
        _ => validate("weight", value),
    }
}
