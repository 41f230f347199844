//! Medication dosing calculator.
//!
//! Pure, stateless conversions:
//!
//! - weight-based dose: total mg and the stock volume that holds it
//! - IV drip rate in gtts/min
//! - pounds to kilograms and back
//!
//! Inputs that are NaN, infinite or negative are rejected with
//! [`DosingError`](calculator::DosingError). A zero denominator never yields
//! `Infinity`: the affected value is reported as
//! [`Quantity::CannotCalculate`](calculator::Quantity::CannotCalculate).

pub mod calculator;
