//! Roughness statistics, one stage per module.
//!
//! Passes are aggregated per segment and vehicle, segments get a baseline and
//! a golden flag, vehicles get a k-factor from golden segments, and the
//! calibrated segment medians are ranked and graded. [`analyzer`] runs the
//! stages in order and hands the results to [`crate::output`].

pub mod aggregate;
pub mod analyzer;
pub mod baseline;
pub mod calibration;
pub mod grade;
pub mod metric;
pub mod normalize;
pub mod types;
pub mod utility;
