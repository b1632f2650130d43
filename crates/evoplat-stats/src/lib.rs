//! Statistical helpers for summarizing training generations.
//!
//! The trainer reports the spread of fitness and score values across a
//! generation after every evaluation pass. This crate keeps that arithmetic
//! out of the training crate.
//!
//! # Examples
//!
//! ```
//! use evoplat_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```

pub mod descriptive;
