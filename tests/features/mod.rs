//! Cucumber features and step definitions


pub use support::TestWorld;
