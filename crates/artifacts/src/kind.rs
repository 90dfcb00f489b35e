//! Well-known artifact classes.
//!
//! The vocabulary is open; engines may emit classes of their own.

pub const BINARY: &str = "binary";
pub const CONTAINER: &str = "container";
pub const GENERATED: &str = "generated";
pub const TEST_REPORT: &str = "test-report";
