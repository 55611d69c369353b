//! Test-only fixtures

pub mod test_utils;
