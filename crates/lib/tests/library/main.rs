//! Library integration tests.

mod common;
mod stack_tests;
