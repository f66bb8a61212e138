//! Engine tests
//!
//! Programs are built with the helpers in `helpers` or loaded from the JSON
//! fixtures in `fixtures/`, then stepped to the end.

mod helpers;

mod basic_tests;
mod function_tests;
mod jump_tests;
