#![allow(dead_code)]

pub mod strategies;

pub use fixtures::*;
pub use strategies::*;
