//! Domain rules that hold regardless of transport or storage.

pub mod validation;
