pub mod core;
pub mod input;
pub mod engine;
pub mod learning;
pub mod selection;

#[cfg(test)]
mod tests;
