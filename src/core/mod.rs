// Position keys, engine scores and the rules engine boundary.

pub mod position_key;
pub mod score;
pub mod evaluation;
pub mod rules;
