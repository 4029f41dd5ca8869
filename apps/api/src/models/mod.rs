pub mod evaluation;
pub mod interview;
pub mod turn;
