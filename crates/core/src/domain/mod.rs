pub mod audit;
pub mod calculation;
pub mod context;
pub mod rule;
pub mod tariff;
