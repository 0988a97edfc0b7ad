pub mod amortize;
pub mod model;
pub mod monte_carlo;
pub mod scenarios;
pub mod sensitivity;
