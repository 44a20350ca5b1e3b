pub mod circuit_breaker;
pub mod error;
pub mod logger;
pub mod phi;
pub mod validation;
