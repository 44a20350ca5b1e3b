// Domain layer: core models and ports (interfaces). No HTTP or file IO here.

pub mod model;
pub mod ports;
