// Domain layer: tabular model, analysis results and ports (interfaces).

pub mod model;
pub mod ports;
pub mod table;
