// Domain layer: records produced from responses and the ports the verifier talks through.

pub mod model;
pub mod ports;
