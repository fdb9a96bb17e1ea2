// Domain layer: GitLab resource models and the remote collection port.

pub mod model;
pub mod ports;
