// Domain layer - Request types and the rules that gate them

pub mod model;
pub mod rules;
