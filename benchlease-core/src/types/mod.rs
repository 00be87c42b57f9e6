mod lease;
mod resource;

pub use lease::{Lease, LeaseState};
pub use resource::{Labels, Resource};
