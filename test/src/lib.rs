pub mod helpers;
pub mod test_components;

pub use helpers::*;
pub use test_components::{Avatar, Pinged, Profile, Saved};
