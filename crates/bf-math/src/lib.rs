//! bayesfit math utilities.

pub mod math;

pub use math::chisq::*;
pub use math::gammainc::*;
pub use math::linalg::*;
pub use math::normal::*;
pub use math::stable::*;
