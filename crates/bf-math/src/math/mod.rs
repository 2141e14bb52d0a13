//! Numerical kernels used by the inference engine.

pub mod chisq;
pub mod gammainc;
pub mod linalg;
pub mod normal;
pub mod stable;
