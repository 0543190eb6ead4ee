//! Internal numerical building blocks.
//!
//! Everything here is `pub(crate)`: quadrature rule tables, the fixed
//! Kronrod rule applied to one interval, and linear interpolation brackets
//! on the radial grid.

pub(crate) mod constants;
pub(crate) mod interp;
pub(crate) mod kronrod;
