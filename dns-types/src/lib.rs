#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::missing_errors_doc)]

pub mod name;
pub mod nsr;
pub mod protocol;
pub mod relation;
pub mod roots;

pub use name::Name;
pub use nsr::{Nsr, NsrBlock};
