//! Implements the base structures: configuration, errors, fields, and collaborator interfaces

mod config;
mod error;
mod essential;
mod field;
mod mesh;
mod parameter_source;
mod parameters;
mod sample_meshes;
mod sample_params;
mod scales;
pub use crate::base::config::*;
pub use crate::base::error::*;
pub use crate::base::essential::*;
pub use crate::base::field::*;
pub use crate::base::mesh::*;
pub use crate::base::parameter_source::*;
pub use crate::base::parameters::*;
pub use crate::base::sample_meshes::*;
pub use crate::base::sample_params::*;
pub use crate::base::scales::*;
