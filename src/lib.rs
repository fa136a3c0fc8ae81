//! skelora is an importer for the .skl binary rigid-body skeleton
//! format. It decodes the fixed layout header and bone records,
//! round-trips them back to bytes, and transforms the flat, index
//! parented bone list into an ordered sequence of placement
//! directives that a host rig construction API can apply through the
//! [`skl_import::RigBuilder`] trait.
//!
//! The crate performs no scene graph mutation itself and has no
//! opinion about the host's object model.

pub mod skl_error;
pub mod skl_import;
