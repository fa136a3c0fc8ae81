pub mod codec;
pub mod rig;
mod types;

// Re-exports
pub use {
    codec::{decode_skeleton, encode_skeleton, export_skl, import_skl},
    rig::{apply, build, name_index},
    types::{
        BoneDirective, BoneRecord, BuildOptions, RigBuilder, SkeletonHeader,
        TailPolicy,
    },
};
