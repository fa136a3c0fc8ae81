use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// Fixed layout header of a .skl file
///
/// ```text
/// file_type       char[8]     8   version tag
/// num_objects     int         4   number of objects (skeletons)
/// skeleton_hash   int         4   opaque id number
/// num_elements    int         4   number of bones
///
/// total size          20 bytes, little endian
/// ```
///
/// `num_elements` must equal the number of bone records that follow
/// the header in the stream. `file_type` is kept exactly as decoded,
/// including any embedded nulls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkeletonHeader {
    pub file_type: String,
    pub num_objects: i32,
    pub skeleton_hash: i32,
    pub num_elements: i32,
}

/// One bone record from a .skl file
///
/// ```text
/// name        char[32]    32  name of bone, null padded
/// parent      int         4   index of parent bone, -1 = root
/// scale       float       4   scale, leaf length is 1.0 / scale
/// matrix      float[3][4] 48  affine bone matrix, row major
///                             [x1 x2 x3 xt
///                              y1 y2 y3 yt
///                              z1 z2 z3 zt]
///
/// total               88 bytes, little endian
/// ```
///
/// The record's position in the file is its bone id. `name` has its
/// trailing null padding stripped at decode time since it is used as
/// an identifier; encoding pads it back out to 32 bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct BoneRecord {
    pub name: String,
    pub parent: i32,
    pub scale: f32,
    pub matrix: [[f32; 4]; 3],
}

impl BoneRecord {
    /// Head position, taken from the translation column of the matrix
    #[must_use]
    pub fn head(&self) -> glm::Vec3 {
        glm::vec3(self.matrix[0][3], self.matrix[1][3], self.matrix[2][3])
    }

    /// Axis the bone's roll is aligned against
    #[must_use]
    pub fn align_axis(&self) -> glm::Vec3 {
        glm::vec3(self.matrix[0][2], self.matrix[1][2], self.matrix[2][2])
    }
}

/// Policy for the tail of a parent whose children all appear
/// somewhere later than the immediately following record
///
/// Such a parent gets no tail from the chain rule. `LeafOnly` leaves
/// it for the leaf pass, which derives a length from the bone's own
/// scale instead. The other options infer a tail from the heads of
/// the non sequential children.
#[derive(
    Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq,
)]
pub enum TailPolicy {
    #[default]
    LeafOnly,
    FirstChildHead,
    ChildAverage,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct BuildOptions {
    /// Zero the y component of every root bone's head. This matches
    /// an older variant of the importer and is off by default.
    pub zero_root_height: bool,
    pub tail_policy: TailPolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            zero_root_height: false,
            tail_policy: TailPolicy::LeafOnly,
        }
    }
}

/// One step of rig construction, in bone id order
///
/// `tail` is only present for bones that act as the sequential parent
/// of some other bone (or that a tail policy resolved); `length` and
/// `align_to` are only present for leaves, which have no tail and get
/// their extent from `1.0 / scale` aligned against the parent frame.
#[derive(Clone, Debug, PartialEq)]
pub struct BoneDirective {
    pub id: usize,
    pub name: String,
    pub head: glm::Vec3,
    pub parent: Option<usize>,
    pub connected: bool,
    pub tail: Option<glm::Vec3>,
    pub length: Option<f32>,
    pub align_to: Option<usize>,
}

/// Interface to the host rig construction API
///
/// The builder output is applied through this trait so the import
/// logic stays decoupled from any particular scene graph. `commit` is
/// called once after all bones are placed and corresponds to the
/// edit mode to object mode switch in rig tools.
pub trait RigBuilder {
    fn create_bone(&mut self, id: usize, name: &str);
    fn set_head(&mut self, id: usize, head: glm::Vec3);
    fn set_tail(&mut self, id: usize, tail: glm::Vec3);
    fn set_parent(&mut self, id: usize, parent: usize);
    fn set_connected(&mut self, id: usize, connected: bool);
    fn set_length(&mut self, id: usize, length: f32);
    fn align_orientation(&mut self, id: usize, parent: usize);
    fn commit(&mut self);
}
