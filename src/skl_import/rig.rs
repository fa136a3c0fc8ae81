use super::types::{
    BoneDirective, BoneRecord, BuildOptions, RigBuilder, TailPolicy,
};
use crate::skl_error::SklError;
use ahash::{HashMap, HashMapExt};
use log::debug;
use nalgebra_glm as glm;
use smallvec::SmallVec;

// Heads of the non sequential children of one parent. Real rigs
// rarely hang more than a few disjoint children off one bone.
type StrayHeads = SmallVec<[glm::Vec3; 4]>;

/// Transforms a decoded bone record list into the ordered directive
/// sequence a rig construction API applies
///
/// Bone tails are never stored in the file. A bone that immediately
/// follows its parent in file order is a connected chain link and
/// donates its head as the parent's tail. A bone that ends up with no
/// tail at all is a leaf and gets a length of `1.0 / scale` instead,
/// with its orientation aligned against the parent's frame. What to
/// do with a parent whose children are all non sequential is
/// controlled by `options.tail_policy`.
///
/// This is a pure function: the same input always produces the same
/// directive sequence.
///
/// # Errors
/// May return `SklError` for a duplicate bone name, a parent
/// reference that is out of range or does not precede its child, or
/// a leaf bone with a scale of zero
#[allow(clippy::float_cmp)]
pub fn build(
    records: &[BoneRecord],
    options: &BuildOptions,
) -> Result<Vec<BoneDirective>, SklError> {
    // Checks name uniqueness eagerly even though the map itself is
    // not needed for parent resolution, which goes by index
    let _ = name_index(records)?;

    let mut directives: Vec<BoneDirective> = Vec::new();
    let mut stray_heads = HashMap::<usize, StrayHeads>::new();

    for (id, record) in records.iter().enumerate() {
        let mut head = record.head();
        let parent = resolve_parent(id, record.parent)?;

        let mut connected = false;
        if let Some(p) = parent {
            if p + 1 == id {
                // Bone chains run sequentially, so the parent's tail
                // is this bone's head and the two are connected
                directives[p].tail = Some(head);
                connected = true;
            } else {
                stray_heads.entry(p).or_default().push(head);
            }
        } else if options.zero_root_height {
            head.y = 0.0;
        }

        directives.push(BoneDirective {
            id,
            name: record.name.clone(),
            head,
            parent,
            connected,
            tail: None,
            length: None,
            align_to: None,
        });
    }

    apply_tail_policy(&mut directives, &stray_heads, options.tail_policy);

    // Catch bones with no children setting their tail: derive a
    // length from the bone's own scale instead
    for (id, directive) in directives.iter_mut().enumerate() {
        if directive.tail.is_some() {
            continue;
        }
        let scale = records[id].scale;
        if scale == 0.0 {
            return Err(SklError::DegenerateBone(id));
        }
        directive.length = Some(1.0 / scale);
        directive.align_to = directive.parent;
    }

    debug!("directives={directives:?}");
    Ok(directives)
}

/// Builds the name to bone id lookup for consumers that resolve
/// bones by their stripped names
///
/// # Errors
/// May return `SklError` since bone names are identifiers and must
/// be unique once the null padding is removed
pub fn name_index(
    records: &[BoneRecord],
) -> Result<HashMap<String, usize>, SklError> {
    let mut by_name = HashMap::with_capacity(records.len());
    for (id, record) in records.iter().enumerate() {
        if by_name.insert(record.name.clone(), id).is_some() {
            return Err(SklError::DuplicateName(record.name.clone()));
        }
    }
    Ok(by_name)
}

// A parent must precede its child in file order. Forward references
// are rejected along with anything outside [-1, len).
fn resolve_parent(id: usize, parent: i32) -> Result<Option<usize>, SklError> {
    if parent == -1 {
        return Ok(None);
    }
    let err = SklError::InvalidParentReference { bone: id, parent };
    let p = usize::try_from(parent).map_err(|_| err)?;
    if p >= id {
        return Err(SklError::InvalidParentReference { bone: id, parent });
    }
    Ok(Some(p))
}

// Resolves tails for parents whose children are all non sequential.
// Only parents that got no tail from the chain rule are touched.
fn apply_tail_policy(
    directives: &mut [BoneDirective],
    stray_heads: &HashMap<usize, StrayHeads>,
    policy: TailPolicy,
) {
    for (p, heads) in stray_heads {
        let directive = &mut directives[*p];
        if directive.tail.is_some() {
            continue;
        }
        if let Some(tail) = infer_tail(policy, heads) {
            directive.tail = Some(tail);
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn infer_tail(policy: TailPolicy, heads: &StrayHeads) -> Option<glm::Vec3> {
    match policy {
        TailPolicy::LeafOnly => None,
        TailPolicy::FirstChildHead => heads.first().copied(),
        TailPolicy::ChildAverage => {
            let mut sum = glm::Vec3::zeros();
            for head in heads {
                sum += *head;
            }
            Some(sum / heads.len() as f32)
        }
    }
}

/// Feeds a directive sequence to a rig construction API
///
/// All bones are created with their heads first so that parent
/// lookups always succeed, then parenting and tails are applied, then
/// leaf lengths and alignment, then a single commit.
pub fn apply<R: RigBuilder>(directives: &[BoneDirective], rig: &mut R) {
    for d in directives {
        rig.create_bone(d.id, &d.name);
        rig.set_head(d.id, d.head);
    }
    for d in directives {
        if let Some(parent) = d.parent {
            rig.set_parent(d.id, parent);
            rig.set_connected(d.id, d.connected);
        }
        if let Some(tail) = d.tail {
            rig.set_tail(d.id, tail);
        }
    }
    for d in directives {
        if let Some(length) = d.length {
            rig.set_length(d.id, length);
        }
        if let Some(align_to) = d.align_to {
            rig.align_orientation(d.id, align_to);
        }
    }
    rig.commit();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, parent: i32, scale: f32) -> BoneRecord {
        BoneRecord {
            name: name.to_string(),
            parent,
            scale,
            matrix: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
        }
    }

    fn record_at(
        name: &str,
        parent: i32,
        scale: f32,
        head: [f32; 3],
    ) -> BoneRecord {
        let mut r = record(name, parent, scale);
        r.matrix[0][3] = head[0];
        r.matrix[1][3] = head[1];
        r.matrix[2][3] = head[2];
        r
    }

    #[test]
    fn root_bone() {
        let records = vec![record("root", -1, 1.0)];
        let directives =
            build(&records, &BuildOptions::default()).unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].parent, None);
        assert!(!directives[0].connected);
        // A single root is also a leaf
        assert_eq!(directives[0].length, Some(1.0));
        assert_eq!(directives[0].align_to, None);
    }

    #[test]
    fn sequential_chain() {
        let records = vec![
            record_at("a", -1, 1.0, [0.0, 0.0, 0.0]),
            record_at("b", 0, 2.0, [0.0, 1.0, 0.0]),
        ];
        let directives =
            build(&records, &BuildOptions::default()).unwrap();
        // The chain rule sets the parent's tail so it is excluded
        // from the leaf pass
        assert_eq!(directives[0].tail, Some(glm::vec3(0.0, 1.0, 0.0)));
        assert_eq!(directives[0].length, None);
        assert!(directives[1].connected);
        assert_eq!(directives[1].length, Some(0.5));
        assert_eq!(directives[1].align_to, Some(0));
    }

    #[test]
    fn forward_parent_rejected() {
        let records = vec![record("a", 1, 1.0), record("b", -1, 1.0)];
        let result = build(&records, &BuildOptions::default());
        assert!(matches!(
            result,
            Err(SklError::InvalidParentReference { bone: 0, parent: 1 })
        ));
    }

    #[test]
    fn out_of_range_parent_rejected() {
        let records = vec![record("a", -1, 1.0), record("b", -2, 1.0)];
        let result = build(&records, &BuildOptions::default());
        assert!(matches!(
            result,
            Err(SklError::InvalidParentReference { bone: 1, parent: -2 })
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let records = vec![record("a", -1, 1.0), record("a", 0, 1.0)];
        let result = build(&records, &BuildOptions::default());
        assert!(matches!(result, Err(SklError::DuplicateName(_))));
    }

    #[test]
    fn name_index_lookup() {
        let records = vec![record("a", -1, 1.0), record("b", 0, 1.0)];
        let map = name_index(&records).unwrap();
        assert_eq!(map.get("a"), Some(&0));
        assert_eq!(map.get("b"), Some(&1));
    }

    #[test]
    fn degenerate_leaf_rejected() {
        let records = vec![
            record("a", -1, 1.0),
            record("b", 0, 0.0), // Leaf with zero scale
        ];
        let result = build(&records, &BuildOptions::default());
        assert!(matches!(result, Err(SklError::DegenerateBone(1))));
    }

    #[test]
    fn zero_scale_non_leaf_allowed() {
        // The chain rule gives bone 0 a tail, so its zero scale is
        // never consulted
        let records = vec![
            record_at("a", -1, 0.0, [0.0, 0.0, 0.0]),
            record_at("b", 0, 1.0, [0.0, 1.0, 0.0]),
        ];
        let directives =
            build(&records, &BuildOptions::default()).unwrap();
        assert_eq!(directives[0].tail, Some(glm::vec3(0.0, 1.0, 0.0)));
    }

    #[test]
    fn zero_root_height() {
        let records = vec![record_at("a", -1, 1.0, [1.0, 5.0, 2.0])];
        let options = BuildOptions {
            zero_root_height: true,
            ..BuildOptions::default()
        };
        let directives = build(&records, &options).unwrap();
        assert_eq!(directives[0].head, glm::vec3(1.0, 0.0, 2.0));
    }

    #[test]
    fn tail_policy_first_child_head() {
        // Bone 2 is a non sequential child of bone 0
        let records = vec![
            record_at("a", -1, 1.0, [0.0, 0.0, 0.0]),
            record_at("b", -1, 1.0, [9.0, 0.0, 0.0]),
            record_at("c", 0, 1.0, [0.0, 2.0, 0.0]),
        ];
        let options = BuildOptions {
            tail_policy: TailPolicy::FirstChildHead,
            ..BuildOptions::default()
        };
        let directives = build(&records, &options).unwrap();
        assert_eq!(directives[0].tail, Some(glm::vec3(0.0, 2.0, 0.0)));
        assert_eq!(directives[0].length, None);
        assert!(!directives[2].connected);
    }

    #[test]
    fn tail_policy_child_average() {
        let records = vec![
            record_at("a", -1, 1.0, [0.0, 0.0, 0.0]),
            record_at("b", -1, 1.0, [9.0, 0.0, 0.0]),
            record_at("c", 0, 1.0, [0.0, 2.0, 0.0]),
            record_at("d", 0, 1.0, [4.0, 0.0, 0.0]),
        ];
        let options = BuildOptions {
            tail_policy: TailPolicy::ChildAverage,
            ..BuildOptions::default()
        };
        let directives = build(&records, &options).unwrap();
        assert_eq!(directives[0].tail, Some(glm::vec3(2.0, 1.0, 0.0)));
    }

    #[test]
    fn tail_policy_leaf_only_leaves_parent_alone() {
        let records = vec![
            record_at("a", -1, 2.0, [0.0, 0.0, 0.0]),
            record_at("b", -1, 1.0, [9.0, 0.0, 0.0]),
            record_at("c", 0, 1.0, [0.0, 2.0, 0.0]),
        ];
        let directives =
            build(&records, &BuildOptions::default()).unwrap();
        // No tail from the disjoint child, so the leaf pass applies
        assert_eq!(directives[0].tail, None);
        assert_eq!(directives[0].length, Some(0.5));
    }

    #[test]
    fn build_is_idempotent() {
        let records = vec![
            record_at("a", -1, 1.0, [0.0, 0.0, 0.0]),
            record_at("b", 0, 2.0, [0.0, 1.0, 0.0]),
            record_at("c", 0, 4.0, [1.0, 1.0, 0.0]),
        ];
        let options = BuildOptions::default();
        let first = build(&records, &options).unwrap();
        let second = build(&records, &options).unwrap();
        assert_eq!(first, second);
    }
}
