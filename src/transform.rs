use glam::Mat4;

use crate::scene::{NodeId, Scene, SkinId};

/// Ancestor walks stop here; deeper chains are treated as malformed input.
pub const MAX_NODE_DEPTH: usize = 64;

/// World-space matrices derived from the scene's local transforms.
///
/// Holding these outside the [`Scene`] keeps the graph immutable while
/// rendering: `update` runs once on the caller thread, after which every
/// pass task reads the cache without synchronization.
#[derive(Clone, Debug)]
pub struct TransformCache {
    bind: Vec<Mat4>,
    joints: Vec<Vec<Mat4>>,
}

impl TransformCache {
    /// Computes the world bind matrix for every node reachable from the
    /// roots and the joint matrices for every skin.
    pub fn update(scene: &Scene) -> TransformCache {
        let mut bind = vec![Mat4::IDENTITY; scene.nodes.len()];
        for &root in &scene.roots {
            update_node(scene, root, &mut bind, 0);
        }

        let joints = scene
            .skins
            .iter()
            .map(|skin| {
                skin.joints
                    .iter()
                    .zip(&skin.inverse_bind_matrices)
                    .map(|(&joint, &inverse_bind)| world_matrix(scene, joint) * inverse_bind)
                    .collect()
            })
            .collect();

        TransformCache { bind, joints }
    }

    /// World transform of a node, identity for nodes not reachable from any
    /// root.
    pub fn bind_matrix(&self, node: NodeId) -> Mat4 {
        self.bind[node.0]
    }

    pub fn joint_matrices(&self, skin: SkinId) -> &[Mat4] {
        &self.joints[skin.0]
    }
}

fn update_node(scene: &Scene, id: NodeId, bind: &mut [Mat4], depth: usize) {
    if depth > MAX_NODE_DEPTH {
        return;
    }
    bind[id.0] = world_matrix(scene, id);
    for &child in &scene.node(id).children {
        update_node(scene, child, bind, depth + 1);
    }
}

/// Product of local matrices from the root down to and including `id`,
/// walking parent links with a depth cap of [`MAX_NODE_DEPTH`].
fn world_matrix(scene: &Scene, id: NodeId) -> Mat4 {
    let mut matrix = scene.node(id).matrix;
    let mut parent = scene.node(id).parent;
    let mut depth = 0;
    while let Some(p) = parent {
        depth += 1;
        if depth > MAX_NODE_DEPTH {
            break;
        }
        matrix = scene.node(p).matrix * matrix;
        parent = scene.node(p).parent;
    }
    matrix
}
