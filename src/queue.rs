use std::collections::BTreeMap;

use crate::scene::{MeshId, NodeId, Scene};
use crate::transform::MAX_NODE_DEPTH;

/// One primitive to rasterize, identified by its node and its index within
/// the node's mesh.
#[derive(Clone, Copy, Debug)]
pub struct RenderOp {
    pub node: NodeId,
    pub mesh: MeshId,
    pub primitive: usize,
    /// Local-space bounding-box center depth, the sort key within a queue.
    pub center_z: f32,
}

/// Render ops grouped by the material's VRM render-queue value (0 when
/// absent). Iteration order is ascending queue key; within a queue, ops are
/// back to front by `center_z` so the blend over-operator composes in the
/// right order.
pub type RenderQueues = BTreeMap<i32, Vec<RenderOp>>;

pub fn build_queues(scene: &Scene) -> RenderQueues {
    let mut queues = RenderQueues::new();
    for &root in &scene.roots {
        visit(scene, root, &mut queues, 0);
    }
    for ops in queues.values_mut() {
        ops.sort_by(|a, b| a.center_z.total_cmp(&b.center_z));
    }
    queues
}

fn visit(scene: &Scene, id: NodeId, queues: &mut RenderQueues, depth: usize) {
    if depth > MAX_NODE_DEPTH {
        return;
    }
    let node = scene.node(id);
    if let Some(mesh_id) = node.mesh {
        for (i, primitive) in scene.mesh(mesh_id).primitives.iter().enumerate() {
            let key = primitive
                .material
                .and_then(|m| scene.material(m).vrm0.as_ref())
                .and_then(|vrm0| vrm0.render_queue)
                .unwrap_or(0);
            queues.entry(key).or_default().push(RenderOp {
                node: id,
                mesh: mesh_id,
                primitive: i,
                center_z: primitive.center.z,
            });
        }
    }
    for &child in &node.children {
        visit(scene, child, queues, depth + 1);
    }
}
