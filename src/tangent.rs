use glam::{Vec2, Vec3, Vec4};

/// Synthesizes per-vertex tangents from positions, normals and UVs.
///
/// Accumulates the UV-gradient tangent and bitangent of every triangle onto
/// its vertices, then Gram-Schmidt-orthogonalizes against the vertex normal.
/// The `w` component records the bitangent handedness the normal-map TBN
/// reconstruction expects. Triangles with degenerate UVs contribute nothing.
pub fn generate_tangents(
    positions: &[Vec3],
    normals: &[Vec3],
    uvs: &[Vec2],
    indices: &[u32],
) -> Vec<Vec4> {
    let mut tangents = vec![Vec3::ZERO; positions.len()];
    let mut bitangents = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);

        let edge1 = positions[i1] - positions[i0];
        let edge2 = positions[i2] - positions[i0];
        let delta1 = uvs[i1] - uvs[i0];
        let delta2 = uvs[i2] - uvs[i0];

        let det = delta1.x * delta2.y - delta2.x * delta1.y;
        if det.abs() < 1e-8 {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (edge1 * delta2.y - edge2 * delta1.y) * r;
        let bitangent = (edge2 * delta1.x - edge1 * delta2.x) * r;

        for &i in &[i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    (0..positions.len())
        .map(|i| {
            let n = normals[i];
            let t = (tangents[i] - n * n.dot(tangents[i])).normalize_or_zero();
            let handedness = if n.cross(t).dot(bitangents[i]) < 0.0 {
                -1.0
            } else {
                1.0
            };
            t.extend(handedness)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_tangents_follow_the_u_axis() {
        // XY quad with a straight UV layout: tangents must point along +X.
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let normals = vec![Vec3::Z; 4];
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let indices = vec![0, 1, 2, 0, 2, 3];

        let tangents = generate_tangents(&positions, &normals, &uvs, &indices);
        for t in tangents {
            assert!((t.truncate() - Vec3::X).length() < 1e-5);
            assert_eq!(t.w, 1.0);
        }
    }

    #[test]
    fn degenerate_uvs_produce_zero_tangents() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = vec![Vec3::Z; 3];
        let uvs = vec![Vec2::ZERO; 3];
        let indices = vec![0, 1, 2];

        let tangents = generate_tangents(&positions, &normals, &uvs, &indices);
        for t in tangents {
            assert_eq!(t.truncate(), Vec3::ZERO);
        }
    }
}
