//! Velocity-based forces. Each function adds to `velocities` and leaves
//! positions alone; integration happens once per step in [`super::Simulation`].

use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;

const MIN_DISTANCE_SQ: f32 = 1.0;

/// Deterministic unit vector for coincident points.
fn jiggle(from: usize, to: usize) -> Vec2 {
    let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin()) * 1e-3
}

#[derive(Clone, Copy, Debug)]
pub(super) struct ManyBodyParams {
    /// Negative values repel.
    pub(super) strength: f32,
    pub(super) distance_max_sq: f32,
    pub(super) theta_sq: f32,
    pub(super) alpha: f32,
}

pub(super) fn accumulate_many_body(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    params: ManyBodyParams,
    velocity: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if !node.is_leaf() {
        let delta = node.center_of_mass - point;
        let distance_sq = delta.length_sq();
        let side = node.bounds.side_length();

        if !node.bounds.contains(point) && side * side / params.theta_sq < distance_sq {
            if distance_sq < params.distance_max_sq {
                let distance_sq = soften(distance_sq);
                *velocity += delta * (params.strength * node.mass * params.alpha / distance_sq);
            }
            return;
        }

        for child in node.children.iter().flatten() {
            accumulate_many_body(child, index, positions, params, velocity);
        }
        return;
    }

    for &other in &node.indices {
        if other == index {
            continue;
        }
        let mut delta = positions[other] - point;
        if delta == Vec2::ZERO {
            delta = jiggle(index, other);
        }
        let distance_sq = delta.length_sq();
        if distance_sq >= params.distance_max_sq {
            continue;
        }
        *velocity += delta * (params.strength * params.alpha / soften(distance_sq));
    }
}

fn soften(distance_sq: f32) -> f32 {
    if distance_sq < MIN_DISTANCE_SQ {
        (MIN_DISTANCE_SQ * distance_sq).sqrt().max(f32::EPSILON)
    } else {
        distance_sq
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct CollisionParams {
    pub(super) strength: f32,
    pub(super) max_radius: f32,
}

/// Resolves overlaps between circles. `positions` should already include
/// the pending velocity so overlaps are judged where the nodes are heading.
pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    velocities: &mut [Vec2],
) {
    let reach = params.max_radius * 2.0;
    if node_a.bounds.distance_sq_to(node_b.bounds) > reach * reach {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    separate(from, to, positions, radii, params.strength, velocities);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    separate(from, to, positions, radii, params.strength, velocities);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_collision_pairs(child_a, child_a, true, positions, radii, params, velocities);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_collision_pairs(
                    child_a, child_b, false, positions, radii, params, velocities,
                );
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_collision_pairs(child, node_b, false, positions, radii, params, velocities);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_collision_pairs(node_a, child, false, positions, radii, params, velocities);
        }
    }
}

fn separate(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    strength: f32,
    velocities: &mut [Vec2],
) {
    let min_distance = radii[from] + radii[to];
    let mut delta = positions[from] - positions[to];
    if delta == Vec2::ZERO {
        delta = jiggle(from, to);
    }
    let distance_sq = delta.length_sq();
    if distance_sq >= min_distance * min_distance {
        return;
    }

    let distance = distance_sq.sqrt();
    let push = delta * ((min_distance - distance) / distance * strength);
    // The smaller circle gives way more.
    let from_sq = radii[from] * radii[from];
    let to_sq = radii[to] * radii[to];
    let share = if from_sq + to_sq > 0.0 {
        to_sq / (from_sq + to_sq)
    } else {
        0.5
    };
    velocities[from] += push * share;
    velocities[to] -= push * (1.0 - share);
}

/// Resolved link for one step: endpoint indices and per-link strength.
#[derive(Clone, Copy, Debug)]
pub(super) struct Spring {
    pub(super) source: usize,
    pub(super) target: usize,
    pub(super) strength: f32,
}

/// Pulls linked nodes toward `distance`. The endpoint with more links
/// moves less.
pub(super) fn apply_springs(
    springs: &[Spring],
    distance: f32,
    alpha: f32,
    positions: &[Vec2],
    velocities: &mut [Vec2],
) {
    let mut degree = vec![0usize; positions.len()];
    for spring in springs {
        degree[spring.source] += 1;
        degree[spring.target] += 1;
    }

    for spring in springs {
        if spring.source == spring.target {
            continue;
        }
        let (source, target) = (spring.source, spring.target);
        let mut delta =
            (positions[target] + velocities[target]) - (positions[source] + velocities[source]);
        if delta == Vec2::ZERO {
            delta = jiggle(source, target);
        }
        let length = delta.length();
        let delta = delta * ((length - distance) / length * alpha * spring.strength);

        let bias = degree[source] as f32 / (degree[source] + degree[target]) as f32;
        velocities[target] -= delta * bias;
        velocities[source] += delta * (1.0 - bias);
    }
}

/// Pulls each node with a target toward it on the y axis.
pub(super) fn apply_y_targets(
    targets: &[Option<f32>],
    strength: f32,
    alpha: f32,
    positions: &[Vec2],
    velocities: &mut [Vec2],
) {
    for ((target, position), velocity) in targets.iter().zip(positions).zip(velocities) {
        if let Some(target) = target {
            velocity.y += (target - position.y) * strength * alpha;
        }
    }
}

/// Translates the whole layout so its mean sits on `center`.
pub(super) fn center_offset(positions: &[Vec2], center: Vec2) -> Vec2 {
    if positions.is_empty() {
        return Vec2::ZERO;
    }
    let mut mean = Vec2::ZERO;
    for position in positions {
        mean += *position;
    }
    center - mean / positions.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn many_body_pushes_points_apart() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let tree = QuadNode::build(&positions).unwrap();
        let params = ManyBodyParams {
            strength: -100.0,
            distance_max_sq: 500.0 * 500.0,
            theta_sq: 0.81,
            alpha: 1.0,
        };

        let mut first = Vec2::ZERO;
        accumulate_many_body(&tree, 0, &positions, params, &mut first);
        assert!(first.x < 0.0);

        let far = vec![vec2(0.0, 0.0), vec2(1000.0, 0.0)];
        let tree = QuadNode::build(&far).unwrap();
        let mut untouched = Vec2::ZERO;
        accumulate_many_body(&tree, 0, &far, params, &mut untouched);
        assert_eq!(untouched, Vec2::ZERO);
    }

    #[test]
    fn overlapping_circles_separate() {
        let positions = vec![vec2(0.0, 0.0), vec2(2.0, 0.0), vec2(100.0, 100.0)];
        let radii = vec![4.0; 3];
        let tree = QuadNode::build(&positions).unwrap();
        let mut velocities = vec![Vec2::ZERO; 3];
        accumulate_collision_pairs(
            &tree,
            &tree,
            true,
            &positions,
            &radii,
            CollisionParams {
                strength: 1.0,
                max_radius: 4.0,
            },
            &mut velocities,
        );

        assert!(velocities[0].x < 0.0);
        assert!(velocities[1].x > 0.0);
        assert_eq!(velocities[2], Vec2::ZERO);
    }

    #[test]
    fn springs_pull_toward_rest_length() {
        let positions = vec![vec2(0.0, 0.0), vec2(100.0, 0.0)];
        let mut velocities = vec![Vec2::ZERO; 2];
        let springs = [Spring {
            source: 0,
            target: 1,
            strength: 0.5,
        }];
        apply_springs(&springs, 30.0, 1.0, &positions, &mut velocities);
        assert!(velocities[0].x > 0.0);
        assert!(velocities[1].x < 0.0);
    }

    #[test]
    fn nodes_without_a_target_feel_no_y_force() {
        let positions = vec![vec2(0.0, 0.0), vec2(0.0, 0.0)];
        let mut velocities = vec![Vec2::ZERO; 2];
        apply_y_targets(&[Some(50.0), None], 0.1, 1.0, &positions, &mut velocities);
        assert!(velocities[0].y > 0.0);
        assert_eq!(velocities[1], Vec2::ZERO);
    }
}
