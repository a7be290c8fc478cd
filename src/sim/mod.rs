//! Alpha-cooled force layout over the materialized graph.
//!
//! The simulation never owns nodes. Each step borrows a [`LayoutView`],
//! resolves link endpoints to slots once, and writes positions back in place.

mod driver;
mod forces;
mod quadtree;

use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};
use tracing::debug;

use crate::graph::{GraphState, LayoutView, TREE_RELATION, tree_depths};
use crate::options::GraphOptions;
use forces::{
    CollisionParams, ManyBodyParams, Spring, accumulate_collision_pairs, accumulate_many_body,
    apply_springs, apply_y_targets, center_offset,
};
use quadtree::QuadNode;

pub use driver::{RunHandle, SimulationDriver};

const ALPHA_MIN: f32 = 0.001;
const VELOCITY_DECAY: f32 = 0.4;
const LINK_DISTANCE: f32 = 30.0;
const TREE_LINK_BOOST: f32 = 5.0;
const TREE_Y_STRENGTH: f32 = 0.1;
const BARNES_HUT_THETA: f32 = 0.9;
pub const DRAG_ALPHA_TARGET: f32 = 0.3;

/// Drawing area in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn center(self) -> Vec2 {
        vec2(self.width * 0.5, self.height * 0.5)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ForceParams {
    charge_strength: f32,
    charge_max: f32,
    link_strength: f32,
    collision_radius: f32,
    tree_layout: bool,
}

impl From<&GraphOptions> for ForceParams {
    fn from(options: &GraphOptions) -> Self {
        Self {
            charge_strength: options.charge_strength,
            charge_max: options.charge_max,
            link_strength: options.link_strength,
            collision_radius: options.collision_radius,
            tree_layout: options.is_tree_layout,
        }
    }
}

#[derive(Default)]
struct Scratch {
    positions: Vec<Vec2>,
    predicted: Vec<Vec2>,
    velocities: Vec<Vec2>,
    radii: Vec<f32>,
    y_targets: Vec<Option<f32>>,
    springs: Vec<Spring>,
}

pub struct Simulation {
    alpha: f32,
    alpha_target: f32,
    alpha_decay: f32,
    params: ForceParams,
    viewport: Viewport,
    radii: HashMap<String, f32>,
    depths: HashMap<String, usize>,
    max_depth: usize,
    scratch: Scratch,
}

impl Simulation {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            alpha: 1.0,
            alpha_target: 0.0,
            alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / 300.0),
            params: ForceParams::from(&GraphOptions::default()),
            viewport,
            radii: HashMap::new(),
            depths: HashMap::new(),
            max_depth: 0,
            scratch: Scratch::default(),
        }
    }

    /// Rebinds forces to the current options and graph and restarts cooling.
    /// `radii` overrides the collision radius per node id.
    pub fn configure(
        &mut self,
        options: &GraphOptions,
        state: &GraphState,
        radii: HashMap<String, f32>,
    ) {
        self.params = ForceParams::from(options);
        self.radii = radii;
        if self.params.tree_layout {
            self.depths = tree_depths(state.links(), TREE_RELATION);
            self.max_depth = self.depths.values().copied().max().unwrap_or(0);
        } else {
            self.depths.clear();
            self.max_depth = 0;
        }
        self.alpha = 1.0;
        debug!(
            nodes = state.nodes().len(),
            links = state.links().len(),
            tree = self.params.tree_layout,
            max_depth = self.max_depth,
            "configured simulation"
        );
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    pub fn is_active(&self) -> bool {
        self.alpha >= ALPHA_MIN || self.alpha_target > 0.0
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn restart(&mut self) {
        self.alpha = 1.0;
    }

    /// Keeps the layout warm until [`Simulation::cool`] is called.
    pub fn reheat(&mut self, target: f32) {
        self.alpha_target = target;
        self.alpha = self.alpha.max(target);
    }

    pub fn cool(&mut self) {
        self.alpha_target = 0.0;
    }

    pub fn depth_of(&self, id: &str) -> Option<usize> {
        self.depths.get(id).copied()
    }

    /// Height of one depth band in tree mode.
    pub fn band(&self) -> f32 {
        self.viewport.height / (self.max_depth as f32 + 2.0)
    }

    /// Vertical resting place of a node in tree mode. Nodes outside the
    /// is-a hierarchy have none.
    pub fn y_target(&self, id: &str) -> Option<f32> {
        if !self.params.tree_layout {
            return None;
        }
        let depth = self.depth_of(id)?;
        Some(self.band() * (self.max_depth - depth + 1) as f32)
    }

    /// Advances one tick. Returns whether the layout is still moving.
    pub fn step(&mut self, view: &mut LayoutView<'_>) -> bool {
        if !self.is_active() {
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
        let alpha = self.alpha;
        self.load_scratch(view);

        let scratch = &mut self.scratch;
        let node_count = scratch.positions.len();

        apply_springs(
            &scratch.springs,
            LINK_DISTANCE,
            alpha,
            &scratch.positions,
            &mut scratch.velocities,
        );

        if let Some(tree) = QuadNode::build(&scratch.positions) {
            let params = ManyBodyParams {
                strength: -self.params.charge_strength,
                distance_max_sq: self.params.charge_max * self.params.charge_max,
                theta_sq: BARNES_HUT_THETA * BARNES_HUT_THETA,
                alpha,
            };
            for index in 0..node_count {
                let mut velocity = scratch.velocities[index];
                accumulate_many_body(&tree, index, &scratch.positions, params, &mut velocity);
                scratch.velocities[index] = velocity;
            }
        }

        scratch.predicted.clear();
        scratch.predicted.extend(
            scratch
                .positions
                .iter()
                .zip(&scratch.velocities)
                .map(|(position, velocity)| *position + *velocity),
        );
        if let Some(tree) = QuadNode::build(&scratch.predicted) {
            let max_radius = scratch.radii.iter().copied().fold(0.0_f32, f32::max);
            if max_radius > 0.0 {
                accumulate_collision_pairs(
                    &tree,
                    &tree,
                    true,
                    &scratch.predicted,
                    &scratch.radii,
                    CollisionParams {
                        strength: 1.0,
                        max_radius,
                    },
                    &mut scratch.velocities,
                );
            }
        }

        apply_y_targets(
            &scratch.y_targets,
            TREE_Y_STRENGTH,
            alpha,
            &scratch.positions,
            &mut scratch.velocities,
        );

        for (index, node) in view.nodes.iter_mut().enumerate() {
            let velocity = scratch.velocities[index] * (1.0 - VELOCITY_DECAY);
            node.vx = velocity.x;
            node.vy = velocity.y;
            match node.fx {
                Some(fx) => {
                    node.x = fx;
                    node.vx = 0.0;
                }
                None => node.x += node.vx,
            }
            match node.fy {
                Some(fy) => {
                    node.y = fy;
                    node.vy = 0.0;
                }
                None => node.y += node.vy,
            }
        }

        scratch.positions.clear();
        scratch
            .positions
            .extend(view.nodes.iter().map(|node| node.position()));
        let offset = center_offset(&scratch.positions, self.viewport.center());
        if offset.length_sq() > 0.0 {
            for node in view.nodes.iter_mut().filter(|node| !node.is_pinned()) {
                node.x += offset.x;
                node.y += offset.y;
            }
        }

        self.nudge_hierarchy(view, alpha);
        self.is_active()
    }

    /// Pins a node under the pointer and keeps the layout warm.
    pub fn drag_start(&mut self, view: &mut LayoutView<'_>, id: &str) -> bool {
        let Some(index) = view.node_index(id) else {
            return false;
        };
        let node = &mut view.nodes[index];
        node.fx = Some(node.x);
        node.fy = Some(node.y);
        self.reheat(DRAG_ALPHA_TARGET);
        true
    }

    pub fn drag_to(&mut self, view: &mut LayoutView<'_>, id: &str, position: Vec2) -> bool {
        let Some(index) = view.node_index(id) else {
            return false;
        };
        let node = &mut view.nodes[index];
        node.x = position.x;
        node.y = position.y;
        node.fx = Some(position.x);
        node.fy = Some(position.y);
        true
    }

    pub fn drag_end(&mut self, view: &mut LayoutView<'_>, id: &str) -> bool {
        self.cool();
        let Some(index) = view.node_index(id) else {
            return false;
        };
        let node = &mut view.nodes[index];
        node.fx = None;
        node.fy = None;
        true
    }

    fn load_scratch(&mut self, view: &LayoutView<'_>) {
        let tree_layout = self.params.tree_layout;
        let band = self.band();
        let max_depth = self.max_depth;
        let scratch = &mut self.scratch;
        scratch.positions.clear();
        scratch.velocities.clear();
        scratch.radii.clear();
        scratch.y_targets.clear();
        scratch.springs.clear();

        for node in view.nodes.iter() {
            scratch.positions.push(node.position());
            scratch.velocities.push(vec2(node.vx, node.vy));
            scratch.radii.push(
                self.radii
                    .get(&node.id)
                    .copied()
                    .unwrap_or(self.params.collision_radius),
            );
        }

        for node in view.nodes.iter() {
            let target = self
                .depths
                .get(&node.id)
                .filter(|_| tree_layout)
                .map(|depth| band * (max_depth - depth + 1) as f32);
            scratch.y_targets.push(target);
        }

        for link in view.links {
            let (Some(source), Some(target)) =
                (view.node_index(&link.source), view.node_index(&link.target))
            else {
                continue;
            };
            let mut strength = self.params.link_strength;
            if tree_layout && link.class() != Some(TREE_RELATION) {
                strength *= TREE_LINK_BOOST;
            }
            scratch.springs.push(Spring {
                source,
                target,
                strength,
            });
        }
    }

    /// Nudges is-a links apart vertically so hierarchies settle upright.
    fn nudge_hierarchy(&self, view: &mut LayoutView<'_>, alpha: f32) {
        for link in view.links {
            if link.class() != Some(TREE_RELATION) {
                continue;
            }
            if let Some(source) = view.node_index(&link.source)
                && !view.nodes[source].is_pinned()
            {
                view.nodes[source].y += alpha;
            }
            if let Some(target) = view.node_index(&link.target)
                && !view.nodes[target].is_pinned()
            {
                view.nodes[target].y -= alpha;
            }
        }
    }
}
