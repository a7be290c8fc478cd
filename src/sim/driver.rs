use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use super::{Simulation, Viewport};
use crate::graph::LayoutView;

/// Scoped attachment of the tick and resize listeners.
///
/// Dropping the handle does not detach; call [`RunHandle::dispose`].
#[derive(Clone, Debug)]
pub struct RunHandle {
    attached: Rc<Cell<bool>>,
    generation: u64,
}

impl RunHandle {
    /// Detaches the listeners. Returns `false` when they were already gone.
    pub fn dispose(&self) -> bool {
        let was_attached = self.attached.replace(false);
        if was_attached {
            debug!(generation = self.generation, "simulation run disposed");
        }
        was_attached
    }

    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ListenerKind {
    Tick,
    Resize,
}

/// One registered callback, live while its run is attached.
#[derive(Debug)]
struct Listener {
    kind: ListenerKind,
    run: Rc<Cell<bool>>,
}

impl Listener {
    fn is_live(&self) -> bool {
        self.run.get()
    }
}

/// Drives a [`Simulation`] from frame ticks and viewport changes. Ticks
/// only advance the layout while a run's tick listener is attached.
pub struct SimulationDriver {
    simulation: Simulation,
    current: Option<RunHandle>,
    listeners: Vec<Listener>,
    generation: u64,
}

impl SimulationDriver {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            simulation,
            current: None,
            listeners: Vec::new(),
            generation: 0,
        }
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.simulation
    }

    /// Attaches a fresh run, tearing down any previous one first.
    pub fn start(&mut self) -> RunHandle {
        self.stop();
        self.generation += 1;
        let attached = Rc::new(Cell::new(true));
        for kind in [ListenerKind::Tick, ListenerKind::Resize] {
            self.listeners.push(Listener {
                kind,
                run: Rc::clone(&attached),
            });
        }
        let handle = RunHandle {
            attached,
            generation: self.generation,
        };
        self.simulation.restart();
        self.current = Some(handle.clone());
        debug!(generation = self.generation, "simulation run started");
        handle
    }

    pub fn stop(&mut self) {
        if let Some(current) = self.current.take() {
            current.dispose();
        }
        self.listeners.retain(Listener::is_live);
    }

    pub fn is_running(&self) -> bool {
        self.has_listener(ListenerKind::Tick)
    }

    /// Registered listeners whose run is still attached.
    pub fn listener_count(&self) -> usize {
        self.listeners.iter().filter(|listener| listener.is_live()).count()
    }

    fn has_listener(&self, kind: ListenerKind) -> bool {
        self.listeners
            .iter()
            .any(|listener| listener.kind == kind && listener.is_live())
    }

    /// One frame. A no-op without an attached run.
    pub fn tick(&mut self, view: &mut LayoutView<'_>) -> bool {
        if !self.is_running() {
            return false;
        }
        self.simulation.step(view)
    }

    /// Applies a new viewport whether or not a run is attached; a live run
    /// is restarted. Returns whether the viewport changed.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        if self.simulation.viewport() == viewport {
            return false;
        }
        self.simulation.set_viewport(viewport);
        if self.has_listener(ListenerKind::Resize) {
            self.simulation.restart();
        }
        debug!(width = viewport.width, height = viewport.height, "viewport resized");
        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use eframe::egui::vec2;
    use serde_json::json;

    use super::*;
    use crate::graph::{GraphDelta, GraphNode, GraphState};
    use crate::options::GraphOptions;

    fn state() -> GraphState {
        let mut state = GraphState::new();
        let nodes = ["a", "b"]
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let data = json!({"@rid": id}).as_object().cloned().unwrap_or_default();
                GraphNode::new(data, vec2(index as f32 * 20.0, 0.0)).unwrap()
            })
            .collect();
        state.merge(GraphDelta {
            nodes,
            ..GraphDelta::default()
        });
        state
    }

    fn driver(state: &GraphState) -> SimulationDriver {
        let mut simulation = Simulation::new(Viewport::default());
        simulation.configure(&GraphOptions::default(), state, HashMap::new());
        SimulationDriver::new(simulation)
    }

    #[test]
    fn ticks_only_run_while_attached() {
        let mut state = state();
        let mut driver = driver(&state);
        assert!(!driver.tick(&mut state.layout_view()));

        let handle = driver.start();
        assert!(driver.tick(&mut state.layout_view()));
        assert_eq!(driver.listener_count(), 2);

        assert!(handle.dispose());
        assert!(!handle.dispose());
        assert_eq!(driver.listener_count(), 0);
        let before = state.nodes()[0].position();
        assert!(!driver.tick(&mut state.layout_view()));
        assert_eq!(state.nodes()[0].position(), before);
    }

    #[test]
    fn restarting_replaces_the_previous_run() {
        let state = state();
        let mut driver = driver(&state);
        let first = driver.start();
        let second = driver.start();

        assert!(!first.is_attached());
        assert!(second.is_attached());
        assert_eq!(driver.listener_count(), 2);
        assert!(second.generation() > first.generation());

        // Disposing a stale handle leaves the live run alone.
        assert!(!first.dispose());
        assert!(driver.is_running());
    }

    #[test]
    fn resize_is_idempotent() {
        let state = state();
        let mut driver = driver(&state);
        driver.start();
        assert!(driver.resize(Viewport::new(300.0, 200.0)));
        assert!(!driver.resize(Viewport::new(300.0, 200.0)));
        assert_eq!(driver.simulation().viewport(), Viewport::new(300.0, 200.0));
        assert_eq!(driver.listener_count(), 2);
    }

    #[test]
    fn resize_applies_without_a_run() {
        let state = state();
        let mut driver = driver(&state);
        driver.simulation_mut().cool();
        let alpha = driver.simulation().alpha();

        assert!(driver.resize(Viewport::new(300.0, 200.0)));
        assert_eq!(driver.simulation().viewport(), Viewport::new(300.0, 200.0));
        assert_eq!(driver.simulation().alpha(), alpha);
        assert_eq!(driver.listener_count(), 0);
    }

    #[test]
    fn disposed_runs_stop_counting_as_listeners() {
        let state = state();
        let mut driver = driver(&state);
        let first = driver.start();
        assert_eq!(driver.listener_count(), 2);
        first.dispose();
        assert_eq!(driver.listener_count(), 0);
        assert!(!driver.is_running());

        driver.start();
        driver.start();
        assert_eq!(driver.listener_count(), 2);
    }
}
