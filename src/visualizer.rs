use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::process::Command;

use crate::fa::{format_labels, Label, FA};
use color_eyre::eyre::{Report, Result};
use eframe::{run_native, App, CreationContext, NativeOptions};
use egui::Color32;
use egui_graphs::{
    DefaultGraphView, Graph, SettingsInteraction, SettingsNavigation, SettingsStyle,
};
use log::{info, warn};
use petgraph::dot::Dot;
use petgraph::{graph::NodeIndex, prelude::StableGraph};

#[derive(Debug)]
pub enum ExportError {
    FileWriteError(String),
    WindowError(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::FileWriteError(err_line) => write!(f, "{}", err_line),
            ExportError::WindowError(err_line) => {
                write!(f, "Error: Failed to open the visualizer window: {}", err_line)
            }
        }
    }
}

impl std::error::Error for ExportError {}

struct Visualizer {
    graph: Graph,
}

impl Visualizer {
    fn new(_: &CreationContext<'_>, graph: Graph) -> Self {
        Visualizer { graph }
    }
}

impl App for Visualizer {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let navigation_settings = &SettingsNavigation::new()
                .with_zoom_and_pan_enabled(true)
                .with_fit_to_screen_enabled(true);
            let interactive_settings = &SettingsInteraction::new()
                .with_dragging_enabled(true)
                .with_node_clicking_enabled(true)
                .with_node_selection_enabled(true)
                .with_node_selection_multi_enabled(true)
                .with_edge_clicking_enabled(true)
                .with_edge_selection_enabled(true)
                .with_edge_selection_multi_enabled(true);
            let style_settings = &SettingsStyle::default().with_labels_always(true);
            ui.add(
                &mut DefaultGraphView::new(&mut self.graph)
                    .with_styles(style_settings)
                    .with_interactions(interactive_settings)
                    .with_navigations(navigation_settings),
            );
        });
    }
}

fn state_label<T: FA>(fa: &T, state_id: usize) -> String {
    let mut label = if state_id == fa.get_start_state() {
        format!("Start\nState {}", state_id)
    } else {
        format!("State {}", state_id)
    };

    if let Some(rule) = fa.get_accept_rule(state_id) {
        label.push_str(&format!("\nAccept rule {}", rule));
    }
    label
}

/// Build a graph with one node per state and one edge per (source, target) pair, the edge
/// labelled with every character leading from source to target.
fn generate_stable_graph<T: FA>(fa: &T) -> StableGraph<String, String> {
    let mut stable_graph = StableGraph::new();

    let num_states = fa.get_num_states();

    for state_idx in 0..num_states {
        stable_graph.add_node(state_label(fa, state_idx));
    }

    for state_idx in 0..num_states {
        let mut edge_map: BTreeMap<usize, Vec<Label>> = BTreeMap::new();

        for (label, target) in fa.get_state_transitions(state_idx) {
            edge_map.entry(target).or_default().push(label);
        }

        for (target, labels) in edge_map {
            stable_graph.add_edge(
                NodeIndex::new(state_idx),
                NodeIndex::new(target),
                format_labels(&labels),
            );
        }
    }

    stable_graph
}

/// Render the automaton in Graphviz DOT format.
pub fn to_dot<T: FA>(fa: &T) -> String {
    let stable_graph = generate_stable_graph(fa);
    Dot::new(&stable_graph).to_string()
}

/// Save the automaton as `<filename>.dot` and, when Graphviz is installed, as `<filename>.jpg`.
pub fn save_fa<T: FA>(fa: &T, filename: &str) -> Result<()> {
    let dot_filename = format!("{}.dot", filename);

    let mut dot_file = File::create(&dot_filename).map_err(|error| {
        Report::new(ExportError::FileWriteError(format!(
            "Error: Failed to create {}: {}",
            dot_filename, error
        )))
    })?;

    dot_file.write_all(to_dot(fa).as_bytes()).map_err(|error| {
        Report::new(ExportError::FileWriteError(format!(
            "Error: Failed to write {}: {}",
            dot_filename, error
        )))
    })?;

    let jpg_filename = format!("{}.jpg", filename);
    let output = Command::new("dot")
        .args(["-Tjpg", &dot_filename, "-o", &jpg_filename])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            info!("Automaton visualization saved as {}", jpg_filename)
        }
        Ok(output) => warn!(
            "Graphviz failed to render {}: {}",
            dot_filename,
            String::from_utf8_lossy(&output.stderr)
        ),
        Err(error) => warn!(
            "Graphviz is not available ({}), only {} was written",
            error, dot_filename
        ),
    }

    Ok(())
}

/// Visualizes the finite automata provided
pub fn visualize<T: FA>(fa: &T) -> Result<()> {
    let stable_graph = generate_stable_graph(fa);

    // The window draws unit payloads, labels are attached to the nodes and edges afterwards
    let mut graph = Graph::from(&stable_graph.map(|_, _| (), |_, _| ()));

    let start_node_color = Color32::from_rgb(20, 67, 130);
    let accept_node_color = Color32::from_rgb(20, 130, 90);

    for node_idx in stable_graph.node_indices() {
        let label = stable_graph[node_idx].clone();
        if let Some(node) = graph.node_mut(node_idx) {
            node.set_label(label);
        }
    }

    for edge_idx in stable_graph.edge_indices() {
        let label = stable_graph[edge_idx].clone();
        if let Some(edge) = graph.edge_mut(edge_idx) {
            edge.set_label(label);
        }
    }

    if let Some(start_node) = graph.node_mut(NodeIndex::new(fa.get_start_state())) {
        start_node.set_color(start_node_color);
    }

    for accept_state in fa.get_acceptor_states().iter_ones() {
        if let Some(accept_node) = graph.node_mut(NodeIndex::new(accept_state)) {
            accept_node.set_color(accept_node_color);
        }
    }

    run_native(
        "finite automata visualizer",
        NativeOptions::default(),
        Box::new(|cc| Ok(Box::new(Visualizer::new(cc, graph)))),
    )
    .map_err(|error| Report::new(ExportError::WindowError(error.to_string())))
}
