use std::fmt::Write;

use crate::graph::{Dim, Graph, Shape, Value};
use crate::ops::PARAMETER;

pub fn graph_to_dot(graph: &Graph) -> String {
    let mut dot = String::from("digraph opgraph {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [fontname=\"Helvetica\"];\n");
    dot.push_str("  edge [fontname=\"Helvetica\"];\n\n");

    for (idx, constant) in graph.constants().iter().enumerate() {
        let label = escape_label(&format!(
            "Constant {}\n{}\n{}",
            idx,
            constant.element_type(),
            format_shape(constant.shape())
        ));
        let _ = writeln!(
            dot,
            "  const_{} [shape=diamond,style=filled,fillcolor=\"#f0f0f0\",label=\"{}\"];",
            idx, label
        );
    }

    for (idx, node) in graph.nodes().iter().enumerate() {
        let node_id = format!("node_{}", idx);
        let mut label_lines = if node.op_type == PARAMETER {
            vec![format!("Input {}", node.display_name())]
        } else {
            let mut lines = vec![format!("{} (#{})", node.op_type, idx)];
            if let Some(name) = &node.name
                && !name.is_empty()
            {
                lines.push(name.clone());
            }
            lines
        };
        for output in &node.outputs {
            label_lines.push(format!(
                "{} {}",
                output.element_type,
                format_shape(&output.shape)
            ));
        }
        let label = escape_label(&label_lines.join("\n"));
        if node.op_type == PARAMETER {
            let _ = writeln!(
                dot,
                "  {} [shape=oval,style=filled,fillcolor=\"#d0e6ff\",label=\"{}\"];",
                node_id, label
            );
        } else {
            let _ = writeln!(
                dot,
                "  {} [shape=box,style=rounded,label=\"{}\"];",
                node_id, label
            );
        }

        for (input_idx, input) in node.inputs.iter().enumerate() {
            let _ = writeln!(
                dot,
                "  {} -> {} [label=\"in{}\"];",
                source_id(input),
                node_id,
                input_idx
            );
        }
    }

    dot.push('\n');

    for (idx, output) in graph.outputs().iter().enumerate() {
        let _ = writeln!(
            dot,
            "  output_{} [shape=doublecircle,style=filled,fillcolor=\"#d6f5d6\",label=\"{}\"];",
            idx,
            escape_label(&output.name)
        );
        let _ = writeln!(
            dot,
            "  {} -> output_{} [label=\"out\"];",
            source_id(&output.value),
            idx
        );
    }

    dot.push_str("}\n");
    dot
}

fn source_id(value: &Value) -> String {
    match value {
        Value::Output { node, .. } => format!("node_{}", node.0),
        Value::Constant(id) => format!("const_{}", id.0),
    }
}

fn escape_label(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_shape(shape: &Shape) -> String {
    if shape.rank() == 0 {
        "scalar".to_string()
    } else {
        shape
            .dims()
            .iter()
            .map(|dim| match dim {
                Dim::Static(size) => size.to_string(),
                Dim::Dynamic => "?".to_string(),
            })
            .collect::<Vec<_>>()
            .join("x")
    }
}
