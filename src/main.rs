use std::path::PathBuf;

use clap::Parser;
use opgraph::{
    GraphError, GraphValidator, TranslatorRegistry, convert_script, debug, graph_to_dot,
    load_script_from_path,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert model scripts into operation graphs", long_about = None)]
struct Cli {
    /// Path to a JSON model script.
    script: PathBuf,
    /// Optional path to write a Graphviz DOT export of the graph.
    #[arg(long)]
    export_dot: Option<PathBuf>,
    /// Optional path to write the converted graph as JSON.
    #[arg(long)]
    emit_json: Option<PathBuf>,
    /// Log every translated call and inserted node.
    #[arg(short, long)]
    verbose: bool,
}

fn run() -> Result<(), GraphError> {
    let cli = Cli::parse();
    debug::init_logging(cli.verbose);

    let script = load_script_from_path(&cli.script)?;
    let graph = convert_script(&script, TranslatorRegistry::global())?;
    let artifacts = GraphValidator::new(&graph).validate()?;

    println!(
        "Converted `{}` into {} nodes and {} constants.",
        cli.script.display(),
        graph.nodes().len(),
        graph.constants().len()
    );
    println!("Inputs:");
    for (name, descriptor) in artifacts.parameter_names_to_descriptors.iter() {
        println!("  - {}: {} {}", name, descriptor.element_type, descriptor.shape);
    }
    println!("Outputs:");
    for (name, descriptor) in artifacts.output_names_to_descriptors.iter() {
        println!("  - {}: {} {}", name, descriptor.element_type, descriptor.shape);
    }
    println!("Nodes:");
    for (idx, node) in graph.nodes().iter().enumerate() {
        let inputs = node
            .inputs
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let outputs = node
            .outputs
            .iter()
            .map(|output| format!("{} {}", output.element_type, output.shape))
            .collect::<Vec<_>>()
            .join(", ");
        println!("  - #{} {}({}) -> {}", idx, node.display_name(), inputs, outputs);
    }

    if let Some(dot_path) = cli.export_dot {
        let dot = graph_to_dot(&graph);
        std::fs::write(&dot_path, dot).map_err(|err| GraphError::export(dot_path.clone(), err))?;
        println!("Exported Graphviz DOT to `{}`.", dot_path.display());
    }

    if let Some(json_path) = cli.emit_json {
        let json = serde_json::to_string_pretty(&graph)
            .map_err(|err| GraphError::export(json_path.clone(), err.into()))?;
        std::fs::write(&json_path, json)
            .map_err(|err| GraphError::export(json_path.clone(), err))?;
        println!("Wrote graph JSON to `{}`.", json_path.display());
    }
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
