use synthgraph::Graph;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let graph = Graph::new(8000, 256)?;
    let level = graph.value(0.25)?;
    let (audio, profile) = graph.render_profiled(&level, 1.0)?;
    println!("{profile}");

    let path = std::env::temp_dir().join("synthgraph_constant.wav");
    audio.save(&path)?;
    println!("wrote {} samples to {}", audio.samples.len(), path.display());
    Ok(())
}
