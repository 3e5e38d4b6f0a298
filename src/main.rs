#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = lesson_exercises::run().await {
        eprintln!("lesson-exercises fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
