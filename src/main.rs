use std::path::PathBuf;

use clap::Parser;
use quiz_recorder::{ErrorResponse, HeadlessRun};

#[derive(Parser, Debug)]
#[command(name = "quiz-recorder", version)]
struct Cli {
    /// Quiz document JSON.
    quiz: PathBuf,

    /// Playback config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Option to pick for each question, in order (e.g. `2,1,4`).
    #[arg(long, value_delimiter = ',')]
    answers: Vec<usize>,

    /// Directory for the recording.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Capture frame rate.
    #[arg(long, default_value_t = quiz_recorder::capture::frame_log::DEFAULT_FPS)]
    fps: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    quiz_recorder::init_tracing();

    let result = quiz_recorder::run(HeadlessRun {
        quiz_path: cli.quiz,
        config_path: cli.config,
        answers: cli.answers,
        out_dir: cli.out,
        fps: cli.fps,
    })
    .await;

    match result {
        Ok(Some(path)) => println!("{}", path.display()),
        Ok(None) => {}
        Err(error) => {
            tracing::error!("Playback failed: {}", error);
            let response = ErrorResponse::from(error);
            eprintln!("{}", serde_json::to_string(&response)?);
            std::process::exit(1);
        }
    }
    Ok(())
}
