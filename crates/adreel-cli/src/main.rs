use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use adreel_contracts::ads::FinalOutput;
use adreel_contracts::brief::{AspectRatio, Platform, UserInput};
use adreel_contracts::chat::{parse_command, SessionCommand, SESSION_HELP_COMMANDS};
use adreel_contracts::codec::EncodedImage;
use adreel_contracts::events::EventWriter;
use adreel_contracts::progress::ProgressEvent;
use adreel_contracts::runs::summary::{now_utc_iso, write_summary, RunSummary};
use adreel_engine::{
    default_provider_registry, AdPipeline, CapabilityProvider, CredentialManager, EngineConfig,
    EnvCredentialManager, MediaStore, ModelCreator, ModelSession, PipelineError,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "adreel",
    version,
    about = "Generate short-form video ads from a product photo"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full ad pipeline once.
    Generate(GenerateArgs),
    /// Create a model photo, then refine it interactively.
    Model(ModelArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    product: PathBuf,
    #[arg(long)]
    actor: Option<PathBuf>,
    #[arg(long)]
    description: String,
    #[arg(long)]
    cta: String,
    #[arg(long, default_value = "tiktok")]
    platform: Platform,
    #[arg(long, default_value = "9:16")]
    aspect: AspectRatio,
    #[arg(long, default_value_t = 8)]
    length: u32,
    #[arg(long, default_value = "energetic")]
    tone: String,
    #[arg(long)]
    voiceover: bool,
    #[arg(long, default_value = "gemini")]
    provider: String,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ModelArgs {
    #[arg(long)]
    style: PathBuf,
    #[arg(long)]
    headshot: PathBuf,
    #[arg(long, default_value = "gemini")]
    provider: String,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

const HISTORY_PREVIEW_CHARS: usize = 96;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("adreel error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Model(args) => run_model(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let config = EngineConfig::from_env();
    let run_id = Uuid::new_v4().to_string();
    let out = resolve_out_dir(args.out.as_deref(), &run_id);
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| out.join("events.jsonl"));

    let provider = resolve_provider(&args.provider, &config)?;
    let credentials = credentials_for(provider.as_ref())?;
    let input = build_input(&args)?;

    let mut pipeline = AdPipeline::new(
        provider,
        MediaStore::new(&out)?,
        EventWriter::new(&events_path, &run_id),
        &config,
    )?;
    if let Some(credentials) = credentials.clone() {
        pipeline = pipeline.with_credentials(credentials);
    }
    for reason in &pipeline.models().fallbacks {
        eprintln!("note: {reason}");
    }

    println!("Run {run_id} writing to {}", out.display());
    let started_at = now_utc_iso();
    let output = match pipeline.run(&input, print_progress) {
        Ok(output) => output,
        Err(PipelineError::MissingCredential) => {
            let recovered = match credentials.as_ref() {
                Some(credentials) => credentials.prompt_for_credential()?,
                None => false,
            };
            if !recovered {
                eprintln!("Export GEMINI_API_KEY (or GOOGLE_API_KEY) for a project with video access.");
            }
            bail!(PipelineError::MissingCredential);
        }
        Err(err) => return Err(err.into()),
    };

    let summary_path = out.join("output.json");
    write_summary(
        &summary_path,
        &RunSummary {
            run_id,
            started_at,
            finished_at: now_utc_iso(),
            status: "completed".to_string(),
            artifacts: artifact_paths(&output),
        },
        Some(&output_payload(&output)?),
    )?;
    print_output(&output);
    println!("Summary written to {}", summary_path.display());
    Ok(0)
}

fn run_model(args: ModelArgs) -> Result<i32> {
    let config = EngineConfig::from_env();
    let run_id = Uuid::new_v4().to_string();
    let out = resolve_out_dir(args.out.as_deref(), &run_id);
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| out.join("events.jsonl"));

    let provider = resolve_provider(&args.provider, &config)?;
    let credentials = credentials_for(provider.as_ref())?;
    let style = load_image("style", &args.style)?;
    let headshot = load_image("headshot", &args.headshot)?;

    let mut creator = ModelCreator::new(
        provider,
        MediaStore::new(&out)?,
        EventWriter::new(&events_path, &run_id),
        &config,
    )?;
    if let Some(credentials) = credentials {
        creator = creator.with_credentials(credentials);
    }

    let mut session = creator.create(&style, &headshot, |event| {
        if let ProgressEvent::Step(update) = event {
            println!("[{}/2] {}", update.step, update.message);
        }
    })?;
    println!("Model ready: {}", session.current_ref().path.display());
    println!("Type an edit instruction, or /help for commands.");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_command(line.trim_end_matches(['\n', '\r'])) {
            SessionCommand::Noop => continue,
            SessionCommand::Help => {
                println!("Commands: {}", SESSION_HELP_COMMANDS.join(" "));
                println!("Any other text is applied as an edit to the current image.");
            }
            SessionCommand::History => print_history(&session),
            SessionCommand::Current => println!("{}", session.current_ref().file_url()),
            SessionCommand::Save { path } => {
                fs::copy(&session.current_ref().path, &path).with_context(|| {
                    format!("failed to save current image to {}", path.display())
                })?;
                println!("Saved to {}", path.display());
            }
            SessionCommand::Edit { instruction } => {
                match creator.edit(&mut session, &instruction) {
                    Ok(media) => println!("Updated: {}", media.path.display()),
                    Err(PipelineError::MissingCredential) => {
                        return Err(PipelineError::MissingCredential.into());
                    }
                    Err(err) => eprintln!("Edit failed: {err}"),
                }
            }
            SessionCommand::Unknown { command, .. } => {
                println!("Unknown command /{command}. Type /help for commands.");
            }
            SessionCommand::Quit => break,
        }
    }

    println!(
        "Final model: {} ({} edit(s))",
        session.current_ref().path.display(),
        session.history().len().saturating_sub(1)
    );
    Ok(0)
}

fn resolve_out_dir(requested: Option<&Path>, run_id: &str) -> PathBuf {
    requested
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("runs").join(run_id))
}

fn resolve_provider(name: &str, config: &EngineConfig) -> Result<Arc<dyn CapabilityProvider>> {
    let providers = default_provider_registry(config)?;
    providers.get(name).with_context(|| {
        format!(
            "unknown provider '{name}' (available: {})",
            providers.names().join(", ")
        )
    })
}

/// Remote providers need a key up front; the dry-run provider never does.
fn credentials_for(provider: &dyn CapabilityProvider) -> Result<Option<Arc<EnvCredentialManager>>> {
    if provider.name() == "dryrun" {
        return Ok(None);
    }
    let manager = Arc::new(EnvCredentialManager::new());
    if !manager.has_active_credential() && !manager.prompt_for_credential()? {
        bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set (use --provider dryrun to run offline)");
    }
    Ok(Some(manager))
}

fn load_image(label: &str, path: &Path) -> Result<EncodedImage> {
    EncodedImage::from_path(path).with_context(|| format!("failed to load {label} image"))
}

fn build_input(args: &GenerateArgs) -> Result<UserInput> {
    let actor_image = args
        .actor
        .as_deref()
        .map(|path| load_image("actor", path))
        .transpose()?;
    Ok(UserInput {
        product_image: Some(load_image("product", &args.product)?),
        actor_image,
        description: args.description.trim().to_string(),
        call_to_action: args.cta.trim().to_string(),
        platform: args.platform,
        aspect_ratio: args.aspect,
        video_length_s: args.length,
        tone: args.tone.trim().to_string(),
        voiceover: args.voiceover,
    })
}

fn print_progress(event: ProgressEvent) {
    if let ProgressEvent::Step(update) = event {
        println!("{update}");
    }
}

fn artifact_paths(output: &FinalOutput) -> Vec<String> {
    let mut paths = vec![
        output.opening_frame_url.path.display().to_string(),
        output.video_url.path.display().to_string(),
    ];
    if let Some(voiceover) = output.voiceover_audio_url.as_ref() {
        paths.push(voiceover.path.display().to_string());
    }
    paths
}

fn output_payload(output: &FinalOutput) -> Result<serde_json::Map<String, Value>> {
    match serde_json::to_value(output)? {
        Value::Object(map) => Ok(map),
        other => bail!("ad package serialized to {other}, expected an object"),
    }
}

fn print_output(output: &FinalOutput) {
    println!();
    println!("{}", output.title);
    println!("  idea: {}", output.idea);
    println!("  quality control: {}", output.qc_report);
    println!("  opening frame: {}", output.opening_frame_url.file_url());
    println!("  video: {}", output.video_url.file_url());
    if let Some(voiceover) = output.voiceover_audio_url.as_ref() {
        println!("  voiceover: {}", voiceover.file_url());
    }
    for (idx, copy) in output.ad_copy_variations.iter().enumerate() {
        println!("  copy {}: {copy}", idx + 1);
    }
    let hashtags = output
        .hashtags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>();
    println!("  hashtags: {}", hashtags.join(" "));
}

fn print_history(session: &ModelSession) {
    for (idx, entry) in session.history().iter().enumerate() {
        let label = if idx == 0 { "prompt" } else { "edit" };
        println!("{idx:>3} {label}: {}", preview(entry, HISTORY_PREVIEW_CHARS));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<&str>>().join(" ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    flattened.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_args_parse_with_defaults() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "adreel",
            "generate",
            "--product",
            "bottle.png",
            "--description",
            "Insulated bottle",
            "--cta",
            "Shop now",
            "--platform",
            "youtube-shorts",
            "--aspect",
            "landscape",
        ])?;
        let Command::Generate(args) = cli.command else {
            bail!("expected generate");
        };
        assert_eq!(args.platform, Platform::YouTubeShorts);
        assert_eq!(args.aspect, AspectRatio::Landscape);
        assert_eq!(args.length, 8);
        assert_eq!(args.provider, "gemini");
        assert!(!args.voiceover);
        Ok(())
    }

    #[test]
    fn unknown_platform_is_rejected_by_the_parser() {
        let parsed = Cli::try_parse_from([
            "adreel",
            "generate",
            "--product",
            "bottle.png",
            "--description",
            "d",
            "--cta",
            "c",
            "--platform",
            "myspace",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn build_input_loads_images_and_trims_text() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let product = temp.path().join("product.jpg");
        fs::write(&product, b"not really a jpeg")?;
        let cli = Cli::try_parse_from([
            "adreel",
            "generate",
            "--product",
            product.to_str().unwrap_or_default(),
            "--description",
            "  Insulated bottle ",
            "--cta",
            "Shop now ",
            "--voiceover",
        ])?;
        let Command::Generate(args) = cli.command else {
            bail!("expected generate");
        };
        let input = build_input(&args)?;
        let image = input.product_image.clone().unwrap_or_else(|| EncodedImage {
            payload: String::new(),
            media_type: String::new(),
        });
        assert_eq!(image.media_type, "image/jpeg");
        assert_eq!(input.description, "Insulated bottle");
        assert_eq!(input.call_to_action, "Shop now");
        assert!(input.voiceover);
        assert!(input.actor_image.is_none());
        Ok(())
    }

    #[test]
    fn missing_image_file_reports_label() {
        let err = load_image("actor", Path::new("/nonexistent/actor.png"))
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(err.starts_with("failed to load actor image"));
    }

    #[test]
    fn unknown_provider_lists_available_names() -> anyhow::Result<()> {
        let err = resolve_provider("openai", &EngineConfig::default())
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "unknown provider 'openai' (available: dryrun, gemini)");
        assert!(credentials_for(resolve_provider("dryrun", &EngineConfig::default())?.as_ref())?.is_none());
        Ok(())
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n\nb   c", 10), "a b c");
        assert_eq!(preview("abcdefghijkl", 4), "abcd…");
        assert_eq!(resolve_out_dir(None, "run-1"), PathBuf::from("runs").join("run-1"));
    }
}
