use std::fs;
use std::path::{Path, PathBuf};

use adstudio_contracts::aspect::AspectRatio;
use adstudio_contracts::events::EventWriter;
use adstudio_contracts::prompts::{composition_guidance, Language};
use adstudio_contracts::runs::receipts::{
    build_receipt, write_receipt, ImageRequest, ReceiptArtifacts,
};
use adstudio_contracts::upscale::{QuotaLedger, UpscaleScale, MONTHLY_FREE_QUOTA};
use adstudio_engine::raster::{decode_data_url, decode_rgba, encode_data_url, guess_mime};
use adstudio_engine::upscale::upscaling_enabled_from_env;
use adstudio_engine::{
    DryrunAssistant, DryrunGenerator, GenerationRequest, GenerationService, InlineImage,
    NormalizeConfig, NormalizeOutcome, Normalizer, ResampleUpscaler, RetryPolicy, UpscaleOptions,
    UpscaleService,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

const DEFAULT_QUOTA_FILE: &str = ".adstudio/upscale-quota.json";

#[derive(Debug, Parser)]
#[command(name = "adstudio", version, about = "Ad creative normalization toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crop and resize an image to an aspect ratio.
    Normalize(NormalizeArgs),
    /// Print the normalization plan without writing pixels.
    Inspect(InspectArgs),
    /// Generate images with the offline provider and normalize them.
    Generate(GenerateArgs),
    /// Upscale an image against the monthly quota.
    Upscale(UpscaleArgs),
    /// Print the composition guidance sent ahead of a prompt.
    Guidance(GuidanceArgs),
    /// Show monthly upscale quota usage.
    Quota(QuotaArgs),
}

#[derive(Debug, Parser)]
struct NormalizeArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = "Auto")]
    ratio: String,
    /// Write the original image instead of failing.
    #[arg(long)]
    best_effort: bool,
}

#[derive(Debug, Parser)]
struct InspectArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    ratio: String,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = "Auto")]
    ratio: String,
    #[arg(long, default_value_t = 1)]
    count: usize,
    #[arg(long)]
    negative: Option<String>,
    #[arg(long)]
    seed: Option<String>,
    #[arg(long, default_value = "en")]
    language: String,
    #[arg(long = "reference")]
    references: Vec<PathBuf>,
    #[arg(long)]
    structure: Option<PathBuf>,
    #[arg(long)]
    style: Option<String>,
    /// Image whose look is described and added to the prompt.
    #[arg(long)]
    style_image: Option<PathBuf>,
    #[arg(long, default_value_t = 1024)]
    width: u32,
    #[arg(long, default_value_t = 1024)]
    height: u32,
    /// White band thickness added by the offline provider.
    #[arg(long)]
    letterbox: Option<u32>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct UpscaleArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 2)]
    scale: u32,
    #[arg(long)]
    target_width: Option<u32>,
    #[arg(long)]
    target_height: Option<u32>,
    #[arg(long, default_value = DEFAULT_QUOTA_FILE)]
    quota_file: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct GuidanceArgs {
    #[arg(long)]
    ratio: String,
    #[arg(long, default_value = "en")]
    language: String,
}

#[derive(Debug, Parser)]
struct QuotaArgs {
    #[arg(long, default_value = DEFAULT_QUOTA_FILE)]
    quota_file: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("adstudio error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Normalize(args) => run_normalize(args),
        Command::Inspect(args) => run_inspect(args),
        Command::Generate(args) => run_generate(args),
        Command::Upscale(args) => run_upscale(args),
        Command::Guidance(args) => run_guidance(args),
        Command::Quota(args) => run_quota(args),
    }
}

fn run_normalize(args: NormalizeArgs) -> Result<i32> {
    let input = read_image_input(&args.input)?;
    let normalizer = Normalizer::new(NormalizeConfig::from_env());

    let (bytes, status) = if args.best_effort {
        let best = normalizer.normalize_or_original(&input, &args.ratio);
        let status = match &best.outcome {
            NormalizeOutcome::Bypassed => json!({ "status": "bypassed" }),
            NormalizeOutcome::Normalized(plan) => json!({ "status": "normalized", "plan": plan }),
            NormalizeOutcome::FellBack(reason) => json!({ "status": "fell_back", "error": reason }),
        };
        (best.bytes, status)
    } else {
        let target = AspectRatio::parse(&args.ratio)?;
        if target.is_auto() {
            (input, json!({ "status": "bypassed" }))
        } else {
            let normalized = normalizer
                .normalize_detailed(&input, &target)
                .with_context(|| format!("failed to normalize {}", args.input.display()))?;
            (
                normalized.bytes,
                json!({ "status": "normalized", "plan": normalized.plan }),
            )
        }
    };

    write_bytes(&args.out, &bytes)?;
    let mut summary = status;
    if let Value::Object(map) = &mut summary {
        map.insert("out".to_string(), json!(args.out.display().to_string()));
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(0)
}

fn run_inspect(args: InspectArgs) -> Result<i32> {
    let input = read_image_input(&args.input)?;
    let config = NormalizeConfig::from_env();
    let target = AspectRatio::parse(&args.ratio)?;
    let image = decode_rgba(&input, &config)
        .with_context(|| format!("failed to decode {}", args.input.display()))?;
    let plan = Normalizer::new(config).plan(&image, &target)?;
    let payload = json!({
        "source": [image.width(), image.height()],
        "aspect_ratio": target.to_string(),
        "plan": plan,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(0)
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    if args.count == 0 {
        bail!("--count must be at least 1");
    }
    if args.width == 0 || args.height == 0 {
        bail!("--width and --height must be at least 1");
    }
    let language: Language = args
        .language
        .parse()
        .map_err(|_| anyhow::anyhow!("unsupported language '{}'", args.language))?;
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;

    let references = args
        .references
        .iter()
        .map(|path| read_inline_image(path))
        .collect::<Result<Vec<_>>>()?;
    let structure_guide = args
        .structure
        .as_deref()
        .map(read_inline_image)
        .transpose()?;
    let style_image = args
        .style_image
        .as_deref()
        .map(read_inline_image)
        .transpose()?;

    let mut generator = DryrunGenerator::new(args.width, args.height)?;
    if let Some(band) = args.letterbox {
        generator = generator.with_letterbox(band);
    }
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let events = EventWriter::new(&events_path, uuid::Uuid::new_v4().to_string());
    let service = GenerationService::new(
        generator,
        Box::new(DryrunAssistant),
        Normalizer::new(NormalizeConfig::from_env()),
        RetryPolicy::from_env(),
        events,
    );

    let request = GenerationRequest {
        prompt: args.prompt.clone(),
        aspect_ratio: args.ratio.clone(),
        references,
        style_description: args.style.clone(),
        style_image,
        structure_guide,
        negative_prompt: args.negative.clone(),
        seed: args.seed.clone(),
        language,
    };
    let generations = service.generate_batch(&request, args.count)?;

    for generation in &generations {
        let stem = generation.image.id.chars().take(8).collect::<String>();
        let image_path = args.out.join(format!("image-{stem}.png"));
        let receipt_path = args.out.join(format!("receipt-{stem}.json"));
        let decoded = decode_data_url(&generation.image.image_data_url)?;
        write_bytes(&image_path, &decoded.bytes)?;

        let receipt_request = ImageRequest {
            prompt: request.prompt.clone(),
            aspect_ratio: request.aspect_ratio.clone(),
            negative_prompt: request.negative_prompt.clone(),
            seed: request.seed.clone(),
            reference_count: request.references.len(),
            language: language.code().to_string(),
            provider: generation.provider.clone(),
        };
        let receipt = build_receipt(
            &receipt_request,
            &generation.composed_prompt,
            &generation.normalization_summary(),
            &generation.warnings,
            ReceiptArtifacts {
                image_path: &image_path,
                receipt_path: &receipt_path,
            },
        );
        write_receipt(&receipt_path, &receipt)?;
        for warning in &generation.warnings {
            log::warn!("{warning}");
        }
        println!("{}", image_path.display());
    }
    Ok(0)
}

fn run_upscale(args: UpscaleArgs) -> Result<i32> {
    let scale = UpscaleScale::from_factor(args.scale)
        .ok_or_else(|| anyhow::anyhow!("--scale must be 2 or 4, got {}", args.scale))?;
    let input = read_image_input(&args.input)?;
    let events = match &args.events {
        Some(path) => EventWriter::new(path, uuid::Uuid::new_v4().to_string()),
        None => EventWriter::disabled(uuid::Uuid::new_v4().to_string()),
    };
    let service = UpscaleService::new(
        ResampleUpscaler::default(),
        QuotaLedger::new(&args.quota_file, MONTHLY_FREE_QUOTA),
        upscaling_enabled_from_env(),
        events,
    );
    let options = UpscaleOptions {
        scale,
        target_width: args.target_width,
        target_height: args.target_height,
    };
    let source = encode_data_url(guess_mime(&input), &input);
    let upscaled = service.upscale_data_url(&source, &options)?;
    write_bytes(&args.out, &decode_data_url(&upscaled.data_url)?.bytes)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "out": args.out.display().to_string(),
            "width": upscaled.dimensions.width,
            "height": upscaled.dimensions.height,
            "quota": upscaled.quota,
        }))?
    );
    Ok(0)
}

fn run_guidance(args: GuidanceArgs) -> Result<i32> {
    let ratio = AspectRatio::parse(&args.ratio)?;
    let language: Language = args
        .language
        .parse()
        .map_err(|_| anyhow::anyhow!("unsupported language '{}'", args.language))?;
    println!("{}", composition_guidance(&ratio, language));
    Ok(0)
}

fn run_quota(args: QuotaArgs) -> Result<i32> {
    let status = QuotaLedger::new(&args.quota_file, MONTHLY_FREE_QUOTA).status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(0)
}

/// File contents, or the decoded payload when the file holds a data URI.
fn read_image_input(path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if raw.starts_with(b"data:") {
        let text = String::from_utf8(raw)
            .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
        return Ok(decode_data_url(&text)?.bytes);
    }
    Ok(raw)
}

fn read_inline_image(path: &Path) -> Result<InlineImage> {
    Ok(InlineImage::from_bytes(read_image_input(path)?))
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
