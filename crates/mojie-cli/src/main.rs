use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use mojie_contracts::credits::{DeductionRules, Membership};
use mojie_contracts::events::{EventSink, EventWriter};
use mojie_contracts::jobs::JobRecord;
use mojie_contracts::models::{ModelRegistry, ModelSelector, BATCH_CHOICES};
use mojie_contracts::providers;
use mojie_engine::{
    ColorAdjustRequest, ExpandRequest, GenerationTarget, HttpTransport, IntentRequest,
    InternalSupplementRequest, JobSubmitter, RefineRequest, RemoteTranslator, RemovalRequest,
    ReplaceRequest, Transport,
};
use serde_json::{json, Map, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "mojie-rs", version, about = "Mojie image job client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the display label and family for a model key.
    Label { key: String },
    /// Derive status, images, label and cost for job records.
    Inspect(InspectArgs),
    /// List generation models and their resolution presets.
    Models,
    /// Submit an editing job.
    Submit(SubmitArgs),
    /// Send an opaque generation payload to a provider family.
    Generate(GenerateArgs),
    /// Ask the backend to re-run a task.
    Retry { task_id: String },
}

#[derive(Debug, Parser)]
struct InspectArgs {
    #[arg(long)]
    job: PathBuf,
    #[arg(long)]
    rules: Option<PathBuf>,
    #[arg(long)]
    member: bool,
}

#[derive(Debug, Parser)]
struct SubmitArgs {
    #[command(subcommand)]
    intent: IntentCommand,
    #[arg(long, global = true)]
    conversation: Option<String>,
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Block until the loading flag unlocks.
    #[arg(long, global = true)]
    wait: bool,
}

#[derive(Debug, Args)]
struct MaskedImage {
    #[arg(long)]
    url: String,
    #[arg(long)]
    mask: String,
}

#[derive(Debug, Subcommand)]
enum IntentCommand {
    Replace {
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        template_text: Option<String>,
        #[arg(long)]
        product: String,
        #[arg(long)]
        white: String,
        #[arg(long)]
        template: String,
        #[arg(long)]
        mask: String,
        #[arg(long, default_value_t = 50)]
        level: u32,
    },
    Refine {
        #[command(flatten)]
        image: MaskedImage,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value_t = 50)]
        level: u32,
    },
    Internal {
        #[command(flatten)]
        image: MaskedImage,
        #[arg(long)]
        text: Option<String>,
        /// Treat the text as typed on the free-text tab (translated first).
        #[arg(long)]
        text_tab: bool,
    },
    Removal {
        #[command(flatten)]
        image: MaskedImage,
    },
    Expand {
        #[arg(long)]
        url: String,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// JSON object of extra placement fields.
        #[arg(long)]
        placement: Option<String>,
    },
    Color {
        #[arg(long)]
        url: String,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        brightness: i32,
        #[arg(long, default_value_t = 100)]
        contrast: u32,
        #[arg(long, default_value_t = 100)]
        saturate: u32,
    },
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    family: String,
    #[arg(long)]
    payload: PathBuf,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mojie_engine=info,mojie_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("mojie-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Label { key } => {
            let label = providers::resolve(&key);
            print_json(&json!({
                "key": key,
                "label": label.as_str(),
                "family": label.family().as_str(),
            }))?;
            Ok(0)
        }
        Command::Inspect(args) => run_inspect(args),
        Command::Models => run_models(),
        Command::Submit(args) => run_submit(args),
        Command::Generate(args) => run_generate(args),
        Command::Retry { task_id } => {
            let response = build_submitter(None)?.retry(&task_id)?;
            print_json(&response)?;
            Ok(0)
        }
    }
}

fn run_inspect(args: InspectArgs) -> Result<i32> {
    let rules = match args.rules.as_deref() {
        Some(path) => DeductionRules::load_with_override(Some(path))?,
        None => DeductionRules::load()?,
    };
    let membership = if args.member {
        Membership::active()
    } else {
        Membership::none()
    };
    let raw = fs::read_to_string(&args.job)
        .with_context(|| format!("failed reading {}", args.job.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", args.job.display()))?;

    let rows = match parsed {
        Value::Array(rows) => rows,
        Value::Object(_) => vec![parsed],
        _ => bail!("expected a job object or an array of jobs"),
    };
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let record: JobRecord =
            serde_json::from_value(row).context("job record has an unexpected shape")?;
        views.push(serde_json::to_value(record.view(&rules, &membership))?);
    }
    print_json(&Value::Array(views))?;
    Ok(0)
}

fn run_models() -> Result<i32> {
    let registry = ModelRegistry::new(None);
    let rules = DeductionRules::load()?;
    let selector = ModelSelector::new(Some(registry.clone()));
    let models: Vec<Value> = registry
        .list()
        .map(|model| {
            json!({
                "key": model.key,
                "label": model.label,
                "tip": model.tip,
                "points": rules.default.points(model.rule_key),
                "vip_points": rules.vip.points(model.rule_key),
                "presets": registry.presets_for(&model.key),
            })
        })
        .collect();
    let default_model = selector
        .select(None)
        .map(|selection| selection.model.key)
        .unwrap_or_default();
    print_json(&json!({
        "default": default_model,
        "batch_choices": BATCH_CHOICES,
        "models": models,
    }))?;
    Ok(0)
}

fn run_submit(args: SubmitArgs) -> Result<i32> {
    let events_path = args.events.clone();
    let submitter = build_submitter(events_path)?;
    let conversation_id = args.conversation.clone();

    let request = match args.intent {
        IntentCommand::Replace {
            text,
            template_text,
            product,
            white,
            template,
            mask,
            level,
        } => IntentRequest::Replace(ReplaceRequest {
            conversation_id,
            text,
            template_text,
            product_url: product,
            white_url: white,
            template_url: template,
            mask_url: mask,
            level,
        }),
        IntentCommand::Refine { image, text, level } => IntentRequest::Refine(RefineRequest {
            conversation_id,
            text,
            level,
            url: image.url,
            mask_url: image.mask,
        }),
        IntentCommand::Internal {
            image,
            text,
            text_tab,
        } => IntentRequest::InternalSupplement(InternalSupplementRequest {
            conversation_id,
            text,
            text_tab_active: text_tab,
            url: image.url,
            mask_url: image.mask,
        }),
        IntentCommand::Removal { image } => IntentRequest::Removal(RemovalRequest {
            conversation_id,
            url: image.url,
            mask_url: image.mask,
        }),
        IntentCommand::Expand {
            url,
            width,
            height,
            placement,
        } => IntentRequest::Expand(ExpandRequest {
            conversation_id,
            url,
            width,
            height,
            placement: parse_placement(placement.as_deref())?,
        }),
        IntentCommand::Color {
            url,
            brightness,
            contrast,
            saturate,
        } => IntentRequest::ColorAdjust(ColorAdjustRequest {
            conversation_id,
            url,
            brightness,
            contrast,
            saturate,
        }),
    };

    let (receipt, unlock) = submitter.submit(&request);
    if args.wait {
        let _ = unlock.join();
        info!("loading flag released");
    }
    match receipt {
        Some(receipt) => {
            print_json(&json!({
                "intent": receipt.intent().as_str(),
                "model_used": receipt.intent().model_key(),
                "conversation_id": receipt.conversation_id,
                "response": receipt.response,
            }))?;
            Ok(0)
        }
        None => Ok(2),
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let Some(target) = GenerationTarget::parse(&args.family) else {
        bail!(
            "unknown family '{}' (expected gpt, gemini, flex, qihua-kontext or volcengine)",
            args.family
        );
    };
    let raw = fs::read_to_string(&args.payload)
        .with_context(|| format!("failed reading {}", args.payload.display()))?;
    let body: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", args.payload.display()))?;
    let response = build_submitter(None)?.submit_generation(target, &body)?;
    print_json(&response)?;
    Ok(0)
}

fn build_submitter(events_path: Option<PathBuf>) -> Result<JobSubmitter> {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_env()?);
    let translator = Arc::new(RemoteTranslator::new(Arc::clone(&transport)));
    let mut submitter = JobSubmitter::new(transport, translator);
    if let Some(path) = events_path {
        let session_id = uuid::Uuid::new_v4().to_string();
        let writer: Arc<dyn EventSink> = Arc::new(EventWriter::new(path, session_id));
        submitter = submitter.with_events(writer);
    }
    Ok(submitter)
}

fn parse_placement(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw).context("--placement must be JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("--placement must be a JSON object"),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
