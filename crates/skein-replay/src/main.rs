use std::path::PathBuf;
use std::sync::Arc;

use facet::Facet;
use figue as args;
use skein::replay::{PauseRecording, ReplayHost};
use skein::{
    CoroutineId, CoroutineState, CoroutineView, DebugSession, ReconcileConfig, StackFrameItem,
    StoreError, SuspendPoint, ThreadRef, ViewConfig, dump_point,
};
use tracing::info;

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    /// Recorded pause to replay (JSON).
    #[facet(args::named)]
    recording: String,
    /// Print a thread-dump-like text instead of the tree.
    #[facet(args::named, default)]
    dump: bool,
    /// Print the reconciled stacks as JSON instead of the tree.
    #[facet(args::named, default)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Tree,
    Dump,
    Json,
}

#[derive(Facet, Debug)]
struct Report {
    coroutines: Vec<CoroutineReport>,
    error: Option<String>,
}

#[derive(Facet, Debug)]
struct CoroutineReport {
    id: CoroutineId,
    name: String,
    state: CoroutineState,
    owner_thread: Option<ThreadRef>,
    frames: Vec<StackFrameItem>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = parse_cli()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let output = match (cli.dump, cli.json) {
        (true, true) => return Err("--dump and --json are mutually exclusive".to_string()),
        (true, false) => Output::Dump,
        (false, true) => Output::Json,
        (false, false) => Output::Tree,
    };
    let path = PathBuf::from(&cli.recording);
    let recording = PauseRecording::load(&path).map_err(|e| e.to_string())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start runtime: {e}"))?;
    let text = runtime.block_on(replay(
        recording,
        output,
        ReconcileConfig::from_env(),
        ViewConfig::from_env(),
    ))?;
    print!("{text}");
    Ok(())
}

fn parse_cli() -> Result<Cli, String> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("skein-replay")
                .description("Replay a recorded pause and print its coroutine stacks")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();
    let cli = args::Driver::new(figue_config)
        .run()
        .into_result()
        .map_err(|e| e.to_string())?;
    Ok(cli.value)
}

async fn replay(
    recording: PauseRecording,
    output: Output,
    reconcile: ReconcileConfig,
    view_config: ViewConfig,
) -> Result<String, String> {
    let paused_thread = recording.paused_thread_ref();
    let host = Arc::new(ReplayHost::new(recording));
    let session = DebugSession::new(host.clone(), host.clone(), reconcile);
    let view = CoroutineView::new(session, view_config);
    let point = view.on_paused(paused_thread).await;

    let text = match output {
        Output::Tree => {
            view.tree()
                .expand_all()
                .await
                .map_err(|e| format!("replay interrupted: {e}"))?;
            view.tree().outline()
        }
        Output::Dump => dump_point(&point).await.map_err(|e| e.to_string())?,
        Output::Json => {
            let report = report(&point).await?;
            let mut json = facet_json::to_string_pretty(&report)
                .map_err(|e| format!("encode report: {e}"))?;
            json.push('\n');
            json
        }
    };
    info!(
        dump_calls = host.dump_calls(),
        frames_calls = host.frames_calls(),
        line_lookups = host.line_lookups(),
        "replay finished"
    );
    view.force_clear();
    Ok(text)
}

async fn report(point: &SuspendPoint) -> Result<Report, String> {
    let records = match point.list_coroutines().await {
        Ok(records) => records,
        Err(StoreError::Fetch(error)) => {
            return Ok(Report {
                coroutines: Vec::new(),
                error: Some(error.to_string()),
            });
        }
        Err(error @ StoreError::Stale) => return Err(error.to_string()),
    };
    let mut coroutines = Vec::with_capacity(records.len());
    for record in records.iter() {
        let frames = point.frames(record).await.map_err(|e| e.to_string())?;
        let summary = record.summary();
        coroutines.push(CoroutineReport {
            id: summary.id,
            name: summary.name.clone(),
            state: summary.state,
            owner_thread: summary.owner_thread.clone(),
            frames: frames.to_vec(),
        });
    }
    Ok(Report {
        coroutines,
        error: None,
    })
}
