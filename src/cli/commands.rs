//! Command implementations

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use crate::app::{AppContainer, Notice, Session, Severity};
use crate::cli::args::{DetectArgs, ExportArgs, HistoryArgs, InspectArgs, RunArgs, SelectionArgs};
use crate::domain::model::*;
use crate::engine::{Dispatcher, JobObserver, JobToken};
use crate::output::SceneList;
use crate::utils::Utils;

/// Execute the inspect command
pub fn inspect(container: &dyn AppContainer, args: InspectArgs) -> Result<()> {
    let mut session = container.session();
    let media = session.load(&args.input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&media)?);
    } else {
        println!("File: {}", file_label(&args.input));
        println!("{}", media);
    }
    Ok(())
}

/// Execute the detect command
pub async fn detect(container: &dyn AppContainer, args: DetectArgs) -> Result<()> {
    let threshold = args.threshold.unwrap_or(container.config().threshold);
    let mut dispatcher = container.dispatcher();
    let mut session = container.session();
    session.load(&args.input)?;

    detect_scenes(&mut dispatcher, &mut session, threshold).await?;
    print_scenes(&session);

    if let Some(path) = args.save {
        let list = SceneList {
            source: args.input.clone(),
            threshold,
            scenes: session.scenes().to_vec(),
        };
        list.save(&path)
            .with_context(|| format!("Failed to save scene list to {}", path.display()))?;
        println!("Saved scene list to {}", path.display());
    }
    Ok(())
}

/// Execute the export command
pub async fn export(container: &dyn AppContainer, args: ExportArgs) -> Result<()> {
    let mut dispatcher = container.dispatcher();
    let mut session = container.session();
    session.load(&args.input)?;

    match &args.scenes {
        Some(path) => {
            let list = SceneList::load(path)?;
            if list.source != args.input {
                warn!(
                    "Scene list was made for {}, exporting from {}",
                    list.source.display(),
                    args.input.display()
                );
            }
            session.replace_scenes(list.scenes);
        }
        None => {
            let threshold = args.threshold.unwrap_or(container.config().threshold);
            detect_scenes(&mut dispatcher, &mut session, threshold).await?;
        }
    }

    export_scenes(&mut dispatcher, &mut session, &args.selection).await
}

/// Execute the run command: detect, list, then export
pub async fn run(container: &dyn AppContainer, args: RunArgs) -> Result<()> {
    let threshold = args.threshold.unwrap_or(container.config().threshold);
    let mut dispatcher = container.dispatcher();
    let mut session = container.session();
    session.load(&args.input)?;

    detect_scenes(&mut dispatcher, &mut session, threshold).await?;
    print_scenes(&session);
    export_scenes(&mut dispatcher, &mut session, &args.selection).await
}

/// Execute the history command
pub fn history(container: &dyn AppContainer, args: HistoryArgs) -> Result<()> {
    let kind = JobKind::parse(&args.kind)?;
    let records = container.run_log().history(kind);

    if records.is_empty() {
        println!("No {} runs recorded.", kind);
        return Ok(());
    }

    let skip = records.len().saturating_sub(args.limit);
    for record in &records[skip..] {
        if args.json {
            println!("{}", serde_json::to_string(record)?);
            continue;
        }
        let field = |name: &str| match &record[name] {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "-".to_string(),
            other => other.to_string(),
        };
        let detail = match kind {
            JobKind::Detect => format!(
                "scenes={} threshold={}",
                field("scene_count"),
                field("threshold")
            ),
            JobKind::Export => format!(
                "requested={} ok={} failed={}",
                field("requested"),
                field("ok"),
                field("failed")
            ),
        };
        let late = if record["watchdog_fired"] == true {
            " (late)"
        } else {
            ""
        };
        println!(
            "{}  {:<7}  {}  {}  {}s{}",
            field("timestamp"),
            field("status"),
            field("file"),
            detail,
            field("elapsed_s"),
            late
        );
    }
    Ok(())
}

/// Prints progress to stderr while forwarding every event to the session
struct Console<'a> {
    session: &'a mut Session,
}

impl JobObserver for Console<'_> {
    fn on_progress(&mut self, token: JobToken, event: ProgressEvent) {
        self.session.on_progress(token, event);
        match (event.phase, event.done, event.total, event.percent()) {
            (ProgressPhase::Step, Some(done), Some(total), Some(percent)) => {
                eprintln!("[{}] {}/{} ({:.0}%)", token.kind, done, total, percent)
            }
            (ProgressPhase::Start, ..) => {
                eprintln!("[{}] {}", token.kind, self.session.status())
            }
            _ => {}
        }
    }

    fn on_result(&mut self, token: JobToken, outcome: &JobOutcome, watchdog_fired: bool) {
        self.session.on_result(token, outcome, watchdog_fired);
        if let Some(payload) = outcome.payload() {
            info!(
                "{} finished in {}",
                token,
                Utils::format_duration(payload.elapsed())
            );
        }
    }

    fn on_watchdog(&mut self, token: JobToken) {
        self.session.on_watchdog(token);
    }
}

/// Pump events until every job has reported; Ctrl-C shuts the dispatcher down
async fn pump(dispatcher: &mut Dispatcher, session: &mut Session) -> Result<()> {
    let interrupted = {
        let mut console = Console {
            session: &mut *session,
        };
        tokio::select! {
            _ = dispatcher.run_until_idle(&mut console) => false,
            _ = tokio::signal::ctrl_c() => true,
        }
    };

    print_notices(session.take_notices());

    if interrupted {
        warn!("Interrupted, stopping background jobs");
        dispatcher.shutdown().await;
        bail!("Interrupted");
    }
    Ok(())
}

async fn detect_scenes(
    dispatcher: &mut Dispatcher,
    session: &mut Session,
    threshold: f64,
) -> Result<()> {
    if let Err(e) = session.request_detect(dispatcher, threshold) {
        print_notices(session.take_notices());
        return Err(e.into());
    }
    pump(dispatcher, session).await?;

    match session.last_detect() {
        Some(report) => {
            info!("{} scene(s) at threshold {}", report.scenes.len(), report.threshold);
            Ok(())
        }
        None => Err(anyhow!("{}", session.status())),
    }
}

async fn export_scenes(
    dispatcher: &mut Dispatcher,
    session: &mut Session,
    selection: &SelectionArgs,
) -> Result<()> {
    if selection.all {
        session.check_all();
    } else {
        session.check(&selection.select)?;
    }

    if let Err(e) = session.request_export(dispatcher) {
        print_notices(session.take_notices());
        return Err(e.into());
    }
    pump(dispatcher, session).await?;

    let report = session
        .last_export()
        .ok_or_else(|| anyhow!("{}", session.status()))?;
    for item in report.items.iter().filter(|item| item.ok) {
        println!("{}", item.output.display());
    }
    println!("{}", session.status());

    if report.ok == 0 {
        bail!("No clips were exported");
    }
    Ok(())
}

fn print_scenes(session: &Session) {
    for label in session.scene_labels() {
        println!("{}", label);
    }
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        match notice.severity {
            Severity::Info => eprintln!("{}", notice),
            Severity::Warning => eprintln!("warning: {}", notice),
            Severity::Error => eprintln!("error: {}", notice),
        }
    }
}
