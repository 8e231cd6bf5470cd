use super::{dispatch, open_session, record_failure, record_skipped, say};
use seed_core::collaborator;
use seed_core::measure::{Comparison, Measurement};
use seed_core::probe::ToolAvailability;
use seed_core::router::{CommandRouter, StepReport};
use seed_core::session::Session;
use seed_core::{Result, SeedError};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const BASELINE: &str = "baseline";
const IMPROVE: &str = "improve";
const BENCHMARK: &str = "benchmark";
const REPORT: &str = "report";

pub fn router() -> CommandRouter {
    CommandRouter::new("ci", "help")
        .command("baseline", "Time the engine benchmark before changes", baseline)
        .command("improve", "Run the engine improve step", improve)
        .command(
            "benchmark",
            "Time the engine benchmark and compare with the baseline",
            benchmark,
        )
        .command("report", "Write a Markdown report of the latest runs", report)
        .workflow(
            "all",
            "baseline, improve, benchmark, report",
            &["baseline", "improve", "benchmark", "report"],
        )
        .with_help()
}

pub fn run(root: &Path, args: &[String], json: bool, timeout: Option<u64>) -> anyhow::Result<()> {
    let session = open_session(root, json, timeout)?;
    dispatch(&router(), &session, args)
}

// ---------------------------------------------------------------------------
// baseline / benchmark
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MeasuredRecord<'a> {
    status: &'static str,
    tool: &'a str,
    args: &'a [String],
    measurement: &'a Measurement,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline_artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
}

fn baseline(session: &Session, _args: &[String]) -> Result<StepReport> {
    measure(session, BASELINE)
}

fn benchmark(session: &Session, _args: &[String]) -> Result<StepReport> {
    measure(session, BENCHMARK)
}

fn measure(session: &Session, category: &str) -> Result<StepReport> {
    let engine = session.probe.probe(&session.config.engine.tool);
    if !engine.present {
        return record_skipped(session, category, &engine);
    }

    let measurement = timed_runs(session, &engine, category)?;
    let baseline = if category == BENCHMARK {
        latest_measured_baseline(session)?
    } else {
        None
    };
    let comparison = baseline
        .as_ref()
        .map(|(_, base)| Comparison::between(base, &measurement));

    let path = session.artifacts.write(
        category,
        &MeasuredRecord {
            status: "measured",
            tool: &engine.tool,
            args: &session.config.engine.benchmark_args,
            measurement: &measurement,
            baseline_artifact: baseline.as_ref().map(|(p, _)| p.display().to_string()),
            comparison: comparison.clone(),
        },
    )?;

    say(
        session,
        format!(
            "{category}: {} runs, mean {:.1} ms (min {} ms, max {} ms, median {:.1} ms)",
            measurement.iterations,
            measurement.mean_ms,
            measurement.min_ms,
            measurement.max_ms,
            measurement.median_ms
        ),
    );
    if let Some(cmp) = &comparison {
        say(session, format!("  vs baseline: {}", describe_delta(cmp)));
    }
    say(session, format!("  record: {}", path.display()));
    Ok(StepReport::artifact(path))
}

/// Run the benchmark `ci.iterations` times, stopping at the first failure.
fn timed_runs(session: &Session, engine: &ToolAvailability, category: &str) -> Result<Measurement> {
    let args = &session.config.engine.benchmark_args;
    let iterations = session.config.ci.iterations.max(1);
    let mut durations = Vec::with_capacity(iterations as usize);

    for iteration in 1..=iterations {
        let output = collaborator::run(engine, args, &session.root, session.timeout)?;
        if !output.success {
            return Err(record_failure(session, category, &output));
        }
        tracing::debug!(iteration, duration_ms = output.duration_ms, "benchmark run");
        durations.push(output.duration_ms);
    }

    Measurement::from_durations(durations)
        .ok_or_else(|| SeedError::Failed("no benchmark run completed".to_string()))
}

fn latest_measured_baseline(session: &Session) -> Result<Option<(PathBuf, Measurement)>> {
    let entries = session.artifacts.list(BASELINE)?;
    for entry in entries.into_iter().rev().filter(|e| e.is_json()) {
        let artifact = session.artifacts.read(&entry.path)?;
        if artifact.payload.get("status").and_then(Value::as_str) != Some("measured") {
            continue;
        }
        let measurement = artifact
            .payload
            .get("measurement")
            .cloned()
            .and_then(|v| serde_json::from_value::<Measurement>(v).ok());
        if let Some(m) = measurement {
            return Ok(Some((entry.path, m)));
        }
    }
    Ok(None)
}

fn describe_delta(cmp: &Comparison) -> String {
    match cmp.delta_pct {
        Some(pct) => format!("{:+.1} ms ({:+.1}%)", cmp.delta_ms, pct),
        None => format!("{:+.1} ms", cmp.delta_ms),
    }
}

// ---------------------------------------------------------------------------
// improve
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ImproveRecord<'a> {
    status: &'static str,
    tool: &'a str,
    args: &'a [String],
    exit_code: Option<i32>,
    duration_ms: u64,
    stdout_tail: &'a str,
}

fn improve(session: &Session, _args: &[String]) -> Result<StepReport> {
    let engine = session.probe.probe(&session.config.engine.tool);
    if !engine.present {
        return record_skipped(session, IMPROVE, &engine);
    }

    let args = &session.config.engine.improve_args;
    let output = collaborator::run(&engine, args, &session.root, session.timeout)?;
    if !output.success {
        return Err(record_failure(session, IMPROVE, &output));
    }

    let path = session.artifacts.write(
        IMPROVE,
        &ImproveRecord {
            status: "completed",
            tool: &engine.tool,
            args,
            exit_code: output.exit_code,
            duration_ms: output.duration_ms,
            stdout_tail: &output.stdout,
        },
    )?;
    say(session, format!("improve: completed in {} ms", output.duration_ms));
    say(session, format!("  record: {}", path.display()));
    Ok(StepReport::artifact(path))
}

// ---------------------------------------------------------------------------
// report
// ---------------------------------------------------------------------------

/// What the latest artifact of one category says.
#[derive(Debug, Clone, PartialEq)]
struct Section {
    category: &'static str,
    status: String,
    artifact: Option<PathBuf>,
    detail: Option<String>,
}

fn section(session: &Session, category: &'static str) -> Result<Section> {
    let Some(entry) = session.artifacts.latest(category)? else {
        return Ok(Section {
            category,
            status: "absent".to_string(),
            artifact: None,
            detail: None,
        });
    };
    let payload = session.artifacts.read(&entry.path)?.payload;
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("recorded")
        .to_string();

    let detail = match status.as_str() {
        "measured" => payload
            .get("measurement")
            .cloned()
            .and_then(|v| serde_json::from_value::<Measurement>(v).ok())
            .map(|m| {
                let mut d = format!(
                    "mean {:.1} ms over {} runs (min {} ms, max {} ms, median {:.1} ms)",
                    m.mean_ms, m.iterations, m.min_ms, m.max_ms, m.median_ms
                );
                let cmp = payload
                    .get("comparison")
                    .cloned()
                    .and_then(|v| serde_json::from_value::<Comparison>(v).ok());
                if let Some(cmp) = cmp {
                    d.push_str(&format!("; vs baseline {}", describe_delta(&cmp)));
                }
                d
            }),
        "completed" => payload
            .get("duration_ms")
            .and_then(Value::as_u64)
            .map(|ms| format!("finished in {ms} ms")),
        "skipped" => payload
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        "failed" => Some(match payload.get("exit_code").and_then(Value::as_i64) {
            Some(code) => format!("exit code {code}"),
            None => "terminated".to_string(),
        }),
        _ => None,
    };

    Ok(Section {
        category,
        status,
        artifact: Some(entry.path),
        detail,
    })
}

fn render_report(sections: &[Section]) -> String {
    let mut md = String::from("# CI report\n\n");
    md.push_str("Timings are wall-clock durations of the engine benchmark command.\n\n");
    md.push_str("| Step | Status | Details |\n");
    md.push_str("|---|---|---|\n");
    for s in sections {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            s.category,
            s.status,
            s.detail.as_deref().unwrap_or("")
        ));
    }
    let recorded: Vec<&Section> = sections.iter().filter(|s| s.artifact.is_some()).collect();
    if !recorded.is_empty() {
        md.push_str("\n## Records\n\n");
        for s in recorded {
            if let Some(path) = &s.artifact {
                md.push_str(&format!("- {}: `{}`\n", s.category, path.display()));
            }
        }
    }
    md
}

fn report(session: &Session, _args: &[String]) -> Result<StepReport> {
    let sections = [BASELINE, IMPROVE, BENCHMARK]
        .into_iter()
        .map(|c| section(session, c))
        .collect::<Result<Vec<_>>>()?;

    let target = session.artifacts.summary_path(REPORT, "md")?;
    let path = session.artifacts.write_summary(&target, &render_report(&sections))?;

    for s in &sections {
        say(session, format!("{:<10} {}", s.category, s.status));
    }
    say(session, format!("report: {}", path.display()));
    Ok(StepReport::artifact(path))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
