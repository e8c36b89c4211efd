//! cli::output
//!
//! Report rendering for processing runs.
//!
//! Output respects the quiet flag: quiet mode prints only failures.

use std::time::Duration;

use crate::engine::log::{EntryStatus, OperationLog};
use crate::engine::processor::FamilyProcessingContext;
use crate::engine::queue::{ExecKind, ExecutableMeta};

fn icon(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Pending => "…",
        EntryStatus::Success => "✓",
        EntryStatus::Skipped => "-",
        EntryStatus::Error => "✗",
    }
}

fn summarize(log: &OperationLog) -> String {
    format!(
        "{} ok, {} skipped, {} failed ({:.1?})",
        log.success_count(),
        log.skipped_count(),
        log.error_count(),
        log.elapsed
    )
}

/// Render one document's processing report.
pub fn render_context(ctx: &FamilyProcessingContext, quiet: bool) -> String {
    let mut out = String::new();
    match &ctx.outcome {
        Err(message) => {
            out.push_str(&format!("✗ {}: {message}\n", ctx.family));
        }
        Ok(logs) => {
            if quiet && !ctx.has_errors() {
                return out;
            }
            out.push_str(&format!("{} ({:.1?})\n", ctx.family, ctx.elapsed));
            for log in logs {
                out.push_str(&format!("  {}: {}\n", log.operation, summarize(log)));
                for entry in &log.entries {
                    if quiet && entry.status() != EntryStatus::Error {
                        continue;
                    }
                    let variant = entry
                        .variant
                        .as_ref()
                        .map(|v| format!(" [{v}]"))
                        .unwrap_or_default();
                    let detail = match (&entry.error, entry.messages.last()) {
                        (Some(e), _) => e.clone(),
                        (None, Some(m)) => m.clone(),
                        (None, None) => String::new(),
                    };
                    out.push_str(&format!(
                        "    {} {}{variant}: {detail}\n",
                        icon(entry.status()),
                        entry.name
                    ));
                }
            }
        }
    }
    out
}

/// Render the whole batch: per-document reports and a footer.
pub fn render_batch(contexts: &[FamilyProcessingContext], total: Duration, quiet: bool) -> String {
    let mut out = String::new();
    for ctx in contexts {
        out.push_str(&render_context(ctx, quiet));
    }
    let failed = contexts.iter().filter(|c| c.has_errors()).count();
    out.push_str(&format!(
        "{} documents processed, {} with errors ({:.1?})\n",
        contexts.len(),
        failed,
        total
    ));
    out
}

/// Render the compiled execution plan.
pub fn render_plan(metadata: &[ExecutableMeta]) -> String {
    let mut out = String::new();
    for (i, meta) in metadata.iter().enumerate() {
        let kind = match &meta.kind {
            ExecKind::Document => "document".to_string(),
            ExecKind::Variant => "per-variant".to_string(),
            ExecKind::MergedVariant { members } => {
                format!("merged sweep, {members} operations")
            }
        };
        out.push_str(&format!("{}. {} ({kind})\n   {}\n", i + 1, meta.name, meta.description));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::log::LogEntry;

    fn context_with(outcome: Result<Vec<OperationLog>, String>) -> FamilyProcessingContext {
        FamilyProcessingContext {
            family: "Cabinet".into(),
            run_id: uuid::Uuid::new_v4(),
            started_at: chrono::Utc::now(),
            outcome,
            elapsed: Duration::from_millis(12),
            pre_snapshots: Default::default(),
            post_snapshots: Default::default(),
            saved_to: None,
        }
    }

    #[test]
    fn failed_pipeline_always_rendered() {
        let ctx = context_with(Err("could not open".into()));
        let text = render_context(&ctx, true);
        assert!(text.contains("✗ Cabinet"));
        assert!(text.contains("could not open"));
    }

    #[test]
    fn quiet_hides_clean_documents() {
        let mut log = OperationLog::new("op");
        let mut entry = LogEntry::new("P");
        entry.succeed("ok").unwrap();
        log.push(entry);
        let ctx = context_with(Ok(vec![log]));
        assert!(render_context(&ctx, true).is_empty());
        assert!(render_context(&ctx, false).contains("1 ok"));
    }

    #[test]
    fn batch_footer_counts_failures() {
        let good = context_with(Ok(vec![]));
        let bad = context_with(Err("boom".into()));
        let text = render_batch(&[good, bad], Duration::from_secs(1), false);
        assert!(text.contains("2 documents processed, 1 with errors"));
    }
}
