//! Execution engine - converges planned writes, sequentially or in parallel

use crate::cache::{Cache, prefetch};
use crate::context::{AutoConfirm, ConfirmCallback, NoProgress, ProgressCallback};
use crate::error::{Error, Result};
use crate::planner::{Action, ExecutionPlan};
use crate::provider::Provider;
use crate::reconciler::{converge, into_apply_result};
use crate::record::DesiredEntry;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything one reconciliation run produced
#[derive(Debug)]
pub struct Reconciliation {
    /// Cache after the run, reflecting successful writes
    pub cache: Cache,
    /// The plan that was executed
    pub plan: ExecutionPlan,
    pub summary: ExecuteSummary,
}

/// Execute a plan against a prefetched cache
///
/// # Type Parameters
/// * `P` - Provider type
/// * `R` - Progress callback type
/// * `C` - Confirm callback type
///
/// # Arguments
/// * `provider` - Provider that issues the writes
/// * `cache` - Cache the plan was built from; updated as writes succeed
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, jobs, fail_fast)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary of execution results. A failing entry is counted and reported
/// but never stops the remaining entries unless `fail_fast` is set.
pub fn execute<P, R, C>(
    provider: &P,
    cache: &mut Cache,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut R,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: Provider + ?Sized,
    R: ProgressCallback,
    C: ConfirmCallback,
{
    let mut summary = ExecuteSummary::default();

    for change in &plan.changes {
        match &change.action {
            Action::NoOp => summary.no_change += 1,
            Action::Rejected { reason } => {
                let result = ApplyResult::Failed {
                    error: reason.clone(),
                    payload: None,
                };
                progress.on_entry_complete(&change.name, &result);
                summary.add_result(&result);
            }
            _ => {}
        }
    }

    let total_writes = plan.total_writes();
    if total_writes == 0 {
        return Ok(summary);
    }

    if opts.dry_run {
        log::debug!("Dry run: skipping {total_writes} write(s)");
        summary.skipped += total_writes;
        return Ok(summary);
    }

    let prompt = format!(
        "Apply {} change{}?",
        total_writes,
        if total_writes == 1 { "" } else { "s" }
    );
    let confirmed = confirm
        .confirm(&prompt)
        .map_err(|e| Error::Other(format!("confirmation failed: {e}")))?;
    if !confirmed {
        summary.skipped += total_writes;
        return Ok(summary);
    }

    let parallel = opts.jobs > 1 && total_writes > 1;
    progress.on_batch_start(total_writes, parallel);
    let results = if parallel {
        execute_parallel(provider, cache, plan, opts, progress)?
    } else {
        execute_sequential(provider, cache, plan, opts, progress)
    };
    progress.on_batch_complete();

    for result in &results {
        summary.add_result(result);
    }
    Ok(summary)
}

/// Converge writes one at a time in catalog order
fn execute_sequential<P, R>(
    provider: &P,
    cache: &mut Cache,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut R,
) -> Vec<ApplyResult>
where
    P: Provider + ?Sized,
    R: ProgressCallback,
{
    let mut results = Vec::with_capacity(plan.total_writes());
    let mut halted = false;

    for change in plan.writes() {
        let result = if halted {
            ApplyResult::Skipped {
                reason: "an earlier write failed".into(),
            }
        } else {
            progress.on_entry_start(&change.name, &provider.describe(&change.name));
            let outcome = match cache.get_mut(&change.name) {
                Some(entry) => converge(provider, entry, &change.action),
                None => Err(Error::Other(format!(
                    "'{}' is planned but not in the cache",
                    change.name
                ))),
            };
            into_apply_result(outcome)
        };

        if !result.is_success() {
            log::warn!("{} '{}' failed", cache.kind(), change.name);
            halted = opts.fail_fast;
        }
        progress.on_entry_complete(&change.name, &result);
        results.push(result);
    }

    results
}

/// Converge writes concurrently using rayon
///
/// Entries are independent because identity keys are unique across the
/// cache, so each worker owns exactly one entry.
fn execute_parallel<P, R>(
    provider: &P,
    cache: &mut Cache,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut R,
) -> Result<Vec<ApplyResult>>
where
    P: Provider + ?Sized,
    R: ProgressCallback,
{
    let actions: HashMap<&str, &Action> = plan
        .writes()
        .map(|c| (c.name.as_str(), &c.action))
        .collect();
    let halted = AtomicBool::new(false);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
        .map_err(|e| Error::Other(format!("Failed to create thread pool: {e}")))?;

    // Progress callbacks are not thread-safe; report after the batch
    let results: Vec<(String, ApplyResult)> = pool.install(|| {
        cache
            .entries_mut()
            .par_iter_mut()
            .filter_map(|entry| {
                let action = actions.get(entry.name())?;
                let name = entry.name().to_string();
                if halted.load(Ordering::SeqCst) {
                    return Some((
                        name,
                        ApplyResult::Skipped {
                            reason: "an earlier write failed".into(),
                        },
                    ));
                }

                let result = into_apply_result(converge(provider, entry, action));
                if !result.is_success() && opts.fail_fast {
                    halted.store(true, Ordering::SeqCst);
                }
                Some((name, result))
            })
            .collect()
    });

    for (name, result) in &results {
        progress.on_entry_complete(name, result);
    }

    Ok(results.into_iter().map(|(_, r)| r).collect())
}

/// Prefetch, plan and execute in one call
///
/// Discovery and ambiguity errors abort before anything is written.
pub fn reconcile<P, R, C>(
    provider: &P,
    desired: Vec<DesiredEntry>,
    opts: &ExecuteOptions,
    progress: &mut R,
    confirm: &mut C,
) -> Result<Reconciliation>
where
    P: Provider + ?Sized,
    R: ProgressCallback,
    C: ConfirmCallback,
{
    let mut cache = prefetch(provider, desired)?;
    let plan = ExecutionPlan::build(provider, &cache);
    let summary = execute(provider, &mut cache, &plan, opts, progress, confirm)?;
    Ok(Reconciliation {
        cache,
        plan,
        summary,
    })
}

/// Simple reconciliation without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn reconcile_simple<P: Provider + ?Sized>(
    provider: &P,
    desired: Vec<DesiredEntry>,
    opts: &ExecuteOptions,
) -> Result<Reconciliation> {
    reconcile(provider, desired, opts, &mut NoProgress, &mut AutoConfirm)
}
