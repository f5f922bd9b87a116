//! Budgeted generation loop.
//!
//! Runs the candidate generator one attempt at a time until the corpus reaches the
//! requested size, the provider signals a long-horizon limit, or the wall-clock budget
//! would be overrun. Only the initial corpus count can fail a run; everything after it
//! ends up in the returned [`RunResult`].

use std::{sync::Arc, time::Duration};

use tokio::time::{sleep, Instant};

use crate::{
    config::GenerationConfig,
    errors::AppResult,
    models::domain::{AttemptOutcome, RunResult, StopReason},
    services::{item_generator::CandidateGenerator, item_service::ItemService},
};

pub struct GenerationScheduler {
    generator: Arc<dyn CandidateGenerator>,
    items: Arc<ItemService>,
    budget: Duration,
    pause: Duration,
}

/// True when a sleep of `wait` started now would end no later than `deadline`.
fn fits_budget(deadline: Instant, wait: Duration) -> bool {
    Instant::now() + wait <= deadline
}

impl GenerationScheduler {
    pub fn new(
        generator: Arc<dyn CandidateGenerator>,
        items: Arc<ItemService>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            generator,
            items,
            budget: config.run_budget,
            pause: config.pause_between_items,
        }
    }

    pub async fn run(&self, target: u64) -> AppResult<RunResult> {
        let started = Instant::now();
        let deadline = started + self.budget;

        let initial = self.items.count_active().await?;
        let mut result = RunResult::new(target, initial);
        let needed = result.needed();

        log::info!(
            "Generation run started: target={} current={} needed={} budget={:?}",
            target,
            initial,
            needed,
            self.budget
        );

        loop {
            if result.generated >= needed {
                result.stop_reason = StopReason::TargetReached;
                break;
            }
            if Instant::now() >= deadline {
                log::warn!("Generation budget exhausted after {} attempts", result.attempts);
                result.stop_reason = StopReason::BudgetExhausted;
                break;
            }

            result.attempts += 1;
            let attempt = self.generator.generate(result.attempts).await;
            log::debug!(
                "Attempt {} finished in {:?} phase: {}",
                attempt.attempt_number,
                attempt.phase,
                attempt.outcome.label()
            );

            let wait = match attempt.outcome {
                AttemptOutcome::Success(item) => {
                    match self.items.store(*item).await {
                        Ok(_) => result.generated += 1,
                        Err(e) => result.errors.push(format!(
                            "attempt {}: failed to store item: {}",
                            attempt.attempt_number, e
                        )),
                    }
                    if result.generated >= needed {
                        continue;
                    }
                    self.pause
                }
                AttemptOutcome::Duplicate(_) => {
                    result.duplicates += 1;
                    continue;
                }
                AttemptOutcome::RateLimited(info) => {
                    result.rate_limit_waits_ms.push(info.wait_ms);
                    if info.is_daily {
                        log::warn!(
                            "Daily provider limit reached (wait {}ms), stopping run",
                            info.wait_ms
                        );
                        result.daily_limit_hit = true;
                        result.stop_reason = StopReason::DailyLimit;
                        break;
                    }
                    if !fits_budget(deadline, info.wait()) {
                        log::warn!(
                            "Rate limit wait of {}ms would overrun the budget, stopping run",
                            info.wait_ms
                        );
                        result.stop_reason = StopReason::BudgetExhausted;
                        break;
                    }
                    log::info!("Rate limited, waiting {}ms", info.wait_ms);
                    info.wait()
                }
                AttemptOutcome::Invalid(message) | AttemptOutcome::ProviderError(message) => {
                    result
                        .errors
                        .push(format!("attempt {}: {}", attempt.attempt_number, message));
                    self.pause
                }
            };

            if !fits_budget(deadline, wait) {
                result.stop_reason = StopReason::BudgetExhausted;
                break;
            }
            sleep(wait).await;
        }

        result.final_count = match self.items.count_active().await {
            Ok(count) => count,
            Err(e) => {
                log::warn!("Failed to recount items after run: {}", e);
                initial + result.generated
            }
        };
        result.elapsed_ms = started.elapsed().as_millis() as u64;

        log::info!(
            "Generation run finished ({:?}): generated={} duplicates={} errors={} attempts={} final={}",
            result.stop_reason,
            result.generated,
            result.duplicates,
            result.errors.len(),
            result.attempts,
            result.final_count
        );

        Ok(result)
    }
}
