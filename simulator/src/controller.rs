//! Simulation controller: drives worker threads against one bank.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use branchledger_common::Amount;
use branchledger_ledger::{AuditReport, Bank, Discrepancy, Teller};

use crate::metrics::{Metrics, MetricsSnapshot, OperationKind};
use crate::scenario::{Operation, Scenario};

/// Worker settings.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Worker threads.
    pub workers: usize,
    /// Operations each worker runs.
    pub operations_per_worker: u64,
    /// Operations between report checkpoints; 0 disables them.
    pub report_interval: u64,
    /// Base seed; worker `n` uses `seed + n`.
    pub seed: Option<u64>,
}

/// One completed report checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Checkpoint number.
    pub generation: u64,
    /// Total balance seen with every worker parked.
    pub total: Amount,
    /// Configured opening total plus net external flow.
    pub expected: Amount,
    /// When the checkpoint completed.
    pub at: DateTime<Utc>,
}

impl ReportEntry {
    /// Check if the observed total matches the books.
    pub fn is_consistent(&self) -> bool {
        self.total == self.expected
    }
}

/// Result of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    /// Scenario that ran.
    pub scenario: String,
    /// Total balance before any worker started.
    pub opening_total: Amount,
    /// Total the bank was configured to open with.
    pub nominal_total: Amount,
    /// Operation counters.
    pub metrics: MetricsSnapshot,
    /// Report checkpoints in order.
    pub reports: Vec<ReportEntry>,
    /// Final audit.
    pub audit: AuditReport,
    /// Accounts whose balance changed over the run.
    pub changed_accounts: usize,
}

impl SimulationSummary {
    /// Check if the run left the bank consistent.
    pub fn is_consistent(&self) -> bool {
        self.audit.is_clean() && self.reports.iter().all(ReportEntry::is_consistent)
    }
}

/// Controls the simulation.
pub struct SimulationController {
    /// Shared bank.
    bank: Arc<Bank>,
    /// Worker settings.
    workload: WorkloadConfig,
    /// Simulation metrics.
    metrics: Arc<Metrics>,
    /// Completed report checkpoints.
    reports: Arc<Mutex<Vec<ReportEntry>>>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(bank: Arc<Bank>, workload: WorkloadConfig) -> Self {
        Self {
            bank,
            workload,
            metrics: Arc::new(Metrics::new()),
            reports: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Run a scenario to completion.
    pub fn run(&self, scenario: &Scenario) -> anyhow::Result<SimulationSummary> {
        if self.workload.workers == 0 {
            return Err(anyhow::anyhow!("Simulation needs at least one worker"));
        }

        info!(
            scenario = %scenario.name,
            workers = self.workload.workers,
            operations_per_worker = self.workload.operations_per_worker,
            "Running scenario: {}",
            scenario.description
        );

        let opening = self.bank.snapshot();
        let opening_total = opening.total();
        let nominal_total = self.bank.nominal_total();
        if opening_total != nominal_total {
            warn!(opening_total, nominal_total, "Bank opened off its configured total");
        }

        thread::scope(|scope| {
            for worker in 0..self.workload.workers {
                scope.spawn(move || self.run_worker(worker, scenario, nominal_total));
            }
        });

        let closing = self.bank.snapshot();
        let changed_accounts = opening
            .compare(&closing)
            .iter()
            .filter(|d| matches!(d, Discrepancy::Account { .. }))
            .count();

        let metrics = self.metrics.snapshot();
        let audit = self.bank.validate(Some(nominal_total + metrics.net_flow));
        let reports = self.reports.lock().clone();

        info!(
            operations = metrics.total_operations(),
            success_rate = metrics.success_rate(),
            changed_accounts,
            "Simulation complete"
        );

        Ok(SimulationSummary {
            scenario: scenario.name.clone(),
            opening_total,
            nominal_total,
            metrics,
            reports,
            audit,
            changed_accounts,
        })
    }

    fn run_worker(&self, worker: usize, scenario: &Scenario, nominal_total: Amount) {
        let mut rng = match self.workload.seed {
            Some(s) => StdRng::seed_from_u64(s.wrapping_add(worker as u64)),
            None => StdRng::from_entropy(),
        };
        let teller = Teller::new(&self.bank);

        for op in 1..=self.workload.operations_per_worker {
            let operation = scenario.next_operation(&self.bank, &mut rng);
            self.execute(&teller, operation);

            if self.workload.report_interval > 0 && op % self.workload.report_interval == 0 {
                self.bank
                    .report_checkpoint(self.workload.workers, |generation, total| {
                        self.record_report(generation, total, nominal_total);
                    });
            }
        }

        debug!(worker, "Worker finished");
    }

    fn execute(&self, teller: &Teller<'_>, operation: Operation) {
        let (kind, amount, outcome) = match operation {
            Operation::Deposit { account, amount } => {
                (OperationKind::Deposit, amount, teller.deposit(account, amount))
            }
            Operation::Withdraw { account, amount } => {
                (OperationKind::Withdraw, amount, teller.withdraw(account, amount))
            }
            Operation::Transfer { src, dst, amount } => {
                (OperationKind::Transfer, amount, teller.transfer(src, dst, amount))
            }
        };
        self.metrics.record(kind, amount, &outcome);
    }

    /// Runs under the bank lock with every other worker parked.
    fn record_report(&self, generation: u64, total: Amount, nominal_total: Amount) {
        let entry = ReportEntry {
            generation,
            total,
            expected: nominal_total + self.metrics.net_flow(),
            at: Utc::now(),
        };

        if entry.is_consistent() {
            info!(generation, total, "Balance report");
        } else {
            warn!(
                generation,
                total,
                expected = entry.expected,
                "Balance report does not match the books"
            );
        }
        self.reports.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchledger_ledger::{AuditIssue, BalanceCheck, LedgerConfig};

    fn controller(config: &LedgerConfig, workers: usize) -> SimulationController {
        let bank = Arc::new(Bank::new(config).unwrap());
        SimulationController::new(
            bank,
            WorkloadConfig {
                workers,
                operations_per_worker: 2_000,
                report_interval: 500,
                seed: Some(42),
            },
        )
    }

    #[test]
    fn test_every_scenario_stays_consistent() {
        for name in Scenario::NAMES {
            let controller = controller(&LedgerConfig::with_dimensions(4, 8, 1_000), 4);
            let summary = controller.run(&Scenario::load(name).unwrap()).unwrap();

            assert_eq!(summary.opening_total, 32_000);
            assert_eq!(summary.reports.len(), 4, "scenario {}", name);
            assert!(summary.is_consistent(), "scenario {}: {:?}", name, summary.audit);
            assert_eq!(summary.metrics.total_operations(), 8_000);
            assert_eq!(summary.metrics.account_not_found, 0);
        }
    }

    #[test]
    fn test_fault_injection_fails_audit() {
        let mut config = LedgerConfig::with_dimensions(2, 4, 1_000);
        config.fault_injection = true;
        let controller = controller(&config, 2);
        let summary = controller.run(&Scenario::load("transfer-storm").unwrap()).unwrap();

        assert_eq!(summary.nominal_total, 8_000);
        assert_eq!(summary.opening_total, 7_998);
        assert!(summary
            .audit
            .issues
            .iter()
            .any(|i| matches!(i, AuditIssue::TotalMismatch { expected: 8_000, actual: 7_998 })));
        assert!(summary.reports.iter().all(|r| !r.is_consistent()));
        assert!(!summary.is_consistent());
    }

    #[test]
    fn test_reports_match_in_advisory_mode() {
        let mut config = LedgerConfig::with_dimensions(3, 3, 500);
        config.balance_check = BalanceCheck::Advisory;
        let controller = controller(&config, 3);
        let summary = controller.run(&Scenario::load("balanced").unwrap()).unwrap();

        assert!(summary.reports.iter().all(ReportEntry::is_consistent));
        assert_eq!(summary.metrics.account_not_found, 0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let controller = controller(&LedgerConfig::default(), 0);
        assert!(controller.run(&Scenario::load("balanced").unwrap()).is_err());
    }
}
