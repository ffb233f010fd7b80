use chrono::Duration;
use duel_core::RunMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduled settlement jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Ingests projected and final fantasy points.
    PlayerResults,
    /// Settles matched contests.
    WinCriteria,
    /// Closes open contests nobody claimed.
    ContestClose,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [Self::PlayerResults, Self::WinCriteria, Self::ContestClose];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayerResults => "player_results",
            Self::WinCriteria => "win_criteria",
            Self::ContestClose => "contest_close",
        }
    }

    /// Accepts the stored snake_case name or the kebab-case CLI spelling.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "player_results" => Some(Self::PlayerResults),
            "win_criteria" => Some(Self::WinCriteria),
            "contest_close" => Some(Self::ContestClose),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time between the end of one tick and the start of the next.
#[must_use]
pub fn interval_for(job: JobKind, run_mode: RunMode) -> Duration {
    let minutes = match (job, run_mode) {
        (JobKind::PlayerResults, RunMode::Principal) => 5,
        (JobKind::PlayerResults, RunMode::Staging) => 15,
        (JobKind::WinCriteria, RunMode::Principal) => 2,
        (JobKind::WinCriteria, RunMode::Staging) => 10,
        (JobKind::ContestClose, RunMode::Principal) => 10,
        (JobKind::ContestClose, RunMode::Staging) => 30,
        (_, RunMode::Proxy) => 60,
    };
    Duration::minutes(minutes)
}

/// Counters for one tick of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Units examined.
    pub processed: usize,
    /// Contests written to a terminal state.
    pub settled: usize,
    /// Units deferred to a later tick or already handled elsewhere.
    pub skipped: usize,
    pub failed: usize,
}

impl TickReport {
    /// Status string persisted as `last_status`.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.failed == 0 {
            "ok"
        } else if self.failed < self.processed {
            "partial"
        } else {
            "failed"
        }
    }

    pub fn absorb(&mut self, other: TickReport) {
        self.processed += other.processed;
        self.settled += other.settled;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_table() {
        assert_eq!(interval_for(JobKind::PlayerResults, RunMode::Principal), Duration::minutes(5));
        assert_eq!(interval_for(JobKind::PlayerResults, RunMode::Staging), Duration::minutes(15));
        assert_eq!(interval_for(JobKind::WinCriteria, RunMode::Principal), Duration::minutes(2));
        assert_eq!(interval_for(JobKind::WinCriteria, RunMode::Staging), Duration::minutes(10));
        assert_eq!(interval_for(JobKind::ContestClose, RunMode::Principal), Duration::minutes(10));
        assert_eq!(interval_for(JobKind::ContestClose, RunMode::Staging), Duration::minutes(30));
        for job in JobKind::ALL {
            assert_eq!(interval_for(job, RunMode::Proxy), Duration::minutes(60));
        }
    }

    #[test]
    fn test_job_names() {
        for job in JobKind::ALL {
            assert_eq!(JobKind::parse(job.as_str()), Some(job));
        }
        assert_eq!(JobKind::parse("win-criteria"), Some(JobKind::WinCriteria));
        assert_eq!(JobKind::parse("settle"), None);
    }

    #[test]
    fn test_report_status() {
        let mut report = TickReport::default();
        assert_eq!(report.status(), "ok");

        report.absorb(TickReport {
            processed: 3,
            settled: 1,
            skipped: 1,
            failed: 1,
        });
        assert_eq!(report.status(), "partial");

        let all_failed = TickReport {
            processed: 2,
            failed: 2,
            ..TickReport::default()
        };
        assert_eq!(all_failed.status(), "failed");
    }
}
