use std::time::Duration;

/// One pre-shutdown warning: how long before the shutdown moment it fires,
/// and the text delivered to players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub offset: Duration,
    pub message: String,
}

/// Warnings ordered by strictly decreasing offset, so they fire in
/// chronological order relative to a single shutdown target computed as
/// now + the largest offset.
#[derive(Debug, Clone, Default)]
pub struct WarningSchedule {
    warnings: Vec<Warning>,
}

impl WarningSchedule {
    /// Sorts descending by offset and drops duplicates; zero offsets are
    /// discarded (a zero-minute warning is the shutdown itself).
    pub fn new(mut warnings: Vec<Warning>) -> Self {
        warnings.retain(|w| !w.offset.is_zero());
        warnings.sort_by(|a, b| b.offset.cmp(&a.offset));
        warnings.dedup_by(|a, b| a.offset == b.offset);
        Self { warnings }
    }

    /// Build the schedule from configured minute offsets.
    pub fn from_minutes(minutes: &[u64]) -> Self {
        let warnings = minutes
            .iter()
            .map(|&m| Warning {
                offset: Duration::from_secs(m * 60),
                message: format!("Server backup in {m} minute(s)! Please prepare."),
            })
            .collect();
        Self::new(warnings)
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// The waits the notifier performs, in order. Each step is the pause
    /// before an action; `None` marks the final pause before quiesce. An
    /// empty schedule yields an empty timeline: quiesce proceeds at once.
    pub fn timeline(&self) -> Vec<(Duration, Option<&Warning>)> {
        let mut steps = Vec::with_capacity(self.warnings.len() + 1);
        let mut previous: Option<Duration> = None;
        for warning in &self.warnings {
            let wait = match previous {
                Some(prev) => prev - warning.offset,
                None => Duration::ZERO,
            };
            steps.push((wait, Some(warning)));
            previous = Some(warning.offset);
        }
        if let Some(last) = previous {
            steps.push((last, None));
        }
        steps
    }
}
