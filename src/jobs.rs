use std::fmt;

use thiserror::Error;

/// Background workers the GUI can run. Only one runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Load,
    CrossReference,
    Update,
    Connect,
    TestConnection,
}

impl JobKind {
    /// Whether a failure of this job invalidates the live database status.
    pub fn drops_connection(self) -> bool {
        matches!(self, JobKind::Connect)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobKind::Load => "loading workbook",
            JobKind::CrossReference => "cross-referencing",
            JobKind::Update => "updating",
            JobKind::Connect => "connecting",
            JobKind::TestConnection => "testing connection",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("busy: {0} in progress")]
pub struct Busy(pub JobKind);

#[derive(Debug, Default)]
pub struct JobSlot {
    current: Option<JobKind>,
}

impl JobSlot {
    pub fn new() -> Self { Self::default() }

    pub fn begin(&mut self, kind: JobKind) -> Result<(), Busy> {
        match self.current {
            Some(running) => Err(Busy(running)),
            None => {
                self.current = Some(kind);
                Ok(())
            }
        }
    }

    /// Frees the slot if `kind` holds it. A stale finish from another kind is ignored.
    pub fn finish(&mut self, kind: JobKind) -> bool {
        if self.current == Some(kind) {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<JobKind> { self.current }
    pub fn is_busy(&self) -> bool { self.current.is_some() }

    /// Export and clear only run while nothing else touches the table.
    pub fn ensure_idle(&self) -> Result<(), Busy> {
        match self.current {
            Some(k) => Err(Busy(k)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_job_at_a_time() {
        let mut slot = JobSlot::new();
        slot.begin(JobKind::Load).unwrap();
        assert_eq!(slot.begin(JobKind::CrossReference), Err(Busy(JobKind::Load)));
        assert!(slot.ensure_idle().is_err());
        assert!(!slot.finish(JobKind::Update));
        assert!(slot.is_busy());
        assert!(slot.finish(JobKind::Load));
        assert!(slot.ensure_idle().is_ok());
        slot.begin(JobKind::CrossReference).unwrap();
        assert_eq!(slot.current(), Some(JobKind::CrossReference));
    }

    #[test]
    fn only_connect_failures_drop_the_connection() {
        assert!(JobKind::Connect.drops_connection());
        assert!(!JobKind::TestConnection.drops_connection());
        assert!(!JobKind::CrossReference.drops_connection());
        let mut slot = JobSlot::new();
        slot.begin(JobKind::TestConnection).unwrap();
        assert!(!slot.finish(JobKind::Connect));
        assert!(slot.finish(JobKind::TestConnection));
    }

    #[test]
    fn busy_message() {
        assert_eq!(Busy(JobKind::Load).to_string(), "busy: loading workbook in progress");
    }
}
