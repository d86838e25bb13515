//! Process exit status of a finished job.

use crate::{
    fetch::FetchReport,
    link::{LinkOutcome, LinkReport},
    normalize::NormalizeReport,
    translation::ImportReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// The job ran to the end but some items were not processed.
    ItemsFailed,
    /// The job stopped early.
    Fatal,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Success => 0,
            Status::ItemsFailed | Status::Fatal => 1,
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn from_result<R: Into<Status>, E>(result: Result<R, E>) -> Self {
        result.map_or(Status::Fatal, Into::into)
    }
}

impl From<FetchReport> for Status {
    fn from(report: FetchReport) -> Self {
        if report.is_success() {
            Status::Success
        } else {
            Status::ItemsFailed
        }
    }
}

impl From<NormalizeReport> for Status {
    fn from(report: NormalizeReport) -> Self {
        if report.is_success() {
            Status::Success
        } else {
            Status::ItemsFailed
        }
    }
}

impl From<LinkOutcome> for Status {
    fn from(outcome: LinkOutcome) -> Self {
        match outcome {
            LinkOutcome::Complete => Status::Success,
            LinkOutcome::NothingUpdated | LinkOutcome::Incomplete => Status::ItemsFailed,
        }
    }
}

impl From<LinkReport> for Status {
    fn from(report: LinkReport) -> Self {
        report.outcome().into()
    }
}

/// Absent fields are skipped with a warning, never counted as failures.
impl From<ImportReport> for Status {
    fn from(_: ImportReport) -> Self {
        Status::Success
    }
}
