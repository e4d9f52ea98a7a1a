// src/job/mod.rs

//! Jobs and job sets
//!
//! A job is one change to the installed system: install (new only), update
//! (old and new) or erase (old only). A [`JobSet`] enforces that no trove is
//! touched twice: no old side repeats, no new side repeats, and nothing is
//! both added and removed.

use crate::error::{Error, Result};
use crate::flavor::Flavor;
use crate::trove::Identity;
use crate::version::Version;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// One side of a job
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobSide {
    pub version: Version,
    pub flavor: Flavor,
}

impl From<&Identity> for JobSide {
    fn from(id: &Identity) -> Self {
        Self {
            version: id.version.clone(),
            flavor: id.flavor.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    Install,
    Update,
    Erase,
}

impl JobKind {
    pub fn as_str(&self) -> &str {
        match self {
            JobKind::Install => "install",
            JobKind::Update => "update",
            JobKind::Erase => "erase",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A requested or planned change to one trove name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub old: Option<JobSide>,
    pub new: Option<JobSide>,
    /// For requests: replace whatever is installed, not only `old`
    pub absolute: bool,
}

impl Job {
    /// Create a job; at least one side must be present
    pub fn new(
        name: impl Into<String>,
        old: Option<JobSide>,
        new: Option<JobSide>,
        absolute: bool,
    ) -> Result<Self> {
        let job = Self {
            name: name.into(),
            old,
            new,
            absolute,
        };
        job.check_sides()?;
        Ok(job)
    }

    /// Reject a job with neither side, however it was built
    pub fn check_sides(&self) -> Result<()> {
        if self.old.is_none() && self.new.is_none() {
            return Err(Error::InvalidJob {
                name: self.name.clone(),
                reason: "job has neither an old nor a new side".to_string(),
            });
        }
        Ok(())
    }

    /// Install `new`; absolute installs replace what is installed under the name
    pub fn install(new: &Identity, absolute: bool) -> Self {
        Self {
            name: new.name.clone(),
            old: None,
            new: Some(JobSide::from(new)),
            absolute,
        }
    }

    /// Replace `old` with `new`
    pub fn update(old: &Identity, new: &Identity) -> Self {
        Self {
            name: new.name.clone(),
            old: Some(JobSide::from(old)),
            new: Some(JobSide::from(new)),
            absolute: false,
        }
    }

    pub fn erase(old: &Identity) -> Self {
        Self {
            name: old.name.clone(),
            old: Some(JobSide::from(old)),
            new: None,
            absolute: false,
        }
    }

    pub fn kind(&self) -> JobKind {
        match (&self.old, &self.new) {
            (Some(_), Some(_)) => JobKind::Update,
            (Some(_), None) => JobKind::Erase,
            _ => JobKind::Install,
        }
    }

    pub fn is_erase(&self) -> bool {
        self.kind() == JobKind::Erase
    }

    pub fn old_identity(&self) -> Option<Identity> {
        self.old
            .as_ref()
            .map(|side| Identity::new(self.name.clone(), side.version.clone(), side.flavor.clone()))
    }

    pub fn new_identity(&self) -> Option<Identity> {
        self.new
            .as_ref()
            .map(|side| Identity::new(self.name.clone(), side.version.clone(), side.flavor.clone()))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |s: &Option<JobSide>| match s {
            Some(side) => format!("{}{}", side.version, side.flavor),
            None => "(none)".to_string(),
        };
        match self.kind() {
            JobKind::Install => write!(f, "Install {} ({})", self.name, side(&self.new)),
            JobKind::Erase => write!(f, "Erase {} ({})", self.name, side(&self.old)),
            JobKind::Update => write!(
                f,
                "Update {} ({} -> {})",
                self.name,
                side(&self.old),
                side(&self.new)
            ),
        }
    }
}

/// An ordered set of jobs with no trove touched twice
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSet {
    jobs: BTreeSet<Job>,
    olds: BTreeSet<Identity>,
    news: BTreeSet<Identity>,
}

impl JobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a job set, rejecting repeated sides
    pub fn from_jobs(jobs: impl IntoIterator<Item = Job>) -> Result<Self> {
        let mut set = Self::new();
        for job in jobs {
            set.insert(job)?;
        }
        Ok(set)
    }

    /// Add a job
    ///
    /// Returns false when the identical job is already present. A different
    /// job reusing an old or new side is an internal consistency error.
    pub fn insert(&mut self, job: Job) -> Result<bool> {
        job.check_sides()?;
        if self.jobs.contains(&job) {
            return Ok(false);
        }
        let old = job.old_identity();
        let new = job.new_identity();

        if let Some(old) = &old
            && self.olds.contains(old)
        {
            return Err(Error::InternalConsistency(format!(
                "{} is already removed by another job",
                old
            )));
        }
        if let Some(new) = &new
            && self.news.contains(new)
        {
            return Err(Error::InternalConsistency(format!(
                "{} is already installed by another job",
                new
            )));
        }

        if let Some(old) = old {
            self.olds.insert(old);
        }
        if let Some(new) = new {
            self.news.insert(new);
        }
        self.jobs.insert(job);
        Ok(true)
    }

    pub fn remove(&mut self, job: &Job) -> bool {
        if !self.jobs.remove(job) {
            return false;
        }
        if let Some(old) = job.old_identity() {
            self.olds.remove(&old);
        }
        if let Some(new) = job.new_identity() {
            self.news.remove(&new);
        }
        true
    }

    pub fn contains(&self, job: &Job) -> bool {
        self.jobs.contains(job)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Identities removed by some job
    pub fn erased(&self) -> &BTreeSet<Identity> {
        &self.olds
    }

    /// Identities added by some job
    pub fn installed(&self) -> &BTreeSet<Identity> {
        &self.news
    }

    /// The job whose old side is `old`
    pub fn job_removing(&self, old: &Identity) -> Option<&Job> {
        if !self.olds.contains(old) {
            return None;
        }
        self.jobs
            .iter()
            .find(|job| job.old_identity().as_ref() == Some(old))
    }

    /// Fail if any identity is both added and removed
    pub fn validate(&self) -> Result<()> {
        if let Some(both) = self.olds.intersection(&self.news).next() {
            return Err(Error::InternalConsistency(format!(
                "{} is both installed and removed",
                both
            )));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a JobSet {
    type Item = &'a Job;
    type IntoIter = std::collections::btree_set::Iter<'a, Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.iter()
    }
}

impl Serialize for JobSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo(rev: &str) -> Identity {
        Identity::parse(&format!("foo=/conary.example.com@rpl:2/{}", rev)).unwrap()
    }

    #[test]
    fn test_job_requires_a_side() {
        assert!(matches!(
            Job::new("foo", None, None, false),
            Err(Error::InvalidJob { .. })
        ));
        assert!(Job::new("foo", None, Some(JobSide::from(&foo("1.0-1-1"))), true).is_ok());
    }

    #[test]
    fn test_job_set_rejects_sideless_job() {
        let empty = Job {
            name: "foo".to_string(),
            old: None,
            new: None,
            absolute: false,
        };
        let mut jobs = JobSet::new();
        assert!(matches!(jobs.insert(empty.clone()), Err(Error::InvalidJob { .. })));
        assert!(jobs.is_empty());
        assert!(matches!(JobSet::from_jobs([empty]), Err(Error::InvalidJob { .. })));
    }

    #[test]
    fn test_job_kinds() {
        let v1 = foo("1.0-1-1");
        let v2 = foo("2.0-1-1");

        assert_eq!(Job::install(&v2, false).kind(), JobKind::Install);
        assert_eq!(Job::update(&v1, &v2).kind(), JobKind::Update);
        assert!(Job::erase(&v1).is_erase());
        assert_eq!(Job::update(&v1, &v2).old_identity(), Some(v1.clone()));
        assert_eq!(Job::update(&v1, &v2).new_identity(), Some(v2.clone()));
    }

    #[test]
    fn test_job_display() {
        let job = Job::update(&foo("1.0-1-1"), &foo("2.0-1-1"));
        assert_eq!(
            job.to_string(),
            "Update foo (/conary.example.com@rpl:2/1.0-1-1 -> /conary.example.com@rpl:2/2.0-1-1)"
        );
        assert_eq!(Job::erase(&foo("1.0-1-1")).to_string(), "Erase foo (/conary.example.com@rpl:2/1.0-1-1)");
    }

    #[test]
    fn test_job_set_rejects_repeated_sides() {
        let v1 = foo("1.0-1-1");
        let v2 = foo("2.0-1-1");
        let v3 = foo("3.0-1-1");

        let mut jobs = JobSet::new();
        assert!(jobs.insert(Job::update(&v1, &v2)).unwrap());
        // Identical job is a no-op
        assert!(!jobs.insert(Job::update(&v1, &v2)).unwrap());
        assert!(matches!(
            jobs.insert(Job::update(&v1, &v3)),
            Err(Error::InternalConsistency(_))
        ));
        assert!(matches!(
            jobs.insert(Job::install(&v2, false)),
            Err(Error::InternalConsistency(_))
        ));
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn test_job_set_validate() {
        let v1 = foo("1.0-1-1");
        let v2 = foo("2.0-1-1");

        let jobs = JobSet::from_jobs([Job::update(&v1, &v2), Job::erase(&v2)]).unwrap();
        assert!(matches!(jobs.validate(), Err(Error::InternalConsistency(_))));

        let jobs = JobSet::from_jobs([Job::update(&v1, &v2)]).unwrap();
        assert!(jobs.validate().is_ok());
    }

    #[test]
    fn test_job_set_remove_and_lookup() {
        let v1 = foo("1.0-1-1");
        let v2 = foo("2.0-1-1");
        let job = Job::update(&v1, &v2);

        let mut jobs = JobSet::from_jobs([job.clone()]).unwrap();
        assert_eq!(jobs.job_removing(&v1), Some(&job));
        assert!(jobs.erased().contains(&v1));
        assert!(jobs.installed().contains(&v2));

        assert!(jobs.remove(&job));
        assert!(jobs.is_empty());
        assert!(jobs.job_removing(&v1).is_none());
        // Sides are free again
        assert!(jobs.insert(Job::update(&v1, &foo("3.0-1-1"))).unwrap());
    }
}
