//! Partition warehouse records into merge candidates.
//!
//! Records are keyed by library, instrument type, run type, study and
//! chemistry. Each partition is then checked for readiness (nothing being
//! archived, at least two completed components) and consistency (one LIMS,
//! one reference) before it becomes a [`CandidateGroup`].

use itertools::Itertools;
use merge_types::{Component, Composition, LibraryRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The attributes every member of a candidate group shares.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub library_id: String,
    pub instrument_type: String,
    pub run_type: String,
    pub study_id: String,
    pub chemistry: String,
}

impl GroupKey {
    pub fn of(record: &LibraryRecord) -> Self {
        GroupKey {
            library_id: record.library_id.clone(),
            instrument_type: record.instrument_type.clone(),
            run_type: record.run_type.clone(),
            study_id: record.study_id.clone(),
            chemistry: record.chemistry(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "library {} ({} {} {}, study {})",
            self.library_id, self.instrument_type, self.chemistry, self.run_type, self.study_id
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GroupingError {
    #[error("Components of {key} are tracked by more than one LIMS: {}", lims.join(", "))]
    MultipleLims { key: GroupKey, lims: Vec<String> },

    #[error(transparent)]
    Composition(#[from] anyhow::Error),
}

/// Why a partition produced no candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSkip {
    /// Every member has a status other than "qc complete".
    NoCompletedComponents,
    SingleComponent(Component),
    MultipleReferences(Vec<String>),
}

impl GroupSkip {
    /// True when the skip points at bad warehouse data rather than a group
    /// that is simply not ready.
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, GroupSkip::NoCompletedComponents)
    }
}

impl fmt::Display for GroupSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupSkip::NoCompletedComponents => write!(f, "no qc complete components"),
            GroupSkip::SingleComponent(component) => {
                write!(f, "single component {component}, nothing to merge")
            }
            GroupSkip::MultipleReferences(references) => {
                write!(f, "multiple references: {}", references.join(", "))
            }
        }
    }
}

/// What became of one partition.
#[derive(Debug)]
pub enum Partition {
    Candidate(CandidateGroup),
    /// Some component is being archived; try again on a later pass.
    Deferred(GroupKey),
    Skipped { key: GroupKey, reason: GroupSkip },
}

/// At least two completed, consistent components of one library.
#[derive(Debug, Clone)]
pub struct CandidateGroup {
    key: GroupKey,
    /// Sorted by component, one record per component.
    members: Vec<LibraryRecord>,
    composition: Composition,
}

impl CandidateGroup {
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn members(&self) -> &[LibraryRecord] {
        &self.members
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// The member sample and study attributes are taken from. Members agree
    /// on everything the merge depends on.
    pub fn representative(&self) -> &LibraryRecord {
        &self.members[0]
    }
}

pub struct CandidateGrouper {
    partitions: BTreeMap<GroupKey, Vec<LibraryRecord>>,
}

impl CandidateGrouper {
    pub fn new(records: impl IntoIterator<Item = LibraryRecord>) -> Self {
        let mut partitions: BTreeMap<GroupKey, Vec<LibraryRecord>> = BTreeMap::new();
        for record in records {
            partitions
                .entry(GroupKey::of(&record))
                .or_default()
                .push(record);
        }
        CandidateGrouper { partitions }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Classify each partition, in key order. An error means the input is
    /// inconsistent in a way that must stop the run.
    pub fn partitions(self) -> impl Iterator<Item = Result<Partition, GroupingError>> {
        self.partitions
            .into_iter()
            .map(|(key, members)| classify(key, members))
    }

    /// Only the candidate groups, with every other partition dropped.
    pub fn candidates(self) -> impl Iterator<Item = Result<CandidateGroup, GroupingError>> {
        self.partitions().filter_map(|partition| match partition {
            Ok(Partition::Candidate(group)) => Some(Ok(group)),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        })
    }
}

fn classify(key: GroupKey, members: Vec<LibraryRecord>) -> Result<Partition, GroupingError> {
    if members.iter().any(LibraryRecord::is_archival_in_progress) {
        return Ok(Partition::Deferred(key));
    }

    let mut completed: Vec<LibraryRecord> = members
        .into_iter()
        .filter(LibraryRecord::is_qc_complete)
        .collect();
    completed.sort_by_key(LibraryRecord::component);

    let components: Vec<Component> = completed
        .iter()
        .map(LibraryRecord::component)
        .dedup()
        .collect();
    let skip = match components.as_slice() {
        [] => Some(GroupSkip::NoCompletedComponents),
        [single] => Some(GroupSkip::SingleComponent(*single)),
        _ => None,
    };
    if let Some(reason) = skip {
        return Ok(Partition::Skipped { key, reason });
    }

    // Checked over every record, duplicates included, so that two records
    // of one component cannot disagree unnoticed.
    let lims: Vec<String> = completed
        .iter()
        .map(|r| r.lims_id.clone())
        .unique()
        .sorted()
        .collect();
    if lims.len() > 1 {
        return Err(GroupingError::MultipleLims { key, lims });
    }

    let references: Vec<Option<&str>> = completed
        .iter()
        .map(|r| r.reference_genome.as_deref())
        .unique()
        .sorted()
        .collect();
    if references.len() > 1 {
        let reason = GroupSkip::MultipleReferences(
            references
                .into_iter()
                .map(|r| r.unwrap_or("none").to_string())
                .collect(),
        );
        return Ok(Partition::Skipped { key, reason });
    }

    completed.dedup_by_key(|r| r.component());
    let composition = Composition::new(components)?;
    Ok(Partition::Candidate(CandidateGroup {
        key,
        members: completed,
        composition,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;
    use merge_types::RunStatus;
    use pretty_assertions::assert_eq;

    fn outcomes(records: Vec<LibraryRecord>) -> Vec<Partition> {
        CandidateGrouper::new(records)
            .partitions()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_two_consistent_members() {
        let groups: Vec<_> =
            CandidateGrouper::new(vec![record(2, 1, Some(3)), record(1, 2, Some(3))])
                .candidates()
                .collect::<Result<_, _>>()
                .unwrap();
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.composition().rpt_list(), "1:2:3;2:1:3");
        assert_eq!(group.representative().id_run, 1);
        assert_eq!(group.key().chemistry, "CCXY");
        assert_eq!(group.members().len(), 2);
    }

    #[test]
    fn test_single_completed_member() {
        let mut pending = record(2, 1, None);
        pending.status = Some(RunStatus::Other("run pending".into()));
        let parts = outcomes(vec![record(1, 1, None), pending]);
        assert!(matches!(
            parts.as_slice(),
            [Partition::Skipped {
                reason: GroupSkip::SingleComponent(_),
                ..
            }]
        ));
    }

    #[test]
    fn test_no_completed_members() {
        let mut a = record(1, 1, None);
        a.status = Some(RunStatus::Other("run on hold".into()));
        let parts = outcomes(vec![a]);
        assert!(matches!(
            parts.as_slice(),
            [Partition::Skipped {
                reason: GroupSkip::NoCompletedComponents,
                ..
            }]
        ));
    }

    #[test]
    fn test_absent_status_counts_as_complete() {
        let mut a = record(1, 1, None);
        a.status = None;
        let groups: Vec<_> = CandidateGrouper::new(vec![a, record(1, 2, None)])
            .candidates()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_multiple_references() {
        let mut b = record(1, 2, None);
        b.reference_genome = Some("Mus_musculus (GRCm38)".into());
        let parts = outcomes(vec![record(1, 1, None), b]);
        match parts.as_slice() {
            [Partition::Skipped {
                reason: GroupSkip::MultipleReferences(refs),
                ..
            }] => assert_eq!(
                refs,
                &vec![
                    "Homo_sapiens (GRCh38_15)".to_string(),
                    "Mus_musculus (GRCm38)".to_string()
                ]
            ),
            other => panic!("unexpected {other:?}"),
        }

        let mut c = record(1, 3, None);
        c.reference_genome = None;
        let parts = outcomes(vec![record(1, 1, None), c]);
        assert!(matches!(
            parts.as_slice(),
            [Partition::Skipped {
                reason: GroupSkip::MultipleReferences(_),
                ..
            }]
        ));
    }

    #[test]
    fn test_multiple_lims_is_fatal() {
        let mut b = record(1, 2, None);
        b.lims_id = "C_GCLP".into();
        let result: Result<Vec<_>, _> = CandidateGrouper::new(vec![record(1, 1, None), b])
            .partitions()
            .collect();
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            GroupingError::MultipleLims { ref lims, .. } if lims == &["C_GCLP", "SQSCP"]
        ));
    }

    #[test]
    fn test_archival_defers_partition() {
        let mut b = record(1, 2, None);
        b.status = Some(RunStatus::ArchivalInProgress);
        let parts = outcomes(vec![record(1, 1, None), b, record(1, 3, None)]);
        assert!(matches!(parts.as_slice(), [Partition::Deferred(_)]));
    }

    #[test]
    fn test_duplicate_records_collapse() {
        let parts = outcomes(vec![record(1, 1, None), record(1, 1, None)]);
        assert!(matches!(
            parts.as_slice(),
            [Partition::Skipped {
                reason: GroupSkip::SingleComponent(_),
                ..
            }]
        ));
    }

    #[test]
    fn test_skip_consistency() {
        assert!(GroupSkip::NoCompletedComponents.is_inconsistent());
        assert!(!GroupSkip::SingleComponent(Component::new(1, 1, None)).is_inconsistent());
        assert!(!GroupSkip::MultipleReferences(vec!["none".into()]).is_inconsistent());
    }

    #[test]
    fn test_duplicate_records_keep_one_member() {
        let groups: Vec<_> =
            CandidateGrouper::new(vec![record(1, 1, None), record(1, 1, None), record(1, 2, None)])
                .candidates()
                .collect::<Result<_, _>>()
                .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members().len(), 2);
        assert_eq!(groups[0].composition().rpt_list(), "1:1;1:2");
    }

    #[test]
    fn test_conflicting_duplicate_lims_is_fatal() {
        let mut dup = record(1, 1, None);
        dup.lims_id = "C_GCLP".into();
        let result: Result<Vec<_>, _> =
            CandidateGrouper::new(vec![record(1, 1, None), dup, record(1, 2, None)])
                .partitions()
                .collect();
        assert!(matches!(result, Err(GroupingError::MultipleLims { .. })));
    }

    #[test]
    fn test_conflicting_duplicate_reference_is_skipped() {
        let mut dup = record(1, 1, None);
        dup.reference_genome = Some("Mus_musculus (GRCm38)".into());
        let parts = outcomes(vec![record(1, 1, None), dup, record(1, 2, None)]);
        assert!(matches!(
            parts.as_slice(),
            [Partition::Skipped {
                reason: GroupSkip::MultipleReferences(_),
                ..
            }]
        ));
    }

    #[test]
    fn test_partitioning_keys() {
        let mut other_chemistry = record(3, 1, None);
        other_chemistry.flowcell_barcode = "HGXYZV3".into();
        let mut other_run_type = record(4, 1, None);
        other_run_type.run_type = "paired100".into();
        let mut other_library = record(5, 1, None);
        other_library.library_id = "1111".into();
        let grouper = CandidateGrouper::new(vec![
            record(1, 1, None),
            record(2, 1, None),
            other_chemistry,
            other_run_type,
            other_library,
        ]);
        assert_eq!(grouper.num_partitions(), 4);
        let candidates: Vec<_> = grouper
            .candidates()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].composition().rpt_list(), "1:1;2:1");
    }

    #[test]
    fn test_deterministic_order() {
        let records = vec![
            {
                let mut r = record(9, 1, None);
                r.library_id = "3".into();
                r
            },
            record(1, 1, None),
            record(1, 2, None),
            {
                let mut r = record(9, 2, None);
                r.library_id = "3".into();
                r
            },
        ];
        let mut reversed = records.clone();
        reversed.reverse();
        let keys = |records: Vec<LibraryRecord>| -> Vec<String> {
            CandidateGrouper::new(records)
                .candidates()
                .map(|g| g.unwrap().composition().digest().to_string())
                .collect()
        };
        assert_eq!(keys(records), keys(reversed));
    }
}
