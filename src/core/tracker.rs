//! Change tracking against a load-time baseline.
//!
//! The tracker owns the live record set for one student and cycle together
//! with the snapshot taken when it was loaded. Every edit goes through
//! [`ChangeTracker::set_field`], which keeps a minimal per-subject map of the
//! fields that currently differ from the snapshot.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::record::{EditableField, FieldValue, Status, SubjectId, SubjectRecord};
use crate::error::{Result, TrajectoryError};

/// Fields of one subject that differ from baseline.
pub type DirtyFields = BTreeMap<EditableField, FieldValue>;

/// One entry of a save request: the changed fields of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectUpdate {
    /// Subject id.
    #[serde(rename = "id_materia")]
    pub subject_id: SubjectId,
    /// Changed fields with their new values.
    pub fields: DirtyFields,
}

/// Live records plus baseline plus dirty map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeTracker {
    records: Vec<SubjectRecord>,
    baseline: BTreeMap<SubjectId, SubjectRecord>,
    dirty: BTreeMap<SubjectId, DirtyFields>,
}

impl ChangeTracker {
    /// Start tracking a freshly loaded record set.
    pub fn load(records: Vec<SubjectRecord>) -> Self {
        let mut tracker = Self::default();
        tracker.rebaseline(records);
        tracker
    }

    /// Replace records and baseline wholesale and clear the dirty map.
    ///
    /// Called with the authoritative record set after a load or a save.
    pub fn rebaseline(&mut self, records: Vec<SubjectRecord>) {
        let mut baseline = BTreeMap::new();
        for record in &records {
            baseline
                .entry(record.subject_id.clone())
                .or_insert_with(|| record.clone());
        }
        self.records = records;
        self.baseline = baseline;
        self.dirty.clear();
    }

    /// Live records.
    pub fn records(&self) -> &[SubjectRecord] {
        &self.records
    }

    /// Live record by subject id.
    pub fn record(&self, subject_id: &str) -> Option<&SubjectRecord> {
        self.records.iter().find(|r| r.subject_id == subject_id)
    }

    /// Baseline snapshot by subject id.
    pub fn baseline(&self, subject_id: &str) -> Option<&SubjectRecord> {
        self.baseline.get(subject_id)
    }

    /// The dirty map.
    pub fn dirty(&self) -> &BTreeMap<SubjectId, DirtyFields> {
        &self.dirty
    }

    /// Dirty fields of one subject.
    pub fn dirty_fields(&self, subject_id: &str) -> Option<&DirtyFields> {
        self.dirty.get(subject_id)
    }

    /// Whether anything differs from baseline. Save is only offered when true.
    pub fn can_save(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Whether any subject has a dirty value for `field`.
    pub fn has_dirty_field(&self, field: EditableField) -> bool {
        self.dirty.values().any(|fields| fields.contains_key(&field))
    }

    /// Set one field on one subject and update the dirty map.
    ///
    /// Returns whether the field differs from baseline afterwards. Rejected
    /// edits leave records and dirty map untouched.
    pub fn set_field(&mut self, subject_id: &str, value: FieldValue) -> Result<bool> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.subject_id == subject_id)
            .ok_or_else(|| TrajectoryError::unknown_subject(subject_id))?;

        validate_edit(record, value)?;

        let field = value.field();
        record.put(value);

        let original = self.baseline.get(subject_id).map(|base| base.get(field));
        let differs = original != Some(value);

        if differs {
            self.dirty
                .entry(subject_id.to_string())
                .or_default()
                .insert(field, value);
        } else if let Some(fields) = self.dirty.get_mut(subject_id) {
            fields.remove(&field);
            if fields.is_empty() {
                self.dirty.remove(subject_id);
            }
        }

        tracing::debug!(
            subject = subject_id,
            ?field,
            ?value,
            dirty = differs,
            "field set"
        );

        Ok(differs)
    }

    /// The dirty map as a save request body, in subject id order.
    pub fn updates(&self) -> Vec<SubjectUpdate> {
        self.dirty
            .iter()
            .map(|(subject_id, fields)| SubjectUpdate {
                subject_id: subject_id.clone(),
                fields: fields.clone(),
            })
            .collect()
    }

    /// Like [`updates`](Self::updates) but restricted to one field.
    pub fn updates_for(&self, field: EditableField) -> Vec<SubjectUpdate> {
        self.dirty
            .iter()
            .filter_map(|(subject_id, fields)| {
                fields.get(&field).map(|value| SubjectUpdate {
                    subject_id: subject_id.clone(),
                    fields: BTreeMap::from([(field, *value)]),
                })
            })
            .collect()
    }
}

/// Local preconditions for an edit.
fn validate_edit(record: &SubjectRecord, value: FieldValue) -> Result<()> {
    match value {
        FieldValue::Status(_) if record.is_approved() => Err(TrajectoryError::rejected(format!(
            "subject {} is already approved; its status cannot change",
            record.subject_id
        ))),
        FieldValue::Status(Status::ApprovedSentinel) => Err(TrajectoryError::rejected(format!(
            "the approved marker is set by the server, not on subject {}",
            record.subject_id
        ))),
        FieldValue::Outcome(outcome) if outcome.is_set() && !record.is_engaged() => {
            Err(TrajectoryError::rejected(format!(
                "subject {} is not being taken this cycle; it cannot get a closure outcome",
                record.subject_id
            )))
        }
        _ => Ok(()),
    }
}
