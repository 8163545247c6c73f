//! Record types for the trajectory engine.
//!
//! These types mirror what the remote service stores per student and cycle.
//! Enumerations decode leniently (trimmed, case-folded, unknown -> unset) and
//! serialize back to the exact wire spelling the service expects.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::util::{self, WireText};

/// Identifier of a subject within the catalog.
pub type SubjectId = String;

// =============================================================================
// Enumerations
// =============================================================================

/// Academic condition of a subject for a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "WireText", into = "&'static str")]
pub enum AcademicCondition {
    /// No condition recorded.
    #[default]
    Unset,
    /// Passed in some earlier cycle.
    Approved,
    /// Still owed.
    Owed,
}

impl AcademicCondition {
    /// Parse a raw cell value. Unknown values degrade to `Unset`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "aprobada" => Self::Approved,
            "adeuda" => Self::Owed,
            _ => Self::Unset,
        }
    }

    /// Wire spelling.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Approved => "aprobada",
            Self::Owed => "adeuda",
        }
    }
}

impl From<WireText> for AcademicCondition {
    fn from(raw: WireText) -> Self {
        Self::parse(&raw.0)
    }
}

impl From<AcademicCondition> for &'static str {
    fn from(value: AcademicCondition) -> Self {
        value.as_wire()
    }
}

/// Enrollment status of a subject in the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "WireText", into = "&'static str")]
pub enum Status {
    /// Nothing decided yet.
    #[default]
    Unset,
    /// Taken for the first time (regular load).
    FirstTime,
    /// Taken again (regular load).
    Repeat,
    /// Supplementary enrollment for an owed subject.
    Intensification,
    /// Not taken this cycle because the regular-load cap was reached.
    CappedOut,
    /// Not taken this cycle for some other reason.
    NotEnrolledOther,
    /// Postponed to a later cycle.
    Deferred,
    /// Fixed marker carried by every approved subject.
    ApprovedSentinel,
}

impl Status {
    /// Every status a user may pick for a non-approved subject.
    pub const SELECTABLE: [Status; 7] = [
        Status::Unset,
        Status::FirstTime,
        Status::Repeat,
        Status::Intensification,
        Status::CappedOut,
        Status::NotEnrolledOther,
        Status::Deferred,
    ];

    /// Parse a raw cell value. Unknown values degrade to `Unset`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "cursa_primera_vez" => Self::FirstTime,
            "recursa" => Self::Repeat,
            "intensifica" => Self::Intensification,
            "no_cursa_por_tope" => Self::CappedOut,
            "no_cursa_otro_motivo" => Self::NotEnrolledOther,
            "cursa_ciclo_siguiente" => Self::Deferred,
            "no_cursa_aprobada" => Self::ApprovedSentinel,
            "" => Self::Unset,
            other => {
                tracing::debug!(value = other, "unrecognized status, treating as unset");
                Self::Unset
            }
        }
    }

    /// Wire spelling.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::FirstTime => "cursa_primera_vez",
            Self::Repeat => "recursa",
            Self::Intensification => "intensifica",
            Self::CappedOut => "no_cursa_por_tope",
            Self::NotEnrolledOther => "no_cursa_otro_motivo",
            Self::Deferred => "cursa_ciclo_siguiente",
            Self::ApprovedSentinel => "no_cursa_aprobada",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Unset => "-",
            Self::FirstTime => "First time (regular)",
            Self::Repeat => "Repeat (regular)",
            Self::Intensification => "Intensification",
            Self::CappedOut => "Not enrolled (load cap)",
            Self::NotEnrolledOther => "Not enrolled (other)",
            Self::Deferred => "Deferred to a later cycle",
            Self::ApprovedSentinel => "Not enrolled (approved)",
        }
    }

    /// Counts toward the regular load.
    pub fn is_regular(self) -> bool {
        matches!(self, Self::FirstTime | Self::Repeat)
    }

    /// Needs a closure outcome at the end of the cycle.
    pub fn is_engaged(self) -> bool {
        matches!(self, Self::FirstTime | Self::Repeat | Self::Intensification)
    }

    /// Parse a CLI-friendly name (`first-time`, `repeat`, ...) or a wire value.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('_', "-");
        let status = match normalized.as_str() {
            "unset" | "none" => Self::Unset,
            "first-time" => Self::FirstTime,
            "repeat" => Self::Repeat,
            "intensification" => Self::Intensification,
            "capped-out" => Self::CappedOut,
            "not-enrolled-other" => Self::NotEnrolledOther,
            "deferred" => Self::Deferred,
            _ => {
                let parsed = Self::parse(name);
                if parsed == Self::Unset {
                    return None;
                }
                parsed
            }
        };
        Some(status)
    }
}

impl From<WireText> for Status {
    fn from(raw: WireText) -> Self {
        Self::parse(&raw.0)
    }
}

impl From<Status> for &'static str {
    fn from(value: Status) -> Self {
        value.as_wire()
    }
}

/// Pass/fail result recorded at cycle end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "WireText", into = "&'static str")]
pub enum ClosureOutcome {
    /// Not recorded.
    #[default]
    Unset,
    /// The student passed.
    Passed,
    /// The student did not pass.
    Failed,
}

impl ClosureOutcome {
    /// Parse a raw cell value, accepting the synonyms staff type by hand.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "aprobada" | "aprobo" | "aprobó" | "si" | "sí" => Self::Passed,
            "no_aprobada" | "no aprobada" | "no_aprobo" | "no aprobó" | "no" => Self::Failed,
            _ => Self::Unset,
        }
    }

    /// Wire spelling.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Passed => "aprobada",
            Self::Failed => "no_aprobada",
        }
    }

    /// Whether an outcome has been recorded.
    pub fn is_set(self) -> bool {
        self != Self::Unset
    }
}

impl From<WireText> for ClosureOutcome {
    fn from(raw: WireText) -> Self {
        Self::parse(&raw.0)
    }
}

impl From<ClosureOutcome> for &'static str {
    fn from(value: ClosureOutcome) -> Self {
        value.as_wire()
    }
}

// =============================================================================
// Editable fields
// =============================================================================

/// The fields a session may change on a subject record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EditableField {
    /// Current-cycle status.
    #[serde(rename = "situacion_actual")]
    Status,
    /// Closure outcome.
    #[serde(rename = "resultado_cierre")]
    Outcome,
}

/// A typed value for one editable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Status(Status),
    Outcome(ClosureOutcome),
}

impl FieldValue {
    /// The field this value belongs to.
    pub fn field(self) -> EditableField {
        match self {
            Self::Status(_) => EditableField::Status,
            Self::Outcome(_) => EditableField::Outcome,
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// One subject for one student in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    /// Catalog id of the subject.
    #[serde(rename = "id_materia", deserialize_with = "util::text")]
    pub subject_id: SubjectId,
    /// Subject name (denormalized from the catalog).
    #[serde(rename = "nombre", default, deserialize_with = "util::text")]
    pub name: String,
    /// Grade level the subject belongs to.
    #[serde(rename = "anio", default, deserialize_with = "util::grade")]
    pub grade: Option<u8>,
    /// Academic condition.
    #[serde(rename = "condicion_academica", default)]
    pub condition: AcademicCondition,
    /// Current-cycle status.
    #[serde(rename = "situacion_actual", default)]
    pub status: Status,
    /// Whether the student never took this subject.
    #[serde(rename = "nunca_cursada", default, deserialize_with = "util::flag")]
    pub never_taken: bool,
    /// Closure outcome.
    #[serde(rename = "resultado_cierre", default)]
    pub outcome: ClosureOutcome,
    /// Whether the cycle has been closed for this row.
    #[serde(rename = "ciclo_cerrado", default, deserialize_with = "util::flag")]
    pub cycle_closed: bool,
}

impl SubjectRecord {
    /// Create a record with only id, name and grade set.
    pub fn new(subject_id: impl Into<String>, name: impl Into<String>, grade: u8) -> Self {
        Self {
            subject_id: subject_id.into(),
            name: name.into(),
            grade: Some(grade),
            condition: AcademicCondition::Unset,
            status: Status::Unset,
            never_taken: false,
            outcome: ClosureOutcome::Unset,
            cycle_closed: false,
        }
    }

    /// Builder: set the status.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Builder: set the academic condition.
    ///
    /// Approved subjects always carry the approved sentinel status.
    pub fn with_condition(mut self, condition: AcademicCondition) -> Self {
        self.condition = condition;
        if condition == AcademicCondition::Approved {
            self.status = Status::ApprovedSentinel;
        }
        self
    }

    /// Builder: set the closure outcome.
    pub fn with_outcome(mut self, outcome: ClosureOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Whether the subject is already approved.
    pub fn is_approved(&self) -> bool {
        self.condition == AcademicCondition::Approved
    }

    /// Counts toward the regular load.
    pub fn is_regular(&self) -> bool {
        !self.is_approved() && self.status.is_regular()
    }

    /// Counts toward the intensification load.
    pub fn is_intensification(&self) -> bool {
        !self.is_approved() && self.status == Status::Intensification
    }

    /// Needs a closure outcome.
    pub fn is_engaged(&self) -> bool {
        !self.is_approved() && self.status.is_engaged()
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.subject_id
        } else {
            &self.name
        }
    }

    /// Current value of an editable field.
    pub fn get(&self, field: EditableField) -> FieldValue {
        match field {
            EditableField::Status => FieldValue::Status(self.status),
            EditableField::Outcome => FieldValue::Outcome(self.outcome),
        }
    }

    /// Overwrite an editable field. Validation is the caller's job.
    pub(crate) fn put(&mut self, value: FieldValue) {
        match value {
            FieldValue::Status(status) => self.status = status,
            FieldValue::Outcome(outcome) => self.outcome = outcome,
        }
    }
}

/// Display order used everywhere: grade level (missing first), then name.
pub fn display_order(a: &SubjectRecord, b: &SubjectRecord) -> Ordering {
    a.grade
        .unwrap_or(0)
        .cmp(&b.grade.unwrap_or(0))
        .then_with(|| a.display_name().cmp(b.display_name()))
        .then_with(|| a.subject_id.cmp(&b.subject_id))
}

/// A student as returned with a status payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Student id.
    #[serde(rename = "id_estudiante", default, deserialize_with = "util::text")]
    pub id: String,
    /// Surname.
    #[serde(rename = "apellido", default, deserialize_with = "util::text")]
    pub surname: String,
    /// Given name.
    #[serde(rename = "nombre", default, deserialize_with = "util::text")]
    pub name: String,
    /// Current grade level.
    #[serde(rename = "anio_actual", default, deserialize_with = "util::grade")]
    pub grade: Option<u8>,
    /// Section.
    #[serde(default, deserialize_with = "util::text")]
    pub division: String,
    /// Shift (morning, afternoon, ...).
    #[serde(rename = "turno", default, deserialize_with = "util::text")]
    pub shift: String,
    /// Whether the student has graduated.
    #[serde(rename = "egresado", default, deserialize_with = "util::flag")]
    pub graduated: bool,
    /// Track/orientation, relevant for the upper grades.
    #[serde(
        rename = "orientacion",
        default,
        deserialize_with = "util::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub track: Option<String>,
}

impl Student {
    /// "Surname, Name", or whatever part is present.
    pub fn display_name(&self) -> String {
        match (self.surname.is_empty(), self.name.is_empty()) {
            (false, false) => format!("{}, {}", self.surname, self.name),
            (false, true) => self.surname.clone(),
            (true, false) => self.name.clone(),
            (true, true) if !self.id.is_empty() => self.id.clone(),
            (true, true) => "Student".to_string(),
        }
    }
}

/// A row of the subject catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCatalogEntry {
    /// Subject id.
    #[serde(rename = "id_materia", deserialize_with = "util::text")]
    pub id: SubjectId,
    /// Subject name.
    #[serde(rename = "nombre", default, deserialize_with = "util::text")]
    pub name: String,
    /// Owning grade level.
    #[serde(rename = "anio", default, deserialize_with = "util::grade")]
    pub grade: Option<u8>,
    /// Track restriction, if any.
    #[serde(
        rename = "orientacion",
        default,
        deserialize_with = "util::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub track: Option<String>,
}

impl SubjectCatalogEntry {
    /// Create a catalog entry.
    pub fn new(id: impl Into<String>, name: impl Into<String>, grade: u8) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            grade: Some(grade),
            track: None,
        }
    }

    /// Builder: restrict to a track.
    pub fn with_track(mut self, track: impl Into<String>) -> Self {
        self.track = Some(track.into());
        self
    }

    /// Whether this entry applies to the given student.
    ///
    /// Subjects above the student's grade never apply; a track restriction
    /// must match the student's track (case-insensitively).
    pub fn applies_to(&self, student: &Student) -> bool {
        let Some(grade) = self.grade else {
            return false;
        };
        if student.grade.is_some_and(|current| grade > current) {
            return false;
        }
        match &self.track {
            None => true,
            Some(track) => student
                .track
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(track)),
        }
    }
}

/// The authoritative record set for one student in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentStatus {
    /// Cycle label.
    #[serde(rename = "ciclo_lectivo", default, deserialize_with = "util::text")]
    pub cycle: String,
    /// Student attributes.
    #[serde(rename = "estudiante", default)]
    pub student: Student,
    /// Subject records.
    #[serde(rename = "materias", default)]
    pub records: Vec<SubjectRecord>,
}

impl StudentStatus {
    /// Whether any record carries the cycle-closed flag.
    pub fn is_cycle_closed(&self) -> bool {
        self.records.iter().any(|r| r.cycle_closed)
    }
}

/// A row of the student roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummary {
    /// Student id.
    #[serde(rename = "id_estudiante", default, deserialize_with = "util::text")]
    pub id: String,
    /// Surname.
    #[serde(rename = "apellido", default, deserialize_with = "util::text")]
    pub surname: String,
    /// Given name.
    #[serde(rename = "nombre", default, deserialize_with = "util::text")]
    pub name: String,
    /// Current grade level.
    #[serde(rename = "anio_actual", default, deserialize_with = "util::grade")]
    pub grade: Option<u8>,
    /// Section.
    #[serde(default, deserialize_with = "util::text")]
    pub division: String,
    /// Shift.
    #[serde(rename = "turno", default, deserialize_with = "util::text")]
    pub shift: String,
    /// The cycle has been closed for this student.
    #[serde(rename = "ciclo_cerrado", default, deserialize_with = "util::flag")]
    pub cycle_closed: bool,
    /// Flagged for review (regular load over the cap after rollover).
    #[serde(rename = "rosado", default, deserialize_with = "util::flag")]
    pub needs_review: bool,
}

impl StudentSummary {
    /// Case-insensitive substring search over id, names, section, grade and shift.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let grade = self.grade.map(|g| g.to_string()).unwrap_or_default();
        let haystack = format!(
            "{} {} {} {} {} {}",
            self.id, self.surname, self.name, self.division, grade, self.shift
        )
        .to_lowercase();
        haystack.contains(&query)
    }

    /// "Surname, Name".
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.surname, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_round_trip_spelling() {
        for status in Status::SELECTABLE {
            assert_eq!(Status::parse(status.as_wire()), status);
        }
        assert_eq!(
            Status::parse(Status::ApprovedSentinel.as_wire()),
            Status::ApprovedSentinel
        );
    }

    #[test]
    fn test_status_parse_normalizes() {
        assert_eq!(Status::parse("  RECURSA "), Status::Repeat);
        assert_eq!(Status::parse("something-else"), Status::Unset);
    }

    #[test]
    fn test_status_from_name() {
        assert_eq!(Status::from_name("first-time"), Some(Status::FirstTime));
        assert_eq!(Status::from_name("capped_out"), Some(Status::CappedOut));
        assert_eq!(Status::from_name("recursa"), Some(Status::Repeat));
        assert_eq!(Status::from_name("unset"), Some(Status::Unset));
        assert_eq!(Status::from_name("bogus"), None);
    }

    #[test]
    fn test_outcome_synonyms() {
        assert_eq!(ClosureOutcome::parse("Aprobó"), ClosureOutcome::Passed);
        assert_eq!(ClosureOutcome::parse("si"), ClosureOutcome::Passed);
        assert_eq!(ClosureOutcome::parse("No aprobada"), ClosureOutcome::Failed);
        assert_eq!(ClosureOutcome::parse("no"), ClosureOutcome::Failed);
        assert_eq!(ClosureOutcome::parse("quizas"), ClosureOutcome::Unset);
    }

    #[test]
    fn test_record_deserializes_from_spreadsheet_shapes() {
        let json = r#"{
            "id_materia": "MAT1",
            "nombre": "Matematica I",
            "anio": "1",
            "condicion_academica": "ADEUDA",
            "situacion_actual": "intensifica",
            "nunca_cursada": "FALSE",
            "resultado_cierre": null,
            "ciclo_cerrado": false
        }"#;
        let record: SubjectRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.subject_id, "MAT1");
        assert_eq!(record.grade, Some(1));
        assert_eq!(record.condition, AcademicCondition::Owed);
        assert_eq!(record.status, Status::Intensification);
        assert_eq!(record.outcome, ClosureOutcome::Unset);
        assert!(!record.never_taken);
    }

    #[test]
    fn test_record_serializes_wire_spelling() {
        let record = SubjectRecord::new("LEN2", "Lengua II", 2).with_status(Status::Repeat);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["situacion_actual"], "recursa");
        assert_eq!(value["condicion_academica"], "");
        assert_eq!(value["anio"], 2);
    }

    #[test]
    fn test_approved_builder_sets_sentinel() {
        let record = SubjectRecord::new("HIS1", "Historia I", 1)
            .with_condition(AcademicCondition::Approved);
        assert_eq!(record.status, Status::ApprovedSentinel);
        assert!(!record.is_regular());
        assert!(!record.is_engaged());
    }

    #[test]
    fn test_approved_record_never_counts_even_with_stray_status() {
        let mut record = SubjectRecord::new("HIS1", "Historia I", 1)
            .with_condition(AcademicCondition::Approved);
        record.status = Status::FirstTime;
        assert!(!record.is_regular());
        assert!(!record.is_engaged());
    }

    #[test]
    fn test_display_order() {
        let mut records = vec![
            SubjectRecord::new("b", "Biologia", 2),
            SubjectRecord::new("a", "Arte", 2),
            SubjectRecord::new("z", "Zoologia", 1),
        ];
        records.sort_by(display_order);
        let ids: Vec<_> = records.iter().map(|r| r.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
    }

    #[test]
    fn test_field_value_serializes_as_plain_string() {
        let value = serde_json::to_value(FieldValue::Outcome(ClosureOutcome::Failed)).unwrap();
        assert_eq!(value, serde_json::json!("no_aprobada"));
        let key = serde_json::to_value(EditableField::Status).unwrap();
        assert_eq!(key, serde_json::json!("situacion_actual"));
    }

    #[test]
    fn test_catalog_applies_to() {
        let student = Student {
            id: "S1".into(),
            grade: Some(4),
            track: Some("Economia".into()),
            ..Default::default()
        };
        assert!(SubjectCatalogEntry::new("M3", "Matematica III", 3).applies_to(&student));
        assert!(!SubjectCatalogEntry::new("M5", "Matematica V", 5).applies_to(&student));
        assert!(SubjectCatalogEntry::new("E4", "Economia IV", 4)
            .with_track("economia")
            .applies_to(&student));
        assert!(!SubjectCatalogEntry::new("N4", "Naturales IV", 4)
            .with_track("Naturales")
            .applies_to(&student));
    }

    #[test]
    fn test_student_display_name() {
        let student = Student {
            id: "S1".into(),
            surname: "Perez".into(),
            name: "Ana".into(),
            ..Default::default()
        };
        assert_eq!(student.display_name(), "Perez, Ana");
        assert_eq!(Student::default().display_name(), "Student");
    }

    #[test]
    fn test_summary_matches() {
        let summary = StudentSummary {
            id: "1001".into(),
            surname: "Gomez".into(),
            name: "Luis".into(),
            grade: Some(3),
            division: "3B".into(),
            shift: "Tarde".into(),
            ..Default::default()
        };
        assert!(summary.matches("gom"));
        assert!(summary.matches("TARDE"));
        assert!(summary.matches("1001"));
        assert!(summary.matches(""));
        assert!(!summary.matches("perez"));
    }
}
