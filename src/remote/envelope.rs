//! Wire envelope and payload types for the remote service.
//!
//! Every request is `{"apiKey", "action", "payload"}`; every response is a
//! JSON object with an `ok` flag, an optional `error` message and the result
//! either under `data` or at the top level.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::record::StudentStatus;
use crate::core::tracker::SubjectUpdate;
use crate::error::{Result, TrajectoryError};
use crate::util::{self, truncate_chars};

/// How much of an undecodable body is quoted in the error.
pub const BODY_SNIPPET_CHARS: usize = 200;

/// Action names understood by the remote service.
pub mod actions {
    pub const PING: &str = "ping";
    pub const GET_CYCLES: &str = "getCycles";
    pub const GET_STUDENT_LIST: &str = "getStudentList";
    pub const GET_STUDENT_STATUS: &str = "getStudentStatus";
    pub const SAVE_STUDENT_STATUS: &str = "saveStudentStatus";
    pub const CLOSE_CYCLE: &str = "closeCycle";
    pub const SYNC_CATALOG_ROWS: &str = "syncCatalogRows";
    pub const GET_DIVISION_RISK_SUMMARY: &str = "getDivisionRiskSummary";
    pub const ROLLOVER_CYCLE: &str = "rolloverCycle";
}

/// Request body.
#[derive(Debug, Serialize)]
pub struct Request<'a, P: Serialize> {
    #[serde(rename = "apiKey")]
    pub api_key: &'a str,
    pub action: &'a str,
    pub payload: &'a P,
}

/// A decoded response with `ok == true`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    action: String,
    fields: Map<String, Value>,
}

impl Envelope {
    /// Decode a raw response body.
    ///
    /// Non-JSON bodies and objects without a boolean `ok` are transport
    /// failures; `ok: false` is a declared remote failure.
    pub fn decode(action: &str, body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body).map_err(|_| {
            TrajectoryError::transport(format!(
                "response is not JSON: {}",
                truncate_chars(body, BODY_SNIPPET_CHARS)
            ))
        })?;

        let Value::Object(fields) = value else {
            return Err(TrajectoryError::transport(format!(
                "{action}: response is not an object"
            )));
        };

        match fields.get("ok") {
            Some(Value::Bool(true)) => Ok(Self {
                action: action.to_string(),
                fields,
            }),
            Some(Value::Bool(false)) => {
                let message = fields
                    .get("error")
                    .and_then(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or("unknown error");
                Err(TrajectoryError::remote(message))
            }
            _ => Err(TrajectoryError::transport(format!(
                "{action}: response has no ok flag"
            ))),
        }
    }

    /// Build a successful envelope around a `data` value.
    pub fn with_data(action: &str, data: Value) -> Self {
        let mut fields = Map::new();
        fields.insert("ok".to_string(), Value::Bool(true));
        fields.insert("data".to_string(), data);
        Self {
            action: action.to_string(),
            fields,
        }
    }

    /// Deserialize the `data` member.
    pub fn data<T: DeserializeOwned>(self) -> Result<T> {
        self.field("data")
    }

    /// Deserialize a top-level member.
    pub fn field<T: DeserializeOwned>(mut self, key: &str) -> Result<T> {
        let value = self.fields.remove(key).unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            TrajectoryError::transport(format!(
                "{}: unexpected `{key}` shape: {e}",
                self.action
            ))
        })
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Payload scoped to one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleQuery<'a> {
    #[serde(rename = "ciclo_lectivo")]
    pub cycle: &'a str,
}

/// Payload scoped to one student in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentQuery<'a> {
    #[serde(rename = "ciclo_lectivo")]
    pub cycle: &'a str,
    #[serde(rename = "id_estudiante")]
    pub student_id: &'a str,
}

/// Save request: exactly the dirty map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveRequest {
    #[serde(rename = "ciclo_lectivo")]
    pub cycle: String,
    #[serde(rename = "id_estudiante")]
    pub student_id: String,
    #[serde(rename = "usuario")]
    pub actor: String,
    pub updates: Vec<SubjectUpdate>,
}

/// Close-cycle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseRequest {
    #[serde(rename = "ciclo_lectivo")]
    pub cycle: String,
    #[serde(rename = "id_estudiante")]
    pub student_id: String,
    #[serde(rename = "usuario")]
    pub actor: String,
    #[serde(rename = "marcar_cerrado")]
    pub mark_closed: bool,
}

/// Catalog sync request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRequest {
    #[serde(rename = "ciclo_lectivo")]
    pub cycle: String,
    #[serde(rename = "id_estudiante")]
    pub student_id: String,
    #[serde(rename = "usuario")]
    pub actor: String,
}

/// Division risk summary request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskQuery<'a> {
    #[serde(rename = "ciclo_lectivo")]
    pub cycle: &'a str,
    #[serde(rename = "umbral")]
    pub threshold: u32,
}

/// Rollover request. The promotion itself runs on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverRequest {
    #[serde(rename = "ciclo_origen")]
    pub origin: String,
    #[serde(rename = "ciclo_destino")]
    pub destination: String,
    #[serde(rename = "usuario")]
    pub actor: String,
    pub update_students: bool,
    pub update_division: bool,
}

impl RolloverRequest {
    /// Check the request before sending it.
    pub fn validate(&self) -> Result<()> {
        if self.origin.trim().is_empty() || self.destination.trim().is_empty() {
            return Err(TrajectoryError::rejected(
                "both origin and destination cycles are required",
            ));
        }
        if self.origin.trim() == self.destination.trim() {
            return Err(TrajectoryError::rejected(
                "the destination cycle cannot be the same as the origin",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Results
// =============================================================================

/// Envelope `data` of a close-cycle response.
#[derive(Debug, Clone, Deserialize)]
pub struct CloseData {
    #[serde(default)]
    pub status: Option<StudentStatus>,
}

/// Result of a catalog sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Rows added.
    #[serde(default)]
    pub added: usize,
    /// Status after the sync.
    pub status: StudentStatus,
}

/// Envelope `data` of a risk summary response.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskData {
    #[serde(rename = "divisiones", default)]
    pub divisions: Vec<DivisionRisk>,
}

/// Students at risk in one section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionRisk {
    #[serde(default, deserialize_with = "util::text")]
    pub division: String,
    #[serde(rename = "turno", default, deserialize_with = "util::text")]
    pub shift: String,
    #[serde(rename = "total_estudiantes", default)]
    pub total_students: usize,
    #[serde(rename = "en_riesgo", default)]
    pub at_risk: usize,
}

/// Counters reported by a rollover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverReport {
    #[serde(rename = "ciclo_origen", default, deserialize_with = "util::text")]
    pub origin: String,
    #[serde(rename = "ciclo_destino", default, deserialize_with = "util::text")]
    pub destination: String,
    #[serde(rename = "origen_existe", default)]
    pub origin_exists: bool,
    #[serde(rename = "filas_creadas", default)]
    pub rows_created: usize,
    #[serde(rename = "filas_actualizadas_destino", default)]
    pub rows_updated: usize,
    #[serde(rename = "filas_omitidas_destino_en_uso", default)]
    pub rows_skipped_in_use: usize,
    #[serde(rename = "estudiantes_promovidos", default)]
    pub students_promoted: usize,
    #[serde(rename = "estudiantes_rosado", default)]
    pub students_flagged: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{EditableField, FieldValue, Status};
    use std::collections::BTreeMap;

    #[test]
    fn test_non_json_is_transport_failure() {
        let body = format!("<html>{}</html>", "x".repeat(500));
        let err = Envelope::decode("ping", &body).unwrap_err();
        assert!(matches!(err, TrajectoryError::Transport { .. }));
        assert!(err.to_string().len() < 260);
    }

    #[test]
    fn test_missing_ok_is_transport_failure() {
        let err = Envelope::decode("ping", r#"{"data": {}}"#).unwrap_err();
        assert!(matches!(err, TrajectoryError::Transport { .. }));
        let err = Envelope::decode("ping", "[1,2]").unwrap_err();
        assert!(matches!(err, TrajectoryError::Transport { .. }));
    }

    #[test]
    fn test_declared_failure_surfaces_message() {
        let err = Envelope::decode("ping", r#"{"ok": false, "error": "API key invalida"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "remote error: API key invalida");

        let err = Envelope::decode("ping", r#"{"ok": false}"#).unwrap_err();
        assert_eq!(err.to_string(), "remote error: unknown error");
    }

    #[test]
    fn test_data_and_top_level_fields() {
        let env = Envelope::decode(
            "getCycles",
            r#"{"ok": true, "cycles": ["2025", "2026"]}"#,
        )
        .unwrap();
        let cycles: Vec<String> = env.field("cycles").unwrap();
        assert_eq!(cycles, vec!["2025", "2026"]);

        let env = Envelope::decode(
            "getStudentStatus",
            r#"{"ok": true, "data": {"ciclo_lectivo": 2026, "estudiante": {"id_estudiante": 7}, "materias": []}}"#,
        )
        .unwrap();
        let status: StudentStatus = env.data().unwrap();
        assert_eq!(status.cycle, "2026");
        assert_eq!(status.student.id, "7");
    }

    #[test]
    fn test_wrong_data_shape_is_transport_failure() {
        let env = Envelope::decode("getCycles", r#"{"ok": true, "cycles": 3}"#).unwrap();
        let err = env.field::<Vec<String>>("cycles").unwrap_err();
        assert!(matches!(err, TrajectoryError::Transport { .. }));
    }

    #[test]
    fn test_request_body_shape() {
        let payload = SaveRequest {
            cycle: "2026".into(),
            student_id: "S1".into(),
            actor: "web".into(),
            updates: vec![SubjectUpdate {
                subject_id: "MAT3".into(),
                fields: BTreeMap::from([(
                    EditableField::Status,
                    FieldValue::Status(Status::CappedOut),
                )]),
            }],
        };
        let request = Request {
            api_key: "k",
            action: actions::SAVE_STUDENT_STATUS,
            payload: &payload,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["apiKey"], "k");
        assert_eq!(value["action"], "saveStudentStatus");
        assert_eq!(value["payload"]["ciclo_lectivo"], "2026");
        assert_eq!(value["payload"]["usuario"], "web");
        assert_eq!(
            value["payload"]["updates"][0]["fields"]["situacion_actual"],
            "no_cursa_por_tope"
        );
    }

    #[test]
    fn test_rollover_validation() {
        let mut request = RolloverRequest {
            origin: "2026".into(),
            destination: "2026".into(),
            actor: "web".into(),
            update_students: true,
            update_division: true,
        };
        assert!(request.validate().is_err());
        request.destination = "2027".into();
        assert!(request.validate().is_ok());
        request.origin = " ".into();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_rollover_report_decodes_partial() {
        let report: RolloverReport = serde_json::from_str(
            r#"{"ciclo_origen": "2026", "ciclo_destino": "2027", "filas_creadas": 120}"#,
        )
        .unwrap();
        assert_eq!(report.rows_created, 120);
        assert_eq!(report.students_promoted, 0);
    }
}
