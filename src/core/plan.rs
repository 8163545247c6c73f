//! Family-facing annual plan text.

use crate::core::balance::Limits;
use crate::core::classify::Classification;
use crate::core::record::{Student, SubjectRecord};

fn names(bucket: &[SubjectRecord]) -> String {
    bucket
        .iter()
        .map(SubjectRecord::display_name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the plain-text plan shared with a student's family.
pub fn plan_text(
    student: &Student,
    cycle: &str,
    classification: &Classification,
    limits: &Limits,
) -> String {
    let who = if student.surname.is_empty() && student.name.is_empty() {
        "the student".to_string()
    } else {
        student.display_name()
    };

    let mut lines = vec![
        format!("Hello, this is the annual trajectory plan for {who} ({cycle})."),
        String::new(),
        format!(
            "- Regular load: {}/{}",
            classification.regular_load(),
            limits.regular_cap
        ),
    ];
    if !classification.first_time.is_empty() {
        lines.push(format!(
            "  - First time: {}",
            names(&classification.first_time)
        ));
    }
    if !classification.repeat.is_empty() {
        lines.push(format!("  - Repeating: {}", names(&classification.repeat)));
    }

    lines.push(String::new());
    lines.push(format!(
        "- Intensification: {}/{}",
        classification.intensification_load(),
        limits.intensification_cap
    ));
    if classification.intensification.is_empty() {
        lines.push("  - (To be defined by the school's support team)".to_string());
    } else {
        lines.push(format!(
            "  - Intensifying: {}",
            names(&classification.intensification)
        ));
    }
    lines.push(String::new());

    if !classification.capped_out.is_empty() {
        lines.push(format!(
            "- Subjects postponed by the load cap (not taken this cycle, limit {}):",
            limits.regular_cap
        ));
        for record in &classification.capped_out {
            lines.push(format!("  - {}", record.display_name()));
        }
        lines.push(String::new());
    }

    lines.push(
        "Any change will be communicated through the school's official channels. Thank you."
            .to_string(),
    );
    lines.join("\n")
}
