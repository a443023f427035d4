// src/utils/subjects.rs

/// Canonical subjects: (key, display name, aliases).
const SUBJECTS: &[(&str, &str, &[&str])] = &[
    ("biology", "Biology", &["Biology"]),
    ("chemistry", "Chemistry", &["Chemistry"]),
    ("physics", "Physics", &["Physics"]),
    ("mathematics", "Mathematics", &["Mathematics", "Maths"]),
    ("english", "English", &["English Language", "Use of English", "English"]),
    ("economics", "Economics", &["Economics"]),
    ("government", "Government", &["Government"]),
    ("literature", "Literature", &["Literature-in-English", "Literature"]),
    ("crs", "CRS", &["Christian Religious Studies", "CRS"]),
    ("geography", "Geography", &["Geography"]),
    ("commerce", "Commerce", &["Commerce"]),
    ("accounting", "Financial Accounting", &["Financial Accounting", "Accounting"]),
    ("agric", "Agricultural Science", &["Agricultural Science", "Agric"]),
];

/// Normalized comparison key for a subject name.
///
/// Known subjects and their aliases map to the table key; anything else
/// falls back to its trimmed, lower-cased text.
pub fn subject_key(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    SUBJECTS
        .iter()
        .find(|(key, display, aliases)| {
            *key == lower
                || display.to_lowercase() == lower
                || aliases.iter().any(|a| a.to_lowercase() == lower)
        })
        .map(|(key, _, _)| key.to_string())
        .unwrap_or(lower)
}

/// Display name for a subject, or the trimmed input when unknown.
pub fn display_name(name: &str) -> String {
    let key = subject_key(name);
    SUBJECTS
        .iter()
        .find(|(k, _, _)| *k == key)
        .map(|(_, display, _)| display.to_string())
        .unwrap_or_else(|| name.trim().to_string())
}

pub fn same_subject(a: &str, b: &str) -> bool {
    subject_key(a) == subject_key(b)
}
