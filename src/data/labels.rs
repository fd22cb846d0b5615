use serde::{Deserialize, Serialize};

/// Marker for an empty class slot in label files.
pub const ABSENT: &str = "-";

/// Ground-truth annotation of one column.
///
/// Each column carries up to two class slots, each with a level-1 class and
/// an optional level-2 subclass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub table_id: String,
    pub column_id: u32,
    pub column_name: String,
    #[serde(default)]
    pub class1_level1_name: Option<String>,
    #[serde(default)]
    pub class1_level2_name: Option<String>,
    #[serde(default)]
    pub class2_level1_name: Option<String>,
    #[serde(default)]
    pub class2_level2_name: Option<String>,
}

impl LabelRecord {
    /// `(level1, level2)` for both slots, with absent markers mapped to `None`.
    pub fn class_slots(&self) -> [(Option<&str>, Option<&str>); 2] {
        [
            (
                present(&self.class1_level1_name),
                present(&self.class1_level2_name),
            ),
            (
                present(&self.class2_level1_name),
                present(&self.class2_level2_name),
            ),
        ]
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != ABSENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_empty_and_missing_are_absent() {
        let label: LabelRecord = serde_json::from_str(
            r#"{
                "table_id": "t",
                "column_id": 1,
                "column_name": "c",
                "class1_level1_name": " Agent ",
                "class1_level2_name": "-",
                "class2_level1_name": ""
            }"#,
        )
        .unwrap();
        assert_eq!(
            label.class_slots(),
            [(Some("Agent"), None), (None, None)]
        );
    }
}
