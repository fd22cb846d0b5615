//! Ground-truth paths from label records.

use crate::data::LabelRecord;

/// One path per labelled class slot: `[level1]` or `[level1, level2]`.
///
/// A slot without a level-1 name yields nothing. A level-2 name without a
/// level-1 name is ignored.
pub fn ground_truth_paths(label: &LabelRecord) -> Vec<Vec<String>> {
    label
        .class_slots()
        .into_iter()
        .filter_map(|(level1, level2)| {
            let mut path = vec![level1?.to_string()];
            if let Some(level2) = level2 {
                path.push(level2.to_string());
            }
            Some(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(slots: [&str; 4]) -> LabelRecord {
        let field = |s: &str| Some(s.to_string());
        LabelRecord {
            table_id: "t".to_string(),
            column_id: 0,
            column_name: "c".to_string(),
            class1_level1_name: field(slots[0]),
            class1_level2_name: field(slots[1]),
            class2_level1_name: field(slots[2]),
            class2_level2_name: field(slots[3]),
        }
    }

    #[test]
    fn test_builds_one_path_per_slot() {
        let paths = ground_truth_paths(&label(["Agent", "Person", "Place", "-"]));
        assert_eq!(
            paths,
            vec![
                vec!["Agent".to_string(), "Person".to_string()],
                vec!["Place".to_string()],
            ]
        );
    }

    #[test]
    fn test_absent_level_one_drops_the_slot() {
        assert!(ground_truth_paths(&label(["-", "Person", "", "-"])).is_empty());
    }

    #[test]
    fn test_paths_come_from_their_own_slot() {
        let paths = ground_truth_paths(&label(["-", "-", "Place", "City"]));
        assert_eq!(paths, vec![vec!["Place".to_string(), "City".to_string()]]);
    }
}
