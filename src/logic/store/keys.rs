//! Store key scheme

use crate::logic::model::artifact::ArtifactKind;

pub const CANDIDATES: &str = "candidates/";
pub const TRAINING_RUNS: &str = "training/runs/";

pub fn candidate(id: &str) -> String {
    format!("{}{}", CANDIDATES, id)
}

pub fn production(kind: ArtifactKind) -> String {
    format!("production/{}", kind.as_str())
}

pub fn canary(kind: ArtifactKind) -> String {
    format!("canary/{}", kind.as_str())
}

pub fn backup(kind: ArtifactKind, id: &str) -> String {
    format!("backup/{}/{}", kind.as_str(), id)
}

/// JSON list of backup ids, newest first
pub fn backup_ring(kind: ArtifactKind) -> String {
    format!("backup/{}/ring", kind.as_str())
}

pub fn training_run(run_id: &str) -> String {
    format!("{}{}", TRAINING_RUNS, run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(candidate("abc"), "candidates/abc");
        assert_eq!(production(ArtifactKind::RandomForest), "production/random_forest");
        assert_eq!(canary(ArtifactKind::DecisionTree), "canary/decision_tree");
        assert_eq!(backup(ArtifactKind::CharacterModel, "x1"), "backup/character_model/x1");
        assert_eq!(backup_ring(ArtifactKind::RandomForest), "backup/random_forest/ring");
        assert_eq!(training_run("r-9"), "training/runs/r-9");
    }
}
