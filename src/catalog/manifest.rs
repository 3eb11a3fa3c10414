//! Which items exist and where their content lives

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::CatalogError;
use super::pricing::Tier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub title: String,
    #[serde(alias = "type")]
    pub tier: Tier,
    /// Markdown file name, relative to the content directory
    pub file: String,
}

impl ManifestEntry {
    fn new(id: &str, tier: Tier, title: &str, file: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            tier,
            file: file.to_string(),
        }
    }
}

/// The stock registry of skills and trajectories
pub fn builtin_manifest() -> Vec<ManifestEntry> {
    use Tier::*;
    vec![
        ManifestEntry::new("K01", Basic, "What is Stress?", "K01_what_is_stress.md"),
        ManifestEntry::new("K02", Basic, "The Autonomic Nervous System", "K02_autonomic_nervous_system.md"),
        ManifestEntry::new("K03", Basic, "The Overstimulated Brain", "K03_overstimulated_brain.md"),
        ManifestEntry::new("K04", Basic, "Authenticity and Self-Image", "K04_authenticity_self_image.md"),
        ManifestEntry::new("K05", Basic, "Body Awareness", "K05_body_awareness.md"),
        ManifestEntry::new("K06", Basic, "Sleep and Recovery", "K06_sleep_and_recovery.md"),
        ManifestEntry::new("K07", Basic, "Nutrition and Stress", "K07_nutrition_and_stress.md"),
        ManifestEntry::new("K08", Basic, "Gratitude as Neuroplasticity", "K08_gratitude_neuroplasticity.md"),
        ManifestEntry::new("I01", Intervention, "4-7-8 Breathing Technique", "I01_4_7_8_breathing.md"),
        ManifestEntry::new("I02", Intervention, "Activity Monitor", "I02_activity_monitor.md"),
        ManifestEntry::new("I03", Intervention, "Body Scan Protocol", "I03_body_scan_protocol.md"),
        ManifestEntry::new("I04", Intervention, "Grounding Techniques", "I04_grounding_techniques.md"),
        ManifestEntry::new("I05", Intervention, "Sleep Hygiene Protocol", "I05_sleep_hygiene_protocol.md"),
        ManifestEntry::new("I06", Intervention, "Movement and Exercise", "I06_movement_exercise.md"),
        ManifestEntry::new("I07", Intervention, "Gratitude Practice", "I07_gratitude_practice.md"),
        ManifestEntry::new("I08", Proprietary, "Forgive and Forget Hood (VergeetMuts)", "I08_vergeetmuts_technique.md"),
        ManifestEntry::new("C01", Proprietary, "Co-Regulation Protocol (Corpus Systemics)", "C01_co_regulation_protocol.md"),
        ManifestEntry::new("T01", Trajectory, "Post-Concussion Syndrome: 12 Week Recovery Path", "T01_post_concussion_syndrome.md"),
        ManifestEntry::new("T02", Trajectory, "Post-COVID: 12 Week Recovery Path", "T02_post_covid.md"),
        ManifestEntry::new("T03", Trajectory, "Burnout: 16 Week Recovery Path", "T03_burnout.md"),
        ManifestEntry::new("T04", Trajectory, "Chronic Stress / Prevention: 8 Week Path", "T04_chronic_stress_prevention.md"),
    ]
}

/// Load a manifest from a JSON file holding an array of entries
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(CatalogError::Manifest)
}
