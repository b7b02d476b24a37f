//! Input column names.

use serde::{Deserialize, Serialize};

/// Names of the columns an event is assembled from.
///
/// Defaults follow the NanoAOD electron and PUPPI MET branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnNames {
    /// Declared object count per event.
    pub count: String,
    /// Object transverse momenta.
    pub pt: String,
    /// Object pseudorapidities.
    pub eta: String,
    /// Object azimuths.
    pub phi: String,
    /// Signed object type codes.
    pub type_code: String,
    /// Object identification flags.
    pub id_flag: String,
    /// MET magnitude.
    pub met_pt: String,
    /// MET azimuth.
    pub met_phi: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            count: "nElectron".into(),
            pt: "Electron_pt".into(),
            eta: "Electron_eta".into(),
            phi: "Electron_phi".into(),
            type_code: "Electron_pdgId".into(),
            id_flag: "Electron_mvaFall17V2Iso_WP90".into(),
            met_pt: "PuppiMET_pt".into(),
            met_phi: "PuppiMET_phi".into(),
        }
    }
}

impl ColumnNames {
    /// All required names, in a fixed order.
    pub fn required(&self) -> [&str; 8] {
        [
            self.count.as_str(),
            self.pt.as_str(),
            self.eta.as_str(),
            self.phi.as_str(),
            self.type_code.as_str(),
            self.id_flag.as_str(),
            self.met_pt.as_str(),
            self.met_phi.as_str(),
        ]
    }

    /// Required names absent from `available`, in [`ColumnNames::required`] order.
    pub fn missing(&self, available: &[&str]) -> Vec<String> {
        self.required()
            .into_iter()
            .filter(|n| !available.contains(n))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_every_missing_name() {
        let cols = ColumnNames::default();
        let missing = cols.missing(&["nElectron", "Electron_pt", "Electron_eta", "Electron_phi"]);
        assert_eq!(
            missing,
            vec![
                "Electron_pdgId",
                "Electron_mvaFall17V2Iso_WP90",
                "PuppiMET_pt",
                "PuppiMET_phi"
            ]
        );
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let cols: ColumnNames = serde_json::from_str(r#"{"met_pt": "MET_pt"}"#).unwrap();
        assert_eq!(cols.met_pt, "MET_pt");
        assert_eq!(cols.pt, "Electron_pt");
    }
}
