use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProvingSystemKind {
    #[value(alias = "pairing")]
    Groth16,
    #[value(alias = "universal")]
    Spartan,
}

impl fmt::Display for ProvingSystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvingSystemKind::Groth16 => write!(f, "groth16"),
            ProvingSystemKind::Spartan => write!(f, "spartan"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionKind {
    #[value(name = "add-u64")]
    AddU64,
    #[value(name = "echo-bytes32")]
    EchoBytes32,
    #[value(name = "merkle-root4")]
    MerkleRoot4,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::AddU64 => write!(f, "add-u64"),
            FunctionKind::EchoBytes32 => write!(f, "echo-bytes32"),
            FunctionKind::MerkleRoot4 => write!(f, "merkle-root4"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub system: ProvingSystemKind,
    /// SHA-256 of the canonical constraint matrices, hex.
    pub circuit_digest: String,
    pub num_public: usize,
    pub num_private: usize,
    pub num_constraints: usize,
    pub crate_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_aliases() {
        assert_eq!(
            ProvingSystemKind::from_str("pairing", true).unwrap(),
            ProvingSystemKind::Groth16
        );
        assert_eq!(
            ProvingSystemKind::from_str("universal", true).unwrap(),
            ProvingSystemKind::Spartan
        );
        assert_eq!(
            FunctionKind::from_str("merkle-root4", true).unwrap(),
            FunctionKind::MerkleRoot4
        );
    }

    #[test]
    fn test_manifest_json() {
        let manifest = BuildManifest {
            system: ProvingSystemKind::Spartan,
            circuit_digest: "00".repeat(32),
            num_public: 2,
            num_private: 10,
            num_constraints: 12,
            crate_version: "0.1.0".into(),
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"system\":\"spartan\""));
        assert_eq!(serde_json::from_str::<BuildManifest>(&json).unwrap(), manifest);
    }
}
