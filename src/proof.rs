use serde::{Deserialize, Serialize};

pub mod hex_bytes {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom)
    }
}

pub mod hex_bytes_vec {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(|b| format!("0x{}", hex::encode(b))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(D::Error::custom))
            .collect()
    }
}

/// Groth16 proof in the layout Solidity verifiers take. Coordinates are decimal
/// strings; G2 coordinates are ordered `(c1, c0)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16ProofJson {
    pub a: [String; 2],
    pub b: [[String; 2]; 2],
    pub c: [String; 2],
    #[serde(with = "hex_bytes")]
    pub input: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub output: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResult {
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub output: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecursiveProofRecord {
    #[serde(with = "hex_bytes")]
    pub input_hash: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub output_hash: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub verifier_digest: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(with = "hex_bytes")]
    pub input: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub output: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicWitness {
    #[serde(with = "hex_bytes_vec")]
    pub inputs: Vec<Vec<u8>>,
}
