use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

pub const R1CS_FILE: &str = "r1cs.bin";
pub const PROVING_KEY_FILE: &str = "pk.bin";
pub const VERIFYING_KEY_FILE: &str = "vk.bin";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SRS_FILE: &str = "srs.bin";
pub const PROOF_FILE: &str = "proof.bin";
pub const PROOF_JSON_FILE: &str = "proof.json";
pub const PUBLIC_WITNESS_FILE: &str = "public_witness.json";
pub const FIXTURE_FILE: &str = "fixture.json";
pub const VERIFIER_CONTRACT_FILE: &str = "FunctionVerifier.sol";
pub const VERIFYING_KEY_JSON_FILE: &str = "vk.json";
pub const PROOF_WITH_PUBLIC_INPUTS_FILE: &str = "proof_with_public_inputs.json";
pub const VERIFIER_DATA_FILE: &str = "verifier_only_circuit_data.json";

/// A directory holding artifacts under fixed file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    dir: PathBuf,
}

impl ArtifactLocation {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))
    }

    /// Runs `write` against a staging directory beside this one, then moves every
    /// file it wrote into place. Nothing lands here if `write` fails.
    pub fn write_staged(&self, write: impl FnOnce(&ArtifactLocation) -> Result<()>) -> Result<()> {
        let parent = match self.dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| Error::io(&parent, e))?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&parent)
            .map_err(|e| Error::io(&parent, e))?;
        write(&ArtifactLocation::new(staging.path()))?;

        self.create()?;
        let entries = fs::read_dir(staging.path()).map_err(|e| Error::io(staging.path(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(staging.path(), e))?;
            let target = self.path(&entry.file_name().to_string_lossy());
            fs::rename(entry.path(), &target).map_err(|e| Error::io(&target, e))?;
        }
        Ok(())
    }

    pub fn write_with(
        &self,
        name: &str,
        write: impl FnOnce(&mut dyn Write) -> Result<()>,
    ) -> Result<()> {
        let path = self.path(name);
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush().map_err(|e| Error::io(&path, e))
    }

    pub fn read_with<T>(
        &self,
        name: &str,
        read: impl FnOnce(&mut dyn Read) -> Result<T>,
    ) -> Result<T> {
        let path = self.path(name);
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        read(&mut BufReader::new(file)).map_err(|e| match e {
            Error::Serialization(reason) => Error::decode(&path, reason),
            e => e,
        })
    }

    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(name);
        fs::write(&path, bytes).map_err(|e| Error::io(&path, e))
    }

    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path(name);
        fs::read(&path).map_err(|e| Error::io(&path, e))
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.write_bytes(name, &json)
    }

    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let bytes = self.read_bytes(name)?;
        serde_json::from_slice(&bytes).map_err(|e| Error::decode(self.path(name), e))
    }

    pub fn save_bincode<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let encoded = bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.write_bytes(name, &encoded)
    }

    pub fn load_bincode<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let bytes = self.read_bytes(name)?;
        bincode::deserialize(&bytes).map_err(|e| Error::decode(self.path(name), e))
    }
}
