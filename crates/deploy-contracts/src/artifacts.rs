//! Compiled contract artifacts (input) and deployment records (output).
//!
//! The compiler writes Hardhat artifacts (`hh-sol-artifact-1`). The store
//! reads them and publishes deployment records under the output directory,
//! which is shared with the mobile client:
//!
//! ```text
//! <output>/<network>/<Contract>.json                  latest record
//! <output>/<network>/<Contract>.abi.json              contract ABI
//! <output>/<network>/history/<Contract>-<tx>.json     one per deployment
//! ```

use {
    crate::{error::Error, record::DeploymentRecord},
    alloy::primitives::Bytes,
    serde::Deserialize,
    std::{
        fs,
        io::{self, Write},
        path::{Path, PathBuf},
    },
    tempfile::NamedTempFile,
};

/// Hardhat keeps build metadata next to the artifacts; never a contract.
const BUILD_INFO_DIR: &str = "build-info";

/// A compiled contract ready to be deployed.
#[derive(Clone, Debug)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: Option<String>,
    pub abi: serde_json::Value,
    pub bytecode: Bytes,
    pub path: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: Option<String>,
    source_name: Option<String>,
    abi: serde_json::Value,
    bytecode: String,
}

/// Paths written by [`ArtifactStore::publish`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    pub record: PathBuf,
    pub abi: PathBuf,
    pub history: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ArtifactStore {
    artifacts_dir: PathBuf,
    output_dir: PathBuf,
    contracts_root: Option<PathBuf>,
}

impl ArtifactStore {
    pub fn new(artifacts_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            output_dir: output_dir.into(),
            contracts_root: None,
        }
    }

    /// Root of the contract sources (the directory `sourceName` in the
    /// artifacts is relative to). Enables the staleness check.
    pub fn with_contracts_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.contracts_root = Some(root.into());
        self
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the latest record for `contract` on `network` lives.
    pub fn record_path(&self, network: &str, contract: &str) -> PathBuf {
        self.output_dir.join(network).join(format!("{contract}.json"))
    }

    pub fn abi_path(&self, network: &str, contract: &str) -> PathBuf {
        self.output_dir
            .join(network)
            .join(format!("{contract}.abi.json"))
    }

    pub fn history_path(&self, record: &DeploymentRecord) -> PathBuf {
        self.output_dir
            .join(&record.network)
            .join("history")
            .join(format!(
                "{}-{}.json",
                record.contract_name, record.transaction_hash
            ))
    }

    /// Loads the compiled artifact for `contract`. Accepts both the flat
    /// layout (`<dir>/<Name>.json`) and Hardhat's per-source layout
    /// (`<dir>/contracts/<File>.sol/<Name>.json`).
    pub fn load(&self, contract: &str) -> Result<ContractArtifact, Error> {
        let missing = || Error::ArtifactMissing {
            contract: contract.to_string(),
            dir: self.artifacts_dir.clone(),
        };

        if !self.artifacts_dir.exists() {
            return Err(missing());
        }
        let file_name = format!("{contract}.json");
        let mut candidates = Vec::new();
        find_files(&self.artifacts_dir, &file_name, &mut candidates).map_err(|err| {
            Error::ArtifactInvalid {
                contract: contract.to_string(),
                path: self.artifacts_dir.clone(),
                reason: format!("cannot search artifacts: {err}"),
            }
        })?;

        let path = match candidates.as_slice() {
            [] => return Err(missing()),
            [path] => path.clone(),
            [first, ..] => {
                return Err(Error::ArtifactInvalid {
                    contract: contract.to_string(),
                    path: first.clone(),
                    reason: format!(
                        "{} artifacts named {file_name}, remove the outdated ones",
                        candidates.len()
                    ),
                });
            }
        };

        let invalid = |reason: String| Error::ArtifactInvalid {
            contract: contract.to_string(),
            path: path.clone(),
            reason,
        };

        let data = fs::read(&path).map_err(|err| invalid(format!("cannot read: {err}")))?;
        let artifact: HardhatArtifact = serde_json::from_slice(&data)
            .map_err(|err| invalid(format!("not a compiler artifact: {err}")))?;

        if let Some(name) = &artifact.contract_name {
            if name != contract {
                return Err(invalid(format!("artifact is for contract {name:?}")));
            }
        }
        if !artifact.abi.is_array() {
            return Err(invalid("ABI is not a JSON array".to_string()));
        }
        let bytecode = parse_bytecode(&artifact.bytecode).map_err(invalid)?;

        if let (Some(root), Some(source)) = (&self.contracts_root, &artifact.source_name) {
            self.ensure_fresh(&path, &root.join(source)).map_err(invalid)?;
        }

        tracing::debug!(path = %path.display(), bytes = bytecode.len(), "loaded artifact");
        Ok(ContractArtifact {
            contract_name: contract.to_string(),
            source_name: artifact.source_name,
            abi: artifact.abi,
            bytecode,
            path,
        })
    }

    fn ensure_fresh(&self, artifact: &Path, source: &Path) -> Result<(), String> {
        let modified = |path: &Path| fs::metadata(path).and_then(|meta| meta.modified());
        let compiled_at = modified(artifact).map_err(|err| format!("cannot stat: {err}"))?;
        match modified(source) {
            Ok(edited_at) if edited_at > compiled_at => Err(format!(
                "stale: {} changed after compilation, recompile first",
                source.display()
            )),
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(?err, source = %source.display(), "cannot check artifact freshness");
                Ok(())
            }
        }
    }

    /// Persists `record` and the contract ABI. Every file is written to a
    /// temporary file in the target directory and renamed into place, so a
    /// reader sees either the previous complete file or the new complete
    /// file. Nothing is renamed until every file has been staged. The history
    /// entry is renamed first and the ABI last, so the ABI can lag behind the
    /// latest record but never run ahead of it.
    pub fn publish(
        &self,
        record: &DeploymentRecord,
        abi: &serde_json::Value,
    ) -> Result<Published, Error> {
        let published = Published {
            record: self.record_path(&record.network, &record.contract_name),
            abi: self.abi_path(&record.network, &record.contract_name),
            history: self.history_path(record),
        };
        let failed = |path: &Path, source: io::Error| Error::RecordWriteFailure {
            address: record.address,
            tx_hash: record.transaction_hash,
            path: path.to_path_buf(),
            source,
        };

        let record_json = to_json(record).map_err(|err| failed(&published.record, err))?;
        let abi_json = to_json(abi).map_err(|err| failed(&published.abi, err))?;

        let history = StagedFile::new(&published.history, &record_json)
            .map_err(|err| failed(&published.history, err))?;
        let abi = StagedFile::new(&published.abi, &abi_json)
            .map_err(|err| failed(&published.abi, err))?;
        let latest = StagedFile::new(&published.record, &record_json)
            .map_err(|err| failed(&published.record, err))?;

        history
            .commit_new()
            .map_err(|err| failed(&published.history, err))?;
        latest
            .commit()
            .map_err(|err| failed(&published.record, err))?;
        abi.commit().map_err(|err| failed(&published.abi, err))?;

        tracing::info!(
            record = %published.record.display(),
            abi = %published.abi.display(),
            "published deployment record"
        );
        Ok(published)
    }

    /// Reads the latest published record, `None` if there is none.
    pub fn latest_record(
        &self,
        network: &str,
        contract: &str,
    ) -> io::Result<Option<DeploymentRecord>> {
        match fs::read(self.record_path(network, contract)) {
            Ok(data) => serde_json::from_slice(&data).map(Some).map_err(io::Error::other),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn find_files(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.path());
    for entry in entries {
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if entry.file_name() != BUILD_INFO_DIR {
                find_files(&path, file_name, found)?;
            }
        } else if entry.file_name() == file_name {
            found.push(path);
        }
    }
    Ok(())
}

fn parse_bytecode(bytecode: &str) -> Result<Bytes, String> {
    let hex = bytecode.strip_prefix("0x").unwrap_or(bytecode);
    if hex.contains("__") {
        return Err("bytecode has unlinked library references".to_string());
    }
    let bytes: Bytes = alloy::primitives::hex::decode(hex)
        .map_err(|err| format!("bytecode is not valid hex: {err}"))?
        .into();
    if bytes.is_empty() {
        return Err("bytecode is empty (interface or abstract contract?)".to_string());
    }
    Ok(bytes)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> io::Result<Vec<u8>> {
    let mut json = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    json.push(b'\n');
    Ok(json)
}

/// File contents written and flushed to disk under a temporary name next to
/// `target`. Dropping it without committing removes the temporary file and
/// leaves `target` untouched.
pub(crate) struct StagedFile {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    pub(crate) fn new(target: &Path, contents: &[u8]) -> io::Result<Self> {
        let dir = target
            .parent()
            .ok_or_else(|| io::Error::other("target has no parent directory"))?;
        fs::create_dir_all(dir)?;
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(contents)?;
        file.as_file().sync_all()?;
        Ok(Self {
            file,
            target: target.to_path_buf(),
        })
    }

    /// Atomically replaces the target.
    pub(crate) fn commit(self) -> io::Result<()> {
        self.file.persist(&self.target).map_err(|err| err.error)?;
        sync_parent(&self.target)
    }

    /// Like [`StagedFile::commit`] but fails if the target already exists.
    pub(crate) fn commit_new(self) -> io::Result<()> {
        self.file
            .persist_noclobber(&self.target)
            .map_err(|err| err.error)?;
        sync_parent(&self.target)
    }
}

/// Makes the rename itself durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) => fs::File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_: &Path) -> io::Result<()> {
    Ok(())
}
