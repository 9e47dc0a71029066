use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    dyn_abi::{DynSolValue, EventExt},
    json_abi::{Event as AbiEvent, JsonAbi},
    primitives::B256,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("failed to read ABI document {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse ABI document {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("event {0} not found in ABI")]
    UnknownEvent(String),
    #[error("decoded value count does not match the declaration of event {0}")]
    Arity(String),
    #[error("failed to decode event {event}: {source}")]
    Decode {
        event: String,
        source: alloy::dyn_abi::Error,
    },
}

/// Parsed ABI documents keyed by their file basename.
///
/// Documents are discovered as `<basename>.json` inside the configured
/// assets directory; each is loaded at most once.
#[derive(Debug, Default)]
pub struct AbiRegistry {
    documents: HashMap<String, JsonAbi>,
}

impl AbiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, abi_dir: &Path, basename: &str) -> Result<&JsonAbi, AbiError> {
        if !self.documents.contains_key(basename) {
            let path = abi_dir.join(format!("{basename}.json"));
            let raw = fs::read_to_string(&path).map_err(|source| AbiError::Read {
                path: path.clone(),
                source,
            })?;
            let abi: JsonAbi =
                serde_json::from_str(&raw).map_err(|source| AbiError::Parse { path, source })?;
            self.documents.insert(basename.to_string(), abi);
        }
        Ok(&self.documents[basename])
    }
}

/// Resolves an event declaration by name; overloads resolve to the first
/// declaration, matching how dispatch keys are derived from event names.
pub fn resolve_event<'a>(abi: &'a JsonAbi, name: &str) -> Result<&'a AbiEvent, AbiError> {
    abi.events
        .get(name)
        .and_then(|overloads| overloads.first())
        .ok_or_else(|| AbiError::UnknownEvent(name.to_string()))
}

pub fn event_topic0(event: &AbiEvent) -> B256 {
    event.selector()
}

/// Decodes a log into a name -> value map containing every declared
/// parameter. Non-indexed parameters are unpacked from the data payload;
/// indexed parameters come from topics `1..`; indexed dynamic types yield
/// the raw 32-byte topic hash.
pub fn decode_event(
    event: &AbiEvent,
    topics: &[B256],
    data: &[u8],
) -> Result<BTreeMap<String, DynSolValue>, AbiError> {
    let decoded = event
        .decode_log_parts(topics.iter().copied(), data)
        .map_err(|source| AbiError::Decode {
            event: event.name.clone(),
            source,
        })?;

    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let mut args = BTreeMap::new();
    for input in &event.inputs {
        let value = if input.indexed {
            indexed.next()
        } else {
            body.next()
        };
        match value {
            Some(value) => {
                args.insert(input.name.clone(), value);
            }
            None => return Err(AbiError::Arity(event.name.clone())),
        }
    }
    Ok(args)
}
