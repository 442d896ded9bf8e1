use super::CompilerInput;
use ethers_core::types::H256;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Solidity contract metadata as emitted by the compiler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub compiler: MetadataCompiler,
    pub language: String,
    pub settings: MetadataSettings,
    pub sources: BTreeMap<String, MetadataSource>,
    #[serde(default)]
    pub output: MetadataOutput,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataCompiler {
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSettings {
    #[serde(default)]
    pub compilation_target: BTreeMap<String, String>,
    /// Fully qualified library name (`path:Name`) to address.
    #[serde(default)]
    pub libraries: BTreeMap<String, String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSource {
    pub keccak256: H256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataOutput {
    #[serde(default)]
    pub abi: Value,
}

impl Metadata {
    /// Parses solidity metadata. Any other json (or non-json) content is rejected.
    pub fn from_json(content: &str) -> Option<Self> {
        let metadata: Metadata = serde_json::from_str(content).ok()?;
        metadata
            .language
            .eq_ignore_ascii_case("solidity")
            .then_some(metadata)
    }

    /// File path and name of the contract the metadata was produced for.
    pub fn compilation_target(&self) -> Option<(&str, &str)> {
        if self.settings.compilation_target.len() != 1 {
            return None;
        }
        self.settings
            .compilation_target
            .iter()
            .next()
            .map(|(path, name)| (path.as_str(), name.as_str()))
    }

    /// Compiler input reproducing the original compilation
    /// from the given source contents.
    pub fn compiler_input(&self, sources: BTreeMap<String, String>) -> CompilerInput {
        let mut settings = self.settings.other.clone();
        if !self.settings.libraries.is_empty() {
            let mut libraries: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
            for (qualified_name, address) in &self.settings.libraries {
                let (path, name) = match qualified_name.rsplit_once(':') {
                    Some((path, name)) => (path.to_string(), name.to_string()),
                    None => (String::new(), qualified_name.clone()),
                };
                libraries
                    .entry(path)
                    .or_default()
                    .insert(name, address.clone());
            }
            settings.insert(
                "libraries".to_string(),
                serde_json::to_value(libraries).unwrap_or_default(),
            );
        }
        CompilerInput::solidity(sources, settings)
    }
}
