use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Parts of the compiler output requested for every compiled contract.
const OUTPUT_SELECTION: [&str; 5] = [
    "abi",
    "metadata",
    "evm.bytecode.object",
    "evm.deployedBytecode.object",
    "evm.deployedBytecode.immutableReferences",
];

/// Solidity standard json input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInput {
    pub language: String,
    pub sources: BTreeMap<String, Source>,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub content: String,
}

impl CompilerInput {
    pub fn solidity(sources: BTreeMap<String, String>, settings: Map<String, Value>) -> Self {
        Self {
            language: "Solidity".to_string(),
            sources: sources
                .into_iter()
                .map(|(path, content)| (path, Source { content }))
                .collect(),
            settings,
        }
        .with_output_selection()
    }

    /// Overrides output selection so that every contract reports
    /// its metadata and bytecodes.
    pub fn with_output_selection(mut self) -> Self {
        self.settings.insert(
            "outputSelection".to_string(),
            json!({ "*": { "*": OUTPUT_SELECTION } }),
        );
        self
    }

    pub fn source_contents(&self) -> BTreeMap<String, String> {
        self.sources
            .iter()
            .map(|(path, source)| (path.clone(), source.content.clone()))
            .collect()
    }

    pub fn is_solidity(&self) -> bool {
        self.language.eq_ignore_ascii_case("solidity")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn output_selection_is_overridden() {
        let settings = serde_json::from_value(json!({
            "optimizer": { "enabled": true, "runs": 200 },
            "outputSelection": { "*": { "*": ["abi"] } }
        }))
        .unwrap();
        let input = CompilerInput::solidity(
            BTreeMap::from([("A.sol".to_string(), "contract A {}".to_string())]),
            settings,
        );

        assert_eq!(
            json!({
                "language": "Solidity",
                "sources": { "A.sol": { "content": "contract A {}" } },
                "settings": {
                    "optimizer": { "enabled": true, "runs": 200 },
                    "outputSelection": { "*": { "*": [
                        "abi",
                        "metadata",
                        "evm.bytecode.object",
                        "evm.deployedBytecode.object",
                        "evm.deployedBytecode.immutableReferences"
                    ] } }
                }
            }),
            serde_json::to_value(&input).unwrap()
        );
    }
}
