use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Subset of the solc standard json output used for verification.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CompilerOutput {
    #[serde(default)]
    pub errors: Vec<OutputError>,
    #[serde(default)]
    pub contracts: BTreeMap<String, BTreeMap<String, CompiledContract>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputError {
    pub severity: String,
    pub message: String,
    pub formatted_message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CompiledContract {
    pub abi: Option<Value>,
    pub metadata: Option<String>,
    pub evm: Option<Evm>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evm {
    pub bytecode: Option<BytecodeObject>,
    pub deployed_bytecode: Option<DeployedBytecodeObject>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct BytecodeObject {
    pub object: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedBytecodeObject {
    pub object: String,
    #[serde(default)]
    pub immutable_references: BTreeMap<String, Vec<ImmutableReference>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ImmutableReference {
    pub start: usize,
    pub length: usize,
}

impl CompilerOutput {
    /// Formatted messages of all error-severity diagnostics.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .filter(|error| error.severity.eq_ignore_ascii_case("error"))
            .map(|error| {
                error
                    .formatted_message
                    .clone()
                    .unwrap_or_else(|| error.message.clone())
            })
            .collect()
    }

    pub fn contract(&self, path: &str, name: &str) -> Option<&CompiledContract> {
        self.contracts.get(path)?.get(name)
    }

    /// Looks the contract up by name only. If several files declare
    /// a contract with this name, the first one by path is returned.
    pub fn find_contract(&self, name: &str) -> Option<(&str, &CompiledContract)> {
        self.contracts.iter().find_map(|(path, contracts)| {
            contracts
                .get(name)
                .map(|contract| (path.as_str(), contract))
        })
    }
}

impl DeployedBytecodeObject {
    pub fn immutable_ranges(&self) -> Vec<ImmutableReference> {
        let mut ranges: Vec<_> = self
            .immutable_references
            .values()
            .flatten()
            .copied()
            .collect();
        ranges.sort_by_key(|reference| reference.start);
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn output() -> CompilerOutput {
        serde_json::from_value(json!({
            "errors": [
                {
                    "severity": "warning",
                    "message": "SPDX license identifier not provided",
                    "formattedMessage": "Warning: SPDX license identifier not provided"
                },
                {
                    "severity": "error",
                    "message": "Expected ';' but got '}'",
                    "formattedMessage": "ParserError: Expected ';' but got '}'\n --> A.sol:3:1:"
                },
                { "severity": "error", "message": "Undeclared identifier." }
            ],
            "contracts": {
                "contracts/A.sol": {
                    "A": {
                        "abi": [],
                        "metadata": "{}",
                        "evm": {
                            "bytecode": { "object": "6080" },
                            "deployedBytecode": {
                                "object": "6080",
                                "immutableReferences": {
                                    "7": [{ "start": 40, "length": 32 }],
                                    "3": [{ "start": 8, "length": 32 }, { "start": 90, "length": 32 }]
                                }
                            }
                        }
                    }
                },
                "contracts/B.sol": { "B": {} }
            }
        }))
        .expect("valid output")
    }

    #[test]
    fn only_errors_are_reported() {
        assert_eq!(
            vec![
                "ParserError: Expected ';' but got '}'\n --> A.sol:3:1:".to_string(),
                "Undeclared identifier.".to_string(),
            ],
            output().error_messages()
        );
    }

    #[test]
    fn contracts_lookup() {
        let output = output();
        assert!(output.contract("contracts/A.sol", "A").is_some());
        assert!(output.contract("contracts/A.sol", "B").is_none());
        let (path, _) = output.find_contract("B").expect("B is compiled");
        assert_eq!("contracts/B.sol", path);
        assert!(output.find_contract("C").is_none());
    }

    #[test]
    fn immutable_ranges_are_sorted() {
        let output = output();
        let deployed = output
            .contract("contracts/A.sol", "A")
            .and_then(|contract| contract.evm.as_ref())
            .and_then(|evm| evm.deployed_bytecode.as_ref())
            .expect("deployed bytecode");
        let starts: Vec<_> = deployed
            .immutable_ranges()
            .into_iter()
            .map(|reference| reference.start)
            .collect();
        assert_eq!(vec![8, 40, 90], starts);
    }
}
