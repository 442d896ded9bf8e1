use super::FetchError;
use crate::compiler::{CompilerInput, Source};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct EtherscanResponse {
    pub status: String,
    pub message: String,
    pub result: Value,
}

impl EtherscanResponse {
    /// Returns the `result` field of a successful response.
    pub fn into_result(self) -> Result<Value, FetchError> {
        if self.status == "1" {
            return Ok(self.result);
        }
        let result = match &self.result {
            Value::String(result) => result.clone(),
            other => other.to_string(),
        };
        if self.message.starts_with("NOTOK") && result.to_lowercase().contains("rate limit") {
            return Err(FetchError::RateLimited(result));
        }
        Err(FetchError::Upstream(format!("{}: {}", self.message, result)))
    }
}

/// A single item of the `getsourcecode` result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SourceCodeRecord {
    pub source_code: String,
    pub contract_name: String,
    pub compiler_version: String,
    pub optimization_used: String,
    pub runs: String,
    #[serde(rename = "EVMVersion")]
    pub evm_version: String,
    pub library: String,
}

/// A single item of the `getcontractcreation` result.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCreationRecord {
    pub tx_hash: String,
}

/// Data required to reproduce the compilation of a verified contract.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractSource {
    pub compiler_version: String,
    pub input: CompilerInput,
    pub contract_name: String,
}

enum SourceCodeFormat {
    StandardJson(CompilerInput),
    MultiFile(BTreeMap<String, Source>),
    SingleFile(String),
}

impl SourceCodeRecord {
    pub fn into_contract_source(self) -> Result<ContractSource, FetchError> {
        if self.source_code.is_empty() {
            return Err(FetchError::NotVerified);
        }
        if self.compiler_version.starts_with("vyper") {
            return Err(FetchError::UnsupportedLanguage(self.compiler_version));
        }
        let compiler_version = self
            .compiler_version
            .strip_prefix('v')
            .unwrap_or(&self.compiler_version)
            .to_string();

        let input = match self.source_code_format()? {
            SourceCodeFormat::StandardJson(input) => {
                if !input.is_solidity() {
                    return Err(FetchError::UnsupportedLanguage(input.language));
                }
                input.with_output_selection()
            }
            SourceCodeFormat::MultiFile(sources) => {
                let sources = sources
                    .into_iter()
                    .map(|(path, source)| (path, source.content))
                    .collect();
                self.build_input(sources)
            }
            SourceCodeFormat::SingleFile(content) => self.build_input(BTreeMap::from([(
                format!("{}.sol", self.contract_name),
                content,
            )])),
        };

        Ok(ContractSource {
            compiler_version,
            input,
            contract_name: self.contract_name,
        })
    }

    fn source_code_format(&self) -> Result<SourceCodeFormat, FetchError> {
        let source_code = self.source_code.trim();
        if source_code.starts_with("{{") && source_code.ends_with("}}") {
            let inner = &source_code[1..source_code.len() - 1];
            let input = serde_json::from_str(inner).map_err(|err| {
                FetchError::InvalidResponse(anyhow::anyhow!("invalid standard json input: {err}"))
            })?;
            return Ok(SourceCodeFormat::StandardJson(input));
        }
        if source_code.starts_with('{') {
            if let Ok(sources) = serde_json::from_str(source_code) {
                return Ok(SourceCodeFormat::MultiFile(sources));
            }
        }
        Ok(SourceCodeFormat::SingleFile(self.source_code.clone()))
    }

    fn build_input(&self, sources: BTreeMap<String, String>) -> CompilerInput {
        let mut settings = Map::new();
        settings.insert(
            "optimizer".to_string(),
            json!({
                "enabled": self.optimization_used == "1",
                "runs": self.runs.parse::<u64>().unwrap_or(200),
            }),
        );
        if !self.evm_version.is_empty() && !self.evm_version.eq_ignore_ascii_case("default") {
            settings.insert(
                "evmVersion".to_string(),
                Value::String(self.evm_version.to_lowercase()),
            );
        }
        let libraries = parse_libraries(&self.library);
        if !libraries.is_empty() {
            // An empty file name makes the libraries global.
            let path = contract_declaration(&sources, &self.contract_name).unwrap_or_default();
            settings.insert("libraries".to_string(), json!({ path: libraries }));
        }
        CompilerInput::solidity(sources, settings)
    }
}

/// Parses the `Library` field (`Name:address;Name2:address2`).
fn parse_libraries(libraries: &str) -> BTreeMap<String, String> {
    libraries
        .split(';')
        .filter_map(|library| {
            let (name, address) = library.split_once(':')?;
            let (name, address) = (name.trim(), address.trim());
            if name.is_empty() || address.is_empty() {
                return None;
            }
            let address = if address.starts_with("0x") {
                address.to_string()
            } else {
                format!("0x{address}")
            };
            Some((name.to_string(), address))
        })
        .collect()
}

/// Path of the first file declaring a contract, library or interface with
/// the given name. Comments and string literals are not considered.
fn contract_declaration<'a>(
    sources: &'a BTreeMap<String, String>,
    contract_name: &str,
) -> Option<&'a str> {
    sources
        .iter()
        .find(|(_, content)| declares(content, contract_name))
        .map(|(path, _)| path.as_str())
}

fn declares(content: &str, contract_name: &str) -> bool {
    let code = strip_comments_and_strings(content);
    let mut previous = "";
    code.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .filter(|token| !token.is_empty())
        .any(|token| {
            let declared = matches!(previous, "contract" | "library" | "interface")
                && token == contract_name;
            previous = token;
            declared
        })
}

fn strip_comments_and_strings(content: &str) -> String {
    let mut code = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                chars.by_ref().find(|&c| c == '\n');
                code.push('\n');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                chars.by_ref().find(|&c| {
                    let closed = previous == '*' && c == '/';
                    previous = c;
                    closed
                });
                code.push(' ');
            }
            '"' | '\'' => {
                let mut escaped = false;
                chars.by_ref().find(|&next| {
                    let closed = !escaped && next == c;
                    escaped = !escaped && next == '\\';
                    closed
                });
                code.push(' ');
            }
            c => code.push(c),
        }
    }
    code
}
