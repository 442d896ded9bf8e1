use super::{FailureReason, MatchType};
use crate::compiler::{CompiledContract, ImmutableReference};
use ethers_core::types::Bytes;
use minicbor::{data::Type, Decoder};

/// Bytecodes of a locally compiled contract.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledBytecode {
    creation: Vec<u8>,
    runtime: Vec<u8>,
    immutable_references: Vec<ImmutableReference>,
    constructor: Option<ethabi::Constructor>,
}

impl TryFrom<&CompiledContract> for CompiledBytecode {
    type Error = FailureReason;

    fn try_from(contract: &CompiledContract) -> Result<Self, Self::Error> {
        let internal = |message: &str| FailureReason::Internal(message.to_string());
        let evm = contract
            .evm
            .as_ref()
            .ok_or_else(|| internal("compiler output has no bytecode"))?;
        let creation = evm
            .bytecode
            .as_ref()
            .ok_or_else(|| internal("compiler output has no creation bytecode"))?;
        let deployed = evm
            .deployed_bytecode
            .as_ref()
            .ok_or_else(|| internal("compiler output has no deployed bytecode"))?;

        let decode = |object: &str, kind: &str| {
            hex::decode(object.trim_start_matches("0x")).map_err(|err| {
                FailureReason::Internal(format!(
                    "{kind} bytecode is not a valid hex (unlinked libraries?): {err}"
                ))
            })
        };

        let constructor = match &contract.abi {
            Some(abi) => serde_json::from_value::<ethabi::Contract>(abi.clone())
                .map_err(|err| FailureReason::Internal(format!("invalid abi: {err}")))?
                .constructor,
            None => None,
        };

        Ok(Self {
            creation: decode(&creation.object, "creation")?,
            runtime: decode(&deployed.object, "deployed")?,
            immutable_references: deployed.immutable_ranges(),
            constructor,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BytecodeMatch {
    pub match_type: MatchType,
    pub constructor_arguments: Option<Bytes>,
}

/// Compares recompiled bytecode with the code observed on-chain.
///
/// Deployed (runtime) code is compared first. The creation transaction input,
/// when known, is used as a fallback and to extract constructor arguments.
pub fn compare(
    compiled: &CompiledBytecode,
    deployed_code: &[u8],
    creation_input: Option<&[u8]>,
) -> Result<BytecodeMatch, FailureReason> {
    if deployed_code.is_empty() {
        return Err(FailureReason::NoDeployedCode);
    }

    match compare_runtime(compiled, deployed_code) {
        Ok(match_type) => {
            let constructor_arguments = creation_input
                .and_then(|input| compare_creation(compiled, input).ok())
                .and_then(|creation_match| creation_match.constructor_arguments);
            Ok(BytecodeMatch {
                match_type,
                constructor_arguments,
            })
        }
        Err(runtime_err) => match creation_input {
            Some(input) => match compare_creation(compiled, input) {
                Ok(creation_match) => Ok(creation_match),
                Err(FailureReason::ConstructorArgumentsMismatch) => {
                    Err(FailureReason::ConstructorArgumentsMismatch)
                }
                Err(_) => Err(runtime_err),
            },
            None => Err(runtime_err),
        },
    }
}

fn compare_runtime(
    compiled: &CompiledBytecode,
    deployed: &[u8],
) -> Result<MatchType, FailureReason> {
    let mut local = compiled.runtime.clone();
    for reference in &compiled.immutable_references {
        let end = reference.start + reference.length;
        if end > deployed.len() || end > local.len() {
            return Err(FailureReason::ImmutableReferencesMismatch);
        }
        local[reference.start..end].copy_from_slice(&deployed[reference.start..end]);
    }

    if local == deployed {
        return Ok(MatchType::Full);
    }
    match (strip_cbor_auxdata(&local), strip_cbor_auxdata(deployed)) {
        (Some(local), Some(deployed)) if local == deployed => Ok(MatchType::Partial),
        _ => Err(FailureReason::BytecodeMismatch),
    }
}

fn compare_creation(
    compiled: &CompiledBytecode,
    input: &[u8],
) -> Result<BytecodeMatch, FailureReason> {
    let creation = compiled.creation.as_slice();
    if input.len() < creation.len() {
        return Err(FailureReason::BytecodeMismatch);
    }
    let (code, arguments) = input.split_at(creation.len());

    let match_type = if code == creation {
        MatchType::Full
    } else {
        match (strip_cbor_auxdata(creation), strip_cbor_auxdata(code)) {
            (Some(local), Some(remote)) if local == remote => MatchType::Partial,
            _ => return Err(FailureReason::BytecodeMismatch),
        }
    };

    check_constructor_arguments(compiled.constructor.as_ref(), arguments)?;

    Ok(BytecodeMatch {
        match_type,
        constructor_arguments: (!arguments.is_empty()).then(|| Bytes::from(arguments.to_vec())),
    })
}

fn check_constructor_arguments(
    constructor: Option<&ethabi::Constructor>,
    arguments: &[u8],
) -> Result<(), FailureReason> {
    let valid = match constructor {
        None => arguments.is_empty(),
        Some(constructor) => {
            let types: Vec<_> = constructor
                .inputs
                .iter()
                .map(|param| param.kind.clone())
                .collect();
            ethabi::decode(&types, arguments).is_ok()
        }
    };
    valid
        .then_some(())
        .ok_or(FailureReason::ConstructorArgumentsMismatch)
}

/// Returns the code without the trailing CBOR encoded metadata,
/// or `None` if the code does not end with one.
///
/// The last two bytes keep the big-endian length of the CBOR map preceding them.
pub fn strip_cbor_auxdata(code: &[u8]) -> Option<&[u8]> {
    let len = code.len();
    if len < 2 {
        return None;
    }
    let cbor_len = u16::from_be_bytes([code[len - 2], code[len - 1]]) as usize;
    if cbor_len == 0 || cbor_len + 2 > len {
        return None;
    }
    let start = len - 2 - cbor_len;
    let cbor = &code[start..len - 2];

    let mut decoder = Decoder::new(cbor);
    match decoder.datatype() {
        Ok(Type::Map) | Ok(Type::MapIndef) => {}
        _ => return None,
    }
    decoder.skip().ok()?;
    (decoder.position() == cbor.len()).then_some(&code[..start])
}
