use super::wrappers::ContractWrapper;

/// A contract may be verified once every source referenced by its metadata
/// is available with the expected hash and it has a target to verify against.
pub fn is_verifiable(wrapper: &ContractWrapper) -> bool {
    wrapper.sources().is_complete() && wrapper.target().is_some()
}
