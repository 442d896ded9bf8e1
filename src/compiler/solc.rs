use super::{Compiler, CompilerInput, CompilerOutput, Error};
use crate::metrics;
use anyhow::Context;
use async_trait::async_trait;
use ethers_solc::{error::SolcError, Solc};
use std::{num::NonZeroUsize, sync::Arc};
use tokio::sync::Semaphore;
use tracing::instrument;

/// Runs solc releases installed through svm.
#[derive(Clone)]
pub struct SolcCompiler {
    threads_semaphore: Arc<Semaphore>,
}

impl SolcCompiler {
    pub fn new(max_threads: NonZeroUsize) -> Self {
        Self {
            threads_semaphore: Arc::new(Semaphore::new(max_threads.get())),
        }
    }
}

#[async_trait]
impl Compiler for SolcCompiler {
    #[instrument(skip(self, input), level = "debug")]
    async fn compile(
        &self,
        version: &str,
        input: &CompilerInput,
    ) -> Result<CompilerOutput, Error> {
        let release = release_version(version)?;

        let _permit = self
            .threads_semaphore
            .acquire()
            .await
            .context("acquiring compiler lock")?;

        let raw = {
            let _timer = metrics::COMPILE_TIME.start_timer();
            let input = input.clone();
            let solc_release = release.to_string();
            tokio::task::spawn_blocking(move || -> Result<Vec<u8>, SolcError> {
                let solc = Solc::find_or_install_svm_version(solc_release)?;
                solc.compile_output(&input)
            })
            .await
            .context("compilation task failed")?
            .with_context(|| format!("running solc {release}"))?
        };

        let output: CompilerOutput =
            serde_json::from_slice(&raw).context("parsing compiler output")?;
        let errors = output.error_messages();
        if !errors.is_empty() {
            return Err(Error::Compilation(errors));
        }
        Ok(output)
    }
}

/// svm works with plain releases, so the commit part of the long
/// version (`0.8.17+commit.8df45f5f`) is dropped.
fn release_version(version: &str) -> Result<semver::Version, Error> {
    let unsupported = |reason: String| Error::UnsupportedVersion {
        version: version.to_string(),
        reason,
    };
    let parsed = semver::Version::parse(version.trim_start_matches('v'))
        .map_err(|err| unsupported(err.to_string()))?;
    if !parsed.pre.is_empty() {
        return Err(unsupported(
            "nightly versions aren't supported in svm".to_string(),
        ));
    }
    Ok(semver::Version::new(parsed.major, parsed.minor, parsed.patch))
}
