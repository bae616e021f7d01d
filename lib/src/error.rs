use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("{0} environment variable must be set")]
    MissingEnv(&'static str),
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("command failed: {command}\n{stderr}")]
    CommandError { command: String, stderr: String },
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("no vmware ova published for {0}")]
    NoArtifact(String),
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::DeployError;

    // Make sure callers can match specific errors.
    #[test]
    fn test_missing_env() {
        let result: Result<(), DeployError> = Err(DeployError::MissingEnv("GOVC_URL"));
        assert_eq!(
            result.unwrap_err().to_string(),
            "GOVC_URL environment variable must be set"
        );
    }
}
