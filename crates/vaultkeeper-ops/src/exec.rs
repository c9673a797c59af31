//! `delegatedExec` — spawns a child process with `{{secret}}` substituted
//! into its arguments and environment values, merged with the ambient
//! process environment. Captures stdout/stderr and the exit code; a
//! non-zero exit is a normal result, not an error.

use tokio::process::Command;

use vaultkeeper_capability::token::CapabilityToken;
use vaultkeeper_core::error::{Error, Result};

use crate::substitute::substitute;

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub async fn delegated_exec(token: &CapabilityToken, request: &ExecRequest) -> Result<ExecResult> {
    let claims = token.claims().await?;
    let secret = &claims.val;

    let args: Vec<String> = request.args.iter().map(|a| substitute(a, secret)).collect();

    let mut command = Command::new(&request.command);
    command.args(&args);
    for (key, value) in &request.env {
        command.env(key, substitute(value, secret));
    }

    let output = command.output().await.map_err(|e| Error::ExecFailed {
        message: e.to_string(),
    })?;

    Ok(ExecResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultkeeper_capability::store::ClaimsStore;
    use vaultkeeper_core::claims::{Claims, UsageLimit};
    use std::sync::Arc;

    fn sample_claims(val: &str) -> Claims {
        Claims {
            jti: "jti-1".to_string(),
            iat: 0,
            exp: i64::MAX,
            sub: "s".to_string(),
            exe: "dev".to_string(),
            usage_limit: UsageLimit::Unlimited,
            tid: 3,
            bkd: "memory".to_string(),
            val: val.to_string(),
            reference: "s".to_string(),
        }
    }

    #[tokio::test]
    async fn exec_substitutes_args_and_captures_output() {
        let store = Arc::new(ClaimsStore::new());
        let handle = store.insert(sample_claims("hello-secret")).await;
        let token = CapabilityToken::new(handle, store);

        let request = ExecRequest {
            command: "echo".to_string(),
            args: vec!["{{secret}}".to_string()],
            env: vec![],
        };
        let result = delegated_exec(&token, &request).await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hello-secret"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let store = Arc::new(ClaimsStore::new());
        let handle = store.insert(sample_claims("v")).await;
        let token = CapabilityToken::new(handle, store);

        let request = ExecRequest {
            command: "false".to_string(),
            args: vec![],
            env: vec![],
        };
        let result = delegated_exec(&token, &request).await.unwrap();
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn failure_to_spawn_is_exec_failed() {
        let store = Arc::new(ClaimsStore::new());
        let handle = store.insert(sample_claims("v")).await;
        let token = CapabilityToken::new(handle, store);

        let request = ExecRequest {
            command: "/nonexistent/binary/path".to_string(),
            args: vec![],
            env: vec![],
        };
        let err = delegated_exec(&token, &request).await.unwrap_err();
        assert!(matches!(err, Error::ExecFailed { .. }));
    }
}
