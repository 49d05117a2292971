//! Credential Chain, per spec.md §4.6.
//!

use std::collections::BTreeMap;
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use tfx_common::ExpiringCache;

use crate::error::Error;

/// A named bundle of env-var pairs contributed by one provider.
///
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Credentials {
    pub name: String,
    pub envs: BTreeMap<String, String>,
}

pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn get_credentials(&self) -> Result<Option<Credentials>, Error>;
}

#[derive(Debug, Deserialize)]
struct AwsCredentials {
    #[serde(rename = "ACCESS_KEY_ID")]
    access_key_id: String,
    #[serde(rename = "SECRET_ACCESS_KEY")]
    secret_access_key: String,
    #[serde(rename = "SESSION_TOKEN")]
    session_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AwsRole {
    #[serde(rename = "roleARN")]
    role_arn: String,
    #[serde(rename = "roleSessionName")]
    role_session_name: String,
    duration: u64,
    #[serde(rename = "webIdentityToken")]
    web_identity_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalCommandOutput {
    envs: BTreeMap<String, String>,
    #[serde(rename = "awsCredentials")]
    aws_credentials: Option<AwsCredentials>,
    #[serde(rename = "awsRole")]
    aws_role: Option<AwsRole>,
}

/// Runs a configured external command and parses its stdout as the provider schema described in
/// spec.md §4.6. When `awsRole` is present, recurses into [`StsAssumeRoleProvider`].
///
pub struct ExternalCommandProvider {
    name: String,
    argv: Vec<String>,
    sts: StsAssumeRoleProvider,
}

impl ExternalCommandProvider {
    pub fn new(name: impl Into<String>, argv: Vec<String>, sts: StsAssumeRoleProvider) -> Self {
        ExternalCommandProvider {
            name: name.into(),
            argv,
            sts,
        }
    }
}

impl Provider for ExternalCommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_credentials(&self) -> Result<Option<Credentials>, Error> {
        let Some((bin, args)) = self.argv.split_first() else {
            return Ok(None);
        };
        let output = Command::new(bin)
            .args(args)
            .output()
            .map_err(|e| Error::Credential(format!("{}: {e}", self.name)))?;
        if !output.status.success() {
            return Err(Error::Credential(format!(
                "{}: external credential command exited with {:?}",
                self.name,
                output.status.code()
            )));
        }

        let parsed: ExternalCommandOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Credential(format!("{}: malformed credential output: {e}", self.name)))?;

        let mut envs = parsed.envs;
        if let Some(aws) = parsed.aws_credentials {
            envs.insert("AWS_ACCESS_KEY_ID".into(), aws.access_key_id);
            envs.insert("AWS_SECRET_ACCESS_KEY".into(), aws.secret_access_key);
            if let Some(token) = aws.session_token {
                envs.insert("AWS_SESSION_TOKEN".into(), token);
            }
        }

        if let Some(role) = parsed.aws_role {
            if let Some(assumed) = self.sts.assume_role(
                &role.role_arn,
                &role.role_session_name,
                Duration::from_secs(role.duration),
                role.web_identity_token.as_deref(),
            )? {
                envs.extend(assumed.envs);
            }
        }

        Ok(Some(Credentials {
            name: self.name.clone(),
            envs,
        }))
    }
}

/// STS assume-role result, cached by role ARN for `duration`.
///
/// The real implementation would call the cloud STS API; no cloud SDK is part of this
/// workspace's dependency stack, so [`StsClient`] is a trait seam and [`NullStsClient`] is the
/// only implementation shipped here — callers that need real STS calls provide their own.
///
pub trait StsClient: Send + Sync {
    fn assume_role(
        &self,
        role_arn: &str,
        role_session_name: &str,
        web_identity_token: Option<&str>,
    ) -> Result<Credentials, Error>;
}

pub struct NullStsClient;

impl StsClient for NullStsClient {
    fn assume_role(
        &self,
        role_arn: &str,
        _role_session_name: &str,
        _web_identity_token: Option<&str>,
    ) -> Result<Credentials, Error> {
        Err(Error::Credential(format!(
            "no STS client configured; cannot assume role {role_arn}"
        )))
    }
}

pub struct StsAssumeRoleProvider {
    client: Box<dyn StsClient>,
    cache: ExpiringCache<String, Credentials>,
}

impl StsAssumeRoleProvider {
    pub fn new(client: Box<dyn StsClient>) -> Self {
        StsAssumeRoleProvider {
            client,
            cache: ExpiringCache::new(),
        }
    }

    pub fn assume_role(
        &self,
        role_arn: &str,
        role_session_name: &str,
        duration: Duration,
        web_identity_token: Option<&str>,
    ) -> Result<Option<Credentials>, Error> {
        if let Some(cached) = self.cache.get(&role_arn.to_string()) {
            return Ok(Some(cached));
        }
        let credentials = self.client.assume_role(role_arn, role_session_name, web_identity_token)?;
        self.cache
            .insert_with_ttl(role_arn.to_string(), credentials.clone(), duration);
        Ok(Some(credentials))
    }
}

/// Invokes `providers` in order; later bundles overwrite earlier ones by credential name,
/// logging a warning identifying both providers when that happens.
///
/// Takes `Arc<dyn Provider>` rather than `Box<dyn Provider>` so the same provider set --
/// including any cached STS sessions -- can be shared cheaply across every component in a run
/// instead of being rebuilt (and its cache reset) per component.
///
pub fn resolve_chain(providers: &[std::sync::Arc<dyn Provider>]) -> Result<BTreeMap<String, String>, Error> {
    let mut by_name: BTreeMap<String, (String, BTreeMap<String, String>)> = BTreeMap::new();

    for provider in providers {
        match provider.get_credentials()? {
            Some(creds) => {
                if let Some((earlier_provider, _)) = by_name.get(&creds.name) {
                    tracing::warn!(
                        credential = %creds.name,
                        earlier = %earlier_provider,
                        later = %provider.name(),
                        "credential bundle overwritten by a later provider"
                    );
                }
                by_name.insert(creds.name.clone(), (provider.name().to_string(), creds.envs));
            }
            None => continue,
        }
    }

    let mut merged = BTreeMap::new();
    for (_, envs) in by_name.into_values() {
        merged.extend(envs);
    }
    Ok(merged)
}
