//! Remote providers reached through the `rclone` binary.
//!
//! Each provider uses an on-the-fly remote (`:sftp:root`) whose backend
//! options are passed as `RCLONE_<BACKEND>_<OPTION>` environment variables,
//! so credentials never appear in the process arguments. Password options
//! must be obscured with `rclone obscure` first; that happens once per
//! provider, lazily.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use mft_core::error::{AppError, ErrorKind};
use mft_core::result::AppResult;
use mft_core::traits::{RemoteEntry, TransferProvider};
use mft_entity::ProviderType;

/// stderr fragments that indicate rejected credentials.
const AUTH_MARKERS: &[&str] = &[
    "authentication failed",
    "unable to authenticate",
    "permission denied",
    "access denied",
    "accessdenied",
    "invalidaccesskeyid",
    "signaturedoesnotmatch",
    "login incorrect",
    "530 ",
    "401 unauthorized",
    "403 forbidden",
    "invalid_grant",
    "unauthorized",
    "bad_auth_token",
];

/// stderr fragments that indicate a missing object.
const NOT_FOUND_MARKERS: &[&str] = &["not found", "doesn't exist", "no such file"];

/// One entry of `rclone lsjson` output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsJsonEntry {
    path: String,
    name: String,
    #[serde(default)]
    size: i64,
    mod_time: Option<DateTime<Utc>>,
    #[serde(default)]
    is_dir: bool,
}

/// A backend option passed to rclone.
#[derive(Debug, Clone)]
struct BackendOption {
    name: &'static str,
    value: String,
    obscure: bool,
}

/// A remote provider backed by the rclone CLI.
#[derive(Debug)]
pub struct RcloneProvider {
    provider_type: ProviderType,
    backend: &'static str,
    root: String,
    options: Vec<BackendOption>,
    env: OnceCell<Vec<(String, String)>>,
    binary: String,
    flags: Vec<String>,
    timeout: Duration,
    passive_mode: bool,
}

impl RcloneProvider {
    /// Build a provider for a remote type from its credential object.
    ///
    /// `root` is the config's path on the remote; bucket- and share-based
    /// types prefix it with the bucket or share name.
    pub fn new(
        provider_type: ProviderType,
        root: &str,
        credentials: &serde_json::Value,
        binary: &str,
        flags: Vec<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let get = |key: &str| -> Option<String> {
            match credentials.get(key) {
                Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
                Some(v @ serde_json::Value::Object(_)) => Some(v.to_string()),
                _ => None,
            }
        };

        let mut options = Vec::new();
        let mut opt = |name: &'static str, key: &str, obscure: bool| {
            if let Some(value) = get(key) {
                options.push(BackendOption {
                    name,
                    value,
                    obscure,
                });
            }
        };

        let root = root.trim_matches('/');
        let (backend, root) = match provider_type {
            ProviderType::Local => {
                return Err(AppError::internal(
                    "Local endpoints do not go through rclone",
                ));
            }
            ProviderType::Sftp => {
                opt("host", "host", false);
                opt("user", "user", false);
                opt("port", "port", false);
                opt("pass", "password", true);
                opt("key_file", "key_file", false);
                ("sftp", root.to_string())
            }
            ProviderType::Ftp => {
                opt("host", "host", false);
                opt("user", "user", false);
                opt("port", "port", false);
                opt("pass", "password", true);
                opt("explicit_tls", "explicit_tls", false);
                ("ftp", root.to_string())
            }
            ProviderType::S3
            | ProviderType::Wasabi
            | ProviderType::Minio
            | ProviderType::Hetzner => {
                let vendor = match provider_type {
                    ProviderType::S3 => "AWS",
                    ProviderType::Wasabi => "Wasabi",
                    ProviderType::Minio => "Minio",
                    _ => "Other",
                };
                opt("access_key_id", "access_key_id", false);
                opt("secret_access_key", "secret_access_key", false);
                opt("endpoint", "endpoint", false);
                opt("region", "region", false);
                options.push(BackendOption {
                    name: "provider",
                    value: vendor.to_string(),
                    obscure: false,
                });
                ("s3", prefixed(get("bucket"), root))
            }
            ProviderType::B2 => {
                opt("account", "account", false);
                opt("key", "key", false);
                ("b2", prefixed(get("bucket"), root))
            }
            ProviderType::Smb => {
                opt("host", "host", false);
                opt("user", "user", false);
                opt("pass", "password", true);
                opt("domain", "domain", false);
                ("smb", prefixed(get("share"), root))
            }
            ProviderType::Webdav | ProviderType::Nextcloud => {
                opt("url", "url", false);
                opt("user", "user", false);
                opt("pass", "password", true);
                let vendor = if provider_type == ProviderType::Nextcloud {
                    "nextcloud"
                } else {
                    "other"
                };
                options.push(BackendOption {
                    name: "vendor",
                    value: vendor.to_string(),
                    obscure: false,
                });
                ("webdav", root.to_string())
            }
            ProviderType::Gdrive => {
                opt("client_id", "client_id", false);
                opt("client_secret", "client_secret", false);
                opt("token", "token", false);
                opt("root_folder_id", "root_folder_id", false);
                ("drive", root.to_string())
            }
            ProviderType::Gphotos => {
                opt("client_id", "client_id", false);
                opt("client_secret", "client_secret", false);
                opt("token", "token", false);
                ("googlephotos", root.to_string())
            }
        };

        let passive_mode = match credentials.get("passive_mode") {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s != "false",
            _ => true,
        };
        if provider_type == ProviderType::Ftp && !passive_mode {
            return Err(AppError::validation(
                "Active-mode FTP is not supported; set passive_mode to true",
            ));
        }

        Ok(Self {
            provider_type,
            backend,
            root,
            options,
            env: OnceCell::new(),
            binary: binary.to_string(),
            flags,
            timeout,
            passive_mode,
        })
    }

    /// The on-the-fly remote spec for a path below the root.
    fn remote(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        match (self.root.is_empty(), path.is_empty()) {
            (true, _) => format!(":{}:{path}", self.backend),
            (false, true) => format!(":{}:{}", self.backend, self.root),
            (false, false) => format!(":{}:{}/{path}", self.backend, self.root),
        }
    }

    /// Backend options as environment variables, obscuring secrets once.
    async fn environment(&self) -> AppResult<&[(String, String)]> {
        let env = self
            .env
            .get_or_try_init(|| async {
                let mut env = Vec::with_capacity(self.options.len());
                for option in &self.options {
                    let value = if option.obscure {
                        self.obscure(&option.value).await?
                    } else {
                        option.value.clone()
                    };
                    let key = format!(
                        "RCLONE_{}_{}",
                        self.backend.to_uppercase(),
                        option.name.to_uppercase()
                    );
                    env.push((key, value));
                }
                Ok::<_, AppError>(env)
            })
            .await?;
        Ok(env.as_slice())
    }

    async fn obscure(&self, secret: &str) -> AppResult<String> {
        let output = self
            .spawn(&["obscure", "-"], &[], Some(Bytes::from(secret.to_string())))
            .await?;
        Ok(String::from_utf8_lossy(&output).trim().to_string())
    }

    /// Run an rclone command with backend options, returning stdout.
    async fn run(&self, args: &[&str], stdin: Option<Bytes>) -> AppResult<Vec<u8>> {
        let env = self.environment().await?;
        self.spawn(args, env, stdin).await
    }

    async fn spawn(
        &self,
        args: &[&str],
        env: &[(String, String)],
        stdin: Option<Bytes>,
    ) -> AppResult<Vec<u8>> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .args(&self.flags)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            provider = %self.provider_type,
            command = args.first().copied().unwrap_or_default(),
            "Running rclone"
        );

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("rclone binary not found: {}", self.binary),
                    e,
                )
            } else {
                AppError::with_source(
                    ErrorKind::ProviderConnection,
                    "Failed to start rclone",
                    e,
                )
            }
        })?;

        // Feed stdin concurrently so a chatty child cannot deadlock on its
        // output pipes.
        let writer = match (stdin, child.stdin.take()) {
            (Some(data), Some(mut pipe)) => Some(tokio::spawn(async move {
                pipe.write_all(&data).await?;
                pipe.shutdown().await
            })),
            _ => None,
        };

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AppError::provider_connection(format!(
                    "rclone {} timed out after {}s",
                    args.first().copied().unwrap_or_default(),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                AppError::with_source(ErrorKind::ProviderConnection, "rclone I/O failure", e)
            })?;

        if output.status.success() {
            if let Some(writer) = writer {
                match writer.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        return Err(AppError::with_source(
                            ErrorKind::ProviderConnection,
                            "Failed to stream data to rclone",
                            e,
                        ));
                    }
                    Err(e) => {
                        return Err(AppError::with_source(
                            ErrorKind::Internal,
                            "rclone stdin task failed",
                            e,
                        ));
                    }
                }
            }
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let summary: String = stderr.trim().chars().take(500).collect();
        warn!(
            provider = %self.provider_type,
            code = output.status.code().unwrap_or(-1),
            stderr = %summary,
            "rclone command failed"
        );
        Err(classify_failure(self.provider_type, &summary))
    }
}

/// Map a failed rclone run to the engine's error taxonomy.
fn classify_failure(provider_type: ProviderType, stderr: &str) -> AppError {
    let lower = stderr.to_lowercase();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        AppError::provider_auth(format!("{provider_type} rejected credentials: {stderr}"))
    } else if NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
        AppError::not_found(format!("{provider_type}: {stderr}"))
    } else {
        AppError::provider_connection(format!("{provider_type} operation failed: {stderr}"))
    }
}

fn prefixed(prefix: Option<String>, root: &str) -> String {
    match prefix {
        Some(prefix) if root.is_empty() => prefix,
        Some(prefix) => format!("{prefix}/{root}"),
        None => root.to_string(),
    }
}

#[async_trait]
impl TransferProvider for RcloneProvider {
    fn provider_type(&self) -> &str {
        self.provider_type.as_str()
    }

    fn supports_passive_mode(&self) -> bool {
        self.provider_type == ProviderType::Ftp && self.passive_mode
    }

    fn supports_oauth_refresh(&self) -> bool {
        matches!(
            self.provider_type,
            ProviderType::Gdrive | ProviderType::Gphotos
        )
    }

    async fn list(&self, dir: &str) -> AppResult<Vec<RemoteEntry>> {
        let remote = self.remote(dir);
        let stdout = match self.run(&["lsjson", &remote], None).await {
            Ok(stdout) => stdout,
            Err(e) if e.kind == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let raw: Vec<LsJsonEntry> = serde_json::from_slice(&stdout).map_err(|e| {
            AppError::with_source(
                ErrorKind::ProviderConnection,
                "Unreadable rclone lsjson output",
                e,
            )
        })?;

        let dir = dir.trim_matches('/');
        let mut entries: Vec<RemoteEntry> = raw
            .into_iter()
            .map(|e| RemoteEntry {
                path: if dir.is_empty() {
                    e.path
                } else {
                    format!("{dir}/{}", e.path)
                },
                name: e.name,
                size_bytes: e.size.max(0) as u64,
                modified: e.mod_time,
                created: None,
                is_directory: e.is_dir,
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn read(&self, path: &str) -> AppResult<Bytes> {
        let remote = self.remote(path);
        Ok(Bytes::from(self.run(&["cat", &remote], None).await?))
    }

    async fn write(&self, path: &str, data: Bytes) -> AppResult<u64> {
        let remote = self.remote(path);
        let len = data.len() as u64;
        self.run(&["rcat", &remote], Some(data)).await?;
        Ok(len)
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let remote = self.remote(path);
        match self.run(&["deletefile", &remote], None).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(provider_type: ProviderType, root: &str, creds: serde_json::Value) -> RcloneProvider {
        RcloneProvider::new(
            provider_type,
            root,
            &creds,
            "rclone",
            Vec::new(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_remote_specs() {
        let sftp = build(ProviderType::Sftp, "/upload/", json!({"host": "h", "user": "u"}));
        assert_eq!(sftp.remote("a.csv"), ":sftp:upload/a.csv");
        assert_eq!(sftp.remote(""), ":sftp:upload");

        let s3 = build(
            ProviderType::Minio,
            "incoming",
            json!({"bucket": "data", "access_key_id": "k"}),
        );
        assert_eq!(s3.remote("x.bin"), ":s3:data/incoming/x.bin");
        assert!(s3.options.iter().any(|o| o.name == "provider" && o.value == "Minio"));
    }

    #[test]
    fn test_password_is_marked_for_obscuring() {
        let sftp = build(
            ProviderType::Sftp,
            "",
            json!({"host": "h", "user": "u", "password": "pw", "bucket": "ignored"}),
        );
        let pass = sftp.options.iter().find(|o| o.name == "pass").unwrap();
        assert!(pass.obscure);
        assert!(!sftp.options.iter().any(|o| o.value == "ignored"));
    }

    #[test]
    fn test_capabilities() {
        let ftp = build(ProviderType::Ftp, "", json!({"host": "h", "user": "u"}));
        assert!(ftp.supports_passive_mode());
        assert!(!ftp.supports_oauth_refresh());

        let drive = build(ProviderType::Gdrive, "", json!({"client_id": "c", "token": "t"}));
        assert!(drive.supports_oauth_refresh());

        let active = RcloneProvider::new(
            ProviderType::Ftp,
            "",
            &json!({"host": "h", "passive_mode": false}),
            "rclone",
            Vec::new(),
            Duration::from_secs(5),
        );
        assert!(active.is_err());
    }

    #[test]
    fn test_classify_failure() {
        let auth = classify_failure(ProviderType::Sftp, "ssh: unable to authenticate");
        assert_eq!(auth.kind, ErrorKind::ProviderAuth);
        let missing = classify_failure(ProviderType::S3, "object not found");
        assert_eq!(missing.kind, ErrorKind::NotFound);
        let other = classify_failure(ProviderType::S3, "dial tcp: i/o timeout");
        assert_eq!(other.kind, ErrorKind::ProviderConnection);
    }

    #[tokio::test]
    async fn test_missing_binary_is_configuration_error() {
        let provider = RcloneProvider::new(
            ProviderType::Sftp,
            "",
            &json!({"host": "h", "user": "u"}),
            "/nonexistent/rclone-binary",
            Vec::new(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = provider.list("").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
