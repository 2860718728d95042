//! Transfer provider type enumeration and per-type credential rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The technology a transfer config reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "provider_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Local filesystem.
    Local,
    /// SSH file transfer.
    Sftp,
    /// Plain FTP.
    Ftp,
    /// Amazon S3.
    S3,
    /// Backblaze B2.
    B2,
    /// Wasabi (S3-compatible).
    Wasabi,
    /// MinIO (S3-compatible).
    Minio,
    /// SMB/CIFS network share.
    Smb,
    /// Generic WebDAV server.
    Webdav,
    /// Nextcloud (WebDAV dialect).
    Nextcloud,
    /// Google Drive.
    Gdrive,
    /// Google Photos.
    Gphotos,
    /// Hetzner Storage Box / object storage (S3-compatible).
    Hetzner,
}

/// Groups of provider types that share a wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    /// Local disk.
    Local,
    /// S3 API compatible object stores.
    S3Compatible,
    /// Backblaze native API.
    B2,
    /// SSH file transfer.
    Sftp,
    /// FTP.
    Ftp,
    /// SMB/CIFS.
    Smb,
    /// WebDAV and dialects.
    WebDav,
    /// Google APIs with OAuth tokens.
    Google,
}

/// One credential requirement for a provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRule {
    /// The key must be present and non-empty.
    Required(&'static str),
    /// At least one of the keys must be present and non-empty.
    AnyOf(&'static [&'static str]),
}

impl ProviderType {
    /// Every provider type, in declaration order.
    pub const ALL: [ProviderType; 13] = [
        Self::Local,
        Self::Sftp,
        Self::Ftp,
        Self::S3,
        Self::B2,
        Self::Wasabi,
        Self::Minio,
        Self::Smb,
        Self::Webdav,
        Self::Nextcloud,
        Self::Gdrive,
        Self::Gphotos,
        Self::Hetzner,
    ];

    /// Return the provider type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sftp => "sftp",
            Self::Ftp => "ftp",
            Self::S3 => "s3",
            Self::B2 => "b2",
            Self::Wasabi => "wasabi",
            Self::Minio => "minio",
            Self::Smb => "smb",
            Self::Webdav => "webdav",
            Self::Nextcloud => "nextcloud",
            Self::Gdrive => "gdrive",
            Self::Gphotos => "gphotos",
            Self::Hetzner => "hetzner",
        }
    }

    /// The protocol family of this provider type.
    pub fn family(&self) -> ProviderFamily {
        match self {
            Self::Local => ProviderFamily::Local,
            Self::S3 | Self::Wasabi | Self::Minio | Self::Hetzner => ProviderFamily::S3Compatible,
            Self::B2 => ProviderFamily::B2,
            Self::Sftp => ProviderFamily::Sftp,
            Self::Ftp => ProviderFamily::Ftp,
            Self::Smb => ProviderFamily::Smb,
            Self::Webdav | Self::Nextcloud => ProviderFamily::WebDav,
            Self::Gdrive | Self::Gphotos => ProviderFamily::Google,
        }
    }

    /// Credential keys this type needs. Keys of other types are ignored.
    pub fn credential_rules(&self) -> &'static [CredentialRule] {
        use CredentialRule::{AnyOf, Required};
        match self {
            Self::Local => &[],
            Self::Sftp => &[
                Required("host"),
                Required("user"),
                AnyOf(&["password", "key_file"]),
            ],
            Self::Ftp => &[Required("host"), Required("user")],
            Self::S3 => &[
                Required("access_key_id"),
                Required("secret_access_key"),
                Required("bucket"),
            ],
            Self::Wasabi | Self::Minio | Self::Hetzner => &[
                Required("access_key_id"),
                Required("secret_access_key"),
                Required("bucket"),
                Required("endpoint"),
            ],
            Self::B2 => &[Required("account"), Required("key"), Required("bucket")],
            Self::Smb => &[Required("host"), Required("user"), Required("share")],
            Self::Webdav | Self::Nextcloud => &[Required("url"), Required("user")],
            Self::Gdrive | Self::Gphotos => &[Required("client_id"), Required("token")],
        }
    }

    /// Describe every rule the given credentials violate.
    pub fn missing_credentials(&self, credentials: &serde_json::Value) -> Vec<String> {
        let present = |key: &str| {
            credentials
                .get(key)
                .map(|v| match v {
                    serde_json::Value::String(s) => !s.trim().is_empty(),
                    serde_json::Value::Null => false,
                    _ => true,
                })
                .unwrap_or(false)
        };

        self.credential_rules()
            .iter()
            .filter_map(|rule| match rule {
                CredentialRule::Required(key) if !present(key) => Some((*key).to_string()),
                CredentialRule::AnyOf(keys) if !keys.iter().any(|k| present(k)) => {
                    Some(keys.join(" or "))
                }
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = mft_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| {
                mft_core::AppError::validation(format!("Invalid provider type: '{s}'"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_names() {
        for t in ProviderType::ALL {
            assert_eq!(t.as_str().parse::<ProviderType>().unwrap(), t);
        }
        assert!("dropbox".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_sftp_accepts_password_or_key() {
        let with_key = json!({"host": "h", "user": "u", "key_file": "/k"});
        assert!(ProviderType::Sftp.missing_credentials(&with_key).is_empty());

        let neither = json!({"host": "h", "user": "u"});
        assert_eq!(
            ProviderType::Sftp.missing_credentials(&neither),
            vec!["password or key_file".to_string()]
        );
    }

    #[test]
    fn test_irrelevant_fields_are_ignored() {
        let creds = json!({"bucket": "b", "host": ""});
        assert!(ProviderType::Local.missing_credentials(&creds).is_empty());
        assert_eq!(
            ProviderType::Minio.missing_credentials(&creds),
            vec!["access_key_id", "secret_access_key", "endpoint"]
        );
    }
}
