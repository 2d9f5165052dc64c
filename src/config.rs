//! Configuration for the converter backend
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// ArtyPacks converter - brushset to image-pack conversion backend
#[derive(Parser, Debug, Clone)]
#[command(name = "artypacks-converter")]
#[command(about = "Converts brushset containers into downloadable stamp packs")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5001")]
    pub listen: SocketAddr,

    /// Public base URL for download links served from local storage
    /// (e.g., "https://converter.artypacks.app")
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:5001")]
    pub public_base_url: String,

    /// Base URL of the license service (Supabase-style REST endpoint)
    #[arg(long, env = "LICENSE_API_URL")]
    pub license_api_url: Option<String>,

    /// Service key sent to the license service
    #[arg(long, env = "LICENSE_SERVICE_KEY")]
    pub license_service_key: Option<String>,

    /// Delivery sink backend: "local" (disk + /downloads route) or "object"
    /// (HTTP object store upload)
    #[arg(long, env = "STORAGE_MODE", value_enum, default_value = "local")]
    pub storage_mode: StorageMode,

    /// Directory for locally stored output packs (local mode)
    #[arg(long, env = "STORAGE_DIR", default_value = "./conversions")]
    pub storage_dir: String,

    /// Object store bucket name (object mode)
    #[arg(long, env = "STORAGE_BUCKET", default_value = "conversions")]
    pub storage_bucket: String,

    /// MongoDB connection URI for the provenance log
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "artypacks")]
    pub mongodb_db: String,

    /// Comma-separated list of allowed CORS origins ("*" allows any)
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    /// Prefix baked into output pack names and the pack's root folder
    #[arg(long, env = "BRAND_PREFIX", default_value = "ArtyPacks")]
    pub brand_prefix: String,

    /// Minimum stamp dimension in pixels (both width and height)
    #[arg(long, env = "MIN_STAMP_PX", default_value = "1024")]
    pub min_stamp_px: u32,

    /// Maximum accepted upload size in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "200")]
    pub max_upload_mb: u64,

    /// Maximum total decompressed size of a container in megabytes; bounds
    /// memory against high-ratio (zip-bomb) archives
    #[arg(long, env = "MAX_UNPACKED_MB", default_value = "1024")]
    pub max_unpacked_mb: u64,

    /// Recovery lookup window in hours (how far back /api/recover-link reaches)
    #[arg(long, env = "RECOVERY_WINDOW_HOURS", default_value = "48")]
    pub recovery_window_hours: i64,

    /// Maximum records returned by a recovery lookup
    #[arg(long, env = "RECOVERY_LIMIT", default_value = "5")]
    pub recovery_limit: i64,

    /// Enable development mode (license gate and provenance log become optional)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Delivery sink backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageMode {
    /// Write packs to a local directory, serve them at /downloads/*
    Local,
    /// Upload packs to an HTTP object store, return its public URL
    Object,
}

impl Args {
    /// Maximum upload size in bytes
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    /// Maximum total decompressed container size in bytes
    pub fn max_unpacked_bytes(&self) -> u64 {
        self.max_unpacked_mb * 1024 * 1024
    }

    /// Parsed allowed-origin list; empty means "*"
    pub fn origin_list(&self) -> Vec<String> {
        if self.allowed_origins.trim() == "*" {
            return Vec::new();
        }
        self.allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.license_api_url.is_none() {
                return Err("LICENSE_API_URL is required in production mode".to_string());
            }
            if self.license_service_key.is_none() {
                return Err("LICENSE_SERVICE_KEY is required in production mode".to_string());
            }
        }

        if self.storage_mode == StorageMode::Object && self.license_api_url.is_none() {
            // Object mode reuses the service base URL for storage uploads
            return Err("STORAGE_MODE=object requires LICENSE_API_URL".to_string());
        }

        if self.min_stamp_px == 0 {
            return Err("MIN_STAMP_PX must be at least 1".to_string());
        }

        if self.max_unpacked_mb == 0 {
            return Err("MAX_UNPACKED_MB must be at least 1".to_string());
        }

        if self.recovery_window_hours <= 0 {
            return Err("RECOVERY_WINDOW_HOURS must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_args() -> Args {
        // --dev-mode is a bare flag; clap's bool derive takes no value
        Args::parse_from(["artypacks-converter", "--dev-mode"])
    }

    #[test]
    fn dev_mode_flag_parses_bare() {
        let args = Args::try_parse_from(["artypacks-converter", "--dev-mode"]).unwrap();
        assert!(args.dev_mode);
    }

    #[test]
    fn dev_mode_needs_no_license_service() {
        let args = dev_args();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn production_requires_license_service() {
        let args = Args::parse_from(["artypacks-converter"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn origin_list_parses_csv() {
        let mut args = dev_args();
        args.allowed_origins = "https://a.example, https://b.example".to_string();
        assert_eq!(args.origin_list(), vec!["https://a.example", "https://b.example"]);

        args.allowed_origins = "*".to_string();
        assert!(args.origin_list().is_empty());
    }

    #[test]
    fn upload_cap_in_bytes() {
        let mut args = dev_args();
        args.max_upload_mb = 2;
        assert_eq!(args.max_upload_bytes(), 2 * 1024 * 1024);
    }
}
