//! File format identification for bare path sources.
//!
//! Extension lookups come first. Files without an extension are sniffed by
//! their leading bytes, and the configured dump commands settle the cases
//! the signature alone cannot (netCDF-4 files carry an HDF5 signature).

use std::fs::File;
use std::io::Read;
use std::process::{Command, Stdio};

use crate::config::Config;
use crate::request::PluginRegistry;
use crate::strings::{basename, is_legal_file_path};

/// Bytes read from an extensionless file when sniffing its format.
const SIGNATURE_LENGTH: usize = 10;

const HDF5_SIGNATURE: &[u8] = b"\x89HDF";
const NETCDF_SIGNATURE: &[u8] = b"CDF";

/// Identify the reader format of `path`.
///
/// Returns `None` when nothing matched; the caller decides whether that is
/// an error.
pub fn identify_file_format(path: &str, config: &Config, registry: &PluginRegistry) -> Option<String> {
    if path.is_empty() || !is_legal_file_path(path) {
        return None;
    }

    let name = basename(path);
    let extension = name.rfind('.').map(|i| &name[i + 1..]).unwrap_or("");

    if !extension.is_empty() {
        if let Some(entry) = registry.by_extension(extension) {
            tracing::debug!(format = %entry.format, extension, "format from registry extension");
            return Some(entry.format.clone());
        }
        if let Some(format) = well_known_extension(extension) {
            tracing::debug!(format, extension, "format from extension");
            return Some(format.to_string());
        }
    }

    // Generic `/<pulse>...` paths belong to the default format.
    if path
        .strip_prefix('/')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
        && !config.api_format.is_empty()
    {
        return Some(config.api_format.clone());
    }

    if extension.is_empty() {
        return sniff_format(path, config);
    }

    None
}

fn well_known_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.to_ascii_lowercase();
    if extension.len() == 2 && extension.bytes().all(|b| b.is_ascii_digit()) {
        return Some("IDA3");
    }
    match extension.as_str() {
        "nc" | "cdf" => Some("NETCDF"),
        "hf" | "h5" | "hdf5" => Some("HDF5"),
        "xml" => Some("XML"),
        "csv" => Some("CSV"),
        _ => None,
    }
}

fn read_signature(path: &str) -> Option<Vec<u8>> {
    let mut file = File::open(path).ok()?;
    let mut buf = vec![0u8; SIGNATURE_LENGTH];
    let n = file.read(&mut buf).ok()?;
    buf.truncate(n);
    Some(buf)
}

fn sniff_format(path: &str, config: &Config) -> Option<String> {
    let signature = read_signature(path)?;

    if signature.starts_with(NETCDF_SIGNATURE) {
        return Some("NETCDF".to_string());
    }

    if signature.starts_with(HDF5_SIGNATURE) {
        let is_netcdf4 = config
            .netcdf_dump_command
            .as_deref()
            .is_some_and(|cmd| command_accepts(cmd, &["-h", path]));
        return Some(if is_netcdf4 { "NETCDF" } else { "HDF5" }.to_string());
    }

    if config
        .ida_dump_command
        .as_deref()
        .is_some_and(|cmd| command_accepts(cmd, &[path]))
    {
        return Some("IDA".to_string());
    }

    None
}

/// Run `command args..` and report whether it exited successfully.
///
/// Blocks until the child exits.
fn command_accepts(command: &str, args: &[&str]) -> bool {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        return false;
    };
    match Command::new(program)
        .args(parts)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::warn!(program, "format probe failed to start: {}", e);
            false
        }
    }
}
