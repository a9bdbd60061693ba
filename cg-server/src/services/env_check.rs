//! Host capability probes for the session runtime

use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use cg_common::config::ToolsConfig;

const BYTES_PER_GB: f64 = 1_073_741_824.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolCheck {
    pub available: bool,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiskCheck {
    pub available: bool,
    pub free_gb: Option<f64>,
    pub min_free_gb: i64,
    pub sufficient: bool,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CpuCheck {
    pub available: bool,
    pub cores: Option<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageCheck {
    pub available: bool,
    pub image: String,
}

/// Response body of the environment check
#[derive(Debug, Clone, Serialize)]
pub struct EnvReport {
    pub ffmpeg: ToolCheck,
    pub whisper: ToolCheck,
    pub docker: ToolCheck,
    pub browser_recorder_image: ImageCheck,
    pub disk: DiskCheck,
    pub cpu: CpuCheck,
}

/// First non-empty output line of a successful run, `None` if the program
/// is missing or fails
pub async fn probe(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .or_else(|| Some(String::new()))
}

pub async fn docker_available(docker: &str) -> bool {
    probe(docker, &["--version"]).await.is_some()
}

/// Available bytes from POSIX `df -Pk` output
pub fn parse_df_output(output: &str) -> Option<u64> {
    let line = output.lines().nth(1)?;
    let kb: u64 = line.split_whitespace().nth(3)?.parse().ok()?;
    Some(kb * 1024)
}

/// Free bytes on the file system holding `path`
///
/// Walks up to the nearest existing ancestor so a not-yet-created archive
/// directory still reports its volume.
pub async fn disk_free_bytes(path: &Path) -> Option<u64> {
    let existing = path.ancestors().find(|p| p.exists())?;
    let output = Command::new("df")
        .arg("-Pk")
        .arg(existing)
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_df_output(&String::from_utf8_lossy(&output.stdout))
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_GB * 10.0).round() / 10.0
}

/// Probe every tool and resource the runtime depends on
pub async fn check_environment(tools: &ToolsConfig, archive_dir: &str, min_free_gb: i64) -> EnvReport {
    let ffmpeg = probe(&tools.ffmpeg, &["-version"]).await;
    let whisper = probe(&tools.whisper, &["--help"]).await;
    let docker = probe(&tools.docker, &["--version"]).await;

    let image_available = match docker {
        Some(_) => probe(&tools.docker, &["image", "inspect", tools.browser_recorder_image.as_str()])
            .await
            .is_some(),
        None => false,
    };

    let free_gb = disk_free_bytes(Path::new(archive_dir)).await.map(bytes_to_gb);
    let cores = std::thread::available_parallelism().ok().map(|n| n.get());

    EnvReport {
        ffmpeg: ToolCheck {
            available: ffmpeg.is_some(),
            version: ffmpeg,
        },
        whisper: ToolCheck {
            available: whisper.is_some(),
            // The CLI has no version flag
            version: None,
        },
        docker: ToolCheck {
            available: docker.is_some(),
            version: docker,
        },
        browser_recorder_image: ImageCheck {
            available: image_available,
            image: tools.browser_recorder_image.clone(),
        },
        disk: DiskCheck {
            available: free_gb.is_some(),
            free_gb,
            min_free_gb,
            sufficient: free_gb.map_or(false, |gb| gb >= min_free_gb as f64),
            path: archive_dir.to_string(),
        },
        cpu: CpuCheck {
            available: cores.is_some(),
            cores,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_df_output() {
        let out = "Filesystem     1024-blocks      Used Available Capacity Mounted on\n\
                   /dev/sda1        102400000  40000000  62400000      40% /\n";
        assert_eq!(parse_df_output(out), Some(62_400_000 * 1024));
        assert_eq!(parse_df_output("Filesystem only\n"), None);
        assert_eq!(parse_df_output(""), None);
    }

    #[test]
    fn test_bytes_to_gb_rounds_to_tenths() {
        assert_eq!(bytes_to_gb(5 * 1_073_741_824), 5.0);
        assert_eq!(bytes_to_gb(1_610_612_736), 1.5);
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        assert_eq!(probe("cardgraph-no-such-tool", &["--version"]).await, None);
        assert!(!docker_available("cardgraph-no-such-tool").await);
    }
}
