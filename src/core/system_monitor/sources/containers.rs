//! Container runtime source backed by the `docker` CLI.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::MetricSource;
use crate::core::system_monitor::metrics::{MetricId, MetricSample, Unit};
use crate::error::{DashError, Result};

pub const CONTAINERS_ID: &str = "containers";
pub const CONTAINER_CPU_FAMILY: &str = "container_cpu";
pub const CONTAINER_MEM_FAMILY: &str = "container_mem";

const STATS_FORMAT: &str = "{{.Name}}\t{{.CPUPerc}}\t{{.MemPerc}}";
const CHILD_POLL: Duration = Duration::from_millis(10);

/// One row of `docker stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStats {
    pub name: String,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
}

pub struct ContainerSource {
    docker: PathBuf,
    /// A docker call running longer than this is killed
    command_timeout: Duration,
}

impl ContainerSource {
    /// Locate the docker binary and check that the daemon answers.
    pub fn probe(command_timeout: Duration) -> Result<Self> {
        let docker = which::which("docker")
            .map_err(|e| DashError::source_unavailable(format!("docker not found: {}", e)))?;

        let mut version = Command::new(&docker);
        version.args(["version", "--format", "{{.Server.Version}}"]);
        let output = output_within(version, command_timeout).map_err(|e| {
            DashError::source_unavailable(format!("docker daemon not reachable: {}", e))
        })?;
        if !output.status.success() {
            return Err(DashError::source_unavailable(format!(
                "docker daemon not reachable: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        log::info!(
            "container runtime found: docker {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(Self {
            docker,
            command_timeout,
        })
    }

    fn stats(&self) -> Result<Vec<ContainerStats>> {
        let mut stats = Command::new(&self.docker);
        stats.args(["stats", "--no-stream", "--format", STATS_FORMAT]);
        let output = output_within(stats, self.command_timeout)?;
        if !output.status.success() {
            return Err(DashError::metric_collection(format!(
                "docker stats failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_stats_line)
            .collect())
    }
}

/// Run a command to completion, killing it once `limit` has passed.
///
/// Output is drained on a helper thread so a chatty child cannot block on a
/// full pipe while we wait for it.
pub fn output_within(mut command: Command, limit: Duration) -> Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DashError::SourceTimeout {
                source_id: CONTAINERS_ID.to_string(),
                millis: limit.as_millis() as u64,
            });
        }
        thread::sleep(CHILD_POLL);
    };

    let collect = |reader: Option<thread::JoinHandle<Vec<u8>>>| {
        reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    };
    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

/// Parse one `name<TAB>cpu%<TAB>mem%` line; blank lines yield `None`.
pub fn parse_stats_line(line: &str) -> Option<ContainerStats> {
    let mut fields = line.trim().split('\t');
    let name = fields.next().filter(|n| !n.is_empty())?.to_string();
    let cpu_percent = fields.next().and_then(parse_percent);
    let memory_percent = fields.next().and_then(parse_percent);
    Some(ContainerStats {
        name,
        cpu_percent,
        memory_percent,
    })
}

// docker prints "--" for containers that are still starting
fn parse_percent(field: &str) -> Option<f64> {
    field.trim().trim_end_matches('%').parse().ok()
}

impl MetricSource for ContainerSource {
    fn id(&self) -> MetricId {
        MetricId::new(CONTAINERS_ID)
    }

    fn unit(&self) -> Unit {
        Unit::Count
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let stats = self.stats()?;

        let mut samples = Vec::with_capacity(stats.len() * 2 + 1);
        samples.push(MetricSample::new(self.id(), stats.len() as f64, Unit::Count));
        for container in &stats {
            let cpu_id = MetricId::instance(CONTAINER_CPU_FAMILY, &container.name);
            let mem_id = MetricId::instance(CONTAINER_MEM_FAMILY, &container.name);
            samples.push(match container.cpu_percent {
                Some(value) => MetricSample::new(cpu_id, value, Unit::Percent),
                None => MetricSample::unavailable(cpu_id, Unit::Percent),
            });
            samples.push(match container.memory_percent {
                Some(value) => MetricSample::new(mem_id, value, Unit::Percent),
                None => MetricSample::unavailable(mem_id, Unit::Percent),
            });
        }
        Ok(samples)
    }
}
