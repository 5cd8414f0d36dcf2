//! Remediation playbook keyed by root-cause resource type.

use crate::alert::ResourceType;
use serde::Serialize;

/// Suggested actions, split by how soon they should happen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Remediation {
    pub immediate: Vec<String>,
    pub short_term: Vec<String>,
    pub long_term: Vec<String>,
}

impl Remediation {
    fn from_static(immediate: &[&str], short_term: &[&str], long_term: &[&str]) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            immediate: owned(immediate),
            short_term: owned(short_term),
            long_term: owned(long_term),
        }
    }

    /// Playbook for a batch that produced no incident.
    pub fn none() -> Self {
        Self::from_static(
            &["No action required; no active alerts in this batch"],
            &[],
            &["Review alert thresholds if this batch was expected to fire"],
        )
    }

    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.short_term.is_empty() && self.long_term.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.immediate.len() + self.short_term.len() + self.long_term.len()
    }
}

/// Look up the playbook for a root-cause resource type.
pub fn lookup(resource_type: ResourceType) -> Remediation {
    match resource_type {
        ResourceType::Memory => Remediation::from_static(
            &[
                "Identify the largest consumers: ps aux --sort=-%mem | head -20",
                "Check for OOM kills: dmesg -T | grep -i 'killed process'",
                "Restart the leaking service if it is safe to do so",
            ],
            &[
                "Capture a heap profile of the offending process",
                "Review recent deployments for memory regressions",
                "Set memory limits on the affected service",
            ],
            &[
                "Add leak detection to the release pipeline",
                "Right-size instance memory based on observed peaks",
            ],
        ),
        ResourceType::Cpu => Remediation::from_static(
            &[
                "Find the hottest processes: top -b -n 1 -o %CPU | head -20",
                "Check run-queue pressure: uptime && vmstat 1 5",
                "Throttle or pause non-critical batch jobs",
            ],
            &[
                "Profile the busiest service under load",
                "Check for runaway loops or retry storms in recent changes",
            ],
            &[
                "Add horizontal autoscaling on CPU utilisation",
                "Move CPU-heavy workloads off shared hosts",
            ],
        ),
        ResourceType::Disk => Remediation::from_static(
            &[
                "Check free space and inodes: df -h && df -i",
                "Find the largest directories: du -xh / | sort -rh | head -20",
                "Rotate or truncate runaway log files",
            ],
            &[
                "Check I/O saturation: iostat -x 1 5",
                "Clean up stale temporary files and old artifacts",
            ],
            &[
                "Set up log retention and rotation policies",
                "Alert on disk growth rate, not only on usage",
            ],
        ),
        ResourceType::Network => Remediation::from_static(
            &[
                "Check interface errors and drops: ip -s link",
                "Inspect socket states: ss -s",
                "Verify upstream reachability from the affected host",
            ],
            &[
                "Review firewall and load balancer changes",
                "Capture traffic on the busiest interface for analysis",
            ],
            &[
                "Add redundant network paths for critical services",
                "Track per-interface saturation alongside error rates",
            ],
        ),
        ResourceType::Process => Remediation::from_static(
            &[
                "Check service status: systemctl status <service>",
                "Read the last crash output: journalctl -u <service> -n 200",
                "Restart the failed process",
            ],
            &[
                "Look for crash loops and resource limits hit at startup",
                "Check file descriptor usage: ls /proc/<pid>/fd | wc -l",
            ],
            &[
                "Add health checks with automatic restart",
                "Review process resource limits and supervision",
            ],
        ),
        ResourceType::Unknown => Remediation::from_static(
            &[
                "Review the triggering chart on the affected host",
                "Check system logs around the first alert timestamp",
            ],
            &["Correlate with recent deployments and configuration changes"],
            &["Classify this chart so future incidents get a specific playbook"],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_has_immediate_steps() {
        for rt in ResourceType::CANONICAL
            .iter()
            .copied()
            .chain([ResourceType::Unknown])
        {
            let playbook = lookup(rt);
            assert!(!playbook.immediate.is_empty(), "{} has no immediate steps", rt);
            assert!(!playbook.long_term.is_empty(), "{} has no long-term steps", rt);
        }
    }

    #[test]
    fn test_memory_playbook_mentions_oom() {
        let playbook = lookup(ResourceType::Memory);
        assert!(playbook.immediate.iter().any(|s| s.contains("OOM")));
        assert_eq!(playbook.step_count(), 8);
    }

    #[test]
    fn test_none_playbook() {
        let playbook = Remediation::none();
        assert!(!playbook.is_empty());
        assert!(playbook.short_term.is_empty());
        assert!(Remediation::default().is_empty());
    }
}
