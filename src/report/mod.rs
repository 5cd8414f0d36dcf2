//! Human-readable renderings of an incident analysis.

use crate::analysis::blast_radius::Component;
use crate::detect::IncidentIntelligence;

const MAX_TIMELINE_LINES: usize = 20;

/// Format a duration in seconds as `45s`, `3m 20s` or `1h 5m`.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn names(components: &[Component]) -> String {
    if components.is_empty() {
        return "none".to_string();
    }
    components
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Multi-line plain-text report.
pub fn format_summary(intel: &IncidentIntelligence) -> String {
    let br = &intel.blast_radius;

    let Some(root) = &intel.root_cause else {
        let mut out = format!(
            "No incident detected ({} alert{}, none active)\n",
            intel.alert_count,
            if intel.alert_count == 1 { "" } else { "s" }
        );
        if !br.unaffected.is_empty() {
            out.push_str(&format!("Unaffected: {}\n", names(&br.unaffected)));
        }
        return out;
    };

    let mut out = format!("INCIDENT: {}\n\n", intel.headline());
    out.push_str(&format!(
        "Root cause:  alert {} ({} on {}, chart {})\n",
        root.alert_id, root.resource_type, root.host, root.chart
    ));
    out.push_str(&format!(
        "Confidence:  {}% ({})\n",
        root.confidence, intel.confidence_level
    ));
    out.push_str(&format!("Reasoning:   {}\n", root.reasoning));
    out.push_str(&format!(
        "Duration:    {} across {} alerts on {} host(s)\n",
        format_duration(intel.duration_secs),
        intel.alert_count,
        br.affected_hosts
    ));
    out.push_str("Evidence:\n");
    for line in &root.evidence {
        out.push_str(&format!("  - {}\n", line));
    }

    out.push_str("\nTimeline:\n");
    for entry in intel.timeline.entries().iter().take(MAX_TIMELINE_LINES) {
        let Some(alert) = intel.alert(entry.alert) else {
            continue;
        };
        out.push_str(&format!(
            "  +{:<8} {:<10} {:<20} {} {} on {}",
            format_duration(entry.since_start_secs),
            entry.event.to_string(),
            entry.alert_id,
            alert.resource_type,
            alert.status,
            alert.host
        ));
        if !entry.caused_by.is_empty() {
            let causes: Vec<&str> =
                entry.caused_by.iter().map(|c| c.alert_id.as_str()).collect();
            out.push_str(&format!("  <- {}", causes.join(", ")));
        }
        out.push('\n');
    }
    if intel.timeline.len() > MAX_TIMELINE_LINES {
        out.push_str(&format!(
            "  ... {} more\n",
            intel.timeline.len() - MAX_TIMELINE_LINES
        ));
    }

    if !intel.alternatives.is_empty() {
        out.push_str("\nAlternatives:\n");
        for (rank, alt) in intel.alternatives.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {} ({} on {}) {}% ({})\n",
                rank + 2,
                alt.alert_id,
                alt.resource_type,
                alt.host,
                alt.confidence,
                alt.confidence_level()
            ));
        }
    }

    out.push_str("\nBlast radius:\n");
    out.push_str(&format!(
        "  Impact score: {}/100, cascade depth {}\n",
        br.impact_score, br.cascade_depth
    ));
    out.push_str(&format!("  Direct:       {}\n", names(&br.directly_affected)));
    out.push_str(&format!("  Indirect:     {}\n", names(&br.indirectly_affected)));
    out.push_str(&format!("  Unaffected:   {}\n", names(&br.unaffected)));
    out.push_str(&format!("  Recovery:     {}\n", br.recovery_estimate));

    out.push_str("\nRemediation:\n");
    let tiers = [
        ("Immediate", &intel.remediation.immediate),
        ("Short term", &intel.remediation.short_term),
        ("Long term", &intel.remediation.long_term),
    ];
    for (label, steps) in tiers {
        if steps.is_empty() {
            continue;
        }
        out.push_str(&format!("  {}:\n", label));
        for step in steps {
            out.push_str(&format!("    - {}\n", step));
        }
    }

    out
}

/// Compact Slack mrkdwn rendering.
pub fn format_slack(intel: &IncidentIntelligence) -> String {
    let Some(root) = &intel.root_cause else {
        return format!(
            ":white_check_mark: *No incident* ({} alerts, none active)",
            intel.alert_count
        );
    };
    let br = &intel.blast_radius;

    let mut out = format!(
        ":rotating_light: *Incident: {} {} on `{}`*\n",
        root.resource_type, root.status, root.host
    );
    out.push_str(&format!(
        "*Root cause:* `{}` ({}% confidence, {})\n",
        root.alert_id, root.confidence, intel.confidence_level
    ));
    out.push_str(&format!("> {}\n", root.reasoning));
    out.push_str(&format!(
        "*Impact:* {}/100 | *Depth:* {} | *Hosts:* {} | *Duration:* {}\n",
        br.impact_score,
        br.cascade_depth,
        br.affected_hosts,
        format_duration(intel.duration_secs)
    ));
    out.push_str(&format!("*Recovery:* {}\n", br.recovery_estimate));

    if !br.indirectly_affected.is_empty() {
        out.push_str(&format!("*Spread to:* {}\n", names(&br.indirectly_affected)));
    }

    if !intel.remediation.immediate.is_empty() {
        out.push_str("*Immediate actions:*\n");
        for step in &intel.remediation.immediate {
            out.push_str(&format!("• {}\n", step));
        }
    }

    if let Some(alt) = intel.alternatives.first() {
        out.push_str(&format!(
            "_Next most likely: `{}` ({} on {}, {}%)_\n",
            alt.alert_id, alt.resource_type, alt.host, alt.confidence
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::ResourceType;
    use crate::analysis::fixtures::{clear, critical};
    use crate::detect::IncidentEngine;

    fn cascade() -> IncidentIntelligence {
        IncidentEngine::default().analyze(vec![
            critical("a", "h1", ResourceType::Memory, 0),
            critical("b", "h1", ResourceType::Disk, 60),
            critical("c", "h1", ResourceType::Cpu, 180),
        ])
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(200), "3m 20s");
        assert_eq!(format_duration(3900), "1h 5m");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn test_summary_covers_every_section() {
        let summary = format_summary(&cascade());
        assert!(summary.contains("INCIDENT: memory critical on h1"));
        assert!(summary.contains("Confidence:  100% (Very High)"));
        assert!(summary.contains("<- b"));
        assert!(summary.contains("Alternatives:"));
        assert!(summary.contains("Unaffected:   network, process"));
        assert!(summary.contains("Immediate:"));
        assert!(summary.contains("Recovery:"));
    }

    #[test]
    fn test_summary_without_incident() {
        let intel =
            IncidentEngine::default().analyze(vec![clear("ok", "h1", ResourceType::Cpu, 0)]);
        let summary = format_summary(&intel);
        assert!(summary.starts_with("No incident detected (1 alert, none active)"));
    }

    #[test]
    fn test_summary_layout() {
        let summary = format_summary(&cascade());
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "INCIDENT: memory critical on h1");
        assert_eq!(lines[1], "");
        assert!(lines[2].starts_with("Root cause:  alert a (memory on h1"));
        let timeline = lines.iter().position(|l| *l == "Timeline:").unwrap();
        assert_eq!(lines[timeline - 1], "");
        assert!(lines[timeline + 1].starts_with("  +0s"));
        assert!(lines[timeline + 2].ends_with("<- a"));
        assert!(summary.ends_with('\n'));
    }

    #[test]
    fn test_slack_rendering() {
        let slack = format_slack(&cascade());
        assert!(slack.starts_with(":rotating_light: *Incident: memory critical on `h1`*"));
        assert!(slack.contains("*Root cause:* `a`"));
        assert!(slack.contains("• "));
        assert!(slack.contains("_Next most likely: `b`"));

        let quiet = format_slack(&IncidentEngine::default().analyze(vec![]));
        assert!(quiet.contains("*No incident*"));
    }
}
