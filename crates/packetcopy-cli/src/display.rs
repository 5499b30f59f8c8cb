//! Report formatting for the PacketCopy CLI

use console::style;
use packetcopy_types::{JobReport, JobState, SourceDescriptor, SpeedMeasurement};
use std::time::Duration;

/// Print the outcome of a copy job
pub fn print_report(report: &JobReport) {
    println!();
    println!("{}", style("Copy Statistics:").bold().underlined());
    println!("  State: {}", state_label(report.state));
    println!("  Files copied: {}", style(report.files_copied).green());
    println!("  Files skipped: {}", style(report.files_skipped).yellow());
    println!(
        "  Files failed: {}",
        if report.files_failed > 0 {
            style(report.files_failed).red()
        } else {
            style(report.files_failed).green()
        }
    );
    println!("  Packets copied: {}", style(report.packets_copied).green());
    println!(
        "  Bytes copied: {}",
        style(format_bytes(report.bytes_copied)).green()
    );
    println!(
        "  Duration: {}",
        style(format_duration(report.duration)).blue()
    );
    println!(
        "  Transfer rate: {} MB/s",
        style(format!("{:.2}", report.transfer_rate() / 1024.0 / 1024.0))
            .blue()
            .bold()
    );

    if report.abandoned {
        println!(
            "  {}",
            style("Worker did not stop in time and was abandoned").yellow()
        );
    }
    for warning in &report.warnings {
        println!("  {} {}", style("⚠").yellow(), style(warning).yellow());
    }
    if let Some(error) = report.error.as_ref().filter(|e| !e.is_cancelled()) {
        println!("  {} {}", style("✗").red().bold(), style(error).red());
    }
}

/// Print measurements in the order given, which is ranked order
pub fn print_measurements(measurements: &[SpeedMeasurement]) {
    println!();
    println!("{}", style("Read Speed Ranking:").bold().underlined());
    for (rank, measurement) in measurements.iter().enumerate() {
        let speed = measurement.kbps.map_or_else(
            || style("failed".to_string()).red(),
            |kbps| style(format_mbps(kbps)).green(),
        );
        println!(
            "  {:>3}. {} {}",
            rank + 1,
            speed,
            style(measurement.path.display()).cyan()
        );
    }
}

/// Print the registered sources with their recorded speeds
pub fn print_sources(sources: &[SourceDescriptor]) {
    for source in sources {
        let speed = source
            .speed_mbps()
            .map_or_else(|| "-".to_string(), |mbps| format!("{:.1} Mbps", mbps));
        println!(
            "  {} {} ({})",
            style("•").dim(),
            style(source.path.display()).cyan(),
            style(speed).dim()
        );
    }
}

fn state_label(state: JobState) -> console::StyledObject<String> {
    let label = state.to_string();
    match state {
        JobState::Completed => style(label).green().bold(),
        JobState::Cancelled => style(label).yellow().bold(),
        JobState::Failed => style(label).red().bold(),
        JobState::Idle | JobState::Running => style(label).dim(),
    }
}

/// Format a kilobit-per-second speed as megabits per second
pub fn format_mbps(kbps: u64) -> String {
    format!("{:.1} Mbps", kbps as f64 / 1000.0)
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0.00 B")]
    #[case(1023, "1023.00 B")]
    #[case(1536, "1.50 KB")]
    #[case(64 * 1024 * 1024, "64.00 MB")]
    fn test_format_bytes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }

    #[rstest]
    #[case(Duration::from_millis(2500), "2.5s")]
    #[case(Duration::from_secs(125), "2m 5s")]
    #[case(Duration::from_secs(3723), "1h 2m 3s")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }

    #[test]
    fn test_format_mbps() {
        assert_eq!(format_mbps(12_500), "12.5 Mbps");
        assert_eq!(format_mbps(0), "0.0 Mbps");
    }
}
