//! Human-readable run summary.

use crate::collector::Report;

/// Render a report as the boxed text summary printed at the end of a run.
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();

    out.push_str("\n╔══════════════════════════════════════════╗\n");
    out.push_str("║  InferGrid Simulation Summary            ║\n");
    out.push_str("╠══════════════════════════════════════════╣\n");
    out.push_str(&format!("║  Policy:   {:<30}║\n", report.policy.name()));
    out.push_str(&format!("║  Requests: {:<30}║\n", report.request_count));
    out.push_str("╚══════════════════════════════════════════╝\n\n");

    out.push_str(&format!("Completed:             {}\n", report.completed_count));
    if report.lost_count > 0 {
        out.push_str(&format!("Lost (worker crash):   {}\n", report.lost_count));
    }
    if report.undispatched_count > 0 {
        out.push_str(&format!("Never dispatched:      {}\n", report.undispatched_count));
    }
    out.push_str(&format!(
        "Total simulation time: {:.2}s\n",
        report.total_simulation_time
    ));
    out.push_str(&format!(
        "Avg response time:     {:.2}s\n",
        report.avg_response_time
    ));
    out.push_str(&format!(
        "Avg CPU utilization:   {:.2}%\n",
        report.avg_cpu_utilization * 100.0
    ));
    out.push_str(&format!("Max wait:              {:.2}s\n", report.max_wait));
    out.push_str(&format!(
        "Throughput:            {:.2} tasks/s\n",
        report.throughput
    ));
    out.push_str(&format!("Migrations:            {}\n", report.migrations));

    if !report.servers.is_empty() {
        out.push_str("\nServers:\n");
        for s in &report.servers {
            out.push_str(&format!(
                "  • server {} (capacity {}): {} done, busy {:.2}s, {:.1}%\n",
                s.server_id,
                s.capacity,
                s.completed,
                s.busy_time,
                s.utilization * 100.0
            ));
        }
    }

    out
}
