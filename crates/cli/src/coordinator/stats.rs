//! Coordinator run statistics.

use std::time::Duration;

use observability::DispatchAggregator;

/// Statistics from a coordinator run
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStats {
    /// Lines read from the operator
    pub lines_received: u64,

    /// Lines that were not a valid command
    pub lines_rejected: u64,

    /// Clock syncs applied
    pub syncs: u64,

    /// Packets handed to the transport
    pub packets_requested: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Connect-transport batch reports
    pub dispatch: DispatchAggregator,
}

impl CoordinatorStats {
    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   Coordinator Statistics                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines received: {}", self.lines_received);
        println!("   ├─ Lines rejected: {}", self.lines_rejected);
        println!("   ├─ Clock syncs: {}", self.syncs);
        println!("   └─ Packets requested: {}", self.packets_requested);

        if self.dispatch.total_batches > 0 {
            println!("\n📡 Dispatch");
            for line in self.dispatch.summary().to_string().lines() {
                println!("   {}", line);
            }
        }

        println!();
    }
}
