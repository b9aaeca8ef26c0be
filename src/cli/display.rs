//! Terminal rendering of the day plan.

use std::sync::Arc;

use async_trait::async_trait;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Table};
use console::style;

use crate::domain::models::task::DayPlan;
use crate::domain::ports::telemetry::{TelemetrySink, TickEvent};

/// Telemetry wrapper that renders each published plan as a table on
/// stdout (when attached to a terminal) and forwards everything to the
/// inner sink.
pub struct PlanTablePrinter {
    inner: Arc<dyn TelemetrySink>,
}

impl PlanTablePrinter {
    /// Wrap an inner sink.
    pub fn new(inner: Arc<dyn TelemetrySink>) -> Self {
        Self { inner }
    }

    fn render(plan: &DayPlan) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["#", "task", "priority", "est ticks"]);
        for entry in &plan.resolved {
            table.add_row(vec![
                Cell::new(entry.ordinal),
                Cell::new(&entry.description),
                Cell::new(entry.priority.as_str()),
                Cell::new(
                    plan.raw
                        .iter()
                        .find(|r| r.id == entry.parent)
                        .map_or(0, |r| r.estimated_ticks),
                ),
            ]);
        }
        let mut out = format!(
            "{} day {}\n{table}\n",
            style("plan:").bold().green(),
            plan.day_of_year
        );
        for (desc, reason) in &plan.dropped {
            out.push_str(&format!(
                "{} {desc} ({reason})\n",
                style("dropped:").yellow()
            ));
        }
        out
    }
}

#[async_trait]
impl TelemetrySink for PlanTablePrinter {
    async fn record_tick(&self, event: &TickEvent) {
        self.inner.record_tick(event).await;
    }

    async fn publish_plan(&self, plan: &DayPlan) {
        if console::Term::stdout().is_term() {
            println!("{}", Self::render(plan));
        }
        self.inner.publish_plan(plan).await;
    }
}
