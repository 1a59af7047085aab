use metrics::counter;

pub const EVENTS_RECEIVED_TOTAL: &str = "teamcity_events_received_total";
pub const EVENTS_INSERTED_TOTAL: &str = "teamcity_events_inserted_total";
pub const EVENTS_SKIPPED_TOTAL: &str = "teamcity_events_skipped_total";
pub const EVENTS_DROPPED_TOTAL: &str = "teamcity_events_dropped_total";
pub const CHANGES_MAPPED_TOTAL: &str = "teamcity_changes_mapped_total";

pub fn report_dropped_events(cause: &'static str, quantity: u64) {
    counter!(EVENTS_DROPPED_TOTAL, "cause" => cause).increment(quantity);
}
