use crate::domain::value_objects::SessionState;

/// Port for metrics reporting
pub trait MetricsReporter: Send + Sync {
    fn report_state_change(&self, state: &SessionState);
    fn report_connect_attempt(&self);
    fn report_process_spawned(&self);
    fn report_frame_ingested(&self, bytes: usize);
    fn report_frame_emitted(&self, bytes: usize);
    fn report_frame_dropped(&self);
    fn report_uptime(&self, uptime_secs: f64);
}
