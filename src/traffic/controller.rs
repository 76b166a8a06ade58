use crate::config::TrafficConfig;
use crate::error::AppError;
use crate::traffic::generator::LoadGenerator;
use crate::traffic::types::{
    EmergencyKind, SimulationState, TrafficLevel, TrafficProfiles, WorkerCounts,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const FOREGROUND_LABEL: &str = "foreground";
const BASELINE_LABEL: &str = "baseline";

/// Owns the simulation state and the load generators that realise it.
///
/// Every mutation goes through the `foreground` mutex, so a transition (stop the old worker,
/// spawn the new one, publish the new state) is observed as a single step. The published
/// state sits behind its own lock so readers never wait on an in-flight transition.
pub struct TrafficController {
    enabled: bool,
    baseline_enabled: bool,
    join_timeout: Duration,
    profiles: TrafficProfiles,
    foreground: Mutex<Option<LoadGenerator>>,
    baseline: Mutex<Option<LoadGenerator>>,
    state: RwLock<SimulationState>,
    foreground_workers: Arc<AtomicUsize>,
    baseline_workers: Arc<AtomicUsize>,
}

impl TrafficController {
    pub fn new(config: &TrafficConfig) -> Self {
        Self {
            enabled: config.simulation_enabled,
            baseline_enabled: config.baseline_enabled,
            join_timeout: config.join_timeout,
            profiles: config.profiles,
            foreground: Mutex::new(None),
            baseline: Mutex::new(None),
            state: RwLock::new(SimulationState::idle(config.auto_mode)),
            foreground_workers: Arc::new(AtomicUsize::new(0)),
            baseline_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get_state(&self) -> SimulationState {
        *self.state.read()
    }

    pub fn baseline_active(&self) -> bool {
        self.baseline_workers.load(Ordering::SeqCst) > 0
    }

    pub fn worker_counts(&self) -> WorkerCounts {
        WorkerCounts {
            foreground: self.foreground_workers.load(Ordering::SeqCst),
            baseline: self.baseline_workers.load(Ordering::SeqCst),
        }
    }

    pub async fn start(
        &self,
        level: TrafficLevel,
        emergency: bool,
    ) -> Result<SimulationState, AppError> {
        self.ensure_enabled()?;
        let mut slot = self.foreground.lock().await;
        self.start_locked(&mut slot, level, emergency).await
    }

    /// Stops the foreground generator. Always permitted, even with the feature disabled.
    pub async fn stop(&self) -> SimulationState {
        let mut slot = self.foreground.lock().await;
        self.stop_locked(&mut slot).await
    }

    /// Applies a level requested by name; an absent or `off` level stops the simulation.
    pub async fn set_level_request(
        &self,
        requested: Option<&str>,
    ) -> Result<SimulationState, AppError> {
        self.ensure_enabled()?;
        let level = requested.unwrap_or_default().parse::<TrafficLevel>()?;

        let mut slot = self.foreground.lock().await;
        if level == TrafficLevel::Off {
            Ok(self.stop_locked(&mut slot).await)
        } else {
            self.start_locked(&mut slot, level, false).await
        }
    }

    pub async fn trigger_emergency(
        &self,
        kind: &str,
    ) -> Result<(EmergencyKind, SimulationState), AppError> {
        self.ensure_enabled()?;
        let kind = kind.parse::<EmergencyKind>()?;

        let mut slot = self.foreground.lock().await;
        let state = self.start_locked(&mut slot, kind.level(), true).await?;
        tracing::warn!(
            emergency = kind.as_str(),
            level = state.level.as_str(),
            "emergency traffic triggered"
        );
        Ok((kind, state))
    }

    /// Moves the simulation to the level a price move calls for.
    ///
    /// Does nothing unless auto mode is on and no emergency is in force. Returns the level
    /// that was applied, if any.
    pub async fn auto_adjust(&self, symbol: &str, change_percent: f64) -> Option<TrafficLevel> {
        if !self.enabled || !self.state.read().auto_mode {
            return None;
        }
        let target = TrafficLevel::for_price_change(change_percent)?;

        let mut slot = self.foreground.lock().await;
        let current = self.get_state();
        if !current.auto_mode || current.emergency || (current.active && current.level == target)
        {
            return None;
        }

        match self.start_locked(&mut slot, target, false).await {
            Ok(_) => {
                tracing::info!(
                    symbol,
                    change_percent,
                    level = target.as_str(),
                    "traffic level adjusted by price move"
                );
                Some(target)
            }
            Err(error) => {
                tracing::warn!(symbol, %error, "automatic traffic adjustment failed");
                None
            }
        }
    }

    pub async fn toggle_auto_mode(&self) -> Result<bool, AppError> {
        self.ensure_enabled()?;
        let _slot = self.foreground.lock().await;
        let enabled = {
            let mut writable = self.state.write();
            writable.auto_mode = !writable.auto_mode;
            writable.auto_mode
        };
        tracing::info!(auto_mode = enabled, "auto mode toggled");
        Ok(enabled)
    }

    pub async fn set_auto_mode(&self, enabled: bool) -> Result<bool, AppError> {
        self.ensure_enabled()?;
        let _slot = self.foreground.lock().await;
        self.state.write().auto_mode = enabled;
        Ok(enabled)
    }

    /// Starts the baseline worker if it is not running yet. Returns whether it is running.
    pub async fn start_baseline(&self) -> Result<bool, AppError> {
        self.ensure_enabled()?;
        Ok(self.ensure_baseline().await)
    }

    /// Stops both generators. Used on graceful shutdown.
    pub async fn shutdown(&self) {
        {
            let mut slot = self.foreground.lock().await;
            self.stop_locked(&mut slot).await;
        }
        let baseline = self.baseline.lock().await.take();
        self.stop_generator(baseline).await;
        tracing::info!("traffic controller shut down");
    }

    fn ensure_enabled(&self) -> Result<(), AppError> {
        if self.enabled {
            Ok(())
        } else {
            Err(AppError::FeatureDisabled)
        }
    }

    async fn start_locked(
        &self,
        slot: &mut Option<LoadGenerator>,
        level: TrafficLevel,
        emergency: bool,
    ) -> Result<SimulationState, AppError> {
        let profile = self
            .profiles
            .for_level(level)
            .ok_or_else(|| AppError::InvalidLevel(level.as_str().to_string()))?;

        self.stop_generator(slot.take()).await;

        let generator = match LoadGenerator::spawn(
            FOREGROUND_LABEL,
            profile,
            Arc::clone(&self.foreground_workers),
        ) {
            Ok(generator) => generator,
            Err(error) => {
                self.publish_idle();
                return Err(error);
            }
        };
        *slot = Some(generator);

        let snapshot = {
            let mut writable = self.state.write();
            writable.active = true;
            writable.level = level;
            writable.emergency = emergency;
            *writable
        };

        self.ensure_baseline().await;
        tracing::info!(level = level.as_str(), emergency, "traffic simulation started");
        Ok(snapshot)
    }

    async fn stop_locked(&self, slot: &mut Option<LoadGenerator>) -> SimulationState {
        let was_running = slot.is_some();
        self.stop_generator(slot.take()).await;
        let snapshot = self.publish_idle();
        if was_running {
            tracing::info!("traffic simulation stopped");
        }
        snapshot
    }

    fn publish_idle(&self) -> SimulationState {
        let mut writable = self.state.write();
        *writable = SimulationState::idle(writable.auto_mode);
        *writable
    }

    async fn stop_generator(&self, generator: Option<LoadGenerator>) {
        let Some(generator) = generator else {
            return;
        };
        if let Err(error) = generator.stop(self.join_timeout).await {
            tracing::warn!(%error, "continuing without stop acknowledgment");
        }
    }

    async fn ensure_baseline(&self) -> bool {
        if !self.baseline_enabled {
            return false;
        }

        let mut slot = self.baseline.lock().await;
        if slot.is_none() {
            match LoadGenerator::spawn(
                BASELINE_LABEL,
                self.profiles.baseline,
                Arc::clone(&self.baseline_workers),
            ) {
                Ok(generator) => {
                    tracing::info!("baseline traffic started");
                    *slot = Some(generator);
                }
                Err(error) => tracing::warn!(%error, "failed to start baseline traffic"),
            }
        }
        slot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::types::TrafficProfile;

    const LIGHT_PROFILE: TrafficProfile = TrafficProfile {
        busy_iterations: 1,
        busy_range: 10,
        idle_interval: Duration::from_millis(5),
    };

    fn test_config() -> TrafficConfig {
        TrafficConfig {
            simulation_enabled: true,
            auto_mode: false,
            baseline_enabled: false,
            join_timeout: Duration::from_secs(5),
            profiles: TrafficProfiles {
                low: LIGHT_PROFILE,
                medium: LIGHT_PROFILE,
                high: LIGHT_PROFILE,
                baseline: LIGHT_PROFILE,
            },
        }
    }

    fn controller() -> TrafficController {
        TrafficController::new(&test_config())
    }

    #[tokio::test]
    async fn start_sets_requested_level() {
        let controller = controller();

        for level in [TrafficLevel::Low, TrafficLevel::Medium, TrafficLevel::High] {
            controller.start(level, false).await.expect("start should succeed");
            let state = controller.get_state();
            assert!(state.active);
            assert_eq!(state.level, level);
            assert!(!state.emergency);
        }

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn start_rejects_off_level() {
        let controller = controller();
        let result = controller.start(TrafficLevel::Off, false).await;

        assert!(matches!(result, Err(AppError::InvalidLevel(_))));
        assert!(!controller.get_state().active);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let controller = controller();
        controller
            .start(TrafficLevel::High, true)
            .await
            .expect("start should succeed");

        let first = controller.stop().await;
        let second = controller.stop().await;

        assert_eq!(first, second);
        assert!(!second.active);
        assert_eq!(second.level, TrafficLevel::Off);
        assert!(!second.emergency);
        assert_eq!(controller.worker_counts().foreground, 0);
    }

    #[tokio::test]
    async fn never_runs_more_than_one_foreground_worker() {
        let controller = controller();

        controller.start(TrafficLevel::Low, false).await.expect("low");
        assert_eq!(controller.worker_counts().foreground, 1);
        controller.start(TrafficLevel::High, false).await.expect("high");
        assert_eq!(controller.worker_counts().foreground, 1);
        controller
            .trigger_emergency("massive_trading")
            .await
            .expect("emergency");
        assert_eq!(controller.worker_counts().foreground, 1);
        controller.stop().await;
        assert_eq!(controller.worker_counts().foreground, 0);
        controller
            .set_level_request(Some("medium"))
            .await
            .expect("medium");
        assert!(controller.worker_counts().foreground <= 1);

        controller.shutdown().await;
        assert_eq!(controller.worker_counts().foreground, 0);
    }

    #[tokio::test]
    async fn concurrent_starts_leave_single_worker() {
        let controller = Arc::new(controller());
        let mut handles = Vec::new();
        for level in [
            TrafficLevel::Low,
            TrafficLevel::Medium,
            TrafficLevel::High,
            TrafficLevel::Low,
        ] {
            let controller = Arc::clone(&controller);
            handles.push(tokio::spawn(async move {
                controller.start(level, false).await
            }));
        }
        for handle in handles {
            handle
                .await
                .expect("task should not panic")
                .expect("start should succeed");
        }

        assert_eq!(controller.worker_counts().foreground, 1);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn system_error_emergency_runs_low_traffic() {
        let controller = controller();
        let (kind, state) = controller
            .trigger_emergency("system_error")
            .await
            .expect("known emergency");

        assert_eq!(kind, EmergencyKind::SystemError);
        assert_eq!(state.level, TrafficLevel::Low);
        assert!(state.emergency);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_emergency_leaves_state_unchanged() {
        let controller = controller();
        controller
            .start(TrafficLevel::Medium, false)
            .await
            .expect("start should succeed");
        let before = controller.get_state();

        let result = controller.trigger_emergency("unknown_x").await;

        assert!(matches!(result, Err(AppError::UnknownEmergency(_))));
        assert_eq!(controller.get_state(), before);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn set_level_request_handles_off_and_invalid_names() {
        let controller = controller();
        controller
            .set_level_request(Some("high"))
            .await
            .expect("high is valid");

        let invalid = controller.set_level_request(Some("extreme")).await;
        assert!(matches!(invalid, Err(AppError::InvalidLevel(_))));
        assert_eq!(controller.get_state().level, TrafficLevel::High);

        let state = controller
            .set_level_request(None)
            .await
            .expect("empty request stops");
        assert!(!state.active);
        assert_eq!(state.level, TrafficLevel::Off);
    }

    #[tokio::test]
    async fn disabled_feature_rejects_mutations() {
        let controller = TrafficController::new(&TrafficConfig {
            simulation_enabled: false,
            ..test_config()
        });

        assert!(matches!(
            controller.start(TrafficLevel::High, false).await,
            Err(AppError::FeatureDisabled)
        ));
        assert!(matches!(
            controller.set_level_request(Some("high")).await,
            Err(AppError::FeatureDisabled)
        ));
        assert!(matches!(
            controller.trigger_emergency("system_error").await,
            Err(AppError::FeatureDisabled)
        ));
        assert!(matches!(
            controller.toggle_auto_mode().await,
            Err(AppError::FeatureDisabled)
        ));
        assert!(!controller.get_state().active);
        assert_eq!(controller.worker_counts(), WorkerCounts::default());
    }

    #[tokio::test]
    async fn auto_adjust_follows_price_moves() {
        let controller = controller();
        assert_eq!(controller.auto_adjust("AAPL", 12.0).await, None);

        controller.set_auto_mode(true).await.expect("enabled");
        assert_eq!(controller.auto_adjust("AAPL", 2.0).await, None);
        assert_eq!(
            controller.auto_adjust("AAPL", -6.5).await,
            Some(TrafficLevel::Medium)
        );
        assert_eq!(
            controller.auto_adjust("TSLA", 10.0).await,
            Some(TrafficLevel::High)
        );
        assert_eq!(controller.auto_adjust("TSLA", 11.0).await, None);
        assert_eq!(controller.get_state().level, TrafficLevel::High);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn auto_adjust_never_overrides_emergency() {
        let controller = controller();
        controller.set_auto_mode(true).await.expect("enabled");
        controller
            .trigger_emergency("system_error")
            .await
            .expect("emergency");

        for change in [5.0, -9.9, 10.0, 250.0, -75.0] {
            assert_eq!(controller.auto_adjust("MSFT", change).await, None);
        }
        let state = controller.get_state();
        assert_eq!(state.level, TrafficLevel::Low);
        assert!(state.emergency);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn toggle_auto_mode_survives_stop() {
        let controller = controller();
        assert!(controller.toggle_auto_mode().await.expect("toggle"));
        controller.stop().await;
        assert!(controller.get_state().auto_mode);
        assert!(!controller.toggle_auto_mode().await.expect("toggle"));
    }

    #[tokio::test]
    async fn baseline_runs_independently_of_foreground() {
        let controller = TrafficController::new(&TrafficConfig {
            baseline_enabled: true,
            ..test_config()
        });
        assert!(!controller.baseline_active());

        controller
            .start(TrafficLevel::Medium, false)
            .await
            .expect("start should succeed");
        assert!(controller.baseline_active());

        controller.stop().await;
        assert!(controller.baseline_active());
        assert_eq!(controller.worker_counts().baseline, 1);

        controller.shutdown().await;
        assert!(!controller.baseline_active());
    }
}
